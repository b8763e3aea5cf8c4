//! Open-Meteo forecast response handling.
//!
//! The API returns `current`, `hourly` and `daily` objects, the latter two as
//! parallel arrays keyed by `time`.

use serde::Serialize;
use serde_json::Value;

use crate::error::WeatherError;

const HOURLY_LIMIT: usize = 24;
const DAILY_LIMIT: usize = 7;

/// One hour of forecast, as rendered in the hourly strip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyEntry {
    pub time: String,
    pub temp_c: f64,
    pub code: i64,
    /// `1` for day, `0` for night.
    pub is_day: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyEntry {
    pub date: String,
    pub max_c: f64,
    pub min_c: f64,
    pub code: i64,
}

/// Everything one successful fetch yields.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub temp_c: f64,
    pub code: i64,
    pub is_day: bool,
    pub wind_kmh: Option<f64>,
    pub hourly: Vec<HourlyEntry>,
    pub daily: Vec<DailyEntry>,
}

impl WeatherSnapshot {
    pub fn summary(&self) -> &'static str {
        weather_code_text(self.code, self.is_day)
    }
}

pub fn is_valid_coords(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Query parameters for the forecast endpoint.
pub fn forecast_query(latitude: f64, longitude: f64) -> Vec<(&'static str, String)> {
    vec![
        ("latitude", format!("{latitude:.5}")),
        ("longitude", format!("{longitude:.5}")),
        (
            "current",
            "temperature_2m,weather_code,is_day,wind_speed_10m".to_string(),
        ),
        ("hourly", "temperature_2m,weather_code,is_day".to_string()),
        (
            "daily",
            "weather_code,temperature_2m_max,temperature_2m_min".to_string(),
        ),
        ("forecast_days", "7".to_string()),
        ("timezone", "auto".to_string()),
    ]
}

/// Human text for a WMO weather code.
pub fn weather_code_text(code: i64, is_day: bool) -> &'static str {
    match code {
        0 if is_day => "Clear sky",
        0 => "Clear night",
        1 if is_day => "Mostly clear",
        1 => "Mostly clear night",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 | 63 | 65 => "Rain",
        66 | 67 => "Freezing rain",
        71 | 73 | 75 => "Snow",
        77 => "Snow grains",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunder + hail",
        _ => "Weather",
    }
}

/// Validate and flatten a forecast body.
pub fn parse_forecast(body: &str) -> Result<WeatherSnapshot, WeatherError> {
    let root: Value = serde_json::from_str(body).map_err(|_| WeatherError::InvalidJson)?;
    let current = root
        .get("current")
        .filter(|c| c.is_object())
        .ok_or(WeatherError::InvalidJson)?;

    let (Some(temp), Some(code)) = (current.get("temperature_2m"), current.get("weather_code"))
    else {
        return Err(WeatherError::MissingFields);
    };
    let temp_c = temp
        .as_f64()
        .filter(|t| t.is_finite())
        .ok_or(WeatherError::TemperatureInvalid)?;
    let code = as_int(code).unwrap_or(-1);
    let is_day = current.get("is_day").and_then(as_int).map_or(true, |d| d == 1);
    let wind_kmh = current
        .get("wind_speed_10m")
        .and_then(Value::as_f64)
        .filter(|w| w.is_finite());

    // Hourly times look like `2024-06-15T14:00`; compare on the hour.
    let current_hour = current
        .get("time")
        .and_then(Value::as_str)
        .and_then(|t| t.get(..13));

    Ok(WeatherSnapshot {
        temp_c,
        code,
        is_day,
        wind_kmh,
        hourly: root
            .get("hourly")
            .map(|h| parse_hourly(h, current_hour))
            .unwrap_or_default(),
        daily: root.get("daily").map(parse_daily).unwrap_or_default(),
    })
}

fn as_int(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|v| v.is_finite()).map(|v| v.round() as i64))
}

fn array<'a>(section: &'a Value, key: &str) -> &'a [Value] {
    section
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn finite_at(values: &[Value], i: usize) -> Option<f64> {
    values.get(i)?.as_f64().filter(|v| v.is_finite())
}

fn parse_hourly(hourly: &Value, current_hour: Option<&str>) -> Vec<HourlyEntry> {
    let times = array(hourly, "time");
    let temps = array(hourly, "temperature_2m");
    let codes = array(hourly, "weather_code");
    let days = array(hourly, "is_day");

    let start = current_hour
        .and_then(|hour| {
            times.iter().position(|t| {
                t.as_str()
                    .and_then(|t| t.get(..13))
                    .is_some_and(|prefix| prefix >= hour)
            })
        })
        .unwrap_or(0);

    (start..times.len())
        .take(HOURLY_LIMIT)
        .filter_map(|i| {
            Some(HourlyEntry {
                time: times[i].as_str()?.to_string(),
                temp_c: finite_at(temps, i)?,
                code: codes.get(i).and_then(as_int)?,
                is_day: days.get(i).and_then(as_int).map_or(1, |d| i64::from(d == 1)),
            })
        })
        .collect()
}

fn parse_daily(daily: &Value) -> Vec<DailyEntry> {
    let dates = array(daily, "time");
    let maxes = array(daily, "temperature_2m_max");
    let mins = array(daily, "temperature_2m_min");
    let codes = array(daily, "weather_code");

    (0..dates.len())
        .take(DAILY_LIMIT)
        .filter_map(|i| {
            Some(DailyEntry {
                date: dates[i].as_str()?.to_string(),
                max_c: finite_at(maxes, i)?,
                min_c: finite_at(mins, i)?,
                code: codes.get(i).and_then(as_int)?,
            })
        })
        .collect()
}
