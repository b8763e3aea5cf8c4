use chrono::{Datelike, NaiveDate};
use serde_json::json;
use wallcal_core::time_util::{
    days_in_month, format_date_line, format_month_year, format_time_hhmm, local_datetime,
    local_midnight, now_ts, weekday_index,
};
use wallcal_core::{AppConfig, EventRecord};

use super::{open_cache, CliResult};

fn describe(event: &EventRecord) -> String {
    let when = if event.all_day {
        "all day".to_string()
    } else {
        format!(
            "{}-{}",
            format_time_hhmm(event.start_ts),
            format_time_hhmm(event.end_ts)
        )
    };
    if event.location.is_empty() {
        format!("{when:<12} {}", event.title)
    } else {
        format!("{when:<12} {} @ {}", event.title, event.location)
    }
}

/// Events overlapping one local day.
pub fn day(config: &AppConfig, date: Option<&str>, json: bool) -> CliResult {
    let day_ts = match date {
        Some(text) => {
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")?;
            local_midnight(date.year(), date.month(), date.day())
                .ok_or_else(|| format!("no local midnight on {text}"))?
        }
        None => now_ts(),
    };

    let cache = open_cache(config)?;
    let events = cache.events_for_day(day_ts)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    println!("{}", format_date_line(day_ts));
    if events.is_empty() {
        println!("  no events");
    }
    for event in &events {
        println!("  {}", describe(event));
    }
    Ok(())
}

/// Day-of-month event counts, printed as a small calendar grid.
pub fn month(config: &AppConfig, year: Option<i32>, month: Option<u32>, json: bool) -> CliResult {
    let today = local_datetime(now_ts());
    let year = year.unwrap_or(today.year());
    let month = month.unwrap_or(today.month());
    if !(1..=12).contains(&month) {
        return Err(format!("month out of range: {month}").into());
    }

    let cache = open_cache(config)?;
    let counts = cache.event_days_in_month(year, month)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "year": year,
                "month": month,
                "days": counts,
            }))?
        );
        return Ok(());
    }

    let first = local_midnight(year, month, 1).ok_or("invalid month")?;
    println!("{}", format_month_year(first));
    println!(" Su  Mo  Tu  We  Th  Fr  Sa");
    let offset = weekday_index(year, month, 1).unwrap_or(0);
    let mut line = "    ".repeat(offset as usize);
    for day in 1..=days_in_month(year, month) {
        let mark = if counts.contains_key(&day) { '*' } else { ' ' };
        line.push_str(&format!("{day:>3}{mark}"));
        if (offset + day) % 7 == 0 {
            println!("{}", line.trim_end());
            line.clear();
        }
    }
    if !line.is_empty() {
        println!("{}", line.trim_end());
    }
    Ok(())
}

/// The next event starting from now.
pub fn next(config: &AppConfig, json: bool) -> CliResult {
    let cache = open_cache(config)?;
    let event = cache.next_event_after(now_ts())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&event)?);
        return Ok(());
    }
    match event {
        Some(event) => println!("{}  {}", format_date_line(event.start_ts), describe(&event)),
        None => println!("no upcoming events"),
    }
    Ok(())
}
