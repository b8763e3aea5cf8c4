//! External data sources and the credentials they need.
//!
//! - [`ics`]: iCalendar feed parsing
//! - [`google`]: calendar REST API (bearer-token protected)
//! - [`oauth`] and [`token_store`]: refresh-token grant and the token file
//! - [`http`]: the blocking client every source shares

pub mod google;
pub mod http;
pub mod ics;
pub mod oauth;
pub mod token_store;

pub use google::{ApiError, EventQuery};
pub use http::{build_client, FetchError};
pub use ics::{IcsEvent, ICS_CALENDAR_ID};
pub use oauth::OAuthClientConfig;
pub use token_store::TokenInfo;
