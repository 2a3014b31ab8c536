pub mod admin;
pub mod air;
pub mod audit;
pub mod auth;
pub mod credentials;
pub mod error;
pub mod federated;
pub mod feedback;
pub mod forecast;
pub mod mailer;
pub mod password;
pub mod profile;
pub mod regression;
pub mod routes;
pub mod session;
pub mod settings;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

/// SQLite `datetime('now')` values are "YYYY-MM-DD HH:MM:SS" in UTC with no
/// offset. Unparseable values fall back to the epoch with a warning.
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
