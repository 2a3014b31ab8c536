/// Database row types, mapped directly from SQLite rows.
/// Timestamps stay as SQLite text; the API layer converts them.
use std::str::FromStr;

use aqi_types::models::{FeedbackStatus, IssueType, Role};
use rusqlite::Row;
use rusqlite::types::Type;

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub role: Role,
    pub subscription: bool,
    pub created_at: String,
}

pub struct ActivityRow {
    pub id: i64,
    pub username: String,
    pub action: String,
    pub timestamp: String,
}

pub struct FeedbackRow {
    pub id: i64,
    pub username: String,
    pub city: String,
    pub issue_type: IssueType,
    pub description: Option<String>,
    pub status: FeedbackStatus,
    pub timestamp: String,
}

pub struct AirQualityRow {
    pub city: String,
    pub date: String,
    pub aqi: Option<f64>,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub co: Option<f64>,
    pub o3: Option<f64>,
}

pub struct ForecastRow {
    pub city: String,
    pub forecast_date: String,
    pub predicted_aqi: f64,
}

/// Outcome of redeeming a password reset token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redemption {
    Redeemed,
    AlreadySpent,
    UnknownUser,
}

/// Read a text column and parse it into one of the typed enums.
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
