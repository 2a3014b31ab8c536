use std::path::PathBuf;

use chrono::NaiveTime;

use aqi_api::credentials::DEFAULT_ADMIN_PASSWORD;

/// Secrets that ship in sample `.env` files and must never reach production.
const PLACEHOLDER_SECRETS: [&str; 4] = ["", "changeme", "change-me", "dev-secret-change-me"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("{0} is still set to a placeholder value")]
    PlaceholderSecret(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub admin_password: String,
    pub google_client_id: Option<String>,
    pub reset_url: String,
    pub mail_webhook: Option<String>,
    pub forecast_at: NaiveTime,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests don't have to touch the process
    /// environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("AQI_JWT_SECRET").ok_or(ConfigError::MissingVar("AQI_JWT_SECRET"))?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.trim()) {
            return Err(ConfigError::PlaceholderSecret("AQI_JWT_SECRET"));
        }

        let port = match non_empty("AQI_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "AQI_PORT",
                value: raw,
            })?,
            None => 8000,
        };

        let forecast_at = match non_empty("AQI_FORECAST_AT") {
            Some(raw) => NaiveTime::parse_from_str(&raw, "%H:%M").map_err(|_| {
                ConfigError::Invalid {
                    name: "AQI_FORECAST_AT",
                    value: raw,
                }
            })?,
            None => NaiveTime::MIN + chrono::Duration::hours(2),
        };

        Ok(Self {
            jwt_secret,
            db_path: PathBuf::from(non_empty("AQI_DB_PATH").unwrap_or_else(|| "aqi.db".into())),
            host: non_empty("AQI_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            admin_password: non_empty("AQI_ADMIN_PASSWORD")
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.into()),
            google_client_id: non_empty("AQI_GOOGLE_CLIENT_ID"),
            reset_url: non_empty("AQI_RESET_URL")
                .unwrap_or_else(|| "http://localhost:8000/reset?token=".into()),
            mail_webhook: non_empty("AQI_MAIL_WEBHOOK"),
            forecast_at,
        })
    }
}
