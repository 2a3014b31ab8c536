use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aqi_db::Database;

use crate::error::{ApiError, ApiResult};
use crate::federated::{IdentityVerifier, VerifiedIdentity};
use crate::mailer::ResetMailer;
use crate::state::{AppState, AppStateInner};

pub const RESET_URL: &str = "https://aqi.test/reset?token=";

/// Accepts tokens of the form `good:<email>`.
pub struct StubVerifier;

#[async_trait]
impl IdentityVerifier for StubVerifier {
    async fn verify(&self, id_token: &str) -> ApiResult<VerifiedIdentity> {
        id_token
            .strip_prefix("good:")
            .map(|email| VerifiedIdentity {
                email: email.to_string(),
            })
            .ok_or(ApiError::InvalidToken)
    }
}

/// Keeps every link it was asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn last_token(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        sent.last()
            .and_then(|(_, link)| link.strip_prefix(RESET_URL))
            .map(str::to_string)
    }
}

#[async_trait]
impl ResetMailer for RecordingMailer {
    async fn send_reset(&self, to: &str, link: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("smtp relay unreachable");
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), link.to_string()));
        Ok(())
    }
}

pub fn test_state_with(secret: &str, mailer: Arc<RecordingMailer>) -> AppState {
    let db = Arc::new(Database::open_in_memory().unwrap());
    Arc::new(AppStateInner::new(
        db,
        secret,
        Arc::new(StubVerifier),
        mailer,
        RESET_URL,
    ))
}

pub fn test_state() -> AppState {
    test_state_with("test-secret", Arc::new(RecordingMailer::default()))
}

/// Seed the read-only dataset directly; the server never writes it.
pub fn seed_air(state: &AppStateInner, rows: &[(&str, &str, f64, [f64; 6])]) {
    state
        .db
        .with_conn_mut(|conn| {
            for (city, date, aqi, p) in rows {
                conn.execute(
                    "INSERT INTO air_quality (City, Date, AQI, PM25, PM10, NO2, SO2, CO, O3)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![city, date, aqi, p[0], p[1], p[2], p[3], p[4], p[5]],
                )?;
            }
            Ok(())
        })
        .unwrap();
}
