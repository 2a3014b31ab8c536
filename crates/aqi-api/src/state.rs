use std::sync::Arc;

use aqi_db::Database;

use crate::federated::IdentityVerifier;
use crate::mailer::ResetMailer;

pub type AppState = Arc<AppStateInner>;

/// Everything a request handler needs. Authenticator, credential store,
/// audit log, feedback tracker and settings store are all `impl` blocks on
/// this type, spread across their own modules.
pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub mailer: Arc<dyn ResetMailer>,
    /// Base URL the reset token is appended to, e.g.
    /// `https://aqi.example.com/reset?token=`.
    pub reset_url: String,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        jwt_secret: impl Into<String>,
        verifier: Arc<dyn IdentityVerifier>,
        mailer: Arc<dyn ResetMailer>,
        reset_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            jwt_secret: jwt_secret.into(),
            verifier,
            mailer,
            reset_url: reset_url.into(),
        }
    }
}
