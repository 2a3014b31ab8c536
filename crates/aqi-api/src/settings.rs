use axum::{Extension, Json, extract::State, response::IntoResponse};
use aqi_types::api::{MaintenanceRequest, StatusResponse};
use tracing::info;

use crate::error::ApiResult;
use crate::session::{Identity, Operation, Session};
use crate::state::{AppState, AppStateInner};

pub const MAINTENANCE_KEY: &str = "maintenance_mode";
pub const MAINTENANCE_NOTICE: &str =
    "The dashboard is temporarily under maintenance. Please check back soon.";

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

impl AppStateInner {
    pub fn setting_or(&self, key: &str, default: &str) -> ApiResult<String> {
        Ok(self
            .db
            .get_setting(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn set_setting(&self, key: &str, value: &str) -> ApiResult<()> {
        self.db.set_setting(key, value)?;
        Ok(())
    }

    /// Missing or unreadable values mean "off".
    pub fn maintenance_enabled(&self) -> ApiResult<bool> {
        let raw = self.setting_or(MAINTENANCE_KEY, "false")?;
        Ok(parse_flag(&raw).unwrap_or(false))
    }

    pub fn set_maintenance(&self, actor: &Identity, enabled: bool) -> ApiResult<()> {
        self.set_setting(MAINTENANCE_KEY, if enabled { "true" } else { "false" })?;
        info!(by = %actor.username, enabled, "Maintenance mode changed");
        self.record(
            &actor.username,
            if enabled {
                "Enabled maintenance mode"
            } else {
                "Disabled maintenance mode"
            },
        );
        Ok(())
    }

    pub fn status(&self) -> ApiResult<StatusResponse> {
        let maintenance = self.maintenance_enabled()?;
        Ok(StatusResponse {
            maintenance,
            notice: maintenance.then(|| MAINTENANCE_NOTICE.to_string()),
        })
    }
}

// -- Handlers --

pub async fn get_status(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.status()?))
}

pub async fn put_maintenance(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<MaintenanceRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.authorize(&session, Operation::ToggleMaintenance)?;
    state.set_maintenance(&actor, req.enabled)?;
    Ok(Json(state.status()?))
}
