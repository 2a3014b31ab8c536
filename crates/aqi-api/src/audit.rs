use axum::{
    Extension, Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use aqi_db::models::ActivityRow;
use aqi_types::api::ActivityEntry;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::parse_timestamp;
use crate::session::{Identity, Operation, Session};
use crate::state::{AppState, AppStateInner};

fn to_entry(row: ActivityRow) -> ActivityEntry {
    ActivityEntry {
        timestamp: parse_timestamp(&row.timestamp),
        id: row.id,
        username: row.username,
        action: row.action,
    }
}

impl AppStateInner {
    /// Append to the activity log. Failures are logged and dropped so the
    /// action that triggered them still succeeds.
    pub fn record(&self, username: &str, action: &str) {
        if let Err(e) = self.db.insert_activity(username, action) {
            warn!("Activity log write failed for {}: {:#}", username, e);
        }
    }

    /// Newest first.
    pub fn activity_log(&self) -> ApiResult<Vec<ActivityEntry>> {
        let rows = self.db.list_activity()?;
        Ok(rows.into_iter().map(to_entry).collect())
    }

    pub fn activity_for_feedback(&self, feedback_id: i64) -> ApiResult<Option<ActivityEntry>> {
        if self.db.get_feedback(feedback_id)?.is_none() {
            return Err(ApiError::not_found(format!("feedback {}", feedback_id)));
        }
        Ok(self.db.activity_for_feedback(feedback_id)?.map(to_entry))
    }

    pub fn export_activity_csv(&self, actor: &Identity) -> ApiResult<String> {
        let entries = self.activity_log()?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(["id", "username", "action", "timestamp"])
            .map_err(anyhow::Error::from)?;
        for entry in &entries {
            writer
                .write_record([
                    entry.id.to_string(),
                    entry.username.clone(),
                    entry.action.clone(),
                    entry.timestamp.to_rfc3339(),
                ])
                .map_err(anyhow::Error::from)?;
        }
        let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("{}", e))?;
        let csv = String::from_utf8(bytes).map_err(anyhow::Error::from)?;

        self.record(&actor.username, "Exported activity logs");
        Ok(csv)
    }

    /// Full-table clear. The clear itself is the first entry afterwards.
    pub fn clear_activity_log(&self, actor: &Identity) -> ApiResult<usize> {
        let removed = self.db.clear_activity()?;
        info!(by = %actor.username, removed, "Activity log cleared");
        self.record(
            &actor.username,
            &format!("Cleared activity logs ({} entries)", removed),
        );
        Ok(removed)
    }
}

// -- Handlers --

pub async fn list_logs(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    state.authorize(&session, Operation::ViewLogs)?;
    Ok(Json(state.activity_log()?))
}

pub async fn export_logs(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.authorize(&session, Operation::ExportLogs)?;
    let csv = state.export_activity_csv(&actor)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"activity_logs.csv\"",
            ),
        ],
        csv,
    ))
}

pub async fn clear_logs(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.authorize(&session, Operation::ClearLogs)?;
    let removed = state.clear_activity_log(&actor)?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

pub async fn feedback_activity(
    State(state): State<AppState>,
    Path(feedback_id): Path<i64>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    state.authorize(&session, Operation::ViewLogs)?;
    Ok(Json(state.activity_for_feedback(feedback_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_state;
    use aqi_types::models::{IssueType, Role};

    #[test]
    fn records_append_newest_first() {
        let state = test_state();
        for i in 0..3 {
            state.record("alice", &format!("step {}", i));
        }
        let log = state.activity_log().unwrap();
        let actions: Vec<&str> = log.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["step 2", "step 1", "step 0"]);
    }

    #[test]
    fn csv_export_has_header_and_rows() {
        let state = test_state();
        state.record("alice", "Logged in, then out");
        let admin = Identity::new("root", Role::Admin);

        let csv = state.export_activity_csv(&admin).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("id,username,action,timestamp"));
        let row = lines.next().unwrap();
        assert!(row.contains("\"Logged in, then out\""));

        // The export itself is audited after the snapshot was taken.
        assert_eq!(state.activity_log().unwrap()[0].action, "Exported activity logs");
    }

    #[test]
    fn clear_leaves_only_the_clear_entry() {
        let state = test_state();
        state.record("alice", "a");
        state.record("bob", "b");
        let admin = Identity::new("root", Role::Admin);

        assert_eq!(state.clear_activity_log(&admin).unwrap(), 2);
        let log = state.activity_log().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, "Cleared activity logs (2 entries)");
    }

    #[test]
    fn feedback_association_requires_existing_feedback() {
        let state = test_state();
        assert!(matches!(
            state.activity_for_feedback(42),
            Err(ApiError::NotFound(_))
        ));

        state.record("alice", "Logged in");
        let alice = Identity::new("alice", Role::User);
        let fb = state
            .submit_feedback(&alice, "Delhi", IssueType::IncorrectData, None)
            .unwrap();
        state.record("alice", "Viewed dashboard after submitting");

        let entry = state.activity_for_feedback(fb.id).unwrap().unwrap();
        assert_eq!(entry.username, "alice");
        assert_eq!(entry.action, "Logged in");
    }
}
