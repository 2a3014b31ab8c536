use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use aqi_db::models::FeedbackRow;
use aqi_types::api::{
    FeedbackQuery, FeedbackResponse, ResolveFeedbackRequest, ResolveFeedbackResponse,
    SubmitFeedbackRequest,
};
use aqi_types::models::{IssueType, StatusFilter};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::parse_timestamp;
use crate::session::{Identity, Operation, Session};
use crate::state::{AppState, AppStateInner};

const MAX_DESCRIPTION_LEN: usize = 2000;

fn to_response(row: FeedbackRow) -> FeedbackResponse {
    FeedbackResponse {
        timestamp: parse_timestamp(&row.timestamp),
        id: row.id,
        username: row.username,
        city: row.city,
        issue_type: row.issue_type,
        description: row.description,
        status: row.status,
    }
}

/// Feedback tracker.
impl AppStateInner {
    pub fn submit_feedback(
        &self,
        actor: &Identity,
        city: &str,
        issue_type: IssueType,
        description: Option<&str>,
    ) -> ApiResult<FeedbackResponse> {
        let city = city.trim();
        if city.is_empty() {
            return Err(ApiError::invalid_input("city is required"));
        }
        let description = description.map(str::trim).filter(|d| !d.is_empty());
        if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN) {
            return Err(ApiError::invalid_input(format!(
                "description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }

        let id = self
            .db
            .insert_feedback(&actor.username, city, issue_type, description)?;
        self.record(
            &actor.username,
            &format!("Submitted feedback #{} ({}, {})", id, issue_type, city),
        );

        let row = self
            .db
            .get_feedback(id)?
            .ok_or_else(|| ApiError::not_found(format!("feedback {}", id)))?;
        Ok(to_response(row))
    }

    /// Admins see every report; everyone else only their own.
    pub fn list_feedback(
        &self,
        actor: &Identity,
        filter: StatusFilter,
    ) -> ApiResult<Vec<FeedbackResponse>> {
        let author = (!actor.is_admin()).then_some(actor.username.as_str());
        let rows = self.db.list_feedback(filter.status(), author)?;
        Ok(rows.into_iter().map(to_response).collect())
    }

    /// One atomic update over every listed id; returns how many flipped.
    pub fn resolve_feedback(&self, actor: &Identity, ids: &[i64]) -> ApiResult<usize> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let resolved = self.db.resolve_feedback(&ids)?;
        if resolved > 0 {
            info!(by = %actor.username, resolved, "Feedback resolved");
            self.record(
                &actor.username,
                &format!("Resolved {} feedback report(s)", resolved),
            );
        }
        Ok(resolved)
    }
}

// -- Handlers --

pub async fn submit(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<SubmitFeedbackRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.authorize(&session, Operation::SubmitFeedback)?;
    let created =
        state.submit_feedback(&actor, &req.city, req.issue_type, req.description.as_deref())?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<FeedbackQuery>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.authorize(&session, Operation::ViewData)?;
    Ok(Json(state.list_feedback(&actor, query.status)?))
}

pub async fn resolve(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<ResolveFeedbackRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.authorize(&session, Operation::ResolveFeedback)?;
    let resolved = state.resolve_feedback(&actor, &req.ids)?;
    Ok(Json(ResolveFeedbackResponse { resolved }))
}
