use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use aqi_types::api::SubscriptionRequest;

use crate::error::{ApiError, ApiResult};
use crate::session::{Operation, Session};
use crate::state::AppState;

pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;
const ALLOWED_IMAGE_TYPES: [&str; 2] = ["image/png", "image/jpeg"];

/// Content types accepted for uploads; the payload itself is stored as-is.
fn image_type(headers: &HeaderMap) -> ApiResult<&'static str> {
    let raw = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .unwrap_or_default();

    ALLOWED_IMAGE_TYPES
        .into_iter()
        .find(|t| *t == raw)
        .ok_or_else(|| ApiError::invalid_input("profile image must be PNG or JPEG"))
}

/// PNG and JPEG magic bytes.
fn sniff_image_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else {
        "image/png"
    }
}

pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.authorize(&session, Operation::ViewData)?;
    Ok(Json(state.profile(&actor.username)?))
}

pub async fn get_avatar(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.authorize(&session, Operation::ViewData)?;
    let image = state
        .profile_image(&actor.username)?
        .ok_or_else(|| ApiError::not_found("profile image"))?;

    Ok(([(header::CONTENT_TYPE, sniff_image_type(&image))], image))
}

pub async fn put_avatar(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let actor = state.authorize(&session, Operation::EditOwnProfile)?;
    image_type(&headers)?;
    if body.is_empty() {
        return Err(ApiError::invalid_input("empty upload"));
    }
    if body.len() > MAX_AVATAR_BYTES {
        return Err(ApiError::invalid_input("profile image too large"));
    }

    state.set_profile_image(&actor.username, &body)?;
    state.record(&actor.username, "Updated profile picture");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn put_subscription(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<SubscriptionRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.authorize(&session, Operation::EditOwnProfile)?;
    state.set_subscription(&actor.username, req.subscribed)?;
    state.record(
        &actor.username,
        if req.subscribed {
            "Subscribed to AQI alerts"
        } else {
            "Unsubscribed from AQI alerts"
        },
    );
    Ok(StatusCode::NO_CONTENT)
}
