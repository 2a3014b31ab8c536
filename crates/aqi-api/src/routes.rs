use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};

use crate::profile::MAX_AVATAR_BYTES;
use crate::session::require_auth;
use crate::state::AppState;
use crate::{admin, air, audit, auth, feedback, profile, settings};

/// Every HTTP route. Public routes carry no session; everything else goes
/// through `require_auth` and is gated per operation inside the handler.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/federated", post(auth::federated_login))
        .route("/auth/reset/request", post(auth::request_reset))
        .route("/auth/reset/complete", post(auth::complete_reset))
        .route("/status", get(settings::get_status));

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/me", get(profile::me))
        .route("/me/password", post(auth::change_password))
        .route(
            "/me/avatar",
            get(profile::get_avatar)
                .put(profile::put_avatar)
                .layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 1)),
        )
        .route("/me/subscription", put(profile::put_subscription))
        .route("/feedback", post(feedback::submit).get(feedback::list))
        .route("/air/cities", get(air::cities))
        .route("/air/records", get(air::records))
        .route("/air/summary", get(air::summary))
        .route("/air/predict", post(air::predict))
        .route("/air/forecast", get(air::forecast))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/delete", post(admin::delete_users))
        .route("/admin/users/{username}", delete(admin::delete_user))
        .route("/admin/users/{username}/role", put(admin::update_role))
        .route("/admin/feedback/resolve", post(feedback::resolve))
        .route("/admin/feedback/{id}/activity", get(audit::feedback_activity))
        .route("/admin/logs", get(audit::list_logs).delete(audit::clear_logs))
        .route("/admin/logs/export", get(audit::export_logs))
        .route("/admin/maintenance", put(settings::put_maintenance))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
