use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use aqi_types::api::{DeleteUsersRequest, DeleteUsersResponse, UpdateRoleRequest};
use aqi_types::models::Role;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::session::{Identity, Operation, Session};
use crate::state::{AppState, AppStateInner};

/// Admin user management, audited. Deleting a user leaves their activity
/// and feedback rows in place.
impl AppStateInner {
    pub fn admin_delete_user(&self, actor: &Identity, username: &str) -> ApiResult<()> {
        if actor.username == username {
            return Err(ApiError::invalid_input("admins cannot delete themselves"));
        }
        self.delete_user(username)?;
        info!(by = %actor.username, username, "User deleted");
        self.record(&actor.username, &format!("Deleted user {}", username));
        Ok(())
    }

    pub fn admin_delete_users(&self, actor: &Identity, usernames: &[String]) -> ApiResult<usize> {
        if usernames.iter().any(|u| *u == actor.username) {
            return Err(ApiError::invalid_input("admins cannot delete themselves"));
        }
        let deleted = self.delete_users(usernames)?;
        if deleted > 0 {
            info!(by = %actor.username, deleted, "Users deleted");
            self.record(
                &actor.username,
                &format!("Deleted {} user(s): {}", deleted, usernames.join(", ")),
            );
        }
        Ok(deleted)
    }

    pub fn admin_update_role(&self, actor: &Identity, username: &str, role: Role) -> ApiResult<()> {
        if actor.username == username && role != Role::Admin {
            return Err(ApiError::invalid_input("admins cannot demote themselves"));
        }
        self.update_role(username, role)?;
        info!(by = %actor.username, username, %role, "Role changed");
        self.record(
            &actor.username,
            &format!("Changed role of {} to {}", username, role),
        );
        Ok(())
    }
}

// -- Handlers --

pub async fn list_users(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    state.authorize(&session, Operation::ManageUsers)?;
    Ok(Json(state.list_users()?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.authorize(&session, Operation::ManageUsers)?;
    state.admin_delete_user(&actor, &username)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_users(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<DeleteUsersRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.authorize(&session, Operation::ManageUsers)?;
    let deleted = state.admin_delete_users(&actor, &req.usernames)?;
    Ok(Json(DeleteUsersResponse { deleted }))
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(session): Extension<Session>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.authorize(&session, Operation::ChangeRole)?;
    state.admin_update_role(&actor, &username, req.role)?;
    Ok(StatusCode::NO_CONTENT)
}
