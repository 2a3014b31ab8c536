use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use aqi_types::api::Claims;
use aqi_types::models::Role;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, AppStateInner};

/// The actor behind a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Session state machine: `Anonymous <-> Authenticated`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated(Identity),
}

/// What a session may actually do once maintenance mode is applied.
#[derive(Debug, PartialEq, Eq)]
pub enum Access<'a> {
    Anonymous,
    /// Maintenance is on and the actor is not an admin.
    Blocked(&'a Identity),
    Granted(&'a Identity),
}

/// Operations the authority knows how to gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ViewData,
    SubmitFeedback,
    ChangeOwnPassword,
    EditOwnProfile,
    ViewMaintenanceNotice,
    Logout,
    ManageUsers,
    ChangeRole,
    ToggleMaintenance,
    ResolveFeedback,
    ViewAllFeedback,
    ViewLogs,
    ExportLogs,
    ClearLogs,
}

impl Operation {
    pub fn admin_only(self) -> bool {
        matches!(
            self,
            Self::ManageUsers
                | Self::ChangeRole
                | Self::ToggleMaintenance
                | Self::ResolveFeedback
                | Self::ViewAllFeedback
                | Self::ViewLogs
                | Self::ExportLogs
                | Self::ClearLogs
        )
    }

    /// Allowed for blocked sessions during maintenance.
    fn allowed_during_maintenance(self) -> bool {
        matches!(self, Self::ViewMaintenanceNotice | Self::Logout)
    }
}

impl Session {
    pub fn authenticated(username: impl Into<String>, role: Role) -> Self {
        Self::Authenticated(Identity::new(username, role))
    }

    pub fn login(&mut self, identity: Identity) {
        *self = Self::Authenticated(identity);
    }

    pub fn logout(&mut self) {
        *self = Self::Anonymous;
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(identity) => Some(identity),
        }
    }

    pub fn access(&self, maintenance: bool) -> Access<'_> {
        match self {
            Self::Anonymous => Access::Anonymous,
            Self::Authenticated(identity) if maintenance && !identity.is_admin() => {
                Access::Blocked(identity)
            }
            Self::Authenticated(identity) => Access::Granted(identity),
        }
    }

    pub fn authorize(&self, op: Operation, maintenance: bool) -> ApiResult<&Identity> {
        let identity = match self.access(maintenance) {
            Access::Anonymous => return Err(ApiError::NotAuthenticated),
            Access::Blocked(identity) if op.allowed_during_maintenance() => identity,
            Access::Blocked(_) => return Err(ApiError::Maintenance),
            Access::Granted(identity) => identity,
        };

        if op.admin_only() && !identity.is_admin() {
            return Err(ApiError::NotAuthorized);
        }
        Ok(identity)
    }
}

impl AppStateInner {
    /// Gate an operation, reading the maintenance flag for this request.
    pub fn authorize(&self, session: &Session, op: Operation) -> ApiResult<Identity> {
        let maintenance = self.maintenance_enabled()?;
        session.authorize(op, maintenance).cloned()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Resolve the bearer token into a `Session` and its `Claims`, both stored
/// as request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(ApiError::NotAuthenticated)?;
    let (session, claims) = state.resume_session(token)?;

    req.extensions_mut().insert(session);
    req.extensions_mut().insert::<Claims>(claims);
    Ok(next.run(req).await)
}
