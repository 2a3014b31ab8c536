use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};
use uuid::Uuid;

use aqi_db::models::Redemption;
use aqi_types::api::{
    ChangePasswordRequest, Claims, CompleteResetRequest, FederatedLoginRequest, LoginRequest,
    LoginResponse, PasswordResetRequest, PasswordResetResponse, RegisterRequest, ResetClaims,
    ResetDelivery,
};
use aqi_types::models::Role;

use crate::error::{ApiError, ApiResult};
use crate::password::{
    FEDERATED_PASSWORD, fingerprint, hash_password, is_federated, validate_password,
};
use crate::session::{Identity, Operation, Session};
use crate::state::{AppState, AppStateInner};

pub const SESSION_TTL_HOURS: i64 = 12;
pub const RESET_TTL_MINUTES: i64 = 15;
const RESET_PURPOSE: &str = "reset";
const SESSION_PURPOSE: &str = "session";

/// A freshly issued session token and who it belongs to.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session: Session,
    pub token: String,
}

impl IssuedSession {
    fn into_login_response(self) -> ApiResult<LoginResponse> {
        let Session::Authenticated(identity) = self.session else {
            return Err(ApiError::NotAuthenticated);
        };
        Ok(LoginResponse {
            username: identity.username,
            role: identity.role,
            token: self.token,
        })
    }
}

/// Authenticator.
impl AppStateInner {
    pub fn register(&self, username: &str, password: &str) -> ApiResult<IssuedSession> {
        self.create_user(username, password, Role::User)?;
        self.record(username, "Signed up");
        self.open_session(Identity::new(username, Role::User))
    }

    /// Unknown user and wrong password produce the same error.
    pub fn login_local(&self, username: &str, password: &str) -> ApiResult<IssuedSession> {
        let role = self
            .verify_credentials(username, password)?
            .ok_or(ApiError::InvalidCredentials)?;
        self.record(username, "Logged in");
        self.open_session(Identity::new(username, role))
    }

    /// Verify an external identity token, provisioning the account on first
    /// sight with a password that can never match. A local account that
    /// already holds the address is never entered this way.
    pub async fn login_federated(&self, id_token: &str) -> ApiResult<IssuedSession> {
        let verified = self.verifier.verify(id_token).await?;
        let username = verified.email;

        let user = match self.db.get_user(&username)? {
            Some(user) => user,
            None => {
                if self.db.create_user(&username, FEDERATED_PASSWORD, Role::User)? {
                    info!(username = %username, "Provisioned federated account");
                    self.record(&username, "Signed up via federated login");
                }
                // Lost a race with a concurrent first login: re-read the winner.
                self.db
                    .get_user(&username)?
                    .ok_or_else(|| ApiError::not_found(format!("user {}", username)))?
            }
        };

        if !is_federated(&user.password) {
            warn!(username = %username, "Federated login refused for a local account");
            return Err(ApiError::AlreadyExists);
        }

        self.record(&username, "Logged in via federated login");
        self.open_session(Identity::new(username, user.role))
    }

    fn open_session(&self, identity: Identity) -> ApiResult<IssuedSession> {
        let token = self.issue_session_token(&identity)?;
        let mut session = Session::default();
        session.login(identity);
        Ok(IssuedSession { session, token })
    }

    pub fn issue_session_token(&self, identity: &Identity) -> ApiResult<String> {
        let claims = Claims {
            sub: identity.username.clone(),
            role: identity.role,
            exp: (chrono::Utc::now() + chrono::Duration::hours(SESSION_TTL_HOURS)).timestamp()
                as usize,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(anyhow::Error::from)?;
        Ok(token)
    }

    /// Validate a session token and reload the account. The role comes from
    /// the store, so demotions and deletions apply on the next request.
    pub fn resume_session(&self, token: &str) -> ApiResult<(Session, Claims)> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ApiError::InvalidToken)?
        .claims;

        if self.db.is_token_spent(&claims.jti)? {
            return Err(ApiError::InvalidToken);
        }

        let user = self
            .db
            .get_user(&claims.sub)?
            .ok_or(ApiError::InvalidToken)?;

        Ok((Session::authenticated(user.username, user.role), claims))
    }

    /// Revoke the token behind this session.
    pub fn logout(&self, session: &mut Session, claims: &Claims) -> ApiResult<()> {
        let actor = session
            .authorize(Operation::Logout, false)
            .map(|identity| identity.username.clone())?;

        self.db
            .spend_token(&claims.jti, SESSION_PURPOSE, claims.exp as i64)?;
        self.record(&actor, "Logged out");
        session.logout();
        Ok(())
    }

    pub fn change_own_password(
        &self,
        actor: &Identity,
        current: &str,
        new_password: &str,
    ) -> ApiResult<()> {
        if self
            .verify_credentials(&actor.username, current)?
            .is_none()
        {
            return Err(ApiError::InvalidCredentials);
        }
        self.update_password(&actor.username, new_password)?;
        self.record(&actor.username, "Changed password");
        Ok(())
    }

    /// Signed, 15-minute, single-use token bound to the account's current
    /// password hash. `None` if there is no such account.
    pub fn issue_reset_token(&self, username: &str) -> ApiResult<Option<String>> {
        let Some(user) = self.db.get_user(username)? else {
            return Ok(None);
        };

        let claims = ResetClaims {
            sub: user.username,
            purpose: RESET_PURPOSE.to_string(),
            fp: fingerprint(&user.password),
            exp: (chrono::Utc::now() + chrono::Duration::minutes(RESET_TTL_MINUTES)).timestamp()
                as usize,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(anyhow::Error::from)?;
        Ok(Some(token))
    }

    /// Unknown addresses report `Sent` without sending anything.
    pub async fn request_password_reset(&self, email: &str) -> ApiResult<ResetDelivery> {
        let email = email.trim();
        let Some(token) = self.issue_reset_token(email)? else {
            info!("Password reset requested for unknown account");
            return Ok(ResetDelivery::Sent);
        };

        let link = format!("{}{}", self.reset_url, token);
        match self.mailer.send_reset(email, &link).await {
            Ok(()) => {
                self.record(email, "Requested password reset");
                Ok(ResetDelivery::Sent)
            }
            Err(e) => {
                warn!("Password reset delivery failed: {:#}", e);
                Ok(ResetDelivery::Failed)
            }
        }
    }

    pub fn complete_password_reset(&self, token: &str, new_password: &str) -> ApiResult<()> {
        validate_password(new_password)?;

        let claims = decode::<ResetClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ApiError::InvalidToken)?
        .claims;

        if claims.purpose != RESET_PURPOSE {
            return Err(ApiError::InvalidToken);
        }

        let user = self
            .db
            .get_user(&claims.sub)?
            .ok_or(ApiError::InvalidToken)?;
        if fingerprint(&user.password) != claims.fp {
            return Err(ApiError::InvalidToken);
        }

        let hash = hash_password(new_password)?;
        match self
            .db
            .redeem_reset_token(&claims.jti, claims.exp as i64, &claims.sub, &hash)?
        {
            Redemption::Redeemed => {
                self.record(&claims.sub, "Reset password");
                Ok(())
            }
            Redemption::AlreadySpent | Redemption::UnknownUser => Err(ApiError::InvalidToken),
        }
    }
}

// -- Handlers --

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let issued = state.register(req.username.trim(), &req.password)?;
    Ok((StatusCode::CREATED, Json(issued.into_login_response()?)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let issued = state.login_local(req.username.trim(), &req.password)?;
    Ok(Json(issued.into_login_response()?))
}

pub async fn federated_login(
    State(state): State<AppState>,
    Json(req): Json<FederatedLoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let issued = state.login_federated(&req.id_token).await?;
    Ok(Json(issued.into_login_response()?))
}

pub async fn request_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> ApiResult<impl IntoResponse> {
    let status = state.request_password_reset(&req.email).await?;
    Ok(Json(PasswordResetResponse { status }))
}

pub async fn complete_reset(
    State(state): State<AppState>,
    Json(req): Json<CompleteResetRequest>,
) -> ApiResult<impl IntoResponse> {
    state.complete_password_reset(&req.token, &req.new_password)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(mut session): Extension<Session>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    state.logout(&mut session, &claims)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = state.authorize(&session, Operation::ChangeOwnPassword)?;
    state.change_own_password(&actor, &req.current_password, &req.new_password)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingMailer, test_state, test_state_with};
    use std::sync::Arc;

    fn role_of(issued: &IssuedSession) -> Role {
        issued.session.identity().unwrap().role
    }

    #[test]
    fn signup_login_role_change_scenario() {
        let state = test_state();

        state.register("alice", "pw1-pass").unwrap();
        assert!(matches!(
            state.register("alice", "pw2-pass"),
            Err(ApiError::AlreadyExists)
        ));

        let issued = state.login_local("alice", "pw1-pass").unwrap();
        assert_eq!(role_of(&issued), Role::User);

        state.update_role("alice", Role::Admin).unwrap();
        let issued = state.login_local("alice", "pw1-pass").unwrap();
        assert_eq!(role_of(&issued), Role::Admin);
    }

    #[test]
    fn login_failures_are_indistinguishable() {
        let state = test_state();
        state.register("alice", "pw1-pass").unwrap();

        let unknown = state.login_local("nobody", "pw1-pass").unwrap_err();
        let wrong = state.login_local("alice", "wrong-pass").unwrap_err();
        assert!(matches!(unknown, ApiError::InvalidCredentials));
        assert!(matches!(wrong, ApiError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn session_tokens_roundtrip_and_follow_the_store() {
        let state = test_state();
        state.register("alice", "pw1-pass").unwrap();
        let issued = state.login_local("alice", "pw1-pass").unwrap();

        let (session, claims) = state.resume_session(&issued.token).unwrap();
        assert_eq!(session, Session::authenticated("alice", Role::User));
        assert_eq!(claims.sub, "alice");

        state.update_role("alice", Role::Admin).unwrap();
        let (session, _) = state.resume_session(&issued.token).unwrap();
        assert_eq!(session.identity().unwrap().role, Role::Admin);

        state.delete_user("alice").unwrap();
        assert!(matches!(
            state.resume_session(&issued.token),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn tampered_or_foreign_tokens_are_rejected() {
        let state = test_state();
        state.register("alice", "pw1-pass").unwrap();
        let issued = state.login_local("alice", "pw1-pass").unwrap();

        let mut tampered = issued.token.clone();
        tampered.push('x');
        assert!(state.resume_session(&tampered).is_err());

        let other = test_state_with("another-secret", Arc::new(RecordingMailer::default()));
        assert!(other.resume_session(&issued.token).is_err());

        // A reset token is not a session token.
        let reset = state.issue_reset_token("alice").unwrap().unwrap();
        assert!(state.resume_session(&reset).is_err());
    }

    #[test]
    fn logout_revokes_the_token() {
        let state = test_state();
        state.register("alice", "pw1-pass").unwrap();
        let issued = state.login_local("alice", "pw1-pass").unwrap();
        let (mut session, claims) = state.resume_session(&issued.token).unwrap();

        state.logout(&mut session, &claims).unwrap();
        assert_eq!(session, Session::Anonymous);
        assert!(matches!(
            state.resume_session(&issued.token),
            Err(ApiError::InvalidToken)
        ));
        assert_eq!(state.activity_log().unwrap()[0].action, "Logged out");
    }

    #[test]
    fn change_own_password_requires_current() {
        let state = test_state();
        state.register("alice", "pw1-pass").unwrap();
        let alice = Identity::new("alice", Role::User);

        assert!(matches!(
            state.change_own_password(&alice, "wrong-pass", "pw2-pass"),
            Err(ApiError::InvalidCredentials)
        ));
        state.change_own_password(&alice, "pw1-pass", "pw2-pass").unwrap();
        assert!(state.login_local("alice", "pw1-pass").is_err());
        assert!(state.login_local("alice", "pw2-pass").is_ok());
    }

    #[tokio::test]
    async fn federated_login_provisions_once() {
        let state = test_state();
        let first = state.login_federated("good:carol@example.com").await.unwrap();
        assert_eq!(role_of(&first), Role::User);
        let second = state.login_federated("good:carol@example.com").await.unwrap();
        assert_eq!(role_of(&second), Role::User);

        let users = state.list_users().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "carol@example.com");

        // No local password can open a federated account.
        assert!(matches!(
            state.login_local("carol@example.com", FEDERATED_PASSWORD),
            Err(ApiError::InvalidCredentials)
        ));

        assert!(matches!(
            state.login_federated("forged").await,
            Err(ApiError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn federated_login_cannot_enter_local_account() {
        let state = test_state();
        state.register("victim@example.com", "attacker-pw").unwrap();

        assert!(matches!(
            state.login_federated("good:victim@example.com").await,
            Err(ApiError::AlreadyExists)
        ));
        assert!(
            !state
                .activity_log()
                .unwrap()
                .iter()
                .any(|e| e.action == "Logged in via federated login")
        );
        assert_eq!(state.list_users().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn federated_login_keeps_existing_role() {
        let state = test_state();
        state.login_federated("good:dave@example.com").await.unwrap();
        state.update_role("dave@example.com", Role::Admin).unwrap();

        let issued = state.login_federated("good:dave@example.com").await.unwrap();
        assert_eq!(role_of(&issued), Role::Admin);
    }

    #[tokio::test]
    async fn reset_flow_is_single_use() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = test_state_with("test-secret", mailer.clone());
        state.register("erin@example.com", "old-pass").unwrap();

        let status = state.request_password_reset("erin@example.com").await.unwrap();
        assert_eq!(status, ResetDelivery::Sent);
        let token = mailer.last_token().unwrap();

        state.complete_password_reset(&token, "new-pass").unwrap();
        assert!(state.login_local("erin@example.com", "old-pass").is_err());
        assert!(state.login_local("erin@example.com", "new-pass").is_ok());

        assert!(matches!(
            state.complete_password_reset(&token, "third-pass"),
            Err(ApiError::InvalidToken)
        ));
        assert!(state.login_local("erin@example.com", "new-pass").is_ok());
    }

    #[tokio::test]
    async fn reset_token_dies_when_password_changes() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = test_state_with("test-secret", mailer.clone());
        state.register("erin@example.com", "old-pass").unwrap();
        state.request_password_reset("erin@example.com").await.unwrap();
        let token = mailer.last_token().unwrap();

        state.update_password("erin@example.com", "changed-pass").unwrap();
        assert!(matches!(
            state.complete_password_reset(&token, "new-pass"),
            Err(ApiError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn unknown_address_reports_sent_without_mail() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = test_state_with("test-secret", mailer.clone());

        let status = state.request_password_reset("nobody@example.com").await.unwrap();
        assert_eq!(status, ResetDelivery::Sent);
        assert!(mailer.last_token().is_none());
    }

    #[tokio::test]
    async fn mailer_failure_reports_failed() {
        let mailer = Arc::new(RecordingMailer::failing());
        let state = test_state_with("test-secret", mailer);
        state.register("erin@example.com", "old-pass").unwrap();

        let status = state.request_password_reset("erin@example.com").await.unwrap();
        assert_eq!(status, ResetDelivery::Failed);
    }

    #[test]
    fn expired_reset_token_is_rejected() {
        let state = test_state();
        state.register("alice", "pw1-pass").unwrap();
        let user = state.db.get_user("alice").unwrap().unwrap();

        let claims = ResetClaims {
            sub: "alice".into(),
            purpose: RESET_PURPOSE.into(),
            fp: fingerprint(&user.password),
            exp: (chrono::Utc::now() - chrono::Duration::hours(1)).timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            state.complete_password_reset(&token, "new-pass"),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn session_token_cannot_reset_password() {
        let state = test_state();
        let issued = state.register("alice", "pw1-pass").unwrap();
        assert!(matches!(
            state.complete_password_reset(&issued.token, "new-pass"),
            Err(ApiError::InvalidToken)
        ));
    }
}
