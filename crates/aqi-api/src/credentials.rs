use aqi_types::api::{ProfileResponse, UserSummary};
use aqi_types::models::Role;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::parse_timestamp;
use crate::password::{
    hash_password, is_federated, validate_password, validate_username, verify_missing,
    verify_password,
};
use crate::state::AppStateInner;

pub const BOOTSTRAP_ADMIN: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Credential store. Role checks happen in the session authority before
/// any of these are reached.
impl AppStateInner {
    /// Hash and insert a new account. The raw password is never stored or logged.
    pub fn create_user(&self, username: &str, password: &str, role: Role) -> ApiResult<()> {
        validate_username(username)?;
        validate_password(password)?;

        let hash = hash_password(password)?;
        if !self.db.create_user(username, &hash, role)? {
            return Err(ApiError::AlreadyExists);
        }
        info!(username, %role, "User created");
        Ok(())
    }

    /// `Some(role)` only when the password matches the stored hash.
    pub fn verify_credentials(&self, username: &str, password: &str) -> ApiResult<Option<Role>> {
        let Some(user) = self.db.get_user(username)? else {
            verify_missing(password);
            return Ok(None);
        };
        if verify_password(password, &user.password) {
            Ok(Some(user.role))
        } else {
            Ok(None)
        }
    }

    /// Overwrite the password. Callers verify the old password first.
    pub fn update_password(&self, username: &str, new_password: &str) -> ApiResult<()> {
        validate_password(new_password)?;
        let hash = hash_password(new_password)?;
        if !self.db.update_password(username, &hash)? {
            return Err(ApiError::not_found(format!("user {}", username)));
        }
        Ok(())
    }

    pub fn update_role(&self, username: &str, role: Role) -> ApiResult<()> {
        if !self.db.update_role(username, role)? {
            return Err(ApiError::not_found(format!("user {}", username)));
        }
        Ok(())
    }

    /// Irreversible. Activity and feedback rows keep the username.
    pub fn delete_user(&self, username: &str) -> ApiResult<()> {
        if !self.db.delete_user(username)? {
            return Err(ApiError::not_found(format!("user {}", username)));
        }
        Ok(())
    }

    /// All-or-nothing bulk delete. Unknown names are skipped.
    pub fn delete_users(&self, usernames: &[String]) -> ApiResult<usize> {
        Ok(self.db.delete_users(usernames)?)
    }

    pub fn list_users(&self) -> ApiResult<Vec<UserSummary>> {
        let rows = self.db.list_users()?;
        Ok(rows
            .into_iter()
            .map(|u| UserSummary {
                created_at: parse_timestamp(&u.created_at),
                username: u.username,
                role: u.role,
                subscription: u.subscription,
            })
            .collect())
    }

    pub fn profile_image(&self, username: &str) -> ApiResult<Option<Vec<u8>>> {
        self.db
            .get_profile_image(username)?
            .ok_or_else(|| ApiError::not_found(format!("user {}", username)))
    }

    pub fn set_profile_image(&self, username: &str, image: &[u8]) -> ApiResult<()> {
        if !self.db.set_profile_image(username, image)? {
            return Err(ApiError::not_found(format!("user {}", username)));
        }
        Ok(())
    }

    pub fn set_subscription(&self, username: &str, subscribed: bool) -> ApiResult<()> {
        if !self.db.set_subscription(username, subscribed)? {
            return Err(ApiError::not_found(format!("user {}", username)));
        }
        Ok(())
    }

    pub fn profile(&self, username: &str) -> ApiResult<ProfileResponse> {
        let user = self
            .db
            .get_user(username)?
            .ok_or_else(|| ApiError::not_found(format!("user {}", username)))?;
        let image = self.profile_image(username)?;

        Ok(ProfileResponse {
            federated: is_federated(&user.password),
            profile_image: image.map(|bytes| B64.encode(bytes)),
            created_at: parse_timestamp(&user.created_at),
            username: user.username,
            role: user.role,
            subscription: user.subscription,
        })
    }

    /// Make sure at least one admin exists. Returns `true` if the bootstrap
    /// account was created or promoted.
    pub fn bootstrap_admin(&self, password: &str) -> ApiResult<bool> {
        if self.db.count_admins()? > 0 {
            return Ok(false);
        }

        match self.create_user(BOOTSTRAP_ADMIN, password, Role::Admin) {
            Ok(()) => {}
            Err(ApiError::AlreadyExists) => {
                // A regular user grabbed the name first; promote it rather
                // than leaving the store without an admin.
                warn!("Promoting existing '{}' account to admin", BOOTSTRAP_ADMIN);
                self.update_role(BOOTSTRAP_ADMIN, Role::Admin)?;
            }
            Err(e) => return Err(e),
        }
        self.record(BOOTSTRAP_ADMIN, "Bootstrap admin account created");
        warn!(
            "Created bootstrap admin '{}'. Change its password immediately.",
            BOOTSTRAP_ADMIN
        );
        Ok(true)
    }

    /// True while the bootstrap admin still accepts the built-in default password.
    pub fn default_admin_password_active(&self) -> ApiResult<bool> {
        Ok(self
            .verify_credentials(BOOTSTRAP_ADMIN, DEFAULT_ADMIN_PASSWORD)?
            .is_some())
    }
}
