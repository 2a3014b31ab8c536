use std::sync::LazyLock;

use anyhow::anyhow;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Stored in place of a hash for accounts created through federated login.
/// It is not a PHC string, so no password can ever verify against it.
pub const FEDERATED_PASSWORD: &str = "!federated";

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 64;

/// Verified against when the account doesn't exist, so a miss costs one
/// argon2 run like a wrong password does.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no-such-account").ok());

#[cfg(not(test))]
fn hasher() -> Argon2<'static> {
    Argon2::default()
}

// Cheap parameters so the test suite doesn't spend seconds per hash.
#[cfg(test)]
fn hasher() -> Argon2<'static> {
    let params = argon2::Params::new(1024, 1, 1, None).expect("valid test params");
    Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params)
}

/// Hash with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| anyhow!("Salt encoding failed: {}", e))?;
    let hash = hasher()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// Constant-time verification via argon2. Anything that isn't a valid PHC
/// string (including the federated sentinel) simply fails.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Burn one verification for a username that has no account.
pub fn verify_missing(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

pub fn is_federated(stored: &str) -> bool {
    stored == FEDERATED_PASSWORD
}

/// Short fingerprint of a stored hash, embedded in reset tokens.
pub fn fingerprint(stored: &str) -> String {
    let digest = Sha256::digest(stored.as_bytes());
    hex::encode(&digest[..8])
}

pub fn validate_username(username: &str) -> ApiResult<()> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(ApiError::invalid_input(format!(
            "username must be {}-{} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    if username.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ApiError::invalid_input("username must not contain whitespace"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid_input(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
