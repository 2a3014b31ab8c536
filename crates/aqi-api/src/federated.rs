use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::{ApiError, ApiResult};

pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// An identity vouched for by an external provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: String,
}

/// Verifies a federated login token. Implementations must return
/// `ApiError::InvalidToken` for any token the provider does not accept.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> ApiResult<VerifiedIdentity>;
}

/// Used when no provider is configured: every token is rejected.
pub struct DisabledVerifier;

#[async_trait]
impl IdentityVerifier for DisabledVerifier {
    async fn verify(&self, _id_token: &str) -> ApiResult<VerifiedIdentity> {
        Err(ApiError::InvalidToken)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenInfo {
    aud: Option<String>,
    email: Option<String>,
    email_verified: Option<String>,
}

/// Google ID token verification through the public `tokeninfo` endpoint.
pub struct GoogleVerifier {
    client: reqwest::Client,
    client_id: String,
    endpoint: String,
}

impl GoogleVerifier {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            endpoint: GOOGLE_TOKENINFO_URL.to_string(),
        }
    }
}

#[async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify(&self, id_token: &str) -> ApiResult<VerifiedIdentity> {
        if id_token.is_empty() {
            return Err(ApiError::InvalidToken);
        }

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| ApiError::Internal(e.into()))?;

        if !resp.status().is_success() {
            warn!("Identity provider rejected token ({})", resp.status());
            return Err(ApiError::InvalidToken);
        }

        let info: TokenInfo = resp.json().await.map_err(|_| ApiError::InvalidToken)?;
        check_token_info(info, &self.client_id)
    }
}

pub(crate) fn check_token_info(info: TokenInfo, client_id: &str) -> ApiResult<VerifiedIdentity> {
    if info.aud.as_deref() != Some(client_id) {
        warn!("Federated token issued for a different audience");
        return Err(ApiError::InvalidToken);
    }
    if info.email_verified.as_deref() != Some("true") {
        return Err(ApiError::InvalidToken);
    }
    let email = info
        .email
        .filter(|e| !e.is_empty())
        .ok_or(ApiError::InvalidToken)?;
    Ok(VerifiedIdentity {
        email: email.to_lowercase(),
    })
}
