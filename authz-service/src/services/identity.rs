//! Identity provider client.
//!
//! Token verification is delegated entirely to the hosted identity provider;
//! this service never inspects token contents itself. The provider is an
//! injected dependency so tests can substitute a fake per-case.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::config::IdentityProviderConfig;

/// Verified caller identity as vouched for by the identity provider.
/// Ephemeral: derived per request, never persisted.
#[derive(Debug, Clone)]
pub struct Subject {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The provider rejected the token. Deliberately carries no distinction
    /// between malformed, expired, and bad-signature tokens.
    #[error("token rejected by identity provider")]
    InvalidToken,

    /// The provider could not be reached or answered garbage.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Verifies bearer tokens against the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Subject, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    email: Option<String>,
}

/// HTTP client for the hosted identity provider's user-info endpoint.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    user_info_url: String,
    api_key: String,
}

impl HttpIdentityProvider {
    pub fn new(config: &IdentityProviderConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            user_info_url: format!("{}/auth/v1/user", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Subject, IdentityError> {
        let response = self
            .client
            .get(&self.user_info_url)
            .bearer_auth(token)
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(IdentityError::InvalidToken);
        }
        if !status.is_success() {
            return Err(IdentityError::Unavailable(format!(
                "unexpected status {} from identity provider",
                status
            )));
        }

        let user: ProviderUser = response
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        // An empty or unparseable subject is treated the same as a rejected
        // token: there is no identity to act on.
        let id = user
            .id
            .parse::<Uuid>()
            .map_err(|_| IdentityError::InvalidToken)?;
        let email = match user.email {
            Some(email) if !email.is_empty() => email,
            _ => return Err(IdentityError::InvalidToken),
        };

        Ok(Subject { id, email })
    }
}
