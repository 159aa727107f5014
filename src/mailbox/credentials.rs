//! Credential resolution — per-account OAuth tokens with refresh-on-use.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GoogleConfig;
use crate::error::MailboxError;
use crate::model::Account;
use crate::store::Database;

/// A usable access token for one scan pass.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
}

/// Resolves a credential for an account, refreshing as needed.
///
/// A `MailboxError::Auth` return means the grant is gone for good — the
/// caller must disable the integration; anything else is retryable.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn resolve(&self, account: &Account) -> Result<Credential, MailboxError>;
}

/// OAuth2 refresh-token flow against Google's token endpoint.
///
/// Access tokens expire after about an hour, so every resolve attempts a
/// refresh first and persists the rotated token. A failed refresh that is not
/// an invalid grant falls back to the stored token, which may still work.
pub struct GoogleCredentialProvider {
    client: reqwest::Client,
    config: GoogleConfig,
    db: Arc<dyn Database>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GoogleCredentialProvider {
    pub fn new(config: GoogleConfig, db: Arc<dyn Database>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            db,
        }
    }

    async fn refresh(
        &self,
        account: &Account,
        refresh_token: &str,
    ) -> Result<String, MailboxError> {
        let response = self
            .client
            .post(&self.config.token_uri)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            let parsed: TokenResponse = serde_json::from_str(&body)
                .map_err(|e| MailboxError::Refresh(format!("bad token response: {e}")))?;
            return Ok(parsed.access_token);
        }

        // invalid_grant / 401 means the user revoked access or the refresh
        // token expired — terminal until they reconnect.
        if status.as_u16() == 401 || body.contains("invalid_grant") {
            return Err(MailboxError::Auth {
                account_id: account.id,
                reason: format!("refresh rejected with status {status}"),
            });
        }

        Err(MailboxError::Refresh(format!(
            "token endpoint returned {status}: {body}"
        )))
    }
}

#[async_trait]
impl CredentialProvider for GoogleCredentialProvider {
    async fn resolve(&self, account: &Account) -> Result<Credential, MailboxError> {
        let stored = account
            .google_access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MailboxError::Auth {
                account_id: account.id,
                reason: "no access token stored".into(),
            })?;

        let refresh_token = account
            .google_refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MailboxError::Auth {
                account_id: account.id,
                reason: "no refresh token stored".into(),
            })?;

        match self.refresh(account, refresh_token).await {
            Ok(access_token) => {
                if access_token != stored
                    && let Err(e) = self
                        .db
                        .update_google_access_token(account.id, &access_token)
                        .await
                {
                    warn!(account = %account.username, error = %e, "Failed to persist rotated access token");
                }
                debug!(account = %account.username, "Access token refreshed");
                Ok(Credential { access_token })
            }
            Err(auth @ MailboxError::Auth { .. }) => Err(auth),
            Err(e) => {
                // Transient refresh failure — the stored token may still be valid.
                warn!(account = %account.username, error = %e, "Token refresh failed, using stored token");
                Ok(Credential {
                    access_token: stored.to_string(),
                })
            }
        }
    }
}
