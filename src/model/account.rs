//! Mailbox owner accounts and their Google integration state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A mailbox owner. The scanner only reads the Google integration fields;
/// the rest of the row belongs to the CRUD side of the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Short-lived OAuth access token. Rotated by the credential provider.
    pub google_access_token: Option<String>,
    /// Long-lived OAuth refresh token. Cleared when the grant is revoked.
    pub google_refresh_token: Option<String>,
    /// Per-account integration flag — persisted, survives restarts.
    pub gmail_enabled: bool,
    pub calendar_enabled: bool,
    pub timezone: String,
    /// Last time the host application saw this user.
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create an account with the integration disconnected.
    pub fn new(username: &str, email: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            google_access_token: None,
            google_refresh_token: None,
            gmail_enabled: false,
            calendar_enabled: false,
            timezone: "UTC".to_string(),
            last_seen_at: now,
            created_at: now,
        }
    }

    /// Whether this account can be scanned at all: integration on and a token present.
    pub fn scan_eligible(&self) -> bool {
        self.gmail_enabled
            && self
                .google_access_token
                .as_deref()
                .is_some_and(|t| !t.is_empty())
    }

    /// Whether the account was seen by the host application within `window`.
    pub fn active_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.last_seen_at > now - window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_is_not_eligible() {
        let account = Account::new("alice", "alice@example.com");
        assert!(!account.scan_eligible());
    }

    #[test]
    fn eligible_requires_flag_and_token() {
        let mut account = Account::new("alice", "alice@example.com");
        account.gmail_enabled = true;
        assert!(!account.scan_eligible());

        account.google_access_token = Some(String::new());
        assert!(!account.scan_eligible());

        account.google_access_token = Some("ya29.token".into());
        assert!(account.scan_eligible());
    }

    #[test]
    fn active_within_window() {
        let mut account = Account::new("bob", "bob@example.com");
        let now = Utc::now();
        account.last_seen_at = now - Duration::seconds(60);
        assert!(account.active_within(Duration::seconds(300), now));
        assert!(!account.active_within(Duration::seconds(30), now));
    }
}
