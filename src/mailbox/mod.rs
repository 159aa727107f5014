//! Mailbox access — traits and message types for inbox scanning.
//!
//! Adapters here are pure I/O. Classification, extraction, and reconciliation
//! live in `scanner::engine`.

pub mod credentials;
pub mod gmail;

pub use credentials::{Credential, CredentialProvider, GoogleCredentialProvider};
pub use gmail::GmailClient;

use async_trait::async_trait;

use crate::error::MailboxError;

/// Fixed search filter for job-related unread mail. The mailbox matches the
/// keywords against subject and body.
pub const JOB_MAIL_QUERY: &str =
    "is:unread (application OR job OR interview OR offer OR rejected OR position OR role OR hiring)";

/// A fetched message with its text content flattened out of the MIME tree.
#[derive(Debug, Clone)]
pub struct MailMessage {
    /// Mailbox-unique id — persisted only as the idempotency fingerprint.
    pub id: String,
    /// Mailbox-assigned receive timestamp, epoch milliseconds. Drives the
    /// per-account sync watermark.
    pub internal_ms: i64,
    pub sender: String,
    pub subject: String,
    pub body: String,
}

/// Read-only mailbox operations used by a scan pass.
#[async_trait]
pub trait MailboxClient: Send + Sync {
    /// List message ids matching `query`, newest first, up to `max_results`.
    async fn search(
        &self,
        credential: &Credential,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<String>, MailboxError>;

    /// Fetch one message's headers and text body.
    async fn fetch(
        &self,
        credential: &Credential,
        message_id: &str,
    ) -> Result<MailMessage, MailboxError>;
}
