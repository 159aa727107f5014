//! Application records and the notes-based idempotency ledger.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a job application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Draft,
    Applied,
    Interview,
    Offer,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Applied => "APPLIED",
            Self::Interview => "INTERVIEW",
            Self::Offer => "OFFER",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "APPLIED" => Ok(Self::Applied),
            "INTERVIEW" => Ok(Self::Interview),
            "OFFER" => Ok(Self::Offer),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(format!("unknown application status: '{other}'")),
        }
    }
}

/// Fingerprint tag recorded in `notes` for each processed message.
///
/// Presence of this tag is what makes email-derived effects idempotent:
/// it is checked before any effect is reapplied, independent of the
/// mailbox watermark.
pub fn fingerprint_tag(message_id: &str) -> String {
    format!("[GmailMessageId:{message_id}]")
}

/// A tracked job application.
///
/// The scanner's only write surface into this entity is: create a new record,
/// or move `status` forward and append to `notes`. Everything else is owned
/// by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub company: String,
    pub title: String,
    pub status: ApplicationStatus,
    pub location: Option<String>,
    pub deadline_at: Option<NaiveDate>,
    pub interview_at: Option<DateTime<Utc>>,
    /// Free-form notes; doubles as the idempotency ledger for email-derived effects.
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub applied_at: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationRecord {
    /// Build a record from an email-derived signal, with provenance and the
    /// message fingerprint seeded into `notes`.
    pub fn from_email(
        account_id: Uuid,
        company: &str,
        title: &str,
        status: ApplicationStatus,
        sender: &str,
        subject: &str,
        message_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let notes = format!(
            "[Auto-created from email on {}] Status: {status}\nSender: {sender}\nSubject: {subject}\n{}",
            now.date_naive(),
            fingerprint_tag(message_id),
        );
        Self {
            id: Uuid::new_v4(),
            account_id,
            company: company.to_string(),
            title: title.to_string(),
            status,
            location: None,
            deadline_at: None,
            interview_at: None,
            notes,
            created_at: now,
            // Only an initial-application signal establishes the applied date.
            applied_at: (status == ApplicationStatus::Applied).then(|| now.date_naive()),
            updated_at: now,
        }
    }

    /// Whether this message's effect has already been applied to the record.
    pub fn has_fingerprint(&self, message_id: &str) -> bool {
        self.notes.contains(&fingerprint_tag(message_id))
    }

    /// Transition status and append a dated ledger entry.
    pub fn apply_status(
        &mut self,
        status: ApplicationStatus,
        message_id: &str,
        now: DateTime<Utc>,
    ) {
        self.status = status;
        self.notes.push_str(&format!(
            "\n[Auto-update {}] Status: {status}\n{}",
            now.date_naive(),
            fingerprint_tag(message_id),
        ));
        self.updated_at = now;
    }
}
