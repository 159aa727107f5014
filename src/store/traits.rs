//! Unified `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{Account, ApplicationRecord, Reminder, ReminderKind};

/// Backend-agnostic database trait covering accounts, applications,
/// mailbox sync state, and reminders.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Accounts ────────────────────────────────────────────────────

    async fn insert_account(&self, account: &Account) -> Result<(), DatabaseError>;

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, DatabaseError>;

    /// Accounts whose mailbox integration is on and that have tokens stored.
    async fn list_scan_eligible_accounts(&self) -> Result<Vec<Account>, DatabaseError>;

    /// Persist a rotated access token after a refresh.
    async fn update_google_access_token(
        &self,
        id: Uuid,
        access_token: &str,
    ) -> Result<(), DatabaseError>;

    /// Clear tokens and turn the integration off. Terminal until the user
    /// re-authorizes through the host application.
    async fn disable_gmail_integration(&self, id: Uuid) -> Result<(), DatabaseError>;

    // ── Applications ────────────────────────────────────────────────

    async fn insert_application(&self, app: &ApplicationRecord) -> Result<(), DatabaseError>;

    async fn update_application(&self, app: &ApplicationRecord) -> Result<(), DatabaseError>;

    /// Exact `(account, company, title)` match, case-insensitive.
    async fn find_application(
        &self,
        account_id: Uuid,
        company: &str,
        title: &str,
    ) -> Result<Option<ApplicationRecord>, DatabaseError>;

    /// All of an account's applications at one company, oldest first.
    async fn find_applications_by_company(
        &self,
        account_id: Uuid,
        company: &str,
    ) -> Result<Vec<ApplicationRecord>, DatabaseError>;

    /// All of an account's applications — used for the fingerprint ledger scan.
    async fn list_applications(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ApplicationRecord>, DatabaseError>;

    // ── Mailbox sync state ──────────────────────────────────────────

    /// Current watermark for an account, creating a zero-marker row on first
    /// access. The get-or-create is atomic per account.
    async fn load_sync_marker(&self, account_id: Uuid) -> Result<i64, DatabaseError>;

    /// Advance the watermark, only if `marker` exceeds the stored value.
    /// Returns whether the row changed.
    async fn advance_sync_marker(
        &self,
        account_id: Uuid,
        marker: i64,
    ) -> Result<bool, DatabaseError>;

    // ── Reminders ───────────────────────────────────────────────────

    /// Insert or refresh the reminder for `(application, kind)`. Returns the
    /// id of the stored row (the existing one on conflict).
    async fn upsert_reminder(&self, reminder: &Reminder) -> Result<Uuid, DatabaseError>;

    async fn find_reminder(
        &self,
        application_id: Uuid,
        kind: ReminderKind,
    ) -> Result<Option<Reminder>, DatabaseError>;

    /// Record the calendar event id after a successful sink push.
    async fn set_reminder_calendar_event(
        &self,
        id: Uuid,
        event_id: &str,
    ) -> Result<(), DatabaseError>;
}
