//! Reconciliation engine — one bounded scan pass per account.
//!
//! A pass pulls a small batch of unread job-related messages, classifies each
//! into a lifecycle signal, extracts company/title, and applies the result to
//! the account's application records exactly once. Idempotency rests on the
//! fingerprint ledger inside record notes, not on the watermark: a message
//! can be fetched and classified yet fail to persist, and the ledger check
//! tolerates the replay regardless of watermark state.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DatabaseError, MailboxError, ScanError};
use crate::llm::FallbackExtractor;
use crate::mailbox::{Credential, CredentialProvider, JOB_MAIL_QUERY, MailMessage, MailboxClient};
use crate::model::{Account, ApplicationRecord, ApplicationStatus};
use crate::parser::{Extraction, classify, extract};
use crate::reminders::AutoReminderService;
use crate::store::Database;

/// Title stored when extraction fails but creation proceeds anyway.
const TITLE_NOT_SPECIFIED: &str = "Position Not Specified";

/// What happened to a single message during a pass. One bad message must not
/// abort the batch, so every per-message path collapses into a value here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// A new application record was created.
    Created { application_id: Uuid },
    /// An existing record transitioned to a new status.
    Updated {
        application_id: Uuid,
        status: ApplicationStatus,
    },
    /// A record matched but already carries this status.
    Unchanged { application_id: Uuid },
    /// The fingerprint is already in the ledger.
    AlreadyProcessed,
    /// No lifecycle signal in the text; left unread, no record touched.
    NoSignal,
    /// Signal found, no matching record, and no usable company name —
    /// creation refused to avoid junk records.
    NoCompany,
    /// Fetch or persistence fault; the message is retried next tick.
    Failed { reason: String },
}

/// Summary of one scan pass for an account.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Per-message outcomes, in mailbox return order.
    pub outcomes: Vec<(String, MessageOutcome)>,
    /// New watermark, when the pass saw something newer.
    pub marker_advanced_to: Option<i64>,
}

impl ScanReport {
    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Created { .. }))
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Updated { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&MessageOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Scans one account's mailbox and reconciles what it finds.
pub struct ScanEngine {
    db: Arc<dyn Database>,
    mailbox: Arc<dyn MailboxClient>,
    credentials: Arc<dyn CredentialProvider>,
    fallback: Arc<dyn FallbackExtractor>,
    reminders: Arc<AutoReminderService>,
    batch_size: u32,
}

impl ScanEngine {
    pub fn new(
        db: Arc<dyn Database>,
        mailbox: Arc<dyn MailboxClient>,
        credentials: Arc<dyn CredentialProvider>,
        fallback: Arc<dyn FallbackExtractor>,
        reminders: Arc<AutoReminderService>,
        batch_size: u32,
    ) -> Self {
        Self {
            db,
            mailbox,
            credentials,
            fallback,
            reminders,
            batch_size,
        }
    }

    /// Run one scan pass for an account.
    ///
    /// An authorization failure disables the integration and returns
    /// `ScanError::AuthRevoked`; any other error aborts the pass with the
    /// watermark untouched so the same messages are retried next tick.
    pub async fn scan_account(&self, account: &Account) -> Result<ScanReport, ScanError> {
        let credential = match self.credentials.resolve(account).await {
            Ok(c) => c,
            Err(MailboxError::Auth { reason, .. }) => {
                warn!(
                    account = %account.username,
                    reason = %reason,
                    "Authorization revoked — disabling mailbox integration"
                );
                self.db.disable_gmail_integration(account.id).await?;
                return Err(ScanError::AuthRevoked {
                    account_id: account.id,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let last_processed = self.db.load_sync_marker(account.id).await?;
        let mut max_seen = last_processed;

        let ids = self
            .mailbox
            .search(&credential, JOB_MAIL_QUERY, self.batch_size)
            .await?;

        let mut report = ScanReport::default();
        if ids.is_empty() {
            debug!(account = %account.username, "No matching unread messages");
            return Ok(report);
        }

        for message_id in &ids {
            let outcome = self
                .process_message(account, &credential, message_id, &mut max_seen)
                .await;
            match &outcome {
                MessageOutcome::Failed { reason } => {
                    warn!(account = %account.username, message = %message_id, reason = %reason, "Message processing failed");
                }
                other => {
                    debug!(account = %account.username, message = %message_id, outcome = ?other, "Message processed");
                }
            }
            report.outcomes.push((message_id.clone(), outcome));
        }

        if max_seen > last_processed && self.db.advance_sync_marker(account.id, max_seen).await? {
            report.marker_advanced_to = Some(max_seen);
        }

        info!(
            account = %account.username,
            messages = report.outcomes.len(),
            created = report.created(),
            updated = report.updated(),
            failed = report.failed(),
            "Scan pass complete"
        );
        Ok(report)
    }

    /// Process a single message. Never propagates an error — every fault
    /// becomes an outcome so the rest of the batch still runs.
    async fn process_message(
        &self,
        account: &Account,
        credential: &Credential,
        message_id: &str,
        max_seen: &mut i64,
    ) -> MessageOutcome {
        let message = match self.mailbox.fetch(credential, message_id).await {
            Ok(m) => m,
            Err(e) => {
                return MessageOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        // Every fetched message counts toward the watermark, whatever
        // happens to it below — the ledger carries the idempotency.
        if message.internal_ms > *max_seen {
            *max_seen = message.internal_ms;
        }

        match self.already_processed(account.id, &message.id).await {
            Ok(true) => return MessageOutcome::AlreadyProcessed,
            Ok(false) => {}
            // The ledger could not be read; do not risk a duplicate apply.
            Err(e) => {
                return MessageOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        }

        let Some(status) = classify(&message.subject, &message.body) else {
            return MessageOutcome::NoSignal;
        };

        let extraction = self.extract_fields(&message).await;
        debug!(
            company = %extraction.company,
            title = %extraction.title,
            status = %status,
            "Message classified"
        );

        match self.reconcile(account, &message, status, &extraction).await {
            Ok(outcome) => outcome,
            Err(e) => MessageOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// Scan the account's records for the message fingerprint.
    async fn already_processed(
        &self,
        account_id: Uuid,
        message_id: &str,
    ) -> Result<bool, DatabaseError> {
        let apps = self.db.list_applications(account_id).await?;
        Ok(apps.iter().any(|app| app.has_fingerprint(message_id)))
    }

    /// Regex extraction, escalating to the fallback extractor for whichever
    /// fields are still at their sentinel. The fallback never downgrades a
    /// successfully extracted field.
    async fn extract_fields(&self, message: &MailMessage) -> Extraction {
        let mut extraction = extract(&message.sender, &message.subject, &message.body);

        if (!extraction.company_known() || !extraction.title_known()) && self.fallback.available() {
            debug!(message = %message.id, "Regex extraction incomplete, consulting fallback");
            let (company, title) = self
                .fallback
                .extract(&message.sender, &message.subject, &message.body)
                .await;
            if !extraction.company_known()
                && let Some(company) = company
            {
                extraction.company = company;
            }
            if !extraction.title_known()
                && let Some(title) = title
            {
                extraction.title = title;
            }
        }

        extraction
    }

    /// Map the classified signal onto the record store: update a matching
    /// record's status, or create a new record when none matches.
    async fn reconcile(
        &self,
        account: &Account,
        message: &MailMessage,
        status: ApplicationStatus,
        extraction: &Extraction,
    ) -> Result<MessageOutcome, DatabaseError> {
        let mut record = self
            .db
            .find_application(account.id, &extraction.company, &extraction.title)
            .await?;

        // Looser fallback: a thread's title often drifts across an email
        // chain while the company stays stable.
        if record.is_none() {
            record = self
                .db
                .find_applications_by_company(account.id, &extraction.company)
                .await?
                .into_iter()
                .next();
            if record.is_some() {
                debug!(
                    company = %extraction.company,
                    "No exact title match — using first record for company"
                );
            }
        }

        match record {
            Some(mut app) => {
                if app.status == status {
                    return Ok(MessageOutcome::Unchanged {
                        application_id: app.id,
                    });
                }
                if app.has_fingerprint(&message.id) {
                    return Ok(MessageOutcome::AlreadyProcessed);
                }

                info!(
                    company = %app.company,
                    title = %app.title,
                    from = %app.status,
                    to = %status,
                    "Transitioning application status"
                );
                app.apply_status(status, &message.id, Utc::now());
                self.db.update_application(&app).await?;
                self.reminders.sync_application(account, &app).await;
                Ok(MessageOutcome::Updated {
                    application_id: app.id,
                    status,
                })
            }
            None => {
                if !extraction.company_known() {
                    debug!(
                        sender = %message.sender,
                        subject = %message.subject,
                        "Refusing to create record without a company name"
                    );
                    return Ok(MessageOutcome::NoCompany);
                }

                let title = if extraction.title_known() {
                    extraction.title.as_str()
                } else {
                    TITLE_NOT_SPECIFIED
                };
                let app = ApplicationRecord::from_email(
                    account.id,
                    &extraction.company,
                    title,
                    status,
                    &message.sender,
                    &message.subject,
                    &message.id,
                    Utc::now(),
                );
                self.db.insert_application(&app).await?;
                info!(
                    company = %app.company,
                    title = %app.title,
                    status = %status,
                    "Created application from email"
                );
                self.reminders.sync_application(account, &app).await;
                Ok(MessageOutcome::Created {
                    application_id: app.id,
                })
            }
        }
    }
}
