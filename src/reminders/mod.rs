//! Auto-generated reminders and the calendar notification sink.
//!
//! When the scanner creates or updates an application that carries a deadline
//! or interview time, one reminder per kind is upserted and pushed to the
//! calendar sink. Nothing in here may fail reconciliation: every fault is
//! logged and swallowed.

pub mod calendar;

pub use calendar::{CalendarSink, GoogleCalendarSink, NoopCalendarSink};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::model::{Account, ApplicationRecord, Reminder};
use crate::store::Database;

/// Derives reminders from application records and mirrors them to a calendar.
pub struct AutoReminderService {
    db: Arc<dyn Database>,
    sink: Arc<dyn CalendarSink>,
}

impl AutoReminderService {
    pub fn new(db: Arc<dyn Database>, sink: Arc<dyn CalendarSink>) -> Self {
        Self { db, sink }
    }

    /// Upsert reminders for whatever dates the record carries and push each
    /// to the calendar sink when the account's calendar integration is on.
    pub async fn sync_application(&self, account: &Account, app: &ApplicationRecord) {
        if let Some(deadline) = app.deadline_at {
            self.sync_one(account, Reminder::deadline(app, deadline)).await;
        }
        if let Some(interview_at) = app.interview_at {
            self.sync_one(account, Reminder::interview(app, interview_at))
                .await;
        }
    }

    async fn sync_one(&self, account: &Account, reminder: Reminder) {
        let kind = reminder.kind;
        let id = match self.db.upsert_reminder(&reminder).await {
            Ok(id) => id,
            Err(e) => {
                warn!(kind = %kind, error = %e, "Failed to store reminder");
                return;
            }
        };
        debug!(kind = %kind, reminder = %id, "Reminder stored");

        if !account.calendar_enabled || account.google_access_token.is_none() {
            return;
        }

        match self.sink.push(account, &reminder).await {
            Ok(Some(event_id)) => {
                info!(kind = %kind, event = %event_id, "Reminder synced to calendar");
                if let Err(e) = self.db.set_reminder_calendar_event(id, &event_id).await {
                    warn!(reminder = %id, error = %e, "Failed to record calendar event id");
                }
            }
            Ok(None) => {}
            Err(e) => {
                // The reminder still exists locally; the sink is best-effort.
                warn!(kind = %kind, error = %e, "Calendar sync failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::model::{ApplicationStatus, ReminderKind};
    use crate::reminders::calendar::CalendarError;
    use crate::store::LibSqlBackend;

    /// Sink that records pushes and can be told to fail.
    struct RecordingSink {
        fail: bool,
        pushed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CalendarSink for RecordingSink {
        async fn push(
            &self,
            _account: &Account,
            reminder: &Reminder,
        ) -> Result<Option<String>, CalendarError> {
            if self.fail {
                return Err(CalendarError::Api {
                    status: 500,
                    message: "boom".into(),
                });
            }
            self.pushed.lock().unwrap().push(reminder.title.clone());
            Ok(Some(format!("evt-{}", reminder.kind)))
        }
    }

    async fn setup() -> (Arc<LibSqlBackend>, Account, ApplicationRecord) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let mut account = Account::new("alice", "alice@example.com");
        account.calendar_enabled = true;
        account.google_access_token = Some("token".into());
        db.insert_account(&account).await.unwrap();

        let mut app = ApplicationRecord::from_email(
            account.id,
            "Google",
            "Software Engineer",
            ApplicationStatus::Interview,
            "hr@google.com",
            "Interview",
            "m1",
            Utc::now(),
        );
        app.deadline_at = NaiveDate::from_ymd_opt(2026, 3, 1);
        db.insert_application(&app).await.unwrap();
        (db, account, app)
    }

    #[tokio::test]
    async fn reminders_are_stored_and_pushed() {
        let (db, account, app) = setup().await;
        let sink = Arc::new(RecordingSink {
            fail: false,
            pushed: Mutex::new(Vec::new()),
        });
        let service = AutoReminderService::new(db.clone(), sink.clone());

        service.sync_application(&account, &app).await;

        assert_eq!(sink.pushed.lock().unwrap().len(), 1);
        let stored = db
            .find_reminder(app.id, ReminderKind::Deadline)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.calendar_event_id.as_deref(), Some("evt-DEADLINE"));
    }

    #[tokio::test]
    async fn sink_failure_keeps_local_reminder() {
        let (db, account, app) = setup().await;
        let sink = Arc::new(RecordingSink {
            fail: true,
            pushed: Mutex::new(Vec::new()),
        });
        let service = AutoReminderService::new(db.clone(), sink);

        // Must not panic or propagate.
        service.sync_application(&account, &app).await;

        let stored = db
            .find_reminder(app.id, ReminderKind::Deadline)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.calendar_event_id.is_none());
    }

    #[tokio::test]
    async fn calendar_disabled_skips_sink() {
        let (db, mut account, app) = setup().await;
        account.calendar_enabled = false;
        let sink = Arc::new(RecordingSink {
            fail: false,
            pushed: Mutex::new(Vec::new()),
        });
        let service = AutoReminderService::new(db.clone(), sink.clone());

        service.sync_application(&account, &app).await;

        assert!(sink.pushed.lock().unwrap().is_empty());
        // Stored locally all the same.
        assert!(
            db.find_reminder(app.id, ReminderKind::Deadline)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn syncing_twice_does_not_duplicate() {
        let (db, account, app) = setup().await;
        let sink = Arc::new(RecordingSink {
            fail: false,
            pushed: Mutex::new(Vec::new()),
        });
        let service = AutoReminderService::new(db.clone(), sink);

        service.sync_application(&account, &app).await;
        service.sync_application(&account, &app).await;

        let stored = db
            .find_reminder(app.id, ReminderKind::Deadline)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.kind, ReminderKind::Deadline);
        // Upsert keyed by (application, kind) — still a single row, same id.
        let again = db
            .find_reminder(app.id, ReminderKind::Deadline)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, again.id);
    }

    #[tokio::test]
    async fn record_without_dates_creates_nothing() {
        let (db, account, mut app) = setup().await;
        app.deadline_at = None;
        let sink = Arc::new(RecordingSink {
            fail: false,
            pushed: Mutex::new(Vec::new()),
        });
        let service = AutoReminderService::new(db.clone(), sink);

        service.sync_application(&account, &app).await;

        assert!(
            db.find_reminder(app.id, ReminderKind::Deadline)
                .await
                .unwrap()
                .is_none()
        );
    }
}
