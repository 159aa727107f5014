//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. A single connection is
//! reused for all operations; `libsql::Connection` is safe for concurrent
//! async use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{Account, ApplicationRecord, Reminder, ReminderKind};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn db_err<E: std::fmt::Display>(e: E) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Serialization(format!("bad uuid '{s}': {e}")))
}

fn opt_string(row: &libsql::Row, idx: i32) -> Option<String> {
    row.get::<String>(idx).ok().filter(|s| !s.is_empty())
}

const ACCOUNT_COLUMNS: &str = "id, username, email, google_access_token, google_refresh_token, \
     gmail_enabled, calendar_enabled, timezone, last_seen_at, created_at";

fn row_to_account(row: &libsql::Row) -> Result<Account, DatabaseError> {
    Ok(Account {
        id: parse_uuid(&row.get::<String>(0).map_err(db_err)?)?,
        username: row.get::<String>(1).map_err(db_err)?,
        email: row.get::<String>(2).map_err(db_err)?,
        google_access_token: opt_string(row, 3),
        google_refresh_token: opt_string(row, 4),
        gmail_enabled: row.get::<i64>(5).map_err(db_err)? != 0,
        calendar_enabled: row.get::<i64>(6).map_err(db_err)? != 0,
        timezone: row.get::<String>(7).map_err(db_err)?,
        last_seen_at: parse_datetime(&row.get::<String>(8).map_err(db_err)?),
        created_at: parse_datetime(&row.get::<String>(9).map_err(db_err)?),
    })
}

const APPLICATION_COLUMNS: &str = "id, account_id, company, title, status, location, deadline_at, \
     interview_at, notes, created_at, applied_at, updated_at";

fn row_to_application(row: &libsql::Row) -> Result<ApplicationRecord, DatabaseError> {
    Ok(ApplicationRecord {
        id: parse_uuid(&row.get::<String>(0).map_err(db_err)?)?,
        account_id: parse_uuid(&row.get::<String>(1).map_err(db_err)?)?,
        company: row.get::<String>(2).map_err(db_err)?,
        title: row.get::<String>(3).map_err(db_err)?,
        status: row
            .get::<String>(4)
            .map_err(db_err)?
            .parse()
            .map_err(DatabaseError::Serialization)?,
        location: opt_string(row, 5),
        deadline_at: opt_string(row, 6).and_then(|s| s.parse::<NaiveDate>().ok()),
        interview_at: opt_string(row, 7).map(|s| parse_datetime(&s)),
        notes: row.get::<String>(8).map_err(db_err)?,
        created_at: parse_datetime(&row.get::<String>(9).map_err(db_err)?),
        applied_at: opt_string(row, 10).and_then(|s| s.parse::<NaiveDate>().ok()),
        updated_at: parse_datetime(&row.get::<String>(11).map_err(db_err)?),
    })
}

const REMINDER_COLUMNS: &str = "id, account_id, application_id, kind, title, notes, trigger_at, \
     start_time, end_time, color, calendar_event_id, created_at";

fn row_to_reminder(row: &libsql::Row) -> Result<Reminder, DatabaseError> {
    Ok(Reminder {
        id: parse_uuid(&row.get::<String>(0).map_err(db_err)?)?,
        account_id: parse_uuid(&row.get::<String>(1).map_err(db_err)?)?,
        application_id: parse_uuid(&row.get::<String>(2).map_err(db_err)?)?,
        kind: row
            .get::<String>(3)
            .map_err(db_err)?
            .parse()
            .map_err(DatabaseError::Serialization)?,
        title: row.get::<String>(4).map_err(db_err)?,
        notes: row.get::<String>(5).map_err(db_err)?,
        trigger_at: row
            .get::<String>(6)
            .map_err(db_err)?
            .parse::<NaiveDate>()
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
        start_time: opt_string(row, 7),
        end_time: opt_string(row, 8),
        color: row.get::<String>(9).map_err(db_err)?,
        calendar_event_id: opt_string(row, 10),
        created_at: parse_datetime(&row.get::<String>(11).map_err(db_err)?),
    })
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Accounts ────────────────────────────────────────────────────

    async fn insert_account(&self, account: &Account) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO accounts (id, username, email, google_access_token, \
                 google_refresh_token, gmail_enabled, calendar_enabled, timezone, \
                 last_seen_at, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    account.id.to_string(),
                    account.username.clone(),
                    account.email.clone(),
                    account.google_access_token.clone(),
                    account.google_refresh_token.clone(),
                    account.gmail_enabled as i64,
                    account.calendar_enabled as i64,
                    account.timezone.clone(),
                    account.last_seen_at.to_rfc3339(),
                    account.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_scan_eligible_accounts(&self) -> Result<Vec<Account>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts \
                     WHERE gmail_enabled = 1 \
                       AND google_access_token IS NOT NULL \
                       AND google_access_token != ''"
                ),
                (),
            )
            .await
            .map_err(db_err)?;

        let mut accounts = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            accounts.push(row_to_account(&row)?);
        }
        Ok(accounts)
    }

    async fn update_google_access_token(
        &self,
        id: Uuid,
        access_token: &str,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE accounts SET google_access_token = ?2 WHERE id = ?1",
                params![id.to_string(), access_token],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn disable_gmail_integration(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE accounts SET google_access_token = NULL, \
                 google_refresh_token = NULL, gmail_enabled = 0 WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // ── Applications ────────────────────────────────────────────────

    async fn insert_application(&self, app: &ApplicationRecord) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO applications (id, account_id, company, title, status, location, \
                 deadline_at, interview_at, notes, created_at, applied_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    app.id.to_string(),
                    app.account_id.to_string(),
                    app.company.clone(),
                    app.title.clone(),
                    app.status.as_str(),
                    app.location.clone(),
                    app.deadline_at.map(|d| d.to_string()),
                    app.interview_at.map(|t| t.to_rfc3339()),
                    app.notes.clone(),
                    app.created_at.to_rfc3339(),
                    app.applied_at.map(|d| d.to_string()),
                    app.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_application(&self, app: &ApplicationRecord) -> Result<(), DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE applications SET company = ?2, title = ?3, status = ?4, location = ?5, \
                 deadline_at = ?6, interview_at = ?7, notes = ?8, applied_at = ?9, \
                 updated_at = ?10 WHERE id = ?1",
                params![
                    app.id.to_string(),
                    app.company.clone(),
                    app.title.clone(),
                    app.status.as_str(),
                    app.location.clone(),
                    app.deadline_at.map(|d| d.to_string()),
                    app.interview_at.map(|t| t.to_rfc3339()),
                    app.notes.clone(),
                    app.applied_at.map(|d| d.to_string()),
                    app.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "application".into(),
                id: app.id.to_string(),
            });
        }
        Ok(())
    }

    async fn find_application(
        &self,
        account_id: Uuid,
        company: &str,
        title: &str,
    ) -> Result<Option<ApplicationRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {APPLICATION_COLUMNS} FROM applications \
                     WHERE account_id = ?1 \
                       AND company = ?2 COLLATE NOCASE \
                       AND title = ?3 COLLATE NOCASE \
                     ORDER BY created_at LIMIT 1"
                ),
                params![account_id.to_string(), company, title],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_application(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_applications_by_company(
        &self,
        account_id: Uuid,
        company: &str,
    ) -> Result<Vec<ApplicationRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {APPLICATION_COLUMNS} FROM applications \
                     WHERE account_id = ?1 AND company = ?2 COLLATE NOCASE \
                     ORDER BY created_at"
                ),
                params![account_id.to_string(), company],
            )
            .await
            .map_err(db_err)?;

        let mut apps = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            apps.push(row_to_application(&row)?);
        }
        Ok(apps)
    }

    async fn list_applications(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ApplicationRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {APPLICATION_COLUMNS} FROM applications \
                     WHERE account_id = ?1 ORDER BY created_at"
                ),
                params![account_id.to_string()],
            )
            .await
            .map_err(db_err)?;

        let mut apps = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            apps.push(row_to_application(&row)?);
        }
        Ok(apps)
    }

    // ── Mailbox sync state ──────────────────────────────────────────

    async fn load_sync_marker(&self, account_id: Uuid) -> Result<i64, DatabaseError> {
        // Atomic get-or-create: racing loaders both land on the same row.
        self.conn()
            .execute(
                "INSERT INTO mailbox_sync_state (account_id, last_processed_internal_ms) \
                 VALUES (?1, 0) ON CONFLICT(account_id) DO NOTHING",
                params![account_id.to_string()],
            )
            .await
            .map_err(db_err)?;

        let mut rows = self
            .conn()
            .query(
                "SELECT last_processed_internal_ms FROM mailbox_sync_state WHERE account_id = ?1",
                params![account_id.to_string()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => row.get::<i64>(0).map_err(db_err),
            None => Err(DatabaseError::NotFound {
                entity: "mailbox_sync_state".into(),
                id: account_id.to_string(),
            }),
        }
    }

    async fn advance_sync_marker(
        &self,
        account_id: Uuid,
        marker: i64,
    ) -> Result<bool, DatabaseError> {
        // Guarded update keeps the marker monotonically non-decreasing.
        let changed = self
            .conn()
            .execute(
                "UPDATE mailbox_sync_state \
                 SET last_processed_internal_ms = ?2, updated_at = datetime('now') \
                 WHERE account_id = ?1 AND last_processed_internal_ms < ?2",
                params![account_id.to_string(), marker],
            )
            .await
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    // ── Reminders ───────────────────────────────────────────────────

    async fn upsert_reminder(&self, reminder: &Reminder) -> Result<Uuid, DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO reminders (id, account_id, application_id, kind, title, notes, \
                 trigger_at, start_time, end_time, color, calendar_event_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
                 ON CONFLICT(application_id, kind) DO UPDATE SET \
                 title = excluded.title, notes = excluded.notes, \
                 trigger_at = excluded.trigger_at, start_time = excluded.start_time, \
                 end_time = excluded.end_time, color = excluded.color",
                params![
                    reminder.id.to_string(),
                    reminder.account_id.to_string(),
                    reminder.application_id.to_string(),
                    reminder.kind.as_str(),
                    reminder.title.clone(),
                    reminder.notes.clone(),
                    reminder.trigger_at.to_string(),
                    reminder.start_time.clone(),
                    reminder.end_time.clone(),
                    reminder.color.clone(),
                    reminder.calendar_event_id.clone(),
                    reminder.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;

        // Return the canonical row id — the pre-existing one on conflict.
        let mut rows = self
            .conn()
            .query(
                "SELECT id FROM reminders WHERE application_id = ?1 AND kind = ?2",
                params![reminder.application_id.to_string(), reminder.kind.as_str()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => parse_uuid(&row.get::<String>(0).map_err(db_err)?),
            None => Err(DatabaseError::NotFound {
                entity: "reminder".into(),
                id: reminder.id.to_string(),
            }),
        }
    }

    async fn find_reminder(
        &self,
        application_id: Uuid,
        kind: ReminderKind,
    ) -> Result<Option<Reminder>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {REMINDER_COLUMNS} FROM reminders \
                     WHERE application_id = ?1 AND kind = ?2"
                ),
                params![application_id.to_string(), kind.as_str()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_reminder(&row)?)),
            None => Ok(None),
        }
    }

    async fn set_reminder_calendar_event(
        &self,
        id: Uuid,
        event_id: &str,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE reminders SET calendar_event_id = ?2 WHERE id = ?1",
                params![id.to_string(), event_id],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
