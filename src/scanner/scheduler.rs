//! Scan scheduler — fixed-interval fan-out over eligible accounts.
//!
//! Each tick enumerates accounts with the integration connected, filters to
//! recently active ones, and spawns one independent pass per account.
//! Passes for different accounts run concurrently; passes for the same
//! account are serialized — a tick simply skips an account whose previous
//! pass is still in flight, because concurrent passes could race the
//! idempotency check against record creation.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ScannerConfig;
use crate::error::ScanError;
use crate::scanner::ScanEngine;
use crate::store::Database;

/// Spawn the background scan loop.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop scanning.
pub fn spawn_scan_scheduler(
    engine: Arc<ScanEngine>,
    db: Arc<dyn Database>,
    config: ScannerConfig,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    let in_flight = Arc::new(Mutex::new(HashSet::new()));

    let handle = tokio::spawn(async move {
        info!(
            interval_secs = config.scan_interval_secs,
            batch_size = config.batch_size,
            "Mailbox scan scheduler started"
        );

        let mut tick = tokio::time::interval(Duration::from_secs(config.scan_interval_secs));

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Mailbox scan scheduler shutting down");
                return;
            }

            // Passes run detached; overlap is handled by the in-flight set.
            let _ = tick_once(&engine, &db, &config, &in_flight).await;
        }
    });

    (handle, shutdown_flag)
}

/// Run one scheduler tick: enumerate eligible accounts and spawn a pass per
/// account. Returns the spawned handles so tests can await completion.
pub(crate) async fn tick_once(
    engine: &Arc<ScanEngine>,
    db: &Arc<dyn Database>,
    config: &ScannerConfig,
    in_flight: &Arc<Mutex<HashSet<Uuid>>>,
) -> Vec<JoinHandle<()>> {
    let accounts = match db.list_scan_eligible_accounts().await {
        Ok(accounts) => accounts,
        Err(e) => {
            error!(error = %e, "Failed to enumerate accounts for scan tick");
            return Vec::new();
        }
    };

    let window = chrono::Duration::seconds(config.active_window_secs);
    let now = chrono::Utc::now();
    let mut handles = Vec::new();

    for account in accounts {
        if !account.active_within(window, now) {
            debug!(account = %account.username, "Skipping inactive account");
            continue;
        }

        // Serialize per account: skip if the previous pass is still running.
        if !in_flight.lock().await.insert(account.id) {
            debug!(account = %account.username, "Previous pass still in flight — skipping tick");
            continue;
        }

        let engine = Arc::clone(engine);
        let in_flight = Arc::clone(in_flight);
        handles.push(tokio::spawn(async move {
            match engine.scan_account(&account).await {
                Ok(report) if !report.outcomes.is_empty() => {
                    debug!(
                        account = %account.username,
                        messages = report.outcomes.len(),
                        "Pass finished"
                    );
                }
                Ok(_) => {}
                Err(ScanError::AuthRevoked { .. }) => {
                    warn!(
                        account = %account.username,
                        "Pass aborted: authorization revoked, user must reconnect"
                    );
                }
                Err(e) => {
                    error!(account = %account.username, error = %e, "Pass failed");
                }
            }
            in_flight.lock().await.remove(&account.id);
        }));
    }

    handles
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::error::MailboxError;
    use crate::llm::DisabledExtractor;
    use crate::mailbox::{Credential, CredentialProvider, MailMessage, MailboxClient};
    use crate::model::Account;
    use crate::reminders::{AutoReminderService, NoopCalendarSink};
    use crate::store::LibSqlBackend;

    /// Mailbox that blocks fetches until released — simulates a slow pass.
    struct SlowMailbox {
        gate: Arc<tokio::sync::Semaphore>,
    }

    #[async_trait]
    impl MailboxClient for SlowMailbox {
        async fn search(
            &self,
            _credential: &Credential,
            _query: &str,
            _max_results: u32,
        ) -> Result<Vec<String>, MailboxError> {
            let _permit = self.gate.acquire().await.unwrap();
            Ok(Vec::new())
        }

        async fn fetch(
            &self,
            _credential: &Credential,
            message_id: &str,
        ) -> Result<MailMessage, MailboxError> {
            Err(MailboxError::Fetch {
                message_id: message_id.to_string(),
                reason: "unused".into(),
            })
        }
    }

    struct OkCredentials;

    #[async_trait]
    impl CredentialProvider for OkCredentials {
        async fn resolve(&self, _account: &Account) -> Result<Credential, MailboxError> {
            Ok(Credential {
                access_token: "token".into(),
            })
        }
    }

    async fn setup(
        gate: Arc<tokio::sync::Semaphore>,
    ) -> (Arc<ScanEngine>, Arc<dyn Database>, ScannerConfig) {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let reminders = Arc::new(AutoReminderService::new(
            db.clone(),
            Arc::new(NoopCalendarSink),
        ));
        let engine = Arc::new(ScanEngine::new(
            db.clone(),
            Arc::new(SlowMailbox { gate }),
            Arc::new(OkCredentials),
            Arc::new(DisabledExtractor),
            reminders,
            5,
        ));
        (engine, db, ScannerConfig::default())
    }

    fn connected(username: &str) -> Account {
        let mut account = Account::new(username, &format!("{username}@example.com"));
        account.gmail_enabled = true;
        account.google_access_token = Some("access".into());
        account.google_refresh_token = Some("refresh".into());
        account
    }

    #[tokio::test]
    async fn tick_scans_active_eligible_accounts() {
        let gate = Arc::new(tokio::sync::Semaphore::new(10));
        let (engine, db, config) = setup(gate).await;

        db.insert_account(&connected("alice")).await.unwrap();
        db.insert_account(&connected("bob")).await.unwrap();

        let in_flight = Arc::new(Mutex::new(HashSet::new()));
        let handles = tick_once(&engine, &db, &config, &in_flight).await;
        assert_eq!(handles.len(), 2);

        for result in futures::future::join_all(handles).await {
            result.unwrap();
        }
        assert!(in_flight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn tick_skips_inactive_accounts() {
        let gate = Arc::new(tokio::sync::Semaphore::new(10));
        let (engine, db, config) = setup(gate).await;

        let mut stale = connected("stale");
        stale.last_seen_at = Utc::now() - chrono::Duration::hours(2);
        db.insert_account(&stale).await.unwrap();
        db.insert_account(&connected("fresh")).await.unwrap();

        let in_flight = Arc::new(Mutex::new(HashSet::new()));
        let handles = tick_once(&engine, &db, &config, &in_flight).await;
        assert_eq!(handles.len(), 1);
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn tick_skips_disconnected_accounts() {
        let gate = Arc::new(tokio::sync::Semaphore::new(10));
        let (engine, db, config) = setup(gate).await;

        db.insert_account(&Account::new("nobody", "n@example.com"))
            .await
            .unwrap();

        let in_flight = Arc::new(Mutex::new(HashSet::new()));
        let handles = tick_once(&engine, &db, &config, &in_flight).await;
        assert!(handles.is_empty());
    }

    #[tokio::test]
    async fn overlapping_tick_skips_account_in_flight() {
        // Gate closed: the first pass hangs inside the mailbox search.
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let (engine, db, config) = setup(gate.clone()).await;

        db.insert_account(&connected("alice")).await.unwrap();

        let in_flight = Arc::new(Mutex::new(HashSet::new()));
        let first = tick_once(&engine, &db, &config, &in_flight).await;
        assert_eq!(first.len(), 1);

        // Second tick fires while the first pass is still blocked.
        let second = tick_once(&engine, &db, &config, &in_flight).await;
        assert!(second.is_empty(), "in-flight account must be skipped");

        // Release the pass and let it finish.
        gate.add_permits(1);
        for handle in first {
            handle.await.unwrap();
        }
        assert!(in_flight.lock().await.is_empty());

        // Next tick picks the account up again.
        let third = tick_once(&engine, &db, &config, &in_flight).await;
        assert_eq!(third.len(), 1);
        for handle in third {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn one_failing_pass_does_not_affect_others() {
        // Both passes run; alice's credential resolution fails with auth,
        // bob's succeeds. Uses the engine-level auth handling end to end.
        struct SplitCredentials;

        #[async_trait]
        impl CredentialProvider for SplitCredentials {
            async fn resolve(&self, account: &Account) -> Result<Credential, MailboxError> {
                if account.username == "alice" {
                    Err(MailboxError::Auth {
                        account_id: account.id,
                        reason: "invalid_grant".into(),
                    })
                } else {
                    Ok(Credential {
                        access_token: "token".into(),
                    })
                }
            }
        }

        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let reminders = Arc::new(AutoReminderService::new(
            db.clone(),
            Arc::new(NoopCalendarSink),
        ));
        let engine = Arc::new(ScanEngine::new(
            db.clone(),
            Arc::new(SlowMailbox {
                gate: Arc::new(tokio::sync::Semaphore::new(10)),
            }),
            Arc::new(SplitCredentials),
            Arc::new(DisabledExtractor),
            reminders,
            5,
        ));

        let alice = connected("alice");
        let bob = connected("bob");
        db.insert_account(&alice).await.unwrap();
        db.insert_account(&bob).await.unwrap();

        let in_flight = Arc::new(Mutex::new(HashSet::new()));
        let handles = tick_once(&engine, &db, &ScannerConfig::default(), &in_flight).await;
        for result in futures::future::join_all(handles).await {
            result.unwrap();
        }

        // Alice's integration got disabled; bob's is untouched.
        let alice_after = db.get_account(alice.id).await.unwrap().unwrap();
        assert!(!alice_after.gmail_enabled);
        let bob_after = db.get_account(bob.id).await.unwrap().unwrap();
        assert!(bob_after.gmail_enabled);
    }
}
