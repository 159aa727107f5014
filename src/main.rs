use std::sync::Arc;
use std::sync::atomic::Ordering;

use jobtrack::config::{GoogleConfig, LlmConfig, ScannerConfig};
use jobtrack::llm::{ClaudeExtractor, DisabledExtractor, FallbackExtractor};
use jobtrack::mailbox::{GmailClient, GoogleCredentialProvider};
use jobtrack::reminders::{AutoReminderService, GoogleCalendarSink};
use jobtrack::scanner::{ScanEngine, spawn_scan_scheduler};
use jobtrack::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let scanner_config = ScannerConfig::from_env();
    let google_config = GoogleConfig::from_env()?;

    eprintln!("📬 Jobtrack scanner v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Scan: every {}s, batch {}, active window {}s",
        scanner_config.scan_interval_secs,
        scanner_config.batch_size,
        scanner_config.active_window_secs
    );

    // ── Database ─────────────────────────────────────────────────────
    let db_path =
        std::env::var("JOBTRACK_DB_PATH").unwrap_or_else(|_| "./data/jobtrack.db".to_string());
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&db_path))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open database at {db_path}: {e}"))?,
    );
    eprintln!("   Database: {}", db_path);

    // ── Fallback extractor ───────────────────────────────────────────
    let fallback: Arc<dyn FallbackExtractor> = match LlmConfig::from_env() {
        Some(llm_config) => {
            eprintln!("   Fallback extractor: enabled ({})", llm_config.model);
            Arc::new(ClaudeExtractor::new(llm_config))
        }
        None => {
            eprintln!("   Fallback extractor: disabled (no ANTHROPIC_API_KEY)");
            Arc::new(DisabledExtractor)
        }
    };

    // ── Engine ───────────────────────────────────────────────────────
    let reminders = Arc::new(AutoReminderService::new(
        Arc::clone(&db),
        Arc::new(GoogleCalendarSink::new()),
    ));
    let credentials = Arc::new(GoogleCredentialProvider::new(
        google_config,
        Arc::clone(&db),
    ));
    let engine = Arc::new(ScanEngine::new(
        Arc::clone(&db),
        Arc::new(GmailClient::new()),
        credentials,
        fallback,
        reminders,
        scanner_config.batch_size,
    ));

    // ── Scheduler ────────────────────────────────────────────────────
    let (handle, shutdown) = spawn_scan_scheduler(engine, db, scanner_config);
    eprintln!("   Scheduler running. Ctrl-C to stop.\n");

    tokio::signal::ctrl_c().await?;
    eprintln!("\nShutting down…");
    shutdown.store(true, Ordering::Relaxed);
    handle.abort();
    let _ = handle.await;

    Ok(())
}
