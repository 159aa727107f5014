//! The reconciliation pipeline — scan passes and their scheduler.

pub mod engine;
pub mod scheduler;

pub use engine::{MessageOutcome, ScanEngine, ScanReport};
pub use scheduler::spawn_scan_scheduler;
