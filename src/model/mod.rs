//! Domain model — accounts, application records, reminders.

pub mod account;
pub mod application;
pub mod reminder;

pub use account::Account;
pub use application::{ApplicationRecord, ApplicationStatus, fingerprint_tag};
pub use reminder::{Reminder, ReminderKind};
