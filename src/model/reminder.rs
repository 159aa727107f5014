//! Reminders auto-generated from application deadlines and interview times.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ApplicationRecord;

/// What the reminder is about. One reminder of each kind per application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderKind {
    Deadline,
    Interview,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deadline => "DEADLINE",
            Self::Interview => "INTERVIEW",
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEADLINE" => Ok(Self::Deadline),
            "INTERVIEW" => Ok(Self::Interview),
            other => Err(format!("unknown reminder kind: '{other}'")),
        }
    }
}

/// A calendar-style reminder tied to an application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub account_id: Uuid,
    pub application_id: Uuid,
    pub kind: ReminderKind,
    pub title: String,
    pub notes: String,
    pub trigger_at: NaiveDate,
    /// "HH:MM", set for timed events only.
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub color: String,
    /// Set once the reminder has been pushed to the calendar sink.
    pub calendar_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    /// Deadline reminder for an application — all-day event.
    pub fn deadline(app: &ApplicationRecord, deadline: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: app.account_id,
            application_id: app.id,
            kind: ReminderKind::Deadline,
            title: format!("{} - {}", app.company, app.title),
            notes: format!(
                "Application deadline for {} position at {}",
                app.title, app.company
            ),
            trigger_at: deadline,
            start_time: None,
            end_time: None,
            color: "blue".to_string(),
            calendar_event_id: None,
            created_at: Utc::now(),
        }
    }

    /// Interview reminder — one-hour timed event at the interview time.
    pub fn interview(app: &ApplicationRecord, interview_at: DateTime<Utc>) -> Self {
        let end = interview_at + chrono::Duration::hours(1);
        Self {
            id: Uuid::new_v4(),
            account_id: app.account_id,
            application_id: app.id,
            kind: ReminderKind::Interview,
            title: format!("Interview - {} at {}", app.title, app.company),
            notes: format!("Interview for {} position at {}", app.title, app.company),
            trigger_at: interview_at.date_naive(),
            start_time: Some(interview_at.format("%H:%M").to_string()),
            end_time: Some(end.format("%H:%M").to_string()),
            color: "orange".to_string(),
            calendar_event_id: None,
            created_at: Utc::now(),
        }
    }
}
