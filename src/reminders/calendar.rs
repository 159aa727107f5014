//! Google Calendar v3 sink — pushes reminders as events.

use async_trait::async_trait;
use serde::Deserialize;

use crate::model::{Account, Reminder};

const EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";

/// Sink errors. These never propagate past the reminder service.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Calendar API returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Outbound notification sink for reminders.
#[async_trait]
pub trait CalendarSink: Send + Sync {
    /// Push a reminder; returns the created event id, or `None` when the
    /// sink chose not to create anything.
    async fn push(
        &self,
        account: &Account,
        reminder: &Reminder,
    ) -> Result<Option<String>, CalendarError>;
}

/// Sink used when calendar sync is turned off process-wide.
pub struct NoopCalendarSink;

#[async_trait]
impl CalendarSink for NoopCalendarSink {
    async fn push(
        &self,
        _account: &Account,
        _reminder: &Reminder,
    ) -> Result<Option<String>, CalendarError> {
        Ok(None)
    }
}

/// Google Calendar implementation. Uses the account's own access token, so
/// events land in the user's primary calendar.
pub struct GoogleCalendarSink {
    client: reqwest::Client,
}

impl GoogleCalendarSink {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for GoogleCalendarSink {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

#[async_trait]
impl CalendarSink for GoogleCalendarSink {
    async fn push(
        &self,
        account: &Account,
        reminder: &Reminder,
    ) -> Result<Option<String>, CalendarError> {
        let Some(token) = account.google_access_token.as_deref() else {
            return Ok(None);
        };

        let body = event_body(reminder, &account.timezone);
        let response = self
            .client
            .post(EVENTS_URL)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let created: CreatedEvent = response
            .json()
            .await
            .map_err(CalendarError::Http)?;
        Ok(Some(created.id))
    }
}

/// Build the event payload: a timed event when the reminder carries a
/// start time, an all-day event otherwise.
fn event_body(reminder: &Reminder, timezone: &str) -> serde_json::Value {
    let (start, end) = match (&reminder.start_time, &reminder.end_time) {
        (Some(start_time), end_time) => {
            let end_time = end_time.as_deref().unwrap_or(start_time);
            (
                serde_json::json!({
                    "dateTime": format!("{}T{}:00", reminder.trigger_at, start_time),
                    "timeZone": timezone,
                }),
                serde_json::json!({
                    "dateTime": format!("{}T{}:00", reminder.trigger_at, end_time),
                    "timeZone": timezone,
                }),
            )
        }
        (None, _) => {
            let date = reminder.trigger_at.to_string();
            (
                serde_json::json!({ "date": date }),
                serde_json::json!({ "date": date }),
            )
        }
    };

    serde_json::json!({
        "summary": reminder.title,
        "description": reminder.notes,
        "start": start,
        "end": end,
    })
}
