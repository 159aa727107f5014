//! Gmail REST v1 client — message search and full-content fetch.

use std::sync::OnceLock;

use async_trait::async_trait;
use base64::Engine;
use regex::Regex;
use serde::Deserialize;

use crate::error::MailboxError;
use crate::mailbox::{Credential, MailMessage, MailboxClient};

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Gmail API client. Holds only a reqwest client; the access token comes in
/// per call so one client serves every account.
pub struct GmailClient {
    client: reqwest::Client,
}

impl GmailClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for GmailClient {
    fn default() -> Self {
        Self::new()
    }
}

// ── API response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageStub>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageStub {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDetail {
    #[serde(default)]
    id: String,
    /// Stringified epoch milliseconds, per the Gmail wire format.
    #[serde(default)]
    internal_date: Option<String>,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: Option<MessagePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

#[async_trait]
impl MailboxClient for GmailClient {
    async fn search(
        &self,
        credential: &Credential,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<String>, MailboxError> {
        let response = self
            .client
            .get(format!("{GMAIL_BASE}/messages"))
            .bearer_auth(&credential.access_token)
            .query(&[("q", query), ("maxResults", &max_results.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailboxError::Search(format!("status {status}: {body}")));
        }

        let list: MessageListResponse = response
            .json()
            .await
            .map_err(|e| MailboxError::Search(format!("bad list response: {e}")))?;

        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn fetch(
        &self,
        credential: &Credential,
        message_id: &str,
    ) -> Result<MailMessage, MailboxError> {
        let response = self
            .client
            .get(format!("{GMAIL_BASE}/messages/{message_id}"))
            .bearer_auth(&credential.access_token)
            .query(&[("format", "full")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailboxError::Fetch {
                message_id: message_id.to_string(),
                reason: format!("status {status}: {body}"),
            });
        }

        let detail: MessageDetail = response.json().await.map_err(|e| MailboxError::Fetch {
            message_id: message_id.to_string(),
            reason: format!("bad message response: {e}"),
        })?;

        Ok(into_mail_message(detail))
    }
}

fn into_mail_message(detail: MessageDetail) -> MailMessage {
    let internal_ms = detail
        .internal_date
        .as_deref()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0);

    let (sender, subject, body) = match &detail.payload {
        Some(payload) => {
            let body = collect_text(payload);
            (
                header_value(&payload.headers, "From"),
                header_value(&payload.headers, "Subject"),
                if body.is_empty() {
                    detail.snippet.clone()
                } else {
                    body
                },
            )
        }
        // No payload at all — fall back to the snippet.
        None => (String::new(), String::new(), detail.snippet.clone()),
    };

    MailMessage {
        id: detail.id,
        internal_ms,
        sender,
        subject,
        body,
    }
}

fn header_value(headers: &[Header], name: &str) -> String {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
        .unwrap_or_default()
}

/// Recursively collect text from a MIME tree. Both text/plain and text/html
/// parts contribute (html has its tags stripped), concatenated in order —
/// the classifier works on the union of whatever text the message carries.
fn collect_text(part: &MessagePart) -> String {
    let mut out = String::new();
    append_text(part, &mut out);
    out.trim().to_string()
}

fn append_text(part: &MessagePart, out: &mut String) {
    if let Some(body) = &part.body
        && let Some(data) = &body.data
        && (part.mime_type == "text/plain" || part.mime_type == "text/html")
        && let Some(text) = decode_base64_text(data)
    {
        if part.mime_type == "text/html" {
            out.push_str(&strip_html(&text));
        } else {
            out.push_str(&text);
        }
        out.push(' ');
    }
    for child in &part.parts {
        append_text(child, out);
    }
}

/// Decode URL-safe base64 as used by the Gmail API (padding optional).
fn decode_base64_text(data: &str) -> Option<String> {
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let bytes = engine
        .decode(data.trim_end_matches('='))
        .ok()?;
    String::from_utf8(bytes).ok()
}

fn strip_html(text: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    static WS: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());
    let ws = WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    let without_tags = tag.replace_all(text, " ");
    ws.replace_all(&without_tags, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(text)
    }

    #[test]
    fn list_response_deserializes() {
        let json = r#"{"messages": [{"id": "m1"}, {"id": "m2"}], "resultSizeEstimate": 2}"#;
        let list: MessageListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(list.messages.len(), 2);
        assert_eq!(list.messages[0].id, "m1");
    }

    #[test]
    fn empty_list_response_deserializes() {
        let json = r#"{"resultSizeEstimate": 0}"#;
        let list: MessageListResponse = serde_json::from_str(json).unwrap();
        assert!(list.messages.is_empty());
    }

    #[test]
    fn full_message_converts_with_headers_and_body() {
        let json = format!(
            r#"{{
                "id": "msg1",
                "internalDate": "1700000000123",
                "snippet": "snippet text",
                "payload": {{
                    "mimeType": "text/plain",
                    "headers": [
                        {{"name": "From", "value": "careers@google.com"}},
                        {{"name": "subject", "value": "Application Received"}}
                    ],
                    "body": {{"data": "{}"}}
                }}
            }}"#,
            encode("Thank you for applying to Google.")
        );
        let detail: MessageDetail = serde_json::from_str(&json).unwrap();
        let message = into_mail_message(detail);

        assert_eq!(message.id, "msg1");
        assert_eq!(message.internal_ms, 1_700_000_000_123);
        assert_eq!(message.sender, "careers@google.com");
        // Header lookup is case-insensitive.
        assert_eq!(message.subject, "Application Received");
        assert_eq!(message.body, "Thank you for applying to Google.");
    }

    #[test]
    fn multipart_text_is_collected_recursively() {
        let json = format!(
            r#"{{
                "id": "msg2",
                "internalDate": "42",
                "payload": {{
                    "mimeType": "multipart/alternative",
                    "headers": [],
                    "parts": [
                        {{"mimeType": "text/plain", "body": {{"data": "{}"}}}},
                        {{
                            "mimeType": "multipart/related",
                            "parts": [
                                {{"mimeType": "text/html", "body": {{"data": "{}"}}}}
                            ]
                        }}
                    ]
                }}
            }}"#,
            encode("plain part."),
            encode("<p>html <b>part</b></p>")
        );
        let detail: MessageDetail = serde_json::from_str(&json).unwrap();
        let message = into_mail_message(detail);
        assert_eq!(message.body, "plain part. html part");
    }

    #[test]
    fn non_text_parts_are_ignored() {
        let json = format!(
            r#"{{
                "id": "msg3",
                "payload": {{
                    "mimeType": "multipart/mixed",
                    "parts": [
                        {{"mimeType": "application/pdf", "body": {{"data": "{}"}}}},
                        {{"mimeType": "text/plain", "body": {{"data": "{}"}}}}
                    ]
                }}
            }}"#,
            encode("binary junk"),
            encode("the real text")
        );
        let detail: MessageDetail = serde_json::from_str(&json).unwrap();
        assert_eq!(into_mail_message(detail).body, "the real text");
    }

    #[test]
    fn snippet_used_when_no_text_part_decodes() {
        let json = r#"{
            "id": "msg4",
            "snippet": "fallback snippet",
            "payload": {"mimeType": "multipart/mixed", "headers": [], "parts": []}
        }"#;
        let detail: MessageDetail = serde_json::from_str(json).unwrap();
        assert_eq!(into_mail_message(detail).body, "fallback snippet");
    }

    #[test]
    fn missing_internal_date_defaults_to_zero() {
        let json = r#"{"id": "msg5", "snippet": "s"}"#;
        let detail: MessageDetail = serde_json::from_str(json).unwrap();
        let message = into_mail_message(detail);
        assert_eq!(message.internal_ms, 0);
        assert_eq!(message.body, "s");
    }

    #[test]
    fn padded_base64_still_decodes() {
        let padded = base64::engine::general_purpose::URL_SAFE.encode("hi there");
        assert!(padded.ends_with('='));
        assert_eq!(decode_base64_text(&padded).as_deref(), Some("hi there"));
    }

    #[test]
    fn strip_html_collapses_whitespace() {
        assert_eq!(
            strip_html("<div>Hello\n  <span>world</span></div>"),
            "Hello world"
        );
    }
}
