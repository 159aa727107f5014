//! Anthropic messages API extractor.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::FallbackExtractor;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Max tokens for the extraction call — the answer is one small JSON object.
const MAX_TOKENS: u32 = 200;

/// Body text is truncated to this many characters before prompting.
const BODY_PROMPT_CHARS: usize = 500;

/// Company/title extractor backed by the Anthropic messages API.
pub struct ClaudeExtractor {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ClaudeExtractor {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn request(&self, prompt: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| LlmError::InvalidResponse("empty content array".into()))
    }
}

#[async_trait]
impl FallbackExtractor for ClaudeExtractor {
    fn available(&self) -> bool {
        true
    }

    async fn extract(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
    ) -> (Option<String>, Option<String>) {
        let prompt = build_prompt(sender, subject, body);
        match self.request(&prompt).await {
            Ok(text) => {
                let fields = parse_fields(&text);
                debug!(
                    company = fields.0.as_deref().unwrap_or("-"),
                    title = fields.1.as_deref().unwrap_or("-"),
                    "Fallback extraction answered"
                );
                fields
            }
            Err(e) => {
                warn!(error = %e, "Fallback extraction failed");
                (None, None)
            }
        }
    }
}

/// Anthropic messages API response — only the text content is needed.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ExtractedFields {
    #[serde(default)]
    company: String,
    #[serde(default)]
    title: String,
}

fn build_prompt(sender: &str, subject: &str, body: &str) -> String {
    let body_preview: String = body.chars().take(BODY_PROMPT_CHARS).collect();
    format!(
        "Extract the company name and job title from this job application email. \
         Return ONLY a JSON object with format: {{\"company\": \"...\", \"title\": \"...\"}}. \
         If you cannot determine either field, use \"Unknown\" for that field.\n\n\
         Email Details:\n\
         From: {sender}\n\
         Subject: {subject}\n\
         Body: {body_preview}\n\n\
         JSON Response:"
    )
}

/// Parse the model's answer into optional fields.
///
/// Literal "Unknown"/"N/A" answers map to `None`, as does any parse failure —
/// the caller keeps the regex-derived value either way.
fn parse_fields(text: &str) -> (Option<String>, Option<String>) {
    let json = extract_json_object(text);
    let fields: ExtractedFields = match serde_json::from_str(&json) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "Fallback answer was not valid JSON");
            return (None, None);
        }
    };
    (clean_field(&fields.company), clean_field(&fields.title))
}

fn clean_field(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("unknown")
        || trimmed.eq_ignore_ascii_case("n/a")
        || trimmed.eq_ignore_ascii_case("unknown company")
        || trimmed.eq_ignore_ascii_case("unknown position")
    {
        return None;
    }
    Some(trimmed.to_string())
}

/// Extract a JSON object from model output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```") {
        let after = trimmed[start..].trim_start_matches("```json").trim_start_matches("```");
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
