//! Fallback field extraction via an external language model.
//!
//! Consulted only when the regex cascade leaves a field at its sentinel.
//! Strictly best-effort: every failure mode collapses to "no answer" and the
//! caller keeps whatever the regex tier produced.

mod claude;

pub use claude::ClaudeExtractor;

use async_trait::async_trait;

/// A best-effort company/title extractor backed by an external service.
#[async_trait]
pub trait FallbackExtractor: Send + Sync {
    /// Whether the extractor has a usable credential.
    fn available(&self) -> bool;

    /// Returns `(company, title)`. A `None` field means "no answer" — it must
    /// never be used to overwrite a successfully extracted field.
    async fn extract(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
    ) -> (Option<String>, Option<String>);
}

/// Extractor used when no API key is configured.
pub struct DisabledExtractor;

#[async_trait]
impl FallbackExtractor for DisabledExtractor {
    fn available(&self) -> bool {
        false
    }

    async fn extract(
        &self,
        _sender: &str,
        _subject: &str,
        _body: &str,
    ) -> (Option<String>, Option<String>) {
        (None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_extractor_never_answers() {
        let extractor = DisabledExtractor;
        assert!(!extractor.available());
        assert_eq!(extractor.extract("a@b.c", "subj", "body").await, (None, None));
    }
}
