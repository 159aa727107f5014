//! Configuration types, built from environment variables.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Scanner loop configuration.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Seconds between scan ticks.
    pub scan_interval_secs: u64,
    /// Messages fetched per account per tick. Bounded so each tick stays
    /// cheap and retry-safe; the backlog drains across ticks.
    pub batch_size: u32,
    /// Only accounts seen by the host application within this window are scanned.
    pub active_window_secs: i64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 60,
            batch_size: 5,
            active_window_secs: 300,
        }
    }
}

impl ScannerConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            scan_interval_secs: env_parse("SCAN_INTERVAL_SECS", defaults.scan_interval_secs),
            batch_size: env_parse("SCAN_BATCH_SIZE", defaults.batch_size),
            active_window_secs: env_parse("SCAN_ACTIVE_WINDOW_SECS", defaults.active_window_secs),
        }
    }
}

/// Google OAuth client configuration, used to refresh per-account tokens.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub token_uri: String,
}

impl GoogleConfig {
    /// Build config from `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID")
            .map_err(|_| ConfigError::MissingEnvVar("GOOGLE_CLIENT_ID".into()))?;
        let client_secret = std::env::var("GOOGLE_CLIENT_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("GOOGLE_CLIENT_SECRET".into()))?;
        let token_uri = std::env::var("GOOGLE_TOKEN_URI")
            .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string());

        Ok(Self {
            client_id,
            client_secret: SecretString::from(client_secret),
            token_uri,
        })
    }
}

/// Fallback extractor configuration.
/// Returns `None` if `ANTHROPIC_API_KEY` is not set (extractor disabled).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub model: String,
}

impl LlmConfig {
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty())?;
        let model = std::env::var("ANTHROPIC_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
        Some(Self {
            api_key: SecretString::from(api_key),
            model,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanner_defaults() {
        let config = ScannerConfig::default();
        assert_eq!(config.scan_interval_secs, 60);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.active_window_secs, 300);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        // Unset/garbage values fall back to the default.
        assert_eq!(env_parse("SCAN_TEST_UNSET_VAR", 42u32), 42);
    }
}
