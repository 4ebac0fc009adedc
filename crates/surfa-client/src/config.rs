//! Client configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use surfa_core::error::RETRYABLE_STATUS_CODES;
use surfa_core::{Error, Result, util};

pub const ENV_INGEST_KEY: &str = "SURFA_INGEST_KEY";
pub const ENV_API_URL: &str = "SURFA_API_URL";
pub const ENV_FLUSH_AT: &str = "SURFA_FLUSH_AT";
pub const ENV_TIMEOUT_SECS: &str = "SURFA_TIMEOUT_SECS";

/// Surfa client configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Ingest API key (starts with `sk_live_` or `sk_test_`)
    pub ingest_key: String,

    /// Base URL for the Surfa API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Number of buffered events that triggers an automatic flush
    #[serde(default = "default_flush_at")]
    pub flush_at: usize,

    /// Per-attempt request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_api_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_flush_at() -> usize {
    25
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("surfa-ingest-rust/{}", env!("CARGO_PKG_VERSION"))
}

impl ClientConfig {
    pub fn new(ingest_key: impl Into<String>) -> Self {
        Self {
            ingest_key: ingest_key.into(),
            api_url: default_api_url(),
            flush_at: default_flush_at(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_flush_at(mut self, flush_at: usize) -> Self {
        self.flush_at = flush_at;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Build from `SURFA_INGEST_KEY`, `SURFA_API_URL`, `SURFA_FLUSH_AT` and
    /// `SURFA_TIMEOUT_SECS`. Only the key is required.
    pub fn from_env() -> Result<Self> {
        let ingest_key = std::env::var(ENV_INGEST_KEY)
            .map_err(|_| Error::Config(format!("{ENV_INGEST_KEY} is not set")))?;
        let mut config = Self::new(ingest_key);

        if let Ok(api_url) = std::env::var(ENV_API_URL) {
            config.api_url = api_url;
        }
        if let Ok(flush_at) = std::env::var(ENV_FLUSH_AT) {
            config.flush_at = flush_at
                .parse()
                .map_err(|e| Error::Config(format!("{ENV_FLUSH_AT}: {e}")))?;
        }
        if let Ok(timeout) = std::env::var(ENV_TIMEOUT_SECS) {
            config.timeout_secs = timeout
                .parse()
                .map_err(|e| Error::Config(format!("{ENV_TIMEOUT_SECS}: {e}")))?;
        }

        Ok(config)
    }

    /// Load from a `.toml` file, or YAML for any other extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))?
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))?
        };

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        util::validate_ingest_key(&self.ingest_key)?;

        if self.api_url.trim_end_matches('/').is_empty() {
            return Err(Error::Config("api_url cannot be empty".to_string()));
        }
        if self.flush_at == 0 {
            return Err(Error::Config("flush_at must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be at least 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Base URL with trailing slashes stripped
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("ingest_key", &util::mask_key(&self.ingest_key))
            .field("api_url", &self.api_url)
            .field("flush_at", &self.flush_at)
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Retry policy for transient delivery failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles for every attempt after it
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// HTTP statuses treated as transient
    #[serde(default = "default_retryable_status_codes")]
    pub retryable_status_codes: Vec<u16>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_retryable_status_codes() -> Vec<u16> {
    RETRYABLE_STATUS_CODES.to_vec()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            retryable_status_codes: default_retryable_status_codes(),
        }
    }
}

impl RetryConfig {
    /// Single attempt, no backoff
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Delay after the given 0-indexed attempt: `base * 2^attempt`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }
}
