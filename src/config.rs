//! Runtime configuration, read once at startup.
//!
//! Environment variables (a `.env` file in the working directory is loaded
//! first and never overrides variables already set):
//! - `OPENAI_API_KEY` - API key (required)
//! - `OPENAI_MODEL` - Model identifier (default: `gpt-4o-mini`)
//! - `OPENAI_CA_BUNDLE` - Extra CA bundle for TLS (default: `/etc/ssl/cert.pem` when present)
//! - `OPENAI_BASE_URL` - API base URL (default: `https://api.openai.com/v1`)
//! - `OPENAI_TIMEOUT_SECS` - Per-request timeout (default: 60)

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CA_BUNDLE: &str = "/etc/ssl/cert.pem";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration errors. All of them abort before any row is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set. Add it to .env or the environment.")]
    MissingApiKey,

    #[error("CA bundle not found: {}", .0.display())]
    CaBundleNotFound(PathBuf),

    #[error("Failed to read CA bundle {}: {source}", path.display())]
    CaBundleUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid CA bundle {}: {reason}", path.display())]
    InvalidCaBundle { path: PathBuf, reason: String },

    #[error("Invalid OPENAI_TIMEOUT_SECS value: {0}")]
    InvalidTimeout(String),

    #[error("Failed to read prompt file {}: {source}", path.display())]
    PromptFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Extra root certificates trusted in addition to the platform's.
    pub ca_bundle: Option<PathBuf>,
    pub timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("ca_bundle", &self.ca_bundle)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Config {
    /// Create with explicit configuration and defaults for everything else.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            ca_bundle: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = var("OPENAI_API_KEY").ok_or(ConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key);

        if let Some(model) = var("OPENAI_MODEL") {
            config.model = model;
        }
        if let Some(base_url) = var("OPENAI_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        if let Some(raw) = var("OPENAI_TIMEOUT_SECS") {
            let secs = raw
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::InvalidTimeout(raw))?;
            config.timeout = Duration::from_secs(secs);
        }

        // An explicitly configured bundle must exist; the default is best-effort.
        config.ca_bundle = match var("OPENAI_CA_BUNDLE") {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    return Err(ConfigError::CaBundleNotFound(path));
                }
                Some(path)
            }
            None => Some(PathBuf::from(DEFAULT_CA_BUNDLE)).filter(|p| p.exists()),
        };

        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_ca_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_bundle = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Load `.env` from the working directory, if there is one.
///
/// Returns the path that was loaded. Parse errors are returned; a missing
/// file is not an error.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Read custom prompt instructions, trimmed.
pub fn read_prompt_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| ConfigError::PromptFile {
            path: path.to_path_buf(),
            source,
        })
}
