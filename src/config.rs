use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";
pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 150_000;

// RFC 3986 unreserved characters pass through.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub const API_KEY_ENV_VARS: &[&str] = &["DOCASK_API_KEY", "GEMINI_API_KEY"];
pub const MODEL_ENV_VAR: &str = "DOCASK_MODEL";
pub const ENDPOINT_ENV_VAR: &str = "DOCASK_ENDPOINT";
pub const CONFIG_ENV_VAR: &str = "DOCASK_CONFIG";

/// Everything the completion client and session need at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_attempts: u32,
    pub backoff_unit: Duration,
    pub attempt_timeout: Duration,
    pub max_content_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }
}

/// Values that override everything else, usually from the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

/// On-disk configuration. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub max_attempts: Option<u32>,
    pub backoff_unit_ms: Option<u64>,
    pub attempt_timeout_secs: Option<u64>,
    pub max_content_chars: Option<usize>,
}

impl FileConfig {
    /// Parse a config file. A missing file yields the empty config.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(toml::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Config {
    /// Resolve the configuration from, in order of priority:
    /// 1. Explicit overrides (command-line flags)
    /// 2. Environment variables (`DOCASK_API_KEY`/`GEMINI_API_KEY`,
    ///    `DOCASK_MODEL`, `DOCASK_ENDPOINT`)
    /// 3. The config file (`--config`, `DOCASK_CONFIG`, or
    ///    `~/.config/docask/config.toml`)
    /// 4. Built-in defaults
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        let path = match &overrides.config_file {
            Some(path) => Some(path.clone()),
            None => config_file_path(),
        };
        let file = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "reading config file");
                FileConfig::load(&path)?
            }
            None => FileConfig::default(),
        };

        Self::from_parts(overrides, &file, |key| std::env::var(key).ok())
    }

    /// Merge the sources with an injectable environment lookup.
    pub fn from_parts(
        overrides: &Overrides,
        file: &FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env = |key: &str| {
            env(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let api_key = API_KEY_ENV_VARS
            .iter()
            .find_map(|&key| env(key))
            .or_else(|| file.api_key.clone());

        let config = Self {
            endpoint: overrides
                .endpoint
                .clone()
                .or_else(|| env(ENDPOINT_ENV_VAR))
                .or_else(|| file.endpoint.clone())
                .unwrap_or(defaults.endpoint),
            model: overrides
                .model
                .clone()
                .or_else(|| env(MODEL_ENV_VAR))
                .or_else(|| file.model.clone())
                .unwrap_or(defaults.model),
            api_key,
            max_attempts: file.max_attempts.unwrap_or(defaults.max_attempts),
            backoff_unit: file
                .backoff_unit_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff_unit),
            attempt_timeout: file
                .attempt_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.attempt_timeout),
            max_content_chars: file
                .max_content_chars
                .unwrap_or(defaults.max_content_chars),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_attempts > 16 {
            return Err(Error::Config(format!(
                "max_attempts must be at most 16, got {}",
                self.max_attempts
            )));
        }
        if self.model.trim().is_empty() {
            return Err(Error::Config("model must not be empty".to_string()));
        }
        if !self.endpoint.starts_with("http://")
            && !self.endpoint.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "endpoint must be an http(s) URL: {}",
                self.endpoint
            )));
        }
        Ok(())
    }

    /// The `generateContent` URL for the configured model and key.
    pub fn generate_url(&self) -> Result<String> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "no API key configured; set {} or api_key in the config file",
                API_KEY_ENV_VARS[0]
            ))
        })?;

        Ok(format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint.trim_end_matches('/'),
            utf8_percent_encode(self.model.trim(), URL_COMPONENT),
            utf8_percent_encode(key, URL_COMPONENT),
        ))
    }

    /// The API key with everything but the last four characters masked.
    pub fn redacted_api_key(&self) -> Option<String> {
        self.api_key.as_deref().map(|key| {
            let chars: Vec<char> = key.chars().collect();
            let hidden = chars.len().saturating_sub(4);
            let tail: String = chars[hidden..].iter().collect();
            format!("{}{tail}", "*".repeat(hidden.min(8)))
        })
    }
}

/// Config file location: `DOCASK_CONFIG`, else the XDG config directory.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }
    xdg::BaseDirectories::with_prefix("docask")
        .get_config_home()
        .map(|dir| dir.join("config.toml"))
}
