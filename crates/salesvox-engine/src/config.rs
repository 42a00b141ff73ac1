use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_DATABASE_PATH: &str = "sales_data.db";
pub const DEFAULT_TEXT_MODEL: &str = "gpt-4";
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub openai_api_key: Option<String>,
    pub openai_api_base: String,
    pub github: Option<GitHubConfig>,
    pub github_api_base: String,
    pub database_path: PathBuf,
    pub text_model: String,
    pub image_model: String,
    pub transcription_model: String,
    pub http_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let github = match (
            get("GITHUB_TOKEN"),
            get("GITHUB_REPO_OWNER"),
            get("GITHUB_REPO_NAME"),
        ) {
            (Some(token), Some(owner), Some(repo)) => Some(GitHubConfig { token, owner, repo }),
            _ => None,
        };

        let http_timeout = get("SALESVOX_HTTP_TIMEOUT_SECS")
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_api_base: normalize_api_base(
                get("OPENAI_API_BASE").or_else(|| get("OPENAI_BASE_URL")),
                DEFAULT_OPENAI_API_BASE,
            ),
            github,
            github_api_base: normalize_api_base(get("GITHUB_API_BASE"), DEFAULT_GITHUB_API_BASE),
            database_path: get("SALESVOX_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            text_model: get("SALESVOX_TEXT_MODEL")
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            image_model: get("SALESVOX_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            transcription_model: get("SALESVOX_TRANSCRIBE_MODEL")
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            http_timeout: Duration::from_secs(http_timeout),
        }
    }

    pub fn require_openai_key(&self) -> Result<&str> {
        match self.openai_api_key.as_deref() {
            Some(key) => Ok(key),
            None => bail!("OPENAI_API_KEY not found in environment variables"),
        }
    }
}

fn normalize_api_base(raw: Option<String>, default: &str) -> String {
    raw.map(|value| value.trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}
