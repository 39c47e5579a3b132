//! User configuration loading from `~/.threadline/config.toml`.

use crate::api::client::ClientSettings;
use crate::sync::{DEFAULT_MAX_CONTENT_LENGTH, DEFAULT_PER_PAGE, SyncSettings};
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = ".threadline";
const CONFIG_FILE: &str = "config.toml";

const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";
const DEFAULT_TOKEN_ENV: &str = "THREADLINE_TOKEN";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_CONFIG_TOML: &str = r##"# threadline configuration

[api]
# Root of the comments REST API.
base_url = "http://localhost:3000/api"
# Environment variable holding the bearer token. Without it you can read but not post.
token_env = "THREADLINE_TOKEN"
# Accepts humantime durations such as "500ms", "10s", "1m".
request_timeout = "10s"

[thread]
per_page = 10
max_content_length = 280
"##;

/// Application configuration loaded from disk.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub thread: SyncSettings,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub token_env: String,
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: DEFAULT_BASE_URL.to_owned(),
                token_env: DEFAULT_TOKEN_ENV.to_owned(),
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            },
            thread: SyncSettings::default(),
        }
    }
}

impl ApiConfig {
    /// Client settings with the token read from `token_env`.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            token: crate::api::client::token_from_env(&self.token_env),
            request_timeout: self.request_timeout,
        }
    }
}

/// Returns the config file path and creates default config if missing.
pub fn ensure_config_file() -> Result<PathBuf> {
    let path = config_path()?;
    ensure_default_config(&path)?;
    Ok(path)
}

/// Loads configuration from `~/.threadline/config.toml`, creating defaults if missing.
pub fn load_or_create() -> Result<AppConfig> {
    let path = ensure_config_file()?;
    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;

    parse_config(&content).with_context(|| format!("invalid config in {}", path.display()))
}

/// Parses config TOML; missing keys fall back to defaults.
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let raw: RawConfig = toml::from_str(content).context("failed to parse TOML")?;
    raw.into_config()
}

fn config_path() -> Result<PathBuf> {
    let home =
        env::var_os("HOME").ok_or_else(|| anyhow!("HOME environment variable is not set"))?;
    Ok(PathBuf::from(home).join(CONFIG_DIR).join(CONFIG_FILE))
}

fn ensure_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    let dir = path
        .parent()
        .ok_or_else(|| anyhow!("invalid config path: {}", path.display()))?;
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    fs::write(path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("failed to write default config file {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    api: RawApi,
    thread: RawThread,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApi {
    base_url: Option<String>,
    token_env: Option<String>,
    request_timeout: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawThread {
    per_page: Option<u32>,
    max_content_length: Option<usize>,
}

impl RawConfig {
    fn into_config(self) -> Result<AppConfig> {
        let base_url = self
            .api
            .base_url
            .map(|url| url.trim().trim_end_matches('/').to_owned())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        if base_url.is_empty() {
            return Err(anyhow!("`api.base_url` must not be empty"));
        }

        let request_timeout = match self.api.request_timeout {
            Some(raw) => humantime::parse_duration(raw.trim())
                .with_context(|| format!("invalid duration for `api.request_timeout`: {raw}"))?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let per_page = self.thread.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if per_page == 0 {
            return Err(anyhow!("`thread.per_page` must be at least 1"));
        }
        let max_content_length = self
            .thread
            .max_content_length
            .unwrap_or(DEFAULT_MAX_CONTENT_LENGTH);
        if max_content_length == 0 {
            return Err(anyhow!("`thread.max_content_length` must be at least 1"));
        }

        Ok(AppConfig {
            api: ApiConfig {
                base_url,
                token_env: self
                    .api
                    .token_env
                    .unwrap_or_else(|| DEFAULT_TOKEN_ENV.to_owned()),
                request_timeout,
            },
            thread: SyncSettings {
                per_page,
                max_content_length,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, DEFAULT_CONFIG_TOML, parse_config};
    use std::time::Duration;

    #[test]
    fn default_file_matches_built_in_defaults() {
        let parsed = parse_config(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(parsed, AppConfig::default());
    }

    #[test]
    fn empty_file_uses_defaults() {
        assert_eq!(parse_config("").unwrap(), AppConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let parsed = parse_config(
            r#"
            [api]
            base_url = "https://comments.example.com/api/"
            request_timeout = "1m 30s"

            [thread]
            per_page = 25
            "#,
        )
        .unwrap();

        assert_eq!(parsed.api.base_url, "https://comments.example.com/api");
        assert_eq!(parsed.api.request_timeout, Duration::from_secs(90));
        assert_eq!(parsed.thread.per_page, 25);
        assert_eq!(parsed.thread.max_content_length, 280);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse_config("[api]\nrequest_timeout = \"soon\"").is_err());
        assert!(parse_config("[thread]\nper_page = 0").is_err());
    }
}
