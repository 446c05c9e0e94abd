use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://api.icepanel.io/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "ICEPANEL_API_URL";
pub const ENV_TOKEN: &str = "ICEPANEL_TOKEN";
pub const ENV_TIMEOUT: &str = "ICEPANEL_TIMEOUT_SECONDS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_base_url: String,
    pub token: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_base_url: DEFAULT_API_URL.to_string(),
            token: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Overlay non-empty values from the given variable lookup.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(token) = get(ENV_TOKEN) {
            self.token = token;
        }
        if let Some(secs) = get(ENV_TIMEOUT) {
            match secs.trim().parse::<u64>() {
                Ok(n) if n > 0 => self.timeout_secs = n,
                _ => tracing::warn!(value = %secs, "ignoring invalid {}", ENV_TIMEOUT),
            }
        }
        self
    }

    pub fn require_token(&self) -> Result<&str> {
        if self.token.is_empty() {
            return Err(Error::Config(format!(
                "API token is required; pass --token or set {}",
                ENV_TOKEN
            )));
        }
        Ok(&self.token)
    }
}

/// Resolve the settings directory (~/.c4sync/).
pub fn settings_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".c4sync")
}

fn settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

/// Settings file (if any) overlaid with the process environment.
pub fn read_settings() -> Settings {
    let path = settings_path();
    let from_file = fs::read_to_string(&path)
        .ok()
        .and_then(|s| match serde_json::from_str(&s) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
                None
            }
        })
        .unwrap_or_default();
    Settings::with_env(from_file, |key| std::env::var(key).ok())
}
