use std::{fs::read_to_string, path::Path, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

/// Environment variable holding the API bearer token when the settings file has none
pub const TOKEN_ENV: &str = "CHECKIN_API_TOKEN";

/// Json struct for desk settings
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the registration API
    pub api_url: String,
    /// Event the desk checks participants into
    pub event: String,
    pub api_token: Option<String>,
    pub web_port: Option<u16>,
    /// Whether the desk starts in live mode
    pub live_mode: bool,
    pub request_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_owned(),
            event: String::new(),
            api_token: None,
            web_port: None,
            live_mode: false,
            request_timeout_secs: None,
        }
    }
}

impl Settings {
    /// Loads settings from a json file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut settings = if path.exists() {
            let text = read_to_string(path)
                .with_context(|| format!("Failed to read settings file {}", path.display()))?;
            serde_json::from_str::<Settings>(&text)
                .with_context(|| format!("Invalid settings file {}", path.display()))?
        } else {
            log::info!(
                "Settings file {} does not exist, using defaults",
                path.display()
            );
            Settings::default()
        };

        if settings.api_token.is_none() {
            settings.api_token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());
        }

        Ok(settings)
    }

    pub fn api_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.api_url).with_context(|| format!("Invalid api_url '{}'", self.api_url))
    }

    pub fn web_port(&self) -> u16 {
        self.web_port.unwrap_or(28010)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(30))
    }

    /// Fails when the settings cannot drive a desk
    pub fn validate(&self) -> anyhow::Result<()> {
        self.api_url()?;
        if self.event.trim().is_empty() {
            anyhow::bail!("No event configured, set `event` in the settings file or pass --event");
        }
        Ok(())
    }
}
