use std::{env, fs, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
    /// Endpoint of the external meeting-creation service. When unset, `call`
    /// events are logged and dropped.
    #[serde(default)]
    pub meeting_api_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            meeting_api_url: None,
        }
    }
}

impl AppConfig {
    const CONFIG_ENV: &'static str = "CHATRELAY_CONFIG_FILE";
    const BIND_ADDRESS_ENV: &'static str = "CHATRELAY_BIND_ADDRESS";
    const MEETING_API_URL_ENV: &'static str = "CHATRELAY_MEETING_API_URL";

    /// Load configuration from defaults layered with an optional config file
    /// and environment variables.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    pub fn load_with(config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::resolve_config_path(config_path)? {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            let file_config: Self = toml::from_str(&contents)
                .with_context(|| format!("invalid config file: {}", path.display()))?;

            config = file_config;
        }

        if let Ok(addr) = env::var(Self::BIND_ADDRESS_ENV) {
            config.bind_address = addr
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::BIND_ADDRESS_ENV))?;
        }

        if let Ok(url) = env::var(Self::MEETING_API_URL_ENV) {
            if url.trim().is_empty() {
                config.meeting_api_url = None;
            } else {
                config.meeting_api_url = Some(url);
            }
        }

        Ok(config)
    }

    fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            return Self::validate_path(path);
        }

        if let Ok(path) = env::var(Self::CONFIG_ENV) {
            return Self::validate_path(PathBuf::from(path));
        }

        let candidate = PathBuf::from("chatrelay.toml");
        if candidate.exists() {
            return Ok(Some(candidate));
        }

        Ok(None)
    }

    fn validate_path(path: PathBuf) -> Result<Option<PathBuf>> {
        if path.exists() {
            Ok(Some(path))
        } else {
            Err(anyhow!(
                "configuration file does not exist: {}",
                path.display()
            ))
        }
    }
}

fn default_bind_address() -> SocketAddr {
    "127.0.0.1:8080"
        .parse()
        .expect("default bind address must be valid")
}
