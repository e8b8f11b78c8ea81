//! TOML configuration.
//!
//! Every section has defaults, so a minimal file only names what differs.
//! Cross-field requirements depend on the start mode and are checked by
//! [`Config::validate`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use dns_failover_app::DEFAULT_CHECK_INTERVAL;
use dns_failover_core::services::FailoverSettings;
use serde::{Deserialize, Deserializer};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "DNS_FAILOVER_CONFIG";
const APP_DIR: &str = "dns-failover";
const MIN_CHECK_INTERVAL_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// What this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMode {
    /// Telegram bot, scheduler and store.
    #[default]
    Bot,
    /// Check-backend HTTP server only.
    Backend,
    Both,
}

impl StartMode {
    pub fn runs_bot(self) -> bool {
        matches!(self, Self::Bot | Self::Both)
    }

    pub fn runs_backend(self) -> bool {
        matches!(self, Self::Backend | Self::Both)
    }
}

impl fmt::Display for StartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bot => "bot",
            Self::Backend => "backend",
            Self::Both => "both",
        })
    }
}

/// Accepts `1`/`2`/`3` as well as `"bot"`/`"backend"`/`"both"`.
impl<'de> Deserialize<'de> for StartMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(1) => Ok(Self::Bot),
            Raw::Number(2) => Ok(Self::Backend),
            Raw::Number(3) => Ok(Self::Both),
            Raw::Name(name) => match name.trim().to_ascii_lowercase().as_str() {
                "bot" | "1" => Ok(Self::Bot),
                "backend" | "2" => Ok(Self::Backend),
                "both" | "full" | "3" => Ok(Self::Both),
                other => Err(Error::custom(format!("unknown start mode '{other}'"))),
            },
            Raw::Number(other) => Err(Error::custom(format!("unknown start mode {other}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    /// Also write daily-rotated files next to this path.
    pub file_path: Option<PathBuf>,
    /// Human-readable ANSI output instead of JSON lines.
    pub development: bool,
    pub keep_days: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            development: false,
            keep_days: 7,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StartConfig {
    pub mode: StartMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendListenConfig {
    pub host: String,
    pub port: u16,
    /// Shared key every probe request must carry.
    pub key: String,
    /// Time allowed for a client to send its request head.
    pub read_timeout_secs: u64,
    pub disconnect_timeout_secs: u64,
    /// Worker threads; defaults to the number of CPUs.
    pub workers: Option<usize>,
}

impl Default for BackendListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            key: String::new(),
            read_timeout_secs: 10,
            disconnect_timeout_secs: 5,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutoCheckConfig {
    pub interval_secs: u64,
    /// Consecutive backend failures before admins hear about them.
    pub api_fail_threshold: u32,
}

impl Default for AutoCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_CHECK_INTERVAL.as_secs(),
            api_fail_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CloudflareConfig {
    pub api_token: String,
    pub ttl: u32,
    pub proxied: bool,
}

impl Default for CloudflareConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            ttl: 60,
            proxied: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Owner's user id; `0` disables the role.
    pub super_admin_id: i64,
    pub token: String,
    pub api_endpoint: String,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            super_admin_id: 0,
            token: String::new(),
            api_endpoint: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub proxy_enabled: bool,
    /// `http://`, `https://` or `socks5://` URL.
    pub proxy: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendUrlConfig {
    pub api: String,
    pub key: String,
    /// Upper bound for one streamed probe.
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for BackendUrlConfig {
    fn default() -> Self {
        Self {
            api: String::new(),
            key: String::new(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logger: LoggerConfig,
    pub start: StartConfig,
    pub backend_listen: BackendListenConfig,
    pub auto_check: AutoCheckConfig,
    pub database: DatabaseConfig,
    pub cloudflare: CloudflareConfig,
    pub telegram: TelegramConfig,
    pub network: NetworkConfig,
    pub backend_url: BackendUrlConfig,
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Config file {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mode = self.start.mode;
        let mut missing = Vec::new();

        if mode.runs_bot() {
            for (key, value) in [
                ("telegram.token", &self.telegram.token),
                ("cloudflare.api_token", &self.cloudflare.api_token),
                ("backend_url.api", &self.backend_url.api),
                ("backend_url.key", &self.backend_url.key),
            ] {
                if value.trim().is_empty() {
                    missing.push(key);
                }
            }
        }
        if mode.runs_backend() && self.backend_listen.key.trim().is_empty() {
            missing.push("backend_listen.key");
        }
        if !missing.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{} required in {mode} mode",
                missing.join(", ")
            )));
        }

        if self.auto_check.interval_secs < MIN_CHECK_INTERVAL_SECS {
            return Err(ConfigError::Invalid(format!(
                "auto_check.interval_secs must be at least {MIN_CHECK_INTERVAL_SECS}"
            )));
        }
        if self.auto_check.api_fail_threshold == 0 {
            return Err(ConfigError::Invalid(
                "auto_check.api_fail_threshold must be at least 1".to_string(),
            ));
        }
        if self.cloudflare.ttl == 0 {
            return Err(ConfigError::Invalid("cloudflare.ttl must be positive".to_string()));
        }
        if mode.runs_backend() && self.backend_listen.port == 0 {
            return Err(ConfigError::Invalid("backend_listen.port must be 1-65535".to_string()));
        }
        if self.network.proxy_enabled && self.network.proxy.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "network.proxy is required when network.proxy_enabled is set".to_string(),
            ));
        }
        Ok(())
    }

    /// Outbound proxy, if enabled.
    pub fn proxy(&self) -> Option<String> {
        self.network
            .proxy_enabled
            .then(|| self.network.proxy.trim().to_string())
            .filter(|p| !p.is_empty())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.auto_check.interval_secs)
    }

    pub fn failover_settings(&self) -> FailoverSettings {
        FailoverSettings {
            ttl: self.cloudflare.ttl,
            proxied: self.cloudflare.proxied,
            api_fail_threshold: self.auto_check.api_fail_threshold,
            super_admin_id: self.telegram.super_admin_id,
        }
    }

    /// `database.file`, else the platform data directory.
    pub fn database_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(file) = &self.database.file {
            return Ok(file.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR).join("failover.db"))
            .context("Cannot determine data directory; set database.file")
    }
}

/// Config path: CLI argument, else `DNS_FAILOVER_CONFIG`, else the platform
/// config directory.
pub fn resolve_path(arg: Option<String>) -> anyhow::Result<PathBuf> {
    if let Some(path) = arg.filter(|a| !a.trim().is_empty()) {
        return Ok(PathBuf::from(path));
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join("config.toml"))
        .with_context(|| format!("Cannot determine config directory; pass a path or set {CONFIG_ENV}"))
}
