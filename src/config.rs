//! Gateway configuration parsed from environment variables.
//!
//! One [`GatewayConfig`] describes the game gateway and every timing knob of
//! the session engine. The per-account [`AccountContext`] is passed to each
//! component explicitly so several accounts can live in one process.

use std::fmt;
use std::time::Duration;

use url::form_urlencoded;

use crate::error::ConfigError;

pub const DEFAULT_SERVER_URL: &str = "wss://gate-obt.nqf.qq.com/prod/ws";
pub const DEFAULT_ORIGIN: &str = "https://gate-obt.nqf.qq.com";
pub const DEFAULT_CLIENT_VERSION: &str = "1.6.0.14_20251224";
pub const DEFAULT_OS: &str = "iOS";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 18_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148 MicroMessenger/8.0.56";

pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 25;
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_HEARTBEAT_MAX_MISSES: u32 = 3;
pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;
pub const DEFAULT_RECONNECT_BASE_MS: u64 = 1_000;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 10_000;
pub const DEFAULT_MALFORMED_FRAME_LIMIT: u32 = 5;

/// Login platform; selects the vendor's auth backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Qq,
    Wx,
}

impl Platform {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Qq => "qq",
            Self::Wx => "wx",
        }
    }

    /// Parse `qq` or `wx`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPlatform`] for anything else.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "qq" => Ok(Self::Qq),
            "wx" => Ok(Self::Wx),
            _ => Err(ConfigError::UnknownPlatform(raw.to_owned())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the account a client instance serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    pub account_id: String,
    pub platform: Platform,
}

impl AccountContext {
    #[must_use]
    pub fn new(account_id: impl Into<String>, platform: Platform) -> Self {
        Self { account_id: account_id.into(), platform }
    }
}

/// Device fingerprint sent with the login request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    pub sys_software: String,
    pub network: String,
    pub memory: String,
    pub device_id: String,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            sys_software: "iOS 26.2.1".to_owned(),
            network: "wifi".to_owned(),
            memory: "7672".to_owned(),
            device_id: "iPhone X<iPhone18,3>".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatPolicy {
    pub interval: Duration,
    pub timeout: Duration,
    pub max_misses: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    /// Exponential delay for the 1-based `attempt`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << shift).min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub server_url: String,
    pub origin: String,
    pub user_agent: String,
    pub client_version: String,
    pub os: String,
    pub device: DeviceProfile,
    pub heartbeat: HeartbeatPolicy,
    pub reconnect: ReconnectPolicy,
    pub login_timeout: Duration,
    pub rpc_timeout: Duration,
    /// Consecutive undecodable frames tolerated before the link is dropped.
    pub malformed_frame_limit: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_owned(),
            origin: DEFAULT_ORIGIN.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            client_version: DEFAULT_CLIENT_VERSION.to_owned(),
            os: DEFAULT_OS.to_owned(),
            device: DeviceProfile::default(),
            heartbeat: HeartbeatPolicy {
                interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
                timeout: Duration::from_secs(DEFAULT_HEARTBEAT_TIMEOUT_SECS),
                max_misses: DEFAULT_HEARTBEAT_MAX_MISSES,
            },
            reconnect: ReconnectPolicy {
                max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
                base_delay: Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
                max_delay: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
            },
            login_timeout: Duration::from_secs(DEFAULT_LOGIN_TIMEOUT_SECS),
            rpc_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
            malformed_frame_limit: DEFAULT_MALFORMED_FRAME_LIMIT,
        }
    }
}

impl GatewayConfig {
    /// Build typed gateway config from environment variables.
    ///
    /// All optional; defaults in parentheses:
    /// - `FARM_GATEWAY_URL` (`wss://gate-obt.nqf.qq.com/prod/ws`)
    /// - `FARM_GATEWAY_ORIGIN`, `FARM_USER_AGENT`
    /// - `FARM_CLIENT_VERSION` (`1.6.0.14_20251224`), `FARM_OS` (`iOS`)
    /// - `FARM_HEARTBEAT_INTERVAL_SECS` (25), `FARM_HEARTBEAT_TIMEOUT_SECS` (5),
    ///   `FARM_HEARTBEAT_MAX_MISSES` (3)
    /// - `FARM_LOGIN_TIMEOUT_SECS` (10), `FARM_RPC_TIMEOUT_SECS` (10)
    /// - `FARM_RECONNECT_ATTEMPTS` (3), `FARM_RECONNECT_BASE_MS` (1000),
    ///   `FARM_RECONNECT_MAX_MS` (10000)
    /// - `FARM_MALFORMED_FRAME_LIMIT` (5)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a numeric variable does not
    /// parse, or when an interval/limit is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let heartbeat = HeartbeatPolicy {
            interval: Duration::from_secs(env_positive("FARM_HEARTBEAT_INTERVAL_SECS", DEFAULT_HEARTBEAT_INTERVAL_SECS)?),
            timeout: Duration::from_secs(env_positive("FARM_HEARTBEAT_TIMEOUT_SECS", DEFAULT_HEARTBEAT_TIMEOUT_SECS)?),
            max_misses: env_positive("FARM_HEARTBEAT_MAX_MISSES", DEFAULT_HEARTBEAT_MAX_MISSES)?,
        };
        let reconnect = ReconnectPolicy {
            max_attempts: env_parse("FARM_RECONNECT_ATTEMPTS", DEFAULT_RECONNECT_ATTEMPTS)?,
            base_delay: Duration::from_millis(env_parse("FARM_RECONNECT_BASE_MS", DEFAULT_RECONNECT_BASE_MS)?),
            max_delay: Duration::from_millis(env_parse("FARM_RECONNECT_MAX_MS", DEFAULT_RECONNECT_MAX_MS)?),
        };

        Ok(Self {
            server_url: env_string("FARM_GATEWAY_URL", defaults.server_url),
            origin: env_string("FARM_GATEWAY_ORIGIN", defaults.origin),
            user_agent: env_string("FARM_USER_AGENT", defaults.user_agent),
            client_version: env_string("FARM_CLIENT_VERSION", defaults.client_version),
            os: env_string("FARM_OS", defaults.os),
            device: defaults.device,
            heartbeat,
            reconnect,
            login_timeout: Duration::from_secs(env_positive("FARM_LOGIN_TIMEOUT_SECS", DEFAULT_LOGIN_TIMEOUT_SECS)?),
            rpc_timeout: Duration::from_secs(env_positive("FARM_RPC_TIMEOUT_SECS", DEFAULT_RPC_TIMEOUT_SECS)?),
            malformed_frame_limit: env_positive("FARM_MALFORMED_FRAME_LIMIT", DEFAULT_MALFORMED_FRAME_LIMIT)?,
        })
    }

    /// Gateway URL for one login attempt. Query values are form-encoded.
    #[must_use]
    pub fn gateway_url(&self, platform: Platform, credential: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("platform", &platform.to_string())
            .append_pair("os", &self.os)
            .append_pair("ver", &self.client_version)
            .append_pair("code", credential)
            .append_pair("openID", "")
            .finish();
        format!("{}?{query}", self.server_url)
    }
}

/// Shorten a login code for logs.
#[must_use]
pub fn redact_credential(credential: &str) -> String {
    let prefix = credential.chars().take(8).collect::<String>();
    format!("{prefix}...")
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

fn env_parse<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        _ => Ok(default),
    }
}

fn env_positive<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default + ToString,
{
    let value = env_parse(key, default)?;
    if value == T::default() {
        return Err(ConfigError::InvalidValue { key, value: value.to_string() });
    }
    Ok(value)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
