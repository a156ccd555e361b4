//! Configuration management for Warden
//!
//! Configuration is loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache engine selection and tuning
    pub cache: CacheConfig,
    /// One-time code issuance
    pub otp: OtpConfig,
    /// Prometheus listen address; metrics are not exported when unset
    pub metrics_addr: Option<SocketAddr>,
    /// Emit JSON log lines instead of human-readable ones
    pub json_logs: bool,
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub engine: EngineConfig,
    /// Background sweep period for the in-memory engine
    pub prune_interval: Option<Duration>,
}

/// Which engine backs the cache
#[derive(Debug, Clone)]
pub enum EngineConfig {
    InMemory,
    Embedded(EmbeddedConfig),
    Redis(RedisConfig),
}

/// Embedded on-disk store settings
#[derive(Debug, Clone)]
pub struct EmbeddedConfig {
    pub path: PathBuf,
    pub in_memory: bool,
    pub disable_logging: bool,
}

/// Redis endpoint settings
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db_index: i64,
    /// Bound applied to every request
    pub timeout: Duration,
    /// `COUNT` hint per SCAN page
    pub scan_count: usize,
}

impl RedisConfig {
    /// Connection parameters for this endpoint
    ///
    /// Built field by field so credentials reach the server verbatim,
    /// whatever characters they contain.
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db_index,
                username: self.username.clone(),
                password: self.password.clone(),
            },
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            username: None,
            password: None,
            db_index: 0,
            timeout: Duration::from_millis(2000),
            scan_count: 100,
        }
    }
}

/// One-time code settings
#[derive(Debug, Clone)]
pub struct OtpConfig {
    /// Digits per code
    pub code_length: usize,
    /// How long an issued code stays valid
    pub code_ttl: Duration,
    /// Codes allowed per (medium, credential) within `send_window`
    pub send_limit: usize,
    pub send_window: Duration,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            code_ttl: Duration::from_secs(300),
            send_limit: 3,
            send_window: Duration::from_secs(600),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let engine_name = lookup("CACHE_ENGINE").unwrap_or_else(|| "memory".to_string());
        let engine = match engine_name.trim().to_ascii_lowercase().as_str() {
            "memory" | "inmemory" | "heap" => EngineConfig::InMemory,
            "embedded" | "badger" | "sled" => EngineConfig::Embedded(EmbeddedConfig {
                path: lookup("CACHE_EMBEDDED_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./data/cache")),
                in_memory: parse_bool(&lookup, "CACHE_EMBEDDED_IN_MEMORY")?,
                disable_logging: parse_bool(&lookup, "CACHE_EMBEDDED_DISABLE_LOGGING")?,
            }),
            "redis" => {
                let defaults = RedisConfig::default();
                EngineConfig::Redis(RedisConfig {
                    host: lookup("REDIS_HOST").unwrap_or(defaults.host),
                    port: parse_or(&lookup, "REDIS_PORT", defaults.port)?,
                    username: lookup("REDIS_USERNAME").filter(|v| !v.is_empty()),
                    password: lookup("REDIS_PASSWORD").filter(|v| !v.is_empty()),
                    db_index: parse_or(&lookup, "REDIS_DB_INDEX", defaults.db_index)?,
                    timeout: Duration::from_millis(parse_or(&lookup, "REDIS_TIMEOUT_MS", 2000u64)?),
                    scan_count: parse_or(&lookup, "REDIS_SCAN_COUNT", defaults.scan_count)?,
                })
            }
            other => bail!("Unsupported CACHE_ENGINE: {}", other),
        };

        let prune_secs: u64 = parse_or(&lookup, "CACHE_PRUNE_INTERVAL_SECONDS", 60)?;
        let prune_interval = (prune_secs > 0).then(|| Duration::from_secs(prune_secs));

        let otp_defaults = OtpConfig::default();
        let otp = OtpConfig {
            code_length: parse_or(&lookup, "OTP_CODE_LENGTH", otp_defaults.code_length)?,
            code_ttl: Duration::from_secs(parse_or(&lookup, "OTP_CODE_TTL_SECONDS", 300u64)?),
            send_limit: parse_or(&lookup, "OTP_SEND_LIMIT", otp_defaults.send_limit)?,
            send_window: Duration::from_secs(parse_or(&lookup, "OTP_SEND_WINDOW_SECONDS", 600u64)?),
        };
        if otp.code_length == 0 {
            bail!("OTP_CODE_LENGTH must be at least 1");
        }

        let metrics_addr = match lookup("METRICS_ADDR").filter(|v| !v.is_empty()) {
            Some(addr) => Some(addr.parse().context("Invalid METRICS_ADDR")?),
            None => None,
        };

        let json_logs = lookup("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(Self {
            cache: CacheConfig {
                engine,
                prune_interval,
            },
            otp,
            metrics_addr,
            json_logs,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("Invalid {}", key)),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &str) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some("1") | Some("true") | Some("TRUE") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("FALSE") | Some("no") => Ok(false),
        Some(other) => bail!("Invalid {}: {}", key, other),
    }
}
