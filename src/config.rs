//! Service configuration, built from environment variables.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::store::memory::DEFAULT_CAPACITY;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DB_PATH: &str = "./data/intake.db";

/// Which message store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Bounded in-memory store; contents are lost on restart.
    Memory,
    /// Durable libSQL file.
    LibSql,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "libsql" | "sqlite" => Ok(Self::LibSql),
            other => Err(format!("expected memory or libsql, got {other:?}")),
        }
    }
}

/// Intake service configuration.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub store: StoreKind,
    pub db_path: PathBuf,
    pub memory_capacity: usize,
    /// Allowed CORS origins. Empty or `*` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            store: StoreKind::LibSql,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            memory_capacity: DEFAULT_CAPACITY,
            cors_origins: Vec::new(),
        }
    }
}

impl IntakeConfig {
    /// Build config from `INTAKE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Unset or blank keys keep
    /// their defaults; present but invalid values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("INTAKE_BIND") {
            config.bind = parse("INTAKE_BIND", &raw)?;
        }
        if let Some(raw) = get("INTAKE_PORT") {
            config.port = parse("INTAKE_PORT", &raw)?;
        }
        if let Some(raw) = get("INTAKE_STORE") {
            config.store = parse("INTAKE_STORE", &raw)?;
        }
        if let Some(raw) = get("INTAKE_DB_PATH") {
            config.db_path = PathBuf::from(raw);
        }
        if let Some(raw) = get("INTAKE_MEMORY_CAPACITY") {
            let capacity: usize = parse("INTAKE_MEMORY_CAPACITY", &raw)?;
            if capacity == 0 {
                return Err(invalid("INTAKE_MEMORY_CAPACITY", "must be at least 1"));
            }
            config.memory_capacity = capacity;
        }
        if let Some(raw) = get("INTAKE_CORS_ORIGINS") {
            config.cors_origins = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Database path for tools that only need the store location.
pub fn db_path_from_env() -> PathBuf {
    std::env::var("INTAKE_DB_PATH")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| invalid(key, format!("{raw:?}: {e}")))
}
