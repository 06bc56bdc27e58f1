//! Configuration system for the Zengin client.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $ZENGIN_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/zengin/config.toml
//!   3. ~/.config/zengin/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZenginConfig {
    pub bank: BankConfig,
    pub sender: SenderConfig,
    pub integrity: IntegrityConfig,
    pub transport: TransportConfig,
    pub tls: TlsConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    /// Bank host to connect to.
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Our sender id, written into every outbound header.
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Stamp outbound messages and check inbound ones.
    pub check_enabled: bool,
    /// Byte offset of the amount subfield inside each data record.
    pub amount_offset: usize,
    /// Width of the amount subfield.
    pub amount_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// TCP connect timeout. 0 = OS default.
    pub connect_timeout_ms: u64,
    /// Socket read timeout. 0 = block forever.
    pub read_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Wrap the TCP connection in TLS.
    pub enabled: bool,
    /// DER client certificate, for banks that require client auth.
    pub client_cert_path: Option<PathBuf>,
    /// DER PKCS#8 private key matching `client_cert_path`.
    pub client_key_path: Option<PathBuf>,
    /// DER trust anchor for the bank's server certificate.
    pub trust_roots_path: Option<PathBuf>,
    /// Accept any server certificate when no trust roots are configured.
    /// Development only.
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database file for the sqlite backend.
    pub sqlite_path: PathBuf,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 20000,
        }
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            id: "TESTSENDER".to_string(),
        }
    }
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            check_enabled: true,
            amount_offset: 30,
            amount_length: 12,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            read_timeout_ms: 30_000,
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            client_cert_path: None,
            client_key_path: None,
            trust_roots_path: None,
            accept_invalid_certs: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            sqlite_path: data_dir().join("integrity.db"),
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.read_timeout_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("zengin")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("zengin")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ZenginConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            ZenginConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("ZENGIN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&ZenginConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply ZENGIN_* overrides looked up through `var`.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let flag = |v: String| v == "true" || v == "1";

        if let Some(v) = var("ZENGIN_BANK__HOST") {
            self.bank.host = v;
        }
        if let Some(p) = var("ZENGIN_BANK__PORT").and_then(|v| v.parse().ok()) {
            self.bank.port = p;
        }
        if let Some(v) = var("ZENGIN_SENDER__ID") {
            self.sender.id = v;
        }
        if let Some(v) = var("ZENGIN_INTEGRITY__CHECK_ENABLED") {
            self.integrity.check_enabled = flag(v);
        }
        if let Some(v) = var("ZENGIN_TLS__ENABLED") {
            self.tls.enabled = flag(v);
        }
        if let Some(v) = var("ZENGIN_TLS__ACCEPT_INVALID_CERTS") {
            self.tls.accept_invalid_certs = flag(v);
        }
        match var("ZENGIN_STORE__BACKEND").as_deref() {
            Some("memory") => self.store.backend = StoreBackend::Memory,
            Some("sqlite") => self.store.backend = StoreBackend::Sqlite,
            _ => {}
        }
    }
}
