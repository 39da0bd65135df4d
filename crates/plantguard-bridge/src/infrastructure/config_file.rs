//! TOML configuration file for the bridge.
//!
//! Looked up at `--config <path>` when given, otherwise at the platform
//! default:
//! - Windows:  `%APPDATA%\PlantGuard\bridge.toml`
//! - Linux:    `~/.config/plantguard/bridge.toml`
//! - macOS:    `~/Library/Application Support/PlantGuard/bridge.toml`
//!
//! Every section and key is optional; a missing default file just means
//! defaults.  Example:
//!
//! ```toml
//! [relay]
//! host = "192.168.1.20"
//! port = 3000
//!
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 9600
//! delimiter = "crlf"
//!
//! [commands]
//! open = "A"
//! close = "F"
//!
//! [devices]
//! manufacturer_substrings = ["arduino", "wch.cn"]
//! ids = [{ vendor_id = "2341" }, { vendor_id = "1a86", product_id = "7523" }]
//!
//! [restart]
//! max_retries = 20
//! initial_backoff_ms = 500
//! ```
//!
//! CLI flags are applied on top of the result in `main.rs`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use plantguard_core::{CommandCodes, CommandCodesError, Delimiter, KnownDevices};

use crate::domain::config::{
    BridgeConfig, RestartPolicy, SerialOptions, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT,
};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The `[commands]` table is unusable.
    #[error("invalid [commands] table: {0}")]
    Commands(#[from] CommandCodesError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// On-disk bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeFileConfig {
    pub relay: RelaySection,
    pub serial: SerialSection,
    pub commands: CommandCodes,
    pub devices: KnownDevices,
    pub restart: RestartSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelaySection {
    #[serde(default = "default_relay_host")]
    pub host: String,
    #[serde(default = "default_relay_port")]
    pub port: u16,
    /// Seconds between relay connection attempts.
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialSection {
    /// Fixed serial path; detection is skipped when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default)]
    pub delimiter: Delimiter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_terminator: Option<Delimiter>,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestartSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_healthy_after_ms")]
    pub healthy_after_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_relay_host() -> String {
    "127.0.0.1".to_string()
}
fn default_relay_port() -> u16 {
    3000
}
fn default_reconnect_secs() -> u64 {
    2
}
fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}
fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT.as_millis() as u64
}
fn default_initial_backoff_ms() -> u64 {
    1_000
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_healthy_after_ms() -> u64 {
    5_000
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            host: default_relay_host(),
            port: default_relay_port(),
            reconnect_secs: default_reconnect_secs(),
        }
    }
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            delimiter: Delimiter::default(),
            command_terminator: None,
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for RestartSection {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
            healthy_after_ms: default_healthy_after_ms(),
        }
    }
}

impl BridgeFileConfig {
    /// Converts the file schema into runtime configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Commands`] when the code table is empty or ambiguous.
    pub fn into_bridge_config(self) -> Result<BridgeConfig, ConfigError> {
        self.commands.validate()?;

        Ok(BridgeConfig {
            relay_url: relay_url(&self.relay.host, self.relay.port),
            relay_reconnect_interval: Duration::from_secs(self.relay.reconnect_secs),
            serial_port: self.serial.port,
            serial: SerialOptions {
                baud_rate: self.serial.baud_rate,
                delimiter: self.serial.delimiter,
                command_terminator: self.serial.command_terminator,
                codes: self.commands,
                read_timeout: Duration::from_millis(self.serial.read_timeout_ms.max(1)),
            },
            devices: self.devices,
            restart: RestartPolicy {
                max_retries: self.restart.max_retries,
                initial_backoff: Duration::from_millis(self.restart.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.restart.max_backoff_ms),
                multiplier: self.restart.multiplier,
                healthy_after: Duration::from_millis(self.restart.healthy_after_ms),
            },
            ..BridgeConfig::default()
        })
    }
}

/// `ws://host:port/`, bracketing bare IPv6 addresses.
pub fn relay_url(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("ws://[{host}]:{port}/")
    } else {
        format!("ws://{host}:{port}/")
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Path of the bridge config file in the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    platform_config_dir().map(|dir| dir.join("bridge.toml"))
}

/// Loads the bridge config file.
///
/// With `path`, the file must exist.  Without it, the platform default path is
/// tried and a missing file yields the defaults.
///
/// # Errors
///
/// [`ConfigError::Io`] for unreadable files, [`ConfigError::Parse`] for
/// malformed TOML.
pub fn load_config(path: Option<&Path>) -> Result<BridgeFileConfig, ConfigError> {
    match path {
        Some(path) => read_config(path),
        None => match default_config_path() {
            Some(path) => match read_config(&path) {
                Err(ConfigError::Io { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    Ok(BridgeFileConfig::default())
                }
                other => other,
            },
            None => Ok(BridgeFileConfig::default()),
        },
    }
}

fn read_config(path: &Path) -> Result<BridgeFileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Resolves the platform config directory including the `PlantGuard` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("PlantGuard"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("plantguard"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("PlantGuard")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use plantguard_core::UsbId;

    #[test]
    fn test_empty_file_yields_defaults() {
        // Arrange / Act
        let file: BridgeFileConfig = toml::from_str("").unwrap();
        let config = file.into_bridge_config().unwrap();

        // Assert
        assert_eq!(config.relay_url, "ws://127.0.0.1:3000/");
        assert_eq!(config.serial, SerialOptions::default());
        assert_eq!(config.restart, RestartPolicy::default());
        assert_eq!(config.devices, KnownDevices::default());
        assert_eq!(config.serial_port, None);
    }

    #[test]
    fn test_sections_override_defaults() {
        // Arrange
        let text = r#"
            [relay]
            host = "10.0.0.5"
            port = 4000

            [serial]
            port = "COM3"
            delimiter = "crlf"
            command_terminator = "\\n"

            [commands]
            open = "OPEN"
            close = "CLOSE"

            [devices]
            manufacturer_substrings = ["wch.cn"]
            ids = [{ vendor_id = "1a86", product_id = "7523" }]

            [restart]
            max_retries = 5
            initial_backoff_ms = 250
            healthy_after_ms = 1500
        "#;

        // Act
        let file: BridgeFileConfig = toml::from_str(text).unwrap();
        let config = file.into_bridge_config().unwrap();

        // Assert
        assert_eq!(config.relay_url, "ws://10.0.0.5:4000/");
        assert_eq!(config.serial_port.as_deref(), Some("COM3"));
        assert_eq!(config.serial.delimiter, Delimiter::crlf());
        assert_eq!(config.serial.command_terminator, Some(Delimiter::lf()));
        assert_eq!(config.serial.codes, CommandCodes::words());
        assert_eq!(config.devices.ids, vec![UsbId::pair("1a86", "7523")]);
        assert_eq!(config.restart.max_retries, Some(5));
        assert_eq!(config.restart.initial_backoff, Duration::from_millis(250));
        assert_eq!(config.restart.max_backoff, Duration::from_secs(30));
        assert_eq!(config.restart.healthy_after, Duration::from_millis(1500));
    }

    #[test]
    fn test_ambiguous_command_codes_are_rejected() {
        let text = "[commands]\nopen = \"X\"\nclose = \"X\"\n";
        let file: BridgeFileConfig = toml::from_str(text).unwrap();
        assert!(matches!(
            file.into_bridge_config(),
            Err(ConfigError::Commands(CommandCodesError::Ambiguous(_)))
        ));
    }

    #[test]
    fn test_invalid_delimiter_is_a_parse_error() {
        let result: Result<BridgeFileConfig, _> = toml::from_str("[serial]\ndelimiter = \"\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_io_error() {
        let result = load_config(Some(Path::new("/definitely/not/here/bridge.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_explicit_file_is_read() {
        // Arrange
        let name = format!("plantguard-bridge-{}.toml", std::process::id());
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, "[serial]\nbaud_rate = 115200\n").unwrap();

        // Act
        let result = load_config(Some(&path));
        let _ = std::fs::remove_file(&path);

        // Assert
        assert_eq!(result.unwrap().serial.baud_rate, 115_200);
    }

    #[test]
    fn test_relay_url_brackets_ipv6_hosts() {
        assert_eq!(relay_url("::1", 3000), "ws://[::1]:3000/");
        assert_eq!(relay_url("localhost", 3000), "ws://localhost:3000/");
    }
}
