//! Bridge runtime configuration.
//!
//! [`BridgeConfig`] is the single source of truth for every runtime setting.
//! `main.rs` builds it by layering CLI flags over the TOML file over the
//! defaults below; the library never reads the environment itself.

use std::time::Duration;

use plantguard_core::{CommandCodes, Delimiter, KnownDevices};

/// Baud rate the PlantGuard firmware is compiled for.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// How often the serial I/O thread wakes up when the device is silent.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Everything a serial session needs besides the port path.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialOptions {
    pub baud_rate: u32,
    /// Terminator of inbound frames.
    pub delimiter: Delimiter,
    /// Bytes appended to every outbound command.  `None` sends the bare code,
    /// which is what the firmware's single-byte read expects.
    pub command_terminator: Option<Delimiter>,
    /// Action ↔ wire code table.
    pub codes: CommandCodes,
    /// Serial read timeout; bounds how long a queued write waits.
    pub read_timeout: Duration,
}

impl Default for SerialOptions {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            delimiter: Delimiter::default(),
            command_terminator: None,
            codes: CommandCodes::default(),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Backoff schedule for reopening the serial port.
///
/// The delay after the `n`th consecutive failure is
/// `initial_backoff * multiplier^(n-1)`, capped at `max_backoff`.  A session
/// counts as healthy, and clears the failure count, only once it has stayed
/// open for `healthy_after`; a board that fails straight after opening keeps
/// counting towards `max_retries`.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartPolicy {
    /// Consecutive failures tolerated before giving up; `None` retries forever.
    pub max_retries: Option<u32>,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Uptime after which a session no longer counts as a failure.
    pub healthy_after: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            healthy_after: Duration::from_secs(5),
        }
    }
}

impl RestartPolicy {
    /// Delay before the next attempt after `failures` consecutive failures.
    pub fn backoff(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exponent = failures.saturating_sub(1).min(64) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let secs = self.initial_backoff.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            self.max_backoff
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Whether a session that stayed open for `uptime` resets the failure
    /// count.
    pub fn is_healthy(&self, uptime: Duration) -> bool {
        uptime >= self.healthy_after
    }

    /// Whether another attempt is allowed after `failures` consecutive failures.
    pub fn allows(&self, failures: u32) -> bool {
        self.max_retries.map_or(true, |max| failures <= max)
    }
}

/// All runtime configuration for the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// WebSocket URL of the relay hub (`ws://host:port/`).
    pub relay_url: String,
    /// Pause between relay connection attempts.
    pub relay_reconnect_interval: Duration,
    /// Operator-supplied serial path; skips detection when set.
    pub serial_port: Option<String>,
    /// Path used when nothing is supplied or detected.
    pub platform_default_port: String,
    pub serial: SerialOptions,
    pub devices: KnownDevices,
    pub restart: RestartPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:3000/".to_string(),
            relay_reconnect_interval: Duration::from_secs(2),
            serial_port: None,
            platform_default_port: plantguard_core::platform_default_path().to_string(),
            serial: SerialOptions::default(),
            devices: KnownDevices::default(),
            restart: RestartPolicy::default(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_baud_rate_is_9600() {
        assert_eq!(SerialOptions::default().baud_rate, 9600);
    }

    #[test]
    fn test_default_command_terminator_is_none() {
        assert_eq!(SerialOptions::default().command_terminator, None);
    }

    #[test]
    fn test_default_relay_url_points_at_local_hub() {
        assert_eq!(BridgeConfig::default().relay_url, "ws://127.0.0.1:3000/");
    }

    #[test]
    fn test_backoff_doubles_per_failure() {
        // Arrange
        let policy = RestartPolicy::default();

        // Act / Assert
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RestartPolicy::default();
        assert_eq!(policy.backoff(10), Duration::from_secs(30));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_multiplier_below_one_does_not_shrink_backoff() {
        let policy = RestartPolicy {
            multiplier: 0.5,
            ..RestartPolicy::default()
        };
        assert_eq!(policy.backoff(3), Duration::from_secs(1));
    }

    #[test]
    fn test_unbounded_policy_always_allows() {
        assert!(RestartPolicy::default().allows(u32::MAX));
    }

    #[test]
    fn test_bounded_policy_stops_after_max_retries() {
        let policy = RestartPolicy {
            max_retries: Some(2),
            ..RestartPolicy::default()
        };
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }

    #[test]
    fn test_short_lived_session_is_not_healthy() {
        let policy = RestartPolicy::default();
        assert!(!policy.is_healthy(Duration::from_millis(10)));
        assert!(policy.is_healthy(Duration::from_secs(5)));
    }
}
