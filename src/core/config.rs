//! # Global engine configuration.
//!
//! Provides [`Config`] centralized settings for the bus and the health-check
//! engine, and [`Switches`], the runtime-mutable toggles read on every check.
//!
//! Config is used in three ways:
//! 1. **Bus creation**: `EventBus::with_config(&config)` (queue sizing, overflow wait)
//! 2. **Checker defaults**: heartbeat / delete timeouts when no metadata override exists
//! 3. **Reactor**: sweep interval
//!
//! ## Sentinel values
//! - `ring_buffer_size = 0` → clamped to 1; above `MAX_PUBLISHER_CAPACITY` → clamped to it
//! - `check_interval_ms = 0` → clamped to 1 ms
//!
//! ## File format
//! ```toml
//! ring_buffer_size = 16384
//! overflow_wait_ms = 3000
//! heartbeat_timeout_ms = 15000
//! ip_delete_timeout_ms = 30000
//! check_interval_ms = 5000
//! expire_instance = true
//! health_check_enabled = true
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::events::MAX_PUBLISHER_CAPACITY;

/// Global configuration for the liveness engine.
///
/// ## Field semantics
/// - `ring_buffer_size`: default queue capacity of each publisher (min 1)
/// - `overflow_wait_ms`: how long a publish waits for room when the queue is
///   full and nobody consumes yet
/// - `heartbeat_timeout_ms`: default silence before an instance turns unhealthy
/// - `ip_delete_timeout_ms`: default silence before an instance is removed
/// - `check_interval_ms`: period of the per-client sweep
/// - `expire_instance`: initial value of the expire switch
/// - `health_check_enabled`: initial value of the global health-check switch
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ring_buffer_size: usize,
    pub overflow_wait_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub ip_delete_timeout_ms: u64,
    pub check_interval_ms: u64,
    pub expire_instance: bool,
    pub health_check_enabled: bool,
}

impl Config {
    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Returns the publisher capacity clamped to `1..=MAX_PUBLISHER_CAPACITY`.
    #[inline]
    pub fn ring_buffer_size_clamped(&self) -> usize {
        self.ring_buffer_size.clamp(1, MAX_PUBLISHER_CAPACITY)
    }

    #[inline]
    pub fn overflow_wait(&self) -> Duration {
        Duration::from_millis(self.overflow_wait_ms)
    }

    /// Returns the sweep period, at least 1 ms.
    #[inline]
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms.max(1))
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `ring_buffer_size = 16384`
    /// - `overflow_wait_ms = 3000`
    /// - `heartbeat_timeout_ms = 15000`
    /// - `ip_delete_timeout_ms = 30000`
    /// - `check_interval_ms = 5000`
    /// - `expire_instance = true`
    /// - `health_check_enabled = true`
    fn default() -> Self {
        Self {
            ring_buffer_size: 16384,
            overflow_wait_ms: 3000,
            heartbeat_timeout_ms: 15_000,
            ip_delete_timeout_ms: 30_000,
            check_interval_ms: 5000,
            expire_instance: true,
            health_check_enabled: true,
        }
    }
}

/// Reads a [`Config`] from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Config::from_toml_str(&content)
}

/// Runtime-mutable switches consulted on every check.
#[derive(Debug)]
pub struct Switches {
    expire_instance: AtomicBool,
    health_check: AtomicBool,
}

impl Switches {
    pub fn new(expire_instance: bool, health_check: bool) -> Self {
        Self {
            expire_instance: AtomicBool::new(expire_instance),
            health_check: AtomicBool::new(health_check),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.expire_instance, config.health_check_enabled)
    }

    /// Whether silent instances past their delete timeout are removed.
    pub fn is_expire_instance_enabled(&self) -> bool {
        self.expire_instance.load(Ordering::Acquire)
    }

    pub fn set_expire_instance(&self, enabled: bool) {
        self.expire_instance.store(enabled, Ordering::Release);
    }

    /// Whether sweeps run at all.
    pub fn is_health_check_enabled(&self) -> bool {
        self.health_check.load(Ordering::Acquire)
    }

    pub fn set_health_check(&self, enabled: bool) {
        self.health_check.store(enabled, Ordering::Release);
    }
}

impl Default for Switches {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = Config::from_toml_str("heartbeat_timeout_ms = 5000\nexpire_instance = false\n")
            .expect("parse");
        assert_eq!(cfg.heartbeat_timeout_ms, 5000);
        assert!(!cfg.expire_instance);
        assert_eq!(cfg.ip_delete_timeout_ms, 30_000);
        assert_eq!(cfg.ring_buffer_size, 16384);
    }

    #[test]
    fn test_sentinels_are_clamped() {
        let cfg = Config {
            ring_buffer_size: 0,
            check_interval_ms: 0,
            ..Config::default()
        };
        assert_eq!(cfg.ring_buffer_size_clamped(), 1);
        assert_eq!(cfg.check_interval(), Duration::from_millis(1));

        let cfg = Config::from_toml_str("ring_buffer_size = 9223372036854775807").expect("parse");
        assert_eq!(cfg.ring_buffer_size_clamped(), MAX_PUBLISHER_CAPACITY);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "check_interval_ms = 250").expect("write");
        let cfg = load_config(file.path()).expect("load");
        assert_eq!(cfg.check_interval(), Duration::from_millis(250));

        let err = load_config("/definitely/not/here.toml").unwrap_err();
        assert_eq!(err.as_label(), "config_io");

        let err = Config::from_toml_str("check_interval_ms = \"soon\"").unwrap_err();
        assert_eq!(err.as_label(), "config_parse");
    }

    #[test]
    fn test_switches_follow_config_and_toggle() {
        let switches = Switches::from_config(&Config {
            expire_instance: false,
            ..Config::default()
        });
        assert!(!switches.is_expire_instance_enabled());
        assert!(switches.is_health_check_enabled());
        switches.set_expire_instance(true);
        switches.set_health_check(false);
        assert!(switches.is_expire_instance_enabled());
        assert!(!switches.is_health_check_enabled());
    }
}
