//! Locking Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY_MS: u64 = 100;
pub const DEFAULT_MAX_DELAY_MS: u64 = 2_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 200;

/// Raw locking tunables as they appear in YAML.
///
/// Values are signed on purpose: operators may write `0` or `-1` to mean
/// "use the default", which [`LockingConfig::from`] resolves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LockingSettings {
    #[serde(default)]
    pub max_attempts: i64,
    #[serde(default)]
    pub base_delay_ms: i64,
    #[serde(default)]
    pub max_delay_ms: i64,
    #[serde(default)]
    pub timeout_ms: i64,
}

impl Default for LockingSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS as i64,
            base_delay_ms: DEFAULT_BASE_DELAY_MS as i64,
            max_delay_ms: DEFAULT_MAX_DELAY_MS as i64,
            timeout_ms: DEFAULT_TIMEOUT_MS as i64,
        }
    }
}

/// Immutable lock acquisition policy
///
/// # Invariants
/// - Every field is strictly positive
/// - Any non-positive input was replaced by its default at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockingConfig {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    timeout: Duration,
}

impl LockingConfig {
    /// Build a config, replacing each non-positive value with its default
    /// (5 attempts, 100 ms base delay, 2000 ms max delay, 200 ms timeout).
    pub fn new(max_attempts: i64, base_delay_ms: i64, max_delay_ms: i64, timeout_ms: i64) -> Self {
        Self {
            max_attempts: positive_or(max_attempts, DEFAULT_MAX_ATTEMPTS as u64) as u32,
            base_delay: Duration::from_millis(positive_or(base_delay_ms, DEFAULT_BASE_DELAY_MS)),
            max_delay: Duration::from_millis(positive_or(max_delay_ms, DEFAULT_MAX_DELAY_MS)),
            timeout: Duration::from_millis(positive_or(timeout_ms, DEFAULT_TIMEOUT_MS)),
        }
    }

    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[inline]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    #[inline]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Upper bound for a single acquisition attempt
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

impl From<LockingSettings> for LockingConfig {
    fn from(s: LockingSettings) -> Self {
        Self::new(s.max_attempts, s.base_delay_ms, s.max_delay_ms, s.timeout_ms)
    }
}

fn positive_or(value: i64, default: u64) -> u64 {
    if value > 0 {
        // u32 is the narrowest target; clamp so the cast above cannot wrap
        (value as u64).min(u32::MAX as u64)
    } else {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_non_positive_values() {
        let config = LockingConfig::new(0, -5, 0, -1);
        assert_eq!(config.max_attempts(), 5);
        assert_eq!(config.base_delay(), Duration::from_millis(100));
        assert_eq!(config.max_delay(), Duration::from_millis(2000));
        assert_eq!(config.timeout(), Duration::from_millis(200));
        assert_eq!(config, LockingConfig::default());
    }

    #[test]
    fn test_positive_values_are_kept() {
        let config = LockingConfig::new(3, 10, 500, 50);
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.base_delay(), Duration::from_millis(10));
        assert_eq!(config.max_delay(), Duration::from_millis(500));
        assert_eq!(config.timeout(), Duration::from_millis(50));
    }

    #[test]
    fn test_mixed_values() {
        let config = LockingConfig::new(7, 0, 900, -20);
        assert_eq!(config.max_attempts(), 7);
        assert_eq!(config.base_delay(), Duration::from_millis(100));
        assert_eq!(config.max_delay(), Duration::from_millis(900));
        assert_eq!(config.timeout(), Duration::from_millis(200));
    }

    #[test]
    fn test_from_settings() {
        let settings: LockingSettings =
            serde_yaml::from_str("max_attempts: 2\ntimeout_ms: 25\n").unwrap();
        let config = LockingConfig::from(settings);
        assert_eq!(config.max_attempts(), 2);
        assert_eq!(config.timeout(), Duration::from_millis(25));
        // missing keys deserialize to 0 -> default
        assert_eq!(config.base_delay(), Duration::from_millis(100));
    }
}
