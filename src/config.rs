use std::fs;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::locking::{LockingConfig, LockingSettings};
use crate::transaction::EngineConfig;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// When false, per-lock debug traffic (`bankcore::locking`) is silenced
    #[serde(default = "default_true")]
    pub enable_tracing: bool,
    #[serde(default)]
    pub locking: LockingSettings,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub fixtures: FixturesConfig,
}

/// CSV input/output locations for the batch binary
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FixturesConfig {
    pub input_dir: String,
    pub output_dir: String,
}

impl Default for FixturesConfig {
    fn default() -> Self {
        Self {
            input_dir: "fixtures".to_string(),
            output_dir: "output".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Normalised lock policy (non-positive values replaced by defaults)
    pub fn locking_config(&self) -> LockingConfig {
        LockingConfig::from(self.locking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MINIMAL: &str = r#"
log_level: info
log_dir: logs
log_file: bankcore.log
use_json: false
rotation: never
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert!(config.enable_tracing);
        assert_eq!(config.engine.house_account_id, -1);
        assert_eq!(config.fixtures.input_dir, "fixtures");

        let locking = config.locking_config();
        assert_eq!(locking.max_attempts(), 5);
        assert_eq!(locking.timeout(), Duration::from_millis(200));
    }

    #[test]
    fn test_locking_section_is_normalised() {
        let yaml = format!(
            "{MINIMAL}locking:\n  max_attempts: 3\n  base_delay_ms: -1\n  max_delay_ms: 500\n  timeout_ms: 0\nengine:\n  worker_threads: 8\n"
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();
        let locking = config.locking_config();
        assert_eq!(locking.max_attempts(), 3);
        assert_eq!(locking.base_delay(), Duration::from_millis(100));
        assert_eq!(locking.max_delay(), Duration::from_millis(500));
        assert_eq!(locking.timeout(), Duration::from_millis(200));
        assert_eq!(config.engine.worker_threads, 8);
        assert!(config.engine.charge_transfer_fees);
    }

    #[test]
    fn test_missing_required_field_fails() {
        assert!(AppConfig::from_yaml("log_level: info\n").is_err());
    }
}
