//! Application configuration loaded from JSON with environment overrides.
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use crate::drivers::capture::MAX_READBACK_SAMPLES;
use crate::drivers::settings::MAX_TRIGGER_LEVEL;
use crate::drivers::transport::{DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT};
use crate::drivers::{ControllerOptions, ScopeConfig};
pub const CONFIG_ENV: &str = "DPSCOPE_CONFIG";
pub const PORT_ENV: &str = "DPSCOPE_PORT";
pub const DEFAULT_CONFIG_FILE: &str = "dpscope.json";
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial port preselected in the GUI.
    pub port: Option<String>,
    pub baud_rate: u32,
    pub io_timeout_ms: u64,
    pub arm_timeout_ms: u64,
    pub readback_samples: u8,
    /// Where recordings and PNG exports are written.
    pub output_dir: PathBuf,
    pub scope: ScopeConfig,
}
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            io_timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            arm_timeout_ms: ControllerOptions::default().arm_timeout.as_millis() as u64,
            readback_samples: MAX_READBACK_SAMPLES,
            output_dir: PathBuf::from("."),
            scope: ScopeConfig::default(),
        }
    }
}
impl AppConfig {
    /// Loads from `$DPSCOPE_CONFIG`, else `./dpscope.json` if present, else
    /// defaults, then applies `$DPSCOPE_PORT`.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match env(CONFIG_ENV) {
            Some(path) => Self::from_path(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_path(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        if let Some(port) = env(PORT_ENV).filter(|p| !p.trim().is_empty()) {
            info!("Serial port overridden by {PORT_ENV}: {port}");
            config.port = Some(port);
        }
        config.validate()?;
        Ok(config)
    }
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = Self::from_json(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            bail!("baud_rate must be non-zero");
        }
        if self.io_timeout_ms == 0 {
            bail!("io_timeout_ms must be non-zero");
        }
        if !(1..=MAX_READBACK_SAMPLES).contains(&self.readback_samples) {
            bail!(
                "readback_samples must be in 1..={MAX_READBACK_SAMPLES}, got {}",
                self.readback_samples
            );
        }
        if self.scope.trigger_level > MAX_TRIGGER_LEVEL {
            bail!(
                "trigger_level must be at most {MAX_TRIGGER_LEVEL}, got {}",
                self.scope.trigger_level
            );
        }
        Ok(())
    }
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            arm_timeout: Duration::from_millis(self.arm_timeout_ms),
            readback_samples: self.readback_samples,
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::settings::Resolution;
    use crate::drivers::{SampleMode, VerticalScale};
    #[test]
    fn partial_json_keeps_defaults() {
        let config = AppConfig::from_json(
            r#"{"port": "/dev/ttyACM0", "scope": {"sample_mode": "Scope",
                "channels": [{"scale": "50 mV/div"}, {}]}}"#,
        )
        .unwrap();
        assert_eq!(config.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.readback_samples, 205);
        assert_eq!(config.scope.sample_mode, SampleMode::Scope);
        assert_eq!(config.scope.channels[0].scale, VerticalScale::Mv50);
        assert!(config.scope.channels[1].enabled);
    }
    #[test]
    fn invalid_values_are_rejected() {
        assert!(AppConfig::from_json(r#"{"baud_rate": 0}"#).is_err());
        assert!(AppConfig::from_json(r#"{"readback_samples": 0}"#).is_err());
        assert!(AppConfig::from_json(r#"{"readback_samples": 206}"#).is_err());
        assert!(AppConfig::from_json("not json").is_err());
        assert!(AppConfig::from_json(r#"{"scope": {"trigger_level": 1024}}"#).is_err());
    }
    #[test]
    fn trigger_and_resolution_settings_load() {
        let config = AppConfig::from_json(
            r#"{"scope": {"trigger_level": 1023, "noise_reject": true, "resolution": "High"}}"#,
        )
        .unwrap();
        assert_eq!(config.scope.trigger_level, MAX_TRIGGER_LEVEL);
        assert!(config.scope.noise_reject);
        assert_eq!(config.scope.resolution, Resolution::High);
    }
    #[test]
    fn env_selects_file_and_overrides_port() {
        let path = std::env::temp_dir().join(format!("dpscope-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"port": "COM3", "arm_timeout_ms": 500}"#).unwrap();
        let file = path.to_string_lossy().into_owned();
        let config = AppConfig::load_with(|key| match key {
            CONFIG_ENV => Some(file.clone()),
            PORT_ENV => Some("COM7".into()),
            _ => None,
        })
        .unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.port.as_deref(), Some("COM7"));
        assert_eq!(config.controller_options().arm_timeout, Duration::from_millis(500));
    }
    #[test]
    fn missing_config_file_names_the_path() {
        let err = AppConfig::load_with(|key| {
            (key == CONFIG_ENV).then(|| "/nonexistent/dpscope.json".to_string())
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/dpscope.json"));
    }
}
