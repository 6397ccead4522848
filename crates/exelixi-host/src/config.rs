//! Host configuration file format.
//!
//! Loads [`HostConfig`] from a TOML file (`exelixi.toml`) with environment
//! variable overrides via `EXELIXI_*` prefixed variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::driver::DeviceClass;

/// Platform searched for when nothing else is configured.
pub const DEFAULT_PLATFORM_NAME: &str = "Intel(R) FPGA";
/// Binary loaded when nothing else is configured.
pub const DEFAULT_BINARY_NAME: &str = "device.aocx";

/// Host configuration loaded from TOML with environment variable overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Case-insensitive substring of the platform name.
    /// Override: `EXELIXI_PLATFORM`
    pub platform_name: String,

    /// Path of the precompiled kernel binary.
    /// Override: `EXELIXI_BINARY`
    pub binary_path: PathBuf,

    /// Device class to enumerate on the selected platform.
    /// Override: `EXELIXI_DEVICE_CLASS`
    pub device_class: DeviceClass,

    /// Use the simulated driver instead of the OpenCL runtime.
    /// Override: `EXELIXI_SIMULATE`
    pub simulate: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            platform_name: DEFAULT_PLATFORM_NAME.to_string(),
            binary_path: PathBuf::from(DEFAULT_BINARY_NAME),
            device_class: DeviceClass::All,
            simulate: false,
        }
    }
}

/// Errors that can occur when loading or validating a [`HostConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid environment override {key}={value}: {reason}")]
    EnvOverride {
        key: String,
        value: String,
        reason: String,
    },
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::EnvOverride {
            key: key.into(),
            value: value.into(),
            reason: "expected a boolean".into(),
        }),
    }
}

impl HostConfig {
    /// The default configuration as a TOML document.
    pub fn default_toml() -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }

    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields, then apply environment variable overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load from TOML string (useful for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut cfg: HostConfig = toml::from_str(toml_str)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load only from environment variables, starting from defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.platform_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "platform_name must not be empty".into(),
            ));
        }
        if self.binary_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "binary_path must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Apply `EXELIXI_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("EXELIXI_PLATFORM") {
            self.platform_name = val;
        }

        if let Ok(val) = std::env::var("EXELIXI_BINARY") {
            self.binary_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("EXELIXI_DEVICE_CLASS") {
            self.device_class = val.parse::<DeviceClass>().map_err(|reason| {
                ConfigError::EnvOverride {
                    key: "EXELIXI_DEVICE_CLASS".into(),
                    value: val.clone(),
                    reason,
                }
            })?;
        }

        if let Ok(val) = std::env::var("EXELIXI_SIMULATE") {
            self.simulate = parse_flag("EXELIXI_SIMULATE", &val)?;
        }

        Ok(())
    }
}
