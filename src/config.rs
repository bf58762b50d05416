//! Driver configuration file
//!
//! Lives at `~/.config/i2c-hid/driver.toml`. Every field is optional; a
//! missing file means all defaults. Command-line flags win over the file.
//!
//! ```toml
//! bus = 1
//! address = 0x2c
//! hid_register = 0x20
//!
//! [device]
//! reset_timeout_ms = 5000
//!
//! [device.dispatch]
//! mode = "polling"
//! interval_ms = 5
//! ```

use std::path::{Path, PathBuf};

use i2c_hid::{DeviceConfig, Dispatch};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(
        "Interrupt dispatch needs an interrupt line, which /dev/i2c-N does not provide; \
         set `mode = \"polling\"` under [device.dispatch]"
    )]
    NoInterruptLine,
}

/// Where to find the device and how to drive it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// I2C adapter number (`/dev/i2c-N`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus: Option<u32>,
    /// 7-bit device address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<u16>,
    /// HID descriptor register, as the firmware would report it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hid_register: Option<u16>,
    pub device: DeviceConfig,
}

impl DriverConfig {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("i2c-hid")
            .join("driver.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)
    }

    /// Reject settings the userspace transport cannot honor
    ///
    /// Only polling works here: nothing would ever call the interrupt
    /// handle, so no input report (and no reset acknowledgement) is read.
    pub fn check_dispatch(&self) -> Result<(), ConfigError> {
        match self.device.dispatch {
            Dispatch::Interrupt => Err(ConfigError::NoInterruptLine),
            Dispatch::Polling { .. } => Ok(()),
        }
    }

    /// Apply command-line overrides on top of the file values
    pub fn with_overrides(
        mut self,
        bus: Option<u32>,
        address: Option<u16>,
        hid_register: Option<u16>,
    ) -> Self {
        if bus.is_some() {
            self.bus = bus;
        }
        if address.is_some() {
            self.address = address;
        }
        if hid_register.is_some() {
            self.hid_register = hid_register;
        }
        self
    }
}
