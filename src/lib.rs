//! Userspace I2C-HID driver support
//!
//! Glue between the `i2c-hid` protocol engine and a Linux host: the
//! `/dev/i2c-N` transport, the driver config file, and formatting helpers
//! shared by the CLI.

pub mod config;
pub mod format;
pub mod i2cdev;

pub use config::{ConfigError, DriverConfig};
pub use i2cdev::I2cDevTransport;
