// CLI definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use i2c_hid::{PowerState, ReportKind};
use i2c_hid_driver::format::{parse_u16, parse_u8};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "i2c-hid")]
#[command(author, version, about = "Userspace I2C-HID driver and diagnostics")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/i2c-hid/driver.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// I2C adapter number (/dev/i2c-N)
    #[arg(long, global = true)]
    pub bus: Option<u32>,

    /// 7-bit device address (e.g. 0x2c)
    #[arg(long, global = true, value_parser = parse_u16)]
    pub address: Option<u16>,

    /// HID descriptor register (e.g. 0x20)
    #[arg(long, global = true, value_parser = parse_u16)]
    pub hid_register: Option<u16>,

    /// Talk to a built-in simulated touchpad instead of hardware
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the HID descriptor
    #[command(visible_aliases = ["desc", "info"])]
    Descriptor {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Dump the HID report descriptor
    #[command(visible_alias = "rdesc")]
    ReportDescriptor,

    /// Read a report with GET_REPORT
    GetReport {
        /// Report type
        #[arg(value_enum)]
        kind: KindArg,
        /// Report ID (0 when the device has none)
        #[arg(value_parser = parse_u8)]
        id: u8,
        /// Bytes to read (default: maxInputLength minus the length prefix)
        #[arg(short, long)]
        length: Option<usize>,
    },

    /// Send a report with SET_REPORT
    SetReport {
        /// Report type
        #[arg(value_enum)]
        kind: KindArg,
        /// Report ID (0 when the device has none)
        #[arg(value_parser = parse_u8)]
        id: u8,
        /// Report body as hex ("01 02 ff", "01,02,ff" or "0102ff")
        data: String,
    },

    /// Put the device to sleep or wake it
    Power {
        #[arg(value_enum)]
        state: PowerArg,
    },

    /// Reset the device and wait for its acknowledgement
    Reset,

    /// Print input reports as they arrive (Ctrl+C to stop)
    #[command(visible_alias = "mon")]
    Monitor {
        /// Stop after this many reports
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum KindArg {
    Input,
    Output,
    Feature,
}

impl From<KindArg> for ReportKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Input => ReportKind::Input,
            KindArg::Output => ReportKind::Output,
            KindArg::Feature => ReportKind::Feature,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PowerArg {
    On,
    Sleep,
}

impl From<PowerArg> for PowerState {
    fn from(state: PowerArg) -> Self {
        match state {
            PowerArg::On => PowerState::On,
            PowerArg::Sleep => PowerState::Sleep,
        }
    }
}
