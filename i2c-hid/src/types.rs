//! Common types for the I2C-HID engine

use serde::{Deserialize, Serialize};

use crate::protocol::{power, report_type};

/// HID report kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Input,
    Output,
    Feature,
}

impl ReportKind {
    /// Raw type code placed in bits 4-5 of the report type/ID byte
    pub fn raw(self) -> u8 {
        match self {
            ReportKind::Input => report_type::INPUT,
            ReportKind::Output => report_type::OUTPUT,
            ReportKind::Feature => report_type::FEATURE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReportKind::Input => "input",
            ReportKind::Output => "output",
            ReportKind::Feature => "feature",
        }
    }
}

/// Device power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Sleep,
}

impl PowerState {
    /// SET_POWER argument for this state
    pub fn raw(self) -> u8 {
        match self {
            PowerState::On => power::ON,
            PowerState::Sleep => power::SLEEP,
        }
    }
}

/// Acknowledgement returned to the platform power callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAck {
    /// Transition finished before the callback returned
    Implied,
}

/// Identity published to the upstream HID layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub version_id: u16,
    pub transport: &'static str,
}

/// Input report handed to a broadcast subscriber
#[derive(Debug, Clone)]
pub struct TimestampedReport {
    /// Seconds since the sink was created
    pub timestamp: f64,
    /// Report bytes without the length prefix
    pub data: Vec<u8>,
}

impl TimestampedReport {
    pub fn new(timestamp: f64, data: Vec<u8>) -> Self {
        Self { timestamp, data }
    }
}
