//! Device configuration
//!
//! Timing defaults follow the I2C-HID protocol requirements; hosts usually
//! only pick the dispatch mode.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::{scratch, timing};

/// How input reads are triggered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Dispatch {
    /// Host calls [`InterruptHandle::trigger`](crate::InterruptHandle::trigger)
    /// from its interrupt handler
    Interrupt,
    /// A timer thread stands in for the interrupt line
    Polling {
        #[serde(default = "default_poll_initial_delay")]
        initial_delay_ms: u64,
        #[serde(default = "default_poll_interval")]
        interval_ms: u64,
    },
}

impl Dispatch {
    /// Polling with the default delays
    pub fn polling() -> Self {
        Dispatch::Polling {
            initial_delay_ms: timing::POLL_INITIAL_DELAY_MS,
            interval_ms: timing::POLL_INTERVAL_MS,
        }
    }
}

impl Default for Dispatch {
    fn default() -> Self {
        Self::polling()
    }
}

fn default_poll_initial_delay() -> u64 {
    timing::POLL_INITIAL_DELAY_MS
}

fn default_poll_interval() -> u64 {
    timing::POLL_INTERVAL_MS
}

/// Per-device settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Longest wait for the device to acknowledge RESET
    pub reset_timeout_ms: u64,
    /// Pause between SET_POWER ON and RESET
    pub power_settle_ms: u64,
    /// Pause after the initial reset before input reports are delivered
    pub post_reset_delay_ms: u64,
    /// Size of each scratch ring
    pub scratch_capacity: usize,
    pub dispatch: Dispatch,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            reset_timeout_ms: timing::RESET_TIMEOUT_MS,
            power_settle_ms: timing::POWER_SETTLE_MS,
            post_reset_delay_ms: timing::POST_RESET_DELAY_MS,
            scratch_capacity: scratch::CAPACITY,
            dispatch: Dispatch::default(),
        }
    }
}

impl DeviceConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn power_settle(&self) -> Duration {
        Duration::from_millis(self.power_settle_ms)
    }

    pub fn post_reset_delay(&self) -> Duration {
        Duration::from_millis(self.post_reset_delay_ms)
    }

    /// Builder-style dispatch override
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }
}
