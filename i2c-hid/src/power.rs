//! Reset and power sequencing
//!
//! ```text
//! Off ──► PoweringOn ──► AwaitingResetAck ──► Ready
//!                                              │ ▲
//!                              sleep           ▼ │  wake
//!                                              Off
//! ```
//!
//! A host-initiated reset is acknowledged by the device with a zero-length
//! input report. The input report worker sees that report and completes the
//! [`ResetSignal`]; the reset sequence blocks on it with a deadline.
//!
//! Everything in here runs on the command gate's worker thread.

use std::sync::atomic::Ordering;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::command::CommandFrame;
use crate::device::Shared;
use crate::error::I2cHidError;
use crate::types::PowerState;

/// Where the device is in its power/reset sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PowerPhase {
    Off,
    PoweringOn,
    AwaitingResetAck,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResetWait {
    Idle,
    Pending,
    Completed,
    Cancelled,
}

/// One-shot rendezvous between the reset sequence and the input worker
pub(crate) struct ResetSignal {
    state: Mutex<ResetWait>,
    cond: Condvar,
}

impl ResetSignal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ResetWait::Idle),
            cond: Condvar::new(),
        }
    }

    /// Start listening for an acknowledgement. Must happen before RESET is
    /// written so a fast device cannot be missed.
    fn arm(&self) {
        *self.state.lock() = ResetWait::Pending;
    }

    fn disarm(&self) {
        *self.state.lock() = ResetWait::Idle;
    }

    /// Record a reset acknowledgement. Returns whether anyone was waiting.
    pub fn complete(&self) -> bool {
        let mut state = self.state.lock();
        if *state == ResetWait::Pending {
            *state = ResetWait::Completed;
            self.cond.notify_all();
            true
        } else {
            false
        }
    }

    /// Abort a pending wait. Returns whether anyone was waiting.
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if *state == ResetWait::Pending {
            *state = ResetWait::Cancelled;
            self.cond.notify_all();
            true
        } else {
            false
        }
    }

    /// Block until completed, cancelled or `deadline` passes
    fn wait_until(&self, deadline: Instant) -> Result<(), I2cHidError> {
        let mut state = self.state.lock();
        loop {
            match *state {
                ResetWait::Completed => {
                    *state = ResetWait::Idle;
                    return Ok(());
                }
                ResetWait::Cancelled | ResetWait::Idle => {
                    *state = ResetWait::Idle;
                    return Err(I2cHidError::Cancelled);
                }
                ResetWait::Pending => {
                    if self.cond.wait_until(&mut state, deadline).timed_out()
                        && *state == ResetWait::Pending
                    {
                        *state = ResetWait::Idle;
                        return Err(I2cHidError::Timeout);
                    }
                }
            }
        }
    }
}

/// SET_POWER with no handshake
pub(crate) fn set_power(shared: &Shared, state: PowerState) -> Result<(), I2cHidError> {
    let frame = CommandFrame::set_power(shared.descriptor.command_register, state);
    debug!("SET_POWER {:?}", state);
    shared.bus.lock().send(&frame)
}

fn send_reset(shared: &Shared) -> Result<(), I2cHidError> {
    let frame = CommandFrame::reset(shared.descriptor.command_register);
    debug!("RESET");
    shared.bus.lock().send(&frame)
}

/// Power on, reset, and wait for the device to acknowledge
pub(crate) fn reset_device(shared: &Shared) -> Result<(), I2cHidError> {
    shared.set_phase(PowerPhase::PoweringOn);
    set_power(shared, PowerState::On)?;
    // Powered on from here; the acknowledgement only arrives through an awake trigger
    if !shared.state.awake.swap(true, Ordering::AcqRel) {
        info!("Woke up for reset");
    }
    std::thread::sleep(shared.config.power_settle());

    shared.reset.arm();
    if let Err(e) = send_reset(shared) {
        shared.reset.disarm();
        return Err(e);
    }
    shared.set_phase(PowerPhase::AwaitingResetAck);

    let timeout = shared.config.reset_timeout();
    let started = Instant::now();
    match shared.reset.wait_until(started + timeout) {
        Ok(()) => {
            debug!(
                "Reset acknowledged after {:.1}ms",
                started.elapsed().as_secs_f64() * 1000.0
            );
            shared.set_phase(PowerPhase::Ready);
            Ok(())
        }
        Err(I2cHidError::Timeout) => {
            warn!(
                "Timeout waiting for device to complete host initiated reset ({}ms)",
                timeout.as_millis()
            );
            // Powered and reset, just unacknowledged
            shared.set_phase(PowerPhase::Ready);
            Err(I2cHidError::Timeout)
        }
        Err(e) => {
            debug!("Reset wait aborted: {}", e);
            shared.set_phase(PowerPhase::Ready);
            Err(e)
        }
    }
}

/// Execute a power transition requested by the platform
///
/// Sleep only acts when awake and wake only when asleep. Waking re-issues
/// RESET but does not wait for its acknowledgement.
pub(crate) fn transition(shared: &Shared, target: PowerState) -> Result<(), I2cHidError> {
    let awake = shared.state.awake.load(Ordering::Acquire);
    match target {
        PowerState::Sleep if awake => {
            shared.state.awake.store(false, Ordering::Release);
            shared.set_phase(PowerPhase::Off);
            set_power(shared, PowerState::Sleep)?;
            info!("Going to sleep");
        }
        PowerState::On if !awake => {
            shared.set_phase(PowerPhase::PoweringOn);
            set_power(shared, PowerState::On)?;
            std::thread::sleep(shared.config.power_settle());
            send_reset(shared)?;
            shared.state.awake.store(true, Ordering::Release);
            shared.set_phase(PowerPhase::Ready);
            info!("Woke up");
        }
        _ => debug!("Power state already {:?}", target),
    }
    Ok(())
}
