//! Input report path
//!
//! An interrupt (or a poll tick) enqueues at most one read on a depth-1
//! channel; a single persistent worker drains it. The trigger never blocks
//! and never touches the bus itself.

use std::io::ErrorKind;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use futures::executor::block_on;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::device::Shared;
use crate::error::I2cHidError;
use crate::protocol::LENGTH_PREFIX_LEN;

/// One pending read at most; further events are dropped
const READ_QUEUE_DEPTH: usize = 1;

pub(crate) enum ReaderMsg {
    Read,
    Shutdown,
}

/// What happened to a single input event
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    Delivered(usize),
    /// Zero-length report: the device finished a reset
    ResetAck,
    /// Bus held by a synchronous caller
    Busy,
    NotReady,
    /// Declared length larger than maxInputLength
    Oversize(u16),
    /// Declared length smaller than its own prefix
    Runt(u16),
    DeliveryFailed,
    TransportFailed,
}

/// Perform one input read and hand the report to the sink
pub(crate) fn read_input_report(shared: &Shared) -> ReadOutcome {
    let max_input = shared.descriptor.max_input_length;

    let report = {
        let Some(mut bus) = shared.bus.try_lock() else {
            debug!("Bus busy, dropping input event");
            return ReadOutcome::Busy;
        };

        let buf = match bus.read_input(max_input as usize) {
            Ok(buf) => buf,
            Err(I2cHidError::Io(e)) if e.kind() == ErrorKind::WouldBlock => {
                trace!("No input pending");
                return ReadOutcome::TransportFailed;
            }
            Err(e) => {
                warn!("Failed to read input report: {}", e);
                return ReadOutcome::TransportFailed;
            }
        };

        if buf.len() < LENGTH_PREFIX_LEN {
            return ReadOutcome::Runt(0);
        }
        let return_size = u16::from_le_bytes([buf[0], buf[1]]);

        if return_size == 0 {
            drop(bus);
            if shared.reset.complete() {
                debug!("Reset acknowledgement received");
            } else {
                trace!("Zero-length input report with no reset pending");
            }
            return ReadOutcome::ResetAck;
        }

        if !shared.state.ready_for_input.load(Ordering::Acquire) {
            return ReadOutcome::NotReady;
        }
        if return_size > max_input {
            warn!(
                "Input report length {} exceeds maxInputLength {}",
                return_size, max_input
            );
            return ReadOutcome::Oversize(return_size);
        }
        if (return_size as usize) < LENGTH_PREFIX_LEN {
            debug!("Input report length {} shorter than its prefix", return_size);
            return ReadOutcome::Runt(return_size);
        }

        buf[LENGTH_PREFIX_LEN..return_size as usize].to_vec()
    };

    match shared.sink.deliver_input_report(&report) {
        Ok(()) => {
            trace!("Delivered {} byte input report", report.len());
            ReadOutcome::Delivered(report.len())
        }
        Err(e) => {
            warn!("Input report delivery failed: {}", e);
            ReadOutcome::DeliveryFailed
        }
    }
}

fn reader_worker(shared: Arc<Shared>, mut rx: mpsc::Receiver<ReaderMsg>) {
    debug!("Input reader started");
    while let Some(msg) = rx.blocking_recv() {
        match msg {
            ReaderMsg::Read => {
                read_input_report(&shared);
                shared.state.read_in_progress.store(false, Ordering::Release);
            }
            ReaderMsg::Shutdown => break,
        }
    }
    debug!("Input reader stopped");
}

/// Handle the host's interrupt handler calls into
///
/// Cheap to clone. `trigger` never blocks.
#[derive(Clone)]
pub struct InterruptHandle {
    shared: Arc<Shared>,
    tx: mpsc::Sender<ReaderMsg>,
}

impl InterruptHandle {
    /// Signal that the device asserted its interrupt line
    ///
    /// Returns whether a read was queued. Events arriving while a read is
    /// outstanding, while the device sleeps, or after detach are dropped.
    pub fn trigger(&self) -> bool {
        let state = &self.shared.state;
        if state.detached.load(Ordering::Acquire) {
            return false;
        }
        // Load then store; a lost race only merges two events
        if state.read_in_progress.load(Ordering::Acquire) {
            trace!("Read in progress, dropping event");
            return false;
        }
        if !state.awake.load(Ordering::Acquire) {
            trace!("Device asleep, dropping event");
            return false;
        }
        state.read_in_progress.store(true, Ordering::Release);
        if self.tx.try_send(ReaderMsg::Read).is_err() {
            state.read_in_progress.store(false, Ordering::Release);
            return false;
        }
        true
    }
}

/// The reader worker and, in polling mode, the timer standing in for the IRQ
pub(crate) struct InputReader {
    handle: InterruptHandle,
    worker: Option<JoinHandle<()>>,
    poller: Option<JoinHandle<()>>,
}

impl InputReader {
    pub fn spawn(shared: Arc<Shared>) -> Result<Self, I2cHidError> {
        let (tx, rx) = mpsc::channel(READ_QUEUE_DEPTH);
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("i2c-hid-reader".into())
            .spawn(move || reader_worker(worker_shared, rx))?;
        Ok(Self {
            handle: InterruptHandle { shared, tx },
            worker: Some(worker),
            poller: None,
        })
    }

    /// Start a thread that triggers a read every `interval` after `initial_delay`
    pub fn start_polling(
        &mut self,
        initial_delay: Duration,
        interval: Duration,
    ) -> Result<(), I2cHidError> {
        let handle = self.handle.clone();
        let poller = std::thread::Builder::new()
            .name("i2c-hid-poll".into())
            .spawn(move || poll_loop(handle, initial_delay, interval))?;
        debug!(
            "Polling every {}ms after {}ms",
            interval.as_millis(),
            initial_delay.as_millis()
        );
        self.poller = Some(poller);
        Ok(())
    }

    pub fn handle(&self) -> &InterruptHandle {
        &self.handle
    }

    /// Stop polling and the worker. Outstanding handles go inert.
    pub fn shutdown(&mut self) {
        // The poller exits on this flag, also when attach fails after polling started
        self.handle
            .shared
            .state
            .detached
            .store(true, Ordering::Release);
        if let Some(poller) = self.poller.take() {
            poller.thread().unpark();
            let _ = poller.join();
        }
        if let Some(worker) = self.worker.take() {
            // Waits for a queued read to drain first; fails only if the worker is gone.
            // Drop may run inside a runtime, where blocking_send panics.
            let _ = block_on(self.handle.tx.send(ReaderMsg::Shutdown));
            let _ = worker.join();
        }
    }
}

impl Drop for InputReader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_loop(handle: InterruptHandle, initial_delay: Duration, interval: Duration) {
    let detached = || handle.shared.state.detached.load(Ordering::Acquire);

    let start = Instant::now() + initial_delay;
    while !detached() {
        let now = Instant::now();
        if now >= start {
            break;
        }
        std::thread::park_timeout(start - now);
    }

    while !detached() {
        handle.trigger();
        std::thread::park_timeout(interval);
    }
    trace!("Poller stopped");
}
