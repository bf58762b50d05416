//! Command gate
//!
//! Reset and power transitions are serialized through one worker thread,
//! fed by a tokio mpsc channel. Callers block on a oneshot for the result.
//! The input path never goes through here, so a caller waiting on a reset
//! acknowledgement cannot starve the reader that delivers it.
//!
//! Callers wait with `futures::executor::block_on` rather than tokio's
//! `blocking_*` helpers, which panic when called from inside a runtime.

use std::sync::Arc;
use std::thread::JoinHandle;

use futures::executor::block_on;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::device::Shared;
use crate::error::I2cHidError;
use crate::power;
use crate::types::PowerState;

/// Pending gated operations before callers block on send
const GATE_QUEUE_SIZE: usize = 8;

/// Operations that must not overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GateOp {
    Reset,
    Power(PowerState),
}

struct GateRequest {
    op: GateOp,
    response_tx: oneshot::Sender<Result<(), I2cHidError>>,
}

pub(crate) struct CommandGate {
    tx: Option<mpsc::Sender<GateRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl CommandGate {
    pub fn spawn(shared: Arc<Shared>) -> Result<Self, I2cHidError> {
        let (tx, rx) = mpsc::channel(GATE_QUEUE_SIZE);
        let worker = std::thread::Builder::new()
            .name("i2c-hid-gate".into())
            .spawn(move || gate_worker(shared, rx))?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Run `op` on the gate worker and wait for it to finish
    pub fn run(&self, op: GateOp) -> Result<(), I2cHidError> {
        let tx = self.tx.as_ref().ok_or(I2cHidError::Detached)?;
        let (response_tx, response_rx) = oneshot::channel();
        block_on(async {
            tx.send(GateRequest { op, response_tx })
                .await
                .map_err(|_| I2cHidError::Detached)?;
            response_rx.await.map_err(|_| I2cHidError::Detached)?
        })
    }

    /// Close the queue and wait for the worker to drain it
    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for CommandGate {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn gate_worker(shared: Arc<Shared>, mut rx: mpsc::Receiver<GateRequest>) {
    debug!("Command gate started");
    while let Some(request) = rx.blocking_recv() {
        trace!("Gate: {:?}", request.op);
        let result = match request.op {
            GateOp::Reset => power::reset_device(&shared),
            GateOp::Power(state) => power::transition(&shared, state),
        };
        // Caller may have given up
        let _ = request.response_tx.send(result);
    }
    debug!("Command gate stopped");
}
