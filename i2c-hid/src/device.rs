//! Attached device: shared context, lifecycle and the synchronous API

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::bus::Bus;
use crate::command::CommandFrame;
use crate::config::{DeviceConfig, Dispatch};
use crate::descriptor::{
    fetch_descriptor, fetch_report_descriptor, locate_descriptor_address, DescriptorLookup,
    HidDescriptor,
};
use crate::error::I2cHidError;
use crate::gate::{CommandGate, GateOp};
use crate::power::{PowerPhase, ResetSignal};
use crate::protocol::LENGTH_PREFIX_LEN;
use crate::reader::{InputReader, InterruptHandle};
use crate::sink::ReportSink;
use crate::types::{DeviceIdentity, PowerAck, PowerState, ReportKind};
use crate::I2cTransport;

/// Flags read on the interrupt path without taking the bus lock
pub(crate) struct DeviceState {
    pub awake: AtomicBool,
    pub ready_for_input: AtomicBool,
    pub read_in_progress: AtomicBool,
    pub detached: AtomicBool,
}

impl DeviceState {
    fn new() -> Self {
        Self {
            awake: AtomicBool::new(true),
            ready_for_input: AtomicBool::new(false),
            read_in_progress: AtomicBool::new(false),
            detached: AtomicBool::new(false),
        }
    }
}

/// Everything the workers and the handle share
pub(crate) struct Shared {
    pub bus: Mutex<Bus>,
    pub descriptor: HidDescriptor,
    pub state: DeviceState,
    pub reset: ResetSignal,
    pub sink: Box<dyn ReportSink>,
    pub config: DeviceConfig,
    phase: Mutex<PowerPhase>,
}

impl Shared {
    fn new(
        bus: Mutex<Bus>,
        descriptor: HidDescriptor,
        sink: Box<dyn ReportSink>,
        config: DeviceConfig,
    ) -> Self {
        Self {
            bus,
            descriptor,
            state: DeviceState::new(),
            reset: ResetSignal::new(),
            sink,
            config,
            phase: Mutex::new(PowerPhase::Off),
        }
    }

    pub fn set_phase(&self, phase: PowerPhase) {
        let mut current = self.phase.lock();
        if *current != phase {
            debug!("Power phase {:?} -> {:?}", *current, phase);
            *current = phase;
        }
    }

    pub fn phase(&self) -> PowerPhase {
        *self.phase.lock()
    }

    #[cfg(test)]
    pub fn for_test(
        sim: &crate::sim::SimulatedDevice,
        sink: Box<dyn ReportSink>,
        config: DeviceConfig,
    ) -> Self {
        let mut bus = Bus::new(Box::new(sim.transport()), config.scratch_capacity);
        bus.fit_descriptor(&sim.descriptor());
        Self::new(Mutex::new(bus), sim.descriptor(), sink, config)
    }
}

/// Bind to a device and bring it up
///
/// Locates and validates the HID descriptor, starts input dispatch, resets
/// the device and opens the input gate. Descriptor failures abort; a reset
/// that goes unacknowledged is logged and attach carries on.
///
/// With [`Dispatch::Interrupt`] nothing reads the reset acknowledgement
/// during attach; hosts with an interrupt line use [`attach_with_irq`].
pub fn attach<T, L, S>(
    transport: T,
    lookup: &L,
    sink: S,
    config: DeviceConfig,
) -> Result<DeviceHandle, I2cHidError>
where
    T: I2cTransport + 'static,
    L: DescriptorLookup + ?Sized,
    S: ReportSink + 'static,
{
    attach_with_irq(transport, lookup, sink, config, |_| {})
}

/// [`attach`], handing the interrupt handle to `connect_irq` before the
/// initial reset
///
/// The host wires its interrupt handler up inside `connect_irq`, so the
/// zero-length report that acknowledges the reset is read while attach
/// waits for it.
pub fn attach_with_irq<T, L, S, F>(
    transport: T,
    lookup: &L,
    sink: S,
    config: DeviceConfig,
    connect_irq: F,
) -> Result<DeviceHandle, I2cHidError>
where
    T: I2cTransport + 'static,
    L: DescriptorLookup + ?Sized,
    S: ReportSink + 'static,
    F: FnOnce(InterruptHandle),
{
    let register = locate_descriptor_address(lookup)?;
    debug!("HID descriptor register 0x{:04X}", register);

    let mut bus = Mutex::new(Bus::new(Box::new(transport), config.scratch_capacity));
    let descriptor = fetch_descriptor(&bus, register)?;
    info!(
        "I2C-HID device {:04X}:{:04X} version {:04X}",
        descriptor.vendor_id, descriptor.product_id, descriptor.version_id
    );
    bus.get_mut().fit_descriptor(&descriptor);

    let dispatch = config.dispatch.clone();
    let shared = Arc::new(Shared::new(bus, descriptor, Box::new(sink), config));

    let mut reader = InputReader::spawn(Arc::clone(&shared))?;
    match dispatch {
        Dispatch::Interrupt => debug!("Using interrupt dispatch"),
        Dispatch::Polling {
            initial_delay_ms,
            interval_ms,
        } => {
            info!("No interrupt line, polling for input reports");
            reader.start_polling(
                Duration::from_millis(initial_delay_ms),
                Duration::from_millis(interval_ms),
            )?;
        }
    }
    connect_irq(reader.handle().clone());
    let gate = CommandGate::spawn(Arc::clone(&shared))?;

    let handle = DeviceHandle {
        shared,
        reader,
        gate,
    };

    match handle.gate.run(GateOp::Reset) {
        Ok(()) => {}
        Err(I2cHidError::Timeout) => {}
        Err(e) => warn!("Initial reset failed: {}", e),
    }

    std::thread::sleep(handle.shared.config.post_reset_delay());
    handle.shared.set_phase(PowerPhase::Ready);
    handle
        .shared
        .state
        .ready_for_input
        .store(true, Ordering::Release);
    info!("Device ready for input");

    Ok(handle)
}

/// A bound I2C-HID device
///
/// Dropping the handle detaches the device.
pub struct DeviceHandle {
    shared: Arc<Shared>,
    reader: InputReader,
    gate: CommandGate,
}

impl DeviceHandle {
    pub fn descriptor(&self) -> &HidDescriptor {
        &self.shared.descriptor
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.shared.descriptor.identity()
    }

    /// Descriptor fields under their property names
    pub fn properties(&self) -> [(&'static str, u32); 13] {
        self.shared.descriptor.properties()
    }

    /// Fetch the HID report descriptor from the device
    pub fn report_descriptor(&self) -> Result<Vec<u8>, I2cHidError> {
        fetch_report_descriptor(&self.shared.bus, &self.shared.descriptor)
    }

    /// GET_REPORT, filling `out` completely
    pub fn get_report(
        &self,
        kind: ReportKind,
        report_id: u8,
        out: &mut [u8],
    ) -> Result<(), I2cHidError> {
        let desc = &self.shared.descriptor;
        let frame =
            CommandFrame::get_report(desc.command_register, desc.data_register, kind, report_id)?;

        let mut bus = self.shared.bus.lock();
        let response = bus
            .query(&frame, out.len() + LENGTH_PREFIX_LEN)
            .inspect_err(|e| warn!("GET_REPORT {} {} failed: {}", kind.name(), report_id, e))?;
        out.copy_from_slice(&response[LENGTH_PREFIX_LEN..]);
        Ok(())
    }

    /// SET_REPORT with `payload` as the report body
    pub fn set_report(
        &self,
        kind: ReportKind,
        report_id: u8,
        payload: &[u8],
    ) -> Result<(), I2cHidError> {
        let desc = &self.shared.descriptor;
        let frame = CommandFrame::set_report(
            desc.command_register,
            desc.data_register,
            kind,
            report_id,
            payload,
        )?;

        self.shared
            .bus
            .lock()
            .send(&frame)
            .inspect_err(|e| warn!("SET_REPORT {} {} failed: {}", kind.name(), report_id, e))
    }

    /// Move the device to `state` through the command gate
    pub fn request_power_state(&self, state: PowerState) -> Result<(), I2cHidError> {
        self.gate.run(GateOp::Power(state))
    }

    /// Platform power callback: run the transition and always acknowledge
    pub fn on_power_state_change_requested(&self, state: PowerState) -> PowerAck {
        if let Err(e) = self.request_power_state(state) {
            warn!("Power transition to {:?} failed: {}", state, e);
        }
        PowerAck::Implied
    }

    /// Power on, reset and wait for the acknowledgement
    pub fn reset(&self) -> Result<(), I2cHidError> {
        self.gate.run(GateOp::Reset)
    }

    /// Abort a pending reset wait. Returns whether one was pending.
    pub fn cancel_reset(&self) -> bool {
        self.shared.reset.cancel()
    }

    pub fn is_awake(&self) -> bool {
        self.shared.state.awake.load(Ordering::Acquire)
    }

    pub fn power_phase(&self) -> PowerPhase {
        self.shared.phase()
    }

    /// Handle for the host's interrupt handler
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.reader.handle().clone()
    }

    /// Stop the workers. Interrupt handles still held by the host go inert.
    pub fn detach(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.shared.state.detached.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.state.ready_for_input.store(false, Ordering::Release);
        self.shared.reset.cancel();
        self.reader.shutdown();
        self.gate.shutdown();
        info!("Device detached");
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
