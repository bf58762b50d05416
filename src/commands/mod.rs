//! Command handlers for the CLI application.
//!
//! - `query`: read-only commands (descriptor, report-descriptor, get-report)
//! - `control`: commands that change device state (set-report, power, reset)
//! - `monitor`: live input report stream

pub mod control;
pub mod monitor;
pub mod query;

use anyhow::{bail, Context};
use i2c_hid::sim::SimulatedDevice;
use i2c_hid::{attach, DeliveryError, DeviceHandle, FixedRegister, ReportSink};
use i2c_hid_driver::{DriverConfig, I2cDevTransport};
use tracing::info;

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Sink for commands that do not consume input reports
pub fn discard_reports(_report: &[u8]) -> Result<(), DeliveryError> {
    Ok(())
}

/// An attached device, plus the simulator behind it in `--simulate` mode
pub struct Session {
    pub device: DeviceHandle,
    pub sim: Option<SimulatedDevice>,
}

/// Attach to the configured device, or to a simulated touchpad
pub fn open_session<S>(config: &DriverConfig, simulate: bool, sink: S) -> anyhow::Result<Session>
where
    S: ReportSink + 'static,
{
    config.check_dispatch()?;

    if simulate {
        let sim = SimulatedDevice::touchpad();
        info!("Using simulated touchpad");
        let device = attach(sim.transport(), &sim.lookup(), sink, config.device.clone())
            .context("Failed to attach simulated device")?;
        return Ok(Session {
            device,
            sim: Some(sim),
        });
    }

    let Some(bus) = config.bus else {
        bail!("No I2C bus configured; pass --bus or set `bus` in the config file");
    };
    let Some(address) = config.address else {
        bail!("No device address configured; pass --address or set `address` in the config file");
    };
    let Some(register) = config.hid_register else {
        bail!("No HID descriptor register configured; pass --hid-register or set `hid_register`");
    };

    let transport = I2cDevTransport::open(bus, address)
        .with_context(|| format!("Failed to open /dev/i2c-{bus} address 0x{address:02x}"))?;
    let device = attach(
        transport,
        &FixedRegister(register),
        sink,
        config.device.clone(),
    )
    .with_context(|| format!("Failed to attach device at {bus}-{address:04x}"))?;

    Ok(Session { device, sim: None })
}
