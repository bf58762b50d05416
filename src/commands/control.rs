//! State-changing command handlers.

use super::{discard_reports, open_session, CommandResult};
use i2c_hid::{PowerState, ReportKind};
use i2c_hid_driver::format::{hex_line, parse_hex_bytes};
use i2c_hid_driver::DriverConfig;

/// SET_REPORT with a hex body
pub fn set_report(
    config: &DriverConfig,
    simulate: bool,
    kind: ReportKind,
    id: u8,
    data: &str,
) -> CommandResult {
    let payload = parse_hex_bytes(data)?;
    let session = open_session(config, simulate, discard_reports)?;
    session.device.set_report(kind, id, &payload)?;
    println!("Sent {} report {id}: {}", kind.name(), hex_line(&payload));

    if let Some(sim) = &session.sim {
        if let Some(stored) = sim.report(kind, id) {
            println!("Simulator stored: {}", hex_line(&stored));
        }
    }
    Ok(())
}

/// Sleep or wake the device
pub fn power(config: &DriverConfig, simulate: bool, state: PowerState) -> CommandResult {
    let session = open_session(config, simulate, discard_reports)?;
    session.device.request_power_state(state)?;
    println!(
        "Power: {}",
        if session.device.is_awake() { "on" } else { "sleep" }
    );
    Ok(())
}

/// Host-initiated reset
pub fn reset(config: &DriverConfig, simulate: bool) -> CommandResult {
    let session = open_session(config, simulate, discard_reports)?;
    session.device.reset()?;
    println!("Reset acknowledged");
    Ok(())
}
