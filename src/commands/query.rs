//! Query (read-only) command handlers.

use super::{discard_reports, open_session, CommandResult};
use i2c_hid::ReportKind;
use i2c_hid_driver::format::{hex_dump, hex_line};
use i2c_hid_driver::DriverConfig;
use serde::Serialize;

#[derive(Serialize)]
struct DescriptorReport<'a> {
    identity: i2c_hid::DeviceIdentity,
    descriptor: &'a i2c_hid::HidDescriptor,
}

/// Print the HID descriptor fields
pub fn descriptor(config: &DriverConfig, simulate: bool, json: bool) -> CommandResult {
    let session = open_session(config, simulate, discard_reports)?;
    let device = &session.device;

    if json {
        let report = DescriptorReport {
            identity: device.identity(),
            descriptor: device.descriptor(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let identity = device.identity();
    println!(
        "Device: VID={:04X} PID={:04X} version={:04X} transport={}",
        identity.vendor_id, identity.product_id, identity.version_id, identity.transport
    );
    println!("HID descriptor:");
    for (name, value) in device.properties() {
        println!("  {name:<20} {value:>5} (0x{value:04X})");
    }
    Ok(())
}

/// Dump the report descriptor as hex
pub fn report_descriptor(config: &DriverConfig, simulate: bool) -> CommandResult {
    let session = open_session(config, simulate, discard_reports)?;
    let rdesc = session.device.report_descriptor()?;
    println!("Report descriptor ({} bytes):", rdesc.len());
    println!("{}", hex_dump(&rdesc));
    Ok(())
}

/// GET_REPORT and print the response
pub fn get_report(
    config: &DriverConfig,
    simulate: bool,
    kind: ReportKind,
    id: u8,
    length: Option<usize>,
) -> CommandResult {
    let session = open_session(config, simulate, discard_reports)?;
    let device = &session.device;

    let len = length
        .unwrap_or_else(|| usize::from(device.descriptor().max_input_length).saturating_sub(2));
    let mut buf = vec![0u8; len];
    device.get_report(kind, id, &mut buf)?;
    println!("{} report {id} ({len} bytes): {}", kind.name(), hex_line(&buf));
    Ok(())
}
