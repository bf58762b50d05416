//! HID descriptor discovery
//!
//! Attach runs three steps, once, before anything else touches the device:
//!
//! 1. ask the platform which register holds the HID descriptor
//! 2. read the 30-byte descriptor from that register
//! 3. check the version and length, then publish the fields
//!
//! Any failure here aborts attach.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::bus::Bus;
use crate::error::I2cHidError;
use crate::protocol::{descriptor, dsm};
use crate::types::DeviceIdentity;

/// Wire layout of the HID descriptor
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct RawHidDescriptor {
    desc_length: U16,
    bcd_version: U16,
    report_desc_length: U16,
    report_desc_register: U16,
    input_register: U16,
    max_input_length: U16,
    output_register: U16,
    max_output_length: U16,
    command_register: U16,
    data_register: U16,
    vendor_id: U16,
    product_id: U16,
    version_id: U16,
    reserved: U32,
}

/// Validated HID descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HidDescriptor {
    pub desc_length: u16,
    pub bcd_version: u16,
    pub report_desc_length: u16,
    pub report_desc_register: u16,
    pub input_register: u16,
    pub max_input_length: u16,
    pub output_register: u16,
    pub max_output_length: u16,
    pub command_register: u16,
    pub data_register: u16,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version_id: u16,
}

impl HidDescriptor {
    /// Decode the descriptor without checking it
    pub fn decode(bytes: &[u8]) -> Result<Self, I2cHidError> {
        let raw = RawHidDescriptor::read_from_bytes(bytes).map_err(|_| {
            I2cHidError::Invalid(format!(
                "HID descriptor is {} bytes, expected {}",
                bytes.len(),
                descriptor::LENGTH
            ))
        })?;

        Ok(Self {
            desc_length: raw.desc_length.get(),
            bcd_version: raw.bcd_version.get(),
            report_desc_length: raw.report_desc_length.get(),
            report_desc_register: raw.report_desc_register.get(),
            input_register: raw.input_register.get(),
            max_input_length: raw.max_input_length.get(),
            output_register: raw.output_register.get(),
            max_output_length: raw.max_output_length.get(),
            command_register: raw.command_register.get(),
            data_register: raw.data_register.get(),
            vendor_id: raw.vendor_id.get(),
            product_id: raw.product_id.get(),
            version_id: raw.version_id.get(),
        })
    }

    /// Decode and enforce the version and length invariants
    pub fn parse(bytes: &[u8]) -> Result<Self, I2cHidError> {
        let desc = Self::decode(bytes)?;

        if desc.bcd_version != descriptor::BCD_VERSION {
            warn!("Incorrect BCD version 0x{:04X}", desc.bcd_version);
            return Err(I2cHidError::Invalid(format!(
                "unsupported BCD version 0x{:04X}",
                desc.bcd_version
            )));
        }

        if usize::from(desc.desc_length) != descriptor::LENGTH {
            warn!("Unexpected size of HID descriptor: {}", desc.desc_length);
            return Err(I2cHidError::Invalid(format!(
                "descriptor length field is {}, expected {}",
                desc.desc_length,
                descriptor::LENGTH
            )));
        }

        Ok(desc)
    }

    /// Encode back to the 30-byte wire form
    pub fn to_bytes(&self) -> [u8; descriptor::LENGTH] {
        let raw = RawHidDescriptor {
            desc_length: U16::new(self.desc_length),
            bcd_version: U16::new(self.bcd_version),
            report_desc_length: U16::new(self.report_desc_length),
            report_desc_register: U16::new(self.report_desc_register),
            input_register: U16::new(self.input_register),
            max_input_length: U16::new(self.max_input_length),
            output_register: U16::new(self.output_register),
            max_output_length: U16::new(self.max_output_length),
            command_register: U16::new(self.command_register),
            data_register: U16::new(self.data_register),
            vendor_id: U16::new(self.vendor_id),
            product_id: U16::new(self.product_id),
            version_id: U16::new(self.version_id),
            reserved: U32::new(0),
        };
        let mut out = [0u8; descriptor::LENGTH];
        out.copy_from_slice(raw.as_bytes());
        out
    }

    /// Fields under the property names the upstream HID layer expects
    pub fn properties(&self) -> [(&'static str, u32); 13] {
        [
            ("HIDDescLength", self.desc_length.into()),
            ("BCDVersion", self.bcd_version.into()),
            ("ReportDescLength", self.report_desc_length.into()),
            ("ReportDescRegister", self.report_desc_register.into()),
            ("MaxInputLength", self.max_input_length.into()),
            ("InputRegister", self.input_register.into()),
            ("MaxOutputLength", self.max_output_length.into()),
            ("OutputRegister", self.output_register.into()),
            ("CommandRegister", self.command_register.into()),
            ("DataRegister", self.data_register.into()),
            ("VendorID", self.vendor_id.into()),
            ("ProductID", self.product_id.into()),
            ("VersionID", self.version_id.into()),
        ]
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            version_id: self.version_id,
            transport: "I2C",
        }
    }
}

// ============================================================================
// Platform lookup
// ============================================================================

/// Device Specific Method invocation asking for the descriptor register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsmRequest {
    /// Method name (`_DSM`, then `XDSM`)
    pub method: &'static str,
    pub uuid: [u8; 16],
    pub revision: u64,
    pub function: u64,
    pub argument: u64,
}

impl DsmRequest {
    fn hid_descriptor(method: &'static str) -> Self {
        Self {
            method,
            uuid: dsm::HID_DESCRIPTOR_UUID,
            revision: dsm::REVISION,
            function: dsm::FUNCTION,
            argument: dsm::ARGUMENT,
        }
    }
}

/// Value returned by a firmware method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DsmValue {
    Integer(u64),
    Buffer(Vec<u8>),
    String(String),
}

/// Platform capability that evaluates firmware methods for this device
pub trait DescriptorLookup: Send + Sync {
    /// Evaluate a method; `None` when the method is missing or returns nothing
    fn evaluate(&self, request: &DsmRequest) -> Option<DsmValue>;
}

/// Lookup that always answers with a configured register.
///
/// Used where the register comes from a device-tree property or the
/// command line instead of firmware tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRegister(pub u16);

impl DescriptorLookup for FixedRegister {
    fn evaluate(&self, _request: &DsmRequest) -> Option<DsmValue> {
        Some(DsmValue::Integer(self.0.into()))
    }
}

/// Ask the platform for the HID descriptor register
pub fn locate_descriptor_address<L>(lookup: &L) -> Result<u16, I2cHidError>
where
    L: DescriptorLookup + ?Sized,
{
    let answer = dsm::METHODS.iter().find_map(|&method| {
        let result = lookup.evaluate(&DsmRequest::hid_descriptor(method));
        if result.is_none() {
            debug!("{} returned nothing", method);
        }
        result
    });

    match answer {
        None => {
            warn!("Could not find suitable _DSM or XDSM method");
            Err(I2cHidError::NotFound(
                "no _DSM or XDSM answer for the HID descriptor register".into(),
            ))
        }
        Some(DsmValue::Integer(value)) => u16::try_from(value).map_err(|_| {
            warn!("HID descriptor register invalid: 0x{:X}", value);
            I2cHidError::Invalid(format!("descriptor register 0x{value:X} exceeds 16 bits"))
        }),
        Some(other) => {
            warn!("HID descriptor register invalid: {:?}", other);
            Err(I2cHidError::Invalid(
                "descriptor register lookup did not return an integer".into(),
            ))
        }
    }
}

/// Read the HID descriptor from `register` and validate it
pub(crate) fn fetch_descriptor(
    bus: &Mutex<Bus>,
    register: u16,
) -> Result<HidDescriptor, I2cHidError> {
    let mut bus = bus.lock();
    let bytes = bus
        .read_register(register, descriptor::LENGTH)
        .inspect_err(|e| warn!("Request for HID descriptor failed: {}", e))?;
    HidDescriptor::parse(bytes)
}

/// Read the report descriptor the HID descriptor points at
pub(crate) fn fetch_report_descriptor(
    bus: &Mutex<Bus>,
    desc: &HidDescriptor,
) -> Result<Vec<u8>, I2cHidError> {
    if desc.report_desc_length == 0 {
        warn!("Invalid report descriptor size");
        return Err(I2cHidError::Invalid("report descriptor length is 0".into()));
    }

    let mut bus = bus.lock();
    let bytes = bus
        .read_register(
            desc.report_desc_register,
            usize::from(desc.report_desc_length),
        )
        .inspect_err(|e| warn!("Could not get report descriptor: {}", e))?;
    Ok(bytes.to_vec())
}
