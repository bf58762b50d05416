//! I2C-HID protocol engine
//!
//! Binds a HID device that speaks the HID-over-I2C protocol:
//!
//! - HID descriptor discovery through a platform lookup (`_DSM`/`XDSM`)
//! - Command encoding (RESET, GET_REPORT, SET_REPORT, SET_POWER)
//! - Input report pump, driven by an interrupt or by polling
//! - Reset handshake and sleep/wake handling
//!
//! The bus itself is supplied by the host as an [`I2cTransport`]; reports go
//! upstream through a [`ReportSink`].

pub mod command;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod protocol;
pub mod scratch;
pub mod sim;
pub mod sink;
pub mod types;

mod bus;
mod device;
mod gate;
mod power;
mod reader;

use std::io;

pub use command::CommandFrame;
pub use config::{DeviceConfig, Dispatch};
pub use descriptor::{
    locate_descriptor_address, DescriptorLookup, DsmRequest, DsmValue, FixedRegister,
    HidDescriptor,
};
pub use device::{attach, attach_with_irq, DeviceHandle};
pub use error::{DeliveryError, I2cHidError};
pub use power::PowerPhase;
pub use reader::InterruptHandle;
pub use scratch::ScratchRing;
pub use sink::{BroadcastSink, ReportSink};
pub use types::{DeviceIdentity, PowerAck, PowerState, ReportKind, TimestampedReport};

/// Raw access to the I2C bus for one device address
///
/// Each call is one bus transaction. `write_read` must issue the write and
/// the read as a single combined transfer (repeated start).
pub trait I2cTransport: Send {
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Fill `buf` completely
    fn read(&mut self, buf: &mut [u8]) -> io::Result<()>;

    fn write_read(&mut self, data: &[u8], buf: &mut [u8]) -> io::Result<()>;
}

impl<T: I2cTransport + ?Sized> I2cTransport for Box<T> {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<()> {
        (**self).read(buf)
    }

    fn write_read(&mut self, data: &[u8], buf: &mut [u8]) -> io::Result<()> {
        (**self).write_read(data, buf)
    }
}
