//! The bus lock and the transactions issued under it
//!
//! `Bus` owns the transport and both scratch rings. It lives inside a single
//! `parking_lot::Mutex`; every write, read and write-then-read happens while
//! that lock is held, and every scratch view handed out here borrows the guard.

use tracing::debug;

use crate::command::{register_select, CommandFrame};
use crate::descriptor::HidDescriptor;
use crate::error::I2cHidError;
use crate::scratch::ScratchRing;
use crate::I2cTransport;

/// Transport plus the two scratch rings it feeds from
pub(crate) struct Bus {
    transport: Box<dyn I2cTransport>,
    /// Synchronous callers (commands, descriptor reads)
    command_ring: ScratchRing,
    /// Interrupt-triggered input reads
    interrupt_ring: ScratchRing,
}

impl Bus {
    pub fn new(transport: Box<dyn I2cTransport>, scratch_capacity: usize) -> Self {
        Self {
            transport,
            command_ring: ScratchRing::new(scratch_capacity),
            interrupt_ring: ScratchRing::new(scratch_capacity),
        }
    }

    /// Grow the rings to fit the largest transfers `descriptor` allows
    ///
    /// Input reads always ask for `maxInputLength` bytes and the report
    /// descriptor is read in one go, so neither may exceed its ring.
    pub fn fit_descriptor(&mut self, descriptor: &HidDescriptor) {
        let input_len = usize::from(descriptor.max_input_length);
        if self.interrupt_ring.reserve(input_len) {
            debug!(
                "Interrupt ring grown to {} bytes for maxInputLength {}",
                self.interrupt_ring.capacity(),
                input_len
            );
        }

        let rdesc_len = register_select(descriptor.report_desc_register).len()
            + usize::from(descriptor.report_desc_length);
        if self.command_ring.reserve(rdesc_len) {
            debug!(
                "Command ring grown to {} bytes for the report descriptor",
                self.command_ring.capacity()
            );
        }
    }

    /// Write a command with no response
    pub fn send(&mut self, frame: &CommandFrame<'_>) -> Result<(), I2cHidError> {
        let out = self.command_ring.allocate(frame.len())?;
        frame.write_to(out);
        self.transport.write(out)?;
        Ok(())
    }

    /// Write a command and read `response_len` bytes back in one transaction
    pub fn query(
        &mut self,
        frame: &CommandFrame<'_>,
        response_len: usize,
    ) -> Result<&[u8], I2cHidError> {
        let frame_len = frame.len();
        let region = self.command_ring.allocate(frame_len + response_len)?;
        let (out, response) = region.split_at_mut(frame_len);
        frame.write_to(out);
        self.transport.write_read(out, response)?;
        Ok(response)
    }

    /// Select a register and read `len` bytes from it
    pub fn read_register(&mut self, register: u16, len: usize) -> Result<&[u8], I2cHidError> {
        let select = register_select(register);
        let region = self.command_ring.allocate(select.len() + len)?;
        let (out, response) = region.split_at_mut(select.len());
        out.copy_from_slice(&select);
        self.transport.write_read(out, response)?;
        Ok(response)
    }

    /// Plain read of `len` bytes into the interrupt ring
    pub fn read_input(&mut self, len: usize) -> Result<&[u8], I2cHidError> {
        let buf = self.interrupt_ring.allocate(len)?;
        self.transport.read(buf)?;
        Ok(buf)
    }
}
