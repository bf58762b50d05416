//! Command frame encoding
//!
//! Every request to an I2C-HID device is a write to its command register:
//!
//! ```text
//! [reg_lo, reg_hi, report_type_id, opcode, args...]
//! ```
//!
//! `report_type_id` carries the raw report type in bits 4-5 and the report ID
//! in bits 0-3. IDs of 15 and above do not fit, so the nibble is set to 0x0F
//! and the real ID goes out as the first argument byte.
//!
//! Frames borrow their payload and are written straight into a scratch region
//! under the bus lock, so nothing is copied twice.

use crate::error::I2cHidError;
use crate::protocol::{opcode, COMMAND_HEADER_LEN, REPORT_ID_ESCAPE};
use crate::types::{PowerState, ReportKind};

/// Longest fixed argument block: escaped ID, data register, size, report ID
const MAX_PREFIX_ARGS: usize = 6;

/// A single encoded command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame<'a> {
    register: u16,
    opcode: u8,
    report_type_id: u8,
    args: [u8; MAX_PREFIX_ARGS],
    args_len: usize,
    payload: &'a [u8],
}

impl<'a> CommandFrame<'a> {
    fn new(register: u16, opcode: u8, report_type_id: u8) -> Self {
        Self {
            register,
            opcode,
            report_type_id,
            args: [0; MAX_PREFIX_ARGS],
            args_len: 0,
            payload: &[],
        }
    }

    fn push_arg(&mut self, byte: u8) {
        self.args[self.args_len] = byte;
        self.args_len += 1;
    }

    fn push_u16(&mut self, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push_arg(lo);
        self.push_arg(hi);
    }

    /// RESET: no arguments
    pub fn reset(command_register: u16) -> Self {
        Self::new(command_register, opcode::RESET, 0)
    }

    /// SET_POWER: the power state rides in the report type/ID byte
    pub fn set_power(command_register: u16, state: PowerState) -> Self {
        Self::new(command_register, opcode::SET_POWER, state.raw())
    }

    /// GET_REPORT for an input or feature report
    pub fn get_report(
        command_register: u16,
        data_register: u16,
        kind: ReportKind,
        report_id: u8,
    ) -> Result<Self, I2cHidError> {
        if kind == ReportKind::Output {
            return Err(I2cHidError::Invalid(
                "GET_REPORT only supports input and feature reports".into(),
            ));
        }

        let (nibble, escaped) = split_report_id(report_id);
        let mut frame = Self::new(
            command_register,
            opcode::GET_REPORT,
            nibble | (kind.raw() << 4),
        );
        if let Some(id) = escaped {
            frame.push_arg(id);
        }
        frame.push_u16(data_register);
        Ok(frame)
    }

    /// SET_REPORT for an output or feature report
    ///
    /// The data register receives `[size_lo, size_hi, report_id?, payload...]`
    /// where `size` counts itself, the optional ID byte and the payload.
    pub fn set_report(
        command_register: u16,
        data_register: u16,
        kind: ReportKind,
        report_id: u8,
        payload: &'a [u8],
    ) -> Result<Self, I2cHidError> {
        if kind == ReportKind::Input {
            return Err(I2cHidError::Invalid(
                "SET_REPORT only supports output and feature reports".into(),
            ));
        }

        let size = set_report_size(report_id, payload.len())?;
        let (nibble, escaped) = split_report_id(report_id);
        let mut frame = Self::new(
            command_register,
            opcode::SET_REPORT,
            nibble | (kind.raw() << 4),
        );
        if let Some(id) = escaped {
            frame.push_arg(id);
        }
        frame.push_u16(data_register);
        frame.push_u16(size);
        if report_id != 0 {
            frame.push_arg(report_id);
        }
        frame.payload = payload;
        Ok(frame)
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn report_type_id(&self) -> u8 {
        self.report_type_id
    }

    /// Encoded length in bytes
    pub fn len(&self) -> usize {
        COMMAND_HEADER_LEN + self.args_len + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the frame into `buf`, which must be at least `len()` bytes.
    /// Returns the number of bytes written.
    pub fn write_to(&self, buf: &mut [u8]) -> usize {
        let [reg_lo, reg_hi] = self.register.to_le_bytes();
        buf[0] = reg_lo;
        buf[1] = reg_hi;
        buf[2] = self.report_type_id;
        buf[3] = self.opcode;

        let args_end = COMMAND_HEADER_LEN + self.args_len;
        buf[COMMAND_HEADER_LEN..args_end].copy_from_slice(&self.args[..self.args_len]);
        buf[args_end..args_end + self.payload.len()].copy_from_slice(self.payload);
        self.len()
    }

    /// Encode into a fresh vector
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.len()];
        self.write_to(&mut buf);
        buf
    }
}

/// Register-select write used before reading a descriptor block
pub fn register_select(register: u16) -> [u8; 2] {
    register.to_le_bytes()
}

/// Value of the SET_REPORT size field
pub fn set_report_size(report_id: u8, payload_len: usize) -> Result<u16, I2cHidError> {
    let size = 2 + usize::from(report_id != 0) + payload_len;
    u16::try_from(size)
        .map_err(|_| I2cHidError::Invalid(format!("{payload_len} byte report is too large")))
}

/// Split a report ID into the in-frame nibble and the escaped argument byte
fn split_report_id(report_id: u8) -> (u8, Option<u8>) {
    if report_id >= REPORT_ID_ESCAPE {
        (REPORT_ID_ESCAPE, Some(report_id))
    } else {
        (report_id, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CMD_REG: u16 = 0x0005;
    const DATA_REG: u16 = 0x0006;

    #[test]
    fn test_reset_frame() {
        let frame = CommandFrame::reset(CMD_REG);
        assert_eq!(frame.to_vec(), vec![0x05, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_set_power_frames() {
        let on = CommandFrame::set_power(0x1234, PowerState::On);
        assert_eq!(on.to_vec(), vec![0x34, 0x12, 0x00, 0x08]);
        let sleep = CommandFrame::set_power(0x1234, PowerState::Sleep);
        assert_eq!(sleep.to_vec(), vec![0x34, 0x12, 0x01, 0x08]);
    }

    #[test]
    fn test_get_feature_report_small_id() {
        let frame = CommandFrame::get_report(CMD_REG, DATA_REG, ReportKind::Feature, 5).unwrap();
        assert_eq!(frame.report_type_id(), 0x35);
        assert_eq!(frame.to_vec(), vec![0x05, 0x00, 0x35, 0x02, 0x06, 0x00]);
    }

    #[test]
    fn test_get_report_escapes_large_id() {
        let frame = CommandFrame::get_report(CMD_REG, DATA_REG, ReportKind::Feature, 20).unwrap();
        let bytes = frame.to_vec();
        assert_eq!(bytes[2] & 0x0F, 0x0F);
        assert_eq!(bytes[2], 0x3F);
        assert_eq!(bytes[4], 20);
        assert_eq!(&bytes[5..], &[0x06, 0x00]);
    }

    #[test]
    fn test_get_input_report() {
        let frame = CommandFrame::get_report(CMD_REG, DATA_REG, ReportKind::Input, 1).unwrap();
        assert_eq!(frame.report_type_id(), 0x11);
    }

    #[test]
    fn test_get_output_report_is_invalid() {
        let err = CommandFrame::get_report(CMD_REG, DATA_REG, ReportKind::Output, 1).unwrap_err();
        assert!(matches!(err, I2cHidError::Invalid(_)));
    }

    #[test]
    fn test_set_report_size_field() {
        assert_eq!(set_report_size(0, 8).unwrap(), 10);
        assert_eq!(set_report_size(3, 8).unwrap(), 11);
    }

    #[test]
    fn test_set_report_without_id() {
        let payload = [1, 2, 3, 4, 5, 6, 7, 8];
        let frame =
            CommandFrame::set_report(CMD_REG, DATA_REG, ReportKind::Output, 0, &payload).unwrap();
        assert_eq!(
            frame.to_vec(),
            vec![0x05, 0x00, 0x20, 0x03, 0x06, 0x00, 10, 0x00, 1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    fn test_set_report_with_id() {
        let payload = [0xAA; 8];
        let frame =
            CommandFrame::set_report(CMD_REG, DATA_REG, ReportKind::Feature, 3, &payload).unwrap();
        let bytes = frame.to_vec();
        assert_eq!(bytes[2], 0x33);
        assert_eq!(&bytes[4..9], &[0x06, 0x00, 11, 0x00, 3]);
        assert_eq!(&bytes[9..], &payload);
        assert_eq!(frame.len(), 4 + 5 + 8);
    }

    #[test]
    fn test_set_report_escaped_id() {
        let payload = [0x01, 0x02];
        let frame =
            CommandFrame::set_report(CMD_REG, DATA_REG, ReportKind::Feature, 0x20, &payload)
                .unwrap();
        assert_eq!(
            frame.to_vec(),
            vec![0x05, 0x00, 0x3F, 0x03, 0x20, 0x06, 0x00, 5, 0x00, 0x20, 0x01, 0x02]
        );
    }

    #[test]
    fn test_set_input_report_is_invalid() {
        let err = CommandFrame::set_report(CMD_REG, DATA_REG, ReportKind::Input, 1, &[0])
            .unwrap_err();
        assert!(matches!(err, I2cHidError::Invalid(_)));
    }

    #[test]
    fn test_write_to_larger_buffer() {
        let frame = CommandFrame::reset(CMD_REG);
        let mut buf = [0xEE; 8];
        assert_eq!(frame.write_to(&mut buf), 4);
        assert_eq!(&buf[..4], &[0x05, 0x00, 0x00, 0x01]);
        assert_eq!(buf[4], 0xEE);
    }
}
