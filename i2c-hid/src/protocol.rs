//! Protocol constants for the I2C-HID transport

/// Command opcodes (high byte of the command word)
pub mod opcode {
    pub const RESET: u8 = 0x01;
    pub const GET_REPORT: u8 = 0x02;
    pub const SET_REPORT: u8 = 0x03;
    pub const GET_IDLE: u8 = 0x04;
    pub const SET_IDLE: u8 = 0x05;
    pub const GET_PROTOCOL: u8 = 0x06;
    pub const SET_PROTOCOL: u8 = 0x07;
    pub const SET_POWER: u8 = 0x08;

    /// Get human-readable name for an opcode
    pub fn name(op: u8) -> &'static str {
        match op {
            RESET => "RESET",
            GET_REPORT => "GET_REPORT",
            SET_REPORT => "SET_REPORT",
            GET_IDLE => "GET_IDLE",
            SET_IDLE => "SET_IDLE",
            GET_PROTOCOL => "GET_PROTOCOL",
            SET_PROTOCOL => "SET_PROTOCOL",
            SET_POWER => "SET_POWER",
            _ => "UNKNOWN",
        }
    }
}

/// Raw report type codes (bits 4-5 of the report type/ID byte)
pub mod report_type {
    pub const INPUT: u8 = 0x01;
    pub const OUTPUT: u8 = 0x02;
    pub const FEATURE: u8 = 0x03;
}

/// SET_POWER arguments
pub mod power {
    pub const ON: u8 = 0x00;
    pub const SLEEP: u8 = 0x01;
}

/// Report IDs at or above this value do not fit the 4-bit field and are
/// sent as an extra argument byte with the field set to this escape value.
pub const REPORT_ID_ESCAPE: u8 = 0x0F;

/// Size of a command word including the register address
pub const COMMAND_HEADER_LEN: usize = 4;

/// Size of the length prefix on input and GET_REPORT responses
pub const LENGTH_PREFIX_LEN: usize = 2;

/// HID descriptor constants
pub mod descriptor {
    /// Wire size of the HID descriptor
    pub const LENGTH: usize = 30;
    /// Only supported protocol version (1.00)
    pub const BCD_VERSION: u16 = 0x0100;
}

/// Device Specific Method used to ask the platform for the HID descriptor register
pub mod dsm {
    /// 3CDFF6F7-4267-4555-AD05-B30A3D8938DE in buffer byte order
    pub const HID_DESCRIPTOR_UUID: [u8; 16] = [
        0xF7, 0xF6, 0xDF, 0x3C, 0x67, 0x42, 0x55, 0x45, 0xAD, 0x05, 0xB3, 0x0A, 0x3D, 0x89, 0x38,
        0xDE,
    ];
    pub const REVISION: u64 = 1;
    pub const FUNCTION: u64 = 1;
    pub const ARGUMENT: u64 = 0;

    /// Method names tried in order
    pub const METHODS: [&str; 2] = ["_DSM", "XDSM"];
}

/// Scratch ring sizing
pub mod scratch {
    /// Default capacity of each scratch ring
    pub const CAPACITY: usize = 4096;
    /// Gap left between consecutive allocations
    pub const MARGIN: usize = 0x10;
}

/// Timing constants (milliseconds)
pub mod timing {
    /// Device must finish a host-initiated reset within this time
    pub const RESET_TIMEOUT_MS: u64 = 5000;
    /// Delay between SET_POWER ON and RESET
    pub const POWER_SETTLE_MS: u64 = 1;
    /// Delay after the initial reset before input reports are accepted
    pub const POST_RESET_DELAY_MS: u64 = 100;
    /// First poll when no interrupt line is available
    pub const POLL_INITIAL_DELAY_MS: u64 = 200;
    /// Poll period when no interrupt line is available
    pub const POLL_INTERVAL_MS: u64 = 5;
}
