//! I2C transport over the Linux i2c-dev character device

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;

use i2c_hid::I2cTransport;
use tracing::debug;

// From linux/i2c-dev.h and linux/i2c.h
const I2C_SLAVE: libc::c_ulong = 0x0703;
const I2C_RDWR: libc::c_ulong = 0x0707;
const I2C_M_RD: u16 = 0x0001;

/// struct i2c_msg
#[repr(C)]
struct I2cMsg {
    addr: u16,
    flags: u16,
    len: u16,
    buf: *mut u8,
}

/// struct i2c_rdwr_ioctl_data
#[repr(C)]
struct I2cRdwrIoctlData {
    msgs: *mut I2cMsg,
    nmsgs: u32,
}

/// One device address on `/dev/i2c-N`
pub struct I2cDevTransport {
    file: File,
    address: u16,
}

impl I2cDevTransport {
    pub fn open(bus: u32, address: u16) -> io::Result<Self> {
        let path = format!("/dev/i2c-{bus}");
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let ret =
            unsafe { libc::ioctl(file.as_raw_fd(), I2C_SLAVE, libc::c_ulong::from(address)) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        debug!("Opened {} address 0x{:02x}", path, address);
        Ok(Self { file, address })
    }

    pub fn address(&self) -> u16 {
        self.address
    }
}

fn msg_len(len: usize) -> io::Result<u16> {
    u16::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{len} byte transfer exceeds i2c message limit"),
        )
    })
}

impl I2cTransport for I2cDevTransport {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let written = self.file.write(data)?;
        if written != data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {written} of {} bytes", data.len()),
            ));
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let read = self.file.read(buf)?;
        if read != buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short read: {read} of {} bytes", buf.len()),
            ));
        }
        Ok(())
    }

    /// Combined write then read with a repeated start
    fn write_read(&mut self, data: &[u8], buf: &mut [u8]) -> io::Result<()> {
        let mut msgs = [
            I2cMsg {
                addr: self.address,
                flags: 0,
                len: msg_len(data.len())?,
                // Kernel only reads from a write message
                buf: data.as_ptr().cast_mut(),
            },
            I2cMsg {
                addr: self.address,
                flags: I2C_M_RD,
                len: msg_len(buf.len())?,
                buf: buf.as_mut_ptr(),
            },
        ];
        let mut request = I2cRdwrIoctlData {
            msgs: msgs.as_mut_ptr(),
            nmsgs: msgs.len() as u32,
        };

        let request_ptr: *mut I2cRdwrIoctlData = &mut request;
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), I2C_RDWR, request_ptr) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_layout_matches_kernel() {
        assert_eq!(
            std::mem::size_of::<I2cMsg>(),
            8 + std::mem::size_of::<usize>()
        );
        assert_eq!(
            std::mem::size_of::<I2cRdwrIoctlData>(),
            2 * std::mem::size_of::<usize>()
        );
    }

    #[test]
    fn test_msg_len_limit() {
        assert_eq!(msg_len(30).unwrap(), 30);
        assert!(msg_len(70_000).is_err());
    }

    #[test]
    fn test_open_missing_bus() {
        assert!(I2cDevTransport::open(9999, 0x2C).is_err());
    }
}
