//! In-memory I2C-HID device
//!
//! Answers descriptor and report-descriptor register reads, keeps SET_REPORT
//! bodies for later GET_REPORTs, queues input reports, and acknowledges RESET
//! with a zero-length report. Reads with nothing queued fail with
//! `WouldBlock`, which the input path treats as "no data".

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::descriptor::{FixedRegister, HidDescriptor};
use crate::protocol::{descriptor, opcode, REPORT_ID_ESCAPE};
use crate::types::{PowerState, ReportKind};
use crate::I2cTransport;

/// Boot-protocol mouse: 3 buttons, relative X/Y
const MOUSE_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xA1, 0x01, // Collection (Application)
    0x09, 0x01, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    0x05, 0x09, //     Usage Page (Button)
    0x19, 0x01, //     Usage Minimum (1)
    0x29, 0x03, //     Usage Maximum (3)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x03, //     Report Count (3)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data,Var,Abs)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x05, //     Report Size (5)
    0x81, 0x01, //     Input (Const)
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7F, //     Logical Maximum (127)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x02, //     Report Count (2)
    0x81, 0x06, //     Input (Data,Var,Rel)
    0xC0, //   End Collection
    0xC0, // End Collection
];

struct SimState {
    descriptor_register: u16,
    descriptor: HidDescriptor,
    report_descriptor: Vec<u8>,
    input_queue: VecDeque<Vec<u8>>,
    /// Bodies written by SET_REPORT, keyed by (report type, report ID)
    reports: HashMap<(u8, u8), Vec<u8>>,
    reset_ack: bool,
    failing: bool,
    writes: Vec<Vec<u8>>,
    transactions: usize,
    resets: usize,
    power_log: Vec<PowerState>,
}

impl SimState {
    fn begin(&mut self) -> io::Result<()> {
        self.transactions += 1;
        if self.failing {
            Err(io::Error::other("simulated bus fault"))
        } else {
            Ok(())
        }
    }

    fn handle_write(&mut self, data: &[u8]) -> io::Result<()> {
        self.writes.push(data.to_vec());
        if data.len() < 4 || register(data) != self.descriptor.command_register {
            return Ok(());
        }

        let type_id = data[2];
        match data[3] & 0x0F {
            opcode::RESET => {
                self.resets += 1;
                if self.reset_ack {
                    self.input_queue.push_back(vec![0, 0]);
                }
            }
            opcode::SET_POWER => {
                let state = if type_id & 0x03 == PowerState::Sleep.raw() {
                    PowerState::Sleep
                } else {
                    PowerState::On
                };
                self.power_log.push(state);
            }
            opcode::SET_REPORT => {
                let (key, rest) = split_report_command(type_id, &data[4..])?;
                // data register, then the size field
                let body = rest.get(4..).ok_or_else(|| malformed("SET_REPORT"))?;
                self.reports.insert(key, body.to_vec());
            }
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unsupported opcode 0x{other:02X}"),
                ))
            }
        }
        Ok(())
    }

    fn handle_write_read(&mut self, data: &[u8], out: &mut [u8]) -> io::Result<()> {
        self.writes.push(data.to_vec());
        out.fill(0);

        if data.len() == 2 {
            let reg = register(data);
            let source = if reg == self.descriptor_register {
                self.descriptor.to_bytes().to_vec()
            } else if reg == self.descriptor.report_desc_register {
                self.report_descriptor.clone()
            } else {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("read from unknown register 0x{reg:04X}"),
                ));
            };
            copy_truncated(&source, out);
            return Ok(());
        }

        if data.len() >= 4
            && register(data) == self.descriptor.command_register
            && data[3] & 0x0F == opcode::GET_REPORT
        {
            let (key, _) = split_report_command(data[2], &data[4..])?;
            let body = self.reports.get(&key).cloned().unwrap_or_else(|| {
                if key.1 != 0 {
                    vec![key.1]
                } else {
                    Vec::new()
                }
            });
            let size = (body.len() + 2) as u16;
            let mut response = size.to_le_bytes().to_vec();
            response.extend_from_slice(&body);
            copy_truncated(&response, out);
            return Ok(());
        }

        Err(malformed("write-then-read"))
    }

    fn handle_read(&mut self, out: &mut [u8]) -> io::Result<()> {
        let report = self
            .input_queue
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "no input pending"))?;
        out.fill(0);
        copy_truncated(&report, out);
        Ok(())
    }
}

fn register(data: &[u8]) -> u16 {
    u16::from_le_bytes([data[0], data[1]])
}

fn copy_truncated(src: &[u8], dst: &mut [u8]) {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
}

fn malformed(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("malformed {what}"))
}

/// Decode report type and ID, consuming the escape byte if present
fn split_report_command(type_id: u8, args: &[u8]) -> io::Result<((u8, u8), &[u8])> {
    let kind = (type_id >> 4) & 0x03;
    let nibble = type_id & 0x0F;
    if nibble == REPORT_ID_ESCAPE {
        let (&id, rest) = args.split_first().ok_or_else(|| malformed("report ID"))?;
        Ok(((kind, id), rest))
    } else {
        Ok(((kind, nibble), args))
    }
}

/// Simulated device; clones share state
#[derive(Clone)]
pub struct SimulatedDevice {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedDevice {
    pub fn new(
        descriptor_register: u16,
        descriptor: HidDescriptor,
        report_descriptor: Vec<u8>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                descriptor_register,
                descriptor,
                report_descriptor,
                input_queue: VecDeque::new(),
                reports: HashMap::new(),
                reset_ack: true,
                failing: false,
                writes: Vec::new(),
                transactions: 0,
                resets: 0,
                power_log: Vec::new(),
            })),
        }
    }

    /// A small touchpad with a mouse-style report descriptor
    pub fn touchpad() -> Self {
        let descriptor = HidDescriptor {
            desc_length: descriptor::LENGTH as u16,
            bcd_version: descriptor::BCD_VERSION,
            report_desc_length: MOUSE_REPORT_DESCRIPTOR.len() as u16,
            report_desc_register: 0x0002,
            input_register: 0x0003,
            max_input_length: 32,
            output_register: 0x0004,
            max_output_length: 32,
            command_register: 0x0005,
            data_register: 0x0006,
            vendor_id: 0x04F3,
            product_id: 0x3147,
            version_id: 0x0001,
        };
        Self::new(0x0001, descriptor, MOUSE_REPORT_DESCRIPTOR.to_vec())
    }

    pub fn descriptor(&self) -> HidDescriptor {
        self.state.lock().descriptor
    }

    /// Lookup answering with this device's descriptor register
    pub fn lookup(&self) -> FixedRegister {
        FixedRegister(self.state.lock().descriptor_register)
    }

    /// A transport wired to this device
    pub fn transport(&self) -> SimTransport {
        SimTransport {
            state: Arc::clone(&self.state),
        }
    }

    /// Queue an input report; the length prefix is added here
    pub fn push_input_report(&self, payload: &[u8]) {
        let size = (payload.len() + 2) as u16;
        let mut raw = size.to_le_bytes().to_vec();
        raw.extend_from_slice(payload);
        self.push_raw_input(&raw);
    }

    /// Queue bytes exactly as the next read returns them
    pub fn push_raw_input(&self, raw: &[u8]) {
        self.state.lock().input_queue.push_back(raw.to_vec());
    }

    pub fn pending_input(&self) -> usize {
        self.state.lock().input_queue.len()
    }

    /// Whether RESET is answered with a zero-length report
    pub fn set_reset_ack(&self, ack: bool) {
        self.state.lock().reset_ack = ack;
    }

    /// Make every transaction fail with an I/O error
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    /// Preload the body a GET_REPORT returns
    pub fn store_report(&self, kind: ReportKind, report_id: u8, body: &[u8]) {
        self.state
            .lock()
            .reports
            .insert((kind.raw(), report_id), body.to_vec());
    }

    /// Last body written by SET_REPORT (or preloaded)
    pub fn report(&self, kind: ReportKind, report_id: u8) -> Option<Vec<u8>> {
        self.state
            .lock()
            .reports
            .get(&(kind.raw(), report_id))
            .cloned()
    }

    /// Every write and write-then-read request, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    pub fn transaction_count(&self) -> usize {
        self.state.lock().transactions
    }

    pub fn resets(&self) -> usize {
        self.state.lock().resets
    }

    pub fn power_log(&self) -> Vec<PowerState> {
        self.state.lock().power_log.clone()
    }
}

/// [`I2cTransport`] end of a [`SimulatedDevice`]
pub struct SimTransport {
    state: Arc<Mutex<SimState>>,
}

impl I2cTransport for SimTransport {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        state.begin()?;
        state.handle_write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        state.begin()?;
        state.handle_read(buf)
    }

    fn write_read(&mut self, data: &[u8], buf: &mut [u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        state.begin()?;
        state.handle_write_read(data, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_register_read() {
        let sim = SimulatedDevice::touchpad();
        let mut transport = sim.transport();
        let mut buf = [0u8; 30];
        transport.write_read(&[0x01, 0x00], &mut buf).unwrap();
        let desc = HidDescriptor::parse(&buf).unwrap();
        assert_eq!(desc.vendor_id, 0x04F3);
        assert_eq!(sim.transaction_count(), 1);
    }

    #[test]
    fn test_reset_queues_ack() {
        let sim = SimulatedDevice::touchpad();
        let mut transport = sim.transport();
        transport.write(&[0x05, 0x00, 0x00, 0x01]).unwrap();
        assert_eq!(sim.resets(), 1);

        let mut buf = [0xFFu8; 32];
        transport.read(&mut buf).unwrap();
        assert_eq!(&buf[..2], &[0, 0]);

        let err = transport.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_set_then_get_feature() {
        let sim = SimulatedDevice::touchpad();
        let mut transport = sim.transport();
        // SET_REPORT feature id 3: data reg 6, size 5, id, payload [0xAA, 0xBB]
        transport
            .write(&[0x05, 0x00, 0x33, 0x03, 0x06, 0x00, 0x05, 0x00, 0x03, 0xAA, 0xBB])
            .unwrap();
        assert_eq!(
            sim.report(ReportKind::Feature, 3),
            Some(vec![0x03, 0xAA, 0xBB])
        );

        let mut buf = [0u8; 5];
        transport
            .write_read(&[0x05, 0x00, 0x33, 0x02, 0x06, 0x00], &mut buf)
            .unwrap();
        assert_eq!(buf, [0x05, 0x00, 0x03, 0xAA, 0xBB]);
    }

    #[test]
    fn test_failing_counts_transaction() {
        let sim = SimulatedDevice::touchpad();
        sim.set_failing(true);
        let mut transport = sim.transport();
        assert!(transport.write(&[0x05, 0x00, 0x00, 0x01]).is_err());
        assert_eq!(sim.transaction_count(), 1);
        assert_eq!(sim.resets(), 0);
    }
}
