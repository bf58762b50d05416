//! Integration tests for the attached-device lifecycle.
//!
//! Every test drives the public API against the in-memory simulated device:
//! attach, synchronous report commands, the input pump, reset and power
//! handling, and detach.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use i2c_hid::sim::SimulatedDevice;
use i2c_hid::{
    attach, attach_with_irq, BroadcastSink, DescriptorLookup, DeviceConfig, DeviceHandle,
    Dispatch, DsmRequest, DsmValue, I2cHidError, InterruptHandle, PowerAck, PowerPhase,
    PowerState, ReportKind, TimestampedReport,
};
use tokio::sync::broadcast;

fn fast_config() -> DeviceConfig {
    DeviceConfig {
        reset_timeout_ms: 1000,
        post_reset_delay_ms: 0,
        ..DeviceConfig::default()
    }
    .with_dispatch(Dispatch::Polling {
        initial_delay_ms: 0,
        interval_ms: 1,
    })
}

fn attach_sim(sim: &SimulatedDevice, config: DeviceConfig) -> (DeviceHandle, BroadcastSink) {
    let sink = BroadcastSink::new();
    let handle = match attach(sim.transport(), &sim.lookup(), sink.clone(), config) {
        Ok(handle) => handle,
        Err(e) => panic!("attach failed: {e}"),
    };
    (handle, sink)
}

fn attach_err(sim: &SimulatedDevice, lookup: &dyn DescriptorLookup) -> I2cHidError {
    match attach(sim.transport(), lookup, BroadcastSink::new(), fast_config()) {
        Ok(_) => panic!("attach unexpectedly succeeded"),
        Err(e) => e,
    }
}

fn recv_within(
    rx: &mut broadcast::Receiver<TimestampedReport>,
    timeout: Duration,
) -> Option<TimestampedReport> {
    let deadline = Instant::now() + timeout;
    loop {
        match rx.try_recv() {
            Ok(report) => return Some(report),
            Err(broadcast::error::TryRecvError::Empty) if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(_) => return None,
        }
    }
}

/// Level-triggered interrupt line: fires while the device has input queued
struct IrqLine {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl IrqLine {
    fn connect(sim: &SimulatedDevice, irq: InterruptHandle) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        let sim = sim.clone();
        let thread = std::thread::spawn(move || {
            while r.load(Ordering::SeqCst) {
                if sim.pending_input() > 0 {
                    irq.trigger();
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        });
        Self {
            running,
            thread: Some(thread),
        }
    }
}

impl Drop for IrqLine {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn attach_with_line(
    sim: &SimulatedDevice,
    config: DeviceConfig,
) -> (DeviceHandle, BroadcastSink, IrqLine) {
    let sink = BroadcastSink::new();
    let mut line = None;
    let handle = match attach_with_irq(
        sim.transport(),
        &sim.lookup(),
        sink.clone(),
        config,
        |irq| line = Some(IrqLine::connect(sim, irq)),
    ) {
        Ok(handle) => handle,
        Err(e) => panic!("attach failed: {e}"),
    };
    (handle, sink, line.expect("interrupt line never connected"))
}

struct NoFirmwareMethod;

impl DescriptorLookup for NoFirmwareMethod {
    fn evaluate(&self, _request: &DsmRequest) -> Option<DsmValue> {
        None
    }
}

// ── Attach ──

#[test]
fn attach_resets_and_delivers_polled_reports() {
    let sim = SimulatedDevice::touchpad();
    let (handle, sink) = attach_sim(&sim, fast_config());
    let mut rx = sink.subscribe();

    assert_eq!(sim.resets(), 1);
    assert_eq!(sim.power_log(), vec![PowerState::On]);
    assert_eq!(handle.power_phase(), PowerPhase::Ready);
    assert!(handle.is_awake());

    sim.push_input_report(&[0x01, 0x05, 0xFB]);
    let report = recv_within(&mut rx, Duration::from_secs(2)).expect("no report delivered");
    assert_eq!(report.data, vec![0x01, 0x05, 0xFB]);

    handle.detach();
}

#[test]
fn attach_command_sequence() {
    let sim = SimulatedDevice::touchpad();
    let (handle, _sink) = attach_sim(&sim, fast_config());

    let writes = sim.writes();
    assert_eq!(writes[0], vec![0x01, 0x00]); // descriptor register select
    assert_eq!(writes[1], vec![0x05, 0x00, 0x00, 0x08]); // SET_POWER ON
    assert_eq!(writes[2], vec![0x05, 0x00, 0x00, 0x01]); // RESET
    assert_eq!(writes.len(), 3);

    drop(handle);
}

#[test]
fn attach_publishes_descriptor() {
    let sim = SimulatedDevice::touchpad();
    let (handle, _sink) = attach_sim(&sim, fast_config());

    assert_eq!(*handle.descriptor(), sim.descriptor());
    let identity = handle.identity();
    assert_eq!(identity.vendor_id, 0x04F3);
    assert_eq!(identity.product_id, 0x3147);
    assert_eq!(identity.transport, "I2C");

    let props = handle.properties();
    assert!(props.contains(&("VendorID", 0x04F3)));
    assert!(props.contains(&("MaxInputLength", 32)));

    let report_desc = handle.report_descriptor().unwrap();
    assert_eq!(report_desc.len(), sim.descriptor().report_desc_length as usize);
    assert_eq!(&report_desc[..4], &[0x05, 0x01, 0x09, 0x02]);
}

#[test]
fn attach_fails_without_firmware_method() {
    let sim = SimulatedDevice::touchpad();
    let err = attach_err(&sim, &NoFirmwareMethod);
    assert!(matches!(err, I2cHidError::NotFound(_)));
    assert_eq!(sim.transaction_count(), 0);
}

#[test]
fn attach_fails_on_bad_descriptor_version() {
    let mut desc = SimulatedDevice::touchpad().descriptor();
    desc.bcd_version = 0x0200;
    let sim = SimulatedDevice::new(0x0001, desc, vec![0x05, 0x01]);
    let err = attach_err(&sim, &sim.lookup());
    assert!(matches!(err, I2cHidError::Invalid(_)));
    assert_eq!(sim.resets(), 0);
}

#[test]
fn attach_fails_on_bus_error() {
    let sim = SimulatedDevice::touchpad();
    sim.set_failing(true);
    let err = attach_err(&sim, &sim.lookup());
    assert!(err.is_io());
}

#[test]
fn attach_survives_missing_reset_ack() {
    let sim = SimulatedDevice::touchpad();
    sim.set_reset_ack(false);
    let config = DeviceConfig {
        reset_timeout_ms: 30,
        ..fast_config()
    };

    let started = Instant::now();
    let (handle, _sink) = attach_sim(&sim, config);
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(handle.power_phase(), PowerPhase::Ready);

    // Explicit resets report the timeout
    let err = handle.reset().unwrap_err();
    assert!(matches!(err, I2cHidError::Timeout));
    assert_eq!(sim.resets(), 2);
    assert_eq!(handle.power_phase(), PowerPhase::Ready);
}

#[test]
fn attach_handles_large_max_input_length() {
    let mut desc = SimulatedDevice::touchpad().descriptor();
    desc.max_input_length = 5000;
    let sim = SimulatedDevice::new(0x0001, desc, vec![0x05, 0x01]);

    let started = Instant::now();
    let (handle, sink) = attach_sim(&sim, fast_config());
    let mut rx = sink.subscribe();
    // The reset acknowledgement was read, not waited out
    assert!(started.elapsed() < Duration::from_millis(900));

    let payload = vec![0x5A; 4000];
    sim.push_input_report(&payload);
    let report = recv_within(&mut rx, Duration::from_secs(2)).expect("no report delivered");
    assert_eq!(report.data, payload);

    handle.detach();
}

// ── Synchronous reports ──

#[test]
fn set_then_get_feature_report() {
    let sim = SimulatedDevice::touchpad();
    let (handle, _sink) = attach_sim(&sim, fast_config());

    handle
        .set_report(ReportKind::Feature, 3, &[0xAA, 0xBB])
        .unwrap();
    assert_eq!(
        sim.writes().last().unwrap(),
        &vec![0x05, 0x00, 0x33, 0x03, 0x06, 0x00, 0x05, 0x00, 0x03, 0xAA, 0xBB]
    );
    assert_eq!(
        sim.report(ReportKind::Feature, 3),
        Some(vec![0x03, 0xAA, 0xBB])
    );

    let mut out = [0u8; 3];
    handle
        .get_report(ReportKind::Feature, 3, &mut out)
        .unwrap();
    assert_eq!(out, [0x03, 0xAA, 0xBB]);
    assert_eq!(
        sim.writes().last().unwrap(),
        &vec![0x05, 0x00, 0x33, 0x02, 0x06, 0x00]
    );
}

#[test]
fn escaped_report_id() {
    let sim = SimulatedDevice::touchpad();
    let (handle, _sink) = attach_sim(&sim, fast_config());

    handle.set_report(ReportKind::Output, 20, &[0x01]).unwrap();
    assert_eq!(
        sim.writes().last().unwrap(),
        &vec![0x05, 0x00, 0x2F, 0x03, 20, 0x06, 0x00, 0x04, 0x00, 20, 0x01]
    );

    sim.store_report(ReportKind::Feature, 20, &[20, 0x42]);
    let mut out = [0u8; 2];
    handle
        .get_report(ReportKind::Feature, 20, &mut out)
        .unwrap();
    assert_eq!(out, [20, 0x42]);
    assert_eq!(
        sim.writes().last().unwrap(),
        &vec![0x05, 0x00, 0x3F, 0x02, 20, 0x06, 0x00]
    );
}

#[test]
fn wrong_report_kind_rejected_without_bus_traffic() {
    let sim = SimulatedDevice::touchpad();
    let (handle, _sink) = attach_sim(&sim, fast_config());
    let before = sim.writes().len();

    let mut out = [0u8; 4];
    assert!(matches!(
        handle.get_report(ReportKind::Output, 1, &mut out),
        Err(I2cHidError::Invalid(_))
    ));
    assert!(matches!(
        handle.set_report(ReportKind::Input, 1, &[0]),
        Err(I2cHidError::Invalid(_))
    ));
    assert_eq!(sim.writes().len(), before);
}

#[test]
fn report_error_is_returned_once() {
    let sim = SimulatedDevice::touchpad();
    let (handle, _sink) = attach_sim(&sim, fast_config());

    sim.set_failing(true);
    let err = handle
        .set_report(ReportKind::Feature, 1, &[0x00])
        .unwrap_err();
    assert!(err.is_io());

    sim.set_failing(false);
    handle.set_report(ReportKind::Feature, 1, &[0x00]).unwrap();
}

// ── Input pump ──

#[test]
fn zero_length_report_completes_reset_without_delivery() {
    let sim = SimulatedDevice::touchpad();
    let (handle, sink) = attach_sim(&sim, fast_config());
    let mut rx = sink.subscribe();

    handle.reset().unwrap();
    assert_eq!(sim.resets(), 2);
    assert!(recv_within(&mut rx, Duration::from_millis(50)).is_none());
}

#[test]
fn oversized_report_is_never_delivered() {
    let sim = SimulatedDevice::touchpad();
    let (_handle, sink) = attach_sim(&sim, fast_config());
    let mut rx = sink.subscribe();

    let mut oversized = vec![0xFF, 0x00];
    oversized.extend_from_slice(&[0xEE; 30]);
    sim.push_raw_input(&oversized);
    sim.push_raw_input(&[0x01, 0x00]);
    sim.push_input_report(&[0x02, 0x10]);

    let report = recv_within(&mut rx, Duration::from_secs(2)).expect("no report delivered");
    assert_eq!(report.data, vec![0x02, 0x10]);
    assert!(recv_within(&mut rx, Duration::from_millis(20)).is_none());
}

#[test]
fn interrupt_dispatch_reads_on_trigger() {
    let sim = SimulatedDevice::touchpad();
    // Plain attach connects no line, so the acknowledgement stays queued
    let config = DeviceConfig {
        reset_timeout_ms: 50,
        ..fast_config()
    }
    .with_dispatch(Dispatch::Interrupt);
    let (handle, sink) = attach_sim(&sim, config);
    let mut rx = sink.subscribe();
    let irq = handle.interrupt_handle();

    // Nothing reads without a trigger
    sim.push_input_report(&[0x07]);
    std::thread::sleep(Duration::from_millis(20));
    assert!(sim.pending_input() >= 1);

    let deadline = Instant::now() + Duration::from_secs(2);
    let report = loop {
        irq.trigger();
        if let Some(report) = recv_within(&mut rx, Duration::from_millis(5)) {
            break report;
        }
        assert!(Instant::now() < deadline, "no report delivered");
    };
    assert_eq!(report.data, vec![0x07]);

    handle.detach();
    assert!(!irq.trigger());
}

#[test]
fn interrupt_line_connected_before_reset_sees_ack() {
    let sim = SimulatedDevice::touchpad();
    let config = DeviceConfig {
        post_reset_delay_ms: 0,
        ..DeviceConfig::default()
    }
    .with_dispatch(Dispatch::Interrupt);

    let started = Instant::now();
    let (handle, sink, _line) = attach_with_line(&sim, config);
    let mut rx = sink.subscribe();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(sim.pending_input(), 0);
    assert_eq!(handle.power_phase(), PowerPhase::Ready);

    sim.push_input_report(&[0x01, 0x02]);
    let report = recv_within(&mut rx, Duration::from_secs(2)).expect("no report delivered");
    assert_eq!(report.data, vec![0x01, 0x02]);

    // Explicit resets are acknowledged the same way
    let started = Instant::now();
    handle.reset().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(sim.resets(), 2);
}

// ── Power ──

#[test]
fn sleep_and_wake_are_idempotent() {
    let sim = SimulatedDevice::touchpad();
    let (handle, _sink) = attach_sim(&sim, fast_config());
    let irq = handle.interrupt_handle();

    handle.request_power_state(PowerState::Sleep).unwrap();
    handle.request_power_state(PowerState::Sleep).unwrap();
    assert!(!handle.is_awake());
    assert_eq!(handle.power_phase(), PowerPhase::Off);
    assert_eq!(sim.power_log(), vec![PowerState::On, PowerState::Sleep]);
    assert!(!irq.trigger());

    handle.request_power_state(PowerState::On).unwrap();
    handle.request_power_state(PowerState::On).unwrap();
    assert!(handle.is_awake());
    assert_eq!(
        sim.power_log(),
        vec![PowerState::On, PowerState::Sleep, PowerState::On]
    );
    assert_eq!(sim.resets(), 2);
}

#[test]
fn reset_while_asleep_wakes_device() {
    let sim = SimulatedDevice::touchpad();
    let (handle, sink) = attach_sim(&sim, fast_config());
    let mut rx = sink.subscribe();

    handle.request_power_state(PowerState::Sleep).unwrap();
    assert!(!handle.is_awake());

    handle.reset().unwrap();
    assert!(handle.is_awake());
    assert_eq!(handle.power_phase(), PowerPhase::Ready);
    assert_eq!(
        sim.power_log(),
        vec![PowerState::On, PowerState::Sleep, PowerState::On]
    );

    sim.push_input_report(&[0x03]);
    let report = recv_within(&mut rx, Duration::from_secs(2)).expect("no report delivered");
    assert_eq!(report.data, vec![0x03]);
}

#[test]
fn power_callback_always_acknowledges() {
    let sim = SimulatedDevice::touchpad();
    let (handle, _sink) = attach_sim(&sim, fast_config());

    sim.set_failing(true);
    assert_eq!(
        handle.on_power_state_change_requested(PowerState::Sleep),
        PowerAck::Implied
    );
    sim.set_failing(false);
}

#[test]
fn cancel_unblocks_pending_reset() {
    let sim = SimulatedDevice::touchpad();
    let config = DeviceConfig {
        reset_timeout_ms: 10_000,
        ..fast_config()
    };
    let (handle, _sink) = attach_sim(&sim, config);
    sim.set_reset_ack(false);

    let started = Instant::now();
    let result = std::thread::scope(|s| {
        let waiter = s.spawn(|| handle.reset());
        while !handle.cancel_reset() {
            assert!(started.elapsed() < Duration::from_secs(5));
            std::thread::sleep(Duration::from_millis(1));
        }
        waiter.join().unwrap()
    });

    assert!(matches!(result, Err(I2cHidError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(handle.power_phase(), PowerPhase::Ready);
}

// ── Async callers ──

#[tokio::test]
async fn handle_usable_from_current_thread_runtime() {
    let sim = SimulatedDevice::touchpad();
    let (handle, _sink) = attach_sim(&sim, fast_config());

    handle.request_power_state(PowerState::Sleep).unwrap();
    handle.request_power_state(PowerState::On).unwrap();
    handle.reset().unwrap();
    assert_eq!(sim.resets(), 3);
    drop(handle);
}

#[tokio::test(flavor = "multi_thread")]
async fn handle_dropped_inside_task() {
    let sim = SimulatedDevice::touchpad();
    let (handle, _sink) = attach_sim(&sim, fast_config());
    let irq = handle.interrupt_handle();

    let task = tokio::spawn(async move {
        let result = handle.reset();
        drop(handle);
        result
    });
    assert!(task.await.unwrap().is_ok());
    assert!(!irq.trigger());
}
