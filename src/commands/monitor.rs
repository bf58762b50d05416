//! Live input report monitor.

use super::{open_session, CommandResult};
use i2c_hid::sim::SimulatedDevice;
use i2c_hid::BroadcastSink;
use i2c_hid_driver::format::hex_line;
use i2c_hid_driver::DriverConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, warn};

/// Interval between synthetic reports in `--simulate` mode
const SIM_REPORT_INTERVAL_MS: u64 = 10;

/// Print input reports until Ctrl+C or `count` reports
pub fn monitor(config: &DriverConfig, simulate: bool, count: Option<usize>) -> CommandResult {
    let sink = BroadcastSink::new();
    let mut rx = sink.subscribe();
    let session = open_session(config, simulate, sink)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let feeder = session
        .sim
        .clone()
        .map(|sim| spawn_sim_feeder(sim, running.clone()))
        .transpose()?;

    let identity = session.device.identity();
    println!(
        "Monitoring {:04X}:{:04X} (Ctrl+C to stop)...",
        identity.vendor_id, identity.product_id
    );

    let mut received = 0usize;
    while running.load(Ordering::SeqCst) {
        match rx.try_recv() {
            Ok(report) => {
                received += 1;
                println!(
                    "[{:10.3}] {:3} bytes: {}",
                    report.timestamp,
                    report.data.len(),
                    hex_line(&report.data)
                );
                if count.is_some_and(|n| received >= n) {
                    break;
                }
            }
            Err(TryRecvError::Empty) => std::thread::sleep(Duration::from_millis(1)),
            Err(TryRecvError::Lagged(n)) => warn!("Monitor fell behind, {} reports skipped", n),
            Err(TryRecvError::Closed) => break,
        }
    }

    running.store(false, Ordering::SeqCst);
    if let Some(feeder) = feeder {
        let _ = feeder.join();
    }
    session.device.detach();
    println!("{received} reports received");
    Ok(())
}

/// Push mouse-style reports tracing a small square
fn spawn_sim_feeder(
    sim: SimulatedDevice,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    const STEPS: [(i8, i8); 4] = [(4, 0), (0, 4), (-4, 0), (0, -4)];

    std::thread::Builder::new()
        .name("sim-feeder".into())
        .spawn(move || {
            let mut tick = 0usize;
            while running.load(Ordering::SeqCst) {
                let (dx, dy) = STEPS[(tick / 25) % STEPS.len()];
                let buttons = u8::from(tick % 100 < 5);
                sim.push_input_report(&[buttons, dx as u8, dy as u8]);
                tick += 1;
                std::thread::sleep(Duration::from_millis(SIM_REPORT_INTERVAL_MS));
            }
            debug!("Simulated input stopped after {} reports", tick);
        })
}
