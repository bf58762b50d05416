//! Report delivery to the upstream HID layer

use std::time::Instant;

use tokio::sync::broadcast;

use crate::error::DeliveryError;
use crate::types::TimestampedReport;

/// Broadcast channel capacity for input reports
const REPORT_CHANNEL_CAPACITY: usize = 256;

/// Consumer of decoded input reports
///
/// Called from the input report worker, never with the bus lock held.
pub trait ReportSink: Send + Sync {
    fn deliver_input_report(&self, report: &[u8]) -> Result<(), DeliveryError>;
}

impl<F> ReportSink for F
where
    F: Fn(&[u8]) -> Result<(), DeliveryError> + Send + Sync,
{
    fn deliver_input_report(&self, report: &[u8]) -> Result<(), DeliveryError> {
        self(report)
    }
}

/// Fans input reports out to any number of subscribers
///
/// Clones share the same channel, so one clone can be handed to `attach`
/// while another keeps subscribing.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<TimestampedReport>,
    start_time: Instant,
}

impl BroadcastSink {
    pub fn new() -> Self {
        Self::with_capacity(REPORT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            start_time: Instant::now(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimestampedReport> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportSink for BroadcastSink {
    fn deliver_input_report(&self, report: &[u8]) -> Result<(), DeliveryError> {
        let timestamp = self.start_time.elapsed().as_secs_f64();
        self.tx
            .send(TimestampedReport::new(timestamp, report.to_vec()))
            .map(|_| ())
            .map_err(|_| DeliveryError("no subscribers".into()))
    }
}
