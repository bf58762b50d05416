//! I2C-HID error types

use thiserror::Error;

/// Errors that can occur while talking to an I2C-HID device
#[derive(Error, Debug)]
pub enum I2cHidError {
    /// Platform lookup produced no answer
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed descriptor, bad register value or bad caller argument
    #[error("Invalid: {0}")]
    Invalid(String),

    /// Bus transaction failed
    #[error("I2C transfer failed: {0}")]
    Io(#[from] std::io::Error),

    /// Device did not acknowledge a reset in time
    #[error("Timed out waiting for reset acknowledgement")]
    Timeout,

    /// Scratch buffer cannot hold the transaction
    #[error("No resources: {requested} byte transfer exceeds {capacity} byte scratch ring")]
    NoResources { requested: usize, capacity: usize },

    /// Report sink rejected a report
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// A pending wait was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Device has been detached
    #[error("Device detached")]
    Detached,
}

/// Error returned by a [`ReportSink`](crate::ReportSink) that could not accept a report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Report delivery failed: {0}")]
pub struct DeliveryError(pub String);

impl I2cHidError {
    /// Whether this error came from the bus itself
    pub fn is_io(&self) -> bool {
        matches!(self, I2cHidError::Io(_))
    }
}
