//! Error module for the latency analysis library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, Clone, PartialEq)]
pub enum LatencyError {
    /// Error for malformed time windows, e.g., non-positive bin width or inverted bounds.
    InvalidWindow(String),
    /// Error for a baseline window with too few samples to estimate resting statistics.
    InsufficientBaseline { required: usize, found: usize },
    /// Error for a stimulus condition with no presentations.
    EmptyStimulusTable(String),
    /// Error for a configuration that would invalidate every row, detected before processing.
    InvalidConfig(String),
    /// Error for invalid spike train data, e.g., non-finite timestamps.
    InvalidSpikeTrain(String),
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for LatencyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LatencyError::InvalidWindow(e) => write!(f, "Invalid time window: {}", e),
            LatencyError::InsufficientBaseline { required, found } => write!(
                f,
                "Insufficient baseline: {} samples required, {} found",
                required, found
            ),
            LatencyError::EmptyStimulusTable(e) => write!(f, "Empty stimulus table: {}", e),
            LatencyError::InvalidConfig(e) => write!(f, "Invalid configuration: {}", e),
            LatencyError::InvalidSpikeTrain(e) => write!(f, "Invalid spike train: {}", e),
            LatencyError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for LatencyError {}
