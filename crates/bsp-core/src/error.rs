//! Error handling for the BSP acquisition client
//!
//! Every failure the connect → resolve → read sequence can surface is one
//! variant of [`BspError`]. None of them are retried internally.

use thiserror::Error;

/// Result type alias for BSP Framework operations
pub type BspResult<T> = Result<T, BspError>;

/// Error type for all acquisition operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BspError {
    /// No stream of a required content type was found during connect
    #[error("No stream found for content type '{content_type}'")]
    Connection {
        /// Content type that was queried
        content_type: String,
    },

    /// Operation attempted in the wrong session state
    #[error("Precondition failed: {reason}")]
    Precondition {
        /// What was missing
        reason: &'static str,
    },

    /// Caller configuration cannot be used
    #[error("Invalid configuration: {reason}")]
    Configuration {
        /// Description of the configuration problem
        reason: String,
    },

    /// Caller and device both supplied channel labels and they disagree
    #[error("Channels read from the device {reported:?} do not match the provided channels {configured:?}")]
    ChannelMismatch {
        /// Channel labels supplied by the caller
        configured: Vec<String>,
        /// Channel labels reported by the device
        reported: Vec<String>,
    },

    /// Channel count does not add up
    #[error("Channel count error: expected {expected} fields, got {actual}")]
    ChannelCount {
        /// Raw device channels plus appended fields
        expected: usize,
        /// Length actually found
        actual: usize,
    },

    /// Caller and device both supplied a sample rate and they disagree
    #[error("Sample rate read from the device ({reported}Hz) does not match the provided rate ({configured}Hz)")]
    RateMismatch {
        /// Rate supplied by the caller
        configured: f64,
        /// Nominal rate reported by the device
        reported: f64,
    },

    /// The underlying connection terminated during a pull
    #[error("Stream '{stream}' closed")]
    StreamClosed {
        /// Name of the stream that closed
        stream: String,
    },

    /// Any other transport failure
    #[error("Transport error: {reason}")]
    Transport {
        /// Transport-specific description
        reason: String,
    },

    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BspError {
    /// Whether the current session is unusable after this error.
    ///
    /// Configuration and I/O errors happen before a session exists.
    pub fn is_fatal_to_session(&self) -> bool {
        !matches!(self, BspError::Configuration { .. } | BspError::Io(_))
    }

    /// Shorthand for building a [`BspError::Configuration`]
    pub fn configuration(reason: impl Into<String>) -> Self {
        BspError::Configuration {
            reason: reason.into(),
        }
    }
}
