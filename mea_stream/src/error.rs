//! Stream error types.

use thiserror::Error;

/// Error types for stream operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Receive issued before `connect()`
    #[error("Stream is not connected")]
    NotConnected,

    /// Part length does not match its record stride
    #[error("Malformed {part} part: {len} bytes is not a multiple of {stride}")]
    Framing {
        /// Part name
        part: &'static str,
        /// Received length
        len: usize,
        /// Expected record size
        stride: usize,
    },

    /// Part requested without a continuation, or frame cut short
    #[error("Incomplete frame: {0}")]
    IncompleteFrame(&'static str),

    /// No frame boundary found during the synchronization handshake
    #[error("No frame boundary after {0} polls")]
    SyncTimeout(usize),

    /// Transport closed by the peer
    #[error("Transport disconnected")]
    Disconnected,

    /// Underlying transport failure
    #[error("Transport error: {0}")]
    Transport(String),
}
