//! Runner error types.

use mea_array::{ArrayConfigError, MapError};
use mea_common::array::driver::ArrayError;
use mea_common::config::ConfigError;
use mea_stream::StreamError;
use thiserror::Error;

/// Errors that abort an experiment run.
#[derive(Debug, Error)]
pub enum LoopError {
    /// Configuration file or values rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Hardware setup or control failed
    #[error("Array error: {0}")]
    Array(#[from] ArrayError),

    /// Role channel does not resolve on the electrode map
    #[error("Electrode map error: {0}")]
    Map(#[from] MapError),

    /// Role electrodes inconsistent
    #[error("Array configuration error: {0}")]
    ArrayConfig(#[from] ArrayConfigError),

    /// Stream failure
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Requested feature not compiled in
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Worker thread ended abnormally
    #[error("Task '{0}' panicked")]
    TaskPanicked(&'static str),

    /// Queue peer went away
    #[error("Channel '{0}' closed")]
    ChannelClosed(&'static str),
}
