//! # MEA Stream
//!
//! Real-time decoding of the acquisition server's sample and spike stream.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────┐
//! │  SampleStream / SpikeStream│  connect · sample · receive_spike_channels
//! └────────────┬──────────────┘
//!              │
//! ┌────────────▼──────────────┐
//! │       StreamDecoder        │  sync handshake, continuation rules,
//! │   (SpikeLayout New | Old)  │  framing checks
//! └────────────┬──────────────┘
//!              │ Part { bytes, more }
//! ┌────────────▼──────────────┐
//! │       PartTransport        │  MemoryTransport | ZmqSubTransport
//! └───────────────────────────┘
//! ```
//!
//! # Module Structure
//!
//! - [`error`] - `StreamError`
//! - [`spike`] - Spike record layouts and decoding
//! - [`transport`] - Part transports (in-memory, ZeroMQ with `zmq-transport`)
//! - [`stream`] - Frame decoder
//! - [`sample`] - Sample streams and batches
//! - [`spikes`] - Spike streams and spike counting
//!
//! A receive timeout is never an error: it shows up as `None`, an empty
//! channel list, or a batch cut short.

pub mod error;
pub mod sample;
pub mod spike;
pub mod spikes;
pub mod stream;
pub mod transport;

pub use crate::error::StreamError;
pub use crate::sample::{DebugSampleStream, SampleBatch, SampleStream, ServerSampleStream};
pub use crate::spike::{SpikeEvent, SpikeLayout};
pub use crate::spikes::{DebugSpikeStream, ServerSpikeStream, SpikeCounter, SpikeStream};
pub use crate::stream::{Frame, StreamDecoder};
pub use crate::transport::{MemoryFeeder, MemoryTransport, Part, PartTransport, endpoint};

#[cfg(feature = "zmq-transport")]
pub use crate::transport::ZmqSubTransport;
