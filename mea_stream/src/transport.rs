//! Multi-part message transports.
//!
//! The acquisition server publishes each frame as up to three parts. A
//! transport only moves parts and their continuation flags; the framing
//! rules live in [`crate::stream`].

use crate::error::StreamError;
use mea_common::consts::{FILTERED_DATA_STREAM_PORT, RAW_DATA_STREAM_PORT};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[cfg(feature = "zmq-transport")]
mod zmq_sub;

#[cfg(feature = "zmq-transport")]
pub use zmq_sub::ZmqSubTransport;

/// One received message part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Payload bytes.
    pub bytes: Vec<u8>,
    /// Another part of the same frame follows.
    pub more: bool,
}

/// Source of message parts.
pub trait PartTransport: Send {
    /// Open the connection. Idempotent.
    fn connect(&mut self) -> Result<(), StreamError>;

    /// Receive the next part, waiting at most the transport's timeout.
    ///
    /// `Ok(None)` means nothing arrived in time.
    fn recv_part(&mut self) -> Result<Option<Part>, StreamError>;

    /// Close the connection. Idempotent.
    fn disconnect(&mut self) -> Result<(), StreamError>;
}

/// Endpoint of the raw or filtered data stream on `hostname`.
pub fn endpoint(hostname: &str, filtered: bool) -> String {
    let port = if filtered {
        FILTERED_DATA_STREAM_PORT
    } else {
        RAW_DATA_STREAM_PORT
    };
    format!("tcp://{hostname}:{port}")
}

#[derive(Debug, Default)]
struct Queue {
    parts: VecDeque<Part>,
    hang_up: bool,
}

/// In-process transport fed through a [`MemoryFeeder`].
///
/// A drained queue reads as a timeout, or as `Disconnected` once the feeder
/// has hung up.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    queue: Arc<Mutex<Queue>>,
    connected: bool,
    connects: usize,
}

/// Producer side of a [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct MemoryFeeder {
    queue: Arc<Mutex<Queue>>,
}

impl MemoryTransport {
    /// Create an empty transport and its feeder.
    pub fn new() -> (Self, MemoryFeeder) {
        let transport = Self::default();
        let feeder = MemoryFeeder {
            queue: Arc::clone(&transport.queue),
        };
        (transport, feeder)
    }

    /// Number of `connect` calls that opened the transport.
    pub fn connect_count(&self) -> usize {
        self.connects
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl MemoryFeeder {
    /// Queue a single raw part.
    pub fn push_part(&self, bytes: Vec<u8>, more: bool) {
        self.queue.lock().parts.push_back(Part { bytes, more });
    }

    /// Queue a complete frame. The continuation flags follow which optional
    /// parts are present.
    pub fn push_frame(
        &self,
        frame_number: u64,
        amplitudes: Option<&[f32]>,
        spikes: Option<Vec<u8>>,
    ) {
        let mut queue = self.queue.lock();
        queue.parts.push_back(Part {
            bytes: frame_number.to_le_bytes().to_vec(),
            more: amplitudes.is_some(),
        });
        if let Some(amplitudes) = amplitudes {
            let bytes = amplitudes.iter().flat_map(|a| a.to_le_bytes()).collect();
            queue.parts.push_back(Part {
                bytes,
                more: spikes.is_some(),
            });
            if let Some(spikes) = spikes {
                queue.parts.push_back(Part {
                    bytes: spikes,
                    more: false,
                });
            }
        }
    }

    /// Parts not yet consumed.
    pub fn pending(&self) -> usize {
        self.queue.lock().parts.len()
    }

    /// Report `Disconnected` once the queue is drained.
    pub fn hang_up(&self) {
        self.queue.lock().hang_up = true;
    }
}

impl PartTransport for MemoryTransport {
    fn connect(&mut self) -> Result<(), StreamError> {
        if !self.connected {
            self.connected = true;
            self.connects += 1;
        }
        Ok(())
    }

    fn recv_part(&mut self) -> Result<Option<Part>, StreamError> {
        if !self.connected {
            return Err(StreamError::NotConnected);
        }
        let mut queue = self.queue.lock();
        match queue.parts.pop_front() {
            Some(part) => Ok(Some(part)),
            None if queue.hang_up => Err(StreamError::Disconnected),
            None => Ok(None),
        }
    }

    fn disconnect(&mut self) -> Result<(), StreamError> {
        self.connected = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_selects_port() {
        assert_eq!(endpoint("localhost", false), "tcp://localhost:7204");
        assert_eq!(endpoint("10.0.0.2", true), "tcp://10.0.0.2:7205");
    }

    #[test]
    fn frame_flags_follow_present_parts() {
        let (mut transport, feeder) = MemoryTransport::new();
        feeder.push_frame(1, None, None);
        feeder.push_frame(2, Some(&[1.0, 2.0]), None);
        feeder.push_frame(3, Some(&[]), Some(vec![0; 16]));
        transport.connect().unwrap();

        let flags: Vec<_> = std::iter::from_fn(|| transport.recv_part().unwrap())
            .map(|p| (p.bytes.len(), p.more))
            .collect();
        assert_eq!(
            flags,
            vec![(8, false), (8, true), (8, false), (8, true), (0, true), (16, false)]
        );
    }

    #[test]
    fn drained_queue_times_out_until_hang_up() {
        let (mut transport, feeder) = MemoryTransport::new();
        transport.connect().unwrap();
        assert_eq!(transport.recv_part().unwrap(), None);
        feeder.hang_up();
        assert_eq!(transport.recv_part(), Err(StreamError::Disconnected));
    }

    #[test]
    fn receive_requires_connect() {
        let (mut transport, _feeder) = MemoryTransport::new();
        assert_eq!(transport.recv_part(), Err(StreamError::NotConnected));
        transport.connect().unwrap();
        transport.connect().unwrap();
        assert_eq!(transport.connect_count(), 1);
    }
}
