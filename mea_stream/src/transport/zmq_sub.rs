//! ZeroMQ SUB transport to the acquisition server.

use super::{Part, PartTransport, endpoint};
use crate::error::StreamError;
use mea_common::consts::{MAX_N_FULL_SAMPLING_CHANNELS, SAMPLING_FREQUENCY, STREAM_BUFFERING_TIME_S};
use tracing::{debug, info};

/// Receive buffer large enough to hold the configured buffering time of
/// full-width frames.
const RECEIVE_BUFFER_BYTES: usize =
    STREAM_BUFFERING_TIME_S * SAMPLING_FREQUENCY as usize * MAX_N_FULL_SAMPLING_CHANNELS;

/// Subscriber socket on the raw or filtered data stream.
pub struct ZmqSubTransport {
    context: zmq::Context,
    socket: Option<zmq::Socket>,
    endpoint: String,
    timeout_ms: u32,
}

impl ZmqSubTransport {
    /// Transport for `hostname`. Nothing is opened until `connect`.
    pub fn new(hostname: &str, filtered: bool, timeout_ms: u32) -> Self {
        Self {
            context: zmq::Context::new(),
            socket: None,
            endpoint: endpoint(hostname, filtered),
            timeout_ms,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn transport_error(e: zmq::Error) -> StreamError {
    StreamError::Transport(e.to_string())
}

impl PartTransport for ZmqSubTransport {
    fn connect(&mut self) -> Result<(), StreamError> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = self.context.socket(zmq::SUB).map_err(transport_error)?;
        socket.set_rcvhwm(0).map_err(transport_error)?;
        socket
            .set_rcvbuf(RECEIVE_BUFFER_BYTES as i32)
            .map_err(transport_error)?;
        socket
            .set_rcvtimeo(self.timeout_ms as i32)
            .map_err(transport_error)?;
        socket.set_subscribe(b"").map_err(transport_error)?;
        socket.connect(&self.endpoint).map_err(transport_error)?;
        info!("Subscribed to {}", self.endpoint);
        self.socket = Some(socket);
        Ok(())
    }

    fn recv_part(&mut self) -> Result<Option<Part>, StreamError> {
        let socket = self.socket.as_ref().ok_or(StreamError::NotConnected)?;
        match socket.recv_bytes(0) {
            Ok(bytes) => {
                let more = socket.get_rcvmore().map_err(transport_error)?;
                Ok(Some(Part { bytes, more }))
            }
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(zmq::Error::ETERM) => Err(StreamError::Disconnected),
            Err(e) => Err(transport_error(e)),
        }
    }

    fn disconnect(&mut self) -> Result<(), StreamError> {
        if let Some(socket) = self.socket.take() {
            debug!("Closing subscriber on {}", self.endpoint);
            socket.set_linger(0).map_err(transport_error)?;
        }
        Ok(())
    }
}

impl Drop for ZmqSubTransport {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}
