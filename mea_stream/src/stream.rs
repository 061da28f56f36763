//! Frame decoding over a part transport.
//!
//! ```text
//!   part 1             part 2 (more)            part 3 (more)
//! ┌──────────────┐   ┌──────────────────────┐   ┌────────────────────────┐
//! │ frame_no u64 │ → │ N × amplitude f32 LE │ → │ K × spike record       │
//! └──────────────┘   └──────────────────────┘   └────────────────────────┘
//! ```
//!
//! A part is only read when the previous one carried the continuation flag.
//! `connect` aligns to a frame boundary and `disconnect` drains the rest of
//! a frame in flight.

use crate::error::StreamError;
use crate::spike::{SpikeEvent, SpikeLayout};
use crate::transport::{Part, PartTransport};
use tracing::{debug, info, trace, warn};

const FRAME_NUMBER_LEN: usize = 8;
const AMPLITUDE_LEN: usize = 4;

/// One fully received frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub frame_number: u64,
    /// Present when the server sent the amplitude part.
    pub amplitudes: Option<Vec<f32>>,
    /// Present when the server sent the spike part.
    pub spikes: Option<Vec<SpikeEvent>>,
}

/// Decodes the multi-part frame protocol.
pub struct StreamDecoder<T: PartTransport> {
    transport: T,
    layout: SpikeLayout,
    connected: bool,
    /// Continuation flag of the last part read.
    more: bool,
    max_sync_polls: Option<usize>,
}

impl<T: PartTransport> StreamDecoder<T> {
    /// Decoder over `transport` using `layout` for spike records.
    pub fn new(transport: T, layout: SpikeLayout) -> Self {
        Self {
            transport,
            layout,
            connected: false,
            more: false,
            max_sync_polls: None,
        }
    }

    /// Give up the synchronization handshake after `polls` receive calls.
    /// Unbounded by default.
    pub fn with_max_sync_polls(mut self, polls: usize) -> Self {
        self.max_sync_polls = Some(polls);
        self
    }

    pub fn layout(&self) -> SpikeLayout {
        self.layout
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Connect and consume parts until one without continuation arrives.
    ///
    /// # Errors
    /// `StreamError::SyncTimeout` when the poll cap is hit first. The
    /// transport is closed again in that case.
    pub fn connect(&mut self) -> Result<(), StreamError> {
        if self.connected {
            return Ok(());
        }
        self.transport.connect()?;

        let mut polls = 0usize;
        loop {
            polls += 1;
            match self.transport.recv_part() {
                Ok(Some(Part { more: false, .. })) => break,
                Ok(_) => {}
                Err(e) => {
                    let _ = self.transport.disconnect();
                    return Err(e);
                }
            }
            if self.max_sync_polls.is_some_and(|max| polls >= max) {
                let _ = self.transport.disconnect();
                return Err(StreamError::SyncTimeout(polls));
            }
        }

        debug!("Synchronized to frame boundary after {} polls", polls);
        info!("Stream connected ({:?} spike layout)", self.layout);
        self.connected = true;
        self.more = false;
        Ok(())
    }

    /// Drain the frame in flight, then close the transport.
    pub fn disconnect(&mut self) -> Result<(), StreamError> {
        if !self.connected {
            return Ok(());
        }
        let drained = self.skip_rest();
        self.connected = false;
        self.more = false;
        self.transport.disconnect()?;
        info!("Stream disconnected");
        drained
    }

    fn ensure_connected(&self) -> Result<(), StreamError> {
        if self.connected {
            Ok(())
        } else {
            Err(StreamError::NotConnected)
        }
    }

    fn skip_rest(&mut self) -> Result<(), StreamError> {
        while self.more {
            match self.transport.recv_part()? {
                Some(part) => {
                    trace!("Discarding {} byte part", part.bytes.len());
                    self.more = part.more;
                }
                None => {
                    warn!("Timed out draining a partial frame");
                    self.more = false;
                }
            }
        }
        Ok(())
    }

    /// Read a continuation part. A timeout here means the frame was cut.
    fn next_part(&mut self, name: &'static str) -> Result<Vec<u8>, StreamError> {
        self.ensure_connected()?;
        if !self.more {
            return Err(StreamError::IncompleteFrame(name));
        }
        match self.transport.recv_part()? {
            Some(part) => {
                self.more = part.more;
                Ok(part.bytes)
            }
            None => {
                self.more = false;
                Err(StreamError::IncompleteFrame(name))
            }
        }
    }

    /// Receive the next frame number and its continuation flag.
    ///
    /// Unread parts of the previous frame are discarded first. `Ok(None)` on
    /// timeout.
    pub fn receive_frame_number(&mut self) -> Result<Option<(u64, bool)>, StreamError> {
        self.ensure_connected()?;
        self.skip_rest()?;
        let Some(part) = self.transport.recv_part()? else {
            return Ok(None);
        };
        self.more = part.more;
        if part.bytes.len() != FRAME_NUMBER_LEN {
            self.skip_rest()?;
            return Err(StreamError::Framing {
                part: "frame_number",
                len: part.bytes.len(),
                stride: FRAME_NUMBER_LEN,
            });
        }
        let mut raw = [0u8; FRAME_NUMBER_LEN];
        raw.copy_from_slice(&part.bytes);
        Ok(Some((u64::from_le_bytes(raw), part.more)))
    }

    /// Receive the amplitude part, one value per full sampling channel.
    pub fn receive_amplitudes(&mut self) -> Result<(Vec<f32>, bool), StreamError> {
        let bytes = self.next_part("amplitudes")?;
        if bytes.len() % AMPLITUDE_LEN != 0 {
            self.skip_rest()?;
            return Err(StreamError::Framing {
                part: "amplitudes",
                len: bytes.len(),
                stride: AMPLITUDE_LEN,
            });
        }
        let amplitudes = bytes
            .chunks_exact(AMPLITUDE_LEN)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok((amplitudes, self.more))
    }

    /// Receive and decode the spike part.
    pub fn receive_spike_events(&mut self) -> Result<Vec<SpikeEvent>, StreamError> {
        let bytes = self.next_part("spike_events")?;
        let events = self.layout.decode(&bytes);
        self.skip_rest()?;
        events
    }

    /// Receive the spike part, decoding only channels.
    pub fn receive_spike_channels(&mut self) -> Result<Vec<i32>, StreamError> {
        let bytes = self.next_part("spike_events")?;
        let channels = self.layout.decode_channels(&bytes);
        self.skip_rest()?;
        channels
    }

    /// Receive a whole frame. `Ok(None)` on timeout before the frame began.
    pub fn receive_frame(&mut self) -> Result<Option<Frame>, StreamError> {
        let Some((frame_number, more)) = self.receive_frame_number()? else {
            return Ok(None);
        };
        let mut frame = Frame {
            frame_number,
            amplitudes: None,
            spikes: None,
        };
        if more {
            let (amplitudes, more) = self.receive_amplitudes()?;
            frame.amplitudes = Some(amplitudes);
            if more {
                frame.spikes = Some(self.receive_spike_events()?);
            }
        }
        Ok(Some(frame))
    }

    /// Disconnect and hand back the transport.
    pub fn into_inner(mut self) -> T {
        if let Err(e) = self.disconnect() {
            warn!("Disconnect failed: {}", e);
        }
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryFeeder, MemoryTransport};

    fn decoder() -> (StreamDecoder<MemoryTransport>, MemoryFeeder) {
        let (transport, feeder) = MemoryTransport::new();
        (StreamDecoder::new(transport, SpikeLayout::New), feeder)
    }

    fn spike(channel: i32) -> SpikeEvent {
        SpikeEvent {
            well_id: 0,
            frame_number: 7,
            channel,
            amplitude: -30.0,
        }
    }

    #[test]
    fn receive_before_connect_fails() {
        let (mut decoder, _feeder) = decoder();
        assert_eq!(decoder.receive_frame_number(), Err(StreamError::NotConnected));
        assert_eq!(decoder.receive_frame(), Err(StreamError::NotConnected));
        assert!(matches!(
            decoder.receive_spike_channels(),
            Err(StreamError::NotConnected)
        ));
    }

    #[test]
    fn connect_discards_partial_frame() {
        let (mut decoder, feeder) = decoder();
        // tail of a frame already in flight
        feeder.push_part(vec![0; 12], true);
        feeder.push_part(vec![0; 16], false);
        feeder.push_frame(42, None, None);
        decoder.connect().unwrap();
        assert_eq!(decoder.receive_frame_number().unwrap(), Some((42, false)));
    }

    #[test]
    fn connect_gives_up_after_poll_cap() {
        let (transport, feeder) = MemoryTransport::new();
        let mut decoder = StreamDecoder::new(transport, SpikeLayout::New).with_max_sync_polls(3);
        for _ in 0..5 {
            feeder.push_part(vec![0; 8], true);
        }
        assert_eq!(decoder.connect(), Err(StreamError::SyncTimeout(3)));
        assert!(!decoder.is_connected());
        assert!(!decoder.transport().is_connected());
    }

    #[test]
    fn full_frame_is_decoded() {
        let (mut decoder, feeder) = decoder();
        feeder.push_frame(0, None, None);
        let spikes = SpikeLayout::New.encode(&[spike(3), spike(9)]);
        feeder.push_frame(7, Some(&[1.5, -2.0, 0.25]), Some(spikes));
        decoder.connect().unwrap();

        let frame = decoder.receive_frame().unwrap().unwrap();
        assert_eq!(frame.frame_number, 7);
        assert_eq!(frame.amplitudes, Some(vec![1.5, -2.0, 0.25]));
        assert_eq!(frame.spikes, Some(vec![spike(3), spike(9)]));
    }

    #[test]
    fn continuation_is_required() {
        let (mut decoder, feeder) = decoder();
        feeder.push_frame(0, None, None);
        feeder.push_frame(1, None, None);
        decoder.connect().unwrap();

        assert_eq!(decoder.receive_frame_number().unwrap(), Some((1, false)));
        assert_eq!(
            decoder.receive_amplitudes(),
            Err(StreamError::IncompleteFrame("amplitudes"))
        );
        // nothing was consumed from the transport
        assert_eq!(decoder.receive_frame_number().unwrap(), None);
    }

    #[test]
    fn unread_parts_are_skipped_before_next_frame() {
        let (mut decoder, feeder) = decoder();
        feeder.push_frame(0, None, None);
        feeder.push_frame(1, Some(&[1.0; 4]), Some(vec![]));
        feeder.push_frame(2, None, None);
        decoder.connect().unwrap();

        assert_eq!(decoder.receive_frame_number().unwrap(), Some((1, true)));
        assert_eq!(decoder.receive_frame_number().unwrap(), Some((2, false)));
        assert_eq!(feeder.pending(), 0);
    }

    #[test]
    fn malformed_spike_part_is_rejected() {
        let (mut decoder, feeder) = decoder();
        feeder.push_frame(0, None, None);
        feeder.push_frame(1, Some(&[]), Some(vec![0; 33]));
        decoder.connect().unwrap();

        assert!(matches!(
            decoder.receive_frame(),
            Err(StreamError::Framing { part: "spike_events", len: 33, stride: 16 })
        ));
    }

    #[test]
    fn malformed_frame_number_is_rejected() {
        let (mut decoder, feeder) = decoder();
        feeder.push_frame(0, None, None);
        feeder.push_part(vec![0; 4], false);
        decoder.connect().unwrap();
        assert!(matches!(
            decoder.receive_frame_number(),
            Err(StreamError::Framing { part: "frame_number", .. })
        ));
    }

    #[test]
    fn malformed_frame_number_drops_its_frame() {
        let (mut decoder, feeder) = decoder();
        feeder.push_frame(0, None, None);
        feeder.push_part(vec![0; 4], true);
        let amplitudes: Vec<u8> = [1.5f32, -2.0]
            .iter()
            .flat_map(|a| a.to_le_bytes())
            .collect();
        feeder.push_part(amplitudes, false);
        feeder.push_frame(42, None, None);
        decoder.connect().unwrap();

        assert_eq!(
            decoder.receive_frame_number(),
            Err(StreamError::Framing {
                part: "frame_number",
                len: 4,
                stride: 8
            })
        );
        assert_eq!(decoder.receive_frame_number().unwrap(), Some((42, false)));
    }

    #[test]
    fn timeout_is_not_an_error() {
        let (mut decoder, feeder) = decoder();
        feeder.push_frame(0, None, None);
        decoder.connect().unwrap();
        assert_eq!(decoder.receive_frame().unwrap(), None);
    }

    #[test]
    fn disconnect_drains_frame_in_flight() {
        let (mut decoder, feeder) = decoder();
        feeder.push_frame(0, None, None);
        feeder.push_frame(1, Some(&[0.0; 8]), Some(vec![]));
        decoder.connect().unwrap();

        decoder.receive_frame_number().unwrap();
        decoder.disconnect().unwrap();
        assert_eq!(feeder.pending(), 0);
        assert_eq!(decoder.receive_frame(), Err(StreamError::NotConnected));
    }

    #[test]
    fn hang_up_surfaces_as_disconnected() {
        let (mut decoder, feeder) = decoder();
        feeder.push_frame(0, None, None);
        decoder.connect().unwrap();
        feeder.hang_up();
        assert_eq!(decoder.receive_frame(), Err(StreamError::Disconnected));
    }
}
