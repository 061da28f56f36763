//! Spike event records.
//!
//! Two incompatible little-endian record layouts exist across firmware
//! versions:
//!
//! ```text
//! New (16 B): frame_no:u64 | amplitude:f32 | channel:u16 | well_id:u8 | pad:u8
//! Old (24 B): pad:7×u8 | well_id:u8 | frame_no:u64 | channel:i32 | amplitude:f32
//! ```
//!
//! The layout is picked once per connection from the firmware identity.

use crate::error::StreamError;
use static_assertions::const_assert_eq;

/// Record size of the new layout.
pub const NEW_RECORD_SIZE: usize = 8 + 4 + 2 + 1 + 1;
/// Record size of the old layout.
pub const OLD_RECORD_SIZE: usize = 7 + 1 + 8 + 4 + 4;

const_assert_eq!(NEW_RECORD_SIZE, 16);
const_assert_eq!(OLD_RECORD_SIZE, 24);

/// Firmware revision that introduced the new layout.
pub const NEW_LAYOUT_FIRMWARE: &str = "45b31664d";

/// One detected spike.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeEvent {
    /// Well the spike was detected in (always 0 on single-well arrays).
    pub well_id: u8,
    /// Frame the spike was detected in.
    pub frame_number: u64,
    /// Recording channel.
    pub channel: i32,
    /// Last negative peak amplitude.
    pub amplitude: f32,
}

/// Wire layout of spike records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpikeLayout {
    /// Firmware `45b31664d` and later.
    New,
    /// Earlier firmware.
    #[default]
    Old,
}

fn le_u64(rec: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&rec[at..at + 8]);
    u64::from_le_bytes(raw)
}

fn le_4(rec: &[u8], at: usize) -> [u8; 4] {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&rec[at..at + 4]);
    raw
}

fn le_u16(rec: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([rec[at], rec[at + 1]])
}

impl SpikeLayout {
    /// Layout used by firmware `identity`. Unknown or missing identities get
    /// the old layout.
    pub fn detect(identity: Option<&str>) -> Self {
        match identity.map(str::trim) {
            Some(NEW_LAYOUT_FIRMWARE) => Self::New,
            _ => Self::Old,
        }
    }

    /// Bytes per record.
    pub const fn record_size(self) -> usize {
        match self {
            Self::New => NEW_RECORD_SIZE,
            Self::Old => OLD_RECORD_SIZE,
        }
    }

    fn records(self, buffer: &[u8]) -> Result<std::slice::ChunksExact<'_, u8>, StreamError> {
        let stride = self.record_size();
        if buffer.len() % stride != 0 {
            return Err(StreamError::Framing {
                part: "spike_events",
                len: buffer.len(),
                stride,
            });
        }
        Ok(buffer.chunks_exact(stride))
    }

    fn decode_record(self, rec: &[u8]) -> SpikeEvent {
        match self {
            Self::New => SpikeEvent {
                frame_number: le_u64(rec, 0),
                amplitude: f32::from_le_bytes(le_4(rec, 8)),
                channel: le_u16(rec, 12) as i32,
                well_id: rec[14],
            },
            Self::Old => SpikeEvent {
                well_id: rec[7],
                frame_number: le_u64(rec, 8),
                channel: i32::from_le_bytes(le_4(rec, 16)),
                amplitude: f32::from_le_bytes(le_4(rec, 20)),
            },
        }
    }

    fn decode_channel(self, rec: &[u8]) -> i32 {
        match self {
            Self::New => le_u16(rec, 12) as i32,
            Self::Old => i32::from_le_bytes(le_4(rec, 16)),
        }
    }

    /// Decode concatenated records in input order.
    ///
    /// # Errors
    /// `StreamError::Framing` if the buffer is not a whole number of records.
    pub fn decode(self, buffer: &[u8]) -> Result<Vec<SpikeEvent>, StreamError> {
        Ok(self
            .records(buffer)?
            .map(|rec| self.decode_record(rec))
            .collect())
    }

    /// Decode only the channel of each record.
    pub fn decode_channels(self, buffer: &[u8]) -> Result<Vec<i32>, StreamError> {
        Ok(self
            .records(buffer)?
            .map(|rec| self.decode_channel(rec))
            .collect())
    }

    /// Encode `events` in this layout. Channels are truncated to 16 bits in
    /// the new layout.
    pub fn encode(self, events: &[SpikeEvent]) -> Vec<u8> {
        let mut out = Vec::with_capacity(events.len() * self.record_size());
        for event in events {
            match self {
                Self::New => {
                    out.extend_from_slice(&event.frame_number.to_le_bytes());
                    out.extend_from_slice(&event.amplitude.to_le_bytes());
                    out.extend_from_slice(&(event.channel as u16).to_le_bytes());
                    out.push(event.well_id);
                    out.push(0);
                }
                Self::Old => {
                    out.extend_from_slice(&[0u8; 7]);
                    out.push(event.well_id);
                    out.extend_from_slice(&event.frame_number.to_le_bytes());
                    out.extend_from_slice(&event.channel.to_le_bytes());
                    out.extend_from_slice(&event.amplitude.to_le_bytes());
                }
            }
        }
        out
    }
}
