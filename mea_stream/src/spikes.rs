//! Spike streams and per-channel spike counting.

use crate::error::StreamError;
use crate::stream::StreamDecoder;
use crate::transport::PartTransport;
use mea_common::consts::{MAX_N_FULL_SAMPLING_CHANNELS, MAX_N_SAMPLING_CHANNELS, SAMPLING_FREQUENCY};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

/// Producer of per-frame spike channels.
pub trait SpikeStream: Send {
    fn connect(&mut self) -> Result<(), StreamError>;

    fn disconnect(&mut self) -> Result<(), StreamError>;

    /// Channels with a spike in the next frame. Empty on timeout or when the
    /// frame carries no spike part.
    fn receive_spike_channels(&mut self) -> Result<Vec<i32>, StreamError>;
}

/// Spike stream over the acquisition server frames.
pub struct ServerSpikeStream<T: PartTransport> {
    decoder: StreamDecoder<T>,
}

impl<T: PartTransport> ServerSpikeStream<T> {
    pub fn new(decoder: StreamDecoder<T>) -> Self {
        Self { decoder }
    }
}

impl<T: PartTransport> SpikeStream for ServerSpikeStream<T> {
    fn connect(&mut self) -> Result<(), StreamError> {
        self.decoder.connect()
    }

    fn disconnect(&mut self) -> Result<(), StreamError> {
        self.decoder.disconnect()
    }

    fn receive_spike_channels(&mut self) -> Result<Vec<i32>, StreamError> {
        let Some((_, more)) = self.decoder.receive_frame_number()? else {
            return Ok(Vec::new());
        };
        if !more {
            return Ok(Vec::new());
        }
        let (_, more) = self.decoder.receive_amplitudes()?;
        if !more {
            return Ok(Vec::new());
        }
        self.decoder.receive_spike_channels()
    }
}

/// Random spikes: one frame in `frequency` has between 1 and
/// `n_concurrent_detections` spikes on uniformly drawn channels.
pub struct DebugSpikeStream {
    pub frequency: u32,
    pub n_concurrent_detections: usize,
    pub n_channels: usize,
    rng: StdRng,
}

impl DebugSpikeStream {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            frequency: 5,
            n_concurrent_detections: 5,
            n_channels: MAX_N_SAMPLING_CHANNELS,
            rng,
        }
    }
}

impl Default for DebugSpikeStream {
    fn default() -> Self {
        Self::new()
    }
}

impl SpikeStream for DebugSpikeStream {
    fn connect(&mut self) -> Result<(), StreamError> {
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), StreamError> {
        Ok(())
    }

    fn receive_spike_channels(&mut self) -> Result<Vec<i32>, StreamError> {
        if self.n_channels == 0 || self.rng.gen_range(1..=self.frequency.max(1)) != 1 {
            return Ok(Vec::new());
        }
        let n = self.rng.gen_range(1..=self.n_concurrent_detections.max(1));
        Ok((0..n)
            .map(|_| self.rng.gen_range(0..self.n_channels) as i32)
            .collect())
    }
}

/// Counts spikes per channel over a fixed duration.
pub struct SpikeCounter<S: SpikeStream> {
    stream: S,
}

impl<S: SpikeStream> SpikeCounter<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Connect, poll `seconds × SAMPLING_FREQUENCY` frames and return the
    /// spike count of channels `0..n_channels`.
    ///
    /// The stream is disconnected on every path. Channels outside the
    /// full sampling range are ignored.
    pub fn detect(&mut self, seconds: u32, n_channels: usize) -> Result<Vec<u64>, StreamError> {
        self.stream.connect()?;
        let counted = self.count(seconds);
        let disconnected = self.stream.disconnect();

        let mut counts = counted?;
        disconnected?;
        counts.truncate(n_channels);
        Ok(counts)
    }

    fn count(&mut self, seconds: u32) -> Result<Vec<u64>, StreamError> {
        let mut counts = vec![0u64; MAX_N_FULL_SAMPLING_CHANNELS];
        let mut ignored = 0usize;
        for second in 0..seconds {
            for _ in 0..SAMPLING_FREQUENCY {
                for channel in self.stream.receive_spike_channels()? {
                    match usize::try_from(channel).ok().and_then(|c| counts.get_mut(c)) {
                        Some(count) => *count += 1,
                        None => ignored += 1,
                    }
                }
            }
            info!("Spike counting: {}/{} s", second + 1, seconds);
        }
        if ignored > 0 {
            warn!("Ignored {} spikes on out-of-range channels", ignored);
        }
        Ok(counts)
    }
}
