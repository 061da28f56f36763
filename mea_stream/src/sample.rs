//! Sample streams: blocks of amplitudes for selected channels.

use crate::error::StreamError;
use crate::stream::StreamDecoder;
use crate::transport::PartTransport;
use mea_common::consts::{MAX_N_FULL_SAMPLING_CHANNELS, SAMPLING_FREQUENCY};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::{debug, trace};

/// `n_samples × n_channels` amplitudes, row-major.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleBatch {
    data: Vec<f32>,
    n_channels: usize,
}

impl SampleBatch {
    /// Zero-filled batch.
    pub fn zeros(n_samples: usize, n_channels: usize) -> Self {
        Self {
            data: vec![0.0; n_samples * n_channels],
            n_channels,
        }
    }

    /// Columns per sample.
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Number of samples (rows).
    pub fn n_samples(&self) -> usize {
        if self.n_channels == 0 {
            0
        } else {
            self.data.len() / self.n_channels
        }
    }

    /// One row per sample.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.n_channels.max(1))
    }

    /// Values of one sample, `None` past the end.
    pub fn row(&self, sample: usize) -> Option<&[f32]> {
        let start = sample.checked_mul(self.n_channels)?;
        self.data.get(start..start + self.n_channels)
    }

    fn row_mut(&mut self, sample: usize) -> &mut [f32] {
        let start = sample * self.n_channels;
        &mut self.data[start..start + self.n_channels]
    }

    /// Values of one channel column across all samples.
    pub fn channel(&self, column: usize) -> impl Iterator<Item = f32> + '_ {
        self.rows().filter_map(move |row| row.get(column).copied())
    }

    /// Mean absolute amplitude per channel column.
    pub fn mean_abs(&self) -> Vec<f32> {
        let n_samples = self.n_samples();
        let mut sums = vec![0.0f32; self.n_channels];
        for row in self.rows() {
            for (sum, v) in sums.iter_mut().zip(row) {
                *sum += v.abs();
            }
        }
        if n_samples > 0 {
            for sum in &mut sums {
                *sum /= n_samples as f32;
            }
        }
        sums
    }

    /// Row-major values.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Producer of amplitude blocks.
pub trait SampleStream: Send {
    /// Open the source.
    fn connect(&mut self) -> Result<(), StreamError>;

    /// Close the source. No-op when not connected.
    fn disconnect(&mut self) -> Result<(), StreamError>;

    /// Receive `n_samples` frames and keep the columns in `channels`, in that
    /// order.
    fn sample(&mut self, n_samples: usize, channels: &[usize]) -> Result<SampleBatch, StreamError>;
}

/// Sample stream over the acquisition server frames.
///
/// Rows start zeroed: frames without amplitudes, or that are missing when the
/// transport times out, stay at zero. A timeout ends the batch early.
pub struct ServerSampleStream<T: PartTransport> {
    decoder: StreamDecoder<T>,
}

impl<T: PartTransport> ServerSampleStream<T> {
    /// Sample through `decoder`.
    pub fn new(decoder: StreamDecoder<T>) -> Self {
        Self { decoder }
    }

    /// Decoder in use.
    pub fn decoder(&self) -> &StreamDecoder<T> {
        &self.decoder
    }
}

impl<T: PartTransport> SampleStream for ServerSampleStream<T> {
    fn connect(&mut self) -> Result<(), StreamError> {
        self.decoder.connect()
    }

    fn disconnect(&mut self) -> Result<(), StreamError> {
        self.decoder.disconnect()
    }

    fn sample(&mut self, n_samples: usize, channels: &[usize]) -> Result<SampleBatch, StreamError> {
        if !self.decoder.is_connected() {
            return Err(StreamError::NotConnected);
        }
        let mut batch = SampleBatch::zeros(n_samples, channels.len());
        let mut full = vec![0.0f32; MAX_N_FULL_SAMPLING_CHANNELS];

        for i in 0..n_samples {
            let Some((frame_number, more)) = self.decoder.receive_frame_number()? else {
                debug!("Sample batch cut at {}/{} on timeout", i, n_samples);
                break;
            };
            if !more {
                continue;
            }
            trace!("Frame {}", frame_number);
            let (amplitudes, _) = self.decoder.receive_amplitudes()?;
            full.fill(0.0);
            let n = amplitudes.len().min(full.len());
            full[..n].copy_from_slice(&amplitudes[..n]);

            let row = batch.row_mut(i);
            for (dst, &ch) in row.iter_mut().zip(channels) {
                *dst = full.get(ch).copied().unwrap_or(0.0);
            }
        }
        Ok(batch)
    }
}

/// Random samples whose scale cycles through `-1, -1/2, -1/3, -1/4`.
pub struct DebugSampleStream {
    counter: u32,
    rng: StdRng,
    realtime: bool,
}

impl DebugSampleStream {
    /// Randomly seeded source.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible source.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            counter: 0,
            rng,
            realtime: false,
        }
    }

    /// Sleep for the duration the batch would take at the hardware rate.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}

impl Default for DebugSampleStream {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleStream for DebugSampleStream {
    fn connect(&mut self) -> Result<(), StreamError> {
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), StreamError> {
        Ok(())
    }

    fn sample(&mut self, n_samples: usize, channels: &[usize]) -> Result<SampleBatch, StreamError> {
        if self.counter >= 4 {
            self.counter = 0;
        }
        let scale = -1.0 / (self.counter + 1) as f32;
        self.counter += 1;

        let mut batch = SampleBatch::zeros(n_samples, channels.len());
        for v in batch.data.iter_mut() {
            *v = self.rng.r#gen::<f32>() * scale;
        }
        if self.realtime {
            std::thread::sleep(Duration::from_secs_f64(
                n_samples as f64 / SAMPLING_FREQUENCY as f64,
            ));
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spike::SpikeLayout;
    use crate::transport::MemoryTransport;

    #[test]
    fn batch_shape() {
        let batch = SampleBatch::zeros(3, 2);
        assert_eq!(batch.n_samples(), 3);
        assert_eq!(batch.rows().count(), 3);
        assert_eq!(batch.row(2), Some(&[0.0, 0.0][..]));
        assert_eq!(batch.row(3), None);
        assert_eq!(SampleBatch::zeros(0, 4).n_samples(), 0);
    }

    #[test]
    fn mean_abs_per_column() {
        let batch = SampleBatch {
            data: vec![1.0, -2.0, -3.0, 4.0],
            n_channels: 2,
        };
        assert_eq!(batch.mean_abs(), vec![2.0, 3.0]);
        assert_eq!(batch.channel(1).collect::<Vec<_>>(), vec![-2.0, 4.0]);
    }

    #[test]
    fn server_stream_selects_columns() {
        let (transport, feeder) = MemoryTransport::new();
        let mut stream = ServerSampleStream::new(StreamDecoder::new(transport, SpikeLayout::New));
        feeder.push_frame(0, None, None);
        for i in 0..3 {
            let amps: Vec<f32> = (0..8).map(|c| (i * 10 + c) as f32).collect();
            feeder.push_frame(i as u64 + 1, Some(&amps), Some(vec![]));
        }
        stream.connect().unwrap();

        let batch = stream.sample(3, &[5, 1]).unwrap();
        assert_eq!(batch.row(0), Some(&[5.0, 1.0][..]));
        assert_eq!(batch.row(2), Some(&[25.0, 21.0][..]));
    }

    #[test]
    fn server_stream_zero_fills_missing_data() {
        let (transport, feeder) = MemoryTransport::new();
        let mut stream = ServerSampleStream::new(StreamDecoder::new(transport, SpikeLayout::Old));
        feeder.push_frame(0, None, None);
        feeder.push_frame(1, None, None);
        feeder.push_frame(2, Some(&[7.0, 8.0]), None);
        stream.connect().unwrap();

        // frame 1 has no amplitudes, channel 1000 is beyond the part, then timeout
        let batch = stream.sample(4, &[1, 1000]).unwrap();
        assert_eq!(batch.n_samples(), 4);
        assert_eq!(batch.row(0), Some(&[0.0, 0.0][..]));
        assert_eq!(batch.row(1), Some(&[8.0, 0.0][..]));
        assert_eq!(batch.row(3), Some(&[0.0, 0.0][..]));
    }

    #[test]
    fn server_stream_requires_connect() {
        let (transport, _feeder) = MemoryTransport::new();
        let mut stream = ServerSampleStream::new(StreamDecoder::new(transport, SpikeLayout::New));
        assert_eq!(stream.sample(1, &[0]), Err(StreamError::NotConnected));
    }

    #[test]
    fn debug_stream_scale_cycles() {
        let mut stream = DebugSampleStream::with_seed(3);
        let bounds: Vec<f32> = (0..5)
            .map(|_| {
                let batch = stream.sample(50, &[0, 1, 2]).unwrap();
                batch.as_slice().iter().fold(0.0f32, |m, v| m.min(*v))
            })
            .collect();
        assert!(bounds[0] >= -1.0 && bounds[0] < -0.5);
        assert!(bounds[3] >= -0.25);
        assert!(bounds[4] < -0.5);
        for b in &bounds {
            assert!(*b <= 0.0);
        }
    }
}
