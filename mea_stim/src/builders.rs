//! Waveform builders.
//!
//! Each builder appends one waveform to a [`Stimulator`]: a single leading
//! event flag followed by the voltage steps.
//!
//! - [`PulseStreamBuilder`] - train of biphasic pulses with rests
//! - [`SquareWaveBuilder`] - one high/low cycle
//! - [`SineWaveBuilder`] - one sine period, one step per sample
//! - [`GaussianNoiseBuilder`] - truncated normal samples
//! - [`SynapticNoiseBuilder`] - Ornstein–Uhlenbeck synaptic noise

mod noise;
mod periodic;
mod pulse;

pub use noise::{GaussianNoiseBuilder, SynapticNoiseBuilder};
pub use periodic::{SineWaveBuilder, SquareWaveBuilder};
pub use pulse::PulseStreamBuilder;

use mea_common::stim::program::Stimulator;

/// Fills a [`Stimulator`] from high-level waveform parameters.
pub trait StimulatorBuilder {
    /// Append this waveform to `stimulator`.
    fn build(&self, stimulator: &mut dyn Stimulator);
}

/// Split `samples` into (high, low) sample counts at `duty_cycle`.
fn split_duty_cycle(samples: u32, duty_cycle: f64) -> (u32, u32) {
    let duty = if duty_cycle.is_nan() {
        0.5
    } else {
        duty_cycle.clamp(0.0, 1.0)
    };
    let high = (samples as f64 * duty).floor() as u32;
    (high, samples - high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_cycle_split_sums_to_period() {
        assert_eq!(split_duty_cycle(8, 0.5), (4, 4));
        assert_eq!(split_duty_cycle(7, 0.5), (3, 4));
        assert_eq!(split_duty_cycle(10, 1.5), (10, 0));
        assert_eq!(split_duty_cycle(10, -1.0), (0, 10));
    }
}
