//! Single-cycle square and sine waves.

use super::{StimulatorBuilder, split_duty_cycle};
use crate::samples::frequency_to_samples;
use mea_common::stim::program::Stimulator;
use std::f64::consts::TAU;

/// One high/low cycle of a square wave.
#[derive(Debug, Clone, PartialEq)]
pub struct SquareWaveBuilder {
    /// Frequency (Hz).
    pub frequency_hz: f64,
    /// Amplitude (mV).
    pub amplitude_mv: f64,
    /// Baseline (mV).
    pub offset_mv: f64,
    /// Fraction of the cycle spent high.
    pub duty_cycle: f64,
}

impl Default for SquareWaveBuilder {
    fn default() -> Self {
        Self {
            frequency_hz: 1.0,
            amplitude_mv: 1.0,
            offset_mv: 1.0,
            duty_cycle: 0.5,
        }
    }
}

impl StimulatorBuilder for SquareWaveBuilder {
    fn build(&self, stimulator: &mut dyn Stimulator) {
        let samples_in_cycle = frequency_to_samples(self.frequency_hz);
        let (n_high, n_low) = split_duty_cycle(samples_in_cycle, self.duty_cycle);

        stimulator.add_event_flag(self.amplitude_mv, 1.0 / self.frequency_hz);
        stimulator.add(self.offset_mv + self.amplitude_mv, n_high);
        stimulator.add(self.offset_mv - self.amplitude_mv, n_low);
    }
}

/// One period of a sine wave, one single-sample step per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SineWaveBuilder {
    /// Frequency (Hz).
    pub frequency_hz: f64,
    /// Amplitude (mV).
    pub amplitude_mv: f64,
    /// Baseline (mV).
    pub offset_mv: f64,
}

impl Default for SineWaveBuilder {
    fn default() -> Self {
        Self {
            frequency_hz: 1.0,
            amplitude_mv: 1.0,
            offset_mv: 1.0,
        }
    }
}

impl StimulatorBuilder for SineWaveBuilder {
    fn build(&self, stimulator: &mut dyn Stimulator) {
        let samples_in_cycle = frequency_to_samples(self.frequency_hz);

        stimulator.add_event_flag(self.amplitude_mv, 1.0 / self.frequency_hz);
        for i in 0..samples_in_cycle {
            let phase = TAU * i as f64 / samples_in_cycle as f64;
            stimulator.add(phase.sin() * self.amplitude_mv + self.offset_mv, 1);
        }
    }
}
