//! Stream of biphasic pulses.

use super::{StimulatorBuilder, split_duty_cycle};
use crate::samples::period_to_samples;
use mea_common::stim::program::Stimulator;

/// Train of `nb_pulses` biphasic pulses, each followed by a rest at `offset_mv`.
///
/// Produces one event flag, then `3 * nb_pulses` steps:
/// high (`offset + amplitude`), low (`offset - amplitude`), rest (`offset`).
#[derive(Debug, Clone, PartialEq)]
pub struct PulseStreamBuilder {
    /// Pulse period (µs), high + low phases.
    pub period_us: f64,
    /// Pulse amplitude (mV).
    pub amplitude_mv: f64,
    /// Baseline (mV).
    pub offset_mv: f64,
    /// Fraction of the period spent high.
    pub duty_cycle: f64,
    /// Number of pulses.
    pub nb_pulses: u32,
    /// Rest after each pulse (ms).
    pub ipi_ms: f64,
}

impl Default for PulseStreamBuilder {
    fn default() -> Self {
        Self {
            period_us: 400.0,
            amplitude_mv: 100.0,
            offset_mv: 0.0,
            duty_cycle: 0.5,
            nb_pulses: 4,
            ipi_ms: 1.0,
        }
    }
}

impl PulseStreamBuilder {
    /// Pulse stream for a target `frequency_hz`: two `phase_us` phases per
    /// pulse and a rest of one stimulation period after each pulse.
    pub fn for_frequency(amplitude_mv: f64, frequency_hz: f64, phase_us: f64, nb_pulses: u32) -> Self {
        let ipi_ms = if frequency_hz > 0.0 {
            1e3 / frequency_hz
        } else {
            0.0
        };
        Self {
            period_us: 2.0 * phase_us,
            amplitude_mv,
            offset_mv: 0.0,
            duty_cycle: 0.5,
            nb_pulses,
            ipi_ms,
        }
    }
}

impl StimulatorBuilder for PulseStreamBuilder {
    fn build(&self, stimulator: &mut dyn Stimulator) {
        let samples_in_cycle = period_to_samples(self.period_us * 1e-6);
        let (n_high, n_low) = split_duty_cycle(samples_in_cycle, self.duty_cycle);
        let n_rest = period_to_samples(self.ipi_ms * 1e-3);

        let high = self.offset_mv + self.amplitude_mv;
        let low = self.offset_mv - self.amplitude_mv;

        // one trigger for the whole stream
        stimulator.add_event_flag(self.amplitude_mv, self.period_us);
        for _ in 0..self.nb_pulses {
            stimulator.add(high, n_high);
            stimulator.add(low, n_low);
            stimulator.add(self.offset_mv, n_rest);
        }
    }
}
