//! Noise waveforms.
//!
//! Both builders emit one single-sample step per sample over one cycle of
//! `frequency_hz`, clipped to `[-amplitude_mv, amplitude_mv]`. A fixed `seed`
//! makes the waveform reproducible.

use super::StimulatorBuilder;
use crate::samples::{frequency_to_samples, sample_period_ms};
use mea_common::stim::program::Stimulator;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, StandardNormal};
use tracing::warn;

/// Draws before a truncated normal sample falls back to clamping.
const MAX_TRUNCATION_DRAWS: usize = 64;

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Truncated normal noise in `[-amplitude_mv, amplitude_mv]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianNoiseBuilder {
    /// Frequency (Hz), sets the number of samples.
    pub frequency_hz: f64,
    /// Truncation bound (mV).
    pub amplitude_mv: f64,
    /// Mean (mV).
    pub mu: f64,
    /// Standard deviation (mV).
    pub sigma: f64,
    /// RNG seed, entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for GaussianNoiseBuilder {
    fn default() -> Self {
        Self {
            frequency_hz: 1.0,
            amplitude_mv: 1.0,
            mu: 0.0,
            sigma: 1.0,
            seed: None,
        }
    }
}

impl GaussianNoiseBuilder {
    fn sample(&self, normal: Option<&Normal<f64>>, rng: &mut StdRng) -> f64 {
        let bound = self.amplitude_mv.abs();
        let Some(normal) = normal else {
            return self.mu.clamp(-bound, bound);
        };
        for _ in 0..MAX_TRUNCATION_DRAWS {
            let v = normal.sample(rng);
            if (-bound..=bound).contains(&v) {
                return v;
            }
        }
        // mass of the window is negligible; settle on the nearest bound
        normal.sample(rng).clamp(-bound, bound)
    }
}

impl StimulatorBuilder for GaussianNoiseBuilder {
    fn build(&self, stimulator: &mut dyn Stimulator) {
        let samples_in_cycle = frequency_to_samples(self.frequency_hz);
        let normal = match Normal::new(self.mu, self.sigma) {
            Ok(n) if self.sigma > 0.0 => Some(n),
            _ => {
                warn!("Invalid noise sigma {}, emitting constant mean", self.sigma);
                None
            }
        };
        let mut rng = make_rng(self.seed);

        stimulator.add_event_flag(self.amplitude_mv, 1.0 / self.frequency_hz);
        for _ in 0..samples_in_cycle {
            let voltage = self.sample(normal.as_ref(), &mut rng);
            stimulator.add(voltage, 1);
        }
    }
}

/// Synaptic noise as an Ornstein–Uhlenbeck process:
/// `x[n+1] = x[n] + θ·dt·(μ − x[n]) + σ·√dt·N(0,1)`, with `dt` in ms.
///
/// The process itself is not clipped, only the emitted voltage.
#[derive(Debug, Clone, PartialEq)]
pub struct SynapticNoiseBuilder {
    /// Frequency (Hz), sets the number of samples.
    pub frequency_hz: f64,
    /// Clipping bound (mV).
    pub amplitude_mv: f64,
    /// Long-term mean (mV), also the initial value.
    pub mu: f64,
    /// Noise intensity.
    pub sigma: f64,
    /// Mean reversion rate (1/ms).
    pub theta: f64,
    /// RNG seed, entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for SynapticNoiseBuilder {
    fn default() -> Self {
        Self {
            frequency_hz: 1.0,
            amplitude_mv: 1.0,
            mu: 0.0,
            sigma: 1.0,
            theta: 1.0,
            seed: None,
        }
    }
}

impl StimulatorBuilder for SynapticNoiseBuilder {
    fn build(&self, stimulator: &mut dyn Stimulator) {
        let dt = sample_period_ms();
        let sqrt_dt = dt.sqrt();
        let bound = self.amplitude_mv.abs();
        let samples_in_cycle = frequency_to_samples(self.frequency_hz);
        let mut rng = make_rng(self.seed);
        let mut x = self.mu;

        stimulator.add_event_flag(self.amplitude_mv, 1.0 / self.frequency_hz);
        for _ in 0..samples_in_cycle {
            let n: f64 = StandardNormal.sample(&mut rng);
            x = x + self.theta * dt * (self.mu - x) + self.sigma * sqrt_dt * n;
            stimulator.add(x.clamp(-bound, bound), 1);
        }
    }
}
