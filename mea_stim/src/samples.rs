//! Time ↔ sample count conversions at the hardware sampling rate.

use mea_common::consts::SAMPLING_FREQUENCY;

/// Samples in one cycle of `frequency_hz`. Zero for non-positive or
/// non-finite frequencies.
pub fn frequency_to_samples(frequency_hz: f64) -> u32 {
    if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
        return 0;
    }
    to_samples(SAMPLING_FREQUENCY as f64 / frequency_hz)
}

/// Samples spanning `period_s` seconds.
pub fn period_to_samples(period_s: f64) -> u32 {
    if !(period_s.is_finite() && period_s > 0.0) {
        return 0;
    }
    to_samples(period_s * SAMPLING_FREQUENCY as f64)
}

/// Duration of one sample in milliseconds.
pub fn sample_period_ms() -> f64 {
    1e3 / SAMPLING_FREQUENCY as f64
}

fn to_samples(raw: f64) -> u32 {
    raw.round().min(u32::MAX as f64) as u32
}
