//! Voltage ↔ DAC code conversion.
//!
//! The stimulation DAC is 10 bits wide with 0 mV at code 512 and a resolution
//! of 2.9 mV per code. The output stage is an inverting amplifier, so positive
//! voltages map to codes below 512.

/// DAC code resolution (mV per code).
pub const DAC_CODE_RESOLUTION_MV: f64 = 2.9;

/// Number of representable DAC codes (10 bits).
pub const DAC_CODE_RANGE: u16 = 1 << 10;

/// DAC code for 0 mV.
pub const DAC_CODE_ZERO: u16 = DAC_CODE_RANGE / 2;

/// Highest representable amplitude (mV).
pub const MAX_AMPLITUDE_MV: f64 = DAC_CODE_ZERO as f64 * DAC_CODE_RESOLUTION_MV;

/// Lowest representable amplitude (mV).
pub const MIN_AMPLITUDE_MV: f64 = -MAX_AMPLITUDE_MV;

/// Unsigned DAC code understood by the stimulation unit.
pub type DacCode = u16;

/// Convert a voltage in mV to a DAC code.
///
/// Out-of-range voltages clamp silently to the range bounds. NaN is treated
/// as 0 mV.
pub fn voltage_to_code(mv: f64) -> DacCode {
    let mv = if mv.is_nan() {
        0.0
    } else {
        mv.clamp(MIN_AMPLITUDE_MV, MAX_AMPLITUDE_MV)
    };
    let code = DAC_CODE_ZERO as f64 - (mv / DAC_CODE_RESOLUTION_MV).round();
    // -MAX_AMPLITUDE_MV lands one past the last code
    code.clamp(0.0, (DAC_CODE_RANGE - 1) as f64) as DacCode
}

/// Voltage (mV) produced by a DAC code.
pub fn code_to_voltage(code: DacCode) -> f64 {
    (DAC_CODE_ZERO as f64 - code as f64) * DAC_CODE_RESOLUTION_MV
}
