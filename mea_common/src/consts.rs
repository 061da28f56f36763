//! System-wide constants for the MEA workspace.
//!
//! Single source of truth for array geometry, sampling and stimulation limits.
//! Imported by all crates, no duplication permitted.

use static_assertions::const_assert;

/// Number of columns in the electrode array.
pub const N_MAP_COLUMNS: usize = 220;

/// Number of rows in the electrode array.
pub const N_MAP_ROWS: usize = 120;

/// Total number of electrodes on the array.
pub const N_ELECTRODES: usize = N_MAP_COLUMNS * N_MAP_ROWS;

/// Hardware sampling frequency (Hz).
pub const SAMPLING_FREQUENCY: u32 = 20_000;

/// Maximum number of stimulation channels the hardware can drive at once.
pub const MAX_STIM_CHANNELS: usize = 32;

/// Maximum number of recording channels.
pub const MAX_N_SAMPLING_CHANNELS: usize = 1024;

/// Extra channels appended by the system to every amplitude frame.
pub const N_MAGIC_SAMPLING_CHANNELS: usize = 3;

/// Full width of an amplitude frame including system channels.
pub const MAX_N_FULL_SAMPLING_CHANNELS: usize = MAX_N_SAMPLING_CHANNELS + N_MAGIC_SAMPLING_CHANNELS;

/// Port of the raw data stream on the acquisition server.
pub const RAW_DATA_STREAM_PORT: u16 = 7204;

/// Port of the filtered data stream on the acquisition server.
pub const FILTERED_DATA_STREAM_PORT: u16 = 7205;

/// Default receive timeout for stream polls (ms).
pub const DEFAULT_STREAM_TIMEOUT_MS: u32 = 100;

/// Seconds of data the stream receive buffer can hold.
pub const STREAM_BUFFERING_TIME_S: usize = 10;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/mea/experiment.toml";

const_assert!(MAX_N_SAMPLING_CHANNELS <= N_ELECTRODES);
const_assert!(MAX_STIM_CHANNELS <= u16::MAX as usize);
const_assert!(N_ELECTRODES <= u32::MAX as usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert_eq!(N_ELECTRODES, 26_400);
        assert!(MAX_STIM_CHANNELS > 0);
        assert!(MAX_N_FULL_SAMPLING_CHANNELS > MAX_N_SAMPLING_CHANNELS);
        assert_ne!(RAW_DATA_STREAM_PORT, FILTERED_DATA_STREAM_PORT);
    }

    #[test]
    fn electrode_ids_fit_in_u32() {
        assert!(N_ELECTRODES <= u32::MAX as usize);
    }
}
