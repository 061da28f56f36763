//! Prelude module for common re-exports.
//!
//! ```rust
//! use mea_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig, Validate};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_STIM_CHANNELS, N_MAP_COLUMNS, N_MAP_ROWS, SAMPLING_FREQUENCY};

// ─── Array ──────────────────────────────────────────────────────────
pub use crate::array::driver::{ArrayDriver, ArrayError, DriverFactory};
pub use crate::array::routing::RoutingConfig;
pub use crate::array::saving::{EmptyRecordingSaver, RecordingSaver};
pub use crate::array::types::{ElectrodeId, UnitId};

// ─── Stimulation ────────────────────────────────────────────────────
pub use crate::stim::dac::{voltage_to_code, DacCode};
pub use crate::stim::program::{SequenceSink, StimulationProgram, Stimulator};
