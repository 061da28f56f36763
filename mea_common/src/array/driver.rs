//! Electrode array driver trait and error types.
//!
//! This module defines:
//! - `ArrayDriver` trait - Capability set of the array hardware
//! - `ArrayError` enum - Error types for array operations
//! - `DriverFactory` type alias - Factory function type

use super::routing::RoutingConfig;
use super::types::{ElectrodeId, UnitId};
use crate::stim::program::Stimulator;
use std::path::Path;
use thiserror::Error;

/// Error types for array operations.
#[derive(Debug, Clone, Error)]
pub enum ArrayError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Hardware communication error
    #[error("Hardware communication error: {0}")]
    CommunicationError(String),

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Connect/power operation issued before `route_electrodes()`
    #[error("Electrodes are not routed")]
    NotRouted,

    /// Pattern index outside the configured patterns
    #[error("Unknown pattern {pattern} (configured: {n_patterns})")]
    UnknownPattern {
        /// Requested pattern
        pattern: usize,
        /// Number of configured patterns
        n_patterns: usize,
    },

    /// Malformed routing configuration text
    #[error("Invalid routing configuration: {0}")]
    RoutingConfig(String),
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn ArrayDriver>;

/// Capability set of the electrode array hardware.
///
/// The controller drives the array exclusively through this trait, enabling
/// interchangeable backends (vendor device, mock, empty).
///
/// # Lifecycle
///
/// 1. `initialize()` → `send_core_settings()` → `reset()`
/// 2. `load_routing_config()` or select + `route()`
/// 3. `download()` → `offset()`
/// 4. connect / query / power stimulation units
/// 5. `close()`
///
/// # Concurrency
///
/// The array is one logical resource. Implementations are not required to be
/// internally synchronized; callers serialize every call (single writer).
pub trait ArrayDriver: Send {
    /// Returns the driver's unique identifier (e.g., "mock", "empty").
    fn name(&self) -> &'static str;

    /// Returns the driver's semantic version.
    fn version(&self) -> &'static str;

    /// Bring the system into a defined state.
    fn initialize(&mut self) -> Result<(), ArrayError>;

    /// Send default core (amplifier) settings.
    fn send_core_settings(&mut self) -> Result<(), ArrayError>;

    /// Apply offset calibration.
    fn offset(&mut self) -> Result<(), ArrayError>;

    /// Reset the routing state of the array.
    fn reset(&mut self) -> Result<(), ArrayError>;

    /// Drop every previously selected electrode.
    fn clear_selected_electrodes(&mut self) -> Result<(), ArrayError>;

    /// Select electrodes for recording.
    fn select_electrodes(&mut self, electrodes: &[ElectrodeId]) -> Result<(), ArrayError>;

    /// Select electrodes to be routable to stimulation units.
    fn select_stimulation_electrodes(&mut self, electrodes: &[ElectrodeId])
    -> Result<(), ArrayError>;

    /// Compute the routing for the current selection.
    fn route(&mut self) -> Result<(), ArrayError>;

    /// Download the routing to the chip.
    fn download(&mut self) -> Result<(), ArrayError>;

    /// Connect `electrode` to a free stimulation unit.
    ///
    /// Succeeding does not guarantee a unit was found; check with
    /// [`ArrayDriver::query_stimulation_at_electrode`].
    fn connect_electrode_to_stimulation(&mut self, electrode: ElectrodeId)
    -> Result<(), ArrayError>;

    /// Stimulation unit `electrode` is connected to, if any.
    fn query_stimulation_at_electrode(
        &mut self,
        electrode: ElectrodeId,
    ) -> Result<Option<UnitId>, ArrayError>;

    /// Release the stimulation unit held by `electrode`.
    fn disconnect_electrode_from_stimulation(
        &mut self,
        electrode: ElectrodeId,
    ) -> Result<(), ArrayError>;

    /// Power up and connect a stimulation unit.
    fn power_up_stimulation_unit(&mut self, unit: UnitId) -> Result<(), ArrayError>;

    /// Power down a stimulation unit.
    fn power_down_stimulation_unit(&mut self, unit: UnitId) -> Result<(), ArrayError>;

    /// Load a routing configuration file onto the array.
    fn load_routing_config(&mut self, path: &Path) -> Result<(), ArrayError>;

    /// Current channel/electrode routing.
    fn routing_config(&self) -> Result<RoutingConfig, ArrayError>;

    /// Create a stimulator bound to this array's sequencer.
    fn create_stimulator(&self) -> Box<dyn Stimulator>;

    /// Release the hardware handle.
    fn close(&mut self) -> Result<(), ArrayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_error_display() {
        let err = ArrayError::InitFailed("no device".to_string());
        assert!(err.to_string().contains("no device"));

        let err = ArrayError::UnknownPattern {
            pattern: 4,
            n_patterns: 2,
        };
        assert_eq!(err.to_string(), "Unknown pattern 4 (configured: 2)");
    }
}
