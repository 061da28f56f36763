//! Array driver implementations.
//!
//! This module contains the built-in array drivers:
//!
//! - [`mock`] - Stateful stand-in with a finite stimulation unit pool
//! - [`empty`] - No-op driver for development without hardware
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/` (or an external crate)
//! 2. Implement the `ArrayDriver` trait from `mea_common::array::driver`
//! 3. Register its factory on a `DriverRegistry` at startup

pub mod empty;
pub mod mock;

use crate::driver_registry::DriverRegistry;

/// Register all built-in drivers on `registry`.
pub fn register_builtin_drivers(registry: &mut DriverRegistry) {
    registry.register("mock", mock::create_driver);
    registry.register("empty", empty::create_driver);
}
