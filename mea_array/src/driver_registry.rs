//! Name → factory lookup for array drivers.
//!
//! The experiment file names its driver (`[array] driver = "mock"`); the
//! runner resolves that name here. Vendor drivers live outside this crate and
//! are registered next to the built-in ones at startup. A vendor driver may
//! take over a built-in name, which lets a rig swap `mock` for real hardware
//! without touching its experiment files.

use crate::drivers::register_builtin_drivers;
use mea_common::array::driver::{ArrayDriver, ArrayError, DriverFactory};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Array drivers selectable by name.
#[derive(Default)]
pub struct DriverRegistry {
    factories: BTreeMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Registry without any driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `mock` and `empty` drivers.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        register_builtin_drivers(&mut registry);
        registry
    }

    /// Make `factory` available as `name`.
    ///
    /// Returns the factory previously registered under `name`, which is
    /// replaced with a warning.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) -> Option<DriverFactory> {
        let previous = self.factories.insert(name, factory);
        if previous.is_some() {
            warn!("Array driver '{}' replaced by a new registration", name);
        }
        previous
    }

    /// `true` if a driver is registered as `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate the driver registered as `name`.
    ///
    /// # Errors
    /// `ArrayError::DriverNotFound` if nothing is registered as `name`.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn ArrayDriver>, ArrayError> {
        match self.factories.get(name) {
            Some(factory) => {
                debug!("Creating array driver '{}'", name);
                Ok(factory())
            }
            None => {
                warn!(
                    "No array driver '{}', available: {}",
                    name,
                    self.list_drivers().join(", ")
                );
                Err(ArrayError::DriverNotFound(name.to_string()))
            }
        }
    }

    /// Registered driver names, sorted.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::empty::EmptyArrayDriver;

    fn rig_driver() -> Box<dyn ArrayDriver> {
        Box::new(EmptyArrayDriver)
    }

    #[test]
    fn builtin_drivers_are_listed() {
        let reg = DriverRegistry::with_builtin();
        assert_eq!(reg.list_drivers(), vec!["empty", "mock"]);
        assert!(reg.contains("mock"));
        assert_eq!(reg.create_driver("mock").unwrap().name(), "mock");
    }

    #[test]
    fn unknown_driver_is_not_found() {
        let reg = DriverRegistry::with_builtin();
        assert!(!reg.contains("maxone"));
        assert!(matches!(
            reg.create_driver("maxone"),
            Err(ArrayError::DriverNotFound(name)) if name == "maxone"
        ));
    }

    #[test]
    fn rig_driver_takes_over_builtin_name() {
        let mut reg = DriverRegistry::with_builtin();
        assert!(reg.register("rig", rig_driver).is_none());
        assert!(reg.register("mock", rig_driver).is_some());

        assert_eq!(reg.list_drivers(), vec!["empty", "mock", "rig"]);
        assert_eq!(reg.create_driver("mock").unwrap().name(), "empty");
    }
}
