//! Empty array driver.
//!
//! Accepts every command and does nothing. No electrode ever reaches a
//! stimulation unit.

use mea_common::array::driver::{ArrayDriver, ArrayError};
use mea_common::array::routing::RoutingConfig;
use mea_common::array::types::{ElectrodeId, UnitId};
use mea_common::stim::program::Stimulator;
use mea_stim::EmptyStimulator;
use std::path::Path;

/// Routing reported by the empty driver.
pub const EMPTY_ROUTING: &str = "0(5387)1872.5/420;1(11362)2485/892.5;";

/// No-op array driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyArrayDriver;

impl ArrayDriver for EmptyArrayDriver {
    fn name(&self) -> &'static str {
        "empty"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn initialize(&mut self) -> Result<(), ArrayError> {
        Ok(())
    }

    fn send_core_settings(&mut self) -> Result<(), ArrayError> {
        Ok(())
    }

    fn offset(&mut self) -> Result<(), ArrayError> {
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ArrayError> {
        Ok(())
    }

    fn clear_selected_electrodes(&mut self) -> Result<(), ArrayError> {
        Ok(())
    }

    fn select_electrodes(&mut self, _electrodes: &[ElectrodeId]) -> Result<(), ArrayError> {
        Ok(())
    }

    fn select_stimulation_electrodes(
        &mut self,
        _electrodes: &[ElectrodeId],
    ) -> Result<(), ArrayError> {
        Ok(())
    }

    fn route(&mut self) -> Result<(), ArrayError> {
        Ok(())
    }

    fn download(&mut self) -> Result<(), ArrayError> {
        Ok(())
    }

    fn connect_electrode_to_stimulation(
        &mut self,
        _electrode: ElectrodeId,
    ) -> Result<(), ArrayError> {
        Ok(())
    }

    fn query_stimulation_at_electrode(
        &mut self,
        _electrode: ElectrodeId,
    ) -> Result<Option<UnitId>, ArrayError> {
        Ok(None)
    }

    fn disconnect_electrode_from_stimulation(
        &mut self,
        _electrode: ElectrodeId,
    ) -> Result<(), ArrayError> {
        Ok(())
    }

    fn power_up_stimulation_unit(&mut self, _unit: UnitId) -> Result<(), ArrayError> {
        Ok(())
    }

    fn power_down_stimulation_unit(&mut self, _unit: UnitId) -> Result<(), ArrayError> {
        Ok(())
    }

    fn load_routing_config(&mut self, _path: &Path) -> Result<(), ArrayError> {
        Ok(())
    }

    fn routing_config(&self) -> Result<RoutingConfig, ArrayError> {
        EMPTY_ROUTING.parse()
    }

    fn create_stimulator(&self) -> Box<dyn Stimulator> {
        Box::new(EmptyStimulator)
    }

    fn close(&mut self) -> Result<(), ArrayError> {
        Ok(())
    }
}

/// Factory function to create an empty driver instance.
pub fn create_driver() -> Box<dyn ArrayDriver> {
    Box::new(EmptyArrayDriver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_assigns_units() {
        let mut driver = EmptyArrayDriver;
        driver.connect_electrode_to_stimulation(10).unwrap();
        assert_eq!(driver.query_stimulation_at_electrode(10).unwrap(), None);
    }

    #[test]
    fn reports_fixed_routing() {
        let routing = EmptyArrayDriver.routing_config().unwrap();
        assert_eq!(routing.len(), 2);
        assert_eq!(routing.electrode_for_channel(0), Some(5387));
    }
}
