//! Electrode array controller.
//!
//! Drives an `ArrayDriver` through routing, stimulation unit connection and
//! power management for the roles of an `ElectrodeArrayConfig`, and keeps
//! track of which units each role holds.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──route_electrodes()/initialize()──► Routed
//!      ──prepare_*()──► Prepared ──enable_*()──► Powered
//! ```
//!
//! Every method takes `&mut self`: the hardware is a single-writer resource
//! and callers share the controller behind a mutex.

use crate::array_config::ElectrodeArrayConfig;
use mea_common::array::driver::{ArrayDriver, ArrayError};
use mea_common::array::routing::RoutingConfig;
use mea_common::array::types::{ElectrodeId, UnitId};
use mea_common::consts::MAX_STIM_CHANNELS;
use mea_common::stim::program::Stimulator;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Phase of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Nothing routed yet.
    Idle,
    /// Electrodes routed, no stimulation electrode connected.
    Routed,
    /// Stimulation electrodes connected for the flagged roles, nothing powered.
    Prepared {
        /// Pattern electrodes were prepared.
        patterns: bool,
        /// Sensor electrodes were prepared.
        sensor: bool,
    },
    /// At least one stimulation unit is powered.
    Powered,
}

/// Bring the array into a defined state and load its routing.
///
/// initialize → core settings → reset → load routing (when given) →
/// download → offset. Returns the routing the array reports.
pub fn init_array(
    array: &mut dyn ArrayDriver,
    routing_config: Option<&Path>,
) -> Result<RoutingConfig, ArrayError> {
    array.initialize()?;
    info!("Initialized electrode array ({} v{})", array.name(), array.version());
    array.send_core_settings()?;
    array.reset()?;
    info!("Reset electrode array");

    if let Some(path) = routing_config {
        array.load_routing_config(path)?;
        info!("Loaded electrode array routing from {}", path.display());
    }
    let routing = array.routing_config()?;

    array.download()?;
    array.offset()?;
    info!("Downloaded electrode array configuration ({} channels)", routing.len());
    Ok(routing)
}

/// Controls routing and stimulation units of one array.
pub struct ElectrodeArrayController {
    /// Hardware handle
    array: Box<dyn ArrayDriver>,
    /// Role electrode sets
    config: ElectrodeArrayConfig,
    /// Set once routing is in place
    routed: bool,
    /// Per-request cap on stimulation electrodes
    max_stim_channels: usize,
    /// Units of each pattern, `None` until prepared
    pattern_units: Option<Vec<Vec<UnitId>>>,
    /// Units of the sensor, `None` until prepared
    sensor_units: Option<Vec<UnitId>>,
    /// Currently enabled random subset of `sensor_units`
    random_sensor_units: Vec<UnitId>,
    /// Every connected stimulation electrode and its unit
    connected: BTreeMap<ElectrodeId, UnitId>,
    /// Powered units
    powered: BTreeSet<UnitId>,
    rng: StdRng,
}

impl ElectrodeArrayController {
    /// Create a controller over `array` for `config`.
    pub fn new(array: Box<dyn ArrayDriver>, config: ElectrodeArrayConfig) -> Self {
        Self {
            array,
            config,
            routed: false,
            max_stim_channels: MAX_STIM_CHANNELS,
            pattern_units: None,
            sensor_units: None,
            random_sensor_units: Vec::new(),
            connected: BTreeMap::new(),
            powered: BTreeSet::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Seed the random unit selection.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Cap stimulation requests at `max` electrodes, never above the
    /// hardware limit.
    pub fn with_max_stim_channels(mut self, max: usize) -> Self {
        if max > MAX_STIM_CHANNELS {
            warn!(
                "Stimulation channel limit {} above hardware limit, using {}",
                max, MAX_STIM_CHANNELS
            );
        }
        self.max_stim_channels = max.min(MAX_STIM_CHANNELS);
        self
    }

    /// Run [`init_array`] on the owned driver. The loaded routing replaces any
    /// previous one, so the controller counts as routed afterwards.
    pub fn initialize(&mut self, routing_config: Option<&Path>) -> Result<RoutingConfig, ArrayError> {
        self.forget_assignments();
        let routing = init_array(self.array.as_mut(), routing_config)?;
        self.routed = true;
        Ok(routing)
    }

    /// Route every sampling electrode for recording and every sensor and
    /// pattern stimulation electrode for stimulation, then calibrate offsets.
    ///
    /// Re-routing drops all unit assignments.
    pub fn route_electrodes(&mut self) -> Result<(), ArrayError> {
        if !self.connected.is_empty() {
            warn!(
                "Re-routing drops {} connected stimulation electrodes",
                self.connected.len()
            );
        }
        self.forget_assignments();
        self.routed = false;

        self.array.reset()?;
        self.array.clear_selected_electrodes()?;
        self.array.select_electrodes(self.config.sampling_electrodes())?;
        self.array
            .select_stimulation_electrodes(self.config.sensor_stimulation_electrodes())?;
        for pattern in 0..self.config.n_patterns() {
            if let Some(electrodes) = self.config.pattern_stimulation_electrodes(pattern) {
                self.array.select_stimulation_electrodes(electrodes)?;
            }
        }
        self.array.route()?;
        self.array.offset()?;

        self.routed = true;
        info!(
            "Routed {} sampling electrodes, {} stimulation electrodes over {} patterns",
            self.config.sampling_electrodes().len(),
            self.config.stimulation_electrodes().count(),
            self.config.n_patterns()
        );
        Ok(())
    }

    /// Download the routing to the chip.
    pub fn download(&mut self) -> Result<(), ArrayError> {
        self.array.download()
    }

    /// Connect the stimulation electrodes of every pattern.
    ///
    /// Electrodes that get no unit are skipped with a warning.
    pub fn prepare_pattern_stimulation_electrodes(&mut self) -> Result<(), ArrayError> {
        self.ensure_routed()?;
        let mut all_units = Vec::with_capacity(self.config.n_patterns());
        for pattern in 0..self.config.n_patterns() {
            let electrodes = self
                .config
                .pattern_stimulation_electrodes(pattern)
                .map(<[ElectrodeId]>::to_vec)
                .unwrap_or_default();
            let units = self.connect_electrodes(&electrodes)?;
            debug!("Pattern {} holds {} stimulation units", pattern, units.len());
            all_units.push(units);
        }
        self.pattern_units = Some(all_units);
        Ok(())
    }

    /// Connect the sensor stimulation electrodes.
    ///
    /// Electrodes that get no unit are skipped with a warning.
    pub fn prepare_sensor_stimulation_electrodes(&mut self) -> Result<(), ArrayError> {
        self.ensure_routed()?;
        let electrodes = self.config.sensor_stimulation_electrodes().to_vec();
        let units = self.connect_electrodes(&electrodes)?;
        info!("Sensor holds {} stimulation units", units.len());
        self.sensor_units = Some(units);
        Ok(())
    }

    /// Power up the units of `pattern`.
    pub fn enable_pattern_stimulation_units(&mut self, pattern: usize) -> Result<(), ArrayError> {
        self.ensure_routed()?;
        self.check_pattern(pattern)?;
        let units = self.pattern_units(pattern).to_vec();
        if units.is_empty() {
            warn!("Pattern {} has no prepared stimulation units", pattern);
        }
        self.power_up(&units)
    }

    /// Power down the units of `pattern` and release its electrodes.
    ///
    /// The pattern must be prepared again before it can be re-enabled.
    pub fn disable_pattern_stimulation_units(&mut self, pattern: usize) -> Result<(), ArrayError> {
        self.ensure_routed()?;
        self.check_pattern(pattern)?;
        let units = self
            .pattern_units
            .as_mut()
            .and_then(|all| all.get_mut(pattern))
            .map(std::mem::take)
            .unwrap_or_default();
        self.power_down(&units)?;
        let electrodes = self
            .config
            .pattern_stimulation_electrodes(pattern)
            .map(<[ElectrodeId]>::to_vec)
            .unwrap_or_default();
        self.disconnect_electrodes(&electrodes)
    }

    /// Power up the sensor units.
    pub fn enable_sensor_stimulation_units(&mut self) -> Result<(), ArrayError> {
        self.ensure_routed()?;
        let units = self.sensor_units().to_vec();
        self.power_up(&units)
    }

    /// Power down the sensor units and release the sensor electrodes.
    pub fn disable_sensor_stimulation_units(&mut self) -> Result<(), ArrayError> {
        self.ensure_routed()?;
        let units = self.sensor_units.take().unwrap_or_default();
        self.power_down(&units)?;
        self.random_sensor_units.clear();
        let electrodes = self.config.sensor_stimulation_electrodes().to_vec();
        self.disconnect_electrodes(&electrodes)
    }

    /// Power `size` distinct sensor units drawn without replacement.
    ///
    /// No-op when no sensor unit is prepared. A previous random subset is
    /// powered down first; `size` is capped at the number of sensor units.
    pub fn enable_random_sensor_stimulation_units(&mut self, size: usize) -> Result<(), ArrayError> {
        self.ensure_routed()?;
        let previous = std::mem::take(&mut self.random_sensor_units);
        self.power_down(&previous)?;

        let units = match self.sensor_units.as_deref() {
            Some(units) if !units.is_empty() => units,
            _ => {
                debug!("No sensor stimulation units prepared, skipping random stimulation");
                return Ok(());
            }
        };
        if size > units.len() {
            warn!(
                "Requested {} random sensor units, only {} prepared",
                size,
                units.len()
            );
        }
        let amount = size.min(units.len());
        let picked: Vec<UnitId> = rand::seq::index::sample(&mut self.rng, units.len(), amount)
            .iter()
            .map(|idx| units[idx])
            .collect();

        debug!("Enabling random sensor units {:?}", picked);
        self.power_up(&picked)?;
        self.random_sensor_units = picked;
        Ok(())
    }

    /// Power down the random sensor units and release their electrodes.
    ///
    /// Released units leave the sensor set until it is prepared again.
    pub fn disable_random_sensor_stimulation_units(&mut self) -> Result<(), ArrayError> {
        self.ensure_routed()?;
        let units = std::mem::take(&mut self.random_sensor_units);
        self.power_down(&units)?;

        let electrodes: Vec<ElectrodeId> = self
            .connected
            .iter()
            .filter(|(_, unit)| units.contains(unit))
            .map(|(&electrode, _)| electrode)
            .collect();
        self.disconnect_electrodes(&electrodes)?;

        if let Some(sensor_units) = self.sensor_units.as_mut() {
            sensor_units.retain(|unit| !units.contains(unit));
        }
        Ok(())
    }

    /// Connect `electrodes` and power their units in one go.
    ///
    /// Requests beyond the stimulation channel limit are cropped. Returns the
    /// powered units.
    pub fn connect_stimulation_channels(
        &mut self,
        electrodes: &[ElectrodeId],
    ) -> Result<Vec<UnitId>, ArrayError> {
        self.ensure_routed()?;
        let units = self.connect_electrodes(electrodes)?;
        self.power_up(&units)?;
        info!(
            "Connected {} stimulation electrodes and powered up {} units",
            electrodes.len().min(self.max_stim_channels),
            units.len()
        );
        Ok(units)
    }

    /// Create a stimulator bound to the array.
    pub fn create_stimulator(&self) -> Box<dyn Stimulator> {
        self.array.create_stimulator()
    }

    /// Power down and release everything, then close the driver.
    pub fn close(&mut self) -> Result<(), ArrayError> {
        let powered: Vec<UnitId> = self.powered.iter().copied().collect();
        self.power_down(&powered)?;
        let connected: Vec<ElectrodeId> = self.connected.keys().copied().collect();
        self.disconnect_electrodes(&connected)?;
        self.forget_assignments();
        self.routed = false;
        info!("Closing electrode array");
        self.array.close()
    }

    /// Current phase.
    pub fn state(&self) -> ControllerState {
        if !self.routed {
            ControllerState::Idle
        } else if !self.powered.is_empty() {
            ControllerState::Powered
        } else if self.pattern_units.is_some() || self.sensor_units.is_some() {
            ControllerState::Prepared {
                patterns: self.pattern_units.is_some(),
                sensor: self.sensor_units.is_some(),
            }
        } else {
            ControllerState::Routed
        }
    }

    /// Role electrode sets this controller drives.
    pub fn config(&self) -> &ElectrodeArrayConfig {
        &self.config
    }

    /// Underlying driver.
    pub fn driver(&self) -> &dyn ArrayDriver {
        self.array.as_ref()
    }

    /// Stimulation electrodes accepted per request.
    pub fn max_stim_channels(&self) -> usize {
        self.max_stim_channels
    }

    /// Prepared sensor units, empty when not prepared.
    pub fn sensor_units(&self) -> &[UnitId] {
        self.sensor_units.as_deref().unwrap_or(&[])
    }

    /// Prepared units of `pattern`, empty when not prepared.
    pub fn pattern_units(&self, pattern: usize) -> &[UnitId] {
        self.pattern_units
            .as_ref()
            .and_then(|all| all.get(pattern))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sensor units powered by the last random draw.
    pub fn random_sensor_units(&self) -> &[UnitId] {
        &self.random_sensor_units
    }

    /// Connected stimulation electrodes and their units.
    pub fn connected_units(&self) -> &BTreeMap<ElectrodeId, UnitId> {
        &self.connected
    }

    /// Units currently powered up.
    pub fn powered_units(&self) -> &BTreeSet<UnitId> {
        &self.powered
    }

    fn ensure_routed(&self) -> Result<(), ArrayError> {
        if self.routed {
            Ok(())
        } else {
            Err(ArrayError::NotRouted)
        }
    }

    fn check_pattern(&self, pattern: usize) -> Result<(), ArrayError> {
        let n_patterns = self.config.n_patterns();
        if pattern < n_patterns {
            Ok(())
        } else {
            Err(ArrayError::UnknownPattern {
                pattern,
                n_patterns,
            })
        }
    }

    fn forget_assignments(&mut self) {
        self.pattern_units = None;
        self.sensor_units = None;
        self.random_sensor_units.clear();
        self.connected.clear();
        self.powered.clear();
    }

    fn limit<'a>(&self, electrodes: &'a [ElectrodeId]) -> &'a [ElectrodeId] {
        if electrodes.len() > self.max_stim_channels {
            warn!(
                "Too many stimulation electrodes requested ({}), cropped to {}",
                electrodes.len(),
                self.max_stim_channels
            );
            &electrodes[..self.max_stim_channels]
        } else {
            electrodes
        }
    }

    /// Connect each electrode and collect the distinct units they landed on.
    fn connect_electrodes(&mut self, electrodes: &[ElectrodeId]) -> Result<Vec<UnitId>, ArrayError> {
        let electrodes = self.limit(electrodes);
        let mut units = Vec::with_capacity(electrodes.len());
        for &electrode in electrodes {
            match self.connect_electrode(electrode) {
                Ok(Some(unit)) => {
                    self.connected.insert(electrode, unit);
                    if !units.contains(&unit) {
                        units.push(unit);
                    }
                }
                Ok(None) => {
                    warn!("No stimulation unit can connect to electrode {}", electrode);
                }
                Err(e) => {
                    warn!("Failed to connect electrode {}: {}", electrode, e);
                }
            }
        }
        Ok(units)
    }

    fn connect_electrode(&mut self, electrode: ElectrodeId) -> Result<Option<UnitId>, ArrayError> {
        self.array.connect_electrode_to_stimulation(electrode)?;
        self.array.query_stimulation_at_electrode(electrode)
    }

    /// Disconnect `electrodes`. A unit left without any connected electrode
    /// is dropped from every role holding it, so electrodes shared between
    /// the sensor and a pattern never leave a dangling unit behind.
    fn disconnect_electrodes(&mut self, electrodes: &[ElectrodeId]) -> Result<(), ArrayError> {
        let mut released = Vec::new();
        for electrode in electrodes {
            if let Some(unit) = self.connected.remove(electrode) {
                self.array.disconnect_electrode_from_stimulation(*electrode)?;
                released.push(unit);
            }
        }
        released.retain(|unit| !self.connected.values().any(|u| u == unit));
        if released.is_empty() {
            return Ok(());
        }

        let keep = |unit: &UnitId| !released.contains(unit);
        if let Some(units) = self.sensor_units.as_mut() {
            units.retain(keep);
        }
        if let Some(all) = self.pattern_units.as_mut() {
            for units in all {
                units.retain(keep);
            }
        }
        self.random_sensor_units.retain(keep);
        Ok(())
    }

    fn power_up(&mut self, units: &[UnitId]) -> Result<(), ArrayError> {
        for &unit in units {
            if self.powered.contains(&unit) {
                continue;
            }
            self.array.power_up_stimulation_unit(unit)?;
            self.powered.insert(unit);
        }
        Ok(())
    }

    fn power_down(&mut self, units: &[UnitId]) -> Result<(), ArrayError> {
        for &unit in units {
            if !self.powered.contains(&unit) {
                continue;
            }
            self.array.power_down_stimulation_unit(unit)?;
            self.powered.remove(&unit);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mock::{MockArrayDriver, MockCall};

    fn config() -> ElectrodeArrayConfig {
        ElectrodeArrayConfig::new(
            vec![vec![1000, 1001], vec![2000]],
            vec![10, 11],
            vec![20, 21, 22],
            vec![241, 242, 243],
        )
        .unwrap()
    }

    fn controller() -> (ElectrodeArrayController, MockArrayDriver) {
        let driver = MockArrayDriver::new();
        let mock = driver.clone_handle();
        (
            ElectrodeArrayController::new(Box::new(driver), config()).with_seed(1),
            mock,
        )
    }

    #[test]
    fn connect_before_route_is_rejected() {
        let (mut ctl, _) = controller();
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(matches!(
            ctl.prepare_sensor_stimulation_electrodes(),
            Err(ArrayError::NotRouted)
        ));
        assert!(matches!(
            ctl.connect_stimulation_channels(&[1]),
            Err(ArrayError::NotRouted)
        ));
    }

    #[test]
    fn route_selects_all_roles_in_order() {
        let (mut ctl, mock) = controller();
        ctl.route_electrodes().unwrap();
        assert_eq!(ctl.state(), ControllerState::Routed);

        let state = mock.state();
        let state = state.lock();
        assert_eq!(
            state.calls,
            vec![
                MockCall::Reset,
                MockCall::ClearSelectedElectrodes,
                MockCall::SelectElectrodes(5),
                MockCall::SelectStimulationElectrodes(3),
                MockCall::SelectStimulationElectrodes(2),
                MockCall::SelectStimulationElectrodes(1),
                MockCall::Route,
                MockCall::Offset,
            ]
        );
        assert_eq!(state.selected_electrodes, vec![10, 11, 20, 21, 22]);
        assert_eq!(state.stimulation_electrodes, vec![241, 242, 243, 1000, 1001, 2000]);
    }

    #[test]
    fn pattern_enable_disable_releases_units() {
        let (mut ctl, mock) = controller();
        ctl.route_electrodes().unwrap();
        ctl.prepare_pattern_stimulation_electrodes().unwrap();
        assert_eq!(
            ctl.state(),
            ControllerState::Prepared {
                patterns: true,
                sensor: false
            }
        );
        assert_eq!(ctl.pattern_units(0).len(), 2);
        assert_eq!(ctl.pattern_units(1).len(), 1);

        ctl.enable_pattern_stimulation_units(0).unwrap();
        assert_eq!(ctl.state(), ControllerState::Powered);
        assert_eq!(mock.state().lock().powered.len(), 2);

        ctl.disable_pattern_stimulation_units(0).unwrap();
        let state = mock.state();
        let state = state.lock();
        assert!(state.powered.is_empty());
        assert_eq!(state.connected().len(), 1);
        assert!(ctl.pattern_units(0).is_empty());
    }

    #[test]
    fn unknown_pattern_is_an_error() {
        let (mut ctl, _) = controller();
        ctl.route_electrodes().unwrap();
        assert!(matches!(
            ctl.enable_pattern_stimulation_units(2),
            Err(ArrayError::UnknownPattern {
                pattern: 2,
                n_patterns: 2
            })
        ));
    }

    #[test]
    fn enabling_twice_does_not_double_power() {
        let (mut ctl, mock) = controller();
        ctl.route_electrodes().unwrap();
        ctl.prepare_sensor_stimulation_electrodes().unwrap();
        ctl.enable_sensor_stimulation_units().unwrap();
        ctl.enable_sensor_stimulation_units().unwrap();

        let state = mock.state();
        let state = state.lock();
        assert_eq!(state.count_calls(|c| matches!(c, MockCall::PowerUp(_))), 3);
    }

    #[test]
    fn failed_connections_are_skipped() {
        let driver = MockArrayDriver::new().with_unreachable([242]);
        let mock = driver.clone_handle();
        let mut ctl = ElectrodeArrayController::new(Box::new(driver), config());
        ctl.route_electrodes().unwrap();
        ctl.prepare_sensor_stimulation_electrodes().unwrap();
        ctl.enable_sensor_stimulation_units().unwrap();

        assert_eq!(ctl.sensor_units().len(), 2);
        assert!(!ctl.connected_units().contains_key(&242));
        assert_eq!(mock.state().lock().powered.len(), 2);
    }

    #[test]
    fn shared_electrode_leaves_sensor_with_pattern() {
        let config =
            ElectrodeArrayConfig::new(vec![vec![241]], vec![10], vec![20], vec![241, 242]).unwrap();
        let driver = MockArrayDriver::new();
        let mock = driver.clone_handle();
        let mut ctl = ElectrodeArrayController::new(Box::new(driver), config);
        ctl.route_electrodes().unwrap();
        ctl.prepare_sensor_stimulation_electrodes().unwrap();
        ctl.prepare_pattern_stimulation_electrodes().unwrap();
        let shared = ctl.connected_units()[&241];
        assert_eq!(ctl.pattern_units(0), &[shared]);
        assert!(ctl.sensor_units().contains(&shared));

        ctl.disable_pattern_stimulation_units(0).unwrap();
        assert_eq!(ctl.sensor_units().len(), 1);
        assert!(!ctl.sensor_units().contains(&shared));

        // only the sensor's own electrode is left to power
        ctl.enable_sensor_stimulation_units().unwrap();
        assert_eq!(ctl.powered_units().len(), 1);
        assert_eq!(mock.state().lock().powered, *ctl.powered_units());
    }

    #[test]
    fn random_sensor_units_are_distinct_subset() {
        let (mut ctl, mock) = controller();
        ctl.route_electrodes().unwrap();
        ctl.prepare_sensor_stimulation_electrodes().unwrap();
        ctl.enable_random_sensor_stimulation_units(2).unwrap();

        let random: BTreeSet<UnitId> = ctl.random_sensor_units().iter().copied().collect();
        assert_eq!(random.len(), 2);
        assert!(random.iter().all(|u| ctl.sensor_units().contains(u)));
        assert_eq!(mock.state().lock().powered, random);
    }

    #[test]
    fn random_without_sensor_units_is_noop() {
        let (mut ctl, mock) = controller();
        ctl.route_electrodes().unwrap();
        ctl.enable_random_sensor_stimulation_units(3).unwrap();
        assert!(ctl.random_sensor_units().is_empty());
        assert_eq!(
            mock.state()
                .lock()
                .count_calls(|c| matches!(c, MockCall::PowerUp(_))),
            0
        );
    }

    #[test]
    fn disable_random_releases_only_chosen_units() {
        let (mut ctl, mock) = controller();
        ctl.route_electrodes().unwrap();
        ctl.prepare_sensor_stimulation_electrodes().unwrap();
        ctl.enable_random_sensor_stimulation_units(1).unwrap();
        let chosen = ctl.random_sensor_units()[0];

        ctl.disable_random_sensor_stimulation_units().unwrap();
        assert!(ctl.random_sensor_units().is_empty());
        assert_eq!(ctl.sensor_units().len(), 2);
        assert!(!ctl.sensor_units().contains(&chosen));

        let state = mock.state();
        let state = state.lock();
        assert!(state.powered.is_empty());
        assert_eq!(state.connected().len(), 2);
    }

    #[test]
    fn connect_stimulation_channels_crops_to_limit() {
        let driver = MockArrayDriver::with_unit_pool(64);
        let mock = driver.clone_handle();
        let mut ctl = ElectrodeArrayController::new(Box::new(driver), config());
        ctl.initialize(None).unwrap();

        let electrodes: Vec<ElectrodeId> = (100..140).collect();
        let units = ctl.connect_stimulation_channels(&electrodes).unwrap();
        assert_eq!(units.len(), MAX_STIM_CHANNELS);
        assert_eq!(mock.state().lock().powered.len(), MAX_STIM_CHANNELS);
        assert!(!ctl.connected_units().contains_key(&139));
    }

    #[test]
    fn max_stim_channels_never_exceeds_hardware() {
        let ctl = ElectrodeArrayController::new(Box::new(MockArrayDriver::new()), config())
            .with_max_stim_channels(100);
        assert_eq!(ctl.max_stim_channels(), MAX_STIM_CHANNELS);
    }

    #[test]
    fn reroute_forgets_assignments() {
        let (mut ctl, _) = controller();
        ctl.route_electrodes().unwrap();
        ctl.prepare_sensor_stimulation_electrodes().unwrap();
        ctl.enable_sensor_stimulation_units().unwrap();
        ctl.route_electrodes().unwrap();

        assert_eq!(ctl.state(), ControllerState::Routed);
        assert!(ctl.connected_units().is_empty());
        assert!(ctl.powered_units().is_empty());
    }

    #[test]
    fn close_releases_hardware() {
        let (mut ctl, mock) = controller();
        ctl.route_electrodes().unwrap();
        ctl.prepare_sensor_stimulation_electrodes().unwrap();
        ctl.enable_sensor_stimulation_units().unwrap();
        ctl.close().unwrap();

        assert_eq!(ctl.state(), ControllerState::Idle);
        let state = mock.state();
        let state = state.lock();
        assert!(state.closed);
        assert!(state.powered.is_empty());
        assert!(state.connected().is_empty());
    }
}
