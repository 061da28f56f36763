//! Mock array driver.
//!
//! Emulates the routing surface of the array in memory: a finite pool of
//! stimulation units, electrode selections, power state and a call log. The
//! state lives behind an `Arc<Mutex<_>>` so tests can keep a handle after the
//! driver has been boxed and handed to a controller.

use mea_common::array::driver::{ArrayDriver, ArrayError};
use mea_common::array::routing::RoutingConfig;
use mea_common::array::types::{ElectrodeId, UnitId};
use mea_common::consts::{MAX_N_SAMPLING_CHANNELS, MAX_STIM_CHANNELS};
use mea_common::stim::program::Stimulator;
use mea_stim::{RecordingSink, SequenceStimulator};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// One call made on the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Initialize,
    SendCoreSettings,
    Offset,
    Reset,
    ClearSelectedElectrodes,
    /// Number of electrodes selected.
    SelectElectrodes(usize),
    /// Number of electrodes selected.
    SelectStimulationElectrodes(usize),
    Route,
    Download,
    Connect(ElectrodeId),
    Disconnect(ElectrodeId),
    PowerUp(UnitId),
    PowerDown(UnitId),
    LoadRoutingConfig(PathBuf),
    Close,
}

/// Observable state of the mock array.
#[derive(Debug)]
pub struct MockArrayState {
    /// Every call, oldest first.
    pub calls: Vec<MockCall>,
    /// Electrodes selected for recording.
    pub selected_electrodes: Vec<ElectrodeId>,
    /// Electrodes selected for stimulation routing.
    pub stimulation_electrodes: Vec<ElectrodeId>,
    /// Powered units.
    pub powered: BTreeSet<UnitId>,
    /// Electrodes no unit can reach.
    pub unreachable: BTreeSet<ElectrodeId>,
    /// Current routing.
    pub routing: RoutingConfig,
    /// Set by `close()`.
    pub closed: bool,
    // unit index -> electrode holding it
    units: Vec<Option<ElectrodeId>>,
}

impl MockArrayState {
    fn new(n_units: usize) -> Self {
        Self {
            calls: Vec::new(),
            selected_electrodes: Vec::new(),
            stimulation_electrodes: Vec::new(),
            powered: BTreeSet::new(),
            unreachable: BTreeSet::new(),
            routing: RoutingConfig::identity(MAX_N_SAMPLING_CHANNELS as u32),
            closed: false,
            units: vec![None; n_units],
        }
    }

    /// Unit held by `electrode`.
    pub fn unit_of(&self, electrode: ElectrodeId) -> Option<UnitId> {
        self.units
            .iter()
            .position(|&held| held == Some(electrode))
            .map(|idx| UnitId(idx as u16))
    }

    /// `(electrode, unit)` pairs currently connected, by unit.
    pub fn connected(&self) -> Vec<(ElectrodeId, UnitId)> {
        self.units
            .iter()
            .enumerate()
            .filter_map(|(idx, held)| held.map(|e| (e, UnitId(idx as u16))))
            .collect()
    }

    /// Number of units not held by any electrode.
    pub fn free_units(&self) -> usize {
        self.units.iter().filter(|held| held.is_none()).count()
    }

    /// Number of logged calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

/// In-memory array driver.
pub struct MockArrayDriver {
    state: Arc<Mutex<MockArrayState>>,
    sink: Arc<RecordingSink>,
}

impl MockArrayDriver {
    /// Mock with the hardware's unit pool.
    pub fn new() -> Self {
        Self::with_unit_pool(MAX_STIM_CHANNELS)
    }

    /// Mock with `n_units` stimulation units.
    pub fn with_unit_pool(n_units: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockArrayState::new(n_units))),
            sink: Arc::new(RecordingSink::new()),
        }
    }

    /// Mark `electrodes` as unreachable by any stimulation unit.
    pub fn with_unreachable(self, electrodes: impl IntoIterator<Item = ElectrodeId>) -> Self {
        self.state.lock().unreachable.extend(electrodes);
        self
    }

    /// Shared handle on the mock state.
    pub fn state(&self) -> Arc<Mutex<MockArrayState>> {
        Arc::clone(&self.state)
    }

    /// Second driver value over the same state and sink.
    pub fn clone_handle(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            sink: Arc::clone(&self.sink),
        }
    }

    /// Sink receiving the programs of every stimulator created by this driver.
    pub fn sink(&self) -> Arc<RecordingSink> {
        Arc::clone(&self.sink)
    }

    fn log(&self, call: MockCall) -> parking_lot::MutexGuard<'_, MockArrayState> {
        let mut state = self.state.lock();
        state.calls.push(call);
        state
    }
}

impl Default for MockArrayDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrayDriver for MockArrayDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn initialize(&mut self) -> Result<(), ArrayError> {
        let units = self.log(MockCall::Initialize).units.len();
        info!("Mock array initialized with {} stimulation units", units);
        Ok(())
    }

    fn send_core_settings(&mut self) -> Result<(), ArrayError> {
        self.log(MockCall::SendCoreSettings);
        Ok(())
    }

    fn offset(&mut self) -> Result<(), ArrayError> {
        self.log(MockCall::Offset);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ArrayError> {
        let mut state = self.log(MockCall::Reset);
        state.selected_electrodes.clear();
        state.stimulation_electrodes.clear();
        state.powered.clear();
        state.units.iter_mut().for_each(|held| *held = None);
        Ok(())
    }

    fn clear_selected_electrodes(&mut self) -> Result<(), ArrayError> {
        let mut state = self.log(MockCall::ClearSelectedElectrodes);
        state.selected_electrodes.clear();
        state.stimulation_electrodes.clear();
        Ok(())
    }

    fn select_electrodes(&mut self, electrodes: &[ElectrodeId]) -> Result<(), ArrayError> {
        let mut state = self.log(MockCall::SelectElectrodes(electrodes.len()));
        state.selected_electrodes.extend_from_slice(electrodes);
        Ok(())
    }

    fn select_stimulation_electrodes(
        &mut self,
        electrodes: &[ElectrodeId],
    ) -> Result<(), ArrayError> {
        let mut state = self.log(MockCall::SelectStimulationElectrodes(electrodes.len()));
        state.stimulation_electrodes.extend_from_slice(electrodes);
        Ok(())
    }

    fn route(&mut self) -> Result<(), ArrayError> {
        let state = self.log(MockCall::Route);
        debug!(
            "Mock routed {} recording and {} stimulation electrodes",
            state.selected_electrodes.len(),
            state.stimulation_electrodes.len()
        );
        Ok(())
    }

    fn download(&mut self) -> Result<(), ArrayError> {
        self.log(MockCall::Download);
        Ok(())
    }

    fn connect_electrode_to_stimulation(
        &mut self,
        electrode: ElectrodeId,
    ) -> Result<(), ArrayError> {
        let mut state = self.log(MockCall::Connect(electrode));
        if state.unreachable.contains(&electrode) || state.unit_of(electrode).is_some() {
            return Ok(());
        }
        // no free unit: the request is silently dropped, as on hardware
        if let Some(slot) = state.units.iter_mut().find(|held| held.is_none()) {
            *slot = Some(electrode);
        }
        Ok(())
    }

    fn query_stimulation_at_electrode(
        &mut self,
        electrode: ElectrodeId,
    ) -> Result<Option<UnitId>, ArrayError> {
        Ok(self.state.lock().unit_of(electrode))
    }

    fn disconnect_electrode_from_stimulation(
        &mut self,
        electrode: ElectrodeId,
    ) -> Result<(), ArrayError> {
        let mut state = self.log(MockCall::Disconnect(electrode));
        if let Some(unit) = state.unit_of(electrode) {
            state.units[unit.0 as usize] = None;
            state.powered.remove(&unit);
        }
        Ok(())
    }

    fn power_up_stimulation_unit(&mut self, unit: UnitId) -> Result<(), ArrayError> {
        let mut state = self.log(MockCall::PowerUp(unit));
        let held = state.units.get(unit.0 as usize).copied();
        match held {
            Some(Some(_)) => {
                state.powered.insert(unit);
                Ok(())
            }
            Some(None) => Err(ArrayError::CommunicationError(format!(
                "stimulation unit {unit} is not connected"
            ))),
            None => Err(ArrayError::CommunicationError(format!(
                "no stimulation unit {unit}"
            ))),
        }
    }

    fn power_down_stimulation_unit(&mut self, unit: UnitId) -> Result<(), ArrayError> {
        self.log(MockCall::PowerDown(unit)).powered.remove(&unit);
        Ok(())
    }

    fn load_routing_config(&mut self, path: &Path) -> Result<(), ArrayError> {
        let text = fs::read_to_string(path).map_err(|e| {
            ArrayError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        let routing: RoutingConfig = text.parse()?;
        let mut state = self.log(MockCall::LoadRoutingConfig(path.to_path_buf()));
        info!("Mock loaded {} routed channels from {}", routing.len(), path.display());
        state.routing = routing;
        Ok(())
    }

    fn routing_config(&self) -> Result<RoutingConfig, ArrayError> {
        Ok(self.state.lock().routing.clone())
    }

    fn create_stimulator(&self) -> Box<dyn Stimulator> {
        Box::new(SequenceStimulator::new(self.sink.clone()))
    }

    fn close(&mut self) -> Result<(), ArrayError> {
        self.log(MockCall::Close).closed = true;
        Ok(())
    }
}

/// Factory function to create a mock driver instance.
pub fn create_driver() -> Box<dyn ArrayDriver> {
    Box::new(MockArrayDriver::new())
}
