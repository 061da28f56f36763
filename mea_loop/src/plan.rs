//! Stimulation plans.
//!
//! - **Unified**: the configured channels are connected and powered once and
//!   share a single pulse stream program; every request replays it.
//! - **Independent**: each request carries channel targets, and every target
//!   gets its own connection and its own pulse stream program.

use crate::config::{StimTarget, StimulationMode, StimulationSection};
use crate::error::LoopError;
use mea_array::ElectrodeArrayController;
use mea_common::array::routing::RoutingConfig;
use mea_common::array::types::{ElectrodeId, UnitId};
use mea_common::stim::program::Stimulator;
use mea_stim::builders::{PulseStreamBuilder, StimulatorBuilder};
use tracing::{debug, info, warn};

/// Pulse shape shared by every program of a plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseShape {
    pub phase_us: f64,
    pub nb_pulses: u32,
}

impl PulseShape {
    fn builder(&self, amplitude_mv: f64, frequency_hz: f64) -> PulseStreamBuilder {
        PulseStreamBuilder::for_frequency(amplitude_mv, frequency_hz, self.phase_us, self.nb_pulses)
    }
}

/// Build a stimulator on `controller` holding the pulse stream of `target`.
pub fn target_stimulator(
    controller: &ElectrodeArrayController,
    shape: PulseShape,
    target: &StimTarget,
) -> Box<dyn Stimulator> {
    let mut stimulator = controller.create_stimulator();
    shape
        .builder(target.amplitude_mv, target.frequency_hz)
        .build(stimulator.as_mut());
    stimulator
}

/// Electrodes routed to `channels`, in order. Unrouted channels are skipped
/// with a warning.
fn electrodes_for(routing: &RoutingConfig, channels: &[u32]) -> Vec<ElectrodeId> {
    channels
        .iter()
        .filter_map(|&channel| {
            let electrode = routing.electrode_for_channel(channel);
            if electrode.is_none() {
                warn!("Channel {} is not routed to any electrode", channel);
            }
            electrode
        })
        .collect()
}

/// How stimulation requests are turned into programs.
pub enum StimulationPlan {
    Unified {
        stimulator: Box<dyn Stimulator>,
        units: Vec<UnitId>,
    },
    Independent {
        routing: RoutingConfig,
        shape: PulseShape,
    },
}

impl StimulationPlan {
    /// Plan for `section.mode`. Unified mode connects and powers its
    /// channels right away.
    pub fn from_config(
        controller: &mut ElectrodeArrayController,
        routing: &RoutingConfig,
        section: &StimulationSection,
    ) -> Result<Self, LoopError> {
        let shape = PulseShape {
            phase_us: section.pulse_phase_us,
            nb_pulses: section.nb_pulses,
        };
        match section.mode {
            StimulationMode::Unified => Self::unified(
                controller,
                routing,
                &section.channels,
                shape,
                section.amplitude_mv,
                section.frequency_hz,
            ),
            StimulationMode::Independent => Ok(Self::Independent {
                routing: routing.clone(),
                shape,
            }),
        }
    }

    /// Connect and power `channels`, and build the shared program.
    pub fn unified(
        controller: &mut ElectrodeArrayController,
        routing: &RoutingConfig,
        channels: &[u32],
        shape: PulseShape,
        amplitude_mv: f64,
        frequency_hz: f64,
    ) -> Result<Self, LoopError> {
        let electrodes = electrodes_for(routing, channels);
        let units = controller.connect_stimulation_channels(&electrodes)?;

        let mut stimulator = controller.create_stimulator();
        shape
            .builder(amplitude_mv, frequency_hz)
            .build(stimulator.as_mut());
        info!(
            "Unified stimulation on {} units at {} mV, {} Hz",
            units.len(),
            amplitude_mv,
            frequency_hz
        );
        Ok(Self::Unified { stimulator, units })
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Unified { .. } => "unified",
            Self::Independent { .. } => "independent",
        }
    }

    /// Deliver one request. Returns the number of programs sent.
    ///
    /// Unified plans ignore `targets`. Independent plans crop `targets` to
    /// the controller's stimulation channel limit and skip targets whose
    /// electrode gets no unit.
    pub fn trigger(
        &mut self,
        controller: &mut ElectrodeArrayController,
        targets: &[StimTarget],
    ) -> Result<usize, LoopError> {
        match self {
            Self::Unified { stimulator, .. } => {
                stimulator.stimulate()?;
                info!("Sent unified stimulation");
                Ok(1)
            }
            Self::Independent { routing, shape } => {
                let limit = controller.max_stim_channels();
                let targets = if targets.len() > limit {
                    warn!(
                        "Too many stimulation channels required ({}), cropped to {}",
                        targets.len(),
                        limit
                    );
                    &targets[..limit]
                } else {
                    targets
                };

                let mut sent = 0;
                for target in targets {
                    let Some(electrode) = routing.electrode_for_channel(target.channel) else {
                        warn!("Channel {} is not routed to any electrode", target.channel);
                        continue;
                    };
                    let units = controller.connect_stimulation_channels(&[electrode])?;
                    if units.is_empty() {
                        continue;
                    }
                    let mut stimulator = target_stimulator(controller, *shape, target);
                    stimulator.stimulate()?;
                    debug!(
                        "Stimulated channel {} (electrode {}) at {} mV, {} Hz",
                        target.channel, electrode, target.amplitude_mv, target.frequency_hz
                    );
                    sent += 1;
                }
                info!("Sent independent stimulation on {} channels", sent);
                Ok(sent)
            }
        }
    }

    /// Units powered for a unified plan.
    pub fn units(&self) -> &[UnitId] {
        match self {
            Self::Unified { units, .. } => units,
            Self::Independent { .. } => &[],
        }
    }
}
