//! Experiment configuration.
//!
//! One TOML file describes a run:
//!
//! ```toml
//! runtime_s = 60
//!
//! [shared]
//! service_name = "mea-loop"
//!
//! [array]
//! driver = "mock"
//!
//! [roles]
//! motor_channels = [0, 1, 2]
//! sensor_channels = [10, 11]
//! pattern_channels = [[20, 21], [30]]
//!
//! [stimulation]
//! channels = [0, 1]
//! amplitude_mv = 150.0
//! frequency_hz = 10.0
//!
//! [stream]
//! n_samples = 200
//! ```

use crate::pipeline::Backpressure;
use mea_array::MotorBounds;
use mea_common::config::{ConfigError, SharedConfig, Validate};
use mea_common::consts::{DEFAULT_STREAM_TIMEOUT_MS, MAX_STIM_CHANNELS};
use mea_stream::SpikeLayout;
use serde::Deserialize;
use std::path::PathBuf;

/// Complete configuration of one experiment run.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentConfig {
    pub shared: SharedConfig,

    /// Stop after this many seconds; run until interrupted when absent.
    #[serde(default)]
    pub runtime_s: Option<u64>,

    #[serde(default)]
    pub array: ArraySection,

    #[serde(default)]
    pub roles: RolesSection,

    pub stimulation: StimulationSection,

    #[serde(default)]
    pub stream: StreamSection,

    #[serde(default)]
    pub recording: Option<RecordingSection>,
}

/// `[array]`: driver selection and hardware limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArraySection {
    /// Registered driver name.
    pub driver: String,
    /// Spacing of the sparse electrode map.
    pub sparse_interval: usize,
    /// Routing file loaded during initialization.
    pub routing_config: Option<PathBuf>,
    /// Stimulation electrodes per request.
    pub max_stim_channels: usize,
    /// Seed for random unit selection.
    pub seed: Option<u64>,
}

impl Default for ArraySection {
    fn default() -> Self {
        Self {
            driver: "mock".to_string(),
            sparse_interval: 5,
            routing_config: None,
            max_stim_channels: MAX_STIM_CHANNELS,
            seed: None,
        }
    }
}

/// `[roles]`: map channels of each role.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RolesSection {
    pub motor_channels: Vec<usize>,
    /// Rectangle used instead of `motor_channels`.
    pub motor_bounds: Option<MotorBounds>,
    pub sensor_channels: Vec<usize>,
    pub pattern_channels: Vec<Vec<usize>>,
}

/// How a stimulation request reaches the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulationMode {
    /// One program on every stimulation channel, set up once.
    #[default]
    Unified,
    /// One program per channel target, built per request.
    Independent,
}

/// Per-channel stimulation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StimTarget {
    /// Routed recording channel.
    pub channel: u32,
    pub amplitude_mv: f64,
    pub frequency_hz: f64,
}

/// `[stimulation]`: pulse stream parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct StimulationSection {
    /// Routed channels stimulated in unified mode.
    #[serde(default)]
    pub channels: Vec<u32>,
    pub amplitude_mv: f64,
    pub frequency_hz: f64,
    #[serde(default = "default_pulse_phase_us")]
    pub pulse_phase_us: f64,
    #[serde(default = "default_nb_pulses")]
    pub nb_pulses: u32,
    #[serde(default)]
    pub mode: StimulationMode,
    /// Explicit per-channel parameters; derived from `channels` when empty.
    #[serde(default)]
    pub targets: Vec<StimTarget>,
    /// Period of the pattern trigger.
    #[serde(default = "default_trigger_interval_ms")]
    pub trigger_interval_ms: u64,
}

fn default_pulse_phase_us() -> f64 {
    200.0
}

fn default_nb_pulses() -> u32 {
    4
}

fn default_trigger_interval_ms() -> u64 {
    500
}

impl StimulationSection {
    /// Channel targets of a request: the explicit list, or every channel at
    /// the section-wide amplitude and frequency.
    pub fn targets(&self) -> Vec<StimTarget> {
        if !self.targets.is_empty() {
            return self.targets.clone();
        }
        self.channels
            .iter()
            .map(|&channel| StimTarget {
                channel,
                amplitude_mv: self.amplitude_mv,
                frequency_hz: self.frequency_hz,
            })
            .collect()
    }
}

/// Where samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamSource {
    /// Random data, no server needed.
    #[default]
    Debug,
    /// Acquisition server over ZeroMQ.
    Server,
}

/// Spike record layout selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpikeLayoutSetting {
    New,
    Old,
    /// From the `firmware` identity.
    #[default]
    Auto,
}

/// `[stream]`: sample ingestion.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamSection {
    pub source: StreamSource,
    pub hostname: String,
    pub timeout_ms: u32,
    /// Use the filtered instead of the raw stream.
    pub filtered: bool,
    pub spike_layout: SpikeLayoutSetting,
    /// Firmware identity for `spike_layout = "auto"`.
    pub firmware: Option<String>,
    /// Samples per batch.
    pub n_samples: usize,
    /// Sampled channels; every sampling channel of the roles when absent.
    pub channels: Option<Vec<usize>>,
    /// Batches held between ingestion and analysis.
    pub queue_capacity: usize,
    pub backpressure: Backpressure,
    pub max_sync_polls: Option<usize>,
    /// Pace the debug source at the hardware rate.
    pub realtime: bool,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            source: StreamSource::Debug,
            hostname: "localhost".to_string(),
            timeout_ms: DEFAULT_STREAM_TIMEOUT_MS,
            filtered: false,
            spike_layout: SpikeLayoutSetting::Auto,
            firmware: None,
            n_samples: 200,
            channels: None,
            queue_capacity: 16,
            backpressure: Backpressure::DropOldest,
            max_sync_polls: None,
            realtime: true,
        }
    }
}

impl StreamSection {
    pub fn spike_layout(&self) -> SpikeLayout {
        match self.spike_layout {
            SpikeLayoutSetting::New => SpikeLayout::New,
            SpikeLayoutSetting::Old => SpikeLayout::Old,
            SpikeLayoutSetting::Auto => SpikeLayout::detect(self.firmware.as_deref()),
        }
    }
}

/// `[recording]`: file started for the duration of the run.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordingSection {
    pub path: PathBuf,
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

fn check_frequency(what: &str, frequency_hz: f64) -> Result<(), ConfigError> {
    if frequency_hz.is_finite() && frequency_hz > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{what} frequency must be > 0, got {frequency_hz}")))
    }
}

impl Validate for ExperimentConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.runtime_s == Some(0) {
            return Err(invalid("runtime_s must be > 0"));
        }

        if self.array.driver.trim().is_empty() {
            return Err(invalid("array.driver cannot be empty"));
        }
        if self.array.sparse_interval == 0 {
            return Err(invalid("array.sparse_interval must be > 0"));
        }
        if self.array.max_stim_channels == 0 {
            return Err(invalid("array.max_stim_channels must be > 0"));
        }

        if self.roles.motor_bounds.is_some() && !self.roles.motor_channels.is_empty() {
            return Err(invalid(
                "roles.motor_bounds and roles.motor_channels are exclusive",
            ));
        }

        let stim = &self.stimulation;
        check_frequency("stimulation", stim.frequency_hz)?;
        for target in &stim.targets {
            check_frequency(&format!("channel {}", target.channel), target.frequency_hz)?;
        }
        if !(stim.pulse_phase_us.is_finite() && stim.pulse_phase_us > 0.0) {
            return Err(invalid("stimulation.pulse_phase_us must be > 0"));
        }
        if stim.nb_pulses == 0 {
            return Err(invalid("stimulation.nb_pulses must be > 0"));
        }
        if stim.trigger_interval_ms == 0 {
            return Err(invalid("stimulation.trigger_interval_ms must be > 0"));
        }

        if self.stream.n_samples == 0 {
            return Err(invalid("stream.n_samples must be > 0"));
        }
        if self.stream.queue_capacity == 0 {
            return Err(invalid("stream.queue_capacity must be > 0"));
        }
        if self.stream.max_sync_polls == Some(0) {
            return Err(invalid("stream.max_sync_polls must be > 0"));
        }
        Ok(())
    }
}
