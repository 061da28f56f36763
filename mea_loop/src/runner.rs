//! Experiment setup and the closed-loop run.

use crate::config::{ExperimentConfig, RolesSection, StreamSection, StreamSource};
use crate::error::LoopError;
use crate::pipeline::{
    ActivitySummary, AnalysisTask, Backpressure, IngestionStats, IngestionTask, StimulationTask,
    TriggerTask, bounded_queue,
};
use crate::plan::StimulationPlan;
use mea_array::{
    BoundsMotor, ChannelMotor, ChannelPatterns, ChannelSensor, DriverRegistry,
    ElectrodeArrayConfig, ElectrodeArrayController, ElectrodeMapFactory, Motor,
    SparseElectrodeMapFactory,
};
use mea_common::array::routing::RoutingConfig;
use mea_common::array::saving::{EmptyRecordingSaver, RecordingSaver};
use mea_stream::{DebugSampleStream, SampleStream};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Capacity of the stimulation request queue.
const STIM_QUEUE_CAPACITY: usize = 4;

/// Resolve the roles on the sparse map and build the array configuration.
pub fn build_array_config(
    roles: &RolesSection,
    sparse_interval: usize,
) -> Result<ElectrodeArrayConfig, LoopError> {
    let map = SparseElectrodeMapFactory::new(sparse_interval).create()?;

    let motor: Box<dyn Motor> = match roles.motor_bounds {
        Some(bounds) => Box::new(BoundsMotor::new(&map, bounds)),
        None => Box::new(ChannelMotor::new(&map, &roles.motor_channels)?),
    };
    let sensor = ChannelSensor::new(&map, &roles.sensor_channels)?;
    let patterns = ChannelPatterns::new(&map, &roles.pattern_channels)?;

    Ok(ElectrodeArrayConfig::create(&patterns, motor.as_ref(), &sensor)?)
}

/// Controller and routing after setup.
pub struct ArraySetup {
    pub controller: ElectrodeArrayController,
    pub routing: RoutingConfig,
}

/// Create the driver, initialize the array, route the roles and connect the
/// role stimulation electrodes.
pub fn setup_array(
    config: &ExperimentConfig,
    registry: &DriverRegistry,
) -> Result<ArraySetup, LoopError> {
    let driver = registry.create_driver(&config.array.driver)?;
    info!("Using array driver '{}' v{}", driver.name(), driver.version());

    let array_config = build_array_config(&config.roles, config.array.sparse_interval)?;
    let mut controller = ElectrodeArrayController::new(driver, array_config)
        .with_max_stim_channels(config.array.max_stim_channels);
    if let Some(seed) = config.array.seed {
        controller = controller.with_seed(seed);
    }

    let routing = controller.initialize(config.array.routing_config.as_deref())?;
    controller.route_electrodes()?;
    controller.download()?;
    controller.prepare_sensor_stimulation_electrodes()?;
    controller.prepare_pattern_stimulation_electrodes()?;

    Ok(ArraySetup {
        controller,
        routing,
    })
}

/// Sample stream selected by `[stream]`.
pub fn create_sample_stream(stream: &StreamSection) -> Result<Box<dyn SampleStream>, LoopError> {
    match stream.source {
        StreamSource::Debug => Ok(Box::new(DebugSampleStream::new().realtime(stream.realtime))),
        StreamSource::Server => server_sample_stream(stream),
    }
}

#[cfg(feature = "zmq-transport")]
fn server_sample_stream(stream: &StreamSection) -> Result<Box<dyn SampleStream>, LoopError> {
    use mea_stream::{ServerSampleStream, StreamDecoder, ZmqSubTransport};

    let transport = ZmqSubTransport::new(&stream.hostname, stream.filtered, stream.timeout_ms);
    let mut decoder = StreamDecoder::new(transport, stream.spike_layout());
    if let Some(polls) = stream.max_sync_polls {
        decoder = decoder.with_max_sync_polls(polls);
    }
    Ok(Box::new(ServerSampleStream::new(decoder)))
}

#[cfg(not(feature = "zmq-transport"))]
fn server_sample_stream(_stream: &StreamSection) -> Result<Box<dyn SampleStream>, LoopError> {
    Err(LoopError::Unsupported(
        "stream.source = \"server\" needs the zmq-transport feature".to_string(),
    ))
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub ingestion: IngestionStats,
    pub activity: ActivitySummary,
    pub triggers: u64,
    pub programs: u64,
}

/// Runs one experiment.
pub struct Runner {
    config: ExperimentConfig,
    registry: DriverRegistry,
    saver: Box<dyn RecordingSaver>,
    sample_stream: Option<Box<dyn SampleStream>>,
    running: Arc<AtomicBool>,
}

impl Runner {
    pub fn new(config: ExperimentConfig, registry: DriverRegistry) -> Self {
        Self {
            config,
            registry,
            saver: Box::new(EmptyRecordingSaver::new()),
            sample_stream: None,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Record through `saver` when `[recording]` is configured.
    pub fn with_saver(mut self, saver: Box<dyn RecordingSaver>) -> Self {
        self.saver = saver;
        self
    }

    /// Use `stream` instead of the one `[stream]` selects.
    pub fn with_sample_stream(mut self, stream: Box<dyn SampleStream>) -> Self {
        self.sample_stream = Some(stream);
        self
    }

    /// Cleared to stop the run.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Set up the array, run every task until the runtime elapses, the flag
    /// is cleared or a task fails, then shut everything down.
    pub fn run(&mut self) -> Result<RunReport, LoopError> {
        let ArraySetup {
            mut controller,
            routing,
        } = setup_array(&self.config, &self.registry)?;

        let plan = match StimulationPlan::from_config(&mut controller, &routing, &self.config.stimulation) {
            Ok(plan) => plan,
            Err(e) => {
                close_controller(&mut controller);
                return Err(e);
            }
        };
        let channels = self
            .config
            .stream
            .channels
            .clone()
            .unwrap_or_else(|| controller.config().sampling_channels().collect());
        let stream = match self.sample_stream.take() {
            Some(stream) => stream,
            None => match create_sample_stream(&self.config.stream) {
                Ok(stream) => stream,
                Err(e) => {
                    close_controller(&mut controller);
                    return Err(e);
                }
            },
        };
        let controller = Arc::new(Mutex::new(controller));

        if let Some(recording) = &self.config.recording {
            if let Err(e) = self.saver.start(&recording.path) {
                close_controller(&mut controller.lock());
                return Err(e.into());
            }
        }

        let result = self.run_tasks(Arc::clone(&controller), plan, stream, channels);

        if self.config.recording.is_some() {
            if let Err(e) = self.saver.stop() {
                warn!("Failed to stop recording: {}", e);
            }
        }
        close_controller(&mut controller.lock());
        result
    }

    fn run_tasks(
        &self,
        controller: Arc<Mutex<ElectrodeArrayController>>,
        plan: StimulationPlan,
        stream: Box<dyn SampleStream>,
        channels: Vec<usize>,
    ) -> Result<RunReport, LoopError> {
        let stream_config = &self.config.stream;
        let running = &self.running;

        let (batch_tx, batch_rx) = bounded_queue(
            "samples",
            stream_config.queue_capacity,
            stream_config.backpressure,
        );
        let (stim_tx, stim_rx) =
            bounded_queue("stimulation", STIM_QUEUE_CAPACITY, Backpressure::DropOldest);

        let spawned = (|| {
            let analysis = AnalysisTask::spawn(batch_rx, Arc::clone(running))?;
            let stimulation =
                StimulationTask::spawn(controller, plan, stim_rx, Arc::clone(running))?;
            let ingestion = IngestionTask::spawn(
                stream,
                stream_config.n_samples,
                channels,
                batch_tx,
                Arc::clone(running),
            )?;
            let trigger = TriggerTask::spawn(
                self.config.stimulation.targets(),
                Duration::from_millis(self.config.stimulation.trigger_interval_ms),
                stim_tx,
                Arc::clone(running),
            )?;
            Ok::<_, LoopError>((analysis, stimulation, ingestion, trigger))
        })();
        // tasks already started wind down on the cleared flag
        let (analysis, stimulation, ingestion, trigger) = match spawned {
            Ok(tasks) => tasks,
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        info!("Start experiment");

        let deadline = self
            .config
            .runtime_s
            .map(|s| Instant::now() + Duration::from_secs(s));
        while running.load(Ordering::SeqCst) {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!("Runtime elapsed");
                break;
            }
            if ingestion.is_finished()
                || analysis.is_finished()
                || stimulation.is_finished()
                || trigger.is_finished()
            {
                warn!("A task ended early, stopping experiment");
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        running.store(false, Ordering::SeqCst);
        info!("Stop experiment");

        let triggers = trigger.join();
        let ingestion = ingestion.join();
        let activity = analysis.join();
        let programs = stimulation.join();

        Ok(RunReport {
            ingestion: ingestion?,
            activity: activity?,
            triggers: triggers?,
            programs: programs?,
        })
    }
}

fn close_controller(controller: &mut ElectrodeArrayController) {
    if let Err(e) = controller.close() {
        error!("Failed to close electrode array: {}", e);
    }
}
