//! End-to-end runs on the mock array and the debug stream.

use mea_array::DriverRegistry;
use mea_common::config::{ConfigError, ConfigLoader};
use mea_loop::{ExperimentConfig, LoopError, Runner, StimulationMode};
use mea_stream::DebugSampleStream;
use std::io::Write;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

const BASE: &str = r#"
[shared]
service_name = "mea-loop-test"

[array]
driver = "mock"
seed = 3

[roles]
motor_channels = [0, 1, 2, 3]
sensor_channels = [100, 101, 102]
pattern_channels = [[200, 201], [300]]

[stream]
n_samples = 20
queue_capacity = 2
realtime = false
"#;

fn load(extra: &str) -> Result<ExperimentConfig, ConfigError> {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}\n{}", BASE, extra).unwrap();
    file.flush().unwrap();
    ExperimentConfig::load_validated(file.path())
}

fn runner(config: ExperimentConfig) -> Runner {
    Runner::new(config, DriverRegistry::with_builtin())
        .with_sample_stream(Box::new(DebugSampleStream::with_seed(11).realtime(false)))
}

#[test]
fn unified_run_replays_one_program() {
    let config = load(
        r#"
runtime_s = 1

[stimulation]
channels = [0, 1]
amplitude_mv = 150.0
frequency_hz = 10.0
trigger_interval_ms = 100
"#,
    )
    .unwrap();
    assert_eq!(config.stimulation.mode, StimulationMode::Unified);

    let report = runner(config).run().unwrap();
    assert!(report.triggers >= 1);
    assert!(report.programs >= 1);
    assert!(report.programs <= report.triggers);
    assert!(report.ingestion.batches >= 1);
    assert!(report.activity.batches >= 1);
    assert_eq!(report.activity.samples, report.activity.batches * 20);
}

#[test]
fn independent_run_sends_a_program_per_target() {
    let config = load(
        r#"
runtime_s = 1

[stimulation]
mode = "independent"
amplitude_mv = 100.0
frequency_hz = 10.0
trigger_interval_ms = 200
targets = [
    { channel = 5, amplitude_mv = 80.0, frequency_hz = 20.0 },
    { channel = 6, amplitude_mv = 40.0, frequency_hz = 5.0 },
]
"#,
    )
    .unwrap();

    let report = runner(config).run().unwrap();
    assert!(report.triggers >= 1);
    assert!(report.programs >= 2);
    assert_eq!(report.programs % 2, 0);
}

#[test]
fn clearing_the_flag_stops_an_unbounded_run() {
    let config = load(
        r#"
[stimulation]
channels = [0]
amplitude_mv = 150.0
frequency_hz = 10.0
"#,
    )
    .unwrap();
    assert!(config.runtime_s.is_none());

    let mut runner = runner(config);
    let running = runner.running_flag();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        running.store(false, Ordering::SeqCst);
    });

    let start = Instant::now();
    runner.run().unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
    stopper.join().unwrap();
}

#[test]
fn unknown_driver_aborts_setup() {
    let mut config = load(
        r#"
runtime_s = 1

[stimulation]
amplitude_mv = 150.0
frequency_hz = 10.0
"#,
    )
    .unwrap();
    config.array.driver = "maxone".to_string();

    assert!(matches!(runner(config).run(), Err(LoopError::Array(_))));
}

#[test]
fn role_channel_outside_the_map_aborts_setup() {
    let mut config = load(
        r#"
runtime_s = 1

[stimulation]
amplitude_mv = 150.0
frequency_hz = 10.0
"#,
    )
    .unwrap();
    config.roles.sensor_channels = vec![5000];

    assert!(matches!(runner(config).run(), Err(LoopError::Map(_))));
}

#[cfg(not(feature = "zmq-transport"))]
#[test]
fn server_source_needs_the_transport_feature() {
    let mut config = load(
        r#"
runtime_s = 1

[stimulation]
amplitude_mv = 150.0
frequency_hz = 10.0
"#,
    )
    .unwrap();
    config.stream.source = mea_loop::config::StreamSource::Server;

    let mut runner = Runner::new(config, DriverRegistry::with_builtin());
    assert!(matches!(runner.run(), Err(LoopError::Unsupported(_))));
}

#[test]
fn invalid_values_are_rejected_on_load() {
    let err = load(
        r#"
[stimulation]
amplitude_mv = 150.0
frequency_hz = 0.0
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}
