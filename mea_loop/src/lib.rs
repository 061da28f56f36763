//! # MEA Loop
//!
//! Closed-loop experiment runner: samples the acquisition stream, tracks
//! activity and stimulates the electrode array on a schedule.
//!
//! # Architecture
//!
//! ```text
//!            experiment.toml
//!                  │
//!          ┌───────▼────────┐
//!          │     Runner     │  setup_array · StimulationPlan
//!          └───┬────────┬───┘
//!              │        │
//!   ┌──────────▼──┐  ┌──▼──────────────────────────┐
//!   │ SampleStream│  │ ElectrodeArrayController     │
//!   │ debug|server│  │ (Arc<Mutex<..>>, one driver) │
//!   └──────┬──────┘  └──▲──────────────────────────┘
//!          │            │
//!   Ingestion ─► Analysis     Trigger ─► Stimulation
//! ```
//!
//! # Module Structure
//!
//! - [`config`] - `ExperimentConfig` and its sections
//! - [`error`] - `LoopError`
//! - [`pipeline`] - Bounded queues and the four worker tasks
//! - [`plan`] - Unified and independent stimulation plans
//! - [`runner`] - Array setup and the run lifecycle

pub mod config;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod runner;

pub use crate::config::{ExperimentConfig, StimTarget, StimulationMode};
pub use crate::error::LoopError;
pub use crate::pipeline::{Backpressure, bounded_queue};
pub use crate::plan::{PulseShape, StimulationPlan};
pub use crate::runner::{RunReport, Runner, build_array_config, setup_array};
