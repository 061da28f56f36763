//! # MEA Stimulation
//!
//! Stimulator implementations and the waveform builders that fill them.
//!
//! # Module Structure
//!
//! - [`stimulator`] - `SequenceStimulator`, `EmptyStimulator`, `RecordingSink`
//! - [`samples`] - Time ↔ sample count conversions at the hardware rate
//! - [`builders`] - Pulse stream, square, sine and noise waveform builders
//!
//! # Example
//!
//! ```rust
//! use mea_stim::builders::{PulseStreamBuilder, StimulatorBuilder};
//! use mea_stim::stimulator::{RecordingSink, SequenceStimulator};
//! use mea_common::stim::program::Stimulator;
//! use std::sync::Arc;
//!
//! let sink = Arc::new(RecordingSink::new());
//! let mut stimulator = SequenceStimulator::new(sink.clone());
//! PulseStreamBuilder::default().build(&mut stimulator);
//! stimulator.stimulate().unwrap();
//! assert_eq!(sink.sent().len(), 1);
//! ```

#![deny(missing_docs)]

pub mod builders;
pub mod samples;
pub mod stimulator;

pub use crate::builders::StimulatorBuilder;
pub use crate::stimulator::{EmptyStimulator, RecordingSink, SequenceStimulator};
