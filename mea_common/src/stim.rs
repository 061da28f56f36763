//! Stimulation program model.
//!
//! A stimulation program is an ordered list of DAC steps and event markers.
//! Builders append to a [`program::Stimulator`]; drivers replay the finished
//! program through a [`program::SequenceSink`].

pub mod dac;
pub mod program;
