//! Stimulator implementations.
//!
//! - `SequenceStimulator` accumulates a `StimulationProgram` and hands it to a
//!   `SequenceSink` on every `stimulate()`.
//! - `EmptyStimulator` discards everything (development without hardware).
//! - `RecordingSink` is a sink that keeps every program it was sent.

use mea_common::array::driver::ArrayError;
use mea_common::stim::program::{SequenceSink, StimulationProgram, Stimulator};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Stimulator bound to a hardware sequencer.
///
/// Event ids are per instance and restart at 1 on construction.
pub struct SequenceStimulator {
    program: StimulationProgram,
    sink: Arc<dyn SequenceSink>,
}

impl SequenceStimulator {
    /// Create an empty stimulator replaying through `sink`.
    pub fn new(sink: Arc<dyn SequenceSink>) -> Self {
        Self {
            program: StimulationProgram::new(),
            sink,
        }
    }
}

impl Stimulator for SequenceStimulator {
    fn add(&mut self, mv: f64, n_samples: u32) {
        self.program.push_step(mv, n_samples);
    }

    fn add_event_flag(&mut self, mv: f64, phase: f64) {
        self.program.push_event(mv, phase);
    }

    fn stimulate(&mut self) -> Result<(), ArrayError> {
        debug!(
            "Sending stimulation program: {} steps, {} events, {} samples",
            self.program.step_count(),
            self.program.event_count(),
            self.program.total_samples()
        );
        self.sink.send(&self.program)
    }

    fn program(&self) -> Option<&StimulationProgram> {
        Some(&self.program)
    }
}

/// Stimulator that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyStimulator;

impl Stimulator for EmptyStimulator {
    fn add(&mut self, _mv: f64, _n_samples: u32) {}

    fn add_event_flag(&mut self, _mv: f64, _phase: f64) {}

    fn stimulate(&mut self) -> Result<(), ArrayError> {
        Ok(())
    }
}

/// Sink that records every program it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<StimulationProgram>>,
}

impl RecordingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of programs sent so far, oldest first.
    pub fn sent(&self) -> Vec<StimulationProgram> {
        self.sent.lock().clone()
    }

    /// Number of programs sent so far.
    pub fn send_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl SequenceSink for RecordingSink {
    fn send(&self, program: &StimulationProgram) -> Result<(), ArrayError> {
        self.sent.lock().push(program.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_stimulator_replays_same_program() {
        let sink = Arc::new(RecordingSink::new());
        let mut stim = SequenceStimulator::new(sink.clone());
        stim.add_event_flag(50.0, 1.0);
        stim.add(50.0, 10);
        stim.add(-50.0, 10);

        stim.stimulate().unwrap();
        stim.stimulate().unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
        assert_eq!(sent[0].step_count(), 2);
        assert_eq!(sent[0].event_count(), 1);
    }

    #[test]
    fn empty_stimulator_keeps_no_program() {
        let mut stim = EmptyStimulator;
        stim.add(10.0, 5);
        stim.add_event_flag(10.0, 1.0);
        assert!(stim.program().is_none());
        assert!(stim.stimulate().is_ok());
    }
}
