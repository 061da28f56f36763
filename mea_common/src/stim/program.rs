//! Stimulation program and the `Stimulator` trait.
//!
//! - `StimulationProgram` - ordered DAC steps and event markers
//! - `Stimulator` - interface builders write to, replayed by `stimulate()`
//! - `SequenceSink` - hardware endpoint that accepts a finished program

use super::dac::{DacCode, voltage_to_code};
use crate::array::driver::ArrayError;

/// One DAC step: hold `code` for `n_samples` samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramStep {
    /// DAC code to output.
    pub code: DacCode,
    /// Duration in samples.
    pub n_samples: u32,
}

/// Trigger marker exported alongside the recording. Does not affect output.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFlag {
    /// Monotonic id, starting at 1 for each program.
    pub id: u32,
    /// Nominal amplitude of the stimulation this flag marks (mV).
    pub amplitude_mv: f64,
    /// Free-form phase tag (period, duration, ...).
    pub phase: f64,
}

impl EventFlag {
    /// Human readable label stored with the trigger.
    pub fn label(&self) -> String {
        format!("amplitude {} phase {}", self.amplitude_mv, self.phase)
    }
}

/// Entry of a stimulation program.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramItem {
    /// Voltage step.
    Step(ProgramStep),
    /// Event marker.
    Event(EventFlag),
}

/// Ordered stimulation program.
#[derive(Debug, Clone, PartialEq)]
pub struct StimulationProgram {
    items: Vec<ProgramItem>,
    next_event_id: u32,
}

impl StimulationProgram {
    /// First event id of every new program.
    pub const FIRST_EVENT_ID: u32 = 1;

    /// Create an empty program.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            next_event_id: Self::FIRST_EVENT_ID,
        }
    }

    /// Append a voltage step, converting `mv` to a DAC code.
    pub fn push_step(&mut self, mv: f64, n_samples: u32) {
        self.items.push(ProgramItem::Step(ProgramStep {
            code: voltage_to_code(mv),
            n_samples,
        }));
    }

    /// Append an event marker and return its id.
    pub fn push_event(&mut self, amplitude_mv: f64, phase: f64) -> u32 {
        let id = self.next_event_id;
        self.next_event_id += 1;
        self.items.push(ProgramItem::Event(EventFlag {
            id,
            amplitude_mv,
            phase,
        }));
        id
    }

    /// All items in insertion order.
    pub fn items(&self) -> &[ProgramItem] {
        &self.items
    }

    /// Voltage steps in order.
    pub fn steps(&self) -> impl Iterator<Item = &ProgramStep> {
        self.items.iter().filter_map(|item| match item {
            ProgramItem::Step(step) => Some(step),
            ProgramItem::Event(_) => None,
        })
    }

    /// Event markers in order.
    pub fn events(&self) -> impl Iterator<Item = &EventFlag> {
        self.items.iter().filter_map(|item| match item {
            ProgramItem::Event(event) => Some(event),
            ProgramItem::Step(_) => None,
        })
    }

    /// Number of voltage steps.
    pub fn step_count(&self) -> usize {
        self.steps().count()
    }

    /// Number of event markers.
    pub fn event_count(&self) -> usize {
        self.events().count()
    }

    /// Total program duration in samples.
    pub fn total_samples(&self) -> u64 {
        self.steps().map(|s| s.n_samples as u64).sum()
    }

    /// True if nothing was added.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for StimulationProgram {
    fn default() -> Self {
        Self::new()
    }
}

/// Destination for finished programs (the stimulation sequencer).
///
/// `send` enqueues the program; it does not wait for the hardware to play it.
pub trait SequenceSink: Send + Sync {
    /// Enqueue `program` for playback.
    fn send(&self, program: &StimulationProgram) -> Result<(), ArrayError>;
}

/// Accumulates a stimulation program and replays it on demand.
///
/// Implementations: hardware sequencer (`mea_stim::SequenceStimulator`) and a
/// no-op (`mea_stim::EmptyStimulator`).
pub trait Stimulator: Send {
    /// Append a step holding `mv` for `n_samples` samples.
    fn add(&mut self, mv: f64, n_samples: u32);

    /// Append an event marker used for trigger export.
    fn add_event_flag(&mut self, mv: f64, phase: f64);

    /// Replay the accumulated program.
    fn stimulate(&mut self) -> Result<(), ArrayError>;

    /// The accumulated program, if this implementation keeps one.
    fn program(&self) -> Option<&StimulationProgram> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_start_at_one_and_increment() {
        let mut program = StimulationProgram::new();
        assert_eq!(program.push_event(10.0, 0.5), 1);
        program.push_step(10.0, 4);
        assert_eq!(program.push_event(10.0, 0.5), 2);

        let ids: Vec<u32> = program.events().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn fresh_program_restarts_event_ids() {
        let mut first = StimulationProgram::new();
        first.push_event(1.0, 1.0);
        first.push_event(1.0, 1.0);
        let mut second = StimulationProgram::new();
        assert_eq!(second.push_event(1.0, 1.0), 1);
    }

    #[test]
    fn steps_convert_to_codes_and_sum_durations() {
        let mut program = StimulationProgram::new();
        program.push_step(0.0, 8);
        program.push_step(29.0, 12);

        let codes: Vec<DacCode> = program.steps().map(|s| s.code).collect();
        assert_eq!(codes, vec![512, 502]);
        assert_eq!(program.total_samples(), 20);
        assert_eq!(program.step_count(), 2);
        assert_eq!(program.event_count(), 0);
    }

    #[test]
    fn event_label_matches_trigger_format() {
        let flag = EventFlag {
            id: 3,
            amplitude_mv: 100.0,
            phase: 400.0,
        };
        assert_eq!(flag.label(), "amplitude 100 phase 400");
    }
}
