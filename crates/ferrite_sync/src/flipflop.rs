//! Single-bit edge-triggered D flip-flop.

use crate::edge::{EdgeDetector, EdgeTrigger, SyncControl};
use ferrite_common::Logic;
use serde::{Deserialize, Serialize};

/// One sample of a flip-flop's input pins.
#[derive(Clone, Copy, Debug)]
pub struct FlipFlopInputs {
    /// Data input, passed through on the trigger edge.
    pub d: Logic,
    /// Clock input.
    pub clock: Logic,
    /// Asynchronous preset (forces Q to `True`).
    pub preset: Logic,
    /// Asynchronous clear (forces Q to `False`).
    pub clear: Logic,
}

/// The flip-flop's output pins after a sample.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FlipFlopOutputs {
    /// The latched state.
    pub q: Logic,
    /// Complement of the latched state.
    pub nq: Logic,
}

/// An edge-triggered D flip-flop with asynchronous preset and clear.
///
/// Asserting preset and clear together is the invalid state: both outputs
/// read `True`, the classic inconsistent latch pattern, until one control is
/// released.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlipFlop {
    detector: EdgeDetector,
    q: Logic,
    invalid: bool,
}

impl FlipFlop {
    /// Creates a flip-flop latched to `False`.
    pub fn new(trigger: EdgeTrigger) -> Self {
        Self {
            detector: EdgeDetector::new(trigger),
            q: Logic::False,
            invalid: false,
        }
    }

    /// Directly overwrites the latched state, used when restoring a saved
    /// circuit or wiring up composite machines.
    pub fn load(&mut self, value: Logic) {
        self.q = value.definite();
        self.invalid = false;
    }

    /// Returns the latched state.
    pub fn q(&self) -> Logic {
        self.q
    }

    /// Returns `true` while preset and clear were last asserted together.
    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// Samples the inputs and applies one transition.
    pub fn sample(&mut self, inputs: &FlipFlopInputs) -> FlipFlopOutputs {
        let edge = self.detector.sample(inputs.clock);
        match SyncControl::resolve(inputs.preset, inputs.clear, edge) {
            SyncControl::Invalid => self.invalid = true,
            SyncControl::Preset => {
                self.invalid = false;
                self.q = Logic::True;
            }
            SyncControl::Clear => {
                self.invalid = false;
                self.q = Logic::False;
            }
            SyncControl::Edge => {
                self.invalid = false;
                // An undriven D latches as Unknown, never as a phantom level.
                self.q = inputs.d.definite();
            }
            SyncControl::Hold => self.invalid = false,
        }
        self.outputs()
    }

    /// Returns the current output pins without sampling.
    pub fn outputs(&self) -> FlipFlopOutputs {
        if self.invalid {
            FlipFlopOutputs {
                q: Logic::True,
                nq: Logic::True,
            }
        } else {
            FlipFlopOutputs {
                q: self.q,
                nq: !self.q,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_common::Logic::*;

    fn inputs(d: Logic, clock: Logic) -> FlipFlopInputs {
        FlipFlopInputs {
            d,
            clock,
            preset: False,
            clear: False,
        }
    }

    #[test]
    fn latches_on_rising_edge() {
        let mut ff = FlipFlop::new(EdgeTrigger::Rising);
        ff.sample(&inputs(True, False));
        assert_eq!(ff.q(), False);
        let out = ff.sample(&inputs(True, True));
        assert_eq!(out.q, True);
        assert_eq!(out.nq, False);
    }

    #[test]
    fn holds_without_edge() {
        let mut ff = FlipFlop::new(EdgeTrigger::Rising);
        ff.sample(&inputs(True, False));
        ff.sample(&inputs(True, True));
        // D changes with no edge: state holds.
        let out = ff.sample(&inputs(False, True));
        assert_eq!(out.q, True);
    }

    #[test]
    fn resampling_does_not_double_trigger() {
        let mut ff = FlipFlop::new(EdgeTrigger::Rising);
        ff.sample(&inputs(True, False));
        ff.sample(&inputs(True, True));
        ff.sample(&inputs(False, True));
        ff.sample(&inputs(False, True));
        assert_eq!(ff.q(), True);
    }

    #[test]
    fn falling_trigger() {
        let mut ff = FlipFlop::new(EdgeTrigger::Falling);
        ff.sample(&inputs(True, True));
        let out = ff.sample(&inputs(True, False));
        assert_eq!(out.q, True);
    }

    #[test]
    fn preset_beats_edge() {
        let mut ff = FlipFlop::new(EdgeTrigger::Rising);
        ff.sample(&inputs(False, False));
        let out = ff.sample(&FlipFlopInputs {
            d: False,
            clock: True,
            preset: True,
            clear: False,
        });
        assert_eq!(out.q, True);
    }

    #[test]
    fn clear_forces_low() {
        let mut ff = FlipFlop::new(EdgeTrigger::Rising);
        ff.load(True);
        let out = ff.sample(&FlipFlopInputs {
            d: True,
            clock: False,
            preset: False,
            clear: True,
        });
        assert_eq!(out.q, False);
    }

    #[test]
    fn preset_and_clear_is_invalid() {
        let mut ff = FlipFlop::new(EdgeTrigger::Rising);
        let out = ff.sample(&FlipFlopInputs {
            d: False,
            clock: False,
            preset: True,
            clear: True,
        });
        assert!(ff.is_invalid());
        assert_eq!(out.q, True);
        assert_eq!(out.nq, True);
        // Releasing one control leaves the invalid state.
        let out = ff.sample(&FlipFlopInputs {
            d: False,
            clock: False,
            preset: False,
            clear: True,
        });
        assert!(!ff.is_invalid());
        assert_eq!(out.q, False);
    }

    #[test]
    fn high_z_data_latches_unknown() {
        let mut ff = FlipFlop::new(EdgeTrigger::Rising);
        ff.sample(&inputs(HighZ, False));
        let out = ff.sample(&inputs(HighZ, True));
        assert_eq!(out.q, Unknown);
        assert_eq!(out.nq, Unknown);
    }

    #[test]
    fn unknown_clock_never_triggers() {
        let mut ff = FlipFlop::new(EdgeTrigger::Rising);
        ff.sample(&inputs(True, False));
        ff.sample(&inputs(True, Unknown));
        ff.sample(&inputs(True, True));
        // False -> Unknown -> True contains no clean rising edge.
        assert_eq!(ff.q(), False);
    }

    #[test]
    fn serde_roundtrip() {
        let mut ff = FlipFlop::new(EdgeTrigger::Rising);
        ff.load(True);
        let json = serde_json::to_string(&ff).unwrap();
        let back: FlipFlop = serde_json::from_str(&json).unwrap();
        assert_eq!(back.q(), True);
    }
}
