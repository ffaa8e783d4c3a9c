//! Free-running modulo counter with a wrap flag.

use crate::edge::{EdgeDetector, EdgeTrigger, SyncControl};
use crate::SyncError;
use ferrite_common::{Logic, LogicVec};
use serde::{Deserialize, Serialize};

/// One sample of a counter's input pins.
#[derive(Clone, Copy, Debug)]
pub struct CounterInputs {
    /// Clock input; the count advances on the trigger edge.
    pub clock: Logic,
    /// Asynchronous preset (forces all ones).
    pub preset: Logic,
    /// Asynchronous clear (forces zero and deactivates the overflow flag).
    pub clear: Logic,
}

/// The counter's output pins after a sample.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CounterOutputs {
    /// The current count.
    pub q: LogicVec,
    /// The overflow flag, at its active polarity while the latest edge
    /// wrapped the count.
    pub overflow: Logic,
}

/// An N-bit counter incrementing modulo 2^N on each trigger edge.
///
/// The overflow flag's active polarity matches the trigger: active-high for
/// a rising trigger, active-low for a falling trigger. It asserts on the
/// edge that wraps the count and deasserts on the next edge or clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    width: u32,
    detector: EdgeDetector,
    count: LogicVec,
    wrapped: bool,
    invalid: bool,
}

impl Counter {
    /// Creates a counter starting at zero.
    pub fn new(width: u32, trigger: EdgeTrigger) -> Result<Self, SyncError> {
        if width == 0 || width > 64 {
            return Err(SyncError::BadWidth { width });
        }
        Ok(Self {
            width,
            detector: EdgeDetector::new(trigger),
            count: LogicVec::all_false(width),
            wrapped: false,
            invalid: false,
        })
    }

    /// Returns the lane width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the current count.
    pub fn q(&self) -> &LogicVec {
        &self.count
    }

    /// Returns `true` while preset and clear were last asserted together.
    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// The inactive polarity of the overflow flag for this trigger.
    fn overflow_idle(&self) -> Logic {
        match self.detector.trigger() {
            EdgeTrigger::Rising => Logic::False,
            EdgeTrigger::Falling => Logic::True,
        }
    }

    /// Samples the inputs and applies one transition.
    pub fn sample(&mut self, inputs: &CounterInputs) -> CounterOutputs {
        let edge = self.detector.sample(inputs.clock);
        match SyncControl::resolve(inputs.preset, inputs.clear, edge) {
            SyncControl::Invalid => self.invalid = true,
            SyncControl::Preset => {
                self.invalid = false;
                self.count = LogicVec::all_true(self.width);
                self.wrapped = false;
            }
            SyncControl::Clear => {
                self.invalid = false;
                self.count = LogicVec::all_false(self.width);
                self.wrapped = false;
            }
            SyncControl::Edge => {
                self.invalid = false;
                let (next, wrapped) = self.count.wrapping_inc();
                self.count = next;
                self.wrapped = wrapped;
            }
            SyncControl::Hold => self.invalid = false,
        }
        self.outputs()
    }

    /// Returns the current output pins without sampling.
    pub fn outputs(&self) -> CounterOutputs {
        if self.invalid {
            return CounterOutputs {
                q: LogicVec::all_unknown(self.width),
                overflow: Logic::Unknown,
            };
        }
        let idle = self.overflow_idle();
        CounterOutputs {
            q: self.count.clone(),
            overflow: if self.wrapped { !idle } else { idle },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_common::Logic::*;

    fn quiet(clock: Logic) -> CounterInputs {
        CounterInputs {
            clock,
            preset: False,
            clear: False,
        }
    }

    fn tick(counter: &mut Counter) -> CounterOutputs {
        match counter.detector.trigger() {
            EdgeTrigger::Rising => {
                counter.sample(&quiet(False));
                counter.sample(&quiet(True))
            }
            EdgeTrigger::Falling => {
                counter.sample(&quiet(True));
                counter.sample(&quiet(False))
            }
        }
    }

    #[test]
    fn counts_up() {
        let mut counter = Counter::new(3, EdgeTrigger::Rising).unwrap();
        for expected in 1..=7u64 {
            let out = tick(&mut counter);
            assert_eq!(out.q.to_u64(), Some(expected));
            assert_eq!(out.overflow, False);
        }
    }

    #[test]
    fn full_cycle_wraps_exactly_once() {
        let mut counter = Counter::new(3, EdgeTrigger::Rising).unwrap();
        let mut activations = 0;
        for _ in 0..8 {
            let out = tick(&mut counter);
            if out.overflow == True {
                activations += 1;
            }
        }
        assert_eq!(counter.q().to_u64(), Some(0));
        assert_eq!(activations, 1);
    }

    #[test]
    fn overflow_clears_on_next_edge() {
        let mut counter = Counter::new(1, EdgeTrigger::Rising).unwrap();
        let out = tick(&mut counter); // 0 -> 1
        assert_eq!(out.overflow, False);
        let out = tick(&mut counter); // 1 -> 0, wrap
        assert_eq!(out.overflow, True);
        let out = tick(&mut counter); // 0 -> 1
        assert_eq!(out.overflow, False);
    }

    #[test]
    fn falling_trigger_overflow_polarity() {
        let mut counter = Counter::new(1, EdgeTrigger::Falling).unwrap();
        let out = tick(&mut counter); // 0 -> 1
        assert_eq!(out.overflow, True); // idle polarity is high
        let out = tick(&mut counter); // wrap
        assert_eq!(out.overflow, False); // active polarity is low
    }

    #[test]
    fn clear_resets_count_and_flag() {
        let mut counter = Counter::new(2, EdgeTrigger::Rising).unwrap();
        for _ in 0..4 {
            tick(&mut counter);
        }
        let out = counter.sample(&CounterInputs {
            clock: False,
            preset: False,
            clear: True,
        });
        assert_eq!(out.q.to_u64(), Some(0));
        assert_eq!(out.overflow, False);
    }

    #[test]
    fn preset_forces_all_ones() {
        let mut counter = Counter::new(4, EdgeTrigger::Rising).unwrap();
        let out = counter.sample(&CounterInputs {
            clock: False,
            preset: True,
            clear: False,
        });
        assert!(out.q.is_all_true());
    }

    #[test]
    fn invalid_state_outputs_unknown() {
        let mut counter = Counter::new(2, EdgeTrigger::Rising).unwrap();
        let out = counter.sample(&CounterInputs {
            clock: False,
            preset: True,
            clear: True,
        });
        assert!(counter.is_invalid());
        assert_eq!(out.q, LogicVec::all_unknown(2));
        assert_eq!(out.overflow, Unknown);
    }

    #[test]
    fn bad_width_rejected() {
        assert!(Counter::new(0, EdgeTrigger::Rising).is_err());
    }
}
