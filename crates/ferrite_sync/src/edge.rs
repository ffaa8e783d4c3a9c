//! Clock-edge configuration, detection, and the shared control skeleton.

use ferrite_common::Logic;
use serde::{Deserialize, Serialize};

/// Which clock transition a synchronous primitive reacts to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum EdgeTrigger {
    /// React to a `False` → `True` transition.
    Rising,
    /// React to a `True` → `False` transition.
    Falling,
}

impl EdgeTrigger {
    /// Returns `true` if the transition from `prev` to `now` is this
    /// trigger's edge. Indeterminate samples never form an edge.
    pub fn fired(self, prev: Logic, now: Logic) -> bool {
        match self {
            EdgeTrigger::Rising => prev == Logic::False && now == Logic::True,
            EdgeTrigger::Falling => prev == Logic::True && now == Logic::False,
        }
    }
}

/// Remembers the previously sampled clock value to detect edges.
///
/// Each call to [`sample`](Self::sample) compares against the stored
/// previous value and then replaces it, so resampling an unchanged clock is
/// idempotent: a transition is reported exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDetector {
    trigger: EdgeTrigger,
    prev: Logic,
}

impl EdgeDetector {
    /// Creates a detector for the given trigger. The initial previous
    /// sample is `Unknown`, so the very first sample can never fire.
    pub fn new(trigger: EdgeTrigger) -> Self {
        Self {
            trigger,
            prev: Logic::Unknown,
        }
    }

    /// Samples the clock, returning `true` exactly when the configured edge
    /// occurred since the previous sample.
    pub fn sample(&mut self, clock: Logic) -> bool {
        let fired = self.trigger.fired(self.prev, clock);
        self.prev = clock;
        fired
    }

    /// Returns the configured trigger.
    pub fn trigger(&self) -> EdgeTrigger {
        self.trigger
    }

    /// Returns the previously sampled clock value.
    pub fn previous(&self) -> Logic {
        self.prev
    }
}

/// The action selected by the shared synchronous control skeleton for one
/// sample, in priority order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SyncControl {
    /// Preset and clear asserted together: the primitive is in an invalid
    /// state this sample.
    Invalid,
    /// Preset alone: force the all-ones state.
    Preset,
    /// Clear alone: force the all-zeros state.
    Clear,
    /// A clock edge fired: apply the primitive's next-state rule.
    Edge,
    /// Nothing to do: hold state.
    Hold,
}

impl SyncControl {
    /// Resolves the asynchronous controls and the edge flag into the action
    /// for this sample. Only a driven `True` asserts a control.
    pub fn resolve(preset: Logic, clear: Logic, edge: bool) -> Self {
        match (preset == Logic::True, clear == Logic::True) {
            (true, true) => SyncControl::Invalid,
            (true, false) => SyncControl::Preset,
            (false, true) => SyncControl::Clear,
            (false, false) => {
                if edge {
                    SyncControl::Edge
                } else {
                    SyncControl::Hold
                }
            }
        }
    }
}
