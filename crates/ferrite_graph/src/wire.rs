//! Directed, delayed connections between an output node and an input node.

use crate::ids::{NodeId, WireId};
use ferrite_common::Logic;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A directed edge from one output node to one input node.
///
/// Each value change on the source is stamped with the logical time it was
/// produced and held until the wire's delay has elapsed; the write to the
/// destination input happens only when the entry becomes due. Timestamps in
/// the history are non-decreasing, and entries are pruned as they are
/// applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wire {
    id: WireId,
    from: NodeId,
    to: NodeId,
    delay: u64,
    pending: VecDeque<(Logic, u64)>,
}

impl Wire {
    /// Creates a wire with the given logical propagation delay in ticks.
    pub fn new(id: WireId, from: NodeId, to: NodeId, delay: u64) -> Self {
        Self {
            id,
            from,
            to,
            delay,
            pending: VecDeque::new(),
        }
    }

    /// Returns this wire's id.
    pub fn id(&self) -> WireId {
        self.id
    }

    /// The driving output node.
    pub fn from(&self) -> NodeId {
        self.from
    }

    /// The driven input node.
    pub fn to(&self) -> NodeId {
        self.to
    }

    /// The logical propagation delay in ticks.
    pub fn delay(&self) -> u64 {
        self.delay
    }

    /// Re-targets the endpoints, used when transplanting onto a replacement
    /// component. Pending values survive the move.
    pub fn reconnect(&mut self, from: NodeId, to: NodeId) {
        self.from = from;
        self.to = to;
    }

    /// Records a new source value stamped at logical time `now`.
    pub fn push(&mut self, value: Logic, now: u64) {
        if let Some(&(_, last)) = self.pending.back() {
            debug_assert!(now >= last, "wire timestamps must be non-decreasing");
        }
        self.pending.push_back((value, now));
    }

    /// Applies the delay at logical time `now`: removes every entry whose
    /// delay has elapsed and returns the newest of them, the value that
    /// should reach the input node.
    pub fn take_due(&mut self, now: u64) -> Option<Logic> {
        let mut latest = None;
        while let Some(&(value, stamped)) = self.pending.front() {
            if stamped + self.delay > now {
                break;
            }
            latest = Some(value);
            self.pending.pop_front();
        }
        latest
    }

    /// Returns `true` while entries are still waiting out their delay.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The logical time at which the oldest pending entry becomes due.
    pub fn next_due(&self) -> Option<u64> {
        self.pending.front().map(|&(_, stamped)| stamped + self.delay)
    }
}
