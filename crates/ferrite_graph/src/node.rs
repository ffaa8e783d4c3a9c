//! Single-bit connection points on components.

use crate::ids::{ComponentId, NodeId, WireId};
use ferrite_common::Logic;
use serde::{Deserialize, Serialize};

/// Whether a node is driven by its component or drives into it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum NodeKind {
    /// Receives a value from at most one incoming wire.
    Input,
    /// Driven by the owning component; fans out through wires.
    Output,
}

/// A single-bit connection point owned by exactly one component.
///
/// The *visible* value is the forced override when one is set, otherwise the
/// stored value. Forcing never touches the stored value, so clearing the
/// force reveals the pre-existing computation. Output nodes may carry an
/// initial value used to stabilize feedback loops at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,
    owner: ComponentId,
    kind: NodeKind,
    stored: Logic,
    forced: Option<Logic>,
    initial: Option<Logic>,
    /// Outgoing wires (outputs only).
    wires_out: Vec<WireId>,
    /// Incoming wire (inputs only; at most one).
    wire_in: Option<WireId>,
}

impl Node {
    /// Creates an input node, initially `HighZ` (nothing drives it yet).
    pub fn new_input(id: NodeId, owner: ComponentId) -> Self {
        Self {
            id,
            owner,
            kind: NodeKind::Input,
            stored: Logic::HighZ,
            forced: None,
            initial: None,
            wires_out: Vec::new(),
            wire_in: None,
        }
    }

    /// Creates an output node. `initial` pre-loads the stored value so
    /// feedback loops settle deterministically at creation.
    pub fn new_output(id: NodeId, owner: ComponentId, initial: Option<Logic>) -> Self {
        Self {
            id,
            owner,
            kind: NodeKind::Output,
            stored: initial.unwrap_or(Logic::HighZ),
            forced: None,
            initial,
            wires_out: Vec::new(),
            wire_in: None,
        }
    }

    /// Returns this node's id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the owning component.
    pub fn owner(&self) -> ComponentId {
        self.owner
    }

    /// Returns whether this is an input or output node.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns the value consumers see: the forced override if present,
    /// else the stored value.
    pub fn visible(&self) -> Logic {
        self.forced.unwrap_or(self.stored)
    }

    /// Returns the stored value, ignoring any force.
    pub fn stored(&self) -> Logic {
        self.stored
    }

    /// Overwrites the stored value. Returns `true` if the visible value
    /// changed (a force in place masks stored-value changes).
    pub fn set_stored(&mut self, value: Logic) -> bool {
        let before = self.visible();
        self.stored = value;
        self.visible() != before
    }

    /// Sets or clears the forced override. Returns `true` if the visible
    /// value changed.
    pub fn set_forced(&mut self, value: Option<Logic>) -> bool {
        let before = self.visible();
        self.forced = value;
        self.visible() != before
    }

    /// Returns the forced override, if any.
    pub fn forced(&self) -> Option<Logic> {
        self.forced
    }

    /// Returns the initial value configured at creation.
    pub fn initial(&self) -> Option<Logic> {
        self.initial
    }

    /// Outgoing wires of an output node.
    pub fn wires_out(&self) -> &[WireId] {
        &self.wires_out
    }

    /// Registers an outgoing wire.
    pub fn attach_wire_out(&mut self, wire: WireId) {
        debug_assert_eq!(self.kind, NodeKind::Output);
        self.wires_out.push(wire);
    }

    /// Unregisters an outgoing wire.
    pub fn detach_wire_out(&mut self, wire: WireId) {
        self.wires_out.retain(|&w| w != wire);
    }

    /// The incoming wire of an input node, if connected.
    pub fn wire_in(&self) -> Option<WireId> {
        self.wire_in
    }

    /// Connects the incoming wire. Returns `false` (leaving the existing
    /// wire in place) if one is already connected: an input accepts only
    /// one driver.
    pub fn attach_wire_in(&mut self, wire: WireId) -> bool {
        debug_assert_eq!(self.kind, NodeKind::Input);
        if self.wire_in.is_some() {
            return false;
        }
        self.wire_in = Some(wire);
        true
    }

    /// Disconnects the incoming wire if it matches.
    pub fn detach_wire_in(&mut self, wire: WireId) {
        if self.wire_in == Some(wire) {
            self.wire_in = None;
        }
    }
}
