//! The simulation instance: arenas, queues, allocator, and construction API.

use crate::component::{Component, ComponentKind, ComponentPhase, ComponentSpec, GateKind};
use crate::error::SimError;
use ferrite_common::{Logic, LogicVec};
use ferrite_cpu::{AluResult, Cpu};
use ferrite_graph::{
    ComponentId, LoadReport, Node, NodeId, NodeIdAllocator, NodeKind, PinPath, PinSet, SlotArena,
    Wire, WireId,
};
use ferrite_sync::{Counter, FlipFlop, Memory, Register};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{event, Level};

/// Tunable limits of one simulation instance.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SimOptions {
    /// Maximum scheduler rounds per [`run_pending`](crate::SimInstance::run_pending)
    /// invocation before a combinational cycle is assumed.
    pub round_cap: u32,
    /// Logical ticks per second, used to convert clock frequencies into
    /// toggle periods.
    pub ticks_per_second: u64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            round_cap: 1_000,
            ticks_per_second: 1_000,
        }
    }
}

/// One entry of the propagation queue: either a component pushing its
/// opaque value to its output nodes, or a wire applying due entries to its
/// input node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Propagate {
    /// Push a component's stored value to its output nodes.
    Component(ComponentId),
    /// Apply a wire's due history entries to its destination.
    Wire(WireId),
}

/// The node ids of a previously saved component, in pin declaration order
/// (all inputs, then all outputs), used to preserve wiring identity across
/// load.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedNodeIds {
    /// Node ids in pin declaration order.
    pub ids: Vec<NodeId>,
}

/// What a pin plan entry declares.
enum PinDecl {
    In(&'static str),
    InGroup(&'static str, u32),
    Out(&'static str, Option<Logic>),
    OutGroup(&'static str, u32),
}

/// One simulation instance: the component/node/wire graph, the scheduler
/// queues, the node-id allocator, and the logical clock.
///
/// There is one instance per open circuit document (including one per
/// instantiated sub-circuit); nothing here is process-global. All state
/// change flows through [`run_pending`](Self::run_pending).
pub struct SimInstance {
    options: SimOptions,
    pub(crate) alloc: NodeIdAllocator,
    pub(crate) nodes: SlotArena<NodeId, Node>,
    pub(crate) wires: SlotArena<WireId, Wire>,
    pub(crate) components: SlotArena<ComponentId, Component>,
    pub(crate) to_propagate: VecDeque<Propagate>,
    pub(crate) to_recalc: VecDeque<(ComponentId, bool)>,
    pub(crate) now: u64,
}

impl Default for SimInstance {
    fn default() -> Self {
        Self::new(SimOptions::default())
    }
}

impl SimInstance {
    /// Creates an empty instance.
    pub fn new(options: SimOptions) -> Self {
        Self {
            options,
            alloc: NodeIdAllocator::new(),
            nodes: SlotArena::new(),
            wires: SlotArena::new(),
            components: SlotArena::new(),
            to_propagate: VecDeque::new(),
            to_recalc: VecDeque::new(),
            now: 0,
        }
    }

    /// Returns the configured options.
    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    /// Returns the current logical time in ticks.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Returns the number of live components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Returns the number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of live wires.
    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    /// Returns a component by id.
    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id)
    }

    /// Opens a bulk-load session on the node-id allocator: id collisions
    /// from restored components are resolved through a remap table instead
    /// of warned about.
    pub fn begin_load(&mut self) {
        self.alloc.begin_load();
    }

    /// Closes the bulk-load session, returning the recorded remappings.
    pub fn end_load(&mut self) -> LoadReport {
        self.alloc.end_load()
    }

    /// Constructs a component, allocating its nodes.
    ///
    /// With `saved` ids the nodes are allocated under the previously saved
    /// ids (in pin declaration order) so restored wires keep their
    /// endpoints; collisions go through the allocator's remapping rules.
    /// The new component is enqueued for a forced recalculation so it
    /// announces its outputs.
    pub fn add_component(
        &mut self,
        spec: ComponentSpec,
        saved: Option<&SavedNodeIds>,
    ) -> Result<ComponentId, SimError> {
        let plan = pin_plan(&spec);
        let kind = self.build_kind(spec)?;
        let id = self.components.alloc_with(|id| Component::new(id, kind));

        let mut cursor = 0usize;
        let mut inputs = PinSet::new();
        let mut outputs = PinSet::new();
        for decl in plan {
            match decl {
                PinDecl::In(role) => {
                    let nid = self.allocate_pin_id(saved, &mut cursor);
                    self.install_node(Node::new_input(nid, id));
                    inputs.add(role, nid);
                }
                PinDecl::InGroup(role, lanes) => {
                    let mut group = Vec::with_capacity(lanes as usize);
                    for _ in 0..lanes {
                        let nid = self.allocate_pin_id(saved, &mut cursor);
                        self.install_node(Node::new_input(nid, id));
                        group.push(nid);
                    }
                    inputs.add_group(role, group);
                }
                PinDecl::Out(role, initial) => {
                    let nid = self.allocate_pin_id(saved, &mut cursor);
                    self.install_node(Node::new_output(nid, id, initial));
                    outputs.add(role, nid);
                }
                PinDecl::OutGroup(role, lanes) => {
                    let mut group = Vec::with_capacity(lanes as usize);
                    for _ in 0..lanes {
                        let nid = self.allocate_pin_id(saved, &mut cursor);
                        self.install_node(Node::new_output(nid, id, None));
                        group.push(nid);
                    }
                    outputs.add_group(role, group);
                }
            }
        }

        let component = self.components.get_mut(id).expect("component just allocated");
        component.inputs = inputs;
        component.outputs = outputs;
        component.set_phase(ComponentPhase::Spawned);

        self.enqueue_recalc(id, true);
        Ok(id)
    }

    /// Returns the component's node ids in pin declaration order, the
    /// layout [`add_component`](Self::add_component) accepts back as
    /// `saved` ids.
    pub fn saved_node_ids(&self, id: ComponentId) -> Result<SavedNodeIds, SimError> {
        let component = self
            .components
            .get(id)
            .ok_or(SimError::MissingComponent { id: id.as_raw() })?;
        Ok(SavedNodeIds {
            ids: component
                .inputs
                .iter_nodes()
                .chain(component.outputs.iter_nodes())
                .collect(),
        })
    }

    /// Looks up a single input pin by role.
    pub fn input_pin(&self, id: ComponentId, role: &str) -> Option<NodeId> {
        self.components.get(id)?.inputs.get(role)
    }

    /// Looks up a single output pin by role.
    pub fn output_pin(&self, id: ComponentId, role: &str) -> Option<NodeId> {
        self.components.get(id)?.outputs.get(role)
    }

    /// Looks up an input pin group by role.
    pub fn input_group(&self, id: ComponentId, role: &str) -> Option<Vec<NodeId>> {
        Some(self.components.get(id)?.inputs.group(role)?.to_vec())
    }

    /// Looks up an output pin group by role.
    pub fn output_group(&self, id: ComponentId, role: &str) -> Option<Vec<NodeId>> {
        Some(self.components.get(id)?.outputs.group(role)?.to_vec())
    }

    /// Connects an output node to an input node with the given logical
    /// delay.
    ///
    /// Node ids are resolved through any active load-session remap table.
    /// An input that already has an incoming wire keeps it: the duplicate
    /// is logged and the existing wire id returned.
    pub fn connect(&mut self, from: NodeId, to: NodeId, delay: u64) -> Result<WireId, SimError> {
        let from = self.alloc.resolve(from);
        let to = self.alloc.resolve(to);

        let from_node = self
            .nodes
            .get(from)
            .ok_or(SimError::MissingNode { id: from.as_raw() })?;
        if from_node.kind() != NodeKind::Output {
            return Err(SimError::NotAnOutput { id: from.as_raw() });
        }
        let to_node = self
            .nodes
            .get(to)
            .ok_or(SimError::MissingNode { id: to.as_raw() })?;
        if to_node.kind() != NodeKind::Input {
            return Err(SimError::NotAnInput { id: to.as_raw() });
        }
        if let Some(existing) = to_node.wire_in() {
            event!(
                Level::WARN,
                input = to.as_raw(),
                kept = existing.as_raw(),
                "input node already driven, keeping the existing wire"
            );
            return Ok(existing);
        }

        let wire = self.wires.alloc_with(|id| Wire::new(id, from, to, delay));
        let now = self.now;
        let visible = {
            let from_node = self.nodes.get_mut(from).expect("checked above");
            from_node.attach_wire_out(wire);
            from_node.visible()
        };
        self.nodes
            .get_mut(to)
            .expect("checked above")
            .attach_wire_in(wire);

        // Announce the current source value so the new input settles.
        self.wires
            .get_mut(wire)
            .expect("wire just allocated")
            .push(visible, now);
        self.to_propagate.push_back(Propagate::Wire(wire));
        Ok(wire)
    }

    /// Removes a wire; the orphaned input reads as undriven again.
    pub fn disconnect(&mut self, wire: WireId) -> Result<(), SimError> {
        if !self.wires.contains(wire) {
            return Err(SimError::MissingWire { id: wire.as_raw() });
        }
        self.remove_wire_internal(wire);
        Ok(())
    }

    /// Externally drives an input node (an editor/user action). A visible
    /// change enqueues the owning component for recalculation.
    pub fn set_input(&mut self, node: NodeId, value: Logic) -> Result<(), SimError> {
        let n = self
            .nodes
            .get_mut(node)
            .ok_or(SimError::MissingNode { id: node.as_raw() })?;
        if n.kind() != NodeKind::Input {
            return Err(SimError::NotAnInput { id: node.as_raw() });
        }
        let changed = n.set_stored(value);
        let owner = n.owner();
        if changed {
            self.enqueue_recalc(owner, false);
        }
        Ok(())
    }

    /// Sets or clears a forced override on an output node. The override
    /// masks the computed value for reads and downstream propagation;
    /// clearing it reveals the stored computation.
    pub fn force_output(&mut self, node: NodeId, value: Option<Logic>) -> Result<(), SimError> {
        let n = self
            .nodes
            .get_mut(node)
            .ok_or(SimError::MissingNode { id: node.as_raw() })?;
        if n.kind() != NodeKind::Output {
            return Err(SimError::NotAnOutput { id: node.as_raw() });
        }
        if n.set_forced(value) {
            let visible = n.visible();
            let wires: Vec<WireId> = n.wires_out().to_vec();
            let now = self.now;
            for w in wires {
                if let Some(wire) = self.wires.get_mut(w) {
                    wire.push(visible, now);
                    self.to_propagate.push_back(Propagate::Wire(w));
                }
            }
        }
        Ok(())
    }

    /// Returns a node's visible value, for painting widgets.
    pub fn node_value(&self, node: NodeId) -> Result<Logic, SimError> {
        self.nodes
            .get(node)
            .map(Node::visible)
            .ok_or(SimError::MissingNode { id: node.as_raw() })
    }

    /// Destroys a component, its nodes (releasing their ids), and every
    /// wire attached to them.
    pub fn remove_component(&mut self, id: ComponentId) -> Result<(), SimError> {
        let component = self
            .components
            .remove(id)
            .ok_or(SimError::MissingComponent { id: id.as_raw() })?;
        let node_ids: Vec<NodeId> = component
            .inputs
            .iter_nodes()
            .chain(component.outputs.iter_nodes())
            .collect();
        for nid in node_ids {
            if let Some(node) = self.nodes.remove(nid) {
                for &w in node.wires_out() {
                    self.remove_wire_internal(w);
                }
                if let Some(w) = node.wire_in() {
                    self.remove_wire_internal(w);
                }
                self.alloc.release(nid);
            }
        }
        Ok(())
    }

    /// Replaces a component with a re-parameterized one, transplanting the
    /// attached wires.
    ///
    /// Wires are matched onto the replacement by single-pin role name or by
    /// (group, lane index), falling back to group-name matching when the
    /// exact lane is unavailable; wires that still find no pin are dropped
    /// with a warning.
    pub fn replace_component(
        &mut self,
        old_id: ComponentId,
        spec: ComponentSpec,
    ) -> Result<ComponentId, SimError> {
        if !self.components.contains(old_id) {
            return Err(SimError::MissingComponent { id: old_id.as_raw() });
        }
        let new_id = self.add_component(spec, None)?;

        // Plan the transplant immutably: (wire, old node, new node, is_source).
        let mut moves: Vec<(WireId, NodeId, NodeId, bool)> = Vec::new();
        let mut drops: Vec<WireId> = Vec::new();
        {
            let old = self.components.get(old_id).expect("checked above");
            let new = self.components.get(new_id).expect("just added");
            for old_node in old.outputs.iter_nodes() {
                let Some(node) = self.nodes.get(old_node) else { continue };
                let path = old.outputs.locate(old_node).expect("own pin");
                for &w in node.wires_out() {
                    match resolve_with_fallback(&new.outputs, path) {
                        Some(new_node) => moves.push((w, old_node, new_node, true)),
                        None => drops.push(w),
                    }
                }
            }
            // Each replacement input accepts one wire; later matches onto an
            // already-claimed pin are dropped like any duplicate driver.
            let mut claimed: HashSet<NodeId> = HashSet::new();
            for old_node in old.inputs.iter_nodes() {
                let Some(node) = self.nodes.get(old_node) else { continue };
                let path = old.inputs.locate(old_node).expect("own pin");
                if let Some(w) = node.wire_in() {
                    match resolve_with_fallback(&new.inputs, path) {
                        Some(new_node) if claimed.insert(new_node) => {
                            moves.push((w, old_node, new_node, false));
                        }
                        _ => drops.push(w),
                    }
                }
            }
        }

        for (w, old_node, new_node, is_source) in moves {
            let Some(wire) = self.wires.get_mut(w) else { continue };
            if is_source {
                let to = wire.to();
                wire.reconnect(new_node, to);
            } else {
                let from = wire.from();
                wire.reconnect(from, new_node);
            }
            if let Some(n) = self.nodes.get_mut(old_node) {
                n.detach_wire_out(w);
                n.detach_wire_in(w);
            }
            if let Some(n) = self.nodes.get_mut(new_node) {
                if is_source {
                    n.attach_wire_out(w);
                } else {
                    n.attach_wire_in(w);
                }
            }
            self.to_propagate.push_back(Propagate::Wire(w));
        }
        for w in drops {
            event!(
                Level::WARN,
                wire = w.as_raw(),
                "no matching pin on replacement component, dropping wire"
            );
            self.remove_wire_internal(w);
        }

        self.remove_component(old_id)?;
        Ok(new_id)
    }

    /// Advances the logical clock one tick and wakes every oscillator that
    /// is due to toggle. The editor's frame loop calls this, then
    /// [`run_pending`](Self::run_pending).
    pub fn step_clocks(&mut self) {
        self.now += 1;
        let now = self.now;
        let due: Vec<ComponentId> = self
            .components
            .iter()
            .filter_map(|(id, c)| match &c.kind {
                ComponentKind::Clock { next_toggle, .. } if *next_toggle <= now => Some(id),
                _ => None,
            })
            .collect();
        for id in due {
            self.enqueue_recalc(id, false);
        }
    }

    /// Drains the pipeline status strings a CPU component has emitted since
    /// the last drain. Returns an empty list for other kinds.
    pub fn drain_cpu_events(&mut self, id: ComponentId) -> Result<Vec<String>, SimError> {
        let component = self
            .components
            .get_mut(id)
            .ok_or(SimError::MissingComponent { id: id.as_raw() })?;
        match &mut component.kind {
            ComponentKind::Cpu { state, .. } => Ok(state.take_events()),
            _ => Ok(Vec::new()),
        }
    }

    /// Appends a component to the recalculation queue. Duplicates are fine;
    /// evaluation is value-based.
    pub fn enqueue_recalc(&mut self, id: ComponentId, force_propagate: bool) {
        self.to_recalc.push_back((id, force_propagate));
    }

    /// Appends a component to the propagation queue.
    pub fn enqueue_propagate(&mut self, id: ComponentId) {
        self.to_propagate.push_back(Propagate::Component(id));
    }

    // ---- internals ----

    fn allocate_pin_id(&mut self, saved: Option<&SavedNodeIds>, cursor: &mut usize) -> NodeId {
        let id = match saved.and_then(|s| s.ids.get(*cursor)) {
            Some(&wanted) => self.alloc.request(wanted),
            None => self.alloc.fresh(),
        };
        *cursor += 1;
        id
    }

    fn install_node(&mut self, node: Node) {
        let id = node.id();
        if self.nodes.insert_at(id, node).is_some() {
            event!(
                Level::WARN,
                node = id.as_raw(),
                "node slot already occupied, displacing stale node"
            );
        }
    }

    fn remove_wire_internal(&mut self, w: WireId) {
        let Some(wire) = self.wires.remove(w) else {
            return;
        };
        if let Some(n) = self.nodes.get_mut(wire.from()) {
            n.detach_wire_out(w);
        }
        let mut orphaned = None;
        if let Some(n) = self.nodes.get_mut(wire.to()) {
            n.detach_wire_in(w);
            if n.set_stored(Logic::HighZ) {
                orphaned = Some(n.owner());
            }
        }
        if let Some(owner) = orphaned {
            self.enqueue_recalc(owner, false);
        }
    }

    /// Pushes a value into an output node and notifies its wires.
    pub(crate) fn drive_output(&mut self, node_id: NodeId, value: Logic) {
        let now = self.now;
        let Some(node) = self.nodes.get_mut(node_id) else {
            return;
        };
        node.set_stored(value);
        let visible = node.visible();
        let wires: Vec<WireId> = node.wires_out().to_vec();
        for w in wires {
            if let Some(wire) = self.wires.get_mut(w) {
                wire.push(visible, now);
                self.to_propagate.push_back(Propagate::Wire(w));
            }
        }
    }

    pub(crate) fn visible(&self, node: NodeId) -> Logic {
        self.nodes
            .get(node)
            .map(Node::visible)
            .unwrap_or(Logic::HighZ)
    }

    pub(crate) fn read_pin(&self, pins: &PinSet, role: &str) -> Logic {
        pins.get(role)
            .map(|n| self.visible(n))
            .unwrap_or(Logic::HighZ)
    }

    pub(crate) fn read_group(&self, pins: &PinSet, role: &str, width: u32) -> LogicVec {
        let mut out = LogicVec::filled(width, Logic::HighZ);
        if let Some(nodes) = pins.group(role) {
            for (i, &n) in nodes.iter().enumerate().take(width as usize) {
                out.set(i as u32, self.visible(n));
            }
        }
        out
    }

    fn build_kind(&self, spec: ComponentSpec) -> Result<ComponentKind, SimError> {
        Ok(match spec {
            ComponentSpec::Gate {
                kind,
                inputs,
                initial,
            } => {
                let arity_ok = match kind {
                    GateKind::Buf | GateKind::Not => inputs == 1,
                    _ => inputs >= 2,
                };
                if !arity_ok {
                    return Err(SimError::BadGateArity {
                        gate: kind.name(),
                        count: inputs,
                    });
                }
                ComponentKind::Gate {
                    op: kind,
                    value: initial.unwrap_or(Logic::Unknown),
                }
            }
            ComponentSpec::Alu { width } => {
                if width == 0 || width > 64 {
                    return Err(ferrite_sync::SyncError::BadWidth { width }.into());
                }
                ComponentKind::Alu {
                    width,
                    value: AluResult {
                        value: LogicVec::all_unknown(width),
                        carry: Logic::Unknown,
                        zero: Logic::Unknown,
                    },
                }
            }
            ComponentSpec::Clock { frequency } => {
                let half_period = frequency.half_period_ticks(self.options.ticks_per_second);
                ComponentKind::Clock {
                    frequency,
                    half_period,
                    level: Logic::False,
                    next_toggle: self.now.saturating_add(half_period),
                }
            }
            ComponentSpec::FlipFlop { trigger } => {
                let state = FlipFlop::new(trigger);
                let value = state.outputs();
                ComponentKind::FlipFlop { state, value }
            }
            ComponentSpec::Register {
                width,
                mode,
                policy,
                trigger,
            } => {
                let state = Register::new(width, mode, policy, trigger)?;
                let value = state.outputs();
                ComponentKind::Register { state, value }
            }
            ComponentSpec::Counter { width, trigger } => {
                let state = Counter::new(width, trigger)?;
                let value = state.outputs();
                ComponentKind::Counter { state, value }
            }
            ComponentSpec::Memory {
                kind,
                addr_bits,
                width,
                trigger,
                contents,
            } => {
                let state = match contents {
                    Some(rows) => Memory::with_contents(kind, addr_bits, width, trigger, rows)?,
                    None => Memory::new(kind, addr_bits, width, trigger)?,
                };
                let value = state.outputs();
                ComponentKind::Memory { state, value }
            }
            ComponentSpec::Cpu(params) => {
                let state = Box::new(Cpu::new(params)?);
                let value = state.outputs().clone();
                ComponentKind::Cpu { state, value }
            }
        })
    }
}

/// Declares the pins each component kind exposes, singles before groups so
/// allocation order matches [`PinSet`] iteration order.
fn pin_plan(spec: &ComponentSpec) -> Vec<PinDecl> {
    use PinDecl::*;
    match spec {
        ComponentSpec::Gate {
            inputs, initial, ..
        } => vec![InGroup("in", *inputs), Out("out", *initial)],
        ComponentSpec::Alu { width } => vec![
            InGroup("a", *width),
            InGroup("b", *width),
            InGroup("op", 3),
            Out("carry", None),
            Out("zero", None),
            OutGroup("result", *width),
        ],
        ComponentSpec::Clock { .. } => vec![Out("out", Some(Logic::False))],
        ComponentSpec::FlipFlop { .. } => vec![
            In("d"),
            In("clk"),
            In("pre"),
            In("clr"),
            Out("q", None),
            Out("nq", None),
        ],
        ComponentSpec::Register { width, .. } => vec![
            In("clk"),
            In("pre"),
            In("clr"),
            InGroup("d", *width),
            OutGroup("q", *width),
        ],
        ComponentSpec::Counter { width, .. } => vec![
            In("clk"),
            In("pre"),
            In("clr"),
            Out("ovf", None),
            OutGroup("q", *width),
        ],
        ComponentSpec::Memory {
            addr_bits, width, ..
        } => vec![
            In("we"),
            In("clk"),
            In("clr"),
            InGroup("addr", *addr_bits),
            InGroup("d", *width),
            OutGroup("q", *width),
        ],
        ComponentSpec::Cpu(params) => vec![
            In("clk_a"),
            In("clk_b"),
            In("speed"),
            In("run"),
            In("step"),
            In("reset"),
            InGroup("instr", params.word_bits()),
            InGroup("data_in", params.data_bits),
            Out("ram_write", None),
            Out("ram_write_sync", None),
            Out("reset_sync", None),
            Out("clock_sync", None),
            Out("zero", None),
            Out("carry", None),
            Out("stack_overflow", None),
            Out("halt", None),
            Out("running", None),
            OutGroup("instr_addr", params.instr_addr_bits),
            OutGroup("data_addr", params.operand_bits()),
            OutGroup("data_out", params.data_bits),
        ],
    }
}

/// Resolves a pin path on a replacement component, with the group-name
/// fallback used when the exact lane no longer exists.
fn resolve_with_fallback(pins: &PinSet, path: PinPath) -> Option<NodeId> {
    pins.resolve(path).or_else(|| match path {
        // The group shrank or became a single pin of the same role.
        PinPath::Grouped(role, _) => pins.get(role),
        // A single pin widened into a group: take its first lane.
        PinPath::Single(role) => pins.group(role).and_then(|g| g.first().copied()),
    })
}

// The scheduler half of SimInstance lives in scheduler.rs.
