//! The fixed-point scheduler: propagate-then-recalc rounds over the two
//! work queues.

use crate::component::ComponentKind;
use crate::error::SimError;
use crate::instance::{Propagate, SimInstance};
use ferrite_common::{Logic, LogicVec};
use ferrite_cpu::{AluOp, AluResult, CpuInputs};
use ferrite_graph::{ComponentId, NodeId, PinSet, WireId};
use ferrite_sync::{CounterInputs, FlipFlopInputs, MemoryInputs, RegisterInputs};
use tracing::{event, Level};

/// How a [`run_pending`](SimInstance::run_pending) invocation ended.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RunOutcome {
    /// Both queues were empty: nothing done.
    Idle,
    /// All pending work settled to a fixed point.
    Quiesced {
        /// Rounds it took to quiesce.
        rounds: u32,
    },
    /// The round cap was hit; a zero-delay combinational cycle is assumed
    /// and all pending work was dropped. The instance stays usable.
    CycleBroken {
        /// Rounds executed before giving up.
        rounds: u32,
    },
}

/// Input snapshot for one component kind, gathered before mutation.
enum KindInputs {
    Gate(Vec<Logic>),
    Alu {
        a: LogicVec,
        b: LogicVec,
        op: LogicVec,
    },
    Clock,
    FlipFlop(FlipFlopInputs),
    Register(RegisterInputs),
    Counter(CounterInputs),
    Memory(MemoryInputs),
    Cpu(CpuInputs),
}

impl SimInstance {
    /// Drives all pending propagations and recalculations to a fixed point.
    ///
    /// Each round first swaps out and runs the propagation queue (wires
    /// applying due values, components pushing their stored values), then
    /// swaps out and runs the recalculation queue. A failing entry is
    /// logged and skipped without aborting the round. Rounds where only
    /// not-yet-due wire delays remain jump the logical clock forward to the
    /// earliest due time. Hitting the round cap clears both queues.
    pub fn run_pending(&mut self) -> RunOutcome {
        if self.to_propagate.is_empty() && self.to_recalc.is_empty() {
            return RunOutcome::Idle;
        }

        let mut rounds = 0u32;
        while !self.to_propagate.is_empty() || !self.to_recalc.is_empty() {
            if rounds >= self.options().round_cap {
                event!(
                    Level::WARN,
                    rounds,
                    dropped_propagations = self.to_propagate.len(),
                    dropped_recalcs = self.to_recalc.len(),
                    "round cap hit, assuming a zero-delay combinational cycle and dropping all pending work"
                );
                self.to_propagate.clear();
                self.to_recalc.clear();
                return RunOutcome::CycleBroken { rounds };
            }
            rounds += 1;
            self.now += 1;
            let mut progress = false;

            let batch = std::mem::take(&mut self.to_propagate);
            for item in batch {
                match item {
                    Propagate::Component(id) => {
                        if let Err(error) = self.propagate_component(id) {
                            event!(
                                Level::WARN,
                                component = id.as_raw(),
                                %error,
                                "propagation failed, skipping entry"
                            );
                        }
                        progress = true;
                    }
                    Propagate::Wire(id) => {
                        progress |= self.propagate_wire(id);
                    }
                }
            }

            let batch = std::mem::take(&mut self.to_recalc);
            for (id, force) in batch {
                if let Err(error) = self.recalc_component(id, force) {
                    event!(
                        Level::WARN,
                        component = id.as_raw(),
                        %error,
                        "recalculation failed, skipping entry"
                    );
                }
                progress = true;
            }

            // Only undue wire delays left: jump to the earliest due time
            // instead of idling one round per tick.
            if !progress {
                if let Some(earliest) = self.earliest_wire_due() {
                    self.now = self.now.max(earliest);
                }
            }
        }
        RunOutcome::Quiesced { rounds }
    }

    /// Applies a wire's due entries to its input node. Returns `true` if a
    /// value was applied. Wires still holding undue entries re-enqueue
    /// themselves for a later round.
    fn propagate_wire(&mut self, id: WireId) -> bool {
        let now = self.now;
        let (due, pending, to) = match self.wires.get_mut(id) {
            Some(wire) => (wire.take_due(now), wire.has_pending(), wire.to()),
            None => return false, // stale entry after disconnect
        };
        let mut applied = false;
        if let Some(value) = due {
            applied = true;
            let mut owner = None;
            if let Some(node) = self.nodes.get_mut(to) {
                if node.set_stored(value) {
                    owner = Some(node.owner());
                }
            }
            if let Some(owner) = owner {
                self.enqueue_recalc(owner, false);
            }
        }
        if pending {
            self.to_propagate.push_back(Propagate::Wire(id));
        }
        applied
    }

    /// Pushes a component's stored opaque value out to its output nodes.
    fn propagate_component(&mut self, id: ComponentId) -> Result<(), SimError> {
        let Some(component) = self.components.get(id) else {
            return Ok(()); // stale entry after removal
        };

        let mut drives: Vec<(NodeId, Logic)> = Vec::new();
        let outs = &component.outputs;
        match &component.kind {
            ComponentKind::Gate { value, .. } => drive_single(&mut drives, outs, "out", *value),
            ComponentKind::Alu { value, .. } => {
                drive_single(&mut drives, outs, "carry", value.carry);
                drive_single(&mut drives, outs, "zero", value.zero);
                drive_group(&mut drives, outs, "result", &value.value);
            }
            ComponentKind::Clock { level, .. } => drive_single(&mut drives, outs, "out", *level),
            ComponentKind::FlipFlop { value, .. } => {
                drive_single(&mut drives, outs, "q", value.q);
                drive_single(&mut drives, outs, "nq", value.nq);
            }
            ComponentKind::Register { value, .. } => drive_group(&mut drives, outs, "q", &value.q),
            ComponentKind::Counter { value, .. } => {
                drive_single(&mut drives, outs, "ovf", value.overflow);
                drive_group(&mut drives, outs, "q", &value.q);
            }
            ComponentKind::Memory { value, .. } => drive_group(&mut drives, outs, "q", &value.q),
            ComponentKind::Cpu { value, .. } => {
                drive_single(&mut drives, outs, "ram_write", value.ram_write);
                drive_single(&mut drives, outs, "ram_write_sync", value.ram_write_sync);
                drive_single(&mut drives, outs, "reset_sync", value.reset_sync);
                drive_single(&mut drives, outs, "clock_sync", value.clock_sync);
                drive_single(&mut drives, outs, "zero", value.zero);
                drive_single(&mut drives, outs, "carry", value.carry);
                drive_single(&mut drives, outs, "stack_overflow", value.stack_overflow);
                drive_single(&mut drives, outs, "halt", value.halt);
                drive_single(&mut drives, outs, "running", value.running);
                drive_group(&mut drives, outs, "instr_addr", &value.instr_addr);
                drive_group(&mut drives, outs, "data_addr", &value.data_addr);
                drive_group(&mut drives, outs, "data_out", &value.data_out);
            }
        }

        for (node, value) in drives {
            self.drive_output(node, value);
        }
        Ok(())
    }

    /// Recomputes a component's opaque value from its input nodes. A value
    /// change (or `force_propagate`) enqueues it for propagation.
    pub(crate) fn recalc_component(
        &mut self,
        id: ComponentId,
        force_propagate: bool,
    ) -> Result<(), SimError> {
        let now = self.now;
        let Some(component) = self.components.get(id) else {
            return Ok(()); // stale entry after removal
        };
        let inputs = self.gather_inputs(component);

        let component = self.components.get_mut(id).expect("looked up above");
        let mut invalid = false;
        let changed = match (&mut component.kind, inputs) {
            (ComponentKind::Gate { op, value }, KindInputs::Gate(lanes)) => {
                let next = op.eval(&lanes);
                let changed = next != *value;
                *value = next;
                changed
            }
            (ComponentKind::Alu { width, value }, KindInputs::Alu { a, b, op }) => {
                let next = match AluOp::from_lanes(&op.definite()) {
                    Some(op) => op.eval(&a.definite(), &b.definite()),
                    None => AluResult {
                        value: LogicVec::all_unknown(*width),
                        carry: Logic::Unknown,
                        zero: Logic::Unknown,
                    },
                };
                let changed = next != *value;
                *value = next;
                changed
            }
            (
                ComponentKind::Clock {
                    half_period,
                    level,
                    next_toggle,
                    ..
                },
                KindInputs::Clock,
            ) => {
                if now >= *next_toggle {
                    *level = if *level == Logic::True {
                        Logic::False
                    } else {
                        Logic::True
                    };
                    *next_toggle = now.saturating_add(*half_period);
                    true
                } else {
                    false
                }
            }
            (ComponentKind::FlipFlop { state, value }, KindInputs::FlipFlop(ins)) => {
                let next = state.sample(&ins);
                invalid = state.is_invalid();
                let changed = next != *value;
                *value = next;
                changed
            }
            (ComponentKind::Register { state, value }, KindInputs::Register(ins)) => {
                let next = state.sample(&ins);
                invalid = state.is_invalid();
                let changed = next != *value;
                *value = next;
                changed
            }
            (ComponentKind::Counter { state, value }, KindInputs::Counter(ins)) => {
                let next = state.sample(&ins);
                invalid = state.is_invalid();
                let changed = next != *value;
                *value = next;
                changed
            }
            (ComponentKind::Memory { state, value }, KindInputs::Memory(ins)) => {
                let next = state.sample(&ins);
                let changed = next != *value;
                *value = next;
                changed
            }
            (ComponentKind::Cpu { state, value }, KindInputs::Cpu(ins)) => {
                let next = state.sample(&ins);
                let changed = next != *value;
                *value = next;
                changed
            }
            _ => unreachable!("input snapshot gathered for a different kind"),
        };
        component.set_phase(if invalid {
            crate::component::ComponentPhase::Invalid
        } else {
            crate::component::ComponentPhase::Spawned
        });

        if changed || force_propagate {
            self.to_propagate.push_back(Propagate::Component(id));
        }
        Ok(())
    }

    /// Snapshots a component's input pin values into its kind's input shape.
    fn gather_inputs(&self, component: &crate::component::Component) -> KindInputs {
        let pins = &component.inputs;
        match &component.kind {
            ComponentKind::Gate { .. } => {
                let lanes = pins
                    .group("in")
                    .map(|nodes| nodes.iter().map(|&n| self.visible(n)).collect())
                    .unwrap_or_default();
                KindInputs::Gate(lanes)
            }
            ComponentKind::Alu { width, .. } => KindInputs::Alu {
                a: self.read_group(pins, "a", *width),
                b: self.read_group(pins, "b", *width),
                op: self.read_group(pins, "op", 3),
            },
            ComponentKind::Clock { .. } => KindInputs::Clock,
            ComponentKind::FlipFlop { .. } => KindInputs::FlipFlop(FlipFlopInputs {
                d: self.read_pin(pins, "d"),
                clock: self.read_pin(pins, "clk"),
                preset: self.read_pin(pins, "pre"),
                clear: self.read_pin(pins, "clr"),
            }),
            ComponentKind::Register { state, .. } => KindInputs::Register(RegisterInputs {
                d: self.read_group(pins, "d", state.width()),
                clock: self.read_pin(pins, "clk"),
                preset: self.read_pin(pins, "pre"),
                clear: self.read_pin(pins, "clr"),
            }),
            ComponentKind::Counter { .. } => KindInputs::Counter(CounterInputs {
                clock: self.read_pin(pins, "clk"),
                preset: self.read_pin(pins, "pre"),
                clear: self.read_pin(pins, "clr"),
            }),
            ComponentKind::Memory { state, .. } => KindInputs::Memory(MemoryInputs {
                address: self.read_group(pins, "addr", state.addr_bits()),
                data: self.read_group(pins, "d", state.width()),
                write_enable: self.read_pin(pins, "we"),
                clock: self.read_pin(pins, "clk"),
                clear: self.read_pin(pins, "clr"),
            }),
            ComponentKind::Cpu { state, .. } => {
                let params = state.params();
                KindInputs::Cpu(CpuInputs {
                    instr: self.read_group(pins, "instr", params.word_bits()),
                    data_in: self.read_group(pins, "data_in", params.data_bits),
                    clock_a: self.read_pin(pins, "clk_a"),
                    clock_b: self.read_pin(pins, "clk_b"),
                    speed: self.read_pin(pins, "speed"),
                    run: self.read_pin(pins, "run"),
                    step: self.read_pin(pins, "step"),
                    reset: self.read_pin(pins, "reset"),
                })
            }
        }
    }

    /// The earliest time any pending wire entry becomes due.
    fn earliest_wire_due(&self) -> Option<u64> {
        self.to_propagate
            .iter()
            .filter_map(|item| match item {
                Propagate::Wire(id) => self.wires.get(*id).and_then(|w| w.next_due()),
                Propagate::Component(_) => None,
            })
            .min()
    }
}

fn drive_single(drives: &mut Vec<(NodeId, Logic)>, pins: &PinSet, role: &str, value: Logic) {
    if let Some(node) = pins.get(role) {
        drives.push((node, value));
    }
}

fn drive_group(drives: &mut Vec<(NodeId, Logic)>, pins: &PinSet, role: &str, value: &LogicVec) {
    if let Some(nodes) = pins.group(role) {
        for (i, &node) in nodes.iter().enumerate().take(value.width() as usize) {
            drives.push((node, value.get(i as u32)));
        }
    }
}
