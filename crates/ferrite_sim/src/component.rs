//! Components: named pin sets plus a closed enum of simulation kinds.

use ferrite_common::{Frequency, Logic, LogicVec};
use ferrite_cpu::{AluResult, Cpu, CpuOutputs, CpuParams};
use ferrite_graph::{ComponentId, PinSet};
use ferrite_sync::{
    Counter, CounterOutputs, EdgeTrigger, FlipFlop, FlipFlopOutputs, Memory, MemoryKind,
    MemoryOutputs, OverflowPolicy, Register, RegisterMode, RegisterOutputs,
};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a component.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ComponentPhase {
    /// Being placed: nodes exist but the component has not settled yet.
    Spawning,
    /// Live and participating in simulation.
    Spawned,
    /// An edge-triggered element with preset and clear asserted together.
    Invalid,
}

/// Combinational gate functions.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum GateKind {
    /// Pass-through buffer (single input).
    Buf,
    /// Inverter (single input).
    Not,
    /// N-input AND.
    And,
    /// N-input OR.
    Or,
    /// N-input XOR.
    Xor,
}

impl GateKind {
    /// Display name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            GateKind::Buf => "BUF",
            GateKind::Not => "NOT",
            GateKind::And => "AND",
            GateKind::Or => "OR",
            GateKind::Xor => "XOR",
        }
    }

    /// Folds the gate function over the sampled input values.
    pub fn eval(self, inputs: &[Logic]) -> Logic {
        let mut values = inputs.iter().map(|v| v.definite());
        match self {
            GateKind::Buf => values.next().unwrap_or(Logic::Unknown),
            GateKind::Not => !values.next().unwrap_or(Logic::Unknown),
            GateKind::And => values.fold(Logic::True, |acc, v| acc & v),
            GateKind::Or => values.fold(Logic::False, |acc, v| acc | v),
            GateKind::Xor => values.fold(Logic::False, |acc, v| acc ^ v),
        }
    }
}

/// Construction request for one component, consumed by
/// [`SimInstance::add_component`](crate::SimInstance::add_component).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ComponentSpec {
    /// A combinational gate with `inputs` input pins.
    Gate {
        /// The gate function.
        kind: GateKind,
        /// Number of input pins (exactly 1 for BUF/NOT, at least 2 otherwise).
        inputs: u32,
        /// Optional initial output value, used to stabilize feedback loops.
        initial: Option<Logic>,
    },
    /// A standalone ALU over `width`-lane operands.
    Alu {
        /// Operand width.
        width: u32,
    },
    /// A free-running oscillator toggling every half period.
    Clock {
        /// The advertised rate; converted to logical ticks on construction.
        frequency: Frequency,
    },
    /// A single-bit D flip-flop.
    FlipFlop {
        /// Clock edge configuration.
        trigger: EdgeTrigger,
    },
    /// A multi-bit register.
    Register {
        /// Lane width.
        width: u32,
        /// Load or count behavior on the trigger edge.
        mode: RegisterMode,
        /// Wrap or saturate when counting past the range.
        policy: OverflowPolicy,
        /// Clock edge configuration.
        trigger: EdgeTrigger,
    },
    /// A modulo counter with an overflow flag.
    Counter {
        /// Lane width.
        width: u32,
        /// Clock edge configuration.
        trigger: EdgeTrigger,
    },
    /// An addressed RAM or ROM.
    Memory {
        /// RAM or ROM.
        kind: MemoryKind,
        /// Address width (2^bits rows).
        addr_bits: u32,
        /// Row width.
        width: u32,
        /// Clock edge configuration.
        trigger: EdgeTrigger,
        /// Optional initial rows (a ROM image or restored snapshot).
        contents: Option<Vec<LogicVec>>,
    },
    /// The micro-programmed CPU composite.
    Cpu(CpuParams),
}

/// The current state payload of one component kind.
///
/// Each variant carries its primitive state plus the last computed output
/// snapshot, the component's opaque value. The scheduler dispatches over
/// this enum exhaustively; there is no open-ended component registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ComponentKind {
    /// Combinational gate.
    Gate {
        /// The gate function.
        op: GateKind,
        /// Last computed output.
        value: Logic,
    },
    /// Standalone ALU.
    Alu {
        /// Operand width.
        width: u32,
        /// Last computed result/carry/zero snapshot.
        value: AluResult,
    },
    /// Oscillator.
    Clock {
        /// The advertised rate.
        frequency: Frequency,
        /// Ticks between output toggles.
        half_period: u64,
        /// Current output level.
        level: Logic,
        /// Logical time of the next toggle.
        next_toggle: u64,
    },
    /// D flip-flop.
    FlipFlop {
        /// Primitive state.
        state: FlipFlop,
        /// Last computed Q/NQ snapshot.
        value: FlipFlopOutputs,
    },
    /// Register.
    Register {
        /// Primitive state.
        state: Register,
        /// Last computed Q snapshot.
        value: RegisterOutputs,
    },
    /// Counter.
    Counter {
        /// Primitive state.
        state: Counter,
        /// Last computed count/overflow snapshot.
        value: CounterOutputs,
    },
    /// RAM/ROM.
    Memory {
        /// Primitive state.
        state: Memory,
        /// Last computed read snapshot.
        value: MemoryOutputs,
    },
    /// CPU composite.
    Cpu {
        /// Composite state.
        state: Box<Cpu>,
        /// Last derived output snapshot.
        value: CpuOutputs,
    },
}

impl ComponentKind {
    /// Short kind name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Gate { op, .. } => op.name(),
            ComponentKind::Alu { .. } => "ALU",
            ComponentKind::Clock { .. } => "CLOCK",
            ComponentKind::FlipFlop { .. } => "FLIPFLOP",
            ComponentKind::Register { .. } => "REGISTER",
            ComponentKind::Counter { .. } => "COUNTER",
            ComponentKind::Memory { .. } => "MEMORY",
            ComponentKind::Cpu { .. } => "CPU",
        }
    }
}

/// A live component: fixed pin sets, a lifecycle phase, and its kind state.
#[derive(Debug)]
pub struct Component {
    id: ComponentId,
    phase: ComponentPhase,
    /// Named input pins and groups; fixed after construction.
    pub(crate) inputs: PinSet,
    /// Named output pins and groups; fixed after construction.
    pub(crate) outputs: PinSet,
    /// Kind state and opaque value.
    pub(crate) kind: ComponentKind,
}

impl Component {
    pub(crate) fn new(id: ComponentId, kind: ComponentKind) -> Self {
        Self {
            id,
            phase: ComponentPhase::Spawning,
            inputs: PinSet::new(),
            outputs: PinSet::new(),
            kind,
        }
    }

    /// Returns this component's id.
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Returns the lifecycle phase.
    pub fn phase(&self) -> ComponentPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: ComponentPhase) {
        self.phase = phase;
    }

    /// Returns the named input pins.
    pub fn inputs(&self) -> &PinSet {
        &self.inputs
    }

    /// Returns the named output pins.
    pub fn outputs(&self) -> &PinSet {
        &self.outputs
    }

    /// Returns the kind state.
    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_common::Logic::*;

    #[test]
    fn gate_eval_basics() {
        assert_eq!(GateKind::Buf.eval(&[True]), True);
        assert_eq!(GateKind::Not.eval(&[True]), False);
        assert_eq!(GateKind::And.eval(&[True, True, False]), False);
        assert_eq!(GateKind::And.eval(&[True, True]), True);
        assert_eq!(GateKind::Or.eval(&[False, False]), False);
        assert_eq!(GateKind::Or.eval(&[False, True]), True);
        assert_eq!(GateKind::Xor.eval(&[True, True]), False);
        assert_eq!(GateKind::Xor.eval(&[True, False, True]), False);
    }

    #[test]
    fn gate_eval_collapses_high_z() {
        // An undriven input reads as Unknown, not as a phantom level.
        assert_eq!(GateKind::Buf.eval(&[HighZ]), Unknown);
        assert_eq!(GateKind::Not.eval(&[HighZ]), Unknown);
        assert_eq!(GateKind::And.eval(&[HighZ, True]), Unknown);
        // Zero still dominates AND regardless of unknowns.
        assert_eq!(GateKind::And.eval(&[HighZ, False]), False);
        assert_eq!(GateKind::Or.eval(&[HighZ, True]), True);
    }

    #[test]
    fn spec_serde_roundtrip() {
        let spec = ComponentSpec::Memory {
            kind: MemoryKind::Rom,
            addr_bits: 4,
            width: 8,
            trigger: EdgeTrigger::Rising,
            contents: None,
        };
        let json = serde_json::to_string(&spec).unwrap();
        let back: ComponentSpec = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            ComponentSpec::Memory {
                addr_bits: 4,
                width: 8,
                ..
            }
        ));
    }

    #[test]
    fn component_lifecycle() {
        let mut c = Component::new(
            ComponentId::from_raw(0),
            ComponentKind::Gate {
                op: GateKind::Not,
                value: Logic::Unknown,
            },
        );
        assert_eq!(c.phase(), ComponentPhase::Spawning);
        c.set_phase(ComponentPhase::Spawned);
        assert_eq!(c.phase(), ComponentPhase::Spawned);
        assert_eq!(c.kind().name(), "NOT");
    }
}
