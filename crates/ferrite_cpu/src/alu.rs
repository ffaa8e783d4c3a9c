//! ALU operations shared by the CPU decode and the standalone ALU component.

use ferrite_common::{Logic, LogicVec};
use serde::{Deserialize, Serialize};

/// The eight ALU operations, addressed by a 3-bit select code.
///
/// The select table is laid out so the arithmetic/logic opcodes of the CPU
/// instruction set feed their low three opcode bits straight into
/// [`from_select`](AluOp::from_select): ADD is select 3, SUB 4, AND 5, OR 6,
/// XOR 7. Selects 0..=2 are only reachable from the standalone ALU's select
/// pins.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum AluOp {
    /// A + 1.
    Inc,
    /// A - 1.
    Dec,
    /// Lane-wise complement of A.
    Not,
    /// A + B with carry out.
    Add,
    /// A - B with borrow out on the carry lane.
    Sub,
    /// Lane-wise A & B.
    And,
    /// Lane-wise A | B.
    Or,
    /// Lane-wise A ^ B.
    Xor,
}

impl AluOp {
    /// Looks up the operation for a 3-bit select code. Total: the code is
    /// masked to three bits.
    pub fn from_select(select: u8) -> Self {
        match select & 0b111 {
            0 => AluOp::Inc,
            1 => AluOp::Dec,
            2 => AluOp::Not,
            3 => AluOp::Add,
            4 => AluOp::Sub,
            5 => AluOp::And,
            6 => AluOp::Or,
            _ => AluOp::Xor,
        }
    }

    /// Decodes a 3-lane select vector, or `None` when any lane is
    /// indeterminate.
    pub fn from_lanes(select: &LogicVec) -> Option<Self> {
        debug_assert_eq!(select.width(), 3, "ALU select is three lanes");
        select.to_u64().map(|bits| Self::from_select(bits as u8))
    }

    /// Returns `true` for the two-operand operations that read B.
    pub fn uses_b(self) -> bool {
        matches!(self, AluOp::Add | AluOp::Sub | AluOp::And | AluOp::Or | AluOp::Xor)
    }

    /// Evaluates the operation over 4-state operands.
    ///
    /// Any indeterminate lane in an operand the operation reads degrades
    /// the result to all-`Unknown` with `Unknown` flags.
    ///
    /// # Panics
    ///
    /// Panics if the operand widths differ.
    pub fn eval(self, a: &LogicVec, b: &LogicVec) -> AluResult {
        assert_eq!(a.width(), b.width(), "ALU operand width mismatch");
        let width = a.width();
        if a.has_indeterminate() || (self.uses_b() && b.has_indeterminate()) {
            return AluResult {
                value: LogicVec::all_unknown(width),
                carry: Logic::Unknown,
                zero: Logic::Unknown,
            };
        }
        let (value, carry) = match self {
            AluOp::Inc => {
                let (v, wrapped) = a.wrapping_inc();
                (v, Logic::from_bool(wrapped))
            }
            AluOp::Dec => {
                let (v, wrapped) = a.wrapping_dec();
                (v, Logic::from_bool(wrapped))
            }
            AluOp::Not => (!a, Logic::False),
            AluOp::Add => a.add(b),
            AluOp::Sub => a.sub(b),
            AluOp::And => (a & b, Logic::False),
            AluOp::Or => (a | b, Logic::False),
            AluOp::Xor => (a ^ b, Logic::False),
        };
        let zero = Logic::from_bool(value.is_all_false());
        AluResult { value, carry, zero }
    }
}

/// The outcome of one ALU evaluation.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AluResult {
    /// The result lanes.
    pub value: LogicVec,
    /// Carry out of an addition, borrow out of a subtraction, wrap out of
    /// increment/decrement, `False` for the lane-wise operations.
    pub carry: Logic,
    /// `True` when every result lane is `False`.
    pub zero: Logic,
}
