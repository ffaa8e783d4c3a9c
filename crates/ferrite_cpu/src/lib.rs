//! The CPU composite machine of the Ferrite simulation kernel.
//!
//! A small-ISA microarchitecture assembled entirely from the synchronous
//! primitives in `ferrite_sync`: a four-stage FETCH/DECODE/EXECUTE/WRITEBACK
//! pipeline (optionally serialized through a one-hot stage-enable chain),
//! a 16-opcode instruction set, an ALU shared with the standalone ALU
//! component, and a RAM-backed subroutine call stack.
//!
//! Like the primitives it is built from, the [`Cpu`] is a pure sampled
//! machine: every recalculation re-derives its combinational control logic
//! and advances its registers only when the gated clock shows the
//! configured edge.

#![warn(missing_docs)]

pub mod alu;
pub mod isa;
pub mod machine;
pub mod status;

pub use alu::{AluOp, AluResult};
pub use isa::{ControlWord, JumpCond, JumpDir, Opcode, OPCODE_BITS};
pub use machine::{Cpu, CpuInputs, CpuOutputs, CpuParams};
pub use status::{format_status, Stage, STAGE_COUNT};

/// Errors from constructing a CPU with unsupported parameters.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CpuError {
    /// Instruction-address width outside {4, 8}.
    #[error("unsupported instruction address width {bits} (expected 4 or 8)")]
    BadInstrAddrBits {
        /// The rejected width.
        bits: u32,
    },

    /// Data width outside 1..=16.
    #[error("unsupported data width {bits} (expected 1..=16)")]
    BadDataBits {
        /// The rejected width.
        bits: u32,
    },

    /// Stack-pointer width outside 1..=3.
    #[error("unsupported stack pointer width {bits} (expected 1..=3)")]
    BadStackPtrBits {
        /// The rejected width.
        bits: u32,
    },
}
