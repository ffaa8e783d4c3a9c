//! The pipeline status feed consumed by the display layer.

use std::fmt::Write;

/// Number of pipeline stages.
pub const STAGE_COUNT: usize = 4;

/// One pipeline stage of the composite machine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stage {
    /// Instruction fetch.
    Fetch,
    /// Opcode decode.
    Decode,
    /// Jumps, calls, and ALU evaluation.
    Execute,
    /// Accumulator, flag, and RAM write effects.
    Writeback,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; STAGE_COUNT] = [
        Stage::Fetch,
        Stage::Decode,
        Stage::Execute,
        Stage::Writeback,
    ];

    /// The color token the display layer paints this stage with.
    pub fn color_token(self) -> &'static str {
        match self {
            Stage::Fetch => "yellow",
            Stage::Decode => "orange",
            Stage::Execute => "red",
            Stage::Writeback => "magenta",
        }
    }
}

/// Formats the per-stage instruction addresses as the status feed string:
/// one `address:colorToken` pair per stage joined with `+`, with `-1` for a
/// stage holding no instruction.
pub fn format_status(stage_addrs: &[Option<u64>; STAGE_COUNT]) -> String {
    let mut out = String::new();
    for (index, stage) in Stage::ALL.iter().enumerate() {
        if index > 0 {
            out.push('+');
        }
        match stage_addrs[index] {
            Some(addr) => {
                let _ = write!(out, "{addr}:{}", stage.color_token());
            }
            None => {
                let _ = write!(out, "-1:{}", stage.color_token());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_pipeline() {
        let s = format_status(&[Some(3), Some(2), Some(1), Some(0)]);
        assert_eq!(s, "3:yellow+2:orange+1:red+0:magenta");
    }

    #[test]
    fn empty_stages_are_minus_one() {
        let s = format_status(&[Some(0), None, None, None]);
        assert_eq!(s, "0:yellow+-1:orange+-1:red+-1:magenta");
    }

    #[test]
    fn all_empty() {
        let s = format_status(&[None; STAGE_COUNT]);
        assert_eq!(s, "-1:yellow+-1:orange+-1:red+-1:magenta");
    }
}
