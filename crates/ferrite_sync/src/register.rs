//! Multi-bit edge-triggered register with load and count modes.

use crate::edge::{EdgeDetector, EdgeTrigger, SyncControl};
use crate::SyncError;
use ferrite_common::{Logic, LogicVec};
use serde::{Deserialize, Serialize};

/// What the register does on its trigger edge.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum RegisterMode {
    /// Latch the data input.
    Load,
    /// Add one to the current state; the data input is ignored.
    Increment,
    /// Subtract one from the current state; the data input is ignored.
    Decrement,
}

/// What happens when a counting register runs past its range.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Wrap around modulo 2^width.
    Wrap,
    /// Hold at the range limit.
    Saturate,
}

/// One sample of a register's input pins.
#[derive(Clone, Debug)]
pub struct RegisterInputs {
    /// Data input, latched in [`RegisterMode::Load`].
    pub d: LogicVec,
    /// Clock input.
    pub clock: Logic,
    /// Asynchronous preset (forces all ones).
    pub preset: Logic,
    /// Asynchronous clear (forces all zeros).
    pub clear: Logic,
}

/// The register's output pins after a sample.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RegisterOutputs {
    /// The latched state.
    pub q: LogicVec,
}

/// An edge-triggered register over a fixed-width lane vector.
///
/// In the invalid state (preset and clear asserted together) the outputs
/// degrade to all-`Unknown` until a control is released.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Register {
    width: u32,
    mode: RegisterMode,
    policy: OverflowPolicy,
    detector: EdgeDetector,
    bits: LogicVec,
    invalid: bool,
}

impl Register {
    /// Creates a register cleared to all zeros.
    pub fn new(
        width: u32,
        mode: RegisterMode,
        policy: OverflowPolicy,
        trigger: EdgeTrigger,
    ) -> Result<Self, SyncError> {
        if width == 0 || width > 64 {
            return Err(SyncError::BadWidth { width });
        }
        Ok(Self {
            width,
            mode,
            policy,
            detector: EdgeDetector::new(trigger),
            bits: LogicVec::all_false(width),
            invalid: false,
        })
    }

    /// Creates a plain loading register, the common case.
    pub fn loading(width: u32, trigger: EdgeTrigger) -> Result<Self, SyncError> {
        Self::new(width, RegisterMode::Load, OverflowPolicy::Wrap, trigger)
    }

    /// Returns the lane width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the latched state.
    pub fn q(&self) -> &LogicVec {
        &self.bits
    }

    /// Returns `true` while preset and clear were last asserted together.
    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// Directly overwrites the latched state (restore/composite wiring).
    ///
    /// # Panics
    ///
    /// Panics if the value's width differs from the register's.
    pub fn load(&mut self, value: LogicVec) {
        assert_eq!(value.width(), self.width, "register width mismatch");
        self.bits = value.definite();
        self.invalid = false;
    }

    /// Samples the inputs and applies one transition.
    ///
    /// # Panics
    ///
    /// Panics if the data input's width differs from the register's.
    pub fn sample(&mut self, inputs: &RegisterInputs) -> RegisterOutputs {
        assert_eq!(inputs.d.width(), self.width, "register width mismatch");
        let edge = self.detector.sample(inputs.clock);
        match SyncControl::resolve(inputs.preset, inputs.clear, edge) {
            SyncControl::Invalid => self.invalid = true,
            SyncControl::Preset => {
                self.invalid = false;
                self.bits = LogicVec::all_true(self.width);
            }
            SyncControl::Clear => {
                self.invalid = false;
                self.bits = LogicVec::all_false(self.width);
            }
            SyncControl::Edge => {
                self.invalid = false;
                self.bits = match self.mode {
                    RegisterMode::Load => inputs.d.definite(),
                    RegisterMode::Increment => match self.policy {
                        OverflowPolicy::Wrap => self.bits.wrapping_inc().0,
                        OverflowPolicy::Saturate => self.bits.saturating_inc().0,
                    },
                    RegisterMode::Decrement => match self.policy {
                        OverflowPolicy::Wrap => self.bits.wrapping_dec().0,
                        OverflowPolicy::Saturate => self.bits.saturating_dec().0,
                    },
                };
            }
            SyncControl::Hold => self.invalid = false,
        }
        self.outputs()
    }

    /// Returns the current output pins without sampling.
    pub fn outputs(&self) -> RegisterOutputs {
        RegisterOutputs {
            q: if self.invalid {
                LogicVec::all_unknown(self.width)
            } else {
                self.bits.clone()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_common::Logic::*;

    fn load_inputs(d: LogicVec, clock: Logic) -> RegisterInputs {
        RegisterInputs {
            d,
            clock,
            preset: False,
            clear: False,
        }
    }

    fn tick(reg: &mut Register, d: LogicVec) -> RegisterOutputs {
        reg.sample(&load_inputs(d.clone(), False));
        reg.sample(&load_inputs(d, True))
    }

    #[test]
    fn bad_width_rejected() {
        assert_eq!(
            Register::loading(0, EdgeTrigger::Rising).unwrap_err(),
            SyncError::BadWidth { width: 0 }
        );
        assert!(Register::loading(65, EdgeTrigger::Rising).is_err());
    }

    #[test]
    fn load_roundtrip_rising() {
        let mut reg = Register::loading(4, EdgeTrigger::Rising).unwrap();
        for value in 0..16u64 {
            let out = tick(&mut reg, LogicVec::from_u64(value, 4));
            assert_eq!(out.q.to_u64(), Some(value));
        }
    }

    #[test]
    fn load_roundtrip_falling() {
        let mut reg = Register::loading(4, EdgeTrigger::Falling).unwrap();
        for value in 0..16u64 {
            reg.sample(&load_inputs(LogicVec::from_u64(value, 4), True));
            let out = reg.sample(&load_inputs(LogicVec::from_u64(value, 4), False));
            assert_eq!(out.q.to_u64(), Some(value));
        }
    }

    #[test]
    fn increment_mode_wraps() {
        let mut reg = Register::new(
            2,
            RegisterMode::Increment,
            OverflowPolicy::Wrap,
            EdgeTrigger::Rising,
        )
        .unwrap();
        let d = LogicVec::all_false(2);
        for expected in [1u64, 2, 3, 0, 1] {
            let out = tick(&mut reg, d.clone());
            assert_eq!(out.q.to_u64(), Some(expected));
        }
    }

    #[test]
    fn increment_mode_saturates() {
        let mut reg = Register::new(
            2,
            RegisterMode::Increment,
            OverflowPolicy::Saturate,
            EdgeTrigger::Rising,
        )
        .unwrap();
        let d = LogicVec::all_false(2);
        for expected in [1u64, 2, 3, 3] {
            let out = tick(&mut reg, d.clone());
            assert_eq!(out.q.to_u64(), Some(expected));
        }
    }

    #[test]
    fn decrement_mode_wraps() {
        let mut reg = Register::new(
            3,
            RegisterMode::Decrement,
            OverflowPolicy::Wrap,
            EdgeTrigger::Rising,
        )
        .unwrap();
        let d = LogicVec::all_false(3);
        let out = tick(&mut reg, d);
        assert_eq!(out.q.to_u64(), Some(7));
    }

    #[test]
    fn preset_and_clear_precedence() {
        let mut reg = Register::loading(4, EdgeTrigger::Rising).unwrap();
        let d = LogicVec::from_u64(5, 4);
        let out = reg.sample(&RegisterInputs {
            d: d.clone(),
            clock: False,
            preset: True,
            clear: False,
        });
        assert!(out.q.is_all_true());
        let out = reg.sample(&RegisterInputs {
            d: d.clone(),
            clock: False,
            preset: False,
            clear: True,
        });
        assert!(out.q.is_all_false());
        let out = reg.sample(&RegisterInputs {
            d,
            clock: False,
            preset: True,
            clear: True,
        });
        assert!(reg.is_invalid());
        assert_eq!(out.q, LogicVec::all_unknown(4));
    }

    #[test]
    fn indeterminate_lanes_latch_unknown() {
        let mut reg = Register::loading(4, EdgeTrigger::Rising).unwrap();
        let d = LogicVec::from_lanes_str("1Z0X").unwrap();
        let out = tick(&mut reg, d);
        assert_eq!(format!("{}", out.q), "1X0X");
    }

    #[test]
    fn serde_roundtrip() {
        let mut reg = Register::loading(8, EdgeTrigger::Rising).unwrap();
        reg.load(LogicVec::from_u64(0xA5, 8));
        let json = serde_json::to_string(&reg).unwrap();
        let back: Register = serde_json::from_str(&json).unwrap();
        assert_eq!(back.q().to_u64(), Some(0xA5));
    }
}
