//! The composite CPU machine assembled from synchronous primitives.

use crate::alu::AluOp;
use crate::isa::{self, JumpCond, JumpDir, Opcode};
use crate::status::{format_status, STAGE_COUNT};
use crate::CpuError;
use ferrite_common::{Logic, LogicVec};
use ferrite_sync::{
    Counter, CounterInputs, EdgeDetector, EdgeTrigger, FlipFlop, FlipFlopInputs, Memory,
    MemoryInputs, MemoryKind, Register, RegisterInputs,
};
use serde::{Deserialize, Serialize};

/// Construction parameters of the CPU composite.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CpuParams {
    /// Width of the program counter and instruction addresses (4 or 8).
    pub instr_addr_bits: u32,
    /// Width of the accumulator and the external data bus (1..=16).
    pub data_bits: u32,
    /// Width of the call-stack pointer (1..=3).
    pub stack_ptr_bits: u32,
    /// All four stages active every tick, instead of the one-hot chain.
    pub pipelined: bool,
    /// Jump operands load the program counter as absolute addresses,
    /// bypassing the displacement adder.
    pub direct_addressing: bool,
    /// Which clock edge advances the machine.
    pub trigger: EdgeTrigger,
}

impl Default for CpuParams {
    fn default() -> Self {
        Self {
            instr_addr_bits: 4,
            data_bits: 4,
            stack_ptr_bits: 2,
            pipelined: false,
            direct_addressing: false,
            trigger: EdgeTrigger::Rising,
        }
    }
}

impl CpuParams {
    /// Validates the parameter ranges.
    pub fn validate(&self) -> Result<(), CpuError> {
        if self.instr_addr_bits != 4 && self.instr_addr_bits != 8 {
            return Err(CpuError::BadInstrAddrBits {
                bits: self.instr_addr_bits,
            });
        }
        if self.data_bits == 0 || self.data_bits > 16 {
            return Err(CpuError::BadDataBits {
                bits: self.data_bits,
            });
        }
        if self.stack_ptr_bits == 0 || self.stack_ptr_bits > 3 {
            return Err(CpuError::BadStackPtrBits {
                bits: self.stack_ptr_bits,
            });
        }
        Ok(())
    }

    /// Width of the instruction operand field.
    pub fn operand_bits(&self) -> u32 {
        self.instr_addr_bits.max(self.data_bits)
    }

    /// Width of a full instruction word (opcode + operand).
    pub fn word_bits(&self) -> u32 {
        self.operand_bits() + isa::OPCODE_BITS
    }
}

/// One sample of the CPU's input pins.
#[derive(Clone, Debug)]
pub struct CpuInputs {
    /// Instruction word presented by program memory at `instr_addr`.
    pub instr: LogicVec,
    /// Data bus from external RAM at `data_addr`.
    pub data_in: LogicVec,
    /// First oscillator input.
    pub clock_a: Logic,
    /// Second oscillator input.
    pub clock_b: Logic,
    /// Clock source select: `True` picks `clock_b`.
    pub speed: Logic,
    /// Run/stop level into the run-state flip-flop.
    pub run: Logic,
    /// Manual step pulse, clocks the machine while stopped.
    pub step: Logic,
    /// Asynchronous reset pulse; ineffective while running.
    pub reset: Logic,
}

impl CpuInputs {
    /// A quiescent input sample: all-zero buses, clocks low, stopped.
    pub fn idle(params: &CpuParams) -> Self {
        Self {
            instr: LogicVec::all_false(params.word_bits()),
            data_in: LogicVec::all_false(params.data_bits),
            clock_a: Logic::False,
            clock_b: Logic::False,
            speed: Logic::False,
            run: Logic::False,
            step: Logic::False,
            reset: Logic::False,
        }
    }
}

/// The CPU's output pins, re-derived on every recalculation.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CpuOutputs {
    /// Program-memory address of the next fetch.
    pub instr_addr: LogicVec,
    /// External data RAM address of the instruction in writeback.
    pub data_addr: LogicVec,
    /// Data bus toward external RAM (the accumulator).
    pub data_out: LogicVec,
    /// Raw RAM write request.
    pub ram_write: Logic,
    /// RAM write request gated by the clock level.
    pub ram_write_sync: Logic,
    /// The reset-state flip-flop, set by reset until the next edge.
    pub reset_sync: Logic,
    /// The gated clock made visible to the outside.
    pub clock_sync: Logic,
    /// Zero flag.
    pub zero: Logic,
    /// Carry flag.
    pub carry: Logic,
    /// Call-stack overflow/underflow latch.
    pub stack_overflow: Logic,
    /// Halt latch, set by the decoded HALT convention.
    pub halt: Logic,
    /// Run-state flip-flop.
    pub running: Logic,
}

impl CpuOutputs {
    /// The all-false safe state driven while the decode is unresolved.
    pub fn safe(params: &CpuParams) -> Self {
        Self {
            instr_addr: LogicVec::all_false(params.instr_addr_bits),
            data_addr: LogicVec::all_false(params.operand_bits()),
            data_out: LogicVec::all_false(params.data_bits),
            ram_write: Logic::False,
            ram_write_sync: Logic::False,
            reset_sync: Logic::False,
            clock_sync: Logic::False,
            zero: Logic::False,
            carry: Logic::False,
            stack_overflow: Logic::False,
            halt: Logic::False,
            running: Logic::False,
        }
    }
}

/// Next-state values planned for one tick, computed from pre-tick state.
struct TickPlan {
    pc_d: LogicVec,
    acc_d: LogicVec,
    zero_d: Logic,
    carry_d: Logic,
    ir_decode_d: LogicVec,
    ir_execute_d: LogicVec,
    ir_writeback_d: LogicVec,
    sp_d: LogicVec,
    stack_addr: LogicVec,
    stack_data: LogicVec,
    stack_we: Logic,
    ovf_d: Logic,
    halt_d: Logic,
    refetch_d: Logic,
    enables_d: [Logic; STAGE_COUNT],
    stage_addr_next: [Option<u64>; STAGE_COUNT],
}

/// The micro-programmed CPU composite.
///
/// A fixed topology of `ferrite_sync` primitives: program counter,
/// accumulator, flag flip-flops, three stage latches, a one-hot
/// stage-enable chain, run/halt/reset/refetch control flip-flops, a stack
/// pointer, a cycle counter, and a RAM-backed call stack. Every
/// [`sample`](Cpu::sample) re-derives the combinational control logic and
/// drives all primitives with the gated clock; state advances only on the
/// configured edge or through the asynchronous reset path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    params: CpuParams,
    clock_edge: EdgeDetector,
    pc: Register,
    acc: Register,
    zero_ff: FlipFlop,
    carry_ff: FlipFlop,
    /// Instruction occupying the DECODE stage.
    ir_decode: Register,
    /// Instruction occupying the EXECUTE stage.
    ir_execute: Register,
    /// Instruction occupying the WRITEBACK stage.
    ir_writeback: Register,
    stage_enable: [FlipFlop; STAGE_COUNT],
    run_ff: FlipFlop,
    halt_ff: FlipFlop,
    reset_ff: FlipFlop,
    refetch_ff: FlipFlop,
    clock_sync_ff: FlipFlop,
    stack_ptr: Register,
    stack_ovf: FlipFlop,
    cycle_counter: Counter,
    call_stack: Memory,
    /// Program-memory address of the instruction in each stage, display
    /// bookkeeping and the base for relative jumps.
    stage_addr: [Option<u64>; STAGE_COUNT],
    events: Vec<String>,
    outputs: CpuOutputs,
}

impl Cpu {
    /// Creates a CPU in its post-reset idle state.
    pub fn new(params: CpuParams) -> Result<Self, CpuError> {
        params.validate()?;
        let t = params.trigger;
        let word = params.word_bits();
        let reg = |width| Register::loading(width, t).expect("validated width");
        let mut fetch_enable = FlipFlop::new(t);
        fetch_enable.load(Logic::True);
        let outputs = CpuOutputs::safe(&params);
        Ok(Self {
            clock_edge: EdgeDetector::new(t),
            pc: reg(params.instr_addr_bits),
            acc: reg(params.data_bits),
            zero_ff: FlipFlop::new(t),
            carry_ff: FlipFlop::new(t),
            ir_decode: reg(word),
            ir_execute: reg(word),
            ir_writeback: reg(word),
            stage_enable: [
                fetch_enable,
                FlipFlop::new(t),
                FlipFlop::new(t),
                FlipFlop::new(t),
            ],
            run_ff: FlipFlop::new(t),
            halt_ff: FlipFlop::new(t),
            reset_ff: FlipFlop::new(t),
            refetch_ff: FlipFlop::new(t),
            clock_sync_ff: FlipFlop::new(t),
            stack_ptr: reg(params.stack_ptr_bits),
            stack_ovf: FlipFlop::new(t),
            cycle_counter: Counter::new(8, t).expect("validated width"),
            call_stack: Memory::new(
                MemoryKind::Ram,
                params.stack_ptr_bits,
                params.instr_addr_bits,
                t,
            )
            .expect("validated width"),
            stage_addr: [None; STAGE_COUNT],
            events: Vec::new(),
            outputs,
            params,
        })
    }

    /// Returns the construction parameters.
    pub fn params(&self) -> &CpuParams {
        &self.params
    }

    /// Returns the last derived output snapshot.
    pub fn outputs(&self) -> &CpuOutputs {
        &self.outputs
    }

    /// Returns the program counter.
    pub fn program_counter(&self) -> &LogicVec {
        self.pc.q()
    }

    /// Returns the accumulator.
    pub fn accumulator(&self) -> &LogicVec {
        self.acc.q()
    }

    /// Returns the call-stack pointer.
    pub fn stack_pointer(&self) -> &LogicVec {
        self.stack_ptr.q()
    }

    /// Returns the free-running cycle number.
    pub fn cycle_count(&self) -> &LogicVec {
        self.cycle_counter.q()
    }

    /// Returns `true` once the halt latch has been set.
    pub fn is_halted(&self) -> bool {
        self.halt_ff.q() == Logic::True
    }

    /// Per-stage instruction addresses, `None` for an empty stage.
    pub fn stage_addresses(&self) -> &[Option<u64>; STAGE_COUNT] {
        &self.stage_addr
    }

    /// Drains the pipeline status strings emitted since the last drain,
    /// one per detected clock edge or reset.
    pub fn take_events(&mut self) -> Vec<String> {
        std::mem::take(&mut self.events)
    }

    /// Samples the inputs: one full recalculation of the composite.
    ///
    /// # Panics
    ///
    /// Panics if the instruction or data bus width does not match the
    /// construction parameters.
    pub fn sample(&mut self, inputs: &CpuInputs) -> CpuOutputs {
        assert_eq!(
            inputs.instr.width(),
            self.params.word_bits(),
            "instruction bus width mismatch"
        );
        assert_eq!(
            inputs.data_in.width(),
            self.params.data_bits,
            "data bus width mismatch"
        );

        // Run/stop follows its input level whenever the level is driven.
        if let Some(run) = inputs.run.definite().as_bool() {
            self.run_ff.load(Logic::from_bool(run));
        }
        let running = self.run_ff.q() == Logic::True;
        let halted = self.halt_ff.q() == Logic::True;

        // Clock source selection, then halt/run gating. The frozen level is
        // the trigger's pre-edge level so freezing cannot fire an edge.
        let source = if inputs.speed == Logic::True {
            inputs.clock_b
        } else {
            inputs.clock_a
        };
        let frozen = match self.params.trigger {
            EdgeTrigger::Rising => Logic::False,
            EdgeTrigger::Falling => Logic::True,
        };
        let clock = if halted {
            frozen
        } else if running {
            source
        } else {
            inputs.step
        };

        let resetting = inputs.reset == Logic::True && !running;
        let edge = self.clock_edge.sample(clock);

        let plan = self.plan(inputs);
        self.drive_primitives(&plan, clock, resetting);
        self.clock_sync_ff.load(clock);

        if resetting {
            self.stage_addr = [None; STAGE_COUNT];
        } else if edge {
            self.stage_addr = plan.stage_addr_next;
        }
        if resetting || edge {
            self.events.push(format_status(&self.stage_addr));
        }

        let outputs = self.derive_outputs();
        self.outputs = outputs.clone();
        outputs
    }

    /// Computes every primitive's next-state input from pre-tick state.
    fn plan(&self, inputs: &CpuInputs) -> TickPlan {
        let p = &self.params;
        let ob = p.operand_bits();
        let ab = p.instr_addr_bits;

        let enabled = |i: usize| self.stage_enable[i].q() == Logic::True;
        let active: [bool; STAGE_COUNT] = if p.pipelined {
            [true; STAGE_COUNT]
        } else {
            [enabled(0), enabled(1), enabled(2), enabled(3)]
        };
        let refetch = self.refetch_ff.q() == Logic::True;

        let mut plan = TickPlan {
            pc_d: self.pc.q().clone(),
            acc_d: self.acc.q().clone(),
            zero_d: self.zero_ff.q(),
            carry_d: self.carry_ff.q(),
            ir_decode_d: self.ir_decode.q().clone(),
            ir_execute_d: self.ir_execute.q().clone(),
            ir_writeback_d: self.ir_writeback.q().clone(),
            sp_d: self.stack_ptr.q().clone(),
            stack_addr: self.stack_ptr.q().clone(),
            stack_data: LogicVec::all_false(ab),
            stack_we: Logic::False,
            ovf_d: self.stack_ovf.q(),
            halt_d: self.halt_ff.q(),
            refetch_d: self.refetch_ff.q(),
            enables_d: if p.pipelined {
                [
                    self.stage_enable[0].q(),
                    self.stage_enable[1].q(),
                    self.stage_enable[2].q(),
                    self.stage_enable[3].q(),
                ]
            } else {
                // One-hot rotation: FETCH -> DECODE -> EXECUTE -> WRITEBACK.
                [
                    self.stage_enable[3].q(),
                    self.stage_enable[0].q(),
                    self.stage_enable[1].q(),
                    self.stage_enable[2].q(),
                ]
            },
            stage_addr_next: self.stage_addr,
        };

        // FETCH: capture the instruction bus, advance the program counter.
        if active[0] {
            plan.ir_decode_d = inputs.instr.definite();
            plan.pc_d = self.pc.q().wrapping_inc().0;
            plan.refetch_d = Logic::False;
            plan.stage_addr_next[0] = self.pc.q().to_u64();
            if !p.pipelined {
                plan.stage_addr_next[3] = None;
            }
        }

        // DECODE: shift the fetched instruction forward, detect HALT.
        if active[1] && !refetch {
            plan.ir_execute_d = self.ir_decode.q().clone();
            plan.stage_addr_next[1] = self.stage_addr[0];
            if !p.pipelined {
                plan.stage_addr_next[0] = None;
            }
            if let Some(Opcode::JmpD) = isa::opcode_of(self.ir_decode.q(), ob) {
                let (_, operand) = isa::split_word(self.ir_decode.q(), ob);
                let own = self.stage_addr[0];
                let self_jump = if p.direct_addressing {
                    matches!((low_lanes(&operand, ab).to_u64(), own), (Some(t), Some(a)) if t == a)
                } else {
                    operand.is_all_false()
                };
                if self_jump {
                    plan.halt_d = Logic::True;
                }
            }
        }

        // EXECUTE: shift forward, apply jumps and the call stack.
        if active[2] && !refetch {
            plan.ir_writeback_d = self.ir_execute.q().clone();
            plan.stage_addr_next[2] = self.stage_addr[1];
            if !p.pipelined {
                plan.stage_addr_next[1] = None;
            }
            if let Some(op) = isa::opcode_of(self.ir_execute.q(), ob) {
                let control = op.control();
                let (_, operand) = isa::split_word(self.ir_execute.q(), ob);
                let target = low_lanes(&operand, ab).definite();

                if let Some((cond, dir)) = control.jump {
                    let taken = match cond {
                        JumpCond::Always => true,
                        JumpCond::IfZero => self.zero_ff.q() == Logic::True,
                        JumpCond::IfCarry => self.carry_ff.q() == Logic::True,
                    };
                    if taken {
                        plan.pc_d = if p.direct_addressing {
                            target
                        } else {
                            relative_target(self.stage_addr[1], &operand, dir, ab)
                        };
                    }
                }
                if control.call {
                    let (sp_next, wrapped) = self.stack_ptr.q().wrapping_dec();
                    plan.stack_addr = sp_next.clone();
                    plan.stack_data = self.pc.q().clone();
                    plan.stack_we = Logic::True;
                    plan.sp_d = sp_next;
                    if wrapped {
                        plan.ovf_d = !self.stack_ovf.q();
                    }
                    plan.pc_d = target;
                }
                if control.ret {
                    plan.pc_d = match self.stack_ptr.q().to_index() {
                        Some(index) => self.call_stack.row(index).clone(),
                        None => LogicVec::all_unknown(ab),
                    };
                    let (sp_next, wrapped) = self.stack_ptr.q().wrapping_inc();
                    plan.sp_d = sp_next;
                    if wrapped {
                        plan.ovf_d = !self.stack_ovf.q();
                    }
                }
            }
        }

        // WRITEBACK: accumulator, flags, and the RAM write effect.
        if active[3] && !refetch {
            plan.stage_addr_next[3] = self.stage_addr[2];
            if !p.pipelined {
                plan.stage_addr_next[2] = None;
            }
            if let Some(op) = isa::opcode_of(self.ir_writeback.q(), ob) {
                let control = op.control();
                if control.acc_from_data {
                    plan.acc_d = inputs.data_in.definite();
                }
                if let Some(select) = control.alu_select {
                    let result = AluOp::from_select(select).eval(self.acc.q(), &inputs.data_in);
                    if control.acc_from_alu {
                        plan.acc_d = result.value;
                    }
                    plan.zero_d = result.zero;
                    plan.carry_d = result.carry;
                }
            }
        }

        plan
    }

    /// Drives every primitive with the gated clock and the planned inputs.
    fn drive_primitives(&mut self, plan: &TickPlan, clock: Logic, resetting: bool) {
        let clear = Logic::from_bool(resetting);
        let no = Logic::False;

        let reg = |d: &LogicVec| RegisterInputs {
            d: d.clone(),
            clock,
            preset: no,
            clear,
        };
        self.pc.sample(&reg(&plan.pc_d));
        self.acc.sample(&reg(&plan.acc_d));
        self.ir_decode.sample(&reg(&plan.ir_decode_d));
        self.ir_execute.sample(&reg(&plan.ir_execute_d));
        self.ir_writeback.sample(&reg(&plan.ir_writeback_d));
        self.stack_ptr.sample(&reg(&plan.sp_d));

        let ff = |d: Logic| FlipFlopInputs {
            d,
            clock,
            preset: no,
            clear,
        };
        self.zero_ff.sample(&ff(plan.zero_d));
        self.carry_ff.sample(&ff(plan.carry_d));
        self.stack_ovf.sample(&ff(plan.ovf_d));
        self.halt_ff.sample(&ff(plan.halt_d));

        // Reset presets the reset-state and refetch flip-flops; the next
        // edge lets them fall back through their D inputs.
        self.reset_ff.sample(&FlipFlopInputs {
            d: Logic::False,
            clock,
            preset: clear,
            clear: no,
        });
        self.refetch_ff.sample(&FlipFlopInputs {
            d: plan.refetch_d,
            clock,
            preset: clear,
            clear: no,
        });

        // The stage-enable chain restarts at FETCH on reset.
        for (index, enable) in self.stage_enable.iter_mut().enumerate() {
            enable.sample(&FlipFlopInputs {
                d: plan.enables_d[index],
                clock,
                preset: Logic::from_bool(resetting && index == 0),
                clear: Logic::from_bool(resetting && index != 0),
            });
        }

        self.cycle_counter.sample(&CounterInputs {
            clock,
            preset: no,
            clear,
        });
        self.call_stack.sample(&MemoryInputs {
            address: plan.stack_addr.clone(),
            data: plan.stack_data.clone(),
            write_enable: plan.stack_we,
            clock,
            clear,
        });
    }

    /// Re-derives the output pins from the primitives' current state.
    fn derive_outputs(&self) -> CpuOutputs {
        let p = &self.params;
        let ob = p.operand_bits();

        // An unresolved opcode anywhere in the pipeline forces the safe
        // all-false state instead of propagating partially-known results.
        let decode_op = isa::opcode_of(self.ir_decode.q(), ob);
        let execute_op = isa::opcode_of(self.ir_execute.q(), ob);
        let writeback_op = isa::opcode_of(self.ir_writeback.q(), ob);
        let (Some(_), Some(_), Some(writeback_op)) = (decode_op, execute_op, writeback_op) else {
            return CpuOutputs::safe(p);
        };

        let control = writeback_op.control();
        let (_, operand) = isa::split_word(self.ir_writeback.q(), ob);
        let addresses_ram = control.reads_data || control.ram_write;
        let data_addr = if addresses_ram {
            operand.definite()
        } else {
            LogicVec::all_false(ob)
        };
        if addresses_ram && data_addr.has_indeterminate() {
            return CpuOutputs::safe(p);
        }

        let writeback_live = p.pipelined || self.stage_enable[3].q() == Logic::True;
        let ram_write = Logic::from_bool(control.ram_write && writeback_live);

        CpuOutputs {
            instr_addr: self.pc.q().clone(),
            data_addr,
            data_out: self.acc.q().clone(),
            ram_write,
            ram_write_sync: ram_write & self.clock_sync_ff.q(),
            reset_sync: self.reset_ff.q(),
            clock_sync: self.clock_sync_ff.q(),
            zero: self.zero_ff.q(),
            carry: self.carry_ff.q(),
            stack_overflow: self.stack_ovf.q(),
            halt: self.halt_ff.q(),
            running: self.run_ff.q(),
        }
    }
}

/// Extracts the low `bits` lanes of a vector.
fn low_lanes(v: &LogicVec, bits: u32) -> LogicVec {
    debug_assert!(bits <= v.width());
    let mut out = LogicVec::all_false(bits);
    for i in 0..bits {
        out.set(i, v.get(i));
    }
    out
}

/// Computes a relative jump target from the jumping instruction's own
/// address, modulo the address space.
fn relative_target(
    own: Option<u64>,
    operand: &LogicVec,
    dir: JumpDir,
    addr_bits: u32,
) -> LogicVec {
    let (Some(own), Some(delta)) = (own, operand.to_u64()) else {
        return LogicVec::all_unknown(addr_bits);
    };
    let modulus = 1u64 << addr_bits;
    let target = match dir {
        JumpDir::Down => (own + delta) % modulus,
        JumpDir::Up => (own + modulus - (delta % modulus)) % modulus,
    };
    LogicVec::from_u64(target, addr_bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::assemble;
    use ferrite_common::Logic::{False, True};

    fn params() -> CpuParams {
        CpuParams::default()
    }

    /// Drives one full clock period (low then high sample for a rising
    /// trigger), refreshing the instruction bus from the program between
    /// the two samples the way settled wires would.
    fn tick(cpu: &mut Cpu, program: &[LogicVec], data_in: &LogicVec) -> CpuOutputs {
        let fetch = |cpu: &Cpu, program: &[LogicVec]| {
            let addr = cpu.outputs().instr_addr.to_u64().unwrap_or(0) as usize;
            program
                .get(addr)
                .cloned()
                .unwrap_or_else(|| LogicVec::all_false(cpu.params().word_bits()))
        };
        let mut inputs = CpuInputs {
            instr: fetch(cpu, program),
            data_in: data_in.clone(),
            clock_a: False,
            clock_b: False,
            speed: False,
            run: True,
            step: False,
            reset: False,
        };
        cpu.sample(&inputs);
        inputs.instr = fetch(cpu, program);
        inputs.clock_a = True;
        cpu.sample(&inputs)
    }

    fn reset(cpu: &mut Cpu) {
        let mut inputs = CpuInputs::idle(cpu.params());
        inputs.reset = True;
        cpu.sample(&inputs);
        inputs.reset = False;
        cpu.sample(&inputs);
    }

    fn nop_program(len: usize) -> Vec<LogicVec> {
        (0..len).map(|_| assemble(Opcode::Nop, 0, 4)).collect()
    }

    #[test]
    fn parameter_validation() {
        let mut p = params();
        p.instr_addr_bits = 5;
        assert_eq!(
            Cpu::new(p).unwrap_err(),
            CpuError::BadInstrAddrBits { bits: 5 }
        );
        let mut p = params();
        p.data_bits = 0;
        assert!(Cpu::new(p).is_err());
        let mut p = params();
        p.stack_ptr_bits = 4;
        assert!(Cpu::new(p).is_err());
    }

    #[test]
    fn nop_stream_increments_fetch_address_without_ram_writes() {
        let mut cpu = Cpu::new(params()).unwrap();
        reset(&mut cpu);
        let program = nop_program(16);
        let data = LogicVec::all_false(4);

        let mut fetch_addrs = Vec::new();
        for _ in 0..16 {
            let out = tick(&mut cpu, &program, &data);
            assert_eq!(out.ram_write, False, "NOP must never write RAM");
            assert_eq!(out.ram_write_sync, False);
            fetch_addrs.push(out.instr_addr.to_u64().unwrap());
        }
        // Non-pipelined: one fetch per four ticks, each advancing by one.
        assert_eq!(fetch_addrs[3], 1);
        assert_eq!(fetch_addrs[7], 2);
        assert_eq!(fetch_addrs[11], 3);
        assert_eq!(fetch_addrs[15], 4);
    }

    #[test]
    fn call_then_ret_restores_pc_and_stack() {
        let mut cpu = Cpu::new(params()).unwrap();
        reset(&mut cpu);
        // 0: CALL 5 / 5: RET, NOPs elsewhere.
        let mut program = nop_program(16);
        program[0] = assemble(Opcode::Call, 5, 4);
        program[5] = assemble(Opcode::Ret, 0, 4);
        let data = LogicVec::all_false(4);

        let sp_before = cpu.stack_pointer().to_u64().unwrap();
        let ovf_before = cpu.outputs().stack_overflow;

        // CALL instruction cycle (4 ticks) lands the PC on the target.
        for _ in 0..4 {
            tick(&mut cpu, &program, &data);
        }
        assert_eq!(cpu.program_counter().to_u64(), Some(5));

        // RET cycle brings it back to the call site + 1.
        for _ in 0..4 {
            tick(&mut cpu, &program, &data);
        }
        assert_eq!(cpu.program_counter().to_u64(), Some(1));
        assert_eq!(cpu.stack_pointer().to_u64(), Some(sp_before));
        assert_eq!(cpu.outputs().stack_overflow, ovf_before);
    }

    #[test]
    fn lda_loads_accumulator() {
        let mut cpu = Cpu::new(params()).unwrap();
        reset(&mut cpu);
        let mut program = nop_program(16);
        program[0] = assemble(Opcode::Lda, 3, 4);
        let data = LogicVec::from_u64(0x9, 4);

        for _ in 0..4 {
            tick(&mut cpu, &program, &data);
        }
        assert_eq!(cpu.accumulator().to_u64(), Some(0x9));
    }

    #[test]
    fn add_updates_flags() {
        let mut cpu = Cpu::new(params()).unwrap();
        reset(&mut cpu);
        let mut program = nop_program(16);
        program[0] = assemble(Opcode::Lda, 0, 4);
        program[1] = assemble(Opcode::Add, 0, 4);
        // acc = 0xF, then 0xF + 0xF = 0x1E -> 0xE carry 1.
        let data = LogicVec::from_u64(0xF, 4);

        for _ in 0..8 {
            tick(&mut cpu, &program, &data);
        }
        assert_eq!(cpu.accumulator().to_u64(), Some(0xE));
        assert_eq!(cpu.outputs().carry, True);
        assert_eq!(cpu.outputs().zero, False);
    }

    #[test]
    fn sta_asserts_ram_write() {
        let mut cpu = Cpu::new(params()).unwrap();
        reset(&mut cpu);
        let mut program = nop_program(16);
        program[0] = assemble(Opcode::Sta, 0x7, 4);
        let data = LogicVec::all_false(4);

        let mut saw_write = false;
        for _ in 0..4 {
            let out = tick(&mut cpu, &program, &data);
            if out.ram_write == True {
                saw_write = true;
                assert_eq!(out.data_addr.to_u64(), Some(0x7));
            }
        }
        assert!(saw_write, "STA must pulse the RAM write request");
    }

    #[test]
    fn jump_to_self_halts() {
        let mut cpu = Cpu::new(params()).unwrap();
        reset(&mut cpu);
        let mut program = nop_program(16);
        program[0] = assemble(Opcode::JmpD, 0, 4);
        let data = LogicVec::all_false(4);

        for _ in 0..8 {
            tick(&mut cpu, &program, &data);
        }
        assert!(cpu.is_halted());
        assert_eq!(cpu.outputs().halt, True);
        // Frozen: further ticks do not advance the cycle counter.
        let cycles = cpu.cycle_count().to_u64();
        for _ in 0..4 {
            tick(&mut cpu, &program, &data);
        }
        assert_eq!(cpu.cycle_count().to_u64(), cycles);
    }

    #[test]
    fn backward_jump_wraps_via_subtraction() {
        let mut cpu = Cpu::new(params()).unwrap();
        reset(&mut cpu);
        let mut program = nop_program(16);
        // 0: NOP, 1: JMPU 1 -> target 0.
        program[1] = assemble(Opcode::JmpU, 1, 4);
        let data = LogicVec::all_false(4);

        for _ in 0..8 {
            tick(&mut cpu, &program, &data);
        }
        assert_eq!(cpu.program_counter().to_u64(), Some(0));
    }

    #[test]
    fn conditional_jump_not_taken_without_flag() {
        let mut cpu = Cpu::new(params()).unwrap();
        reset(&mut cpu);
        let mut program = nop_program(16);
        program[0] = assemble(Opcode::JpzD, 7, 4);
        let data = LogicVec::all_false(4);

        for _ in 0..4 {
            tick(&mut cpu, &program, &data);
        }
        // Zero flag clear after reset: fall through to address 1.
        assert_eq!(cpu.program_counter().to_u64(), Some(1));
    }

    #[test]
    fn reset_is_gated_while_running() {
        let mut cpu = Cpu::new(params()).unwrap();
        reset(&mut cpu);
        let program = nop_program(16);
        let data = LogicVec::all_false(4);
        for _ in 0..4 {
            tick(&mut cpu, &program, &data);
        }
        let pc = cpu.program_counter().to_u64();
        assert_ne!(pc, Some(0));

        // Reset pulse while running: ignored.
        let mut inputs = CpuInputs::idle(cpu.params());
        inputs.run = True;
        inputs.reset = True;
        cpu.sample(&inputs);
        assert_eq!(cpu.program_counter().to_u64(), pc);

        // Stopped, the same pulse clears everything.
        inputs.run = False;
        cpu.sample(&inputs);
        assert_eq!(cpu.program_counter().to_u64(), Some(0));
        assert_eq!(cpu.outputs().reset_sync, True);
    }

    #[test]
    fn status_events_one_per_edge() {
        let mut cpu = Cpu::new(params()).unwrap();
        reset(&mut cpu);
        cpu.take_events();
        let program = nop_program(16);
        let data = LogicVec::all_false(4);
        for _ in 0..4 {
            tick(&mut cpu, &program, &data);
        }
        let events = cpu.take_events();
        assert_eq!(events.len(), 4);
        // After the first fetch tick only FETCH holds an instruction.
        assert_eq!(events[0], "0:yellow+-1:orange+-1:red+-1:magenta");
        // The instruction then walks the stages.
        assert_eq!(events[1], "-1:yellow+0:orange+-1:red+-1:magenta");
        assert_eq!(events[2], "-1:yellow+-1:orange+0:red+-1:magenta");
        assert_eq!(events[3], "-1:yellow+-1:orange+-1:red+0:magenta");
    }

    #[test]
    fn pipelined_mode_fetches_every_tick() {
        let mut p = params();
        p.pipelined = true;
        let mut cpu = Cpu::new(p).unwrap();
        reset(&mut cpu);
        let program = nop_program(16);
        let data = LogicVec::all_false(4);

        let mut addrs = Vec::new();
        for _ in 0..4 {
            let out = tick(&mut cpu, &program, &data);
            addrs.push(out.instr_addr.to_u64().unwrap());
        }
        assert_eq!(addrs, vec![1, 2, 3, 4]);
        // All four stages occupied once the pipeline has filled.
        assert!(cpu.stage_addresses().iter().all(|a| a.is_some()));
    }

    #[test]
    fn direct_addressing_loads_absolute_target() {
        let mut p = params();
        p.direct_addressing = true;
        let mut cpu = Cpu::new(p).unwrap();
        reset(&mut cpu);
        let mut program = nop_program(16);
        program[0] = assemble(Opcode::JmpD, 9, 4);
        let data = LogicVec::all_false(4);

        for _ in 0..4 {
            tick(&mut cpu, &program, &data);
        }
        assert_eq!(cpu.program_counter().to_u64(), Some(9));
    }

    #[test]
    fn unknown_opcode_forces_safe_outputs() {
        let mut cpu = Cpu::new(params()).unwrap();
        reset(&mut cpu);
        let mut program = nop_program(16);
        program[0] = {
            let mut word = assemble(Opcode::Nop, 0, 4);
            word.set(7, Logic::Unknown); // poison an opcode lane
            word
        };
        let data = LogicVec::all_false(4);

        let out = tick(&mut cpu, &program, &data);
        assert_eq!(out, CpuOutputs::safe(cpu.params()));
    }

    #[test]
    fn step_clocks_while_stopped() {
        let mut cpu = Cpu::new(params()).unwrap();
        reset(&mut cpu);
        let program = nop_program(16);

        let mut inputs = CpuInputs::idle(cpu.params());
        inputs.instr = program[0].clone();
        // Four manual step pulses walk one full instruction cycle.
        for _ in 0..4 {
            inputs.step = False;
            cpu.sample(&inputs);
            inputs.step = True;
            cpu.sample(&inputs);
        }
        assert_eq!(cpu.program_counter().to_u64(), Some(1));
    }

    #[test]
    fn speed_select_switches_clock_source() {
        let mut cpu = Cpu::new(params()).unwrap();
        reset(&mut cpu);
        let program = nop_program(16);

        let mut inputs = CpuInputs::idle(cpu.params());
        inputs.instr = program[0].clone();
        inputs.run = True;
        inputs.speed = True;
        // clock_a toggling is ignored while speed selects clock_b.
        inputs.clock_a = True;
        cpu.sample(&inputs);
        inputs.clock_a = False;
        cpu.sample(&inputs);
        assert_eq!(cpu.cycle_count().to_u64(), Some(0));
        // clock_b drives the machine.
        inputs.clock_b = True;
        cpu.sample(&inputs);
        assert_eq!(cpu.cycle_count().to_u64(), Some(1));
    }

    #[test]
    fn serde_roundtrip() {
        let mut cpu = Cpu::new(params()).unwrap();
        reset(&mut cpu);
        let program = nop_program(16);
        let data = LogicVec::all_false(4);
        for _ in 0..4 {
            tick(&mut cpu, &program, &data);
        }
        let json = serde_json::to_string(&cpu).unwrap();
        let back: Cpu = serde_json::from_str(&json).unwrap();
        assert_eq!(back.program_counter(), cpu.program_counter());
        assert_eq!(back.stage_addresses(), cpu.stage_addresses());
    }
}
