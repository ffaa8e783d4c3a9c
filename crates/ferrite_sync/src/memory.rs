//! Addressed RAM/ROM with synchronous write and combinational read.

use crate::edge::{EdgeDetector, EdgeTrigger};
use crate::SyncError;
use ferrite_common::{Logic, LogicVec};
use serde::{Deserialize, Serialize};

/// Whether a memory accepts writes.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum MemoryKind {
    /// Writable memory: write on edge with write-enable, clear floods rows.
    Ram,
    /// Read-only memory: writes and clear are ignored.
    Rom,
}

/// One sample of a memory's input pins.
#[derive(Clone, Debug)]
pub struct MemoryInputs {
    /// Row address.
    pub address: LogicVec,
    /// Data input for writes.
    pub data: LogicVec,
    /// Write enable; a write needs this `True` on the trigger edge.
    pub write_enable: Logic,
    /// Clock input.
    pub clock: Logic,
    /// Asynchronous clear: floods every row with `False` (RAM only).
    pub clear: Logic,
}

/// The memory's output pins after a sample.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MemoryOutputs {
    /// The addressed row, re-read on every sample.
    pub q: LogicVec,
}

/// An addressed array of fixed-width rows with a read-output register.
///
/// Reads are combinational: every sample re-reads the addressed row whether
/// or not an edge fired. Writes happen only on the trigger edge with
/// write-enable asserted, and only for [`MemoryKind::Ram`]. An address with
/// any indeterminate lane selects no row: the write is skipped and the read
/// output degrades to all-`Unknown` for that sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    kind: MemoryKind,
    addr_bits: u32,
    width: u32,
    rows: Vec<LogicVec>,
    out: LogicVec,
    detector: EdgeDetector,
}

impl Memory {
    /// Creates a memory of 2^`addr_bits` rows, all `False`.
    pub fn new(
        kind: MemoryKind,
        addr_bits: u32,
        width: u32,
        trigger: EdgeTrigger,
    ) -> Result<Self, SyncError> {
        if addr_bits == 0 || addr_bits > 16 {
            return Err(SyncError::BadAddressWidth { bits: addr_bits });
        }
        if width == 0 || width > 64 {
            return Err(SyncError::BadWidth { width });
        }
        Ok(Self {
            kind,
            addr_bits,
            width,
            rows: vec![LogicVec::all_false(width); 1 << addr_bits],
            out: LogicVec::all_false(width),
            detector: EdgeDetector::new(trigger),
        })
    }

    /// Creates a memory pre-loaded with the given rows (a ROM image or a
    /// restored RAM snapshot).
    pub fn with_contents(
        kind: MemoryKind,
        addr_bits: u32,
        width: u32,
        trigger: EdgeTrigger,
        contents: Vec<LogicVec>,
    ) -> Result<Self, SyncError> {
        let mut memory = Self::new(kind, addr_bits, width, trigger)?;
        if contents.len() != memory.rows.len() {
            return Err(SyncError::BadContents {
                reason: format!(
                    "expected {} rows, got {}",
                    memory.rows.len(),
                    contents.len()
                ),
            });
        }
        if let Some(row) = contents.iter().find(|row| row.width() != width) {
            return Err(SyncError::BadContents {
                reason: format!("row width {} does not match {width}", row.width()),
            });
        }
        memory.rows = contents;
        Ok(memory)
    }

    /// Returns the address width in bits.
    pub fn addr_bits(&self) -> u32 {
        self.addr_bits
    }

    /// Returns the row width in lanes.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns a row's current contents.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn row(&self, index: usize) -> &LogicVec {
        &self.rows[index]
    }

    /// Directly overwrites a row (restore/composite wiring).
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or the width differs.
    pub fn set_row(&mut self, index: usize, value: LogicVec) {
        assert_eq!(value.width(), self.width, "memory row width mismatch");
        self.rows[index] = value;
    }

    /// Floods every row with `False` and resets the read output.
    pub fn flood_clear(&mut self) {
        for row in &mut self.rows {
            *row = LogicVec::all_false(self.width);
        }
        self.out = LogicVec::all_false(self.width);
    }

    /// Samples the inputs: applies a pending write if this sample is a
    /// triggering edge, then re-reads the addressed row.
    ///
    /// # Panics
    ///
    /// Panics if the address or data width differs from the memory's.
    pub fn sample(&mut self, inputs: &MemoryInputs) -> MemoryOutputs {
        assert_eq!(
            inputs.address.width(),
            self.addr_bits,
            "memory address width mismatch"
        );
        assert_eq!(inputs.data.width(), self.width, "memory data width mismatch");

        let edge = self.detector.sample(inputs.clock);

        if self.kind == MemoryKind::Ram && inputs.clear == Logic::True {
            self.flood_clear();
            return MemoryOutputs { q: self.out.clone() };
        }

        match inputs.address.to_index() {
            Some(index) => {
                if edge && inputs.write_enable == Logic::True && self.kind == MemoryKind::Ram {
                    self.rows[index] = inputs.data.definite();
                }
                self.out = self.rows[index].clone();
            }
            None => {
                // Unresolved address: skip the write, read degrades.
                self.out = LogicVec::all_unknown(self.width);
            }
        }
        MemoryOutputs { q: self.out.clone() }
    }

    /// Returns the current output pins without sampling.
    pub fn outputs(&self) -> MemoryOutputs {
        MemoryOutputs {
            q: self.out.clone(),
        }
    }
}
