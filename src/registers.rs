//! The register file: a fixed bank of [`Value`]s plus the auxiliary save
//! stack used around nested sub-expressions. See spec §3.

use crate::consts::NREG;
use crate::error::{VmError, VmResult};
use crate::value::Value;

/// An ordered, indexable bank of `NREG` registers, with an owned save
/// stack for `ST`/`LD`.
///
/// The teacher's original used process-wide state for the save stack;
/// per the design note in §9, this is re-architected as an instance
/// field owned by the same [`crate::driver::VMDriver`] that owns the
/// register file, so two drivers never alias each other's saved state.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    slots: [Value; NREG],
    save_stack: Vec<Value>,
}

impl Default for RegisterFile {
    fn default() -> Self {
        RegisterFile {
            slots: core::array::from_fn(|_| Value::default()),
            save_stack: Vec::new(),
        }
    }
}

impl RegisterFile {
    /// Create a fresh, zeroed register file with an empty save stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read register `i`.
    pub fn get(&self, i: usize) -> VmResult<&Value> {
        self.slots
            .get(i)
            .ok_or_else(|| VmError::BoundsCheck(format!("register index {i} out of range")))
    }

    /// Overwrite register `i`.
    pub fn set(&mut self, i: usize, v: Value) -> VmResult<()> {
        let slot = self
            .slots
            .get_mut(i)
            .ok_or_else(|| VmError::BoundsCheck(format!("register index {i} out of range")))?;
        *slot = v;
        Ok(())
    }

    /// `ST(k)`: push the first `k` registers onto the save stack.
    pub fn store(&mut self, k: usize) -> VmResult<()> {
        if k > NREG {
            return Err(VmError::BoundsCheck(format!("store count {k} exceeds {NREG} registers")));
        }
        self.save_stack.extend_from_slice(&self.slots[..k]);
        Ok(())
    }

    /// `LD(k)`: pop the first `k` registers back off the save stack, in
    /// the reverse order they were pushed so that register values after
    /// `LD` equal their values immediately before the matching `ST`.
    pub fn load(&mut self, k: usize) -> VmResult<()> {
        if k > NREG {
            return Err(VmError::BoundsCheck(format!("load count {k} exceeds {NREG} registers")));
        }
        if self.save_stack.len() < k {
            return Err(VmError::BoundsCheck("register save stack underflow".into()));
        }
        let start = self.save_stack.len() - k;
        for (i, v) in self.save_stack.drain(start..).enumerate() {
            self.slots[i] = v;
        }
        Ok(())
    }
}
