//! Operand location tags and composite-address resolution. See spec
//! §4.2.

use crate::code::CodeUnit;
use crate::error::VmResult;
use crate::registers::RegisterFile;
use crate::value::Value;

/// The 1-byte location tag every operand begins with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationTag {
    LitValue,
    LitString,
    Reg,
    MemL,
    MemS,
}

impl LocationTag {
    pub(crate) fn decode(byte: u8) -> VmResult<LocationTag> {
        use crate::error::VmError;
        Ok(match byte {
            0 => LocationTag::LitValue,
            1 => LocationTag::LitString,
            2 => LocationTag::Reg,
            3 => LocationTag::MemL,
            4 => LocationTag::MemS,
            other => {
                return Err(VmError::DecodeError {
                    offset: 0,
                    reason: format!("unknown operand location tag {other}"),
                })
            }
        })
    }
}

/// One term of a composite address: `(isArray, isRef, base)`, plus
/// `(elemSize, indexRegister)` when `isArray` is set.
///
/// `isRef` is decoded and carried but never acted on in this revision —
/// see the open question in spec §9 / SPEC_FULL §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressTerm {
    pub is_array: bool,
    pub is_ref: bool,
    pub base: u32,
    pub elem_size: u32,
    pub index_register: u32,
}

impl AddressTerm {
    /// Read this term's contribution to the effective address:
    /// `base + (isArray ? elemSize * R[indexRegister].n_as_int : 0)`.
    fn contribution(&self, registers: &RegisterFile) -> VmResult<u32> {
        if !self.is_array {
            return Ok(self.base);
        }
        let index = registers.get(self.index_register as usize)?.n as i64;
        let offset = self.elem_size as i64 * index;
        Ok(self.base.wrapping_add(offset as u32))
    }
}

/// A decoded composite address: `N` terms whose contributions sum to the
/// effective address.
#[derive(Debug, Clone, Default)]
pub struct CompositeAddress {
    pub terms: Vec<AddressTerm>,
}

impl CompositeAddress {
    /// Read a composite address from the code unit at `*pc`: a `u32`
    /// term count followed by that many terms.
    pub fn decode(unit: &CodeUnit, pc: &mut i32) -> VmResult<CompositeAddress> {
        let count = unit.move_u32(pc)?;
        let mut terms = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let is_array = unit.move_u8(pc)? != 0;
            let is_ref = unit.move_u8(pc)? != 0;
            let base = unit.move_u32(pc)?;
            let (elem_size, index_register) = if is_array {
                (unit.move_u32(pc)?, unit.move_u32(pc)?)
            } else {
                (0, 0)
            };
            terms.push(AddressTerm {
                is_array,
                is_ref,
                base,
                elem_size,
                index_register,
            });
        }
        Ok(CompositeAddress { terms })
    }

    /// Sum every term's contribution into the effective address.
    pub fn resolve(&self, registers: &RegisterFile) -> VmResult<u32> {
        let mut addr: u32 = 0;
        for term in &self.terms {
            addr = addr.wrapping_add(term.contribution(registers)?);
        }
        Ok(addr)
    }

    /// True if any term in this address set the reserved `isRef` flag.
    /// Exposed, not acted on — see [`AddressTerm`].
    pub fn any_aliased(&self) -> bool {
        self.terms.iter().any(|t| t.is_ref)
    }
}

/// A resolved, writable location — the sink of a `Mov`, arithmetic
/// result, or comparison result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Register(usize),
    Local { address: usize, aliased: bool },
    Static { address: usize, aliased: bool },
}

/// A fully decoded operand: either a transient literal value, or a
/// resolved, writable slot.
///
/// Decoded operands are owned by value (never references into a shared
/// literal buffer), per the design note in spec §9 about the footgun of
/// transient-literal aliasing.
#[derive(Debug, Clone)]
pub enum Operand {
    Literal(Value),
    Slot(Slot),
}
