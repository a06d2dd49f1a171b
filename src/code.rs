//! The compiled body of a single script function: an immutable,
//! byte-addressed instruction stream plus a cursor-advancing read API.
//! See spec §3.

use crate::consts::{F64_SIZE, U32_SIZE};
use crate::error::{VmError, VmResult};

/// An immutable per-function code unit (the original's `AsmInfo`).
///
/// Strings in the instruction stream are length-prefixed: a `u32` length
/// followed by that many bytes, interpreted as UTF-8. Numeric literals
/// are 8-byte IEEE-754 little-endian (the endianness the spec invites an
/// implementer to fix and document).
#[derive(Debug, Clone)]
pub struct CodeUnit {
    name: String,
    addr: i32,
    frame_size: i32,
    bytes: Vec<u8>,
}

impl CodeUnit {
    /// Build a code unit from its compiled fields. Called by the
    /// (excluded) assembler reader while populating a
    /// [`crate::program::ProgramDirectory`].
    pub fn new(name: impl Into<String>, addr: i32, frame_size: i32, bytes: Vec<u8>) -> Self {
        CodeUnit {
            name: name.into(),
            addr,
            frame_size,
            bytes,
        }
    }

    /// The function's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The function's entry address.
    pub fn addr(&self) -> i32 {
        self.addr
    }

    /// The fixed local-slot width this function reserves.
    pub fn frame_size(&self) -> i32 {
        self.frame_size
    }

    /// Is `pc` within the instruction stream?
    pub fn has_more(&self, pc: i32) -> bool {
        pc >= 0 && (pc as usize) < self.bytes.len()
    }

    fn slice(&self, pc: i32, len: usize) -> VmResult<&[u8]> {
        let start = usize::try_from(pc).map_err(|_| VmError::DecodeError {
            offset: pc.max(0) as u32,
            reason: "negative program counter".into(),
        })?;
        let end = start.checked_add(len).ok_or_else(|| VmError::DecodeError {
            offset: start as u32,
            reason: "length overflow".into(),
        })?;
        self.bytes.get(start..end).ok_or(VmError::DecodeError {
            offset: start as u32,
            reason: format!("expected {len} more byte(s), only {} available", self.bytes.len().saturating_sub(start)),
        })
    }

    /// Read one byte at `*pc` and advance `*pc` by 1.
    pub fn move_u8(&self, pc: &mut i32) -> VmResult<u8> {
        let b = self.slice(*pc, 1)?[0];
        *pc += 1;
        Ok(b)
    }

    /// Read a little-endian `u32` at `*pc` and advance `*pc` by 4.
    pub fn move_u32(&self, pc: &mut i32) -> VmResult<u32> {
        let bytes = self.slice(*pc, U32_SIZE)?;
        let v = u32::from_le_bytes(bytes.try_into().expect("slice has exactly U32_SIZE bytes"));
        *pc += U32_SIZE as i32;
        Ok(v)
    }

    /// Read a little-endian `f64` at `*pc` and advance `*pc` by 8.
    pub fn move_double(&self, pc: &mut i32) -> VmResult<f64> {
        let bytes = self.slice(*pc, F64_SIZE)?;
        let v = f64::from_le_bytes(bytes.try_into().expect("slice has exactly F64_SIZE bytes"));
        *pc += F64_SIZE as i32;
        Ok(v)
    }

    /// Read a length-prefixed UTF-8 string at `*pc`, advancing `*pc` by
    /// `4 + length` bytes.
    pub fn move_string(&self, pc: &mut i32) -> VmResult<String> {
        let len = self.move_u32(pc)? as usize;
        let bytes = self.slice(*pc, len)?;
        let s = String::from_utf8(bytes.to_vec()).map_err(|_| VmError::DecodeError {
            offset: *pc as u32,
            reason: "string operand is not valid utf-8".into(),
        })?;
        *pc += len as i32;
        Ok(s)
    }
}
