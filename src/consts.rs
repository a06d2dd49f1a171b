//! VM parameters and wire-format constants.

/// Number of registers in the register file. The spec requires at least
/// 8; generated code observed in `original_source/` uses register 0 as
/// the accumulator/condition register plus a handful of scratch
/// registers, so this gives headroom.
pub const NREG: usize = 16;

/// Default size, in [`crate::value::Value`] cells, of the local memory
/// stack.
pub const DEFAULT_STACK_SIZE: usize = 2048;

/// Default size, in [`crate::value::Value`] cells, of the static memory
/// area.
pub const DEFAULT_STATIC_SIZE: usize = 1024;

/// Default capacity, in call frames, of the call stack.
pub const DEFAULT_CALL_STACK_SIZE: usize = 512;

/// Size in bytes of an encoded `u32` operand field.
pub const U32_SIZE: usize = 4;

/// Size in bytes of an encoded `f64` literal.
pub const F64_SIZE: usize = 8;

/// Bit width of the callee address in a packed `Call` word.
pub const CALL_ADDR_BITS: u32 = 24;

/// Mask isolating the callee address in a packed `Call` word.
pub const CALL_ADDR_MASK: u32 = (1 << CALL_ADDR_BITS) - 1;

/// Sentinel `funcAddr` value meaning "the driver has halted".
pub const HALTED: i32 = -1;
