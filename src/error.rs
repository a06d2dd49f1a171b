//! Runtime interpreter error implementation

/// Interpreter runtime error variants.
///
/// Every fatal condition described by the dispatch loop, the operand
/// decoder, and the call/return discipline surfaces as one of these. The
/// core never panics or unwraps on interpreter-reachable input; all of it
/// routes through `VmError` up to `execute_function`.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum VmError {
    /// `execute_function` was asked to resolve a name the program
    /// directory doesn't have. Reported, not fatal: the driver halts
    /// cleanly (`funcAddr = -1`) instead of aborting.
    #[display(fmt = "not found function {_0:?}")]
    NotFound(String),

    /// An address resolved outside the bounds of `local`, `static`, or
    /// the host-callback table.
    #[display(fmt = "address out of bounds: {_0}")]
    BoundsCheck(String),

    /// The call stack grew past its fixed capacity.
    #[display(fmt = "call stack overflow (depth {_0})")]
    CallStackOverflow(usize),

    /// `EndFunc` popped a call stack that was already empty beyond the
    /// outermost frame — this should only ever halt the VM, never error;
    /// surfaced only if the driver is driven incorrectly by an embedder.
    #[display(fmt = "call stack underflow")]
    CallStackUnderflow,

    /// `Pop` (or an implicit pop via `Call`) drove the argument-push
    /// counter below zero.
    #[display(fmt = "push-counter underflow")]
    PushUnderflow,

    /// The byte cursor ran past the end of the instruction stream, or an
    /// operand's declared shape didn't fit in the remaining bytes.
    #[display(fmt = "decode error at byte {offset}: {reason}")]
    DecodeError {
        /// Byte offset into the code unit where decoding broke.
        offset: u32,
        /// What the decoder expected and didn't find.
        reason: String,
    },

    /// A byte at the current program counter didn't match any known
    /// opcode, or matched one of the reserved-but-unimplemented opcodes
    /// (`PMov`, `ArrayIndexSet`, `ArrayIndexAdd`).
    #[display(fmt = "unknown or unimplemented opcode 0x{_0:02x}")]
    UnknownOpcode(u8),

    /// A host callback index named by a `Call` instruction's packed word
    /// doesn't exist in the host bridge.
    #[display(fmt = "host callback index {_0} out of range")]
    HostIndexOutOfBounds(u32),

    /// A write was attempted through an operand that decoded to a
    /// transient literal — the producer (compiler) emitted a malformed
    /// instruction stream.
    #[display(fmt = "cannot write through a literal-backed operand")]
    TypeMismatch,
}

impl std::error::Error for VmError {}

/// Convenience alias used throughout the core.
pub type VmResult<T> = Result<T, VmError>;
