//! The call stack's entry: `(return_funcAddr, return_pc)`. See spec §3.

/// A saved return point, pushed by `Call` and popped by `EndFunc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallFrame {
    /// `funcAddr` to restore on `EndFunc`.
    pub return_func_addr: i32,
    /// `pc` to restore on `EndFunc`.
    pub return_pc: i32,
}

impl CallFrame {
    pub const fn new(return_func_addr: i32, return_pc: i32) -> Self {
        CallFrame {
            return_func_addr,
            return_pc,
        }
    }
}
