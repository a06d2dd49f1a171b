//! A stack-plus-register bytecode interpreter core.
//!
//! The five collaborators are [`value::Value`] (the polymorphic runtime
//! cell), [`registers::RegisterFile`], [`code::CodeUnit`],
//! [`program::ProgramDirectory`], and [`driver::VMDriver`] (the dispatch
//! loop), plus [`host::HostBridge`] for synchronous calls out to the
//! embedder. See `SPEC_FULL.md` for the full module-by-module contract.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod code;
pub mod consts;
pub mod driver;
pub mod error;
pub mod frame;
pub mod host;
pub mod opcode;
pub mod operand;
pub mod program;
pub mod registers;
pub mod value;

/// Re-exports of the types an embedder assembling and running a program
/// needs day to day.
pub mod prelude {
    pub use crate::code::CodeUnit;
    pub use crate::driver::{DriverConfig, VMDriver};
    pub use crate::error::{VmError, VmResult};
    pub use crate::host::{HostBridge, HostFn};
    pub use crate::opcode::Opcode;
    pub use crate::program::{ProgramDirectory, ProgramDirectoryBuilder};
    pub use crate::value::Value;
}
