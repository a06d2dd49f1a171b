//! The opcode set the dispatch loop routes on. See spec §4.3; mnemonic
//! names follow `original_source/.../vm_mnemonic_define.cpp`.

use crate::error::VmError;

/// A single opcode byte, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[repr(u8)]
pub enum Opcode {
    /// Copies `src` into the slot where `src` itself resolves (the
    /// sink-is-source convention of §4.1/§9).
    Mov = 0,
    Add = 1,
    Sub = 2,
    Mul = 3,
    Div = 4,
    Rem = 5,
    Inc = 6,
    Dec = 7,
    Push = 8,
    Pop = 9,
    /// `ST(k)`: save the first `k` registers.
    St = 10,
    /// `LD(k)`: restore the first `k` registers.
    Ld = 11,
    Jmp = 12,
    JumpZero = 13,
    JumpNotZero = 14,
    /// `== `
    CmpEq = 15,
    /// `!=`
    CmpNEq = 16,
    /// `<`
    CmpL = 17,
    /// `<=`
    CmpLeq = 18,
    /// `>`
    CmpG = 19,
    /// `>=`
    CmpGeq = 20,
    LogAnd = 21,
    LogOr = 22,
    /// `je` — jump if the preceding comparison's result (in `R[0]`) is
    /// truthy/equal. See SPEC_FULL §4.3 for the full conditional-jump
    /// family this crate adds beyond the two the distilled spec names.
    Je = 23,
    Jne = 24,
    Jg = 25,
    Jnge = 26,
    Jge = 27,
    Jng = 28,
    Jl = 29,
    Jnle = 30,
    Jle = 31,
    Jnl = 32,
    Call = 33,
    Ret = 34,
    EndFunc = 35,
    /// Reserved, recognized but unimplemented: raises
    /// [`VmError::UnknownOpcode`] if ever dispatched.
    PMov = 36,
    /// Reserved, recognized but unimplemented.
    ArrayIndexSet = 37,
    /// Reserved, recognized but unimplemented.
    ArrayIndexAdd = 38,
}

impl Opcode {
    /// Decode a raw opcode byte. Unknown bytes are a fatal `UnknownOpcode`.
    pub fn decode(byte: u8) -> Result<Opcode, VmError> {
        use Opcode::*;
        Ok(match byte {
            0 => Mov,
            1 => Add,
            2 => Sub,
            3 => Mul,
            4 => Div,
            5 => Rem,
            6 => Inc,
            7 => Dec,
            8 => Push,
            9 => Pop,
            10 => St,
            11 => Ld,
            12 => Jmp,
            13 => JumpZero,
            14 => JumpNotZero,
            15 => CmpEq,
            16 => CmpNEq,
            17 => CmpL,
            18 => CmpLeq,
            19 => CmpG,
            20 => CmpGeq,
            21 => LogAnd,
            22 => LogOr,
            23 => Je,
            24 => Jne,
            25 => Jg,
            26 => Jnge,
            27 => Jge,
            28 => Jng,
            29 => Jl,
            30 => Jnle,
            31 => Jle,
            32 => Jnl,
            33 => Call,
            34 => Ret,
            35 => EndFunc,
            36 => PMov,
            37 => ArrayIndexSet,
            38 => ArrayIndexAdd,
            other => return Err(VmError::UnknownOpcode(other)),
        })
    }

    /// True for the ten named conditional jumps plus the two the
    /// distilled spec calls out by name (`JumpZero`/`JumpNotZero`); used
    /// by the dispatch loop to share one truth-test implementation.
    pub fn is_conditional_jump(self) -> bool {
        matches!(
            self,
            Opcode::JumpZero
                | Opcode::JumpNotZero
                | Opcode::Je
                | Opcode::Jne
                | Opcode::Jg
                | Opcode::Jnge
                | Opcode::Jge
                | Opcode::Jng
                | Opcode::Jl
                | Opcode::Jnle
                | Opcode::Jle
                | Opcode::Jnl
        )
    }

    /// For a conditional jump, does it take the branch when `R[0]` is
    /// truthy (as opposed to when it's falsy)?
    ///
    /// `JumpNotZero`/`Jne`/`Jg`/`Jge`/`Jl`/`Jle` branch on truthy;
    /// `JumpZero`/`Je`/`Jnge`/`Jng`/`Jnle`/`Jnl` branch on falsy — mirroring
    /// the "positive" vs. "negated" mnemonic pairs in
    /// `vm_mnemonic_define.cpp`.
    pub fn branches_on_truthy(self) -> bool {
        matches!(
            self,
            Opcode::JumpNotZero | Opcode::Jne | Opcode::Jg | Opcode::Jge | Opcode::Jl | Opcode::Jle
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_defined_opcode() {
        for byte in 0..=38u8 {
            assert!(Opcode::decode(byte).is_ok(), "byte {byte} should decode");
        }
    }

    #[test]
    fn rejects_unknown_byte() {
        assert!(matches!(Opcode::decode(200), Err(VmError::UnknownOpcode(200))));
    }
}
