//! The driver: owns local memory, static memory, the call stack,
//! registers, and the current program counter; runs the dispatch loop.
//! See spec §4.3.

use crate::code::CodeUnit;
use crate::consts::{CALL_ADDR_BITS, CALL_ADDR_MASK, DEFAULT_CALL_STACK_SIZE, DEFAULT_STACK_SIZE, DEFAULT_STATIC_SIZE, HALTED};
use crate::error::{VmError, VmResult};
use crate::frame::CallFrame;
use crate::host::HostBridge;
use crate::opcode::Opcode;
use crate::operand::{LocationTag, Operand, Slot};
use crate::program::ProgramDirectory;
use crate::registers::RegisterFile;
use crate::value::Value;
use std::rc::Rc;

/// Sizes the driver's local memory, static memory, and call stack are
/// constructed with. Defaults mirror the spec's stated defaults.
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    /// Size, in [`Value`] cells, of local memory.
    pub stacksize: usize,
    /// Size, in [`Value`] cells, of static memory.
    pub staticsize: usize,
    /// Maximum call-frame depth.
    pub call_stack_size: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            stacksize: DEFAULT_STACK_SIZE,
            staticsize: DEFAULT_STATIC_SIZE,
            call_stack_size: DEFAULT_CALL_STACK_SIZE,
        }
    }
}

/// Owns every piece of mutable VM state and runs the fetch-decode-
/// execute loop. Constructed with a [`ProgramDirectory`] and a
/// [`HostBridge`]; both are shared, read-only collaborators supplied by
/// the (excluded) assembler/loader and by the embedder, respectively.
pub struct VMDriver {
    directory: ProgramDirectory,
    host: HostBridge,
    registers: RegisterFile,
    local: Vec<Value>,
    static_mem: Vec<Value>,
    call_stack: Vec<CallFrame>,
    call_stack_size: usize,
    func_addr: i32,
    pc: i32,
    local_addr: usize,
    push: usize,
}

impl VMDriver {
    /// Construct a driver over a program directory and host bridge, with
    /// default memory sizes.
    pub fn new(directory: ProgramDirectory, host: HostBridge) -> Self {
        Self::with_config(directory, host, DriverConfig::default())
    }

    /// Construct a driver with explicit memory and call-stack sizes.
    pub fn with_config(directory: ProgramDirectory, host: HostBridge, config: DriverConfig) -> Self {
        VMDriver {
            directory,
            host,
            registers: RegisterFile::new(),
            local: (0..config.stacksize).map(|_| Value::default()).collect(),
            static_mem: (0..config.staticsize).map(|_| Value::default()).collect(),
            call_stack: Vec::new(),
            call_stack_size: config.call_stack_size,
            func_addr: HALTED,
            pc: 0,
            local_addr: 0,
            push: 0,
        }
    }

    /// The register file, for host callbacks and tests.
    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Mutable access to the register file, e.g. for a host callback to
    /// set `R[0]` as a return value.
    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    /// Is the driver currently running a function?
    pub fn is_active(&self) -> bool {
        match self.current_unit() {
            Some(unit) => unit.has_more(self.pc) || self.func_addr >= 0,
            None => false,
        }
    }

    fn current_unit(&self) -> Option<Rc<CodeUnit>> {
        if self.func_addr < 0 {
            return None;
        }
        self.directory.by_addr(self.func_addr).cloned()
    }

    fn current_unit_checked(&self) -> VmResult<Rc<CodeUnit>> {
        self.current_unit()
            .ok_or_else(|| VmError::BoundsCheck("no active code unit".into()))
    }

    /// Resolve `name`, reset execution state, and run to halt, returning
    /// the final contents of `R[0]`.
    ///
    /// If `name` isn't in the program directory this is reported, not
    /// fatal: the driver is left halted (`funcAddr = -1`) and an error is
    /// returned without running any bytecode.
    pub fn execute_function(&mut self, name: &str) -> VmResult<Value> {
        self.execute_function_polled(name, &mut || true)
    }

    /// Same as [`VMDriver::execute_function`], but `poll` is invoked once
    /// per dispatched instruction; returning `false` stops execution
    /// early (without error) at the next opportunity. This is the
    /// injection point an embedder can use to implement cancellation or
    /// a timeout, as described in spec §5.
    pub fn execute_function_polled(&mut self, name: &str, poll: &mut dyn FnMut() -> bool) -> VmResult<Value> {
        let unit = match self.directory.by_name(name) {
            Some(unit) => unit.clone(),
            None => {
                self.func_addr = HALTED;
                return Err(VmError::NotFound(name.to_string()));
            }
        };

        self.func_addr = unit.addr();
        self.pc = 0;
        self.local_addr = 0;
        self.push = 0;
        self.call_stack.clear();

        while self.is_active() {
            if !poll() {
                break;
            }
            self.dispatch_one()?;
        }

        Ok(self.registers.get(0)?.clone())
    }

    /// `Push(v)`: place `v` at the callee-argument cursor and advance it.
    pub fn push_memory(&mut self, v: Value) -> VmResult<()> {
        let unit = self.current_unit_checked()?;
        let addr = self
            .local_addr
            .checked_add(unit.frame_size() as usize)
            .and_then(|a| a.checked_add(self.push))
            .ok_or_else(|| VmError::BoundsCheck("local address overflow".into()))?;
        if addr >= self.local.len() {
            return Err(VmError::BoundsCheck(format!("local address {addr} out of bounds")));
        }
        self.local[addr] = v;
        self.push += 1;
        Ok(())
    }

    /// `pop_memory()`: decrement the push counter and return the Value
    /// at the resulting cursor. Used by host callbacks to read arguments
    /// right-to-left.
    pub fn pop_memory(&mut self) -> VmResult<Value> {
        self.push = self.push.checked_sub(1).ok_or(VmError::PushUnderflow)?;
        let addr = self.local_addr + self.push;
        self.local
            .get(addr)
            .cloned()
            .ok_or_else(|| VmError::BoundsCheck(format!("local address {addr} out of bounds")))
    }

    fn decode_operand(&self, unit: &CodeUnit, pc: &mut i32) -> VmResult<Operand> {
        let tag_byte = unit.move_u8(pc)?;
        let tag = LocationTag::decode(tag_byte)?;
        Ok(match tag {
            LocationTag::LitValue => Operand::Literal(Value::number(unit.move_double(pc)?)),
            LocationTag::LitString => Operand::Literal(Value::string(unit.move_string(pc)?)),
            LocationTag::Reg => Operand::Slot(Slot::Register(unit.move_u8(pc)? as usize)),
            LocationTag::MemL => {
                let addr = crate::operand::CompositeAddress::decode(unit, pc)?;
                let resolved = addr.resolve(&self.registers)? as usize;
                Operand::Slot(Slot::Local {
                    address: self.local_addr + resolved,
                    aliased: addr.any_aliased(),
                })
            }
            LocationTag::MemS => {
                let addr = crate::operand::CompositeAddress::decode(unit, pc)?;
                let resolved = addr.resolve(&self.registers)? as usize;
                Operand::Slot(Slot::Static {
                    address: resolved,
                    aliased: addr.any_aliased(),
                })
            }
        })
    }

    fn read_operand(&self, operand: &Operand) -> VmResult<Value> {
        match operand {
            Operand::Literal(v) => Ok(v.clone()),
            Operand::Slot(Slot::Register(i)) => Ok(self.registers.get(*i)?.clone()),
            Operand::Slot(Slot::Local { address, .. }) => self
                .local
                .get(*address)
                .cloned()
                .ok_or_else(|| VmError::BoundsCheck(format!("local address {address} out of bounds"))),
            Operand::Slot(Slot::Static { address, .. }) => self
                .static_mem
                .get(*address)
                .cloned()
                .ok_or_else(|| VmError::BoundsCheck(format!("static address {address} out of bounds"))),
        }
    }

    fn write_operand(&mut self, operand: &Operand, v: Value) -> VmResult<()> {
        match operand {
            Operand::Literal(_) => Err(VmError::TypeMismatch),
            Operand::Slot(Slot::Register(i)) => self.registers.set(*i, v),
            Operand::Slot(Slot::Local { address, .. }) => {
                let slot = self
                    .local
                    .get_mut(*address)
                    .ok_or_else(|| VmError::BoundsCheck(format!("local address {address} out of bounds")))?;
                *slot = v;
                Ok(())
            }
            Operand::Slot(Slot::Static { address, .. }) => {
                let slot = self
                    .static_mem
                    .get_mut(*address)
                    .ok_or_else(|| VmError::BoundsCheck(format!("static address {address} out of bounds")))?;
                *slot = v;
                Ok(())
            }
        }
    }

    /// Decode one binary operator's operands and apply `f(lhs, rhs)`,
    /// writing the result back into the *first* operand's slot — the
    /// sink-is-source convention of spec §4.1/§9, applied uniformly to
    /// `Mov` (which ignores `lhs`), arithmetic, comparisons, and the
    /// logical operators.
    fn binary_op(&mut self, unit: &CodeUnit, pc: &mut i32, f: impl Fn(&Value, &Value) -> Value) -> VmResult<()> {
        let sink = self.decode_operand(unit, pc)?;
        let rhs = self.decode_operand(unit, pc)?;
        let lhs_value = self.read_operand(&sink)?;
        let rhs_value = self.read_operand(&rhs)?;
        let result = f(&lhs_value, &rhs_value);
        self.write_operand(&sink, result)
    }

    /// Decode one unary operator's operand and apply `f(v)`, writing the
    /// result back into that operand's own slot.
    fn unary_op(&mut self, unit: &CodeUnit, pc: &mut i32, f: impl Fn(&Value) -> Value) -> VmResult<()> {
        let operand = self.decode_operand(unit, pc)?;
        let value = self.read_operand(&operand)?;
        self.write_operand(&operand, f(&value))
    }

    #[tracing::instrument(name = "dispatch", skip(self))]
    fn dispatch_one(&mut self) -> VmResult<()> {
        let unit = self.current_unit_checked()?;
        let mut pc = self.pc;
        let opcode_byte = unit.move_u8(&mut pc)?;
        let opcode = Opcode::decode(opcode_byte)?;
        tracing::trace!(?opcode, pc = self.pc, "instruction");

        match opcode {
            Opcode::Mov => self.binary_op(&unit, &mut pc, |_lhs, rhs| rhs.clone())?,
            Opcode::Add => self.binary_op(&unit, &mut pc, Value::add)?,
            Opcode::Sub => self.binary_op(&unit, &mut pc, Value::sub)?,
            Opcode::Mul => self.binary_op(&unit, &mut pc, Value::mul)?,
            Opcode::Div => self.binary_op(&unit, &mut pc, Value::div)?,
            Opcode::Rem => self.binary_op(&unit, &mut pc, Value::rem)?,
            Opcode::Inc => self.unary_op(&unit, &mut pc, Value::inc)?,
            Opcode::Dec => self.unary_op(&unit, &mut pc, Value::dec)?,
            Opcode::CmpEq => self.binary_op(&unit, &mut pc, Value::cmp_eq)?,
            Opcode::CmpNEq => self.binary_op(&unit, &mut pc, Value::cmp_neq)?,
            Opcode::CmpL => self.binary_op(&unit, &mut pc, Value::cmp_l)?,
            Opcode::CmpLeq => self.binary_op(&unit, &mut pc, Value::cmp_leq)?,
            Opcode::CmpG => self.binary_op(&unit, &mut pc, Value::cmp_g)?,
            Opcode::CmpGeq => self.binary_op(&unit, &mut pc, Value::cmp_geq)?,
            Opcode::LogAnd => self.binary_op(&unit, &mut pc, Value::log_and)?,
            Opcode::LogOr => self.binary_op(&unit, &mut pc, Value::log_or)?,

            Opcode::Push => {
                let operand = self.decode_operand(&unit, &mut pc)?;
                let value = self.read_operand(&operand)?;
                self.pc = pc;
                return self.push_memory(value);
            }
            Opcode::Pop => {
                self.push = self.push.checked_sub(1).ok_or(VmError::PushUnderflow)?;
            }

            Opcode::St => {
                let k = unit.move_u8(&mut pc)? as usize;
                self.pc = pc;
                return self.registers.store(k);
            }
            Opcode::Ld => {
                let k = unit.move_u8(&mut pc)? as usize;
                self.pc = pc;
                return self.registers.load(k);
            }

            Opcode::Jmp => {
                let target = unit.move_u32(&mut pc)?;
                self.pc = target as i32;
                return Ok(());
            }
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
            | Opcode::Jnl => {
                let target = unit.move_u32(&mut pc)?;
                let truthy = self.registers.get(0)?.is_truthy();
                let take = if opcode.branches_on_truthy() { truthy } else { !truthy };
                self.pc = if take { target as i32 } else { pc };
                return Ok(());
            }

            Opcode::Ret => {
                let operand = self.decode_operand(&unit, &mut pc)?;
                let value = self.read_operand(&operand)?;
                self.pc = pc;
                return self.registers.set(0, value);
            }

            Opcode::Call => {
                let packed = unit.move_u32(&mut pc)?;
                self.pc = pc;
                return self.do_call(packed);
            }
            Opcode::EndFunc => {
                self.pc = pc;
                return self.do_end_func();
            }

            Opcode::PMov | Opcode::ArrayIndexSet | Opcode::ArrayIndexAdd => {
                return Err(VmError::UnknownOpcode(opcode_byte));
            }
        }

        self.pc = pc;
        Ok(())
    }

    /// The `Call` protocol of spec §4.3: save the return point, advance
    /// the local base by the caller's frame size, then either invoke a
    /// host callback and immediately unwind, or transfer control into a
    /// script function's entry.
    fn do_call(&mut self, packed: u32) -> VmResult<()> {
        if self.call_stack.len() >= self.call_stack_size {
            return Err(VmError::CallStackOverflow(self.call_stack.len()));
        }

        let addr = (packed & CALL_ADDR_MASK) as i32;
        let kind = (packed >> CALL_ADDR_BITS) as u8;

        self.call_stack.push(CallFrame::new(self.func_addr, self.pc));

        let caller_frame_size = self.current_unit_checked()?.frame_size() as usize;
        self.local_addr = self
            .local_addr
            .checked_add(caller_frame_size)
            .ok_or_else(|| VmError::BoundsCheck("local address overflow on call".into()))?;
        if self.local_addr > self.local.len() {
            return Err(VmError::BoundsCheck("local frame exceeds stack size".into()));
        }

        if kind == 1 {
            let host_fn = self.host.index_at(addr as u32)?;
            tracing::debug!(host_index = addr, "calling host function");
            host_fn(self)?;
            self.do_end_func()
        } else {
            tracing::debug!(callee = addr, "calling script function");
            self.push = 0;
            self.func_addr = addr;
            self.pc = 0;
            Ok(())
        }
    }

    /// The `EndFunc` protocol of spec §4.3: pop the call stack; halt if
    /// it was already empty, otherwise restore `(funcAddr, pc)` and roll
    /// the local base back by the restored frame's size.
    fn do_end_func(&mut self) -> VmResult<()> {
        match self.call_stack.pop() {
            None => {
                self.func_addr = HALTED;
                Ok(())
            }
            Some(frame) => {
                self.func_addr = frame.return_func_addr;
                self.pc = frame.return_pc;
                let restored_frame_size = self.current_unit_checked()?.frame_size() as usize;
                self.local_addr = self
                    .local_addr
                    .checked_sub(restored_frame_size)
                    .ok_or(VmError::CallStackUnderflow)?;
                Ok(())
            }
        }
    }
}
