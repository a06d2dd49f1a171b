mod support;

use sencha_vm::code::CodeUnit;
use sencha_vm::driver::VMDriver;
use sencha_vm::host::HostBridge;
use sencha_vm::opcode::Opcode;
use sencha_vm::program::ProgramDirectoryBuilder;
use sencha_vm::value::Value;
use support::Asm;

fn script_call(addr: u32) -> u32 {
    addr
}

/// `R0 <- 5; R1 <- 6; St(2); R0 <- 99; R1 <- 98; Ld(2); Ret R0` —
/// registers after `Ld(2)` equal their values immediately before the
/// matching `St(2)`.
#[test]
fn st_ld_restores_register_values_through_dispatch() {
    let mut asm = Asm::new();
    asm.op(Opcode::Mov).reg(0).lit_num(5.0);
    asm.op(Opcode::Mov).reg(1).lit_num(6.0);
    asm.op(Opcode::St).u8(2);
    asm.op(Opcode::Mov).reg(0).lit_num(99.0);
    asm.op(Opcode::Mov).reg(1).lit_num(98.0);
    asm.op(Opcode::Ld).u8(2);
    asm.op(Opcode::Ret).reg(0);
    asm.op(Opcode::EndFunc);

    let unit = CodeUnit::new("main", 0, 0, asm.finish());
    let directory = ProgramDirectoryBuilder::new().register(unit).build();
    let mut driver = VMDriver::new(directory, HostBridge::new());

    let result = driver.execute_function("main").unwrap();
    assert_eq!(result, Value::number(5.0));
    assert_eq!(driver.registers().get(1).unwrap(), &Value::number(6.0));
}

/// `Pop` with nothing pushed is a reported `PushUnderflow`, not a panic.
#[test]
fn pop_underflow_is_reported() {
    let mut asm = Asm::new();
    asm.op(Opcode::Pop);
    asm.op(Opcode::EndFunc);

    let unit = CodeUnit::new("main", 0, 0, asm.finish());
    let directory = ProgramDirectoryBuilder::new().register(unit).build();
    let mut driver = VMDriver::new(directory, HostBridge::new());

    assert!(driver.execute_function("main").is_err());
}

/// `Push … Pop` with no intervening `Call` restores the push counter
/// (spec §8 invariant 4): a value pushed and immediately popped leaves
/// no trace, so a later push lands at the same cursor it would have if
/// the first push/pop pair had never run.
#[test]
fn push_pop_with_no_intervening_call_restores_push_counter() {
    use sencha_vm::consts::CALL_ADDR_BITS;
    use sencha_vm::error::VmResult;

    fn read_one_arg(driver: &mut VMDriver) -> VmResult<()> {
        let arg = driver.pop_memory()?;
        driver.registers_mut().set(0, arg)
    }

    let mut bridge = HostBridge::new();
    let read_index = bridge.entry("ReadOneArg", read_one_arg);

    let mut asm = Asm::new();
    asm.op(Opcode::Push).lit_num(1.0);
    asm.op(Opcode::Pop);
    asm.op(Opcode::Push).lit_num(2.0);
    asm.op(Opcode::Call).u32((1u32 << CALL_ADDR_BITS) | read_index);
    asm.op(Opcode::Ret).reg(0);
    asm.op(Opcode::EndFunc);

    let unit = CodeUnit::new("main", 0, 0, asm.finish());
    let directory = ProgramDirectoryBuilder::new().register(unit).build();
    let mut driver = VMDriver::new(directory, bridge);

    // If the push counter weren't restored by `Pop`, the second `Push`
    // would land one slot further out and the host callback would read
    // the wrong cell (or fault on an empty one) instead of seeing 2.0.
    let result = driver.execute_function("main").unwrap();
    assert_eq!(result, Value::number(2.0));
}

/// Reserved opcodes (`PMov`, `ArrayIndexSet`, `ArrayIndexAdd`) decode to a
/// recognized `Opcode` variant but fault conservatively with
/// `VmError::UnknownOpcode` rather than corrupting dispatch, per spec
/// §4.3's guidance for opaque-but-recognized opcodes.
#[test]
fn reserved_opcodes_fault_instead_of_corrupting_dispatch() {
    use sencha_vm::error::VmError;

    for reserved in [Opcode::PMov, Opcode::ArrayIndexSet, Opcode::ArrayIndexAdd] {
        let mut asm = Asm::new();
        asm.op(reserved);
        asm.op(Opcode::EndFunc);

        let unit = CodeUnit::new("main", 0, 0, asm.finish());
        let directory = ProgramDirectoryBuilder::new().register(unit).build();
        let mut driver = VMDriver::new(directory, HostBridge::new());

        let err = driver.execute_function("main").unwrap_err();
        assert!(matches!(err, VmError::UnknownOpcode(_)), "{reserved:?} should fault as UnknownOpcode, got {err:?}");
    }
}

/// Recursive factorial to `n = 5`, scenario 6: arguments pass as pushed
/// locals at the callee's own `localAddr`, registers survive `Call`
/// unless explicitly saved with `St`/`Ld`, and every `EndFunc` restores
/// `(funcAddr, pc, localAddr)` to their values immediately before the
/// matching `Call`.
#[test]
fn recursive_factorial() {
    const MAIN_ADDR: i32 = 0;
    const FACT_ADDR: i32 = 1;

    let mut main = Asm::new();
    main.op(Opcode::Push).lit_num(5.0);
    main.op(Opcode::Call).u32(script_call(FACT_ADDR as u32));
    main.op(Opcode::Ret).reg(0);
    main.op(Opcode::EndFunc);

    let mut fact = Asm::new();
    fact.op(Opcode::Mov).reg(0).mem_l(0); // R0 = n
    fact.op(Opcode::CmpLeq).reg(0).lit_num(1.0); // R0 = (n <= 1)
    fact.op(Opcode::Jne);
    let base_case_at = fact.placeholder_u32();
    fact.op(Opcode::Mov).reg(1).mem_l(0); // R1 = n, preserved across the call
    fact.op(Opcode::St).u8(2);
    fact.op(Opcode::Mov).reg(2).mem_l(0);
    fact.op(Opcode::Dec).reg(2); // R2 = n - 1
    fact.op(Opcode::Push).reg(2);
    fact.op(Opcode::Call).u32(script_call(FACT_ADDR as u32));
    fact.op(Opcode::Mov).reg(3).reg(0); // capture factorial(n - 1) before Ld clobbers R0
    fact.op(Opcode::Ld).u8(2);
    fact.op(Opcode::Mov).reg(0).reg(1); // R0 = n
    fact.op(Opcode::Mul).reg(0).reg(3); // R0 = n * factorial(n - 1)
    fact.op(Opcode::Ret).reg(0);
    fact.op(Opcode::Jmp);
    let end_at = fact.placeholder_u32();
    let base_case_addr = fact.here();
    fact.op(Opcode::Mov).reg(0).lit_num(1.0);
    fact.op(Opcode::Ret).reg(0);
    let end_addr = fact.here();
    fact.op(Opcode::EndFunc);

    fact.patch_u32(base_case_at, base_case_addr);
    fact.patch_u32(end_at, end_addr);

    let main_unit = CodeUnit::new("main", MAIN_ADDR, 0, main.finish());
    let fact_unit = CodeUnit::new("factorial", FACT_ADDR, 1, fact.finish());
    let directory = ProgramDirectoryBuilder::new().register(main_unit).register(fact_unit).build();
    let mut driver = VMDriver::new(directory, HostBridge::new());

    let result = driver.execute_function("main").unwrap();
    assert_eq!(result, Value::number(120.0));
    assert!(!driver.is_active());
}

/// Unconditional self-recursion exhausts a small call stack cleanly —
/// `CallStackOverflow`, not a native stack overflow or a hang.
#[test]
fn unbounded_recursion_is_call_stack_overflow() {
    use sencha_vm::driver::DriverConfig;

    let mut loop_fn = Asm::new();
    loop_fn.op(Opcode::Call).u32(script_call(0));
    loop_fn.op(Opcode::EndFunc);

    let unit = CodeUnit::new("loop", 0, 0, loop_fn.finish());
    let directory = ProgramDirectoryBuilder::new().register(unit).build();
    let config = DriverConfig {
        call_stack_size: 8,
        ..DriverConfig::default()
    };
    let mut driver = VMDriver::with_config(directory, HostBridge::new(), config);

    assert!(driver.execute_function("loop").is_err());
}
