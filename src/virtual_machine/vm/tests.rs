use super::*;
use crate::config::DEFAULT_MAX_CALL_DEPTH;
use crate::virtual_machine::assembler::assemble;

/// Minimal host: two interops, one native method and a table of loadable scripts.
#[derive(Default)]
struct TestHost {
    scripts: HashMap<String, Vec<u8>>,
    disabled: Option<Opcode>,
    break_on: Option<Opcode>,
    native_calls: Vec<(NativeContractKind, String)>,
}

impl TestHost {
    fn with_script(mut self, name: &str, source: &str) -> Self {
        let asm = assemble(source).expect("assembly failed");
        self.scripts.insert(name.to_string(), asm.bytecode);
        self
    }
}

impl Host for TestHost {
    fn execute_interop(&mut self, vm: &mut VirtualMachine, method: &str) -> Result<ExecutionState, VMError> {
        match method {
            "Test.Upper" => {
                let text = vm.pop_string()?;
                vm.push(VMObject::from(text.to_uppercase()))?;
            }
            "Test.Sum" => {
                let a = vm.pop_number()?;
                let b = vm.pop_number()?;
                vm.push(VMObject::from(a + b))?;
            }
            _ => return Err(VMError::UnknownInterop(method.to_string())),
        }
        Ok(ExecutionState::Running)
    }

    fn execute_native(&mut self, vm: &mut VirtualMachine, kind: NativeContractKind) -> Result<ExecutionState, VMError> {
        let method = vm.pop_string()?;
        self.native_calls.push((kind, method.clone()));
        match method.as_str() {
            "double" => {
                let n = vm.pop_number()?;
                vm.push(VMObject::from(n * 2))?;
                Ok(ExecutionState::Halt)
            }
            _ => Err(VMError::UnknownMethod {
                context: kind.name().to_string(),
                method,
            }),
        }
    }

    fn load_context(&mut self, name: &str) -> Option<ExecutionContext> {
        self.scripts
            .get(name)
            .map(|code| ExecutionContext::script(name, code.clone()))
    }

    fn validate_opcode(&self, opcode: Opcode) -> ExecutionState {
        if self.disabled == Some(opcode) {
            ExecutionState::Fault
        } else if self.break_on == Some(opcode) {
            ExecutionState::Break
        } else {
            ExecutionState::Running
        }
    }
}

fn vm_for(source: &str) -> VirtualMachine {
    let asm = assemble(source).expect("assembly failed");
    VirtualMachine::for_script(&EngineConfig::default(), asm.bytecode)
}

fn run_vm(source: &str) -> VirtualMachine {
    let mut vm = vm_for(source);
    let state = vm.execute(&mut TestHost::default()).expect("vm run failed");
    assert_eq!(state, ExecutionState::Halt);
    vm
}

fn run_expect_err(source: &str) -> VMError {
    let mut vm = vm_for(source);
    let err = vm.execute(&mut TestHost::default()).unwrap_err();
    assert_eq!(vm.state(), ExecutionState::Fault);
    assert_eq!(vm.fault(), Some(&err));
    err
}

fn stack_of(source: &str) -> Vec<VMObject> {
    run_vm(source).stack().to_vec()
}

fn top_of(source: &str) -> VMObject {
    let mut stack = stack_of(source);
    stack.pop().expect("empty stack")
}

fn num(n: i64) -> VMObject {
    VMObject::from(n)
}

// ==================== Registers and stack ====================

#[test]
fn load_and_push() {
    assert_eq!(top_of("load r0 42\npush r0"), num(42));
    assert_eq!(top_of("load r0 \"hi\"\npush r0"), VMObject::from("hi"));
    assert_eq!(top_of("load r0 true\npush r0"), VMObject::Bool(true));
}

#[test]
fn move_leaves_source_empty() {
    let stack = stack_of("load r0 1\nmove r0 r1\npush r0\npush r1");
    assert_eq!(stack, vec![VMObject::None, num(1)]);
}

#[test]
fn copy_keeps_source() {
    let stack = stack_of("load r0 1\ncopy r0 r1\npush r0\npush r1");
    assert_eq!(stack, vec![num(1), num(1)]);
}

#[test]
fn swap_exchanges_registers() {
    let stack = stack_of("load r0 1\nload r1 2\nswap r0 r1\npush r0\npush r1");
    assert_eq!(stack, vec![num(2), num(1)]);
}

#[test]
fn pop_from_empty_stack_underflows() {
    assert!(matches!(run_expect_err("pop r0"), VMError::StackUnderflow));
}

#[test]
fn stack_capacity_is_enforced() {
    let config = EngineConfig {
        max_stack: 2,
        ..EngineConfig::default()
    };
    let asm = assemble("push r0\npush r0\npush r0").unwrap();
    let mut vm = VirtualMachine::for_script(&config, asm.bytecode);
    assert!(matches!(
        vm.execute(&mut TestHost::default()),
        Err(VMError::StackOverflow(2))
    ));
}

// ==================== Arithmetic and logic ====================

#[test]
fn arithmetic() {
    assert_eq!(top_of("load r0 2\nload r1 3\nadd r0 r1 r2\npush r2"), num(5));
    assert_eq!(top_of("load r0 2\nload r1 3\nsub r0 r1 r2\npush r2"), num(-1));
    assert_eq!(top_of("load r0 6\nload r1 7\nmul r0 r1 r2\npush r2"), num(42));
    assert_eq!(top_of("load r0 -7\nload r1 2\ndiv r0 r1 r2\npush r2"), num(-3));
    assert_eq!(top_of("load r0 7\nload r1 3\nmod r0 r1 r2\npush r2"), num(1));
    assert_eq!(top_of("load r0 2\nload r1 10\npow r0 r1 r2\npush r2"), num(1024));
    assert_eq!(top_of("load r0 1\nload r1 4\nshl r0 r1 r2\npush r2"), num(16));
    assert_eq!(top_of("load r0 16\nload r1 2\nshr r0 r1 r2\npush r2"), num(4));
    assert_eq!(top_of("load r0 4\nload r1 9\nmin r0 r1 r2\npush r2"), num(4));
    assert_eq!(top_of("load r0 4\nload r1 9\nmax r0 r1 r2\npush r2"), num(9));
}

#[test]
fn numbers_are_arbitrary_precision() {
    let top = top_of("load r0 2\nload r1 100\npow r0 r1 r2\npush r2");
    assert_eq!(top, VMObject::Number(BigInt::from(1u8) << 100u32));
}

#[test]
fn unary_ops() {
    assert_eq!(top_of("load r0 1\ninc r0\npush r0"), num(2));
    assert_eq!(top_of("load r0 1\ndec r0\npush r0"), num(0));
    assert_eq!(top_of("load r0 -9\nsign r0 r1\npush r1"), num(-1));
    assert_eq!(top_of("load r0 9\nnegate r0 r1\npush r1"), num(-9));
    assert_eq!(top_of("load r0 -9\nabs r0 r1\npush r1"), num(9));
}

#[test]
fn division_by_zero_faults() {
    assert!(matches!(
        run_expect_err("load r0 1\nload r1 0\ndiv r0 r1 r2"),
        VMError::DivisionByZero
    ));
    assert!(matches!(
        run_expect_err("load r0 1\nload r1 0\nmod r0 r1 r2"),
        VMError::DivisionByZero
    ));
}

#[test]
fn oversized_shift_and_power_fault() {
    assert!(matches!(
        run_expect_err("load r0 1\nload r1 100000\nshl r0 r1 r2"),
        VMError::InvalidValue(_)
    ));
    assert!(matches!(
        run_expect_err("load r0 1\nload r1 -1\nshr r0 r1 r2"),
        VMError::InvalidValue(_)
    ));
    assert!(matches!(
        run_expect_err("load r0 10\nload r1 100000\npow r0 r1 r2"),
        VMError::InvalidValue(_)
    ));
}

#[test]
fn arithmetic_results_are_bounded() {
    // 2^8000 squared needs 16001 bits.
    assert!(matches!(
        run_expect_err("load r0 1\nload r1 8000\nshl r0 r1 r0\nmul r0 r0 r0"),
        VMError::InvalidValue(msg) if msg.contains("8192 bits")
    ));
    // 2^8191 doubled needs 8193 bits.
    assert!(matches!(
        run_expect_err("load r0 1\nload r1 8191\nshl r0 r1 r0\nadd r0 r0 r0"),
        VMError::InvalidValue(_)
    ));
    // 2^8192 - 1 still fits; one more does not.
    assert!(matches!(
        run_expect_err("load r0 1\nload r1 8191\nshl r0 r1 r0\nload r2 1\nsub r0 r2 r3\nadd r0 r3 r0\ninc r0"),
        VMError::InvalidValue(_)
    ));
    let vm = run_vm("load r0 1\nload r1 4000\nshl r0 r1 r0\nmul r0 r0 r0\npush r0");
    assert_eq!(vm.stack()[0].as_number().unwrap().bits(), 8001);
}

#[test]
fn concatenation_is_bounded() {
    // 16 bytes doubled 12 times is exactly the limit; once more is too much.
    let mut source = String::from("load r0 \"0123456789abcdef\"\n");
    source.push_str(&"cat r0 r0 r0\n".repeat(12));
    source.push_str("size r0 r1\npush r1");
    assert_eq!(top_of(&source), num(MAX_VALUE_SIZE as i64));

    let mut source = String::from("load r0 0x00112233445566778899aabbccddeeff\n");
    source.push_str(&"cat r0 r0 r0\n".repeat(13));
    assert!(matches!(run_expect_err(&source), VMError::InvalidValue(_)));

    let mut source = String::from("load r0 \"0123456789abcdef\"\n");
    source.push_str(&"add r0 r0 r0\n".repeat(13));
    assert!(matches!(run_expect_err(&source), VMError::InvalidValue(_)));
}

#[test]
fn add_concatenates_strings() {
    assert_eq!(
        top_of("load r0 \"foo\"\nload r1 \"bar\"\nadd r0 r1 r2\npush r2"),
        VMObject::from("foobar")
    );
}

#[test]
fn logic_on_bools_and_numbers() {
    assert_eq!(top_of("load r0 true\nload r1 false\nand r0 r1 r2\npush r2"), VMObject::Bool(false));
    assert_eq!(top_of("load r0 true\nload r1 false\nor r0 r1 r2\npush r2"), VMObject::Bool(true));
    assert_eq!(top_of("load r0 true\nload r1 true\nxor r0 r1 r2\npush r2"), VMObject::Bool(false));
    assert_eq!(top_of("load r0 12\nload r1 10\nand r0 r1 r2\npush r2"), num(8));
    assert_eq!(top_of("load r0 12\nload r1 3\nor r0 r1 r2\npush r2"), num(15));
    assert_eq!(top_of("load r0 true\nnot r0 r1\npush r1"), VMObject::Bool(false));
}

#[test]
fn comparisons() {
    assert_eq!(top_of("load r0 1\nload r1 2\nlt r0 r1 r2\npush r2"), VMObject::Bool(true));
    assert_eq!(top_of("load r0 1\nload r1 2\ngt r0 r1 r2\npush r2"), VMObject::Bool(false));
    assert_eq!(top_of("load r0 2\nload r1 2\nlte r0 r1 r2\npush r2"), VMObject::Bool(true));
    assert_eq!(top_of("load r0 2\nload r1 2\ngte r0 r1 r2\npush r2"), VMObject::Bool(true));
    assert_eq!(top_of("load r0 \"a\"\nload r1 \"a\"\nequal r0 r1 r2\npush r2"), VMObject::Bool(true));
    assert_eq!(top_of("load r0 \"1\"\nload r1 1\nequal r0 r1 r2\npush r2"), VMObject::Bool(false));
}

#[test]
fn invalid_coercion_faults() {
    assert!(matches!(
        run_expect_err("load r0 \"abc\"\nload r1 1\nsub r0 r1 r2"),
        VMError::InvalidCast { from: "String", to: "Number" }
    ));
}

// ==================== Data ====================

#[test]
fn cast_between_types() {
    assert_eq!(top_of("load r0 \"12\"\ncast r0 r1 Number\npush r1"), num(12));
    assert_eq!(top_of("load r0 12\ncast r0 r1 String\npush r1"), VMObject::from("12"));
}

#[test]
fn cat_joins_strings_and_bytes() {
    assert_eq!(top_of("load r0 \"ab\"\nload r1 \"cd\"\ncat r0 r1 r2\npush r2"), VMObject::from("abcd"));
    assert_eq!(top_of("load r0 0x01\nload r1 0x02\ncat r0 r1 r2\npush r2"), VMObject::Bytes(vec![1, 2]));
    assert_eq!(top_of("load r1 \"x\"\ncat r0 r1 r2\npush r2"), VMObject::from("x"));
}

#[test]
fn slicing() {
    let stack = stack_of(
        "load r0 \"hello\"
         left r0 r1 2
         right r0 r2 3
         range r0 r3 1 3
         push r1
         push r2
         push r3",
    );
    assert_eq!(stack, vec![VMObject::from("he"), VMObject::from("llo"), VMObject::from("ell")]);
    assert!(matches!(run_expect_err("load r0 \"abc\"\nleft r0 r1 9"), VMError::InvalidValue(_)));
    assert!(matches!(run_expect_err("load r0 \"abc\"\nright r0 r1 9"), VMError::InvalidValue(_)));
}

#[test]
fn size_and_count() {
    assert_eq!(top_of("load r0 0x010203\nsize r0 r1\npush r1"), num(3));
    assert_eq!(top_of("count r0 r1\npush r1"), num(0));
    assert_eq!(top_of("load r0 7\ncount r0 r1\npush r1"), num(1));
}

#[test]
fn struct_fields() {
    let stack = stack_of(
        "load r0 1
         load r1 \"amount\"
         put r0 r2 r1
         count r2 r3
         get r2 r4 r1
         load r5 \"missing\"
         get r2 r6 r5
         push r3
         push r4
         push r6",
    );
    assert_eq!(stack, vec![num(1), num(1), VMObject::None]);
}

#[test]
fn struct_nesting_is_bounded_by_put() {
    let mut source = String::from("load r1 \"k\"\n");
    source.push_str(&"put r0 r0 r1\n".repeat(MAX_STRUCT_DEPTH));
    source.push_str("push r0");
    assert_eq!(top_of(&source).depth(), MAX_STRUCT_DEPTH);

    source.push_str("\nput r0 r0 r1");
    assert!(matches!(run_expect_err(&source), VMError::InvalidValue(_)));
}

#[test]
fn deeply_nested_struct_literal_faults() {
    let mut payload = Vec::new();
    for _ in 0..200_000 {
        payload.extend_from_slice(&[VMType::Struct as u8, 1, 0]);
    }
    let mut code = vec![Opcode::Load as u8, 0, VMType::Struct as u8];
    crate::types::encoding::write_varint(&mut code, payload.len() as u64);
    code.extend(payload);

    let mut vm = VirtualMachine::for_script(&EngineConfig::default(), code);
    assert!(matches!(
        vm.execute(&mut TestHost::default()),
        Err(VMError::Decode(crate::types::encoding::DecodeError::TooDeep(_)))
    ));
}

#[test]
fn put_into_non_struct_faults() {
    assert!(matches!(
        run_expect_err("load r0 1\nload r1 \"k\"\nload r2 5\nput r0 r2 r1"),
        VMError::InvalidCast { to: "Struct", .. }
    ));
}

#[test]
fn clear_resets_register() {
    assert_eq!(top_of("load r0 1\nclear r0\npush r0"), VMObject::None);
}

// ==================== Control flow ====================

#[test]
fn loop_with_conditional_jump() {
    let top = top_of(
        "load r0 0
         load r1 5
         @loop: inc r0
         lt r0 r1 r2
         jmpif r2 @loop
         push r0",
    );
    assert_eq!(top, num(5));
}

#[test]
fn jmpnot_skips_when_false() {
    let top = top_of(
        "load r0 false
         load r1 1
         jmpnot r0 @skip
         load r1 2
         @skip: push r1",
    );
    assert_eq!(top, num(1));
}

#[test]
fn jump_to_end_halts_and_past_end_faults() {
    assert!(run_vm("jmp @end\nthrow r0\n@end:").stack().is_empty());
    assert!(matches!(run_expect_err("jmp 100"), VMError::InvalidIP { ip: 100, .. }));
}

#[test]
fn call_and_ret() {
    let top = top_of(
        "load r0 7
         push r0
         call 4 @double
         ret
         @double: pop r0
         add r0 r0 r1
         push r1
         ret",
    );
    assert_eq!(top, num(14));
}

#[test]
fn call_frames_have_their_own_registers() {
    let stack = stack_of(
        "load r0 1
         call 2 @f
         push r0
         ret
         @f: load r0 99
         ret",
    );
    assert_eq!(stack, vec![num(1)]);
}

#[test]
fn call_with_too_few_registers_faults() {
    assert!(matches!(
        run_expect_err("call 1 @f\nret\n@f: load r5 1"),
        VMError::InvalidRegisterIndex(5)
    ));
}

#[test]
fn throw_reports_message() {
    let err = run_expect_err("load r0 \"boom\"\nthrow r0");
    assert_eq!(err, VMError::Throw("boom".into()));
    assert_eq!(err.to_string(), "script exception: boom");
}

#[test]
fn recursion_hits_frame_limit() {
    let config = EngineConfig::default().with_max_frames(4);
    let asm = assemble("@f: call 1 @f").unwrap();
    let mut vm = VirtualMachine::for_script(&config, asm.bytecode);
    assert!(matches!(
        vm.execute(&mut TestHost::default()),
        Err(VMError::CallDepthExceeded(4))
    ));
}

#[test]
fn depth_base_counts_against_limit() {
    let config = EngineConfig::default().with_max_frames(4);
    let asm = assemble("nop").unwrap();
    let mut vm = VirtualMachine::for_script(&config, asm.bytecode).with_depth_base(4);
    assert!(matches!(
        vm.execute(&mut TestHost::default()),
        Err(VMError::CallDepthExceeded(4))
    ));
}

#[test]
fn context_recursion_stops_at_call_depth() {
    let recurse = "load r0 \"rec\"\nctx r0 r1\nswitch r1";
    let mut host = TestHost::default().with_script("rec", recurse);
    let mut vm = vm_for(recurse);
    assert!(matches!(
        vm.execute(&mut host),
        Err(VMError::CallDepthExceeded(DEFAULT_MAX_CALL_DEPTH))
    ));
    assert_eq!(vm.call_depth(), 0);
    assert!(vm.current_context_name().is_none());
}

#[test]
fn call_depth_base_counts_against_limit() {
    let config = EngineConfig::default().with_max_call_depth(3);
    let mut host = TestHost::default().with_script("lib", "ret");
    let asm = assemble("load r0 \"lib\"\nctx r0 r1\nswitch r1").unwrap();

    let mut vm = VirtualMachine::for_script(&config, asm.bytecode.clone()).with_call_depth_base(1);
    assert_eq!(vm.execute(&mut host).unwrap(), ExecutionState::Halt);

    let mut vm = VirtualMachine::for_script(&config, asm.bytecode).with_call_depth_base(2);
    assert!(matches!(vm.execute(&mut host), Err(VMError::CallDepthExceeded(3))));
}

// ==================== Decoding ====================

#[test]
fn empty_script_is_rejected() {
    let mut vm = VirtualMachine::for_script(&EngineConfig::default(), Vec::new());
    assert!(matches!(vm.execute(&mut TestHost::default()), Err(VMError::EmptyScript)));
}

#[test]
fn unknown_opcode_reports_offset() {
    let mut vm = VirtualMachine::for_script(&EngineConfig::default(), vec![Opcode::Nop as u8, 0xFF]);
    assert!(matches!(
        vm.execute(&mut TestHost::default()),
        Err(VMError::InvalidInstruction { opcode: 0xFF, offset: 1 })
    ));
}

#[test]
fn truncated_instruction_faults() {
    let mut vm = VirtualMachine::for_script(&EngineConfig::default(), vec![Opcode::Move as u8, 0]);
    assert!(matches!(
        vm.execute(&mut TestHost::default()),
        Err(VMError::UnexpectedEndOfBytecode { .. })
    ));
}

#[test]
fn entry_offset_must_be_inside_script() {
    let mut vm = VirtualMachine::new(&EngineConfig::default(), vec![Opcode::Nop as u8], 5, "entry");
    assert!(matches!(
        vm.execute(&mut TestHost::default()),
        Err(VMError::InvalidIP { ip: 5, len: 1 })
    ));
}

// ==================== Gas ====================

#[test]
fn gas_is_charged_per_opcode() {
    let vm = run_vm("load r0 1\nadd r0 r0 r1\nnop");
    assert_eq!(vm.used_gas(), 6);
    assert_eq!(vm.gas_profile().get(GasCategory::OpcodeBase), 6);
}

#[test]
fn out_of_gas_charges_nothing() {
    let asm = assemble("load r0 1").unwrap();
    let mut vm = VirtualMachine::for_script(&EngineConfig::default(), asm.bytecode).with_gas_limit(3);
    assert!(matches!(
        vm.execute(&mut TestHost::default()),
        Err(VMError::OutOfGas { required: 5, available: 3 })
    ));
    assert_eq!(vm.used_gas(), 0);
    assert_eq!(vm.remaining_gas(), 3);
}

// ==================== Host seams ====================

#[test]
fn extcall_runs_interop() {
    let top = top_of("load r0 \"abc\"\npush r0\nextcall \"Test.Upper\"");
    assert_eq!(top, VMObject::from("ABC"));
    let top = top_of("load r0 2\nload r1 3\npush r0\npush r1\nextcall \"Test.Sum\"");
    assert_eq!(top, num(5));
}

#[test]
fn unknown_interop_faults() {
    let err = run_expect_err("extcall \"Runtime.Nope\"");
    assert_eq!(err.to_string(), "unknown interop: Runtime.Nope");
}

#[test]
fn disabled_opcode_faults_before_charging() {
    let mut vm = vm_for("load r0 1\nload r1 2\nadd r0 r1 r2");
    let mut host = TestHost {
        disabled: Some(Opcode::Add),
        ..TestHost::default()
    };
    assert!(matches!(vm.execute(&mut host), Err(VMError::OpcodeDisabled("ADD"))));
    assert_eq!(vm.used_gas(), 10);
}

#[test]
fn break_stops_execution() {
    let mut vm = vm_for("load r0 1\nthrow r0");
    let mut host = TestHost {
        break_on: Some(Opcode::Throw),
        ..TestHost::default()
    };
    assert_eq!(vm.execute(&mut host).unwrap(), ExecutionState::Break);
    assert_eq!(vm.state(), ExecutionState::Break);
}

#[test]
fn ctx_and_switch_run_loaded_context() {
    let mut host = TestHost::default().with_script("lib", "load r0 5\npush r0\nret");
    let mut vm = vm_for("load r0 \"lib\"\nctx r0 r1\nswitch r1\nload r2 1\npush r2");
    assert_eq!(vm.execute(&mut host).unwrap(), ExecutionState::Halt);
    assert_eq!(vm.stack(), &[num(5), num(1)]);
    assert!(vm.find_context("lib").is_some());
    assert!(vm.current_context_name().is_none());
}

#[test]
fn ctx_of_unknown_name_faults() {
    assert!(matches!(
        run_expect_err("load r0 \"ghost\"\nctx r0 r1"),
        VMError::UnknownContext(name) if name == "ghost"
    ));
}

#[test]
fn switch_to_unregistered_name_is_null_context() {
    assert!(matches!(run_expect_err("load r0 \"ghost\"\nswitch r0"), VMError::NullContext));
}

#[test]
fn fault_in_switched_context_restores_caller() {
    let mut host = TestHost::default().with_script("bad", "load r0 \"nope\"\nthrow r0");
    let mut vm = vm_for("load r0 \"bad\"\nctx r0 r1\nswitch r1");
    assert!(matches!(vm.execute(&mut host), Err(VMError::Throw(_))));
    assert!(vm.current_context_name().is_none());
    assert!(matches!(vm.peek_frame(), Err(VMError::FrameStackEmpty)));
}

#[test]
fn call_context_passes_args_in_order() {
    let mut host = TestHost::default().with_script("sub", "pop r0\npop r1\nsub r0 r1 r2\npush r2\nret");
    let mut vm = vm_for("nop");
    let result = vm
        .call_context(&mut host, "sub", 0, &[num(10), num(3)])
        .unwrap();
    assert_eq!(result, num(7));
    assert!(vm.stack().is_empty());
}

#[test]
fn call_context_without_result_returns_none() {
    let mut host = TestHost::default().with_script("quiet", "nop");
    let mut vm = vm_for("nop");
    assert_eq!(vm.call_context(&mut host, "quiet", 0, &[]).unwrap(), VMObject::None);
    assert!(vm.stack().is_empty());
    assert!(matches!(
        vm.call_context(&mut host, "ghost", 0, &[]),
        Err(VMError::UnknownContext(_))
    ));
}

#[test]
fn native_context_receives_method_then_args() {
    let mut host = TestHost::default();
    let mut vm = vm_for("nop");
    let result = vm
        .call_native_context(&mut host, NativeContractKind::Stake, "double", &[num(21)])
        .unwrap();
    assert_eq!(result, num(42));
    assert_eq!(host.native_calls, vec![(NativeContractKind::Stake, "double".to_string())]);

    let err = vm
        .call_native_context(&mut host, NativeContractKind::Stake, "triple", &[num(1)])
        .unwrap_err();
    assert!(matches!(err, VMError::UnknownMethod { .. }));
    assert!(vm.stack().is_empty());
}

// ==================== Contexts and frames ====================

#[test]
fn null_context_is_rejected() {
    let mut vm = vm_for("nop");
    assert!(matches!(vm.set_current_context(None), Err(VMError::NullContext)));
    assert!(matches!(
        vm.switch_context(&mut TestHost::default(), None, 0),
        Err(VMError::NullContext)
    ));
}

#[test]
fn set_current_context_tracks_previous() {
    let mut vm = vm_for("nop");
    vm.set_current_context(Some(ExecutionContext::native(NativeContractKind::Account)))
        .unwrap();
    vm.set_current_context(Some(ExecutionContext::native(NativeContractKind::Stake)))
        .unwrap();
    assert_eq!(vm.current_context_name(), Some("stake"));
    assert_eq!(vm.previous_context_name(), Some("account"));
    assert_eq!(vm.current_address(), Some(NativeContractKind::Stake.address()));
}

#[test]
fn register_context_replaces_existing() {
    let mut vm = vm_for("nop");
    vm.register_context("lib", ExecutionContext::script("lib", vec![1u8]));
    vm.register_context("lib", ExecutionContext::script("lib", vec![2u8]));
    let ExecutionContext::Script(script) = vm.find_context("lib").unwrap() else {
        panic!("expected script context");
    };
    assert_eq!(&*script.script, &[2u8]);
}

#[test]
fn frame_stack_operations() {
    let mut vm = vm_for("nop");
    assert!(matches!(vm.peek_frame(), Err(VMError::FrameStackEmpty)));
    vm.push_frame("entry", 4, 9).unwrap();
    assert_eq!(vm.peek_frame().unwrap().return_offset(), 9);
    assert_eq!(vm.depth(), 1);
    assert_eq!(vm.pop_frame().unwrap().context(), "entry");
    assert!(matches!(vm.pop_frame(), Err(VMError::FrameStackEmpty)));
}
