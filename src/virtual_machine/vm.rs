//! Core virtual machine implementation.
//!
//! The VM runs bytecode with one register bank per frame and a shared value
//! stack. Code is organised in named [`ExecutionContext`]s: scripts run in
//! the interpreter loop, native contexts and interop calls are delegated to
//! the [`Host`].
//!
//! Every opcode is validated by the host and charged its base gas before it
//! has any effect.

pub mod gas;
#[cfg(test)]
mod tests;

use crate::config::EngineConfig;
use crate::utils::validation::ENTRY_CONTEXT_NAME;
use crate::virtual_machine::context::{ExecutionContext, NativeContractKind};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::frame::{ExecutionFrame, MAX_REGISTERS};
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::object::{InteropValue, VMObject, VMType, MAX_STRUCT_DEPTH};
use crate::types::address::Address;
use crate::types::encoding::read_varint;
use gas::{GasCategory, GasMeter, GasProfile};
use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Largest number, in bits, an arithmetic opcode may produce.
pub const MAX_NUMBER_BITS: u64 = 8192;

/// Largest string or byte array, in bytes, CAT and ADD may build.
pub const MAX_VALUE_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Running,
    Halt,
    Fault,
    Break,
}

/// Services the VM needs from its embedder.
pub trait Host {
    /// Runs the interop named `method`, popping its arguments from the VM stack.
    fn execute_interop(&mut self, vm: &mut VirtualMachine, method: &str) -> Result<ExecutionState, VMError>;

    /// Runs a native context. The method name is on top of the stack,
    /// followed by the arguments in call order.
    fn execute_native(&mut self, vm: &mut VirtualMachine, kind: NativeContractKind) -> Result<ExecutionState, VMError>;

    /// Resolves a context the VM has not seen yet.
    fn load_context(&mut self, name: &str) -> Option<ExecutionContext>;

    /// Checked before every opcode. `Fault` rejects the opcode, `Break` stops the run.
    fn validate_opcode(&self, _opcode: Opcode) -> ExecutionState {
        ExecutionState::Running
    }
}

macro_rules! exec_vm {
    // Entry point
    (
        vm = $vm:ident,
        host = $host:ident,
        cursor = $cursor:ident,
        opcode = $opcode:ident,
        { $( $variant:ident => $handler:ident $args:tt ),* $(,)? }
    ) => {{
        match $opcode {
            $(
                Opcode::$variant => exec_vm!(@call $vm, $host, $cursor, $handler, $args),
            )*
        }
    }};

    // Handler that needs the host (semicolon separator)
    (@call $vm:ident, $host:ident, $cursor:ident, $handler:ident,
        (host; $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        $( let $field = exec_vm!(@read $cursor, $kind)?; )*
        $vm.$handler($host, $( $field ),*)
    }};

    // Handler that moves the instruction pointer
    (@call $vm:ident, $host:ident, $cursor:ident, $handler:ident,
        (cursor; $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        $( let $field = exec_vm!(@read $cursor, $kind)?; )*
        $vm.$handler($cursor, $( $field ),*)
    }};

    // Plain handler, always continues
    (@call $vm:ident, $host:ident, $cursor:ident, $handler:ident,
        ( $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        $( let $field = exec_vm!(@read $cursor, $kind)?; )*
        $vm.$handler($( $field ),*).map(|_| ExecutionState::Running)
    }};

    (@read $cursor:ident, Reg) => {{
        $cursor.read_u8()
    }};

    (@read $cursor:ident, Count) => {{
        $cursor.read_u8()
    }};

    (@read $cursor:ident, Offset) => {{
        $cursor.read_u16().map(usize::from)
    }};

    (@read $cursor:ident, Type) => {{
        let tag = $cursor.read_u8()?;
        VMType::from_u8(tag).ok_or_else(|| VMError::InvalidValue(format!("unknown type tag {tag}")))
    }};

    (@read $cursor:ident, Literal) => {{
        $cursor.read_literal()
    }};
}

/// Read position inside the script being interpreted.
pub(crate) struct Cursor {
    code: Arc<[u8]>,
    ip: usize,
    /// Frame count when this script was entered; `RET` at this depth halts.
    base_depth: usize,
}

impl Cursor {
    fn read_exact(&mut self, count: usize) -> Result<&[u8], VMError> {
        let start = self.ip;
        let slice = start
            .checked_add(count)
            .and_then(|end| self.code.get(start..end))
            .ok_or(VMError::UnexpectedEndOfBytecode { ip: start })?;
        self.ip = start + count;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, VMError> {
        Ok(self.read_exact(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, VMError> {
        let bytes = self.read_exact(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_literal(&mut self) -> Result<VMObject, VMError> {
        let tag = self.read_u8()?;
        let ty = VMType::from_u8(tag).ok_or_else(|| VMError::InvalidValue(format!("unknown type tag {tag}")))?;
        let start = self.ip;
        let mut rest = self.code.get(start..).unwrap_or_default();
        let before = rest.len();
        let len = read_varint(&mut rest).map_err(|_| VMError::UnexpectedEndOfBytecode { ip: start })?;
        self.ip = start + (before - rest.len());
        let len = usize::try_from(len).map_err(|_| VMError::UnexpectedEndOfBytecode { ip: self.ip })?;
        let data = self.read_exact(len)?.to_vec();
        VMObject::from_raw(ty, &data)
    }

    fn jump(&mut self, offset: usize) -> Result<(), VMError> {
        if offset > self.code.len() {
            return Err(VMError::InvalidIP {
                ip: offset,
                len: self.code.len(),
            });
        }
        self.ip = offset;
        Ok(())
    }
}

/// Bytecode virtual machine.
///
/// Owns the context registry, frame stack, value stack and gas meter of one
/// execution. Nested executions (triggers) get their own instance whose
/// `depth_base` and `call_depth_base` carry the caller's depths, so both
/// limits hold across all of them.
///
/// `max_call_depth` bounds the interpreter loops nested on the native stack
/// (one per active context switch). It is much smaller than `max_frames`,
/// which also counts `CALL` frames that do not recurse.
pub struct VirtualMachine {
    contexts: HashMap<String, ExecutionContext>,
    entry_context: String,
    entry_offset: usize,
    current_context: Option<String>,
    previous_context: Option<String>,
    frames: Vec<ExecutionFrame>,
    stack: Vec<VMObject>,
    max_stack: usize,
    max_frames: usize,
    depth_base: usize,
    call_depth: usize,
    max_call_depth: usize,
    call_depth_base: usize,
    gas: GasMeter,
    state: ExecutionState,
    fault: Option<VMError>,
}

impl VirtualMachine {
    /// Creates a VM that will run `script` from `offset` as context `context_name`.
    pub fn new(config: &EngineConfig, script: impl Into<Arc<[u8]>>, offset: usize, context_name: &str) -> Self {
        let mut contexts = HashMap::new();
        contexts.insert(
            context_name.to_string(),
            ExecutionContext::script(context_name, script),
        );
        Self {
            contexts,
            entry_context: context_name.to_string(),
            entry_offset: offset,
            current_context: None,
            previous_context: None,
            frames: Vec::new(),
            stack: Vec::new(),
            max_stack: config.max_stack,
            max_frames: config.max_frames,
            depth_base: 0,
            call_depth: 0,
            max_call_depth: config.max_call_depth,
            call_depth_base: 0,
            gas: GasMeter::new(config.gas_limit),
            state: ExecutionState::Running,
            fault: None,
        }
    }

    /// VM for a transaction script, registered under the entry context name.
    pub fn for_script(config: &EngineConfig, script: impl Into<Arc<[u8]>>) -> Self {
        Self::new(config, script, 0, ENTRY_CONTEXT_NAME)
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas = GasMeter::new(gas_limit);
        self
    }

    /// Frames already in use by enclosing VMs.
    pub fn with_depth_base(mut self, depth_base: usize) -> Self {
        self.depth_base = depth_base;
        self
    }

    /// Context switches already active in enclosing VMs.
    pub fn with_call_depth_base(mut self, call_depth_base: usize) -> Self {
        self.call_depth_base = call_depth_base;
        self
    }

    // =========================
    // Execution
    // =========================

    /// Runs the entry context to completion.
    ///
    /// On error the VM is left in [`ExecutionState::Fault`] and the error is
    /// kept in [`fault`](Self::fault).
    pub fn execute(&mut self, host: &mut dyn Host) -> Result<ExecutionState, VMError> {
        self.state = ExecutionState::Running;
        self.fault = None;
        let result = self.run_entry(host);
        match &result {
            Ok(state) => self.state = *state,
            Err(err) => {
                crate::debug!("vm fault in {}: {err}", self.entry_context);
                self.state = ExecutionState::Fault;
                self.fault = Some(err.clone());
            }
        }
        result
    }

    fn run_entry(&mut self, host: &mut dyn Host) -> Result<ExecutionState, VMError> {
        let entry = self.find_context(&self.entry_context).cloned();
        if let Some(ExecutionContext::Script(script)) = &entry {
            if script.script.is_empty() {
                return Err(VMError::EmptyScript);
            }
        }
        let offset = self.entry_offset;
        self.switch_context(host, entry, offset)
    }

    /// Makes `context` current and runs it from `offset` until it returns.
    ///
    /// The context is registered if it is not known yet. A frame is pushed
    /// for the callee and popped afterwards; the caller's context is
    /// restored whether the callee halts or faults.
    pub fn switch_context(
        &mut self,
        host: &mut dyn Host,
        context: Option<ExecutionContext>,
        offset: usize,
    ) -> Result<ExecutionState, VMError> {
        let context = context.ok_or(VMError::NullContext)?;
        if let ExecutionContext::Script(script) = &context {
            if offset >= script.script.len() {
                return Err(VMError::InvalidIP {
                    ip: offset,
                    len: script.script.len(),
                });
            }
        }

        if self.call_depth() >= self.max_call_depth {
            return Err(VMError::CallDepthExceeded(self.max_call_depth));
        }

        let name = context.name().to_string();
        self.contexts
            .entry(name.clone())
            .or_insert_with(|| context.clone());

        let saved_current = self.current_context.clone();
        let saved_previous = self.previous_context.clone();
        let frame_depth = self.frames.len();

        self.previous_context = saved_current.clone();
        self.current_context = Some(name.clone());
        self.call_depth += 1;

        let result = self.push_frame(&name, MAX_REGISTERS, 0).and_then(|()| match context {
            ExecutionContext::Script(script) => self.run_script(host, script.script, offset),
            ExecutionContext::Native(native) => host.execute_native(self, native.kind),
        });

        self.call_depth -= 1;
        self.frames.truncate(frame_depth);
        self.current_context = saved_current;
        self.previous_context = saved_previous;
        result
    }

    fn run_script(&mut self, host: &mut dyn Host, code: Arc<[u8]>, offset: usize) -> Result<ExecutionState, VMError> {
        let mut cursor = Cursor {
            code,
            ip: offset,
            base_depth: self.frames.len(),
        };

        loop {
            if cursor.ip >= cursor.code.len() {
                return Ok(ExecutionState::Halt);
            }
            let at = cursor.ip;
            let byte = cursor.code[at];
            cursor.ip += 1;
            let opcode = Opcode::try_from(byte).map_err(|_| VMError::InvalidInstruction { opcode: byte, offset: at })?;

            match host.validate_opcode(opcode) {
                ExecutionState::Running => {}
                ExecutionState::Fault => return Err(VMError::OpcodeDisabled(opcode.mnemonic())),
                stop => return Ok(stop),
            }

            self.consume_gas(opcode.base_gas(), GasCategory::OpcodeBase)?;

            match self.exec(host, &mut cursor, opcode)? {
                ExecutionState::Running => {}
                stop => return Ok(stop),
            }
        }
    }

    /// Executes a single decoded opcode.
    fn exec(&mut self, host: &mut dyn Host, cursor: &mut Cursor, opcode: Opcode) -> Result<ExecutionState, VMError> {
        exec_vm! {
            vm = self,
            host = host,
            cursor = cursor,
            opcode = opcode,
            {
                // Registers and stack
                Nop => op_nop(),
                Move => op_move(src: Reg, dst: Reg),
                Copy => op_copy(src: Reg, dst: Reg),
                Push => op_push(src: Reg),
                Pop => op_pop(dst: Reg),
                Swap => op_swap(a: Reg, b: Reg),
                // Control flow
                Call => op_call(cursor; count: Count, offset: Offset),
                ExtCall => op_extcall(host; src: Reg),
                Jmp => op_jmp(cursor; offset: Offset),
                JmpIf => op_jmp_if(cursor; src: Reg, offset: Offset),
                JmpNot => op_jmp_not(cursor; src: Reg, offset: Offset),
                Ret => op_ret(cursor;),
                Throw => op_throw(src: Reg),
                // Data
                Load => op_load(dst: Reg, literal: Literal),
                Cast => op_cast(src: Reg, dst: Reg, ty: Type),
                Cat => op_cat(a: Reg, b: Reg, dst: Reg),
                Range => op_range(src: Reg, dst: Reg, index: Offset, len: Offset),
                Left => op_left(src: Reg, dst: Reg, len: Offset),
                Right => op_right(src: Reg, dst: Reg, len: Offset),
                Size => op_size(src: Reg, dst: Reg),
                Count => op_count(src: Reg, dst: Reg),
                // Logic and comparison
                Not => op_not(src: Reg, dst: Reg),
                And => op_and(a: Reg, b: Reg, dst: Reg),
                Or => op_or(a: Reg, b: Reg, dst: Reg),
                Xor => op_xor(a: Reg, b: Reg, dst: Reg),
                Equal => op_equal(a: Reg, b: Reg, dst: Reg),
                Lt => op_lt(a: Reg, b: Reg, dst: Reg),
                Gt => op_gt(a: Reg, b: Reg, dst: Reg),
                Lte => op_lte(a: Reg, b: Reg, dst: Reg),
                Gte => op_gte(a: Reg, b: Reg, dst: Reg),
                // Arithmetic
                Inc => op_inc(dst: Reg),
                Dec => op_dec(dst: Reg),
                Sign => op_sign(src: Reg, dst: Reg),
                Negate => op_negate(src: Reg, dst: Reg),
                Abs => op_abs(src: Reg, dst: Reg),
                Add => op_add(a: Reg, b: Reg, dst: Reg),
                Sub => op_sub(a: Reg, b: Reg, dst: Reg),
                Mul => op_mul(a: Reg, b: Reg, dst: Reg),
                Div => op_div(a: Reg, b: Reg, dst: Reg),
                Mod => op_mod(a: Reg, b: Reg, dst: Reg),
                Shl => op_shl(a: Reg, b: Reg, dst: Reg),
                Shr => op_shr(a: Reg, b: Reg, dst: Reg),
                Min => op_min(a: Reg, b: Reg, dst: Reg),
                Max => op_max(a: Reg, b: Reg, dst: Reg),
                Pow => op_pow(a: Reg, b: Reg, dst: Reg),
                // Contexts and structs
                Ctx => op_ctx(host; src: Reg, dst: Reg),
                Switch => op_switch(host; src: Reg),
                Put => op_put(src: Reg, dst: Reg, key: Reg),
                Get => op_get(src: Reg, dst: Reg, key: Reg),
                Clear => op_clear(dst: Reg),
            }
        }
    }

    /// Runs `context` at `offset` with `args` and returns the value it left
    /// on top of the stack, or `None` if it left nothing.
    ///
    /// Arguments are pushed last-to-first so the callee pops them in order.
    /// The stack is restored to its previous depth afterwards.
    pub fn invoke_context(
        &mut self,
        host: &mut dyn Host,
        context: ExecutionContext,
        offset: usize,
        args: &[VMObject],
    ) -> Result<VMObject, VMError> {
        let base = self.stack.len();
        let result = self.push_args(args).and_then(|()| self.switch_context(host, Some(context), offset));
        let value = if result.is_ok() && self.stack.len() > base {
            self.pop()?
        } else {
            VMObject::None
        };
        self.stack.truncate(base);
        result.map(|_| value)
    }

    /// Runs the context registered as `name`, loading it through the host if needed.
    pub fn call_context(
        &mut self,
        host: &mut dyn Host,
        name: &str,
        offset: usize,
        args: &[VMObject],
    ) -> Result<VMObject, VMError> {
        let context = self
            .resolve_context(host, name)
            .ok_or_else(|| VMError::UnknownContext(name.to_string()))?;
        crate::debug!("calling context {name} at offset {offset}");
        self.invoke_context(host, context, offset, args)
    }

    /// Calls `method` on a native contract.
    pub fn call_native_context(
        &mut self,
        host: &mut dyn Host,
        kind: NativeContractKind,
        method: &str,
        args: &[VMObject],
    ) -> Result<VMObject, VMError> {
        let mut call = Vec::with_capacity(args.len() + 1);
        call.push(VMObject::from(method));
        call.extend_from_slice(args);
        self.invoke_context(host, ExecutionContext::native(kind), 0, &call)
    }

    fn push_args(&mut self, args: &[VMObject]) -> Result<(), VMError> {
        for arg in args.iter().rev() {
            self.push(arg.clone())?;
        }
        Ok(())
    }

    // =========================
    // Contexts and frames
    // =========================

    pub fn find_context(&self, name: &str) -> Option<&ExecutionContext> {
        self.contexts.get(name)
    }

    /// Inserts or replaces a context.
    pub fn register_context(&mut self, name: &str, context: ExecutionContext) {
        self.contexts.insert(name.to_string(), context);
    }

    /// Looks a context up, asking the host for unknown names.
    pub fn resolve_context(&mut self, host: &mut dyn Host, name: &str) -> Option<ExecutionContext> {
        if let Some(context) = self.contexts.get(name) {
            return Some(context.clone());
        }
        let context = host.load_context(name)?;
        self.register_context(name, context.clone());
        Some(context)
    }

    pub fn set_current_context(&mut self, context: Option<ExecutionContext>) -> Result<(), VMError> {
        let context = context.ok_or(VMError::NullContext)?;
        let name = context.name().to_string();
        self.contexts.entry(name.clone()).or_insert(context);
        self.previous_context = self.current_context.replace(name);
        Ok(())
    }

    pub fn current_context_name(&self) -> Option<&str> {
        self.current_context.as_deref()
    }

    pub fn previous_context_name(&self) -> Option<&str> {
        self.previous_context.as_deref()
    }

    pub fn entry_context_name(&self) -> &str {
        &self.entry_context
    }

    pub fn current_address(&self) -> Option<Address> {
        self.current_context.as_deref().map(Address::from_hash)
    }

    pub fn entry_address(&self) -> Address {
        Address::from_hash(&self.entry_context)
    }

    /// Frames in use by this VM and every VM enclosing it.
    pub fn depth(&self) -> usize {
        self.depth_base + self.frames.len()
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Context switches active in this VM and every VM enclosing it.
    pub fn call_depth(&self) -> usize {
        self.call_depth_base + self.call_depth
    }

    pub fn push_frame(&mut self, context: &str, register_count: usize, return_offset: usize) -> Result<(), VMError> {
        if self.depth() >= self.max_frames {
            return Err(VMError::CallDepthExceeded(self.max_frames));
        }
        let frame = ExecutionFrame::new(context, register_count, return_offset)?;
        self.frames.push(frame);
        Ok(())
    }

    pub fn peek_frame(&self) -> Result<&ExecutionFrame, VMError> {
        self.frames.last().ok_or(VMError::FrameStackEmpty)
    }

    pub fn pop_frame(&mut self) -> Result<ExecutionFrame, VMError> {
        self.frames.pop().ok_or(VMError::FrameStackEmpty)
    }

    fn frame_mut(&mut self) -> Result<&mut ExecutionFrame, VMError> {
        self.frames.last_mut().ok_or(VMError::FrameStackEmpty)
    }

    fn reg(&self, idx: u8) -> Result<&VMObject, VMError> {
        self.peek_frame()?.get(idx)
    }

    fn set_reg(&mut self, idx: u8, value: VMObject) -> Result<(), VMError> {
        self.frame_mut()?.set(idx, value)
    }

    // =========================
    // Stack
    // =========================

    pub fn push(&mut self, value: VMObject) -> Result<(), VMError> {
        if self.stack.len() >= self.max_stack {
            return Err(VMError::StackOverflow(self.max_stack));
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<VMObject, VMError> {
        self.stack.pop().ok_or(VMError::StackUnderflow)
    }

    pub fn peek(&self) -> Option<&VMObject> {
        self.stack.last()
    }

    pub fn stack(&self) -> &[VMObject] {
        &self.stack
    }

    pub fn pop_number(&mut self) -> Result<BigInt, VMError> {
        self.pop()?.as_number()
    }

    pub fn pop_string(&mut self) -> Result<String, VMError> {
        self.pop()?.as_string()
    }

    pub fn pop_bool(&mut self) -> Result<bool, VMError> {
        self.pop()?.as_bool()
    }

    pub fn pop_bytes(&mut self) -> Result<Vec<u8>, VMError> {
        self.pop()?.as_bytes()
    }

    pub fn pop_address(&mut self) -> Result<Address, VMError> {
        self.pop()?.as_address()
    }

    // =========================
    // Gas and state
    // =========================

    pub fn used_gas(&self) -> u64 {
        self.gas.used()
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas.limit()
    }

    pub fn remaining_gas(&self) -> u64 {
        self.gas.remaining()
    }

    pub fn gas_profile(&self) -> &GasProfile {
        self.gas.profile()
    }

    /// Charges `amount`, failing with `OutOfGas` without recording it when
    /// the limit would be exceeded.
    pub fn consume_gas(&mut self, amount: u64, category: GasCategory) -> Result<(), VMError> {
        self.gas.charge(amount, category)
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn fault(&self) -> Option<&VMError> {
        self.fault.as_ref()
    }

    // =========================
    // Opcode handlers
    // =========================

    fn op_nop(&mut self) -> Result<(), VMError> {
        Ok(())
    }

    fn op_move(&mut self, src: u8, dst: u8) -> Result<(), VMError> {
        let value = self.frame_mut()?.take(src)?;
        self.set_reg(dst, value)
    }

    fn op_copy(&mut self, src: u8, dst: u8) -> Result<(), VMError> {
        let value = self.reg(src)?.clone();
        self.set_reg(dst, value)
    }

    fn op_push(&mut self, src: u8) -> Result<(), VMError> {
        let value = self.reg(src)?.clone();
        self.push(value)
    }

    fn op_pop(&mut self, dst: u8) -> Result<(), VMError> {
        let value = self.pop()?;
        self.set_reg(dst, value)
    }

    fn op_swap(&mut self, a: u8, b: u8) -> Result<(), VMError> {
        let frame = self.frame_mut()?;
        let va = frame.take(a)?;
        let vb = frame.take(b)?;
        frame.set(a, vb)?;
        frame.set(b, va)
    }

    fn op_call(&mut self, cursor: &mut Cursor, count: u8, offset: usize) -> Result<ExecutionState, VMError> {
        if offset >= cursor.code.len() {
            return Err(VMError::InvalidIP {
                ip: offset,
                len: cursor.code.len(),
            });
        }
        let context = self.peek_frame()?.context().to_string();
        self.push_frame(&context, count as usize, cursor.ip)?;
        cursor.ip = offset;
        Ok(ExecutionState::Running)
    }

    fn op_extcall(&mut self, host: &mut dyn Host, src: u8) -> Result<ExecutionState, VMError> {
        let method = self.reg(src)?.as_string()?;
        host.execute_interop(self, &method)
    }

    fn op_jmp(&mut self, cursor: &mut Cursor, offset: usize) -> Result<ExecutionState, VMError> {
        cursor.jump(offset)?;
        Ok(ExecutionState::Running)
    }

    fn op_jmp_if(&mut self, cursor: &mut Cursor, src: u8, offset: usize) -> Result<ExecutionState, VMError> {
        if self.reg(src)?.as_bool()? {
            cursor.jump(offset)?;
        }
        Ok(ExecutionState::Running)
    }

    fn op_jmp_not(&mut self, cursor: &mut Cursor, src: u8, offset: usize) -> Result<ExecutionState, VMError> {
        if !self.reg(src)?.as_bool()? {
            cursor.jump(offset)?;
        }
        Ok(ExecutionState::Running)
    }

    fn op_ret(&mut self, cursor: &mut Cursor) -> Result<ExecutionState, VMError> {
        if self.frames.len() > cursor.base_depth {
            let frame = self.pop_frame()?;
            cursor.ip = frame.return_offset();
            Ok(ExecutionState::Running)
        } else {
            Ok(ExecutionState::Halt)
        }
    }

    fn op_throw(&mut self, src: u8) -> Result<(), VMError> {
        Err(VMError::Throw(self.reg(src)?.to_string()))
    }

    fn op_load(&mut self, dst: u8, literal: VMObject) -> Result<(), VMError> {
        self.set_reg(dst, literal)
    }

    fn op_cast(&mut self, src: u8, dst: u8, ty: VMType) -> Result<(), VMError> {
        let value = self.reg(src)?.cast(ty)?;
        self.set_reg(dst, value)
    }

    fn op_cat(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        let value = match (self.reg(a)?, self.reg(b)?) {
            (VMObject::None, other) | (other, VMObject::None) => other.clone(),
            (VMObject::String(x), VMObject::String(y)) => {
                check_value_size(x.len() + y.len())?;
                VMObject::String(format!("{x}{y}"))
            }
            (x, y) => {
                let mut bytes = x.as_bytes()?;
                let tail = y.as_bytes()?;
                check_value_size(bytes.len() + tail.len())?;
                bytes.extend(tail);
                VMObject::Bytes(bytes)
            }
        };
        self.set_reg(dst, value)
    }

    /// Shared by RANGE, LEFT and RIGHT. Strings are sliced by character.
    fn slice_register(&mut self, src: u8, dst: u8, index: usize, len: usize) -> Result<(), VMError> {
        let out_of_bounds = || VMError::InvalidValue(format!("range {index}+{len} out of bounds"));
        let value = match self.reg(src)? {
            VMObject::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                let end = index.checked_add(len).filter(|end| *end <= chars.len()).ok_or_else(out_of_bounds)?;
                VMObject::String(chars[index..end].iter().collect())
            }
            other => {
                let bytes = other.as_bytes()?;
                let end = index.checked_add(len).filter(|end| *end <= bytes.len()).ok_or_else(out_of_bounds)?;
                VMObject::Bytes(bytes[index..end].to_vec())
            }
        };
        self.set_reg(dst, value)
    }

    fn sequence_len(&self, src: u8) -> Result<usize, VMError> {
        Ok(match self.reg(src)? {
            VMObject::String(s) => s.chars().count(),
            other => other.as_bytes()?.len(),
        })
    }

    fn op_range(&mut self, src: u8, dst: u8, index: usize, len: usize) -> Result<(), VMError> {
        self.slice_register(src, dst, index, len)
    }

    fn op_left(&mut self, src: u8, dst: u8, len: usize) -> Result<(), VMError> {
        self.slice_register(src, dst, 0, len)
    }

    fn op_right(&mut self, src: u8, dst: u8, len: usize) -> Result<(), VMError> {
        let total = self.sequence_len(src)?;
        let index = total
            .checked_sub(len)
            .ok_or_else(|| VMError::InvalidValue(format!("range {len} out of bounds")))?;
        self.slice_register(src, dst, index, len)
    }

    fn op_size(&mut self, src: u8, dst: u8) -> Result<(), VMError> {
        let size = match self.reg(src)? {
            VMObject::String(s) => s.len(),
            other => other.as_bytes()?.len(),
        };
        self.set_reg(dst, VMObject::Number(BigInt::from(size)))
    }

    fn op_count(&mut self, src: u8, dst: u8) -> Result<(), VMError> {
        let count = match self.reg(src)? {
            VMObject::Struct(fields) => fields.len(),
            VMObject::None => 0,
            _ => 1,
        };
        self.set_reg(dst, VMObject::Number(BigInt::from(count)))
    }

    fn op_not(&mut self, src: u8, dst: u8) -> Result<(), VMError> {
        let value = !self.reg(src)?.as_bool()?;
        self.set_reg(dst, VMObject::Bool(value))
    }

    /// Logical on two bools, bitwise on numbers.
    fn logic_op(
        &mut self,
        a: u8,
        b: u8,
        dst: u8,
        on_bool: fn(bool, bool) -> bool,
        on_number: fn(&BigInt, &BigInt) -> BigInt,
    ) -> Result<(), VMError> {
        let value = match (self.reg(a)?, self.reg(b)?) {
            (VMObject::Bool(x), VMObject::Bool(y)) => VMObject::Bool(on_bool(*x, *y)),
            (x, y) => VMObject::Number(on_number(&x.as_number()?, &y.as_number()?)),
        };
        self.set_reg(dst, value)
    }

    fn op_and(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.logic_op(a, b, dst, |x, y| x && y, |x, y| x & y)
    }

    fn op_or(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.logic_op(a, b, dst, |x, y| x || y, |x, y| x | y)
    }

    fn op_xor(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.logic_op(a, b, dst, |x, y| x ^ y, |x, y| x ^ y)
    }

    fn op_equal(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        let equal = self.reg(a)? == self.reg(b)?;
        self.set_reg(dst, VMObject::Bool(equal))
    }

    fn compare(&mut self, a: u8, b: u8, dst: u8, test: fn(&BigInt, &BigInt) -> bool) -> Result<(), VMError> {
        let x = self.reg(a)?.as_number()?;
        let y = self.reg(b)?.as_number()?;
        self.set_reg(dst, VMObject::Bool(test(&x, &y)))
    }

    fn op_lt(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.compare(a, b, dst, |x, y| x < y)
    }

    fn op_gt(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.compare(a, b, dst, |x, y| x > y)
    }

    fn op_lte(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.compare(a, b, dst, |x, y| x <= y)
    }

    fn op_gte(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.compare(a, b, dst, |x, y| x >= y)
    }

    fn unary(&mut self, src: u8, dst: u8, f: fn(BigInt) -> BigInt) -> Result<(), VMError> {
        let x = self.reg(src)?.as_number()?;
        let value = bounded_number(f(x))?;
        self.set_reg(dst, VMObject::Number(value))
    }

    fn op_inc(&mut self, dst: u8) -> Result<(), VMError> {
        self.unary(dst, dst, |x| x + 1)
    }

    fn op_dec(&mut self, dst: u8) -> Result<(), VMError> {
        self.unary(dst, dst, |x| x - 1)
    }

    fn op_sign(&mut self, src: u8, dst: u8) -> Result<(), VMError> {
        self.unary(src, dst, |x| x.signum())
    }

    fn op_negate(&mut self, src: u8, dst: u8) -> Result<(), VMError> {
        self.unary(src, dst, |x| -x)
    }

    fn op_abs(&mut self, src: u8, dst: u8) -> Result<(), VMError> {
        self.unary(src, dst, |x| x.abs())
    }

    fn binary(
        &mut self,
        a: u8,
        b: u8,
        dst: u8,
        f: impl FnOnce(BigInt, BigInt) -> Result<BigInt, VMError>,
    ) -> Result<(), VMError> {
        let x = self.reg(a)?.as_number()?;
        let y = self.reg(b)?.as_number()?;
        let value = bounded_number(f(x, y)?)?;
        self.set_reg(dst, VMObject::Number(value))
    }

    /// Concatenates two strings, adds anything else numerically.
    fn op_add(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        if let (VMObject::String(x), VMObject::String(y)) = (self.reg(a)?, self.reg(b)?) {
            check_value_size(x.len() + y.len())?;
            let joined = VMObject::String(format!("{x}{y}"));
            return self.set_reg(dst, joined);
        }
        self.binary(a, b, dst, |x, y| Ok(x + y))
    }

    fn op_sub(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.binary(a, b, dst, |x, y| Ok(x - y))
    }

    fn op_mul(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.binary(a, b, dst, |x, y| {
            // The product has at least `bits(x) + bits(y) - 1` bits.
            if x.bits() + y.bits() > MAX_NUMBER_BITS + 1 {
                return Err(number_too_large());
            }
            Ok(x * y)
        })
    }

    fn op_div(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.binary(a, b, dst, |x, y| {
            if y.is_zero() {
                return Err(VMError::DivisionByZero);
            }
            Ok(x / y)
        })
    }

    fn op_mod(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.binary(a, b, dst, |x, y| {
            if y.is_zero() {
                return Err(VMError::DivisionByZero);
            }
            Ok(x % y)
        })
    }

    fn op_shl(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.binary(a, b, dst, |x, y| {
            let bits = shift_amount(&y)?;
            if x.bits() + bits > MAX_NUMBER_BITS {
                return Err(VMError::InvalidValue(format!("shift result exceeds {MAX_NUMBER_BITS} bits")));
            }
            Ok(x << bits)
        })
    }

    fn op_shr(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.binary(a, b, dst, |x, y| Ok(x >> shift_amount(&y)?))
    }

    fn op_min(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.binary(a, b, dst, |x, y| Ok(x.min(y)))
    }

    fn op_max(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.binary(a, b, dst, |x, y| Ok(x.max(y)))
    }

    fn op_pow(&mut self, a: u8, b: u8, dst: u8) -> Result<(), VMError> {
        self.binary(a, b, dst, |x, y| {
            let exponent = y
                .to_u32()
                .ok_or_else(|| VMError::InvalidValue(format!("invalid exponent {y}")))?;
            if x.is_zero() || x.abs().is_one() {
                return Ok(x.pow(exponent));
            }
            if x.bits().saturating_mul(exponent as u64) > MAX_NUMBER_BITS {
                return Err(VMError::InvalidValue(format!("power result exceeds {MAX_NUMBER_BITS} bits")));
            }
            Ok(x.pow(exponent))
        })
    }

    fn op_ctx(&mut self, host: &mut dyn Host, src: u8, dst: u8) -> Result<ExecutionState, VMError> {
        let name = self.reg(src)?.as_string()?;
        if self.resolve_context(host, &name).is_none() {
            return Err(VMError::UnknownContext(name));
        }
        self.set_reg(dst, VMObject::Object(InteropValue::Context(name)))?;
        Ok(ExecutionState::Running)
    }

    fn op_switch(&mut self, host: &mut dyn Host, src: u8) -> Result<ExecutionState, VMError> {
        let name = match self.reg(src)? {
            VMObject::Object(InteropValue::Context(name)) => name.clone(),
            other => other.as_string()?,
        };
        let context = self.find_context(&name).cloned();
        match self.switch_context(host, context, 0)? {
            ExecutionState::Halt => Ok(ExecutionState::Running),
            other => Ok(other),
        }
    }

    fn op_put(&mut self, src: u8, dst: u8, key: u8) -> Result<(), VMError> {
        let key = self.reg(key)?.as_string()?;
        let value = self.reg(src)?.clone();
        if value.depth() >= MAX_STRUCT_DEPTH {
            return Err(VMError::InvalidValue(format!("struct nesting exceeds {MAX_STRUCT_DEPTH} levels")));
        }
        let frame = self.frame_mut()?;
        let mut fields = match frame.take(dst)? {
            VMObject::Struct(fields) => fields,
            VMObject::None => BTreeMap::new(),
            other => {
                let from = other.type_name();
                frame.set(dst, other)?;
                return Err(VMError::InvalidCast { from, to: "Struct" });
            }
        };
        fields.insert(key, value);
        frame.set(dst, VMObject::Struct(fields))
    }

    fn op_get(&mut self, src: u8, dst: u8, key: u8) -> Result<(), VMError> {
        let key = self.reg(key)?.as_string()?;
        let value = self
            .reg(src)?
            .as_struct()?
            .get(&key)
            .cloned()
            .unwrap_or_default();
        self.set_reg(dst, value)
    }

    fn op_clear(&mut self, dst: u8) -> Result<(), VMError> {
        self.set_reg(dst, VMObject::None)
    }
}

fn number_too_large() -> VMError {
    VMError::InvalidValue(format!("arithmetic result exceeds {MAX_NUMBER_BITS} bits"))
}

fn bounded_number(value: BigInt) -> Result<BigInt, VMError> {
    if value.bits() > MAX_NUMBER_BITS {
        return Err(number_too_large());
    }
    Ok(value)
}

fn check_value_size(len: usize) -> Result<(), VMError> {
    if len > MAX_VALUE_SIZE {
        return Err(VMError::InvalidValue(format!("value of {len} bytes exceeds {MAX_VALUE_SIZE}")));
    }
    Ok(())
}

fn shift_amount(y: &BigInt) -> Result<u64, VMError> {
    y.to_u64()
        .filter(|bits| *bits <= MAX_NUMBER_BITS)
        .ok_or_else(|| VMError::InvalidValue(format!("invalid shift {y}")))
}
