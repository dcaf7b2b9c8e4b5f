//! The stack-machine interpreter: frames, execution contexts, and the
//! instruction dispatch loop.
//!
//! Split by instruction family next to a slim `mod.rs`: this file owns
//! `Frame`, `ExecutionContext`, and the run loop; each instruction family
//! gets its own sibling module as an `impl<'m> ExecutionContext<'m>` block.

mod arithmetic;
mod call;
mod collections;
mod compare;
mod error;

pub use error::RuntimeState;

use std::fmt::Write as _;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::custom::CustomHandle;
use crate::module::{FunctionDefinition, GlobalInstance, Instruction, Module, Opcode, INVALID_INDEX};
use crate::value::Value;

/// A native function bound to a `native_bindings` slot.
///
/// Takes the full execution context by reference so it can manipulate the
/// current frame's stack and the globals directly, exactly as the component
/// design requires. `Rc` rather than `Box` so the same binding can be shared
/// across multiple `Module::bind_native_by_signature` matches.
pub type NativeFunction = Rc<dyn for<'m> Fn(&mut ExecutionContext<'m>) -> RuntimeState>;

/// Per-call record: the callee's definition, its locals, its own operand
/// stack, and an instruction pointer.
#[derive(Debug)]
pub struct Frame<'m> {
    pub function: &'m FunctionDefinition,
    pub is_native: bool,
    pub locals: Vec<Value>,
    pub stack: SmallVec<[Value; 8]>,
    pub instruction_index: usize,
}

impl<'m> Frame<'m> {
    fn new(function: &'m FunctionDefinition, is_native: bool) -> Self {
        Self {
            function,
            is_native,
            locals: vec![Value::Void; function.locals_count],
            stack: SmallVec::new(),
            instruction_index: 0,
        }
    }

    fn current_instruction(&self) -> Option<Instruction> {
        self.function.code.get(self.instruction_index).copied()
    }
}

/// The runtime "world" of one executing program: call stack, globals, and
/// custom-type data, all borrowed against an immutable `Module`.
pub struct ExecutionContext<'m> {
    pub module: &'m Module,
    pub call_stack: Vec<Frame<'m>>,
    pub globals: Vec<GlobalInstance>,
    pub custom_type_data: IndexMap<u64, CustomHandle>,
    /// Operand stack for values pushed by the host before the first call and
    /// for return values once the call stack empties.
    pub root_stack: Vec<Value>,
}

impl<'m> ExecutionContext<'m> {
    /// Builds a fresh context: clones every global's initial value into a live
    /// instance, and instantiates each registered custom type's global data via
    /// its factory.
    #[must_use]
    pub fn new(module: &'m Module) -> Self {
        let globals = module.globals.iter().map(GlobalInstance::from).collect();
        let custom_type_data =
            module.custom_types.iter().map(|(&id, ty)| (id, ty.instantiate())).collect();
        Self { module, call_stack: Vec::new(), globals, custom_type_data, root_stack: Vec::new() }
    }

    pub fn push(&mut self, value: Value) {
        self.root_stack.push(value);
    }

    #[must_use]
    pub fn current_frame(&self) -> Option<&Frame<'m>> {
        self.call_stack.last()
    }

    #[must_use]
    pub fn current_frame_mut(&mut self) -> Option<&mut Frame<'m>> {
        self.call_stack.last_mut()
    }

    /// The frame that placed the call leading to the current (topmost) frame,
    /// if any.
    #[must_use]
    pub fn calling_frame(&self) -> Option<&Frame<'m>> {
        if self.call_stack.len() <= 1 {
            None
        } else {
            self.call_stack.get(self.call_stack.len() - 2)
        }
    }

    /// Runs `def` to completion without it being registered in
    /// `module.functions`. Used by the parser's compile-time global
    /// evaluator, which builds one throwaway function per `global` statement
    /// and never adds it to the module it is building.
    pub fn call_definition(&mut self, def: &'m FunctionDefinition) -> RuntimeState {
        self.call_stack.push(Frame::new(def, false));
        self.run()
    }

    /// Sets up the root frame for `name` and runs it to completion.
    pub fn call_function_by_name(&mut self, name: &str) -> RuntimeState {
        let idx = self.module.find_function(name);
        self.call_function(idx)
    }

    /// Sets up the root frame for function `idx` and runs it to completion.
    pub fn call_function(&mut self, idx: usize) -> RuntimeState {
        if idx == INVALID_INDEX || idx >= self.module.functions.len() {
            return RuntimeState::FunctionNotFound;
        }
        if let Err(state) = self.enter_function(idx) {
            return state;
        }
        self.run()
    }

    /// Pushes a new frame for function `idx`, moving the top `arity` values
    /// off the appropriate caller stack into the new frame's locals.
    fn enter_function(&mut self, idx: usize) -> Result<(), RuntimeState> {
        let def = &self.module.functions[idx];
        let arity = def.arity;
        let mut frame = Frame::new(def, false);
        if let Some(caller) = self.call_stack.last_mut() {
            if caller.stack.len() < arity {
                return Err(RuntimeState::StackUnderflow);
            }
            let start = caller.stack.len() - arity;
            for (slot, value) in frame.locals[..arity].iter_mut().zip(caller.stack.drain(start..)) {
                *slot = value;
            }
        } else {
            if self.root_stack.len() < arity {
                return Err(RuntimeState::StackUnderflow);
            }
            let start = self.root_stack.len() - arity;
            for (slot, value) in frame.locals[..arity].iter_mut().zip(self.root_stack.drain(start..)) {
                *slot = value;
            }
        }
        self.call_stack.push(frame);
        Ok(())
    }

    /// Drives the interpreter until the call stack empties or an instruction
    /// faults. On fault, the faulted frame is left on the call stack.
    pub fn run(&mut self) -> RuntimeState {
        loop {
            let Some(frame) = self.call_stack.last() else { return RuntimeState::Ok };
            let Some(instruction) = frame.current_instruction() else {
                match self.return_from_top_frame() {
                    Ok(()) => continue,
                    Err(state) => return state,
                }
            };
            if let Err(state) = self.dispatch(instruction) {
                return state;
            }
        }
    }

    /// Advances exactly one instruction (or performs one frame return), for
    /// callers such as a debugger driving the loop step by step.
    pub fn step(&mut self) -> RuntimeState {
        let Some(frame) = self.call_stack.last() else { return RuntimeState::Ok };
        let Some(instruction) = frame.current_instruction() else {
            return match self.return_from_top_frame() {
                Ok(()) => RuntimeState::Ok,
                Err(state) => state,
            };
        };
        match self.dispatch(instruction) {
            Ok(()) => RuntimeState::Ok,
            Err(state) => state,
        }
    }

    fn dispatch(&mut self, instruction: Instruction) -> Result<(), RuntimeState> {
        // Every handler is responsible for advancing `instruction_index` itself
        // (jumps need a different advance than everything else); default to a
        // single-instruction advance before dispatch-specific logic so handlers
        // that don't touch it still move forward.
        if let Some(frame) = self.current_frame_mut() {
            frame.instruction_index += 1;
        }
        match instruction.opcode {
            Opcode::PushInt => self.push_to_current(Value::Integer(instruction.arg0)),
            Opcode::PushDbl => self.push_to_current(Value::Double(f64::from_bits(instruction.arg0 as u64))),
            Opcode::PushConst => self.exec_push_const(instruction.arg0),
            Opcode::PushLocal => self.exec_push_local(instruction.arg0),
            Opcode::MoveLocal => self.exec_move_local(instruction.arg0),
            Opcode::PopIntoLocal => self.exec_pop_into_local(instruction.arg0),
            Opcode::CopyIntoLocal => self.exec_copy_into_local(instruction.arg0),
            Opcode::PushGlobal => self.exec_push_global(instruction.arg0),
            Opcode::MoveGlobal => self.exec_move_global(instruction.arg0),
            Opcode::PopIntoGlobal => self.exec_pop_into_global(instruction.arg0),
            Opcode::CopyIntoGlobal => self.exec_copy_into_global(instruction.arg0),
            Opcode::PushEmptyList => self.push_to_current(Value::List(crate::list::ValueList::new())),
            Opcode::PushFunctionReference => self.push_to_current(Value::FunctionReference(instruction.arg0)),
            Opcode::PushNativeFunctionReference => {
                self.push_to_current(Value::NativeFunctionReference(instruction.arg0))
            }
            Opcode::Call => self.exec_call(instruction.arg0),
            Opcode::CallNative => self.exec_call_native(instruction.arg0),
            Opcode::ICall => self.exec_icall(),
            Opcode::Return => self.exec_return(),
            Opcode::DynSum | Opcode::DynSub | Opcode::DynMul | Opcode::DynDiv => self.exec_dyn_arith(instruction.opcode),
            Opcode::Mod | Opcode::BitAnd | Opcode::BitOr | Opcode::BitXor | Opcode::BitShiftLeft | Opcode::BitShiftRight => {
                self.exec_int_binop(instruction.opcode)
            }
            Opcode::BitNot => self.exec_bit_not(),
            Opcode::Floor | Opcode::Ceil => self.exec_round(instruction.opcode),
            Opcode::Compare => self.exec_compare(),
            Opcode::Jump
            | Opcode::JumpIfZero
            | Opcode::JumpIfNotZero
            | Opcode::JumpIfGt
            | Opcode::JumpIfGe
            | Opcode::JumpIfLt
            | Opcode::JumpIfLe => self.exec_jump(instruction.opcode, instruction.arg0),
            Opcode::Length => self.exec_length(),
            Opcode::IsEmpty => self.exec_is_empty(),
            Opcode::Prepend => self.exec_prepend(),
            Opcode::Append => self.exec_append(),
            Opcode::Concat => self.exec_concat(),
            Opcode::Head => self.exec_head(),
            Opcode::Tail => self.exec_tail(),
            Opcode::Index => self.exec_index(),
            Opcode::Prefix => self.exec_prefix(),
            Opcode::Suffix => self.exec_suffix(),
            Opcode::Substr => self.exec_substr(),
        }
    }

    /// Pushes onto the current frame's stack, or the root stack if there is no
    /// current frame (the parser's synthetic compile-time-eval function runs
    /// through the same `run()` loop and always has one, but native code run
    /// before any frame exists does not).
    fn push_to_current(&mut self, value: Value) -> Result<(), RuntimeState> {
        match self.current_frame_mut() {
            Some(frame) => frame.stack.push(value),
            None => self.root_stack.push(value),
        }
        Ok(())
    }

    fn pop_from_current(&mut self) -> Result<Value, RuntimeState> {
        match self.current_frame_mut() {
            Some(frame) => frame.stack.pop().ok_or(RuntimeState::StackUnderflow),
            None => self.root_stack.pop().ok_or(RuntimeState::StackUnderflow),
        }
    }

    fn peek_current(&self) -> Result<&Value, RuntimeState> {
        match self.current_frame() {
            Some(frame) => frame.stack.last().ok_or(RuntimeState::StackUnderflow),
            None => self.root_stack.last().ok_or(RuntimeState::StackUnderflow),
        }
    }

    /// Pops up to `frame.function.returns` values from the topmost frame and
    /// pushes them onto the caller's stack (or `root_stack` for the outermost
    /// call), then pops the frame. Called both when `instruction_index` runs
    /// past the end of `code` and by an explicit `Return`.
    fn return_from_top_frame(&mut self) -> Result<(), RuntimeState> {
        let Some(mut frame) = self.call_stack.pop() else {
            return Err(RuntimeState::CallStackUnderflow);
        };
        let returns = frame.function.returns;
        if frame.stack.len() < returns {
            return Err(RuntimeState::StackUnderflow);
        }
        let start = frame.stack.len() - returns;
        match self.call_stack.last_mut() {
            Some(caller) => caller.stack.extend(frame.stack.drain(start..)),
            None => self.root_stack.extend(frame.stack.drain(start..)),
        }
        Ok(())
    }

    fn exec_return(&mut self) -> Result<(), RuntimeState> {
        if let Some(frame) = self.current_frame_mut() {
            frame.instruction_index = frame.function.code.len();
        }
        Ok(())
    }

    /// Produces a formatted, multi-line stack trace, most-recent call first.
    ///
    /// Each line is `at (name) '<path>:<line>:<col>'` when the function has a
    /// debug symbol, or a degraded `at (name)` form otherwise.
    #[must_use]
    pub fn get_stack_trace(&self, max_depth: usize) -> String {
        let mut out = String::new();
        for frame in self.call_stack.iter().rev().take(max_depth) {
            let line = match &frame.function.debug_symbol {
                Some(symbol) => {
                    let path = self
                        .module
                        .source_debug_symbols
                        .get(symbol.source_idx)
                        .map_or("<unknown>", |source| source.path.as_str());
                    format!(
                        "at ({}) '{}:{}:{}'",
                        frame.function.name,
                        path,
                        symbol.token.source_pos.line + 1,
                        symbol.token.source_pos.char + 1
                    )
                }
                None => format!("at ({})", frame.function.name),
            };
            let _ = writeln!(out, "{line}");
        }
        out
    }
}

/// Small module-building helpers shared by this file's tests and the sibling
/// dispatch modules' tests.
#[cfg(test)]
pub(super) mod tests_support {
    use crate::module::{FunctionDefinition, Instruction, Module};

    /// A module with one zero-arity, single-return `main` running `code`.
    #[must_use]
    pub fn single_instruction_module(code: &[Instruction]) -> Module {
        let mut module = Module::new();
        let mut main = FunctionDefinition::new("main", 0, 1, 0, 0);
        main.code = code.to_vec();
        module.append_function(main);
        module
    }

    #[must_use]
    pub fn empty_module() -> Module {
        Module::new()
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::*;
    use super::*;

    #[test]
    fn runs_a_function_to_completion() {
        let module = single_instruction_module(&[
            Instruction::new(Opcode::PushInt, 1),
            Instruction::new(Opcode::PushInt, 2),
            Instruction::bare(Opcode::DynSum),
        ]);
        let mut ctx = ExecutionContext::new(&module);
        let state = ctx.call_function_by_name("main");
        assert_eq!(state, RuntimeState::Ok);
        assert_eq!(ctx.root_stack, vec![Value::Integer(3)]);
    }

    #[test]
    fn unknown_function_is_not_found() {
        let module = single_instruction_module(&[]);
        let mut ctx = ExecutionContext::new(&module);
        assert_eq!(ctx.call_function_by_name("missing"), RuntimeState::FunctionNotFound);
    }
}
