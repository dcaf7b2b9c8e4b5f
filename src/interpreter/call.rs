//! Call/return/jump/local/global instruction handlers.

use super::{ExecutionContext, Frame, RuntimeState};
use crate::module::INVALID_INDEX;
use crate::value::Value;

impl<'m> ExecutionContext<'m> {
    pub(super) fn exec_push_const(&mut self, idx: i64) -> Result<(), RuntimeState> {
        let idx = idx as usize;
        let value = self.module.constants.get(idx).ok_or(RuntimeState::OutOfBoundsConstantIndex)?.clone();
        self.push_to_current(value)
    }

    pub(super) fn exec_push_local(&mut self, idx: i64) -> Result<(), RuntimeState> {
        let idx = idx as usize;
        let frame = self.current_frame().ok_or(RuntimeState::CallStackUnderflow)?;
        let value = frame.locals.get(idx).ok_or(RuntimeState::OutOfBoundsLocalIndex)?.clone();
        self.push_to_current(value)
    }

    pub(super) fn exec_move_local(&mut self, idx: i64) -> Result<(), RuntimeState> {
        let idx = idx as usize;
        let frame = self.current_frame_mut().ok_or(RuntimeState::CallStackUnderflow)?;
        if idx >= frame.locals.len() {
            return Err(RuntimeState::OutOfBoundsLocalIndex);
        }
        let value = std::mem::take(&mut frame.locals[idx]);
        self.push_to_current(value)
    }

    pub(super) fn exec_pop_into_local(&mut self, idx: i64) -> Result<(), RuntimeState> {
        let value = self.pop_from_current()?;
        let idx = idx as usize;
        let frame = self.current_frame_mut().ok_or(RuntimeState::CallStackUnderflow)?;
        if idx >= frame.locals.len() {
            return Err(RuntimeState::OutOfBoundsLocalIndex);
        }
        frame.locals[idx] = value;
        Ok(())
    }

    pub(super) fn exec_copy_into_local(&mut self, idx: i64) -> Result<(), RuntimeState> {
        let value = self.peek_current()?.clone();
        let idx = idx as usize;
        let frame = self.current_frame_mut().ok_or(RuntimeState::CallStackUnderflow)?;
        if idx >= frame.locals.len() {
            return Err(RuntimeState::OutOfBoundsLocalIndex);
        }
        frame.locals[idx] = value;
        Ok(())
    }

    pub(super) fn exec_push_global(&mut self, idx: i64) -> Result<(), RuntimeState> {
        let idx = idx as usize;
        let value = self.globals.get(idx).ok_or(RuntimeState::OutOfBoundsGlobalIndex)?.value.clone();
        self.push_to_current(value)
    }

    pub(super) fn exec_move_global(&mut self, idx: i64) -> Result<(), RuntimeState> {
        let idx = idx as usize;
        let global = self.globals.get_mut(idx).ok_or(RuntimeState::OutOfBoundsGlobalIndex)?;
        if global.is_constant {
            return Err(RuntimeState::WritingOnConstantGlobal);
        }
        let value = std::mem::take(&mut global.value);
        self.push_to_current(value)
    }

    pub(super) fn exec_pop_into_global(&mut self, idx: i64) -> Result<(), RuntimeState> {
        let value = self.pop_from_current()?;
        let idx = idx as usize;
        let global = self.globals.get_mut(idx).ok_or(RuntimeState::OutOfBoundsGlobalIndex)?;
        if global.is_constant {
            return Err(RuntimeState::WritingOnConstantGlobal);
        }
        global.value = value;
        Ok(())
    }

    pub(super) fn exec_copy_into_global(&mut self, idx: i64) -> Result<(), RuntimeState> {
        let value = self.peek_current()?.clone();
        let idx = idx as usize;
        let global = self.globals.get_mut(idx).ok_or(RuntimeState::OutOfBoundsGlobalIndex)?;
        if global.is_constant {
            return Err(RuntimeState::WritingOnConstantGlobal);
        }
        global.value = value;
        Ok(())
    }

    pub(super) fn exec_call(&mut self, idx: i64) -> Result<(), RuntimeState> {
        let idx = idx as usize;
        if idx == INVALID_INDEX || idx >= self.module.functions.len() {
            return Err(RuntimeState::OutOfBoundsFunctionIndex);
        }
        self.enter_function(idx)
    }

    pub(super) fn exec_call_native(&mut self, idx: i64) -> Result<(), RuntimeState> {
        let idx = idx as usize;
        let binding = self.module.native_bindings.get(idx).ok_or(RuntimeState::OutOfBoundsFunctionIndex)?;
        let func = self.module.native_functions.get(idx).and_then(Option::as_ref).ok_or(RuntimeState::UnboundNativeFunction)?.clone();
        let arity = binding.arity;
        let mut frame = Frame::new(binding, true);
        match self.current_frame_mut() {
            Some(caller) => {
                if caller.stack.len() < arity {
                    return Err(RuntimeState::StackUnderflow);
                }
                let start = caller.stack.len() - arity;
                for (slot, value) in frame.locals[..arity].iter_mut().zip(caller.stack.drain(start..)) {
                    *slot = value;
                }
            }
            None => {
                if self.root_stack.len() < arity {
                    return Err(RuntimeState::StackUnderflow);
                }
                let start = self.root_stack.len() - arity;
                for (slot, value) in frame.locals[..arity].iter_mut().zip(self.root_stack.drain(start..)) {
                    *slot = value;
                }
            }
        }
        self.call_stack.push(frame);
        let state = func(self);
        if !state.is_ok() {
            return Err(state);
        }
        self.return_from_top_frame()
    }

    /// Indirect call: pops a `FunctionReference`/`NativeFunctionReference` off
    /// the stack and dispatches to `Call`/`CallNative` accordingly.
    pub(super) fn exec_icall(&mut self) -> Result<(), RuntimeState> {
        match self.pop_from_current()? {
            Value::FunctionReference(idx) => self.exec_call(idx),
            Value::NativeFunctionReference(idx) => self.exec_call_native(idx),
            _ => Err(RuntimeState::TypeError),
        }
    }

    pub(super) fn exec_jump(&mut self, opcode: crate::module::Opcode, offset: i64) -> Result<(), RuntimeState> {
        use crate::module::Opcode;
        let take = match opcode {
            Opcode::Jump => true,
            Opcode::JumpIfZero | Opcode::JumpIfNotZero | Opcode::JumpIfGt | Opcode::JumpIfGe | Opcode::JumpIfLt | Opcode::JumpIfLe => {
                // `Compare` pushes an `Integer` difference for two integers and a
                // `Double` difference otherwise; sign is tested without converting
                // between the two, so an out-of-f64-precision integer difference
                // still reports its exact sign.
                let (is_zero, is_positive, is_negative) = match self.pop_from_current()? {
                    Value::Integer(cmp) => (cmp == 0, cmp > 0, cmp < 0),
                    Value::Double(cmp) => (cmp == 0.0, cmp > 0.0, cmp < 0.0),
                    _ => return Err(RuntimeState::TypeError),
                };
                match opcode {
                    Opcode::JumpIfZero => is_zero,
                    Opcode::JumpIfNotZero => !is_zero,
                    Opcode::JumpIfGt => is_positive,
                    Opcode::JumpIfGe => is_positive || is_zero,
                    Opcode::JumpIfLt => is_negative,
                    Opcode::JumpIfLe => is_negative || is_zero,
                    _ => unreachable!(),
                }
            }
            _ => unreachable!("exec_jump called with a non-jump opcode"),
        };
        if take {
            let frame = self.current_frame_mut().ok_or(RuntimeState::CallStackUnderflow)?;
            // `instruction_index` was already advanced past this jump by `dispatch`,
            // so subtracting 1 recovers the jump's own position before applying the
            // offset; the offset is relative to the jump instruction itself.
            let target = (frame.instruction_index as i64 - 1) + offset;
            if target < 0 || target as usize > frame.function.code.len() {
                return Err(RuntimeState::OutOfBoundsFunctionIndex);
            }
            frame.instruction_index = target as usize;
        }
        Ok(())
    }
}
