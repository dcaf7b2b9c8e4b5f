//! Arithmetic and bitwise instruction handlers.
//!
//! Integer overflow wraps rather than panicking or faulting, matching the
//! reference interpreter's observable behavior; there is no dedicated
//! overflow `RuntimeState` variant to raise instead.

use super::{ExecutionContext, RuntimeState};
use crate::module::Opcode;
use crate::value::Value;

impl<'m> ExecutionContext<'m> {
    pub(super) fn exec_dyn_arith(&mut self, opcode: Opcode) -> Result<(), RuntimeState> {
        let b = self.pop_from_current()?;
        let a = self.pop_from_current()?;
        let result = match (a, b) {
            (Value::Integer(a), Value::Integer(b)) => match opcode {
                Opcode::DynSum => Value::Integer(a.wrapping_add(b)),
                Opcode::DynSub => Value::Integer(a.wrapping_sub(b)),
                Opcode::DynMul => Value::Integer(a.wrapping_mul(b)),
                Opcode::DynDiv => {
                    if b == 0 {
                        return Err(RuntimeState::Error);
                    }
                    Value::Integer(a.wrapping_div(b))
                }
                _ => unreachable!("exec_dyn_arith called with a non-arithmetic opcode"),
            },
            (a, b) => {
                let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else { return Err(RuntimeState::TypeError) };
                match opcode {
                    Opcode::DynSum => Value::Double(a + b),
                    Opcode::DynSub => Value::Double(a - b),
                    Opcode::DynMul => Value::Double(a * b),
                    Opcode::DynDiv => Value::Double(a / b),
                    _ => unreachable!("exec_dyn_arith called with a non-arithmetic opcode"),
                }
            }
        };
        self.push_to_current(result)
    }

    pub(super) fn exec_int_binop(&mut self, opcode: Opcode) -> Result<(), RuntimeState> {
        let b = self.pop_from_current()?;
        let a = self.pop_from_current()?;
        let (Value::Integer(a), Value::Integer(b)) = (a, b) else { return Err(RuntimeState::TypeError) };
        let result = match opcode {
            Opcode::Mod => {
                if b == 0 {
                    return Err(RuntimeState::Error);
                }
                a.wrapping_rem(b)
            }
            Opcode::BitAnd => a & b,
            Opcode::BitOr => a | b,
            Opcode::BitXor => a ^ b,
            Opcode::BitShiftLeft => a.wrapping_shl(b as u32),
            Opcode::BitShiftRight => a.wrapping_shr(b as u32),
            _ => unreachable!("exec_int_binop called with a non-bitwise opcode"),
        };
        self.push_to_current(Value::Integer(result))
    }

    pub(super) fn exec_bit_not(&mut self) -> Result<(), RuntimeState> {
        let Value::Integer(a) = self.pop_from_current()? else { return Err(RuntimeState::TypeError) };
        self.push_to_current(Value::Integer(!a))
    }

    pub(super) fn exec_round(&mut self, opcode: Opcode) -> Result<(), RuntimeState> {
        let value = self.pop_from_current()?;
        let result = match value {
            Value::Integer(i) => Value::Integer(i),
            Value::Double(d) => Value::Integer(match opcode {
                Opcode::Floor => d.floor() as i64,
                Opcode::Ceil => d.ceil() as i64,
                _ => unreachable!("exec_round called with a non-rounding opcode"),
            }),
            _ => return Err(RuntimeState::TypeError),
        };
        self.push_to_current(result)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::*;
    use super::*;
    use crate::module::Instruction;

    #[test]
    fn dyn_sum_wraps_on_overflow() {
        let module = single_instruction_module(&[Instruction::new(Opcode::PushInt, i64::MAX), Instruction::new(Opcode::PushInt, 1), Instruction::bare(Opcode::DynSum)]);
        let mut ctx = ExecutionContext::new(&module);
        assert_eq!(ctx.call_function_by_name("main"), RuntimeState::Ok);
        assert_eq!(ctx.root_stack, vec![Value::Integer(i64::MIN)]);
    }

    #[test]
    fn dyn_div_by_zero_is_an_error() {
        let module = single_instruction_module(&[Instruction::new(Opcode::PushInt, 1), Instruction::new(Opcode::PushInt, 0), Instruction::bare(Opcode::DynDiv)]);
        let mut ctx = ExecutionContext::new(&module);
        assert_eq!(ctx.call_function_by_name("main"), RuntimeState::Error);
    }

    #[test]
    fn dyn_sum_widens_to_double_when_mixed() {
        let module = single_instruction_module(&[
            Instruction::new(Opcode::PushInt, 1),
            Instruction::new(Opcode::PushDbl, 0.5f64.to_bits() as i64),
            Instruction::bare(Opcode::DynSum),
        ]);
        let mut ctx = ExecutionContext::new(&module);
        assert_eq!(ctx.call_function_by_name("main"), RuntimeState::Ok);
        assert_eq!(ctx.root_stack, vec![Value::Double(1.5)]);
    }
}
