//! The `Compare` instruction feeding the `Jump*` conditional family.

use super::{ExecutionContext, RuntimeState};
use crate::value::Value;

impl<'m> ExecutionContext<'m> {
    /// Pops `b` then `a` and pushes their difference, `a - b`.
    ///
    /// Two `Integer`s push an `Integer` difference; any other numeric pairing
    /// (widening `Integer` to `f64` when mixed) pushes a `Double` difference.
    /// `String` compares lexicographically by byte and pushes the sign
    /// (`-1`/`0`/`1`) of that ordering, since strings have no difference.
    /// Any other pairing, or a `Double` comparison involving NaN, is a type
    /// error.
    pub(super) fn exec_compare(&mut self) -> Result<(), RuntimeState> {
        let b = self.pop_from_current()?;
        let a = self.pop_from_current()?;
        let result = match (&a, &b) {
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_sub(*b)),
            (Value::String(a), Value::String(b)) => Value::Integer(match a.cmp(b) {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
                std::cmp::Ordering::Greater => 1,
            }),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (a, b) = (a.as_f64().unwrap(), b.as_f64().unwrap());
                if a.is_nan() || b.is_nan() {
                    return Err(RuntimeState::TypeError);
                }
                Value::Double(a - b)
            }
            _ => return Err(RuntimeState::TypeError),
        };
        self.push_to_current(result)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::*;
    use super::*;
    use crate::module::{Instruction, Opcode};

    #[test]
    fn compares_integers() {
        let module = single_instruction_module(&[Instruction::new(Opcode::PushInt, 1), Instruction::new(Opcode::PushInt, 2), Instruction::bare(Opcode::Compare)]);
        let mut ctx = ExecutionContext::new(&module);
        assert_eq!(ctx.call_function_by_name("main"), RuntimeState::Ok);
        assert_eq!(ctx.root_stack, vec![Value::Integer(-1)]);
    }

    #[test]
    fn mismatched_types_are_a_type_error() {
        let module = single_instruction_module(&[Instruction::new(Opcode::PushInt, 1), Instruction::bare(Opcode::PushEmptyList), Instruction::bare(Opcode::Compare)]);
        let mut ctx = ExecutionContext::new(&module);
        assert_eq!(ctx.call_function_by_name("main"), RuntimeState::TypeError);
    }
}
