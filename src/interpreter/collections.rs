//! `List`/`String` sequence instruction handlers: length, emptiness,
//! prepend/append/concat, head/tail, and index/prefix/suffix/substr slicing.
//!
//! Indexing is always by byte for `String`, never by Unicode codepoint,
//! matching the lexer/parser's own byte-offset bookkeeping rather than
//! introducing a second, codepoint-based notion of position at runtime.

use super::{ExecutionContext, RuntimeState};
use crate::value::Value;

fn clamp_to_byte(i: i64) -> u8 {
    i.clamp(0, i64::from(u8::MAX)) as u8
}

impl<'m> ExecutionContext<'m> {
    /// `Length`/`IsEmpty` read the top of stack without consuming it, then push
    /// their Int result on top; the sequence underneath is left untouched.
    pub(super) fn exec_length(&mut self) -> Result<(), RuntimeState> {
        let len = match self.peek_current()? {
            Value::List(list) => list.len(),
            Value::String(bytes) => bytes.len(),
            _ => return Err(RuntimeState::TypeError),
        };
        self.push_to_current(Value::Integer(len as i64))
    }

    pub(super) fn exec_is_empty(&mut self) -> Result<(), RuntimeState> {
        let empty = match self.peek_current()? {
            Value::List(list) => list.is_empty(),
            Value::String(bytes) => bytes.is_empty(),
            _ => return Err(RuntimeState::TypeError),
        };
        self.push_to_current(Value::Integer(i64::from(empty)))
    }

    /// `Prepend`: pops `seq` then `value`, pushes `value` in front of `seq`.
    ///
    /// A `List` accepts any value. A `String` accepts another `String` (bytes
    /// concatenated) or an `Integer` clamped to a single byte.
    pub(super) fn exec_prepend(&mut self) -> Result<(), RuntimeState> {
        let seq = self.pop_from_current()?;
        let value = self.pop_from_current()?;
        let result = match seq {
            Value::List(mut list) => {
                list.push_front(value);
                Value::List(list)
            }
            Value::String(mut bytes) => {
                match value {
                    Value::String(mut prefix) => {
                        prefix.extend(bytes);
                        bytes = prefix;
                    }
                    Value::Integer(i) => bytes.insert(0, clamp_to_byte(i)),
                    _ => return Err(RuntimeState::TypeError),
                }
                Value::String(bytes)
            }
            _ => return Err(RuntimeState::TypeError),
        };
        self.push_to_current(result)
    }

    /// `Append`: pops `value` then `seq`, pushes `seq` with `value` on the end.
    ///
    /// Same type rules as `Prepend`.
    pub(super) fn exec_append(&mut self) -> Result<(), RuntimeState> {
        let value = self.pop_from_current()?;
        let seq = self.pop_from_current()?;
        let result = match seq {
            Value::List(mut list) => {
                list.push_back(value);
                Value::List(list)
            }
            Value::String(mut bytes) => {
                match value {
                    Value::String(suffix) => bytes.extend(suffix),
                    Value::Integer(i) => bytes.push(clamp_to_byte(i)),
                    _ => return Err(RuntimeState::TypeError),
                }
                Value::String(bytes)
            }
            _ => return Err(RuntimeState::TypeError),
        };
        self.push_to_current(result)
    }

    /// `Concat`: List + List only; the second list is left empty (matching
    /// `ValueList::concat`'s O(1) splice).
    pub(super) fn exec_concat(&mut self) -> Result<(), RuntimeState> {
        let b = self.pop_from_current()?;
        let a = self.pop_from_current()?;
        let (Value::List(mut a), Value::List(mut b)) = (a, b) else { return Err(RuntimeState::TypeError) };
        a.concat(&mut b);
        self.push_to_current(Value::List(a))
    }

    /// `Head`: pops the front element off a `List`.
    pub(super) fn exec_head(&mut self) -> Result<(), RuntimeState> {
        let Value::List(mut list) = self.pop_from_current()? else { return Err(RuntimeState::TypeError) };
        let value = list.pop_front().ok_or(RuntimeState::ListIndexOutOfBounds)?;
        self.push_to_current(value)
    }

    /// `Tail`: drops the front element off a `List`, pushing the remainder.
    pub(super) fn exec_tail(&mut self) -> Result<(), RuntimeState> {
        let Value::List(mut list) = self.pop_from_current()? else { return Err(RuntimeState::TypeError) };
        if list.pop_front().is_none() {
            return Err(RuntimeState::ListIndexOutOfBounds);
        }
        self.push_to_current(Value::List(list))
    }

    /// `Index`: pops `i` then `seq`, pushes `seq[i]` (a `List` element, or a
    /// `String` byte widened to `Integer`).
    pub(super) fn exec_index(&mut self) -> Result<(), RuntimeState> {
        let Value::Integer(i) = self.pop_from_current()? else { return Err(RuntimeState::TypeError) };
        let seq = self.pop_from_current()?;
        let result = match seq {
            Value::List(list) => {
                usize::try_from(i).ok().and_then(|i| list.iter().nth(i)).cloned().ok_or(RuntimeState::ListIndexOutOfBounds)?
            }
            Value::String(bytes) => {
                let byte = usize::try_from(i).ok().and_then(|i| bytes.get(i)).ok_or(RuntimeState::StringIndexOutOfBounds)?;
                Value::Integer(i64::from(*byte))
            }
            _ => return Err(RuntimeState::TypeError),
        };
        self.push_to_current(result)
    }

    /// `Prefix`: pops `n` then `seq` (a `String`), splits off the first `n`
    /// bytes, and pushes `remainder` then `removed`.
    pub(super) fn exec_prefix(&mut self) -> Result<(), RuntimeState> {
        let (bytes, n) = self.pop_string_and_count()?;
        if n > bytes.len() {
            return Err(RuntimeState::StringIndexOutOfBounds);
        }
        let (removed, remainder) = bytes.split_at(n);
        let remainder = remainder.to_vec();
        let removed = removed.to_vec();
        self.push_to_current(Value::String(remainder))?;
        self.push_to_current(Value::String(removed))
    }

    /// `Suffix`: pops `n` then `seq` (a `String`), splits off the last `n`
    /// bytes, and pushes `remainder` then `removed`.
    pub(super) fn exec_suffix(&mut self) -> Result<(), RuntimeState> {
        let (bytes, n) = self.pop_string_and_count()?;
        if n > bytes.len() {
            return Err(RuntimeState::StringIndexOutOfBounds);
        }
        let (remainder, removed) = bytes.split_at(bytes.len() - n);
        let remainder = remainder.to_vec();
        let removed = removed.to_vec();
        self.push_to_current(Value::String(remainder))?;
        self.push_to_current(Value::String(removed))
    }

    fn pop_string_and_count(&mut self) -> Result<(Vec<u8>, usize), RuntimeState> {
        let Value::Integer(n) = self.pop_from_current()? else { return Err(RuntimeState::TypeError) };
        let n = usize::try_from(n).map_err(|_| RuntimeState::StringIndexOutOfBounds)?;
        let Value::String(bytes) = self.pop_from_current()? else { return Err(RuntimeState::TypeError) };
        Ok((bytes, n))
    }

    /// `Substr`: pops `end` then `start` then `seq` (a `String`), pushes
    /// `seq[start..end]`.
    pub(super) fn exec_substr(&mut self) -> Result<(), RuntimeState> {
        let Value::Integer(end) = self.pop_from_current()? else { return Err(RuntimeState::TypeError) };
        let Value::Integer(start) = self.pop_from_current()? else { return Err(RuntimeState::TypeError) };
        let (Ok(start), Ok(end)) = (usize::try_from(start), usize::try_from(end)) else {
            return Err(RuntimeState::StringIndexOutOfBounds);
        };
        let Value::String(bytes) = self.pop_from_current()? else { return Err(RuntimeState::TypeError) };
        if start > end || end > bytes.len() {
            return Err(RuntimeState::StringIndexOutOfBounds);
        }
        self.push_to_current(Value::String(bytes[start..end].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::*;
    use super::*;
    use crate::module::{Instruction, Opcode};

    fn make_list_constant(values: &[i64]) -> Value {
        Value::List(values.iter().map(|&v| Value::Integer(v)).collect())
    }

    #[test]
    fn append_then_length_leaves_original_on_stack() {
        let mut module = empty_module();
        let list_const = module.append_constant(make_list_constant(&[1, 2]));
        let mut main = crate::module::FunctionDefinition::new("main", 0, 2, 0, 0);
        main.code = vec![
            Instruction::new(Opcode::PushConst, list_const as i64),
            Instruction::new(Opcode::PushInt, 3),
            Instruction::bare(Opcode::Append),
            Instruction::bare(Opcode::Length),
        ];
        module.append_function(main);
        let mut ctx = ExecutionContext::new(&module);
        assert_eq!(ctx.call_function_by_name("main"), RuntimeState::Ok);
        assert_eq!(ctx.root_stack.last(), Some(&Value::Integer(3)));
        assert_eq!(ctx.root_stack.len(), 2);
    }

    #[test]
    fn head_on_empty_list_is_out_of_bounds() {
        let module = single_instruction_module(&[Instruction::bare(Opcode::PushEmptyList), Instruction::bare(Opcode::Head)]);
        let mut ctx = ExecutionContext::new(&module);
        assert_eq!(ctx.call_function_by_name("main"), RuntimeState::ListIndexOutOfBounds);
    }

    #[test]
    fn substr_on_string_slices_bytes() {
        let mut module = empty_module();
        let string_const = module.append_constant(Value::String(b"hello world".to_vec()));
        let mut main = crate::module::FunctionDefinition::new("main", 0, 1, 0, 0);
        main.code = vec![
            Instruction::new(Opcode::PushConst, string_const as i64),
            Instruction::new(Opcode::PushInt, 6),
            Instruction::new(Opcode::PushInt, 11),
            Instruction::bare(Opcode::Substr),
        ];
        module.append_function(main);
        let mut ctx = ExecutionContext::new(&module);
        assert_eq!(ctx.call_function_by_name("main"), RuntimeState::Ok);
        assert_eq!(ctx.root_stack, vec![Value::String(b"world".to_vec())]);
    }

    #[test]
    fn prefix_splits_remainder_and_removed() {
        let mut module = empty_module();
        let string_const = module.append_constant(Value::String(b"hello".to_vec()));
        let mut main = crate::module::FunctionDefinition::new("main", 0, 2, 0, 0);
        main.code = vec![
            Instruction::new(Opcode::PushConst, string_const as i64),
            Instruction::new(Opcode::PushInt, 2),
            Instruction::bare(Opcode::Prefix),
        ];
        module.append_function(main);
        let mut ctx = ExecutionContext::new(&module);
        assert_eq!(ctx.call_function_by_name("main"), RuntimeState::Ok);
        assert_eq!(ctx.root_stack, vec![Value::String(b"llo".to_vec()), Value::String(b"he".to_vec())]);
    }
}
