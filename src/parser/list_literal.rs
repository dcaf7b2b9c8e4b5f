//! `[ ... ]` list literals.
//!
//! A run of constant integer/double items is folded into one deduplicated
//! list constant and spliced in with a single `Concat`; anything else is
//! pushed individually and spliced in with `Append`. `[1, 2, x, 3, 4]` ends
//! up as `PushEmptyList; PushConst [1,2]; Concat; <push x>; Append; PushConst
//! [3,4]; Concat`, not five individual `Append`s.

use crate::module::{FunctionDefinition, Instruction, Module, Opcode};
use crate::token::TokenType;
use crate::value::Value;

use super::error::ParseOutcome;
use super::function::push_code_symbol;
use super::locals::LocalsBindings;
use super::Parser;

impl Parser {
    pub(super) fn push_list_literal(
        &mut self,
        module: &mut Module,
        func: &mut FunctionDefinition,
        locals: &LocalsBindings,
        debug_symbols: bool,
    ) -> ParseOutcome<()> {
        func.code.push(Instruction::bare(Opcode::PushEmptyList));
        self.advance();
        let mut run: Vec<Value> = Vec::new();

        loop {
            let starts_non_const = matches!(
                self.current.token_type,
                TokenType::PushReference | TokenType::StringLiteral | TokenType::Identifier | TokenType::OpenBracket
            );
            let is_close = self.current.token_type == TokenType::CloseBracket;

            if (starts_non_const && !run.is_empty()) || is_close {
                if run.is_empty() {
                    if is_close {
                        return Ok(());
                    }
                } else {
                    let constant = Value::List(run.drain(..).collect());
                    let idx = module.find_constant(&constant).unwrap_or_else(|| module.append_constant(constant));
                    push_code_symbol(debug_symbols, func, &self.current);
                    func.code.push(Instruction::new(Opcode::PushConst, idx as i64));
                    func.code.push(Instruction::bare(Opcode::Concat));
                    if is_close {
                        return Ok(());
                    }
                }
            }

            match self.current.token_type {
                TokenType::IntegerLiteral => run.push(Value::Integer(self.current.integer_val)),
                TokenType::DoubleLiteral => run.push(Value::Double(self.current.double_val)),
                _ => {}
            }

            match self.current.token_type {
                TokenType::PushReference | TokenType::StringLiteral | TokenType::Identifier | TokenType::OpenBracket => {
                    let item = self.current.clone();
                    self.push_lvalue(module, func, locals, &item, debug_symbols)?;
                    push_code_symbol(debug_symbols, func, &item);
                    func.code.push(Instruction::bare(Opcode::Append));
                }
                TokenType::IntegerLiteral | TokenType::DoubleLiteral => {}
                _ => return Err(self.err_current(super::ParseErrorKind::UnexpectedToken, "Expected lvalue.")),
            }

            self.advance();
            if self.current.token_type == TokenType::Comma {
                self.advance();
            } else if self.current.token_type != TokenType::CloseBracket {
                return Err(self.err_current(super::ParseErrorKind::UnexpectedToken, "Expected ',' to continue List literal or ']' to close it."));
            }
        }
    }
}
