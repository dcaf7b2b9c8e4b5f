//! `if <condition> : <body> [else if ... : ...] [else : ...] end`
//!
//! A condition compiles to a comparison opcode chosen so that branching on
//! its *negation* reaches `else`/`end`. `x = 0` compiles to the inverted
//! `JumpIfNotZero` test, which jumps past the body when `x` is in fact not
//! zero. A bare single-lvalue condition with no comparator is
//! "self-contained": it's the only shape allowed to be followed by
//! `else if`, since `x = y` already consumed both operands off the stack
//! while a bare `x` only consumed one and reads the same as a fresh
//! condition would.
//!
//! When an `else` is present, the then-body ends with an unconditional
//! `Jump` past it, so the inverted condition jump only has to reach the
//! start of the else-body rather than all the way past it.

use crate::module::{FunctionDefinition, Instruction, Module, Opcode};
use crate::token::TokenType;

use super::error::{ParseErrorKind, ParseOutcome};
use super::function::push_code_symbol;
use super::locals::LocalsBindings;
use super::Parser;

fn jump_for_comparator(token_type: TokenType) -> Option<Opcode> {
    match token_type {
        TokenType::Equals => Some(Opcode::JumpIfNotZero),
        TokenType::NotEquals => Some(Opcode::JumpIfZero),
        TokenType::Less => Some(Opcode::JumpIfGe),
        TokenType::LessOrEqual => Some(Opcode::JumpIfGt),
        TokenType::More => Some(Opcode::JumpIfLe),
        TokenType::MoreOrEqual => Some(Opcode::JumpIfLt),
        _ => None,
    }
}

impl Parser {
    pub(super) fn parse_if_statement(
        &mut self,
        module: &mut Module,
        func: &mut FunctionDefinition,
        scoped: &mut LocalsBindings,
        debug_symbols: bool,
    ) -> ParseOutcome<()> {
        let (jump_opcode, is_self_contained) = self.parse_if_condition(module, func, scoped, debug_symbols)?;

        if self.current.token_type != TokenType::Colon {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected ':' to start if body."));
        }
        let jump_site = func.code.len();
        func.code.push(Instruction::new(jump_opcode, 0));

        let ends_on_else = self.parse_if_body(module, func, scoped, debug_symbols)?;

        if !ends_on_else {
            func.code[jump_site].arg0 = (func.code.len() - jump_site) as i64;
            return Ok(());
        }

        let skip_else_site = func.code.len();
        func.code.push(Instruction::new(Opcode::Jump, 0));
        func.code[jump_site].arg0 = (func.code.len() - jump_site) as i64;

        if self.current.token_type == TokenType::KwIf {
            if !is_self_contained {
                return Err(self.err_current(ParseErrorKind::UnexpectedToken, "'else if' can only follow a self-contained condition."));
            }
            push_code_symbol(debug_symbols, func, &self.current);
            self.parse_if_statement(module, func, scoped, debug_symbols)?;
        } else {
            self.parse_if_body(module, func, scoped, debug_symbols)?;
        }
        func.code[skip_else_site].arg0 = (func.code.len() - skip_else_site) as i64;
        Ok(())
    }

    /// Parses the condition after `if`. Returns the *inverted* jump opcode
    /// and whether the condition was a bare lvalue with no comparator.
    fn parse_if_condition(
        &mut self,
        module: &mut Module,
        func: &mut FunctionDefinition,
        scoped: &mut LocalsBindings,
        debug_symbols: bool,
    ) -> ParseOutcome<(Opcode, bool)> {
        self.advance();
        if self.current.token_type == TokenType::Colon {
            return Ok((Opcode::JumpIfNotZero, false));
        }

        let lhs = self.current.clone();
        self.push_lvalue(module, func, scoped, &lhs, debug_symbols)?;
        self.advance();

        if let Some(opcode) = jump_for_comparator(self.current.token_type) {
            push_code_symbol(debug_symbols, func, &self.current);
            self.advance();
            let rhs = self.current.clone();
            self.push_lvalue(module, func, scoped, &rhs, debug_symbols)?;
            self.advance();
            func.code.push(Instruction::bare(Opcode::Compare));
            return Ok((opcode, false));
        }

        Ok((Opcode::JumpIfNotZero, true))
    }

    /// Parses body statements, reusing the same per-statement dispatch a
    /// function's top-level body uses, until hitting `else` or `end` (both
    /// consumed). Returns `true` if it stopped on `else`.
    fn parse_if_body(
        &mut self,
        module: &mut Module,
        func: &mut FunctionDefinition,
        scoped: &mut LocalsBindings,
        debug_symbols: bool,
    ) -> ParseOutcome<bool> {
        loop {
            self.advance();
            match self.current.token_type {
                TokenType::KwEnd => return Ok(false),
                TokenType::KwElse => return Ok(true),
                _ => self.parse_body_token(module, func, scoped, debug_symbols)?,
            }
        }
    }
}
