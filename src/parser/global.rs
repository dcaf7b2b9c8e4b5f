//! `global [const] <lvalue> -> name`
//!
//! A global's initializer is compiled into a throwaway, unregistered
//! function (arity 0, one return value) and run to completion right away,
//! through [`crate::interpreter::ExecutionContext::call_definition`]. This is
//! the same mechanism a compiler would use to fold a constant expression,
//! except here the "constant expression" is run on the real interpreter
//! rather than hand-rolled.

use crate::interpreter::{ExecutionContext, RuntimeState};
use crate::module::{FunctionDefinition, GlobalDefinition, Module};
use crate::token::TokenType;

use super::error::{ParseError, ParseErrorKind, ParseOutcome};
use super::locals::LocalsBindings;
use super::Parser;

impl Parser {
    pub(super) fn parse_global_definition(&mut self, module: &mut Module, debug_symbols: bool) -> ParseOutcome<()> {
        let const_token = self.current.clone();
        self.advance();
        let is_constant = self.current.token_type == TokenType::KwConst;
        if is_constant {
            self.advance();
        }

        let mut dummy = FunctionDefinition::new(String::new(), 0, 1, 0, 0);
        let lvalue = self.current.clone();
        self.push_lvalue(module, &mut dummy, &LocalsBindings::default(), &lvalue, false)?;

        self.advance();
        if self.current.token_type != TokenType::RightArrow {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected '->' to assign global value."));
        }
        self.advance();
        if self.current.token_type != TokenType::Identifier {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected name for global."));
        }
        let name_token = self.current.clone();
        let name = name_token.string_val.clone();
        dummy.name = name.clone();

        let existing_idx = module.globals.iter().position(|g| g.name == name);
        if let Some(idx) = existing_idx {
            let existing = &module.globals[idx];
            if existing.is_constant {
                return Err(ParseError::new(
                    ParseErrorKind::WritingToConstantGlobal,
                    &name_token,
                    self.current_file(),
                    "Trying to reassign constant global.",
                ));
            }
            if is_constant {
                return Err(ParseError::new(ParseErrorKind::UnexpectedToken, &const_token, self.current_file(), "Redeclaring global as const."));
            }
        }

        let value = {
            let mut context = ExecutionContext::new(module);
            let state = context.call_definition(&dummy);
            if state != RuntimeState::Ok || context.root_stack.is_empty() {
                return Err(ParseError::new(
                    ParseErrorKind::GlobalEvaluationError,
                    &name_token,
                    self.current_file(),
                    "Error while evaluating value of global.",
                ));
            }
            context.root_stack.pop().expect("checked non-empty above")
        };

        let mut def = GlobalDefinition::new(name, value, is_constant);
        if debug_symbols {
            def.debug_symbol = Some(name_token);
        }
        match existing_idx {
            Some(idx) => module.globals[idx] = def,
            None => {
                module.append_global(def);
            }
        }
        Ok(())
    }
}
