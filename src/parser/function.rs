//! Function declarations, function bodies, and the lvalue/call/binding
//! constructs that make up a body's statement stream.

use std::str::FromStr;

use crate::module::{
    BlockDebugSymbol, FunctionDebugSymbol, FunctionDefinition, INVALID_INDEX, Instruction, Module, Opcode,
};
use crate::token::{Token, TokenType};
use crate::value::Value;

use super::error::{ParseError, ParseErrorKind, ParseOutcome};
use super::locals::LocalsBindings;
use super::Parser;

/// Records `code.len()` as the start of a new debug-symbol-covered block,
/// when debug symbols were requested. Called right before most of a body's
/// instructions are emitted, so the symbol's index points at the instruction
/// it describes.
pub(super) fn push_code_symbol(debug_symbols: bool, func: &mut FunctionDefinition, token: &Token) {
    if debug_symbols {
        func.code_debug_symbols.push(BlockDebugSymbol { token: token.clone(), code_start_index: func.code.len() });
    }
}

impl Parser {
    fn source_index(&self, module: &Module) -> usize {
        let path = self.current_file();
        module.source_debug_symbols.iter().position(|s| s.path == path).unwrap_or(0)
    }

    pub(super) fn parse_function_definition(&mut self, module: &mut Module, debug_symbols: bool) -> ParseOutcome<()> {
        self.advance(); // past '*'
        if self.current.token_type != TokenType::OpenParenth {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected '(' to open function name and args declaration."));
        }
        self.advance();
        let is_native = self.current.token_type == TokenType::Star;
        if is_native {
            self.advance();
        }
        if self.current.token_type != TokenType::Identifier {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected function identifier."));
        }
        let name_token = self.current.clone();
        let mut def = FunctionDefinition::new(name_token.string_val.clone(), 0, 0, 0, 0);
        if debug_symbols {
            def.debug_symbol = Some(FunctionDebugSymbol { token: name_token, source_idx: self.source_index(module) });
        }

        self.advance();
        let mut args = LocalsBindings::default();
        while self.current.token_type == TokenType::Identifier {
            args.push(self.current.string_val.clone());
            self.advance();
        }
        def.arity = args.len();
        def.locals_count = args.len();

        if self.current.token_type != TokenType::CloseParenth {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected ')' to close function name and args declaration."));
        }
        self.advance();
        if self.current.token_type == TokenType::RightArrow {
            self.advance();
            if self.current.token_type != TokenType::IntegerLiteral {
                return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected return count."));
            }
            if self.current.integer_val < 0 {
                return Err(self.err_current(ParseErrorKind::NegativeResultCount, "Illegal return count. Return count must be >= 0"));
            }
            def.returns = self.current.integer_val as usize;
            self.advance();
        }

        if is_native {
            if self.current.token_type != TokenType::FullStop {
                return Err(self.err_current(
                    ParseErrorKind::UnexpectedToken,
                    "Expected '.' to confirm native function declaration. Native functions can't have a body.",
                ));
            }
            module.append_native_binding(def);
        } else {
            if self.current.token_type != TokenType::Colon {
                return Err(self.err_current(
                    ParseErrorKind::UnexpectedToken,
                    "Expected '->' for return count declaration or ':' to begin function body.",
                ));
            }
            self.parse_function_body(module, &mut def, &args, debug_symbols)?;
            module.append_function(def);
        }
        Ok(())
    }

    pub(super) fn parse_function_body(
        &mut self,
        module: &mut Module,
        func: &mut FunctionDefinition,
        locals: &LocalsBindings,
        debug_symbols: bool,
    ) -> ParseOutcome<()> {
        let mut scoped = locals.clone();
        loop {
            self.advance();
            if self.current.token_type == TokenType::FullStop {
                push_code_symbol(debug_symbols, func, &self.current);
                func.code.push(Instruction::bare(Opcode::Return));
                return Ok(());
            }
            self.parse_body_token(module, func, &mut scoped, debug_symbols)?;
        }
    }

    /// Dispatches on `self.current`, one body statement at a time. Shared
    /// between a function's top-level body (`parse_function_body`, which
    /// handles `.` itself before delegating here) and an `if`/`else` body
    /// (`if_stmt.rs`, which handles `end`/`else` itself).
    pub(super) fn parse_body_token(
        &mut self,
        module: &mut Module,
        func: &mut FunctionDefinition,
        scoped: &mut LocalsBindings,
        debug_symbols: bool,
    ) -> ParseOutcome<()> {
        match self.current.token_type {
            TokenType::Plus => self.emit_bare(func, debug_symbols, Opcode::DynSum),
            TokenType::Minus => self.emit_bare(func, debug_symbols, Opcode::DynSub),
            TokenType::Star => self.emit_bare(func, debug_symbols, Opcode::DynMul),
            TokenType::Slash => self.emit_bare(func, debug_symbols, Opcode::DynDiv),
            TokenType::Modulus => self.emit_bare(func, debug_symbols, Opcode::Mod),
            TokenType::PushReference
            | TokenType::OpenBracket
            | TokenType::StringLiteral
            | TokenType::IntegerLiteral
            | TokenType::DoubleLiteral
            | TokenType::Identifier => {
                let token = self.current.clone();
                self.push_lvalue(module, func, scoped, &token, debug_symbols)?;
            }
            TokenType::RightArrow | TokenType::BothArrows => self.parse_binding(module, func, scoped, debug_symbols)?,
            TokenType::LeftArrow => self.parse_move(module, func, scoped, debug_symbols)?,
            TokenType::OpenParenth => self.parse_call(module, func, debug_symbols)?,
            TokenType::KwIf => {
                push_code_symbol(debug_symbols, func, &self.current);
                self.parse_if_statement(module, func, scoped, debug_symbols)?;
            }
            _ => return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expression expected.")),
        }
        Ok(())
    }

    fn emit_bare(&self, func: &mut FunctionDefinition, debug_symbols: bool, opcode: Opcode) {
        push_code_symbol(debug_symbols, func, &self.current);
        func.code.push(Instruction::bare(opcode));
    }

    /// `-> name` / `<-> name` / `-> !name` / `<-> !name`: binds the top of
    /// stack (or copies it, for `<->`) into a local or global.
    ///
    /// Resolution order: `!` always declares a brand-new local, shadowing any
    /// existing name. Otherwise an existing local wins, then an existing
    /// global; if neither matches, a new local is declared instead of
    /// raising an error (only a MOVE or a plain read of an unknown name is
    /// `UndeclaredLocal`).
    fn parse_binding(
        &mut self,
        module: &mut Module,
        func: &mut FunctionDefinition,
        scoped: &mut LocalsBindings,
        debug_symbols: bool,
    ) -> ParseOutcome<()> {
        let copy_into_local = self.current.token_type == TokenType::BothArrows;
        push_code_symbol(debug_symbols, func, &self.current);
        self.advance();
        let force_binding = self.current.token_type == TokenType::Bang;
        if force_binding {
            self.advance();
        }
        if self.current.token_type != TokenType::Identifier {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected identifier to create local binding."));
        }
        let name = self.current.string_val.clone();

        if !force_binding && scoped.resolve(&name).is_none() {
            let global_idx = module.find_global(&name);
            if global_idx != INVALID_INDEX {
                if module.globals[global_idx].is_constant {
                    return Err(self.err_current(ParseErrorKind::WritingToConstantGlobal, "Trying to assign to constant global."));
                }
                func.code.push(Instruction::new(
                    if copy_into_local { Opcode::CopyIntoGlobal } else { Opcode::PopIntoGlobal },
                    global_idx as i64,
                ));
                return Ok(());
            }
        }

        let local_idx = if force_binding {
            scoped.push(name)
        } else if let Some(idx) = scoped.resolve(&name) {
            idx
        } else {
            scoped.push(name)
        };
        if scoped.len() > func.locals_count {
            func.locals_count = scoped.len();
        }
        func.code.push(Instruction::new(if copy_into_local { Opcode::CopyIntoLocal } else { Opcode::PopIntoLocal }, local_idx as i64));
        Ok(())
    }

    /// `<- name`: moves a local or global onto the stack, leaving `Void`
    /// behind. Unlike a binding target, an unresolved name here is an error.
    fn parse_move(&mut self, module: &mut Module, func: &mut FunctionDefinition, scoped: &LocalsBindings, debug_symbols: bool) -> ParseOutcome<()> {
        push_code_symbol(debug_symbols, func, &self.current);
        self.advance();
        if self.current.token_type != TokenType::Identifier {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected local name."));
        }
        let name = self.current.string_val.clone();
        if let Some(idx) = scoped.resolve(&name) {
            func.code.push(Instruction::new(Opcode::MoveLocal, idx as i64));
            return Ok(());
        }
        let global_idx = module.find_global(&name);
        if global_idx != INVALID_INDEX {
            if module.globals[global_idx].is_constant {
                return Err(self.err_current(ParseErrorKind::WritingToConstantGlobal, "Cannot move constant global."));
            }
            func.code.push(Instruction::new(Opcode::MoveGlobal, global_idx as i64));
            return Ok(());
        }
        Err(self.err_current(ParseErrorKind::UndeclaredLocal, "Local not declared."))
    }

    /// `(name)` call, `(*name)` native call, or `(!opcode arg?)` direct
    /// instruction. A call naming the function currently being defined
    /// resolves to `module.functions.len()`, its own index once appended,
    /// since it hasn't been pushed onto the table yet at body-parse time.
    fn parse_call(&mut self, module: &mut Module, func: &mut FunctionDefinition, debug_symbols: bool) -> ParseOutcome<()> {
        self.advance();
        let is_native = self.current.token_type == TokenType::Star;
        let is_instruction = self.current.token_type == TokenType::Bang;
        if is_native || is_instruction {
            self.advance();
        }
        push_code_symbol(debug_symbols, func, &self.current);
        if self.current.token_type != TokenType::Identifier {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected function name for function call."));
        }
        let name = self.current.string_val.clone();
        let name_token = self.current.clone();
        self.advance();
        let mut arg0 = 0_i64;
        if is_instruction && self.current.token_type == TokenType::IntegerLiteral {
            arg0 = self.current.integer_val;
            self.advance();
        }
        if self.current.token_type != TokenType::CloseParenth {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected ')' to close function call."));
        }

        if is_instruction {
            let opcode = Opcode::from_str(&name).map_err(|_| {
                ParseError::new(ParseErrorKind::UnknownInstruction, &name_token, self.current_file(), "Instruction does not exist.")
            })?;
            func.code.push(Instruction::new(opcode, arg0));
            return Ok(());
        }
        if is_native {
            let idx = module.find_native(&name);
            if idx == INVALID_INDEX {
                return Err(ParseError::new(ParseErrorKind::UndeclaredNativeFunction, &name_token, self.current_file(), "Native function not declared."));
            }
            func.code.push(Instruction::new(Opcode::CallNative, idx as i64));
            return Ok(());
        }
        if name == func.name {
            func.code.push(Instruction::new(Opcode::Call, module.functions.len() as i64));
            return Ok(());
        }
        let idx = module.find_function(&name);
        if idx == INVALID_INDEX {
            return Err(ParseError::new(ParseErrorKind::UndeclaredFunction, &name_token, self.current_file(), "Function not declared."));
        }
        func.code.push(Instruction::new(Opcode::Call, idx as i64));
        Ok(())
    }

    /// Pushes one lvalue's worth of code: a literal, a local/global read, a
    /// function reference, or (recursively, via `list_literal`) a list.
    pub(super) fn push_lvalue(
        &mut self,
        module: &mut Module,
        func: &mut FunctionDefinition,
        locals: &LocalsBindings,
        lvalue: &Token,
        debug_symbols: bool,
    ) -> ParseOutcome<()> {
        match lvalue.token_type {
            TokenType::IntegerLiteral => {
                func.code.push(Instruction::new(Opcode::PushInt, lvalue.integer_val));
                Ok(())
            }
            TokenType::DoubleLiteral => {
                func.code.push(Instruction::new(Opcode::PushDbl, lvalue.double_val.to_bits() as i64));
                Ok(())
            }
            TokenType::Identifier => {
                push_code_symbol(debug_symbols, func, lvalue);
                if let Some(idx) = locals.resolve(&lvalue.string_val) {
                    func.code.push(Instruction::new(Opcode::PushLocal, idx as i64));
                    return Ok(());
                }
                let global_idx = module.find_global(&lvalue.string_val);
                if global_idx == INVALID_INDEX {
                    return Err(ParseError::new(ParseErrorKind::UndeclaredLocal, lvalue, self.current_file(), "Local not declared."));
                }
                func.code.push(Instruction::new(Opcode::PushGlobal, global_idx as i64));
                Ok(())
            }
            TokenType::StringLiteral => {
                push_code_symbol(debug_symbols, func, lvalue);
                let value = Value::String(lvalue.string_val.clone().into_bytes());
                let idx = module.find_constant(&value).unwrap_or_else(|| module.append_constant(value));
                func.code.push(Instruction::new(Opcode::PushConst, idx as i64));
                Ok(())
            }
            TokenType::PushReference => self.push_function_reference(module, func),
            TokenType::OpenBracket => self.push_list_literal(module, func, locals, debug_symbols),
            _ => Err(ParseError::new(ParseErrorKind::UnexpectedToken, lvalue, self.current_file(), "Expected lvalue.")),
        }
    }

    /// `<& (name)` / `<& (*name)`: pushes a function or native-function
    /// reference value. Bare-local references are rejected (unsupported, as
    /// in the reference grammar).
    fn push_function_reference(&mut self, module: &mut Module, func: &mut FunctionDefinition) -> ParseOutcome<()> {
        self.advance();
        if self.current.token_type == TokenType::Identifier {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Local reference is not supported, expected (function)."));
        }
        if self.current.token_type != TokenType::OpenParenth {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected (function) or local to reference."));
        }
        self.advance();
        let is_native = self.current.token_type == TokenType::Star;
        if is_native {
            self.advance();
        }
        if self.current.token_type != TokenType::Identifier {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected (function) name."));
        }
        let name = self.current.string_val.clone();
        let name_token = self.current.clone();
        self.advance();
        if self.current.token_type != TokenType::CloseParenth {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected ')' to close function reference."));
        }

        if is_native {
            let idx = module.find_native(&name);
            if idx == INVALID_INDEX {
                return Err(ParseError::new(ParseErrorKind::UndeclaredNativeFunction, &name_token, self.current_file(), "Native function not declared."));
            }
            func.code.push(Instruction::new(Opcode::PushNativeFunctionReference, idx as i64));
            return Ok(());
        }
        if name == func.name {
            func.code.push(Instruction::new(Opcode::PushFunctionReference, module.functions.len() as i64));
            return Ok(());
        }
        let idx = module.find_function(&name);
        if idx == INVALID_INDEX {
            return Err(ParseError::new(ParseErrorKind::UndeclaredFunction, &name_token, self.current_file(), "Function not declared."));
        }
        func.code.push(Instruction::new(Opcode::PushFunctionReference, idx as i64));
        Ok(())
    }
}
