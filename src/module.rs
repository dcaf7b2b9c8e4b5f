//! The compiled program: instructions, function/global/native tables, constants,
//! custom-type registry, and optional debug symbols.

use std::fmt;

use indexmap::IndexMap;
use strum::{Display, EnumString};

use crate::custom::{CustomHandle, CustomType};
use crate::token::Token;
use crate::value::Value;

/// Sentinel returned by name lookups that find nothing, matching the reference
/// implementation's `Module::INVALID_INDEX`.
pub const INVALID_INDEX: usize = usize::MAX;

/// The closed set of instruction opcodes. Mnemonics match the table in the
/// component design exactly, since the parser's direct-instruction syntax
/// (`(!opcode arg?)`) parses these names straight out of source text.
#[derive(Debug, Display, EnumString, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    PushInt,
    PushDbl,
    PushConst,
    PushLocal,
    MoveLocal,
    PopIntoLocal,
    CopyIntoLocal,
    PushGlobal,
    MoveGlobal,
    PopIntoGlobal,
    CopyIntoGlobal,
    PushEmptyList,
    PushFunctionReference,
    PushNativeFunctionReference,
    Call,
    CallNative,
    ICall,
    Return,
    DynSum,
    DynSub,
    DynMul,
    DynDiv,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    BitShiftLeft,
    BitShiftRight,
    Floor,
    Ceil,
    Compare,
    Jump,
    JumpIfZero,
    JumpIfNotZero,
    JumpIfGt,
    JumpIfGe,
    JumpIfLt,
    JumpIfLe,
    Length,
    IsEmpty,
    Prepend,
    Append,
    Concat,
    Head,
    Tail,
    Index,
    Prefix,
    Suffix,
    Substr,
}

impl Opcode {
    /// True for opcodes whose `arg0` indexes `Module::functions`.
    #[must_use]
    pub const fn references_function(self) -> bool {
        matches!(self, Self::Call | Self::PushFunctionReference)
    }

    /// True for opcodes whose `arg0` indexes `Module::native_bindings`.
    #[must_use]
    pub const fn references_native(self) -> bool {
        matches!(self, Self::CallNative | Self::PushNativeFunctionReference)
    }

    /// True for opcodes whose `arg0` indexes `Module::globals`.
    #[must_use]
    pub const fn references_global(self) -> bool {
        matches!(self, Self::PushGlobal | Self::MoveGlobal | Self::PopIntoGlobal | Self::CopyIntoGlobal)
    }

    /// True for opcodes whose `arg0` indexes `Module::constants`.
    #[must_use]
    pub const fn references_constant(self) -> bool {
        matches!(self, Self::PushConst)
    }

    /// True for the conditional/unconditional jump family, whose `arg0` is a
    /// signed offset relative to the jump instruction itself.
    #[must_use]
    pub const fn is_jump(self) -> bool {
        matches!(
            self,
            Self::Jump
                | Self::JumpIfZero
                | Self::JumpIfNotZero
                | Self::JumpIfGt
                | Self::JumpIfGe
                | Self::JumpIfLt
                | Self::JumpIfLe
        )
    }
}

/// A single bytecode instruction: an opcode plus one signed operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub arg0: i64,
}

impl Instruction {
    #[must_use]
    pub const fn new(opcode: Opcode, arg0: i64) -> Self {
        Self { opcode, arg0 }
    }

    #[must_use]
    pub const fn bare(opcode: Opcode) -> Self {
        Self { opcode, arg0: 0 }
    }
}

/// A debug symbol for a function's name: the token it was declared with and
/// which source file (by index into `Module::source_debug_symbols`) it came from.
#[derive(Debug, Clone)]
pub struct FunctionDebugSymbol {
    pub token: Token,
    pub source_idx: usize,
}

/// A debug symbol covering one basic block of instructions: the source token of
/// the statement that produced `code_start_index`, and that starting index.
#[derive(Debug, Clone)]
pub struct BlockDebugSymbol {
    pub token: Token,
    pub code_start_index: usize,
}

/// One compiled function.
#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    pub name: String,
    /// Values consumed from the caller's operand stack.
    pub arity: usize,
    /// Values produced on the caller's operand stack.
    pub returns: usize,
    /// Extra stack values visible to the callee beyond `arity`, used only for
    /// signature matching (native declarations vs. bound implementations).
    pub stack_arity: usize,
    /// Total local slots, always `>= arity`.
    pub locals_count: usize,
    pub code: Vec<Instruction>,
    pub debug_symbol: Option<FunctionDebugSymbol>,
    /// Sorted by `code_start_index`.
    pub code_debug_symbols: Vec<BlockDebugSymbol>,
}

impl FunctionDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, arity: usize, returns: usize, stack_arity: usize, locals_count: usize) -> Self {
        Self {
            name: name.into(),
            arity,
            returns,
            stack_arity,
            locals_count,
            code: Vec::new(),
            debug_symbol: None,
            code_debug_symbols: Vec::new(),
        }
    }

    /// Two definitions match when name, arity, returns, stack_arity, and
    /// locals_count all agree. Used to bind native implementations to
    /// declarations and to resolve `(name arity)` call sites.
    #[must_use]
    pub fn matches_declaration(&self, other: &Self) -> bool {
        self.name == other.name
            && self.arity == other.arity
            && self.returns == other.returns
            && self.stack_arity == other.stack_arity
            && self.locals_count == other.locals_count
    }
}

/// A global's declaration: its compile-time-evaluated initial value and
/// whether writes to it are rejected.
#[derive(Debug, Clone)]
pub struct GlobalDefinition {
    pub name: String,
    pub initial_value: Value,
    pub is_constant: bool,
    pub debug_symbol: Option<Token>,
}

impl GlobalDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, initial_value: Value, is_constant: bool) -> Self {
        Self { name: name.into(), initial_value, is_constant, debug_symbol: None }
    }
}

/// A global's live value inside an `ExecutionContext`, seeded from a
/// [`GlobalDefinition`] at context construction time.
#[derive(Debug, Clone)]
pub struct GlobalInstance {
    pub value: Value,
    pub is_constant: bool,
}

impl From<&GlobalDefinition> for GlobalInstance {
    fn from(def: &GlobalDefinition) -> Self {
        Self { value: def.initial_value.clone(), is_constant: def.is_constant }
    }
}

/// One parsed/loaded source file, kept only when debug symbols are requested.
#[derive(Debug, Clone)]
pub struct SourceDebugSymbol {
    pub path: String,
    pub source_text: String,
}

/// A native function declaration: shape only, no code. Bound callables live in
/// the parallel `Module::native_functions` table.
pub type NativeBinding = FunctionDefinition;

/// The compiled program.
///
/// All cross-references (`FunctionReference`, globals, constants, …) are plain
/// indices into the tables below; see the module invariants in the data model
/// for what must hold for a `Module` to be safe to run.
#[derive(Default)]
pub struct Module {
    pub functions: Vec<FunctionDefinition>,
    pub native_bindings: Vec<NativeBinding>,
    pub native_functions: Vec<Option<crate::interpreter::NativeFunction>>,
    pub globals: Vec<GlobalDefinition>,
    pub constants: Vec<Value>,
    pub custom_types: IndexMap<u64, CustomType>,
    pub source_debug_symbols: Vec<SourceDebugSymbol>,
    next_custom_type_id: u64,
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("functions", &self.functions)
            .field("native_bindings", &self.native_bindings)
            .field("native_functions", &self.native_functions.iter().map(Option::is_some).collect::<Vec<_>>())
            .field("globals", &self.globals)
            .field("constants", &self.constants)
            .field("custom_types", &self.custom_types)
            .field("source_debug_symbols", &self.source_debug_symbols)
            .finish_non_exhaustive()
    }
}

impl Module {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_function(&mut self, def: FunctionDefinition) -> usize {
        self.functions.push(def);
        self.functions.len() - 1
    }

    pub fn append_native_binding(&mut self, def: NativeBinding) -> usize {
        self.native_bindings.push(def);
        self.native_functions.push(None);
        self.native_bindings.len() - 1
    }

    pub fn append_global(&mut self, def: GlobalDefinition) -> usize {
        self.globals.push(def);
        self.globals.len() - 1
    }

    /// Appends `value` to the constant pool, returning its index. Does not
    /// deduplicate: callers that want deduplication (the parser's list-literal
    /// lowering and string-literal handling) look the value up first.
    pub fn append_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Looks up an existing constant equal to `value`, returning its index.
    #[must_use]
    pub fn find_constant(&self, value: &Value) -> Option<usize> {
        self.constants.iter().position(|existing| existing == value)
    }

    /// Registers a new custom type, returning a fresh id.
    pub fn register_custom_type(&mut self, name: impl Into<String>, factory: impl Fn() -> CustomHandle + 'static) -> u64 {
        let id = self.next_custom_type_id;
        self.next_custom_type_id += 1;
        self.custom_types.insert(id, CustomType::new(id, name, factory));
        id
    }

    /// Binds `func` to the first unbound native declaration matching `decl`'s
    /// shape (name/arity/returns/stack_arity/locals_count). Returns how many
    /// slots were bound (0 or 1).
    pub fn bind_native(&mut self, decl: &FunctionDefinition, func: crate::interpreter::NativeFunction) -> usize {
        for (idx, binding) in self.native_bindings.iter().enumerate() {
            if binding.matches_declaration(decl) && self.native_functions[idx].is_none() {
                self.native_functions[idx] = Some(func);
                return 1;
            }
        }
        0
    }

    /// Binds `func` to every unbound native declaration matching `decl`'s shape.
    /// Returns how many slots were bound.
    pub fn bind_native_by_signature(&mut self, decl: &FunctionDefinition, func: crate::interpreter::NativeFunction) -> usize {
        let mut bound = 0;
        for (idx, binding) in self.native_bindings.iter().enumerate() {
            if binding.matches_declaration(decl) && self.native_functions[idx].is_none() {
                self.native_functions[idx] = Some(func.clone());
                bound += 1;
            }
        }
        bound
    }

    /// Declares a brand-new native binding and binds `func` to it in one step,
    /// returning the new index.
    pub fn declare_and_bind_native(&mut self, decl: NativeBinding, func: crate::interpreter::NativeFunction) -> usize {
        let idx = self.append_native_binding(decl);
        self.native_functions[idx] = Some(func);
        idx
    }

    #[must_use]
    pub fn find_function(&self, name: &str) -> usize {
        self.functions.iter().position(|f| f.name == name).unwrap_or(INVALID_INDEX)
    }

    #[must_use]
    pub fn find_function_by_signature(&self, name: &str, arity: usize, returns: usize, stack_arity: usize) -> usize {
        self.functions
            .iter()
            .position(|f| f.name == name && f.arity == arity && f.returns == returns && f.stack_arity == stack_arity)
            .unwrap_or(INVALID_INDEX)
    }

    #[must_use]
    pub fn find_native(&self, name: &str) -> usize {
        self.native_bindings.iter().position(|f| f.name == name).unwrap_or(INVALID_INDEX)
    }

    #[must_use]
    pub fn find_global(&self, name: &str) -> usize {
        self.globals.iter().position(|g| g.name == name).unwrap_or(INVALID_INDEX)
    }

    /// Re-establishes the module invariant that every native declaration has a
    /// matching (possibly unbound) slot in `native_functions`.
    pub(crate) fn sync_native_function_slots(&mut self) {
        self.native_functions.resize_with(self.native_bindings.len(), || None);
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Module {{ functions: {}, natives: {}, globals: {}, constants: {} }}",
            self.functions.len(),
            self.native_bindings.len(),
            self.globals.len(),
            self.constants.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_classification_matches_design() {
        assert!(Opcode::Call.references_function());
        assert!(Opcode::PushFunctionReference.references_function());
        assert!(!Opcode::CallNative.references_function());

        assert!(Opcode::CallNative.references_native());
        assert!(Opcode::PushGlobal.references_global());
        assert!(Opcode::PushConst.references_constant());
        assert!(Opcode::JumpIfZero.is_jump());
        assert!(!Opcode::Call.is_jump());
    }

    #[test]
    fn opcode_mnemonic_round_trips() {
        use std::str::FromStr;
        assert_eq!(Opcode::from_str("DynSum").unwrap(), Opcode::DynSum);
        assert_eq!(Opcode::DynSum.to_string(), "DynSum");
    }

    #[test]
    fn find_function_returns_invalid_index_sentinel() {
        let module = Module::new();
        assert_eq!(module.find_function("main"), INVALID_INDEX);
    }

    #[test]
    fn functions_match_declaration_on_full_signature() {
        let a = FunctionDefinition::new("f", 1, 1, 0, 1);
        let b = FunctionDefinition::new("f", 1, 1, 0, 1);
        let c = FunctionDefinition::new("f", 2, 1, 0, 2);
        assert!(a.matches_declaration(&b));
        assert!(!a.matches_declaration(&c));
    }
}
