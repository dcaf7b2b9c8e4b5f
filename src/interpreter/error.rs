//! Runtime error taxonomy.

use std::fmt;

/// Outcome of driving the interpreter. `Ok` means the call stack emptied
/// normally; anything else halts the run loop with the faulted frame still on
/// the call stack so a caller can inspect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Ok,
    Error,
    TypeError,
    /// Reserved: the reference interpreter never produces this. An
    /// implementation is free to enforce a call-stack depth limit and raise it.
    StackOverflow,
    StackUnderflow,
    OutOfBoundsConstantIndex,
    OutOfBoundsLocalIndex,
    OutOfBoundsGlobalIndex,
    WritingOnConstantGlobal,
    OutOfBoundsFunctionIndex,
    CallStackUnderflow,
    NativeFunctionBindingsMismatch,
    UnboundNativeFunction,
    FunctionNotFound,
    ListIndexOutOfBounds,
    StringIndexOutOfBounds,
    NoCustomTypeGlobalData,
    InvalidCustomTypeHandle,
    InvalidCustomTypeReference,
}

impl RuntimeState {
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::TypeError => "type error",
            Self::StackOverflow => "stack overflow",
            Self::StackUnderflow => "stack underflow",
            Self::OutOfBoundsConstantIndex => "out-of-bounds constant index",
            Self::OutOfBoundsLocalIndex => "out-of-bounds local index",
            Self::OutOfBoundsGlobalIndex => "out-of-bounds global index",
            Self::WritingOnConstantGlobal => "writing on constant global",
            Self::OutOfBoundsFunctionIndex => "out-of-bounds function index",
            Self::CallStackUnderflow => "call stack underflow",
            Self::NativeFunctionBindingsMismatch => "native function bindings mismatch",
            Self::UnboundNativeFunction => "unbound native function",
            Self::FunctionNotFound => "function not found",
            Self::ListIndexOutOfBounds => "list index out of bounds",
            Self::StringIndexOutOfBounds => "string index out of bounds",
            Self::NoCustomTypeGlobalData => "no custom type global data",
            Self::InvalidCustomTypeHandle => "invalid custom type handle",
            Self::InvalidCustomTypeReference => "invalid custom type reference",
        };
        f.write_str(s)
    }
}

impl std::error::Error for RuntimeState {}
