//! Parse-time error taxonomy.
//!
//! Shaped after [`crate::interpreter::RuntimeState`]: a plain enum with a
//! hand-rolled `Display`, no `thiserror`. `ParseError` additionally carries the
//! offending token and the file it came from, since a parse failure needs a
//! source location to be useful to a caller.

use std::fmt;

use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Also covers an unrecognized `#directive` name and any other token the
    /// grammar has no production for at that point.
    UnexpectedToken,
    /// An identifier resolves to neither a local nor a global, in a context
    /// that reads or moves a value rather than binding one (binding targets
    /// that resolve to nothing instead declare a new local; see `function.rs`).
    UndeclaredLocal,
    UndeclaredFunction,
    UndeclaredNativeFunction,
    UnknownInstruction,
    NegativeResultCount,
    FileNotRead,
    WritingToConstantGlobal,
    GlobalEvaluationError,
    IncludePathOutsideWorkingDirectory,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnexpectedToken => "unexpected token",
            Self::UndeclaredLocal => "undeclared local",
            Self::UndeclaredFunction => "undeclared function",
            Self::UndeclaredNativeFunction => "undeclared native function",
            Self::UnknownInstruction => "unknown instruction",
            Self::NegativeResultCount => "negative result count",
            Self::FileNotRead => "file not read",
            Self::WritingToConstantGlobal => "writing to constant global",
            Self::GlobalEvaluationError => "global evaluation error",
            Self::IncludePathOutsideWorkingDirectory => "include path outside working directory",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub token: Token,
    pub file: String,
}

impl ParseError {
    pub(super) fn new(kind: ParseErrorKind, token: &Token, file: &str, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), token: token.clone(), file: file.to_owned() }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.file,
            self.token.source_pos.line + 1,
            self.token.source_pos.char + 1,
            self.kind,
            self.message
        )
    }
}

impl std::error::Error for ParseError {}

pub type ParseOutcome<T> = Result<T, ParseError>;
