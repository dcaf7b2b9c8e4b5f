//! Turns surface syntax into a [`Module`]: lexing, recursive-descent parsing
//! of module-level statements, and include resolution.
//!
//! Split the way `interpreter/` splits its instruction families: this file
//! owns the `Parser` itself, source/include bookkeeping, and module-statement
//! dispatch; function bodies, `if` statements, list literals, and `global`
//! definitions each get their own sibling module.

mod error;
mod function;
mod global;
mod if_stmt;
mod list_literal;
mod locals;

pub use error::{ParseError, ParseErrorKind, ParseOutcome};

use std::path::{Path, PathBuf};
use std::rc::Rc;

use ahash::AHashSet;

use crate::lexer::Lexer;
use crate::module::{Module, SourceDebugSymbol};
use crate::token::{DirectiveKind, Token, TokenType};

/// Resolves a requested `#include` path against the file that requested it.
/// Defaults to "relative to the including file's directory" when not set.
pub type IncludeResolver = Box<dyn Fn(&Path, &str) -> PathBuf>;

#[derive(Default)]
pub struct ParserSettings {
    /// Whether to record `Module::source_debug_symbols` and per-function/
    /// per-block debug symbols while parsing.
    pub debug_symbols: bool,
    /// Sandbox root for `#include` resolution; `None` defaults to the
    /// process's current directory. An include resolving outside this
    /// directory is rejected with `IncludePathOutsideWorkingDirectory`.
    pub root_dir: Option<PathBuf>,
    pub include_resolver: Option<IncludeResolver>,
}

struct LexerSource {
    path: String,
    lexer: Lexer,
}

/// Recursive-descent parser. Holds a stack of active lexers, one per
/// in-progress `#include`, since a borrowed, lifetime-tied lexer can't be
/// pushed and popped dynamically as files are discovered mid-parse.
pub struct Parser {
    lexers: Vec<LexerSource>,
    current: Token,
    parsed_sources: AHashSet<String>,
    root_dir: PathBuf,
}

impl Parser {
    #[must_use]
    pub fn new(settings: &ParserSettings) -> Self {
        let root_dir = settings
            .root_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .map(|p| std::fs::canonicalize(&p).unwrap_or(p))
            .unwrap_or_default();
        Self { lexers: Vec::new(), current: Token::default(), parsed_sources: AHashSet::default(), root_dir }
    }

    /// Adds raw source text under `path` (may be empty for anonymous/one-off
    /// sources, which are never cycle-guarded). Returns `false` if `path` is
    /// non-empty and was already added.
    pub fn add_source(&mut self, path: impl Into<String>, source: impl Into<Rc<str>>) -> bool {
        let path = path.into();
        if !path.is_empty() && !self.parsed_sources.insert(path.clone()) {
            return false;
        }
        self.push_lexer(path, source);
        true
    }

    /// Reads `path` off disk and adds it, resolving and sandboxing it against
    /// `root_dir` first. Returns `Ok(false)` without reading the file again if
    /// it was already added (an include cycle or diamond include).
    pub fn add_source_file(&mut self, path: &str) -> ParseOutcome<bool> {
        let requested = PathBuf::from(path);
        let absolute = if requested.is_absolute() { requested } else { self.root_dir.join(&requested) };
        let canonical = std::fs::canonicalize(&absolute)
            .map_err(|_| self.err_current(ParseErrorKind::FileNotRead, format!("File '{path}' does not exist.")))?;
        if !canonical.starts_with(&self.root_dir) {
            return Err(self.err_current(
                ParseErrorKind::IncludePathOutsideWorkingDirectory,
                format!("Include path '{path}' escapes the working directory."),
            ));
        }
        let relative = canonical.strip_prefix(&self.root_dir).unwrap_or(&canonical).to_string_lossy().replace('\\', "/");
        if !self.parsed_sources.insert(relative.clone()) {
            return Ok(false);
        }
        let text = std::fs::read_to_string(&canonical)
            .map_err(|_| self.err_current(ParseErrorKind::FileNotRead, format!("Could not read file '{path}'.")))?;
        self.push_lexer(relative, text);
        Ok(true)
    }

    fn push_lexer(&mut self, path: String, source: impl Into<Rc<str>>) {
        let mut lexer = Lexer::new(source);
        lexer.skip_shebang();
        self.lexers.push(LexerSource { path, lexer });
    }

    /// Parses every source added so far into `module`, following `#include`s
    /// as they're encountered, until the lexer stack empties.
    pub fn parse_into_module(&mut self, module: &mut Module, settings: &ParserSettings) -> ParseOutcome<()> {
        if settings.debug_symbols {
            for source in &self.lexers {
                module
                    .source_debug_symbols
                    .push(SourceDebugSymbol { path: source.path.clone(), source_text: source.lexer.source().to_owned() });
            }
        }
        while !self.lexers.is_empty() {
            self.parse_module_statement(module, settings)?;
            if self.current.token_type == TokenType::EndOfFile {
                self.lexers.pop();
            }
        }
        module.sync_native_function_slots();
        Ok(())
    }

    fn advance(&mut self) -> Token {
        let token = self.lexers.last_mut().expect("advance called with no active source").lexer.next_token();
        self.current = token.clone();
        token
    }

    fn current_file(&self) -> &str {
        self.lexers.last().map_or("<input>", |s| s.path.as_str())
    }

    fn err_current(&self, kind: ParseErrorKind, message: impl Into<String>) -> ParseError {
        ParseError::new(kind, &self.current, self.current_file(), message)
    }

    fn parse_module_statement(&mut self, module: &mut Module, settings: &ParserSettings) -> ParseOutcome<()> {
        self.advance();
        match self.current.token_type {
            TokenType::Star => self.parse_function_definition(module, settings.debug_symbols),
            TokenType::CompilerDirective => self.parse_include_directive(module, settings),
            TokenType::KwGlobal => self.parse_global_definition(module, settings.debug_symbols),
            TokenType::EndOfFile => Ok(()),
            _ => Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected function declaration or compiler directive.")),
        }
    }

    fn parse_include_directive(&mut self, module: &mut Module, settings: &ParserSettings) -> ParseOutcome<()> {
        if self.current.directive_kind != DirectiveKind::Include {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Unknown compiler directive."));
        }
        self.advance();
        if self.current.token_type != TokenType::StringLiteral {
            return Err(self.err_current(ParseErrorKind::UnexpectedToken, "Expected file path."));
        }
        let requested = self.current.string_val.clone();
        let current_path = self.current_file().to_owned();
        let resolved = Self::resolve_include(settings, Path::new(&current_path), &requested);
        let added = self.add_source_file(&resolved.to_string_lossy())?;
        if added && settings.debug_symbols {
            let source = self.lexers.last().expect("a lexer was just pushed");
            module.source_debug_symbols.push(SourceDebugSymbol { path: source.path.clone(), source_text: source.lexer.source().to_owned() });
        }
        Ok(())
    }

    fn resolve_include(settings: &ParserSettings, current_file: &Path, requested: &str) -> PathBuf {
        if let Some(resolver) = &settings.include_resolver {
            return resolver(current_file, requested);
        }
        match current_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(requested),
            _ => PathBuf::from(requested),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_empty_source_into_an_empty_module() {
        let mut parser = Parser::new(&ParserSettings::default());
        parser.add_source("", "");
        let mut module = Module::new();
        parser.parse_into_module(&mut module, &ParserSettings::default()).unwrap();
        assert!(module.functions.is_empty());
    }

    #[test]
    fn unexpected_top_level_token_is_an_error() {
        let mut parser = Parser::new(&ParserSettings::default());
        parser.add_source("", "123");
        let mut module = Module::new();
        let err = parser.parse_into_module(&mut module, &ParserSettings::default()).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
    }

    /// A nested `#include` resolves against the configured `root_dir`, not the
    /// process's current directory, regardless of which directory the test
    /// binary happens to run from.
    #[test]
    fn nested_include_resolves_against_root_dir_not_process_cwd() {
        let root = std::env::temp_dir().join(format!("pulsar-parser-test-{}-{:?}", std::process::id(), std::thread::current().id()));
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("sub/a.ps"), "#include \"b.ps\"\n").unwrap();
        std::fs::write(root.join("sub/b.ps"), "* (main args) -> 1: 1 .").unwrap();

        let settings = ParserSettings { root_dir: Some(root.clone()), ..Default::default() };
        let mut parser = Parser::new(&settings);
        parser.add_source_file("sub/a.ps").unwrap();
        let mut module = Module::new();
        parser.parse_into_module(&mut module, &settings).unwrap();
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.functions[0].name, "main");

        std::fs::remove_dir_all(&root).unwrap();
    }
}
