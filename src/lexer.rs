//! Surface-syntax tokenizer.
//!
//! Holds its source as an `Rc<str>` rather than borrowing a `&str` with a
//! lifetime, since the parser keeps a stack of lexers (one per active
//! `#include`) that grows and shrinks as files are discovered while parsing
//! runs. A borrowed lexer would tie that stack's lifetime to wherever the
//! caller happened to store the underlying strings. Cloning a `Lexer` is
//! cheap (an `Rc` bump) and is used internally for backtracking lookahead.

use std::rc::Rc;

use crate::token::{DirectiveKind, SourcePosition, Token, TokenType};

/// Tokenizes one source file.
#[derive(Clone)]
pub struct Lexer {
    source: Rc<str>,
    pos: usize,
    line: usize,
    char_in_line: usize,
}

impl Lexer {
    #[must_use]
    pub fn new(source: impl Into<Rc<str>>) -> Self {
        Self { source: source.into(), pos: 0, line: 0, char_in_line: 0 }
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Skips a `#!` shebang line, if the source starts with one. Must be
    /// called, if at all, before the first `next_token`.
    pub fn skip_shebang(&mut self) {
        if self.source.starts_with("#!") {
            while let Some(c) = self.peek() {
                self.bump();
                if c == '\n' {
                    break;
                }
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    fn peek_byte_index(&self) -> usize {
        self.pos
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.char_in_line = 0;
        } else {
            self.char_in_line += 1;
        }
        Some(c)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn pos_at(&self, byte_index: usize, char: usize, line: usize, char_span: usize) -> SourcePosition {
        SourcePosition::new(line, char, byte_index, char_span)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some(';') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') => match self.peek_nth(1) {
                    Some('/') => {
                        while let Some(c) = self.peek() {
                            if c == '\n' {
                                break;
                            }
                            self.bump();
                        }
                    }
                    Some('*') => {
                        self.bump();
                        self.bump();
                        loop {
                            match self.peek() {
                                None => break,
                                Some('*') => {
                                    self.bump();
                                    if self.bump_if('/') {
                                        break;
                                    }
                                }
                                Some(_) => {
                                    self.bump();
                                }
                            }
                        }
                    }
                    _ => return,
                },
                _ => return,
            }
        }
    }

    /// Produces the next token, skipping whitespace and comments first.
    ///
    /// Returns a `TokenType::EndOfFile` token once the source is exhausted,
    /// and `TokenType::None` for input it cannot classify.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start_byte = self.peek_byte_index();
        let start_line = self.line;
        let start_char = self.char_in_line;

        let Some(c) = self.peek() else {
            return Token::new(TokenType::EndOfFile, self.pos_at(start_byte, start_char, start_line, 0));
        };

        if c.is_ascii_digit() || (c == '.' && self.next_char_is_digit()) || ((c == '-' || c == '+') && self.next_char_is_digit()) {
            return self.lex_number(start_byte, start_line, start_char);
        }
        if c == '"' {
            return self.lex_string(start_byte, start_line, start_char);
        }
        if c == '\'' {
            return self.lex_character(start_byte, start_line, start_char);
        }
        if c == '#' {
            return self.lex_directive(start_byte, start_line, start_char);
        }
        if c == '@' {
            return self.lex_label(start_byte, start_line, start_char);
        }
        if is_identifier_start(c) {
            return self.lex_identifier(start_byte, start_line, start_char);
        }
        self.lex_punctuation(start_byte, start_line, start_char)
    }

    fn next_char_is_digit(&self) -> bool {
        self.peek_nth(1).is_some_and(|d| d.is_ascii_digit())
    }

    fn span(&self, start_char: usize) -> usize {
        self.char_in_line.saturating_sub(start_char).max(1)
    }

    fn lex_number(&mut self, start_byte: usize, start_line: usize, start_char: usize) -> Token {
        let mut text = String::new();

        let sign = if self.peek() == Some('-') || self.peek() == Some('+') {
            let c = self.bump().unwrap();
            text.push(c);
            if c == '-' { -1 } else { 1 }
        } else {
            1
        };

        let radix_prefix = if self.peek() == Some('0') { self.peek_nth(1) } else { None };

        let pos = self.pos_at(start_byte, start_char, start_line, 0);
        if let Some(marker @ ('x' | 'o' | 'b')) = radix_prefix {
            text.push(self.bump().unwrap());
            text.push(self.bump().unwrap());
            let radix = match marker {
                'x' => 16,
                'o' => 8,
                _ => 2,
            };
            let digits_start = text.len();
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() || c == '_' {
                    text.push(self.bump().unwrap());
                } else {
                    break;
                }
            }
            if self.peek().is_some_and(is_identifier_start) {
                return self.invalid_token(start_byte, start_char, start_line);
            }
            let digits: String = text[digits_start..].chars().filter(|&c| c != '_').collect();
            return match i64::from_str_radix(&digits, radix) {
                Ok(value) => Token::with_integer(TokenType::IntegerLiteral, value * sign, self.finish_pos(pos, start_char)),
                Err(_) => self.invalid_token(start_byte, start_char, start_line),
            };
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                text.push(self.bump().unwrap());
            } else {
                break;
            }
        }

        let mut is_double = false;
        if self.peek() == Some('.') && self.next_char_is_digit() {
            is_double = true;
            text.push(self.bump().unwrap());
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() || c == '_' {
                    text.push(self.bump().unwrap());
                } else {
                    break;
                }
            }
        }

        if self.peek().is_some_and(is_identifier_start) {
            return self.invalid_token(start_byte, start_char, start_line);
        }

        let cleaned: String = text.chars().filter(|&c| c != '_').collect();
        if is_double {
            match cleaned.parse::<f64>() {
                Ok(value) => Token::with_double(TokenType::DoubleLiteral, value, self.finish_pos(pos, start_char)),
                Err(_) => self.invalid_token(start_byte, start_char, start_line),
            }
        } else {
            match cleaned.parse::<i64>() {
                Ok(value) => Token::with_integer(TokenType::IntegerLiteral, value, self.finish_pos(pos, start_char)),
                Err(_) => self.invalid_token(start_byte, start_char, start_line),
            }
        }
    }

    fn finish_pos(&self, mut pos: SourcePosition, start_char: usize) -> SourcePosition {
        pos.char_span = self.span(start_char);
        pos
    }

    fn invalid_token(&self, start_byte: usize, start_char: usize, start_line: usize) -> Token {
        Token::new(TokenType::None, self.pos_at(start_byte, start_char, start_line, self.span(start_char)))
    }

    /// Reads one escape sequence after a `\` has already been consumed,
    /// appending the decoded character(s) to `out`. Returns `false` on an
    /// unrecognized or malformed escape.
    fn read_escape(&mut self, out: &mut String) -> bool {
        let Some(c) = self.bump() else { return false };
        match c {
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'n' => out.push('\n'),
            'x' => return self.read_hex_escape(out, 2),
            'u' => return self.read_hex_escape(out, 6),
            other => out.push(other),
        }
        true
    }

    fn read_hex_escape(&mut self, out: &mut String, max_digits: usize) -> bool {
        if !self.bump_if('{') {
            return false;
        }
        let mut digits = String::new();
        while digits.len() < max_digits {
            match self.peek() {
                Some(c) if c.is_ascii_hexdigit() => digits.push(self.bump().unwrap()),
                _ => break,
            }
        }
        let Ok(value) = u32::from_str_radix(&digits, 16) else { return false };
        let Some(decoded) = char::from_u32(value) else { return false };
        out.push(decoded);
        if !self.bump_if('}') {
            return false;
        }
        self.bump_if(';');
        true
    }

    fn lex_string(&mut self, start_byte: usize, start_line: usize, start_char: usize) -> Token {
        let mut value = String::new();
        loop {
            self.bump(); // opening quote
            loop {
                match self.peek() {
                    None => return self.invalid_token(start_byte, start_char, start_line),
                    Some('"') => {
                        self.bump();
                        break;
                    }
                    Some(c) if c.is_control() && c != '\t' => return self.invalid_token(start_byte, start_char, start_line),
                    Some('\\') => {
                        self.bump();
                        if !self.read_escape(&mut value) {
                            return self.invalid_token(start_byte, start_char, start_line);
                        }
                    }
                    Some(c) => {
                        value.push(c);
                        self.bump();
                    }
                }
            }
            // Multi-line string syntax: whitespace, then `\` (optionally `n`), then
            // another string literal, continues the same token. Probe with a clone
            // so a failed match leaves `self` untouched.
            let mut probe = self.clone();
            let mut saw_whitespace = false;
            while let Some(c) = probe.peek() {
                if c.is_whitespace() {
                    probe.bump();
                    saw_whitespace = true;
                } else {
                    break;
                }
            }
            if !saw_whitespace || probe.peek() != Some('\\') {
                break;
            }
            probe.bump();
            let mut insert_newline = false;
            if probe.peek() == Some('n') {
                insert_newline = true;
                probe.bump();
            }
            while let Some(c) = probe.peek() {
                if c.is_whitespace() {
                    probe.bump();
                } else {
                    break;
                }
            }
            if probe.peek() != Some('"') {
                break;
            }
            *self = probe;
            if insert_newline {
                value.push('\n');
            }
        }
        Token::with_string(TokenType::StringLiteral, value, self.finish_pos(self.pos_at(start_byte, start_char, start_line, 0), start_char))
    }

    fn lex_character(&mut self, start_byte: usize, start_line: usize, start_char: usize) -> Token {
        self.bump(); // opening quote
        let mut value = String::new();
        match self.peek() {
            Some('\\') => {
                self.bump();
                if !self.read_escape(&mut value) {
                    return self.invalid_token(start_byte, start_char, start_line);
                }
            }
            Some(c) => {
                value.push(c);
                self.bump();
            }
            None => return self.invalid_token(start_byte, start_char, start_line),
        }
        if !self.bump_if('\'') {
            return self.invalid_token(start_byte, start_char, start_line);
        }
        let Some(codepoint) = value.chars().next() else {
            return self.invalid_token(start_byte, start_char, start_line);
        };
        Token::with_integer(
            TokenType::IntegerLiteral,
            i64::from(u32::from(codepoint)),
            self.finish_pos(self.pos_at(start_byte, start_char, start_line, 0), start_char),
        )
    }

    fn lex_identifier(&mut self, start_byte: usize, start_line: usize, start_char: usize) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if is_identifier_continue(c) {
                text.push(self.bump().unwrap());
            } else {
                break;
            }
        }
        let pos = self.finish_pos(self.pos_at(start_byte, start_char, start_line, 0), start_char);
        match TokenType::keyword(&text) {
            Some(kw) => Token::new(kw, pos),
            None => Token::with_string(TokenType::Identifier, text, pos),
        }
    }

    fn lex_directive(&mut self, start_byte: usize, start_line: usize, start_char: usize) -> Token {
        self.bump(); // '#'
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if is_identifier_continue(c) {
                name.push(self.bump().unwrap());
            } else {
                break;
            }
        }
        let mut token = Token::with_string(
            TokenType::CompilerDirective,
            name.clone(),
            self.finish_pos(self.pos_at(start_byte, start_char, start_line, 0), start_char),
        );
        token.directive_kind = if name == "include" { DirectiveKind::Include } else { DirectiveKind::Generic };
        token
    }

    fn lex_label(&mut self, start_byte: usize, start_line: usize, start_char: usize) -> Token {
        self.bump(); // '@'
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if is_identifier_continue(c) {
                name.push(self.bump().unwrap());
            } else {
                break;
            }
        }
        Token::with_string(TokenType::Label, name, self.finish_pos(self.pos_at(start_byte, start_char, start_line, 0), start_char))
    }

    fn lex_punctuation(&mut self, start_byte: usize, start_line: usize, start_char: usize) -> Token {
        let pos = self.pos_at(start_byte, start_char, start_line, 0);
        let c = self.bump().unwrap();
        let token_type = match c {
            '(' => TokenType::OpenParenth,
            ')' => TokenType::CloseParenth,
            '[' => TokenType::OpenBracket,
            ']' => TokenType::CloseBracket,
            '+' => TokenType::Plus,
            '-' => {
                if self.bump_if('>') {
                    TokenType::RightArrow
                } else {
                    TokenType::Minus
                }
            }
            '*' => TokenType::Star,
            '/' => TokenType::Slash,
            '%' => TokenType::Modulus,
            '&' => TokenType::BitAnd,
            '|' => TokenType::BitOr,
            '~' => TokenType::BitNot,
            '^' => TokenType::BitXor,
            '.' => TokenType::FullStop,
            '!' => {
                if self.bump_if('=') {
                    TokenType::NotEquals
                } else {
                    TokenType::Bang
                }
            }
            ':' => TokenType::Colon,
            ',' => TokenType::Comma,
            '=' => TokenType::Equals,
            '<' => {
                if self.bump_if('<') {
                    TokenType::BitShiftLeft
                } else if self.bump_if('-') {
                    if self.bump_if('>') {
                        TokenType::BothArrows
                    } else {
                        TokenType::LeftArrow
                    }
                } else if self.bump_if('&') {
                    TokenType::PushReference
                } else if self.bump_if('=') {
                    TokenType::LessOrEqual
                } else {
                    TokenType::Less
                }
            }
            '>' => {
                if self.bump_if('>') {
                    TokenType::BitShiftRight
                } else if self.bump_if('=') {
                    TokenType::MoreOrEqual
                } else {
                    TokenType::More
                }
            }
            _ => TokenType::None,
        };
        Token::new(token_type, self.finish_pos(pos, start_char))
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '<' | '=' | '>' | '?' | '+' | '-' | '*' | '/' | '!')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<TokenType> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = token.token_type == TokenType::EndOfFile;
            out.push(token.token_type);
            if is_eof {
                break;
            }
        }
        out
    }

    #[test]
    fn skips_whitespace_and_line_comments() {
        let kinds = tokens("  ; a comment\nfoo");
        assert_eq!(kinds, vec![TokenType::Identifier, TokenType::EndOfFile]);
    }

    #[test]
    fn skips_block_comments() {
        let kinds = tokens("/* comment \n spanning lines */ bar");
        assert_eq!(kinds, vec![TokenType::Identifier, TokenType::EndOfFile]);
    }

    #[test]
    fn lexes_integer_literals() {
        let mut lexer = Lexer::new("42 -7 0x1F 0b101 0o17");
        let values: Vec<i64> = (0..5)
            .map(|_| {
                let t = lexer.next_token();
                assert_eq!(t.token_type, TokenType::IntegerLiteral);
                t.integer_val
            })
            .collect();
        assert_eq!(values, vec![42, -7, 31, 5, 15]);
    }

    #[test]
    fn lexes_double_literal() {
        let mut lexer = Lexer::new("3.14");
        let t = lexer.next_token();
        assert_eq!(t.token_type, TokenType::DoubleLiteral);
        assert!((t.double_val - 3.14).abs() < 1e-9);
    }

    #[test]
    fn integer_followed_by_identifier_char_is_invalid() {
        let mut lexer = Lexer::new("42abc");
        let t = lexer.next_token();
        assert_eq!(t.token_type, TokenType::None);
    }

    #[test]
    fn minus_before_digit_is_a_signed_literal_otherwise_an_operator() {
        let mut lexer = Lexer::new("5-3");
        let a = lexer.next_token();
        assert_eq!(a.token_type, TokenType::IntegerLiteral);
        assert_eq!(a.integer_val, 5);
        let op = lexer.next_token();
        assert_eq!(op.token_type, TokenType::IntegerLiteral);
        assert_eq!(op.integer_val, -3);
    }

    #[test]
    fn lexes_string_with_escapes() {
        let mut lexer = Lexer::new(r#""hi\tthere""#);
        let t = lexer.next_token();
        assert_eq!(t.token_type, TokenType::StringLiteral);
        assert_eq!(t.string_val, "hi\tthere");
    }

    #[test]
    fn hex_escape_consumes_its_closing_brace() {
        let mut lexer = Lexer::new(r#""\x{41}""#);
        let t = lexer.next_token();
        assert_eq!(t.token_type, TokenType::StringLiteral);
        assert_eq!(t.string_val, "A");
    }

    #[test]
    fn unicode_escape_with_trailing_semicolon() {
        let mut lexer = Lexer::new(r#""\u{1F600};""#);
        let t = lexer.next_token();
        assert_eq!(t.token_type, TokenType::StringLiteral);
        assert_eq!(t.string_val, "\u{1F600}");
    }

    #[test]
    fn concatenates_adjacent_multiline_strings() {
        let mut lexer = Lexer::new("\"hello\" \\n\n\"world\"");
        let t = lexer.next_token();
        assert_eq!(t.token_type, TokenType::StringLiteral);
        assert_eq!(t.string_val, "hello\nworld");
    }

    #[test]
    fn lexes_character_literal_as_integer() {
        let mut lexer = Lexer::new("'a'");
        let t = lexer.next_token();
        assert_eq!(t.token_type, TokenType::IntegerLiteral);
        assert_eq!(t.integer_val, i64::from(b'a'));
    }

    #[test]
    fn keyword_identifiers_are_retagged() {
        let kinds = tokens("if else end");
        assert_eq!(kinds, vec![TokenType::KwIf, TokenType::KwElse, TokenType::KwEnd, TokenType::EndOfFile]);
    }

    #[test]
    fn lexes_compiler_directive_and_label() {
        let mut lexer = Lexer::new("#include @loop");
        let directive = lexer.next_token();
        assert_eq!(directive.token_type, TokenType::CompilerDirective);
        assert_eq!(directive.directive_kind, DirectiveKind::Include);
        let label = lexer.next_token();
        assert_eq!(label.token_type, TokenType::Label);
        assert_eq!(label.string_val, "loop");
    }

    #[test]
    fn lexes_multi_char_punctuation() {
        let kinds = tokens("-> <- <-> <& << >> <= >= !=");
        assert_eq!(
            kinds,
            vec![
                TokenType::RightArrow,
                TokenType::LeftArrow,
                TokenType::BothArrows,
                TokenType::PushReference,
                TokenType::BitShiftLeft,
                TokenType::BitShiftRight,
                TokenType::LessOrEqual,
                TokenType::MoreOrEqual,
                TokenType::NotEquals,
                TokenType::EndOfFile,
            ]
        );
    }
}
