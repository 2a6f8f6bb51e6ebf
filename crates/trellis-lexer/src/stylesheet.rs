//! Stylesheet lexer.
//!
//! `{` and `}` get dedicated kinds so the grammar only has to balance them.
//! A full pass also classifies selectors, properties, values, colors and
//! units. Whether a statement is a selector or a declaration is decided by
//! looking ahead to the first `{`, `;` or `}`, which handles nested rules.

use std::ops::Range;

use crate::scanner::Scanner;
use crate::token::{Token, TokenKind};
use crate::Detail;

/// What the current statement is, as far as classification is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Selector,
    Declaration,
    Value,
    AtPrelude,
}

/// Stylesheet source lexer.
pub struct StylesheetLexer<'a> {
    scanner: Scanner<'a>,
    depth: usize,
    context: Context,
    statement_start: bool,
    in_attribute_selector: bool,
}

impl<'a> StylesheetLexer<'a> {
    fn from_scanner(scanner: Scanner<'a>) -> Self {
        Self {
            scanner,
            depth: 0,
            context: Context::Selector,
            statement_start: true,
            in_attribute_selector: false,
        }
    }

    pub fn new(source: &'a str, detail: Detail) -> Self {
        Self::from_scanner(Scanner::new(source, detail))
    }

    /// Tokenize a stylesheet.
    pub fn tokenize(source: &str, detail: Detail) -> Vec<Token> {
        let mut lexer = StylesheetLexer::new(source, detail);
        lexer.scan_tokens();
        lexer.scanner.finish()
    }

    /// Tokenize `range` of `source` (a `<style>` body).
    pub fn tokenize_range(
        source: &str,
        range: Range<usize>,
        line: usize,
        column: usize,
        detail: Detail,
    ) -> Vec<Token> {
        let scanner = Scanner::with_range(source, range, line, column, detail);
        let mut lexer = StylesheetLexer::from_scanner(scanner);
        lexer.scan_tokens();
        lexer.scanner.finish()
    }

    fn scan_tokens(&mut self) {
        while !self.scanner.is_at_end() {
            self.scan_token();
        }
    }

    fn scan_token(&mut self) {
        let c = self.scanner.peek();

        if c.is_whitespace() {
            self.scanner.advance();
            return;
        }
        if self.scanner.starts_with("/*") {
            self.scan_comment();
            return;
        }

        match c {
            '{' => {
                self.scanner.push_fallback(TokenKind::OpenBrace);
                self.depth += 1;
                self.end_statement();
                return;
            }
            '}' => {
                self.scanner.push_fallback(TokenKind::CloseBrace);
                self.depth = self.depth.saturating_sub(1);
                self.end_statement();
                return;
            }
            ';' => {
                self.scanner.push_fallback(TokenKind::Punctuation);
                self.end_statement();
                return;
            }
            _ => {}
        }

        if !self.scanner.detail().is_full() {
            // Structural pass: strings are the only thing that can hide a brace.
            if c == '"' || c == '\'' {
                self.scan_string();
            } else {
                self.scanner.advance();
            }
            return;
        }

        if self.statement_start {
            self.statement_start = false;
            self.context = self.statement_context();
        }

        match c {
            '"' | '\'' => self.scan_string(),
            '(' => self.scanner.push_fallback(TokenKind::OpenParen),
            ')' => self.scanner.push_fallback(TokenKind::CloseParen),
            '[' => {
                self.in_attribute_selector = true;
                self.scanner.push_fallback(TokenKind::OpenBracket);
            }
            ']' => {
                self.in_attribute_selector = false;
                self.scanner.push_fallback(TokenKind::CloseBracket);
            }
            ',' => self.scanner.push_fallback(TokenKind::Punctuation),
            '@' if is_ident_start(self.scanner.peek_next(), self.scanner.peek_at(2)) => {
                let mark = self.scanner.mark();
                self.scanner.advance();
                self.advance_ident();
                self.scanner.push(TokenKind::AtKeyword, mark);
                self.context = Context::AtPrelude;
            }
            _ => match self.context {
                Context::Selector => self.scan_selector(),
                Context::Declaration => self.scan_declaration(),
                Context::Value => self.scan_value(),
                Context::AtPrelude => self.scan_at_prelude(),
            },
        }
    }

    fn end_statement(&mut self) {
        self.statement_start = true;
        self.in_attribute_selector = false;
    }

    /// Decide how the statement starting here should be classified.
    fn statement_context(&self) -> Context {
        if self.depth == 0 || self.opens_block() {
            Context::Selector
        } else {
            Context::Declaration
        }
    }

    /// Whether the first `{`, `;` or `}` ahead (outside strings and
    /// comments) is a `{`.
    fn opens_block(&self) -> bool {
        let mut i = self.scanner.index();
        while i < self.scanner.len() {
            match self.scanner.char_at(i) {
                '{' => return true,
                ';' | '}' => return false,
                quote @ ('"' | '\'') => {
                    i += 1;
                    while i < self.scanner.len() && self.scanner.char_at(i) != quote {
                        if self.scanner.char_at(i) == '\\' {
                            i += 1;
                        }
                        i += 1;
                    }
                }
                '/' if self.scanner.char_at(i + 1) == '*' => {
                    i += 2;
                    while i < self.scanner.len()
                        && !(self.scanner.char_at(i) == '*' && self.scanner.char_at(i + 1) == '/')
                    {
                        i += 1;
                    }
                    i += 1;
                }
                _ => {}
            }
            i += 1;
        }
        false
    }

    // --- Contexts ---

    fn scan_selector(&mut self) {
        let c = self.scanner.peek();
        let next = self.scanner.peek_next();
        let mark = self.scanner.mark();

        match c {
            '.' if is_ident_start(next, self.scanner.peek_at(2)) => {
                self.scanner.advance();
                self.advance_ident();
                self.scanner.push(TokenKind::Selector, mark);
            }
            '#' if is_ident_char(next) => {
                self.scanner.advance();
                self.advance_ident();
                self.scanner.push(TokenKind::Selector, mark);
            }
            ':' => {
                self.scanner.advance();
                if self.scanner.peek() == ':' {
                    self.scanner.advance();
                }
                if is_ident_start(self.scanner.peek(), self.scanner.peek_next()) {
                    self.advance_ident();
                    self.scanner.push(TokenKind::Pseudo, mark);
                } else {
                    self.scanner.push(TokenKind::Punctuation, mark);
                }
            }
            '*' | '&' => self.scanner.push_fallback(TokenKind::Selector),
            '>' | '+' | '~' | '=' | '|' | '^' | '$' => {
                self.scanner.push_fallback(TokenKind::Operator)
            }
            c if c.is_ascii_digit() => self.scan_number(),
            c if is_ident_start(c, next) => {
                self.advance_ident();
                let kind = if self.in_attribute_selector {
                    TokenKind::AttributeName
                } else {
                    TokenKind::Selector
                };
                self.scanner.push(kind, mark);
            }
            _ => self.scanner.push_fallback(TokenKind::Punctuation),
        }
    }

    fn scan_declaration(&mut self) {
        let c = self.scanner.peek();
        let mark = self.scanner.mark();

        if c == '-' && self.scanner.peek_next() == '-' {
            self.advance_ident();
            self.scanner.push(TokenKind::Variable, mark);
        } else if is_ident_start(c, self.scanner.peek_next()) {
            self.advance_ident();
            self.scanner.push(TokenKind::Property, mark);
        } else if c == ':' {
            self.scanner.push_fallback(TokenKind::Punctuation);
            self.context = Context::Value;
        } else {
            self.scanner.push_fallback(TokenKind::Punctuation);
        }
    }

    fn scan_value(&mut self) {
        let c = self.scanner.peek();
        let mark = self.scanner.mark();

        if c == '#' {
            self.scanner.advance();
            let start = self.scanner.index();
            self.scanner.advance_while(|c| c.is_ascii_alphanumeric());
            let len = self.scanner.index() - start;
            let hex = self.scanner.slice_from(mark)[1..]
                .chars()
                .all(|c| c.is_ascii_hexdigit());
            let kind = if hex && matches!(len, 3 | 4 | 6 | 8) {
                TokenKind::Color
            } else {
                TokenKind::Value
            };
            self.scanner.push(kind, mark);
        } else if self.at_number() {
            self.scan_number();
        } else if c == '-' && self.scanner.peek_next() == '-' {
            self.advance_ident();
            self.scanner.push(TokenKind::Variable, mark);
        } else if c == '!' && is_important(self.scanner.rest()) {
            self.scanner.advance();
            self.scanner.skip_whitespace();
            self.scanner.advance_by(9);
            self.scanner.push(TokenKind::Keyword, mark);
        } else if is_ident_start(c, self.scanner.peek_next()) {
            self.advance_ident();
            let kind = if self.scanner.peek() == '(' {
                TokenKind::Function
            } else {
                TokenKind::Value
            };
            self.scanner.push(kind, mark);
        } else if c == ':' {
            self.scanner.push_fallback(TokenKind::Punctuation);
        } else {
            self.scanner.push_fallback(TokenKind::Operator);
        }
    }

    fn scan_at_prelude(&mut self) {
        let c = self.scanner.peek();
        let mark = self.scanner.mark();

        if self.at_number() {
            self.scan_number();
        } else if c == '-' && self.scanner.peek_next() == '-' {
            self.advance_ident();
            self.scanner.push(TokenKind::Variable, mark);
        } else if is_ident_start(c, self.scanner.peek_next()) {
            self.advance_ident();
            let word = self.scanner.slice_from(mark).to_ascii_lowercase();
            let kind = if matches!(word.as_str(), "and" | "not" | "only" | "or") {
                TokenKind::Keyword
            } else if self.scanner.peek() == '(' {
                TokenKind::Function
            } else {
                TokenKind::Value
            };
            self.scanner.push(kind, mark);
        } else if c == ':' {
            self.scanner.push_fallback(TokenKind::Punctuation);
        } else {
            self.scanner.push_fallback(TokenKind::Operator);
        }
    }

    // --- Lexemes ---

    fn scan_comment(&mut self) {
        let mark = self.scanner.mark();
        self.scanner.advance_by(2);
        if self.scanner.advance_past("*/") {
            self.scanner.push(TokenKind::Comment, mark);
        } else {
            self.scanner.push_unterminated(TokenKind::Comment, mark);
        }
    }

    /// Strings may not span lines; an unterminated one stops at the newline.
    fn scan_string(&mut self) {
        let mark = self.scanner.mark();
        let quote = self.scanner.peek();
        self.scanner.advance();

        while !self.scanner.is_at_end() {
            match self.scanner.peek() {
                c if c == quote => {
                    self.scanner.advance();
                    self.scanner.push(TokenKind::String, mark);
                    return;
                }
                '\\' => self.scanner.advance_by(2),
                '\n' => break,
                _ => self.scanner.advance(),
            }
        }
        self.scanner.push_unterminated(TokenKind::String, mark);
    }

    fn at_number(&self) -> bool {
        let c = self.scanner.peek();
        let next = self.scanner.peek_next();
        c.is_ascii_digit()
            || (c == '.' && next.is_ascii_digit())
            || (matches!(c, '+' | '-')
                && (next.is_ascii_digit()
                    || (next == '.' && self.scanner.peek_at(2).is_ascii_digit())))
    }

    /// Number followed by an optional unit, emitted as two tokens.
    fn scan_number(&mut self) {
        let mark = self.scanner.mark();
        if matches!(self.scanner.peek(), '+' | '-') {
            self.scanner.advance();
        }
        self.scanner.advance_while(|c| c.is_ascii_digit());
        if self.scanner.peek() == '.' && self.scanner.peek_next().is_ascii_digit() {
            self.scanner.advance();
            self.scanner.advance_while(|c| c.is_ascii_digit());
        }
        if matches!(self.scanner.peek(), 'e' | 'E')
            && (self.scanner.peek_next().is_ascii_digit()
                || (matches!(self.scanner.peek_next(), '+' | '-')
                    && self.scanner.peek_at(2).is_ascii_digit()))
        {
            self.scanner.advance_by(2);
            self.scanner.advance_while(|c| c.is_ascii_digit());
        }
        self.scanner.push(TokenKind::Number, mark);

        let unit = self.scanner.mark();
        if self.scanner.peek() == '%' {
            self.scanner.advance();
            self.scanner.push(TokenKind::Unit, unit);
        } else if self.scanner.peek().is_alphabetic() {
            self.advance_ident();
            self.scanner.push(TokenKind::Unit, unit);
        }
    }

    fn advance_ident(&mut self) {
        while !self.scanner.is_at_end() {
            match self.scanner.peek() {
                '\\' => self.scanner.advance_by(2),
                c if is_ident_char(c) => self.scanner.advance(),
                _ => break,
            }
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || c == '\\' || (!c.is_ascii() && c != '\0')
}

/// `!important`, with optional whitespace after the `!`.
fn is_important(rest: &str) -> bool {
    rest.strip_prefix('!')
        .map(str::trim_start)
        .and_then(|s| s.get(..9))
        .is_some_and(|word| word.eq_ignore_ascii_case("important"))
}

/// CSS identifiers may start with a letter, `_`, an escape, or a `-`
/// followed by another identifier-start character.
fn is_ident_start(c: char, next: char) -> bool {
    match c {
        '-' => next.is_alphabetic() || next == '-' || next == '_' || next == '\\',
        '_' | '\\' => true,
        c => c.is_alphabetic() || (!c.is_ascii() && c != '\0'),
    }
}
