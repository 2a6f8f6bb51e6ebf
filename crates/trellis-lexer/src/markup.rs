//! Markup lexer.
//!
//! Emits tags as `TagOpen` / attribute tokens / `TagEnd` so the grammar can
//! pair elements without re-scanning. Quoted attribute values may contain
//! `>`. `<script>` and `<style>` bodies are handed to the sibling lexer and
//! wrapped in a single `Embedded` token.

use std::ops::Range;

use crate::scanner::Scanner;
use crate::token::{Token, TokenKind};
use crate::{Detail, Language, ScriptLexer, StylesheetLexer};

/// Markup source lexer.
pub struct MarkupLexer<'a> {
    scanner: Scanner<'a>,
    /// Lexing a JSX region from inside script: `{…}` attribute values and
    /// child expressions are balanced, and raw-text elements are ordinary
    /// elements.
    jsx: bool,
}

impl<'a> MarkupLexer<'a> {
    pub fn new(source: &'a str, detail: Detail) -> Self {
        Self {
            scanner: Scanner::new(source, detail),
            jsx: false,
        }
    }

    /// Tokenize a markup document.
    pub fn tokenize(source: &str, detail: Detail) -> Vec<Token> {
        let mut lexer = MarkupLexer::new(source, detail);
        lexer.scan_tokens();
        lexer.scanner.finish()
    }

    /// Tokenize a JSX region `range` of a script source.
    pub fn tokenize_jsx(
        source: &str,
        range: Range<usize>,
        line: usize,
        column: usize,
        detail: Detail,
    ) -> Vec<Token> {
        let mut lexer = MarkupLexer {
            scanner: Scanner::with_range(source, range, line, column, detail),
            jsx: true,
        };
        lexer.scan_tokens();
        lexer.scanner.finish()
    }

    fn scan_tokens(&mut self) {
        while !self.scanner.is_at_end() {
            self.scan_token();
        }
    }

    fn scan_token(&mut self) {
        match self.scanner.peek() {
            c if c.is_whitespace() => self.scanner.advance(),
            '<' => self.scan_angle(),
            '&' => self.scan_entity(),
            '{' if self.jsx => self.scan_child_expression(),
            _ => self.scan_text(),
        }
    }

    /// Dispatch on what follows a `<`.
    fn scan_angle(&mut self) {
        let next = self.scanner.peek_next();
        if self.scanner.starts_with("<!--") {
            self.scan_until(TokenKind::Comment, 4, "-->");
        } else if self.scanner.starts_with_ignore_case("<![cdata[") {
            self.scan_until(TokenKind::Directive, 9, "]]>");
        } else if next == '!' || next == '?' {
            self.scan_until(TokenKind::Directive, 2, ">");
        } else if next == '/' && self.opens_tag(self.scanner.peek_at(2)) {
            self.scan_closing_tag();
        } else if self.opens_tag(next) {
            self.scan_opening_tag();
        } else {
            self.scanner.push_fallback(TokenKind::Text);
        }
    }

    fn opens_tag(&self, c: char) -> bool {
        c.is_ascii_alphabetic() || (self.jsx && c == '>')
    }

    /// Consume `skip` characters of opener, then everything through
    /// `terminator` (or to end of input).
    fn scan_until(&mut self, kind: TokenKind, skip: usize, terminator: &str) {
        let mark = self.scanner.mark();
        self.scanner.advance_by(skip);
        if self.scanner.advance_past(terminator) {
            self.scanner.push(kind, mark);
        } else {
            self.scanner.push_unterminated(kind, mark);
        }
    }

    fn read_tag_name(&mut self) -> String {
        let mark = self.scanner.mark();
        self.scanner.advance_while(is_tag_name_char);
        self.scanner.slice_from(mark).to_ascii_lowercase()
    }

    fn scan_opening_tag(&mut self) {
        let mark = self.scanner.mark();
        self.scanner.advance(); // consume `<`
        let name = self.read_tag_name();
        self.scanner
            .push(TokenKind::TagOpen { name: name.clone() }, mark);

        match self.scan_attributes() {
            Some(false) if !self.jsx => {
                if let Some(language) = raw_text_language(&name) {
                    self.scan_raw_text(&name, language);
                }
            }
            Some(_) => {}
            None => self.scanner.mark_unterminated(mark),
        }
    }

    /// Scan the attribute region of an opening tag. Returns whether the tag
    /// self-closed, or `None` when it never reached `>`.
    fn scan_attributes(&mut self) -> Option<bool> {
        let mut expect_value = false;

        loop {
            self.scanner.skip_whitespace();
            if self.scanner.is_at_end() {
                return None;
            }

            let mark = self.scanner.mark();
            let start = self.scanner.offset();
            match self.scanner.peek() {
                '>' => {
                    self.scanner.advance();
                    self.scanner
                        .push(TokenKind::TagEnd { self_closing: false }, mark);
                    return Some(false);
                }
                '/' if self.scanner.peek_next() == '>' => {
                    self.scanner.advance_by(2);
                    self.scanner
                        .push(TokenKind::TagEnd { self_closing: true }, mark);
                    return Some(true);
                }
                // Next plausible boundary: a new tag starts before this one closed.
                '<' if !self.jsx => return None,
                '"' | '\'' => {
                    self.scan_quoted_value();
                    expect_value = false;
                }
                '{' if self.jsx => {
                    self.scan_braced_value();
                    expect_value = false;
                }
                '=' => {
                    self.scanner.advance();
                    self.scanner.push(TokenKind::Operator, mark);
                    expect_value = true;
                }
                _ if expect_value => {
                    self.scanner
                        .advance_while(|c| !c.is_whitespace() && c != '>');
                    self.scanner.push(TokenKind::AttributeValue, mark);
                    expect_value = false;
                }
                _ => {
                    self.scanner.advance_while(|c| {
                        !c.is_whitespace()
                            && !matches!(c, '=' | '>' | '/' | '"' | '\'' | '<' | '{')
                    });
                    if self.scanner.offset() == start {
                        self.scanner.push_fallback(TokenKind::Punctuation);
                    } else {
                        self.scanner.push(TokenKind::AttributeName, mark);
                    }
                }
            }
        }
    }

    /// A quoted value runs to its closing quote, wherever that is. Without
    /// one, it stops at the end of the line.
    fn scan_quoted_value(&mut self) {
        let mark = self.scanner.mark();
        let quote = self.scanner.peek();
        self.scanner.advance();
        let rest = self.scanner.rest();
        match rest.find(quote) {
            Some(at) => {
                let target = self.scanner.offset() + at + 1;
                self.scanner.advance_to_offset(target);
                self.scanner.push(TokenKind::AttributeValue, mark);
            }
            None => {
                self.scanner.advance_while(|c| c != '\n');
                self.scanner
                    .push_unterminated(TokenKind::AttributeValue, mark);
            }
        }
    }

    fn scan_braced_value(&mut self) {
        let mark = self.scanner.mark();
        match self.scanner.find_balanced_brace(self.scanner.index()) {
            Some(end) => {
                self.scanner.advance_to_index(end);
                self.scanner.push(TokenKind::AttributeValue, mark);
            }
            None => {
                self.scanner.advance_to_index(self.scanner.len());
                self.scanner
                    .push_unterminated(TokenKind::AttributeValue, mark);
            }
        }
    }

    /// Body of a `<script>`/`<style>` element, up to its closing tag.
    fn scan_raw_text(&mut self, name: &str, language: Language) {
        let body_start = self.scanner.offset();
        let closer = format!("</{name}");
        let found = find_ignore_ascii_case(self.scanner.rest(), &closer);
        let body_end = found.map_or(self.scanner.end(), |at| body_start + at);
        if body_end == body_start {
            return;
        }

        let source = self.scanner.source();
        let range = body_start..body_end;
        let (line, column) = (self.scanner.line(), self.scanner.column());
        let detail = self.scanner.detail();
        let tokens = match language {
            Language::Script => ScriptLexer::tokenize_range(source, range, line, column, detail),
            Language::Stylesheet => {
                StylesheetLexer::tokenize_range(source, range, line, column, detail)
            }
            Language::Markup => MarkupLexer::tokenize_jsx(source, range, line, column, detail),
        };

        let mark = self.scanner.mark();
        self.scanner.advance_to_offset(body_end);
        let kind = TokenKind::Embedded { language, tokens };
        if found.is_some() {
            self.scanner.push(kind, mark);
        } else {
            self.scanner.push_unterminated(kind, mark);
        }
    }

    fn scan_closing_tag(&mut self) {
        let mark = self.scanner.mark();
        self.scanner.advance_by(2); // consume `</`
        let name = self.read_tag_name();
        self.scanner.push(TokenKind::TagClose { name }, mark);

        self.scanner.skip_whitespace();
        if self.scanner.peek() != '>' {
            let junk = self.scanner.mark();
            self.scanner.advance_while(|c| c != '>' && c != '<');
            self.scanner.push(TokenKind::Text, junk);
        }
        if self.scanner.peek() == '>' {
            let end = self.scanner.mark();
            self.scanner.advance();
            self.scanner
                .push(TokenKind::TagEnd { self_closing: false }, end);
        } else {
            self.scanner.mark_unterminated(mark);
        }
    }

    fn scan_entity(&mut self) {
        match entity_len(self.scanner.rest()) {
            Some(len) => {
                let mark = self.scanner.mark();
                let target = self.scanner.offset() + len;
                self.scanner.advance_to_offset(target);
                self.scanner.push(TokenKind::Entity, mark);
            }
            None => self.scanner.push_fallback(TokenKind::Text),
        }
    }

    /// `{expression}` between JSX children. One text token, so a `<` inside
    /// never opens a tag.
    fn scan_child_expression(&mut self) {
        let mark = self.scanner.mark();
        match self.scanner.find_balanced_brace(self.scanner.index()) {
            Some(end) => {
                self.scanner.advance_to_index(end);
                self.scanner.push(TokenKind::Text, mark);
            }
            None => {
                self.scanner.advance_to_index(self.scanner.len());
                self.scanner.push_unterminated(TokenKind::Text, mark);
            }
        }
    }

    fn scan_text(&mut self) {
        let mark = self.scanner.mark();
        let jsx = self.jsx;
        self.scanner.advance_while(|c| {
            !c.is_whitespace() && c != '<' && c != '&' && !(jsx && c == '{')
        });
        self.scanner.push(TokenKind::Text, mark);
    }
}

/// Byte offset of the first ASCII-case-insensitive occurrence of `needle`.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

fn is_tag_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | ':' | '.' | '_')
}

/// Elements whose body belongs to another language.
fn raw_text_language(name: &str) -> Option<Language> {
    match name {
        "script" => Some(Language::Script),
        "style" => Some(Language::Stylesheet),
        _ => None,
    }
}

/// Byte length of a character reference at the start of `s`
/// (`&amp;`, `&#38;`, `&#x26;`), if there is one.
fn entity_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 1;
    let digits: fn(&u8) -> bool = match (bytes.get(1).copied(), bytes.get(2).copied()) {
        (Some(b'#'), Some(b'x' | b'X')) => {
            i = 3;
            u8::is_ascii_hexdigit
        }
        (Some(b'#'), _) => {
            i = 2;
            u8::is_ascii_digit
        }
        (Some(c), _) if c.is_ascii_alphabetic() => u8::is_ascii_alphanumeric,
        _ => return None,
    };
    let body_start = i;
    while bytes.get(i).is_some_and(digits) {
        i += 1;
    }
    (i > body_start && bytes.get(i) == Some(&b';')).then_some(i + 1)
}
