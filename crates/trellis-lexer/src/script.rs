//! Script lexer.
//!
//! Single pass with local lookahead. Two pieces of context are carried
//! between lexemes:
//! - whether a `/` here would start a regex literal (decided by the
//!   preceding significant lexeme)
//! - whether the previous lexeme was a member access dot
//!
//! A `<` in expression position followed by a tag name opens a JSX region,
//! which is balanced here and handed to the markup lexer.

use std::ops::Range;

use crate::scanner::{is_ident_continue, is_ident_start, Scanner};
use crate::token::{Token, TokenKind};
use crate::{Detail, Language, MarkupLexer};

const KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "export", "extends", "finally", "for", "function", "if",
    "import", "in", "instanceof", "let", "new", "of", "return", "static", "super", "switch",
    "this", "throw", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Keywords after which a `/` starts a regex rather than a division.
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

const LITERALS: &[&str] = &["true", "false", "null", "undefined", "NaN", "Infinity"];

/// Longest first.
const OPERATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "+", "-", "*", "/", "%", "=", "<", ">", "!", "&", "|", "^",
    "~", "?", ":",
];

/// What a template literal scan is inside of.
enum Nest {
    Template,
    Interpolation { braces: usize },
}

/// Script source lexer.
pub struct ScriptLexer<'a> {
    scanner: Scanner<'a>,
    regex_allowed: bool,
    after_dot: bool,
}

impl<'a> ScriptLexer<'a> {
    fn from_scanner(scanner: Scanner<'a>) -> Self {
        Self {
            scanner,
            regex_allowed: true,
            after_dot: false,
        }
    }

    pub fn new(source: &'a str, detail: Detail) -> Self {
        Self::from_scanner(Scanner::new(source, detail))
    }

    /// Tokenize a script.
    pub fn tokenize(source: &str, detail: Detail) -> Vec<Token> {
        let mut lexer = ScriptLexer::new(source, detail);
        lexer.scan_tokens();
        lexer.scanner.finish()
    }

    /// Tokenize `range` of `source` (a `<script>` body).
    pub fn tokenize_range(
        source: &str,
        range: Range<usize>,
        line: usize,
        column: usize,
        detail: Detail,
    ) -> Vec<Token> {
        let scanner = Scanner::with_range(source, range, line, column, detail);
        let mut lexer = ScriptLexer::from_scanner(scanner);
        lexer.scan_tokens();
        lexer.scanner.finish()
    }

    fn scan_tokens(&mut self) {
        if self.scanner.starts_with("#!") && self.scanner.offset() == 0 {
            let mark = self.scanner.mark();
            self.scanner.advance_while(|c| c != '\n');
            self.scanner.push(TokenKind::Comment, mark);
        }
        while !self.scanner.is_at_end() {
            self.scan_token();
        }
    }

    fn scan_token(&mut self) {
        let c = self.scanner.peek();
        let next = self.scanner.peek_next();

        if c.is_whitespace() {
            self.scanner.advance();
            return;
        }
        if c == '/' && next == '/' {
            let mark = self.scanner.mark();
            self.scanner.advance_while(|c| c != '\n');
            self.scanner.push(TokenKind::Comment, mark);
            return;
        }
        if c == '/' && next == '*' {
            let mark = self.scanner.mark();
            self.scanner.advance_by(2);
            if self.scanner.advance_past("*/") {
                self.scanner.push(TokenKind::Comment, mark);
            } else {
                self.scanner.push_unterminated(TokenKind::Comment, mark);
            }
            return;
        }

        let after_dot = std::mem::take(&mut self.after_dot);

        match c {
            '"' | '\'' => {
                let mark = self.scanner.mark();
                if self.skip_string() {
                    self.scanner.push(TokenKind::String, mark);
                } else {
                    self.scanner.push_unterminated(TokenKind::String, mark);
                }
                self.regex_allowed = false;
            }
            '`' => {
                let mark = self.scanner.mark();
                if self.skip_template() {
                    self.scanner.push(TokenKind::Template, mark);
                } else {
                    self.scanner.push_unterminated(TokenKind::Template, mark);
                }
                self.regex_allowed = false;
            }
            '/' if self.regex_allowed && self.scan_regex() => {}
            '<' if self.regex_allowed && (next.is_alphabetic() || next == '>') => self.scan_jsx(),
            '{' => self.delimiter(TokenKind::OpenBrace, true),
            '}' => self.delimiter(TokenKind::CloseBrace, true),
            '(' => self.delimiter(TokenKind::OpenParen, true),
            ')' => self.delimiter(TokenKind::CloseParen, false),
            '[' => self.delimiter(TokenKind::OpenBracket, true),
            ']' => self.delimiter(TokenKind::CloseBracket, false),
            ';' | ',' => self.delimiter(TokenKind::Punctuation, true),
            '.' if next.is_ascii_digit() => self.scan_number(),
            '.' if next != '.' => {
                self.scanner.push_fallback(TokenKind::Punctuation);
                self.after_dot = true;
            }
            c if c.is_ascii_digit() => self.scan_number(),
            c if is_ident_start(c) || c == '\\' => self.scan_word(after_dot),
            '#' if is_ident_start(next) => {
                let mark = self.scanner.mark();
                self.scanner.advance();
                self.advance_ident();
                self.scanner.push(TokenKind::Identifier, mark);
                self.regex_allowed = false;
            }
            _ => self.scan_operator(),
        }
    }

    fn delimiter(&mut self, kind: TokenKind, regex_after: bool) {
        self.scanner.push_fallback(kind);
        self.regex_allowed = regex_after;
    }

    fn scan_operator(&mut self) {
        let rest = self.scanner.rest();
        match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            Some(op) => {
                let mark = self.scanner.mark();
                self.scanner.advance_by(op.len());
                self.scanner.push(TokenKind::Operator, mark);
                self.after_dot = *op == "?.";
            }
            None => self.scanner.push_fallback(TokenKind::Punctuation),
        }
        self.regex_allowed = true;
    }

    fn scan_word(&mut self, after_dot: bool) {
        let mark = self.scanner.mark();
        self.advance_ident();
        let word = self.scanner.slice_from(mark);
        let calls = self.scanner.peek() == '(';

        let kind = if after_dot {
            if calls {
                TokenKind::Function
            } else {
                TokenKind::Property
            }
        } else if KEYWORDS.contains(&word) {
            TokenKind::Keyword
        } else if LITERALS.contains(&word) {
            TokenKind::Literal
        } else if calls {
            TokenKind::Function
        } else {
            TokenKind::Identifier
        };

        self.regex_allowed = !after_dot && REGEX_KEYWORDS.contains(&word);
        self.scanner.push(kind, mark);
    }

    fn advance_ident(&mut self) {
        while !self.scanner.is_at_end() {
            match self.scanner.peek() {
                '\\' => self.scanner.advance_by(2),
                c if is_ident_continue(c) => self.scanner.advance(),
                _ => break,
            }
        }
    }

    fn scan_number(&mut self) {
        let mark = self.scanner.mark();
        let digit_or_sep = |c: char| c.is_ascii_digit() || c == '_';

        if self.scanner.peek() == '0'
            && matches!(self.scanner.peek_next(), 'x' | 'X' | 'o' | 'O' | 'b' | 'B')
        {
            self.scanner.advance_by(2);
            self.scanner
                .advance_while(|c| c.is_ascii_hexdigit() || c == '_');
        } else {
            self.scanner.advance_while(digit_or_sep);
            if self.scanner.peek() == '.' && self.scanner.peek_next() != '.' {
                self.scanner.advance();
                self.scanner.advance_while(digit_or_sep);
            }
            let next = self.scanner.peek_next();
            if matches!(self.scanner.peek(), 'e' | 'E')
                && (next.is_ascii_digit()
                    || (matches!(next, '+' | '-') && self.scanner.peek_at(2).is_ascii_digit()))
            {
                self.scanner.advance_by(2);
                self.scanner.advance_while(digit_or_sep);
            }
        }
        if self.scanner.peek() == 'n' {
            self.scanner.advance();
        }

        self.scanner.push(TokenKind::Number, mark);
        self.regex_allowed = false;
    }

    /// Cursor on the opening quote. Returns `false` when the string runs
    /// into a newline or end of input.
    fn skip_string(&mut self) -> bool {
        let quote = self.scanner.peek();
        self.scanner.advance();
        while !self.scanner.is_at_end() {
            match self.scanner.peek() {
                c if c == quote => {
                    self.scanner.advance();
                    return true;
                }
                '\\' => self.scanner.advance_by(2),
                '\n' => return false,
                _ => self.scanner.advance(),
            }
        }
        false
    }

    /// Cursor on the opening backtick. Follows `${…}` interpolations,
    /// including nested templates and strings inside them.
    fn skip_template(&mut self) -> bool {
        let mut stack = vec![Nest::Template];
        self.scanner.advance();
        loop {
            let Some(top) = stack.last_mut() else {
                return true;
            };
            if self.scanner.is_at_end() {
                return false;
            }
            let next = self.scanner.peek_next();
            match (top, self.scanner.peek()) {
                (Nest::Template, '\\') => self.scanner.advance_by(2),
                (Nest::Template, '`') => {
                    self.scanner.advance();
                    stack.pop();
                }
                (Nest::Template, '$') if next == '{' => {
                    self.scanner.advance_by(2);
                    stack.push(Nest::Interpolation { braces: 1 });
                }
                (Nest::Template, _) => self.scanner.advance(),
                (Nest::Interpolation { braces }, '{') => {
                    *braces += 1;
                    self.scanner.advance();
                }
                (Nest::Interpolation { braces }, '}') => {
                    *braces -= 1;
                    self.scanner.advance();
                    if *braces == 0 {
                        stack.pop();
                    }
                }
                (Nest::Interpolation { .. }, '`') => {
                    self.scanner.advance();
                    stack.push(Nest::Template);
                }
                (Nest::Interpolation { .. }, '"' | '\'') => {
                    self.skip_string();
                }
                (Nest::Interpolation { .. }, '/') if next == '/' => {
                    self.scanner.advance_while(|c| c != '\n');
                }
                (Nest::Interpolation { .. }, '/') if next == '*' => {
                    self.scanner.advance_by(2);
                    if !self.scanner.advance_past("*/") {
                        return false;
                    }
                }
                (Nest::Interpolation { .. }, _) => self.scanner.advance(),
            }
        }
    }

    /// Try to scan a regex literal at the cursor. A candidate that reaches a
    /// newline before its closing `/` is not a regex; nothing is consumed.
    fn scan_regex(&mut self) -> bool {
        let len = self.scanner.len();
        let mut i = self.scanner.index() + 1;
        let mut in_class = false;

        loop {
            if i >= len {
                return false;
            }
            match self.scanner.char_at(i) {
                '\n' => return false,
                '\\' => i += 1,
                '[' => in_class = true,
                ']' => in_class = false,
                '/' if !in_class => break,
                _ => {}
            }
            i += 1;
        }
        i += 1;
        while i < len && is_ident_continue(self.scanner.char_at(i)) {
            i += 1;
        }

        let mark = self.scanner.mark();
        self.scanner.advance_to_index(i);
        self.scanner.push(TokenKind::Regex, mark);
        self.regex_allowed = false;
        true
    }

    fn scan_jsx(&mut self) {
        let (end, terminated) = self.jsx_extent(self.scanner.index());
        let range = self.scanner.offset()..self.scanner.offset_at(end);
        let tokens = MarkupLexer::tokenize_jsx(
            self.scanner.source(),
            range,
            self.scanner.line(),
            self.scanner.column(),
            self.scanner.detail(),
        );

        let mark = self.scanner.mark();
        self.scanner.advance_to_index(end);
        let kind = TokenKind::Embedded {
            language: Language::Markup,
            tokens,
        };
        if terminated {
            self.scanner.push(kind, mark);
        } else {
            self.scanner.push_unterminated(kind, mark);
        }
        self.regex_allowed = false;
    }

    /// Character index just past the JSX region starting at `from`, found by
    /// balancing opening and closing tags. `{…}` expressions and quoted
    /// attribute values are skipped whole.
    fn jsx_extent(&self, from: usize) -> (usize, bool) {
        let s = &self.scanner;
        let len = s.len();
        let mut depth = 0usize;
        let mut i = from;

        while i < len {
            let c = s.char_at(i);
            let next = s.char_at(i + 1);

            if c == '<' && next == '/' {
                while i < len && s.char_at(i) != '>' {
                    i += 1;
                }
                if i >= len {
                    return (len, false);
                }
                i += 1;
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return (i, true);
                }
            } else if c == '<' && (next.is_alphabetic() || next == '>') {
                i += 1;
                loop {
                    if i >= len {
                        return (len, false);
                    }
                    match s.char_at(i) {
                        '>' => break,
                        '{' => match s.find_balanced_brace(i) {
                            Some(end) => i = end,
                            None => return (len, false),
                        },
                        quote @ ('"' | '\'') => {
                            i += 1;
                            while i < len && s.char_at(i) != quote {
                                i += 1;
                            }
                            i += 1;
                        }
                        _ => i += 1,
                    }
                }
                let self_closing = s.char_at(i - 1) == '/';
                i += 1;
                if !self_closing {
                    depth += 1;
                } else if depth == 0 {
                    return (i, true);
                }
            } else if c == '{' {
                match s.find_balanced_brace(i) {
                    Some(end) => i = end,
                    None => return (len, false),
                }
            } else {
                i += 1;
            }
        }
        (len, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classified(source: &str) -> Vec<(TokenKind, String)> {
        ScriptLexer::tokenize(source, Detail::Full)
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        classified(source).into_iter().map(|(k, _)| k).collect()
    }

    // =========================================================================
    // Words and literals
    // =========================================================================

    #[test]
    fn test_keywords_identifiers_literals() {
        assert_eq!(
            classified("const x = null"),
            vec![
                (TokenKind::Keyword, "const".into()),
                (TokenKind::Identifier, "x".into()),
                (TokenKind::Operator, "=".into()),
                (TokenKind::Literal, "null".into()),
            ]
        );
    }

    #[test]
    fn test_functions_and_properties() {
        assert_eq!(
            kinds("console.log(a.b)"),
            vec![
                TokenKind::Identifier,
                TokenKind::Punctuation,
                TokenKind::Function,
                TokenKind::OpenParen,
                TokenKind::Identifier,
                TokenKind::Punctuation,
                TokenKind::Property,
                TokenKind::CloseParen,
            ]
        );
    }

    #[test]
    fn test_keyword_after_dot_is_property() {
        assert_eq!(kinds("a?.default")[2], TokenKind::Property);
    }

    #[test]
    fn test_numbers() {
        for source in ["42", "3.14", ".5", "1e-7", "0xFF", "0b1010", "1_000n"] {
            let tokens = classified(source);
            assert_eq!(tokens, vec![(TokenKind::Number, source.to_string())], "{source}");
        }
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            classified("a >>>= b === c"),
            vec![
                (TokenKind::Identifier, "a".into()),
                (TokenKind::Operator, ">>>=".into()),
                (TokenKind::Identifier, "b".into()),
                (TokenKind::Operator, "===".into()),
                (TokenKind::Identifier, "c".into()),
            ]
        );
    }

    // =========================================================================
    // Strings, templates, comments
    // =========================================================================

    #[test]
    fn test_strings_with_escapes() {
        assert_eq!(
            classified(r#"'it\'s' "a""#),
            vec![
                (TokenKind::String, r"'it\'s'".into()),
                (TokenKind::String, "\"a\"".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string_stops_at_newline() {
        let tokens = ScriptLexer::tokenize("'abc\nx", Detail::Full);
        assert!(tokens[0].unterminated);
        assert_eq!(tokens[0].text, "'abc");
        assert_eq!(tokens[1].text, "x");
    }

    #[test]
    fn test_template_with_nested_interpolation() {
        let source = "`a ${ {b: `c ${d}`}['b'] } }` + 1";
        let tokens = classified(source);
        assert_eq!(tokens[0], (TokenKind::Template, "`a ${ {b: `c ${d}`}['b'] } }`".into()));
        assert_eq!(tokens[1].0, TokenKind::Operator);
    }

    #[test]
    fn test_template_hides_braces_from_structure() {
        let tokens = ScriptLexer::tokenize("`${ '}' }` {}", Detail::Structure);
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::OpenBrace, TokenKind::CloseBrace]);
    }

    #[test]
    fn test_unterminated_template() {
        let tokens = ScriptLexer::tokenize("`abc ${x", Detail::Full);
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].unterminated);
    }

    #[test]
    fn test_deeply_nested_templates() {
        let depth = 50_000;
        let source = format!("{}{}", "`${".repeat(depth), "}`".repeat(depth));
        let tokens = ScriptLexer::tokenize(&source, Detail::Full);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Template);
        assert!(!tokens[0].unterminated);
    }

    #[test]
    fn test_comments() {
        let tokens = ScriptLexer::tokenize("// a {\n/* b } */ c", Detail::Structure);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "// a {");
        assert_eq!(tokens[1].text, "/* b } */");
    }

    #[test]
    fn test_hashbang() {
        assert_eq!(kinds("#!/usr/bin/env node\nx")[0], TokenKind::Comment);
    }

    // =========================================================================
    // Regex vs division
    // =========================================================================

    #[test]
    fn test_regex_after_operator() {
        let tokens = classified("x = /a[/]b/gi.test(s)");
        assert_eq!(tokens[2], (TokenKind::Regex, "/a[/]b/gi".into()));
    }

    #[test]
    fn test_division_after_identifier() {
        assert_eq!(
            kinds("a / b / c"),
            vec![
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn test_regex_after_return() {
        assert_eq!(kinds("return /x/")[1], TokenKind::Regex);
    }

    #[test]
    fn test_division_after_close_paren() {
        assert_eq!(kinds("(a) / 2 / 1")[3], TokenKind::Operator);
    }

    #[test]
    fn test_regex_candidate_across_newline_is_division() {
        assert_eq!(kinds("= /a\nb/")[1], TokenKind::Operator);
    }

    #[test]
    fn test_regex_hides_braces() {
        let tokens = ScriptLexer::tokenize("f(/}/)", Detail::Structure);
        assert_eq!(tokens.len(), 2);
    }

    // =========================================================================
    // JSX
    // =========================================================================

    #[test]
    fn test_jsx_region() {
        let source = "return <div className={a > b ? 'x' : 'y'}>\n  <App/>\n</div>;";
        let tokens = ScriptLexer::tokenize(source, Detail::Structure);
        match &tokens[0].kind {
            TokenKind::Embedded { language, tokens } => {
                assert_eq!(*language, Language::Markup);
                assert!(tokens.iter().any(|t| t.kind
                    == TokenKind::TagClose {
                        name: "div".into()
                    }));
            }
            other => panic!("Expected embedded JSX, got {other:?}"),
        }
        assert!(tokens[0].text.ends_with("</div>"));
        assert!(!tokens[0].unterminated);
    }

    #[test]
    fn test_jsx_self_closing_and_fragment() {
        let tokens = ScriptLexer::tokenize("f(<A/>, <><b>{x}</b></>)", Detail::Full);
        let regions: Vec<_> = tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::Embedded { .. }))
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(regions, vec!["<A/>", "<><b>{x}</b></>"]);
    }

    #[test]
    fn test_less_than_is_not_jsx_after_identifier() {
        assert_eq!(kinds("a <b")[1], TokenKind::Operator);
    }

    #[test]
    fn test_unterminated_jsx_runs_to_end() {
        let tokens = ScriptLexer::tokenize("x = <div>\n{a}", Detail::Full);
        assert!(tokens.last().unwrap().unterminated);
    }
}
