//! Character navigation shared by the three lexers.
//!
//! Follows the same shape in every lexer:
//! - source decoded once into an indexable `(offset, char)` vector
//! - line/column tracked on every advance
//! - tokens pushed from a [`Mark`] taken at the start of the lexeme

use std::ops::Range;

use crate::token::{Span, Token, TokenKind};
use crate::Detail;

/// Saved scanner position, taken at the start of a lexeme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    index: usize,
    line: usize,
    column: usize,
}

/// Index-based cursor over a (sub)range of a source string.
pub struct Scanner<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    end: usize,
    pos: usize,
    line: usize,
    column: usize,
    detail: Detail,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    /// Create a scanner over the whole source.
    pub fn new(source: &'a str, detail: Detail) -> Self {
        Self::with_range(source, 0..source.len(), 1, 1, detail)
    }

    /// Create a scanner over `range` of `source`, starting at the given
    /// line/column. Token offsets stay absolute.
    pub fn with_range(
        source: &'a str,
        range: Range<usize>,
        line: usize,
        column: usize,
        detail: Detail,
    ) -> Self {
        let chars = source[range.clone()]
            .char_indices()
            .map(|(i, c)| (range.start + i, c))
            .collect();
        Self {
            source,
            chars,
            end: range.end,
            pos: 0,
            line,
            column,
            detail,
            tokens: Vec::new(),
        }
    }

    pub fn detail(&self) -> Detail {
        self.detail
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn finish(self) -> Vec<Token> {
        self.tokens
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    // --- Position ---

    pub fn mark(&self) -> Mark {
        Mark {
            index: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// Byte offset of the current character.
    pub fn offset(&self) -> usize {
        self.offset_at(self.pos)
    }

    pub fn offset_at(&self, index: usize) -> usize {
        self.chars.get(index).map_or(self.end, |&(offset, _)| offset)
    }

    pub fn index(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Byte offset where the scanned range ends.
    pub fn end(&self) -> usize {
        self.end
    }

    // --- Lookahead ---

    pub fn peek(&self) -> char {
        self.peek_at(0)
    }

    pub fn peek_next(&self) -> char {
        self.peek_at(1)
    }

    /// Character `n` positions ahead, or `'\0'` past the end.
    pub fn peek_at(&self, n: usize) -> char {
        self.char_at(self.pos + n)
    }

    pub fn char_at(&self, index: usize) -> char {
        self.chars.get(index).map_or('\0', |&(_, c)| c)
    }

    /// Unscanned remainder of the range.
    pub fn rest(&self) -> &'a str {
        &self.source[self.offset()..self.end]
    }

    pub fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    pub fn starts_with_ignore_case(&self, s: &str) -> bool {
        let rest = self.rest().as_bytes();
        rest.len() >= s.len() && rest[..s.len()].eq_ignore_ascii_case(s.as_bytes())
    }

    /// Text from `mark` up to the current position.
    pub fn slice_from(&self, mark: Mark) -> &'a str {
        &self.source[self.offset_at(mark.index)..self.offset()]
    }

    // --- Movement ---

    pub fn advance(&mut self) {
        if let Some(&(_, c)) = self.chars.get(self.pos) {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    pub fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    /// Advance until the current byte offset reaches `offset` (or the end).
    pub fn advance_to_offset(&mut self, offset: usize) {
        while !self.is_at_end() && self.offset() < offset {
            self.advance();
        }
    }

    /// Advance to the character index `index` (or the end).
    pub fn advance_to_index(&mut self, index: usize) {
        while !self.is_at_end() && self.pos < index {
            self.advance();
        }
    }

    pub fn advance_while(&mut self, mut pred: impl FnMut(char) -> bool) {
        while !self.is_at_end() && pred(self.peek()) {
            self.advance();
        }
    }

    pub fn skip_whitespace(&mut self) {
        self.advance_while(char::is_whitespace);
    }

    /// Advance past the next occurrence of `needle`. Returns `false` (having
    /// consumed everything) when it does not occur.
    pub fn advance_past(&mut self, needle: &str) -> bool {
        match self.rest().find(needle) {
            Some(at) => {
                let target = self.offset() + at + needle.len();
                self.advance_to_offset(target);
                true
            }
            None => {
                self.advance_to_index(self.chars.len());
                false
            }
        }
    }

    /// Index just past the `}` balancing the `{` at `from`, skipping quoted
    /// strings. `None` when the input ends first.
    pub fn find_balanced_brace(&self, from: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut i = from;
        while i < self.chars.len() {
            match self.char_at(i) {
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(i + 1);
                    }
                }
                quote @ ('"' | '\'' | '`') => {
                    i += 1;
                    while i < self.chars.len() && self.char_at(i) != quote {
                        if self.char_at(i) == '\\' {
                            i += 1;
                        }
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        None
    }

    // --- Emission ---

    /// Push the lexeme from `mark` to the current position. In a structural
    /// pass only boundary kinds are kept.
    pub fn push(&mut self, kind: TokenKind, mark: Mark) {
        self.push_token(kind, mark, false);
    }

    pub fn push_unterminated(&mut self, kind: TokenKind, mark: Mark) {
        self.push_token(kind, mark, true);
    }

    fn push_token(&mut self, kind: TokenKind, mark: Mark, unterminated: bool) {
        if !self.detail.is_full() && !kind.is_boundary() {
            return;
        }
        let start = self.offset_at(mark.index);
        let end = self.offset();
        if start == end {
            return;
        }
        let span = Span::new(start, end, mark.line, mark.column);
        let mut token = Token::new(kind, &self.source[start..end], span);
        token.unterminated = unterminated;
        self.tokens.push(token);
    }

    /// Flag the most recent token, if it is the one starting at `mark`.
    pub fn mark_unterminated(&mut self, mark: Mark) {
        let start = self.offset_at(mark.index);
        if let Some(last) = self.tokens.iter_mut().rev().find(|t| t.span.start == start) {
            last.unterminated = true;
        }
    }

    /// Push a single-character fallback token for whatever is under the cursor.
    pub fn push_fallback(&mut self, kind: TokenKind) {
        let mark = self.mark();
        self.advance();
        self.push(kind, mark);
    }
}

/// Identifier characters shared by the script lexer and markup tag names.
pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

pub fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tracks_lines_and_columns() {
        let mut s = Scanner::new("ab\ncd", Detail::Full);
        s.advance_by(3);
        assert_eq!((s.line(), s.column()), (2, 1));
        assert_eq!(s.peek(), 'c');
        assert_eq!(s.offset(), 3);
    }

    #[test]
    fn test_multibyte_offsets() {
        let mut s = Scanner::new("é{", Detail::Full);
        s.advance();
        assert_eq!(s.offset(), 2);
        assert_eq!(s.peek(), '{');
    }

    #[test]
    fn test_range_keeps_absolute_offsets() {
        let source = "<style>a{}</style>";
        let mut s = Scanner::with_range(source, 7..10, 1, 8, Detail::Full);
        assert_eq!(s.offset(), 7);
        s.advance();
        let mark = s.mark();
        s.advance();
        s.push(TokenKind::OpenBrace, mark);
        let tokens = s.finish();
        assert_eq!(tokens[0].span, Span::new(8, 9, 1, 9));
        assert_eq!(tokens[0].text, "{");
    }

    #[test]
    fn test_structure_detail_drops_non_boundary() {
        let mut s = Scanner::new("ab", Detail::Structure);
        s.push_fallback(TokenKind::Identifier);
        assert!(s.tokens().is_empty());
        assert_eq!(s.offset(), 1);
    }

    #[test]
    fn test_advance_past() {
        let mut s = Scanner::new("a -->b", Detail::Full);
        assert!(s.advance_past("-->"));
        assert_eq!(s.peek(), 'b');
        assert!(!s.advance_past("-->"));
        assert!(s.is_at_end());
    }

    #[test]
    fn test_find_balanced_brace_skips_strings() {
        let s = Scanner::new("{a: \"}\", b: {c}} tail", Detail::Full);
        assert_eq!(s.find_balanced_brace(0), Some(16));
        let s = Scanner::new("{ open", Detail::Full);
        assert_eq!(s.find_balanced_brace(0), None);
    }

    #[test]
    fn test_starts_with_ignore_case() {
        let s = Scanner::new("</SCRIPT>", Detail::Full);
        assert!(s.starts_with_ignore_case("</script"));
        assert!(!s.starts_with_ignore_case("</style"));
    }
}
