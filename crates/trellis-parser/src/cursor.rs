//! Token cursor and backtracking combinators.
//!
//! Grammar rules are plain functions `fn(&mut Cursor) -> Option<T>`. A rule
//! that returns `None` has failed; when it ran through [`Cursor::attempt`],
//! [`Cursor::apply`], [`Cursor::one_of`] or [`Cursor::optional`] the cursor
//! position, the error list and the open-delimiter stack are restored to
//! where they were before the rule started.

use std::cell::OnceCell;

use trellis_lexer::{Detail, Span, Token, TokenKind};

use crate::ParseError;

/// A delimiter waiting for its closing token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Closer {
    Brace,
    Paren,
    Bracket,
    /// Lowercased tag name.
    Tag(String),
}

impl Closer {
    /// The closer a closing token would satisfy.
    pub fn of(kind: &TokenKind) -> Option<Closer> {
        match kind {
            TokenKind::CloseBrace => Some(Closer::Brace),
            TokenKind::CloseParen => Some(Closer::Paren),
            TokenKind::CloseBracket => Some(Closer::Bracket),
            TokenKind::TagClose { name } => Some(Closer::Tag(name.clone())),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Closer::Brace => "'}'".into(),
            Closer::Paren => "')'".into(),
            Closer::Bracket => "']'".into(),
            Closer::Tag(name) => format!("</{name}>"),
        }
    }
}

/// Open delimiters a parse may nest, embedded regions included. Past this
/// an opener is left to the caller as filler.
pub const MAX_DEPTH: usize = 256;

/// A named grammar rule.
pub struct Rule<'t, T> {
    pub name: &'static str,
    pub run: fn(&mut Cursor<'t>) -> Option<T>,
}

impl<'t, T> Rule<'t, T> {
    pub const fn new(name: &'static str, run: fn(&mut Cursor<'t>) -> Option<T>) -> Self {
        Self { name, run }
    }
}

struct Snapshot {
    pos: usize,
    errors: usize,
    open: Vec<Closer>,
}

/// Cursor over an immutable token slice.
pub struct Cursor<'t> {
    tokens: &'t [Token],
    /// The whole source; token spans index into it.
    source: &'t str,
    pos: usize,
    detail: Detail,
    end_of_input: usize,
    /// Delimiters already open around this token slice.
    outer_depth: usize,
    errors: Vec<ParseError>,
    open: Vec<Closer>,
    /// Index of each bracket's partner, computed on first lookahead.
    partners: OnceCell<Vec<Option<usize>>>,
}

impl<'t> Cursor<'t> {
    /// `end_of_input` is the offset where nodes left open at the end close.
    pub fn new(
        tokens: &'t [Token],
        source: &'t str,
        detail: Detail,
        end_of_input: usize,
    ) -> Self {
        Self {
            tokens,
            source,
            pos: 0,
            detail,
            end_of_input,
            outer_depth: 0,
            errors: Vec::new(),
            open: Vec::new(),
            partners: OnceCell::new(),
        }
    }

    /// A cursor over the tokens of an embedded region, nested as deep as
    /// this one currently is.
    pub fn nested(&self, tokens: &'t [Token], end_of_input: usize) -> Cursor<'t> {
        Cursor {
            outer_depth: self.depth(),
            ..Cursor::new(tokens, self.source, self.detail, end_of_input)
        }
    }

    pub fn detail(&self) -> Detail {
        self.detail
    }

    pub fn is_full(&self) -> bool {
        self.detail.is_full()
    }

    pub fn end_of_input(&self) -> usize {
        self.end_of_input
    }

    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn peek(&self, offset: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + offset)
    }

    pub fn peek_kind(&self, offset: usize) -> Option<&'t TokenKind> {
        self.peek(offset).map(|t| &t.kind)
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Whether the current token satisfies `pred`.
    pub fn check(&self, pred: impl Fn(&TokenKind) -> bool) -> bool {
        self.peek_kind(0).is_some_and(pred)
    }

    /// Position, relative to the cursor, of the token that closes the
    /// delimiter at `offset`. `None` when a closer of an enclosing group or
    /// the end of input comes first. Lookahead only; nothing is consumed.
    pub fn matching_close(&self, offset: usize) -> Option<usize> {
        let at = self.pos + offset;
        let partner = self
            .partners
            .get_or_init(|| pair_brackets(self.tokens))
            .get(at)
            .copied()
            .flatten()?;
        Some(partner - self.pos)
    }

    /// End offset of the most recently consumed token.
    pub fn previous_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.span.end)
    }

    /// Span of the current token, or an empty span at end of input.
    pub fn current_span(&self) -> Span {
        match self.peek(0) {
            Some(token) => token.span,
            None => {
                let (line, column) = self
                    .tokens
                    .last()
                    .map_or((1, 1), |t| (t.span.line, t.span.column));
                Span::new(self.end_of_input, self.end_of_input, line, column)
            }
        }
    }

    /// Where a node cut short by the current token ends: just past the last
    /// non-whitespace character before it, at either detail level.
    pub fn cut_end(&self) -> usize {
        let start = self.current_span().start;
        self.source
            .get(..start)
            .map_or(start, |before| before.trim_end().len())
    }

    // =========================================================================
    // Consumption
    // =========================================================================

    /// Consume the current token. Unterminated tokens are reported here so
    /// a backtracked rule takes its report with it.
    pub fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        if token.unterminated {
            if let Some(message) = unterminated_message(&token.kind) {
                self.error(message, token.span);
            }
        }
        Some(token)
    }

    /// Consume and return the current token if it satisfies `pred`.
    pub fn match_kind(&mut self, pred: impl Fn(&TokenKind) -> bool) -> Option<&'t Token> {
        if self.check(pred) {
            self.next()
        } else {
            None
        }
    }

    /// Consume the current token if it has exactly `kind` and `text`.
    pub fn match_text(&mut self, kind: &TokenKind, text: &str) -> Option<&'t Token> {
        match self.peek(0) {
            Some(token) if token.kind == *kind && token.text == text => self.next(),
            _ => None,
        }
    }

    pub fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(ParseError::new(message, span));
    }

    /// Adopt the errors of a nested parse.
    pub fn extend_errors(&mut self, errors: impl IntoIterator<Item = ParseError>) {
        self.errors.extend(errors);
    }

    // =========================================================================
    // Open delimiters
    // =========================================================================

    pub fn open(&mut self, closer: Closer) {
        self.open.push(closer);
    }

    pub fn close(&mut self) {
        self.open.pop();
    }

    /// Whether `closer` would close some enclosing delimiter.
    pub fn is_open(&self, closer: &Closer) -> bool {
        self.open.contains(closer)
    }

    /// Delimiters open around the cursor, counting enclosing regions.
    pub fn depth(&self) -> usize {
        self.outer_depth + self.open.len()
    }

    /// Whether opening one more delimiter would nest past [`MAX_DEPTH`].
    /// Reported at `opener`, once per run of such openers.
    pub fn too_deep(&mut self, opener: Span) -> bool {
        if self.depth() < MAX_DEPTH {
            return false;
        }
        if self.errors.last().map(|e| e.message.as_str()) != Some(TOO_DEEP) {
            self.error(TOO_DEEP, opener);
        }
        true
    }

    // =========================================================================
    // Backtracking
    // =========================================================================

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            pos: self.pos,
            errors: self.errors.len(),
            open: self.open.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.pos = snapshot.pos;
        self.errors.truncate(snapshot.errors);
        self.open = snapshot.open;
    }

    /// Run `rule`; on failure put everything back.
    pub fn attempt<T>(&mut self, rule: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let snapshot = self.snapshot();
        let result = rule(self);
        if result.is_none() {
            self.restore(snapshot);
        }
        result
    }

    pub fn apply<T>(&mut self, rule: &Rule<'t, T>) -> Option<T> {
        let start = self.pos;
        let result = self.attempt(rule.run);
        tracing::trace!(
            rule = rule.name,
            at = start,
            matched = result.is_some(),
            "apply"
        );
        result
    }

    /// First rule that matches, each tried from the same position.
    pub fn one_of<T>(&mut self, rules: &[Rule<'t, T>]) -> Option<T> {
        rules.iter().find_map(|rule| self.apply(rule))
    }

    /// Zero or one `rule`. Always succeeds, so it sits in a sequence with
    /// `?` like any other step: `let star = c.optional(&STAR)?;`
    pub fn optional<T>(&mut self, rule: &Rule<'t, T>) -> Option<Option<T>> {
        Some(self.apply(rule))
    }
}

const TOO_DEEP: &str = "Nesting too deep";

/// Index of the closer for every opening bracket token, paired the way the grammars
/// recover: a closer for a deeper opener closes everything above it, and a
/// closer for nothing open pairs with nothing.
fn pair_brackets(tokens: &[Token]) -> Vec<Option<usize>> {
    fn slot(kind: &TokenKind) -> Option<(usize, bool)> {
        match kind {
            TokenKind::OpenBrace => Some((0, true)),
            TokenKind::OpenParen => Some((1, true)),
            TokenKind::OpenBracket => Some((2, true)),
            TokenKind::CloseBrace => Some((0, false)),
            TokenKind::CloseParen => Some((1, false)),
            TokenKind::CloseBracket => Some((2, false)),
            _ => None,
        }
    }

    let mut partners = vec![None; tokens.len()];
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut open_of = [0usize; 3];
    for (i, token) in tokens.iter().enumerate() {
        match slot(&token.kind) {
            Some((kind, true)) => {
                stack.push((kind, i));
                open_of[kind] += 1;
            }
            Some((kind, false)) if open_of[kind] > 0 => {
                while let Some((top, at)) = stack.pop() {
                    open_of[top] -= 1;
                    if top == kind {
                        partners[at] = Some(i);
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    partners
}

fn unterminated_message(kind: &TokenKind) -> Option<String> {
    let message = match kind {
        TokenKind::Comment => "Unterminated comment".to_string(),
        TokenKind::String => "Unterminated string literal".to_string(),
        TokenKind::Template => "Unterminated template literal".to_string(),
        TokenKind::AttributeValue => "Unterminated attribute value".to_string(),
        TokenKind::Directive => "Unterminated directive".to_string(),
        TokenKind::TagOpen { name } => format!("Unterminated tag <{name}"),
        TokenKind::TagClose { name } => format!("Unterminated closing tag </{name}"),
        // Embedded regions are reported by the structure around or inside them.
        _ => return None,
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trellis_lexer::{tokenize, Language};

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(Language::Script, source, Detail::Full)
    }

    fn two_identifiers(c: &mut Cursor) -> Option<(String, String)> {
        let a = c.match_kind(|k| *k == TokenKind::Identifier)?;
        let b = c.match_kind(|k| *k == TokenKind::Identifier)?;
        Some((a.text.clone(), b.text.clone()))
    }

    fn identifier_then_number(c: &mut Cursor) -> Option<(String, String)> {
        let a = c.match_kind(|k| *k == TokenKind::Identifier)?;
        let b = c.match_kind(|k| *k == TokenKind::Number)?;
        Some((a.text.clone(), b.text.clone()))
    }

    #[test]
    fn test_peek_next_eof() {
        let source = "a b";
        let tokens = tokens(source);
        let mut c = Cursor::new(&tokens, source, Detail::Full, source.len());
        assert_eq!(c.peek(1).map(|t| t.text.as_str()), Some("b"));
        assert_eq!(c.next().map(|t| t.text.as_str()), Some("a"));
        assert_eq!(c.previous_end(), 1);
        c.next();
        assert!(c.eof());
        assert_eq!(c.next(), None);
        assert_eq!(c.current_span().start, 3);
    }

    #[test]
    fn test_match_kind_does_not_advance_on_mismatch() {
        let source = "1";
        let tokens = tokens(source);
        let mut c = Cursor::new(&tokens, source, Detail::Full, source.len());
        assert!(c.match_kind(|k| *k == TokenKind::Identifier).is_none());
        assert!(c.match_kind(|k| *k == TokenKind::Number).is_some());
    }

    #[test]
    fn test_one_of_backtracks_partial_match() {
        let source = "a 1";
        let tokens = tokens(source);
        let mut c = Cursor::new(&tokens, source, Detail::Full, source.len());
        let result = c.one_of(&[
            Rule::new("two_identifiers", two_identifiers),
            Rule::new("identifier_then_number", identifier_then_number),
        ]);
        assert_eq!(result, Some(("a".into(), "1".into())));
        assert!(c.eof());
    }

    #[test]
    fn test_attempt_restores_errors_and_open_stack() {
        let source = "'abc\nx";
        let tokens = tokens(source);
        let mut c = Cursor::new(&tokens, source, Detail::Full, source.len());
        let result: Option<()> = c.attempt(|c| {
            c.open(Closer::Brace);
            c.next();
            assert_eq!(c.errors().len(), 1);
            None
        });
        assert_eq!(result, None);
        assert!(c.errors().is_empty());
        assert!(!c.is_open(&Closer::Brace));
        assert_eq!(c.peek(0).map(|t| t.text.as_str()), Some("'abc"));
    }

    #[test]
    fn test_optional_never_fails_the_caller() {
        let source = "1";
        let tokens = tokens(source);
        let mut c = Cursor::new(&tokens, source, Detail::Full, source.len());
        assert_eq!(
            c.optional(&Rule::new("two_identifiers", two_identifiers)),
            Some(None)
        );
        assert!(!c.eof());
    }

    #[test]
    fn test_optional_composes_in_a_sequence() {
        fn pair_then_number(c: &mut Cursor) -> Option<(Option<(String, String)>, String)> {
            let pair = c.optional(&Rule::new("two_identifiers", two_identifiers))?;
            let number = c.match_kind(|k| *k == TokenKind::Number)?;
            Some((pair, number.text.clone()))
        }

        let source = "a b 1 2";
        let tokens = tokens(source);
        let mut c = Cursor::new(&tokens, source, Detail::Full, source.len());
        assert_eq!(
            pair_then_number(&mut c),
            Some((Some(("a".into(), "b".into())), "1".into()))
        );
        assert_eq!(pair_then_number(&mut c), Some((None, "2".into())));
        assert!(c.eof());
    }

    #[test]
    fn test_matching_close_is_lookahead_only() {
        let source = "f((a), [b]) {}";
        let tokens = tokens(source);
        let c = Cursor::new(&tokens, source, Detail::Full, source.len());
        assert_eq!(c.matching_close(1), Some(9));
        assert_eq!(c.matching_close(2), Some(4));
        assert_eq!(c.matching_close(0), None);
        assert_eq!(c.peek(0).map(|t| t.text.as_str()), Some("f"));
    }

    #[test]
    fn test_matching_close_stops_at_enclosing_closer() {
        let source = "{ f(x } [a)]";
        let tokens = tokens(source);
        let c = Cursor::new(&tokens, source, Detail::Full, source.len());
        assert_eq!(c.matching_close(0), Some(4));
        assert_eq!(c.matching_close(2), None);
        // `)` belongs to nothing open and is passed over.
        assert_eq!(c.matching_close(5), Some(8));
    }

    #[test]
    fn test_cut_end_skips_whitespace_before_current_token() {
        let source = "{ a  \n\n}";
        let tokens = tokens(source);
        let mut c = Cursor::new(&tokens, source, Detail::Full, source.len());
        c.next();
        c.next();
        assert_eq!(c.peek_kind(0), Some(&TokenKind::CloseBrace));
        assert_eq!(c.cut_end(), 3);
    }

    #[test]
    fn test_too_deep_reports_once_per_run() {
        let source = "[[[";
        let tokens = tokens(source);
        let mut c = Cursor::new(&tokens, source, Detail::Full, source.len());
        for _ in 0..MAX_DEPTH {
            c.open(Closer::Bracket);
        }
        assert!(c.too_deep(c.current_span()));
        c.next();
        assert!(c.too_deep(c.current_span()));
        assert_eq!(c.errors().len(), 1);
        assert_eq!(c.errors()[0].message, "Nesting too deep");
        assert_eq!(c.errors()[0].span.start, 0);
        c.close();
        assert!(!c.too_deep(c.current_span()));
    }

    #[test]
    fn test_nested_cursor_inherits_depth() {
        let source = "x";
        let tokens = tokens(source);
        let mut c = Cursor::new(&tokens, source, Detail::Full, source.len());
        c.open(Closer::Tag("script".into()));
        c.open(Closer::Brace);
        let inner = c.nested(&tokens, source.len());
        assert_eq!(inner.depth(), 2);
        assert!(inner.errors().is_empty());
    }

    #[test]
    fn test_closer_of() {
        assert_eq!(Closer::of(&TokenKind::CloseParen), Some(Closer::Paren));
        assert_eq!(
            Closer::of(&TokenKind::TagClose { name: "li".into() }),
            Some(Closer::Tag("li".into()))
        );
        assert_eq!(Closer::of(&TokenKind::OpenBrace), None);
        assert_eq!(Closer::Tag("p".into()).describe(), "</p>");
    }
}
