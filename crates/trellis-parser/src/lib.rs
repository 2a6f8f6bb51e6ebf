//! Trellis Parser
//!
//! Builds a [`SyntaxNode`] tree from the token stream of any of the three
//! languages. Parsing never fails: every structural anomaly (missing or
//! unexpected closer, unterminated token) is recovered locally and reported
//! as an advisory [`ParseError`] next to the tree.
//!
//! Each grammar is a set of rule functions over a [`Cursor`], combined with
//! the backtracking primitives `attempt`, `apply`, `one_of` and `optional`.
//! The same grammar serves both [`Detail`] levels: a structural token stream
//! simply never offers the tokens the full-detail rules look for.

pub mod ast;
mod common;
pub mod cursor;
mod markup;
mod script;
mod stylesheet;

use serde::Serialize;
use trellis_lexer::{Detail, Language, Span, Token};

pub use ast::{FoldClass, NodeKind, SyntaxNode};
pub use cursor::{Closer, Cursor, Rule, MAX_DEPTH};

/// Structural anomaly with the position it was detected at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message} at line {}, column {}", .span.line, .span.column)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Result of one parser run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOutput {
    pub root: SyntaxNode,
    pub errors: Vec<ParseError>,
}

/// Parse `tokens` lexed from `source`. The root `Document` covers the whole
/// source; errors come back in source order.
pub fn parse(language: Language, tokens: &[Token], source: &str, detail: Detail) -> ParseOutput {
    let cursor = Cursor::new(tokens, source, detail, source.len());
    let (children, mut errors) = parse_items(language, cursor);
    errors.sort_by_key(|e| e.span.start);

    let root = SyntaxNode::with_children(
        NodeKind::Document,
        Span::new(0, source.len(), 1, 1),
        children,
    );
    tracing::trace!(
        %language,
        ?detail,
        tokens = tokens.len(),
        nodes = root.count(),
        errors = errors.len(),
        "parsed"
    );
    ParseOutput { root, errors }
}

/// Lex and parse `source` in one step.
pub fn parse_str(language: Language, source: &str, detail: Detail) -> ParseOutput {
    let tokens = trellis_lexer::tokenize(language, source, detail);
    parse(language, &tokens, source, detail)
}

/// Top-level items of the tokens under `cursor`, read as `language`.
/// Nested embedded regions come back through here with a cursor of their own.
pub(crate) fn parse_items(
    language: Language,
    mut cursor: Cursor<'_>,
) -> (Vec<SyntaxNode>, Vec<ParseError>) {
    let children = match language {
        Language::Markup => markup::document(&mut cursor),
        Language::Stylesheet => stylesheet::document(&mut cursor),
        Language::Script => script::document(&mut cursor),
    };
    (children, cursor.into_errors())
}
