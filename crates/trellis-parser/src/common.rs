//! Rules shared by the three grammars: the structural group shape,
//! comments, embedded regions and top-level recovery.

use trellis_lexer::{Span, TokenKind};

use crate::ast::{NodeKind, SyntaxNode};
use crate::cursor::{Closer, Cursor};

/// A rule producing one child node. `None` means the current token is
/// filler for the caller to skip.
pub(crate) type Item<'t> = fn(&mut Cursor<'t>) -> Option<SyntaxNode>;

/// Items until end of input. Closing tokens here have no opener.
pub(crate) fn items_to_end<'t>(c: &mut Cursor<'t>, item: Item<'t>) -> Vec<SyntaxNode> {
    let mut children = Vec::new();
    while let Some(token) = c.peek(0) {
        if let Some(closer) = Closer::of(&token.kind) {
            c.error(format!("Unexpected closing {}", closer.describe()), token.span);
            c.next();
            continue;
        }
        match item(c) {
            Some(node) => children.push(node),
            None => {
                c.next();
            }
        }
    }
    children
}

/// The structural shape every grammar shares. The cursor is on the opening
/// token; items are parsed until the matching closer. A closer that belongs
/// to an enclosing group ends this one without being consumed, a closer
/// that belongs to nothing is reported and skipped, and end of input closes
/// the group at the end of the source. An opener nested too deep is not a
/// group at all; the caller skips it.
pub(crate) fn delimited<'t>(
    c: &mut Cursor<'t>,
    closer: Closer,
    kind: NodeKind,
    item: Item<'t>,
) -> Option<SyntaxNode> {
    if c.too_deep(c.current_span()) {
        return None;
    }
    let open = c.next()?;
    c.open(closer.clone());

    let mut children = Vec::new();
    let end = loop {
        let Some(token) = c.peek(0) else {
            c.error(format!("Missing closing {}", closer.describe()), open.span);
            break c.end_of_input();
        };
        if let Some(found) = Closer::of(&token.kind) {
            if found == closer {
                c.next();
                break token.span.end;
            }
            if c.is_open(&found) {
                c.error(format!("Missing closing {}", closer.describe()), open.span);
                break cut_end(c, &children);
            }
            c.error(format!("Unexpected closing {}", found.describe()), token.span);
            c.next();
            continue;
        }
        match item(c) {
            Some(node) => children.push(node),
            None => {
                c.next();
            }
        }
    };

    c.close();
    Some(SyntaxNode::with_children(
        kind,
        span_between(open.span, end),
        children,
    ))
}

/// `{ … }`, `( … )` or `[ … ]` at the cursor, whichever it is.
pub(crate) fn group<'t>(c: &mut Cursor<'t>, item: Item<'t>) -> Option<SyntaxNode> {
    match c.peek_kind(0)? {
        TokenKind::OpenBrace => delimited(c, Closer::Brace, NodeKind::Block, item),
        TokenKind::OpenParen => delimited(c, Closer::Paren, NodeKind::Parentheses, item),
        TokenKind::OpenBracket => delimited(c, Closer::Bracket, NodeKind::Brackets, item),
        _ => None,
    }
}

pub(crate) fn comment(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    let token = c.match_kind(|k| *k == TokenKind::Comment)?;
    Some(SyntaxNode::new(NodeKind::Comment, token.span))
}

/// A region lexed by a sibling lexer, parsed by the sibling grammar.
pub(crate) fn embedded(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    let token = c.match_kind(|k| matches!(k, TokenKind::Embedded { .. }))?;
    let TokenKind::Embedded { language, tokens } = &token.kind else {
        return None;
    };
    let (children, errors) = crate::parse_items(*language, c.nested(tokens, token.span.end));
    c.extend_errors(errors);
    Some(SyntaxNode::with_children(
        NodeKind::Embedded {
            language: *language,
        },
        token.span,
        children,
    ))
}

/// End of a node cut short by the token at the cursor. Never before the
/// end of its last child.
pub(crate) fn cut_end(c: &Cursor<'_>, children: &[SyntaxNode]) -> usize {
    let last_child = children.last().map_or(0, SyntaxNode::end);
    c.cut_end().max(last_child)
}

/// Span from the start of `open` to `end`.
pub(crate) fn span_between(open: Span, end: usize) -> Span {
    Span::new(open.start, end.max(open.end), open.line, open.column)
}
