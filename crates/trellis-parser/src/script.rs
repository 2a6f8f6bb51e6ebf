//! Script grammar.
//!
//! Structure detail: braces, parentheses, brackets, comments and JSX
//! regions. Full detail adds functions, methods, arrow functions with block
//! bodies, and classes. Rules that would re-parse a parenthesized group
//! check the token after its closer first, so a failed alternative never
//! costs more than a scan.

use trellis_lexer::{Token, TokenKind};

use crate::ast::{NodeKind, SyntaxNode};
use crate::common::{comment, embedded, group, items_to_end, span_between};
use crate::cursor::{Cursor, Rule};

pub(crate) fn document(c: &mut Cursor<'_>) -> Vec<SyntaxNode> {
    items_to_end(c, item)
}

fn item<'t>(c: &mut Cursor<'t>) -> Option<SyntaxNode> {
    match c.peek_kind(0)? {
        TokenKind::Comment => comment(c),
        TokenKind::Embedded { .. } => embedded(c),
        _ if c.is_full() => c
            .one_of(&[
                Rule::new("function", function),
                Rule::new("class", class),
                Rule::new("method", method),
                Rule::new("arrow", arrow),
            ])
            .or_else(|| group(c, item)),
        _ => group(c, item),
    }
}

fn is_keyword(kind: &TokenKind) -> bool {
    *kind == TokenKind::Keyword
}

fn is_operator(c: &Cursor<'_>, offset: usize, text: &str) -> bool {
    c.peek(offset)
        .is_some_and(|t| t.kind == TokenKind::Operator && t.text == text)
}

/// Whether the group at `offset` is followed by a token satisfying `pred`.
fn group_followed_by(
    c: &Cursor<'_>,
    offset: usize,
    pred: impl Fn(&Cursor<'_>, usize) -> bool,
) -> bool {
    c.matching_close(offset).is_some_and(|close| pred(c, close + 1))
}

fn opens_block(c: &Cursor<'_>, offset: usize) -> bool {
    matches!(c.peek_kind(offset), Some(TokenKind::OpenBrace))
}

fn parameters(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    if !c.check(|k| *k == TokenKind::OpenParen) {
        return None;
    }
    group(c, item)
}

fn body(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    if !c.check(|k| *k == TokenKind::OpenBrace) {
        return None;
    }
    group(c, item)
}

fn function_node(start: &Token, name: String, params: SyntaxNode, body: SyntaxNode) -> SyntaxNode {
    let span = span_between(start.span, body.end());
    SyntaxNode::with_children(NodeKind::Function { name }, span, vec![params, body])
}

fn async_keyword<'t>(c: &mut Cursor<'t>) -> Option<&'t Token> {
    c.match_text(&TokenKind::Keyword, "async")
}

fn generator_star<'t>(c: &mut Cursor<'t>) -> Option<&'t Token> {
    c.match_text(&TokenKind::Operator, "*")
}

fn function_name<'t>(c: &mut Cursor<'t>) -> Option<&'t Token> {
    c.match_kind(|k| matches!(k, TokenKind::Function | TokenKind::Identifier))
}

/// `async? function *? name? (params) { body }`
fn function<'t>(c: &mut Cursor<'t>) -> Option<SyntaxNode> {
    let start = c.peek(0)?;
    c.optional(&Rule::new("async", async_keyword))?;
    c.match_text(&TokenKind::Keyword, "function")?;
    c.optional(&Rule::new("generator", generator_star))?;
    let name = c
        .optional(&Rule::new("name", function_name))?
        .map_or_else(String::new, |t| t.text.clone());

    if !group_followed_by(c, 0, opens_block) {
        return None;
    }
    let params = parameters(c)?;
    let body = body(c)?;
    Some(function_node(start, name, params, body))
}

/// `name(params) { body }` with optional `static`, `async`, `get`, `set`
/// and `*` in front: class members and object literal methods.
fn method(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    let start = c.peek(0)?;
    loop {
        let modifier = c.peek(0).is_some_and(|t| match t.kind {
            TokenKind::Keyword => t.text == "static" || t.text == "async",
            TokenKind::Identifier => t.text == "get" || t.text == "set",
            TokenKind::Operator => t.text == "*",
            _ => false,
        });
        if !modifier || matches!(c.peek_kind(1), Some(TokenKind::OpenParen)) {
            break;
        }
        c.next();
    }

    if !matches!(c.peek_kind(1), Some(TokenKind::OpenParen))
        || !group_followed_by(c, 1, opens_block)
    {
        return None;
    }
    let name = function_name(c)?;
    let params = parameters(c)?;
    let body = body(c)?;
    Some(function_node(start, name.text.clone(), params, body))
}

/// `async? (params) => { body }` or `async? name => { body }`. Arrows with
/// expression bodies are left to the plain group rule.
fn arrow(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    let start = c.peek(0)?;
    if c.peek(0).is_some_and(|t| t.kind == TokenKind::Keyword && t.text == "async")
        && matches!(c.peek_kind(1), Some(TokenKind::OpenParen | TokenKind::Identifier))
    {
        c.next();
    }

    let params = match c.peek_kind(0)? {
        TokenKind::OpenParen => {
            let followed = group_followed_by(c, 0, |c, at| {
                is_operator(c, at, "=>") && opens_block(c, at + 1)
            });
            if !followed {
                return None;
            }
            parameters(c)?
        }
        TokenKind::Identifier => {
            if !is_operator(c, 1, "=>") || !opens_block(c, 2) {
                return None;
            }
            let param = c.next()?;
            SyntaxNode::new(NodeKind::Parentheses, param.span)
        }
        _ => return None,
    };

    c.match_text(&TokenKind::Operator, "=>")?;
    let body = body(c)?;
    Some(function_node(start, String::new(), params, body))
}

/// `class name? (extends heritage)? { members }`
fn class(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    let start = c.match_text(&TokenKind::Keyword, "class")?;
    let name = c
        .match_kind(|k| *k == TokenKind::Identifier)
        .map_or_else(String::new, |t| t.text.clone());

    let mut children = Vec::new();
    if c.match_text(&TokenKind::Keyword, "extends").is_some() {
        loop {
            match c.peek_kind(0)? {
                TokenKind::OpenBrace => break,
                TokenKind::OpenParen | TokenKind::OpenBracket => children.push(group(c, item)?),
                TokenKind::CloseBrace | TokenKind::CloseParen | TokenKind::CloseBracket => {
                    return None
                }
                kind if is_keyword(kind) => return None,
                _ => {
                    c.next();
                }
            }
        }
    }

    let body = body(c)?;
    let span = span_between(start.span, body.end());
    children.push(body);
    Some(SyntaxNode::with_children(NodeKind::Class { name }, span, children))
}
