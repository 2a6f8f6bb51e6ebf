//! Stylesheet grammar.
//!
//! Structure detail: blocks and comments. Full detail adds rule sets,
//! at-rules, declarations and function calls in values.

use trellis_lexer::{Span, TokenKind};

use crate::ast::{NodeKind, SyntaxNode};
use crate::common::{comment, delimited, embedded, group, items_to_end, span_between};
use crate::cursor::{Closer, Cursor, Rule};

pub(crate) fn document(c: &mut Cursor<'_>) -> Vec<SyntaxNode> {
    items_to_end(c, statement)
}

fn statement<'t>(c: &mut Cursor<'t>) -> Option<SyntaxNode> {
    match c.peek_kind(0)? {
        TokenKind::Comment => comment(c),
        TokenKind::Embedded { .. } => embedded(c),
        TokenKind::OpenBrace => block(c),
        _ if c.is_full() => c
            .one_of(&[
                Rule::new("at_rule", at_rule),
                Rule::new("declaration", declaration),
                Rule::new("rule_set", rule_set),
            ])
            .or_else(|| value_item(c)),
        _ => None,
    }
}

fn block(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    if !c.check(|k| *k == TokenKind::OpenBrace) {
        return None;
    }
    delimited(c, Closer::Brace, NodeKind::Block, statement)
}

fn is_semicolon(c: &Cursor<'_>) -> bool {
    c.peek(0)
        .is_some_and(|t| t.kind == TokenKind::Punctuation && t.text == ";")
}

/// `@name prelude;` or `@name prelude { … }`. Never fails once the
/// at-keyword is there.
fn at_rule(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    let keyword = c.match_kind(|k| *k == TokenKind::AtKeyword)?;
    let name = keyword.text.trim_start_matches('@').to_ascii_lowercase();

    let mut children = Vec::new();
    loop {
        if is_semicolon(c) {
            c.next();
            break;
        }
        match c.peek_kind(0) {
            None
            | Some(TokenKind::CloseBrace | TokenKind::CloseParen | TokenKind::CloseBracket) => break,
            Some(TokenKind::OpenBrace) => {
                children.extend(block(c));
                break;
            }
            Some(_) => match value_item(c) {
                Some(node) => children.push(node),
                None => {
                    c.next();
                }
            },
        }
    }

    let end = c.previous_end();
    Some(SyntaxNode::with_children(
        NodeKind::AtRule { name },
        span_between(keyword.span, end),
        children,
    ))
}

/// Selector prelude followed by a block. Fails when the prelude runs into
/// `;`, a closer or end of input first.
fn rule_set(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    let first = c.peek(0)?;
    let mut children = Vec::new();

    loop {
        if is_semicolon(c) {
            return None;
        }
        match c.peek_kind(0)? {
            TokenKind::OpenBrace => break,
            TokenKind::CloseBrace
            | TokenKind::CloseParen
            | TokenKind::CloseBracket
            | TokenKind::AtKeyword => return None,
            TokenKind::OpenParen | TokenKind::OpenBracket => children.push(group(c, value_item)?),
            _ => {
                c.next();
            }
        }
    }

    let body = block(c)?;
    let span = span_between(first.span, body.end());
    children.push(body);
    Some(SyntaxNode::with_children(NodeKind::Rule, span, children))
}

/// `property: value` up to and including `;`. The closing `}` of the
/// enclosing block is left alone.
fn declaration(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    let property = c.match_kind(|k| matches!(k, TokenKind::Property | TokenKind::Variable))?;
    c.match_text(&TokenKind::Punctuation, ":")?;

    let mut children = Vec::new();
    loop {
        if is_semicolon(c) {
            c.next();
            break;
        }
        match c.peek_kind(0) {
            None
            | Some(
                TokenKind::OpenBrace
                | TokenKind::CloseBrace
                | TokenKind::CloseParen
                | TokenKind::CloseBracket,
            ) => break,
            Some(_) => match value_item(c) {
                Some(node) => children.push(node),
                None => {
                    c.next();
                }
            },
        }
    }

    Some(SyntaxNode::with_children(
        NodeKind::Declaration {
            property: property.text.clone(),
        },
        span_between(property.span, c.previous_end()),
        children,
    ))
}

/// Function calls and bracketed groups inside values and preludes.
fn value_item<'t>(c: &mut Cursor<'t>) -> Option<SyntaxNode> {
    match c.peek_kind(0)? {
        TokenKind::Comment => comment(c),
        TokenKind::Function if matches!(c.peek_kind(1), Some(TokenKind::OpenParen)) => {
            let name = c.next()?;
            let args = group(c, value_item)?;
            let span = Span::new(name.span.start, args.end(), name.span.line, name.span.column);
            Some(SyntaxNode::with_children(
                NodeKind::Function {
                    name: name.text.to_ascii_lowercase(),
                },
                span,
                vec![args],
            ))
        }
        TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => group(c, value_item),
        _ => None,
    }
}
