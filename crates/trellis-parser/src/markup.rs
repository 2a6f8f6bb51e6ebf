//! Markup grammar.
//!
//! Elements pair `TagOpen` with a `TagClose` of the same name. Recovery:
//! - void and self-closing elements have no body
//! - elements with optional end tags close silently when a sibling that
//!   implies their end opens, or when an ancestor closes
//! - a closing tag for an ancestor ends the current element unconsumed
//! - a closing tag for nothing open is reported and skipped

use trellis_lexer::{is_void_element, TokenKind};

use crate::ast::{NodeKind, SyntaxNode};
use crate::common::{comment, cut_end, embedded, items_to_end, span_between};
use crate::cursor::{Closer, Cursor};

pub(crate) fn document(c: &mut Cursor<'_>) -> Vec<SyntaxNode> {
    items_to_end(c, content)
}

fn content(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    match c.peek_kind(0)? {
        TokenKind::TagOpen { .. } => element(c),
        TokenKind::Comment => comment(c),
        TokenKind::Embedded { .. } => embedded(c),
        TokenKind::Directive => {
            let token = c.next()?;
            Some(SyntaxNode::new(NodeKind::Directive, token.span))
        }
        TokenKind::Text | TokenKind::Entity => text(c),
        _ => None,
    }
}

fn is_text(kind: &TokenKind) -> bool {
    matches!(kind, TokenKind::Text | TokenKind::Entity)
}

/// A run of text and entities.
fn text(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    let first = c.match_kind(is_text)?;
    let mut end = first.span.end;
    while let Some(token) = c.match_kind(is_text) {
        end = token.span.end;
    }
    Some(SyntaxNode::new(NodeKind::Text, span_between(first.span, end)))
}

fn attribute(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    let name = c.match_kind(|k| *k == TokenKind::AttributeName)?;
    let mut end = name.span.end;
    if c.match_text(&TokenKind::Operator, "=").is_some() {
        end = c.previous_end();
        if let Some(value) = c.match_kind(|k| *k == TokenKind::AttributeValue) {
            end = value.span.end;
        }
    }
    Some(SyntaxNode::new(
        NodeKind::Attribute {
            name: name.text.clone(),
        },
        span_between(name.span, end),
    ))
}

fn element(c: &mut Cursor<'_>) -> Option<SyntaxNode> {
    let open = c.next()?;
    let TokenKind::TagOpen { name } = &open.kind else {
        return None;
    };

    let mut children = Vec::new();
    let mut end = open.span.end;
    let self_closing = loop {
        match c.peek_kind(0) {
            Some(TokenKind::TagEnd { self_closing }) => {
                c.next();
                end = c.previous_end();
                break Some(*self_closing);
            }
            Some(TokenKind::AttributeName) => {
                if let Some(node) = attribute(c) {
                    end = node.end();
                    children.push(node);
                }
            }
            Some(TokenKind::AttributeValue | TokenKind::Operator | TokenKind::Punctuation) => {
                c.next();
                end = c.previous_end();
            }
            // The tag never closed; the lexer flagged it and the cursor
            // reported it. Treat it as an empty element.
            _ => {
                end = cut_end(c, &children);
                break None;
            }
        }
    };

    let element = |children, end| {
        SyntaxNode::with_children(
            NodeKind::Element { name: name.clone() },
            span_between(open.span, end),
            children,
        )
    };

    match self_closing {
        None | Some(true) => return Some(element(children, end)),
        Some(false) if is_void_element(name) => return Some(element(children, end)),
        Some(false) => {}
    }
    if c.too_deep(open.span) {
        return Some(element(children, end));
    }

    c.open(Closer::Tag(name.clone()));
    let end = loop {
        let Some(token) = c.peek(0) else {
            if !has_optional_end_tag(name) {
                c.error(format!("Missing closing tag </{name}>"), open.span);
            }
            break c.end_of_input();
        };
        match &token.kind {
            TokenKind::TagClose { name: closing } if closing == name => {
                c.next();
                c.match_kind(|k| *k == TokenKind::Text);
                break c
                    .match_kind(|k| matches!(k, TokenKind::TagEnd { .. }))
                    .map_or(token.span.end, |end| end.span.end);
            }
            TokenKind::TagClose { name: closing } => {
                if c.is_open(&Closer::Tag(closing.clone())) {
                    if !has_optional_end_tag(name) {
                        c.error(format!("Missing closing tag </{name}>"), open.span);
                    }
                    break cut_end(c, &children);
                }
                c.error(format!("Unexpected closing tag </{closing}>"), token.span);
                c.next();
            }
            TokenKind::TagOpen { name: next } if implies_end(name, next) => {
                break cut_end(c, &children);
            }
            _ => match content(c) {
                Some(node) => children.push(node),
                None => {
                    c.next();
                }
            },
        }
    };
    c.close();

    Some(element(children, end))
}

/// Elements whose end tag may be omitted.
fn has_optional_end_tag(name: &str) -> bool {
    matches!(
        name,
        "li" | "p"
            | "dt"
            | "dd"
            | "option"
            | "optgroup"
            | "tr"
            | "td"
            | "th"
            | "thead"
            | "tbody"
            | "tfoot"
            | "rt"
            | "rp"
    )
}

/// Whether opening `next` ends an open `current` element.
fn implies_end(current: &str, next: &str) -> bool {
    match current {
        "li" => next == "li",
        "dt" | "dd" => matches!(next, "dt" | "dd"),
        "p" => matches!(
            next,
            "address"
                | "article"
                | "aside"
                | "blockquote"
                | "details"
                | "div"
                | "dl"
                | "fieldset"
                | "figcaption"
                | "figure"
                | "footer"
                | "form"
                | "h1"
                | "h2"
                | "h3"
                | "h4"
                | "h5"
                | "h6"
                | "header"
                | "hr"
                | "main"
                | "menu"
                | "nav"
                | "ol"
                | "p"
                | "pre"
                | "section"
                | "table"
                | "ul"
        ),
        "option" => matches!(next, "option" | "optgroup"),
        "optgroup" => next == "optgroup",
        "tr" => matches!(next, "tr" | "tbody" | "thead" | "tfoot"),
        "td" | "th" => matches!(next, "td" | "th" | "tr" | "tbody" | "tfoot"),
        "thead" => matches!(next, "tbody" | "tfoot"),
        "tbody" => matches!(next, "tbody" | "tfoot"),
        "tfoot" => next == "tbody",
        "rt" | "rp" => matches!(next, "rt" | "rp"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_str, MAX_DEPTH};
    use pretty_assertions::assert_eq;
    use trellis_lexer::{Detail, Language};

    fn kinds(node: &SyntaxNode) -> Vec<NodeKind> {
        node.children.iter().map(|n| n.kind.clone()).collect()
    }

    fn el(name: &str) -> NodeKind {
        NodeKind::Element { name: name.into() }
    }

    // =========================================================================
    // Elements
    // =========================================================================

    #[test]
    fn test_nested_elements() {
        let out = parse_str(Language::Markup, "<div><p>hi</p></div>", Detail::Structure);
        assert!(out.errors.is_empty());
        assert_eq!(kinds(&out.root), vec![el("div")]);
        let div = &out.root.children[0];
        assert_eq!((div.span.start, div.span.end), (0, 20));
        assert_eq!(kinds(div), vec![el("p")]);
    }

    #[test]
    fn test_void_and_self_closing() {
        let out = parse_str(Language::Markup, "<br><img src=x><x/><b>t</b>", Detail::Structure);
        assert!(out.errors.is_empty());
        assert_eq!(kinds(&out.root), vec![el("br"), el("img"), el("x"), el("b")]);
    }

    #[test]
    fn test_case_insensitive_pairing() {
        let out = parse_str(Language::Markup, "<DIV></div>", Detail::Structure);
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_missing_child_close_tag() {
        let out = parse_str(Language::Markup, "<div><span></div>", Detail::Structure);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message.contains("</span>"));
        assert_eq!(kinds(&out.root), vec![el("div")]);
        let div = &out.root.children[0];
        assert_eq!(div.span.end, 17);
        assert_eq!(kinds(div), vec![el("span")]);
        assert_eq!(div.children[0].span.end, 11);
    }

    #[test]
    fn test_unexpected_close_tag() {
        let out = parse_str(Language::Markup, "<div></span></div>", Detail::Structure);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message.contains("Unexpected closing tag </span>"));
        assert_eq!(out.root.children[0].span.end, 18);
    }

    #[test]
    fn test_missing_close_at_end_of_input() {
        let out = parse_str(Language::Markup, "<div>\n<p>x", Detail::Structure);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message.contains("</div>"));
        assert_eq!(out.root.children[0].span.end, 10);
    }

    #[test]
    fn test_implied_end_tags() {
        let source = "<ul>\n<li>a\n<li>b\n</ul>";
        let out = parse_str(Language::Markup, source, Detail::Structure);
        assert!(out.errors.is_empty());
        let ul = &out.root.children[0];
        assert_eq!(kinds(ul), vec![el("li"), el("li")]);
        assert_eq!(ul.span.end, source.len());
    }

    #[test]
    fn test_implied_end_stops_before_whitespace() {
        let source = "<ul>\n<li>a  \n<li>b\n</ul>";
        for detail in [Detail::Structure, Detail::Full] {
            let out = parse_str(Language::Markup, source, detail);
            let ul = &out.root.children[0];
            assert_eq!(ul.children[0].span.end, 10);
            assert_eq!(ul.children[1].span.end, 18);
        }
    }

    #[test]
    fn test_unterminated_closing_tag_ends_at_name() {
        for detail in [Detail::Structure, Detail::Full] {
            let out = parse_str(Language::Markup, "<p>x</p junk", detail);
            assert_eq!(out.root.children[0].span.end, 7);
        }
    }

    #[test]
    fn test_nesting_past_the_limit_flattens() {
        let source = "<b>".repeat(MAX_DEPTH + 2);
        let out = parse_str(Language::Markup, &source, Detail::Structure);
        let too_deep: Vec<_> = out
            .errors
            .iter()
            .filter(|e| e.message == "Nesting too deep")
            .collect();
        assert_eq!(too_deep.len(), 1);
        assert_eq!(too_deep[0].span.start, MAX_DEPTH * 3);

        let mut innermost = &out.root;
        let mut depth = 0;
        while let Some(child) = innermost.children.first() {
            innermost = child;
            depth += 1;
        }
        assert_eq!(depth, MAX_DEPTH + 1);
    }

    #[test]
    fn test_paragraph_closed_by_block() {
        let out = parse_str(Language::Markup, "<p>a<div>b</div>", Detail::Structure);
        assert!(out.errors.is_empty());
        assert_eq!(kinds(&out.root), vec![el("p"), el("div")]);
    }

    #[test]
    fn test_table_rows() {
        let source = "<table><tr><td>1<td>2<tr><td>3</table>";
        let out = parse_str(Language::Markup, source, Detail::Structure);
        assert!(out.errors.is_empty());
        let table = &out.root.children[0];
        assert_eq!(kinds(table), vec![el("tr"), el("tr")]);
        assert_eq!(kinds(&table.children[0]), vec![el("td"), el("td")]);
    }

    #[test]
    fn test_unterminated_tag() {
        let out = parse_str(Language::Markup, "<div class=\"a\"\n<p></p>", Detail::Full);
        assert!(out.errors[0].message.contains("Unterminated tag <div"));
        assert_eq!(kinds(&out.root), vec![el("div"), el("p")]);
    }

    // =========================================================================
    // Full detail
    // =========================================================================

    #[test]
    fn test_attributes_and_text() {
        let source = "<a href=\"/x\" hidden>go &amp; see</a>";
        let out = parse_str(Language::Markup, source, Detail::Full);
        assert!(out.errors.is_empty());
        let a = &out.root.children[0];
        assert_eq!(
            kinds(a),
            vec![
                NodeKind::Attribute {
                    name: "href".into()
                },
                NodeKind::Attribute {
                    name: "hidden".into()
                },
                NodeKind::Text,
            ]
        );
        assert_eq!((a.children[0].span.start, a.children[0].span.end), (3, 12));
        assert_eq!((a.children[2].span.start, a.children[2].span.end), (20, 32));
    }

    #[test]
    fn test_directive_and_comment() {
        let out = parse_str(Language::Markup, "<!DOCTYPE html>\n<!-- c -->", Detail::Full);
        assert_eq!(kinds(&out.root), vec![NodeKind::Directive, NodeKind::Comment]);
    }

    #[test]
    fn test_embedded_script_and_style() {
        let source = "<script>\nfunction f() {\n}\n</script><style>a { b: c }</style>";
        let out = parse_str(Language::Markup, source, Detail::Full);
        assert!(out.errors.is_empty());
        let script = &out.root.children[0];
        assert_eq!(
            kinds(script),
            vec![NodeKind::Embedded {
                language: Language::Script
            }]
        );
        assert_eq!(
            kinds(&script.children[0]),
            vec![NodeKind::Function { name: "f".into() }]
        );
        let style = &out.root.children[1];
        assert_eq!(kinds(&style.children[0]), vec![NodeKind::Rule]);
    }

    #[test]
    fn test_unterminated_comment() {
        let out = parse_str(Language::Markup, "<div></div><!-- open", Detail::Structure);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message.contains("Unterminated comment"));
    }
}
