//! Syntax tree for all three languages.
//!
//! The tree is a tree of spans: every node records the region of source it
//! covers and its nested constructs in source order. Structural parses
//! produce only nesting kinds; full parses add leaf and declaration kinds.

use serde::Serialize;
use trellis_lexer::{Language, Span};

// ---------------------------------------------------------------------------
// Node kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum NodeKind {
    /// Root of every parse. Covers the whole source.
    Document,
    /// A markup element, from `<name` through its closing tag.
    Element { name: String },
    /// A region parsed by a sibling grammar.
    Embedded { language: Language },
    /// `{ … }`
    Block,
    /// `( … )`
    Parentheses,
    /// `[ … ]`
    Brackets,
    Comment,

    // Full detail only
    /// `name="value"` inside an opening tag.
    Attribute { name: String },
    /// A run of markup text and entities.
    Text,
    /// Doctype, processing instruction or CDATA section.
    Directive,
    /// Selector prelude plus its block.
    Rule,
    /// `@name prelude;` or `@name prelude { … }`
    AtRule { name: String },
    /// `property: value;`
    Declaration { property: String },
    /// Function, method or arrow function with a block body. Anonymous
    /// functions have an empty name.
    Function { name: String },
    Class { name: String },
}

/// Fold priority group of a node kind. Higher wins when two candidates
/// start on the same line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FoldClass {
    Comment,
    Bracket,
    Element,
    Block,
}

impl NodeKind {
    /// `None` for kinds that are traversed but never folded.
    pub fn fold_class(&self) -> Option<FoldClass> {
        match self {
            NodeKind::Block
            | NodeKind::Rule
            | NodeKind::AtRule { .. }
            | NodeKind::Function { .. }
            | NodeKind::Class { .. } => Some(FoldClass::Block),
            NodeKind::Element { .. } => Some(FoldClass::Element),
            NodeKind::Parentheses | NodeKind::Brackets => Some(FoldClass::Bracket),
            NodeKind::Comment => Some(FoldClass::Comment),
            NodeKind::Document
            | NodeKind::Embedded { .. }
            | NodeKind::Attribute { .. }
            | NodeKind::Text
            | NodeKind::Directive
            | NodeKind::Declaration { .. } => None,
        }
    }

    /// Short label used by tree dumps.
    pub fn label(&self) -> String {
        match self {
            NodeKind::Document => "document".into(),
            NodeKind::Element { name } => format!("<{name}>"),
            NodeKind::Embedded { language } => format!("embedded {language}"),
            NodeKind::Block => "block".into(),
            NodeKind::Parentheses => "parentheses".into(),
            NodeKind::Brackets => "brackets".into(),
            NodeKind::Comment => "comment".into(),
            NodeKind::Attribute { name } => format!("attribute {name}"),
            NodeKind::Text => "text".into(),
            NodeKind::Directive => "directive".into(),
            NodeKind::Rule => "rule".into(),
            NodeKind::AtRule { name } => format!("@{name}"),
            NodeKind::Declaration { property } => format!("declaration {property}"),
            NodeKind::Function { name } if name.is_empty() => "function".into(),
            NodeKind::Function { name } => format!("function {name}"),
            NodeKind::Class { name } if name.is_empty() => "class".into(),
            NodeKind::Class { name } => format!("class {name}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A node of the syntax tree. A parent's span contains every child's span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxNode {
    #[serde(flatten)]
    pub kind: NodeKind,
    pub span: Span,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self {
            kind,
            span,
            children: Vec::new(),
        }
    }

    pub fn with_children(kind: NodeKind, span: Span, children: Vec<SyntaxNode>) -> Self {
        Self {
            kind,
            span,
            children,
        }
    }

    pub fn start(&self) -> usize {
        self.span.start
    }

    pub fn end(&self) -> usize {
        self.span.end
    }

    /// Visit this node and all descendants, depth-first in source order.
    pub fn walk<'n>(&'n self, visit: &mut impl FnMut(&'n SyntaxNode)) {
        self.walk_with_depth(&mut |node, _| visit(node));
    }

    /// [`walk`](Self::walk), also passing each node's depth below `self`.
    pub fn walk_with_depth<'n>(&'n self, visit: &mut impl FnMut(&'n SyntaxNode, usize)) {
        let mut stack = vec![(self, 0)];
        while let Some((node, depth)) = stack.pop() {
            visit(node, depth);
            stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
        }
    }

    /// All descendants (and self) matching `pred`, in source order.
    pub fn find_all(&self, pred: impl Fn(&NodeKind) -> bool) -> Vec<&SyntaxNode> {
        let mut found = Vec::new();
        self.walk(&mut |node| {
            if pred(&node.kind) {
                found.push(node);
            }
        });
        found
    }

    /// Number of nodes in this subtree, self included.
    pub fn count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }

    /// Indented one-line-per-node rendering, used by the CLI.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.walk_with_depth(&mut |node, depth| {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&format!(
                "{} {}..{} (line {})\n",
                node.kind.label(),
                node.span.start,
                node.span.end,
                node.span.line
            ));
        });
        out
    }
}
