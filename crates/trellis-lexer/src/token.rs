use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

use crate::Language;

/// A region of source text. `start`/`end` are half-open byte offsets;
/// `line` and `column` are the 1-based position of `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both `self` and `other`. Line/column come from
    /// whichever starts first.
    pub fn cover(&self, other: &Span) -> Span {
        let (line, column) = if other.start < self.start {
            (other.line, other.column)
        } else {
            (self.line, self.column)
        };
        Span::new(
            self.start.min(other.start),
            self.end.max(other.end),
            line,
            column,
        )
    }
}

/// Token classification shared by the three lexers.
///
/// Markup tag names are carried lowercased so grammars can match
/// open/close pairs without re-reading the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum TokenKind {
    // Shared
    Comment,
    String,
    Number,
    Keyword,
    Identifier,
    Operator,
    Punctuation,
    Text,

    // Structural delimiters
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,

    // Markup
    /// `<name`
    TagOpen { name: String },
    /// `</name`
    TagClose { name: String },
    /// `>` or `/>`
    TagEnd { self_closing: bool },
    AttributeName,
    AttributeValue,
    Entity,
    /// `<!DOCTYPE …>`, `<?…?>`, `<![CDATA[…]]>`
    Directive,

    // Stylesheet
    AtKeyword,
    Selector,
    Pseudo,
    Property,
    Variable,
    Color,
    Unit,
    Function,
    Value,

    // Script
    Template,
    Regex,
    Literal,

    /// A region lexed by a sibling lexer: a `<script>`/`<style>` body inside
    /// markup, or a JSX region inside script. Inner offsets are absolute.
    Embedded {
        language: Language,
        tokens: Vec<Token>,
    },
}

impl TokenKind {
    /// Kinds that survive a structural pass.
    pub fn is_boundary(&self) -> bool {
        matches!(
            self,
            TokenKind::Comment
                | TokenKind::OpenBrace
                | TokenKind::CloseBrace
                | TokenKind::OpenParen
                | TokenKind::CloseParen
                | TokenKind::OpenBracket
                | TokenKind::CloseBracket
                | TokenKind::TagOpen { .. }
                | TokenKind::TagClose { .. }
                | TokenKind::TagEnd { .. }
                | TokenKind::Embedded { .. }
        )
    }

    /// Presentation hint used by the highlighter.
    pub fn style_class(&self) -> &'static str {
        match self {
            TokenKind::Comment => "comment",
            TokenKind::String | TokenKind::Template => "string",
            TokenKind::Number => "number",
            TokenKind::Keyword => "keyword",
            TokenKind::Identifier => "identifier",
            TokenKind::Operator => "operator",
            TokenKind::Punctuation
            | TokenKind::OpenBrace
            | TokenKind::CloseBrace
            | TokenKind::OpenParen
            | TokenKind::CloseParen
            | TokenKind::OpenBracket
            | TokenKind::CloseBracket => "punctuation",
            TokenKind::Text => "text",
            TokenKind::TagOpen { .. } | TokenKind::TagClose { .. } | TokenKind::TagEnd { .. } => {
                "tag"
            }
            TokenKind::AttributeName => "attr-name",
            TokenKind::AttributeValue => "attr-value",
            TokenKind::Entity => "entity",
            TokenKind::Directive => "directive",
            TokenKind::AtKeyword => "at-rule",
            TokenKind::Selector => "selector",
            TokenKind::Pseudo => "pseudo",
            TokenKind::Property => "property",
            TokenKind::Variable => "variable",
            TokenKind::Color => "color",
            TokenKind::Unit => "unit",
            TokenKind::Function => "function",
            TokenKind::Value => "value",
            TokenKind::Regex => "regex",
            TokenKind::Literal => "literal",
            TokenKind::Embedded { .. } => "embedded",
        }
    }
}

/// A token produced by one of the lexers.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
    /// Set when the construct ran into end of input (or its recovery
    /// boundary) without its terminator.
    pub unterminated: bool,
}

/// `{kind, text, span, style_class, unterminated?}`; the style class is
/// derived from the kind.
impl Serialize for Token {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Token", 5)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("text", &self.text)?;
        state.serialize_field("span", &self.span)?;
        state.serialize_field("style_class", self.style_class())?;
        if self.unterminated {
            state.serialize_field("unterminated", &true)?;
        } else {
            state.skip_field("unterminated")?;
        }
        state.end()
    }
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
            unterminated: false,
        }
    }

    pub fn style_class(&self) -> &'static str {
        self.kind.style_class()
    }

    /// Tokens of an embedded region, or an empty slice.
    pub fn embedded(&self) -> &[Token] {
        match &self.kind {
            TokenKind::Embedded { tokens, .. } => tokens,
            _ => &[],
        }
    }
}

/// HTML5 void elements (no children, no closing tag).
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Check if a tag name is an HTML5 void element.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Calls `f` on every token in order, descending into embedded regions
/// instead of yielding the wrapper.
pub fn for_each_leaf<'t>(tokens: &'t [Token], f: &mut impl FnMut(&'t Token)) {
    for token in tokens {
        match &token.kind {
            TokenKind::Embedded { tokens, .. } => for_each_leaf(tokens, f),
            _ => f(token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_token_serializes_kind_and_style_class() {
        let kind = TokenKind::TagOpen { name: "a".into() };
        let token = Token::new(kind, "<a", Span::new(0, 2, 1, 1));
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["kind"]["type"], "tag-open");
        assert_eq!(json["kind"]["name"], "a");
        assert_eq!(json["style_class"], "tag");
        assert_eq!(json["span"]["end"], 2);
        assert!(json.get("unterminated").is_none());

        let open = Token {
            unterminated: true,
            ..Token::new(TokenKind::String, "'x", Span::new(0, 2, 1, 1))
        };
        assert_eq!(serde_json::to_value(&open).unwrap()["unterminated"], true);
    }

    #[test]
    fn test_cover_spans() {
        let a = Span::new(4, 8, 1, 5);
        let b = Span::new(1, 3, 1, 2);
        assert_eq!(a.cover(&b), Span::new(1, 8, 1, 2));
        assert_eq!(b.cover(&a), Span::new(1, 8, 1, 2));
    }

    #[test]
    fn test_boundary_kinds() {
        assert!(TokenKind::OpenBrace.is_boundary());
        assert!(TokenKind::Comment.is_boundary());
        assert!(TokenKind::TagEnd { self_closing: true }.is_boundary());
        assert!(!TokenKind::Keyword.is_boundary());
        assert!(!TokenKind::AttributeName.is_boundary());
    }

    #[test]
    fn test_style_classes() {
        assert_eq!(TokenKind::TagOpen { name: "div".into() }.style_class(), "tag");
        assert_eq!(TokenKind::Template.style_class(), "string");
        assert_eq!(TokenKind::CloseBracket.style_class(), "punctuation");
    }

    #[test]
    fn test_for_each_leaf_flattens_embedded() {
        let inner = Token::new(TokenKind::OpenBrace, "{", Span::new(8, 9, 1, 9));
        let tokens = vec![
            Token::new(TokenKind::TagEnd { self_closing: false }, ">", Span::new(7, 8, 1, 8)),
            Token::new(
                TokenKind::Embedded {
                    language: Language::Script,
                    tokens: vec![inner.clone()],
                },
                "{",
                Span::new(8, 9, 1, 9),
            ),
        ];
        let mut seen = Vec::new();
        for_each_leaf(&tokens, &mut |t| seen.push(t.text.clone()));
        assert_eq!(seen, vec![">".to_string(), "{".to_string()]);
    }

    #[test]
    fn test_void_elements() {
        assert!(is_void_element("br"));
        assert!(is_void_element("img"));
        assert!(!is_void_element("div"));
    }
}
