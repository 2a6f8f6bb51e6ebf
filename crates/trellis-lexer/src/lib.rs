//! Trellis Lexer
//!
//! Tokenizes markup, stylesheet and script source into ordered,
//! non-overlapping tokens. Lexing never fails: unterminated constructs are
//! flagged on the token and left for the parser to report.
//!
//! Every lexer runs at one of two [`Detail`] levels. `Structure` keeps only
//! boundary tokens (braces, tags, comments, embedded regions) for cheap fold
//! updates; `Full` classifies every non-whitespace character for highlighting.
//!
//! # Example
//!
//! ```
//! use trellis_lexer::{tokenize, Detail, Language, TokenKind};
//!
//! let tokens = tokenize(Language::Stylesheet, "a{color:red}", Detail::Structure);
//! assert_eq!(tokens[0].kind, TokenKind::OpenBrace);
//! assert_eq!(tokens[1].kind, TokenKind::CloseBrace);
//! ```

pub mod markup;
pub mod scanner;
pub mod script;
pub mod stylesheet;
pub mod token;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use markup::MarkupLexer;
pub use script::ScriptLexer;
pub use stylesheet::StylesheetLexer;
pub use token::{for_each_leaf, is_void_element, Span, Token, TokenKind};

/// The closed set of file kinds the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Markup,
    Stylesheet,
    Script,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Markup, Language::Stylesheet, Language::Script];

    pub fn name(self) -> &'static str {
        match self {
            Language::Markup => "markup",
            Language::Stylesheet => "stylesheet",
            Language::Script => "script",
        }
    }

    /// Resolve a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Result<Self, UnknownLanguage> {
        ext.parse()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markup" | "html" | "htm" | "xml" | "svg" => Ok(Language::Markup),
            "stylesheet" | "css" => Ok(Language::Stylesheet),
            "script" | "js" | "javascript" | "jsx" | "mjs" | "cjs" => Ok(Language::Script),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}

/// Requested a pipeline for a language kind that is not registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown language kind: '{0}'")]
pub struct UnknownLanguage(pub String);

/// How much classification a lexer (and grammar) performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    /// Nesting boundaries only.
    Structure,
    /// Every token classified.
    #[default]
    Full,
}

impl Detail {
    pub fn is_full(self) -> bool {
        self == Detail::Full
    }
}

/// Tokenize `source` with the lexer for `language`.
pub fn tokenize(language: Language, source: &str, detail: Detail) -> Vec<Token> {
    match language {
        Language::Markup => MarkupLexer::tokenize(source, detail),
        Language::Stylesheet => StylesheetLexer::tokenize(source, detail),
        Language::Script => ScriptLexer::tokenize(source, detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_language_aliases() {
        assert_eq!("HTML".parse::<Language>(), Ok(Language::Markup));
        assert_eq!("css".parse::<Language>(), Ok(Language::Stylesheet));
        assert_eq!("jsx".parse::<Language>(), Ok(Language::Script));
        assert_eq!(Language::from_extension("mjs"), Ok(Language::Script));
    }

    #[test]
    fn test_unknown_language() {
        let err = "python".parse::<Language>().unwrap_err();
        assert_eq!(err, UnknownLanguage("python".into()));
        assert!(err.to_string().contains("python"));
    }

    #[test]
    fn test_language_display_round_trips() {
        for language in Language::ALL {
            assert_eq!(language.to_string().parse::<Language>(), Ok(language));
        }
    }

    #[test]
    fn test_tokenize_dispatch() {
        let tokens = tokenize(Language::Markup, "<p>", Detail::Structure);
        assert_eq!(tokens[0].kind, TokenKind::TagOpen { name: "p".into() });
        let tokens = tokenize(Language::Script, "{}", Detail::Structure);
        assert_eq!(tokens.len(), 2);
    }
}
