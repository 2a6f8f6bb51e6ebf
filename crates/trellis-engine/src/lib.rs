//! Trellis Engine
//!
//! Wires a lexer and grammar per language into the two runs the editor
//! schedules: a full run for highlighting and a structure-only run for
//! keeping fold markers current while typing.
//!
//! ```text
//! source → tokenize → parse → { fold_regions, highlight_lines } → Analysis
//! source → tokenize(Structure) → parse(Structure) → fold_regions → StructureAnalysis
//! ```

pub mod fold;
pub mod highlight;
pub mod lines;

use serde::{Deserialize, Serialize};
use trellis_lexer::{
    Detail, Language, MarkupLexer, ScriptLexer, StylesheetLexer, Token, UnknownLanguage,
};
use trellis_parser::{ParseError, ParseOutput, SyntaxNode};

pub use fold::{fold_regions, FoldRegion};
pub use highlight::{escape_html, highlight, highlight_lines};
pub use lines::LineIndex;

/// Presentation and folding knobs shared by every run of an [`Engine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineOptions {
    /// Prepended to every style class in highlighted output.
    pub class_prefix: String,
    /// Wrap spaces and tabs between tokens in marker spans.
    pub mark_whitespace: bool,
    /// Offer multi-line comments as fold regions.
    pub fold_comments: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            class_prefix: "hl-".into(),
            mark_whitespace: true,
            fold_comments: true,
        }
    }
}

/// The one unrecoverable failure: asking for a language nobody registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    UnknownLanguage(#[from] UnknownLanguage),
}

// =========================================================================
// Pipelines
// =========================================================================

/// Lexer and grammar for one language.
pub trait LanguagePipeline: Sync {
    fn language(&self) -> Language;

    fn tokenize(&self, source: &str, detail: Detail) -> Vec<Token>;

    fn parse(&self, tokens: &[Token], source: &str, detail: Detail) -> ParseOutput {
        trellis_parser::parse(self.language(), tokens, source, detail)
    }
}

struct MarkupPipeline;
struct StylesheetPipeline;
struct ScriptPipeline;

impl LanguagePipeline for MarkupPipeline {
    fn language(&self) -> Language {
        Language::Markup
    }

    fn tokenize(&self, source: &str, detail: Detail) -> Vec<Token> {
        MarkupLexer::tokenize(source, detail)
    }
}

impl LanguagePipeline for StylesheetPipeline {
    fn language(&self) -> Language {
        Language::Stylesheet
    }

    fn tokenize(&self, source: &str, detail: Detail) -> Vec<Token> {
        StylesheetLexer::tokenize(source, detail)
    }
}

impl LanguagePipeline for ScriptPipeline {
    fn language(&self) -> Language {
        Language::Script
    }

    fn tokenize(&self, source: &str, detail: Detail) -> Vec<Token> {
        ScriptLexer::tokenize(source, detail)
    }
}

/// Indexed by `Language as usize`, in declaration order.
static PIPELINES: [&dyn LanguagePipeline; 3] =
    [&MarkupPipeline, &StylesheetPipeline, &ScriptPipeline];

/// The registered pipeline for `language`.
pub fn pipeline(language: Language) -> &'static dyn LanguagePipeline {
    PIPELINES[language as usize]
}

// =========================================================================
// Engine
// =========================================================================

/// Everything a full run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub tokens: Vec<Token>,
    pub root: SyntaxNode,
    pub folds: Vec<FoldRegion>,
    /// Highlighted markup, one entry per source line.
    pub lines: Vec<String>,
    pub errors: Vec<ParseError>,
}

impl Analysis {
    /// Highlighted markup for the whole document.
    pub fn html(&self) -> String {
        self.lines.join("\n")
    }
}

/// Result of a structure-only run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureAnalysis {
    pub root: SyntaxNode,
    pub folds: Vec<FoldRegion>,
    pub errors: Vec<ParseError>,
}

/// A language pipeline bound to a set of options. Holds no per-run state, so
/// one engine can serve any number of runs.
#[derive(Clone)]
pub struct Engine {
    options: EngineOptions,
    pipeline: &'static dyn LanguagePipeline,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("language", &self.language())
            .field("options", &self.options)
            .finish()
    }
}

impl Engine {
    pub fn new(language: Language, options: EngineOptions) -> Self {
        Self {
            options,
            pipeline: pipeline(language),
        }
    }

    /// Resolve `name` (a language name, alias or extension) to an engine.
    pub fn from_name(name: &str, options: EngineOptions) -> Result<Self, EngineError> {
        Ok(Self::new(name.parse()?, options))
    }

    pub fn language(&self) -> Language {
        self.pipeline.language()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Tokenize, parse, fold and highlight `source`.
    pub fn run(&self, source: &str) -> Analysis {
        let tokens = self.pipeline.tokenize(source, Detail::Full);
        let ParseOutput { root, errors } = self.pipeline.parse(&tokens, source, Detail::Full);
        let index = LineIndex::new(source);
        let folds = fold_regions(&root, &index, self.options.fold_comments);
        let lines = highlight_lines(source, &tokens, &self.options);

        tracing::debug!(
            language = %self.language(),
            tokens = tokens.len(),
            nodes = root.count(),
            folds = folds.len(),
            errors = errors.len(),
            "full run"
        );
        Analysis {
            tokens,
            root,
            folds,
            lines,
            errors,
        }
    }

    /// Boundary tokens and nesting only; no highlighting.
    pub fn run_structure(&self, source: &str) -> StructureAnalysis {
        let tokens = self.pipeline.tokenize(source, Detail::Structure);
        let ParseOutput { root, errors } =
            self.pipeline.parse(&tokens, source, Detail::Structure);
        let folds = fold_regions(&root, &LineIndex::new(source), self.options.fold_comments);

        tracing::debug!(
            language = %self.language(),
            tokens = tokens.len(),
            folds = folds.len(),
            errors = errors.len(),
            "structure run"
        );
        StructureAnalysis { root, folds, errors }
    }
}
