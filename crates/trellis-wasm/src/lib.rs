//! WASM bindings for the trellis analysis pipeline.
//!
//! Exposes an `Analyzer` class plus one-shot `analyze()` and `foldRegions()`
//! functions to JavaScript via wasm-bindgen. Every offset handed to
//! JavaScript is a UTF-16 code unit index so it lines up with string indexing
//! and caret positions on the editor side; line numbers are 1-based.

use serde::Serialize;
use trellis_engine::{Analysis, Engine, EngineOptions, FoldRegion, StructureAnalysis};
use trellis_lexer::{for_each_leaf, Token, TokenKind};
use trellis_parser::{NodeKind, ParseError, SyntaxNode};
use wasm_bindgen::prelude::*;

// =========================================================================
// Offsets
// =========================================================================

/// Maps UTF-8 byte offsets of one source to UTF-16 code unit offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utf16Offsets {
    /// `None` for ASCII sources, where both encodings agree.
    table: Option<Vec<usize>>,
}

impl Utf16Offsets {
    pub fn new(source: &str) -> Self {
        if source.is_ascii() {
            return Self { table: None };
        }
        let mut table = vec![0; source.len() + 1];
        let mut units = 0;
        for (at, c) in source.char_indices() {
            table[at..at + c.len_utf8()].fill(units);
            units += c.len_utf16();
        }
        table[source.len()] = units;
        Self { table: Some(table) }
    }

    /// UTF-16 offset of the character containing byte `offset`. Offsets past
    /// the end map to the end.
    pub fn get(&self, offset: usize) -> usize {
        match &self.table {
            None => offset,
            Some(table) => table
                .get(offset)
                .or_else(|| table.last())
                .copied()
                .unwrap_or_default(),
        }
    }
}

// =========================================================================
// Exported shapes
// =========================================================================

/// A leaf token. `kind` flattens to `type` plus any payload (`name` for
/// tags); leaves are never embedded regions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenOut<'a> {
    #[serde(flatten)]
    pub kind: &'a TokenKind,
    pub style_class: &'static str,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub unterminated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeOut<'a> {
    #[serde(flatten)]
    pub kind: &'a NodeKind,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeOut<'a>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorOut<'a> {
    pub message: &'a str,
    pub start: usize,
    pub end: usize,
    pub line: usize,
}

/// Leaf tokens, embedded regions flattened, in source order.
pub fn export_tokens<'a>(tokens: &'a [Token], offsets: &Utf16Offsets) -> Vec<TokenOut<'a>> {
    let mut out = Vec::new();
    for_each_leaf(tokens, &mut |token| {
        out.push(TokenOut {
            kind: &token.kind,
            style_class: token.style_class(),
            text: &token.text,
            start: offsets.get(token.span.start),
            end: offsets.get(token.span.end),
            line: token.span.line,
            unterminated: token.unterminated,
        });
    });
    out
}

pub fn export_tree<'a>(node: &'a SyntaxNode, offsets: &Utf16Offsets) -> NodeOut<'a> {
    NodeOut {
        kind: &node.kind,
        start: offsets.get(node.start()),
        end: offsets.get(node.end()),
        line: node.span.line,
        children: node.children.iter().map(|c| export_tree(c, offsets)).collect(),
    }
}

pub fn export_errors<'a>(errors: &'a [ParseError], offsets: &Utf16Offsets) -> Vec<ErrorOut<'a>> {
    errors
        .iter()
        .map(|e| ErrorOut {
            message: &e.message,
            start: offsets.get(e.span.start),
            end: offsets.get(e.span.end),
            line: e.span.line,
        })
        .collect()
}

// =========================================================================
// JS surface
// =========================================================================

fn options_from(value: JsValue) -> Result<EngineOptions, JsError> {
    if value.is_undefined() || value.is_null() {
        return Ok(EngineOptions::default());
    }
    Ok(serde_wasm_bindgen::from_value(value)?)
}

/// Plain objects rather than `Map`s for the flattened records.
fn to_js(value: &impl Serialize) -> Result<JsValue, JsError> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    Ok(value.serialize(&serializer)?)
}

fn set(target: &js_sys::Object, key: &str, value: &impl Serialize) -> Result<(), JsError> {
    let value = to_js(value)?;
    js_sys::Reflect::set(target, &key.into(), &value)
        .map_err(|_| JsError::new(&format!("Failed to set {key} property")))?;
    Ok(())
}

/// `{ tokens, tree, folds, lines, html, errors }`
fn full_result(source: &str, analysis: &Analysis) -> Result<JsValue, JsError> {
    let offsets = Utf16Offsets::new(source);
    let obj = js_sys::Object::new();
    set(&obj, "tokens", &export_tokens(&analysis.tokens, &offsets))?;
    set(&obj, "tree", &export_tree(&analysis.root, &offsets))?;
    set(&obj, "folds", &analysis.folds)?;
    set(&obj, "lines", &analysis.lines)?;
    set(&obj, "html", &analysis.html())?;
    set(&obj, "errors", &export_errors(&analysis.errors, &offsets))?;
    Ok(obj.into())
}

/// `{ tree, folds, errors }`
fn structure_result(source: &str, analysis: &StructureAnalysis) -> Result<JsValue, JsError> {
    let offsets = Utf16Offsets::new(source);
    let obj = js_sys::Object::new();
    set(&obj, "tree", &export_tree(&analysis.root, &offsets))?;
    set(&obj, "folds", &analysis.folds)?;
    set(&obj, "errors", &export_errors(&analysis.errors, &offsets))?;
    Ok(obj.into())
}

/// An engine bound to one language and one set of options.
///
/// Throws from the constructor when the language is unknown or the options
/// object has the wrong shape.
#[wasm_bindgen]
pub struct Analyzer {
    engine: Engine,
}

#[wasm_bindgen]
impl Analyzer {
    #[wasm_bindgen(constructor)]
    pub fn new(language: &str, options: JsValue) -> Result<Analyzer, JsError> {
        let engine = Engine::from_name(language, options_from(options)?)?;
        Ok(Self { engine })
    }

    #[wasm_bindgen(getter)]
    pub fn language(&self) -> String {
        self.engine.language().to_string()
    }

    /// Full run: tokens, tree, fold regions, highlighted lines and errors.
    pub fn analyze(&self, source: &str) -> Result<JsValue, JsError> {
        full_result(source, &self.engine.run(source))
    }

    /// Structure-only run: tree, fold regions and errors.
    #[wasm_bindgen(js_name = analyzeStructure)]
    pub fn analyze_structure(&self, source: &str) -> Result<JsValue, JsError> {
        structure_result(source, &self.engine.run_structure(source))
    }
}

/// One-shot full run. `options` may be `undefined`.
#[wasm_bindgen]
pub fn analyze(language: &str, source: &str, options: JsValue) -> Result<JsValue, JsError> {
    let engine = Engine::from_name(language, options_from(options)?)?;
    full_result(source, &engine.run(source))
}

/// Fold regions from a structure-only run with default options.
#[wasm_bindgen(js_name = foldRegions)]
pub fn fold_regions(language: &str, source: &str) -> Result<JsValue, JsError> {
    let engine = Engine::from_name(language, EngineOptions::default())?;
    let folds: Vec<FoldRegion> = engine.run_structure(source).folds;
    to_js(&folds)
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trellis_lexer::Language;

    // =========================================================================
    // Native tests (non-WASM): the export shapes and offset mapping
    // =========================================================================

    fn engine(language: Language) -> Engine {
        Engine::new(language, EngineOptions::default())
    }

    #[test]
    fn test_ascii_offsets_are_identity() {
        let offsets = Utf16Offsets::new("abc");
        assert_eq!(offsets, Utf16Offsets { table: None });
        assert_eq!(offsets.get(2), 2);
    }

    #[test]
    fn test_multibyte_offsets() {
        // é is 2 bytes / 1 unit, 😀 is 4 bytes / 2 units.
        let offsets = Utf16Offsets::new("é😀a");
        assert_eq!(offsets.get(0), 0);
        assert_eq!(offsets.get(2), 1);
        assert_eq!(offsets.get(6), 3);
        assert_eq!(offsets.get(7), 4);
        assert_eq!(offsets.get(100), 4);
    }

    #[test]
    fn test_export_tokens_converts_offsets() {
        let source = "/* é */ x";
        let analysis = engine(Language::Script).run(source);
        let tokens = export_tokens(&analysis.tokens, &Utf16Offsets::new(source));
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].style_class, "comment");
        assert_eq!((tokens[0].start, tokens[0].end), (0, 7));
        assert_eq!(tokens[1].text, "x");
        assert_eq!((tokens[1].start, tokens[1].end), (8, 9));
    }

    #[test]
    fn test_export_tokens_carry_kind() {
        let source = "<p>x</p>";
        let analysis = engine(Language::Markup).run(source);
        let tokens = export_tokens(&analysis.tokens, &Utf16Offsets::new(source));
        assert_eq!(*tokens[0].kind, TokenKind::TagOpen { name: "p".into() });
        assert_eq!(*tokens[2].kind, TokenKind::Text);

        let json = serde_json::to_value(&tokens[0]).unwrap();
        assert_eq!(json["type"], "tag-open");
        assert_eq!(json["name"], "p");
        assert_eq!(json["styleClass"], "tag");
        assert_eq!(json["text"], "<p");
        assert_eq!((json["start"].as_u64(), json["end"].as_u64()), (Some(0), Some(2)));
    }

    #[test]
    fn test_export_tree_is_bounded_for_deep_input() {
        let source = "<div>".repeat(10_000);
        let analysis = engine(Language::Markup).run_structure(&source);
        let tree = export_tree(&analysis.root, &Utf16Offsets::new(&source));
        let mut depth = 0;
        let mut node = &tree;
        while let Some(child) = node.children.first() {
            depth += 1;
            node = child;
        }
        assert!(depth <= trellis_parser::MAX_DEPTH + 1);
    }

    #[test]
    fn test_export_tokens_flattens_embedded() {
        let source = "<style>a{}</style>";
        let analysis = engine(Language::Markup).run(source);
        let tokens = export_tokens(&analysis.tokens, &Utf16Offsets::new(source));
        assert!(tokens.iter().all(|t| t.style_class != "embedded"));
        assert!(tokens.iter().any(|t| t.style_class == "selector"));
    }

    #[test]
    fn test_export_tree() {
        let source = "ü {\n  a: b;\n}";
        let analysis = engine(Language::Stylesheet).run_structure(source);
        let tree = export_tree(&analysis.root, &Utf16Offsets::new(source));
        assert_eq!(*tree.kind, NodeKind::Document);
        assert_eq!(tree.end, source.chars().count());
        assert_eq!(*tree.children[0].kind, NodeKind::Block);
        assert_eq!(tree.children[0].start, 2);
    }

    #[test]
    fn test_export_errors() {
        let source = "ü }";
        let analysis = engine(Language::Script).run(source);
        let errors = export_errors(&analysis.errors, &Utf16Offsets::new(source));
        assert_eq!(errors.len(), 1);
        assert_eq!((errors[0].start, errors[0].end, errors[0].line), (2, 3, 1));
    }

    #[test]
    fn test_version() {
        let v = version();
        assert!(!v.is_empty());
        assert!(v.contains('.'));
    }
}
