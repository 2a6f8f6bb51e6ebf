//! Fold analyzer.
//!
//! A node qualifies when there is at least one line strictly between its
//! first line and its last line: the region hides the lines after the
//! opener up to, but not including, the closing line. Candidates that open
//! on the same line are reduced to one by kind priority, the longest
//! candidate winning ties.

use serde::Serialize;
use trellis_parser::{FoldClass, NodeKind, SyntaxNode};

use crate::lines::LineIndex;

/// Lines `start_line + 1 ..= end_line` can be hidden under a marker on
/// `start_line`. Both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoldRegion {
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    region: FoldRegion,
    class: FoldClass,
    len: usize,
}

/// Foldable line ranges of the tree under `root`, ordered by start line.
pub fn fold_regions(root: &SyntaxNode, lines: &LineIndex, fold_comments: bool) -> Vec<FoldRegion> {
    let mut candidates = Vec::new();
    root.walk(&mut |node| {
        let Some(class) = node.kind.fold_class() else {
            return;
        };
        if !fold_comments && node.kind == NodeKind::Comment {
            return;
        }
        let start_line = lines.line_of(node.start());
        let last_line = lines.line_of(node.end().saturating_sub(1).max(node.start()));
        if last_line > start_line + 1 {
            candidates.push(Candidate {
                region: FoldRegion {
                    start_line,
                    end_line: last_line - 1,
                },
                class,
                len: node.end() - node.start(),
            });
        }
    });

    candidates.sort_by(|a, b| {
        a.region
            .start_line
            .cmp(&b.region.start_line)
            .then(b.len.cmp(&a.len))
    });

    let mut regions: Vec<FoldRegion> = Vec::new();
    let mut best: Option<Candidate> = None;
    for candidate in candidates {
        match best {
            Some(current) if current.region.start_line == candidate.region.start_line => {
                if candidate.class > current.class {
                    best = Some(candidate);
                }
            }
            _ => {
                regions.extend(best.map(|c| c.region));
                best = Some(candidate);
            }
        }
    }
    regions.extend(best.map(|c| c.region));
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trellis_lexer::{Detail, Language};
    use trellis_parser::parse_str;

    fn folds(language: Language, source: &str, detail: Detail) -> Vec<FoldRegion> {
        let out = parse_str(language, source, detail);
        fold_regions(&out.root, &LineIndex::new(source), true)
    }

    fn region(start_line: usize, end_line: usize) -> FoldRegion {
        FoldRegion {
            start_line,
            end_line,
        }
    }

    #[test]
    fn test_single_line_block_does_not_fold() {
        assert_eq!(folds(Language::Stylesheet, "a{color:red}", Detail::Full), vec![]);
    }

    #[test]
    fn test_two_line_block_does_not_fold() {
        assert_eq!(folds(Language::Stylesheet, "a{\n}", Detail::Full), vec![]);
    }

    #[test]
    fn test_block_folds_up_to_closing_line() {
        for detail in [Detail::Structure, Detail::Full] {
            assert_eq!(
                folds(Language::Stylesheet, "a{\n  color:red;\n}", detail),
                vec![region(1, 2)]
            );
        }
    }

    #[test]
    fn test_element_with_nested_comment() {
        assert_eq!(
            folds(Language::Markup, "<div><!-- x --></div>", Detail::Full),
            vec![]
        );
        assert_eq!(
            folds(Language::Markup, "<div>\n<!-- x -->\n</div>", Detail::Full),
            vec![region(1, 2)]
        );
    }

    #[test]
    fn test_function_body() {
        let source = "function f() {\n  return 1;\n}";
        assert_eq!(folds(Language::Script, source, Detail::Full), vec![region(1, 2)]);
        assert_eq!(folds(Language::Script, source, Detail::Structure), vec![region(1, 2)]);
    }

    #[test]
    fn test_block_outranks_bracket_on_same_line() {
        // The array opens on line 1 and is longer than the block.
        let source = "x = [{\n  a: 1,\n  b: 2\n}, {\n  c: 3\n}\n];";
        assert_eq!(
            folds(Language::Script, source, Detail::Full),
            vec![region(1, 3), region(4, 5)]
        );
    }

    #[test]
    fn test_nested_regions_found() {
        let source = "<ul>\n  <li>\n    a\n  </li>\n</ul>";
        assert_eq!(
            folds(Language::Markup, source, Detail::Structure),
            vec![region(1, 4), region(2, 3)]
        );
    }

    #[test]
    fn test_comment_folding_can_be_disabled() {
        let source = "/*\n a\n b\n*/";
        let out = parse_str(Language::Stylesheet, source, Detail::Structure);
        let lines = LineIndex::new(source);
        assert_eq!(fold_regions(&out.root, &lines, true), vec![region(1, 3)]);
        assert_eq!(fold_regions(&out.root, &lines, false), vec![]);
    }

    #[test]
    fn test_unclosed_block_folds_to_end_of_input() {
        assert_eq!(
            folds(Language::Script, "if (a) {\n  b\n  c", Detail::Structure),
            vec![region(1, 2)]
        );
    }

    #[test]
    fn test_embedded_regions_fold() {
        let source = "<script>\nfunction f() {\n  a\n}\n</script>";
        assert_eq!(
            folds(Language::Markup, source, Detail::Full),
            vec![region(1, 4), region(2, 3)]
        );
    }
}
