//! Token stream to escaped, class-annotated HTML, one string per line.
//!
//! Source between tokens is emitted as plain escaped text with visible
//! whitespace markers. Tokens spanning line breaks are split so every line
//! is balanced markup on its own.

use trellis_lexer::{for_each_leaf, Token};

use crate::EngineOptions;

/// Escape the five characters with meaning in HTML text and attributes.
pub fn escape_html(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

struct LineWriter<'o> {
    options: &'o EngineOptions,
    done: Vec<String>,
    line: String,
}

impl<'o> LineWriter<'o> {
    fn new(options: &'o EngineOptions) -> Self {
        Self {
            options,
            done: Vec::new(),
            line: String::new(),
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.done.push(self.line);
        self.done
    }

    fn open_span(&mut self, class: &str) {
        self.line.push_str("<span class=\"");
        escape_html(&self.options.class_prefix, &mut self.line);
        escape_html(class, &mut self.line);
        self.line.push_str("\">");
    }

    fn close_span(&mut self) {
        self.line.push_str("</span>");
    }

    /// Pieces of `text` between line breaks, starting a new output line at
    /// each break. A `\r` directly before a break is dropped.
    fn for_each_line(&mut self, text: &str, mut emit: impl FnMut(&mut Self, &str)) {
        let mut pieces = text.split('\n').peekable();
        while let Some(piece) = pieces.next() {
            let last = pieces.peek().is_none();
            let piece = if last {
                piece
            } else {
                piece.strip_suffix('\r').unwrap_or(piece)
            };
            if !piece.is_empty() {
                emit(self, piece);
            }
            if !last {
                self.done.push(std::mem::take(&mut self.line));
            }
        }
    }

    fn token(&mut self, text: &str, class: &str) {
        self.for_each_line(text, |w, piece| {
            w.open_span(class);
            escape_html(piece, &mut w.line);
            w.close_span();
        });
    }

    fn plain(&mut self, text: &str) {
        self.for_each_line(text, |w, piece| {
            if !w.options.mark_whitespace {
                escape_html(piece, &mut w.line);
                return;
            }
            let mut rest = piece;
            while let Some(c) = rest.chars().next() {
                match c {
                    ' ' => {
                        let run = rest.len() - rest.trim_start_matches(' ').len();
                        w.open_span("ws-space");
                        w.line.push_str(&rest[..run]);
                        w.close_span();
                        rest = &rest[run..];
                    }
                    '\t' => {
                        w.open_span("ws-tab");
                        w.line.push('\t');
                        w.close_span();
                        rest = &rest[1..];
                    }
                    _ => {
                        let run = rest.find([' ', '\t']).unwrap_or(rest.len());
                        escape_html(&rest[..run], &mut w.line);
                        rest = &rest[run..];
                    }
                }
            }
        });
    }
}

/// Highlighted markup for each line of `source`.
pub fn highlight_lines(source: &str, tokens: &[Token], options: &EngineOptions) -> Vec<String> {
    let mut writer = LineWriter::new(options);
    let mut pos = 0;

    for_each_leaf(tokens, &mut |token| {
        let (start, end) = (token.span.start, token.span.end);
        if start < pos {
            return;
        }
        writer.plain(source.get(pos..start).unwrap_or_default());
        writer.token(source.get(start..end).unwrap_or_default(), token.style_class());
        pos = end;
    });
    writer.plain(source.get(pos..).unwrap_or_default());

    writer.finish()
}

/// Highlighted markup for the whole document, lines joined with `\n`.
pub fn highlight(source: &str, tokens: &[Token], options: &EngineOptions) -> String {
    highlight_lines(source, tokens, options).join("\n")
}
