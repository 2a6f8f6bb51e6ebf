use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use trellis_engine::{Engine, EngineOptions};
use trellis_lexer::{Detail, Language};

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "trellis: tokens, trees, folds and highlighting for markup, CSS and JS")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Input {
    /// Source file; the language is inferred from its extension
    path: String,

    /// Language name or alias, overriding the extension (html, css, js, ...)
    #[arg(long)]
    lang: Option<String>,

    /// Use the structure-only pipeline (boundary tokens, nesting, folds)
    #[arg(long)]
    structure: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the token stream as JSON, each token with its style class
    Tokens {
        #[command(flatten)]
        input: Input,
    },

    /// Print the syntax tree
    Tree {
        #[command(flatten)]
        input: Input,

        /// Print JSON instead of an indented outline
        #[arg(long)]
        json: bool,
    },

    /// Print fold regions as JSON
    Folds {
        #[command(flatten)]
        input: Input,

        /// Do not offer multi-line comments as fold regions
        #[arg(long)]
        no_fold_comments: bool,
    },

    /// Render highlighted HTML
    Highlight {
        #[command(flatten)]
        input: Input,

        /// Prefix for every style class
        #[arg(long, default_value = "hl-")]
        prefix: String,

        /// Leave whitespace between tokens unwrapped
        #[arg(long)]
        no_whitespace: bool,

        /// Wrap the output in a standalone HTML page
        #[arg(long)]
        standalone: bool,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Report structural errors; exits non-zero when there are any
    Check {
        #[command(flatten)]
        input: Input,
    },
}

fn main() {
    let filter = EnvFilter::try_from_env("TRELLIS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Tokens { input } => cmd_tokens(&input),
        Command::Tree { input, json } => cmd_tree(&input, json),
        Command::Folds {
            input,
            no_fold_comments,
        } => cmd_folds(&input, !no_fold_comments),
        Command::Highlight {
            input,
            prefix,
            no_whitespace,
            standalone,
            output,
        } => {
            let options = EngineOptions {
                class_prefix: prefix,
                mark_whitespace: !no_whitespace,
                ..EngineOptions::default()
            };
            cmd_highlight(&input, options, standalone, output.as_deref())
        }
        Command::Check { input } => cmd_check(&input),
    }
}

fn read_source(path: &str) -> String {
    let p = Path::new(path);
    if !p.exists() {
        eprintln!("Error: file not found: {path}");
        std::process::exit(1);
    }
    match std::fs::read_to_string(p) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            std::process::exit(1);
        }
    }
}

fn language_of(input: &Input) -> Language {
    let name = match &input.lang {
        Some(lang) => lang.as_str(),
        None => match Path::new(&input.path).extension().and_then(|e| e.to_str()) {
            Some(ext) => ext,
            None => {
                eprintln!("Error: cannot infer a language for {}; pass --lang", input.path);
                std::process::exit(1);
            }
        },
    };
    match name.parse::<Language>() {
        Ok(language) => {
            tracing::debug!(%language, path = %input.path, "resolved language");
            language
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn detail_of(input: &Input) -> Detail {
    if input.structure {
        Detail::Structure
    } else {
        Detail::Full
    }
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_tokens(input: &Input) {
    let source = read_source(&input.path);
    let language = language_of(input);
    let tokens = trellis_lexer::tokenize(language, &source, detail_of(input));
    print_json(&tokens);
}

fn cmd_tree(input: &Input, json: bool) {
    let source = read_source(&input.path);
    let language = language_of(input);
    let output = trellis_parser::parse_str(language, &source, detail_of(input));
    if json {
        print_json(&output.root);
    } else {
        print!("{}", output.root.outline());
    }
    for error in &output.errors {
        eprintln!("{}: {error}", input.path);
    }
}

fn cmd_folds(input: &Input, fold_comments: bool) {
    let source = read_source(&input.path);
    let options = EngineOptions {
        fold_comments,
        ..EngineOptions::default()
    };
    let engine = Engine::new(language_of(input), options);
    let folds = if input.structure {
        engine.run_structure(&source).folds
    } else {
        engine.run(&source).folds
    };
    print_json(&folds);
}

fn cmd_highlight(input: &Input, options: EngineOptions, standalone: bool, output: Option<&str>) {
    let source = read_source(&input.path);
    let engine = Engine::new(language_of(input), options);
    let body = engine.run(&source).html();

    let html = if standalone {
        let title = Path::new(&input.path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("trellis");
        let mut escaped_title = String::new();
        trellis_engine::escape_html(title, &mut escaped_title);

        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n  <meta charset=\"UTF-8\">\n");
        html.push_str(&format!("  <title>{escaped_title}</title>\n"));
        html.push_str("</head>\n<body>\n<pre>");
        html.push_str(&body);
        html.push_str("</pre>\n</body>\n</html>\n");
        html
    } else {
        body
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &html) {
                eprintln!("Error writing {path}: {e}");
                std::process::exit(1);
            }
            eprintln!("Wrote: {path}");
        }
        None => println!("{html}"),
    }
}

fn cmd_check(input: &Input) {
    let source = read_source(&input.path);
    let engine = Engine::new(language_of(input), EngineOptions::default());
    let errors = if input.structure {
        engine.run_structure(&source).errors
    } else {
        engine.run(&source).errors
    };

    if errors.is_empty() {
        eprintln!("OK: {}", input.path);
        return;
    }
    for error in &errors {
        eprintln!("{}:{}:{}: {}", input.path, error.span.line, error.span.column, error.message);
    }
    std::process::exit(1);
}
