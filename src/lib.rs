//! # texbook
//!
//! Convert a LaTeX book into a static HTML site or a Quarto book project.
//!
//! The conversion runs in three stages:
//!
//! 1. **Resolve**: read the `.aux` files LaTeX left behind to learn every
//!    chapter, section, and float number, and load the `.bbl` bibliography.
//! 2. **Parse**: read each chapter's source (with `\input` files expanded)
//!    into a tree of commands, environments, math, and text.
//! 3. **Render**: walk the tree and emit one page per chapter in the
//!    chosen flavor, plus an index page.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use texbook::{Book, Config};
//!
//! let config = Config::load(Path::new("book.toml"))?;
//! let book = Book::open(config)?;
//! let report = book.render(&[])?;
//! for chapter in report.with_diagnostics() {
//!     println!("chapter {}: {} problems", chapter.ordinal, chapter.diagnostics.len());
//! }
//! # Ok::<(), texbook::Error>(())
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! [book]
//! title = "Data Science in Python and R"
//! base = "."
//! aux = "main.aux"
//! bibliography = "main.bbl"
//! snippets = "snippets"
//!
//! [output]
//! dir = "site"
//! target = "html"      # or "quarto"
//! parallel = true
//! ```
//!
//! ## Supported Markup
//!
//! - Sectioning (`\chapter` through `\subsubsection`, starred forms unnumbered)
//! - Cross references (`\ref`, `\refchap`, `\refsec`, `\reffig`, ...) and
//!   natbib citations (`\citep`, `\citet`, `\citealp`, ...)
//! - Figures, tables, `tabular` with `\multicolumn`, lists, footnotes
//! - Inline and display math, passed through for client-side rendering
//! - Code examples backed by pre-rendered snippet files (`\pyrex`,
//!   `\codex`, `tcbraster`)
//! - TikZ pictures, compiled to PNG with `pdflatex` when available

pub mod assets;
pub mod ast;
pub mod bibliography;
pub mod book;
pub mod config;
pub mod error;
pub mod normalize;
pub mod parser;
pub mod process;
pub mod render;
pub mod resolve;

// Convenience re-exports
pub use book::{Book, ChapterReport, Report};
pub use config::Config;
pub use error::{Diagnostic, Diagnostics, Error, ParseError, RenderError, Result};
pub use parser::{parse, PreprocessContext};
pub use render::{RenderContext, Rendered, Target, Walker};
pub use resolve::Resolver;

/// Load `config_path` and render every chapter of the book it describes.
///
/// This is a convenience wrapper around [`Config::load`], [`Book::open`],
/// and [`Book::render`].
pub fn render_book(config_path: impl AsRef<std::path::Path>) -> Result<Report> {
    let config = Config::load(config_path.as_ref())?;
    Book::open(config)?.render(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_full_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("main.aux"),
            "\\newlabel{chap:start}{{1}{1}{Getting started}{chapter.1}{}}\n\
             \\newlabel{sec:install}{{1.1}{2}{Installing}{section.1.1}{}}\n",
        )
        .unwrap();
        fs::write(
            root.join("main.tex"),
            "\\chapter{Getting started}\\label{chap:start}\n\
             \\section{Installing}\\label{sec:install}\n\
             Run $x^2$ and see Section~\\ref{sec:install}.\n",
        )
        .unwrap();
        fs::write(
            root.join("book.toml"),
            "[book]\ntitle = \"Pipeline\"\n\n[output]\ndir = \"site\"\n",
        )
        .unwrap();

        let report = render_book(root.join("book.toml")).unwrap();
        assert!(report.is_success());
        assert_eq!(report.chapters.len(), 1);

        let html = fs::read_to_string(&report.chapters[0].output).unwrap();
        assert!(html.contains("Installing"));
        assert!(html.contains("\\(x^2\\)"));
        assert!(html.contains("1.1"));
    }
}
