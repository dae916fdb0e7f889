//! Rendering layer: the tree walker and the per-target output flavors.

pub mod html;
pub mod quarto;
pub mod snippets;
pub mod table;
pub mod walker;

pub use html::HtmlFlavor;
pub use quarto::QuartoFlavor;
pub use snippets::{ExampleBlock, SnippetStore};
pub use walker::{RenderContext, Rendered, Walker};

use crate::assets::ImageRef;
use crate::resolve::{Chapter, Level};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Output format for a render run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Html,
    Quarto,
}

impl Target {
    /// File extension of chapter pages.
    pub fn extension(self) -> &'static str {
        match self {
            Target::Html => "html",
            Target::Quarto => "qmd",
        }
    }

    pub fn flavor(self) -> &'static dyn Flavor {
        match self {
            Target::Html => &HtmlFlavor,
            Target::Quarto => &QuartoFlavor,
        }
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(Target::Html),
            "quarto" | "qmd" => Ok(Target::Quarto),
            other => Err(format!("unknown target '{}' (expected html or quarto)", other)),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Html => write!(f, "html"),
            Target::Quarto => write!(f, "quarto"),
        }
    }
}

/// Inline markup produced by the wrapper commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Markup {
    Emphasis,
    Bold,
    Code,
    SmallCaps,
    Underline,
}

impl Markup {
    /// The wrapper a command maps to, if any.
    pub fn for_command(name: &str) -> Option<Self> {
        match name {
            "textit" | "emph" | "concept" => Some(Markup::Emphasis),
            "textbf" | "paragraph" => Some(Markup::Bold),
            "texttt" | "ttt" | "fn" | "pkg" => Some(Markup::Code),
            "textsc" => Some(Markup::SmallCaps),
            "underline" => Some(Markup::Underline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Itemize,
    Enumerate,
    Description,
}

impl ListKind {
    pub fn for_environment(name: &str) -> Option<Self> {
        match name {
            "itemize" | "objectives" => Some(ListKind::Itemize),
            "enumerate" => Some(ListKind::Enumerate),
            "description" => Some(ListKind::Description),
            _ => None,
        }
    }
}

/// A chapter body ready to be wrapped in a page.
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    pub book_title: &'a str,
    pub chapter: &'a Chapter,
    pub body: &'a str,
    pub prev: Option<&'a Chapter>,
    pub next: Option<&'a Chapter>,
}

/// The target-specific vocabulary used by the walker.
///
/// Tables are emitted as HTML for both targets, so they are not part of
/// this trait.
pub trait Flavor: Send + Sync {
    fn target(&self) -> Target;

    fn paragraph_open(&self) -> &'static str;
    fn paragraph_close(&self) -> &'static str;

    /// Opening of a heading, including its number and anchor.
    fn heading_open(&self, level: Level, anchor: &str, number: &str) -> String;
    fn heading_close(&self, level: Level, anchor: &str) -> String;

    fn markup_open(&self, markup: Markup) -> &'static str;
    fn markup_close(&self, markup: Markup) -> &'static str;

    /// A classed block such as `figure` or `feature`.
    fn block_open(&self, class: &str) -> String;
    fn block_close(&self) -> String;

    /// Caption heading of a float; `title` is e.g. `Figure 3.1`.
    fn caption_open(&self, anchor: &str, title: &str) -> String;
    fn caption_close(&self) -> String;

    fn list_open(&self, kind: ListKind) -> &'static str;
    fn list_close(&self, kind: ListKind) -> &'static str;
    /// Opening of a list item. `nesting` is zero for a top-level list.
    fn item_open(&self, kind: ListKind, title: Option<&str>, nesting: usize) -> String;
    fn item_close(&self, kind: ListKind) -> &'static str;

    fn inline_math(&self, tex: &str) -> String;
    fn display_math(&self, tex: &str) -> String;

    fn inline_code(&self, code: &str) -> String;
    fn code_block(&self, code: &str, language: Option<&str>) -> String;

    fn link(&self, href: &str, text: &str) -> String;
    /// One cited entry, with the full reference available on hover.
    fn citation(&self, text: &str, reference: &str) -> String;
    /// Text in a named color or style class.
    fn span(&self, class: &str, text: &str) -> String;

    fn footnote_marker(&self, number: usize) -> String;
    /// The end-of-chapter note list, numbered from 1.
    fn footnotes(&self, notes: &[String]) -> String;

    fn image(&self, image: &ImageRef, alt: &str) -> String;

    /// A nested directory listing; each entry is `(depth, name)`.
    fn dirtree(&self, entries: &[(usize, String)]) -> String;

    /// Rows of code and output cells.
    fn example(&self, block: &ExampleBlock) -> String;

    /// Trusted HTML passed through, such as tables.
    fn raw_html(&self, html: &str) -> String;

    fn page(&self, page: &Page) -> String;

    /// The index files as `(file name, contents)` pairs.
    fn index(&self, title: &str, chapters: &[Chapter]) -> Vec<(String, String)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_from_str() {
        assert_eq!("HTML".parse::<Target>().unwrap(), Target::Html);
        assert_eq!("quarto".parse::<Target>().unwrap(), Target::Quarto);
        assert!("pdf".parse::<Target>().is_err());
    }

    #[test]
    fn test_target_extension() {
        assert_eq!(Target::Html.extension(), "html");
        assert_eq!(Target::Quarto.extension(), "qmd");
        assert_eq!(Target::Quarto.flavor().target(), Target::Quarto);
    }

    #[test]
    fn test_markup_for_command() {
        assert_eq!(Markup::for_command("concept"), Some(Markup::Emphasis));
        assert_eq!(Markup::for_command("pkg"), Some(Markup::Code));
        assert_eq!(Markup::for_command("section"), None);
    }
}
