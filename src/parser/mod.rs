//! Reader for LaTeX book sources.

pub mod kwargs;
pub mod lexer;
mod tree;

pub use kwargs::{parse_kwargs, Kwargs};
pub use tree::LIST_ENVIRONMENTS;

use crate::ast::Node;
use crate::error::ParseError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\verb\*?(?:\|([^|\n]*)\||\+([^+\n]*)\+|!([^!\n]*)!)").expect("valid regex")
});

/// Parse preprocessed LaTeX source into a node list.
pub fn parse(input: &str) -> Result<Vec<Node>, ParseError> {
    let tokens = lexer::tokenize(input)?;
    tree::TreeBuilder::new(input, &tokens).build()
}

/// Verbatim snippets pulled out of the source before parsing.
///
/// Inline `\verb` bodies cannot go through the tree reader, so the pre-pass
/// swaps each one for `\verbplaceholder{N}` and keeps the body here. All
/// files of a chapter share one context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessContext {
    verbs: Vec<String>,
}

impl PreprocessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `\verb` spans with placeholders, recording their bodies.
    pub fn preprocess(&mut self, tex: &str) -> String {
        VERB.replace_all(tex, |caps: &Captures| {
            let body = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());
            self.verbs.push(body.to_string());
            format!("\\verbplaceholder{{{}}}", self.verbs.len() - 1)
        })
        .into_owned()
    }

    /// The verbatim body for a placeholder index.
    pub fn verb(&self, index: usize) -> Option<&str> {
        self.verbs.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.verbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ArgKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_command_args() {
        let nodes = parse("\\pyrex[caption={A, B}]{chapter03/read}").unwrap();
        assert_eq!(nodes.len(), 1);
        let args = nodes[0].args();
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].kind, ArgKind::Optional);
        assert_eq!(args[0].raw, "caption={A, B}");
        assert_eq!(args[1].raw, "chapter03/read");
    }

    #[test]
    fn test_parse_environment() {
        let nodes = parse("\\begin{figure}[h]\n\\caption{A}\\label{fig:a}\n\\end{figure}").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name(), "figure");
        assert_eq!(nodes[0].optional_args().len(), 1);
        let names: Vec<&str> = nodes[0].children().iter().map(Node::name).collect();
        assert_eq!(names, vec!["text", "caption", "label", "text"]);
    }

    #[test]
    fn test_list_items_are_grouped() {
        let nodes = parse("\\begin{itemize}\n\\item one\n\\item[B] two\n\\end{itemize}").unwrap();
        let items = nodes[0].children();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name(), "item");
        assert_eq!(items[0].children(), &[Node::text(" one\n")]);
        assert_eq!(items[1].optional_args()[0].raw, "B");
    }

    #[test]
    fn test_item_does_not_swallow_group() {
        let nodes = parse("\\begin{enumerate}\\item {x}\\end{enumerate}").unwrap();
        let item = &nodes[0].children()[0];
        assert!(item.args().is_empty());
        assert_eq!(item.children().len(), 2);
    }

    #[test]
    fn test_mismatched_end_is_error() {
        let err = parse("\\begin{figure}\n\\end{table}").unwrap_err();
        match err {
            ParseError::Syntax { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("table"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unclosed_group_is_error() {
        assert!(parse("\\textbf{oops").is_err());
        assert!(parse("stray }").is_err());
    }

    #[test]
    fn test_stray_brackets_are_text() {
        let nodes = parse("see [1] here").unwrap();
        let text: String = nodes.iter().map(Node::to_source).collect();
        assert_eq!(text, "see [1] here");
    }

    #[test]
    fn test_preprocess_verb() {
        let mut ctx = PreprocessContext::new();
        let out = ctx.preprocess("use \\verb|x <- 1| or \\verb+a|b+.");
        assert_eq!(out, "use \\verbplaceholder{0} or \\verbplaceholder{1}.");
        assert_eq!(ctx.verb(0), Some("x <- 1"));
        assert_eq!(ctx.verb(1), Some("a|b"));
        assert_eq!(ctx.verb(2), None);

        let out = ctx.preprocess("\\verb!z!");
        assert_eq!(out, "\\verbplaceholder{2}");
        assert_eq!(ctx.len(), 3);
    }
}
