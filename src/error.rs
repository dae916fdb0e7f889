//! Error types for the texbook library.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an IO error with the path that caused it.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Read {
            path: path.into(),
            source,
        }
    }
}

/// Errors that occur while reading LaTeX sources.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Unexpected end of input")]
    UnexpectedEof,

    #[error("Unbalanced braces in: {0}")]
    UnbalancedBraces(String),
}

/// Errors that occur while building the label index or the bibliography.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Malformed label record: {line}")]
    MalformedRecord { line: String },

    #[error("Invalid bibliography: {0}")]
    Bibliography(String),
}

/// Errors that abort the rendering of a chapter.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Unknown citation key: {0}")]
    UnresolvedCitationKey(String),

    #[error("\\{node} expects {expected} argument(s), found {found}: {raw}")]
    MalformedArgumentCount {
        node: String,
        expected: usize,
        found: usize,
        raw: String,
    },

    #[error("Unrecognized escape sequence near {excerpt:?}")]
    UnrecognizedEscape { excerpt: String },

    #[error("Invalid argument to \\{node}: {message}")]
    InvalidArgument { node: String, message: String },

    #[error("Missing snippet file {}", path.display())]
    Snippet { path: PathBuf },

    #[error("Image error: {0}")]
    Image(String),

    #[error("Command `{command}` failed with status {status:?}")]
    Subprocess { command: String, status: Option<i32> },

    #[error("Command `{command}` timed out after {seconds}s")]
    SubprocessTimeout { command: String, seconds: u64 },
}

/// A recoverable problem found while rendering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Diagnostic {
    /// A node had no handler and was left out of the output.
    UnknownNodeKind(String),
    /// A cross-reference label was missing from the label index.
    UnresolvedReference(String),
}

/// Recoverable problems collected during one chapter walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub unknown_nodes: std::collections::BTreeSet<String>,
    pub unresolved_references: Vec<String>,
}

impl Diagnostics {
    pub fn record(&mut self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::UnknownNodeKind(name) => {
                self.unknown_nodes.insert(name);
            }
            Diagnostic::UnresolvedReference(label) => {
                if !self.unresolved_references.contains(&label) {
                    self.unresolved_references.push(label);
                }
            }
        }
    }

    /// Fold another walk's diagnostics into this one.
    pub fn merge(&mut self, other: Diagnostics) {
        self.unknown_nodes.extend(other.unknown_nodes);
        for label in other.unresolved_references {
            self.record(Diagnostic::UnresolvedReference(label));
        }
    }

    pub fn is_clean(&self) -> bool {
        self.unknown_nodes.is_empty() && self.unresolved_references.is_empty()
    }

    pub fn len(&self) -> usize {
        self.unknown_nodes.len() + self.unresolved_references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_clean()
    }

    pub fn iter(&self) -> impl Iterator<Item = Diagnostic> + '_ {
        self.unknown_nodes
            .iter()
            .cloned()
            .map(Diagnostic::UnknownNodeKind)
            .chain(
                self.unresolved_references
                    .iter()
                    .cloned()
                    .map(Diagnostic::UnresolvedReference),
            )
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::UnknownNodeKind(name) => write!(f, "unknown node kind: {}", name),
            Diagnostic::UnresolvedReference(label) => write!(f, "unresolved reference: {}", label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_merge_dedupes() {
        let mut a = Diagnostics::default();
        a.record(Diagnostic::UnknownNodeKind("foo".into()));
        a.record(Diagnostic::UnresolvedReference("sec:x".into()));

        let mut b = Diagnostics::default();
        b.record(Diagnostic::UnknownNodeKind("foo".into()));
        b.record(Diagnostic::UnresolvedReference("sec:x".into()));
        b.record(Diagnostic::UnresolvedReference("fig:y".into()));

        a.merge(b);
        assert_eq!(a.unknown_nodes.len(), 1);
        assert_eq!(a.unresolved_references, vec!["sec:x", "fig:y"]);
        assert!(!a.is_clean());
        assert_eq!(a.iter().count(), 3);
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = RenderError::UnresolvedCitationKey("smith2020".into());
        assert!(err.to_string().contains("smith2020"));

        let err = RenderError::MalformedArgumentCount {
            node: "refsec".into(),
            expected: 1,
            found: 2,
            raw: "\\refsec{a}{b}".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("refsec"));
        assert!(msg.contains("found 2"));
    }
}
