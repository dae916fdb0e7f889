//! Syntax tree for LaTeX book sources.

use crate::error::RenderError;
use std::collections::VecDeque;

/// Sibling nodes as consumed by the walker: popped from the front, with
/// lookahead and push-back at the front.
pub type NodeQueue = VecDeque<Node>;

/// One element of the parsed document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A raw text run. Escapes (`\%`, `\'e`, `\\`) and comments stay raw.
    Text(String),

    /// A control word with its adjacent argument groups.
    Command { name: String, args: Vec<Arg> },

    /// A `\begin{name}...\end{name}` block.
    Environment {
        name: String,
        args: Vec<Arg>,
        children: Vec<Node>,
    },

    /// A bare `{...}` group
    Group(Vec<Node>),

    /// Math with its source kept verbatim.
    Math { display: bool, content: String },
}

/// Whether an argument group was written with braces or brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Required,
    Optional,
}

/// An argument group attached to a command or environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub kind: ArgKind,
    /// Parsed contents
    pub nodes: Vec<Node>,
    /// Exact source between the delimiters
    pub raw: String,
}

impl Arg {
    pub fn required(nodes: Vec<Node>, raw: impl Into<String>) -> Self {
        Self {
            kind: ArgKind::Required,
            nodes,
            raw: raw.into(),
        }
    }

    pub fn optional(nodes: Vec<Node>, raw: impl Into<String>) -> Self {
        Self {
            kind: ArgKind::Optional,
            nodes,
            raw: raw.into(),
        }
    }

    pub fn is_required(&self) -> bool {
        self.kind == ArgKind::Required
    }

    /// Argument source with surrounding whitespace removed.
    pub fn text(&self) -> &str {
        self.raw.trim()
    }
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(s.into())
    }

    pub fn command(name: impl Into<String>, args: Vec<Arg>) -> Self {
        Node::Command {
            name: name.into(),
            args,
        }
    }

    /// The syntactic role of the node, used for dispatch.
    pub fn name(&self) -> &str {
        match self {
            Node::Text(_) => "text",
            Node::Command { name, .. } | Node::Environment { name, .. } => name,
            Node::Group(_) => "group",
            Node::Math { display: false, .. } => "$",
            Node::Math { display: true, .. } => "$$",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }

    /// True for text runs holding only whitespace.
    pub fn is_blank(&self) -> bool {
        matches!(self, Node::Text(t) if t.trim().is_empty())
    }

    /// True for text runs holding only whitespace and `%` comments.
    pub fn is_blank_or_comment(&self) -> bool {
        match self {
            Node::Text(t) => t.lines().all(|line| {
                let line = line.trim_start();
                line.is_empty() || line.starts_with('%')
            }),
            _ => false,
        }
    }

    pub fn args(&self) -> &[Arg] {
        match self {
            Node::Command { args, .. } | Node::Environment { args, .. } => args,
            _ => &[],
        }
    }

    pub fn required_args(&self) -> Vec<&Arg> {
        self.args().iter().filter(|a| a.is_required()).collect()
    }

    pub fn optional_args(&self) -> Vec<&Arg> {
        self.args().iter().filter(|a| !a.is_required()).collect()
    }

    /// The single required argument.
    pub fn arg(&self) -> Result<&Arg, RenderError> {
        Ok(self.args_exact(1)?[0])
    }

    /// Exactly `n` required arguments, in order.
    pub fn args_exact(&self, n: usize) -> Result<Vec<&Arg>, RenderError> {
        let args = self.required_args();
        if args.len() != n {
            return Err(self.malformed(n, args.len()));
        }
        Ok(args)
    }

    /// At most one optional argument.
    pub fn optional_arg(&self) -> Result<Option<&Arg>, RenderError> {
        let args = self.optional_args();
        match args.len() {
            0 => Ok(None),
            1 => Ok(Some(args[0])),
            n => Err(self.malformed(1, n)),
        }
    }

    pub fn malformed(&self, expected: usize, found: usize) -> RenderError {
        RenderError::MalformedArgumentCount {
            node: self.name().to_string(),
            expected,
            found,
            raw: self.to_source(),
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Environment { children, .. } | Node::Group(children) => children,
            _ => &[],
        }
    }

    /// Take the node's children, leaving it empty.
    pub fn take_children(&mut self) -> Vec<Node> {
        match self {
            Node::Environment { children, .. } | Node::Group(children) => std::mem::take(children),
            _ => Vec::new(),
        }
    }

    /// Split the node into its arguments and children.
    pub fn into_parts(self) -> (Vec<Arg>, Vec<Node>) {
        match self {
            Node::Command { args, .. } => (args, Vec::new()),
            Node::Environment { args, children, .. } => (args, children),
            Node::Group(children) => (Vec::new(), children),
            Node::Text(_) | Node::Math { .. } => (Vec::new(), Vec::new()),
        }
    }

    pub fn into_args(self) -> Vec<Arg> {
        self.into_parts().0
    }

    pub fn into_children(self) -> Vec<Node> {
        self.into_parts().1
    }

    /// Contents of the `n`th required argument.
    pub fn into_required(self, n: usize) -> Vec<Node> {
        self.into_args()
            .into_iter()
            .filter(Arg::is_required)
            .nth(n)
            .map(|arg| arg.nodes)
            .unwrap_or_default()
    }

    /// Regenerate LaTeX source for this node.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        self.write_source(&mut out);
        out
    }

    fn write_source(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(t),
            Node::Command { name, args } => {
                out.push('\\');
                out.push_str(name);
                write_args(args, out);
            }
            Node::Environment {
                name,
                args,
                children,
            } if name == "item" => {
                out.push_str("\\item");
                write_args(args, out);
                for child in children {
                    child.write_source(out);
                }
            }
            Node::Environment {
                name,
                args,
                children,
            } => {
                out.push_str("\\begin{");
                out.push_str(name);
                out.push('}');
                write_args(args, out);
                for child in children {
                    child.write_source(out);
                }
                out.push_str("\\end{");
                out.push_str(name);
                out.push('}');
            }
            Node::Group(children) => {
                out.push('{');
                for child in children {
                    child.write_source(out);
                }
                out.push('}');
            }
            Node::Math {
                display: false,
                content,
            } => {
                out.push('$');
                out.push_str(content);
                out.push('$');
            }
            Node::Math {
                display: true,
                content,
            } => {
                out.push_str("$$");
                out.push_str(content);
                out.push_str("$$");
            }
        }
    }
}

fn write_args(args: &[Arg], out: &mut String) {
    for arg in args {
        let (open, close) = match arg.kind {
            ArgKind::Required => ('{', '}'),
            ArgKind::Optional => ('[', ']'),
        };
        out.push(open);
        out.push_str(&arg.raw);
        out.push(close);
    }
}

/// Concatenate the source of a node list.
pub fn source_of(nodes: &[Node]) -> String {
    nodes.iter().map(Node::to_source).collect()
}
