//! Build the node tree from the token stream.

use super::lexer::{line_of, Spanned, Token};
use crate::ast::{Arg, Node};
use crate::error::ParseError;

/// Commands that never take a brace argument, so a following group stays
/// a sibling.
const NO_BRACE_ARGS: &[&str] = &[
    "item",
    "centering",
    "noindent",
    "raggedright",
    "newpage",
    "clearpage",
    "midrule",
    "toprule",
    "bottomrule",
    "hline",
    "medskip",
    "smallskip",
    "bigskip",
    "hfill",
    "footnotesize",
    "em",
    "bf",
    "it",
    "tt",
];

/// Environments whose children are regrouped into `item` nodes.
pub const LIST_ENVIRONMENTS: &[&str] = &["itemize", "enumerate", "description", "objectives"];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stop<'a> {
    Eof,
    Brace(usize),
    Bracket(usize),
    End(&'a str, usize),
}

pub(crate) struct TreeBuilder<'s, 'a> {
    source: &'a str,
    tokens: &'s [Spanned<'a>],
    pos: usize,
}

impl<'s, 'a> TreeBuilder<'s, 'a> {
    pub(crate) fn new(source: &'a str, tokens: &'s [Spanned<'a>]) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
        }
    }

    pub(crate) fn build(mut self) -> Result<Vec<Node>, ParseError> {
        self.nodes(Stop::Eof)
    }

    fn line(&self, offset: usize) -> usize {
        line_of(self.source, offset)
    }

    fn syntax(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            line: self.line(offset),
            message: message.into(),
        }
    }

    fn nodes(&mut self, stop: Stop<'a>) -> Result<Vec<Node>, ParseError> {
        let tokens = self.tokens;
        let mut nodes = Vec::new();

        loop {
            let Some(spanned) = tokens.get(self.pos) else {
                return match stop {
                    Stop::Eof => Ok(nodes),
                    Stop::Brace(at) => Err(self.syntax(at, "unclosed group")),
                    Stop::Bracket(at) => Err(self.syntax(at, "unclosed optional argument")),
                    Stop::End(name, at) => {
                        Err(self.syntax(at, format!("missing \\end{{{}}}", name)))
                    }
                };
            };
            let offset = spanned.offset;
            self.pos += 1;

            match &spanned.token {
                Token::Text(t) | Token::Comment(t) => nodes.push(Node::text(*t)),
                Token::Escape(e) => {
                    let e: &str = e;
                    if e[1..].starts_with(char::is_whitespace) {
                        nodes.push(Node::text("\\ "));
                    } else {
                        nodes.push(Node::text(e));
                    }
                }
                Token::Accent(a) => nodes.push(Node::text(a.clone())),
                Token::InlineMath(m) => nodes.push(Node::Math {
                    display: false,
                    content: m.to_string(),
                }),
                Token::DisplayMath(m) => nodes.push(Node::Math {
                    display: true,
                    content: m.to_string(),
                }),
                Token::Verbatim { name, body } => nodes.push(verbatim_node(name, body)),
                Token::OpenBrace => {
                    let children = self.nodes(Stop::Brace(offset))?;
                    nodes.push(Node::Group(children));
                }
                Token::CloseBrace => {
                    if let Stop::Brace(_) = stop {
                        return Ok(nodes);
                    }
                    return Err(self.syntax(offset, "unmatched }"));
                }
                Token::OpenBracket => nodes.push(Node::text("[")),
                Token::CloseBracket => {
                    if let Stop::Bracket(_) = stop {
                        return Ok(nodes);
                    }
                    nodes.push(Node::text("]"));
                }
                Token::Command(name) => {
                    let braces = !NO_BRACE_ARGS.contains(name);
                    let args = self.args(braces)?;
                    nodes.push(Node::command(*name, args));
                }
                Token::Begin(name) => {
                    let args = self.args(true)?;
                    let mut children = self.nodes(Stop::End(*name, offset))?;
                    if LIST_ENVIRONMENTS.contains(name) {
                        children = group_items(children);
                    }
                    nodes.push(Node::Environment {
                        name: name.to_string(),
                        args,
                        children,
                    });
                }
                Token::End(name) => match stop {
                    Stop::End(expected, _) if expected == *name => return Ok(nodes),
                    Stop::End(expected, _) => {
                        return Err(self.syntax(
                            offset,
                            format!("\\end{{{}}} does not close \\begin{{{}}}", name, expected),
                        ))
                    }
                    _ => return Err(self.syntax(offset, format!("unexpected \\end{{{}}}", name))),
                },
            }
        }
    }

    /// Attach the argument groups directly following a command.
    fn args(&mut self, braces: bool) -> Result<Vec<Arg>, ParseError> {
        let tokens = self.tokens;
        let mut args = Vec::new();

        while let Some(next) = tokens.get(self.pos) {
            let open = next.offset;
            let required = match next.token {
                Token::OpenBrace if braces => true,
                Token::OpenBracket => false,
                _ => break,
            };
            self.pos += 1;

            let stop = if required {
                Stop::Brace(open)
            } else {
                Stop::Bracket(open)
            };
            let nodes = self.nodes(stop)?;
            let close = tokens[self.pos - 1].offset;
            let raw = &self.source[open + 1..close];

            args.push(if required {
                Arg::required(nodes, raw)
            } else {
                Arg::optional(nodes, raw)
            });
        }

        Ok(args)
    }
}

fn verbatim_node(name: &str, body: &str) -> Node {
    let mut args = Vec::new();
    let mut body = body;

    if name == "lstlisting" && body.starts_with('[') {
        if let Some(close) = body.find(']') {
            let raw = &body[1..close];
            args.push(Arg::optional(vec![Node::text(raw)], raw));
            body = &body[close + 1..];
        }
    }

    Node::Environment {
        name: name.to_string(),
        args,
        children: vec![Node::text(body)],
    }
}

/// Regroup list children into `item` environments split at `\item`.
fn group_items(children: Vec<Node>) -> Vec<Node> {
    let mut grouped = Vec::new();
    let mut current: Option<(Vec<Arg>, Vec<Node>)> = None;

    for node in children {
        match node {
            Node::Command { name, args } if name == "item" => {
                if let Some((args, children)) = current.take() {
                    grouped.push(item(args, children));
                }
                current = Some((args, Vec::new()));
            }
            other => match current.as_mut() {
                Some((_, children)) => children.push(other),
                None if other.is_blank() => {}
                None => grouped.push(other),
            },
        }
    }

    if let Some((args, children)) = current {
        grouped.push(item(args, children));
    }

    grouped
}

fn item(args: Vec<Arg>, children: Vec<Node>) -> Node {
    Node::Environment {
        name: "item".to_string(),
        args,
        children,
    }
}
