//! Lexer for tokenizing LaTeX source.

use crate::error::ParseError;
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while1},
    character::complete::{char, not_line_ending, one_of, satisfy},
    combinator::{map, opt, recognize, value},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// Environments whose body is kept as raw text.
pub const VERBATIM_ENVIRONMENTS: &[&str] = &["verbatim", "lstlisting", "Verbatim"];

/// A token from the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    Text(&'a str),
    /// Control symbol such as `\%`, `\\` or `\ `
    Escape(&'a str),
    /// Accent with its base letter, canonicalized to `\'e`
    Accent(String),
    Comment(&'a str),
    /// Control word, name without the backslash
    Command(&'a str),
    Begin(&'a str),
    End(&'a str),
    Verbatim { name: &'a str, body: &'a str },
    InlineMath(&'a str),
    DisplayMath(&'a str),
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
}

/// A token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<'a> {
    pub token: Token<'a>,
    pub offset: usize,
}

/// Split LaTeX source into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Spanned<'_>>, ParseError> {
    let mut tokens = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        let offset = input.len() - rest.len();
        match token(rest) {
            Ok((next, token)) => {
                tokens.push(Spanned { token, offset });
                rest = next;
            }
            Err(_) => {
                let message = match rest.chars().next() {
                    Some('$') => "unterminated math".to_string(),
                    Some('\\') if rest.starts_with("\\begin") => {
                        "unterminated verbatim environment".to_string()
                    }
                    Some(c) => format!("unexpected input {:?}", c),
                    None => "unexpected input".to_string(),
                };
                return Err(ParseError::Syntax {
                    line: line_of(input, offset),
                    message,
                });
            }
        }
    }

    Ok(tokens)
}

/// One-based line number of a byte offset.
pub fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((
        comment,
        display_math,
        inline_math,
        bracket_math,
        paren_math,
        verbatim,
        begin,
        end,
        accent,
        command,
        escape,
        value(Token::OpenBrace, char('{')),
        value(Token::CloseBrace, char('}')),
        value(Token::OpenBracket, char('[')),
        value(Token::CloseBracket, char(']')),
        map(is_not("\\{}[]$%"), Token::Text),
    ))(input)
}

/// Parse a `%` comment up to, not including, the line ending.
pub fn comment(input: &str) -> IResult<&str, Token> {
    map(recognize(pair(char('%'), not_line_ending)), Token::Comment)(input)
}

/// Parse display math (`$$...$$`).
pub fn display_math(input: &str) -> IResult<&str, Token> {
    map(
        delimited(tag("$$"), take_until("$$"), tag("$$")),
        Token::DisplayMath,
    )(input)
}

/// Parse inline math (`$...$`).
pub fn inline_math(input: &str) -> IResult<&str, Token> {
    map(
        delimited(char('$'), take_until("$"), char('$')),
        Token::InlineMath,
    )(input)
}

fn bracket_math(input: &str) -> IResult<&str, Token> {
    map(
        delimited(tag("\\["), take_until("\\]"), tag("\\]")),
        Token::DisplayMath,
    )(input)
}

fn paren_math(input: &str) -> IResult<&str, Token> {
    map(
        delimited(tag("\\("), take_until("\\)"), tag("\\)")),
        Token::InlineMath,
    )(input)
}

fn env_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '*')(input)
}

/// Parse a verbatim-like environment, keeping its body raw.
pub fn verbatim(input: &str) -> IResult<&str, Token> {
    let (rest, name) = delimited(
        tag("\\begin{"),
        alt((tag("verbatim"), tag("lstlisting"), tag("Verbatim"))),
        char('}'),
    )(input)?;
    let end = format!("\\end{{{}}}", name);
    let (rest, body) = take_until(end.as_str())(rest)?;
    let (rest, _) = tag(end.as_str())(rest)?;
    Ok((rest, Token::Verbatim { name, body }))
}

fn begin(input: &str) -> IResult<&str, Token> {
    map(delimited(tag("\\begin{"), env_name, char('}')), Token::Begin)(input)
}

fn end(input: &str) -> IResult<&str, Token> {
    map(delimited(tag("\\end{"), env_name, char('}')), Token::End)(input)
}

fn accent_base(input: &str) -> IResult<&str, char> {
    alt((value('i', tag("\\i")), satisfy(|c| c.is_alphabetic())))(input)
}

/// Parse an accent (`\'e`, `\"{o}`, `` \`{\i} ``).
pub fn accent(input: &str) -> IResult<&str, Token> {
    let (rest, (mark, base)) = pair(
        preceded(char('\\'), one_of("'\"`=~")),
        alt((delimited(char('{'), accent_base, char('}')), accent_base)),
    )(input)?;
    Ok((rest, Token::Accent(format!("\\{}{}", mark, base))))
}

/// Parse a control word (`\section`, `\section*`).
pub fn command(input: &str) -> IResult<&str, Token> {
    map(
        preceded(
            char('\\'),
            recognize(tuple((
                take_while1(|c: char| c.is_ascii_alphabetic() || c == '@'),
                opt(char('*')),
            ))),
        ),
        Token::Command,
    )(input)
}

/// Parse a control symbol (`\%`, `\\`, `\,`).
pub fn escape(input: &str) -> IResult<&str, Token> {
    map(
        recognize(pair(char('\\'), satisfy(|c| !c.is_ascii_alphabetic()))),
        Token::Escape,
    )(input)
}
