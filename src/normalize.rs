//! Text normalization: LaTeX-escaped text to target text.
//!
//! Normalization is a single left-to-right scan. At each position the
//! scanner tries, in order: a comment, inline math, an accent, the escape
//! table (longest match first), an inline markup command. Whatever
//! it emits is never scanned again. Any other backslash is an error.

use crate::error::RenderError;
use crate::render::Target;

type Table = &'static [(&'static str, &'static str)];

/// Longer entries sharing a prefix come first.
const HTML_TABLE: Table = &[
    ("\\textbackslash{}", "\\"),
    ("\\textbackslash", "\\"),
    ("\\ldots{}", "&hellip;"),
    ("\\ldots", "&hellip;"),
    ("\\\\", "<br/>"),
    ("\\{", "{"),
    ("\\}", "}"),
    ("\\&", "&amp;"),
    ("\\#", "#"),
    ("\\%", "%"),
    ("\\_", "_"),
    ("\\$", "$"),
    ("\\^", "^"),
    ("\\~", "~"),
    ("\\ ", " "),
    ("\\,", "&thinsp;"),
    ("\\-", ""),
    ("\\@", ""),
    ("\\/", ""),
    ("---", "&mdash;"),
    ("--", "&ndash;"),
    ("``", "&ldquo;"),
    ("''", "&rdquo;"),
    ("~", "&nbsp;"),
    ("<", "&lt;"),
    (">", "&gt;"),
];

const QUARTO_TABLE: Table = &[
    ("\\textbackslash{}", "\\\\"),
    ("\\textbackslash", "\\\\"),
    ("\\ldots{}", "…"),
    ("\\ldots", "…"),
    ("\\\\", "\\\n"),
    ("\\{", "{"),
    ("\\}", "}"),
    ("\\&", "&"),
    ("\\#", "\\#"),
    ("\\%", "%"),
    ("\\_", "_"),
    ("\\$", "\\$"),
    ("\\^", "^"),
    ("\\~", "~"),
    ("\\ ", " "),
    ("\\,", "\u{2009}"),
    ("\\-", ""),
    ("\\@", ""),
    ("\\/", ""),
    ("---", "—"),
    ("--", "–"),
    ("``", "\""),
    ("''", "\""),
    ("~", "\u{a0}"),
];

/// Inline markup a normalizer knows how to wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wrap {
    Emphasis,
    Bold,
    Code,
    Drop,
}

/// Commands taking one brace argument, handled inline.
const INLINE_COMMANDS: &[(&str, Wrap)] = &[
    ("emph", Wrap::Emphasis),
    ("textit", Wrap::Emphasis),
    ("textbf", Wrap::Bold),
    ("texttt", Wrap::Code),
    ("index", Wrap::Drop),
];

/// Declarations that vanish from the output.
const DROPPED_DECLARATIONS: &[&str] = &["newblock", "em", "bf", "it", "tt", "sc"];

/// A normalizer for one output target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    target: Target,
}

/// Normalize text for HTML output.
pub fn normalize(raw: &str) -> Result<String, RenderError> {
    Normalizer::new(Target::Html).normalize(raw)
}

impl Normalizer {
    pub fn new(target: Target) -> Self {
        Self { target }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    fn table(&self) -> Table {
        match self.target {
            Target::Html => HTML_TABLE,
            Target::Quarto => QUARTO_TABLE,
        }
    }

    fn inline_math(&self, content: &str) -> String {
        match self.target {
            Target::Html => format!("\\({}\\)", content),
            Target::Quarto => format!("${}$", content),
        }
    }

    fn display_math(&self, content: &str) -> String {
        match self.target {
            Target::Html => format!("\\[{}\\]", content),
            Target::Quarto => format!("$${}$$", content),
        }
    }

    fn wrap(&self, wrap: Wrap, inner: &str) -> String {
        match (self.target, wrap) {
            (_, Wrap::Drop) => String::new(),
            (Target::Html, Wrap::Emphasis) => format!("<em>{}</em>", inner),
            (Target::Html, Wrap::Bold) => format!("<b>{}</b>", inner),
            (Target::Html, Wrap::Code) => format!("<code>{}</code>", inner),
            (Target::Quarto, Wrap::Emphasis) => format!("*{}*", inner),
            (Target::Quarto, Wrap::Bold) => format!("**{}**", inner),
            (Target::Quarto, Wrap::Code) => format!("`{}`", inner),
        }
    }

    /// Normalize raw LaTeX text.
    pub fn normalize(&self, raw: &str) -> Result<String, RenderError> {
        let table = self.table();
        let mut out = String::with_capacity(raw.len());
        let mut i = 0;

        while i < raw.len() {
            let rest = &raw[i..];

            if rest.starts_with('%') {
                i += rest.find('\n').map_or(rest.len(), |n| n + 1);
                continue;
            }

            if let Some((math, used)) = self.math(rest) {
                out.push_str(&math);
                i += used;
                continue;
            }

            if let Some((c, used)) = accent(rest) {
                out.push(c);
                i += used;
                continue;
            }

            if let Some((from, to)) = table.iter().find(|(from, _)| rest.starts_with(from)) {
                out.push_str(to);
                i += from.len();
                continue;
            }

            if rest.starts_with('\\') {
                if let Some((text, used)) = self.inline_command(rest)? {
                    out.push_str(&text);
                    i += used;
                    continue;
                }
                return Err(RenderError::UnrecognizedEscape {
                    excerpt: rest.chars().take(24).collect(),
                });
            }

            let c = rest.chars().next().unwrap_or_default();
            out.push(c);
            i += c.len_utf8().max(1);
        }

        Ok(out)
    }

    /// Math spans pass through with their content untouched.
    fn math(&self, rest: &str) -> Option<(String, usize)> {
        if let Some(body) = rest.strip_prefix("$$") {
            let end = body.find("$$")?;
            return Some((self.display_math(&body[..end]), end + 4));
        }
        if let Some(body) = rest.strip_prefix('$') {
            let end = body.find('$')?;
            return Some((self.inline_math(&body[..end]), end + 2));
        }
        if let Some(body) = rest.strip_prefix("\\(") {
            let end = body.find("\\)")?;
            return Some((self.inline_math(&body[..end]), end + 4));
        }
        None
    }

    fn inline_command(&self, rest: &str) -> Result<Option<(String, usize)>, RenderError> {
        let name_len = rest[1..]
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len() - 1);
        let name = &rest[1..1 + name_len];
        if name.is_empty() {
            return Ok(None);
        }
        let after = &rest[1 + name_len..];

        if DROPPED_DECLARATIONS.contains(&name) {
            let space = after.len() - after.trim_start_matches(' ').len();
            return Ok(Some((String::new(), 1 + name_len + space)));
        }

        let Some((_, wrap)) = INLINE_COMMANDS.iter().find(|(n, _)| *n == name) else {
            return Ok(None);
        };
        let group = after.trim_start_matches(' ');
        let Some(close) = matching_brace(group) else {
            return Ok(None);
        };
        let inner = self.normalize(&group[1..close])?;
        let used = 1 + name_len + (after.len() - group.len()) + close + 1;
        Ok(Some((self.wrap(*wrap, &inner), used)))
    }
}

/// Byte offset of the brace closing the group `s` starts with.
fn matching_brace(s: &str) -> Option<usize> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode `\'e`, `\"{o}`, `` \`{\i} `` and friends.
fn accent(rest: &str) -> Option<(char, usize)> {
    let mut chars = rest.strip_prefix('\\')?.chars();
    let mark = chars.next()?;
    if !"'\"`=~".contains(mark) {
        return None;
    }
    let body = &rest[2..];

    let (base, used) = if let Some(inner) = body.strip_prefix('{') {
        let close = inner.find('}')?;
        (accent_base(&inner[..close])?, close + 2)
    } else if body.starts_with("\\i") && !body[2..].starts_with(|c: char| c.is_ascii_alphabetic()) {
        ('i', 2)
    } else {
        let c = body.chars().next()?;
        if !c.is_alphabetic() {
            return None;
        }
        (c, c.len_utf8())
    };

    Some((accented(mark, base)?, 2 + used))
}

fn accent_base(s: &str) -> Option<char> {
    if s == "\\i" {
        return Some('i');
    }
    let mut chars = s.chars();
    let c = chars.next()?;
    (chars.next().is_none() && c.is_alphabetic()).then_some(c)
}

fn accented(mark: char, base: char) -> Option<char> {
    let c = match (mark, base.to_ascii_lowercase()) {
        ('\'', 'a') => 'á',
        ('\'', 'e') => 'é',
        ('\'', 'i') => 'í',
        ('\'', 'o') => 'ó',
        ('\'', 'u') => 'ú',
        ('\'', 'y') => 'ý',
        ('\'', 'c') => 'ć',
        ('\'', 'n') => 'ń',
        ('"', 'a') => 'ä',
        ('"', 'e') => 'ë',
        ('"', 'i') => 'ï',
        ('"', 'o') => 'ö',
        ('"', 'u') => 'ü',
        ('"', 'y') => 'ÿ',
        ('`', 'a') => 'à',
        ('`', 'e') => 'è',
        ('`', 'i') => 'ì',
        ('`', 'o') => 'ò',
        ('`', 'u') => 'ù',
        ('=', 'a') => 'ā',
        ('=', 'e') => 'ē',
        ('=', 'i') => 'ī',
        ('=', 'o') => 'ō',
        ('=', 'u') => 'ū',
        ('~', 'a') => 'ã',
        ('~', 'n') => 'ñ',
        ('~', 'o') => 'õ',
        _ => return None,
    };
    if base.is_uppercase() {
        c.to_uppercase().next()
    } else {
        Some(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_is_unchanged() {
        for text in ["plain words", "a-b c'd {x}", "line\nbreak", "ünïcödé ok", ""] {
            assert_eq!(normalize(text).unwrap(), text);
        }
    }

    #[test]
    fn test_escape_table() {
        assert_eq!(normalize("50\\% \\& \\_x \\$5").unwrap(), "50% &amp; _x $5");
        assert_eq!(normalize("``quoted''").unwrap(), "&ldquo;quoted&rdquo;");
        assert_eq!(normalize("1--2 a---b").unwrap(), "1&ndash;2 a&mdash;b");
        assert_eq!(normalize("a~b <c>").unwrap(), "a&nbsp;b &lt;c&gt;");
        assert_eq!(normalize("x\\\\y").unwrap(), "x<br/>y");
        assert_eq!(normalize("\\{set\\}").unwrap(), "{set}");
    }

    #[test]
    fn test_single_pass_no_resubstitution() {
        assert_eq!(normalize("\\textbackslash{}\\%").unwrap(), "\\%");
        assert_eq!(normalize("\\&lt;").unwrap(), "&amp;lt;");
    }

    #[test]
    fn test_idempotent_on_output() {
        for text in ["\\{a\\}", "x~y", "1--2", "\\& \\#", "``q''"] {
            let once = normalize(text).unwrap();
            assert_eq!(normalize(&once).unwrap(), once);
        }
    }

    #[test]
    fn test_accents() {
        assert_eq!(normalize("caf\\'e").unwrap(), "café");
        assert_eq!(normalize("\\\"{O}l").unwrap(), "Öl");
        assert_eq!(normalize("\\'{\\i}").unwrap(), "í");
        assert_eq!(normalize("\\'\\i x").unwrap(), "í x");
        assert_eq!(normalize("\\`A \\=o \\~n").unwrap(), "À ō ñ");
    }

    #[test]
    fn test_comments_are_stripped() {
        assert_eq!(normalize("keep % drop this\nnext").unwrap(), "keep next");
        assert_eq!(normalize("100\\% sure").unwrap(), "100% sure");
        assert_eq!(normalize("end % trailing").unwrap(), "end ");
    }

    #[test]
    fn test_math_passthrough() {
        assert_eq!(normalize("let $a_1 < b$ hold").unwrap(), "let \\(a_1 < b\\) hold");
        assert_eq!(normalize("\\(\\alpha\\)").unwrap(), "\\(\\alpha\\)");
        assert_eq!(normalize("$$x$$").unwrap(), "\\[x\\]");
        assert_eq!(normalize("costs $5").unwrap(), "costs $5");
    }

    #[test]
    fn test_inline_markup() {
        assert_eq!(
            normalize("\\emph{very} \\textbf{bold \\& brave}").unwrap(),
            "<em>very</em> <b>bold &amp; brave</b>"
        );
        assert_eq!(normalize("x\\index{term} y").unwrap(), "x y");
        assert_eq!(normalize("\\newblock \\em Title").unwrap(), "Title");
    }

    #[test]
    fn test_unknown_escape_is_error() {
        let err = normalize("a \\foo{b}").unwrap_err();
        match err {
            RenderError::UnrecognizedEscape { excerpt } => assert!(excerpt.starts_with("\\foo")),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(normalize("\\'").is_err());
    }

    #[test]
    fn test_quarto_table() {
        let n = Normalizer::new(Target::Quarto);
        assert_eq!(n.normalize("``hi'' 1--2").unwrap(), "\"hi\" 1–2");
        assert_eq!(n.normalize("\\textbf{x} $y$").unwrap(), "**x** $y$");
        assert_eq!(n.normalize("a\\$b").unwrap(), "a\\$b");
    }
}
