//! Citation resolution.

use crate::bibliography::{BibEntry, Bibliography};
use crate::error::RenderError;
use once_cell::sync::Lazy;
use regex::Regex;

static TRAILING_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r", (\d{4}[a-z]?)$").expect("valid regex"));

/// How a citation command prints its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiteStyle {
    /// `\citep`: (Smith, 2020)
    Parenthetical,
    /// `\citet`, `\cite`: Smith (2020)
    Textual,
    /// `\citealp`: Smith, 2020
    Bare,
}

impl CiteStyle {
    pub fn from_command(name: &str) -> Option<Self> {
        match name {
            "citep" => Some(CiteStyle::Parenthetical),
            "citet" | "cite" => Some(CiteStyle::Textual),
            "citealp" => Some(CiteStyle::Bare),
            _ => None,
        }
    }
}

/// Look up a comma-separated key list. Every key must exist.
pub fn resolve_keys<'b>(keys: &str, bibliography: &'b Bibliography) -> Result<Vec<&'b BibEntry>, RenderError> {
    keys.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| {
            bibliography
                .get(key)
                .ok_or_else(|| RenderError::UnresolvedCitationKey(key.to_string()))
        })
        .collect()
}

/// The visible text for one entry.
pub fn cite_text(entry: &BibEntry, style: CiteStyle) -> String {
    match style {
        CiteStyle::Textual => TRAILING_YEAR.replace(&entry.short, " ($1)").into_owned(),
        CiteStyle::Parenthetical | CiteStyle::Bare => entry.short.clone(),
    }
}

/// Wrap rendered citations with natbib-style notes.
///
/// One optional argument is a post-note; two are pre- and post-note.
pub fn assemble(style: CiteStyle, items: &[String], notes: &[String]) -> String {
    let (pre, post) = match notes {
        [] => ("", ""),
        [post] => ("", post.as_str()),
        [pre, post, ..] => (pre.as_str(), post.as_str()),
    };

    let mut text = String::new();
    if !pre.is_empty() {
        text.push_str(pre);
        text.push(' ');
    }
    text.push_str(&items.join("; "));
    if !post.is_empty() {
        text.push_str(", ");
        text.push_str(post);
    }

    match style {
        CiteStyle::Parenthetical => format!("({})", text),
        CiteStyle::Textual | CiteStyle::Bare => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bibliography() -> Bibliography {
        let mut bib = Bibliography::default();
        bib.insert(BibEntry {
            key: "smith2020".into(),
            short: "Smith, 2020".into(),
            text: "Smith, J. (2020). Data.".into(),
        });
        bib.insert(BibEntry {
            key: "lee2019a".into(),
            short: "Lee and Park, 2019a".into(),
            text: "Lee (2019).".into(),
        });
        bib
    }

    #[test]
    fn test_resolve_keys() {
        let bib = bibliography();
        let entries = resolve_keys("smith2020, lee2019a", &bib).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].key, "lee2019a");
    }

    #[test]
    fn test_unknown_key_is_fatal() {
        let bib = bibliography();
        match resolve_keys("smith2020,ghost", &bib) {
            Err(RenderError::UnresolvedCitationKey(key)) => assert_eq!(key, "ghost"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_textual_form() {
        let bib = bibliography();
        assert_eq!(cite_text(bib.get("smith2020").unwrap(), CiteStyle::Textual), "Smith (2020)");
        assert_eq!(
            cite_text(bib.get("lee2019a").unwrap(), CiteStyle::Textual),
            "Lee and Park (2019a)"
        );
        assert_eq!(cite_text(bib.get("smith2020").unwrap(), CiteStyle::Bare), "Smith, 2020");
    }

    #[test]
    fn test_assemble_notes() {
        let items = vec!["A, 2001".to_string(), "B, 2002".to_string()];
        assert_eq!(assemble(CiteStyle::Parenthetical, &items, &[]), "(A, 2001; B, 2002)");
        assert_eq!(
            assemble(CiteStyle::Parenthetical, &items[..1], &["see".to_string(), "p. 3".to_string()]),
            "(see A, 2001, p. 3)"
        );
        assert_eq!(assemble(CiteStyle::Textual, &items[..1], &["ch. 2".to_string()]), "A, 2001, ch. 2");
    }
}
