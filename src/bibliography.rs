//! Reader for `.bbl` bibliographies produced by BibTeX.

use crate::error::{Error, IndexError, Result};
use crate::normalize::Normalizer;
use nom::{
    bytes::complete::{tag, take_until},
    character::complete::{char, space0},
    combinator::opt,
    sequence::{delimited, preceded},
    IResult,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

static NATBIB_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\((\d{4}[a-z]?)\)(.*)$").expect("valid regex"));

static CONTROL_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[A-Za-z@]+\*?\s*").expect("valid regex"));

/// One bibliography entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    pub key: String,
    /// Author-year form, e.g. `Smith, 2020`
    pub short: String,
    /// Full reference text
    pub text: String,
}

/// Citation keys mapped to their entries.
#[derive(Debug, Clone, Default)]
pub struct Bibliography {
    entries: HashMap<String, BibEntry>,
}

impl Bibliography {
    /// Load and parse a `.bbl` file.
    pub fn load(path: &Path, normalizer: &Normalizer) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
        let bibliography = Self::parse(&text, normalizer)?;
        debug!(
            "Loaded {} bibliography entries from {}",
            bibliography.len(),
            path.display()
        );
        Ok(bibliography)
    }

    /// Parse `.bbl` text: `\bibitem[SHORT]{KEY}` followed by continuation
    /// lines up to the next blank line.
    pub fn parse(input: &str, normalizer: &Normalizer) -> Result<Self> {
        let mut bibliography = Self::default();
        let mut current: Option<(String, String, Vec<String>)> = None;

        for line in input.lines() {
            if line.trim_start().starts_with("\\bibitem") {
                if let Some(entry) = current.take() {
                    bibliography.finish_entry(entry, normalizer);
                }
                let (rest, (short, key)) = bibitem(line.trim_start()).map_err(|_| {
                    IndexError::Bibliography(format!("malformed \\bibitem: {}", line.trim()))
                })?;
                let short = short.unwrap_or(key).to_string();
                let mut lines = Vec::new();
                if !rest.trim().is_empty() {
                    lines.push(rest.trim().to_string());
                }
                current = Some((key.trim().to_string(), short, lines));
            } else if line.trim().is_empty() {
                if let Some(entry) = current.take() {
                    bibliography.finish_entry(entry, normalizer);
                }
            } else if let Some((_, _, lines)) = current.as_mut() {
                if !line.trim_start().starts_with("\\end{thebibliography}") {
                    lines.push(line.trim().to_string());
                }
            }
        }

        if let Some(entry) = current {
            bibliography.finish_entry(entry, normalizer);
        }

        Ok(bibliography)
    }

    fn finish_entry(&mut self, (key, short, lines): (String, String, Vec<String>), normalizer: &Normalizer) {
        let short = clean_text(&short_label(&short), normalizer);
        let text = clean_text(&lines.join(" "), normalizer);
        self.insert(BibEntry { key, short, text });
    }

    pub fn insert(&mut self, entry: BibEntry) {
        self.entries.insert(entry.key.clone(), entry);
    }

    pub fn get(&self, key: &str) -> Option<&BibEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse `\bibitem[SHORT]{KEY}` and return what follows on the line.
fn bibitem(input: &str) -> IResult<&str, (Option<&str>, &str)> {
    let (input, _) = tag("\\bibitem")(input)?;
    let (input, short) = opt(bracketed)(input)?;
    let (input, key) = preceded(space0, delimited(char('{'), take_until("}"), char('}')))(input)?;
    Ok((input, (short, key)))
}

/// Bracketed value, skipping brackets nested inside braces.
fn bracketed(input: &str) -> IResult<&str, &str> {
    let (input, _) = char('[')(input)?;
    let mut depth = 0;

    for (i, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            ']' if depth == 0 => return Ok((&input[i + 1..], &input[..i])),
            _ => {}
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

/// Reduce a natbib label `Smith et~al.(2020)Smith, Jones` to `Smith et~al., 2020`.
fn short_label(short: &str) -> String {
    let short = short.replace(['{', '}'], "");
    match NATBIB_LABEL.captures(&short) {
        Some(caps) => format!("{}, {}", caps[1].trim(), &caps[2]),
        None => short,
    }
}

/// Normalize bibliography text, dropping commands the normalizer rejects.
fn clean_text(raw: &str, normalizer: &Normalizer) -> String {
    let text = match normalizer.normalize(raw) {
        Ok(text) => text,
        Err(_) => {
            let stripped = CONTROL_WORD.replace_all(raw, "");
            match normalizer.normalize(&stripped) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Keeping bibliography text unnormalized ({}): {}", e, raw);
                    stripped.into_owned()
                }
            }
        }
    };
    text.replace(['{', '}'], "").trim().to_string()
}
