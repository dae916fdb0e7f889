//! Label index built from LaTeX `.aux` files.
//!
//! The root `.aux` pulls in per-chapter files with `\@input{...}`. Each file
//! holds `\newlabel{NAME}{{NUMBER}{PAGE}{CAPTION}{UNIT}{}}` records. Chapters
//! get ordinals in the order they are discovered; sections nest under the
//! most recent chapter and subsections under the most recent section.

use crate::error::{Error, IndexError, ParseError, Result};
use crate::normalize::Normalizer;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The kind of numbered unit a label points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Chapter,
    Section,
    Subsection,
    Example,
    Figure,
    Table,
    Other,
}

impl UnitKind {
    /// Classify from the hyperref unit (`section.3.2`), falling back to the
    /// label prefix (`fig:`).
    pub fn classify(unit: &str, label: &str) -> Self {
        let unit = unit.trim_start_matches("tcb@cnt@");
        let by_unit = [
            ("chapter", UnitKind::Chapter),
            ("section", UnitKind::Section),
            ("subsection", UnitKind::Subsection),
            ("example", UnitKind::Example),
            ("figure", UnitKind::Figure),
            ("table", UnitKind::Table),
        ];
        for (prefix, kind) in by_unit {
            if unit.starts_with(prefix)
                && unit[prefix.len()..].starts_with(|c: char| c == '.' || c == '*')
            {
                return kind;
            }
        }

        match label.split_once(':').map(|(prefix, _)| prefix) {
            Some("chap") => UnitKind::Chapter,
            Some("sec") => UnitKind::Section,
            Some("ex") => UnitKind::Example,
            Some("fig") => UnitKind::Figure,
            Some("tab") => UnitKind::Table,
            _ => UnitKind::Other,
        }
    }

    /// Display word used in float captions.
    pub fn display_name(self) -> &'static str {
        match self {
            UnitKind::Chapter => "Chapter",
            UnitKind::Section | UnitKind::Subsection => "Section",
            UnitKind::Example => "Example",
            UnitKind::Figure => "Figure",
            UnitKind::Table => "Table",
            UnitKind::Other => "",
        }
    }
}

/// A numbered unit below chapter level.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub label: String,
    pub number: String,
    pub caption: String,
    pub kind: UnitKind,
    pub children: Vec<TocEntry>,
}

/// A chapter with its sections and floats.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    /// One-based position in include order
    pub ordinal: usize,
    pub number: String,
    pub label: String,
    pub caption: String,
    /// The `.tex` file next to the `.aux` the chapter was found in
    pub texfile: PathBuf,
    pub sections: Vec<TocEntry>,
    pub floats: Vec<TocEntry>,
}

/// Label name to display number, plus the table of contents.
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    labels: HashMap<String, String>,
    chapters: Vec<Chapter>,
}

impl LabelIndex {
    /// Build the index from a root `.aux` file.
    pub fn load(
        root: &Path,
        normalizer: Normalizer,
        renames: &HashMap<String, String>,
    ) -> Result<Self> {
        let mut builder = LabelIndexBuilder::new(root, normalizer, renames);
        let text = std::fs::read_to_string(root).map_err(|e| Error::read(root, e))?;
        builder.ingest(root, &text);
        let index = builder.finish();
        debug!(
            "Label index: {} labels in {} chapters",
            index.len(),
            index.chapters.len()
        );
        Ok(index)
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.labels.get(label).map(String::as_str)
    }

    pub fn insert(&mut self, label: impl Into<String>, number: impl Into<String>) {
        self.labels.insert(label.into(), number.into());
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter(&self, ordinal: usize) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.ordinal == ordinal)
    }

    /// The ordinal of the chapter whose number leads a dotted number.
    pub fn chapter_of(&self, number: &str) -> Option<usize> {
        let lead = number.split('.').next()?;
        self.chapters
            .iter()
            .find(|c| c.number == lead)
            .map(|c| c.ordinal)
            .or_else(|| lead.parse().ok())
    }
}

/// Accumulates records from one include graph.
pub struct LabelIndexBuilder<'a> {
    base: PathBuf,
    normalizer: Normalizer,
    renames: &'a HashMap<String, String>,
    visited: HashSet<PathBuf>,
    index: LabelIndex,
}

impl<'a> LabelIndexBuilder<'a> {
    /// `root` anchors relative `\@input` paths.
    pub fn new(root: &Path, normalizer: Normalizer, renames: &'a HashMap<String, String>) -> Self {
        Self {
            base: root.parent().map(Path::to_path_buf).unwrap_or_default(),
            normalizer,
            renames,
            visited: HashSet::new(),
            index: LabelIndex::default(),
        }
    }

    /// Read the records of one `.aux` file, following its includes.
    pub fn ingest(&mut self, path: &Path, text: &str) {
        self.visited.insert(path.to_path_buf());

        for line in text.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("\\@input") {
                match parse_braces(rest) {
                    Ok(groups) if groups.len() == 1 => self.include(groups[0]),
                    _ => warn!("Skipping malformed include in {}: {}", path.display(), line),
                }
            } else if let Some(rest) = line.strip_prefix("\\newlabel") {
                if let Err(e) = self.record(path, rest) {
                    warn!("Skipping record in {}: {}", path.display(), e);
                }
            }
        }
    }

    fn include(&mut self, child: &str) {
        let path = self.base.join(child);
        if self.visited.contains(&path) {
            warn!("Include cycle at {}", path.display());
            return;
        }
        match std::fs::read_to_string(&path) {
            Ok(text) => self.ingest(&path, &text),
            Err(e) => warn!("Skipping missing include {}: {}", path.display(), e),
        }
    }

    fn record(&mut self, path: &Path, rest: &str) -> std::result::Result<(), IndexError> {
        let malformed = || IndexError::MalformedRecord {
            line: format!("\\newlabel{}", rest),
        };

        let groups = parse_braces(rest).map_err(|_| malformed())?;
        let [name, body] = groups.as_slice() else {
            return Err(malformed());
        };
        if name.ends_with("@cref") {
            debug!("Skipping cleveref record {}", name);
            return Ok(());
        }
        let fields = parse_braces(body).map_err(|_| malformed())?;
        if fields.len() < 2 {
            return Err(malformed());
        }

        let name = name.to_string();
        let number = fields[0].to_string();
        let caption = fields.get(2).map(|c| self.caption(c)).unwrap_or_default();
        let unit = fields.get(3).copied().unwrap_or_default();
        let kind = UnitKind::classify(unit, &name);

        self.index.insert(name.clone(), number.clone());
        self.attach(path, name, number, caption, kind);
        Ok(())
    }

    fn attach(&mut self, path: &Path, label: String, number: String, caption: String, kind: UnitKind) {
        let entry = TocEntry {
            label,
            number,
            caption,
            kind,
            children: Vec::new(),
        };

        if kind == UnitKind::Chapter {
            let caption = self
                .renames
                .get(&entry.caption)
                .cloned()
                .unwrap_or(entry.caption);
            let ordinal = self.index.chapters.len() + 1;
            self.index.chapters.push(Chapter {
                ordinal,
                number: entry.number,
                label: entry.label,
                caption,
                texfile: path.with_extension("tex"),
                sections: Vec::new(),
                floats: Vec::new(),
            });
            return;
        }

        let Some(chapter) = self.index.chapters.last_mut() else {
            if kind != UnitKind::Other {
                warn!("Label {} appears before any chapter", entry.label);
            }
            return;
        };

        match kind {
            UnitKind::Section => chapter.sections.push(entry),
            UnitKind::Subsection => match chapter.sections.last_mut() {
                Some(section) => section.children.push(entry),
                None => chapter.sections.push(entry),
            },
            UnitKind::Example | UnitKind::Figure | UnitKind::Table => chapter.floats.push(entry),
            UnitKind::Chapter | UnitKind::Other => {}
        }
    }

    fn caption(&self, raw: &str) -> String {
        let cleaned = raw
            .replace("\\ignorespaces", "")
            .replace("\\relax", "")
            .replace("\\nobreakspace {}", "~")
            .replace("\\protect", "");
        let cleaned = cleaned.trim();
        match self.normalizer.normalize(cleaned) {
            Ok(caption) => caption,
            Err(e) => {
                warn!("Keeping raw caption {:?}: {}", cleaned, e);
                cleaned.to_string()
            }
        }
    }

    pub fn finish(self) -> LabelIndex {
        self.index
    }
}

/// Contents of the top-level brace groups in `s`, in order.
///
/// Text between groups is ignored. Escaped braces do not count.
pub fn parse_braces(s: &str) -> std::result::Result<Vec<&str>, ParseError> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => {
                if depth == 0 {
                    start = i + 1;
                }
                depth += 1;
            }
            '}' => {
                if depth == 0 {
                    return Err(ParseError::UnbalancedBraces(s.to_string()));
                }
                depth -= 1;
                if depth == 0 {
                    groups.push(&s[start..i]);
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(ParseError::UnbalancedBraces(s.to_string()));
    }
    Ok(groups)
}
