//! Cross-reference resolution.

use super::labels::{LabelIndex, UnitKind};

/// Emitted in place of a reference whose label is not in the index.
pub const PLACEHOLDER: &str = "??";

/// A reference resolved against the label index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    pub number: String,
    /// `chapterNN.ext#anchor`, or `#anchor` within the current chapter
    pub href: String,
}

/// Resolve `label` as seen from the chapter with ordinal `current`.
pub fn resolve_reference(
    index: &LabelIndex,
    label: &str,
    current: usize,
    extension: &str,
) -> Option<ResolvedRef> {
    let number = index.get(label)?;
    let file = match index.chapter_of(number) {
        Some(ordinal) if ordinal != current => chapter_file(ordinal, extension),
        _ => String::new(),
    };
    Some(ResolvedRef {
        number: number.to_string(),
        href: format!("{}#{}", file, anchor_for(label, number)),
    })
}

/// The full label for a reference command's argument.
///
/// The typed commands take a bare name: `\refchap{intro}` names
/// `chap:intro`. Arguments that already carry a prefix are kept.
pub fn namespaced_label(command: &str, name: &str) -> String {
    let prefix = match command {
        "refchap" => "chap",
        "refsec" => "sec",
        "reffig" => "fig",
        "reftab" => "tab",
        "refex" => "ex",
        _ => return name.to_string(),
    };
    if name.contains(':') {
        name.to_string()
    } else {
        format!("{}:{}", prefix, name)
    }
}

/// The word printed before the number for a reference command.
pub fn reference_word(command: &str, label: &str) -> &'static str {
    match command {
        "refchap" => "Chapter",
        "refsec" => "Section",
        "reffig" => "Figure",
        "reftab" => "Table",
        "refex" => "Example",
        "ref" | "pageref" => "",
        _ => UnitKind::classify("", label).display_name(),
    }
}

/// Output file name for a chapter.
pub fn chapter_file(ordinal: usize, extension: &str) -> String {
    format!("chapter{:02}.{}", ordinal, extension)
}

/// Anchor for a heading number: `3.2` becomes `sec-3_2`.
pub fn section_anchor(number: &str) -> String {
    format!("sec-{}", number.replace('.', "_"))
}

/// Anchor for a label: headings anchor on their number, floats on the label.
pub fn anchor_for(label: &str, number: &str) -> String {
    match label.split_once(':').map(|(prefix, _)| prefix) {
        Some("sec") | Some("chap") => section_anchor(number),
        _ => label_to_id(label),
    }
}

/// Convert a label to a valid HTML id.
pub fn label_to_id(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
