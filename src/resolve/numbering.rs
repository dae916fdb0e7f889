//! Running chapter and section counters.

/// Heading levels tracked: chapter, section, subsection, subsubsection.
pub const LEVELS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Chapter = 0,
    Section = 1,
    Subsection = 2,
    Subsubsection = 3,
}

impl Level {
    pub fn from_command(name: &str) -> Option<Self> {
        match name {
            "chapter" => Some(Level::Chapter),
            "section" => Some(Level::Section),
            "subsection" => Some(Level::Subsection),
            "subsubsection" => Some(Level::Subsubsection),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Counters for one chapter walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionCounters {
    counters: [u32; LEVELS],
}

impl SectionCounters {
    /// Counters for a walk over chapter `chapter`, before its heading.
    pub fn for_chapter(chapter: u32) -> Self {
        let mut counters = [0; LEVELS];
        counters[0] = chapter.saturating_sub(1);
        Self { counters }
    }

    /// Increment `level`, reset everything below it, and return the new
    /// dotted number.
    pub fn bump(&mut self, level: Level) -> String {
        let idx = level.index();
        self.counters[idx] += 1;
        for counter in &mut self.counters[idx + 1..] {
            *counter = 0;
        }
        build_section_number(&self.counters, idx)
    }

    pub fn chapter(&self) -> u32 {
        self.counters[0]
    }

    /// The current dotted number at `level`.
    pub fn current(&self, level: Level) -> String {
        build_section_number(&self.counters, level.index())
    }
}

fn build_section_number(counters: &[u32; LEVELS], max_level: usize) -> String {
    counters[..=max_level]
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(".")
}
