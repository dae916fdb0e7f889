//! Resolution layer: labels, numbering, references, and citations.

pub mod citations;
pub mod labels;
pub mod numbering;
pub mod references;

pub use citations::{resolve_keys, CiteStyle};
pub use labels::{parse_braces, Chapter, LabelIndex, TocEntry, UnitKind};
pub use numbering::{Level, SectionCounters};
pub use references::{namespaced_label, resolve_reference, ResolvedRef, PLACEHOLDER};

use crate::bibliography::Bibliography;
use crate::config::Config;
use crate::error::Result;
use crate::normalize::Normalizer;
use tracing::info;

/// Read-only lookup tables shared by every chapter walk.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    pub labels: LabelIndex,
    pub bibliography: Bibliography,
}

impl Resolver {
    /// Build the label index and load the bibliography named in `config`.
    pub fn load(config: &Config) -> Result<Self> {
        let normalizer = Normalizer::new(config.target);
        let labels = LabelIndex::load(&config.aux_path(), normalizer, &config.renames)?;
        let bibliography = match config.bibliography_path() {
            Some(path) => Bibliography::load(&path, &normalizer)?,
            None => Bibliography::default(),
        };
        info!(
            "Resolved {} labels and {} bibliography entries",
            labels.len(),
            bibliography.len()
        );
        Ok(Self {
            labels,
            bibliography,
        })
    }
}
