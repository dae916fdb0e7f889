//! Whole-book rendering: chapter loading, page writing, and the index.

use crate::assets::AssetStore;
use crate::ast::Node;
use crate::config::Config;
use crate::error::{Diagnostics, Error, Result};
use crate::parser::{self, PreprocessContext};
use crate::render::{Page, RenderContext, Rendered, SnippetStore, Walker};
use crate::resolve::references::chapter_file;
use crate::resolve::{Chapter, Resolver};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// `\input{x}` / `\include{x}` on a line that is not commented out before it.
static INCLUDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([^%\n]*?)\\(?:input|include)\{([^}]+)\}").expect("valid regex")
});

/// Nested includes deeper than this are left unexpanded.
const MAX_INCLUDE_DEPTH: usize = 16;

/// A chapter parsed and ready to walk.
#[derive(Debug, Clone, Default)]
pub struct ChapterSource {
    pub nodes: Vec<Node>,
    pub verbs: PreprocessContext,
}

/// What happened to one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterReport {
    pub ordinal: usize,
    pub output: PathBuf,
    pub diagnostics: Diagnostics,
}

/// The outcome of a render run.
#[derive(Debug, Default)]
pub struct Report {
    pub chapters: Vec<ChapterReport>,
    /// Chapters aborted by a fatal error
    pub failures: Vec<(usize, Error)>,
    pub index_files: Vec<PathBuf>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Chapters with unknown nodes or unresolved references.
    pub fn with_diagnostics(&self) -> impl Iterator<Item = &ChapterReport> {
        self.chapters.iter().filter(|c| !c.diagnostics.is_clean())
    }
}

/// A book opened from its configuration.
pub struct Book {
    config: Config,
    resolver: Resolver,
    snippets: SnippetStore,
    assets: AssetStore,
}

impl Book {
    /// Build the label index and load the bibliography.
    pub fn open(config: Config) -> Result<Self> {
        let resolver = Resolver::load(&config)?;
        Ok(Self::with_resolver(config, resolver))
    }

    pub fn with_resolver(config: Config, resolver: Resolver) -> Self {
        let snippets = SnippetStore::new(config.snippet_dir());
        let assets = AssetStore::from_config(&config);
        Self {
            config,
            resolver,
            snippets,
            assets,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn chapters(&self) -> &[Chapter] {
        self.resolver.labels.chapters()
    }

    /// Read a chapter's source with its includes expanded, then parse it.
    pub fn load_chapter(&self, chapter: &Chapter) -> Result<ChapterSource> {
        let text = self.read_expanded(&chapter.texfile, 0)?;
        let mut verbs = PreprocessContext::new();
        let tex = verbs.preprocess(&text);
        let nodes = parser::parse(&tex)?;
        debug!(
            "Chapter {}: {} top-level nodes, {} verbatim spans",
            chapter.ordinal,
            nodes.len(),
            verbs.len()
        );
        Ok(ChapterSource { nodes, verbs })
    }

    fn read_expanded(&self, path: &Path, depth: usize) -> Result<String> {
        let text = fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
        if depth >= MAX_INCLUDE_DEPTH {
            warn!("Not expanding includes in {}: nested too deep", path.display());
            return Ok(text);
        }

        let mut error = None;
        let expanded = INCLUDE.replace_all(&text, |caps: &Captures| {
            let mut child = self.config.base.join(caps[2].trim());
            if child.extension().is_none() {
                child.set_extension("tex");
            }
            match self.read_expanded(&child, depth + 1) {
                Ok(body) => format!("{}{}", &caps[1], body),
                Err(e) => {
                    error.get_or_insert(e);
                    String::new()
                }
            }
        });
        match error {
            Some(e) => Err(e),
            None => Ok(expanded.into_owned()),
        }
    }

    /// Walk one chapter and return its body.
    pub fn render_chapter(&self, chapter: &Chapter) -> Result<Rendered> {
        let source = self.load_chapter(chapter)?;
        let ctx = RenderContext {
            labels: &self.resolver.labels,
            bibliography: &self.resolver.bibliography,
            verbs: &source.verbs,
            snippets: &self.snippets,
            assets: &self.assets,
            target: self.config.target,
            chapter: chapter.ordinal,
        };
        Walker::render(ctx, source.nodes)
    }

    fn write_chapter(&self, chapter: &Chapter) -> Result<ChapterReport> {
        info!("Rendering chapter {}: {}", chapter.number, chapter.caption);
        let rendered = self.render_chapter(chapter)?;

        let labels = &self.resolver.labels;
        let page = Page {
            book_title: &self.config.title,
            chapter,
            body: &rendered.body,
            prev: chapter.ordinal.checked_sub(1).and_then(|o| labels.chapter(o)),
            next: labels.chapter(chapter.ordinal + 1),
        };
        let target = self.config.target;
        let output = self
            .config
            .out_dir
            .join(chapter_file(chapter.ordinal, target.extension()));
        fs::write(&output, target.flavor().page(&page))?;

        Ok(ChapterReport {
            ordinal: chapter.ordinal,
            output,
            diagnostics: rendered.diagnostics,
        })
    }

    /// Write the index page and any project files.
    pub fn write_index(&self) -> Result<Vec<PathBuf>> {
        let flavor = self.config.target.flavor();
        let mut written = Vec::new();
        for (name, contents) in flavor.index(&self.config.title, self.chapters()) {
            let path = self.config.out_dir.join(name);
            fs::write(&path, contents)?;
            written.push(path);
        }
        Ok(written)
    }

    /// Render the chapters with the given ordinals, or all when empty.
    ///
    /// A fatal error aborts only its own chapter; it is kept in the report.
    pub fn render(&self, selection: &[usize]) -> Result<Report> {
        for ordinal in selection {
            if self.resolver.labels.chapter(*ordinal).is_none() {
                return Err(Error::Config(format!("No chapter with ordinal {}", ordinal)));
            }
        }
        let selected: Vec<&Chapter> = self
            .chapters()
            .iter()
            .filter(|c| selection.is_empty() || selection.contains(&c.ordinal))
            .collect();

        fs::create_dir_all(&self.config.out_dir)?;
        fs::create_dir_all(self.assets.image_dir())?;

        let results: Vec<(usize, Result<ChapterReport>)> = if self.config.parallel {
            selected
                .par_iter()
                .map(|c| (c.ordinal, self.write_chapter(c)))
                .collect()
        } else {
            selected
                .iter()
                .map(|c| (c.ordinal, self.write_chapter(c)))
                .collect()
        };

        let mut report = Report::default();
        for (ordinal, result) in results {
            match result {
                Ok(chapter) => report.chapters.push(chapter),
                Err(e) => {
                    warn!("Chapter {} failed: {}", ordinal, e);
                    report.failures.push((ordinal, e));
                }
            }
        }
        report.index_files = self.write_index()?;
        Ok(report)
    }
}
