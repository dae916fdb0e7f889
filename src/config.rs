//! Book configuration loaded from `book.toml`.

use crate::error::{Error, Result};
use crate::render::Target;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything a render run needs to know about the book.
#[derive(Debug, Clone)]
pub struct Config {
    /// Book title for page headers and the index
    pub title: String,
    /// Directory holding the LaTeX sources
    pub base: PathBuf,
    /// Root `.aux` file, relative to `base`
    pub aux: PathBuf,
    /// `.bbl` file, relative to `base`
    pub bibliography: Option<PathBuf>,
    /// Pre-rendered snippet directory, relative to `base`
    pub snippets: PathBuf,
    pub out_dir: PathBuf,
    pub target: Target,
    /// Images wider or taller than this get a thumbnail
    pub thumbnail_size: u32,
    /// Render chapters on a thread pool
    pub parallel: bool,
    /// Chapter caption replacements for the table of contents
    pub renames: HashMap<String, String>,
    /// Limit for external commands
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Book".to_string(),
            base: PathBuf::from("."),
            aux: PathBuf::from("main.aux"),
            bibliography: None,
            snippets: PathBuf::from("snippets"),
            out_dir: PathBuf::from("docs"),
            target: Target::Html,
            thumbnail_size: 640,
            parallel: false,
            renames: HashMap::new(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl Config {
    /// Load a config file. Relative paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&text, root)
    }

    /// Parse config TOML, resolving relative paths against `root`.
    pub fn from_toml_str(text: &str, root: &Path) -> Result<Self> {
        let raw: RawConfig =
            toml::from_str(text).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        Ok(convert_config(raw, root))
    }

    pub fn aux_path(&self) -> PathBuf {
        self.base.join(&self.aux)
    }

    pub fn bibliography_path(&self) -> Option<PathBuf> {
        self.bibliography.as_ref().map(|b| self.base.join(b))
    }

    pub fn snippet_dir(&self) -> PathBuf {
        self.base.join(&self.snippets)
    }

    pub fn image_dir(&self) -> PathBuf {
        self.out_dir.join("img")
    }
}

/// Raw config structure for deserialization.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    book: RawBook,
    #[serde(default)]
    output: RawOutput,
    #[serde(default)]
    toc: RawToc,
    #[serde(default)]
    process: RawProcess,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawBook {
    title: Option<String>,
    base: Option<PathBuf>,
    aux: Option<PathBuf>,
    bibliography: Option<PathBuf>,
    snippets: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawOutput {
    dir: Option<PathBuf>,
    target: Option<Target>,
    thumbnail_size: Option<u32>,
    parallel: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawToc {
    #[serde(default)]
    renames: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawProcess {
    timeout_secs: Option<u64>,
}

/// Convert raw config to a `Config`, filling in defaults.
fn convert_config(raw: RawConfig, root: &Path) -> Config {
    let defaults = Config::default();
    let rooted = |p: PathBuf| if p.is_absolute() { p } else { root.join(p) };

    Config {
        title: raw.book.title.unwrap_or(defaults.title),
        base: rooted(raw.book.base.unwrap_or(defaults.base)),
        aux: raw.book.aux.unwrap_or(defaults.aux),
        bibliography: raw.book.bibliography,
        snippets: raw.book.snippets.unwrap_or(defaults.snippets),
        out_dir: rooted(raw.output.dir.unwrap_or(defaults.out_dir)),
        target: raw.output.target.unwrap_or(defaults.target),
        thumbnail_size: raw.output.thumbnail_size.unwrap_or(defaults.thumbnail_size),
        parallel: raw.output.parallel.unwrap_or(defaults.parallel),
        renames: raw.toc.renames,
        timeout: raw
            .process
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_config() {
        let text = r#"
[book]
title = "Computational Analysis"
base = "tex"
aux = "build/main.aux"
bibliography = "build/main.bbl"

[output]
dir = "site"
target = "quarto"
thumbnail_size = 480
parallel = true

[toc.renames]
"A Very Long Chapter Title" = "Short Title"

[process]
timeout_secs = 30
"#;
        let config = Config::from_toml_str(text, Path::new("/books/ccs")).unwrap();
        assert_eq!(config.title, "Computational Analysis");
        assert_eq!(config.aux_path(), PathBuf::from("/books/ccs/tex/build/main.aux"));
        assert_eq!(
            config.bibliography_path(),
            Some(PathBuf::from("/books/ccs/tex/build/main.bbl"))
        );
        assert_eq!(config.snippet_dir(), PathBuf::from("/books/ccs/tex/snippets"));
        assert_eq!(config.image_dir(), PathBuf::from("/books/ccs/site/img"));
        assert_eq!(config.target, Target::Quarto);
        assert_eq!(config.thumbnail_size, 480);
        assert!(config.parallel);
        assert_eq!(config.renames["A Very Long Chapter Title"], "Short Title");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("", Path::new("/b")).unwrap();
        assert_eq!(config.target, Target::Html);
        assert_eq!(config.thumbnail_size, 640);
        assert_eq!(config.aux_path(), PathBuf::from("/b/./main.aux"));
        assert_eq!(config.bibliography_path(), None);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Config::from_toml_str("[output]\ntarget = \"pdf\"", Path::new(".")).is_err());
        assert!(Config::from_toml_str("[book]\nunknown = 1", Path::new(".")).is_err());
    }
}
