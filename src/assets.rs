//! Image publishing: conversion, copying, and thumbnails.

use crate::config::Config;
use crate::error::{Error, RenderError, Result};
use crate::process;
use image::GenericImageView;
use siphasher::sip::SipHasher13;
use std::fs;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info};

/// Images that stand for a few characters of text.
const GLYPHS: &[(&str, &str)] = &[
    ("emoji.pdf", "&#x1F60A;"),
    ("hangul.pdf", "&#54620;&#44544;"),
    ("tango.pdf", "&#21336;&#35486;"),
];

const TIKZ_PREAMBLE: &str = "\\documentclass[tikz]{standalone}\n\
\\usepackage{tikz}\n\
\\usepackage{pgfplots}\n\
\\begin{document}\n";

/// A published image, relative to the page that shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// `img/<name>`
    pub src: String,
    /// `img/<stem>_thumb.png` when the image was too large to inline
    pub thumbnail: Option<String>,
}

/// The inline text for a glyph image, if `path` names one.
pub fn glyph(path: &str) -> Option<&'static str> {
    let name = Path::new(path).file_name()?.to_str()?;
    GLYPHS
        .iter()
        .find(|(glyph, _)| *glyph == name)
        .map(|(_, text)| *text)
}

/// Copies images into the output image folder.
#[derive(Debug, Clone)]
pub struct AssetStore {
    base: PathBuf,
    image_dir: PathBuf,
    thumbnail_size: u32,
    timeout: Duration,
}

impl AssetStore {
    pub fn new(base: impl Into<PathBuf>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            image_dir: image_dir.into(),
            thumbnail_size: 640,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            base: config.base.clone(),
            image_dir: config.image_dir(),
            thumbnail_size: config.thumbnail_size,
            timeout: config.timeout,
        }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Publish an image named in the sources, relative to the book base.
    ///
    /// `.pdf` and `.eps` figures are shown through a `.png` next to them,
    /// converted with `convert` unless the `.png` is newer than the figure.
    pub fn publish(&self, path: &Path) -> Result<ImageRef> {
        let source = self.base.join(path);
        let is_vector = matches!(
            source.extension().and_then(|e| e.to_str()),
            Some("pdf") | Some("eps")
        );
        if is_vector {
            let png = source.with_extension("png");
            if !is_fresh(&png, &source) {
                self.convert(&source, &png)?;
            }
            return self.publish_file(&png);
        }
        self.publish_file(&source)
    }

    /// Copy an existing image file into the image folder.
    pub fn publish_file(&self, source: &Path) -> Result<ImageRef> {
        if !source.exists() {
            return Err(RenderError::Image(format!("missing image {}", source.display())).into());
        }
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RenderError::Image(format!("bad image path {}", source.display())))?;
        fs::create_dir_all(&self.image_dir)?;
        let target = self.image_dir.join(name);
        fs::copy(source, &target).map_err(|e| Error::read(source, e))?;
        debug!("Copied {} to {}", source.display(), target.display());
        self.finish(&target)
    }

    /// Compile a `tikzpicture` to `<name>-<hash>.png` in the image folder.
    ///
    /// The hash covers the picture source, so an edited picture is always
    /// compiled again and an unchanged one is reused.
    pub fn render_tikz(&self, source: &str, name: &str) -> Result<ImageRef> {
        fs::create_dir_all(&self.image_dir)?;
        let target = self.image_dir.join(tikz_file_name(source, name));
        if target.exists() {
            debug!("Reusing TikZ figure {}", target.display());
        } else {
            let dir = tempfile::tempdir()?;
            info!("Compiling TikZ figure {} in {}", name, dir.path().display());
            let mut tex = String::from(TIKZ_PREAMBLE);
            tex.push_str(source);
            tex.push_str("\n\\end{document}\n");
            fs::write(dir.path().join("figure.tex"), tex)?;

            process::run(
                Command::new("pdflatex")
                    .args(["-halt-on-error", "-interaction=batchmode", "figure.tex"])
                    .current_dir(dir.path()),
                self.timeout,
            )?;
            self.convert(&dir.path().join("figure.pdf"), &target)?;
        }
        self.finish(&target)
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<()> {
        info!("Converting {} to {}", source.display(), target.display());
        process::run(
            Command::new("convert")
                .args(["-density", "144"])
                .arg(source)
                .arg(target),
            self.timeout,
        )
    }

    /// Build the reference for a published file, writing a thumbnail when
    /// the image is larger than the limit.
    fn finish(&self, published: &Path) -> Result<ImageRef> {
        let src = format!("img/{}", file_name(published));
        let thumbnail = thumbnail(published, self.thumbnail_size)?
            .map(|thumb| format!("img/{}", file_name(&thumb)));
        Ok(ImageRef { src, thumbnail })
    }
}

/// `<name>-<hash of source>.png`
pub fn tikz_file_name(source: &str, name: &str) -> String {
    let mut hasher = SipHasher13::new();
    hasher.write(source.as_bytes());
    format!("{}-{:016x}.png", name, hasher.finish())
}

/// True when `target` exists and is not older than `source`. An existing
/// target without a source counts as fresh.
fn is_fresh(target: &Path, source: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(target), modified(source)) {
        (Some(target), Some(source)) => target >= source,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Write `<stem>_thumb.png` next to `path` if either side exceeds `size`.
fn thumbnail(path: &Path, size: u32) -> Result<Option<PathBuf>> {
    let img = image::open(path)
        .map_err(|e| RenderError::Image(format!("{}: {}", path.display(), e)))?;
    let (width, height) = img.dimensions();
    if width <= size && height <= size {
        return Ok(None);
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target = path.with_file_name(format!("{}_thumb.png", stem));
    if !is_fresh(&target, path) {
        debug!("Thumbnail {}x{} -> {}", width, height, target.display());
        img.thumbnail(size, size)
            .save(&target)
            .map_err(|e| RenderError::Image(format!("{}: {}", target.display(), e)))?;
    }
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use pretty_assertions::assert_eq;
    use std::time::SystemTime;

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([200, 30, 30]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_glyph() {
        assert_eq!(glyph("figures/emoji.pdf"), Some("&#x1F60A;"));
        assert_eq!(glyph("figures/plot.pdf"), None);
    }

    #[test]
    fn test_small_image_is_copied() {
        let base = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::create_dir(base.path().join("figures")).unwrap();
        write_png(&base.path().join("figures/dot.png"), 10, 10);

        let store = AssetStore::new(base.path(), out.path().join("img"));
        let image = store.publish(Path::new("figures/dot.png")).unwrap();
        assert_eq!(
            image,
            ImageRef {
                src: "img/dot.png".into(),
                thumbnail: None
            }
        );
        assert!(out.path().join("img/dot.png").exists());
    }

    #[test]
    fn test_large_image_gets_thumbnail() {
        let base = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_png(&base.path().join("wide.png"), 900, 300);

        let store = AssetStore::new(base.path(), out.path().join("img"));
        let image = store.publish(Path::new("wide.png")).unwrap();
        assert_eq!(image.thumbnail.as_deref(), Some("img/wide_thumb.png"));

        let thumb = image::open(out.path().join("img/wide_thumb.png")).unwrap();
        assert_eq!(thumb.dimensions().0, 640);
    }

    #[test]
    fn test_vector_figure_uses_existing_png() {
        let base = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_png(&base.path().join("chart.png"), 20, 20);

        let store = AssetStore::new(base.path(), out.path().join("img"));
        let image = store.publish(Path::new("chart.pdf")).unwrap();
        assert_eq!(image.src, "img/chart.png");
    }

    fn age(path: &Path, secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_vector_figure_reuses_newer_png() {
        let base = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(base.path().join("chart.pdf"), "%PDF-1.4").unwrap();
        write_png(&base.path().join("chart.png"), 20, 20);
        age(&base.path().join("chart.pdf"), 3600);

        let store = AssetStore::new(base.path(), out.path().join("img"));
        let image = store.publish(Path::new("chart.pdf")).unwrap();
        assert_eq!(image.src, "img/chart.png");
    }

    #[test]
    fn test_vector_figure_reconverts_stale_png() {
        let base = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_png(&base.path().join("chart.png"), 20, 20);
        fs::write(base.path().join("chart.pdf"), "not a pdf").unwrap();
        age(&base.path().join("chart.png"), 3600);

        let store = AssetStore::new(base.path(), out.path().join("img"));
        let err = store.publish(Path::new("chart.pdf")).unwrap_err();
        assert!(matches!(err, Error::Render(RenderError::Subprocess { .. })));
        assert!(!out.path().join("img/chart.png").exists());
    }

    #[test]
    fn test_tikz_name_follows_source() {
        let first = tikz_file_name("\\draw (0,0) -- (1,1);", "tikz-01-1");
        assert_eq!(first, tikz_file_name("\\draw (0,0) -- (1,1);", "tikz-01-1"));
        assert_ne!(first, tikz_file_name("\\draw (0,0) -- (2,2);", "tikz-01-1"));
        assert!(first.starts_with("tikz-01-1-"));
        assert!(first.ends_with(".png"));
    }

    #[test]
    fn test_tikz_reuses_only_matching_picture() {
        let out = tempfile::tempdir().unwrap();
        let img = out.path().join("img");
        fs::create_dir(&img).unwrap();
        let source = "\\begin{tikzpicture}\\draw (0,0) circle (1);\\end{tikzpicture}";
        let name = tikz_file_name(source, "fig-cycle");
        write_png(&img.join(&name), 8, 8);
        write_png(&img.join("fig-cycle.png"), 8, 8);

        let store = AssetStore::new(out.path(), &img);
        let image = store.render_tikz(source, "fig-cycle").unwrap();
        assert_eq!(image.src, format!("img/{}", name));
    }

    #[test]
    fn test_missing_image() {
        let base = tempfile::tempdir().unwrap();
        let store = AssetStore::new(base.path(), base.path().join("img"));
        let err = store.publish(Path::new("nope.png")).unwrap_err();
        assert!(matches!(err, Error::Render(RenderError::Image(_))));
    }
}
