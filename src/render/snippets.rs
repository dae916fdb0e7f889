//! Pre-rendered code snippets and the example blocks built from them.
//!
//! A snippet `<base>` has a source file per language (`<base>.py`,
//! `<base>.r`) and an output per language in one of three formats
//! (`<base>.py.out`, `<base>.py.png`, `<base>.py.table.html`).

use crate::assets::{AssetStore, ImageRef};
use crate::error::{RenderError, Result};
use std::path::{Path, PathBuf};

/// Snippet languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    Py,
    R,
}

impl Lang {
    pub fn extension(self) -> &'static str {
        match self {
            Lang::Py => "py",
            Lang::R => "r",
        }
    }

    /// Display name used in captions.
    pub fn display_name(self) -> &'static str {
        match self {
            Lang::Py => "Python",
            Lang::R => "R",
        }
    }

    /// Code fence language.
    pub fn fence(self) -> &'static str {
        match self {
            Lang::Py => "python",
            Lang::R => "r",
        }
    }

    /// The language of a snippet file, from its extension.
    pub fn of_file(name: &str) -> Option<Self> {
        match Path::new(name).extension()?.to_str()? {
            "py" => Some(Lang::Py),
            "r" | "R" => Some(Lang::R),
            _ => None,
        }
    }
}

/// Which languages an example shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variants {
    #[default]
    Both,
    Py,
    R,
    None,
}

impl Variants {
    pub fn parse(value: &str) -> std::result::Result<Self, RenderError> {
        match value.trim() {
            "" | "both" => Ok(Variants::Both),
            "py" => Ok(Variants::Py),
            "r" => Ok(Variants::R),
            "none" => Ok(Variants::None),
            other => Err(RenderError::InvalidArgument {
                node: "pyrex".into(),
                message: format!("unknown variant '{}'", other),
            }),
        }
    }

    pub fn langs(self) -> &'static [Lang] {
        match self {
            Variants::Both => &[Lang::Py, Lang::R],
            Variants::Py => &[Lang::Py],
            Variants::R => &[Lang::R],
            Variants::None => &[],
        }
    }
}

/// How a snippet's output was saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Plain,
    Png,
    Table,
}

impl OutputFormat {
    pub fn parse(value: &str) -> std::result::Result<Self, RenderError> {
        match value.trim() {
            "" | "plain" => Ok(OutputFormat::Plain),
            "png" => Ok(OutputFormat::Png),
            "table" => Ok(OutputFormat::Table),
            other => Err(RenderError::InvalidArgument {
                node: "pyrex".into(),
                message: format!("unknown output format '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellBody {
    /// Source lines; `None` is a padding line.
    Code(Vec<Option<String>>),
    /// Plain text output, unescaped
    Text(String),
    Image(ImageRef),
    /// A trusted HTML fragment
    Html(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub caption: Option<String>,
    pub lang: Option<Lang>,
    pub body: CellBody,
}

impl Cell {
    pub fn code(caption: Option<String>, lang: Option<Lang>, lines: Vec<String>) -> Self {
        Self {
            caption,
            lang,
            body: CellBody::Code(lines.into_iter().map(Some).collect()),
        }
    }
}

/// Rows of cells; a row of two is shown side by side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExampleBlock {
    pub rows: Vec<Vec<Cell>>,
}

impl ExampleBlock {
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        if let [left, right] = row.as_mut_slice() {
            if let (CellBody::Code(a), CellBody::Code(b)) = (&mut left.body, &mut right.body) {
                pad_columns(a, b);
            }
        }
        if !row.is_empty() {
            self.rows.push(row);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What a `pyrex` example asks for.
#[derive(Debug, Clone, Default)]
pub struct ExampleRequest {
    pub base: String,
    pub input: Variants,
    pub output: Variants,
    pub format: OutputFormat,
}

/// Pad the shorter column with placeholder lines. Never truncates.
pub fn pad_columns(a: &mut Vec<Option<String>>, b: &mut Vec<Option<String>>) {
    let len = a.len().max(b.len());
    a.resize(len, None);
    b.resize(len, None);
}

/// Reads snippet files from one directory.
#[derive(Debug, Clone)]
pub struct SnippetStore {
    dir: PathBuf,
}

impl SnippetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Read a snippet file by its full name.
    pub fn read(&self, name: &str) -> std::result::Result<String, RenderError> {
        let path = self.path(name);
        std::fs::read_to_string(&path).map_err(|_| RenderError::Snippet { path })
    }

    /// Lines of a source file, without the final newline.
    pub fn lines(&self, name: &str) -> std::result::Result<Vec<String>, RenderError> {
        let code = self.read(name)?;
        Ok(code
            .strip_suffix('\n')
            .unwrap_or(&code)
            .split('\n')
            .map(str::to_string)
            .collect())
    }

    pub fn source(&self, base: &str, lang: Lang) -> std::result::Result<Vec<String>, RenderError> {
        self.lines(&format!("{}.{}", base, lang.extension()))
    }

    /// The output saved for `stem` (`<base>.<lang>`) in `format`.
    pub fn output(&self, stem: &str, format: OutputFormat, assets: &AssetStore) -> Result<CellBody> {
        match format {
            OutputFormat::Plain => Ok(CellBody::Text(self.read(&format!("{}.out", stem))?)),
            OutputFormat::Table => Ok(CellBody::Html(self.read(&format!("{}.table.html", stem))?)),
            OutputFormat::Png => {
                let path = self.path(&format!("{}.png", stem));
                if !path.exists() {
                    return Err(RenderError::Snippet { path }.into());
                }
                Ok(CellBody::Image(assets.publish_file(&path)?))
            }
        }
    }

    /// Source columns for `langs`, captioned "Python code" / "R code".
    pub fn code_row(&self, base: &str, langs: &[Lang]) -> std::result::Result<Vec<Cell>, RenderError> {
        langs
            .iter()
            .map(|&lang| {
                let lines = self.source(base, lang)?;
                Ok(Cell::code(
                    Some(format!("{} code", lang.display_name())),
                    Some(lang),
                    lines,
                ))
            })
            .collect()
    }

    /// Output cells for `langs`. Captions are only added when both
    /// languages are shown.
    pub fn output_row(
        &self,
        base: &str,
        langs: &[Lang],
        format: OutputFormat,
        assets: &AssetStore,
    ) -> Result<Vec<Cell>> {
        let captioned = langs.len() > 1;
        langs
            .iter()
            .map(|&lang| {
                let stem = format!("{}.{}", base, lang.extension());
                Ok(Cell {
                    caption: captioned.then(|| format!("{} output", lang.display_name())),
                    lang: None,
                    body: self.output(&stem, format, assets)?,
                })
            })
            .collect()
    }

    /// Code and output rows for a `pyrex` example.
    pub fn compose(&self, request: &ExampleRequest, assets: &AssetStore) -> Result<ExampleBlock> {
        let mut block = ExampleBlock::default();
        block.push_row(self.code_row(&request.base, request.input.langs())?);
        block.push_row(self.output_row(
            &request.base,
            request.output.langs(),
            request.format,
            assets,
        )?);
        Ok(block)
    }
}
