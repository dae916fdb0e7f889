//! The tree walker: consumes parsed nodes and writes target markup.
//!
//! A walker owns one output buffer and the running state of a chapter:
//! section counters, the open paragraph, the open table, list nesting, and
//! the endnotes collected so far. Sub-trees whose text is needed as a string
//! (footnote bodies, item titles, kwargs captions) go through a child walker
//! sharing the same context.

use super::snippets::{Cell, ExampleBlock, ExampleRequest, Lang, OutputFormat, Variants};
use super::table::{count_columns, split_cells, CellToken, TableState};
use super::{Flavor, ListKind, Markup, Target};
use crate::assets::{self, AssetStore};
use crate::ast::{source_of, Arg, Node, NodeQueue};
use crate::bibliography::Bibliography;
use crate::error::{Diagnostic, Diagnostics, RenderError, Result};
use crate::normalize::Normalizer;
use crate::parser::kwargs::{parse_kwargs, Kwargs};
use crate::parser::{self, PreprocessContext};
use crate::render::snippets::SnippetStore;
use crate::resolve::citations::{assemble, cite_text};
use crate::resolve::references::{label_to_id, reference_word, section_anchor};
use crate::resolve::{
    namespaced_label, resolve_keys, resolve_reference, CiteStyle, LabelIndex, Level,
    SectionCounters, UnitKind, PLACEHOLDER,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info, warn};

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n\s*").expect("valid regex"));

static ELLIPSIS_MATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\\(cdots|ldots|dots)\s*$").expect("valid regex"));

static DIRTREE_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\.(\d+)\s+(.*?)\.\s*$").expect("valid regex"));

static URL_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]+://").expect("valid regex"));

/// Commands and environments that produce no output.
const IGNORED: &[&str] = &[
    "label",
    "centering",
    "index",
    "noindent",
    "newpage",
    "clearpage",
    "toprule",
    "bottomrule",
    "hline",
    "vspace",
    "hspace",
    "hfill",
    "footnotesize",
    "nocite",
    "medskip",
    "smallskip",
    "bigskip",
    "protect",
    "phantomsection",
    "addcontentsline",
    // font declarations
    "raggedright",
    "normalsize",
    "large",
    "Large",
    "bfseries",
    "itshape",
    "ttfamily",
    "em",
    "bf",
    "it",
    "tt",
];

/// Commands replaced by fixed text: `(name, html, quarto)`.
const FIXED_TEXT: &[(&str, &str, &str)] = &[
    ("textbar", "|", "|"),
    ("textbackslash", "\\", "\\\\"),
    ("textless", "&lt;", "<"),
    ("textgreater", "&gt;", ">"),
    ("ldots", "&hellip;", "…"),
    ("dots", "&hellip;", "…"),
    ("lbrack", "[", "\\["),
    ("rbrack", "]", "\\]"),
    ("tidyverse", "<code>tidyverse</code>", "`tidyverse`"),
    ("pandas", "<code>pandas</code>", "`pandas`"),
    ("sklearn", "<code>scikit-learn</code>", "`scikit-learn`"),
    ("numpy", "<code>numpy</code>", "`numpy`"),
    ("LaTeX", "LaTeX", "LaTeX"),
    ("TeX", "TeX", "TeX"),
];

/// Shared, read-only inputs of a chapter walk.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub labels: &'a LabelIndex,
    pub bibliography: &'a Bibliography,
    /// Verbatim bodies pulled out by the chapter's preprocessing pass
    pub verbs: &'a PreprocessContext,
    pub snippets: &'a SnippetStore,
    pub assets: &'a AssetStore,
    pub target: Target,
    /// Ordinal of the chapter being walked
    pub chapter: usize,
}

impl<'a> RenderContext<'a> {
    pub fn flavor(&self) -> &'static dyn Flavor {
        self.target.flavor()
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.target)
    }
}

/// The output of a finished walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub body: String,
    pub diagnostics: Diagnostics,
}

pub struct Walker<'a> {
    ctx: RenderContext<'a>,
    out: String,
    depth: usize,
    /// Depth at which text forms paragraphs
    block_depth: usize,
    in_paragraph: bool,
    inline: bool,
    table: Option<TableState>,
    lists: Vec<ListKind>,
    footnotes: Vec<String>,
    /// Notes numbered by enclosing walkers before this one started
    footnote_base: usize,
    counters: SectionCounters,
    diagnostics: Diagnostics,
    /// Label of the float being walked
    float_label: Option<String>,
    tikz_count: usize,
}

impl<'a> Walker<'a> {
    pub fn new(ctx: RenderContext<'a>) -> Self {
        let chapter = ctx
            .labels
            .chapter(ctx.chapter)
            .and_then(|c| c.number.parse::<u32>().ok())
            .unwrap_or(ctx.chapter as u32);

        Self {
            ctx,
            out: String::new(),
            depth: 0,
            block_depth: 1,
            in_paragraph: false,
            inline: false,
            table: None,
            lists: Vec::new(),
            footnotes: Vec::new(),
            footnote_base: 0,
            counters: SectionCounters::for_chapter(chapter),
            diagnostics: Diagnostics::default(),
            float_label: None,
            tikz_count: 0,
        }
    }

    /// Walk a chapter's nodes and return the finished body.
    pub fn render(ctx: RenderContext<'a>, nodes: Vec<Node>) -> Result<Rendered> {
        let mut walker = Walker::new(ctx);
        walker.parse(nodes.into())?;
        Ok(walker.finish())
    }

    /// Walk sibling nodes one level below the current depth.
    pub fn parse(&mut self, mut queue: NodeQueue) -> Result<()> {
        self.depth += 1;
        let result = self.parse_queue(&mut queue);
        self.depth -= 1;
        result
    }

    fn parse_queue(&mut self, queue: &mut NodeQueue) -> Result<()> {
        while let Some(node) = queue.pop_front() {
            self.node(node, queue)?;
        }
        Ok(())
    }

    fn parse_inline(&mut self, nodes: Vec<Node>) -> Result<()> {
        let inline = std::mem::replace(&mut self.inline, true);
        let result = self.parse(nodes.into());
        self.inline = inline;
        result
    }

    /// Paragraphs inside a block such as `feature`.
    fn parse_block(&mut self, nodes: Vec<Node>) -> Result<()> {
        self.close_paragraph();
        let outer = std::mem::replace(&mut self.block_depth, self.depth + 1);
        let result = self.parse(nodes.into());
        self.close_paragraph();
        self.block_depth = outer;
        result
    }

    /// Render `nodes` to a string with a child walker.
    ///
    /// The child's footnotes and diagnostics are merged into this walker;
    /// nothing is written to this walker's output.
    pub fn parse_to_string(&mut self, nodes: Vec<Node>) -> Result<String> {
        let mut child = Walker::new(self.ctx);
        child.inline = true;
        child.counters = self.counters;
        child.footnote_base = self.footnote_base + self.footnotes.len();
        child.lists = self.lists.clone();
        child.parse(nodes.into())?;

        self.footnotes.append(&mut child.footnotes);
        self.diagnostics.merge(child.diagnostics);
        Ok(child.out)
    }

    /// Close the open paragraph and flush the endnotes.
    pub fn finish(mut self) -> Rendered {
        self.close_paragraph();
        if let Some(table) = self.table.take() {
            table.finish(&mut self.out);
        }
        if !self.footnotes.is_empty() {
            let notes = self.ctx.flavor().footnotes(&self.footnotes);
            self.out.push_str(&notes);
        }
        Rendered {
            body: self.out,
            diagnostics: self.diagnostics,
        }
    }

    fn open_paragraph(&mut self) {
        if let Some(table) = self.table.as_mut() {
            table.ensure_cell(&mut self.out);
            return;
        }
        if !self.in_paragraph && !self.inline && self.depth == self.block_depth {
            self.out.push_str(self.ctx.flavor().paragraph_open());
            self.in_paragraph = true;
        }
    }

    fn close_paragraph(&mut self) {
        if self.in_paragraph {
            let end = self.out.trim_end().len();
            self.out.truncate(end);
            self.out.push_str(self.ctx.flavor().paragraph_close());
            self.in_paragraph = false;
        }
    }

    fn unknown(&mut self, name: &str) {
        debug!("No handler for {} in chapter {}", name, self.ctx.chapter);
        self.diagnostics
            .record(Diagnostic::UnknownNodeKind(name.to_string()));
    }

    fn node(&mut self, node: Node, queue: &mut NodeQueue) -> Result<()> {
        match node {
            Node::Text(text) => self.text(text, queue),
            Node::Math { display, content } => {
                self.math(display, &content);
                Ok(())
            }
            Node::Group(children) => {
                if !children.iter().all(Node::is_blank) {
                    self.open_paragraph();
                }
                self.parse_inline(children)
            }
            node => self.element(node, queue),
        }
    }

    fn element(&mut self, node: Node, queue: &mut NodeQueue) -> Result<()> {
        let name = node.name().to_string();
        let base = name.trim_end_matches('*');

        if IGNORED.contains(&base) {
            return Ok(());
        }
        if let Some(markup) = Markup::for_command(base) {
            return self.markup(markup, node);
        }
        if let Some(&(_, html, quarto)) = FIXED_TEXT.iter().find(|(n, ..)| *n == base) {
            self.fixed_text(html, quarto, queue);
            return Ok(());
        }
        if let Some(level) = Level::from_command(base) {
            return self.heading(level, name.ends_with('*'), node, queue);
        }
        if CiteStyle::from_command(base).is_some() {
            return self.citation(&node);
        }

        match base {
            "ref" | "pageref" | "refchap" | "refsec" | "reffig" | "reftab" | "refex" => {
                self.reference(&node)
            }
            "footnote" => self.footnote(node),
            "figure" | "table" | "wrapfigure" => self.float(node, "figure"),
            "ccsexample" => self.float(node, "code-example"),
            "caption" => self.caption(node, queue),
            "includegraphics" => self.includegraphics(&node),
            "tikzpicture" => self.tikz(&node),
            "tabular" | "tabularx" => self.tabular(node),
            "multicolumn" => self.multicolumn(node),
            "midrule" => {
                if let Some(table) = self.table.as_mut() {
                    table.midrule(&mut self.out);
                }
                Ok(())
            }
            "cmidrule" => {
                self.cmidrule(queue);
                Ok(())
            }
            "itemize" | "enumerate" | "description" => self.list(node),
            "item" => self.item(node),
            "objectives" => self.objectives(node),
            "abstract" => self.titled_block(node, "abstract", None),
            "keywords" => self.titled_block(node, "keywords", Some("Keywords:")),
            "feature" => self.feature(node),
            "document" | "center" | "quote" | "minipage" | "small" | "flushleft" => {
                // Transparent: the children continue the enclosing run.
                for child in node.into_children().into_iter().rev() {
                    queue.push_front(child);
                }
                Ok(())
            }
            "equation" | "align" | "gather" => {
                self.math_environment(base, &node);
                Ok(())
            }
            "verbatim" | "Verbatim" | "lstlisting" => self.verbatim(&node),
            "verbplaceholder" => self.verb(&node),
            "dirtree" => self.dirtree(&node),
            "url" => self.url(&node),
            "href" => self.href(node),
            "color" => self.color(&node, queue),
            "textcolor" => self.textcolor(node),
            "pyrex" => self.pyrex(&node),
            "doublecodex" => self.double_codex(&node),
            "codex" => self.codex(&node),
            "codexoutputtable" => self.codex_output(&node, OutputFormat::Table),
            "codexoutputpng" => self.codex_output(&node, OutputFormat::Png),
            "doubleoutput" => self.double_output(&node),
            "tcbraster" => self.raster(node),
            "tcolorbox" => self.output_box(node),
            _ => {
                self.unknown(&name);
                Ok(())
            }
        }
    }

    // Text

    fn text(&mut self, first: String, queue: &mut NodeQueue) -> Result<()> {
        let mut raw = first;
        while matches!(queue.front(), Some(Node::Text(_))) {
            if let Some(Node::Text(more)) = queue.pop_front() {
                raw.push_str(&more);
            }
        }

        if self.table.is_some() {
            return self.table_text(&raw);
        }

        let normalizer = self.ctx.normalizer();
        if self.inline || self.depth != self.block_depth {
            let text = normalizer.normalize(&raw)?;
            if self.in_paragraph || self.inline || !text.trim().is_empty() {
                self.out.push_str(&text);
            }
            return Ok(());
        }

        for (i, piece) in PARAGRAPH_BREAK.split(&raw).enumerate() {
            if i > 0 {
                self.close_paragraph();
            }
            let text = normalizer.normalize(piece)?;
            if text.trim().is_empty() {
                if self.in_paragraph {
                    self.out.push_str(&text);
                }
                continue;
            }
            if self.in_paragraph {
                self.out.push_str(&text);
            } else {
                self.open_paragraph();
                self.out.push_str(text.trim_start());
            }
        }
        Ok(())
    }

    /// Table text splits on cell and row separators before normalizing.
    /// Tables are HTML for every target, so cells always get HTML text.
    fn table_text(&mut self, raw: &str) -> Result<()> {
        let normalizer = Normalizer::new(Target::Html);
        for token in split_cells(raw) {
            let Some(table) = self.table.as_mut() else {
                break;
            };
            match token {
                CellToken::Text(text) => {
                    let text = normalizer.normalize(text)?;
                    if text.trim().is_empty() && !table.cell_open() {
                        continue;
                    }
                    table.ensure_cell(&mut self.out);
                    self.out.push_str(&text);
                }
                CellToken::ColumnSep => table.next_cell(&mut self.out),
                CellToken::RowSep => table.end_row(&mut self.out),
            }
        }
        Ok(())
    }

    /// Emit fixed text, swallowing the spaces after the control word.
    fn fixed_text(&mut self, html: &str, quarto: &str, queue: &mut NodeQueue) {
        self.open_paragraph();
        self.out.push_str(match self.ctx.target {
            Target::Html => html,
            Target::Quarto => quarto,
        });

        if let Some(Node::Text(next)) = queue.front_mut() {
            let rest = next.trim_start_matches([' ', '\t']).to_string();
            if rest.is_empty() {
                queue.pop_front();
            } else {
                *next = rest;
            }
        }
    }

    fn markup(&mut self, markup: Markup, node: Node) -> Result<()> {
        let flavor = self.ctx.flavor();
        self.open_paragraph();
        self.out.push_str(flavor.markup_open(markup));
        self.parse_inline(node.into_required(0))?;
        self.out.push_str(flavor.markup_close(markup));
        Ok(())
    }

    fn math(&mut self, display: bool, content: &str) {
        let flavor = self.ctx.flavor();
        if self.table.is_some() {
            self.open_paragraph();
            if ELLIPSIS_MATH.is_match(content) {
                self.out.push_str("&hellip;");
            } else {
                self.out.push_str(&flavor.inline_math(content));
            }
            return;
        }

        if display {
            self.close_paragraph();
            self.out.push_str(&flavor.display_math(content));
        } else {
            self.open_paragraph();
            self.out.push_str(&flavor.inline_math(content));
        }
    }

    fn math_environment(&mut self, name: &str, node: &Node) {
        let body = source_of(node.children());
        let tex = match name {
            "align" => format!("\\begin{{aligned}}{}\\end{{aligned}}", body),
            "gather" => format!("\\begin{{gathered}}{}\\end{{gathered}}", body),
            _ => body,
        };
        self.math(true, &tex);
    }

    // Structure

    fn heading(&mut self, level: Level, starred: bool, node: Node, queue: &NodeQueue) -> Result<()> {
        let raw = node.arg()?.text().to_string();
        self.close_paragraph();

        let (number, anchor) = if starred {
            (String::new(), format!("sec-{}", label_to_id(&raw.to_lowercase().replace(' ', "-"))))
        } else {
            let synthesized = self.counters.bump(level);
            let number = match following_label(queue) {
                Some(label) => match self.ctx.labels.get(&label) {
                    Some(number) => number.to_string(),
                    None => {
                        debug!("Heading label {} not indexed, using {}", label, synthesized);
                        synthesized
                    }
                },
                None => synthesized,
            };
            let anchor = section_anchor(&number);
            (number, anchor)
        };

        info!("{:?} {} {}", level, number, raw);
        let flavor = self.ctx.flavor();
        self.out.push_str(&flavor.heading_open(level, &anchor, &number));
        self.parse_inline(node.into_required(0))?;
        self.out.push_str(&flavor.heading_close(level, &anchor));
        Ok(())
    }

    // References

    fn reference(&mut self, node: &Node) -> Result<()> {
        let command = node.name();
        let label = namespaced_label(command, node.arg()?.text());
        let word = reference_word(command, &label);
        let ctx = self.ctx;

        self.open_paragraph();
        match resolve_reference(ctx.labels, &label, ctx.chapter, ctx.target.extension()) {
            Some(resolved) => {
                let link = ctx.flavor().link(&resolved.href, &with_word(word, &resolved.number));
                self.out.push_str(&link);
            }
            None => {
                warn!("Unresolved reference {} in chapter {}", label, ctx.chapter);
                self.out.push_str(&with_word(word, PLACEHOLDER));
                self.diagnostics
                    .record(Diagnostic::UnresolvedReference(label));
            }
        }
        Ok(())
    }

    fn citation(&mut self, node: &Node) -> Result<()> {
        let Some(style) = CiteStyle::from_command(node.name().trim_end_matches('*')) else {
            return Ok(());
        };
        let ctx = self.ctx;
        let entries = resolve_keys(node.arg()?.text(), ctx.bibliography)?;
        let normalizer = ctx.normalizer();
        let notes = node
            .optional_args()
            .iter()
            .map(|arg| normalizer.normalize(arg.text()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let flavor = ctx.flavor();
        let items: Vec<String> = entries
            .iter()
            .map(|entry| flavor.citation(&cite_text(entry, style), &entry.text))
            .collect();

        self.open_paragraph();
        self.out.push_str(&assemble(style, &items, &notes));
        Ok(())
    }

    fn footnote(&mut self, node: Node) -> Result<()> {
        node.arg()?;
        let body = self.parse_to_string(node.into_required(0))?;
        self.footnotes.push(body.trim().to_string());
        let number = self.footnote_base + self.footnotes.len();

        self.open_paragraph();
        let marker = self.ctx.flavor().footnote_marker(number);
        self.out.push_str(&marker);
        Ok(())
    }

    // Floats

    fn float(&mut self, mut node: Node, class: &str) -> Result<()> {
        let mut children: NodeQueue = node.take_children().into();
        let caption = take_named(&mut children, "caption");
        let label = take_named(&mut children, "label");
        let float_label = label
            .as_ref()
            .and_then(|l| l.arg().ok())
            .map(|a| a.text().to_string())
            .or_else(|| {
                let caption = caption.as_ref()?.required_args();
                find_label(&caption.first()?.nodes)
            });
        if let Some(label) = label {
            children.push_front(label);
        }
        if let Some(caption) = caption {
            children.push_front(caption);
        }

        self.close_paragraph();
        let outer = std::mem::replace(&mut self.float_label, float_label);
        let flavor = self.ctx.flavor();
        self.out.push_str(&flavor.block_open(class));
        let result = self.parse(children);
        self.out.push_str(&flavor.block_close());
        self.float_label = outer;
        result
    }

    fn caption(&mut self, node: Node, queue: &NodeQueue) -> Result<()> {
        let count = node.required_args().len();
        if count != 1 && count != 3 {
            return Err(node.malformed(1, count).into());
        }

        let mut args = node.into_args().into_iter().filter(Arg::is_required);
        let caption = args.next().map(|a| a.nodes).unwrap_or_default();
        let label = find_label(&caption).or_else(|| following_label(queue));
        self.float_caption(label.as_deref(), caption)?;

        // Wiley tables: {caption}{body}{notes}
        if let (Some(body), Some(notes)) = (args.next(), args.next()) {
            self.parse(body.nodes.into())?;
            if !notes.nodes.iter().all(Node::is_blank) {
                let flavor = self.ctx.flavor();
                self.out.push_str(&flavor.block_open("table-notes"));
                self.parse_inline(notes.nodes)?;
                self.out.push_str(&flavor.block_close());
            }
        }
        Ok(())
    }

    /// Caption heading for a numbered float or example.
    fn float_caption(&mut self, label: Option<&str>, caption: Vec<Node>) -> Result<()> {
        let (anchor, title) = match label {
            Some(label) => {
                let word = UnitKind::classify("", label).display_name();
                let number = match self.ctx.labels.get(label) {
                    Some(number) => number.to_string(),
                    None => {
                        warn!("Float label {} is not in the label index", label);
                        self.diagnostics
                            .record(Diagnostic::UnresolvedReference(label.to_string()));
                        PLACEHOLDER.to_string()
                    }
                };
                (label_to_id(label), with_word(word, &number))
            }
            None => {
                debug!("Caption without a label in chapter {}", self.ctx.chapter);
                (String::new(), String::new())
            }
        };

        let flavor = self.ctx.flavor();
        self.out.push_str(&flavor.caption_open(&anchor, &title));
        self.parse_inline(caption)?;
        self.out.push_str(&flavor.caption_close());
        Ok(())
    }

    fn includegraphics(&mut self, node: &Node) -> Result<()> {
        let path: String = node
            .arg()?
            .text()
            .chars()
            .filter(|c| *c != '{' && *c != '}')
            .collect();
        self.open_paragraph();

        if let Some(glyph) = assets::glyph(&path) {
            self.out.push_str(glyph);
            return Ok(());
        }
        let image = self.ctx.assets.publish(Path::new(&path))?;
        let html = self.ctx.flavor().image(&image, "");
        self.out.push_str(&html);
        Ok(())
    }

    fn tikz(&mut self, node: &Node) -> Result<()> {
        self.tikz_count += 1;
        let name = match &self.float_label {
            Some(label) => label_to_id(label),
            None => format!("tikz-{:02}-{}", self.ctx.chapter, self.tikz_count),
        };
        let image = self.ctx.assets.render_tikz(&node.to_source(), &name)?;
        self.open_paragraph();
        let html = self.ctx.flavor().image(&image, "");
        self.out.push_str(&html);
        Ok(())
    }

    // Tables

    fn tabular(&mut self, mut node: Node) -> Result<()> {
        let spec = match node.name() {
            "tabularx" => node.args_exact(2)?[1].raw.clone(),
            _ => node.arg()?.raw.clone(),
        };
        let columns = count_columns(&spec);
        let children = node.take_children();
        debug!("Table with {} columns", columns);

        self.close_paragraph();
        let outer = self.table.take();
        self.table = Some(TableState::open(columns, &mut self.out));
        let result = self.parse(children.into());
        if let Some(table) = std::mem::replace(&mut self.table, outer) {
            table.finish(&mut self.out);
        }
        result
    }

    fn multicolumn(&mut self, node: Node) -> Result<()> {
        let span = {
            let args = node.args_exact(3)?;
            let text = args[0].text();
            text.parse::<usize>()
                .map_err(|_| RenderError::InvalidArgument {
                    node: "multicolumn".into(),
                    message: format!("column count '{}'", text),
                })?
        };
        if let Some(table) = self.table.as_mut() {
            table.open_cell(span, &mut self.out);
        }
        self.parse_inline(node.into_required(2))
    }

    /// Drop the `(lr)` trim and the `{2-3}` range after `\cmidrule`.
    fn cmidrule(&mut self, queue: &mut NodeQueue) {
        if let Some(Node::Text(next)) = queue.front_mut() {
            let trimmed = next.trim_start();
            if let Some(rest) = trimmed.strip_prefix('(') {
                let rest = rest.split_once(')').map_or("", |(_, after)| after).to_string();
                *next = rest;
            }
        }
        while queue.front().map_or(false, Node::is_blank) {
            queue.pop_front();
        }
        if matches!(queue.front(), Some(Node::Group(_))) {
            queue.pop_front();
        }
    }

    // Lists and blocks

    fn list(&mut self, node: Node) -> Result<()> {
        let kind = ListKind::for_environment(node.name()).unwrap_or(ListKind::Itemize);
        let flavor = self.ctx.flavor();
        self.close_paragraph();
        self.out.push_str(flavor.list_open(kind));

        self.lists.push(kind);
        let result = self.parse(node.into_children().into());
        self.lists.pop();
        result?;

        self.out.push_str(flavor.list_close(kind));
        Ok(())
    }

    fn item(&mut self, node: Node) -> Result<()> {
        let kind = self.lists.last().copied().unwrap_or(ListKind::Itemize);
        let nesting = self.lists.len().saturating_sub(1);
        let title = match node.optional_arg()? {
            Some(arg) => Some(self.parse_to_string(arg.nodes.clone())?),
            None => None,
        };

        let flavor = self.ctx.flavor();
        self.out.push_str(&flavor.item_open(kind, title.as_deref().map(str::trim), nesting));
        let children = node.into_children();
        let inline = std::mem::replace(&mut self.inline, true);
        let result = self.parse(trim_leading_blank(children).into());
        self.inline = inline;
        result?;
        self.out.push_str(flavor.item_close(kind));
        Ok(())
    }

    fn objectives(&mut self, node: Node) -> Result<()> {
        let flavor = self.ctx.flavor();
        self.close_paragraph();
        self.out.push_str(&flavor.block_open("objectives"));
        self.out.push_str(flavor.markup_open(Markup::Bold));
        self.out.push_str("Chapter objectives:");
        self.out.push_str(flavor.markup_close(Markup::Bold));
        self.list(node)?;
        self.out.push_str(&flavor.block_close());
        Ok(())
    }

    /// `abstract{title}` and `keywords{...}`: a block led by a bold title.
    fn titled_block(&mut self, node: Node, class: &str, prefix: Option<&str>) -> Result<()> {
        let flavor = self.ctx.flavor();
        let (args, children) = node.into_parts();
        let title = args
            .into_iter()
            .find(Arg::is_required)
            .map(|a| a.nodes)
            .unwrap_or_default();

        self.close_paragraph();
        self.out.push_str(&flavor.block_open(class));
        match prefix {
            Some(prefix) => {
                self.out.push_str(flavor.markup_open(Markup::Bold));
                self.out.push_str(prefix);
                self.out.push_str(flavor.markup_close(Markup::Bold));
                self.out.push(' ');
                self.parse_inline(title)?;
            }
            None if !title.iter().all(Node::is_blank) => {
                self.out.push_str(flavor.markup_open(Markup::Bold));
                self.parse_inline(title)?;
                self.out.push_str(flavor.markup_close(Markup::Bold));
                self.out.push(' ');
            }
            None => {}
        }
        self.parse_inline(trim_leading_blank(children))?;
        self.out.push_str(&flavor.block_close());
        Ok(())
    }

    fn feature(&mut self, node: Node) -> Result<()> {
        let flavor = self.ctx.flavor();
        self.close_paragraph();
        self.out.push_str(&flavor.block_open("feature"));
        self.parse_block(node.into_children())?;
        self.out.push_str(&flavor.block_close());
        Ok(())
    }

    fn verbatim(&mut self, node: &Node) -> Result<()> {
        let code = source_of(node.children());
        let language = match node.optional_arg()? {
            Some(options) => parse_kwargs(&options.raw)?
                .get("language")
                .map(str::to_lowercase),
            None => None,
        };
        self.close_paragraph();
        let block = self
            .ctx
            .flavor()
            .code_block(code.trim_matches('\n'), language.as_deref());
        self.out.push_str(&block);
        Ok(())
    }

    fn verb(&mut self, node: &Node) -> Result<()> {
        let ctx = self.ctx;
        let raw = node.arg()?.text();
        let verb = raw
            .parse::<usize>()
            .ok()
            .and_then(|i| ctx.verbs.verb(i))
            .ok_or_else(|| RenderError::InvalidArgument {
                node: "verbplaceholder".into(),
                message: format!("no verbatim text #{}", raw),
            })?;
        self.open_paragraph();
        self.out.push_str(&ctx.flavor().inline_code(verb));
        Ok(())
    }

    fn dirtree(&mut self, node: &Node) -> Result<()> {
        let normalizer = self.ctx.normalizer();
        let mut entries = Vec::new();
        for line in node.arg()?.raw.lines() {
            let line = line.split('%').next().unwrap_or_default();
            if let Some(caps) = DIRTREE_ENTRY.captures(line) {
                let depth = caps[1].parse::<usize>().unwrap_or(1);
                entries.push((depth, normalizer.normalize(&caps[2])?));
            }
        }
        self.close_paragraph();
        let tree = self.ctx.flavor().dirtree(&entries);
        self.out.push_str(&tree);
        Ok(())
    }

    // Links and color

    fn url(&mut self, node: &Node) -> Result<()> {
        let href = node.arg()?.text().to_string();
        let text = URL_SCHEME.replace(&href, "").into_owned();
        let text = match self.ctx.target {
            Target::Html => super::html::escape_html(&text),
            Target::Quarto => text,
        };
        self.open_paragraph();
        let link = self.ctx.flavor().link(&href, &text);
        self.out.push_str(&link);
        Ok(())
    }

    fn href(&mut self, node: Node) -> Result<()> {
        let href = node.args_exact(2)?[0].text().to_string();
        let text = self.parse_to_string(node.into_required(1))?;
        self.open_paragraph();
        let link = self.ctx.flavor().link(&href, text.trim());
        self.out.push_str(&link);
        Ok(())
    }

    /// `\color{c}` colors the rest of the enclosing group.
    fn color(&mut self, node: &Node, queue: &mut NodeQueue) -> Result<()> {
        let class = node.arg()?.text().to_string();
        let rest: Vec<Node> = queue.drain(..).collect();
        self.colored(&class, rest)
    }

    fn textcolor(&mut self, node: Node) -> Result<()> {
        let class = node.args_exact(2)?[0].text().to_string();
        self.colored(&class, node.into_required(1))
    }

    fn colored(&mut self, class: &str, nodes: Vec<Node>) -> Result<()> {
        let text = self.parse_to_string(nodes)?;
        if text.trim().is_empty() {
            return Ok(());
        }
        self.open_paragraph();
        let span = self.ctx.flavor().span(class, &text);
        self.out.push_str(&span);
        Ok(())
    }

    // Code examples

    /// Render a kwargs value as inline text.
    fn kwarg_text(&mut self, value: &str) -> Result<String> {
        let nodes = parser::parse(value)?;
        Ok(self.parse_to_string(nodes)?.trim().to_string())
    }

    fn kwargs(node: &Node) -> Result<Kwargs> {
        match node.optional_arg()? {
            Some(arg) => Ok(parse_kwargs(&arg.raw)?),
            None => Ok(Kwargs::default()),
        }
    }

    fn example_block(&mut self, class: Option<&str>, block: &ExampleBlock) {
        let flavor = self.ctx.flavor();
        self.close_paragraph();
        if let Some(class) = class {
            self.out.push_str(&flavor.block_open(class));
        }
        self.out.push_str(&flavor.example(block));
        if class.is_some() {
            self.out.push_str(&flavor.block_close());
        }
    }

    fn pyrex(&mut self, node: &Node) -> Result<()> {
        let base = node.arg()?.text().to_string();
        let kwargs = Self::kwargs(node)?;
        let request = ExampleRequest {
            base: base.clone(),
            input: Variants::parse(kwargs.get_or("input", "both"))?,
            output: Variants::parse(kwargs.get_or("output", "both"))?,
            format: OutputFormat::parse(kwargs.get_or("format", "plain"))?,
        };
        let caption = match kwargs.get("caption") {
            Some(caption) => parser::parse(caption)?,
            None => Vec::new(),
        };
        let name = Path::new(&base)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| base.clone());
        let label = format!("ex:{}", name);

        let ctx = self.ctx;
        let block = ctx.snippets.compose(&request, ctx.assets)?;
        debug!("Example {} with {} rows", base, block.rows.len());

        let flavor = ctx.flavor();
        self.close_paragraph();
        self.out.push_str(&flavor.block_open("code-example"));
        self.float_caption(Some(&label), caption)?;
        self.out.push_str(&flavor.example(&block));
        self.out.push_str(&flavor.block_close());
        Ok(())
    }

    fn double_codex(&mut self, node: &Node) -> Result<()> {
        let base = node.arg()?.text();
        let mut block = ExampleBlock::default();
        block.push_row(self.ctx.snippets.code_row(base, &[Lang::Py, Lang::R])?);
        self.example_block(None, &block);
        Ok(())
    }

    /// A single cell from `\codex[caption=...]{file}`. A `.out` file is
    /// shown as plain output, anything else as source code.
    fn codex_cell(&mut self, node: &Node) -> Result<Cell> {
        let file = node.arg()?.text().to_string();
        let kwargs = Self::kwargs(node)?;
        let caption = match kwargs.get("caption") {
            Some(caption) => Some(self.kwarg_text(caption)?),
            None => None,
        };
        if let Some(stem) = file.strip_suffix(".out") {
            let ctx = self.ctx;
            let body = ctx.snippets.output(stem, OutputFormat::Plain, ctx.assets)?;
            return Ok(Cell {
                caption,
                lang: None,
                body,
            });
        }
        let lines = self.ctx.snippets.lines(&file)?;
        Ok(Cell::code(caption, Lang::of_file(&file), lines))
    }

    fn codex(&mut self, node: &Node) -> Result<()> {
        let cell = self.codex_cell(node)?;
        let mut block = ExampleBlock::default();
        block.push_row(vec![cell]);
        self.example_block(None, &block);
        Ok(())
    }

    fn codex_output(&mut self, node: &Node, format: OutputFormat) -> Result<()> {
        let stem = node.arg()?.text();
        let ctx = self.ctx;
        let body = ctx.snippets.output(stem, format, ctx.assets)?;
        let mut block = ExampleBlock::default();
        block.push_row(vec![Cell {
            caption: None,
            lang: None,
            body,
        }]);
        self.example_block(None, &block);
        Ok(())
    }

    fn double_output(&mut self, node: &Node) -> Result<()> {
        let base = node.arg()?.text();
        let ctx = self.ctx;
        let row = ctx
            .snippets
            .output_row(base, &[Lang::Py, Lang::R], OutputFormat::Plain, ctx.assets)?;
        let mut block = ExampleBlock::default();
        block.push_row(row);
        self.example_block(None, &block);
        Ok(())
    }

    /// Two `codex` boxes side by side.
    fn raster(&mut self, node: Node) -> Result<()> {
        let codices: Vec<&Node> = node
            .children()
            .iter()
            .filter(|n| n.name() == "codex")
            .collect();
        if codices.len() != 2 {
            return Err(node.malformed(2, codices.len()).into());
        }

        let mut row = Vec::with_capacity(2);
        for codex in codices {
            row.push(self.codex_cell(codex)?);
        }
        let mut block = ExampleBlock::default();
        block.push_row(row);
        self.example_block(Some("code-raster"), &block);
        Ok(())
    }

    fn output_box(&mut self, node: Node) -> Result<()> {
        let kwargs = Self::kwargs(&node)?;
        let title = match kwargs.get("title") {
            Some(title) => Some(self.kwarg_text(title)?),
            None => None,
        };

        let flavor = self.ctx.flavor();
        self.close_paragraph();
        self.out.push_str(&flavor.block_open("code-output"));
        if let Some(title) = title {
            self.out.push_str(&flavor.caption_open("", &title));
            self.out.push_str(&flavor.caption_close());
        }
        self.parse(node.into_children().into())?;
        self.out.push_str(&flavor.block_close());
        Ok(())
    }
}

/// `Section 3.2`, or the bare number when the command prints no word.
fn with_word(word: &str, number: &str) -> String {
    if word.is_empty() {
        number.to_string()
    } else {
        format!("{} {}", word, number)
    }
}

/// The `\label` directly following a node, skipping blank text and comments.
fn following_label(queue: &NodeQueue) -> Option<String> {
    queue
        .iter()
        .find(|n| !n.is_blank_or_comment())
        .filter(|n| n.name() == "label")
        .and_then(|n| n.arg().ok())
        .map(|a| a.text().to_string())
}

/// The first `\label` among `nodes`.
fn find_label(nodes: &[Node]) -> Option<String> {
    nodes
        .iter()
        .find(|n| n.name() == "label")
        .and_then(|n| n.arg().ok())
        .map(|a| a.text().to_string())
}

fn take_named(queue: &mut NodeQueue, name: &str) -> Option<Node> {
    let pos = queue.iter().position(|n| n.name() == name)?;
    queue.remove(pos)
}

fn trim_leading_blank(mut nodes: Vec<Node>) -> Vec<Node> {
    let blank = nodes.iter().take_while(|n| n.is_blank()).count();
    nodes.drain(..blank);
    if let Some(Node::Text(first)) = nodes.first_mut() {
        *first = first.trim_start().to_string();
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bibliography::BibEntry;
    use crate::error::Error;
    use crate::render::HtmlFlavor;
    use pretty_assertions::assert_eq;
    use std::fs;

    struct Fixture {
        dir: tempfile::TempDir,
        labels: LabelIndex,
        bibliography: Bibliography,
        snippets: SnippetStore,
        assets: AssetStore,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut labels = LabelIndex::default();
        labels.insert("chap:intro", "1");
        labels.insert("sec:tidy", "1.2");
        labels.insert("fig:plot", "1.1");
        labels.insert("fig:other", "2.1");
        labels.insert("ex:hello", "1.3");

        let mut bibliography = Bibliography::default();
        bibliography.insert(BibEntry {
            key: "wickham2014".into(),
            short: "Wickham, 2014".into(),
            text: "Wickham, H. (2014). Tidy data.".into(),
        });

        let snippets = SnippetStore::new(dir.path().join("snippets"));
        let assets = AssetStore::new(dir.path(), dir.path().join("out/img"));
        Fixture {
            dir,
            labels,
            bibliography,
            snippets,
            assets,
        }
    }

    fn render_in(fx: &Fixture, target: Target, tex: &str) -> Result<Rendered> {
        let mut verbs = PreprocessContext::new();
        let nodes = parser::parse(&verbs.preprocess(tex))?;
        let ctx = RenderContext {
            labels: &fx.labels,
            bibliography: &fx.bibliography,
            verbs: &verbs,
            snippets: &fx.snippets,
            assets: &fx.assets,
            target,
            chapter: 1,
        };
        Walker::render(ctx, nodes)
    }

    fn html(tex: &str) -> Rendered {
        render_in(&fixture(), Target::Html, tex).unwrap()
    }

    #[test]
    fn test_paragraphs() {
        let out = html("First para.\n\nSecond para.");
        assert_eq!(out.body, "\n<p>First para.</p>\n\n<p>Second para.</p>\n");
        assert!(out.diagnostics.is_clean());
    }

    #[test]
    fn test_missing_reference_keeps_going() {
        let out = html("See \\refsec{nowhere} here.\n\nNext paragraph.");
        assert!(out.body.contains("See Section ?? here."));
        assert!(out.body.contains("<p>Next paragraph.</p>"));
        assert_eq!(out.diagnostics.unresolved_references, vec!["sec:nowhere"]);
    }

    #[test]
    fn test_references_link_across_chapters() {
        let out = html("\\refsec{tidy} and \\ref{fig:other}.");
        assert!(out.body.contains("<a href='#sec-1_2'>Section 1.2</a>"));
        assert!(out.body.contains("<a href='chapter02.html#fig-other'>2.1</a>"));
    }

    #[test]
    fn test_missing_citation_is_fatal() {
        match render_in(&fixture(), Target::Html, "As shown \\citep{ghost}.") {
            Err(Error::Render(RenderError::UnresolvedCitationKey(key))) => assert_eq!(key, "ghost"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_citation() {
        let out = html("\\citet{wickham2014} argues.");
        assert!(out.body.contains(
            "<span class=\"cite\" title=\"Wickham, H. (2014). Tidy data.\">Wickham (2014)</span> argues."
        ));
        let out = html("\\citep[see][p. 3]{wickham2014}");
        assert!(out.body.contains("(see <span"));
        assert!(out.body.contains("</span>, p. 3)"));
    }

    #[test]
    fn test_unknown_node_is_reported() {
        let out = html("Alpha \\mystery{x} beta.\n\nGamma.");
        assert!(out.body.contains("<p>Alpha "));
        assert!(out.body.contains("beta.</p>"));
        assert!(out.body.contains("<p>Gamma.</p>"));
        assert!(out.diagnostics.unknown_nodes.contains("mystery"));
    }

    #[test]
    fn test_headings_take_label_numbers() {
        let out = html("\\chapter{Intro}\\label{chap:intro}\n\\section{Why}\n\nText.\n\\section{Tidy data}\n\\label{sec:tidy}");
        assert!(out.body.contains("<h1 id='sec-1'>"));
        assert!(out.body.contains("<h2 id='sec-1_1'>"));
        assert!(out.body.contains("<a class='anchor' href='#sec-1_2'>1.2</a></small> Tidy data</h2>"));
        assert!(out.body.contains("<p>Text.</p>"));
    }

    #[test]
    fn test_heading_label_after_comment() {
        let out = html("\\section{Why}\n\\section{Tidy data}%\n\\label{sec:tidy}");
        assert!(out.body.contains("<h2 id='sec-1_2'>"));
        assert!(!out.body.contains("sec-0_2"));
    }

    #[test]
    fn test_starred_heading_is_unnumbered() {
        let out = html("\\section*{Exercises}");
        assert_eq!(out.body, "\n<h2 id='sec-exercises'>Exercises</h2>\n");
    }

    #[test]
    fn test_table_padding_and_head() {
        let tex = "\\begin{tabular}{lcr}\nA & B & C \\\\\n\\midrule\n1 & 2 \\\\\n\\end{tabular}";
        let out = html(tex);
        assert!(out.body.starts_with("<table class='table'>\n<thead>\n"));
        assert_eq!(out.body.matches("<tr>").count(), 2);
        assert_eq!(out.body.matches("<th>").count(), 3);
        assert_eq!(out.body.matches("<td></td>").count(), 1);
        assert_eq!(out.body.matches("</thead>\n<tbody>\n").count(), 1);
        assert!(out.body.ends_with("</tbody>\n</table>\n"));
    }

    #[test]
    fn test_table_comments_do_not_split_cells() {
        let out = html("\\begin{tabular}{ll}\na & b % x & y\n\\\\\n\\end{tabular}");
        assert_eq!(out.body.matches("<th>").count(), 2);
        assert!(!out.body.contains(" y"));
        assert!(!out.body.contains('%'));
    }

    #[test]
    fn test_quarto_table_cells_are_escaped() {
        let tex = "\\begin{tabular}{ll}\na <b> & R \\& D \\\\\n\\end{tabular}";
        let out = render_in(&fixture(), Target::Quarto, tex).unwrap();
        assert!(out.body.contains("<th>\na &lt;b&gt; </th>"));
        assert!(out.body.contains("R &amp; D "));
        assert!(!out.body.contains("<b>"));
    }

    #[test]
    fn test_multicolumn() {
        let out = html("\\begin{tabular}{ll}\\multicolumn{2}{c}{Both} \\\\ a & $\\ldots$ \\\\ \\end{tabular}");
        assert!(out.body.contains("<th colspan='2'>Both"));
        assert!(out.body.contains("<th>&hellip; </th>"));
    }

    #[test]
    fn test_bad_multicolumn_count() {
        let result = render_in(
            &fixture(),
            Target::Html,
            "\\begin{tabular}{ll}\\multicolumn{two}{c}{X}\\end{tabular}",
        );
        assert!(matches!(
            result,
            Err(Error::Render(RenderError::InvalidArgument { .. }))
        ));
    }

    #[test]
    fn test_footnotes_are_endnotes() {
        let out = html("One\\footnote{First note.} and two\\footnote{Second \\emph{note}.}.");
        assert!(out.body.contains(&HtmlFlavor.footnote_marker(1)));
        assert!(out.body.contains(&HtmlFlavor.footnote_marker(2)));
        assert!(out.body.contains("<li id=\"fn-2\">Second <em>note</em>."));
        assert!(out.body.ends_with("</ol>\n</section>\n"));
    }

    #[test]
    fn test_figure_caption_first() {
        let fx = fixture();
        image::RgbImage::new(4, 4)
            .save(fx.dir.path().join("dot.png"))
            .unwrap();
        let tex = "\\begin{figure}\n\\centering\n\\includegraphics[width=3in]{dot.png}\n\\caption{A dot.}\n\\label{fig:plot}\n\\end{figure}";
        let out = render_in(&fx, Target::Html, tex).unwrap();

        let caption = out.body.find("Figure 1.1.").unwrap();
        let image = out.body.find("<img src='img/dot.png'").unwrap();
        assert!(caption < image);
        assert!(out.body.contains("<div class='figure'>"));
        assert!(out.body.contains("<h4 id='fig-plot'>"));
        assert!(fx.dir.path().join("out/img/dot.png").exists());
    }

    #[test]
    fn test_lists() {
        let out = html("\\begin{itemize}\n\\item One\n\\item[Two] Second\n\\end{itemize}");
        assert!(out.body.contains("<ul>"));
        assert!(out.body.contains("<li>One"));
        assert!(out.body.contains("<li><strong>Two</strong> Second"));
        assert!(out.body.contains("</ul>"));
    }

    #[test]
    fn test_verb_placeholders() {
        let out = html("Use \\verb|x<y| here.");
        assert!(out.body.contains("Use <code>x&lt;y</code> here."));

        let result = render_in(&fixture(), Target::Html, "\\verbplaceholder{7}");
        assert!(matches!(
            result,
            Err(Error::Render(RenderError::InvalidArgument { .. }))
        ));
    }

    #[test]
    fn test_fixed_text_swallows_space() {
        let out = html("Wait\\ldots and \\pandas rocks.");
        assert!(out.body.contains("Wait&hellip;and <code>pandas</code>rocks."));
    }

    #[test]
    fn test_pyrex_example() {
        let fx = fixture();
        let dir = fx.dir.path().join("snippets/ch01");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("hello.py"), "print('hi')\n").unwrap();
        fs::write(dir.join("hello.r"), "print('hi')\ncat('x')\n").unwrap();
        fs::write(dir.join("hello.py.out"), "hi\n").unwrap();
        fs::write(dir.join("hello.r.out"), "[1] \"hi\"\n").unwrap();

        let out = render_in(&fx, Target::Html, "\\pyrex[caption={Say $x$}]{ch01/hello}").unwrap();
        assert!(out.body.contains("<div class='code-example'>"));
        assert!(out.body.contains("Example 1.3."));
        assert!(out.body.contains("Say \\(x\\)"));
        assert!(out.body.contains("<div class='code-caption'>Python code</div>"));
        assert!(out.body.contains("&nbsp;"));
        assert!(out.body.contains("<pre class='output'>[1] &quot;hi&quot;\n</pre>"));
    }

    fn snippet_dir(fx: &Fixture) -> std::path::PathBuf {
        let dir = fx.dir.path().join("snippets/ch01");
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_pyrex_png_output() {
        let fx = fixture();
        let dir = snippet_dir(&fx);
        fs::write(dir.join("plot.py"), "df.plot()\n").unwrap();
        image::RgbImage::new(900, 300)
            .save(dir.join("plot.py.png"))
            .unwrap();

        let tex = "\\pyrex[input=py, output=py, format=png]{ch01/plot}";
        let out = render_in(&fx, Target::Html, tex).unwrap();
        assert!(out.body.contains("<a href='img/plot.py.png'"));
        assert!(out.body.contains("<img src='img/plot.py_thumb.png'"));
        assert!(!out.body.contains("&nbsp;"));
        assert!(!out.body.contains("<pre class='output'>"));
        assert!(fx.dir.path().join("out/img/plot.py.png").exists());
        assert!(fx.dir.path().join("out/img/plot.py_thumb.png").exists());
    }

    #[test]
    fn test_ccsexample_pads_columns() {
        let fx = fixture();
        let dir = snippet_dir(&fx);
        fs::write(dir.join("hello.py"), "a = 1\nb = 2\nc = 3\nd = 4\ne = 5\n").unwrap();
        fs::write(dir.join("hello.r"), "a <- 1\nb <- 2\nc <- 3\nd <- 4\ne <- 5\nf <- 6\ng <- 7\nh <- 8\n").unwrap();
        fs::write(dir.join("hello.py.out"), "5\n").unwrap();

        let tex = "\\begin{ccsexample}\n\\doublecodex{ch01/hello}\n\\codex{ch01/hello.py.out}\n\\caption{Counting}\n\\label{ex:hello}\n\\end{ccsexample}";
        let out = render_in(&fx, Target::Html, tex).unwrap();

        assert!(out.body.contains("<div class='code-example'>"));
        let caption = out.body.find("Example 1.3.").unwrap();
        let code = out.body.find("<code>a = 1</code>").unwrap();
        assert!(caption < code);
        assert!(out.body.contains("<div class='code-row-double'>"));
        assert_eq!(out.body.matches("<code>").count(), 13);
        assert_eq!(out.body.matches("&nbsp;").count(), 3);
        assert!(out.body.contains("<div class='code-output'>\n  <pre class='output'>5\n</pre>"));
        assert!(out.diagnostics.is_clean());
    }

    #[test]
    fn test_raster_of_two_codex_boxes() {
        let fx = fixture();
        let dir = snippet_dir(&fx);
        fs::write(dir.join("load.py"), "import pandas as pd\n").unwrap();
        fs::write(dir.join("load.r"), "library(readr)\nx <- read_csv('x.csv')\n").unwrap();

        let tex = "\\begin{tcbraster}\n\\codex[caption={Python}]{ch01/load.py}\n\\codex[caption={R}]{ch01/load.r}\n\\end{tcbraster}";
        let out = render_in(&fx, Target::Html, tex).unwrap();
        assert!(out.body.contains("<div class='code-raster'>"));
        assert!(out.body.contains("<div class='code-row-double'>"));
        assert!(out.body.contains("<div class='code-caption'>Python</div>"));
        assert!(out.body.contains("<div class='code-caption'>R</div>"));
        assert!(out.body.contains("<code>x &lt;- read_csv('x.csv')</code>"));
        assert_eq!(out.body.matches("&nbsp;").count(), 1);
    }

    #[test]
    fn test_raster_needs_two_boxes() {
        let result = render_in(
            &fixture(),
            Target::Html,
            "\\begin{tcbraster}\\codex{a.py}\\end{tcbraster}",
        );
        match result {
            Err(Error::Render(RenderError::MalformedArgumentCount { expected, found, .. })) => {
                assert_eq!((expected, found), (2, 1));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_quarto_output() {
        let fx = fixture();
        let tex = "\\section{Tidy data}\\label{sec:tidy}\nSome \\textbf{bold} text\\footnote{A note.}.\n\n$$x^2$$";
        let out = render_in(&fx, Target::Quarto, tex).unwrap();
        assert!(out.body.contains("\n\n## 1.2 Tidy data {#sec-1_2 .unnumbered}\n"));
        assert!(out.body.contains("Some **bold** text[^1]."));
        assert!(out.body.contains("\n$$x^2$$\n"));
        assert!(out.body.ends_with("\n\n[^1]: A note.\n"));
    }

    #[test]
    fn test_feature_keeps_paragraphs() {
        let out = html("\\begin{feature}\nOne.\n\nTwo.\n\\end{feature}");
        assert!(out.body.contains("<div class='feature'>\n\n<p>One.</p>\n\n<p>Two.</p>"));
    }

    #[test]
    fn test_transparent_center() {
        let out = html("\\begin{center}\nCentered text.\n\\end{center}");
        assert!(out.body.contains("<p>Centered text."));
    }
}
