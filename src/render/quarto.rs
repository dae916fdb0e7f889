//! Quarto markdown output flavor.

use super::html::attribute_text;
use super::snippets::{Cell, CellBody, ExampleBlock};
use super::{Flavor, ListKind, Markup, Page, Target};
use crate::assets::ImageRef;
use crate::resolve::references::{chapter_file, section_anchor};
use crate::resolve::{Chapter, Level, TocEntry};

#[derive(Debug, Clone, Copy, Default)]
pub struct QuartoFlavor;

fn fence(body: &str, language: &str) -> String {
    format!("\n```{}\n{}\n```\n", language, body.trim_end_matches('\n'))
}

fn yaml_string(s: &str) -> String {
    format!("\"{}\"", attribute_text(s).replace("&quot;", "\\\""))
}

impl QuartoFlavor {
    fn cell(&self, cell: &Cell) -> String {
        match &cell.body {
            CellBody::Code(lines) => {
                let code: Vec<&str> = lines.iter().map(|l| l.as_deref().unwrap_or("")).collect();
                fence(&code.join("\n"), cell.lang.map(|l| l.fence()).unwrap_or(""))
            }
            CellBody::Text(text) => fence(text, ""),
            CellBody::Image(image) => format!("\n{}\n", self.image(image, "")),
            CellBody::Html(html) => self.raw_html(html),
        }
    }

    fn row(&self, row: &[Cell], out: &mut String) {
        if row.len() > 1 {
            out.push_str("\n::: {.panel-tabset}\n");
            for cell in row {
                out.push_str(&format!("\n## {}\n", cell.caption.as_deref().unwrap_or("")));
                out.push_str(&self.cell(cell));
            }
            out.push_str("\n:::\n");
        } else {
            for cell in row {
                if let Some(caption) = &cell.caption {
                    out.push_str(&format!("\n**{}**\n", caption));
                }
                out.push_str(&self.cell(cell));
            }
        }
    }

    fn toc_entries(&self, file: &str, entries: &[TocEntry], nesting: usize, out: &mut String) {
        for entry in entries {
            out.push_str(&format!(
                "{}- [{} {}]({}#{})\n",
                "  ".repeat(nesting),
                entry.number,
                entry.caption,
                file,
                section_anchor(&entry.number)
            ));
            self.toc_entries(file, &entry.children, nesting + 1, out);
        }
    }
}

impl Flavor for QuartoFlavor {
    fn target(&self) -> Target {
        Target::Quarto
    }

    fn paragraph_open(&self) -> &'static str {
        "\n"
    }

    fn paragraph_close(&self) -> &'static str {
        "\n"
    }

    fn heading_open(&self, level: Level, _anchor: &str, number: &str) -> String {
        let hashes = "#".repeat(level.index() + 1);
        if number.is_empty() {
            return format!("\n\n{} ", hashes);
        }
        format!("\n\n{} {} ", hashes, number)
    }

    fn heading_close(&self, _level: Level, anchor: &str) -> String {
        format!(" {{#{} .unnumbered}}\n", anchor)
    }

    fn markup_open(&self, markup: Markup) -> &'static str {
        match markup {
            Markup::Emphasis => "*",
            Markup::Bold => "**",
            Markup::Code => "`",
            Markup::SmallCaps | Markup::Underline => "[",
        }
    }

    fn markup_close(&self, markup: Markup) -> &'static str {
        match markup {
            Markup::Emphasis => "*",
            Markup::Bold => "**",
            Markup::Code => "`",
            Markup::SmallCaps => "]{.smallcaps}",
            Markup::Underline => "]{.underline}",
        }
    }

    fn block_open(&self, class: &str) -> String {
        format!("\n\n::: {{.{}}}\n", class)
    }

    fn block_close(&self) -> String {
        "\n:::\n\n".to_string()
    }

    fn caption_open(&self, anchor: &str, title: &str) -> String {
        let mut md = String::from("\n");
        if !anchor.is_empty() {
            md.push_str(&format!("[]{{#{}}}", anchor));
        }
        if !title.is_empty() {
            md.push_str(&format!("**{}.** ", title));
        }
        md
    }

    fn caption_close(&self) -> String {
        "\n".to_string()
    }

    fn list_open(&self, _kind: ListKind) -> &'static str {
        "\n"
    }

    fn list_close(&self, _kind: ListKind) -> &'static str {
        "\n"
    }

    fn item_open(&self, kind: ListKind, title: Option<&str>, nesting: usize) -> String {
        let bullet = match kind {
            ListKind::Enumerate => "1.",
            ListKind::Itemize | ListKind::Description => "-",
        };
        let mut md = format!("{}{} ", "    ".repeat(nesting), bullet);
        if let Some(title) = title {
            md.push_str(&format!("**{}**", title));
            md.push_str(if kind == ListKind::Description { ": " } else { ". " });
        }
        md
    }

    fn item_close(&self, _kind: ListKind) -> &'static str {
        "\n"
    }

    fn inline_math(&self, tex: &str) -> String {
        format!("${}$", tex.trim())
    }

    fn display_math(&self, tex: &str) -> String {
        format!("\n$${}$$\n", tex.trim())
    }

    fn inline_code(&self, code: &str) -> String {
        if code.contains('`') {
            format!("`` {} ``", code)
        } else {
            format!("`{}`", code)
        }
    }

    fn code_block(&self, code: &str, language: Option<&str>) -> String {
        fence(code, language.unwrap_or(""))
    }

    fn link(&self, href: &str, text: &str) -> String {
        format!("[{}]({})", text, href)
    }

    fn citation(&self, text: &str, reference: &str) -> String {
        format!("[{}]{{.cite title=\"{}\"}}", text, attribute_text(reference))
    }

    fn span(&self, class: &str, text: &str) -> String {
        format!("[{}]{{.{}}}", text, class)
    }

    fn footnote_marker(&self, number: usize) -> String {
        format!("[^{}]", number)
    }

    fn footnotes(&self, notes: &[String]) -> String {
        let mut md = String::from("\n");
        for (i, note) in notes.iter().enumerate() {
            md.push_str(&format!("\n[^{}]: {}\n", i + 1, note.replace('\n', " ")));
        }
        md
    }

    fn image(&self, image: &ImageRef, alt: &str) -> String {
        match &image.thumbnail {
            Some(thumb) => format!("[![{}]({})]({})", alt, thumb, image.src),
            None => format!("![{}]({})", alt, image.src),
        }
    }

    fn dirtree(&self, entries: &[(usize, String)]) -> String {
        let mut md = String::from("\n");
        for (depth, name) in entries {
            md.push_str(&format!("{}- {}\n", "    ".repeat(depth.saturating_sub(1)), name));
        }
        md
    }

    fn example(&self, block: &ExampleBlock) -> String {
        let mut md = String::new();
        for row in &block.rows {
            self.row(row, &mut md);
        }
        md
    }

    fn raw_html(&self, html: &str) -> String {
        format!("\n```{{=html}}\n{}\n```\n", html.trim_end_matches('\n'))
    }

    fn page(&self, page: &Page) -> String {
        let mut md = page.body.trim().to_string();
        md.push('\n');
        md
    }

    fn index(&self, title: &str, chapters: &[Chapter]) -> Vec<(String, String)> {
        let mut index = format!("# {} {{.unnumbered}}\n\n", title);
        for chapter in chapters {
            let file = chapter_file(chapter.ordinal, "qmd");
            index.push_str(&format!("- [{}. {}]({})\n", chapter.number, chapter.caption, file));
            self.toc_entries(&file, &chapter.sections, 1, &mut index);
        }

        let mut yaml = String::from("project:\n  type: book\n  output-dir: _book\n\nbook:\n");
        yaml.push_str(&format!("  title: {}\n", yaml_string(title)));
        yaml.push_str("  chapters:\n    - index.qmd\n");
        for chapter in chapters {
            yaml.push_str(&format!("    - {}\n", chapter_file(chapter.ordinal, "qmd")));
        }
        yaml.push_str("\nformat:\n  html:\n    theme: cosmo\n    number-sections: false\n");

        vec![
            ("index.qmd".to_string(), index),
            ("_quarto.yml".to_string(), yaml),
        ]
    }
}
