//! HTML output flavor.

use super::snippets::{Cell, CellBody, ExampleBlock};
use super::{Flavor, ListKind, Markup, Page, Target};
use crate::assets::ImageRef;
use crate::resolve::references::{chapter_file, section_anchor};
use crate::resolve::{Chapter, Level, TocEntry};

const MATHJAX_HEAD: &str = r#"<script>
MathJax = {
    tex: {
        inlineMath: [['\\(', '\\)']],
        displayMath: [['\\[', '\\]']]
    }
};
</script>
<script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>"#;

const DEFAULT_STYLES: &str = r#"<style>
.chapter { max-width: 860px; margin: 0 auto; padding: 2em; font-family: Georgia, serif; line-height: 1.6; }
.chapter-nav { display: flex; justify-content: space-between; max-width: 860px; margin: 1em auto; }
.text-muted { color: #666; }
.figure, .code-example, .feature { margin: 2em 0; }
.figure img { max-width: 100%; }
.table { border-collapse: collapse; margin: 1em auto; }
.table th, .table td { border: 1px solid #ddd; padding: 0.4em 0.8em; }
.code-row-double { display: flex; gap: 1em; }
.code-row-double > div { flex: 1; min-width: 0; }
.code-caption { font-weight: bold; font-size: 0.9em; }
pre.code, pre.output { background: #f6f6f6; padding: 0.5em; overflow-x: auto; }
pre.code code { display: block; }
.feature { padding: 1em; background: #f8f8f8; border-left: 3px solid #333; }
.abstract .caption, .keywords .caption, .objectives .caption { font-weight: bold; }
.footnotes { font-size: 0.9em; color: #444; }
.footnote-ref { font-size: 0.8em; }
.cite { border-bottom: 1px dotted #999; }
</style>"#;

/// Escape text for HTML element content.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Reduce rendered HTML to text fit for an attribute value.
pub fn attribute_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            '"' => text.push_str("&quot;"),
            '\n' => text.push(' '),
            c => text.push(c),
        }
    }
    text
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlFlavor;

impl HtmlFlavor {
    fn cell(&self, cell: &Cell, out: &mut String) {
        match &cell.body {
            CellBody::Code(lines) => {
                out.push_str("<div class='code-input'>\n");
                if let Some(caption) = &cell.caption {
                    out.push_str(&format!("  <div class='code-caption'>{}</div>\n", caption));
                }
                out.push_str("  <pre class='code'>");
                for (i, line) in lines.iter().enumerate() {
                    if i > 0 {
                        out.push('\n');
                    }
                    match line {
                        Some(line) => out.push_str(&format!("<code>{}</code>", escape_html(line))),
                        None => out.push_str("&nbsp;"),
                    }
                }
                out.push_str("</pre>\n</div>\n");
            }
            CellBody::Text(text) => {
                out.push_str("<div class='code-output'>\n");
                if let Some(caption) = &cell.caption {
                    out.push_str(&format!("  <div class='code-caption'>{}</div>\n", caption));
                }
                out.push_str(&format!("  <pre class='output'>{}</pre>\n</div>\n", escape_html(text)));
            }
            CellBody::Image(image) => {
                out.push_str("<div class='code-output'>\n");
                out.push_str(&self.image(image, cell.caption.as_deref().unwrap_or("")));
                out.push_str("\n</div>\n");
            }
            CellBody::Html(html) => {
                out.push_str(&format!("<div class='table-wrapper'>{}</div>\n", html));
            }
        }
    }

    fn nav(&self, page: &Page) -> String {
        let link = |chapter: &Chapter, rel: &str| {
            format!(
                "<a rel='{}' href='{}'>{}. {}</a>",
                rel,
                chapter_file(chapter.ordinal, "html"),
                chapter.number,
                chapter.caption
            )
        };
        let mut nav = String::from("<nav class='chapter-nav'>\n");
        nav.push_str(&page.prev.map(|c| link(c, "prev")).unwrap_or_default());
        nav.push_str("\n<a href='index.html'>Contents</a>\n");
        nav.push_str(&page.next.map(|c| link(c, "next")).unwrap_or_default());
        nav.push_str("\n</nav>\n");
        nav
    }

    fn toc_entries(&self, file: &str, entries: &[TocEntry], out: &mut String) {
        if entries.is_empty() {
            return;
        }
        out.push_str("<ul>\n");
        for entry in entries {
            out.push_str(&format!(
                "<li><a href='{}#{}'>{} {}</a>",
                file,
                section_anchor(&entry.number),
                entry.number,
                entry.caption
            ));
            if !entry.children.is_empty() {
                out.push('\n');
                self.toc_entries(file, &entry.children, out);
            }
            out.push_str("</li>\n");
        }
        out.push_str("</ul>\n");
    }
}

impl Flavor for HtmlFlavor {
    fn target(&self) -> Target {
        Target::Html
    }

    fn paragraph_open(&self) -> &'static str {
        "\n<p>"
    }

    fn paragraph_close(&self) -> &'static str {
        "</p>\n"
    }

    fn heading_open(&self, level: Level, anchor: &str, number: &str) -> String {
        if number.is_empty() {
            return format!("\n<h{} id='{}'>", level.index() + 1, anchor);
        }
        format!(
            "\n<h{} id='{}'><small class='text-muted'><a class='anchor' href='#{}'>{}</a></small> ",
            level.index() + 1,
            anchor,
            anchor,
            number
        )
    }

    fn heading_close(&self, level: Level, _anchor: &str) -> String {
        format!("</h{}>\n", level.index() + 1)
    }

    fn markup_open(&self, markup: Markup) -> &'static str {
        match markup {
            Markup::Emphasis => "<em>",
            Markup::Bold => "<strong>",
            Markup::Code => "<code>",
            Markup::SmallCaps => "<span class='smallcaps'>",
            Markup::Underline => "<u>",
        }
    }

    fn markup_close(&self, markup: Markup) -> &'static str {
        match markup {
            Markup::Emphasis => "</em>",
            Markup::Bold => "</strong>",
            Markup::Code => "</code>",
            Markup::SmallCaps => "</span>",
            Markup::Underline => "</u>",
        }
    }

    fn block_open(&self, class: &str) -> String {
        format!("\n<div class='{}'>\n", class)
    }

    fn block_close(&self) -> String {
        "\n</div>\n".to_string()
    }

    fn caption_open(&self, anchor: &str, title: &str) -> String {
        let mut html = if anchor.is_empty() {
            "<h4>\n".to_string()
        } else {
            format!("<h4 id='{}'>\n", anchor)
        };
        if !title.is_empty() {
            html.push_str(&format!(
                "  <small class='text-muted'><a class='anchor' href='#{}'>{}.</a></small><br />\n",
                anchor, title
            ));
        }
        html
    }

    fn caption_close(&self) -> String {
        "</h4>\n".to_string()
    }

    fn list_open(&self, kind: ListKind) -> &'static str {
        match kind {
            ListKind::Itemize => "\n<ul>",
            ListKind::Enumerate => "\n<ol>",
            ListKind::Description => "\n<dl>",
        }
    }

    fn list_close(&self, kind: ListKind) -> &'static str {
        match kind {
            ListKind::Itemize => "\n</ul>\n",
            ListKind::Enumerate => "\n</ol>\n",
            ListKind::Description => "\n</dl>\n",
        }
    }

    fn item_open(&self, kind: ListKind, title: Option<&str>, _nesting: usize) -> String {
        match (kind, title) {
            (ListKind::Description, title) => format!("\n  <dt>{}</dt><dd>", title.unwrap_or("")),
            (_, Some(title)) => format!("\n  <li><strong>{}</strong> ", title),
            (_, None) => "\n  <li>".to_string(),
        }
    }

    fn item_close(&self, kind: ListKind) -> &'static str {
        match kind {
            ListKind::Description => "</dd>",
            _ => "</li>",
        }
    }

    fn inline_math(&self, tex: &str) -> String {
        format!("\\({}\\)", escape_html(tex))
    }

    fn display_math(&self, tex: &str) -> String {
        format!("\\[{}\\]", escape_html(tex))
    }

    fn inline_code(&self, code: &str) -> String {
        format!("<code>{}</code>", escape_html(code))
    }

    fn code_block(&self, code: &str, language: Option<&str>) -> String {
        match language {
            Some(lang) => format!("\n<pre class='language-{}'>{}</pre>\n", lang, escape_html(code)),
            None => format!("\n<pre>{}</pre>\n", escape_html(code)),
        }
    }

    fn link(&self, href: &str, text: &str) -> String {
        format!("<a href='{}'>{}</a>", href, text)
    }

    fn citation(&self, text: &str, reference: &str) -> String {
        format!(
            "<span class=\"cite\" title=\"{}\">{}</span>",
            attribute_text(reference),
            text
        )
    }

    fn span(&self, class: &str, text: &str) -> String {
        format!("<span class='{}'>{}</span>", class, text)
    }

    fn footnote_marker(&self, number: usize) -> String {
        format!(
            "<sup id=\"fnref-{}\" class=\"footnote-ref\"><a href=\"#fn-{}\">[{}]</a></sup>",
            number, number, number
        )
    }

    fn footnotes(&self, notes: &[String]) -> String {
        let mut html = String::from("\n<section class=\"footnotes\">\n<hr>\n<ol>\n");
        for (i, note) in notes.iter().enumerate() {
            let n = i + 1;
            html.push_str(&format!(
                "<li id=\"fn-{}\">{} <a href=\"#fnref-{}\" class=\"footnote-back\">↩</a></li>\n",
                n, note, n
            ));
        }
        html.push_str("</ol>\n</section>\n");
        html
    }

    fn image(&self, image: &ImageRef, alt: &str) -> String {
        let alt = attribute_text(alt);
        match &image.thumbnail {
            Some(thumb) => format!(
                "<a href='{}' title='Click to open full-size image'>\n  <img src='{}' alt=\"{}\" />\n</a>",
                image.src, thumb, alt
            ),
            None => format!("<img src='{}' alt=\"{}\" />", image.src, alt),
        }
    }

    fn dirtree(&self, entries: &[(usize, String)]) -> String {
        let mut html = String::new();
        let mut depth = 0;
        for (level, name) in entries {
            while depth < *level {
                html.push_str("<ul class='dirtree'>\n");
                depth += 1;
            }
            while depth > *level {
                html.push_str("</ul>\n");
                depth -= 1;
            }
            html.push_str(&format!("<li>{}</li>\n", name));
        }
        while depth > 0 {
            html.push_str("</ul>\n");
            depth -= 1;
        }
        html
    }

    fn example(&self, block: &ExampleBlock) -> String {
        let mut html = String::new();
        for row in &block.rows {
            let class = if row.len() > 1 {
                "code-row-double"
            } else {
                "code-single"
            };
            html.push_str(&format!("<div class='{}'>\n", class));
            for cell in row {
                self.cell(cell, &mut html);
            }
            html.push_str("</div>\n");
        }
        html
    }

    fn raw_html(&self, html: &str) -> String {
        html.to_string()
    }

    fn page(&self, page: &Page) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"UTF-8\">\n");
        html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
        html.push_str(&format!(
            "<title>{}. {} | {}</title>\n",
            page.chapter.number,
            attribute_text(&page.chapter.caption),
            escape_html(page.book_title)
        ));
        html.push_str(MATHJAX_HEAD);
        html.push('\n');
        html.push_str(DEFAULT_STYLES);
        html.push_str("\n</head>\n<body>\n");

        let nav = self.nav(page);
        html.push_str(&nav);
        html.push_str("<article class=\"chapter\">\n");
        html.push_str(page.body.trim());
        html.push_str("\n</article>\n");
        html.push_str(&nav);
        html.push_str("</body>\n</html>\n");
        html
    }

    fn index(&self, title: &str, chapters: &[Chapter]) -> Vec<(String, String)> {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"UTF-8\">\n");
        html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
        html.push_str(DEFAULT_STYLES);
        html.push_str("\n</head>\n<body>\n<article class=\"chapter\">\n");
        html.push_str(&format!("<h1>{}</h1>\n", escape_html(title)));
        html.push_str("<nav class=\"toc\">\n<ul>\n");
        for chapter in chapters {
            let file = chapter_file(chapter.ordinal, "html");
            html.push_str(&format!(
                "<li><a href='{}'>{}. {}</a>\n",
                file, chapter.number, chapter.caption
            ));
            self.toc_entries(&file, &chapter.sections, &mut html);
            html.push_str("</li>\n");
        }
        html.push_str("</ul>\n</nav>\n</article>\n</body>\n</html>\n");
        vec![("index.html".to_string(), html)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::UnitKind;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn chapter(ordinal: usize, caption: &str) -> Chapter {
        Chapter {
            ordinal,
            number: ordinal.to_string(),
            label: format!("chap:{}", ordinal),
            caption: caption.to_string(),
            texfile: PathBuf::from(format!("chapter{:02}.tex", ordinal)),
            sections: vec![TocEntry {
                label: "sec:first".into(),
                number: format!("{}.1", ordinal),
                caption: "First steps".into(),
                kind: UnitKind::Section,
                children: Vec::new(),
            }],
            floats: Vec::new(),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
    }

    #[test]
    fn test_attribute_text() {
        assert_eq!(
            attribute_text("Smith, J. <em>Data</em>. \"Quoted\""),
            "Smith, J. Data. &quot;Quoted&quot;"
        );
    }

    #[test]
    fn test_footnotes_section() {
        let html = HtmlFlavor.footnotes(&["First.".to_string(), "Second.".to_string()]);
        assert!(html.contains("<li id=\"fn-1\">First. <a href=\"#fnref-1\""));
        assert!(html.contains("<li id=\"fn-2\">Second."));
        assert_eq!(
            HtmlFlavor.footnote_marker(2),
            "<sup id=\"fnref-2\" class=\"footnote-ref\"><a href=\"#fn-2\">[2]</a></sup>"
        );
    }

    #[test]
    fn test_example_padding_lines() {
        let block = ExampleBlock {
            rows: vec![vec![Cell {
                caption: Some("R code".into()),
                lang: None,
                body: CellBody::Code(vec![Some("x <- 1".into()), None]),
            }]],
        };
        let html = HtmlFlavor.example(&block);
        assert!(html.contains("<div class='code-single'>"));
        assert!(html.contains("<code>x &lt;- 1</code>\n&nbsp;</pre>"));
    }

    #[test]
    fn test_dirtree_nesting() {
        let entries = vec![(1, "project".to_string()), (2, "data".to_string()), (1, "README".to_string())];
        assert_eq!(
            HtmlFlavor.dirtree(&entries),
            "<ul class='dirtree'>\n<li>project</li>\n<ul class='dirtree'>\n<li>data</li>\n</ul>\n<li>README</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_render_standalone() {
        let (one, two) = (chapter(1, "Introduction"), chapter(2, "Fun with data"));
        let page = Page {
            book_title: "Computational Analysis",
            chapter: &two,
            body: "<p>Hello</p>",
            prev: Some(&one),
            next: None,
        };
        let html = HtmlFlavor.page(&page);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>2. Fun with data | Computational Analysis</title>"));
        assert!(html.contains("<a rel='prev' href='chapter01.html'>1. Introduction</a>"));
        assert!(html.contains("MathJax"));
        assert!(html.contains("<p>Hello</p>"));
    }

    #[test]
    fn test_index_page() {
        let files = HtmlFlavor.index("Book", &[chapter(1, "Introduction")]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, "index.html");
        assert!(files[0].1.contains("<a href='chapter01.html'>1. Introduction</a>"));
        assert!(files[0].1.contains("<a href='chapter01.html#sec-1_1'>1.1 First steps</a>"));
    }
}
