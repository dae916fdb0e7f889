//! Table state machine.
//!
//! Tables are emitted as HTML for every target. Cells open lazily when
//! content arrives, rows are padded to the declared column count, and the
//! first `\midrule` switches from the head section to the body.

/// A piece of raw table text, split before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellToken<'a> {
    Text(&'a str),
    /// An unescaped `&`
    ColumnSep,
    /// `\\`, with any `[skip]` that follows it dropped
    RowSep,
}

/// Split raw table text on unescaped `&` and `\\`. Comments are dropped
/// along with their line ending.
pub fn split_cells(raw: &str) -> Vec<CellToken<'_>> {
    let bytes = raw.as_bytes();
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1) == Some(&b'\\') => {
                if start < i {
                    tokens.push(CellToken::Text(&raw[start..i]));
                }
                tokens.push(CellToken::RowSep);
                i += 2;
                if bytes.get(i) == Some(&b'[') {
                    if let Some(close) = raw[i..].find(']') {
                        i += close + 1;
                    }
                }
                start = i;
            }
            // Any other escape, including `\&`, stays in the text.
            b'\\' => i += 2,
            b'%' => {
                if start < i {
                    tokens.push(CellToken::Text(&raw[start..i]));
                }
                i = raw[i..].find('\n').map_or(raw.len(), |n| i + n + 1);
                start = i;
            }
            b'&' => {
                if start < i {
                    tokens.push(CellToken::Text(&raw[start..i]));
                }
                tokens.push(CellToken::ColumnSep);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < raw.len() {
        tokens.push(CellToken::Text(&raw[start.min(raw.len())..]));
    }
    tokens
}

/// Count the columns declared by a `tabular` column spec.
///
/// `l c r X p m b S` count one each; `|`, `@{..}`, `!{..}`, `>{..}` and
/// `<{..}` count nothing; `*{n}{spec}` repeats.
pub fn count_columns(spec: &str) -> usize {
    let chars: Vec<char> = spec.chars().collect();
    let mut count = 0;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            'l' | 'c' | 'r' | 'X' | 'S' => count += 1,
            'p' | 'm' | 'b' => {
                count += 1;
                i = skip_group(&chars, i + 1).0;
                continue;
            }
            '@' | '!' | '>' | '<' => {
                i = skip_group(&chars, i + 1).0;
                continue;
            }
            '*' => {
                let (after_n, n) = skip_group(&chars, i + 1);
                let (after_spec, inner) = skip_group(&chars, after_n);
                let times: usize = n.trim().parse().unwrap_or(1);
                count += times * count_columns(&inner);
                i = after_spec;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    count
}

/// Skip whitespace and one `{...}` group starting at `i`. Returns the
/// position after the group and its contents.
fn skip_group(chars: &[char], mut i: usize) -> (usize, String) {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    if chars.get(i) != Some(&'{') {
        return (i, String::new());
    }
    let mut depth = 0;
    let mut inner = String::new();
    while i < chars.len() {
        match chars[i] {
            '{' => {
                depth += 1;
                if depth > 1 {
                    inner.push('{');
                }
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return (i + 1, inner);
                }
                inner.push('}');
            }
            c => inner.push(c),
        }
        i += 1;
    }
    (i, inner)
}

/// Open-table state for one `tabular`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    columns: usize,
    in_head: bool,
    /// Columns used by the open row, `None` when no row is open
    row: Option<usize>,
    cell_open: bool,
    rows: usize,
}

impl TableState {
    /// Start a table and write its opening tags.
    pub fn open(columns: usize, out: &mut String) -> Self {
        out.push_str("<table class='table'>\n<thead>\n");
        Self {
            columns,
            in_head: true,
            row: None,
            cell_open: false,
            rows: 0,
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Rows closed so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn in_head(&self) -> bool {
        self.in_head
    }

    pub fn cell_open(&self) -> bool {
        self.cell_open
    }

    fn cell_tag(&self) -> &'static str {
        if self.in_head {
            "th"
        } else {
            "td"
        }
    }

    fn open_row(&mut self, out: &mut String) {
        if self.row.is_none() {
            out.push_str("  <tr>\n");
            self.row = Some(0);
            self.cell_open = false;
        }
    }

    /// Open a cell spanning `span` columns, closing any open one first.
    pub fn open_cell(&mut self, span: usize, out: &mut String) {
        self.close_cell(out);
        self.open_row(out);
        let tag = self.cell_tag();
        if span > 1 {
            out.push_str(&format!("    <{} colspan='{}'>", tag, span));
        } else {
            out.push_str(&format!("    <{}>", tag));
        }
        self.cell_open = true;
        if let Some(used) = self.row.as_mut() {
            *used += span.max(1);
        }
    }

    /// Open a cell unless one is already open.
    pub fn ensure_cell(&mut self, out: &mut String) {
        if !self.cell_open {
            self.open_cell(1, out);
        }
    }

    pub fn close_cell(&mut self, out: &mut String) {
        if self.cell_open {
            out.push_str(&format!("</{}>\n", self.cell_tag()));
            self.cell_open = false;
        }
    }

    /// A column separator: close the current cell. A separator with no
    /// open cell stands for an empty one.
    pub fn next_cell(&mut self, out: &mut String) {
        self.ensure_cell(out);
        self.close_cell(out);
    }

    /// A row separator: close the cell, pad the row, close the row.
    pub fn end_row(&mut self, out: &mut String) {
        let Some(used) = self.row else {
            return;
        };
        self.close_cell(out);
        let tag = self.cell_tag();
        for _ in used..self.columns {
            out.push_str(&format!("    <{}></{}>\n", tag, tag));
        }
        out.push_str("  </tr>\n");
        self.row = None;
        self.rows += 1;
    }

    /// Close the row and switch from head to body, once.
    pub fn midrule(&mut self, out: &mut String) {
        self.end_row(out);
        if self.in_head {
            out.push_str("</thead>\n<tbody>\n");
            self.in_head = false;
        }
    }

    /// Flush the open row and close the table.
    pub fn finish(mut self, out: &mut String) {
        self.end_row(out);
        if self.in_head {
            out.push_str("</thead>\n");
        } else {
            out.push_str("</tbody>\n");
        }
        out.push_str("</table>\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn feed(state: &mut TableState, raw: &str, out: &mut String) {
        for token in split_cells(raw) {
            match token {
                CellToken::Text(t) if t.trim().is_empty() => {}
                CellToken::Text(t) => {
                    state.ensure_cell(out);
                    out.push_str(t.trim());
                }
                CellToken::ColumnSep => state.next_cell(out),
                CellToken::RowSep => state.end_row(out),
            }
        }
    }

    #[test]
    fn test_split_cells() {
        assert_eq!(
            split_cells("a & b \\& c \\\\[2pt] d"),
            vec![
                CellToken::Text("a "),
                CellToken::ColumnSep,
                CellToken::Text(" b \\& c "),
                CellToken::RowSep,
                CellToken::Text(" d"),
            ]
        );
    }

    #[test]
    fn test_split_cells_drops_comments() {
        assert_eq!(
            split_cells("a & b % x & y\n\\\\ 50\\% & c%"),
            vec![
                CellToken::Text("a "),
                CellToken::ColumnSep,
                CellToken::Text(" b "),
                CellToken::RowSep,
                CellToken::Text(" 50\\% "),
                CellToken::ColumnSep,
                CellToken::Text(" c"),
            ]
        );
    }

    #[test]
    fn test_count_columns() {
        assert_eq!(count_columns("lcr"), 3);
        assert_eq!(count_columns("|l|c|"), 2);
        assert_eq!(count_columns("@{}lp{3cm}X@{}"), 3);
        assert_eq!(count_columns(">{\\raggedright}l r"), 2);
        assert_eq!(count_columns("l*{3}{c}"), 4);
    }

    #[test]
    fn test_head_body_split_and_padding() {
        let mut out = String::new();
        let mut state = TableState::open(3, &mut out);
        feed(&mut state, "A & B & C \\\\", &mut out);
        state.midrule(&mut out);
        feed(&mut state, "1 & 2 & 3 \\\\\n4 & 5 \\\\\n6 & 7 & 8", &mut out);
        assert_eq!(state.rows(), 3);
        state.finish(&mut out);

        assert_eq!(out.matches("<tr>").count(), 4);
        assert_eq!(out.matches("<th>").count(), 3);
        assert_eq!(out.matches("<td>").count(), 9);
        assert_eq!(out.matches("<td></td>").count(), 1);
        assert_eq!(out.matches("</thead>\n<tbody>").count(), 1);
        assert!(out.ends_with("</tbody>\n</table>\n"));
    }

    #[test]
    fn test_midrule_switches_once() {
        let mut out = String::new();
        let mut state = TableState::open(1, &mut out);
        state.midrule(&mut out);
        state.midrule(&mut out);
        assert!(!state.in_head());
        state.finish(&mut out);
        assert_eq!(out.matches("<tbody>").count(), 1);
    }

    #[test]
    fn test_empty_cells_keep_position() {
        let mut out = String::new();
        let mut state = TableState::open(3, &mut out);
        feed(&mut state, "& & x \\\\", &mut out);
        state.finish(&mut out);
        assert_eq!(
            out,
            "<table class='table'>\n<thead>\n  <tr>\n    <th></th>\n    <th></th>\n    <th>x</th>\n  </tr>\n</thead>\n</table>\n"
        );
    }

    #[test]
    fn test_colspan_counts_columns() {
        let mut out = String::new();
        let mut state = TableState::open(3, &mut out);
        state.open_cell(2, &mut out);
        out.push_str("wide");
        state.end_row(&mut out);
        assert!(out.contains("<th colspan='2'>wide</th>"));
        assert_eq!(out.matches("<th></th>").count(), 1);
    }
}
