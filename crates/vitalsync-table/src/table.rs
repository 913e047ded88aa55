use std::fmt;

use crate::error::{Result, TableError};

/// Column alignment as written in the marker row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// `---`
    Unspecified,
    /// `:---`
    Left,
    /// `:---:`
    Center,
    /// `---:`
    Right,
}

impl Alignment {
    fn parse(marker: &str) -> Option<Self> {
        let m = marker.trim();
        let starts = m.starts_with(':');
        let ends = m.len() > 1 && m.ends_with(':');
        let dashes = m.trim_start_matches(':').trim_end_matches(':');
        if dashes.is_empty() || !dashes.chars().all(|c| c == '-') {
            return None;
        }
        Some(match (starts, ends) {
            (true, true) => Alignment::Center,
            (true, false) => Alignment::Left,
            (false, true) => Alignment::Right,
            (false, false) => Alignment::Unspecified,
        })
    }

    /// Marker for a column whose header is `width` characters wide.
    fn marker(&self, width: usize) -> String {
        let w = width.max(3);
        match self {
            Alignment::Unspecified => "-".repeat(w),
            Alignment::Left => format!(":{}", "-".repeat(w - 1)),
            Alignment::Center => format!(":{}:", "-".repeat(w - 2)),
            Alignment::Right => format!("{}:", "-".repeat(w - 1)),
        }
    }
}

/// One data row. Cells are positional, matching the owning table's header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    cells: Vec<String>,
}

impl TableRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn cell(&self, idx: usize) -> Option<&str> {
        self.cells.get(idx).map(String::as_str)
    }
}

impl fmt::Display for TableRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_cells(&self.cells))
    }
}

/// A markdown document containing one pipe table.
///
/// Lines before the header (title, notes) and after the last data row are
/// kept verbatim so that rewriting the file only ever changes the rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    preamble: Vec<String>,
    columns: Vec<String>,
    alignments: Vec<Alignment>,
    rows: Vec<TableRow>,
    trailer: Vec<String>,
}

impl Table {
    /// Build an empty table. `alignments` is padded or truncated to the
    /// column count.
    pub fn new(preamble: Vec<String>, columns: Vec<String>, mut alignments: Vec<Alignment>) -> Self {
        alignments.resize(columns.len(), Alignment::Unspecified);
        Self {
            preamble,
            columns,
            alignments,
            rows: Vec::new(),
            trailer: Vec::new(),
        }
    }

    /// Parse the first pipe table in `text`.
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();

        let header_idx = (0..lines.len())
            .find(|&i| {
                is_table_line(lines[i])
                    && lines.get(i + 1).is_some_and(|next| {
                        is_table_line(next) && parse_alignments(next).is_some()
                    })
            })
            .ok_or(TableError::MissingTable)?;

        let columns = split_cells(lines[header_idx]);
        let mut alignments = parse_alignments(lines[header_idx + 1]).unwrap_or_default();
        alignments.resize(columns.len(), Alignment::Unspecified);

        let mut rows = Vec::new();
        let mut idx = header_idx + 2;
        while idx < lines.len() && is_table_line(lines[idx]) {
            let mut cells = split_cells(lines[idx]);
            // Short rows are padded; cells beyond the header are kept as-is.
            if cells.len() < columns.len() {
                cells.resize(columns.len(), String::new());
            }
            rows.push(TableRow::new(cells));
            idx += 1;
        }

        Ok(Self {
            preamble: lines[..header_idx].iter().map(|s| s.to_string()).collect(),
            columns,
            alignments,
            rows,
            trailer: lines[idx..].iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Serialize back to markdown. Always ends with a newline.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.preamble {
            out.push_str(line);
            out.push('\n');
        }

        out.push_str(&render_cells(&self.columns));
        out.push('\n');

        let markers: Vec<String> = self
            .columns
            .iter()
            .zip(&self.alignments)
            .map(|(name, align)| align.marker(name.chars().count()))
            .collect();
        out.push('|');
        out.push_str(&markers.join("|"));
        out.push_str("|\n");

        for row in &self.rows {
            out.push_str(&render_cells(&row.cells));
            out.push('\n');
        }
        for line in &self.trailer {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Add a row after the last data row. Existing rows are never touched.
    pub fn append(&mut self, row: TableRow) -> Result<()> {
        if row.cells.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                expected: self.columns.len(),
                found: row.cells.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// True when some row holds exactly `value` in column `column_idx`.
    pub fn has_cell(&self, column_idx: usize, value: &str) -> bool {
        self.rows
            .iter()
            .any(|row| row.cell(column_idx) == Some(value))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn alignments(&self) -> &[Alignment] {
        &self.alignments
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell of `row` under the column called `name`.
    pub fn cell<'a>(&self, row: &'a TableRow, name: &str) -> Option<&'a str> {
        self.column_index(name).and_then(|idx| row.cell(idx))
    }

    /// Text of the first `# ` heading before the table.
    pub fn title(&self) -> Option<&str> {
        self.preamble
            .iter()
            .find_map(|line| line.strip_prefix("# "))
            .map(str::trim)
    }
}

fn is_table_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn parse_alignments(line: &str) -> Option<Vec<Alignment>> {
    let cells = split_cells(line);
    if cells.is_empty() {
        return None;
    }
    cells.iter().map(|c| Alignment::parse(c)).collect()
}

/// Split a pipe-table line into trimmed cells. `\|` is part of a cell.
fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = match inner.strip_suffix('|') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => inner,
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for ch in inner.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                current.push(ch);
                escaped = true;
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(ch),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn render_cells(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}
