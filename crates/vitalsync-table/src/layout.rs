use std::fmt;

use chrono::{Datelike, NaiveDate};
use vitalsync_core::calendar::{month_name_of, DateFormat};
use vitalsync_core::config::{self, ColumnConfig, ColumnType, TableConfig};
use vitalsync_core::MetricSample;

use crate::error::{Result, TableError};
use crate::table::{Alignment, Table, TableRow};

/// How an existing table's header differs from the configured columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnDivergence {
    /// Configured columns absent from the file. Their values are not written.
    pub missing: Vec<String>,
    /// File columns with no configured counterpart. New rows leave them empty.
    pub unexpected: Vec<String>,
    /// Shared columns appear in a different order.
    pub reordered: bool,
}

impl ColumnDivergence {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && !self.reordered
    }
}

impl fmt::Display for ColumnDivergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing [{}]", self.missing.join(", ")));
        }
        if !self.unexpected.is_empty() {
            parts.push(format!("unexpected [{}]", self.unexpected.join(", ")));
        }
        if self.reordered {
            parts.push("column order differs".to_string());
        }
        f.write_str(&parts.join("; "))
    }
}

/// The configured column list, bound to a date pattern and title template.
#[derive(Debug, Clone)]
pub struct TableLayout {
    title: String,
    columns: Vec<ColumnConfig>,
    alignment: config::Alignment,
    date_format: DateFormat,
}

impl TableLayout {
    pub fn from_config(cfg: &TableConfig) -> Result<Self> {
        let date_format = DateFormat::new(&cfg.date_format).map_err(TableError::Layout)?;
        if !cfg.columns.iter().any(|c| c.column_type == ColumnType::Date) {
            return Err(TableError::Layout("no date column configured".to_string()));
        }
        // Parsed headers are trimmed, so configured names must be too.
        let columns = cfg
            .columns
            .iter()
            .map(|c| ColumnConfig {
                name: c.name.trim().to_string(),
                ..c.clone()
            })
            .collect();
        Ok(Self {
            title: cfg.title.clone(),
            columns,
            alignment: cfg.alignment,
            date_format,
        })
    }

    pub fn columns(&self) -> &[ColumnConfig] {
        &self.columns
    }

    pub fn format_date(&self, date: NaiveDate) -> String {
        self.date_format.format(date)
    }

    /// Name of the first configured date column.
    pub fn date_column(&self) -> &str {
        self.columns
            .iter()
            .find(|c| c.column_type == ColumnType::Date)
            .map(|c| c.name.as_str())
            .unwrap_or_default()
    }

    /// Title line text for the month containing `date`.
    pub fn title_for(&self, date: NaiveDate) -> String {
        format!("{} - {} {}", self.title, month_name_of(date), date.year())
    }

    /// A new month's table: title, blank line, header, marker row.
    pub fn empty_table(&self, month: NaiveDate) -> Table {
        // `left` writes plain dashes, which markdown already renders left-aligned.
        let align = match self.alignment {
            config::Alignment::Left => Alignment::Unspecified,
            config::Alignment::Center => Alignment::Center,
            config::Alignment::Right => Alignment::Right,
        };
        Table::new(
            vec![format!("# {}", self.title_for(month)), String::new()],
            self.columns.iter().map(|c| c.name.clone()).collect(),
            vec![align; self.columns.len()],
        )
    }

    /// Position of the date column in `table`: the configured date column by
    /// name, else the first column when no configured column claims it.
    pub fn date_index(&self, table: &Table) -> Result<usize> {
        if let Some(idx) = table.column_index(self.date_column()) {
            return Ok(idx);
        }
        match table.columns().first() {
            Some(first) if self.column_named(first).is_none() => Ok(0),
            _ => Err(TableError::NoDateColumn {
                expected: self.date_column().to_string(),
            }),
        }
    }

    /// Deduplication predicate: a row for `date` already exists.
    pub fn has_date(&self, table: &Table, date: NaiveDate) -> Result<bool> {
        let idx = self.date_index(table)?;
        Ok(table.has_cell(idx, &self.format_date(date)))
    }

    /// Render `sample` as a row shaped like `table`'s header.
    ///
    /// Cells are matched to configured columns by exact name. Header columns
    /// with no configured counterpart are left empty.
    pub fn render_row(&self, table: &Table, sample: &MetricSample) -> Result<TableRow> {
        let date_idx = self.date_index(table)?;
        let cells = table
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, header)| match self.column_named(header) {
                Some(col) => self.render_cell(col, sample),
                None if idx == date_idx => self.format_date(sample.date()),
                None => String::new(),
            })
            .collect();
        Ok(TableRow::new(cells))
    }

    /// Compare `table`'s header with the configured columns.
    pub fn divergence(&self, table: &Table) -> ColumnDivergence {
        let configured: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        let present: Vec<&str> = table.columns().iter().map(String::as_str).collect();

        let missing = configured
            .iter()
            .filter(|name| !present.contains(name))
            .map(|s| s.to_string())
            .collect();
        let unexpected = present
            .iter()
            .filter(|name| !configured.contains(name))
            .map(|s| s.to_string())
            .collect();

        let shared_in_file: Vec<&str> = present
            .iter()
            .copied()
            .filter(|name| configured.contains(name))
            .collect();
        let shared_in_config: Vec<&str> = configured
            .iter()
            .copied()
            .filter(|name| present.contains(name))
            .collect();

        ColumnDivergence {
            missing,
            unexpected,
            reordered: shared_in_file != shared_in_config,
        }
    }

    fn column_named(&self, name: &str) -> Option<&ColumnConfig> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn render_cell(&self, col: &ColumnConfig, sample: &MetricSample) -> String {
        match col.column_type {
            ColumnType::Date => self.format_date(sample.date()),
            ColumnType::Metric => {
                let value = col.metric_key.and_then(|k| sample.get(k));
                format_value(value, col.decimals())
            }
            ColumnType::Custom => String::new(),
        }
    }
}

/// Format a metric cell: empty when absent, fixed decimals otherwise.
pub fn format_value(value: Option<f64>, decimals: u8) -> String {
    match value {
        Some(v) => format!("{v:.prec$}", prec = decimals as usize),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitalsync_core::MetricKey;

    fn layout() -> TableLayout {
        TableLayout::from_config(&TableConfig {
            title: "Health Metrics".into(),
            date_format: "MM/DD".into(),
            alignment: config::Alignment::Left,
            columns: vec![
                ColumnConfig::date("Date"),
                ColumnConfig::metric("Sleep", MetricKey::SleepScore, None),
                ColumnConfig::metric("Duration", MetricKey::SleepDuration, None),
                ColumnConfig::metric("Strain", MetricKey::StrainScore, Some(2)),
                ColumnConfig::metric("HRV", MetricKey::Hrv, None),
                ColumnConfig::custom("Notes"),
            ],
        })
        .unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn sample(d: u32) -> MetricSample {
        MetricSample::new(day(d))
            .with_value(MetricKey::SleepScore, 84.6)
            .unwrap()
            .with_value(MetricKey::SleepDuration, 7.46)
            .unwrap()
            .with_value(MetricKey::StrainScore, 12.346)
            .unwrap()
            .with_value(MetricKey::RecoveryScore, 66.0)
            .unwrap()
    }

    #[test]
    fn empty_table_has_title_and_header() {
        let out = layout().empty_table(day(1)).render();
        assert_eq!(
            out,
            "# Health Metrics - October 2026\n\n\
             | Date | Sleep | Duration | Strain | HRV | Notes |\n\
             |----|-----|--------|------|---|-----|\n"
        );
    }

    #[test]
    fn row_formats_decimals_and_blanks() {
        let layout = layout();
        let table = layout.empty_table(day(1));
        let row = layout.render_row(&table, &sample(17)).unwrap();
        assert_eq!(row.cells(), ["10/17", "85", "7.5", "12.35", "", ""]);
    }

    #[test]
    fn appended_row_survives_reparse() {
        let layout = layout();
        let mut table = layout.empty_table(day(1));
        let row = layout.render_row(&table, &sample(17)).unwrap();
        table.append(row).unwrap();

        let reparsed = Table::parse(&table.render()).unwrap();
        assert!(layout.has_date(&reparsed, day(17)).unwrap());
        assert!(!layout.has_date(&reparsed, day(18)).unwrap());
        let last = reparsed.rows().last().unwrap();
        assert_eq!(reparsed.cell(last, "Strain"), Some("12.35"));
        assert_eq!(reparsed.cell(last, "HRV"), Some(""));
    }

    #[test]
    fn permuted_columns_map_by_name() {
        let layout = layout();
        let text = "\
# Health Metrics - October 2026

| HRV | Date | Notes | Strain | Duration | Sleep |
|---|---|---|---|---|---|
| 58 | 10/01 | rest day | 4.10 | 8.1 | 91 |
";
        let mut table = Table::parse(text).unwrap();
        let div = layout.divergence(&table);
        assert!(div.reordered);
        assert!(div.missing.is_empty() && div.unexpected.is_empty());

        let row = layout.render_row(&table, &sample(2)).unwrap();
        table.append(row).unwrap();

        let first = &table.rows()[0];
        assert_eq!(table.cell(first, "Notes"), Some("rest day"));
        assert_eq!(table.cell(first, "Sleep"), Some("91"));
        let second = &table.rows()[1];
        assert_eq!(second.cells(), ["", "10/02", "", "12.35", "7.5", "85"]);
        assert!(layout.has_date(&table, day(1)).unwrap());
    }

    #[test]
    fn unknown_and_missing_columns_are_reported() {
        let layout = layout();
        let mut table = Table::parse("| Date | Mood | Sleep |\n|---|---|---|\n").unwrap();
        let div = layout.divergence(&table);
        assert_eq!(div.unexpected, ["Mood"]);
        assert_eq!(div.missing, ["Duration", "Strain", "HRV", "Notes"]);
        assert!(!div.reordered);
        assert!(div.to_string().contains("unexpected [Mood]"));

        let row = layout.render_row(&table, &sample(3)).unwrap();
        assert_eq!(row.cells(), ["10/03", "", "85"]);
        table.append(row).unwrap();
    }

    #[test]
    fn date_falls_back_to_first_column() {
        let layout = layout();
        let table = Table::parse("| Day | Sleep |\n|---|---|\n| 10/05 | 70 |\n").unwrap();
        assert!(layout.has_date(&table, day(5)).unwrap());
        let row = layout.render_row(&table, &sample(6)).unwrap();
        assert_eq!(row.cells(), ["10/06", "85"]);
    }

    #[test]
    fn configured_first_column_is_not_taken_as_date() {
        let layout = layout();
        let table = Table::parse("| Sleep | Day | HRV |\n|---|---|---|\n").unwrap();
        assert!(matches!(
            layout.has_date(&table, day(5)),
            Err(TableError::NoDateColumn { ref expected }) if expected == "Date"
        ));
        assert!(layout.render_row(&table, &sample(5)).is_err());
    }

    #[test]
    fn matching_header_has_no_divergence() {
        let layout = layout();
        let table = layout.empty_table(day(1));
        assert!(layout.divergence(&table).is_empty());
    }

    #[test]
    fn format_value_rounds() {
        assert_eq!(format_value(Some(61.5), 0), "62");
        assert_eq!(format_value(Some(7.0), 2), "7.00");
        assert_eq!(format_value(None, 3), "");
    }
}
