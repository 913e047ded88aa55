use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    /// No header row followed by an alignment-marker row was found.
    #[error("no markdown table found (expected a header row followed by an alignment row)")]
    MissingTable,

    #[error("row has {found} cells but the table has {expected} columns")]
    RowWidth { expected: usize, found: usize },

    /// Neither the configured date column nor an unclaimed first column exists.
    #[error("no date column: expected {expected:?} or an unconfigured first column")]
    NoDateColumn { expected: String },

    #[error("invalid table layout: {0}")]
    Layout(String),
}

pub type Result<T> = std::result::Result<T, TableError>;
