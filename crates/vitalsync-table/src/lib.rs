//! `vitalsync-table`: the monthly markdown table.
//!
//! [`Table`] is a lossless-enough model of a markdown file holding one pipe
//! table: lines before the table, header, alignment markers, data rows, and
//! lines after the table. [`TableLayout`] binds a table to the configured
//! column list: it synthesizes empty tables, renders rows from a
//! [`MetricSample`](vitalsync_core::MetricSample) and answers the
//! deduplication question.

pub mod error;
pub mod layout;
pub mod table;

pub use error::{Result, TableError};
pub use layout::{ColumnDivergence, TableLayout};
pub use table::{Alignment, Table, TableRow};
