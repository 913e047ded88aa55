use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use vitalsync_core::calendar::{month_name_of, same_month};
use vitalsync_core::{AppConfig, MetricSample};
use vitalsync_table::{ColumnDivergence, Table, TableLayout, TableRow};

use crate::atomic::write_atomic;
use crate::error::VaultError;

/// A row ready to be persisted, plus the full table it produces.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub path: PathBuf,
    pub date: NaiveDate,
    /// The target file does not exist yet.
    pub created: bool,
    pub row: TableRow,
    pub divergence: ColumnDivergence,
    table: Table,
}

impl SyncPlan {
    /// File content after the append.
    pub fn rendered(&self) -> String {
        self.table.render()
    }
}

#[derive(Debug, Clone)]
pub enum Planned {
    Append(SyncPlan),
    Duplicate { date: NaiveDate, path: PathBuf },
    Historical { date: NaiveDate },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Written {
        path: PathBuf,
        row: TableRow,
        created: bool,
    },
    Duplicate {
        date: NaiveDate,
        path: PathBuf,
    },
    Historical {
        date: NaiveDate,
    },
}

/// Owns the vault directory and the `{prefix}-{Month}.md` files in it.
#[derive(Debug, Clone)]
pub struct MonthlyFileManager {
    vault: PathBuf,
    prefix: String,
    layout: TableLayout,
    allow_historical: bool,
    deduplication: bool,
}

impl MonthlyFileManager {
    pub fn new(cfg: &AppConfig) -> Result<Self, VaultError> {
        let layout = TableLayout::from_config(&cfg.table).map_err(VaultError::Layout)?;
        Ok(Self {
            vault: cfg.vault.path.clone(),
            prefix: cfg.vault.file_prefix.clone(),
            layout,
            allow_historical: cfg.execution.allow_historical,
            deduplication: cfg.execution.deduplication,
        })
    }

    pub fn vault(&self) -> &Path {
        &self.vault
    }

    /// File for the month containing `date`. Month names are always English.
    pub fn target_path(&self, date: NaiveDate) -> PathBuf {
        self.vault
            .join(format!("{}-{}.md", self.prefix, month_name_of(date)))
    }

    /// A sample for `date` would be skipped when syncing on `today`.
    pub fn is_historical(&self, date: NaiveDate, today: NaiveDate) -> bool {
        !self.allow_historical && !same_month(date, today)
    }

    /// Decide what a sync of `sample` on `today` would do, without writing.
    pub fn plan(&self, sample: &MetricSample, today: NaiveDate) -> Result<Planned, VaultError> {
        let date = sample.date();
        if self.is_historical(date, today) {
            info!(%date, %today, "sample is outside the current month, skipping");
            return Ok(Planned::Historical { date });
        }

        if !self.vault.is_dir() {
            return Err(VaultError::NotFound {
                path: self.vault.clone(),
            });
        }

        let path = self.target_path(date);
        let (mut table, created) = self.load_or_create(&path, date)?;

        let table_err = |source| VaultError::Table {
            path: path.clone(),
            source,
        };
        if self.deduplication && self.layout.has_date(&table, date).map_err(table_err)? {
            info!(%date, path = %path.display(), "entry already exists, skipping");
            return Ok(Planned::Duplicate { date, path });
        }

        let divergence = self.layout.divergence(&table);
        if !divergence.is_empty() {
            warn!(path = %path.display(), %divergence, "table columns differ from configuration");
        }

        let row = self.layout.render_row(&table, sample).map_err(table_err)?;
        table.append(row.clone()).map_err(table_err)?;

        Ok(Planned::Append(SyncPlan {
            path,
            date,
            created,
            row,
            divergence,
            table,
        }))
    }

    /// Persist a plan with an atomic replace of the target file.
    pub fn commit(&self, plan: SyncPlan) -> Result<SyncOutcome, VaultError> {
        let rendered = plan.rendered();
        write_atomic(&plan.path, rendered.as_bytes()).map_err(|source| VaultError::Write {
            path: plan.path.clone(),
            source,
        })?;
        info!(
            date = %plan.date,
            path = %plan.path.display(),
            created = plan.created,
            "row appended"
        );
        Ok(SyncOutcome::Written {
            path: plan.path,
            row: plan.row,
            created: plan.created,
        })
    }

    /// Plan and commit in one step.
    pub fn sync(&self, sample: &MetricSample, today: NaiveDate) -> Result<SyncOutcome, VaultError> {
        match self.plan(sample, today)? {
            Planned::Append(plan) => self.commit(plan),
            Planned::Duplicate { date, path } => Ok(SyncOutcome::Duplicate { date, path }),
            Planned::Historical { date } => Ok(SyncOutcome::Historical { date }),
        }
    }

    fn load_or_create(&self, path: &Path, date: NaiveDate) -> Result<(Table, bool), VaultError> {
        match fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => {
                debug!(path = %path.display(), "target file is empty, writing a fresh table");
                Ok((self.layout.empty_table(date), false))
            }
            Ok(text) => {
                let table = Table::parse(&text).map_err(|source| VaultError::Table {
                    path: path.to_path_buf(),
                    source,
                })?;
                Ok((table, false))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "creating monthly file");
                Ok((self.layout.empty_table(date), true))
            }
            Err(source) => Err(VaultError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
