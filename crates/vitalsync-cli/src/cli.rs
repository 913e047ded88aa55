use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Append today's health metrics to a monthly markdown table.
#[derive(Parser, Debug)]
#[command(name = "vitalsync", version)]
pub struct Cli {
    /// Configuration file (overrides VITALSYNC_CONFIG and ~/.vitalsync/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Options for the default `run` when no subcommand is given
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch metrics and append them to this month's file (default)
    Run(RunArgs),

    /// Register, remove or inspect the daily scheduled run
    SetupSchedule {
        #[arg(value_enum, default_value_t = ScheduleAction::Install)]
        action: ScheduleAction,
    },
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Fetch and build the row but do not write the file
    #[arg(long)]
    pub dry_run: bool,

    /// Day to sync instead of today
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleAction {
    Install,
    Uninstall,
    Status,
}

impl Cli {
    /// Run options, whether given to `run` or at the top level.
    pub fn run_args(&self) -> Option<RunArgs> {
        match &self.command {
            Some(Command::Run(args)) => Some(args.clone()),
            Some(Command::SetupSchedule { .. }) => None,
            None => Some(self.run.clone()),
        }
    }
}
