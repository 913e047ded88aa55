use tracing::info;

use crate::error::{Result, SchedulerError};
use crate::registrar::ScheduleBackend;
use crate::runner::CommandRunner;
use crate::types::{shell_quote, BackendKind, RegistrationStatus, ScheduleEntry};

/// Trailing comment identifying the line this tool owns.
pub const MARKER: &str = "# vitalsync daily sync";

/// The crontab line for `entry`. `%` is escaped since cron treats it as a
/// newline.
pub fn render_line(entry: &ScheduleEntry) -> String {
    let env: String = entry
        .env
        .iter()
        .map(|(k, v)| format!("{k}={} ", shell_quote(v)))
        .collect();
    let redirect = entry
        .log_dir
        .as_ref()
        .map(|dir| {
            format!(
                " >> {} 2>&1",
                shell_quote(&dir.join("cron.log").display().to_string())
            )
        })
        .unwrap_or_default();
    let command = format!("{env}{}{redirect}", entry.command_line()).replace('%', "\\%");
    format!(
        "{} {} * * * {command} {MARKER}",
        entry.run_time.minute, entry.run_time.hour
    )
}

/// Remove every line carrying [`MARKER`]. Returns the new table and how many
/// lines were dropped.
pub fn strip(crontab: &str) -> (String, usize) {
    let mut removed = 0;
    let mut out = String::with_capacity(crontab.len());
    for line in crontab.lines() {
        if line.contains(MARKER) {
            removed += 1;
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    (out, removed)
}

/// Replace any existing owned line with `line`, keeping everything else.
pub fn merge(crontab: &str, line: &str) -> String {
    let (mut out, _) = strip(crontab);
    out.push_str(line);
    out.push('\n');
    out
}

pub struct CronBackend<R> {
    runner: R,
}

impl<R: CommandRunner> CronBackend<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn read(&self) -> Result<String> {
        let out = self.runner.run("crontab", &["-l"], None)?;
        if out.success {
            return Ok(out.stdout);
        }
        // `crontab -l` fails when the user has no crontab yet.
        if out.stderr.to_lowercase().contains("no crontab") {
            return Ok(String::new());
        }
        Err(SchedulerError::Command {
            program: "crontab".to_string(),
            args: "-l".to_string(),
            message: out.stderr.trim().to_string(),
        })
    }

    fn write(&self, crontab: &str) -> Result<()> {
        self.runner.run_checked("crontab", &["-"], Some(crontab))?;
        Ok(())
    }
}

impl<R: CommandRunner> ScheduleBackend for CronBackend<R> {
    fn kind(&self) -> BackendKind {
        BackendKind::Cron
    }

    fn install(&self, entry: &ScheduleEntry) -> Result<()> {
        let line = render_line(entry);
        let current = self.read()?;
        self.write(&merge(&current, &line))?;
        info!(run_time = %entry.run_time, "crontab entry installed");
        Ok(())
    }

    fn uninstall(&self) -> Result<bool> {
        let current = self.read()?;
        let (stripped, removed) = strip(&current);
        if removed == 0 {
            return Ok(false);
        }
        self.write(&stripped)?;
        info!(removed, "crontab entry removed");
        Ok(true)
    }

    fn status(&self) -> Result<RegistrationStatus> {
        let current = self.read()?;
        Ok(match current.lines().find(|l| l.contains(MARKER)) {
            Some(line) => RegistrationStatus::Registered {
                detail: line.to_string(),
                loaded: true,
            },
            None => RegistrationStatus::NotRegistered,
        })
    }
}
