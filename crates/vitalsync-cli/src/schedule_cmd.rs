use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::warn;
use vitalsync_core::config::API_TOKEN_ENV;
use vitalsync_core::AppConfig;
use vitalsync_scheduler::{compute_next_run, platform_backend, ScheduleBackend, ScheduleEntry};

use crate::cli::ScheduleAction;

/// Apply `action` with the platform's native scheduler and print the result.
pub fn run(action: ScheduleAction, config: &AppConfig, config_path: &Path) -> Result<()> {
    let backend = platform_backend()?;
    let entry = match action {
        ScheduleAction::Install => Some(sync_entry(config, config_path)?),
        ScheduleAction::Uninstall | ScheduleAction::Status => None,
    };
    let report = apply(backend.as_ref(), action, config, entry.as_ref(), Local::now())?;
    println!("{report}");
    Ok(())
}

/// The entry that runs `<this exe> run --config <abs config path>`.
fn sync_entry(config: &AppConfig, config_path: &Path) -> Result<ScheduleEntry> {
    let exe = std::env::current_exe().context("cannot determine current executable path")?;
    let config_path = std::fs::canonicalize(config_path)
        .with_context(|| format!("cannot resolve config path {}", config_path.display()))?;

    let mut entry = ScheduleEntry::sync(exe, config_path, config.schedule.run_time)
        .with_log_dir(config.logging.dir.clone());
    match std::env::var(API_TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => {
            warn!("{API_TOKEN_ENV} will be stored in the scheduler entry");
            entry = entry.with_env(API_TOKEN_ENV, &token);
        }
        _ => warn!(
            "{API_TOKEN_ENV} is not set; scheduled runs will fail unless the scheduler provides it"
        ),
    }
    Ok(entry)
}

pub fn apply(
    backend: &dyn ScheduleBackend,
    action: ScheduleAction,
    config: &AppConfig,
    entry: Option<&ScheduleEntry>,
    now: DateTime<Local>,
) -> Result<String> {
    let run_time = config.schedule.run_time;
    let next_run = compute_next_run(&run_time, &now)
        .map(|t| t.format("%Y-%m-%d %H:%M %Z").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let report = match action {
        ScheduleAction::Install => {
            let entry = entry.context("no schedule entry to install")?;
            backend
                .install(entry)
                .with_context(|| format!("failed to install {} schedule", backend.kind()))?;
            format!(
                "Installed {} schedule: daily at {run_time}\nNext run: {next_run}",
                backend.kind()
            )
        }
        ScheduleAction::Uninstall => {
            if backend
                .uninstall()
                .with_context(|| format!("failed to remove {} schedule", backend.kind()))?
            {
                format!("Removed {} schedule", backend.kind())
            } else {
                format!("No {} schedule was registered", backend.kind())
            }
        }
        ScheduleAction::Status => {
            let status = backend.status()?;
            format!(
                "Scheduler: {}\nStatus: {status}\nConfigured time: {run_time}\nNext run: {next_run}",
                backend.kind()
            )
        }
    };
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::TimeZone;
    use vitalsync_scheduler::{BackendKind, RegistrationStatus};

    use super::*;

    #[derive(Default)]
    struct FakeBackend {
        installed: RefCell<Option<ScheduleEntry>>,
    }

    impl ScheduleBackend for FakeBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Cron
        }

        fn install(&self, entry: &ScheduleEntry) -> vitalsync_scheduler::Result<()> {
            *self.installed.borrow_mut() = Some(entry.clone());
            Ok(())
        }

        fn uninstall(&self) -> vitalsync_scheduler::Result<bool> {
            Ok(self.installed.borrow_mut().take().is_some())
        }

        fn status(&self) -> vitalsync_scheduler::Result<RegistrationStatus> {
            Ok(match &*self.installed.borrow() {
                Some(e) => RegistrationStatus::Registered {
                    detail: e.command_line(),
                    loaded: true,
                },
                None => RegistrationStatus::NotRegistered,
            })
        }
    }

    fn config() -> AppConfig {
        AppConfig::from_toml_str(
            r#"
            [api]
            base_url = "https://api.example.com/v1/daily"
            [vault]
            path = "/tmp/vault"
            file_prefix = "Health"
            [table]
            [[table.columns]]
            name = "Date"
            type = "date"
            [schedule]
            run_time = "07:30"
            "#,
        )
        .unwrap()
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap()
    }

    #[test]
    fn install_status_uninstall_cycle() {
        let cfg = config();
        let backend = FakeBackend::default();
        let entry = ScheduleEntry::sync(
            "/usr/bin/vitalsync".into(),
            "/etc/vitalsync.toml".into(),
            cfg.schedule.run_time,
        );

        let out = apply(&backend, ScheduleAction::Install, &cfg, Some(&entry), now()).unwrap();
        assert!(out.starts_with("Installed cron schedule: daily at 07:30\nNext run: 2026-10-18 07:30"));

        let out = apply(&backend, ScheduleAction::Status, &cfg, None, now()).unwrap();
        assert!(out.contains(
            "Status: registered (/usr/bin/vitalsync run --config /etc/vitalsync.toml)"
        ));
        assert!(out.contains("Configured time: 07:30"));

        let out = apply(&backend, ScheduleAction::Uninstall, &cfg, None, now()).unwrap();
        assert_eq!(out, "Removed cron schedule");
        let out = apply(&backend, ScheduleAction::Uninstall, &cfg, None, now()).unwrap();
        assert_eq!(out, "No cron schedule was registered");
    }

    #[test]
    fn install_requires_entry() {
        let backend = FakeBackend::default();
        assert!(apply(&backend, ScheduleAction::Install, &config(), None, now()).is_err());
    }
}
