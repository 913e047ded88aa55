//! One sync run: lock, fetch, write, report.

use std::time::Duration;

use chrono::NaiveDate;
use tracing::{error, info, warn};
use vitalsync_core::config::API_TOKEN_ENV;
use vitalsync_core::error::exit_code;
use vitalsync_core::{AppConfig, SyncError};
use vitalsync_fetch::{FetchError, MetricSource, MetricsClient};
use vitalsync_vault::{LockAttempt, MonthlyFileManager, Planned, RunLock, SyncOutcome, SyncPlan};

use crate::cli::RunArgs;

/// How a run ended without failing.
#[derive(Debug)]
pub enum RunOutcome {
    Synced(SyncOutcome),
    /// `--dry-run`: the plan that would have been committed.
    DryRun(SyncPlan),
    LockHeld { pid: Option<u32> },
}

/// Build the HTTP source for a run.
pub fn http_source(cfg: &AppConfig, token: String) -> Result<Box<dyn MetricSource>, FetchError> {
    Ok(Box::new(MetricsClient::new(&cfg.api, token)?))
}

pub struct Orchestrator<'a> {
    config: &'a AppConfig,
    manager: MonthlyFileManager,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a AppConfig) -> Result<Self, SyncError> {
        Ok(Self {
            config,
            manager: MonthlyFileManager::new(config)?,
        })
    }

    /// Execute one run. `connect` is only called once the lock is held and a
    /// token is present.
    pub async fn run<F>(
        &self,
        args: &RunArgs,
        today: NaiveDate,
        token: Option<String>,
        connect: F,
    ) -> Result<RunOutcome, SyncError>
    where
        F: FnOnce(&AppConfig, String) -> Result<Box<dyn MetricSource>, FetchError>,
    {
        let exec = &self.config.execution;
        let _lock = match RunLock::acquire(&exec.lock_path, Duration::from_secs(exec.lock_stale_secs))? {
            LockAttempt::Acquired(lock) => lock,
            LockAttempt::Held { pid } => {
                warn!(pid = ?pid, lock = %exec.lock_path.display(), "another sync is running, exiting");
                return Ok(RunOutcome::LockHeld { pid });
            }
        };

        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SyncError::Auth(format!("{API_TOKEN_ENV} is not set")))?;

        let date = args.date.unwrap_or(today);
        if self.manager.is_historical(date, today) {
            info!(%date, "date is outside the current month and allow_historical is off, skipping");
            return Ok(RunOutcome::Synced(SyncOutcome::Historical { date }));
        }

        let source = connect(self.config, token)?;
        info!(source = source.name(), %date, "fetching metrics");
        let sample = source.fetch(date).await?;

        let outcome = match self.manager.plan(&sample, today)? {
            Planned::Append(plan) if args.dry_run => RunOutcome::DryRun(plan),
            Planned::Append(plan) => RunOutcome::Synced(self.manager.commit(plan)?),
            Planned::Duplicate { date, path } => {
                RunOutcome::Synced(SyncOutcome::Duplicate { date, path })
            }
            Planned::Historical { date } => RunOutcome::Synced(SyncOutcome::Historical { date }),
        };
        Ok(outcome)
    }
}

/// Log the result of a run and pick the process exit code.
pub fn report(result: &Result<RunOutcome, SyncError>) -> u8 {
    match result {
        Ok(RunOutcome::Synced(SyncOutcome::Written { path, row, created })) => {
            info!(path = %path.display(), created, "synced: {row}");
            exit_code::OK
        }
        Ok(RunOutcome::Synced(SyncOutcome::Duplicate { date, path })) => {
            info!(%date, path = %path.display(), "entry for this date already exists, nothing to do");
            exit_code::OK
        }
        Ok(RunOutcome::Synced(SyncOutcome::Historical { date })) => {
            info!(%date, "historical date skipped");
            exit_code::OK
        }
        Ok(RunOutcome::DryRun(plan)) => {
            println!("{}", dry_run_report(plan));
            exit_code::OK
        }
        Ok(RunOutcome::LockHeld { .. }) => exit_code::OK,
        Err(e) => {
            error!(code = e.code(), "{e}");
            e.exit_code()
        }
    }
}

/// Human-readable summary of what a dry run would write.
pub fn dry_run_report(plan: &SyncPlan) -> String {
    let mut lines = vec![
        "Dry run: nothing was written.".to_string(),
        format!(
            "  file: {}{}",
            plan.path.display(),
            if plan.created { " (would be created)" } else { "" }
        ),
        format!("  row:  {}", plan.row),
    ];
    if !plan.divergence.is_empty() {
        lines.push(format!("  note: {}", plan.divergence));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use vitalsync_core::{MetricKey, MetricSample};

    use super::*;

    struct FakeSource {
        calls: Arc<AtomicUsize>,
        result: fn(NaiveDate) -> Result<MetricSample, FetchError>,
    }

    #[async_trait]
    impl MetricSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn fetch(&self, date: NaiveDate) -> Result<MetricSample, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)(date)
        }
    }

    fn without_hrv(date: NaiveDate) -> Result<MetricSample, FetchError> {
        Ok(MetricSample::new(date)
            .with_value(MetricKey::SleepScore, 82.0)
            .unwrap()
            .with_value(MetricKey::SleepDuration, 7.26)
            .unwrap()
            .with_value(MetricKey::RecoveryScore, 71.0)
            .unwrap()
            .with_value(MetricKey::StrainScore, 10.04)
            .unwrap())
    }

    fn rejected(_: NaiveDate) -> Result<MetricSample, FetchError> {
        Err(FetchError::Auth {
            status: 401,
            message: "expired".into(),
        })
    }

    fn unavailable(_: NaiveDate) -> Result<MetricSample, FetchError> {
        Err(FetchError::RetriesExhausted {
            attempts: 4,
            last_error: "HTTP 500".into(),
        })
    }

    struct Fixture {
        dir: tempfile::TempDir,
        config: AppConfig,
        calls: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let vault = dir.path().join("vault");
            fs::create_dir(&vault).unwrap();
            let config = AppConfig::from_toml_str(&format!(
                r#"
                [api]
                base_url = "http://127.0.0.1:9/daily"

                [vault]
                path = "{vault}"
                file_prefix = "Health"

                [table]
                [[table.columns]]
                name = "Date"
                type = "date"
                [[table.columns]]
                name = "Sleep"
                type = "metric"
                metric_key = "sleep_score"
                [[table.columns]]
                name = "Duration"
                type = "metric"
                metric_key = "sleep_duration"
                [[table.columns]]
                name = "Recovery"
                type = "metric"
                metric_key = "recovery_score"
                [[table.columns]]
                name = "Strain"
                type = "metric"
                metric_key = "strain_score"
                [[table.columns]]
                name = "HRV"
                type = "metric"
                metric_key = "hrv"
                [[table.columns]]
                name = "Notes"
                type = "custom"

                [schedule]
                run_time = "07:30"

                [execution]
                lock_path = "{lock}"
                "#,
                vault = vault.display(),
                lock = dir.path().join("run.lock").display(),
            ))
            .unwrap();
            Self {
                dir,
                config,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn source(
            &self,
            result: fn(NaiveDate) -> Result<MetricSample, FetchError>,
        ) -> impl FnOnce(&AppConfig, String) -> Result<Box<dyn MetricSource>, FetchError> {
            let calls = self.calls.clone();
            move |_, _| Ok(Box::new(FakeSource { calls, result }) as Box<dyn MetricSource>)
        }

        async fn run(
            &self,
            args: RunArgs,
            token: Option<&str>,
            result: fn(NaiveDate) -> Result<MetricSample, FetchError>,
        ) -> Result<RunOutcome, SyncError> {
            Orchestrator::new(&self.config)
                .unwrap()
                .run(&args, today(), token.map(str::to_string), self.source(result))
                .await
        }

        fn month_file(&self) -> std::path::PathBuf {
            self.dir.path().join("vault").join("Health-October.md")
        }

        fn lock_path(&self) -> &Path {
            &self.config.execution.lock_path
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[tokio::test]
    async fn first_run_creates_month_file() {
        let fx = Fixture::new();
        let result = fx.run(RunArgs::default(), Some("tok"), without_hrv).await;

        assert_eq!(report(&result), 0);
        let text = fs::read_to_string(fx.month_file()).unwrap();
        assert!(text.starts_with("# Health Metrics - October 2026\n\n| Date | Sleep |"));
        assert!(text.ends_with("| 10/17 | 82 | 7.3 | 71 | 10.0 |  |  |\n"));
        assert!(!fx.lock_path().exists());
    }

    #[tokio::test]
    async fn second_run_same_day_is_a_benign_duplicate() {
        let fx = Fixture::new();
        fx.run(RunArgs::default(), Some("tok"), without_hrv).await.unwrap();
        let before = fs::read(fx.month_file()).unwrap();

        let result = fx.run(RunArgs::default(), Some("tok"), without_hrv).await;
        assert!(matches!(
            result,
            Ok(RunOutcome::Synced(SyncOutcome::Duplicate { .. }))
        ));
        assert_eq!(report(&result), 0);
        assert_eq!(fs::read(fx.month_file()).unwrap(), before);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_fetch() {
        let fx = Fixture::new();
        for token in [None, Some("  ")] {
            let result = fx.run(RunArgs::default(), token, without_hrv).await;
            assert!(matches!(result, Err(SyncError::Auth(_))));
            assert_eq!(report(&result), 2);
        }
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
        assert!(!fx.lock_path().exists());
    }

    #[tokio::test]
    async fn rejected_credentials_exit_two() {
        let fx = Fixture::new();
        let result = fx.run(RunArgs::default(), Some("tok"), rejected).await;
        assert_eq!(report(&result), 2);
        assert!(!fx.month_file().exists());
    }

    #[tokio::test]
    async fn exhausted_retries_exit_three_and_release_lock() {
        let fx = Fixture::new();
        let result = fx.run(RunArgs::default(), Some("tok"), unavailable).await;
        assert_eq!(report(&result), 3);
        assert!(!fx.lock_path().exists());
        assert!(!fx.month_file().exists());
    }

    #[tokio::test]
    async fn held_lock_skips_run() {
        let fx = Fixture::new();
        let _other = RunLock::acquire(fx.lock_path(), Duration::from_secs(3600)).unwrap();

        let result = fx.run(RunArgs::default(), Some("tok"), without_hrv).await;
        assert!(matches!(result, Ok(RunOutcome::LockHeld { .. })));
        assert_eq!(report(&result), 0);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let fx = Fixture::new();
        let args = RunArgs {
            dry_run: true,
            date: None,
        };
        let result = fx.run(args, Some("tok"), without_hrv).await;

        let Ok(RunOutcome::DryRun(plan)) = &result else {
            panic!("expected a dry run, got {result:?}");
        };
        let text = dry_run_report(plan);
        assert!(text.contains("Health-October.md (would be created)"));
        assert!(text.contains("| 10/17 | 82 |"));
        assert_eq!(report(&result), 0);
        assert!(!fx.month_file().exists());
    }

    #[tokio::test]
    async fn explicit_date_in_current_month() {
        let fx = Fixture::new();
        let args = RunArgs {
            dry_run: false,
            date: NaiveDate::from_ymd_opt(2026, 10, 3),
        };
        fx.run(args, Some("tok"), without_hrv).await.unwrap();
        let text = fs::read_to_string(fx.month_file()).unwrap();
        assert!(text.contains("| 10/03 |"));
    }

    #[tokio::test]
    async fn historical_date_skips_without_fetching() {
        let fx = Fixture::new();
        let args = RunArgs {
            dry_run: false,
            date: NaiveDate::from_ymd_opt(2026, 9, 30),
        };
        let result = fx.run(args, Some("tok"), without_hrv).await;
        assert!(matches!(
            result,
            Ok(RunOutcome::Synced(SyncOutcome::Historical { .. }))
        ));
        assert_eq!(report(&result), 0);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_vault_exits_one() {
        let fx = Fixture::new();
        fs::remove_dir(fx.dir.path().join("vault")).unwrap();
        let result = fx.run(RunArgs::default(), Some("tok"), without_hrv).await;
        assert!(matches!(result, Err(SyncError::VaultNotFound { .. })));
        assert_eq!(report(&result), 1);
    }

    #[tokio::test]
    async fn corrupt_month_file_exits_four() {
        let fx = Fixture::new();
        fs::write(fx.month_file(), "no table in here\n").unwrap();
        let result = fx.run(RunArgs::default(), Some("tok"), without_hrv).await;
        assert_eq!(report(&result), 4);
        assert_eq!(fs::read_to_string(fx.month_file()).unwrap(), "no table in here\n");
    }
}
