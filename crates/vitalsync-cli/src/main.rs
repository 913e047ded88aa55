use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use vitalsync_core::config::{resolve_config_path, API_TOKEN_ENV};
use vitalsync_core::error::exit_code;
use vitalsync_core::AppConfig;

mod cli;
mod logging;
mod schedule_cmd;
mod sync;

use cli::{Cli, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // config: --config > VITALSYNC_CONFIG > ~/.vitalsync/config.toml
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = match AppConfig::load(Some(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("vitalsync: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let _log_guard = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("vitalsync: failed to initialise logging: {e}");
            return ExitCode::from(exit_code::CONFIG);
        }
    };

    if let Some(Command::SetupSchedule { action }) = &cli.command {
        return match schedule_cmd::run(*action, &config, &config_path) {
            Ok(()) => ExitCode::from(exit_code::OK),
            Err(e) => {
                error!("setup-schedule failed: {e:#}");
                ExitCode::from(exit_code::CONFIG)
            }
        };
    }

    let args = cli.run_args().unwrap_or_default();
    let today = chrono::Local::now().date_naive();
    let token = std::env::var(API_TOKEN_ENV).ok();

    let result = match sync::Orchestrator::new(&config) {
        Ok(orchestrator) => {
            orchestrator
                .run(&args, today, token, sync::http_source)
                .await
        }
        Err(e) => Err(e),
    };
    ExitCode::from(sync::report(&result))
}
