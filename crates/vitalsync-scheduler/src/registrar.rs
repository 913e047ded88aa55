use crate::cron::CronBackend;
use crate::error::{Result, SchedulerError};
use crate::launchd::LaunchdBackend;
use crate::runner::SystemRunner;
use crate::types::{BackendKind, RegistrationStatus, ScheduleEntry};

/// A host scheduler that can hold one daily entry for this tool.
pub trait ScheduleBackend {
    fn kind(&self) -> BackendKind;

    /// Register `entry`, replacing any previous registration.
    fn install(&self, entry: &ScheduleEntry) -> Result<()>;

    /// Remove the registration. Returns `false` when there was none.
    fn uninstall(&self) -> Result<bool>;

    fn status(&self) -> Result<RegistrationStatus>;
}

/// The backend native to this platform, running real commands.
pub fn platform_backend() -> Result<Box<dyn ScheduleBackend>> {
    if cfg!(target_os = "macos") {
        Ok(Box::new(LaunchdBackend::new(
            SystemRunner,
            LaunchdBackend::<SystemRunner>::default_agents_dir(),
        )))
    } else if cfg!(unix) {
        Ok(Box::new(CronBackend::new(SystemRunner)))
    } else {
        Err(SchedulerError::Unsupported(std::env::consts::OS.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "macos")]
    #[test]
    fn macos_uses_launchd() {
        assert_eq!(platform_backend().unwrap().kind(), BackendKind::Launchd);
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn other_unix_uses_cron() {
        assert_eq!(platform_backend().unwrap().kind(), BackendKind::Cron);
    }
}
