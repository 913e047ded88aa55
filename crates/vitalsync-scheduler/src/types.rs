use std::fmt;
use std::path::PathBuf;

use vitalsync_core::ScheduleSpec;

/// Which host scheduler an entry is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Launchd,
    Cron,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendKind::Launchd => "launchd",
            BackendKind::Cron => "cron",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "launchd" => Ok(BackendKind::Launchd),
            "cron" => Ok(BackendKind::Cron),
            other => Err(format!("unknown scheduler backend: {other}")),
        }
    }
}

/// What the host scheduler currently knows about the sync job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStatus {
    NotRegistered,
    /// `detail` is the backend's own description (crontab line, plist path).
    Registered { detail: String, loaded: bool },
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationStatus::NotRegistered => write!(f, "not registered"),
            RegistrationStatus::Registered { detail, loaded: true } => {
                write!(f, "registered ({detail})")
            }
            RegistrationStatus::Registered {
                detail,
                loaded: false,
            } => write!(f, "registered but not loaded ({detail})"),
        }
    }
}

/// "Run `program args…` every day at `run_time`."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub run_time: ScheduleSpec,
    /// Environment the scheduled process needs (e.g. the API token).
    pub env: Vec<(String, String)>,
    /// Directory for the scheduler's own stdout/stderr capture.
    pub log_dir: Option<PathBuf>,
}

impl ScheduleEntry {
    /// The daily `run --config <path>` invocation of `program`.
    pub fn sync(program: PathBuf, config_path: PathBuf, run_time: ScheduleSpec) -> Self {
        Self {
            program,
            args: vec![
                "run".to_string(),
                "--config".to_string(),
                config_path.display().to_string(),
            ],
            run_time,
            env: Vec::new(),
            log_dir: None,
        }
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_log_dir(mut self, dir: PathBuf) -> Self {
        self.log_dir = Some(dir);
        self
    }

    /// Program and arguments as one POSIX shell command line.
    pub fn command_line(&self) -> String {
        let mut parts = vec![shell_quote(&self.program.display().to_string())];
        parts.extend(self.args.iter().map(|a| shell_quote(a)));
        parts.join(" ")
    }
}

/// Quote `s` for `/bin/sh` when it contains anything beyond a safe charset.
pub fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
