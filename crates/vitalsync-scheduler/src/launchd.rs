use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;
use crate::registrar::ScheduleBackend;
use crate::runner::CommandRunner;
use crate::types::{BackendKind, RegistrationStatus, ScheduleEntry};

pub const LABEL: &str = "dev.vitalsync.daily-sync";

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Launch agent definition firing once a day at the entry's local time.
pub fn render_plist(entry: &ScheduleEntry) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \
         \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
         <plist version=\"1.0\">\n<dict>\n",
    );
    out.push_str(&format!("    <key>Label</key>\n    <string>{LABEL}</string>\n"));

    out.push_str("    <key>ProgramArguments</key>\n    <array>\n");
    let program = entry.program.display().to_string();
    for arg in std::iter::once(&program).chain(entry.args.iter()) {
        out.push_str(&format!("        <string>{}</string>\n", xml_escape(arg)));
    }
    out.push_str("    </array>\n");

    if !entry.env.is_empty() {
        out.push_str("    <key>EnvironmentVariables</key>\n    <dict>\n");
        for (k, v) in &entry.env {
            out.push_str(&format!(
                "        <key>{}</key>\n        <string>{}</string>\n",
                xml_escape(k),
                xml_escape(v)
            ));
        }
        out.push_str("    </dict>\n");
    }

    out.push_str(&format!(
        "    <key>StartCalendarInterval</key>\n    <dict>\n        \
         <key>Hour</key>\n        <integer>{}</integer>\n        \
         <key>Minute</key>\n        <integer>{}</integer>\n    </dict>\n",
        entry.run_time.hour, entry.run_time.minute
    ));

    if let Some(dir) = &entry.log_dir {
        for (key, file) in [
            ("StandardOutPath", "launchd.out.log"),
            ("StandardErrorPath", "launchd.err.log"),
        ] {
            out.push_str(&format!(
                "    <key>{key}</key>\n    <string>{}</string>\n",
                xml_escape(&dir.join(file).display().to_string())
            ));
        }
    }

    out.push_str("    <key>RunAtLoad</key>\n    <false/>\n</dict>\n</plist>\n");
    out
}

pub struct LaunchdBackend<R> {
    runner: R,
    agents_dir: PathBuf,
}

impl<R: CommandRunner> LaunchdBackend<R> {
    pub fn new(runner: R, agents_dir: PathBuf) -> Self {
        Self { runner, agents_dir }
    }

    /// `~/Library/LaunchAgents`.
    pub fn default_agents_dir() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join("Library").join("LaunchAgents")
    }

    pub fn plist_path(&self) -> PathBuf {
        self.agents_dir.join(format!("{LABEL}.plist"))
    }

    fn launchctl(&self, args: &[&str]) -> Result<()> {
        self.runner.run_checked("launchctl", args, None)?;
        Ok(())
    }
}

fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        // may hold the API token
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // `mode` only applies on creation
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents.as_bytes())
}

impl<R: CommandRunner> ScheduleBackend for LaunchdBackend<R> {
    fn kind(&self) -> BackendKind {
        BackendKind::Launchd
    }

    fn install(&self, entry: &ScheduleEntry) -> Result<()> {
        fs::create_dir_all(&self.agents_dir)?;
        if let Some(dir) = &entry.log_dir {
            fs::create_dir_all(dir)?;
        }
        let path = self.plist_path();
        let path_str = path.display().to_string();

        if path.exists() {
            // Reloading picks up a changed run time; a stale agent may not be loaded.
            if let Err(e) = self.launchctl(&["unload", &path_str]) {
                warn!(err = %e, "launchctl unload of previous agent failed");
            }
        }
        write_private(&path, &render_plist(entry))?;
        self.launchctl(&["load", "-w", &path_str])?;
        info!(path = %path.display(), run_time = %entry.run_time, "launch agent installed");
        Ok(())
    }

    fn uninstall(&self) -> Result<bool> {
        let path = self.plist_path();
        if !path.exists() {
            return Ok(false);
        }
        if let Err(e) = self.launchctl(&["unload", &path.display().to_string()]) {
            warn!(err = %e, "launchctl unload failed, removing plist anyway");
        }
        fs::remove_file(&path)?;
        info!(path = %path.display(), "launch agent removed");
        Ok(true)
    }

    fn status(&self) -> Result<RegistrationStatus> {
        let path = self.plist_path();
        if !path.exists() {
            return Ok(RegistrationStatus::NotRegistered);
        }
        let loaded = self.runner.run("launchctl", &["list", LABEL], None)?.success;
        Ok(RegistrationStatus::Registered {
            detail: path.display().to_string(),
            loaded,
        })
    }
}
