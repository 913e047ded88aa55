use std::io::{self, Write};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{Result, SchedulerError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs host scheduler tools (`launchctl`, `crontab`).
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> io::Result<CommandOutput>;

    /// Like [`CommandRunner::run`], failing on a non-zero exit.
    fn run_checked(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput> {
        let output = self.run(program, args, stdin)?;
        if !output.success {
            return Err(SchedulerError::Command {
                program: program.to_string(),
                args: args.join(" "),
                message: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

/// Spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> io::Result<CommandOutput> {
        debug!(program, ?args, "running scheduler command");
        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes())?;
            }
        }

        let output = child.wait_with_output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
