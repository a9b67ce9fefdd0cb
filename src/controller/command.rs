//! Control-executable invocation
//!
//! The runtime controller talks to the outside world through the
//! [`CommandRunner`] port so the orchestration above it is testable without
//! spawning real processes. The production [`SystemRunner`] spawns the
//! control executable and enforces a per-command watchdog timeout.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{DeployError, DeployResult};

/// Structured result of one control-command invocation
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Port for invoking the runtime's control executable
pub trait CommandRunner {
    /// Run `program` with `args`, waiting at most `timeout` for it to exit
    fn run(&self, program: &Path, args: &[String], timeout: Duration)
        -> DeployResult<CommandOutput>;
}

/// `CommandRunner` backed by real OS processes
///
/// Spawn-and-wait with a polling watchdog: the child is killed once the
/// timeout elapses. Control scripts emit at most a few lines, so piped
/// output never fills the pipe buffer before exit.
pub struct SystemRunner;

const WATCHDOG_POLL: Duration = Duration::from_millis(100);

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        program: &Path,
        args: &[String],
        timeout: Duration,
    ) -> DeployResult<CommandOutput> {
        log::debug!("executing: {}", render_command(program, args));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let started = Instant::now();
        loop {
            if child.try_wait()?.is_some() {
                break;
            }
            if started.elapsed() > timeout {
                child.kill().ok();
                child.wait().ok();
                return Err(DeployError::CommandTimeout {
                    command: render_command(program, args),
                    timeout,
                });
            }
            std::thread::sleep(WATCHDOG_POLL);
        }

        let output = child.wait_with_output()?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Render a command line for logging, masking any `...password=` values
pub fn render_command(program: &Path, args: &[String]) -> String {
    let mut parts = vec![program.display().to_string()];
    parts.extend(mask_secrets(args));
    parts.join(" ")
}

/// Replace the value of any argument matching a `...password=` pattern
pub fn mask_secrets(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|arg| match arg.to_ascii_lowercase().find("password=") {
            Some(idx) => {
                let prefix = &arg[..idx + "password=".len()];
                format!("{}****", prefix)
            }
            None => arg.clone(),
        })
        .collect()
}
