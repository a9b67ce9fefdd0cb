//! Self-managed runtime process control
//!
//! The controller drives the runtime's control executable through the
//! states `NotRunning -> Starting -> Running -> Stopping -> NotRunning`
//! (plus `Running -> Restarting -> Running`) by invoking `start`, `stop`,
//! `restart` and `status` sub-commands and parsing their textual output.
//! State is never cached: the external process is the source of truth, so
//! every query invokes the executable again.
//!
//! Platform differences (service registration on Windows, PID extraction
//! patterns) are isolated behind [`RuntimeController`] so the deployers
//! above remain platform-agnostic.

pub mod command;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DeployError, DeployResult};

pub use command::{mask_secrets, render_command, CommandOutput, CommandRunner, SystemRunner};

/// Snapshot of the runtime process, derived on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerState {
    pub running: bool,
    pub pid: Option<u32>,
}

/// Narrow interface over the runtime's control executable
pub trait RuntimeController {
    /// Start the runtime; non-zero exit is fatal and not retried here
    fn start(&self) -> DeployResult<()>;

    /// Stop the runtime, returning the exit code so callers decide tolerance
    fn stop(&self) -> DeployResult<i32>;

    /// Restart the runtime
    fn restart(&self) -> DeployResult<()>;

    /// Query the runtime state by invoking and parsing `status`
    fn status(&self) -> DeployResult<ControllerState>;

    fn is_running(&self) -> DeployResult<bool> {
        Ok(self.status()?.running)
    }

    /// Hand an application archive to the runtime
    fn deploy(&self, artifact: &Path) -> DeployResult<()>;

    /// Hand a domain archive to the runtime
    fn deploy_domain(&self, artifact: &Path) -> DeployResult<()>;

    /// Remove the named application from the runtime
    fn undeploy(&self, name: &str) -> DeployResult<()>;

    /// Remove the named domain from the runtime
    fn undeploy_domain(&self, name: &str) -> DeployResult<()>;

    /// Locate a deployed application archive by base name, if present
    fn deployed_application(&self, name: &str) -> DeployResult<Option<PathBuf>>;

    /// Locate a deployed domain archive by base name, if present
    fn deployed_domain(&self, name: &str) -> DeployResult<Option<PathBuf>>;

    /// Whether the named application has finished deploying
    fn is_deployed(&self, name: &str) -> DeployResult<bool>;

    /// Whether the named domain has finished deploying
    fn is_domain_deployed(&self, name: &str) -> DeployResult<bool>;
}

/// OS platform variant of the control executable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    /// Windows additionally registers the runtime as an OS service:
    /// install before start/restart, remove after stop.
    Windows,
}

impl Platform {
    /// Variant for the compilation host
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    fn executable(&self) -> &'static str {
        match self {
            Platform::Unix => "runtime",
            Platform::Windows => "runtime.bat",
        }
    }
}

/// Service wrapper exit code meaning the service is already registered
const SERVICE_ALREADY_INSTALLED: i32 = 5;
/// Service wrapper exit code meaning there is no service to remove
const SERVICE_NOT_INSTALLED: i32 = 4;

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// `RuntimeController` backed by the control script under `<home>/bin`
pub struct ScriptController<R: CommandRunner> {
    runtime_home: PathBuf,
    platform: Platform,
    runner: R,
    command_timeout: Duration,
}

impl ScriptController<SystemRunner> {
    pub fn new(runtime_home: impl Into<PathBuf>) -> Self {
        Self::with_runner(runtime_home, Platform::current(), SystemRunner)
    }
}

impl<R: CommandRunner> ScriptController<R> {
    pub fn with_runner(runtime_home: impl Into<PathBuf>, platform: Platform, runner: R) -> Self {
        Self {
            runtime_home: runtime_home.into(),
            platform,
            runner,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn runtime_home(&self) -> &Path {
        &self.runtime_home
    }

    /// Directory the runtime watches for application archives
    pub fn apps_dir(&self) -> PathBuf {
        self.runtime_home.join("apps")
    }

    /// Directory the runtime watches for domain archives
    pub fn domains_dir(&self) -> PathBuf {
        self.runtime_home.join("domains")
    }

    fn script(&self) -> PathBuf {
        self.runtime_home.join("bin").join(self.platform.executable())
    }

    fn run_script(&self, args: &[&str]) -> DeployResult<CommandOutput> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.runner.run(&self.script(), &args, self.command_timeout)
    }

    fn expect_success(&self, args: &[&str]) -> DeployResult<()> {
        let output = self.run_script(args)?;
        if output.success() {
            Ok(())
        } else {
            Err(DeployError::ControlFailed {
                command: args.join(" "),
                code: output.code,
            })
        }
    }

    /// Register the OS service, tolerating "already installed"
    fn install_service(&self) -> DeployResult<()> {
        let output = self.run_script(&["install"])?;
        match output.code {
            Some(0) | Some(SERVICE_ALREADY_INSTALLED) => Ok(()),
            code => Err(DeployError::ControlFailed {
                command: "install".to_string(),
                code,
            }),
        }
    }

    /// Deregister the OS service, tolerating "not installed"
    fn remove_service(&self) -> DeployResult<()> {
        let output = self.run_script(&["remove"])?;
        match output.code {
            Some(0) | Some(SERVICE_NOT_INSTALLED) => Ok(()),
            code => Err(DeployError::ControlFailed {
                command: "remove".to_string(),
                code,
            }),
        }
    }

    fn anchor_exists(&self, dir: &Path, name: &str) -> bool {
        // The runtime drops an anchor file once an artifact is fully deployed.
        dir.join(format!("{}-anchor.txt", name)).exists()
    }
}

impl<R: CommandRunner> RuntimeController for ScriptController<R> {
    fn start(&self) -> DeployResult<()> {
        if self.platform == Platform::Windows {
            self.install_service()?;
        }
        log::info!("Starting runtime at {}", self.runtime_home.display());
        self.expect_success(&["start"]).map_err(|e| {
            log::error!("Runtime at {} could not be started", self.runtime_home.display());
            e
        })
    }

    fn stop(&self) -> DeployResult<i32> {
        log::info!("Stopping runtime at {}", self.runtime_home.display());
        let output = self.run_script(&["stop"])?;
        if self.platform == Platform::Windows {
            self.remove_service()?;
        }
        Ok(output.code.unwrap_or(-1))
    }

    fn restart(&self) -> DeployResult<()> {
        if self.platform == Platform::Windows {
            self.install_service()?;
        }
        log::info!("Restarting runtime at {}", self.runtime_home.display());
        self.expect_success(&["restart"])
    }

    fn status(&self) -> DeployResult<ControllerState> {
        let output = match self.platform {
            Platform::Unix => self.run_script(&["status"])?,
            // The Windows wrapper defers to the service manager for status.
            Platform::Windows => {
                let args = vec!["queryex".to_string(), "runtime".to_string()];
                self.runner
                    .run(&PathBuf::from("sc"), &args, self.command_timeout)?
            }
        };
        parse_status(self.platform, &output.stdout)
    }

    fn deploy(&self, artifact: &Path) -> DeployResult<()> {
        log::info!("Deploying {} to the local runtime", artifact.display());
        self.expect_success(&["deploy", &artifact.display().to_string()])
    }

    fn deploy_domain(&self, artifact: &Path) -> DeployResult<()> {
        log::info!("Deploying domain {} to the local runtime", artifact.display());
        self.expect_success(&["deploy-domain", &artifact.display().to_string()])
    }

    fn undeploy(&self, name: &str) -> DeployResult<()> {
        log::info!("Undeploying {} from the local runtime", name);
        self.expect_success(&["undeploy", name])
    }

    fn undeploy_domain(&self, name: &str) -> DeployResult<()> {
        log::info!("Undeploying domain {} from the local runtime", name);
        self.expect_success(&["undeploy-domain", name])
    }

    fn deployed_application(&self, name: &str) -> DeployResult<Option<PathBuf>> {
        find_by_base_name(&self.apps_dir(), name)
    }

    fn deployed_domain(&self, name: &str) -> DeployResult<Option<PathBuf>> {
        find_by_base_name(&self.domains_dir(), name)
    }

    fn is_deployed(&self, name: &str) -> DeployResult<bool> {
        Ok(self.anchor_exists(&self.apps_dir(), name))
    }

    fn is_domain_deployed(&self, name: &str) -> DeployResult<bool> {
        Ok(self.anchor_exists(&self.domains_dir(), name))
    }
}

/// Locate an artifact in `dir` whose file stem matches `name`
fn find_by_base_name(dir: &Path, name: &str) -> DeployResult<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let stem = path.file_stem().and_then(|s| s.to_str());
        if stem == Some(name) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Interpret the status output of the control executable
///
/// Unix prints `runtime is running (PID:1234).` or `runtime is not running.`;
/// the Windows service manager prints a `STATE : 4 RUNNING` line and a
/// `PID : 1234` line. Anything else is unparsable.
fn parse_status(platform: Platform, output: &str) -> DeployResult<ControllerState> {
    match platform {
        Platform::Unix => {
            if output.contains("is not running") {
                return Ok(ControllerState {
                    running: false,
                    pid: None,
                });
            }
            if output.contains("is running") {
                let pid = output
                    .split("PID:")
                    .nth(1)
                    .and_then(|rest| {
                        let digits: String =
                            rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                        digits.parse().ok()
                    });
                return Ok(ControllerState { running: true, pid });
            }
        }
        Platform::Windows => {
            if output.contains("STOPPED") {
                return Ok(ControllerState {
                    running: false,
                    pid: None,
                });
            }
            if output.contains("RUNNING") {
                let pid = output.lines().find_map(|line| {
                    let line = line.trim();
                    line.strip_prefix("PID")
                        .and_then(|rest| rest.trim_start().strip_prefix(':'))
                        .and_then(|rest| rest.trim().parse().ok())
                });
                return Ok(ControllerState { running: true, pid });
            }
        }
    }
    Err(DeployError::UnparsableStatus {
        output: output.to_string(),
    })
}
