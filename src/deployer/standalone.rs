//! Standalone target deployer
//!
//! Deploys into a single self-managed runtime process on this machine. No
//! network is involved: the artifact is handed to the runtime's control
//! executable and the deployer polls the controller until the runtime
//! confirms the artifact, or the deployment timeout elapses.
//!
//! The runtime identifies deployments by file name, so the artifact is
//! renamed on disk to match the configured application name before it is
//! handed over. That rename is a documented side effect on the
//! caller-supplied file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{ArtifactKind, DeploymentConfig, DeploymentTarget};
use crate::controller::{RuntimeController, ScriptController, SystemRunner};
use crate::error::{DeployError, DeployResult};
use crate::probe::PollingProber;
use crate::verification::deployment_probe;

use super::{ArtifactDeployer, DEFAULT_POLLING_DELAY};

/// Deployer for a single local runtime process
pub struct StandaloneDeployer<C: RuntimeController> {
    controller: C,
    runtime_home: PathBuf,
    artifact: PathBuf,
    application_name: String,
    domain: Option<PathBuf>,
    timeout: Duration,
    polling_delay: Duration,
    skip_verification: bool,
}

impl StandaloneDeployer<ScriptController<SystemRunner>> {
    pub fn from_config(config: &DeploymentConfig) -> DeployResult<Self> {
        let home = config.runtime_home.clone().ok_or(DeployError::MissingField {
            field: "runtime-home",
            target: DeploymentTarget::Standalone,
        })?;
        Ok(Self::new(ScriptController::new(&home), home, config))
    }
}

impl<C: RuntimeController> StandaloneDeployer<C> {
    pub fn new(controller: C, runtime_home: PathBuf, config: &DeploymentConfig) -> Self {
        Self {
            controller,
            runtime_home,
            artifact: config.artifact.clone(),
            application_name: config.application_name.clone(),
            domain: config.domain.clone(),
            timeout: config.deployment_timeout,
            polling_delay: DEFAULT_POLLING_DELAY,
            skip_verification: config.skip_verification,
        }
    }

    pub fn with_polling_delay(mut self, delay: Duration) -> Self {
        self.polling_delay = delay;
        self
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    fn ensure_running(&self) -> DeployResult<()> {
        if self.controller.is_running()? {
            Ok(())
        } else {
            Err(DeployError::RuntimeNotRunning {
                home: self.runtime_home.clone(),
            })
        }
    }

    /// Rename the artifact so its base name matches the application name,
    /// returning the absolute path to hand to the controller.
    fn prepared_artifact(&self) -> DeployResult<PathBuf> {
        if !self.artifact.exists() {
            return Err(DeployError::ArtifactMissing {
                path: self.artifact.clone(),
            });
        }
        let stem = self.artifact.file_stem().and_then(|s| s.to_str());
        let path = if stem == Some(self.application_name.as_str()) {
            self.artifact.clone()
        } else {
            let extension = self
                .artifact
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("jar");
            let renamed = self
                .artifact
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(format!("{}.{}", self.application_name, extension));
            log::debug!(
                "Renaming {} to {}",
                self.artifact.display(),
                renamed.display()
            );
            std::fs::rename(&self.artifact, &renamed)?;
            renamed
        };
        Ok(std::fs::canonicalize(path)?)
    }

    fn poll_deployed(&self, kind: ArtifactKind, timeout_message: &str) -> DeployResult<()> {
        let prober = PollingProber::new(self.timeout, self.polling_delay);
        let probe = deployment_probe(&self.controller, kind, &self.application_name);
        prober.check(probe).map_err(|e| match e {
            DeployError::ProbeTimeout { .. } => {
                DeployError::Verification(timeout_message.to_string())
            }
            other => other,
        })
    }
}

impl<C: RuntimeController> ArtifactDeployer for StandaloneDeployer<C> {
    fn deploy_application(&self) -> DeployResult<()> {
        let artifact = self.prepared_artifact()?;
        // A dependent application cannot start before its domain is present.
        if let Some(domain) = &self.domain {
            self.controller.deploy_domain(domain)?;
        }
        self.ensure_running()?;
        self.controller.deploy(&artifact)?;
        if self.skip_verification {
            return Ok(());
        }
        self.poll_deployed(ArtifactKind::Application, "Application deployment timeout.")
    }

    fn undeploy_application(&self) -> DeployResult<()> {
        self.ensure_running()?;
        match self.controller.deployed_application(&self.application_name)? {
            Some(_) => self.controller.undeploy(&self.application_name),
            None => {
                // Unlike the network targets this expects a concrete file,
                // so absence is always a hard failure.
                log::error!(
                    "Application {} is not deployed on the runtime at {}",
                    self.application_name,
                    self.runtime_home.display()
                );
                Err(DeployError::NotFound {
                    name: self.application_name.clone(),
                    target: DeploymentTarget::Standalone,
                })
            }
        }
    }

    fn deploy_domain(&self) -> DeployResult<()> {
        let artifact = self.prepared_artifact()?;
        self.ensure_running()?;
        self.controller.deploy_domain(&artifact)?;
        if self.skip_verification {
            return Ok(());
        }
        self.poll_deployed(ArtifactKind::Domain, "Domain deployment timeout.")
    }

    fn undeploy_domain(&self) -> DeployResult<()> {
        self.ensure_running()?;
        match self.controller.deployed_domain(&self.application_name)? {
            Some(_) => self.controller.undeploy_domain(&self.application_name),
            None => {
                log::error!(
                    "Domain {} is not deployed on the runtime at {}",
                    self.application_name,
                    self.runtime_home.display()
                );
                Err(DeployError::NotFound {
                    name: self.application_name.clone(),
                    target: DeploymentTarget::Standalone,
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::fs;

    use crate::controller::ControllerState;

    /// Controller fake recording every call in order
    pub(crate) struct FakeController {
        pub calls: RefCell<Vec<String>>,
        pub running: bool,
        /// Number of `is_deployed` polls before the artifact shows up;
        /// `None` means it never does.
        pub deployed_after: Option<u32>,
        polls: Cell<u32>,
        pub deployed_application: Option<PathBuf>,
        pub deployed_domain: Option<PathBuf>,
    }

    impl FakeController {
        pub fn running() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                running: true,
                deployed_after: Some(0),
                polls: Cell::new(0),
                deployed_application: None,
                deployed_domain: None,
            }
        }

        pub fn stopped() -> Self {
            Self {
                running: false,
                ..Self::running()
            }
        }
    }

    impl RuntimeController for FakeController {
        fn start(&self) -> DeployResult<()> {
            self.calls.borrow_mut().push("start".to_string());
            Ok(())
        }
        fn stop(&self) -> DeployResult<i32> {
            self.calls.borrow_mut().push("stop".to_string());
            Ok(0)
        }
        fn restart(&self) -> DeployResult<()> {
            self.calls.borrow_mut().push("restart".to_string());
            Ok(())
        }
        fn status(&self) -> DeployResult<ControllerState> {
            Ok(ControllerState {
                running: self.running,
                pid: self.running.then_some(1),
            })
        }
        fn deploy(&self, artifact: &Path) -> DeployResult<()> {
            self.calls
                .borrow_mut()
                .push(format!("deploy {}", artifact.display()));
            Ok(())
        }
        fn deploy_domain(&self, artifact: &Path) -> DeployResult<()> {
            self.calls
                .borrow_mut()
                .push(format!("deploy-domain {}", artifact.display()));
            Ok(())
        }
        fn undeploy(&self, name: &str) -> DeployResult<()> {
            self.calls.borrow_mut().push(format!("undeploy {}", name));
            Ok(())
        }
        fn undeploy_domain(&self, name: &str) -> DeployResult<()> {
            self.calls
                .borrow_mut()
                .push(format!("undeploy-domain {}", name));
            Ok(())
        }
        fn deployed_application(&self, _: &str) -> DeployResult<Option<PathBuf>> {
            Ok(self.deployed_application.clone())
        }
        fn deployed_domain(&self, _: &str) -> DeployResult<Option<PathBuf>> {
            Ok(self.deployed_domain.clone())
        }
        fn is_deployed(&self, _: &str) -> DeployResult<bool> {
            let polls = self.polls.get();
            self.polls.set(polls + 1);
            Ok(matches!(self.deployed_after, Some(after) if polls >= after))
        }
        fn is_domain_deployed(&self, name: &str) -> DeployResult<bool> {
            self.is_deployed(name)
        }
    }

    fn config_for(artifact: &Path, name: &str) -> DeploymentConfig {
        let mut config = DeploymentConfig::new(
            artifact,
            name,
            DeploymentTarget::Standalone,
            ArtifactKind::Application,
        );
        config.deployment_timeout = Duration::from_millis(200);
        config
    }

    fn deployer(
        controller: FakeController,
        artifact: &Path,
        name: &str,
    ) -> StandaloneDeployer<FakeController> {
        StandaloneDeployer::new(controller, PathBuf::from("/opt/runtime"), &config_for(artifact, name))
            .with_polling_delay(Duration::from_millis(5))
    }

    #[test]
    fn deploys_the_artifact_exactly_once_and_polls_until_deployed() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("app.jar");
        fs::write(&artifact, b"jar").unwrap();

        let mut controller = FakeController::running();
        controller.deployed_after = Some(2);
        let deployer = deployer(controller, &artifact, "app");

        deployer.deploy_application().unwrap();

        let calls = deployer.controller.calls.borrow();
        let deploys: Vec<_> = calls.iter().filter(|c| c.starts_with("deploy ")).collect();
        assert_eq!(deploys.len(), 1);
        let expected = fs::canonicalize(&artifact).unwrap();
        assert_eq!(*deploys[0], format!("deploy {}", expected.display()));
    }

    #[test]
    fn renames_the_artifact_to_the_application_name() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("build-output-1.2.3.jar");
        fs::write(&artifact, b"jar").unwrap();

        let deployer = deployer(FakeController::running(), &artifact, "orders");
        deployer.deploy_application().unwrap();

        assert!(dir.path().join("orders.jar").exists());
        assert!(!artifact.exists());
    }

    #[test]
    fn deploys_the_domain_dependency_before_the_application() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("app.jar");
        fs::write(&artifact, b"jar").unwrap();

        let mut config = config_for(&artifact, "app");
        config.domain = Some(PathBuf::from("/tmp/shared-domain.jar"));
        let deployer = StandaloneDeployer::new(
            FakeController::running(),
            PathBuf::from("/opt/runtime"),
            &config,
        )
        .with_polling_delay(Duration::from_millis(5));

        deployer.deploy_application().unwrap();

        let calls = deployer.controller.calls.borrow();
        let domain_idx = calls.iter().position(|c| c.starts_with("deploy-domain")).unwrap();
        let app_idx = calls.iter().position(|c| c.starts_with("deploy ")).unwrap();
        assert!(domain_idx < app_idx);
    }

    #[test]
    fn fails_immediately_when_the_runtime_is_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("app.jar");
        fs::write(&artifact, b"jar").unwrap();

        let deployer = deployer(FakeController::stopped(), &artifact, "app");
        let err = deployer.deploy_application().unwrap_err();
        assert!(matches!(err, DeployError::RuntimeNotRunning { .. }));
        assert!(deployer.controller.calls.borrow().is_empty());
    }

    #[test]
    fn times_out_with_the_application_timeout_message() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("app.jar");
        fs::write(&artifact, b"jar").unwrap();

        let mut controller = FakeController::running();
        controller.deployed_after = None;
        let deployer = deployer(controller, &artifact, "app");

        let err = deployer.deploy_application().unwrap_err();
        assert_eq!(err.to_string(), "Application deployment timeout.");
    }

    #[test]
    fn domain_deploy_times_out_with_the_domain_message() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("shared.jar");
        fs::write(&artifact, b"jar").unwrap();

        let mut controller = FakeController::running();
        controller.deployed_after = None;
        let deployer = deployer(controller, &artifact, "shared");

        let err = deployer.deploy_domain().unwrap_err();
        assert_eq!(err.to_string(), "Domain deployment timeout.");
    }

    #[test]
    fn skip_verification_returns_without_polling() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("app.jar");
        fs::write(&artifact, b"jar").unwrap();

        let mut config = config_for(&artifact, "app");
        config.skip_verification = true;
        let mut controller = FakeController::running();
        controller.deployed_after = None; // would time out if polled
        let deployer =
            StandaloneDeployer::new(controller, PathBuf::from("/opt/runtime"), &config);

        assert!(deployer.deploy_application().is_ok());
    }

    #[test]
    fn undeploy_removes_a_present_application() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("app.jar");
        fs::write(&artifact, b"jar").unwrap();

        let mut controller = FakeController::running();
        controller.deployed_application = Some(PathBuf::from("/opt/runtime/apps/app.jar"));
        let deployer = deployer(controller, &artifact, "app");

        deployer.undeploy_application().unwrap();
        let calls = deployer.controller.calls.borrow();
        assert_eq!(*calls, vec!["undeploy app".to_string()]);
    }

    #[test]
    fn undeploy_of_an_absent_application_is_a_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("app.jar");
        fs::write(&artifact, b"jar").unwrap();

        let deployer = deployer(FakeController::running(), &artifact, "app");
        let err = deployer.undeploy_application().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn missing_artifact_fails_before_touching_the_controller() {
        let deployer = deployer(
            FakeController::running(),
            Path::new("/no/such/app.jar"),
            "app",
        );
        let err = deployer.deploy_application().unwrap_err();
        assert!(matches!(err, DeployError::ArtifactMissing { .. }));
        assert!(deployer.controller.calls.borrow().is_empty());
    }
}
