//! Target-specific deployers behind one uniform contract
//!
//! The [`Deployer`] facade resolves exactly one [`ArtifactDeployer`] per
//! operation from the (target, artifact kind) pair and narrates the call.
//! Unsupported combinations fail in the factory, before any network or
//! process call is made; a deployer instance is never reused across
//! unrelated operations.

pub mod agent;
pub mod arm;
pub mod cloudhub;
pub mod cluster;
pub mod fabric;
pub mod standalone;

use std::time::Duration;

use crate::config::{ArtifactKind, DeploymentConfig, DeploymentTarget};
use crate::error::{DeployError, DeployResult};

pub use agent::AgentDeployer;
pub use arm::ArmDeployer;
pub use cloudhub::CloudHubDeployer;
pub use cluster::{ClusterConfigurator, ClusterDeployer, MAX_CLUSTER_NODES};
pub use fabric::FabricDeployer;
pub use standalone::StandaloneDeployer;

/// Default delay between verification polls
pub const DEFAULT_POLLING_DELAY: Duration = Duration::from_secs(1);

/// Uniform per-target deployment contract
///
/// Each operation may be unsupported for a given target, in which case it
/// fails immediately with a descriptive error and makes zero underlying
/// calls.
pub trait ArtifactDeployer {
    fn deploy_application(&self) -> DeployResult<()>;
    fn undeploy_application(&self) -> DeployResult<()>;
    fn deploy_domain(&self) -> DeployResult<()>;
    fn undeploy_domain(&self) -> DeployResult<()>;
}

/// Apply the undeploy absence policy for network targets
///
/// Absent entities are fatal by default; with `fail_if_not_exists = false`
/// the absence is logged and swallowed.
pub(crate) fn handle_absent(
    name: &str,
    target: DeploymentTarget,
    fail_if_not_exists: bool,
) -> DeployResult<()> {
    if fail_if_not_exists {
        log::error!("{} does not exist on the {} target", name, target);
        Err(DeployError::NotFound {
            name: name.to_string(),
            target,
        })
    } else {
        log::error!(
            "{} does not exist on the {} target; nothing to undeploy",
            name,
            target
        );
        Ok(())
    }
}

/// Build the HTTP plumbing for a network deployer out of the config
pub(crate) fn platform_client(
    platform: &'static str,
    config: &DeploymentConfig,
) -> DeployResult<crate::client::PlatformClient> {
    let uri = config.uri.as_deref().ok_or(DeployError::MissingField {
        field: "uri",
        target: config.target,
    })?;
    crate::client::PlatformClient::new(
        platform,
        uri,
        config.credentials.clone(),
        crate::client::AccountScope {
            environment: config.environment.clone(),
            business_group: config.business_group.clone(),
        },
    )
}

/// Facade exposing the uniform deploy/undeploy contract
pub struct Deployer {
    inner: Box<dyn ArtifactDeployer>,
    application_name: String,
    target: DeploymentTarget,
    artifact_kind: ArtifactKind,
}

impl Deployer {
    /// Resolve the deployer for the config's (target, artifact kind) pair
    ///
    /// Fails fast on unsupported combinations and on missing mandatory
    /// target fields, before any network or process call.
    pub fn from_config(config: &DeploymentConfig) -> DeployResult<Self> {
        if config.artifact_kind == ArtifactKind::Domain && !config.target.supports_domains() {
            return Err(DeployError::Unsupported {
                target: config.target,
                kind: config.artifact_kind,
            });
        }
        let inner: Box<dyn ArtifactDeployer> = match config.target {
            DeploymentTarget::Standalone => Box::new(StandaloneDeployer::from_config(config)?),
            DeploymentTarget::Cluster => Box::new(ClusterDeployer::from_config(config)?),
            DeploymentTarget::Arm => Box::new(ArmDeployer::from_config(config)?),
            DeploymentTarget::CloudHub => Box::new(CloudHubDeployer::from_config(config)?),
            DeploymentTarget::RuntimeFabric => Box::new(FabricDeployer::from_config(config)?),
            DeploymentTarget::Agent => Box::new(AgentDeployer::from_config(config)?),
        };
        Ok(Self::new(inner, config))
    }

    /// Wrap an already-constructed deployer; used by tests and embedders
    pub fn new(inner: Box<dyn ArtifactDeployer>, config: &DeploymentConfig) -> Self {
        Self {
            inner,
            application_name: config.application_name.clone(),
            target: config.target,
            artifact_kind: config.artifact_kind,
        }
    }

    /// Deploy the configured artifact to the configured target
    pub fn deploy(&self) -> DeployResult<()> {
        log::info!(
            "Deploying {} '{}' to {}",
            self.artifact_kind,
            self.application_name,
            self.target
        );
        let result = match self.artifact_kind {
            ArtifactKind::Application => self.inner.deploy_application(),
            ArtifactKind::Domain => self.inner.deploy_domain(),
        };
        match &result {
            Ok(()) => log::info!(
                "Successfully deployed {} '{}' to {}",
                self.artifact_kind,
                self.application_name,
                self.target
            ),
            Err(e) => log::error!(
                "Failed to deploy {} '{}' to {}: {}",
                self.artifact_kind,
                self.application_name,
                self.target,
                e
            ),
        }
        result
    }

    /// Undeploy the configured artifact from the configured target
    pub fn undeploy(&self) -> DeployResult<()> {
        log::info!(
            "Undeploying {} '{}' from {}",
            self.artifact_kind,
            self.application_name,
            self.target
        );
        let result = match self.artifact_kind {
            ArtifactKind::Application => self.inner.undeploy_application(),
            ArtifactKind::Domain => self.inner.undeploy_domain(),
        };
        if let Err(e) = &result {
            log::error!(
                "Failed to undeploy {} '{}' from {}: {}",
                self.artifact_kind,
                self.application_name,
                self.target,
                e
            );
        }
        result
    }
}
