//! ARM target deployer
//!
//! Looks the application up by name on the named target first: an absent
//! application is created with a fresh upload, a present one keeps its id
//! and placement and only gets a new artifact. The two paths are exclusive
//! per operation.

use std::time::Duration;

use crate::client::{ArmClient, HttpArmClient};
use crate::config::{ApplicationMetadata, DeploymentConfig, DeploymentTarget};
use crate::error::{DeployError, DeployResult};
use crate::verification::verify_arm_started;

use super::{handle_absent, ArtifactDeployer, DEFAULT_POLLING_DELAY};

/// Deployer for Anypoint Runtime Manager
pub struct ArmDeployer<C: ArmClient> {
    client: C,
    metadata: ApplicationMetadata,
    target_name: String,
    timeout: Duration,
    polling_delay: Duration,
    skip_verification: bool,
    fail_if_not_exists: bool,
}

impl ArmDeployer<HttpArmClient> {
    pub fn from_config(config: &DeploymentConfig) -> DeployResult<Self> {
        let client = HttpArmClient::new(super::platform_client("ARM", config)?);
        Self::new(client, config)
    }
}

impl<C: ArmClient> ArmDeployer<C> {
    pub fn new(client: C, config: &DeploymentConfig) -> DeployResult<Self> {
        let target_name = config
            .target_name
            .clone()
            .ok_or(DeployError::MissingField {
                field: "target-name",
                target: DeploymentTarget::Arm,
            })?;
        Ok(Self {
            client,
            metadata: ApplicationMetadata::from_config(config),
            target_name,
            timeout: config.deployment_timeout,
            polling_delay: DEFAULT_POLLING_DELAY,
            skip_verification: config.skip_verification,
            fail_if_not_exists: config.fail_if_not_exists,
        })
    }

    #[cfg(test)]
    fn with_polling_delay(mut self, delay: Duration) -> Self {
        self.polling_delay = delay;
        self
    }
}

impl<C: ArmClient> ArtifactDeployer for ArmDeployer<C> {
    fn deploy_application(&self) -> DeployResult<()> {
        let name = &self.metadata.name;
        let id = match self.client.find_application(name, &self.target_name)? {
            None => {
                log::info!(
                    "Deploying application '{}' to ARM target '{}'",
                    name,
                    self.target_name
                );
                self.client
                    .deploy_application(&self.metadata, &self.target_name)?
            }
            Some(existing) => {
                log::info!(
                    "Found application '{}' on ARM target '{}'. Redeploying",
                    name,
                    self.target_name
                );
                self.client.redeploy_application(existing.id, &self.metadata)?;
                existing.id
            }
        };
        if self.skip_verification {
            log::info!("Skipping verification of application '{}'", name);
            return Ok(());
        }
        verify_arm_started(&self.client, id, name, self.timeout, self.polling_delay)
    }

    fn undeploy_application(&self) -> DeployResult<()> {
        let name = &self.metadata.name;
        match self.client.find_application(name, &self.target_name)? {
            Some(existing) => self.client.undeploy_application(existing.id),
            None => handle_absent(name, DeploymentTarget::Arm, self.fail_if_not_exists),
        }
    }

    fn deploy_domain(&self) -> DeployResult<()> {
        Err(DeployError::Unsupported {
            target: DeploymentTarget::Arm,
            kind: crate::config::ArtifactKind::Domain,
        })
    }

    fn undeploy_domain(&self) -> DeployResult<()> {
        Err(DeployError::Unsupported {
            target: DeploymentTarget::Arm,
            kind: crate::config::ArtifactKind::Domain,
        })
    }
}
