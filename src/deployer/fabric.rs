//! Runtime Fabric (CloudHub v2) target deployer
//!
//! Deployments are addressed by name within a named fabric target. A new
//! deployment is created, an existing one gets its application block
//! updated in place; both then wait for the platform to report the change
//! applied, with a terminal FAILED status surfacing immediately.

use std::time::Duration;

use crate::client::{FabricClient, HttpFabricClient};
use crate::config::{ApplicationMetadata, DeploymentConfig, DeploymentTarget};
use crate::error::{DeployError, DeployResult};
use crate::verification::verify_fabric_applied;

use super::{handle_absent, ArtifactDeployer, DEFAULT_POLLING_DELAY};

/// Deployer for Runtime Fabric
pub struct FabricDeployer<C: FabricClient> {
    client: C,
    metadata: ApplicationMetadata,
    target_name: String,
    timeout: Duration,
    polling_delay: Duration,
    skip_verification: bool,
    fail_if_not_exists: bool,
}

impl FabricDeployer<HttpFabricClient> {
    pub fn from_config(config: &DeploymentConfig) -> DeployResult<Self> {
        let client = HttpFabricClient::new(super::platform_client("Runtime Fabric", config)?);
        Self::new(client, config)
    }
}

impl<C: FabricClient> FabricDeployer<C> {
    pub fn new(client: C, config: &DeploymentConfig) -> DeployResult<Self> {
        let target_name = config
            .target_name
            .clone()
            .ok_or(DeployError::MissingField {
                field: "target-name",
                target: DeploymentTarget::RuntimeFabric,
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

impl<C: FabricClient> ArtifactDeployer for FabricDeployer<C> {
    fn deploy_application(&self) -> DeployResult<()> {
        let name = &self.metadata.name;
        let id = match self.client.find_deployment(name, &self.target_name)? {
            None => {
                log::info!(
                    "Creating deployment of '{}' on Runtime Fabric target '{}'",
                    name,
                    self.target_name
                );
                self.client
                    .create_deployment(&self.metadata, &self.target_name)?
            }
            Some(existing) => {
                log::info!(
                    "Found deployment of '{}' on Runtime Fabric target '{}'. Updating",
                    name,
                    self.target_name
                );
                self.client.update_deployment(&existing.id, &self.metadata)?;
                existing.id
            }
        };
        if self.skip_verification {
            log::info!("Skipping verification of deployment '{}'", name);
            return Ok(());
        }
        verify_fabric_applied(&self.client, &id, name, self.timeout, self.polling_delay)
    }

    fn undeploy_application(&self) -> DeployResult<()> {
        let name = &self.metadata.name;
        match self.client.find_deployment(name, &self.target_name)? {
            Some(existing) => {
                log::info!("Deleting deployment of '{}' from Runtime Fabric", name);
                self.client.delete_deployment(&existing.id)
            }
            None => handle_absent(name, DeploymentTarget::RuntimeFabric, self.fail_if_not_exists),
        }
    }

    fn deploy_domain(&self) -> DeployResult<()> {
        Err(DeployError::Unsupported {
            target: DeploymentTarget::RuntimeFabric,
            kind: crate::config::ArtifactKind::Domain,
        })
    }

    fn undeploy_domain(&self) -> DeployResult<()> {
        Err(DeployError::Unsupported {
            target: DeploymentTarget::RuntimeFabric,
            kind: crate::config::ArtifactKind::Domain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    use crate::client::FabricDeployment;
    use crate::config::ArtifactKind;

    struct FakeFabric {
        existing: RefCell<Option<FabricDeployment>>,
        creates: Cell<u32>,
        updates: Cell<u32>,
        deletes: Cell<u32>,
    }

    impl FakeFabric {
        fn empty() -> Self {
            Self {
                existing: RefCell::new(None),
                creates: Cell::new(0),
                updates: Cell::new(0),
                deletes: Cell::new(0),
            }
        }

        fn with_deployment(id: &str, name: &str, status: &str) -> Self {
            let fake = Self::empty();
            *fake.existing.borrow_mut() = Some(FabricDeployment {
                id: id.to_string(),
                name: name.to_string(),
                status: Some(status.to_string()),
            });
            fake
        }
    }

    impl FabricClient for FakeFabric {
        fn find_deployment(
            &self,
            name: &str,
            _: &str,
        ) -> DeployResult<Option<FabricDeployment>> {
            Ok(self
                .existing
                .borrow()
                .as_ref()
                .filter(|d| d.name == name)
                .cloned())
        }

        fn create_deployment(&self, meta: &ApplicationMetadata, _: &str) -> DeployResult<String> {
            self.creates.set(self.creates.get() + 1);
            *self.existing.borrow_mut() = Some(FabricDeployment {
                id: "d-1".to_string(),
                name: meta.name.clone(),
                status: Some("APPLIED".to_string()),
            });
            Ok("d-1".to_string())
        }

        fn update_deployment(&self, _: &str, _: &ApplicationMetadata) -> DeployResult<()> {
            self.updates.set(self.updates.get() + 1);
            Ok(())
        }

        fn delete_deployment(&self, _: &str) -> DeployResult<()> {
            self.deletes.set(self.deletes.get() + 1);
            *self.existing.borrow_mut() = None;
            Ok(())
        }

        fn deployment_status(&self, _: &str) -> DeployResult<Option<String>> {
            Ok(self
                .existing
                .borrow()
                .as_ref()
                .and_then(|d| d.status.clone()))
        }
    }

    fn config() -> DeploymentConfig {
        let mut config = DeploymentConfig::new(
            "target/orders.jar",
            "orders",
            DeploymentTarget::RuntimeFabric,
            ArtifactKind::Application,
        );
        config.target_name = Some("fabric-1".to_string());
        config
    }

    fn deployer(client: FakeFabric) -> FabricDeployer<FakeFabric> {
        FabricDeployer::new(client, &config())
            .unwrap()
            .with_polling_delay(Duration::from_millis(1))
    }

    #[test]
    fn absent_deployment_is_created() {
        let deployer = deployer(FakeFabric::empty());
        deployer.deploy_application().unwrap();
        assert_eq!(deployer.client.creates.get(), 1);
        assert_eq!(deployer.client.updates.get(), 0);
    }

    #[test]
    fn present_deployment_is_updated_in_place() {
        let deployer = deployer(FakeFabric::with_deployment("d-7", "orders", "APPLIED"));
        deployer.deploy_application().unwrap();
        assert_eq!(deployer.client.creates.get(), 0);
        assert_eq!(deployer.client.updates.get(), 1);
    }

    #[test]
    fn failed_convergence_surfaces_as_a_verification_error() {
        let deployer = deployer(FakeFabric::with_deployment("d-7", "orders", "FAILED"));
        let err = deployer.deploy_application().unwrap_err();
        assert!(err.to_string().contains("failed on Runtime Fabric"));
    }

    #[test]
    fn undeploy_deletes_the_resolved_deployment() {
        let deployer = deployer(FakeFabric::with_deployment("d-7", "orders", "APPLIED"));
        deployer.undeploy_application().unwrap();
        assert_eq!(deployer.client.deletes.get(), 1);
    }

    #[test]
    fn undeploy_of_absent_deployment_honors_the_policy() {
        let deployer = deployer(FakeFabric::empty());
        assert!(deployer.undeploy_application().unwrap_err().is_not_found());

        let mut config = config();
        config.fail_if_not_exists = false;
        let lenient = FabricDeployer::new(FakeFabric::empty(), &config).unwrap();
        assert!(lenient.undeploy_application().is_ok());
    }

    #[test]
    fn missing_target_name_is_rejected_up_front() {
        let mut config = config();
        config.target_name = None;
        let err = FabricDeployer::new(FakeFabric::empty(), &config).err().unwrap();
        assert!(matches!(err, DeployError::MissingField { .. }));
    }

    #[test]
    fn domains_are_rejected() {
        let deployer = deployer(FakeFabric::empty());
        assert!(matches!(
            deployer.deploy_domain(),
            Err(DeployError::Unsupported { .. })
        ));
    }
}
