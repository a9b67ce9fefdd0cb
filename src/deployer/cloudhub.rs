//! CloudHub target deployer
//!
//! Deploying is idempotent on the domain name: an absent application is
//! created, a present one is updated with the requested settings merged
//! over what CloudHub already has. Both paths finish with an explicit
//! start request; undeploying stops the application instead of deleting
//! it, so its settings survive the next deploy.

use std::path::PathBuf;
use std::time::Duration;

use crate::client::{CloudHubApplication, CloudHubClient, HttpCloudHubClient};
use crate::config::{DeploymentConfig, DeploymentTarget};
use crate::error::{DeployError, DeployResult};
use crate::verification::verify_cloudhub_started;

use super::{handle_absent, ArtifactDeployer, DEFAULT_POLLING_DELAY};

/// Deployer for CloudHub (v1)
pub struct CloudHubDeployer<C: CloudHubClient> {
    client: C,
    artifact: PathBuf,
    requested: CloudHubApplication,
    timeout: Duration,
    polling_delay: Duration,
    skip_verification: bool,
    fail_if_not_exists: bool,
}

impl CloudHubDeployer<HttpCloudHubClient> {
    pub fn from_config(config: &DeploymentConfig) -> DeployResult<Self> {
        let client = HttpCloudHubClient::new(super::platform_client("CloudHub", config)?);
        Ok(Self::new(client, config))
    }
}

impl<C: CloudHubClient> CloudHubDeployer<C> {
    pub fn new(client: C, config: &DeploymentConfig) -> Self {
        Self {
            client,
            artifact: config.artifact.clone(),
            requested: CloudHubApplication {
                domain: config.application_name.clone(),
                region: config.region.clone(),
                workers: config.workers,
                runtime_version: None,
                properties: config.properties.clone(),
                status: None,
            },
            timeout: config.deployment_timeout,
            polling_delay: DEFAULT_POLLING_DELAY,
            skip_verification: config.skip_verification,
            fail_if_not_exists: config.fail_if_not_exists,
        }
    }

    #[cfg(test)]
    fn with_polling_delay(mut self, delay: Duration) -> Self {
        self.polling_delay = delay;
        self
    }
}

/// Merge the requested settings over what CloudHub already holds
///
/// Requested fields win; fields the request leaves unset keep their
/// current value so an update never silently resets worker counts or
/// region. An empty requested property map keeps the existing one.
pub fn merge(existing: &CloudHubApplication, requested: &CloudHubApplication) -> CloudHubApplication {
    CloudHubApplication {
        domain: requested.domain.clone(),
        region: requested.region.clone().or_else(|| existing.region.clone()),
        workers: requested.workers.or(existing.workers),
        runtime_version: requested
            .runtime_version
            .clone()
            .or_else(|| existing.runtime_version.clone()),
        properties: if requested.properties.is_empty() {
            existing.properties.clone()
        } else {
            requested.properties.clone()
        },
        status: None,
    }
}

impl<C: CloudHubClient> ArtifactDeployer for CloudHubDeployer<C> {
    fn deploy_application(&self) -> DeployResult<()> {
        let name = &self.requested.domain;
        match self.client.find_application(name)? {
            None => {
                log::info!("Deploying application '{}' to CloudHub", name);
                self.client.create_application(&self.requested, &self.artifact)?;
            }
            Some(existing) => {
                log::info!("Application '{}' already exists on CloudHub. Updating", name);
                let merged = merge(&existing, &self.requested);
                self.client.update_application(&merged, &self.artifact)?;
            }
        }
        self.client.start_application(name)?;
        if self.skip_verification {
            log::info!("Skipping verification of application '{}'", name);
            return Ok(());
        }
        verify_cloudhub_started(&self.client, name, self.timeout, self.polling_delay)
    }

    fn undeploy_application(&self) -> DeployResult<()> {
        let name = &self.requested.domain;
        match self.client.find_application(name)? {
            Some(_) => {
                log::info!("Stopping application '{}' on CloudHub", name);
                self.client.stop_application(name)
            }
            None => handle_absent(name, DeploymentTarget::CloudHub, self.fail_if_not_exists),
        }
    }

    fn deploy_domain(&self) -> DeployResult<()> {
        Err(DeployError::Unsupported {
            target: DeploymentTarget::CloudHub,
            kind: crate::config::ArtifactKind::Domain,
        })
    }

    fn undeploy_domain(&self) -> DeployResult<()> {
        Err(DeployError::Unsupported {
            target: DeploymentTarget::CloudHub,
            kind: crate::config::ArtifactKind::Domain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;
    use std::path::Path;

    use crate::config::ArtifactKind;

    struct FakeCloudHub {
        existing: RefCell<Option<CloudHubApplication>>,
        creates: Cell<u32>,
        updates: Cell<u32>,
        starts: Cell<u32>,
        stops: Cell<u32>,
    }

    impl FakeCloudHub {
        fn empty() -> Self {
            Self {
                existing: RefCell::new(None),
                creates: Cell::new(0),
                updates: Cell::new(0),
                starts: Cell::new(0),
                stops: Cell::new(0),
            }
        }

        fn with_application(app: CloudHubApplication) -> Self {
            let fake = Self::empty();
            *fake.existing.borrow_mut() = Some(app);
            fake
        }
    }

    impl CloudHubClient for FakeCloudHub {
        fn find_application(&self, name: &str) -> DeployResult<Option<CloudHubApplication>> {
            Ok(self
                .existing
                .borrow()
                .as_ref()
                .filter(|a| a.domain == name)
                .cloned())
        }

        fn create_application(&self, app: &CloudHubApplication, _: &Path) -> DeployResult<()> {
            self.creates.set(self.creates.get() + 1);
            let mut created = app.clone();
            created.status = Some("STARTED".to_string());
            *self.existing.borrow_mut() = Some(created);
            Ok(())
        }

        fn update_application(&self, app: &CloudHubApplication, _: &Path) -> DeployResult<()> {
            self.updates.set(self.updates.get() + 1);
            let mut updated = app.clone();
            updated.status = Some("STARTED".to_string());
            *self.existing.borrow_mut() = Some(updated);
            Ok(())
        }

        fn start_application(&self, _: &str) -> DeployResult<()> {
            self.starts.set(self.starts.get() + 1);
            Ok(())
        }

        fn stop_application(&self, _: &str) -> DeployResult<()> {
            self.stops.set(self.stops.get() + 1);
            Ok(())
        }

        fn application_status(&self, name: &str) -> DeployResult<Option<String>> {
            Ok(self.find_application(name)?.and_then(|a| a.status))
        }
    }

    fn config() -> DeploymentConfig {
        DeploymentConfig::new(
            "target/orders.jar",
            "orders",
            DeploymentTarget::CloudHub,
            ArtifactKind::Application,
        )
    }

    fn deployer(client: FakeCloudHub) -> CloudHubDeployer<FakeCloudHub> {
        CloudHubDeployer::new(client, &config()).with_polling_delay(Duration::from_millis(1))
    }

    fn app(domain: &str) -> CloudHubApplication {
        CloudHubApplication {
            domain: domain.to_string(),
            region: None,
            workers: None,
            runtime_version: None,
            properties: BTreeMap::new(),
            status: Some("STARTED".to_string()),
        }
    }

    #[test]
    fn first_deploy_creates_and_starts() {
        let deployer = deployer(FakeCloudHub::empty());
        deployer.deploy_application().unwrap();
        assert_eq!(deployer.client.creates.get(), 1);
        assert_eq!(deployer.client.updates.get(), 0);
        assert_eq!(deployer.client.starts.get(), 1);
    }

    #[test]
    fn redeploy_updates_instead_of_recreating() {
        let deployer = deployer(FakeCloudHub::with_application(app("orders")));
        deployer.deploy_application().unwrap();
        assert_eq!(deployer.client.creates.get(), 0);
        assert_eq!(deployer.client.updates.get(), 1);
        assert_eq!(deployer.client.starts.get(), 1);
    }

    #[test]
    fn deploying_twice_creates_exactly_once() {
        let deployer = deployer(FakeCloudHub::empty());
        deployer.deploy_application().unwrap();
        deployer.deploy_application().unwrap();
        assert_eq!(deployer.client.creates.get(), 1);
        assert_eq!(deployer.client.updates.get(), 1);
    }

    #[test]
    fn undeploy_stops_rather_than_deletes() {
        let deployer = deployer(FakeCloudHub::with_application(app("orders")));
        deployer.undeploy_application().unwrap();
        assert_eq!(deployer.client.stops.get(), 1);
        assert!(deployer.client.existing.borrow().is_some());
    }

    #[test]
    fn undeploy_of_absent_application_honors_the_policy() {
        let deployer = deployer(FakeCloudHub::empty());
        assert!(deployer.undeploy_application().unwrap_err().is_not_found());

        let mut config = config();
        config.fail_if_not_exists = false;
        let lenient = CloudHubDeployer::new(FakeCloudHub::empty(), &config);
        assert!(lenient.undeploy_application().is_ok());
    }

    #[test]
    fn domains_are_rejected() {
        let deployer = deployer(FakeCloudHub::empty());
        assert!(matches!(
            deployer.deploy_domain(),
            Err(DeployError::Unsupported { .. })
        ));
    }

    #[test]
    fn merge_keeps_existing_values_for_unset_fields() {
        let mut existing = app("orders");
        existing.region = Some("us-east-1".to_string());
        existing.workers = Some(4);
        existing
            .properties
            .insert("env".to_string(), "qa".to_string());

        let mut requested = app("orders");
        requested.status = None;
        requested.workers = Some(2);

        let merged = merge(&existing, &requested);
        assert_eq!(merged.workers, Some(2));
        assert_eq!(merged.region.as_deref(), Some("us-east-1"));
        assert_eq!(merged.properties.get("env").map(String::as_str), Some("qa"));
        assert!(merged.status.is_none());
    }

    #[test]
    fn merge_replaces_properties_wholesale_when_requested() {
        let mut existing = app("orders");
        existing
            .properties
            .insert("old".to_string(), "1".to_string());

        let mut requested = app("orders");
        requested
            .properties
            .insert("new".to_string(), "2".to_string());

        let merged = merge(&existing, &requested);
        assert!(!merged.properties.contains_key("old"));
        assert_eq!(merged.properties.get("new").map(String::as_str), Some("2"));
    }
}
