//! CloudHub v2 / Runtime Fabric client
//!
//! Deployments here are first-class entities with their own ids and an
//! asynchronous status that converges after the create/update request
//! returns. The deployer polls `deployment_status` until the platform
//! reports the artifact applied and started.

use reqwest::Method;
use serde::Deserialize;

use crate::config::ApplicationMetadata;
use crate::error::{DeployError, DeployResult};

use super::PlatformClient;

const DEPLOYMENTS: &str = "/amc/application-manager/api/v2/deployments";

/// Deployment entity as reported by the platform
#[derive(Debug, Clone, Deserialize)]
pub struct FabricDeployment {
    pub id: String,
    pub name: String,
    /// Convergence status, e.g. `APPLIED`, `APPLYING`, `FAILED`
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeploymentList {
    items: Vec<FabricDeployment>,
}

/// Operations the Runtime Fabric deployer needs
pub trait FabricClient {
    /// Look up a deployment by name on the named fabric target
    fn find_deployment(&self, name: &str, target: &str)
        -> DeployResult<Option<FabricDeployment>>;

    /// Create a deployment, returning its id
    fn create_deployment(&self, meta: &ApplicationMetadata, target: &str) -> DeployResult<String>;

    /// Push a new artifact/configuration to an existing deployment
    fn update_deployment(&self, id: &str, meta: &ApplicationMetadata) -> DeployResult<()>;

    /// Delete the deployment
    fn delete_deployment(&self, id: &str) -> DeployResult<()>;

    /// Convergence status, `None` when the deployment no longer exists
    fn deployment_status(&self, id: &str) -> DeployResult<Option<String>>;
}

/// `FabricClient` talking to the real platform
pub struct HttpFabricClient {
    client: PlatformClient,
}

impl HttpFabricClient {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }

    fn deployment_body(meta: &ApplicationMetadata, target: &str) -> serde_json::Value {
        serde_json::json!({
            "name": meta.name,
            "target": { "targetId": target },
            "application": {
                "ref": { "artifact": meta.file.display().to_string() },
                "configuration": { "properties": meta.properties },
                "desiredState": "STARTED",
            },
        })
    }

    fn json<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::blocking::Response,
    ) -> DeployResult<T> {
        response.json().map_err(|source| DeployError::Transport {
            platform: self.client.platform(),
            source,
        })
    }
}

impl FabricClient for HttpFabricClient {
    fn find_deployment(
        &self,
        name: &str,
        target: &str,
    ) -> DeployResult<Option<FabricDeployment>> {
        let path = format!("{}?targetId={}", DEPLOYMENTS, target);
        let request = self.client.request(Method::GET, &path);
        let response = self.client.expect_success(self.client.send(request)?)?;
        let list: DeploymentList = self.json(response)?;
        Ok(list.items.into_iter().find(|d| d.name == name))
    }

    fn create_deployment(&self, meta: &ApplicationMetadata, target: &str) -> DeployResult<String> {
        let body = Self::deployment_body(meta, target);
        let request = self.client.request(Method::POST, DEPLOYMENTS).json(&body);
        let response = self.client.expect_success(self.client.send(request)?)?;
        let created: FabricDeployment = self.json(response)?;
        Ok(created.id)
    }

    fn update_deployment(&self, id: &str, meta: &ApplicationMetadata) -> DeployResult<()> {
        let path = format!("{}/{}", DEPLOYMENTS, id);
        // Placement is immutable on update; only the application block goes up.
        let body = serde_json::json!({
            "application": {
                "ref": { "artifact": meta.file.display().to_string() },
                "configuration": { "properties": meta.properties },
                "desiredState": "STARTED",
            },
        });
        let request = self.client.request(Method::PATCH, &path).json(&body);
        self.client.expect_success(self.client.send(request)?)?;
        Ok(())
    }

    fn delete_deployment(&self, id: &str) -> DeployResult<()> {
        let path = format!("{}/{}", DEPLOYMENTS, id);
        let request = self.client.request(Method::DELETE, &path);
        self.client.expect_success(self.client.send(request)?)?;
        Ok(())
    }

    fn deployment_status(&self, id: &str) -> DeployResult<Option<String>> {
        let path = format!("{}/{}", DEPLOYMENTS, id);
        let request = self.client.request(Method::GET, &path);
        let response = match self.client.success_or_absent(self.client.send(request)?)? {
            Some(response) => response,
            None => return Ok(None),
        };
        let deployment: FabricDeployment = self.json(response)?;
        Ok(deployment.status)
    }
}
