//! Runtime agent client
//!
//! The agent exposes a synchronous REST API directly on the runtime:
//! `PUT` of the artifact bytes deploys, `DELETE` undeploys, and both return
//! once the runtime has applied the change. Domains get the same treatment
//! under their own collection.

use std::fs;
use std::path::Path;

use reqwest::Method;
use serde::Deserialize;

use crate::error::{DeployError, DeployResult};

use super::PlatformClient;

const APPLICATIONS: &str = "/agent/applications";
const DOMAINS: &str = "/agent/domains";

/// Artifact entry as reported by the agent
#[derive(Debug, Clone, Deserialize)]
pub struct AgentArtifact {
    pub name: String,
}

/// Operations the agent deployer needs
pub trait AgentClient {
    fn find_application(&self, name: &str) -> DeployResult<Option<AgentArtifact>>;
    fn deploy_application(&self, name: &str, file: &Path) -> DeployResult<()>;
    fn undeploy_application(&self, name: &str) -> DeployResult<()>;

    fn find_domain(&self, name: &str) -> DeployResult<Option<AgentArtifact>>;
    fn deploy_domain(&self, name: &str, file: &Path) -> DeployResult<()>;
    fn undeploy_domain(&self, name: &str) -> DeployResult<()>;
}

/// `AgentClient` talking to a real runtime agent
pub struct HttpAgentClient {
    client: PlatformClient,
}

impl HttpAgentClient {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }

    fn find(&self, collection: &str, name: &str) -> DeployResult<Option<AgentArtifact>> {
        let path = format!("{}/{}", collection, name);
        let request = self.client.request(Method::GET, &path);
        let response = match self.client.success_or_absent(self.client.send(request)?)? {
            Some(response) => response,
            None => return Ok(None),
        };
        let artifact = response.json().map_err(|source| DeployError::Transport {
            platform: self.client.platform(),
            source,
        })?;
        Ok(Some(artifact))
    }

    fn put_artifact(&self, collection: &str, name: &str, file: &Path) -> DeployResult<()> {
        let bytes = fs::read(file).map_err(|_| DeployError::ArtifactMissing {
            path: file.to_path_buf(),
        })?;
        let path = format!("{}/{}", collection, name);
        let request = self
            .client
            .request(Method::PUT, &path)
            .header("Content-Type", "application/octet-stream")
            .body(bytes);
        self.client.expect_success(self.client.send(request)?)?;
        Ok(())
    }

    fn delete(&self, collection: &str, name: &str) -> DeployResult<()> {
        let path = format!("{}/{}", collection, name);
        let request = self.client.request(Method::DELETE, &path);
        self.client.expect_success(self.client.send(request)?)?;
        Ok(())
    }
}

impl AgentClient for HttpAgentClient {
    fn find_application(&self, name: &str) -> DeployResult<Option<AgentArtifact>> {
        self.find(APPLICATIONS, name)
    }

    fn deploy_application(&self, name: &str, file: &Path) -> DeployResult<()> {
        self.put_artifact(APPLICATIONS, name, file)
    }

    fn undeploy_application(&self, name: &str) -> DeployResult<()> {
        self.delete(APPLICATIONS, name)
    }

    fn find_domain(&self, name: &str) -> DeployResult<Option<AgentArtifact>> {
        self.find(DOMAINS, name)
    }

    fn deploy_domain(&self, name: &str, file: &Path) -> DeployResult<()> {
        self.put_artifact(DOMAINS, name, file)
    }

    fn undeploy_domain(&self, name: &str) -> DeployResult<()> {
        self.delete(DOMAINS, name)
    }
}
