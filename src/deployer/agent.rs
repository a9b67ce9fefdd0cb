//! Agent target deployer
//!
//! The agent applies changes synchronously: a 2xx response to the PUT means
//! the runtime has already applied the artifact, so that response is itself
//! the deployment confirmation and no separate verification phase runs. The
//! pre-deploy lookup only decides whether the log narrates a first
//! deployment or a redeployment. Domains are first-class and mirror the
//! application flow on their own collection.

use std::path::PathBuf;

use crate::client::{AgentClient, HttpAgentClient};
use crate::config::{DeploymentConfig, DeploymentTarget};
use crate::error::DeployResult;

use super::{handle_absent, ArtifactDeployer};

/// Deployer for a runtime agent reachable over HTTP
pub struct AgentDeployer<C: AgentClient> {
    client: C,
    artifact: PathBuf,
    name: String,
    fail_if_not_exists: bool,
}

impl AgentDeployer<HttpAgentClient> {
    pub fn from_config(config: &DeploymentConfig) -> DeployResult<Self> {
        let client = HttpAgentClient::new(super::platform_client("Agent", config)?);
        Ok(Self::new(client, config))
    }
}

impl<C: AgentClient> AgentDeployer<C> {
    pub fn new(client: C, config: &DeploymentConfig) -> Self {
        Self {
            client,
            artifact: config.artifact.clone(),
            name: config.application_name.clone(),
            fail_if_not_exists: config.fail_if_not_exists,
        }
    }
}

impl<C: AgentClient> ArtifactDeployer for AgentDeployer<C> {
    fn deploy_application(&self) -> DeployResult<()> {
        if self.client.find_application(&self.name)?.is_some() {
            log::info!("Application '{}' already on the agent. Redeploying", self.name);
        } else {
            log::info!("Deploying application '{}' through the agent", self.name);
        }
        self.client.deploy_application(&self.name, &self.artifact)
    }

    fn undeploy_application(&self) -> DeployResult<()> {
        match self.client.find_application(&self.name)? {
            Some(_) => self.client.undeploy_application(&self.name),
            None => handle_absent(&self.name, DeploymentTarget::Agent, self.fail_if_not_exists),
        }
    }

    fn deploy_domain(&self) -> DeployResult<()> {
        if self.client.find_domain(&self.name)?.is_some() {
            log::info!("Domain '{}' already on the agent. Redeploying", self.name);
        } else {
            log::info!("Deploying domain '{}' through the agent", self.name);
        }
        self.client.deploy_domain(&self.name, &self.artifact)
    }

    fn undeploy_domain(&self) -> DeployResult<()> {
        match self.client.find_domain(&self.name)? {
            Some(_) => self.client.undeploy_domain(&self.name),
            None => handle_absent(&self.name, DeploymentTarget::Agent, self.fail_if_not_exists),
        }
    }
}
