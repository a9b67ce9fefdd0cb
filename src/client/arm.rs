//! Anypoint Runtime Manager client
//!
//! ARM identifies applications by a numeric id scoped to a named target
//! (server, server group or cluster). Deploying is a multipart upload;
//! redeploying reuses the existing id and target placement.

use reqwest::blocking::multipart::Form;
use reqwest::Method;
use serde::Deserialize;

use crate::config::ApplicationMetadata;
use crate::error::{DeployError, DeployResult};

use super::PlatformClient;

const APPLICATIONS: &str = "/hybrid/api/v1/applications";
const SERVERS: &str = "/hybrid/api/v1/servers";

/// Application entry as reported by ARM
#[derive(Debug, Clone, Deserialize)]
pub struct ArmApplication {
    pub id: u64,
    pub name: String,
    /// Last status the agent reported, e.g. `STARTED`
    #[serde(rename = "lastReportedStatus")]
    pub status: Option<String>,
    /// Placement of the application, absent in some ARM versions
    #[serde(default)]
    pub target: Option<ArmTarget>,
}

/// Server, server group or cluster an application is placed on
#[derive(Debug, Clone, Deserialize)]
pub struct ArmTarget {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct Server {
    id: u64,
    name: String,
}

/// Operations the ARM deployer needs
pub trait ArmClient {
    /// Look up an application by name on the named target
    fn find_application(&self, name: &str, target: &str) -> DeployResult<Option<ArmApplication>>;

    /// Create the application and upload the artifact, returning its id
    fn deploy_application(&self, meta: &ApplicationMetadata, target: &str) -> DeployResult<u64>;

    /// Upload a new artifact for an existing application id
    fn redeploy_application(&self, id: u64, meta: &ApplicationMetadata) -> DeployResult<()>;

    /// Delete the application by id
    fn undeploy_application(&self, id: u64) -> DeployResult<()>;

    /// Current status of the application, `None` when ARM no longer knows it
    fn application_status(&self, id: u64) -> DeployResult<Option<String>>;
}

/// `ArmClient` talking to a real Runtime Manager
pub struct HttpArmClient {
    client: PlatformClient,
}

impl HttpArmClient {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }

    /// Resolve the named target to its numeric server id
    fn target_id(&self, target: &str) -> DeployResult<u64> {
        let response = self.client.send(self.client.request(Method::GET, SERVERS))?;
        let servers: DataEnvelope<Vec<Server>> = self
            .client
            .expect_success(response)?
            .json()
            .map_err(|source| DeployError::Transport {
                platform: self.client.platform(),
                source,
            })?;
        servers
            .data
            .into_iter()
            .find(|s| s.name == target)
            .map(|s| s.id)
            .ok_or_else(|| DeployError::Client {
                platform: self.client.platform(),
                status: 404,
                message: format!("no target named '{}'", target),
            })
    }

    fn upload_form(meta: &ApplicationMetadata, target_id: Option<u64>) -> DeployResult<Form> {
        let mut form = Form::new()
            .text("artifactName", meta.name.clone())
            .file("file", &meta.file)?;
        if let Some(id) = target_id {
            form = form.text("targetId", id.to_string());
        }
        Ok(form)
    }
}

impl ArmClient for HttpArmClient {
    fn find_application(&self, name: &str, target: &str) -> DeployResult<Option<ArmApplication>> {
        let response = self
            .client
            .send(self.client.request(Method::GET, APPLICATIONS))?;
        let apps: DataEnvelope<Vec<ArmApplication>> = self
            .client
            .expect_success(response)?
            .json()
            .map_err(|source| DeployError::Transport {
                platform: self.client.platform(),
                source,
            })?;
        // ARM lists every application in the environment; filter locally.
        Ok(apps.data.into_iter().find(|a| {
            a.name == name && a.target.as_ref().map_or(true, |t| t.name == target)
        }))
    }

    fn deploy_application(&self, meta: &ApplicationMetadata, target: &str) -> DeployResult<u64> {
        let target_id = self.target_id(target)?;
        let form = Self::upload_form(meta, Some(target_id))?;
        let request = self.client.request(Method::POST, APPLICATIONS).multipart(form);
        let response = self.client.expect_success(self.client.send(request)?)?;
        let created: DataEnvelope<ArmApplication> =
            response.json().map_err(|source| DeployError::Transport {
                platform: self.client.platform(),
                source,
            })?;
        Ok(created.data.id)
    }

    fn redeploy_application(&self, id: u64, meta: &ApplicationMetadata) -> DeployResult<()> {
        let form = Self::upload_form(meta, None)?;
        let path = format!("{}/{}/artifact", APPLICATIONS, id);
        let request = self.client.request(Method::PATCH, &path).multipart(form);
        self.client.expect_success(self.client.send(request)?)?;
        Ok(())
    }

    fn undeploy_application(&self, id: u64) -> DeployResult<()> {
        let path = format!("{}/{}", APPLICATIONS, id);
        let request = self.client.request(Method::DELETE, &path);
        self.client.expect_success(self.client.send(request)?)?;
        Ok(())
    }

    fn application_status(&self, id: u64) -> DeployResult<Option<String>> {
        let path = format!("{}/{}", APPLICATIONS, id);
        let request = self.client.request(Method::GET, &path);
        let response = match self.client.success_or_absent(self.client.send(request)?)? {
            Some(response) => response,
            None => return Ok(None),
        };
        let app: DataEnvelope<ArmApplication> =
            response.json().map_err(|source| DeployError::Transport {
                platform: self.client.platform(),
                source,
            })?;
        Ok(app.data.status)
    }
}
