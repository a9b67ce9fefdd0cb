//! CloudHub (v1) client
//!
//! CloudHub identifies an application by its domain name. Create and update
//! are multipart calls carrying both the application descriptor and the
//! artifact; starting is a separate status change request. Undeploying
//! stops the application rather than deleting it.

use std::collections::BTreeMap;
use std::path::Path;

use reqwest::blocking::multipart::Form;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployResult};

use super::PlatformClient;

const APPLICATIONS: &str = "/cloudhub/api/v2/applications";

/// Application descriptor as CloudHub reports and accepts it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudHubApplication {
    /// The application's domain name, unique per region
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    /// Reported status, e.g. `STARTED`; never sent on create/update
    #[serde(default, skip_serializing)]
    pub status: Option<String>,
}

/// Operations the CloudHub deployer needs
pub trait CloudHubClient {
    /// Look up an application by domain name
    fn find_application(&self, name: &str) -> DeployResult<Option<CloudHubApplication>>;

    /// Create the application and upload the artifact
    fn create_application(&self, app: &CloudHubApplication, file: &Path) -> DeployResult<()>;

    /// Update an existing application and upload the new artifact
    fn update_application(&self, app: &CloudHubApplication, file: &Path) -> DeployResult<()>;

    /// Request the application be started
    fn start_application(&self, name: &str) -> DeployResult<()>;

    /// Request the application be stopped
    fn stop_application(&self, name: &str) -> DeployResult<()>;

    /// Current status, `None` when the application does not exist
    fn application_status(&self, name: &str) -> DeployResult<Option<String>>;
}

/// `CloudHubClient` talking to the real platform
pub struct HttpCloudHubClient {
    client: PlatformClient,
}

impl HttpCloudHubClient {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }

    fn form(app: &CloudHubApplication, file: &Path) -> DeployResult<Form> {
        let descriptor =
            serde_json::to_string(app).map_err(|e| DeployError::Client {
                platform: "CloudHub",
                status: 0,
                message: format!("could not serialize application descriptor: {}", e),
            })?;
        Ok(Form::new()
            .text("appInfoJson", descriptor)
            .file("file", file)?)
    }

    fn change_status(&self, name: &str, status: &str) -> DeployResult<()> {
        let path = format!("{}/{}/status", APPLICATIONS, name);
        let body = serde_json::json!({ "status": status });
        let request = self.client.request(Method::POST, &path).json(&body);
        self.client.expect_success(self.client.send(request)?)?;
        Ok(())
    }
}

impl CloudHubClient for HttpCloudHubClient {
    fn find_application(&self, name: &str) -> DeployResult<Option<CloudHubApplication>> {
        let path = format!("{}/{}", APPLICATIONS, name);
        let request = self.client.request(Method::GET, &path);
        let response = match self.client.success_or_absent(self.client.send(request)?)? {
            Some(response) => response,
            None => return Ok(None),
        };
        let app = response.json().map_err(|source| DeployError::Transport {
            platform: self.client.platform(),
            source,
        })?;
        Ok(Some(app))
    }

    fn create_application(&self, app: &CloudHubApplication, file: &Path) -> DeployResult<()> {
        let form = Self::form(app, file)?;
        let request = self.client.request(Method::POST, APPLICATIONS).multipart(form);
        self.client.expect_success(self.client.send(request)?)?;
        Ok(())
    }

    fn update_application(&self, app: &CloudHubApplication, file: &Path) -> DeployResult<()> {
        let path = format!("{}/{}", APPLICATIONS, app.domain);
        let form = Self::form(app, file)?;
        let request = self.client.request(Method::PUT, &path).multipart(form);
        self.client.expect_success(self.client.send(request)?)?;
        Ok(())
    }

    fn start_application(&self, name: &str) -> DeployResult<()> {
        self.change_status(name, "START")
    }

    fn stop_application(&self, name: &str) -> DeployResult<()> {
        self.change_status(name, "STOP")
    }

    fn application_status(&self, name: &str) -> DeployResult<Option<String>> {
        Ok(self.find_application(name)?.and_then(|app| app.status))
    }
}
