//! Managed-platform HTTP clients
//!
//! One client per network target, each behind a small trait so the deployers
//! can be exercised against in-memory fakes. The engine is synchronous, so
//! everything here uses reqwest's blocking client; per-request timeouts are
//! the HTTP layer's own, while end-to-end convergence is bounded by the
//! retry/probe primitives above.
//!
//! Only the operations the deploy/undeploy/verify flows need are
//! implemented; these are not full platform API bindings.

pub mod agent;
pub mod arm;
pub mod cloudhub;
pub mod fabric;

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};

use crate::config::Credentials;
use crate::error::{DeployError, DeployResult};

pub use agent::{AgentArtifact, AgentClient, HttpAgentClient};
pub use arm::{ArmApplication, ArmClient, HttpArmClient};
pub use cloudhub::{CloudHubApplication, CloudHubClient, HttpCloudHubClient};
pub use fabric::{FabricClient, FabricDeployment, HttpFabricClient};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Scoping headers for account-context lookups on Anypoint-style platforms
#[derive(Debug, Clone, Default)]
pub struct AccountScope {
    pub environment: Option<String>,
    pub business_group: Option<String>,
}

/// Shared plumbing for the per-platform clients: base URI, credentials,
/// scoping headers and non-2xx mapping.
pub struct PlatformClient {
    platform: &'static str,
    base: String,
    http: Client,
    credentials: Option<Credentials>,
    scope: AccountScope,
}

impl PlatformClient {
    pub fn new(
        platform: &'static str,
        base: impl Into<String>,
        credentials: Option<Credentials>,
        scope: AccountScope,
    ) -> DeployResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| DeployError::Transport { platform, source })?;
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Ok(Self {
            platform,
            base,
            http,
            credentials,
            scope,
        })
    }

    pub fn platform(&self) -> &'static str {
        self.platform
    }

    /// Build a request with auth and scoping headers attached
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base, path);
        let mut builder = self.http.request(method, url);
        builder = match &self.credentials {
            Some(Credentials::Basic { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            Some(Credentials::Bearer(token)) => builder.bearer_auth(token),
            None => builder,
        };
        if let Some(env) = &self.scope.environment {
            builder = builder.header("X-ANYPNT-ENV-ID", env);
        }
        if let Some(org) = &self.scope.business_group {
            builder = builder.header("X-ANYPNT-ORG-ID", org);
        }
        builder
    }

    /// Send a request, mapping transport failures to `DeployError::Transport`
    pub fn send(&self, builder: RequestBuilder) -> DeployResult<Response> {
        builder.send().map_err(|source| DeployError::Transport {
            platform: self.platform,
            source,
        })
    }

    /// Fail on any non-2xx status, carrying status code and body text
    pub fn expect_success(&self, response: Response) -> DeployResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().unwrap_or_default();
        Err(DeployError::Client {
            platform: self.platform,
            status: status.as_u16(),
            message,
        })
    }

    /// Like `expect_success`, but a 404 becomes `Ok(None)` for lookups
    pub fn success_or_absent(&self, response: Response) -> DeployResult<Option<Response>> {
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.expect_success(response).map(Some)
    }
}
