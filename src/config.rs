//! Deployment configuration value objects
//!
//! A `DeploymentConfig` is built by the caller (CLI, build tool), validated
//! upstream, and consumed read-only by exactly one deploy or undeploy
//! operation. The engine never mutates it and never re-validates business
//! rules; it only enforces (target, artifact kind) applicability.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default end-to-end deployment timeout
pub const DEFAULT_DEPLOYMENT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Deployment destination kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentTarget {
    /// A single self-managed runtime process on this machine
    Standalone,
    /// A set of self-managed runtime processes wired into a cluster
    Cluster,
    /// Anypoint Runtime Manager (hybrid server management)
    Arm,
    /// CloudHub (v1)
    CloudHub,
    /// CloudHub v2 via Runtime Fabric
    RuntimeFabric,
    /// A runtime agent reachable over HTTP
    Agent,
}

impl DeploymentTarget {
    /// Human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            DeploymentTarget::Standalone => "Standalone",
            DeploymentTarget::Cluster => "Cluster",
            DeploymentTarget::Arm => "ARM",
            DeploymentTarget::CloudHub => "CloudHub",
            DeploymentTarget::RuntimeFabric => "Runtime Fabric",
            DeploymentTarget::Agent => "Agent",
        }
    }

    /// Whether this target can host domain artifacts
    pub fn supports_domains(&self) -> bool {
        matches!(
            self,
            DeploymentTarget::Standalone | DeploymentTarget::Cluster | DeploymentTarget::Agent
        )
    }
}

impl std::fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Kind of artifact being deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// An application archive
    Application,
    /// A shared domain archive
    Domain,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArtifactKind::Application => "application",
            ArtifactKind::Domain => "domain",
        };
        write!(f, "{}", name)
    }
}

/// Already-obtained credentials for a managed platform
///
/// Credential acquisition and refresh are the caller's problem; the engine
/// only attaches what it is given to outgoing requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Username/password pair
    Basic { username: String, password: String },
    /// Pre-issued bearer token
    Bearer(String),
}

/// Immutable-after-build record describing one deployment operation
///
/// Target-specific fields are optional here; each deployer checks the
/// fields it needs and fails with `DeployError::MissingField` when a
/// mandatory one is absent.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    /// Path to the packaged artifact on disk
    pub artifact: PathBuf,
    /// Logical application or domain name on the target
    pub application_name: String,
    /// Where to deploy
    pub target: DeploymentTarget,
    /// What is being deployed
    pub artifact_kind: ArtifactKind,

    /// Base URI of the managed platform (network targets)
    pub uri: Option<String>,
    /// Credentials or bearer token for the platform
    pub credentials: Option<Credentials>,
    /// Environment name within the account (network targets)
    pub environment: Option<String>,
    /// Business group path within the account (network targets)
    pub business_group: Option<String>,
    /// Named server/cluster/target on the platform (ARM, Runtime Fabric)
    pub target_name: Option<String>,

    /// End-to-end bound on the verification phase
    pub deployment_timeout: Duration,
    /// Skip the post-deploy verification phase entirely
    pub skip_verification: bool,
    /// Whether undeploying an absent artifact is an error
    pub fail_if_not_exists: bool,

    /// Root directory of the self-managed runtime (Standalone)
    pub runtime_home: Option<PathBuf>,
    /// Root directories of the cluster member runtimes (Cluster)
    pub cluster_homes: Vec<PathBuf>,
    /// Domain archive the application depends on (Standalone/Cluster)
    pub domain: Option<PathBuf>,

    /// Worker count (CloudHub)
    pub workers: Option<u32>,
    /// Region (CloudHub)
    pub region: Option<String>,
    /// Properties handed to the deployed artifact
    pub properties: BTreeMap<String, String>,
}

impl DeploymentConfig {
    /// Create a config with the mandatory fields and defaults everywhere else
    pub fn new(
        artifact: impl Into<PathBuf>,
        application_name: impl Into<String>,
        target: DeploymentTarget,
        artifact_kind: ArtifactKind,
    ) -> Self {
        Self {
            artifact: artifact.into(),
            application_name: application_name.into(),
            target,
            artifact_kind,
            uri: None,
            credentials: None,
            environment: None,
            business_group: None,
            target_name: None,
            deployment_timeout: DEFAULT_DEPLOYMENT_TIMEOUT,
            skip_verification: false,
            fail_if_not_exists: true,
            runtime_home: None,
            cluster_homes: Vec::new(),
            domain: None,
            workers: None,
            region: None,
            properties: BTreeMap::new(),
        }
    }
}

/// Per-operation projection of the config used to talk to one target's API
#[derive(Debug, Clone)]
pub struct ApplicationMetadata {
    /// Artifact file to upload
    pub file: PathBuf,
    /// Logical name on the target
    pub name: String,
    /// Target identifier on the platform, when the target names one
    pub target_name: Option<String>,
    /// Properties handed to the deployed artifact
    pub properties: BTreeMap<String, String>,
}

impl ApplicationMetadata {
    /// Project the fields a target API call needs out of the full config
    pub fn from_config(config: &DeploymentConfig) -> Self {
        Self {
            file: config.artifact.clone(),
            name: config.application_name.clone(),
            target_name: config.target_name.clone(),
            properties: config.properties.clone(),
        }
    }
}
