//! Stevedore - deployment engine for runtime artifacts
//!
//! Stevedore takes a packaged application or domain archive and deploys it
//! to one of several targets behind a single contract: local self-managed
//! runtimes (standalone or clustered, driven through the runtime's control
//! executable) and managed platforms (ARM, CloudHub, Runtime Fabric, or a
//! runtime agent, driven over HTTP). Deploy requests return quickly
//! everywhere; the engine verifies the artifact actually came up before
//! the configured timeout.

pub mod client;
pub mod config;
pub mod controller;
pub mod deployer;
pub mod error;
pub mod probe;
pub mod retry;
pub mod verification;

// Re-exports for convenience
pub use config::{
    ArtifactKind, Credentials, DeploymentConfig, DeploymentTarget, DEFAULT_DEPLOYMENT_TIMEOUT,
};
pub use controller::{RuntimeController, ScriptController};
pub use deployer::{ArtifactDeployer, Deployer};
pub use error::{DeployError, DeployResult};
pub use probe::{FnProbe, PollingProber, Probe};
pub use retry::OperationRetrier;
