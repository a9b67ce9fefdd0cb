//! Error types for Stevedore
//!
//! Uses `thiserror` for library errors. Every failure path in the engine
//! surfaces as a `DeployError`; callers that need to distinguish a missing
//! remote application (for the undeploy absence policy) match on
//! `DeployError::NotFound`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::{ArtifactKind, DeploymentTarget};

/// Result type alias for Stevedore operations
pub type DeployResult<T> = Result<T, DeployError>;

/// Main error type for deployment operations
#[derive(Error, Debug)]
pub enum DeployError {
    /// The (target, artifact kind) combination is not supported
    #[error("{kind} artifacts are not supported on the {target} target")]
    Unsupported {
        target: DeploymentTarget,
        kind: ArtifactKind,
    },

    /// A mandatory configuration field is missing for the selected target
    #[error("missing mandatory field '{field}' for the {target} target")]
    MissingField {
        field: &'static str,
        target: DeploymentTarget,
    },

    /// Non-2xx response from a managed platform
    #[error("{platform} request failed with status {status}: {message}")]
    Client {
        platform: &'static str,
        status: u16,
        message: String,
    },

    /// Transport-level failure talking to a managed platform
    #[error("request to {platform} failed: {source}")]
    Transport {
        platform: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The named application or domain does not exist on the target
    #[error("{name} does not exist on the {target} target")]
    NotFound {
        name: String,
        target: DeploymentTarget,
    },

    /// A deploy/undeploy precondition: the runtime process must be up
    #[error("runtime at {} is not running", home.display())]
    RuntimeNotRunning { home: PathBuf },

    /// More cluster members than the platform supports
    #[error("cluster size {size} exceeds the supported maximum of {max} nodes")]
    ClusterTooLarge { size: usize, max: usize },

    /// The runtime control executable exited with a failure
    #[error("runtime command '{command}' failed with exit code {code:?}")]
    ControlFailed { command: String, code: Option<i32> },

    /// The runtime control executable produced output we cannot interpret
    #[error("could not parse runtime status output: {output}")]
    UnparsableStatus { output: String },

    /// A control command exceeded its watchdog timeout
    #[error("runtime command '{command}' timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    /// A bounded-attempt retry loop exhausted its attempts
    #[error("operation did not complete after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// A deadline-bounded probe never became true
    #[error("condition '{description}' not met after {timeout:?}")]
    ProbeTimeout {
        description: String,
        timeout: Duration,
    },

    /// Post-deploy verification did not confirm the artifact in time
    #[error("{0}")]
    Verification(String),

    /// The deployed artifact file is missing on disk
    #[error("artifact not found at {}", path.display())]
    ArtifactMissing { path: PathBuf },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    /// True when the error means "the entity is absent on the target",
    /// which the undeploy path may tolerate.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DeployError::NotFound { .. })
    }
}
