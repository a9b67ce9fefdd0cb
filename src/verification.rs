//! Post-deploy verification
//!
//! Deploy requests are synchronous but the artifact comes up asynchronously
//! on every target. Verification confirms the artifact reached a running
//! state before the configured deployment timeout, without ever reissuing
//! the deploy request itself: a verification timeout means "created but not
//! confirmed", which is reported as such.
//!
//! Each target gets the primitive that matches its status model: ARM status
//! is continuous state sampled against a deadline (prober), CloudHub and
//! Runtime Fabric expose discrete cheap status reads (bounded retrier), and
//! the standalone runtime is asked through a controller-backed probe.

use std::time::Duration;

use crate::client::{ArmClient, CloudHubClient, FabricClient};
use crate::config::ArtifactKind;
use crate::controller::RuntimeController;
use crate::error::{DeployError, DeployResult};
use crate::probe::{FnProbe, PollingProber, Probe};
use crate::retry::OperationRetrier;

/// Terminal state meaning the artifact is up
pub const STARTED: &str = "STARTED";
/// Runtime Fabric state meaning the deployment converged
pub const APPLIED: &str = "APPLIED";
/// Runtime Fabric terminal failure state
pub const FAILED: &str = "FAILED";

fn attempts_for(timeout: Duration, delay: Duration) -> u32 {
    let delay_ms = delay.as_millis().max(1);
    (timeout.as_millis() / delay_ms).max(1) as u32
}

/// Assert an ARM application reaches `STARTED` before the timeout
///
/// The failure message distinguishes an application ARM never reported
/// from one that was found but never started.
pub fn verify_arm_started(
    client: &dyn ArmClient,
    id: u64,
    name: &str,
    timeout: Duration,
    delay: Duration,
) -> DeployResult<()> {
    let mut last_seen: Option<String> = None;
    let mut found = false;
    let mut failure: Option<DeployError> = None;
    let prober = PollingProber::new(timeout, delay);
    let result = prober.check(FnProbe::new(
        format!("application '{}' started on ARM", name),
        || match client.application_status(id) {
            Ok(Some(status)) => {
                found = true;
                let started = status == STARTED;
                last_seen = Some(status);
                started
            }
            // Not reported yet: keep polling.
            Ok(None) => false,
            // A failed status read ends the poll; the caller gets the
            // client/transport error, not a verification timeout.
            Err(e) => {
                failure = Some(e);
                true
            }
        },
    ));
    if let Some(err) = failure {
        return Err(err);
    }
    match result {
        Ok(()) => Ok(()),
        Err(DeployError::ProbeTimeout { .. }) => {
            let detail = if found {
                format!("last reported status was {:?}", last_seen.as_deref())
            } else {
                "the application was never reported by ARM".to_string()
            };
            Err(DeployError::Verification(format!(
                "Application '{}' was not started after {} ms: {}",
                name,
                timeout.as_millis(),
                detail
            )))
        }
        Err(other) => Err(other),
    }
}

/// Assert a CloudHub application reaches `STARTED` before the timeout
pub fn verify_cloudhub_started(
    client: &dyn CloudHubClient,
    name: &str,
    timeout: Duration,
    delay: Duration,
) -> DeployResult<()> {
    let retrier = OperationRetrier::new(attempts_for(timeout, delay), delay);
    let result = retrier.retry(|| {
        let status = client.application_status(name)?;
        Ok(status.as_deref() != Some(STARTED))
    });
    match result {
        Ok(()) => Ok(()),
        Err(DeployError::Timeout { .. }) => Err(DeployError::Verification(format!(
            "Application '{}' did not start on CloudHub within {} ms",
            name,
            timeout.as_millis()
        ))),
        Err(other) => Err(other),
    }
}

/// Assert a Runtime Fabric deployment converges before the timeout
///
/// A terminal `FAILED` status aborts immediately instead of burning the
/// remaining attempts.
pub fn verify_fabric_applied(
    client: &dyn FabricClient,
    id: &str,
    name: &str,
    timeout: Duration,
    delay: Duration,
) -> DeployResult<()> {
    let retrier = OperationRetrier::new(attempts_for(timeout, delay), delay);
    let result = retrier.retry(|| match client.deployment_status(id)? {
        Some(status) if status == APPLIED || status == STARTED => Ok(false),
        Some(status) if status == FAILED => Err(DeployError::Verification(format!(
            "Deployment of '{}' failed on Runtime Fabric",
            name
        ))),
        _ => Ok(true),
    });
    match result {
        Ok(()) => Ok(()),
        Err(DeployError::Timeout { .. }) => Err(DeployError::Verification(format!(
            "Deployment of '{}' was not applied on Runtime Fabric within {} ms",
            name,
            timeout.as_millis()
        ))),
        Err(other) => Err(other),
    }
}

/// Probe asking the local controller whether an artifact finished deploying
///
/// Selected by artifact kind: applications and domains land in different
/// runtime directories, so they are checked through different controller
/// queries.
pub fn deployment_probe<'a>(
    controller: &'a dyn RuntimeController,
    kind: ArtifactKind,
    name: &'a str,
) -> impl Probe + 'a {
    let description = format!("{} '{}' deployed on the local runtime", kind, name);
    FnProbe::new(description, move || {
        let deployed = match kind {
            ArtifactKind::Application => controller.is_deployed(name),
            ArtifactKind::Domain => controller.is_domain_deployed(name),
        };
        deployed.unwrap_or(false)
    })
}
