//! Deadline-bounded polling primitive
//!
//! A [`Probe`] is a named boolean condition; a [`PollingProber`] samples it
//! at a fixed delay until it holds or a wall-clock timeout elapses. Unlike
//! [`crate::retry::OperationRetrier`] the bound here is elapsed time, not an
//! attempt count: slow checks mean fewer polls, never a longer deadline.

use std::time::{Duration, Instant};

use crate::error::{DeployError, DeployResult};

/// A named boolean condition to poll
pub trait Probe {
    /// Description used in the timeout error message
    fn description(&self) -> String;

    /// Evaluate the condition once
    fn satisfied(&mut self) -> bool;
}

/// Probe built from a description and a closure
pub struct FnProbe<F: FnMut() -> bool> {
    description: String,
    predicate: F,
}

impl<F: FnMut() -> bool> FnProbe<F> {
    pub fn new(description: impl Into<String>, predicate: F) -> Self {
        Self {
            description: description.into(),
            predicate,
        }
    }
}

impl<F: FnMut() -> bool> Probe for FnProbe<F> {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn satisfied(&mut self) -> bool {
        (self.predicate)()
    }
}

/// Polls a probe until it holds or a deadline passes
#[derive(Debug, Clone, Copy)]
pub struct PollingProber {
    timeout: Duration,
    polling_delay: Duration,
}

impl PollingProber {
    /// Create a prober with a total timeout and a fixed delay between polls
    pub fn new(timeout: Duration, polling_delay: Duration) -> Self {
        Self {
            timeout,
            polling_delay,
        }
    }

    /// Poll until the probe is satisfied or the deadline passes
    ///
    /// The failure error carries the probe's description so a single log
    /// line identifies which condition never held.
    pub fn check<P: Probe>(&self, mut probe: P) -> DeployResult<()> {
        let started = Instant::now();
        loop {
            if probe.satisfied() {
                return Ok(());
            }
            if started.elapsed() > self.timeout {
                return Err(DeployError::ProbeTimeout {
                    description: probe.description(),
                    timeout: self.timeout,
                });
            }
            std::thread::sleep(self.polling_delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeds_on_first_true() {
        let prober = PollingProber::new(Duration::from_millis(50), Duration::from_millis(5));
        let mut polls = 0;
        let result = prober.check(FnProbe::new("always true", || {
            polls += 1;
            true
        }));
        assert!(result.is_ok());
        assert_eq!(polls, 1);
    }

    #[test]
    fn succeeds_once_the_condition_becomes_true() {
        let prober = PollingProber::new(Duration::from_secs(5), Duration::from_millis(1));
        let mut polls = 0;
        let result = prober.check(FnProbe::new("true on third poll", || {
            polls += 1;
            polls >= 3
        }));
        assert!(result.is_ok());
        assert_eq!(polls, 3);
    }

    #[test]
    fn fails_after_the_deadline_with_the_description() {
        let prober = PollingProber::new(Duration::from_millis(20), Duration::from_millis(5));
        let result = prober.check(FnProbe::new("app 'orders' deployed", || false));
        match result {
            Err(DeployError::ProbeTimeout {
                description,
                timeout,
            }) => {
                assert_eq!(description, "app 'orders' deployed");
                assert_eq!(timeout, Duration::from_millis(20));
            }
            other => panic!("expected probe timeout, got {:?}", other),
        }
    }

    #[test]
    fn timeout_message_names_the_condition() {
        let prober = PollingProber::new(Duration::from_millis(1), Duration::from_millis(1));
        let err = prober
            .check(FnProbe::new("domain 'shared' deployed", || false))
            .unwrap_err();
        assert!(err.to_string().contains("domain 'shared' deployed"));
    }
}
