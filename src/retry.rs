//! Bounded-attempt retry primitive
//!
//! `OperationRetrier` retries a predicate-shaped operation a fixed number of
//! times with a fixed sleep between attempts. It is attempt-count-bounded,
//! not wall-clock-bounded: worst-case wall time is `attempts * sleep`. Use
//! it where the target exposes a small number of discrete, cheap state
//! transitions. For continuous state sampled against a deadline, use
//! [`crate::probe::PollingProber`] instead.

use std::thread;
use std::time::Duration;

use crate::error::{DeployError, DeployResult};

/// Retries an operation up to a fixed number of attempts
#[derive(Debug, Clone, Copy)]
pub struct OperationRetrier {
    attempts: u32,
    sleep: Duration,
}

impl OperationRetrier {
    /// Create a retrier with the given attempt budget and inter-attempt sleep
    pub fn new(attempts: u32, sleep: Duration) -> Self {
        Self { attempts, sleep }
    }

    /// Run `op` until it asks to stop or the attempt budget runs out
    ///
    /// `op` returns `Ok(true)` to request another attempt and `Ok(false)`
    /// when it is done. With `attempts = 1` the operation is evaluated
    /// exactly once, with no sleep when it succeeds. Errors from `op`
    /// propagate immediately and do not consume further attempts.
    pub fn retry<F>(&self, mut op: F) -> DeployResult<()>
    where
        F: FnMut() -> DeployResult<bool>,
    {
        let mut remaining = self.attempts;
        while remaining > 0 {
            if !op()? {
                return Ok(());
            }
            remaining -= 1;
            if remaining > 0 {
                thread::sleep(self.sleep);
            }
        }
        Err(DeployError::Timeout {
            attempts: self.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn succeeds_immediately_when_op_is_done() {
        let retrier = OperationRetrier::new(3, Duration::ZERO);
        let mut calls = 0;
        let result = retrier.retry(|| {
            calls += 1;
            Ok(false)
        });
        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }

    #[test]
    fn fails_with_timeout_after_exhausting_attempts() {
        let retrier = OperationRetrier::new(4, Duration::ZERO);
        let mut calls = 0;
        let result = retrier.retry(|| {
            calls += 1;
            Ok(true)
        });
        assert_eq!(calls, 4);
        match result {
            Err(DeployError::Timeout { attempts }) => assert_eq!(attempts, 4),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn stops_at_the_attempt_that_succeeds() {
        let retrier = OperationRetrier::new(5, Duration::ZERO);
        let mut calls = 0;
        let result = retrier.retry(|| {
            calls += 1;
            Ok(calls < 3)
        });
        assert!(result.is_ok());
        assert_eq!(calls, 3);
    }

    #[test]
    fn single_attempt_evaluates_exactly_once() {
        let retrier = OperationRetrier::new(1, Duration::from_secs(60));
        let mut calls = 0;
        // A 60s sleep would hang the test if the retrier slept on success.
        let result = retrier.retry(|| {
            calls += 1;
            Ok(false)
        });
        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }

    #[test]
    fn op_errors_propagate_without_further_attempts() {
        let retrier = OperationRetrier::new(5, Duration::ZERO);
        let mut calls = 0;
        let result = retrier.retry(|| {
            calls += 1;
            Err(DeployError::UnparsableStatus {
                output: "garbage".to_string(),
            })
        });
        assert_eq!(calls, 1);
        assert!(matches!(
            result,
            Err(DeployError::UnparsableStatus { .. })
        ));
    }

    proptest! {
        /// op is invoked at most `attempts` times, and exactly `k` times
        /// when it succeeds on attempt k.
        #[test]
        fn call_count_is_bounded(attempts in 1u32..20, succeed_at in 1u32..25) {
            let retrier = OperationRetrier::new(attempts, Duration::ZERO);
            let mut calls = 0u32;
            let result = retrier.retry(|| {
                calls += 1;
                Ok(calls < succeed_at)
            });
            if succeed_at <= attempts {
                prop_assert!(result.is_ok());
                prop_assert_eq!(calls, succeed_at);
            } else {
                let timed_out = matches!(result, Err(DeployError::Timeout { .. }));
                prop_assert!(timed_out);
                prop_assert_eq!(calls, attempts);
            }
        }
    }
}
