//! Retry policy
//!
//! Retries re-run the whole connect pipeline (DNS, TCP, TLS), because a
//! failure may have invalidated any stage. Only transient errors are
//! retried, and only while attempts remain and the client is alive.
//!
//! Delay growth is exponential, `base × 2^attempt`, capped at 30 s, with
//! no jitter.

use std::time::Duration;

use crate::error::ClientError;

/// Ceiling on a single backoff delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Retry limits, taken from the client options.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Upper bound on retry attempts after the initial one.
    pub max_retries: u32,
    /// Base backoff delay.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before re-running the pipeline after the given attempt
    /// (0-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        self.base_delay
            .saturating_mul(factor as u32)
            .min(MAX_RETRY_DELAY)
    }
}

/// What the connector knows about its retry prospects, attached to
/// `Error` and `End` events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryInfo {
    pub will_retry: bool,
    pub retries_left: u32,
    pub next_delay_ms: u64,
}

/// Derive retry info from the policy, the attempt counter, liveness,
/// and the current error's classification.
///
/// `will_retry` holds only when all conjuncts do: the error (if any) is
/// transient, the client is not destroyed, and attempts remain.
pub fn retry_info(
    policy: &RetryPolicy,
    attempts: u32,
    destroyed: bool,
    error: Option<&ClientError>,
) -> RetryInfo {
    let retryable = error.map_or(true, ClientError::is_transient);
    let retries_left = policy.max_retries.saturating_sub(attempts);
    RetryInfo {
        will_retry: retryable && !destroyed && attempts < policy.max_retries,
        retries_left,
        next_delay_ms: policy.delay_after(attempts).as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btps_crypto::CryptoError;
    use btps_resolver::ResolverError;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(10),
        }
    }

    fn transient() -> ClientError {
        ResolverError::DnsLookupFailed {
            name: "_btps.example.com".to_string(),
            reason: "timeout".to_string(),
        }
        .into()
    }

    #[test]
    fn test_exponential_delay_growth() {
        let p = policy();
        assert_eq!(p.delay_after(0), Duration::from_millis(10));
        assert_eq!(p.delay_after(1), Duration::from_millis(20));
        assert_eq!(p.delay_after(2), Duration::from_millis(40));
    }

    #[test]
    fn test_delay_capped() {
        let p = RetryPolicy {
            max_retries: 100,
            base_delay: Duration::from_secs(1),
        };
        assert_eq!(p.delay_after(40), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_retry_while_attempts_remain() {
        let info = retry_info(&policy(), 0, false, Some(&transient()));
        assert!(info.will_retry);
        assert_eq!(info.retries_left, 3);

        let info = retry_info(&policy(), 2, false, Some(&transient()));
        assert!(info.will_retry);
        assert_eq!(info.retries_left, 1);
    }

    #[test]
    fn test_no_retry_when_exhausted() {
        let info = retry_info(&policy(), 3, false, Some(&transient()));
        assert!(!info.will_retry);
        assert_eq!(info.retries_left, 0);

        let info = retry_info(&policy(), 7, false, Some(&transient()));
        assert!(!info.will_retry);
        assert_eq!(info.retries_left, 0);
    }

    #[test]
    fn test_no_retry_when_destroyed() {
        let info = retry_info(&policy(), 0, true, Some(&transient()));
        assert!(!info.will_retry);
    }

    #[test]
    fn test_no_retry_for_terminal_errors() {
        let terminal: Vec<ClientError> = vec![
            ClientError::InvalidIdentity("bad".to_string()),
            ResolverError::InvalidHostname("???".to_string()).into(),
            ResolverError::UnsupportedProtocol("https".to_string()).into(),
            CryptoError::SignatureVerificationFailed.into(),
            ClientError::Syntax("garbage".to_string()),
            ClientError::Destroyed,
        ];
        for err in &terminal {
            let info = retry_info(&policy(), 0, false, Some(err));
            assert!(!info.will_retry, "unexpected retry for {:?}", err);
        }
    }

    #[test]
    fn test_no_error_means_retryable() {
        // End-of-connection with no error: retry eligibility depends
        // only on liveness and attempts.
        let info = retry_info(&policy(), 1, false, None);
        assert!(info.will_retry);
    }
}
