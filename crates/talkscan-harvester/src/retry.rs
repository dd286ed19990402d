//! Retry and pacing for page loads.
//!
//! Navigation failures caused by flaky networks or a momentarily busy driver
//! are retried with exponential backoff. Everything else is returned to the
//! caller on the first failure.

use std::time::Duration;

use rand::Rng;

use crate::error::HarvestError;
use crate::session::PageSession;

/// Returns `true` if `err` is transient and worth another attempt.
///
/// Retriable errors:
/// - [`HarvestError::Navigation`]: the page failed to load.
/// - [`HarvestError::Http`]: the driver request itself failed in transit.
///
/// A lost session is never retried; it is fatal for the whole run.
fn is_retriable(err: &HarvestError) -> bool {
    matches!(err, HarvestError::Navigation { .. } | HarvestError::Http(_))
}

/// Upper bound for a single backoff sleep.
const MAX_DELAY_SECS: u64 = 60;

/// `base_secs * 2^attempt`, capped at [`MAX_DELAY_SECS`].
fn backoff_delay(base_secs: u64, attempt: u32) -> Duration {
    let computed = base_secs.saturating_mul(1u64 << attempt.min(10));
    Duration::from_secs(computed.min(MAX_DELAY_SECS))
}

/// Navigate to `url`, retrying transient failures with exponential backoff.
///
/// On a retriable error the function sleeps `backoff_base_secs * 2^attempt`
/// seconds (at most a minute) and tries again, up to `max_retries` additional attempts after the
/// first try. When retries are exhausted the last error is returned.
///
/// With `max_retries = 2` the page is requested at most 3 times.
pub(crate) async fn navigate_with_retry<S: PageSession>(
    session: &mut S,
    url: &str,
    max_retries: u32,
    backoff_base_secs: u64,
) -> Result<(), HarvestError> {
    let mut attempt = 0u32;

    loop {
        let err = match session.navigate(url).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        if !is_retriable(&err) || attempt >= max_retries {
            return Err(err);
        }

        let delay = backoff_delay(backoff_base_secs, attempt);
        tracing::warn!(
            url,
            attempt,
            max_retries,
            delay_secs = delay.as_secs(),
            error = %err,
            "transient navigation error, retrying after backoff"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Delay between two page loads: `base_ms` jittered by up to ±25%.
pub(crate) fn jittered_delay(base_ms: u64) -> Duration {
    if base_ms == 0 {
        return Duration::ZERO;
    }
    let spread = base_ms / 4;
    let low = base_ms - spread;
    let high = base_ms.saturating_add(spread);
    Duration::from_millis(rand::rng().random_range(low..=high))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fake::FakeSession;

    const URL: &str = "https://www.dcard.tw/search?query=x&sort=latest";

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let mut session = FakeSession::new();
        navigate_with_retry(&mut session, URL, 3, 0).await.unwrap();
        assert_eq!(session.navigations.len(), 1);
    }

    #[tokio::test]
    async fn retries_transient_failure_then_succeeds() {
        let mut session = FakeSession::new().flaky_url(URL, 2);
        navigate_with_retry(&mut session, URL, 2, 0).await.unwrap();
        assert_eq!(session.navigations.len(), 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_exhausting_retries() {
        let mut session = FakeSession::new().failing_url(URL);
        let result = navigate_with_retry(&mut session, URL, 2, 0).await;
        // max_retries=2 → 3 total attempts
        assert_eq!(session.navigations.len(), 3);
        assert!(matches!(result, Err(HarvestError::Navigation { .. })));
    }

    #[tokio::test]
    async fn never_retries_lost_session() {
        let mut session = FakeSession::new();
        session.kill();
        let result = navigate_with_retry(&mut session, URL, 3, 0).await;
        assert!(matches!(result, Err(HarvestError::Session { .. })));
    }

    #[test]
    fn retriable_classification() {
        assert!(is_retriable(&HarvestError::Navigation {
            url: URL.to_owned(),
            reason: "net::ERR_CONNECTION_RESET".to_owned(),
        }));
        assert!(!is_retriable(&HarvestError::Interaction {
            reason: "stale element reference".to_owned(),
        }));
        assert!(!is_retriable(&HarvestError::Timeout {
            what: "listing".to_owned(),
            waited_ms: 10,
        }));
    }

    #[test]
    fn backoff_doubles_then_caps_at_a_minute() {
        assert_eq!(backoff_delay(2, 0), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, 3), Duration::from_secs(16));
        assert_eq!(backoff_delay(2, 5), Duration::from_secs(MAX_DELAY_SECS));
        assert_eq!(backoff_delay(2, 40), Duration::from_secs(MAX_DELAY_SECS));
        assert_eq!(backoff_delay(0, 7), Duration::ZERO);
    }

    #[test]
    fn jittered_delay_stays_within_a_quarter_of_base() {
        for _ in 0..100 {
            let d = jittered_delay(2000);
            assert!(d >= Duration::from_millis(1500) && d <= Duration::from_millis(2500));
        }
        assert_eq!(jittered_delay(0), Duration::ZERO);
    }
}
