use std::time::Duration;

use crate::error::HarvestError;
use crate::session::{PageSession, WaitFor};

/// Transient scroll bookkeeping for one traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub last_document_extent: u64,
    pub stable_round_count: u32,
}

/// Scrolls to the end of the document and reports whether it grew.
///
/// Termination is the caller's business: a page that never grows simply
/// keeps returning `false`.
#[derive(Debug)]
pub struct StabilityScroller {
    settle: Duration,
    poll: Duration,
    state: ScrollState,
}

impl StabilityScroller {
    #[must_use]
    pub fn new(settle: Duration, poll: Duration) -> Self {
        Self {
            settle,
            poll,
            state: ScrollState::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ScrollState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = ScrollState::default();
    }

    /// One scroll-to-end followed by a bounded settle wait.
    ///
    /// # Errors
    ///
    /// Only fatal session errors are returned. A settle timeout or a failed
    /// extent read both mean "no growth".
    pub async fn advance<S: PageSession>(&mut self, session: &mut S) -> Result<bool, HarvestError> {
        let grew = match self.scroll_and_settle(session).await {
            Ok(extent) => {
                self.state.last_document_extent = extent;
                true
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(HarvestError::Timeout { waited_ms, .. }) => {
                tracing::debug!(waited_ms, "document extent settled without growth");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "scroll attempt failed");
                false
            }
        };

        if grew {
            self.state.stable_round_count = 0;
        } else {
            self.state.stable_round_count = self.state.stable_round_count.saturating_add(1);
        }
        Ok(grew)
    }

    async fn scroll_and_settle<S: PageSession>(&self, session: &mut S) -> Result<u64, HarvestError> {
        let before = session.current_extent().await?;
        session.scroll_to_extent_end().await?;
        session
            .wait_for(&WaitFor::ExtentAbove(before), self.settle, self.poll)
            .await?;
        session.current_extent().await
    }
}
