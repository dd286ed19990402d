//! Page Session capability consumed by the harvesting engine.
//!
//! The engine never talks to a browser directly. It drives any
//! [`PageSession`] implementation through navigation, DOM query, scroll and
//! click primitives. Every operation is awaited to completion before the
//! next one is issued, so one session is only ever used by one caller.
//!
//! [`WebDriverSession`] is the production implementation; tests use an
//! in-memory fake.

mod webdriver;

#[cfg(test)]
pub(crate) mod fake;

use std::time::Duration;

use tokio::time::Instant;

use crate::error::HarvestError;

pub use webdriver::{WebDriverSession, WebDriverSettings};

/// Opaque reference to a live DOM element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    #[must_use]
    pub fn css(value: &str) -> Self {
        Selector::Css(value.to_string())
    }

    #[must_use]
    pub fn xpath(value: &str) -> Self {
        Selector::XPath(value.to_string())
    }

    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Selector::Css(v) | Selector::XPath(v) => v,
        }
    }

    /// W3C WebDriver location strategy name.
    #[must_use]
    pub fn strategy(&self) -> &'static str {
        match self {
            Selector::Css(_) => "css selector",
            Selector::XPath(_) => "xpath",
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

/// Condition polled by [`PageSession::wait_for`].
#[derive(Debug, Clone)]
pub enum WaitFor {
    /// At least one element matches the selector.
    Present(Selector),
    /// The document extent has grown beyond the given value.
    ExtentAbove(u64),
}

impl std::fmt::Display for WaitFor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitFor::Present(selector) => write!(f, "element {selector}"),
            WaitFor::ExtentAbove(extent) => write!(f, "document extent > {extent}"),
        }
    }
}

/// Capability interface required from a controllable browser context.
#[allow(async_fn_in_trait)]
pub trait PageSession {
    /// Load `url` in the session's current window.
    ///
    /// # Errors
    ///
    /// [`HarvestError::Navigation`] when the page fails to load;
    /// [`HarvestError::Session`] when the session itself is gone.
    async fn navigate(&mut self, url: &str) -> Result<(), HarvestError>;

    /// Current scrollable height of the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the script evaluation fails.
    async fn current_extent(&mut self) -> Result<u64, HarvestError>;

    /// Scroll the viewport to the end of the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the script evaluation fails.
    async fn scroll_to_extent_end(&mut self) -> Result<(), HarvestError>;

    /// All elements in the document matching `selector`, in document order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails; no matches is `Ok(vec![])`.
    async fn find_elements(
        &mut self,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, HarvestError>;

    /// Elements matching `selector` inside `parent`.
    ///
    /// # Errors
    ///
    /// [`HarvestError::Interaction`] when `parent` went stale.
    async fn find_elements_within(
        &mut self,
        parent: &ElementHandle,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, HarvestError>;

    /// Rendered text of an element.
    ///
    /// # Errors
    ///
    /// [`HarvestError::Interaction`] when the element went stale.
    async fn element_text(&mut self, handle: &ElementHandle) -> Result<String, HarvestError>;

    /// Attribute value, `None` when the attribute is absent.
    ///
    /// # Errors
    ///
    /// [`HarvestError::Interaction`] when the element went stale.
    async fn element_attribute(
        &mut self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, HarvestError>;

    /// Activate an element.
    ///
    /// # Errors
    ///
    /// [`HarvestError::Interaction`] when the element is stale or obstructed.
    async fn click(&mut self, handle: &ElementHandle) -> Result<(), HarvestError>;

    /// Poll `condition` every `poll` until it holds or `timeout` elapses.
    ///
    /// Non-fatal lookup failures while polling count as "not yet".
    ///
    /// # Errors
    ///
    /// [`HarvestError::Timeout`] when the deadline passes first;
    /// fatal session errors are propagated as-is.
    async fn wait_for(
        &mut self,
        condition: &WaitFor,
        timeout: Duration,
        poll: Duration,
    ) -> Result<(), HarvestError> {
        let started = Instant::now();
        let deadline = started + timeout;

        loop {
            let satisfied = match condition {
                WaitFor::Present(selector) => self
                    .find_elements(selector)
                    .await
                    .map(|found| !found.is_empty()),
                WaitFor::ExtentAbove(extent) => {
                    self.current_extent().await.map(|now| now > *extent)
                }
            };

            match satisfied {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::debug!(condition = %condition, error = %e, "wait poll failed");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(HarvestError::Timeout {
                    what: condition.to_string(),
                    waited_ms: u64::try_from(now.duration_since(started).as_millis())
                        .unwrap_or(u64::MAX),
                });
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
        }
    }
}
