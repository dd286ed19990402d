//! Activates "reveal more" controls such as "View more replies" or "查看更多".

use std::collections::HashSet;

use crate::error::HarvestError;
use crate::session::{ElementHandle, PageSession, Selector};

#[derive(Debug)]
pub struct Expander {
    controls: Vec<Selector>,
    /// Lowercased trigger phrases.
    phrases: Vec<String>,
    activations: usize,
    failed_activations: usize,
}

impl Expander {
    #[must_use]
    pub fn new(controls: Vec<Selector>, trigger_phrases: &[String]) -> Self {
        let phrases = trigger_phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            controls,
            phrases,
            activations: 0,
            failed_activations: 0,
        }
    }

    #[must_use]
    pub fn activations(&self) -> usize {
        self.activations
    }

    /// Controls that matched but could not be activated.
    #[must_use]
    pub fn failed_activations(&self) -> usize {
        self.failed_activations
    }

    /// Whether a control label contains any trigger phrase, ignoring case.
    #[must_use]
    pub fn matches(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.phrases.iter().any(|p| label.contains(p.as_str()))
    }

    /// Click every visible matching control once.
    ///
    /// Returns whether at least one click went through. Stale or obstructed
    /// controls are counted and skipped.
    ///
    /// # Errors
    ///
    /// Only fatal session errors are returned.
    pub async fn expand_once<S: PageSession>(&mut self, session: &mut S) -> Result<bool, HarvestError> {
        let mut seen = HashSet::new();
        let mut candidates: Vec<ElementHandle> = Vec::new();
        for selector in &self.controls {
            match session.find_elements(selector).await {
                Ok(found) => candidates.extend(found.into_iter().filter(|h| seen.insert(h.clone()))),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::debug!(selector = %selector, error = %e, "control lookup failed"),
            }
        }

        let mut activated = false;
        for control in candidates {
            let label = match session.element_text(&control).await {
                Ok(label) => label,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    // Unreadable labels may belong to controls that were never going to match.
                    tracing::debug!(control = control.id(), error = %e, "control label unreadable, skipping");
                    continue;
                }
            };
            if !self.matches(&label) {
                continue;
            }

            match session.click(&control).await {
                Ok(()) => {
                    self.activations += 1;
                    activated = true;
                    tracing::debug!(label = label.trim(), "expanded hidden content");
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.failed_activations += 1;
                    tracing::debug!(label = label.trim(), error = %e, "control activation failed");
                }
            }
        }

        Ok(activated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fake::{FakeNode, FakePage, FakeSession};

    fn expander() -> Expander {
        Expander::new(
            vec![Selector::xpath("//div[@role='button']")],
            &["查看更多".to_string(), "View more".to_string()],
        )
    }

    const BUTTON: &str = "//div[@role='button']";

    #[tokio::test]
    async fn stale_control_is_swallowed_and_others_activate() {
        let mut page = FakePage::new();
        page.add(FakeNode::new("查看更多留言").matching(BUTTON));
        page.add(FakeNode::new("View more replies").matching(BUTTON).stale());
        page.add(FakeNode::new("view MORE comments").matching(BUTTON));
        let mut session = FakeSession::showing(page);
        let mut expander = expander();

        assert!(expander.expand_once(&mut session).await.unwrap());
        assert_eq!(session.clicks.len(), 2);
        assert_eq!(expander.activations(), 2);
        assert_eq!(expander.failed_activations(), 0);
    }

    #[tokio::test]
    async fn obstructed_click_is_swallowed_and_counted() {
        let mut page = FakePage::new();
        page.add(FakeNode::new("查看更多留言").matching(BUTTON));
        page.add(FakeNode::new("View more replies").matching(BUTTON).obstructed());
        page.add(FakeNode::new("view MORE comments").matching(BUTTON));
        let mut session = FakeSession::showing(page);
        let mut expander = expander();

        assert!(expander.expand_once(&mut session).await.unwrap());
        assert_eq!(session.clicks, vec!["0".to_string(), "2".to_string()]);
        assert_eq!(expander.activations(), 2);
        assert_eq!(expander.failed_activations(), 1);
    }

    #[tokio::test]
    async fn unreadable_non_matching_control_is_not_a_failed_activation() {
        let mut page = FakePage::new();
        page.add(FakeNode::new("Like").matching(BUTTON).stale());
        page.add(FakeNode::new("Like").matching(BUTTON).obstructed());
        let mut session = FakeSession::showing(page);
        let mut expander = expander();

        assert!(!expander.expand_once(&mut session).await.unwrap());
        assert_eq!(expander.failed_activations(), 0);
    }

    #[tokio::test]
    async fn non_matching_controls_are_left_alone() {
        let mut page = FakePage::new();
        page.add(FakeNode::new("Like").matching(BUTTON));
        page.add(FakeNode::new("Share").matching(BUTTON));
        let mut session = FakeSession::showing(page);

        assert!(!expander().expand_once(&mut session).await.unwrap());
        assert!(session.clicks.is_empty());
    }

    #[tokio::test]
    async fn each_control_clicked_once_per_call() {
        let mut page = FakePage::new();
        page.add(FakeNode::new("查看更多").matching(BUTTON).reveals(1));
        page.add(FakeNode::new("reply").matching("div.item").in_batch(1));
        let mut session = FakeSession::showing(page);
        let mut expander = expander();

        assert!(expander.expand_once(&mut session).await.unwrap());
        assert_eq!(session.clicks, vec!["0".to_string()]);
        // The clicked control is gone, so a second round has nothing to do.
        assert!(!expander.expand_once(&mut session).await.unwrap());
    }

    #[tokio::test]
    async fn no_controls_means_no_expansion() {
        let mut session = FakeSession::showing(FakePage::new());
        assert!(!expander().expand_once(&mut session).await.unwrap());
    }

    #[tokio::test]
    async fn lost_session_propagates() {
        let mut page = FakePage::new();
        page.add(FakeNode::new("查看更多").matching(BUTTON));
        let mut session = FakeSession::showing(page);
        session.kill();
        assert!(expander().expand_once(&mut session).await.unwrap_err().is_fatal());
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let e = expander();
        assert!(e.matches("  VIEW MORE replies (3)"));
        assert!(e.matches("查看更多回覆"));
        assert!(!e.matches("View"));
    }
}
