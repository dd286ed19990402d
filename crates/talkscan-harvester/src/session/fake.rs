//! Scriptable in-memory page session for engine tests.
//!
//! A [`FakePage`] holds a flat arena of nodes. Top-level nodes match the
//! selector strings listed in `matches`; nested nodes hang off a parent
//! under a selector key. Content is grouped into batches: one batch is
//! visible after navigation and each scroll reveals the next one.

use std::collections::{HashMap, HashSet};

use super::{ElementHandle, PageSession, Selector};
use crate::error::HarvestError;

pub(crate) const EXTENT_PER_BATCH: u64 = 1000;

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeNode {
    text: String,
    attrs: HashMap<String, String>,
    matches: Vec<String>,
    children: HashMap<String, Vec<usize>>,
    batch: usize,
    stale: bool,
    click_fails: bool,
    reveals_batch: Option<usize>,
    nested: bool,
}

impl FakeNode {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn matching(mut self, selector: &str) -> Self {
        self.matches.push(selector.to_string());
        self
    }

    pub(crate) fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub(crate) fn in_batch(mut self, batch: usize) -> Self {
        self.batch = batch;
        self
    }

    pub(crate) fn stale(mut self) -> Self {
        self.stale = true;
        self
    }

    /// Readable, but every click is intercepted by an overlay.
    pub(crate) fn obstructed(mut self) -> Self {
        self.click_fails = true;
        self
    }

    /// Clicking this node makes `batch` visible. Every clicked node is
    /// consumed and disappears from later lookups.
    pub(crate) fn reveals(mut self, batch: usize) -> Self {
        self.reveals_batch = Some(batch);
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FakePage {
    nodes: Vec<FakeNode>,
    revealed: usize,
    consumed: HashSet<usize>,
}

impl Default for FakePage {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            revealed: 1,
            consumed: HashSet::new(),
        }
    }
}

impl FakePage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, node: FakeNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub(crate) fn add_child(&mut self, parent: usize, selector: &str, mut node: FakeNode) -> usize {
        node.nested = true;
        node.batch = self.nodes[parent].batch;
        let id = self.add(node);
        self.nodes[parent]
            .children
            .entry(selector.to_string())
            .or_default()
            .push(id);
        id
    }

    fn total_batches(&self) -> usize {
        self.nodes.iter().map(|n| n.batch + 1).max().unwrap_or(1)
    }

    fn visible(&self, id: usize) -> bool {
        self.nodes[id].batch < self.revealed && !self.consumed.contains(&id)
    }

    fn extent(&self) -> u64 {
        self.revealed as u64 * EXTENT_PER_BATCH
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeSession {
    pages: HashMap<String, FakePage>,
    current: Option<String>,
    failing: HashSet<String>,
    flaky: HashMap<String, usize>,
    fatal: HashSet<String>,
    dead: bool,
    pub(crate) navigations: Vec<String>,
    pub(crate) clicks: Vec<String>,
    pub(crate) scrolls: usize,
}

impl FakeSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A session already showing `page`, without recording a navigation.
    pub(crate) fn showing(page: FakePage) -> Self {
        let mut session = Self::new();
        session.pages.insert("about:fake".to_string(), page);
        session.current = Some("about:fake".to_string());
        session
    }

    pub(crate) fn with_page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub(crate) fn failing_url(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// `url` fails to load `failures` times, then loads normally.
    pub(crate) fn flaky_url(mut self, url: &str, failures: usize) -> Self {
        self.flaky.insert(url.to_string(), failures);
        self
    }

    /// Navigating to `url` kills the session.
    pub(crate) fn fatal_url(mut self, url: &str) -> Self {
        self.fatal.insert(url.to_string());
        self
    }

    pub(crate) fn kill(&mut self) {
        self.dead = true;
    }

    fn check_alive(&self) -> Result<(), HarvestError> {
        if self.dead {
            return Err(HarvestError::Session {
                reason: "invalid session id".to_string(),
            });
        }
        Ok(())
    }

    fn page(&self) -> Option<&FakePage> {
        self.current.as_ref().and_then(|url| self.pages.get(url))
    }

    fn page_mut(&mut self) -> Option<&mut FakePage> {
        let url = self.current.clone()?;
        self.pages.get_mut(&url)
    }

    fn node_id(&self, handle: &ElementHandle) -> Result<usize, HarvestError> {
        let stale = || HarvestError::Interaction {
            reason: format!("stale element reference: {}", handle.id()),
        };
        let id: usize = handle.id().parse().map_err(|_| stale())?;
        let page = self.page().ok_or_else(stale)?;
        if id >= page.nodes.len() || page.nodes[id].stale || !page.visible(id) {
            return Err(stale());
        }
        Ok(id)
    }
}

impl PageSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), HarvestError> {
        self.check_alive()?;
        self.navigations.push(url.to_string());
        if self.fatal.contains(url) {
            self.kill();
            self.check_alive()?;
        }
        let flaky = match self.flaky.get_mut(url) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        };
        if self.failing.contains(url) || flaky {
            return Err(HarvestError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        let page = self.pages.entry(url.to_string()).or_default();
        page.revealed = 1;
        page.consumed.clear();
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn current_extent(&mut self) -> Result<u64, HarvestError> {
        self.check_alive()?;
        Ok(self.page().map_or(0, FakePage::extent))
    }

    async fn scroll_to_extent_end(&mut self) -> Result<(), HarvestError> {
        self.check_alive()?;
        self.scrolls += 1;
        if let Some(page) = self.page_mut() {
            if page.revealed < page.total_batches() {
                page.revealed += 1;
            }
        }
        Ok(())
    }

    async fn find_elements(
        &mut self,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, HarvestError> {
        self.check_alive()?;
        let Some(page) = self.page() else {
            return Ok(vec![]);
        };
        Ok((0..page.nodes.len())
            .filter(|&id| {
                let node = &page.nodes[id];
                !node.nested
                    && page.visible(id)
                    && node.matches.iter().any(|m| m == selector.value())
            })
            .map(|id| ElementHandle::new(id.to_string()))
            .collect())
    }

    async fn find_elements_within(
        &mut self,
        parent: &ElementHandle,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, HarvestError> {
        self.check_alive()?;
        let parent_id = self.node_id(parent)?;
        let Some(page) = self.page() else {
            return Ok(vec![]);
        };
        Ok(page.nodes[parent_id]
            .children
            .get(selector.value())
            .map(|ids| {
                ids.iter()
                    .filter(|&&id| page.visible(id))
                    .map(|id| ElementHandle::new(id.to_string()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn element_text(&mut self, handle: &ElementHandle) -> Result<String, HarvestError> {
        self.check_alive()?;
        let id = self.node_id(handle)?;
        Ok(self.page().map(|p| p.nodes[id].text.clone()).unwrap_or_default())
    }

    async fn element_attribute(
        &mut self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, HarvestError> {
        self.check_alive()?;
        let id = self.node_id(handle)?;
        Ok(self.page().and_then(|p| p.nodes[id].attrs.get(name).cloned()))
    }

    async fn click(&mut self, handle: &ElementHandle) -> Result<(), HarvestError> {
        self.check_alive()?;
        let id = self.node_id(handle)?;
        if self.page().is_some_and(|p| p.nodes[id].click_fails) {
            return Err(HarvestError::Interaction {
                reason: format!("element click intercepted: {}", handle.id()),
            });
        }
        self.clicks.push(handle.id().to_string());
        if let Some(page) = self.page_mut() {
            if let Some(batch) = page.nodes[id].reveals_batch {
                page.revealed = page.revealed.max(batch + 1);
            }
            page.consumed.insert(id);
        }
        Ok(())
    }
}
