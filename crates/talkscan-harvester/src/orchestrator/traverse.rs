use talkscan_core::{ListingWindow, Record, RecordKind};

use super::{Harvester, Route, RunOutput};
use crate::dedup::Deduplicator;
use crate::error::HarvestError;
use crate::expander::Expander;
use crate::extractor::{Candidate, Extractor};
use crate::orchestrator::HarvestStats;
use crate::platform::PlatformProfile;
use crate::range::{classify, Classification, StopCounter};
use crate::retry::{jittered_delay, navigate_with_retry};
use crate::scroller::StabilityScroller;
use crate::session::{PageSession, Selector, WaitFor};

impl<S: PageSession> Harvester<S> {
    /// DISCOVER: load `url` and wait for `ready`.
    ///
    /// `Ok(false)` means the page is skipped; the failure is counted and
    /// logged here.
    async fn open(
        &mut self,
        url: &str,
        ready: &Selector,
        stats: &mut HarvestStats,
    ) -> Result<bool, HarvestError> {
        if self.pages_opened > 0 {
            tokio::time::sleep(jittered_delay(self.settings.inter_navigation_delay_ms)).await;
        }
        self.pages_opened += 1;

        match navigate_with_retry(
            &mut self.session,
            url,
            self.settings.max_retries,
            self.settings.retry_backoff_base_secs,
        )
        .await
        {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                stats.navigation_failures += 1;
                tracing::warn!(url, error = %e, "page failed to load, skipping");
                return Ok(false);
            }
        }

        let condition = WaitFor::Present(ready.clone());
        match self
            .session
            .wait_for(&condition, self.settings.navigation_timeout, self.settings.poll)
            .await
        {
            Ok(()) => Ok(true),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                stats.timeouts += 1;
                tracing::warn!(url, error = %e, "page never showed content, skipping");
                Ok(false)
            }
        }
    }

    /// EXPAND ⇄ SCROLL until a round does neither or the round budget runs
    /// out. Returns whether any round made progress.
    async fn expand_and_scroll(
        &mut self,
        expander: &mut Expander,
        scroller: &mut StabilityScroller,
    ) -> Result<bool, HarvestError> {
        let mut progressed = false;
        for round in 0..self.settings.max_expand_rounds.max(1) {
            let expanded = expander.expand_once(&mut self.session).await?;
            let grew = scroller.advance(&mut self.session).await?;
            tracing::trace!(round, expanded, grew, "expand/scroll round");
            if !expanded && !grew {
                break;
            }
            progressed = true;
        }
        Ok(progressed)
    }

    /// Traverse a newest-first listing for one subject window, then visit
    /// every in-range entry's detail page.
    pub(super) async fn harvest_listing(
        &mut self,
        profile: &PlatformProfile,
        url: &str,
        window: &ListingWindow,
        route: Route<'_>,
        out: &mut RunOutput,
        stats: &mut HarvestStats,
    ) -> Result<(), HarvestError> {
        let mut entries = Vec::new();
        let scanned = self
            .scan_listing(profile, url, window, out, &mut entries, stats)
            .await;
        let chained = self
            .chain_entries(profile, entries, scanned.is_err(), route, out, stats)
            .await;
        scanned.and(chained)
    }

    async fn scan_listing(
        &mut self,
        profile: &PlatformProfile,
        url: &str,
        window: &ListingWindow,
        out: &RunOutput,
        entries: &mut Vec<Candidate>,
        stats: &mut HarvestStats,
    ) -> Result<(), HarvestError> {
        let Some(listing) = profile.listing.as_ref() else {
            tracing::warn!(platform = %profile.platform, url, "platform has no listing profile");
            return Ok(());
        };
        if !self.open(url, &profile.listing_ready, stats).await? {
            return Ok(());
        }

        let mut scroller = StabilityScroller::new(self.settings.settle, self.settings.poll);
        let mut expander = Expander::new(profile.reveal_controls.clone(), &profile.trigger_phrases);
        let mut extractor = Extractor::new(
            listing,
            profile.noise,
            profile.platform,
            RecordKind::Post,
            out.parser,
        );
        let mut counter = StopCounter::new(self.settings.too_old_streak);
        let mut seen = Deduplicator::new();
        let mut stalled = 0u32;

        let result = async {
            for iteration in 0..self.settings.max_listing_iterations {
                if self.cancel.is_cancelled() {
                    tracing::info!(url, iteration, "cancelled, ending listing");
                    break;
                }

                let progressed = self.expand_and_scroll(&mut expander, &mut scroller).await?;
                let candidates = extractor.extract(&mut self.session, url).await?;

                let mut fresh = 0usize;
                let mut stop = false;
                for candidate in candidates {
                    if candidate.record.body.trim().is_empty() || !seen.accept(&candidate.record.identity) {
                        continue;
                    }
                    fresh += 1;
                    note_parse_failure(&candidate.record, stats);

                    let classification = classify(candidate.record.timestamp_parsed.as_ref(), window);
                    counter.observe(classification);
                    if counter.should_stop() {
                        stop = true;
                        break;
                    }
                    if classification == Classification::InRange {
                        stats.listing_entries += 1;
                        entries.push(candidate);
                    }
                }

                if stop {
                    stats.early_stops += 1;
                    tracing::info!(
                        url,
                        iteration,
                        consecutive_too_old = counter.consecutive_too_old(),
                        "listing passed the window, stopping early"
                    );
                    break;
                }

                if progressed || fresh > 0 {
                    stalled = 0;
                } else {
                    stalled += 1;
                    if stalled >= self.settings.max_stalled_iterations {
                        tracing::info!(url, iteration, stalled, "listing stopped growing");
                        break;
                    }
                }
            }
            Ok::<(), HarvestError>(())
        }
        .await;

        stats.failed_activations += expander.failed_activations();
        stats.skipped_blocks += extractor.skipped_blocks();
        result
    }

    /// Visit each entry's detail page. With `offline`, or once the session is
    /// lost, remaining entries are emitted as their listing cards.
    async fn chain_entries(
        &mut self,
        profile: &PlatformProfile,
        entries: Vec<Candidate>,
        offline: bool,
        route: Route<'_>,
        out: &mut RunOutput,
        stats: &mut HarvestStats,
    ) -> Result<(), HarvestError> {
        let mut fatal: Option<HarvestError> = None;

        for entry in entries {
            if offline || fatal.is_some() || self.cancel.is_cancelled() {
                self.emit(out, route, &entry.record, stats);
                continue;
            }
            let Some(detail_url) = entry
                .link
                .as_deref()
                .and_then(|link| resolve_link(&entry.record.source_url, link))
            else {
                self.emit(out, route, &entry.record, stats);
                continue;
            };

            match self
                .harvest_detail(profile, &detail_url, Some(&entry.record), route, out, stats)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(url = %detail_url, "detail unavailable, keeping listing card");
                    self.emit(out, route, &entry.record, stats);
                }
                Err(e) => {
                    self.emit(out, route, &entry.record, stats);
                    fatal = Some(e);
                }
            }
        }

        fatal.map_or(Ok(()), Err)
    }

    /// Harvest one detail page: the post itself, then its comment thread to
    /// exhaustion. `hint` is the listing card the page was reached from.
    ///
    /// Returns `Ok(false)` when the page could not be opened.
    pub(super) async fn harvest_detail(
        &mut self,
        profile: &PlatformProfile,
        url: &str,
        hint: Option<&Record>,
        route: Route<'_>,
        out: &mut RunOutput,
        stats: &mut HarvestStats,
    ) -> Result<bool, HarvestError> {
        if !self.open(url, &profile.detail_ready, stats).await? {
            return Ok(false);
        }
        stats.detail_pages += 1;

        if let Some(post) = self.read_post(profile, url, hint).await? {
            self.emit(out, route, &post, stats);
        }

        let mut scroller = StabilityScroller::new(self.settings.settle, self.settings.poll);
        let mut expander = Expander::new(profile.reveal_controls.clone(), &profile.trigger_phrases);
        let mut extractor = Extractor::new(
            &profile.detail,
            profile.noise,
            profile.platform,
            RecordKind::Comment,
            out.parser,
        );
        let mut seen = Deduplicator::new();

        let result = async {
            self.collect_comments(&mut extractor, &mut seen, url, route, out, stats)
                .await?;

            let mut stalled = 0u32;
            for attempt in 0..self.settings.detail_max_scrolls {
                if self.cancel.is_cancelled() {
                    tracing::info!(url, attempt, "cancelled, ending detail page");
                    break;
                }
                let expanded = expander.expand_once(&mut self.session).await?;
                let grew = scroller.advance(&mut self.session).await?;
                let fresh = self
                    .collect_comments(&mut extractor, &mut seen, url, route, out, stats)
                    .await?;

                if expanded || grew || fresh > 0 {
                    stalled = 0;
                } else {
                    stalled += 1;
                    if stalled >= self.settings.max_stalled_iterations {
                        tracing::debug!(url, attempt, "comment thread exhausted");
                        break;
                    }
                }
            }
            Ok::<(), HarvestError>(())
        }
        .await;

        stats.failed_activations += expander.failed_activations();
        stats.skipped_blocks += extractor.skipped_blocks();
        tracing::debug!(url, comments = seen.len(), "detail page finished");
        result.map(|()| true)
    }

    /// EXTRACT on a detail page. Comments carry no date filter; every new
    /// identity is emitted. Returns how many were new.
    async fn collect_comments(
        &mut self,
        extractor: &mut Extractor<'_>,
        seen: &mut Deduplicator,
        url: &str,
        route: Route<'_>,
        out: &mut RunOutput,
        stats: &mut HarvestStats,
    ) -> Result<usize, HarvestError> {
        let candidates = extractor.extract(&mut self.session, url).await?;
        let mut fresh = 0;
        for candidate in candidates {
            if candidate.record.body.trim().is_empty() || !seen.accept(&candidate.record.identity) {
                continue;
            }
            fresh += 1;
            note_parse_failure(&candidate.record, stats);
            self.emit(out, route, &candidate.record, stats);
        }
        Ok(fresh)
    }

    /// The post record of a detail page: title and body joined, identified
    /// by the page URL. Falls back to the listing card when the page shows
    /// neither.
    async fn read_post(
        &mut self,
        profile: &PlatformProfile,
        url: &str,
        hint: Option<&Record>,
    ) -> Result<Option<Record>, HarvestError> {
        let Some(selectors) = profile.detail_post.as_ref() else {
            return Ok(hint.cloned());
        };

        let title = match &selectors.title {
            Some(title) => document_text(&mut self.session, std::slice::from_ref(title)).await?,
            None => None,
        };
        let body = document_text(&mut self.session, &selectors.body).await?;
        let text: Vec<String> = title.into_iter().chain(body).collect();
        if text.is_empty() {
            return Ok(hint.cloned());
        }

        Ok(Some(Record {
            identity: url.to_string(),
            author: hint.map(|h| h.author.clone()).unwrap_or_default(),
            body: text.join("\n"),
            timestamp_raw: hint.and_then(|h| h.timestamp_raw.clone()),
            timestamp_parsed: hint.and_then(|h| h.timestamp_parsed),
            source_url: url.to_string(),
            platform: profile.platform,
            kind: RecordKind::Post,
        }))
    }
}

fn note_parse_failure(record: &Record, stats: &mut HarvestStats) {
    if record.timestamp_raw.is_some() && record.timestamp_parsed.is_none() {
        stats.parse_failures += 1;
    }
}

/// First non-empty text among document-level `selectors`. Lookup failures
/// other than a lost session read as "nothing there".
async fn document_text<S: PageSession>(
    session: &mut S,
    selectors: &[Selector],
) -> Result<Option<String>, HarvestError> {
    for selector in selectors {
        let found = match session.find_elements(selector).await {
            Ok(found) => found,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::debug!(selector = %selector, error = %e, "post lookup failed");
                continue;
            }
        };
        for handle in found {
            match session.element_text(&handle).await {
                Ok(text) if !text.trim().is_empty() => return Ok(Some(text.trim().to_string())),
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::debug!(error = %e, "post element went stale"),
            }
        }
    }
    Ok(None)
}

/// Absolute URL for a permalink found on `base`.
fn resolve_link(base: &str, link: &str) -> Option<String> {
    let resolved = reqwest::Url::parse(base).and_then(|base| base.join(link.trim()));
    match resolved {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url.to_string()),
        Ok(url) => {
            tracing::debug!(%url, "ignoring non-http permalink");
            None
        }
        Err(e) => {
            tracing::debug!(base, link, error = %e, "unresolvable permalink");
            None
        }
    }
}
