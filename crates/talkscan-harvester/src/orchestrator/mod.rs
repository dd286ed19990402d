//! Harvest Orchestrator.
//!
//! Drives one [`PageSession`] through every target of a [`HarvestPlan`],
//! strictly one page at a time. Each listing runs
//! `DISCOVER → (EXPAND ⇄ SCROLL) → EXTRACT & FILTER → continue | STOP`;
//! detail pages reuse the same loop bounded by a scroll budget instead of
//! a date. Failures are isolated at the smallest scope they affect. Only a
//! lost session ends the run, and even then the records gathered so far are
//! returned.

mod plan;
mod stats;
mod traverse;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use talkscan_core::{AppConfig, Record};

use crate::dedup::Deduplicator;
use crate::error::HarvestError;
use crate::output::{HarvestDocument, Journal};
use crate::platform::PlatformProfile;
use crate::range::TimestampParser;
use crate::routing::SubjectRouter;
use crate::session::PageSession;

pub use plan::{build_plan, HarvestPlan, HarvestTarget, PlanFilter, SubjectPlan};
pub use stats::{HarvestStats, RunSummary};

/// Loop bounds and waits, all finite.
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub navigation_timeout: Duration,
    pub settle: Duration,
    pub poll: Duration,
    pub max_expand_rounds: u32,
    pub max_listing_iterations: u32,
    pub max_stalled_iterations: u32,
    pub too_old_streak: u32,
    pub detail_max_scrolls: u32,
    pub inter_navigation_delay_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_base_secs: u64,
    /// Reference zone for calendar-date comparisons.
    pub utc_offset: FixedOffset,
}

impl HarvestSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let utc_offset = config
            .utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self {
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            settle: Duration::from_millis(config.settle_ms),
            poll: Duration::from_millis(config.poll_ms.max(1)),
            max_expand_rounds: config.max_expand_rounds,
            max_listing_iterations: config.max_listing_iterations,
            max_stalled_iterations: config.max_stalled_iterations,
            too_old_streak: config.too_old_streak,
            detail_max_scrolls: config.detail_max_scrolls,
            inter_navigation_delay_ms: config.inter_navigation_delay_ms,
            max_retries: config.max_retries,
            retry_backoff_base_secs: config.retry_backoff_base_secs,
            utc_offset,
        }
    }
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(10),
            settle: Duration::from_millis(2000),
            poll: Duration::from_millis(250),
            max_expand_rounds: 3,
            max_listing_iterations: 100,
            max_stalled_iterations: 10,
            too_old_streak: 10,
            detail_max_scrolls: 50,
            inter_navigation_delay_ms: 2000,
            max_retries: 2,
            retry_backoff_base_secs: 2,
            utc_offset: FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }
}

/// Checkpoint-style cancellation shared with a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of [`Harvester::run`].
///
/// `document` holds everything gathered even when `error` is set.
#[derive(Debug)]
pub struct HarvestOutcome {
    pub document: HarvestDocument,
    pub summary: RunSummary,
    /// The fatal error that ended the run early, if any.
    pub error: Option<HarvestError>,
}

/// Where accepted records go.
#[derive(Clone, Copy)]
pub(crate) enum Route<'p> {
    Subject(&'p str),
    /// Shared posts: every subject the record mentions.
    Mentions(&'p SubjectRouter),
}

/// Output side of one run.
pub(crate) struct RunOutput {
    document: HarvestDocument,
    /// Per subject label, `(source_url, identity)` pairs already written.
    /// Keyed by page so equal comments on different posts both survive.
    emitted: HashMap<String, Deduplicator>,
    parser: TimestampParser,
}

pub struct Harvester<S> {
    session: S,
    settings: HarvestSettings,
    cancel: CancelToken,
    journal: Option<Journal>,
    reference_time: Option<DateTime<FixedOffset>>,
    pages_opened: usize,
}

impl<S: PageSession> Harvester<S> {
    #[must_use]
    pub fn new(session: S, settings: HarvestSettings) -> Self {
        Self {
            session,
            settings,
            cancel: CancelToken::new(),
            journal: None,
            reference_time: None,
            pages_opened: 0,
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Append every accepted record to `journal` as it is emitted.
    #[must_use]
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Pin "now" for relative timestamps instead of reading the clock.
    #[must_use]
    pub fn with_reference_time(mut self, now: DateTime<FixedOffset>) -> Self {
        self.reference_time = Some(now);
        self
    }

    #[must_use]
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Hand the session back, e.g. to close it.
    pub fn into_session(self) -> S {
        self.session
    }

    /// Harvest every target of `plan`, subjects first, then shared posts.
    pub async fn run(&mut self, plan: &HarvestPlan) -> HarvestOutcome {
        let parser = match self.reference_time {
            Some(now) => TimestampParser::new(now),
            None => TimestampParser::at_current_time(self.settings.utc_offset),
        };
        let mut out = RunOutput {
            document: HarvestDocument::new(),
            emitted: HashMap::new(),
            parser,
        };
        let mut summary = RunSummary::default();
        for subject in &plan.subjects {
            out.document.ensure_subject(&subject.label);
            summary.stats_mut(&subject.label);
        }

        let error = match self.run_plan(plan, &mut out, &mut summary).await {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(error = %e, "harvest aborted, keeping partial results");
                Some(e)
            }
        };
        summary.cancelled = self.cancel.is_cancelled();

        let totals = summary.totals();
        tracing::info!(
            records = totals.records,
            skipped = totals.skipped_items(),
            early_stops = totals.early_stops,
            cancelled = summary.cancelled,
            "harvest run finished"
        );

        HarvestOutcome {
            document: out.document,
            summary,
            error,
        }
    }

    async fn run_plan(
        &mut self,
        plan: &HarvestPlan,
        out: &mut RunOutput,
        summary: &mut RunSummary,
    ) -> Result<(), HarvestError> {
        for subject in &plan.subjects {
            if self.cancel.is_cancelled() {
                tracing::info!("cancelled, skipping remaining subjects");
                return Ok(());
            }
            tracing::info!(subject = %subject.label, targets = subject.targets.len(), "harvesting subject");

            for target in &subject.targets {
                if self.cancel.is_cancelled() {
                    break;
                }
                let profile = PlatformProfile::for_platform(target.platform())
                    .with_extra_phrases(&plan.extra_trigger_phrases);
                let route = Route::Subject(&subject.label);
                let mut stats = HarvestStats::default();

                let result = match target {
                    HarvestTarget::Listing { url, .. } => {
                        self.harvest_listing(&profile, url, &subject.window, route, out, &mut stats)
                            .await
                    }
                    HarvestTarget::Post { url, .. } => self
                        .harvest_detail(&profile, url, None, route, out, &mut stats)
                        .await
                        .map(|_| ()),
                };
                tracing::debug!(subject = %subject.label, %target, %stats, "target finished");
                *summary.stats_mut(&subject.label) += stats;
                result?;
            }

            tracing::info!(
                subject = %subject.label,
                records = out.document.records(&subject.label).len(),
                "subject finished"
            );
        }

        for post in &plan.shared_posts {
            if self.cancel.is_cancelled() {
                break;
            }
            let profile = PlatformProfile::for_platform(post.platform)
                .with_extra_phrases(&plan.extra_trigger_phrases);
            let mut stats = HarvestStats::default();
            let result = self
                .harvest_detail(&profile, &post.url, None, Route::Mentions(&plan.router), out, &mut stats)
                .await;
            summary.shared += stats;
            result?;
        }

        Ok(())
    }

    /// Send a record to its route, dropping empty bodies and records a
    /// subject already holds from the same page.
    fn emit(&mut self, out: &mut RunOutput, route: Route<'_>, record: &Record, stats: &mut HarvestStats) {
        if record.body.trim().is_empty() {
            return;
        }
        match route {
            Route::Subject(label) => self.emit_to(out, label, record, stats),
            Route::Mentions(router) => {
                let labels = router.route(&record.body);
                if labels.is_empty() {
                    tracing::debug!(identity = %record.identity, "shared record mentions no subject");
                }
                for label in labels {
                    self.emit_to(out, label, record, stats);
                }
            }
        }
    }

    fn emit_to(&mut self, out: &mut RunOutput, label: &str, record: &Record, stats: &mut HarvestStats) {
        let seen = out.emitted.entry(label.to_string()).or_default();
        if !seen.accept(&format!("{}\n{}", record.source_url, record.identity)) {
            return;
        }
        if let Some(journal) = self.journal.as_mut() {
            if let Err(e) = journal.append(label, record) {
                tracing::warn!(
                    path = %journal.path().display(),
                    error = %e,
                    "failed to append record to journal"
                );
            }
        }
        out.document.push(label, record.clone());
        stats.records += 1;
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
