use std::fmt;
use std::ops::AddAssign;

use serde::Serialize;

/// Counters for one subject (or the shared posts) in one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HarvestStats {
    pub records: usize,
    pub listing_entries: usize,
    pub detail_pages: usize,
    pub navigation_failures: usize,
    pub failed_activations: usize,
    pub skipped_blocks: usize,
    pub parse_failures: usize,
    pub timeouts: usize,
    pub early_stops: usize,
}

impl HarvestStats {
    /// Everything that was given up on at element or URL scope.
    #[must_use]
    pub fn skipped_items(&self) -> usize {
        self.navigation_failures + self.failed_activations + self.skipped_blocks + self.timeouts
    }
}

impl AddAssign for HarvestStats {
    fn add_assign(&mut self, other: Self) {
        self.records += other.records;
        self.listing_entries += other.listing_entries;
        self.detail_pages += other.detail_pages;
        self.navigation_failures += other.navigation_failures;
        self.failed_activations += other.failed_activations;
        self.skipped_blocks += other.skipped_blocks;
        self.parse_failures += other.parse_failures;
        self.timeouts += other.timeouts;
        self.early_stops += other.early_stops;
    }
}

impl fmt::Display for HarvestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records ({} listing entries, {} detail pages), {} nav failures, \
             {} failed activations, {} skipped blocks, {} parse failures, {} timeouts, \
             {} early stops",
            self.records,
            self.listing_entries,
            self.detail_pages,
            self.navigation_failures,
            self.failed_activations,
            self.skipped_blocks,
            self.parse_failures,
            self.timeouts,
            self.early_stops,
        )
    }
}

/// Per-subject and overall counts for a finished (or aborted) run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub subjects: Vec<(String, HarvestStats)>,
    pub shared: HarvestStats,
    pub cancelled: bool,
}

impl RunSummary {
    pub(crate) fn stats_mut(&mut self, label: &str) -> &mut HarvestStats {
        let index = match self.subjects.iter().position(|(l, _)| l == label) {
            Some(index) => index,
            None => {
                self.subjects.push((label.to_string(), HarvestStats::default()));
                self.subjects.len() - 1
            }
        };
        &mut self.subjects[index].1
    }

    #[must_use]
    pub fn subject(&self, label: &str) -> Option<&HarvestStats> {
        self.subjects.iter().find(|(l, _)| l == label).map(|(_, s)| s)
    }

    #[must_use]
    pub fn totals(&self) -> HarvestStats {
        let mut totals = self.shared;
        for (_, stats) in &self.subjects {
            totals += *stats;
        }
        totals
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, stats) in &self.subjects {
            writeln!(f, "{label}: {stats}")?;
        }
        if self.shared != HarvestStats::default() {
            writeln!(f, "shared posts: {}", self.shared)?;
        }
        write!(f, "total: {}", self.totals())?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_include_shared_posts() {
        let mut summary = RunSummary::default();
        summary.stats_mut("陳零九").records = 3;
        summary.stats_mut("書偉").timeouts = 1;
        summary.stats_mut("陳零九").early_stops = 1;
        summary.shared.records = 2;

        let totals = summary.totals();
        assert_eq!(totals.records, 5);
        assert_eq!(totals.skipped_items(), 1);
        assert_eq!(summary.subjects.len(), 2);
        assert_eq!(summary.subject("陳零九").map(|s| s.early_stops), Some(1));
    }

    #[test]
    fn display_marks_cancelled_runs() {
        let summary = RunSummary {
            cancelled: true,
            ..RunSummary::default()
        };
        let text = summary.to_string();
        assert!(text.starts_with("total: 0 records"));
        assert!(text.ends_with("(cancelled)"));
    }
}
