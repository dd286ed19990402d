//! Range filter and early-stop heuristic.
//!
//! Listings are sorted newest-first, so a long enough run of records older
//! than the window means nothing further down can be in range.

mod timestamp;

use chrono::{DateTime, FixedOffset};
use talkscan_core::ListingWindow;

pub use timestamp::TimestampParser;

/// Where a candidate falls relative to a [`ListingWindow`].
///
/// A candidate without a parsed timestamp is classified [`InRange`]:
/// unknown dates are kept rather than silently dropped.
///
/// [`InRange`]: Classification::InRange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    InRange,
    TooOld,
    TooNew,
}

/// Compares a timestamp's calendar date against the inclusive window.
#[must_use]
pub fn classify(timestamp: Option<&DateTime<FixedOffset>>, window: &ListingWindow) -> Classification {
    let Some(ts) = timestamp else {
        return Classification::InRange;
    };
    let date = ts.date_naive();
    if date < window.start() {
        Classification::TooOld
    } else if date > window.end() {
        Classification::TooNew
    } else {
        Classification::InRange
    }
}

#[must_use]
pub fn should_stop(consecutive_too_old: u32, threshold: u32) -> bool {
    consecutive_too_old >= threshold
}

/// Consecutive too-old counter for one listing traversal.
#[derive(Debug, Clone)]
pub struct StopCounter {
    consecutive_too_old: u32,
    threshold: u32,
}

impl StopCounter {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_too_old: 0,
            threshold,
        }
    }

    /// Feed one classification. Anything other than too-old resets the run.
    pub fn observe(&mut self, classification: Classification) {
        if classification == Classification::TooOld {
            self.consecutive_too_old = self.consecutive_too_old.saturating_add(1);
        } else {
            self.consecutive_too_old = 0;
        }
    }

    #[must_use]
    pub fn consecutive_too_old(&self) -> u32 {
        self.consecutive_too_old
    }

    #[must_use]
    pub fn should_stop(&self) -> bool {
        should_stop(self.consecutive_too_old, self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use super::*;

    fn window() -> ListingWindow {
        ListingWindow::new(
            NaiveDate::from_ymd_opt(2025, 5, 14).unwrap(),
            NaiveDate::from_ymd_opt(2025, 5, 21).unwrap(),
        )
        .unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
    }

    #[test]
    fn unknown_timestamp_is_always_in_range() {
        assert_eq!(classify(None, &window()), Classification::InRange);
        let narrow = ListingWindow::new(
            NaiveDate::from_ymd_opt(1999, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(1999, 1, 1).unwrap(),
        )
        .unwrap();
        assert_eq!(classify(None, &narrow), Classification::InRange);
    }

    #[test]
    fn window_bounds_are_inclusive_by_calendar_date() {
        assert_eq!(classify(Some(&at(2025, 5, 14, 0)), &window()), Classification::InRange);
        assert_eq!(classify(Some(&at(2025, 5, 21, 23)), &window()), Classification::InRange);
        assert_eq!(classify(Some(&at(2025, 5, 13, 23)), &window()), Classification::TooOld);
        assert_eq!(classify(Some(&at(2025, 5, 22, 0)), &window()), Classification::TooNew);
    }

    #[test]
    fn should_stop_iff_threshold_reached() {
        assert!(!should_stop(9, 10));
        assert!(should_stop(10, 10));
        assert!(should_stop(11, 10));
    }

    #[test]
    fn reset_requires_a_full_new_run() {
        let mut counter = StopCounter::new(3);
        counter.observe(Classification::TooOld);
        counter.observe(Classification::TooOld);
        counter.observe(Classification::TooNew);
        assert_eq!(counter.consecutive_too_old(), 0);

        counter.observe(Classification::TooOld);
        counter.observe(Classification::TooOld);
        assert!(!counter.should_stop());
        counter.observe(Classification::TooOld);
        assert!(counter.should_stop());
    }

    #[test]
    fn in_range_also_resets() {
        let mut counter = StopCounter::new(2);
        counter.observe(Classification::TooOld);
        counter.observe(Classification::InRange);
        counter.observe(Classification::TooOld);
        assert!(!counter.should_stop());
    }
}
