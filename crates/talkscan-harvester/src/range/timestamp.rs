//! Timestamp interpretation for harvested blocks.
//!
//! A machine-readable attribute (`<time datetime=...>`, epoch `data-utime`)
//! is authoritative. Display text is the fallback and is tried as relative
//! recency, then full year-month-day, then month-day in the current year,
//! then "N days/weeks ago".

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;

static RECENT_CJK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\s*(秒|分鐘|分钟|小時|小时)(前)?$").expect("valid recent cjk regex")
});

static RECENT_EN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(just now|now|today|yesterday|\d+\s*(s|secs?|seconds?|m|mins?|minutes?|h|hrs?|hours?)(\s+ago)?)$",
    )
    .expect("valid recent en regex")
});

static FULL_NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})\s*[年/\-.]\s*(\d{1,2})\s*[月/\-.]\s*(\d{1,2})").expect("valid ymd regex")
});

static FULL_EN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z]{3,9})\.?\s+(\d{1,2}),?\s+(\d{4})\b").expect("valid en ymd regex")
});

static MONTH_DAY_CJK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})\s*月\s*(\d{1,2})\s*日").expect("valid md regex")
});

static MONTH_DAY_EN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z]{3,9})\.?\s+(\d{1,2})\b").expect("valid en md regex")
});

static DAYS_AGO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d+)\s*(天|日|週|周|d|days?|w|wks?|weeks?)(前|\s+ago)?$")
        .expect("valid days-ago regex")
});

const RECENT_KEYWORDS: [&str; 6] = ["剛剛", "刚刚", "今天", "昨天", "分鐘前", "小時前"];

/// Parses timestamps relative to a fixed "now".
///
/// Every parsed value is expressed in the offset of `now`, so calendar-date
/// comparisons are made in one reference zone.
#[derive(Debug, Clone, Copy)]
pub struct TimestampParser {
    now: DateTime<FixedOffset>,
}

impl TimestampParser {
    #[must_use]
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self { now }
    }

    /// A parser anchored at the current wall-clock time in `offset`.
    #[must_use]
    pub fn at_current_time(offset: FixedOffset) -> Self {
        Self::new(Utc::now().with_timezone(&offset))
    }

    #[must_use]
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }

    /// Interpret a block's timestamp. `None` means unknown.
    ///
    /// The structured attribute wins whenever it parses; an attribute that is
    /// present but malformed falls back to the display text.
    #[must_use]
    pub fn parse_timestamp(
        &self,
        display_text: Option<&str>,
        structured_attr: Option<&str>,
    ) -> Option<DateTime<FixedOffset>> {
        if let Some(attr) = structured_attr.map(str::trim).filter(|a| !a.is_empty()) {
            match self.parse_structured(attr) {
                Some(ts) => return Some(ts),
                None => tracing::debug!(attr, "unparseable structured timestamp, using display text"),
            }
        }

        let text = display_text.map(str::trim).filter(|t| !t.is_empty())?;
        let parsed = self.parse_display(text);
        if parsed.is_none() {
            tracing::debug!(text, "unparseable display timestamp");
        }
        parsed
    }

    fn parse_structured(&self, attr: &str) -> Option<DateTime<FixedOffset>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(attr) {
            return Some(ts.with_timezone(&self.offset()));
        }

        let trimmed = attr.trim_end_matches('Z');
        let without_fraction = trimmed.split('.').next().unwrap_or(trimmed);
        if let Ok(naive) = NaiveDateTime::parse_from_str(without_fraction, "%Y-%m-%dT%H:%M:%S") {
            return self.local(naive);
        }
        if let Ok(date) = NaiveDate::parse_from_str(attr, "%Y-%m-%d") {
            return self.start_of(date);
        }

        if !attr.is_empty() && attr.chars().all(|c| c.is_ascii_digit()) {
            if attr.len() == 8 {
                let date = NaiveDate::parse_from_str(attr, "%Y%m%d").ok()?;
                return self.start_of(date);
            }
            // Shorter values would land before 1973; they are not epochs.
            if attr.len() < 9 {
                return None;
            }
            let n: i64 = attr.parse().ok()?;
            // 13-digit values are milliseconds.
            let utc = if attr.len() >= 13 {
                DateTime::from_timestamp_millis(n)?
            } else {
                DateTime::from_timestamp(n, 0)?
            };
            return Some(utc.with_timezone(&self.offset()));
        }
        None
    }

    fn parse_display(&self, text: &str) -> Option<DateTime<FixedOffset>> {
        if RECENT_KEYWORDS.iter().any(|k| text.contains(k))
            || RECENT_CJK.is_match(text)
            || RECENT_EN.is_match(text)
        {
            return Some(self.now);
        }

        if let Some(caps) = FULL_NUMERIC.captures(text) {
            let date = NaiveDate::from_ymd_opt(
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
            )?;
            return self.start_of(date);
        }
        if let Some(caps) = FULL_EN.captures(text) {
            if let Some(month) = month_from_name(&caps[1]) {
                let date =
                    NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month, caps[2].parse().ok()?)?;
                return self.start_of(date);
            }
        }

        if let Some(caps) = MONTH_DAY_CJK.captures(text) {
            let date = NaiveDate::from_ymd_opt(
                self.now.year(),
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
            )?;
            return self.start_of(date);
        }
        if let Some(caps) = MONTH_DAY_EN.captures(text) {
            if let Some(month) = month_from_name(&caps[1]) {
                let date = NaiveDate::from_ymd_opt(self.now.year(), month, caps[2].parse().ok()?)?;
                return self.start_of(date);
            }
        }

        if let Some(caps) = DAYS_AGO.captures(text) {
            let n: i64 = caps[1].parse().ok()?;
            let unit = caps[2].to_lowercase();
            let days = if matches!(unit.as_str(), "週" | "周") || unit.starts_with('w') {
                n.checked_mul(7)?
            } else {
                n
            };
            return self.now.checked_sub_signed(Duration::try_days(days)?);
        }

        None
    }

    fn offset(&self) -> FixedOffset {
        *self.now.offset()
    }

    fn local(&self, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        self.offset().from_local_datetime(&naive).single()
    }

    fn start_of(&self, date: NaiveDate) -> Option<DateTime<FixedOffset>> {
        self.local(date.and_time(NaiveTime::MIN))
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = name.to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    let position = MONTHS.iter().position(|m| lower.starts_with(m))?;
    // Reject words that merely start like a month ("mayor", "decade").
    let full = [
        "january", "february", "march", "april", "may", "june", "july", "august",
        "september", "october", "november", "december",
    ][position];
    let accepted = lower.len() == 3 || full.starts_with(&lower) || (position == 8 && lower == "sept");
    if accepted {
        u32::try_from(position + 1).ok()
    } else {
        None
    }
}

#[cfg(test)]
#[path = "timestamp_test.rs"]
mod tests;
