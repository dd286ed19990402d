use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Platforms with a built-in harvesting profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Dcard,
    Facebook,
    Instagram,
    Threads,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Dcard,
        Platform::Facebook,
        Platform::Instagram,
        Platform::Threads,
    ];

    /// Whether the platform exposes a keyword search listing sorted
    /// newest-first that can be traversed for a subject label.
    #[must_use]
    pub fn has_search_listing(self) -> bool {
        matches!(self, Platform::Dcard)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Dcard => write!(f, "dcard"),
            Platform::Facebook => write!(f, "facebook"),
            Platform::Instagram => write!(f, "instagram"),
            Platform::Threads => write!(f, "threads"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dcard" => Ok(Platform::Dcard),
            "facebook" | "fb" => Ok(Platform::Facebook),
            "instagram" | "ig" => Ok(Platform::Instagram),
            "threads" => Ok(Platform::Threads),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Post,
    Comment,
}

/// Inclusive calendar-date range bounding which records are of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl ListingWindow {
    /// Returns `None` when `start > end`.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

/// One harvested post or comment.
///
/// `identity` is unique within a single run's result set and `body` is never
/// empty once a record reaches the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub identity: String,
    pub author: String,
    pub body: String,
    pub timestamp_raw: Option<String>,
    pub timestamp_parsed: Option<DateTime<FixedOffset>>,
    pub source_url: String,
    pub platform: Platform,
    pub kind: RecordKind,
}
