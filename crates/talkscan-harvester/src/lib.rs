//! Incremental harvesting engine for social-media listings and comment
//! threads.
//!
//! The engine drives a [`PageSession`] (a controllable browser context)
//! through newest-first search listings and post detail pages, expanding
//! hidden content, scrolling until the page stops growing, extracting
//! records with per-platform fallback strategies, and keeping only records
//! that fall inside each subject's date window.

pub mod dedup;
pub mod error;
pub mod expander;
pub mod extractor;
pub mod orchestrator;
pub mod output;
pub mod platform;
pub mod range;
mod retry;
pub mod routing;
pub mod scroller;
pub mod session;

pub use dedup::{derive_identity, Deduplicator};
pub use error::HarvestError;
pub use expander::Expander;
pub use extractor::{Candidate, Extractor};
pub use orchestrator::{
    build_plan, CancelToken, HarvestOutcome, HarvestPlan, HarvestSettings, HarvestStats,
    HarvestTarget, Harvester, PlanFilter, RunSummary, SubjectPlan,
};
pub use output::{write_document, HarvestDocument, Journal};
pub use platform::{PlatformProfile, Strategy};
pub use range::{classify, should_stop, Classification, StopCounter, TimestampParser};
pub use routing::SubjectRouter;
pub use scroller::{ScrollState, StabilityScroller};
pub use session::{ElementHandle, PageSession, Selector, WaitFor, WebDriverSession, WebDriverSettings};
