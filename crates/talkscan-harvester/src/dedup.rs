//! Identity derivation and first-seen deduplication.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

/// Tracks identities seen during one harvest run.
///
/// A fresh instance is created per listing traversal and per detail page;
/// nothing is persisted across runs.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` the first time `identity` is offered, `false` on every later call.
    pub fn accept(&mut self, identity: &str) -> bool {
        if self.seen.contains(identity) {
            return false;
        }
        self.seen.insert(identity.to_string())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Stable identity for a candidate.
///
/// A platform permalink or id wins when one was extracted. Otherwise the
/// identity is a SHA-256 over the normalized author and body, so two blocks
/// with byte-identical text from the same author collapse into one record.
#[must_use]
pub fn derive_identity(platform_id: Option<&str>, author: &str, body: &str) -> String {
    if let Some(id) = platform_id.map(str::trim).filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    let input = format!("{}\x00{}", normalize(author), normalize(body));
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
