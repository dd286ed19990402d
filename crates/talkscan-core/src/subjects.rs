use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::record::{ListingWindow, Platform};
use crate::ConfigError;

/// A detail page to harvest directly, without a listing traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostTarget {
    pub platform: Platform,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectConfig {
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Terms used to route shared-post comments to this subject.
    /// Empty means "the label itself".
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Platforms whose search listing is traversed with the label as query.
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub posts: Vec<PostTarget>,
}

impl SubjectConfig {
    /// The validated date window. `None` only for configs that skipped
    /// [`load_subjects`] validation.
    #[must_use]
    pub fn window(&self) -> Option<ListingWindow> {
        ListingWindow::new(self.start_date, self.end_date)
    }

    /// Routing terms, falling back to the label when none are configured.
    #[must_use]
    pub fn match_terms(&self) -> Vec<String> {
        if self.keywords.is_empty() {
            vec![self.label.clone()]
        } else {
            self.keywords.clone()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectsFile {
    /// Extra reveal phrases keyed by locale, merged into every platform's
    /// built-in trigger phrases.
    #[serde(default)]
    pub trigger_phrases: BTreeMap<String, Vec<String>>,
    /// Detail pages harvested once and routed to subjects by keyword.
    #[serde(default)]
    pub shared_posts: Vec<PostTarget>,
    pub subjects: Vec<SubjectConfig>,
}

impl SubjectsFile {
    /// All configured extra trigger phrases, flattened in locale order.
    #[must_use]
    pub fn extra_trigger_phrases(&self) -> Vec<String> {
        self.trigger_phrases.values().flatten().cloned().collect()
    }
}

/// Load and validate the subjects configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_subjects(path: &Path) -> Result<SubjectsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SubjectsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let subjects_file: SubjectsFile = serde_yaml::from_str(&content)?;

    validate_subjects(&subjects_file)?;

    Ok(subjects_file)
}

fn validate_subjects(subjects_file: &SubjectsFile) -> Result<(), ConfigError> {
    let mut seen_labels = HashSet::new();

    for subject in &subjects_file.subjects {
        let label = subject.label.trim();
        if label.is_empty() {
            return Err(ConfigError::Validation(
                "subject label must be non-empty".to_string(),
            ));
        }

        if !seen_labels.insert(label.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate subject label: '{label}'"
            )));
        }

        if subject.start_date > subject.end_date {
            return Err(ConfigError::Validation(format!(
                "subject '{label}' has start_date {} after end_date {}",
                subject.start_date, subject.end_date
            )));
        }

        if let Some(platform) = subject.platforms.iter().find(|p| !p.has_search_listing()) {
            return Err(ConfigError::Validation(format!(
                "subject '{label}' lists platform '{platform}' which has no search listing; \
                 use posts instead"
            )));
        }

        if subject.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "subject '{label}' has an empty keyword"
            )));
        }

        for post in &subject.posts {
            validate_post_url(&post.url, label)?;
        }
    }

    for post in &subjects_file.shared_posts {
        validate_post_url(&post.url, "shared_posts")?;
    }

    for (locale, phrases) in &subjects_file.trigger_phrases {
        if phrases.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "trigger phrase set '{locale}' contains an empty phrase"
            )));
        }
    }

    Ok(())
}

fn validate_post_url(url: &str, owner: &str) -> Result<(), ConfigError> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "'{owner}' has a post URL that is not http(s): '{url}'"
        )))
    }
}

#[cfg(test)]
#[path = "subjects_test.rs"]
mod tests;
