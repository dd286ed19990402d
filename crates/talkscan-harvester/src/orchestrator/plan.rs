use talkscan_core::{ListingWindow, Platform, PostTarget, SubjectsFile};

use crate::platform::PlatformProfile;
use crate::routing::SubjectRouter;

/// One page to visit for a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestTarget {
    /// A newest-first search listing, traversed until the window is passed.
    Listing { platform: Platform, url: String },
    /// A single detail page harvested to exhaustion.
    Post { platform: Platform, url: String },
}

impl HarvestTarget {
    #[must_use]
    pub fn platform(&self) -> Platform {
        match self {
            HarvestTarget::Listing { platform, .. } | HarvestTarget::Post { platform, .. } => {
                *platform
            }
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            HarvestTarget::Listing { url, .. } | HarvestTarget::Post { url, .. } => url,
        }
    }
}

impl std::fmt::Display for HarvestTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HarvestTarget::Listing { platform, url } => write!(f, "{platform} listing {url}"),
            HarvestTarget::Post { platform, url } => write!(f, "{platform} post {url}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubjectPlan {
    pub label: String,
    pub window: ListingWindow,
    pub targets: Vec<HarvestTarget>,
}

/// Restricts a plan to one subject and/or one platform.
#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    pub subject: Option<String>,
    pub platform: Option<Platform>,
}

impl PlanFilter {
    fn keeps_subject(&self, label: &str) -> bool {
        self.subject
            .as_deref()
            .is_none_or(|wanted| wanted.trim().eq_ignore_ascii_case(label.trim()))
    }

    fn keeps_platform(&self, platform: Platform) -> bool {
        self.platform.is_none_or(|wanted| wanted == platform)
    }
}

/// Everything a run will visit, in order.
#[derive(Debug, Clone)]
pub struct HarvestPlan {
    pub subjects: Vec<SubjectPlan>,
    pub shared_posts: Vec<PostTarget>,
    pub extra_trigger_phrases: Vec<String>,
    pub router: SubjectRouter,
}

impl HarvestPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subjects.iter().all(|s| s.targets.is_empty()) && self.shared_posts.is_empty()
    }

    #[must_use]
    pub fn target_count(&self) -> usize {
        self.subjects.iter().map(|s| s.targets.len()).sum::<usize>() + self.shared_posts.len()
    }
}

/// Expand a subjects file into concrete targets.
///
/// Each listing platform becomes a search listing for the subject label;
/// each configured post becomes a detail target. Subjects whose window is
/// invalid are dropped with a warning.
#[must_use]
pub fn build_plan(file: &SubjectsFile, filter: &PlanFilter) -> HarvestPlan {
    let mut subjects = Vec::new();
    let mut kept_configs = Vec::new();

    for subject in &file.subjects {
        if !filter.keeps_subject(&subject.label) {
            continue;
        }
        let Some(window) = subject.window() else {
            tracing::warn!(subject = %subject.label, "start_date after end_date, skipping subject");
            continue;
        };

        let mut targets = Vec::new();
        for &platform in &subject.platforms {
            if !filter.keeps_platform(platform) {
                continue;
            }
            match PlatformProfile::for_platform(platform).search_url(&subject.label) {
                Some(url) => targets.push(HarvestTarget::Listing { platform, url }),
                None => tracing::warn!(
                    subject = %subject.label,
                    %platform,
                    "platform has no search listing, skipping"
                ),
            }
        }
        for post in &subject.posts {
            if filter.keeps_platform(post.platform) {
                targets.push(HarvestTarget::Post {
                    platform: post.platform,
                    url: post.url.clone(),
                });
            }
        }

        subjects.push(SubjectPlan {
            label: subject.label.clone(),
            window,
            targets,
        });
        kept_configs.push(subject.clone());
    }

    let shared_posts = if filter.subject.is_some() && subjects.is_empty() {
        Vec::new()
    } else {
        file.shared_posts
            .iter()
            .filter(|p| filter.keeps_platform(p.platform))
            .cloned()
            .collect()
    };

    HarvestPlan {
        subjects,
        shared_posts,
        extra_trigger_phrases: file.extra_trigger_phrases(),
        router: SubjectRouter::new(&kept_configs),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use talkscan_core::SubjectConfig;

    use super::*;

    fn subject(label: &str, platforms: Vec<Platform>, posts: Vec<PostTarget>) -> SubjectConfig {
        SubjectConfig {
            label: label.to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 5, 14).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 5, 21).unwrap(),
            keywords: vec![],
            platforms,
            posts,
        }
    }

    fn post(platform: Platform, url: &str) -> PostTarget {
        PostTarget {
            platform,
            url: url.to_string(),
        }
    }

    fn file() -> SubjectsFile {
        SubjectsFile {
            subjects: vec![
                subject(
                    "陳零九",
                    vec![Platform::Dcard],
                    vec![post(Platform::Facebook, "https://www.facebook.com/p/1")],
                ),
                subject("書偉", vec![Platform::Dcard], vec![]),
            ],
            shared_posts: vec![post(Platform::Threads, "https://www.threads.net/@x/post/1")],
            ..SubjectsFile::default()
        }
    }

    #[test]
    fn listings_come_before_posts_in_subject_order() {
        let plan = build_plan(&file(), &PlanFilter::default());
        assert_eq!(plan.subjects.len(), 2);
        let first = &plan.subjects[0];
        assert!(matches!(first.targets[0], HarvestTarget::Listing { platform: Platform::Dcard, .. }));
        assert!(first.targets[0].url().starts_with("https://www.dcard.tw/search?query="));
        assert_eq!(first.targets[1].url(), "https://www.facebook.com/p/1");
        assert_eq!(plan.target_count(), 4);
    }

    #[test]
    fn subject_filter_is_case_insensitive() {
        let mut f = file();
        f.subjects.push(subject("Kunda", vec![Platform::Dcard], vec![]));
        let plan = build_plan(
            &f,
            &PlanFilter {
                subject: Some("kunda".to_string()),
                platform: None,
            },
        );
        assert_eq!(plan.subjects.len(), 1);
        assert_eq!(plan.subjects[0].label, "Kunda");
        assert_eq!(plan.shared_posts.len(), 1);
    }

    #[test]
    fn unknown_subject_filter_yields_empty_plan() {
        let plan = build_plan(
            &file(),
            &PlanFilter {
                subject: Some("nobody".to_string()),
                platform: None,
            },
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn platform_filter_applies_to_listings_posts_and_shared_posts() {
        let plan = build_plan(
            &file(),
            &PlanFilter {
                subject: None,
                platform: Some(Platform::Facebook),
            },
        );
        assert_eq!(plan.subjects[0].targets.len(), 1);
        assert!(plan.subjects[1].targets.is_empty());
        assert!(plan.shared_posts.is_empty());
    }

    #[test]
    fn router_covers_kept_subjects_only() {
        let plan = build_plan(
            &file(),
            &PlanFilter {
                subject: Some("書偉".to_string()),
                platform: None,
            },
        );
        assert_eq!(plan.router.route("陳零九和書偉"), vec!["書偉"]);
    }
}
