//! Built-in per-platform harvesting profiles.
//!
//! One control flow drives every platform; the differences live here as
//! data: where content blocks are, which extraction strategies to try in
//! what order, which controls reveal hidden content, and what noise to strip
//! from free text.

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use talkscan_core::Platform;

use crate::session::Selector;

/// Named extraction strategy, tried per content block in profile order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// A machine-readable time element plus author/body selectors.
    StructuredTime,
    /// Author/body located by class or attribute patterns.
    ClassPattern,
    /// Line-based scan of the block's rendered text.
    FreeText,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::StructuredTime => write!(f, "structured_time"),
            Strategy::ClassPattern => write!(f, "class_pattern"),
            Strategy::FreeText => write!(f, "free_text"),
        }
    }
}

/// Selectors evaluated inside one content block.
#[derive(Debug, Clone, Default)]
pub struct FieldSelectors {
    /// Element carrying a machine-readable timestamp.
    pub time: Option<Selector>,
    /// Attribute on `time` holding the machine-readable value.
    pub time_attr: &'static str,
    /// Elements whose text is a human-readable date.
    pub time_text: Vec<Selector>,
    pub author: Vec<Selector>,
    pub body: Vec<Selector>,
    /// Anchor whose `href` is the block's permalink.
    pub permalink: Option<Selector>,
    /// Attribute on the block itself holding a platform id.
    pub id_attr: Option<&'static str>,
}

/// Where content blocks live on a page and how to read them.
#[derive(Debug, Clone)]
pub struct BlockProfile {
    pub blocks: Vec<Selector>,
    pub strategies: Vec<Strategy>,
    pub fields: FieldSelectors,
}

/// The post itself on a detail page, ahead of its comment thread.
#[derive(Debug, Clone)]
pub struct PostSelectors {
    pub title: Option<Selector>,
    pub body: Vec<Selector>,
}

/// Lines stripped by the free-text strategy.
#[derive(Debug, Clone, Copy)]
pub struct NoiseLines {
    /// Badge lines that may precede the author ("Top fan").
    pub badges: &'static [&'static str],
    /// Suffixes marking a whole line as decoration ("的大頭貼照").
    pub badge_suffixes: &'static [&'static str],
    /// Action and metadata lines trailing the body ("Reply").
    pub trailers: &'static [&'static str],
}

#[derive(Debug, Clone)]
pub struct PlatformProfile {
    pub platform: Platform,
    search_url_template: Option<&'static str>,
    /// Present once a listing has rendered its first results.
    pub listing_ready: Selector,
    /// Present once a detail page has rendered.
    pub detail_ready: Selector,
    pub listing: Option<BlockProfile>,
    pub detail: BlockProfile,
    pub detail_post: Option<PostSelectors>,
    pub reveal_controls: Vec<Selector>,
    pub trigger_phrases: Vec<String>,
    pub noise: NoiseLines,
}

const COMMON_BADGES: &[&str] = &[
    "Top fan", "頭號粉絲", "頂級粉絲", "Author", "作者", "原PO", "Follow", "追蹤",
];

const COMMON_TRAILERS: &[&str] = &[
    "Like", "Reply", "Share", "Edited", "See translation", "Hide", "讚", "回覆", "回复",
    "分享", "已編輯", "已编辑", "查看翻譯", "隱藏", "Liked by author", "作者已按讚",
];

const NOISE: NoiseLines = NoiseLines {
    badges: COMMON_BADGES,
    badge_suffixes: &[],
    trailers: COMMON_TRAILERS,
};

fn phrases(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| (*p).to_string()).collect()
}

impl PlatformProfile {
    /// The built-in profile for `platform`.
    #[must_use]
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Dcard => Self::dcard(),
            Platform::Facebook => Self::facebook(),
            Platform::Instagram => Self::instagram(),
            Platform::Threads => Self::threads(),
        }
    }

    /// Search listing URL for `query`, `None` for platforms without search.
    #[must_use]
    pub fn search_url(&self, query: &str) -> Option<String> {
        let template = self.search_url_template?;
        let encoded = utf8_percent_encode(query.trim(), NON_ALPHANUMERIC).to_string();
        Some(template.replace("{query}", &encoded))
    }

    /// Append `extra` to the built-in trigger phrases, skipping duplicates.
    #[must_use]
    pub fn with_extra_phrases(mut self, extra: &[String]) -> Self {
        for phrase in extra {
            if !self.trigger_phrases.iter().any(|p| p == phrase) {
                self.trigger_phrases.push(phrase.clone());
            }
        }
        self
    }

    fn dcard() -> Self {
        let card_link = r#".//a[contains(@href, "/f/") and contains(@href, "/p/")]"#;
        Self {
            platform: Platform::Dcard,
            search_url_template: Some("https://www.dcard.tw/search?query={query}&sort=latest"),
            listing_ready: Selector::xpath(r#"//a[contains(@href, "/f/")]"#),
            detail_ready: Selector::xpath("//h1"),
            listing: Some(BlockProfile {
                blocks: vec![Selector::xpath(
                    r#"//a[contains(@href, "/f/") and contains(@href, "/p/")]/.."#,
                )],
                strategies: vec![Strategy::StructuredTime, Strategy::ClassPattern, Strategy::FreeText],
                fields: FieldSelectors {
                    time: Some(Selector::xpath(".//time")),
                    time_attr: "datetime",
                    time_text: vec![Selector::xpath(
                        r#".//span[contains(@class, "date")] | .//span[contains(text(), "月") or contains(text(), "小時")]"#,
                    )],
                    author: vec![Selector::xpath(r#".//div[contains(@class, "author")]"#)],
                    body: vec![Selector::xpath(".//h2"), Selector::xpath(card_link)],
                    permalink: Some(Selector::xpath(card_link)),
                    id_attr: None,
                },
            }),
            detail: BlockProfile {
                blocks: vec![Selector::xpath(r#"//div[contains(@id, "comment-")]"#)],
                strategies: vec![Strategy::StructuredTime, Strategy::ClassPattern, Strategy::FreeText],
                fields: FieldSelectors {
                    time: Some(Selector::xpath(".//time")),
                    time_attr: "datetime",
                    time_text: vec![],
                    author: vec![Selector::xpath(r#".//div[contains(@class, "author")]//span"#)],
                    body: vec![Selector::xpath(".//div[@class=\"d_xa_34 d_xj_2v c1ehvwc9\"]/span")],
                    permalink: None,
                    id_attr: Some("id"),
                },
            },
            detail_post: Some(PostSelectors {
                title: Some(Selector::xpath("//h1")),
                body: vec![
                    Selector::xpath(
                        r#"//div[contains(@class, "c04j7q-0")] | //article//div[contains(@class, "phqjxq-0")]"#,
                    ),
                    Selector::xpath("//article"),
                ],
            }),
            reveal_controls: vec![Selector::xpath("//button")],
            trigger_phrases: phrases(&["查看更多留言", "更多留言", "載入更多", "Load more"]),
            noise: NOISE,
        }
    }

    fn facebook() -> Self {
        Self {
            platform: Platform::Facebook,
            search_url_template: None,
            listing_ready: Selector::xpath("//div[@role='article']"),
            detail_ready: Selector::xpath("//div[@role='article']"),
            listing: None,
            detail: BlockProfile {
                blocks: vec![Selector::xpath("//div[@role='article' and .//div[@dir='auto']]")],
                strategies: vec![Strategy::StructuredTime, Strategy::ClassPattern, Strategy::FreeText],
                fields: FieldSelectors {
                    time: Some(Selector::xpath(".//abbr[@data-utime]")),
                    time_attr: "data-utime",
                    time_text: vec![Selector::xpath(".//a[contains(@href,'comment_id')]")],
                    author: vec![Selector::xpath(".//strong//span")],
                    body: vec![Selector::xpath(".//div[@dir='auto']")],
                    permalink: Some(Selector::xpath(".//a[contains(@href,'comment_id')]")),
                    id_attr: None,
                },
            },
            detail_post: None,
            reveal_controls: vec![Selector::xpath("//div[@role='button']")],
            trigger_phrases: phrases(&[
                "則回覆", "条回复", "更多留言", "查看之前的留言", "查看更多", "查看其他",
                "View more", "View previous", "See more",
            ]),
            noise: NOISE,
        }
    }

    fn instagram() -> Self {
        Self {
            platform: Platform::Instagram,
            search_url_template: None,
            listing_ready: Selector::css("article"),
            detail_ready: Selector::css("article"),
            listing: None,
            detail: BlockProfile {
                blocks: vec![
                    Selector::css("ul[class*='x78zum5'] li"),
                    Selector::xpath("//div[@data-comment-id]"),
                ],
                strategies: vec![Strategy::StructuredTime, Strategy::ClassPattern, Strategy::FreeText],
                fields: FieldSelectors {
                    time: Some(Selector::css("time")),
                    time_attr: "datetime",
                    time_text: vec![],
                    author: vec![Selector::css("h3 a"), Selector::css("span[class*='_ap3a']")],
                    body: vec![Selector::css("span[dir='auto']")],
                    permalink: Some(Selector::css("a[href*='/c/']")),
                    id_attr: Some("data-comment-id"),
                },
            },
            detail_post: Some(PostSelectors {
                title: None,
                body: vec![Selector::css("h1")],
            }),
            reveal_controls: vec![
                Selector::css("button"),
                Selector::css("div[role='button']"),
            ],
            trigger_phrases: phrases(&[
                "View all", "View replies", "Load more", "more comments", "查看全部", "查看回覆",
                "顯示更多", "載入更多",
            ]),
            noise: NoiseLines {
                badges: COMMON_BADGES,
                badge_suffixes: &["的大頭貼照", "'s profile picture"],
                trailers: COMMON_TRAILERS,
            },
        }
    }

    fn threads() -> Self {
        Self {
            platform: Platform::Threads,
            search_url_template: None,
            listing_ready: Selector::css("div[data-pressable-container='true']"),
            detail_ready: Selector::css("div[data-pressable-container='true']"),
            listing: None,
            detail: BlockProfile {
                blocks: vec![
                    Selector::css("div[role='article']"),
                    Selector::css("div[data-pressable-container='true']"),
                ],
                strategies: vec![Strategy::StructuredTime, Strategy::ClassPattern, Strategy::FreeText],
                fields: FieldSelectors {
                    time: Some(Selector::css("time")),
                    time_attr: "datetime",
                    time_text: vec![],
                    author: vec![Selector::css("span strong")],
                    body: vec![Selector::css("div[dir='auto']")],
                    permalink: Some(Selector::css("a[href*='/post/']")),
                    id_attr: None,
                },
            },
            detail_post: Some(PostSelectors {
                title: None,
                body: vec![Selector::css("article div[dir='auto']")],
            }),
            reveal_controls: vec![
                Selector::css("button"),
                Selector::css("div[role='button']"),
            ],
            trigger_phrases: phrases(&[
                "View replies", "查看回覆", "Show all", "查看全部", "Show more", "顯示更多",
                "See more", "查看更多",
            ]),
            noise: NOISE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_dcard_has_a_search_url() {
        for platform in Platform::ALL {
            let profile = PlatformProfile::for_platform(platform);
            assert_eq!(profile.search_url("x").is_some(), platform.has_search_listing());
            assert_eq!(profile.listing.is_some(), platform.has_search_listing());
            assert_eq!(profile.platform, platform);
        }
    }

    #[test]
    fn search_url_percent_encodes_query() {
        let url = PlatformProfile::for_platform(Platform::Dcard)
            .search_url("陳零九")
            .unwrap();
        assert_eq!(
            url,
            "https://www.dcard.tw/search?query=%E9%99%B3%E9%9B%B6%E4%B9%9D&sort=latest"
        );
    }

    #[test]
    fn extra_phrases_are_appended_once() {
        let profile = PlatformProfile::for_platform(Platform::Threads)
            .with_extra_phrases(&["Load more".to_string(), "顯示更多".to_string()]);
        let count = |p: &str| profile.trigger_phrases.iter().filter(|t| *t == p).count();
        assert_eq!(count("Load more"), 1);
        assert_eq!(count("顯示更多"), 1);
    }

    #[test]
    fn every_profile_prefers_structured_signals() {
        for platform in Platform::ALL {
            let profile = PlatformProfile::for_platform(platform);
            assert_eq!(profile.detail.strategies.first(), Some(&Strategy::StructuredTime));
            assert_eq!(profile.detail.strategies.last(), Some(&Strategy::FreeText));
        }
    }
}
