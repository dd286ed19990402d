//! Routes shared-post comments to the subjects they mention.

use talkscan_core::SubjectConfig;

/// Match terms per subject label, in subject order.
#[derive(Debug, Clone)]
pub struct SubjectRouter {
    routes: Vec<(String, Vec<String>)>,
}

impl SubjectRouter {
    #[must_use]
    pub fn new(subjects: &[SubjectConfig]) -> Self {
        let routes = subjects
            .iter()
            .map(|s| {
                let mut terms: Vec<String> = s
                    .match_terms()
                    .iter()
                    .map(|t| normalize_text_for_match(t))
                    .filter(|t| !t.is_empty())
                    .collect();
                terms.sort();
                terms.dedup();
                (s.label.clone(), terms)
            })
            .collect();
        Self { routes }
    }

    /// Labels of every subject whose terms `text` mentions.
    #[must_use]
    pub fn route(&self, text: &str) -> Vec<&str> {
        self.routes
            .iter()
            .filter(|(_, terms)| mentions_subject(text, terms))
            .map(|(label, _)| label.as_str())
            .collect()
    }
}

/// Whether `text` mentions any of the normalized `terms`.
///
/// Terms written in a CJK script match as substrings, since those scripts do
/// not separate words with spaces. Other terms must match whole words.
pub(crate) fn mentions_subject(text: &str, terms: &[String]) -> bool {
    let normalized = normalize_text_for_match(text);
    let padded = format!(" {normalized} ");
    let compact = normalized.replace(' ', "");
    terms.iter().any(|term| {
        if term.chars().any(is_cjk) {
            return compact.contains(&term.replace(' ', ""));
        }
        if term.chars().count() < 2 {
            return false;
        }
        padded.contains(&format!(" {term} "))
    })
}

fn normalize_text_for_match(input: &str) -> String {
    input
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_cjk(ch: char) -> bool {
    matches!(ch,
        '\u{3040}'..='\u{30FF}'   // kana
        | '\u{3400}'..='\u{4DBF}' // ext A
        | '\u{4E00}'..='\u{9FFF}' // unified ideographs
        | '\u{AC00}'..='\u{D7AF}' // hangul
        | '\u{F900}'..='\u{FAFF}')
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use talkscan_core::Platform;

    use super::*;

    fn subject(label: &str, keywords: &[&str]) -> SubjectConfig {
        SubjectConfig {
            label: label.to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 10, 21).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 10, 28).unwrap(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            platforms: vec![Platform::Dcard],
            posts: vec![],
        }
    }

    #[test]
    fn cjk_terms_match_inside_running_text() {
        let router = SubjectRouter::new(&[subject("坤達", &[]), subject("修杰楷", &["修杰楷", "修爸"])]);
        assert_eq!(router.route("坤達加油！！"), vec!["坤達"]);
        assert_eq!(router.route("修爸好帥"), vec!["修杰楷"]);
        assert_eq!(router.route("坤達和修杰楷都要加油"), vec!["坤達", "修杰楷"]);
        assert!(router.route("今天天氣不錯").is_empty());
    }

    #[test]
    fn latin_terms_match_whole_words_only() {
        let router = SubjectRouter::new(&[subject("Ada", &["Ada", "A-Da"])]);
        assert_eq!(router.route("go ADA!"), vec!["Ada"]);
        assert_eq!(router.route("a da fan here"), vec!["Ada"]);
        assert!(router.route("Canada rocks").is_empty());
    }

    #[test]
    fn single_letter_latin_terms_never_match() {
        assert!(!mentions_subject("a b c", &["a".to_string()]));
    }
}
