//! Handlers for `talkscan subjects`.

use std::fmt::Write as _;

use talkscan_core::{AppConfig, SubjectsFile};

/// Load the subjects file and report whether it is valid.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub(crate) fn validate_subjects(config: &AppConfig) -> anyhow::Result<()> {
    let file = talkscan_core::load_subjects(&config.subjects_path)?;
    println!(
        "{}: {} subjects, {} shared posts, ok",
        config.subjects_path.display(),
        file.subjects.len(),
        file.shared_posts.len()
    );
    Ok(())
}

/// Print every subject with its window and sources.
///
/// # Errors
///
/// Returns an error if the subjects file is invalid.
pub(crate) fn list_subjects(config: &AppConfig) -> anyhow::Result<()> {
    let file = talkscan_core::load_subjects(&config.subjects_path)?;
    print!("{}", format_subjects(&file));
    Ok(())
}

fn format_subjects(file: &SubjectsFile) -> String {
    let mut out = String::new();
    for subject in &file.subjects {
        let platforms: Vec<String> = subject.platforms.iter().map(ToString::to_string).collect();
        let _ = writeln!(
            out,
            "{}  {} .. {}  listings: [{}]  posts: {}  keywords: [{}]",
            subject.label,
            subject.start_date,
            subject.end_date,
            platforms.join(", "),
            subject.posts.len(),
            subject.match_terms().join(", ")
        );
    }
    if !file.shared_posts.is_empty() {
        let _ = writeln!(out, "shared posts: {}", file.shared_posts.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use talkscan_core::{Platform, SubjectConfig};

    use super::*;

    #[test]
    fn lists_windows_sources_and_keywords() {
        let file = SubjectsFile {
            subjects: vec![SubjectConfig {
                label: "修杰楷".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 10, 21).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 10, 28).unwrap(),
                keywords: vec!["修杰楷".to_string(), "修爸".to_string()],
                platforms: vec![Platform::Dcard],
                posts: vec![],
            }],
            ..SubjectsFile::default()
        };
        assert_eq!(
            format_subjects(&file),
            "修杰楷  2025-10-21 .. 2025-10-28  listings: [dcard]  posts: 0  keywords: [修杰楷, 修爸]\n"
        );
    }

    #[test]
    fn label_is_the_default_keyword() {
        let file = SubjectsFile {
            subjects: vec![SubjectConfig {
                label: "Kunda".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 10, 21).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 10, 21).unwrap(),
                keywords: vec![],
                platforms: vec![],
                posts: vec![],
            }],
            ..SubjectsFile::default()
        };
        assert!(format_subjects(&file).ends_with("keywords: [Kunda]\n"));
    }
}
