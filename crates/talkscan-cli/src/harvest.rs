//! Handler for `talkscan harvest`.
//!
//! Builds the plan from the subjects file, connects the WebDriver session,
//! runs the harvester and writes the result document. A lost session still
//! writes whatever was gathered before the command fails.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use talkscan_core::{AppConfig, Platform};
use talkscan_harvester::{
    build_plan, write_document, CancelToken, HarvestPlan, HarvestSettings, HarvestTarget,
    Harvester, Journal, PlanFilter, WebDriverSession, WebDriverSettings,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct HarvestArgs {
    pub subject: Option<String>,
    pub platform: Option<Platform>,
    pub output: Option<PathBuf>,
    pub journal: Option<PathBuf>,
    pub dry_run: bool,
}

/// Run a full harvest, or print the plan when `args.dry_run` is set.
///
/// # Errors
///
/// Returns an error if the subjects file is invalid, the subject filter
/// matches nothing, the journal cannot be opened, the WebDriver session
/// cannot be established, the
/// document cannot be written, or the run was aborted by a lost session.
pub(crate) async fn run_harvest(config: &AppConfig, args: &HarvestArgs) -> anyhow::Result<()> {
    let file = talkscan_core::load_subjects(&config.subjects_path)?;
    let filter = PlanFilter {
        subject: args.subject.clone(),
        platform: args.platform,
    };
    let plan = build_plan(&file, &filter);

    if let Some(label) = &args.subject {
        if plan.subjects.is_empty() {
            anyhow::bail!(
                "subject '{label}' not found in {}",
                config.subjects_path.display()
            );
        }
    }

    if args.dry_run {
        print!("{}", format_plan(&plan));
        return Ok(());
    }

    if plan.is_empty() {
        println!("nothing to harvest");
        return Ok(());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&config.output_dir, Local::now()));

    // Opened before connecting so a bad path cannot strand a browser.
    let journal = match &args.journal {
        Some(path) => Some(
            Journal::open(path)
                .map_err(|e| anyhow::anyhow!("failed to open journal {}: {e}", path.display()))?,
        ),
        None => None,
    };

    let session = WebDriverSession::connect(&WebDriverSettings {
        endpoint: config.webdriver_url.clone(),
        session_id: config.webdriver_session_id.clone(),
        browser_args: config.browser_args.clone(),
        request_timeout_secs: config.request_timeout_secs,
    })
    .await
    .map_err(|e| anyhow::anyhow!("failed to open WebDriver session at {}: {e}", config.webdriver_url))?;

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after the current page");
                cancel.cancel();
            }
        });
    }

    let mut harvester =
        Harvester::new(session, HarvestSettings::from_config(config)).with_cancel(cancel);
    if let Some(journal) = journal {
        harvester = harvester.with_journal(journal);
    }

    tracing::info!(
        subjects = plan.subjects.len(),
        targets = plan.target_count(),
        output = %output.display(),
        "starting harvest"
    );
    let outcome = harvester.run(&plan).await;
    let written = write_document(&output, &outcome.document);

    if let Err(e) = harvester.into_session().close().await {
        tracing::warn!(error = %e, "failed to close WebDriver session");
    }

    written.map_err(|e| anyhow::anyhow!("failed to write {}: {e}", output.display()))?;
    println!("{}", outcome.summary);
    println!(
        "wrote {} records to {}",
        outcome.document.total_records(),
        output.display()
    );

    if let Some(e) = outcome.error {
        anyhow::bail!("harvest aborted early, partial results written: {e}");
    }
    Ok(())
}

fn default_output_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("harvest-{}.json", now.format("%Y%m%d-%H%M%S")))
}

fn format_plan(plan: &HarvestPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "dry-run: {} subjects, {} targets",
        plan.subjects.len(),
        plan.target_count()
    );
    for subject in &plan.subjects {
        let _ = writeln!(
            out,
            "  {} [{} .. {}]",
            subject.label,
            subject.window.start(),
            subject.window.end()
        );
        for target in &subject.targets {
            let kind = match target {
                HarvestTarget::Listing { .. } => "listing",
                HarvestTarget::Post { .. } => "post",
            };
            let platform = target.platform().to_string();
            let _ = writeln!(out, "    {kind:<7} {platform:<9} {}", target.url());
        }
    }
    for post in &plan.shared_posts {
        let platform = post.platform.to_string();
        let _ = writeln!(out, "  shared  {platform:<9} {}", post.url);
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use talkscan_core::{PostTarget, SubjectConfig, SubjectsFile};

    use super::*;

    fn file() -> SubjectsFile {
        SubjectsFile {
            subjects: vec![SubjectConfig {
                label: "陳零九".to_string(),
                start_date: chrono::NaiveDate::from_ymd_opt(2025, 5, 14).unwrap(),
                end_date: chrono::NaiveDate::from_ymd_opt(2025, 5, 21).unwrap(),
                keywords: vec![],
                platforms: vec![Platform::Dcard],
                posts: vec![PostTarget {
                    platform: Platform::Facebook,
                    url: "https://www.facebook.com/p/1".to_string(),
                }],
            }],
            shared_posts: vec![PostTarget {
                platform: Platform::Threads,
                url: "https://www.threads.net/@x/post/1".to_string(),
            }],
            ..SubjectsFile::default()
        }
    }

    #[test]
    fn default_output_path_is_timestamped() {
        let now = Local.with_ymd_and_hms(2025, 5, 22, 9, 30, 5).unwrap();
        assert_eq!(
            default_output_path(Path::new("./output"), now),
            PathBuf::from("./output/harvest-20250522-093005.json")
        );
    }

    #[test]
    fn plan_listing_shows_every_target() {
        let plan = build_plan(&file(), &PlanFilter::default());
        let text = format_plan(&plan);
        assert!(text.starts_with("dry-run: 1 subjects, 3 targets"));
        assert!(text.contains("陳零九 [2025-05-14 .. 2025-05-21]"));
        assert!(text.contains("listing dcard     https://www.dcard.tw/search?query="));
        assert!(text.contains("post    facebook  https://www.facebook.com/p/1"));
        assert!(text.contains("shared  threads   https://www.threads.net/@x/post/1"));
    }

    #[tokio::test]
    async fn unknown_subject_filter_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subjects.yaml");
        std::fs::write(
            &path,
            "subjects:\n  - label: 陳零九\n    start_date: 2025-05-14\n    end_date: 2025-05-21\n    platforms: [dcard]\n",
        )
        .unwrap();

        let mut config = talkscan_core::load_app_config_from_env().unwrap();
        config.subjects_path = path;
        // Nothing listens here; reaching the connect step would fail differently.
        config.webdriver_url = "http://127.0.0.1:1".to_string();

        let err = run_harvest(
            &config,
            &HarvestArgs {
                subject: Some("nobody".to_string()),
                ..HarvestArgs::default()
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("subject 'nobody' not found"));
    }

    #[tokio::test]
    async fn unwritable_journal_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let subjects = dir.path().join("subjects.yaml");
        std::fs::write(
            &subjects,
            "subjects:\n  - label: 陳零九\n    start_date: 2025-05-14\n    end_date: 2025-05-21\n    platforms: [dcard]\n",
        )
        .unwrap();

        let mut config = talkscan_core::load_app_config_from_env().unwrap();
        config.subjects_path = subjects;
        // Nothing listens here; a connect attempt would report the endpoint instead.
        config.webdriver_url = "http://127.0.0.1:1".to_string();

        // A plain file where the journal's directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let journal = blocker.join("run.ndjson");
        let err = run_harvest(
            &config,
            &HarvestArgs {
                journal: Some(journal),
                ..HarvestArgs::default()
            },
        )
        .await
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("failed to open journal"), "{message}");
        assert!(!message.contains("WebDriver"), "{message}");
    }
}
