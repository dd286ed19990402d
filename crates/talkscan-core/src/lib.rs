//! Shared domain types and configuration for talkscan.
//!
//! Holds the harvested [`Record`] model, the per-subject [`ListingWindow`],
//! the YAML subjects file, and the environment-driven [`AppConfig`].

pub mod app_config;
pub mod config;
pub mod record;
pub mod subjects;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use record::{ListingWindow, Platform, Record, RecordKind};
pub use subjects::{load_subjects, PostTarget, SubjectConfig, SubjectsFile};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read subjects file {path}: {source}")]
    SubjectsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse subjects file: {0}")]
    SubjectsFileParse(#[from] serde_yaml::Error),

    #[error("invalid subjects file: {0}")]
    Validation(String),
}
