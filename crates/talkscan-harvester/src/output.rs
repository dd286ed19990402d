//! Result document and record-by-record journal.
//!
//! The document maps each subject label to its records in first-seen order
//! and is written atomically through a temporary sibling file. The journal is
//! NDJSON flushed after every record, so a crash loses at most the line in
//! flight.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::ser::{Serialize, SerializeMap, Serializer};
use talkscan_core::Record;

use crate::error::HarvestError;

/// Records per subject, in subject order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestDocument {
    subjects: Vec<(String, Vec<Record>)>,
}

impl HarvestDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `label` appears in the document even with no records.
    pub fn ensure_subject(&mut self, label: &str) {
        if !self.subjects.iter().any(|(l, _)| l == label) {
            self.subjects.push((label.to_string(), Vec::new()));
        }
    }

    pub fn push(&mut self, label: &str, record: Record) {
        self.ensure_subject(label);
        if let Some((_, records)) = self.subjects.iter_mut().find(|(l, _)| l == label) {
            records.push(record);
        }
    }

    #[must_use]
    pub fn records(&self, label: &str) -> &[Record] {
        self.subjects
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, records)| records.as_slice())
            .unwrap_or_default()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.subjects.iter().map(|(l, _)| l.as_str())
    }

    #[must_use]
    pub fn total_records(&self) -> usize {
        self.subjects.iter().map(|(_, r)| r.len()).sum()
    }
}

impl Serialize for HarvestDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.subjects.len()))?;
        for (label, records) in &self.subjects {
            map.serialize_entry(label, records)?;
        }
        map.end()
    }
}

/// Write `document` to `path` as pretty UTF-8 JSON.
///
/// The bytes go to `<path>.tmp` first and are renamed into place, so `path`
/// never holds a half-written document.
///
/// # Errors
///
/// Returns an error if serialization or any filesystem step fails.
pub fn write_document(path: &Path, document: &HarvestDocument) -> Result<(), HarvestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(document)?;

    let tmp = tmp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;

    tracing::info!(
        path = %path.display(),
        records = document.total_records(),
        "wrote harvest document"
    );
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[derive(serde::Serialize)]
struct JournalLine<'a> {
    subject: &'a str,
    record: &'a Record,
}

/// Append-only NDJSON log of accepted records.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Journal {
    /// Open `path` for appending, creating it and its parent directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn append(&mut self, subject: &str, record: &Record) -> Result<(), HarvestError> {
        serde_json::to_writer(&mut self.writer, &JournalLine { subject, record })?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
