//! Append-only candidate log.
//!
//! Each record is a block framed by separator lines:
//!
//! ```text
//! ============================================================
//! Date: 2025-01-31 14:02:11
//! Name: Jane Doe
//! URL: https://...
//! Reason: ...
//! ============================================================
//!
//! ```
//!
//! The file is only ever opened in append mode. The running total is
//! recounted from the file after every write, so edits made between runs
//! are picked up without any extra state.

use crate::types::CandidateRecord;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SEPARATOR_CHAR: char = '=';
pub const SEPARATOR_WIDTH: usize = 60;
pub const NAME_LABEL: &str = "Name:";
pub const DEFAULT_LOG_PATH: &str = "recommended_candidates.txt";

/// The 60-character line framing each record.
pub fn separator() -> String {
    SEPARATOR_CHAR.to_string().repeat(SEPARATOR_WIDTH)
}

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Log file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct CandidateLog {
    path: PathBuf,
}

impl CandidateLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renders one record as a log block.
    pub fn format_record(record: &CandidateRecord) -> String {
        let sep = separator();
        format!(
            "{sep}\nDate: {}\nName: {}\nURL: {}\nReason: {}\n{sep}\n\n",
            record.timestamp, record.person_name, record.source_location, record.summary
        )
    }

    /// Appends `record` and returns the cumulative number of candidates in the file.
    pub fn append(&self, record: &CandidateRecord) -> Result<usize, LogError> {
        let block = Self::format_record(record);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(block.as_bytes())
            .map_err(|e| self.io_error(e))?;
        file.flush().map_err(|e| self.io_error(e))?;

        log::info!(
            "[log] Saved {} to {}",
            record.person_name,
            self.path.display()
        );

        let total = self.count()?;
        log::info!("[log] Total candidates saved: {}", total);
        Ok(total)
    }

    /// Number of lines starting with `Name:`. A missing file holds zero.
    ///
    /// Works on raw bytes, so text edited in another encoding still counts.
    pub fn count(&self) -> Result<usize, LogError> {
        let contents = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(self.io_error(e)),
        };

        Ok(contents
            .split(|b| *b == b'\n')
            .filter(|line| line.starts_with(NAME_LABEL.as_bytes()))
            .count())
    }

    fn io_error(&self, source: std::io::Error) -> LogError {
        LogError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
