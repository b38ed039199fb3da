//! Line-wrapping formatter for the candidate log.
//!
//! Breaks long lines after a fixed number of words while keeping the record
//! layout readable: blank lines and separator lines pass through untouched,
//! and `Date:`/`Name:`/`URL:`/`Reason:` lines keep their label on the first
//! wrapped line.

use crate::candidate_log::separator;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

pub const DEFAULT_WORDS_PER_LINE: usize = 15;
pub const DEFAULT_OUTPUT_PATH: &str = "formatted_candidates.txt";

const HEADERS: [&str; 4] = ["Date:", "Name:", "URL:", "Reason:"];

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Could not read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Words per line must be at least 1")]
    InvalidWidth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatReport {
    pub input_words: usize,
    pub output_lines: usize,
}

/// Reformats `text`, wrapping after `words_per_line` words.
pub fn format_text(text: &str, words_per_line: usize) -> String {
    let width = words_per_line.max(1);
    let sep = separator();
    let mut out: Vec<String> = Vec::new();

    for line in text.split('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == sep {
            out.push(line.to_string());
            continue;
        }

        if HEADERS.iter().any(|h| line.starts_with(h)) {
            // Labels all end with ':' so the first colon closes the label
            let (label, content) = line.split_once(':').unwrap_or((line, ""));
            let chunks = chunk_words(content, width);
            match chunks.split_first() {
                Some((first, rest)) => {
                    out.push(format!("{}: {}", label, first));
                    out.extend(rest.iter().cloned());
                }
                None => out.push(line.to_string()),
            }
            continue;
        }

        if line.split_whitespace().count() > width {
            out.extend(chunk_words(line, width));
        } else {
            out.push(line.to_string());
        }
    }

    out.join("\n")
}

fn chunk_words(text: &str, width: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words.chunks(width).map(|c| c.join(" ")).collect()
}

/// Formats `input` into `output`.
///
/// The input is read completely before anything is written, and the output
/// is written through a temporary file that replaces `output` in one rename.
pub fn format_file(
    input: &Path,
    output: &Path,
    words_per_line: usize,
) -> Result<FormatReport, FormatError> {
    if words_per_line == 0 {
        return Err(FormatError::InvalidWidth);
    }

    let content = std::fs::read_to_string(input).map_err(|source| FormatError::Read {
        path: input.to_path_buf(),
        source,
    })?;

    let formatted = format_text(&content, words_per_line);
    write_replacing(output, &formatted)?;

    let report = FormatReport {
        input_words: content.split_whitespace().count(),
        output_lines: formatted.split('\n').count(),
    };
    log::info!(
        "[format] {} -> {}: {} words, {} lines",
        input.display(),
        output.display(),
        report.input_words,
        report.output_lines
    );
    Ok(report)
}

fn write_replacing(path: &Path, content: &str) -> Result<(), FormatError> {
    let write_err = |source: std::io::Error| FormatError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(parent).map_err(write_err)?;
    temp.write_all(content.as_bytes()).map_err(write_err)?;
    temp.flush().map_err(write_err)?;
    temp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
