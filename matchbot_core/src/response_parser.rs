//! Oracle Response Parser
//!
//! Turns the oracle's free-form answer into a [`Verdict`]. The expected
//! protocol is three labelled fields:
//!
//! ```text
//! NAME: <person name>
//! EXPERIENCE: YES|NO
//! SUMMARY: <free text, may span lines>
//! ```
//!
//! Parsing never fails. Any field that cannot be found falls back to its
//! default and the outcome is reported as [`ParseOutcome::Degraded`].

use crate::types::{Verdict, DEFAULT_NAME, DEFAULT_SUMMARY};
use once_cell::sync::Lazy;
use regex::Regex;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"NAME:[ \t]*([^\r\n]+)").unwrap());

static EXPERIENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"EXPERIENCE:\s*(?i:(yes|no))\b").unwrap());

static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"SUMMARY:").unwrap());

// A summary runs until the next line that opens another protocol field.
static NEXT_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:NAME|EXPERIENCE):").unwrap());

/// Protocol fields, used to report what was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Experience,
    Summary,
}

/// Result of parsing one oracle answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// All three fields were found
    Parsed(Verdict),
    /// At least one field fell back to its default
    Degraded { verdict: Verdict, missing: Vec<Field> },
}

impl ParseOutcome {
    pub fn verdict(&self) -> &Verdict {
        match self {
            ParseOutcome::Parsed(v) => v,
            ParseOutcome::Degraded { verdict, .. } => verdict,
        }
    }

    pub fn into_verdict(self) -> Verdict {
        match self {
            ParseOutcome::Parsed(v) => v,
            ParseOutcome::Degraded { verdict, .. } => verdict,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ParseOutcome::Degraded { .. })
    }

    /// Fields that fell back to defaults (empty when fully parsed)
    pub fn missing(&self) -> &[Field] {
        match self {
            ParseOutcome::Parsed(_) => &[],
            ParseOutcome::Degraded { missing, .. } => missing,
        }
    }
}

/// Parses an oracle answer. Each label is searched across the whole text,
/// so field order does not matter.
pub fn parse_response(raw: &str) -> ParseOutcome {
    let mut missing = Vec::new();

    let person_name = match extract_name(raw) {
        Some(name) => name,
        None => {
            missing.push(Field::Name);
            DEFAULT_NAME.to_string()
        }
    };

    let has_relevant_experience = match extract_experience(raw) {
        Some(flag) => flag,
        None => {
            missing.push(Field::Experience);
            false
        }
    };

    let summary = match extract_summary(raw) {
        Some(summary) => summary,
        None => {
            missing.push(Field::Summary);
            DEFAULT_SUMMARY.to_string()
        }
    };

    let verdict = Verdict {
        person_name,
        has_relevant_experience,
        summary,
    };

    if missing.is_empty() {
        ParseOutcome::Parsed(verdict)
    } else {
        log::debug!("[parser] Degraded parse, missing fields: {:?}", missing);
        ParseOutcome::Degraded { verdict, missing }
    }
}

fn extract_name(raw: &str) -> Option<String> {
    let caps = NAME_RE.captures(raw)?;
    let name = caps.get(1)?.as_str().trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn extract_experience(raw: &str) -> Option<bool> {
    let caps = EXPERIENCE_RE.captures(raw)?;
    Some(caps.get(1)?.as_str().eq_ignore_ascii_case("yes"))
}

fn extract_summary(raw: &str) -> Option<String> {
    let label = SUMMARY_RE.find(raw)?;
    let rest = &raw[label.end()..];
    let body = match NEXT_LABEL_RE.find(rest) {
        Some(next) => &rest[..next.start()],
        None => rest,
    };
    let summary = body.trim();
    if summary.is_empty() {
        None
    } else {
        Some(summary.to_string())
    }
}
