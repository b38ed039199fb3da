use serde::{Deserialize, Serialize};

/// Text and location of the profile currently on screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileSnapshot {
    pub raw_text: String,
    pub location: String,
}

/// Outcome of classifying one profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub person_name: String,
    pub has_relevant_experience: bool,
    pub summary: String,
}

impl Default for Verdict {
    fn default() -> Self {
        Self {
            person_name: DEFAULT_NAME.to_string(),
            has_relevant_experience: false,
            summary: DEFAULT_SUMMARY.to_string(),
        }
    }
}

pub const DEFAULT_NAME: &str = "Unknown";
pub const DEFAULT_SUMMARY: &str = "No summary available";

/// A matched candidate as written to the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Local time, `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    pub person_name: String,
    pub source_location: String,
    pub summary: String,
}

impl CandidateRecord {
    pub const TIMESTAMP_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    /// Builds a record stamped with the current local time.
    pub fn now(verdict: &Verdict, source_location: &str) -> Self {
        Self {
            timestamp: chrono::Local::now()
                .format(Self::TIMESTAMP_FORMAT)
                .to_string(),
            person_name: verdict.person_name.clone(),
            source_location: source_location.to_string(),
            summary: verdict.summary.clone(),
        }
    }
}

/// How the session moves from one profile to the next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Advance automatically after a short pause
    #[default]
    Autonomous,
    /// Ask the operator before every advance
    Confirmed,
}

/// Operator answer at the per-profile confirmation point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Quit,
    Cancel,
}

/// Counters kept for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Incremented at loop entry, before extraction is known to succeed
    pub profiles_visited: u64,
    /// Profiles that were actually classified
    pub profiles_analyzed: u64,
    /// Profiles abandoned because no content could be extracted
    pub profiles_skipped: u64,
    /// Records appended during this run
    pub candidates_saved: u64,
    /// Last cumulative count reported by the log writer
    pub log_total: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_default_matches_fallbacks() {
        let v = Verdict::default();
        assert_eq!(v.person_name, "Unknown");
        assert!(!v.has_relevant_experience);
        assert_eq!(v.summary, "No summary available");
    }

    #[test]
    fn test_candidate_record_timestamp_shape() {
        let verdict = Verdict {
            person_name: "Jane Doe".to_string(),
            has_relevant_experience: true,
            summary: "Surgical robotics thesis".to_string(),
        };
        let record = CandidateRecord::now(&verdict, "https://example.test/p/1");

        assert_eq!(record.person_name, "Jane Doe");
        assert_eq!(record.source_location, "https://example.test/p/1");
        assert!(
            chrono::NaiveDateTime::parse_from_str(
                &record.timestamp,
                CandidateRecord::TIMESTAMP_FORMAT
            )
            .is_ok(),
            "unexpected timestamp {}",
            record.timestamp
        );
    }

    #[test]
    fn test_session_mode_yaml_names() {
        let mode: SessionMode = serde_yaml::from_str("confirmed").unwrap();
        assert_eq!(mode, SessionMode::Confirmed);
        assert_eq!(SessionMode::default(), SessionMode::Autonomous);
    }
}
