// Core of the cofounder match bot: profile extraction, LLM classification,
// the session loop and the candidate log.

pub mod types;
pub mod response_parser;
pub mod oracle;
pub mod browser;
pub mod extraction;
pub mod candidate_log;
pub mod operator;
pub mod session;

// Supporting pieces
pub mod config;
pub mod formatter;

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_version() {
        assert_eq!(get_version(), "0.1.0");
    }
}
