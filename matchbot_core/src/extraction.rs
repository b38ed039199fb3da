//! Profile extraction from the page currently displayed.

use crate::browser::{BrowserError, BrowsingSession, Locator};
use crate::types::ProfileSnapshot;
use std::time::Duration;
use thiserror::Error;

/// XPath of the profile body on the cofounder-matching page.
pub const DEFAULT_PROFILE_XPATH: &str = "/html/body/div/div[2]/div[2]/div/div/div[1]/div[1]";

pub const DEFAULT_ELEMENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Profile content did not appear within {0:?}")]
    Timeout(Duration),

    #[error("Profile content was empty")]
    Empty,

    #[error("Browser error during extraction: {0}")]
    Browser(#[source] BrowserError),
}

impl From<BrowserError> for ExtractionError {
    fn from(e: BrowserError) -> Self {
        match e {
            BrowserError::Timeout { timeout, .. } => ExtractionError::Timeout(timeout),
            other => ExtractionError::Browser(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileExtractor {
    profile_locator: Locator,
    timeout: Duration,
}

impl Default for ProfileExtractor {
    fn default() -> Self {
        Self::new(Locator::xpath(DEFAULT_PROFILE_XPATH), DEFAULT_ELEMENT_TIMEOUT)
    }
}

impl ProfileExtractor {
    pub fn new(profile_locator: Locator, timeout: Duration) -> Self {
        Self {
            profile_locator,
            timeout,
        }
    }

    /// Waits for the profile body and captures its text with the current location.
    pub async fn extract<B: BrowsingSession + ?Sized>(
        &self,
        browser: &mut B,
    ) -> Result<ProfileSnapshot, ExtractionError> {
        log::info!("[extract] Waiting for profile content...");
        let raw_text = browser
            .wait_for_text(&self.profile_locator, self.timeout)
            .await?;

        if raw_text.trim().is_empty() {
            return Err(ExtractionError::Empty);
        }

        let location = self.location(browser).await?;
        log::info!(
            "[extract] Extracted {} characters from {}",
            raw_text.chars().count(),
            location
        );
        log::debug!(
            "[extract] First 200 chars: {}",
            raw_text.chars().take(200).collect::<String>()
        );

        Ok(ProfileSnapshot { raw_text, location })
    }

    /// Current location identifier. Does not wait.
    pub async fn location<B: BrowsingSession + ?Sized>(
        &self,
        browser: &mut B,
    ) -> Result<String, ExtractionError> {
        Ok(browser.current_location().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MockBrowser;

    #[tokio::test]
    async fn test_extract_snapshot() {
        let mut browser = MockBrowser::new("https://example.test/p/7").with_page("Jane Doe\nRobotics");
        let snapshot = ProfileExtractor::default().extract(&mut browser).await.unwrap();
        assert_eq!(snapshot.raw_text, "Jane Doe\nRobotics");
        assert_eq!(snapshot.location, "https://example.test/p/7");
    }

    #[tokio::test]
    async fn test_extract_timeout_maps_to_extraction_timeout() {
        let mut browser = MockBrowser::new("u").with_missing_page();
        let err = ProfileExtractor::default().extract(&mut browser).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Timeout(d) if d == DEFAULT_ELEMENT_TIMEOUT));
    }

    #[tokio::test]
    async fn test_extract_whitespace_only_is_empty() {
        let mut browser = MockBrowser::new("u").with_page("  \n\t ");
        let err = ProfileExtractor::default().extract(&mut browser).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Empty));
    }
}
