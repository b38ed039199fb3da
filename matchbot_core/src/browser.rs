//! Browsing collaborator
//!
//! The session loop only talks to [`BrowsingSession`]. [`ChromeSession`]
//! drives a real Chrome over the DevTools protocol; [`MockBrowser`] replays
//! a script for tests.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    Bounds, GetWindowForTargetParams, SetWindowBoundsParams, WindowState,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How often a pending element is looked up again while waiting for it.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Timed out after {timeout:?} waiting for {locator}")]
    Timeout { locator: Locator, timeout: Duration },

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Browser protocol error: {0}")]
    Protocol(#[from] CdpError),

    #[error("Browser session already closed")]
    Closed,

    #[error("Browser unavailable: {0}")]
    Unavailable(String),
}

/// XPath expression identifying an element on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator(String);

impl Locator {
    pub fn xpath(expr: &str) -> Self {
        Self(expr.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xpath `{}`", self.0)
    }
}

#[async_trait]
pub trait BrowsingSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    async fn maximize(&mut self) -> Result<(), BrowserError>;

    /// Waits until an element matching `locator` exists, then returns its
    /// rendered text.
    async fn wait_for_text(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<String, BrowserError>;

    /// Waits until an element matching `locator` can be clicked, then clicks it.
    async fn click_when_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    /// Current page URL. Does not wait.
    async fn current_location(&mut self) -> Result<String, BrowserError>;

    /// Ends the session. Safe to call more than once.
    async fn terminate(&mut self) -> Result<(), BrowserError>;
}

// ============================================================
// CHROME (DevTools protocol)
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Open,
    Active,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Falls back to `CHROME_BIN`, then to chromiumoxide's own lookup
    pub chrome_executable: Option<PathBuf>,
}

pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    lifecycle: Lifecycle,
}

impl ChromeSession {
    pub async fn launch(options: &LaunchOptions) -> Result<Self, BrowserError> {
        let executable = options
            .chrome_executable
            .clone()
            .or_else(|| std::env::var("CHROME_BIN").ok().map(PathBuf::from));

        let mut builder = BrowserConfig::builder().arg("--start-maximized");
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(ref bin) = executable {
            log::info!(target: "browser", "Using Chrome binary {:?}", bin);
            builder = builder.chrome_executable(bin);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            log::debug!(target: "browser", "DevTools event loop exited.");
        });

        let page = browser.new_page("about:blank").await?;
        log::info!(target: "browser", "Chrome launched (headless={})", options.headless);

        Ok(Self {
            browser: Some(browser),
            page: Some(page),
            handler: Some(handler_task),
            lifecycle: Lifecycle::Open,
        })
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn page(&self) -> Result<&Page, BrowserError> {
        match self.lifecycle {
            Lifecycle::Closing | Lifecycle::Closed => Err(BrowserError::Closed),
            _ => self.page.as_ref().ok_or(BrowserError::Closed),
        }
    }

    async fn is_clickable(element: &Element) -> bool {
        const CHECK: &str =
            "function() { return !this.disabled && this.getClientRects().length > 0; }";
        match element.call_js_fn(CHECK, false).await {
            Ok(ret) => ret
                .result
                .value
                .as_ref()
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            Err(e) => {
                log::debug!(target: "browser", "Clickable check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl BrowsingSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let page = self.page()?;
        page.goto(url).await?;
        self.lifecycle = Lifecycle::Active;
        log::info!(target: "browser", "Navigated to {}", url);
        Ok(())
    }

    async fn maximize(&mut self) -> Result<(), BrowserError> {
        let page = self.page()?;
        let window = page.execute(GetWindowForTargetParams::default()).await?;
        let bounds = Bounds::builder()
            .window_state(WindowState::Maximized)
            .build();
        page.execute(SetWindowBoundsParams::new(window.result.window_id.clone(), bounds))
            .await?;
        Ok(())
    }

    async fn wait_for_text(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<String, BrowserError> {
        let page = self.page()?;

        let poll = async {
            loop {
                if let Ok(element) = page.find_xpath(locator.as_str()).await {
                    let text = element.inner_text().await?.unwrap_or_default();
                    return Ok::<String, BrowserError>(text);
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| BrowserError::Timeout {
                locator: locator.clone(),
                timeout,
            })?
    }

    async fn click_when_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let page = self.page()?;

        let poll = async {
            loop {
                if let Ok(element) = page.find_xpath(locator.as_str()).await {
                    if Self::is_clickable(&element).await {
                        element.click().await?;
                        return Ok::<(), BrowserError>(());
                    }
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| BrowserError::Timeout {
                locator: locator.clone(),
                timeout,
            })?
    }

    async fn current_location(&mut self) -> Result<String, BrowserError> {
        let page = self.page()?;
        page.url()
            .await?
            .ok_or_else(|| BrowserError::Unavailable("page has no URL".to_string()))
    }

    async fn terminate(&mut self) -> Result<(), BrowserError> {
        if self.lifecycle == Lifecycle::Closed {
            return Ok(());
        }
        self.lifecycle = Lifecycle::Closing;
        self.page = None;

        let mut outcome = Ok(());
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                log::warn!(target: "browser", "Close command failed: {}", e);
                outcome = Err(BrowserError::Protocol(e));
            }
            if let Err(e) = browser.wait().await {
                log::warn!(target: "browser", "Waiting for Chrome to exit failed: {}", e);
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }

        self.lifecycle = Lifecycle::Closed;
        log::info!(target: "browser", "Browser session closed.");
        outcome
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if self.lifecycle != Lifecycle::Closed {
            // chromiumoxide kills the child process when `Browser` drops
            log::warn!(target: "browser", "Browser session dropped without terminate().");
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

// ============================================================
// MOCK BROWSER
// ============================================================

/// What the mock was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCall {
    Navigate(String),
    Maximize,
    WaitForText,
    Click,
    CurrentLocation,
    Terminate,
}

#[derive(Default)]
struct MockState {
    pages: VecDeque<Option<String>>,
    locations: VecDeque<String>,
    click_failures: VecDeque<bool>,
    current: String,
    calls: Vec<BrowserCall>,
    exhausted: Option<CancellationToken>,
    closed: bool,
}

/// Scripted browser. Each `wait_for_text` consumes one scripted page:
/// `Some(text)` is returned, `None` behaves like a timeout. Every click
/// moves to the next scripted location. After `terminate` every other
/// operation fails with [`BrowserError::Closed`], like [`ChromeSession`].
#[derive(Clone, Default)]
pub struct MockBrowser {
    state: Arc<Mutex<MockState>>,
}

impl MockBrowser {
    pub fn new(start_location: &str) -> Self {
        let browser = Self::default();
        browser.state.lock().unwrap().current = start_location.to_string();
        browser
    }

    pub fn with_page(self, text: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .pages
            .push_back(Some(text.to_string()));
        self
    }

    /// Next extraction attempt times out.
    pub fn with_missing_page(self) -> Self {
        self.state.lock().unwrap().pages.push_back(None);
        self
    }

    /// Location reached after the next successful click.
    pub fn with_next_location(self, location: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .locations
            .push_back(location.to_string());
        self
    }

    /// Next click attempt fails.
    pub fn with_click_failure(self) -> Self {
        self.state.lock().unwrap().click_failures.push_back(true);
        self
    }

    /// Cancels `token` once the scripted pages run out.
    pub fn cancel_when_exhausted(self, token: CancellationToken) -> Self {
        self.state.lock().unwrap().exhausted = Some(token);
        self
    }

    pub fn calls(&self) -> Vec<BrowserCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn click_count(&self) -> usize {
        self.count(&BrowserCall::Click)
    }

    pub fn was_terminated(&self) -> bool {
        self.count(&BrowserCall::Terminate) > 0
    }

    /// Logs `call`, refusing it once the session is closed.
    fn record(&self, call: BrowserCall) -> Result<MutexGuard<'_, MockState>, BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.closed {
            return Err(BrowserError::Closed);
        }
        Ok(state)
    }

    fn count(&self, call: &BrowserCall) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| *c == call)
            .count()
    }
}

#[async_trait]
impl BrowsingSession for MockBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.record(BrowserCall::Navigate(url.to_string()))?;
        if state.current.is_empty() {
            state.current = url.to_string();
        }
        Ok(())
    }

    async fn maximize(&mut self) -> Result<(), BrowserError> {
        self.record(BrowserCall::Maximize)?;
        Ok(())
    }

    async fn wait_for_text(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<String, BrowserError> {
        let mut state = self.record(BrowserCall::WaitForText)?;
        match state.pages.pop_front() {
            Some(Some(text)) => Ok(text),
            Some(None) => Err(BrowserError::Timeout {
                locator: locator.clone(),
                timeout,
            }),
            None => {
                if let Some(token) = &state.exhausted {
                    token.cancel();
                }
                Err(BrowserError::Timeout {
                    locator: locator.clone(),
                    timeout,
                })
            }
        }
    }

    async fn click_when_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let mut state = self.record(BrowserCall::Click)?;
        if state.click_failures.pop_front().unwrap_or(false) {
            return Err(BrowserError::Timeout {
                locator: locator.clone(),
                timeout,
            });
        }
        if let Some(next) = state.locations.pop_front() {
            state.current = next;
        }
        Ok(())
    }

    async fn current_location(&mut self) -> Result<String, BrowserError> {
        let state = self.record(BrowserCall::CurrentLocation)?;
        Ok(state.current.clone())
    }

    async fn terminate(&mut self) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(BrowserCall::Terminate);
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display() {
        let loc = Locator::xpath("//button");
        assert_eq!(loc.to_string(), "xpath `//button`");
        assert_eq!(loc.as_str(), "//button");
    }

    #[tokio::test]
    async fn test_mock_browser_script() {
        let mock = MockBrowser::new("https://example.test/p/1")
            .with_page("first")
            .with_missing_page()
            .with_next_location("https://example.test/p/2");
        let handle = mock.clone();
        let mut browser = mock;
        let loc = Locator::xpath("//div");
        let t = Duration::from_secs(10);

        assert_eq!(browser.wait_for_text(&loc, t).await.unwrap(), "first");
        assert!(matches!(
            browser.wait_for_text(&loc, t).await,
            Err(BrowserError::Timeout { .. })
        ));
        browser.click_when_clickable(&loc, t).await.unwrap();
        assert_eq!(
            browser.current_location().await.unwrap(),
            "https://example.test/p/2"
        );
        browser.terminate().await.unwrap();

        assert_eq!(handle.click_count(), 1);
        assert!(handle.was_terminated());
    }

    #[tokio::test]
    async fn test_mock_browser_refuses_calls_after_terminate() {
        let mut browser = MockBrowser::new("https://example.test/p/1").with_page("unused");
        let loc = Locator::xpath("//div");

        browser.terminate().await.unwrap();
        browser.terminate().await.unwrap();

        assert!(matches!(browser.navigate("x").await, Err(BrowserError::Closed)));
        assert!(matches!(
            browser.wait_for_text(&loc, Duration::from_secs(1)).await,
            Err(BrowserError::Closed)
        ));
        assert!(matches!(
            browser.current_location().await,
            Err(BrowserError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_mock_browser_cancels_when_exhausted() {
        let token = CancellationToken::new();
        let mut browser = MockBrowser::new("u").cancel_when_exhausted(token.clone());
        let _ = browser
            .wait_for_text(&Locator::xpath("//div"), Duration::from_secs(1))
            .await;
        assert!(token.is_cancelled());
    }
}
