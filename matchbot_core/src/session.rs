//! Profile Session Loop
//!
//! Drives one browsing session through the profile queue:
//!
//! ```text
//! AwaitManualStart -> ExtractProfile -> Classify -> Decide
//!                          ^                          |  \
//!                          |                          |   PersistIfMatch
//!                          |                          v  /
//!                          +------------------- AdvanceProfile -> Terminated
//! ```
//!
//! One profile is fully handled before the next one is requested. The loop
//! has no iteration cap; it ends on an operator quit/cancel, on the
//! cancellation token, or on a fatal error. In every case the browser is
//! terminated before [`Session::run`] returns.

use crate::browser::{BrowserError, BrowsingSession, Locator};
use crate::candidate_log::{CandidateLog, LogError};
use crate::extraction::ProfileExtractor;
use crate::operator::{Operator, OperatorError};
use crate::oracle::{ClassificationOracle, InferenceBackend, OracleError};
use crate::types::{CandidateRecord, Decision, ProfileSnapshot, SessionMode, SessionStats, Verdict};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_START_URL: &str = "https://www.startupschool.org/cofounder-matching";

pub const DEFAULT_ADVANCE_XPATH: &str =
    "//button[contains(text(), 'skip for now') or contains(text(), 'Skip for now')]";

const START_PROMPT: &str =
    "Press Enter when you're logged in and on the first candidate profile...";
const MANUAL_NEXT_PROMPT: &str =
    "Please navigate to the next profile manually and press Enter...";
const MANUAL_SKIP_PROMPT: &str = "Please click 'skip for now' manually and press Enter...";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Classification failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("Could not record candidate: {0}")]
    Log(#[from] LogError),

    #[error("Operator unavailable: {0}")]
    Operator(#[from] OperatorError),

    #[error("No operator response within {0:?}")]
    OperatorTimedOut(Duration),

    #[error("Browser session failed: {0}")]
    Browser(#[from] BrowserError),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub start_url: String,
    pub mode: SessionMode,
    pub advance_locator: Locator,
    pub advance_timeout: Duration,
    /// Pause after a successful advance while the next page loads
    pub advance_settle: Duration,
    /// Pause before advancing in autonomous mode
    pub autonomous_delay: Duration,
    /// Bound on every operator wait. `None` waits indefinitely.
    pub operator_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            mode: SessionMode::Autonomous,
            advance_locator: Locator::xpath(DEFAULT_ADVANCE_XPATH),
            advance_timeout: Duration::from_secs(10),
            advance_settle: Duration::from_secs(2),
            autonomous_delay: Duration::from_secs(1),
            operator_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Operator chose to quit
    Quit,
    /// Operator gave any other answer at the confirmation prompt
    Cancelled,
    /// The cancellation token fired
    Interrupted,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub stop_reason: StopReason,
    pub stats: SessionStats,
    pub log_path: PathBuf,
}

/// Loop states.
#[derive(Debug)]
enum Phase {
    AwaitManualStart,
    ExtractProfile,
    Classify(ProfileSnapshot),
    Decide(ProfileSnapshot, Verdict),
    PersistIfMatch(ProfileSnapshot, Verdict),
    AdvanceProfile,
    Terminated(StopReason),
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::AwaitManualStart => "AwaitManualStart",
            Phase::ExtractProfile => "ExtractProfile",
            Phase::Classify(_) => "Classify",
            Phase::Decide(..) => "Decide",
            Phase::PersistIfMatch(..) => "PersistIfMatch",
            Phase::AdvanceProfile => "AdvanceProfile",
            Phase::Terminated(_) => "Terminated",
        }
    }
}

pub struct Session<B, I, O>
where
    B: BrowsingSession,
    I: InferenceBackend,
    O: Operator,
{
    browser: B,
    oracle: ClassificationOracle<I>,
    extractor: ProfileExtractor,
    log: CandidateLog,
    operator: O,
    config: SessionConfig,
    cancel: CancellationToken,
    stats: SessionStats,
}

impl<B, I, O> Session<B, I, O>
where
    B: BrowsingSession,
    I: InferenceBackend,
    O: Operator,
{
    pub fn new(
        browser: B,
        oracle: ClassificationOracle<I>,
        extractor: ProfileExtractor,
        log: CandidateLog,
        operator: O,
        config: SessionConfig,
    ) -> Self {
        Self {
            browser,
            oracle,
            extractor,
            log,
            operator,
            config,
            cancel: CancellationToken::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Runs until quit, cancellation or a fatal error. The browser is
    /// terminated on every path.
    pub async fn run(mut self) -> Result<SessionSummary, SessionError> {
        let outcome = self.drive().await;

        println!("\n🧹 Closing browser...");
        if let Err(e) = self.browser.terminate().await {
            log::warn!("[session] Browser teardown failed: {}", e);
        }

        match outcome {
            Ok(stop_reason) => {
                log::info!(
                    "[session] Ended ({:?}) after {} profiles",
                    stop_reason,
                    self.stats.profiles_visited
                );
                Ok(SessionSummary {
                    stop_reason,
                    stats: self.stats,
                    log_path: self.log.path().to_path_buf(),
                })
            }
            Err(e) => {
                log::error!("[session] Fatal: {}", e);
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<StopReason, SessionError> {
        if let Err(e) = self.browser.maximize().await {
            log::warn!("[session] Could not maximize window: {}", e);
        }
        println!("🌐 Navigating to {}", self.config.start_url);
        self.browser.navigate(&self.config.start_url).await?;

        let mut phase = Phase::AwaitManualStart;
        loop {
            // A classified match is still persisted before the loop stops
            if self.cancel.is_cancelled()
                && matches!(
                    phase,
                    Phase::AwaitManualStart | Phase::ExtractProfile | Phase::AdvanceProfile
                )
            {
                phase = Phase::Terminated(StopReason::Interrupted);
            }
            log::debug!("[session] Phase {}", phase.name());

            phase = match phase {
                Phase::AwaitManualStart => self.await_manual_start().await?,
                Phase::ExtractProfile => self.extract_profile().await?,
                Phase::Classify(snapshot) => self.classify(snapshot).await?,
                Phase::Decide(snapshot, verdict) => self.decide(snapshot, verdict),
                Phase::PersistIfMatch(snapshot, verdict) => {
                    self.persist(snapshot, verdict).await?
                }
                Phase::AdvanceProfile => self.advance_profile().await?,
                Phase::Terminated(reason) => return Ok(reason),
            };
        }
    }

    async fn await_manual_start(&mut self) -> Result<Phase, SessionError> {
        println!("\n=== MANUAL LOGIN REQUIRED ===");
        println!("Please complete the following steps manually:");
        println!("1. Log in to your account");
        println!("2. Navigate to the cofounder matching section");
        println!("3. Go to the first profile you want to analyze");
        println!("4. Make sure you're on a candidate profile page");

        Ok(match self.acknowledge(START_PROMPT).await? {
            Some(()) => Phase::ExtractProfile,
            None => Phase::Terminated(StopReason::Interrupted),
        })
    }

    async fn extract_profile(&mut self) -> Result<Phase, SessionError> {
        // Counted before extraction succeeds; skipped profiles are tracked separately
        self.stats.profiles_visited += 1;
        println!("\n🔍 Analyzing profile #{}...", self.stats.profiles_visited);

        match self.extractor.extract(&mut self.browser).await {
            Ok(snapshot) => Ok(Phase::Classify(snapshot)),
            Err(e) => {
                log::warn!("[session] No content for profile: {}", e);
                println!("❌ Could not get page content. Skipping this profile.");
                self.stats.profiles_skipped += 1;

                if let Err(e) = self.advance().await {
                    log::warn!("[session] Skip failed: {}", e);
                    println!("❌ Could not skip profile. Manual intervention required.");
                    return Ok(match self.acknowledge(MANUAL_NEXT_PROMPT).await? {
                        Some(()) => Phase::ExtractProfile,
                        None => Phase::Terminated(StopReason::Interrupted),
                    });
                }
                Ok(Phase::ExtractProfile)
            }
        }
    }

    async fn classify(&mut self, snapshot: ProfileSnapshot) -> Result<Phase, SessionError> {
        println!(
            "📄 Analyzing profile content ({} characters)...",
            snapshot.raw_text.chars().count()
        );

        let oracle = &self.oracle;
        let text = snapshot.raw_text.as_str();
        let outcome = until_cancelled(&self.cancel, async {
            oracle.classify(text).await.map_err(SessionError::from)
        })
        .await?;

        Ok(match outcome {
            Some(outcome) => {
                self.stats.profiles_analyzed += 1;
                Phase::Decide(snapshot, outcome.into_verdict())
            }
            None => Phase::Terminated(StopReason::Interrupted),
        })
    }

    fn decide(&self, snapshot: ProfileSnapshot, verdict: Verdict) -> Phase {
        println!("\n=== ANALYSIS RESULTS ===");
        println!("Name: {}", verdict.person_name);
        println!(
            "Has relevant experience: {}",
            if verdict.has_relevant_experience { "YES" } else { "NO" }
        );
        println!("Summary: {}", verdict.summary);

        if verdict.has_relevant_experience {
            println!(
                "\n✅ {} has relevant experience in biotech/health tech/robotics!",
                verdict.person_name
            );
            Phase::PersistIfMatch(snapshot, verdict)
        } else {
            println!(
                "❌ {} does not have relevant experience in biotech/health tech/robotics.",
                verdict.person_name
            );
            Phase::AdvanceProfile
        }
    }

    async fn persist(
        &mut self,
        snapshot: ProfileSnapshot,
        verdict: Verdict,
    ) -> Result<Phase, SessionError> {
        let location = match self.extractor.location(&mut self.browser).await {
            Ok(location) => location,
            Err(e) => {
                log::warn!(
                    "[session] Location re-read failed ({}), using {}",
                    e,
                    snapshot.location
                );
                snapshot.location
            }
        };

        let record = CandidateRecord::now(&verdict, &location);
        let total = self.log.append(&record)?;
        self.stats.candidates_saved += 1;
        self.stats.log_total = Some(total);

        println!("💾 Added {} to recommendations list!", verdict.person_name);
        println!("📊 Total candidates saved: {}", total);
        Ok(Phase::AdvanceProfile)
    }

    async fn advance_profile(&mut self) -> Result<Phase, SessionError> {
        match self.config.mode {
            SessionMode::Confirmed => {
                println!("\n🔄 Ready to move to next profile...");
                println!("Continue to next profile? (y/N/q to quit): ");
                match self.confirm_next().await? {
                    Some(Decision::Continue) => {}
                    Some(Decision::Quit) => {
                        println!("🛑 Stopping automation as requested.");
                        return Ok(Phase::Terminated(StopReason::Quit));
                    }
                    Some(Decision::Cancel) => {
                        println!("❌ Automation cancelled by user.");
                        return Ok(Phase::Terminated(StopReason::Cancelled));
                    }
                    None => return Ok(Phase::Terminated(StopReason::Interrupted)),
                }
            }
            SessionMode::Autonomous => {
                println!("\n🔄 Moving to next profile automatically...");
                let delay = self.config.autonomous_delay;
                if until_cancelled(&self.cancel, async {
                    tokio::time::sleep(delay).await;
                    Ok::<(), SessionError>(())
                })
                .await?
                .is_none()
                {
                    return Ok(Phase::Terminated(StopReason::Interrupted));
                }
            }
        }

        if let Err(e) = self.advance().await {
            log::warn!("[session] Advance failed: {}", e);
            println!("❌ Could not find skip button. Manual intervention required.");
            return Ok(match self.acknowledge(MANUAL_SKIP_PROMPT).await? {
                Some(()) => Phase::ExtractProfile,
                None => Phase::Terminated(StopReason::Interrupted),
            });
        }
        Ok(Phase::ExtractProfile)
    }

    /// Clicks the advance control, then waits for the next page to settle.
    async fn advance(&mut self) -> Result<(), BrowserError> {
        log::info!("[session] Looking for skip button...");
        self.browser
            .click_when_clickable(&self.config.advance_locator, self.config.advance_timeout)
            .await?;

        let settle = self.config.advance_settle;
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(settle) => {}
        }
        println!("✅ Moved to next profile");
        Ok(())
    }

    async fn acknowledge(&mut self, prompt: &str) -> Result<Option<()>, SessionError> {
        let limit = self.config.operator_timeout;
        let ask = self.operator.acknowledge(prompt);
        until_cancelled(&self.cancel, within(limit, ask)).await
    }

    async fn confirm_next(&mut self) -> Result<Option<Decision>, SessionError> {
        let limit = self.config.operator_timeout;
        let ask = self.operator.confirm_next();
        until_cancelled(&self.cancel, within(limit, ask)).await
    }
}

/// Resolves to `None` if `token` fires before `fut` completes.
async fn until_cancelled<T, F>(token: &CancellationToken, fut: F) -> Result<Option<T>, SessionError>
where
    F: Future<Output = Result<T, SessionError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Ok(None),
        result = fut => result.map(Some),
    }
}

/// Applies the optional operator timeout.
async fn within<T, F>(limit: Option<Duration>, fut: F) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, OperatorError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| SessionError::OperatorTimedOut(limit))?
            .map_err(SessionError::from),
        None => fut.await.map_err(SessionError::from),
    }
}
