//! Human operator suspension points.
//!
//! The session cannot tell on its own when a manual login finished or
//! whether the operator wants another profile, so it asks through
//! [`Operator`]. The console implementation lives in the CLI crate.

use crate::types::Decision;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Operator input closed")]
    Closed,

    #[error("Failed to read operator input: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Operator: Send {
    /// Shows `prompt` and blocks until the operator confirms.
    async fn acknowledge(&mut self, prompt: &str) -> Result<(), OperatorError>;

    /// Asks whether to move on to the next profile.
    async fn confirm_next(&mut self) -> Result<Decision, OperatorError>;
}

/// `y`/`yes` continue, `q` quits, anything else cancels.
///
/// Input is trimmed and case-folded first, so `" Y "` and `yes` continue
/// as well as a bare `y`.
pub fn parse_decision(input: &str) -> Decision {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Decision::Continue,
        "q" => Decision::Quit,
        _ => Decision::Cancel,
    }
}

/// Replays scripted answers. Acknowledgements succeed until the budget runs
/// out, after which the operator reports [`OperatorError::Closed`].
#[derive(Clone)]
pub struct ScriptedOperator {
    acknowledgements_left: Arc<Mutex<usize>>,
    decisions: Arc<Mutex<VecDeque<Decision>>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedOperator {
    pub fn new(acknowledgements: usize) -> Self {
        Self {
            acknowledgements_left: Arc::new(Mutex::new(acknowledgements)),
            decisions: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_decision(self, decision: Decision) -> Self {
        self.decisions.lock().unwrap().push_back(decision);
        self
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn acknowledge(&mut self, prompt: &str) -> Result<(), OperatorError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut left = self.acknowledgements_left.lock().unwrap();
        if *left == 0 {
            return Err(OperatorError::Closed);
        }
        *left -= 1;
        Ok(())
    }

    async fn confirm_next(&mut self) -> Result<Decision, OperatorError> {
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(OperatorError::Closed)
    }
}

/// Operator that never answers. Useful to exercise timeouts and cancellation.
pub struct SilentOperator;

#[async_trait]
impl Operator for SilentOperator {
    async fn acknowledge(&mut self, _prompt: &str) -> Result<(), OperatorError> {
        futures::future::pending::<()>().await;
        Ok(())
    }

    async fn confirm_next(&mut self) -> Result<Decision, OperatorError> {
        futures::future::pending::<()>().await;
        Ok(Decision::Cancel)
    }
}
