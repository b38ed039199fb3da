//! Console-backed operator.
//!
//! Stdin is read on a dedicated thread and forwarded line by line over a
//! channel, so a pending prompt never blocks runtime shutdown.

use async_trait::async_trait;
use matchbot_core::operator::{parse_decision, Operator, OperatorError};
use matchbot_core::types::Decision;
use std::io::{BufRead, Write};
use tokio::sync::mpsc;

pub struct ConsoleOperator {
    lines: mpsc::UnboundedReceiver<String>,
}

impl ConsoleOperator {
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("[console] stdin read failed: {}", e);
                        break;
                    }
                }
            }
        });
        Self::from_lines(rx)
    }

    pub fn from_lines(lines: mpsc::UnboundedReceiver<String>) -> Self {
        Self { lines }
    }

    async fn read_line(&mut self) -> Result<String, OperatorError> {
        self.lines.recv().await.ok_or(OperatorError::Closed)
    }
}

#[async_trait]
impl Operator for ConsoleOperator {
    async fn acknowledge(&mut self, prompt: &str) -> Result<(), OperatorError> {
        print!("\n{} ", prompt);
        std::io::stdout().flush()?;
        self.read_line().await.map(|_| ())
    }

    async fn confirm_next(&mut self) -> Result<Decision, OperatorError> {
        std::io::stdout().flush()?;
        let answer = self.read_line().await?;
        Ok(parse_decision(&answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_operator_reads_queued_lines() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut op = ConsoleOperator::from_lines(rx);
        for line in ["", "y", "q", "whatever"] {
            tx.send(line.to_string()).unwrap();
        }
        drop(tx);

        op.acknowledge("Press Enter").await.unwrap();
        assert_eq!(op.confirm_next().await.unwrap(), Decision::Continue);
        assert_eq!(op.confirm_next().await.unwrap(), Decision::Quit);
        assert_eq!(op.confirm_next().await.unwrap(), Decision::Cancel);
        assert!(matches!(
            op.acknowledge("again").await,
            Err(OperatorError::Closed)
        ));
    }
}
