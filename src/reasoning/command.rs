//! Subprocess-backed reasoner.
//!
//! Spawns a configured command, writes the prompt to its stdin, and reads
//! stdout to completion under a timeout. Any model CLI that reads a prompt on
//! stdin and prints its answer works here.

use super::{Reasoner, strip_code_fences};
use crate::errors::OrchestratorError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub struct CommandReasoner {
    cmd: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandReasoner {
    pub fn new(cmd: &str, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            cmd: cmd.to_string(),
            args,
            timeout,
        }
    }

    async fn run(&self, prompt: &str) -> Result<String, OrchestratorError> {
        let mut child = Command::new(&self.cmd)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out child must not outlive the turn.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OrchestratorError::Generation {
                message: format!("failed to spawn '{}': {}", self.cmd, e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| OrchestratorError::Generation {
                    message: format!("failed to write prompt: {}", e),
                })?;
            stdin
                .shutdown()
                .await
                .map_err(|e| OrchestratorError::Generation {
                    message: format!("failed to close stdin: {}", e),
                })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OrchestratorError::Generation {
                message: format!("failed to read output: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OrchestratorError::Generation {
                message: format!(
                    "'{}' exited with {}: {}",
                    self.cmd,
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        Ok(strip_code_fences(&text))
    }
}

#[async_trait]
impl Reasoner for CommandReasoner {
    async fn generate(&self, prompt: &str) -> Result<String, OrchestratorError> {
        tracing::debug!(cmd = %self.cmd, prompt_chars = prompt.len(), "invoking reasoner");
        match tokio::time::timeout(self.timeout, self.run(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(OrchestratorError::Generation {
                message: format!(
                    "'{}' timed out after {}s",
                    self.cmd,
                    self.timeout.as_secs()
                ),
            }),
        }
    }
}
