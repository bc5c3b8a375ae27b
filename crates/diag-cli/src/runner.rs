//! Command execution seam.
//!
//! Stages never spawn processes directly; they go through
//! [`CommandRunner`] so tests can run against fakes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tracing::debug;

/// Captured output of one external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Shell convention: 127 means the command was not found.
    pub fn tool_missing(&self) -> bool {
        self.exit_code == Some(127)
    }
}

/// Trait for command execution.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute a shell command and capture its output.
    async fn run(&self, command: &str) -> Result<CommandOutput>;

    /// Execute a shell command, feeding `input` on stdin.
    async fn run_with_stdin(&self, command: &str, input: &[u8]) -> Result<CommandOutput>;
}

/// Runs commands on the local host through `sh -c`.
pub struct LocalRunner;

impl LocalRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        debug!("exec: {}", command);

        let output = tokio::process::Command::new("sh")
            .args(["-c", command])
            .output()
            .await
            .context("Failed to execute command")?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn run_with_stdin(&self, command: &str, input: &[u8]) -> Result<CommandOutput> {
        use tokio::io::AsyncWriteExt;

        debug!("exec (piped stdin): {}", command);

        let mut child = tokio::process::Command::new("sh")
            .args(["-c", command])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn command")?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .await
                .context("Failed to write to stdin")?;
            // dropping stdin closes the pipe
        }

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for command")?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
