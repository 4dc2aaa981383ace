//! System process runner behind a trait, so speech output is testable
//! without a synthesizer installed.

use crate::error::{Result, VoxbridgeError};
use std::collections::VecDeque;
use std::process::Command;
use std::sync::Mutex;

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use from the speech worker thread.
pub trait CommandExecutor: Send + Sync {
    /// Run `command` with `args` to completion and return its stdout.
    fn execute(&self, command: &str, args: &[&str]) -> Result<String>;
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(command).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VoxbridgeError::SpeechToolNotFound {
                    tool: command.to_string(),
                }
            } else {
                VoxbridgeError::SpeechFailed {
                    message: format!("Failed to execute {}: {}", command, e),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoxbridgeError::SpeechFailed {
                message: format!("{} exited with {}: {}", command, output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Mock command executor for testing.
///
/// Records every invocation and answers from a queue of responses,
/// defaulting to empty success.
#[derive(Debug, Default)]
pub struct MockCommandExecutor {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    responses: Mutex<VecDeque<Result<String>>>,
}

impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error(self, error: VoxbridgeError) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Err(error));
        }
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl CommandExecutor for MockCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((
                command.to_string(),
                args.iter().map(|s| s.to_string()).collect(),
            ));
        }

        self.responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front())
            .unwrap_or_else(|| Ok(String::new()))
    }
}
