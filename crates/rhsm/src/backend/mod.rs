//! Command execution against the external registration tool.
//!
//! The provider never spawns processes itself; it hands a [`CommandLine`]
//! to a [`CommandRunner`]. This keeps reconciliation testable with a
//! scripted runner and keeps timeouts in one place.

use std::fmt;
use std::time::Duration;

pub mod system;

pub use system::SystemRunner;

/// Flags whose values are secrets and must never be shown.
const SECRET_FLAGS: &[&str] = &["--password", "--proxypassword"];

/// A program invocation. Arguments are passed as-is, never through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Create a command line for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append `--flag=value`.
    pub fn flag(self, flag: &str, value: impl fmt::Display) -> Self {
        self.arg(format!("{flag}={value}"))
    }

    /// Append `--flag=value` when `value` is set.
    pub fn flag_opt(self, flag: &str, value: Option<impl fmt::Display>) -> Self {
        match value {
            Some(value) => self.flag(flag, value),
            None => self,
        }
    }

    /// Append a bare switch when `enabled`.
    pub fn switch(self, flag: &str, enabled: bool) -> Self {
        if enabled { self.arg(flag) } else { self }
    }

    /// Render for logs and error messages with secret values masked.
    pub fn redacted(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        for arg in &self.args {
            let masked = SECRET_FLAGS
                .iter()
                .find(|flag| arg.strip_prefix(*flag).is_some_and(|rest| rest.starts_with('=')))
                .map(|flag| format!("{flag}=********"));
            parts.push(masked.unwrap_or_else(|| arg.clone()));
        }
        parts.join(" ")
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.redacted())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout and stderr joined, for pattern matching.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    /// The most useful diagnostic text: stderr, or stdout when stderr is empty.
    pub fn diagnostic(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// Why a command produced no output at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// The program could not be found
    NotFound(String),
    /// The process did not finish in time and was killed
    TimedOut(Duration),
    /// Spawning or waiting failed
    Io(String),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(program) => write!(f, "{program} not found; is it installed?"),
            Self::TimedOut(after) => write!(f, "timed out after {}s", after.as_secs()),
            Self::Io(message) => write!(f, "{message}"),
        }
    }
}

/// Executes command lines on behalf of the provider.
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion or until `timeout` elapses.
    fn run(&self, command: &CommandLine, timeout: Duration) -> Result<CommandOutput, RunError>;
}
