//! External command execution.
//!
//! The orchestrator only talks to the system through [`CommandRunner`], so
//! the whole interface sequence can run against a recording runner in tests.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;

use crate::{Error, Result};

/// One external program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Overrides the runner's default timeout
    pub timeout: Option<Duration>,
    /// Mask the argument after `password` in logs
    pub redacted: bool,
}

impl SystemCommand {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: None,
            redacted: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn redacted(mut self) -> Self {
        self.redacted = true;
        self
    }

    /// Full command line
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Command line safe to write to logs
    pub fn log_line(&self) -> String {
        if !self.redacted {
            return self.display();
        }
        let mut parts = vec![self.program.as_str()];
        let mut mask_next = false;
        for arg in &self.args {
            parts.push(if mask_next { "****" } else { arg.as_str() });
            mask_next = arg == "password";
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok() -> Self {
        Self { code: Some(0), ..Default::default() }
    }

    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            code: Some(code),
            stderr: stderr.to_string(),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stderr if present, else stdout
    pub fn message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }

    /// Turn a non-zero exit into [`Error::CommandFailed`]
    pub fn check(self, program: &str) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(Error::CommandFailed {
            program: program.to_string(),
            status: match self.code {
                Some(code) => format!("exit status {}", code),
                None => "signal".to_string(),
            },
            output: self.message(),
        })
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and capture output. Errors only when the program
    /// cannot be launched or exceeds its timeout; a non-zero exit is a
    /// normal [`CommandOutput`].
    async fn run(&self, cmd: &SystemCommand) -> Result<CommandOutput>;

    /// Launch a daemon and return without waiting for it
    async fn spawn_detached(&self, cmd: &SystemCommand) -> Result<()>;
}

/// Runs commands on the host through `tokio::process`
pub struct SystemRunner {
    sudo: bool,
    default_timeout: Duration,
}

impl SystemRunner {
    pub fn new(sudo: bool, default_timeout: Duration) -> Self {
        Self { sudo, default_timeout }
    }

    fn build(&self, cmd: &SystemCommand) -> tokio::process::Command {
        let mut command = if self.sudo {
            let mut c = tokio::process::Command::new("sudo");
            c.arg(&cmd.program);
            c
        } else {
            tokio::process::Command::new(&cmd.program)
        };
        command.args(&cmd.args).stdin(Stdio::null());
        command
    }

    fn spawn_error(cmd: &SystemCommand, source: std::io::Error) -> Error {
        Error::CommandSpawn {
            program: cmd.program.clone(),
            source,
        }
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, cmd: &SystemCommand) -> Result<CommandOutput> {
        tracing::debug!("$ {}", cmd.log_line());
        let child = self
            .build(cmd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Self::spawn_error(cmd, e))?;

        let timeout = cmd.timeout.unwrap_or(self.default_timeout);
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => Ok(output?.into()),
            Err(_) => Err(Error::CommandTimeout {
                program: cmd.program.clone(),
                timeout,
            }),
        }
    }

    async fn spawn_detached(&self, cmd: &SystemCommand) -> Result<()> {
        tracing::debug!("$ {} &", cmd.log_line());
        let mut child = self
            .build(cmd)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Self::spawn_error(cmd, e))?;

        // Reap the launcher; the daemons fork into the background themselves.
        let program = cmd.program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    tracing::warn!("{} exited with {}", program, status);
                }
                Err(e) => tracing::warn!("Failed to wait on {}: {}", program, e),
                _ => {}
            }
        });
        Ok(())
    }
}
