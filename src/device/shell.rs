//! Shell command model and connections that can execute it.

use crate::error::{Result, RunnerError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// A shell command line plus how to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    /// Command line passed to `sh -c`.
    pub command: String,
    /// Turn a non-zero exit status into [`RunnerError::CommandFailed`].
    pub success_validation: bool,
    /// Extra environment variables for the command.
    pub environment: BTreeMap<String, String>,
    /// Capture stdout/stderr instead of inheriting them.
    pub capture_output: bool,
}

impl ShellCommand {
    /// A validated, captured command with no extra environment.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            success_validation: true,
            environment: BTreeMap::new(),
            capture_output: true,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_success_validation(mut self, enabled: bool) -> Self {
        self.success_validation = enabled;
        self
    }

    pub fn with_capture_output(mut self, enabled: bool) -> Self {
        self.capture_output = enabled;
        self
    }
}

/// Result of running a [`ShellCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    /// Captured stdout (empty when output is not captured).
    pub stdout: String,
    /// Captured stderr (empty when output is not captured).
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    fn from_output(output: std::process::Output) -> Self {
        Self {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// A transport that can run shell commands on some host.
#[async_trait]
pub trait ShellConnection: Send + Sync {
    /// Run `command` and report its status and output.
    ///
    /// Implementations do not apply `success_validation`; the device does.
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput>;

    /// Short description for log fields.
    fn describe(&self) -> String;
}

async fn execute(mut process: Command, capture_output: bool) -> Result<CommandOutput> {
    process.stdin(Stdio::null());
    if capture_output {
        process.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        process.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }
    process.kill_on_drop(true);
    let output = process.output().await?;
    Ok(CommandOutput::from_output(output))
}

/// Runs commands on this machine through `sh -c`.
#[derive(Debug, Clone, Default)]
pub struct LocalShell;

#[async_trait]
impl ShellConnection for LocalShell {
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput> {
        debug!(command = %command.command, "running local shell command");
        let mut process = Command::new("sh");
        process
            .arg("-c")
            .arg(&command.command)
            .envs(&command.environment);
        execute(process, command.capture_output).await
    }

    fn describe(&self) -> String {
        "local".to_owned()
    }
}

/// Runs commands on a remote host through the `ssh` client.
///
/// Key-based authentication runs `ssh` in batch mode. When a password is
/// set, `sshpass` must be on `PATH`; it receives the password through the
/// `SSHPASS` environment variable, never on the command line.
#[derive(Debug, Clone)]
pub struct SshShell {
    destination: String,
    password: Option<String>,
    ssh_program: PathBuf,
    sshpass_program: Option<PathBuf>,
}

impl SshShell {
    /// Connection to `[username@]hostname`.
    ///
    /// # Errors
    ///
    /// [`RunnerError::InvalidConnection`] when a password is given but
    /// `sshpass` cannot be found.
    pub fn new(hostname: &str, username: Option<&str>, password: Option<&str>) -> Result<Self> {
        if hostname.trim().is_empty() {
            return Err(RunnerError::InvalidConnection(
                "hostname must not be empty".to_owned(),
            ));
        }
        let destination = match username {
            Some(user) if !user.is_empty() => format!("{user}@{hostname}"),
            _ => hostname.to_owned(),
        };
        let sshpass_program = match password {
            Some(_) => Some(which::which("sshpass").map_err(|e| {
                RunnerError::InvalidConnection(format!(
                    "password authentication needs sshpass on PATH: {e}"
                ))
            })?),
            None => None,
        };
        Ok(Self {
            destination,
            password: password.map(str::to_owned),
            ssh_program: PathBuf::from("ssh"),
            sshpass_program,
        })
    }

    /// Use a specific `ssh` binary instead of the one on `PATH`.
    pub fn with_ssh_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.ssh_program = program.into();
        self
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Arguments passed to `ssh`, destination and remote command included.
    pub(crate) fn ssh_args(&self, command: &ShellCommand) -> Vec<String> {
        let mut args = Vec::new();
        if self.password.is_none() {
            args.push("-o".to_owned());
            args.push("BatchMode=yes".to_owned());
        }
        args.push(self.destination.clone());
        args.push("--".to_owned());
        args.push(remote_command_line(command));
        args
    }
}

/// Render the command as the single string the remote shell executes.
fn remote_command_line(command: &ShellCommand) -> String {
    if command.environment.is_empty() {
        return command.command.clone();
    }
    let assignments: Vec<String> = command
        .environment
        .iter()
        .map(|(key, value)| format!("{key}={}", shell_quote(value)))
        .collect();
    format!(
        "env {} sh -c {}",
        assignments.join(" "),
        shell_quote(&command.command)
    )
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[async_trait]
impl ShellConnection for SshShell {
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput> {
        debug!(
            destination = %self.destination,
            command = %command.command,
            "running remote shell command"
        );
        let args = self.ssh_args(command);
        let process = match (&self.sshpass_program, &self.password) {
            (Some(sshpass), Some(password)) => {
                let mut process = Command::new(sshpass);
                process
                    .arg("-e")
                    .arg(&self.ssh_program)
                    .args(&args)
                    .env("SSHPASS", password);
                process
            }
            _ => {
                let mut process = Command::new(&self.ssh_program);
                process.args(&args);
                process
            }
        };

        let output = execute(process, command.capture_output)
            .await
            .map_err(|e| RunnerError::Remote(format!("ssh to {} failed: {e}", self.destination)))?;

        // ssh reserves 255 for its own connection failures.
        if output.status == Some(255) {
            return Err(RunnerError::Remote(format!(
                "ssh to {} failed: {}",
                self.destination,
                output.stderr.trim()
            )));
        }
        Ok(output)
    }

    fn describe(&self) -> String {
        format!("ssh:{}", self.destination)
    }
}
