//! A host reachable through a [`ShellConnection`].

use crate::device::shell::{CommandOutput, ShellCommand, ShellConnection, SshShell};
use crate::error::{Result, RunnerError};
use std::fmt;
use tracing::{debug, info};

/// Where a device lives and how to log in.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceCredentials {
    pub hostname: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl DeviceCredentials {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            username: None,
            password: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Parse `[user@]host`.
    pub fn parse_destination(destination: &str) -> Self {
        match destination.split_once('@') {
            Some((user, host)) => Self::new(host).with_username(user),
            None => Self::new(destination),
        }
    }
}

impl fmt::Debug for DeviceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCredentials")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A device plus the connection used to run commands on it.
#[derive(Debug)]
pub struct RemoteDevice<C> {
    credentials: DeviceCredentials,
    connection: Option<C>,
}

impl<C: ShellConnection> RemoteDevice<C> {
    /// Wrap an already established connection.
    pub fn with_connection(credentials: DeviceCredentials, connection: C) -> Self {
        Self {
            credentials,
            connection: Some(connection),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.credentials.hostname
    }

    pub fn username(&self) -> Option<&str> {
        self.credentials.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.credentials.password.as_deref()
    }

    /// The live connection.
    ///
    /// # Errors
    ///
    /// [`RunnerError::InvalidConnection`] after [`disconnect`](Self::disconnect).
    pub fn connection(&self) -> Result<&C> {
        self.connection.as_ref().ok_or_else(|| {
            RunnerError::InvalidConnection(format!("{} is not connected", self.hostname()))
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Drop the connection; later commands fail with `InvalidConnection`.
    pub fn disconnect(&mut self) -> Option<C> {
        debug!(host = %self.credentials.hostname, "disconnecting device");
        self.connection.take()
    }

    /// Run `command` on the device.
    ///
    /// # Errors
    ///
    /// Connection errors, and [`RunnerError::CommandFailed`] when
    /// `success_validation` is set and the command exits unsuccessfully.
    pub async fn run_shell_command(&self, command: &ShellCommand) -> Result<CommandOutput> {
        let connection = self.connection()?;
        let output = connection.run(command).await?;
        debug!(
            host = %self.credentials.hostname,
            status = ?output.status,
            "shell command finished"
        );

        if command.success_validation && !output.success() {
            return Err(RunnerError::CommandFailed {
                command: command.command.clone(),
                status: output.status,
                stderr: output.stderr.trim().to_owned(),
            });
        }
        Ok(output)
    }
}

impl RemoteDevice<SshShell> {
    /// Open an ssh connection and check it by running `true`.
    pub async fn connect_ssh(credentials: DeviceCredentials) -> Result<Self> {
        let shell = SshShell::new(
            &credentials.hostname,
            credentials.username.as_deref(),
            credentials.password.as_deref(),
        )?;
        let device = Self::with_connection(credentials, shell);
        device
            .run_shell_command(&ShellCommand::new("true"))
            .await
            .map_err(|e| RunnerError::InvalidConnection(e.to_string()))?;
        info!(host = %device.hostname(), "device connected over ssh");
        Ok(device)
    }
}
