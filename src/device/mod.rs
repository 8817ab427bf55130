//! Devices that run shell commands, locally or over ssh.
//!
//! Monitors use a [`RemoteDevice`] to sample a host from inside their loop
//! hook. The transport is the [`ShellConnection`] seam; [`LocalShell`] and
//! [`SshShell`] are the two bindings shipped here.

pub mod remote;
pub mod shell;

pub use remote::{DeviceCredentials, RemoteDevice};
pub use shell::{CommandOutput, LocalShell, ShellCommand, ShellConnection, SshShell};
