//! Monitor runner: scoped background tasks with suspend/restart control.
//!
//! A [`TaskRunner`] starts one long-lived cooperative task when its scope is
//! entered and guarantees that the task has fully stopped when the scope
//! exits, after running for at least `at_least` seconds and, unless marked
//! done, for up to `timeout` seconds.
//!
//! # Architecture
//!
//! - **Runner**: state machine, hook dispatch and the enter/exit protocol
//! - **Suspend groups**: pause several runners around a critical section
//! - **Offload**: run blocking calls from hooks without stalling the runtime
//! - **Devices**: run shell commands locally or over ssh
//! - **Monitor**: a ready-made runner that samples a command on a device

pub mod config;
pub mod device;
pub mod error;
pub mod monitor;
pub mod offload;
pub mod runner;


pub use config::{MonitorConfig, RunnerConfig};
pub use error::{Result, RunnerError};
pub use monitor::{CommandMonitor, CommandSample};
pub use offload::{offload, run_blocking};
pub use runner::{
    HookKind, RunnerHandle, SuspendGuard, Suspendable, TaskHooks, TaskRunner, TaskState,
    suspend_all, with_suspended,
};
