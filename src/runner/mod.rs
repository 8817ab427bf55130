//! Scoped background task runner.
//!
//! A [`TaskRunner`] owns one background tokio task, drives it through the
//! [`TaskState`] machine and tears it down deterministically when its scope
//! exits. Behaviour is supplied through [`TaskHooks`]. [`suspend_all`] pauses
//! a group of runners for the duration of a guard.

pub mod hooks;
pub mod state;
pub mod suspend;
pub mod task_runner;

pub use hooks::{HookFuture, HookKind, TaskHooks};
pub use state::TaskState;
pub use suspend::{SuspendGuard, Suspendable, suspend_all, with_suspended};
pub use task_runner::{RunnerHandle, TaskRunner};
