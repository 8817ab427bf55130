//! Suspend a group of runners for the lifetime of a guard.

use crate::runner::task_runner::{RunnerHandle, TaskRunner};
use std::future::Future;
use tracing::debug;

/// Anything that can be paused and resumed as part of a suspend group.
pub trait Suspendable {
    fn suspend(&self);
    fn restart(&self);
}

impl Suspendable for RunnerHandle {
    fn suspend(&self) {
        RunnerHandle::suspend(self);
    }

    fn restart(&self) {
        RunnerHandle::restart(self);
    }
}

impl Suspendable for TaskRunner {
    fn suspend(&self) {
        TaskRunner::suspend(self);
    }

    fn restart(&self) {
        TaskRunner::restart(self);
    }
}

impl<T: Suspendable + ?Sized> Suspendable for &T {
    fn suspend(&self) {
        (**self).suspend();
    }

    fn restart(&self) {
        (**self).restart();
    }
}

/// Restarts every runner it suspended when dropped, in suspension order.
///
/// Dropping happens on normal scope end, on `?` early returns and while
/// unwinding, so the restart requests are always issued.
#[must_use = "runners are restarted as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SuspendGuard<S: Suspendable> {
    runners: Vec<S>,
}

impl<S: Suspendable> SuspendGuard<S> {
    /// The suspended runners, in the order they were suspended.
    pub fn runners(&self) -> &[S] {
        &self.runners
    }
}

impl<S: Suspendable> Drop for SuspendGuard<S> {
    fn drop(&mut self) {
        for runner in &self.runners {
            runner.restart();
        }
        debug!(count = self.runners.len(), "restart requested for suspended runners");
    }
}

/// Request suspension of each runner in order and return the restart guard.
///
/// Only the state transitions are requested; acknowledgment by the
/// background tasks is not awaited.
pub fn suspend_all<I, S>(runners: I) -> SuspendGuard<S>
where
    I: IntoIterator<Item = S>,
    S: Suspendable,
{
    let runners: Vec<S> = runners
        .into_iter()
        .inspect(|runner| runner.suspend())
        .collect();
    debug!(count = runners.len(), "suspend requested for runners");
    SuspendGuard { runners }
}

/// Run `body` while `runners` are suspended, restarting them afterwards.
pub async fn with_suspended<I, S, F, Fut, T>(runners: I, body: F) -> T
where
    I: IntoIterator<Item = S>,
    S: Suspendable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let _guard = suspend_all(runners);
    body().await
}
