//! Lifecycle hooks for a runner's background task.
//!
//! [`TaskHooks`] holds five async callbacks. Every slot defaults to a no-op,
//! so a runner built with `TaskHooks::default()` just loops until its scope
//! closes. Concrete monitors are built by filling in the slots they need.

use crate::error::Result;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use tracing::trace;

/// Future returned by a hook invocation.
pub type HookFuture = BoxFuture<'static, Result<()>>;

type HookFn = Box<dyn FnMut() -> HookFuture + Send>;

/// Identifies one of the five hook points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Once, before the loop begins.
    Start,
    /// Repeatedly while running, and while draining after `done`.
    Loop,
    /// Once per transition into the suspended state.
    Suspend,
    /// Once per transition out of the restarted state.
    Restart,
    /// Once, unconditionally, when the task terminates.
    End,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Loop => "loop",
            Self::Suspend => "suspend",
            Self::Restart => "restart",
            Self::End => "end",
        };
        f.write_str(name)
    }
}

/// The five behaviours a background task runs at its lifecycle points.
pub struct TaskHooks {
    start: HookFn,
    on_loop: HookFn,
    suspend: HookFn,
    restart: HookFn,
    end: HookFn,
}

fn noop() -> HookFn {
    Box::new(|| -> HookFuture { futures_util::future::ready(Ok(())).boxed() })
}

fn boxed<F, Fut>(mut hook: F) -> HookFn
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Box::new(move || hook().boxed())
}

impl Default for TaskHooks {
    fn default() -> Self {
        Self {
            start: noop(),
            on_loop: noop(),
            suspend: noop(),
            restart: noop(),
            end: noop(),
        }
    }
}

impl fmt::Debug for TaskHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHooks").finish_non_exhaustive()
    }
}

impl TaskHooks {
    /// All hooks no-ops.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hook run once before the loop.
    pub fn on_start<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.start = boxed(hook);
        self
    }

    /// Set the loop body.
    ///
    /// The runner yields to the scheduler between calls, but a loop hook that
    /// polls an external resource should pace itself (for example with
    /// `tokio::time::sleep`).
    pub fn on_loop<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_loop = boxed(hook);
        self
    }

    /// Set the hook run when a suspend request is acknowledged.
    pub fn on_suspend<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.suspend = boxed(hook);
        self
    }

    /// Set the hook run when a restart request is acknowledged.
    pub fn on_restart<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.restart = boxed(hook);
        self
    }

    /// Set the hook run once when the task terminates, however it terminates.
    pub fn on_end<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.end = boxed(hook);
        self
    }

    pub(crate) async fn call(&mut self, kind: HookKind) -> Result<()> {
        trace!(hook = %kind, "invoking hook");
        let hook = match kind {
            HookKind::Start => &mut self.start,
            HookKind::Loop => &mut self.on_loop,
            HookKind::Suspend => &mut self.suspend,
            HookKind::Restart => &mut self.restart,
            HookKind::End => &mut self.end,
        };
        hook().await
    }
}
