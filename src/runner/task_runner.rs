//! Task runner: one background task, a state machine, and a scope protocol.
//!
//! [`TaskRunner::enter`] spawns the background task and returns once it has
//! been scheduled. [`TaskRunner::exit`] waits until
//! `elapsed > at_least && (elapsed > timeout || state == Done)`, cancels the
//! task and swallows the resulting cancellation. [`TaskRunner::scope`] wraps
//! both around an async body so teardown happens on every exit path.
//!
//! Both waits are yield-then-check loops: nothing else can wake an idle
//! waiter, so each side polls the shared state between scheduler yields.

use crate::config::RunnerConfig;
use crate::error::{Result, RunnerError};
use crate::runner::hooks::{HookKind, TaskHooks};
use crate::runner::state::{SharedState, TaskState};
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_RUNNER_NAME: &str = "task-runner";

/// Cheap, clonable control surface of a [`TaskRunner`].
///
/// Handed to scope bodies and usable from any task. Mutators only record the
/// request; the background task acts on it after its next yield.
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    name: Arc<str>,
    state: SharedState,
}

impl RunnerHandle {
    /// Name of the runner this handle controls.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mark the work as logically finished. Idempotent.
    pub fn done(&self) {
        self.state.store(TaskState::Done);
    }

    /// Ask the background task to pause after running its suspend hook.
    pub fn suspend(&self) {
        self.state.store(TaskState::Suspended);
    }

    /// Ask the background task to run its restart hook and resume looping.
    pub fn restart(&self) {
        self.state.store(TaskState::Restarted);
    }

    /// Current state as last written by either side.
    pub fn state(&self) -> Result<TaskState> {
        self.state.load()
    }
}

#[derive(Debug)]
struct ActiveTask {
    started_at: Instant,
    cancel: CancellationToken,
    join: JoinHandle<Result<()>>,
}

impl Drop for ActiveTask {
    fn drop(&mut self) {
        // A task nobody will await must still stop and run its end hook.
        self.cancel.cancel();
    }
}

/// Owns at most one live background task and its lifecycle.
#[derive(Debug)]
pub struct TaskRunner {
    at_least: Duration,
    timeout: Duration,
    handle: RunnerHandle,
    hooks: Arc<Mutex<TaskHooks>>,
    active: Option<ActiveTask>,
}

impl TaskRunner {
    /// Create an idle runner with no-op hooks.
    pub fn new(config: RunnerConfig) -> Result<Self> {
        Ok(Self {
            at_least: config.at_least_duration()?,
            timeout: config.timeout_duration()?,
            handle: RunnerHandle {
                name: Arc::from(DEFAULT_RUNNER_NAME),
                state: SharedState::new(TaskState::Uninitialized),
            },
            hooks: Arc::new(Mutex::new(TaskHooks::default())),
            active: None,
        })
    }

    /// Set the lifecycle hooks.
    pub fn with_hooks(mut self, hooks: TaskHooks) -> Self {
        self.hooks = Arc::new(Mutex::new(hooks));
        self
    }

    /// Set the name used in log fields.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.handle.name = Arc::from(name.into());
        self
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn at_least(&self) -> Duration {
        self.at_least
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// A control handle sharing this runner's state.
    pub fn handle(&self) -> RunnerHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> Result<TaskState> {
        self.handle.state()
    }

    /// `true` between a successful [`enter`](Self::enter) and the matching exit.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// See [`RunnerHandle::done`].
    pub fn done(&self) {
        self.handle.done();
    }

    /// See [`RunnerHandle::suspend`].
    pub fn suspend(&self) {
        self.handle.suspend();
    }

    /// See [`RunnerHandle::restart`].
    pub fn restart(&self) {
        self.handle.restart();
    }

    /// Start the background task.
    ///
    /// Returns after the task has been scheduled at least once.
    ///
    /// # Errors
    ///
    /// [`RunnerError::AlreadyEntered`] if a task from a previous `enter` is
    /// still live.
    pub async fn enter(&mut self) -> Result<RunnerHandle> {
        if self.active.is_some() {
            return Err(RunnerError::AlreadyEntered);
        }

        let started_at = Instant::now();
        self.handle.state.store(TaskState::Running);

        let cancel = CancellationToken::new();
        let (scheduled_tx, scheduled_rx) = oneshot::channel();
        let join = tokio::spawn(drive(
            Arc::clone(&self.handle.name),
            self.handle.state.clone(),
            Arc::clone(&self.hooks),
            started_at,
            self.at_least,
            cancel.clone(),
            scheduled_tx,
        ));
        self.active = Some(ActiveTask {
            started_at,
            cancel,
            join,
        });

        if scheduled_rx.await.is_err() {
            warn!(runner = %self.handle.name, "background task ended before it was scheduled");
        }

        info!(
            runner = %self.handle.name,
            at_least = ?self.at_least,
            timeout = ?self.timeout,
            "task runner entered"
        );
        Ok(self.handle())
    }

    /// Wait for the stop condition, then tear the background task down.
    ///
    /// The cancellation caused by teardown is swallowed. Hook failures,
    /// invalid states and panics from the background task are returned.
    /// Calling `exit` without a live task is a no-op.
    ///
    /// Cancel safe: if the returned future is dropped before it completes,
    /// the runner stays active and `exit` can be called again.
    pub async fn exit(&mut self) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            debug!(runner = %self.handle.name, "exit called without a live task");
            return Ok(());
        };

        loop {
            tokio::task::yield_now().await;
            let elapsed = active.started_at.elapsed();
            if active.join.is_finished()
                || should_stop(&self.handle, self.at_least, self.timeout, elapsed)
            {
                break;
            }
        }

        active.cancel.cancel();
        tokio::task::yield_now().await;

        let outcome = match (&mut active.join).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(RunnerError::Cancelled),
            Err(e) => Err(RunnerError::Panicked(e.to_string())),
        };
        let elapsed = active.started_at.elapsed();
        self.active = None;

        match outcome {
            Ok(()) => {
                info!(runner = %self.handle.name, ?elapsed, "task runner exited");
                Ok(())
            }
            Err(e) if e.is_cancelled() => {
                info!(runner = %self.handle.name, ?elapsed, "task runner exited after cancelling task");
                Ok(())
            }
            Err(e) => {
                warn!(runner = %self.handle.name, ?elapsed, error = %e, "background task failed");
                Err(e)
            }
        }
    }

    /// Run `body` inside an enter/exit pair.
    ///
    /// Exit runs exactly once whether the body succeeds, returns an error or
    /// panics. A body error is returned as is; a teardown failure in that case
    /// is only logged. A body panic resumes after teardown.
    pub async fn scope<F, Fut, T, E>(&mut self, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce(RunnerHandle) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<RunnerError>,
    {
        let handle = self.enter().await?;
        let body_outcome = AssertUnwindSafe(body(handle)).catch_unwind().await;
        let exit_outcome = self.exit().await;

        match body_outcome {
            Ok(Ok(value)) => {
                exit_outcome?;
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(exit_err) = exit_outcome {
                    warn!(
                        runner = %self.handle.name,
                        error = %exit_err,
                        "task runner teardown failed while scope body was failing"
                    );
                }
                Err(err)
            }
            Err(panic) => {
                if let Err(exit_err) = exit_outcome {
                    warn!(
                        runner = %self.handle.name,
                        error = %exit_err,
                        "task runner teardown failed while scope body was panicking"
                    );
                }
                std::panic::resume_unwind(panic)
            }
        }
    }

}

fn should_stop(
    handle: &RunnerHandle,
    at_least: Duration,
    timeout: Duration,
    elapsed: Duration,
) -> bool {
    let done = matches!(handle.state.load(), Ok(TaskState::Done));
    elapsed > at_least && (elapsed > timeout || done)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        if self.active.is_some() {
            warn!(runner = %self.handle.name, "task runner dropped inside its scope; cancelling task");
        }
    }
}

/// Background task body: start hook, state loop, end hook.
async fn drive(
    name: Arc<str>,
    state: SharedState,
    hooks: Arc<Mutex<TaskHooks>>,
    started_at: Instant,
    at_least: Duration,
    cancel: CancellationToken,
    scheduled: oneshot::Sender<()>,
) -> Result<()> {
    let _ = scheduled.send(());

    let mut guard = hooks.lock().await;
    let hooks = &mut *guard;

    // Hook panics are caught here so the end hook below still runs.
    let lifecycle =
        AssertUnwindSafe(run_lifecycle(&name, &state, &mut *hooks, started_at, at_least))
            .catch_unwind();

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RunnerError::Cancelled),
        result = lifecycle => match result {
            Ok(result) => result,
            Err(panic) => Err(RunnerError::Panicked(format!(
                "hook panicked: {}",
                panic_message(&*panic)
            ))),
        },
    };

    let ended = hooks.call(HookKind::End).await;
    debug!(runner = %name, "end hook ran");

    match (outcome, ended) {
        (outcome, Ok(())) => outcome,
        (Ok(()), Err(end_err)) => Err(end_err),
        (Err(e), Err(end_err)) if e.is_cancelled() => Err(end_err),
        (Err(e), Err(end_err)) => {
            warn!(runner = %name, error = %end_err, "end hook failed after task failure");
            Err(e)
        }
    }
}

async fn run_lifecycle(
    name: &str,
    state: &SharedState,
    hooks: &mut TaskHooks,
    started_at: Instant,
    at_least: Duration,
) -> Result<()> {
    hooks.call(HookKind::Start).await?;

    loop {
        tokio::task::yield_now().await;

        match state.load()? {
            TaskState::Running => hooks.call(HookKind::Loop).await?,
            TaskState::Suspended => {
                hooks.call(HookKind::Suspend).await?;
                if state.transition(TaskState::Suspended, TaskState::Stopped) {
                    debug!(runner = %name, "suspend acknowledged");
                }
            }
            TaskState::Stopped => {}
            TaskState::Restarted => {
                hooks.call(HookKind::Restart).await?;
                if state.transition(TaskState::Restarted, TaskState::Running) {
                    debug!(runner = %name, "restart acknowledged");
                }
            }
            TaskState::Done => {
                if started_at.elapsed() < at_least {
                    hooks.call(HookKind::Loop).await?;
                } else {
                    debug!(runner = %name, "done; leaving loop");
                    return Ok(());
                }
            }
            TaskState::Uninitialized => {
                return Err(RunnerError::InvalidState(TaskState::Uninitialized.as_u8()));
            }
        }
    }
}
