//! Task lifecycle states.

use crate::error::{Result, RunnerError};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a runner's background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskState {
    /// Before the task exists.
    Uninitialized = 0,
    /// Normal loop execution.
    Running = 1,
    /// Pause requested, not yet acknowledged.
    Suspended = 2,
    /// Pause acknowledged; the task is idle.
    Stopped = 3,
    /// Resume requested, not yet acknowledged.
    Restarted = 4,
    /// Work is logically finished, subject to the minimum runtime.
    Done = 5,
}

impl TaskState {
    /// Raw discriminant stored in the shared state cell.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for TaskState {
    type Error = RunnerError;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::Uninitialized),
            1 => Ok(Self::Running),
            2 => Ok(Self::Suspended),
            3 => Ok(Self::Stopped),
            4 => Ok(Self::Restarted),
            5 => Ok(Self::Done),
            other => Err(RunnerError::InvalidState(other)),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Running => "running",
            Self::Suspended => "suspended",
            Self::Stopped => "stopped",
            Self::Restarted => "restarted",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// State cell shared between the owning scope and the background task.
#[derive(Debug, Clone)]
pub(crate) struct SharedState(Arc<AtomicU8>);

impl SharedState {
    pub(crate) fn new(state: TaskState) -> Self {
        Self(Arc::new(AtomicU8::new(state.as_u8())))
    }

    pub(crate) fn load(&self) -> Result<TaskState> {
        TaskState::try_from(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: TaskState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }

    /// Move from `from` to `to` only if no one changed the state meanwhile.
    pub(crate) fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[cfg(test)]
    pub(crate) fn store_raw(&self, raw: u8) {
        self.0.store(raw, Ordering::Release);
    }
}
