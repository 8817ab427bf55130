//! A monitor that samples a shell command while its runner scope is open.
//!
//! [`CommandMonitor`] is built purely from [`TaskHooks`]: the loop hook runs
//! the command on a [`RemoteDevice`] and sleeps for the sampling interval.
//! Suspending the runner pauses sampling without tearing the task down.

use crate::config::{DEFAULT_MAX_SAMPLES, RunnerConfig};
use crate::device::{CommandOutput, RemoteDevice, ShellCommand, ShellConnection};
use crate::error::{Result, RunnerError};
use crate::runner::{TaskHooks, TaskRunner};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// One run of the monitored command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSample {
    /// Time since the monitor's start hook ran.
    pub offset: Duration,
    /// Command output, or the error message if the command failed.
    pub result: std::result::Result<CommandOutput, String>,
}

impl CommandSample {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug)]
struct Recording {
    started_at: Instant,
    samples: VecDeque<CommandSample>,
    max_samples: usize,
}

impl Recording {
    fn push(&mut self, sample: CommandSample) {
        while self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }
}

type SharedRecording = Arc<Mutex<Recording>>;

fn lock(recording: &SharedRecording) -> MutexGuard<'_, Recording> {
    recording.lock().unwrap_or_else(|e| e.into_inner())
}

/// Periodically runs a command on a device from a runner's loop hook.
pub struct CommandMonitor<C> {
    device: Arc<RemoteDevice<C>>,
    command: ShellCommand,
    interval: Duration,
    fail_fast: bool,
    recording: SharedRecording,
}

impl<C: ShellConnection + 'static> CommandMonitor<C> {
    pub fn new(device: Arc<RemoteDevice<C>>, command: ShellCommand) -> Self {
        Self {
            device,
            command,
            interval: DEFAULT_INTERVAL,
            fail_fast: false,
            recording: Arc::new(Mutex::new(Recording {
                started_at: Instant::now(),
                samples: VecDeque::new(),
                max_samples: DEFAULT_MAX_SAMPLES,
            })),
        }
    }

    /// Pause between samples.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Fail the runner on the first failing sample instead of recording it.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Keep only the most recent `max_samples` samples (at least one).
    pub fn with_max_samples(self, max_samples: usize) -> Self {
        lock(&self.recording).max_samples = max_samples.max(1);
        self
    }

    /// Samples recorded since the last start, oldest first.
    pub fn samples(&self) -> Vec<CommandSample> {
        lock(&self.recording).samples.iter().cloned().collect()
    }

    /// A runner wired to this monitor's hooks.
    pub fn runner(&self, config: RunnerConfig) -> Result<TaskRunner> {
        Ok(TaskRunner::new(config)?
            .with_name(format!("monitor:{}", self.device.hostname()))
            .with_hooks(self.hooks()))
    }

    /// The five hooks implementing the monitor.
    pub fn hooks(&self) -> TaskHooks {
        let start_recording = Arc::clone(&self.recording);
        let end_recording = Arc::clone(&self.recording);
        let host = self.device.hostname().to_owned();
        let suspend_host = host.clone();
        let restart_host = host.clone();

        TaskHooks::new()
            .on_start(move || {
                let mut recording = lock(&start_recording);
                recording.started_at = Instant::now();
                recording.samples.clear();
                futures_util::future::ready(Ok(()))
            })
            .on_loop(sample_hook(
                Arc::clone(&self.device),
                self.command.clone(),
                Arc::clone(&self.recording),
                self.interval,
                self.fail_fast,
            ))
            .on_suspend(move || {
                info!(host = %suspend_host, "monitor paused");
                futures_util::future::ready(Ok(()))
            })
            .on_restart(move || {
                info!(host = %restart_host, "monitor resumed");
                futures_util::future::ready(Ok(()))
            })
            .on_end(move || {
                let count = lock(&end_recording).samples.len();
                info!(host = %host, samples = count, "monitor finished");
                futures_util::future::ready(Ok(()))
            })
    }
}

fn sample_hook<C: ShellConnection + 'static>(
    device: Arc<RemoteDevice<C>>,
    command: ShellCommand,
    recording: SharedRecording,
    interval: Duration,
    fail_fast: bool,
) -> impl FnMut() -> BoxFuture<'static, Result<()>> + Send + 'static {
    move || {
        let device = Arc::clone(&device);
        let command = command.clone();
        let recording = Arc::clone(&recording);
        async move {
            let result = device.run_shell_command(&command).await;
            let failure = result.as_ref().err().map(ToString::to_string);
            {
                let mut recording = lock(&recording);
                let offset = recording.started_at.elapsed();
                recording.push(CommandSample {
                    offset,
                    result: result.map_err(|e| e.to_string()),
                });
            }

            if let Some(message) = failure {
                if fail_fast {
                    return Err(RunnerError::Hook(format!(
                        "sample of `{}` failed: {message}",
                        command.command
                    )));
                }
                warn!(command = %command.command, error = %message, "sample failed");
            } else {
                debug!(command = %command.command, "sample recorded");
            }

            tokio::time::sleep(interval).await;
            Ok(())
        }
        .boxed()
    }
}
