//! Hook ordering, failure propagation and suspend/restart acknowledgment.

use crate::helpers::{counted_runner, wait_for_loops, wait_for_state};
use monitor_runner::{HookKind, RunnerConfig, RunnerError, TaskHooks, TaskRunner, TaskState};
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error("probe failed: {0}")]
    Probe(&'static str),
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

#[tokio::test]
async fn start_and_end_run_once_per_scope() {
    let (mut runner, counts) = counted_runner(0.05, 0.0);

    for round in 1..=2 {
        runner
            .scope(|_handle| async { Ok::<(), RunnerError>(()) })
            .await
            .expect("scope");
        assert_eq!(counts.get(HookKind::Start), round);
        assert_eq!(counts.get(HookKind::End), round);
    }
}

#[tokio::test]
async fn body_error_is_returned_and_end_hook_ran() {
    let (mut runner, counts) = counted_runner(0.0, 0.0);

    let result: Result<(), ProbeError> = runner
        .scope(|_handle| async { Err(ProbeError::Probe("sensor offline")) })
        .await;

    assert!(
        matches!(result, Err(ProbeError::Probe("sensor offline"))),
        "result was: {result:?}"
    );
    assert_eq!(counts.get(HookKind::Start), 1);
    assert_eq!(counts.get(HookKind::End), 1);
    assert!(!runner.is_active());
}

#[tokio::test]
async fn body_error_wins_over_hook_failure() {
    let hooks = TaskHooks::new().on_loop(|| async { Err(RunnerError::Hook("loop broke".into())) });
    let mut runner = TaskRunner::new(RunnerConfig::default())
        .expect("runner")
        .with_hooks(hooks);

    let result: Result<(), ProbeError> = runner
        .scope(|_handle| async {
            tokio::task::yield_now().await;
            Err(ProbeError::Probe("body first"))
        })
        .await;

    assert!(matches!(result, Err(ProbeError::Probe("body first"))));
}

#[tokio::test]
async fn hook_failure_propagates_from_scope() {
    let ends = Arc::new(Mutex::new(0_usize));
    let end_counter = Arc::clone(&ends);
    let mut calls = 0_usize;
    let hooks = TaskHooks::new()
        .on_loop(move || {
            calls += 1;
            let result = if calls >= 3 {
                Err(RunnerError::Hook(format!("loop failed on call {calls}")))
            } else {
                Ok(())
            };
            std::future::ready(result)
        })
        .on_end(move || {
            *end_counter.lock().unwrap() += 1;
            std::future::ready(Ok::<(), RunnerError>(()))
        });
    let mut runner = TaskRunner::new(RunnerConfig::new(1.0, 0.0).expect("config"))
        .expect("runner")
        .with_hooks(hooks);

    let result = runner
        .scope(|_handle| async { Ok::<(), RunnerError>(()) })
        .await;

    assert!(
        matches!(result, Err(RunnerError::Hook(ref msg)) if msg == "loop failed on call 3"),
        "result was: {result:?}"
    );
    assert_eq!(*ends.lock().unwrap(), 1);
}

#[tokio::test]
async fn suspend_then_restart_runs_each_hook_once_and_resumes_looping() {
    let (mut runner, counts) = counted_runner(0.0, 0.0);

    runner
        .scope(|handle| {
            let counts = Arc::clone(&counts);
            async move {
                wait_for_loops(&counts, 0).await;

                handle.suspend();
                wait_for_state(&handle, TaskState::Stopped).await;
                let loops_while_stopped = counts.get(HookKind::Loop);

                handle.restart();
                wait_for_state(&handle, TaskState::Running).await;
                wait_for_loops(&counts, loops_while_stopped).await;

                handle.done();
                Ok::<(), RunnerError>(())
            }
        })
        .await
        .expect("scope");

    assert_eq!(counts.get(HookKind::Suspend), 1);
    assert_eq!(counts.get(HookKind::Restart), 1);
    assert_eq!(counts.get(HookKind::End), 1);
}

#[tokio::test]
async fn hooks_fire_in_lifecycle_order() {
    let log = Arc::new(Mutex::new(Vec::<&'static str>::new()));
    let record = |name: &'static str| {
        let log = Arc::clone(&log);
        move || {
            let mut log = log.lock().unwrap();
            if log.last() != Some(&name) {
                log.push(name);
            }
            std::future::ready(Ok::<(), RunnerError>(()))
        }
    };
    let hooks = TaskHooks::new()
        .on_start(record("start"))
        .on_loop(record("loop"))
        .on_suspend(record("suspend"))
        .on_restart(record("restart"))
        .on_end(record("end"));
    let mut runner = TaskRunner::new(RunnerConfig::default())
        .expect("runner")
        .with_hooks(hooks);

    let observed = Arc::clone(&log);
    runner
        .scope(|handle| async move {
            while !observed.lock().unwrap().contains(&"loop") {
                tokio::task::yield_now().await;
            }
            handle.suspend();
            wait_for_state(&handle, TaskState::Stopped).await;
            handle.restart();
            wait_for_state(&handle, TaskState::Running).await;
            handle.done();
            Ok::<(), RunnerError>(())
        })
        .await
        .expect("scope");

    let log = log.lock().unwrap().clone();
    assert_eq!(log.first(), Some(&"start"));
    assert_eq!(log.last(), Some(&"end"));
    let suspend_at = log.iter().position(|n| *n == "suspend").expect("suspend ran");
    let restart_at = log.iter().position(|n| *n == "restart").expect("restart ran");
    assert!(suspend_at < restart_at, "log: {log:?}");
}
