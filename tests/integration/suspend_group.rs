//! Suspend groups over live runners.

use crate::helpers::{counted_runner, wait_for_loops, wait_for_state};
use monitor_runner::{HookKind, RunnerError, TaskState, suspend_all, with_suspended};
use std::sync::Arc;

#[tokio::test]
async fn group_suspends_both_runners_before_body_and_restarts_after() {
    let (a, a_counts) = counted_runner(0.0, 0.0);
    let (b, b_counts) = counted_runner(0.0, 0.0);
    let mut a = a.with_name("a");
    let mut b = b.with_name("b");

    let a_handle = a.enter().await.expect("enter a");
    let b_handle = b.enter().await.expect("enter b");
    wait_for_loops(&a_counts, 0).await;
    wait_for_loops(&b_counts, 0).await;

    {
        let guard = suspend_all([&a_handle, &b_handle]);
        assert_eq!(a_handle.state().unwrap(), TaskState::Suspended);
        assert_eq!(b_handle.state().unwrap(), TaskState::Suspended);
        let names: Vec<&str> = guard.runners().iter().map(|h| h.name()).collect();
        assert_eq!(names, ["a", "b"]);

        wait_for_state(&a_handle, TaskState::Stopped).await;
        wait_for_state(&b_handle, TaskState::Stopped).await;
    }

    assert!(matches!(
        a_handle.state(),
        Ok(TaskState::Restarted | TaskState::Running)
    ));
    wait_for_state(&a_handle, TaskState::Running).await;
    wait_for_state(&b_handle, TaskState::Running).await;

    a.done();
    b.done();
    a.exit().await.expect("exit a");
    b.exit().await.expect("exit b");

    for counts in [&a_counts, &b_counts] {
        assert_eq!(counts.get(HookKind::Suspend), 1);
        assert_eq!(counts.get(HookKind::Restart), 1);
        assert_eq!(counts.get(HookKind::End), 1);
    }
}

#[tokio::test]
async fn group_restarts_runners_when_body_fails() {
    let (mut runner, counts) = counted_runner(0.0, 0.0);

    let result: Result<(), RunnerError> = runner
        .scope(|handle| {
            let counts = Arc::clone(&counts);
            async move {
                wait_for_loops(&counts, 0).await;
                let suspended = &handle;
                let inner: Result<(), RunnerError> =
                    with_suspended([suspended], move || async move {
                        wait_for_state(suspended, TaskState::Stopped).await;
                        Err(RunnerError::Hook("maintenance step failed".to_owned()))
                    })
                    .await;
                assert!(inner.is_err());

                wait_for_state(&handle, TaskState::Running).await;
                handle.done();
                inner
            }
        })
        .await;

    assert!(matches!(result, Err(RunnerError::Hook(_))));
    assert_eq!(counts.get(HookKind::Suspend), 1);
    assert_eq!(counts.get(HookKind::Restart), 1);
    assert_eq!(counts.get(HookKind::End), 1);
}

#[tokio::test]
async fn loop_hook_does_not_run_inside_group() {
    let (mut runner, counts) = counted_runner(0.0, 0.0);
    let handle = runner.enter().await.expect("enter");
    wait_for_loops(&counts, 0).await;

    let (suspended, loop_counts) = (&handle, &counts);
    with_suspended([suspended], move || async move {
        wait_for_state(suspended, TaskState::Stopped).await;
        let before = loop_counts.get(HookKind::Loop);
        for _ in 0..100 {
            tokio::task::yield_now().await;
        }
        assert_eq!(loop_counts.get(HookKind::Loop), before);
    })
    .await;

    wait_for_loops(&counts, counts.get(HookKind::Loop)).await;
    runner.exit().await.expect("exit");
}
