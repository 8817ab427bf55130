//! Runtime bounds: `at_least`, `timeout` and early finish via `done`.

use crate::helpers::counted_runner;
use monitor_runner::{HookKind, RunnerError};
use std::time::{Duration, Instant};

#[tokio::test]
async fn idle_scope_outlives_at_least() {
    let (mut runner, counts) = counted_runner(0.7, 0.0);

    let started = Instant::now();
    runner
        .scope(|_handle| async { Ok::<(), RunnerError>(()) })
        .await
        .expect("scope");
    let elapsed = started.elapsed();

    assert!(elapsed > Duration::from_millis(700), "elapsed {elapsed:?}");
    assert!(counts.get(HookKind::Loop) > 0);
    assert_eq!(counts.get(HookKind::End), 1);
}

#[tokio::test]
async fn scope_without_done_outlives_timeout() {
    let (mut runner, _counts) = counted_runner(0.0, 0.3);

    let started = Instant::now();
    runner.enter().await.expect("enter");
    runner.exit().await.expect("exit");
    let elapsed = started.elapsed();

    assert!(elapsed > Duration::from_millis(300), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn done_right_away_finishes_well_before_timeout() {
    let (mut runner, _counts) = counted_runner(0.0, 0.7);

    let started = Instant::now();
    runner
        .scope(|handle| async move {
            handle.done();
            Ok::<(), RunnerError>(())
        })
        .await
        .expect("scope");
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(200), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn done_before_at_least_still_waits_and_drains() {
    let (mut runner, counts) = counted_runner(0.4, 5.0);

    let started = Instant::now();
    runner
        .scope(|handle| async move {
            handle.done();
            Ok::<(), RunnerError>(())
        })
        .await
        .expect("scope");
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(400), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "elapsed {elapsed:?}");
    assert!(
        counts.get(HookKind::Loop) > 0,
        "loop hook should keep firing while draining"
    );
}

#[tokio::test]
async fn done_after_at_least_exits_promptly() {
    let (mut runner, _counts) = counted_runner(0.2, 5.0);

    let started = Instant::now();
    runner
        .scope(|handle| async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            handle.done();
            Ok::<(), RunnerError>(())
        })
        .await
        .expect("scope");
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(800), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn zero_bounds_exit_on_first_poll() {
    let (mut runner, counts) = counted_runner(0.0, 0.0);

    let started = Instant::now();
    runner.enter().await.expect("enter");
    runner.exit().await.expect("exit");

    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(counts.get(HookKind::Start), 1);
    assert_eq!(counts.get(HookKind::End), 1);
}
