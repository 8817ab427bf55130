//! Run synchronous work off the scheduling thread.
//!
//! Hook implementations that have to call blocking APIs (sync SDKs, file
//! system walks, CPU-heavy parsing) wrap them with [`run_blocking`] or adapt
//! the function once with [`offload`]. The runner itself never offloads.

use crate::error::{Result, RunnerError};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// Execute `work` on tokio's blocking pool and await its result.
///
/// # Errors
///
/// [`RunnerError::Offload`] if `work` panicked or the blocking task was
/// cancelled by runtime shutdown.
pub async fn run_blocking<F, T>(work: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| RunnerError::Offload(e.to_string()))
}

/// Adapt a synchronous function into an async one backed by [`run_blocking`].
///
/// ```rust,ignore
/// let read = offload(|path: PathBuf| std::fs::read_to_string(path));
/// let contents = read(path).await??;
/// ```
pub fn offload<A, T, F>(func: F) -> impl Fn(A) -> BoxFuture<'static, Result<T>> + Send + Sync
where
    F: Fn(A) -> T + Send + Sync + 'static,
    A: Send + 'static,
    T: Send + 'static,
{
    let func = Arc::new(func);
    move |arg: A| {
        let func = Arc::clone(&func);
        run_blocking(move || func(arg)).boxed()
    }
}
