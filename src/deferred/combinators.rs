// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deferred Combinators
//!
//! Multi-value joins over [`Deferred`] values. Both joins keep input order,
//! regardless of the order in which the inputs resolve.

use super::value::{Deferred, Resolution};

/// Join deferred values, failing with the first error encountered
///
/// # Examples
///
/// ```rust
/// use cluster_topology::deferred::{join_all, Deferred};
///
/// # tokio_test::block_on(async {
/// let all = join_all(vec![Deferred::resolved(1), Deferred::resolved(2)]);
/// assert_eq!(all.resolve().await, Ok(vec![1, 2]));
/// # });
/// ```
pub fn join_all<T>(values: Vec<Deferred<T>>) -> Deferred<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    Deferred::from_future(async move {
        futures::future::try_join_all(values.iter().map(Deferred::resolve)).await
    })
}

/// Join deferred values, keeping every individual outcome
///
/// Never fails itself; a failed input appears as an `Err` at its position.
pub fn join_settled<T>(values: Vec<Deferred<T>>) -> Deferred<Vec<Resolution<T>>>
where
    T: Clone + Send + Sync + 'static,
{
    Deferred::from_future(async move {
        Ok(futures::future::join_all(values.iter().map(Deferred::resolve)).await)
    })
}
