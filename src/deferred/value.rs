// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deferred<T> - a value resolved later by the backend

use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt::Debug;
use std::future::Future;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::errors::BackendError;

/// Outcome of a deferred value
pub type Resolution<T> = Result<T, BackendError>;

/// A value that resolves once, asynchronously, and can be shared
///
/// Backed by a shared boxed future, so cloning is cheap and every clone sees
/// the same [`Resolution`].
///
/// Inside a tokio runtime every deferred value is driven by its own task from
/// the moment it is built, so a continuation fires when its input resolves
/// whether or not anyone is awaiting it yet. Outside a runtime the value only
/// makes progress while awaited.
pub struct Deferred<T> {
    inner: Shared<BoxFuture<'static, Resolution<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Deferred<{}>", std::any::type_name::<T>())
    }
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap a future that produces the resolution
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Resolution<T>> + Send + 'static,
    {
        let inner = future.boxed().shared();
        if let Ok(runtime) = Handle::try_current() {
            runtime.spawn(inner.clone());
        }
        Self { inner }
    }

    /// A value that is already known
    pub fn resolved(value: T) -> Self {
        Self::from_future(futures::future::ready(Ok(value)))
    }

    /// A value that is already known to have failed
    pub fn failed(error: BackendError) -> Self {
        Self::from_future(futures::future::ready(Err(error)))
    }

    /// Resolve from the completion side of a oneshot channel
    ///
    /// If the sender is dropped without sending, the value resolves to
    /// [`BackendError::Abandoned`] naming `subject`.
    pub fn from_receiver(
        receiver: oneshot::Receiver<Resolution<T>>,
        subject: impl Into<String>,
    ) -> Self {
        let subject = subject.into();
        Self::from_future(async move {
            receiver
                .await
                .unwrap_or(Err(BackendError::Abandoned { name: subject }))
        })
    }

    /// Transform the resolved value
    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let inner = self.inner.clone();
        Deferred::from_future(async move { inner.await.map(f) })
    }

    /// Transform the resolved value with a step that may itself fail
    pub fn try_map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Resolution<U> + Send + 'static,
    {
        let inner = self.inner.clone();
        Deferred::from_future(async move { inner.await.and_then(f) })
    }

    /// Chain a dependent deferred value onto this one
    ///
    /// `f` runs only after this value resolves successfully, which makes it
    /// the place to issue requests that need the resolved value as input.
    pub fn and_then<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Deferred<U> + Send + 'static,
    {
        let inner = self.inner.clone();
        Deferred::from_future(async move {
            let value = inner.await?;
            f(value).resolve().await
        })
    }

    /// Wait for the resolution
    pub async fn resolve(&self) -> Resolution<T> {
        self.inner.clone().await
    }

    /// The resolution, if it has already happened
    pub fn peek(&self) -> Option<Resolution<T>> {
        self.inner.peek().cloned()
    }

    /// Whether the value has resolved (successfully or not)
    pub fn is_resolved(&self) -> bool {
        self.inner.peek().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_resolved_value() {
        let value = Deferred::resolved(42);
        assert_eq!(value.resolve().await, Ok(42));
    }

    #[tokio::test]
    async fn test_map_preserves_failure() {
        let err = BackendError::Abandoned {
            name: "node-0".to_string(),
        };
        let value: Deferred<i32> = Deferred::failed(err.clone());
        let doubled = value.map(|x| x * 2);
        assert_eq!(doubled.resolve().await, Err(err));
    }

    #[tokio::test]
    async fn test_map_resolves_when_input_resolves() {
        let (tx, rx) = oneshot::channel();
        let raw = Deferred::from_receiver(rx, "node-0");
        let mapped = raw.map(|s: String| s.len());

        assert!(mapped.peek().is_none());

        tx.send(Ok("12345".to_string())).unwrap();
        assert_eq!(mapped.resolve().await, Ok(5));
        assert!(mapped.is_resolved());
    }

    #[tokio::test]
    async fn test_dropped_sender_resolves_abandoned() {
        let (tx, rx) = oneshot::channel::<Resolution<String>>();
        let value = Deferred::from_receiver(rx, "worker-2");
        drop(tx);

        assert_eq!(
            value.resolve().await,
            Err(BackendError::Abandoned {
                name: "worker-2".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_and_then_runs_after_resolution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_step = calls.clone();

        let (tx, rx) = oneshot::channel();
        let balancer_id = Deferred::from_receiver(rx, "LoadBalancer");
        let config = balancer_id.and_then(move |id: u64| {
            calls_in_step.fetch_add(1, Ordering::SeqCst);
            Deferred::resolved(format!("config-for-{id}"))
        });

        // attaching the continuation does not run it
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tx.send(Ok(7)).unwrap();
        assert_eq!(config.resolve().await, Ok("config-for-7".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_and_then_skipped_on_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_step = calls.clone();

        let value: Deferred<u64> = Deferred::failed(BackendError::Http("down".to_string()));
        let chained = value.and_then(move |id| {
            calls_in_step.fetch_add(1, Ordering::SeqCst);
            Deferred::resolved(id)
        });

        assert!(chained.resolve().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clones_share_one_resolution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_future = calls.clone();
        let value = Deferred::from_future(async move {
            calls_in_future.fetch_add(1, Ordering::SeqCst);
            Ok("101".to_string())
        });

        let a = value.clone();
        let b = value.clone();
        assert_eq!(a.resolve().await, b.resolve().await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_continuation_fires_without_being_awaited() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_step = calls.clone();

        let (tx, rx) = oneshot::channel();
        let key = Deferred::from_receiver(rx, "private-key");
        let request = key.and_then(move |pem: String| {
            calls_in_step.fetch_add(1, Ordering::SeqCst);
            Deferred::resolved(format!("csr-from-{pem}"))
        });

        tx.send(Ok("key".to_string())).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(request.peek(), Some(Ok("csr-from-key".to_string())));
    }

    #[test]
    fn test_resolves_without_runtime_features() {
        let value = Deferred::resolved("abc".to_string()).try_map(|s| Ok(s.to_uppercase()));
        assert_eq!(tokio_test::block_on(value.resolve()), Ok("ABC".to_string()));
    }
}
