//! Promise-style async results.
//!
//! A [`Promise`] is an operation already running on the tokio runtime. It
//! resolves with a value or rejects with an [`OperationError`]. Promises are
//! eager: dropping one does not cancel the work behind it.
//!
//! ```rust,no_run
//! # use smartstore::{Promise, SmartStoreClient, ClientConfig};
//! # use smartstore::core::IndexSpec;
//! # use smartstore::engine::MemoryEngine;
//! # async fn example() {
//! let client = SmartStoreClient::new(MemoryEngine::new(), ClientConfig::default());
//! let created = client
//!     .global_store("cookbook")
//!     .then(|store| {
//!         let indices = vec![IndexSpec::string("key").unwrap()];
//!         store.promises().register_soup("recipes", indices)
//!     })
//!     .catch(|err| {
//!         eprintln!("{err}");
//!         Promise::resolved(false)
//!     })
//!     .await;
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::task::JoinHandle;

use crate::error::{Operation, OperationError, StoreError};

type Outcome<T> = std::result::Result<T, OperationError>;

enum State<T> {
    /// Settled without running a task.
    Settled(Option<Outcome<T>>),
    /// Running on the runtime.
    Running(JoinHandle<Outcome<T>>),
}

/// A deferred result: `Pending → Resolved(value) | Rejected(error)`.
///
/// Creating a running promise requires a tokio runtime.
#[must_use = "a promise does nothing useful unless awaited or chained"]
pub struct Promise<T> {
    operation: Operation,
    state: State<T>,
}

// Fields are never pinned structurally.
impl<T> Unpin for Promise<T> {}

impl<T: Send + 'static> Promise<T> {
    /// Start an operation on the runtime.
    pub fn new<F>(operation: Operation, fut: F) -> Self
    where
        F: Future<Output = Result<T, StoreError>> + Send + 'static,
    {
        Self::spawn(operation, async move {
            fut.await.map_err(|error| {
                tracing::debug!(%operation, %error, "operation rejected");
                OperationError::new(operation, error)
            })
        })
    }

    fn spawn<F>(operation: Operation, fut: F) -> Self
    where
        F: Future<Output = Outcome<T>> + Send + 'static,
    {
        Self {
            operation,
            state: State::Running(tokio::spawn(fut)),
        }
    }

    /// An already resolved promise.
    pub fn resolved(value: T) -> Self {
        Self {
            operation: Operation::Chain,
            state: State::Settled(Some(Ok(value))),
        }
    }

    /// An already rejected promise.
    pub fn rejected(error: OperationError) -> Self {
        Self {
            operation: error.operation,
            state: State::Settled(Some(Err(error))),
        }
    }

    /// The operation this promise reports failures under.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Run `f` with the value once this promise resolves.
    ///
    /// A rejection skips `f` and passes through unchanged.
    pub fn then<U, F>(self, f: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Promise<U> + Send + 'static,
    {
        Promise::spawn(Operation::Chain, async move {
            let value = self.await?;
            f(value).await
        })
    }

    /// Transform the resolved value.
    pub fn map<U, F>(self, f: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Promise::spawn(Operation::Chain, async move { self.await.map(f) })
    }

    /// Handle a rejection by returning a recovery promise.
    ///
    /// A resolved value skips `f` and passes through unchanged.
    pub fn catch<F>(self, f: F) -> Promise<T>
    where
        F: FnOnce(OperationError) -> Promise<T> + Send + 'static,
    {
        Promise::spawn(Operation::Chain, async move {
            match self.await {
                Ok(value) => Ok(value),
                Err(error) => f(error).await,
            }
        })
    }

    /// Run `f` after this promise settles, whatever the outcome.
    pub fn finally<F>(self, f: F) -> Promise<T>
    where
        F: FnOnce() + Send + 'static,
    {
        Promise::spawn(Operation::Chain, async move {
            let outcome = self.await;
            f();
            outcome
        })
    }

    /// Consume the resolved value.
    pub fn done<F>(self, f: F) -> Promise<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.map(f)
    }
}

impl<T> Future for Promise<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            State::Settled(outcome) => {
                Poll::Ready(outcome.take().expect("promise polled after completion"))
            }
            State::Running(task) => match ready!(Pin::new(task).poll(cx)) {
                Ok(outcome) => Poll::Ready(outcome),
                Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
                Err(join) => Poll::Ready(Err(OperationError::new(
                    this.operation,
                    StoreError::StoreUnavailable(format!("runtime shut down: {join}")),
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn soup_missing() -> StoreError {
        StoreError::SoupNotFound("S".into())
    }

    #[tokio::test]
    async fn test_resolves_and_rejects() {
        let ok = Promise::new(Operation::SoupExists, async { Ok(true) });
        assert!(ok.await.unwrap());

        let err = Promise::<bool>::new(Operation::RemoveSoup, async { Err(soup_missing()) })
            .await
            .unwrap_err();
        assert_eq!(err.operation, Operation::RemoveSoup);
        assert_eq!(err.kind(), ErrorKind::SoupNotFound);
    }

    #[tokio::test]
    async fn test_then_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let l1 = Arc::clone(&log);
        let l2 = Arc::clone(&log);
        let l3 = Arc::clone(&log);
        let result = Promise::new(Operation::OpenStore, async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            l1.lock().unwrap().push(1);
            Ok(10)
        })
        .then(move |v| {
            l2.lock().unwrap().push(2);
            Promise::new(Operation::SoupExists, async move { Ok(v + 1) })
        })
        .map(move |v| {
            l3.lock().unwrap().push(3);
            v * 2
        })
        .await
        .unwrap();

        assert_eq!(result, 22);
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_rejection_short_circuits_to_catch() {
        let skipped = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&skipped);

        let recovered = Promise::<bool>::new(Operation::RegisterSoup, async { Err(soup_missing()) })
            .then(move |_| {
                s.fetch_add(1, Ordering::SeqCst);
                Promise::resolved(true)
            })
            .catch(|err| {
                assert_eq!(err.operation, Operation::RegisterSoup);
                Promise::resolved(false)
            })
            .await
            .unwrap();

        assert!(!recovered);
        assert_eq!(skipped.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_finally_runs_on_both_outcomes() {
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        Promise::new(Operation::SoupExists, async { Ok(()) })
            .finally(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        let c = Arc::clone(&count);
        let err = Promise::<()>::new(Operation::RemoveSoup, async { Err(soup_missing()) })
            .finally(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap_err();

        assert_eq!(err.operation, Operation::RemoveSoup);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropped_promise_still_runs() {
        let (tx, rx) = tokio::sync::oneshot::channel();

        drop(Promise::new(Operation::OpenStore, async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(());
            Ok(())
        }));

        tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("operation was cancelled")
            .unwrap();
    }

    #[tokio::test]
    async fn test_done_consumes_value() {
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);

        Promise::resolved(7)
            .done(move |v| *s.lock().unwrap() = Some(v))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), Some(7));
    }
}
