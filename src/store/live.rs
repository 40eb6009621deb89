//! Live query subscriptions.
//!
//! `subscribe(source) -> LiveQuery`; the handle yields a full snapshot every time the
//! result may have changed, and dropping it (or calling [`LiveQuery::unsubscribe`]) stops
//! delivery. Snapshots are recomputed from scratch, never patched.

use super::{EntityKind, RecordStore};
use crate::errors::Result;
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A query whose result can be observed continuously.
pub trait LiveSource: Send + Sync + 'static {
    /// The snapshot type delivered to subscribers.
    type Output: Clone + Send + Sync + 'static;

    /// Entity kinds whose writes can change the result.
    fn depends_on(&self) -> &'static [EntityKind];

    /// Computes the current snapshot.
    fn fetch(&self, store: &RecordStore) -> impl Future<Output = Result<Self::Output>> + Send;
}

/// Subscription handle. Holds the most recent snapshot; a background worker refreshes it.
#[derive(Debug)]
pub struct LiveQuery<T> {
    snapshots: watch::Receiver<Option<T>>,
    worker: JoinHandle<()>,
}

impl<T: Clone> LiveQuery<T> {
    /// Waits for the next snapshot this handle has not yet returned.
    ///
    /// The first call yields the initial result. If several writes land between calls,
    /// only the latest snapshot is returned. `None` means the worker has stopped.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            if self.snapshots.changed().await.is_err() {
                return None;
            }
            if let Some(snapshot) = self.snapshots.borrow_and_update().clone() {
                return Some(snapshot);
            }
        }
    }

    /// The most recent snapshot, if one has been computed yet.
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        self.snapshots.borrow().clone()
    }

    /// Stops delivery.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

impl RecordStore {
    /// Starts observing `source`. Must be called from within a Tokio runtime.
    pub fn subscribe<S: LiveSource>(&self, source: S) -> LiveQuery<S::Output> {
        let (publisher, snapshots) = watch::channel(None);
        let store = self.clone();
        let mut changes = self.changes();

        let worker = tokio::spawn(async move {
            let depends_on = source.depends_on();
            let mut seen = *changes.borrow_and_update();
            loop {
                match source.fetch(&store).await {
                    Ok(snapshot) => {
                        if publisher.send(Some(snapshot)).is_err() {
                            debug!("Live query subscriber gone, stopping worker");
                            return;
                        }
                    }
                    Err(e) => warn!("Live query refresh failed: {}", e),
                }

                loop {
                    if changes.changed().await.is_err() {
                        return;
                    }
                    let current = *changes.borrow_and_update();
                    if current.changed_since(&seen, depends_on) {
                        seen = current;
                        break;
                    }
                }
            }
        });

        LiveQuery { snapshots, worker }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{setup_test_store, test_transaction};
    use std::time::Duration;
    use tokio::time::timeout;

    struct TransactionCount;

    impl LiveSource for TransactionCount {
        type Output = u64;

        fn depends_on(&self) -> &'static [EntityKind] {
            &[EntityKind::Transactions]
        }

        async fn fetch(&self, store: &RecordStore) -> Result<u64> {
            store.transaction_count().await
        }
    }

    #[tokio::test]
    async fn test_first_next_yields_initial_snapshot() -> Result<()> {
        let store = setup_test_store().await?;
        let mut live = store.subscribe(TransactionCount);

        assert_eq!(live.next().await, Some(0));
        assert_eq!(live.latest(), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn test_snapshot_follows_writes() -> Result<()> {
        let store = setup_test_store().await?;
        let mut live = store.subscribe(TransactionCount);
        assert_eq!(live.next().await, Some(0));

        store
            .put_transaction(test_transaction("a", 10.0, "Food", 1_000, true))
            .await?;
        assert_eq!(live.next().await, Some(1));

        store
            .put_transaction(test_transaction("b", 10.0, "Food", 2_000, true))
            .await?;
        assert_eq!(live.next().await, Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_unrelated_writes_do_not_emit() -> Result<()> {
        let store = setup_test_store().await?;
        let mut live = store.subscribe(TransactionCount);
        assert_eq!(live.next().await, Some(0));

        store
            .put_category(crate::entities::CategoryModel::named("Pets"))
            .await?;

        let waited = timeout(Duration::from_millis(100), live.next()).await;
        assert!(waited.is_err(), "category write must not refresh a transaction query");
        Ok(())
    }
}
