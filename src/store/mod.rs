//! The record store - the only component allowed to mutate persisted data.
//!
//! [`RecordStore`] is an explicit handle constructed once at start-up and cloned into
//! every component that needs it. Clones share the same connection pool, writer lanes
//! and change feed.
//!
//! Each entity kind has its own writer lane: a write takes the lane's lock, commits, and
//! only then bumps that kind's counter in the [`Revision`] feed. Live queries
//! ([`live::LiveQuery`]) re-run whenever a counter they depend on moves, so they never
//! observe a write that has not been committed.

pub mod budgets;
pub mod categories;
pub mod live;
pub mod system_state;
pub mod transactions;

pub use budgets::AllBudgets;
pub use categories::AllCategories;
pub use live::{LiveQuery, LiveSource};
pub use transactions::TransactionQuery;

use crate::config::database::create_connection;
use crate::errors::Result;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::trace;

/// The persisted collections, each with its own writer lane and change counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Income and expense records
    Transactions,
    /// Category names
    Categories,
    /// Monthly budgets
    Budgets,
}

/// Per-kind count of committed writes that changed at least one row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Revision {
    /// Committed transaction writes
    pub transactions: u64,
    /// Committed category writes
    pub categories: u64,
    /// Committed budget writes
    pub budgets: u64,
}

impl Revision {
    /// Counter for one entity kind.
    #[must_use]
    pub const fn get(&self, kind: EntityKind) -> u64 {
        match kind {
            EntityKind::Transactions => self.transactions,
            EntityKind::Categories => self.categories,
            EntityKind::Budgets => self.budgets,
        }
    }

    const fn bump(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Transactions => self.transactions += 1,
            EntityKind::Categories => self.categories += 1,
            EntityKind::Budgets => self.budgets += 1,
        }
    }

    /// Whether any of `kinds` moved between `earlier` and `self`.
    #[must_use]
    pub fn changed_since(&self, earlier: &Self, kinds: &[EntityKind]) -> bool {
        kinds.iter().any(|kind| self.get(*kind) != earlier.get(*kind))
    }
}

#[derive(Debug, Default)]
struct WriterLanes {
    transactions: Mutex<()>,
    categories: Mutex<()>,
    budgets: Mutex<()>,
}

/// Shared handle to the ledger's persisted state.
#[derive(Debug, Clone)]
pub struct RecordStore {
    db: Arc<DatabaseConnection>,
    lanes: Arc<WriterLanes>,
    changes: Arc<watch::Sender<Revision>>,
}

impl RecordStore {
    /// Wraps an already-initialised connection. Tables must exist.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        let (changes, _) = watch::channel(Revision::default());
        Self {
            db: Arc::new(db),
            lanes: Arc::new(WriterLanes::default()),
            changes: Arc::new(changes),
        }
    }

    /// Connects to `database_url`, creates missing tables and returns the store.
    pub async fn open(database_url: &str) -> Result<Self> {
        let db = create_connection(database_url).await?;
        Ok(Self::new(db))
    }

    /// Current value of the change feed.
    #[must_use]
    pub fn revision(&self) -> Revision {
        *self.changes.borrow()
    }

    /// A receiver that wakes after every committed write of any kind.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<Revision> {
        self.changes.subscribe()
    }

    /// Takes the writer lane for `kind`. Lanes are FIFO, so writes of one kind apply in
    /// submission order.
    pub(crate) async fn lane(&self, kind: EntityKind) -> MutexGuard<'_, ()> {
        let lane = match kind {
            EntityKind::Transactions => &self.lanes.transactions,
            EntityKind::Categories => &self.lanes.categories,
            EntityKind::Budgets => &self.lanes.budgets,
        };
        lane.lock().await
    }

    /// Announces a committed write. Call only after the commit succeeded.
    pub(crate) fn publish(&self, kind: EntityKind) {
        self.changes.send_modify(|revision| revision.bump(kind));
        trace!(?kind, revision = ?self.revision(), "Published store change");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_store;

    #[test]
    fn test_revision_changed_since() {
        let before = Revision::default();
        let mut after = before;
        after.bump(EntityKind::Budgets);

        assert!(after.changed_since(&before, &[EntityKind::Budgets]));
        assert!(after.changed_since(
            &before,
            &[EntityKind::Transactions, EntityKind::Budgets]
        ));
        assert!(!after.changed_since(&before, &[EntityKind::Transactions]));
    }

    #[tokio::test]
    async fn test_clones_share_one_connection() {
        let db = sea_orm::MockDatabase::new(sea_orm::DatabaseBackend::Sqlite)
            .append_query_errors([sea_orm::DbErr::Custom("unavailable".to_string())])
            .append_query_results([Vec::<crate::entities::TransactionModel>::new()])
            .into_connection();
        let store = RecordStore::new(db);
        let clone = store.clone();

        // The first queued result is consumed by the clone, the second by the original
        assert!(clone.get_transaction("x").await.is_err());
        assert!(matches!(store.get_transaction("x").await, Ok(None)));
    }

    #[tokio::test]
    async fn test_publish_wakes_receivers() -> Result<()> {
        let store = setup_test_store().await?;
        let mut changes = store.changes();

        store.publish(EntityKind::Categories);
        changes.changed().await.ok();

        let revision = *changes.borrow_and_update();
        assert_eq!(revision.categories, 1);
        assert_eq!(revision.transactions, 0);
        assert_eq!(store.revision(), revision);
        Ok(())
    }
}
