//! Transaction storage - upserts, point lookups, range queries and sums.
//!
//! Writes are keyed by `id` and replace the whole record. Range bounds are inclusive on
//! both ends and compare epoch milliseconds. Sums over ranges with no matching rows are
//! `0.0`, never an error.

use super::{EntityKind, LiveQuery, LiveSource, RecordStore};
use crate::{
    entities::{Transaction, transaction},
    errors::{Error, Result},
};
use sea_orm::{
    PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*,
    sea_query::OnConflict,
};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Rows per INSERT statement, well under `SQLite`'s bound-parameter limit.
const UPSERT_CHUNK: usize = 100;

/// Rejects records that would break the store's invariants.
pub fn validate_transaction(transaction: &transaction::Model) -> Result<()> {
    if transaction.id.trim().is_empty() {
        return Err(Error::validation("Transaction id cannot be empty"));
    }
    if !transaction.amount.is_finite() || transaction.amount < 0.0 {
        return Err(Error::InvalidAmount {
            amount: transaction.amount,
        });
    }
    Ok(())
}

fn to_active_model(transaction: transaction::Model) -> transaction::ActiveModel {
    transaction::ActiveModel {
        id: Set(transaction.id),
        title: Set(transaction.title),
        amount: Set(transaction.amount),
        category: Set(transaction.category),
        date: Set(transaction.date),
        is_expense: Set(transaction.is_expense),
    }
}

/// Collapses repeated ids, keeping the position of the first occurrence and the
/// contents of the last.
fn last_write_per_id(transactions: Vec<transaction::Model>) -> Vec<transaction::Model> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(transactions.len());
    let mut unique: Vec<transaction::Model> = Vec::with_capacity(transactions.len());
    for transaction in transactions {
        if let Some(&position) = positions.get(&transaction.id) {
            unique[position] = transaction;
        } else {
            positions.insert(transaction.id.clone(), unique.len());
            unique.push(transaction);
        }
    }
    unique
}

/// Inserts or fully replaces each transaction by `id`. Returns the number of distinct
/// ids written. Callers wanting all-or-nothing pass an open database transaction.
pub async fn upsert_transactions<C>(db: &C, transactions: Vec<transaction::Model>) -> Result<usize>
where
    C: ConnectionTrait,
{
    let unique = last_write_per_id(transactions);
    for chunk in unique.chunks(UPSERT_CHUNK) {
        Transaction::insert_many(chunk.iter().cloned().map(to_active_model))
            .on_conflict(
                OnConflict::column(transaction::Column::Id)
                    .update_columns([
                        transaction::Column::Title,
                        transaction::Column::Amount,
                        transaction::Column::Category,
                        transaction::Column::Date,
                        transaction::Column::IsExpense,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }
    Ok(unique.len())
}

/// Live query over the transaction table, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionQuery {
    /// Every transaction
    All,
    /// Transactions with `start <= date <= end`
    DateRange {
        /// Inclusive lower bound, epoch ms
        start: i64,
        /// Inclusive upper bound, epoch ms
        end: i64,
    },
    /// Transactions in one category with `start <= date <= end`
    Category {
        /// Category name
        name: String,
        /// Inclusive lower bound, epoch ms
        start: i64,
        /// Inclusive upper bound, epoch ms
        end: i64,
    },
}

impl LiveSource for TransactionQuery {
    type Output = Vec<transaction::Model>;

    fn depends_on(&self) -> &'static [EntityKind] {
        &[EntityKind::Transactions]
    }

    async fn fetch(&self, store: &RecordStore) -> Result<Self::Output> {
        match self {
            Self::All => store.all_transactions().await,
            Self::DateRange { start, end } => store.transactions_in_range(*start, *end).await,
            Self::Category { name, start, end } => {
                store.transactions_in_category(name, *start, *end).await
            }
        }
    }
}

impl RecordStore {
    /// Inserts the transaction, replacing any existing record with the same id.
    #[instrument(skip(self, transaction), fields(id = %transaction.id))]
    pub async fn put_transaction(&self, transaction: transaction::Model) -> Result<()> {
        validate_transaction(&transaction)?;
        let _lane = self.lane(EntityKind::Transactions).await;
        upsert_transactions(self.db.as_ref(), vec![transaction]).await?;
        self.publish(EntityKind::Transactions);
        debug!("Transaction stored");
        Ok(())
    }

    /// Upserts many transactions atomically: either all are written or none are.
    #[instrument(skip(self, transactions), fields(count = transactions.len()))]
    pub async fn put_transactions(&self, transactions: Vec<transaction::Model>) -> Result<usize> {
        for transaction in &transactions {
            validate_transaction(transaction)?;
        }
        if transactions.is_empty() {
            return Ok(0);
        }

        let _lane = self.lane(EntityKind::Transactions).await;
        let txn = self.db.begin().await?;
        let written = upsert_transactions(&txn, transactions).await?;
        txn.commit().await?;
        self.publish(EntityKind::Transactions);

        info!("Stored {} transactions", written);
        Ok(written)
    }

    /// Fully replaces an existing transaction. Returns `false`, writing nothing, when no
    /// transaction has this id.
    #[instrument(skip(self, transaction), fields(id = %transaction.id))]
    pub async fn update_transaction(&self, transaction: transaction::Model) -> Result<bool> {
        validate_transaction(&transaction)?;
        let _lane = self.lane(EntityKind::Transactions).await;

        let id = transaction.id.clone();
        let mut active = to_active_model(transaction);
        active.id = sea_orm::ActiveValue::NotSet;
        let result = Transaction::update_many()
            .set(active)
            .filter(transaction::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;

        let updated = result.rows_affected > 0;
        if updated {
            self.publish(EntityKind::Transactions);
        } else {
            debug!("Update skipped, transaction does not exist");
        }
        Ok(updated)
    }

    /// Point lookup. A missing id is `Ok(None)`.
    pub async fn get_transaction(&self, id: &str) -> Result<Option<transaction::Model>> {
        Transaction::find_by_id(id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(Into::into)
    }

    /// Deletes by id. Deleting an unknown id is a no-op returning `false`.
    #[instrument(skip(self))]
    pub async fn delete_transaction(&self, id: &str) -> Result<bool> {
        let _lane = self.lane(EntityKind::Transactions).await;
        let result = Transaction::delete_by_id(id.to_string())
            .exec(self.db.as_ref())
            .await?;

        let deleted = result.rows_affected > 0;
        if deleted {
            self.publish(EntityKind::Transactions);
        }
        Ok(deleted)
    }

    /// Snapshot of every transaction, newest first.
    pub async fn all_transactions(&self) -> Result<Vec<transaction::Model>> {
        Transaction::find()
            .order_by_desc(transaction::Column::Date)
            .all(self.db.as_ref())
            .await
            .map_err(Into::into)
    }

    /// Transactions dated within `[start, end]`, newest first.
    pub async fn transactions_in_range(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<transaction::Model>> {
        Transaction::find()
            .filter(transaction::Column::Date.between(start, end))
            .order_by_desc(transaction::Column::Date)
            .all(self.db.as_ref())
            .await
            .map_err(Into::into)
    }

    /// Transactions in `category` dated within `[start, end]`, newest first.
    pub async fn transactions_in_category(
        &self,
        category: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<transaction::Model>> {
        Transaction::find()
            .filter(transaction::Column::Category.eq(category))
            .filter(transaction::Column::Date.between(start, end))
            .order_by_desc(transaction::Column::Date)
            .all(self.db.as_ref())
            .await
            .map_err(Into::into)
    }

    /// Number of stored transactions.
    pub async fn transaction_count(&self) -> Result<u64> {
        Transaction::find()
            .count(self.db.as_ref())
            .await
            .map_err(Into::into)
    }

    /// Total expense amount dated within `[start, end]`; `0.0` when nothing matches.
    pub async fn sum_expenses(&self, start: i64, end: i64) -> Result<f64> {
        self.sum_amounts(true, start, end).await
    }

    /// Total income amount dated within `[start, end]`; `0.0` when nothing matches.
    pub async fn sum_income(&self, start: i64, end: i64) -> Result<f64> {
        self.sum_amounts(false, start, end).await
    }

    async fn sum_amounts(&self, is_expense: bool, start: i64, end: i64) -> Result<f64> {
        let amounts: Vec<f64> = Transaction::find()
            .select_only()
            .column(transaction::Column::Amount)
            .filter(transaction::Column::IsExpense.eq(is_expense))
            .filter(transaction::Column::Date.between(start, end))
            .into_tuple()
            .all(self.db.as_ref())
            .await?;
        Ok(amounts.into_iter().sum())
    }

    /// Live view of every transaction, newest first.
    pub fn list_all(&self) -> LiveQuery<Vec<transaction::Model>> {
        self.subscribe(TransactionQuery::All)
    }

    /// Live view of transactions within `[start, end]`.
    pub fn list_by_date_range(&self, start: i64, end: i64) -> LiveQuery<Vec<transaction::Model>> {
        self.subscribe(TransactionQuery::DateRange { start, end })
    }

    /// Live view of one category's transactions within `[start, end]`.
    pub fn list_by_category(
        &self,
        name: impl Into<String>,
        start: i64,
        end: i64,
    ) -> LiveQuery<Vec<transaction::Model>> {
        self.subscribe(TransactionQuery::Category {
            name: name.into(),
            start,
            end,
        })
    }
}
