//! Budget storage, keyed by the composite `(month, year)`.
//!
//! A month without a row means "no budget set", which is different from a zero budget.

use super::{EntityKind, LiveQuery, LiveSource, RecordStore};
use crate::{
    entities::{Budget, budget},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::OnConflict};
use tracing::instrument;

/// Rejects months outside `1..=12` and negative or non-finite amounts.
pub fn validate_budget(budget: &budget::Model) -> Result<()> {
    if !(1..=12).contains(&budget.month) {
        return Err(Error::InvalidPeriod {
            month: budget.month,
            year: budget.year,
        });
    }
    if !budget.amount.is_finite() || budget.amount < 0.0 {
        return Err(Error::InvalidAmount {
            amount: budget.amount,
        });
    }
    Ok(())
}

/// Live view of every budget, most recent month first.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllBudgets;

impl LiveSource for AllBudgets {
    type Output = Vec<budget::Model>;

    fn depends_on(&self) -> &'static [EntityKind] {
        &[EntityKind::Budgets]
    }

    async fn fetch(&self, store: &RecordStore) -> Result<Self::Output> {
        store.all_budgets().await
    }
}

impl RecordStore {
    /// Sets the budget for its `(month, year)`, replacing any existing one.
    #[instrument(skip(self))]
    pub async fn put_budget(&self, budget: budget::Model) -> Result<()> {
        validate_budget(&budget)?;
        let _lane = self.lane(EntityKind::Budgets).await;
        Budget::insert(budget::ActiveModel {
            month: Set(budget.month),
            year: Set(budget.year),
            amount: Set(budget.amount),
        })
        .on_conflict(
            OnConflict::columns([budget::Column::Month, budget::Column::Year])
                .update_column(budget::Column::Amount)
                .to_owned(),
        )
        .exec_without_returning(self.db.as_ref())
        .await?;
        self.publish(EntityKind::Budgets);
        Ok(())
    }

    /// The budget for one month, if set.
    pub async fn get_budget(&self, month: i32, year: i32) -> Result<Option<budget::Model>> {
        Budget::find_by_id((month, year))
            .one(self.db.as_ref())
            .await
            .map_err(Into::into)
    }

    /// Removes the budget for one month. Returns `false` when none was set.
    #[instrument(skip(self))]
    pub async fn delete_budget(&self, month: i32, year: i32) -> Result<bool> {
        let _lane = self.lane(EntityKind::Budgets).await;
        let result = Budget::delete_by_id((month, year)).exec(self.db.as_ref()).await?;
        let deleted = result.rows_affected > 0;
        if deleted {
            self.publish(EntityKind::Budgets);
        }
        Ok(deleted)
    }

    /// Snapshot of every budget, most recent month first.
    pub async fn all_budgets(&self) -> Result<Vec<budget::Model>> {
        Budget::find()
            .order_by_desc(budget::Column::Year)
            .order_by_desc(budget::Column::Month)
            .all(self.db.as_ref())
            .await
            .map_err(Into::into)
    }

    /// Live view of every budget.
    pub fn list_budgets(&self) -> LiveQuery<Vec<budget::Model>> {
        self.subscribe(AllBudgets)
    }
}
