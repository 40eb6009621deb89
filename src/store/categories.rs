//! Category storage, keyed by name.
//!
//! Deleting a category never touches transactions: they keep the name they were filed
//! under and stay reachable through date-range and category queries.

use super::{EntityKind, LiveQuery, LiveSource, RecordStore};
use crate::{
    entities::{Category, category},
    errors::{Error, Result},
};
use sea_orm::{
    PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*,
    sea_query::OnConflict,
};
use tracing::{debug, info, instrument};

fn normalize(mut category: category::Model) -> Result<category::Model> {
    let trimmed = category.name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("Category name cannot be empty"));
    }
    category.name = trimmed.to_string();
    Ok(category)
}

async fn upsert_categories<C>(db: &C, categories: Vec<category::Model>) -> Result<()>
where
    C: ConnectionTrait,
{
    let models = categories.into_iter().map(|c| category::ActiveModel {
        name: Set(c.name),
        is_default: Set(c.is_default),
    });
    Category::insert_many(models)
        .on_conflict(
            OnConflict::column(category::Column::Name)
                .update_column(category::Column::IsDefault)
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Live view of every category, ordered by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllCategories;

impl LiveSource for AllCategories {
    type Output = Vec<category::Model>;

    fn depends_on(&self) -> &'static [EntityKind] {
        &[EntityKind::Categories]
    }

    async fn fetch(&self, store: &RecordStore) -> Result<Self::Output> {
        store.all_categories().await
    }
}

impl RecordStore {
    /// Inserts the category or replaces the one with the same name.
    #[instrument(skip(self, category), fields(name = %category.name))]
    pub async fn put_category(&self, category: category::Model) -> Result<()> {
        let category = normalize(category)?;
        let _lane = self.lane(EntityKind::Categories).await;
        upsert_categories(self.db.as_ref(), vec![category]).await?;
        self.publish(EntityKind::Categories);
        Ok(())
    }

    /// Upserts several categories in one atomic write.
    pub async fn put_categories(&self, categories: Vec<category::Model>) -> Result<usize> {
        let categories = categories
            .into_iter()
            .map(normalize)
            .collect::<Result<Vec<_>>>()?;
        if categories.is_empty() {
            return Ok(0);
        }
        let count = categories.len();

        let _lane = self.lane(EntityKind::Categories).await;
        let txn = self.db.begin().await?;
        upsert_categories(&txn, categories).await?;
        txn.commit().await?;
        self.publish(EntityKind::Categories);
        Ok(count)
    }

    /// Point lookup by name.
    pub async fn get_category(&self, name: &str) -> Result<Option<category::Model>> {
        Category::find_by_id(name.trim().to_string())
            .one(self.db.as_ref())
            .await
            .map_err(Into::into)
    }

    /// Removes the category. Transactions filed under it are left untouched.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, name: &str) -> Result<bool> {
        let _lane = self.lane(EntityKind::Categories).await;
        let result = Category::delete_by_id(name.trim().to_string())
            .exec(self.db.as_ref())
            .await?;
        let deleted = result.rows_affected > 0;
        if deleted {
            self.publish(EntityKind::Categories);
        }
        Ok(deleted)
    }

    /// Snapshot of every category, ordered by name.
    pub async fn all_categories(&self) -> Result<Vec<category::Model>> {
        Category::find()
            .order_by_asc(category::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(Into::into)
    }

    /// Names of every known category, ordered.
    pub async fn category_names(&self) -> Result<Vec<String>> {
        Category::find()
            .select_only()
            .column(category::Column::Name)
            .order_by_asc(category::Column::Name)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(Into::into)
    }

    /// Seeds the default categories on first run. Does nothing once any category exists.
    /// Returns the number of categories inserted.
    #[instrument(skip(self, names))]
    pub async fn seed_default_categories(&self, names: &[String]) -> Result<usize> {
        let _lane = self.lane(EntityKind::Categories).await;
        let existing = Category::find().count(self.db.as_ref()).await?;
        if existing > 0 {
            debug!("{} categories already present, skipping seed", existing);
            return Ok(0);
        }

        let defaults = names
            .iter()
            .map(|name| {
                normalize(category::Model {
                    name: name.clone(),
                    is_default: true,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if defaults.is_empty() {
            return Ok(0);
        }
        let count = defaults.len();

        let txn = self.db.begin().await?;
        upsert_categories(&txn, defaults).await?;
        txn.commit().await?;
        self.publish(EntityKind::Categories);

        info!("Seeded {} default categories", count);
        Ok(count)
    }

    /// Live view of every category.
    pub fn list_categories(&self) -> LiveQuery<Vec<category::Model>> {
        self.subscribe(AllCategories)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_put_get_delete_category() -> Result<()> {
        let store = setup_test_store().await?;
        store.put_category(category::Model::named("  Pets ")).await?;

        let found = store.get_category("Pets").await?.unwrap();
        assert_eq!(found.name, "Pets");
        assert!(!found.is_default);

        assert!(store.delete_category("Pets").await?);
        assert!(store.get_category("Pets").await?.is_none());
        assert!(!store.delete_category("Pets").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_put_category_upserts_by_name() -> Result<()> {
        let store = setup_test_store().await?;
        store
            .put_category(category::Model {
                name: "Food".to_string(),
                is_default: true,
            })
            .await?;
        store.put_category(category::Model::named("Food")).await?;

        let all = store.all_categories().await?;
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_default);
        Ok(())
    }

    #[tokio::test]
    async fn test_blank_category_name_rejected() -> Result<()> {
        let store = setup_test_store().await?;
        let result = store.put_category(category::Model::named("   ")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_deleting_category_keeps_its_transactions() -> Result<()> {
        let store = setup_test_store().await?;
        store.put_category(category::Model::named("Food")).await?;
        store
            .put_transactions(vec![
                test_transaction("lunch", 12.0, "Food", 1_000, true),
                test_transaction("dinner", 30.0, "Food", 2_000, true),
            ])
            .await?;

        store.delete_category("Food").await?;

        let lunch = store.get_transaction("lunch").await?.unwrap();
        assert_eq!(lunch.category, "Food");
        assert_eq!(store.transactions_in_range(0, 10_000).await?.len(), 2);
        assert_eq!(
            store.transactions_in_category("Food", 0, 10_000).await?.len(),
            2
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_only_on_first_run() -> Result<()> {
        let store = setup_test_store().await?;
        let names = vec!["Food".to_string(), "Bills".to_string()];

        assert_eq!(store.seed_default_categories(&names).await?, 2);
        assert_eq!(store.seed_default_categories(&names).await?, 0);

        let all = store.all_categories().await?;
        assert!(all.iter().all(|c| c.is_default));
        assert_eq!(store.category_names().await?, vec!["Bills", "Food"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_skipped_when_user_categories_exist() -> Result<()> {
        let store = setup_test_store().await?;
        store.put_category(category::Model::named("Custom")).await?;

        let inserted = store
            .seed_default_categories(&["Food".to_string()])
            .await?;
        assert_eq!(inserted, 0);
        assert_eq!(store.category_names().await?, vec!["Custom"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_live_categories_follow_writes() -> Result<()> {
        let store = setup_test_store().await?;
        let mut live = store.list_categories();
        assert!(live.next().await.unwrap().is_empty());

        store
            .put_categories(vec![
                category::Model::named("Travel"),
                category::Model::named("Gifts"),
            ])
            .await?;
        let names: Vec<String> = live.next().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Gifts", "Travel"]);
        Ok(())
    }
}
