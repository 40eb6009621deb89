//! Aggregation over a monthly window.
//!
//! Every function here is a pure function of the store's current contents and is
//! recomputed from scratch on each call. The `*View` types expose the same results as
//! live queries through [`RecordStore::subscribe`].

use super::window::MonthWindow;
use crate::{
    entities::transaction,
    errors::{Error, Result},
    store::{EntityKind, LiveSource, RecordStore},
};
use std::collections::HashMap;
use std::str::FromStr;

/// How many transactions the dashboard's recent list shows.
pub const RECENT_LIMIT: usize = 5;

/// Which side of the ledger a list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionFilter {
    /// Expenses and income
    #[default]
    All,
    /// Only `is_expense == true`
    Expenses,
    /// Only `is_expense == false`
    Income,
}

impl TransactionFilter {
    /// Whether `transaction` passes the filter.
    #[must_use]
    pub const fn matches(self, transaction: &transaction::Model) -> bool {
        match self {
            Self::All => true,
            Self::Expenses => transaction.is_expense,
            Self::Income => !transaction.is_expense,
        }
    }
}

impl FromStr for TransactionFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "expenses" | "expense" => Ok(Self::Expenses),
            "income" => Ok(Self::Income),
            other => Err(Error::validation(format!("Unknown filter '{other}'"))),
        }
    }
}

/// Totals for one window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MonthlySummary {
    /// Sum of inflows
    pub income: f64,
    /// Sum of outflows
    pub expenses: f64,
    /// `income - expenses`
    pub balance: f64,
}

/// Expense totals per known category name, omitting categories with nothing spent.
///
/// Spending filed under a name that is not in `known_categories` is not reported.
#[must_use]
pub fn breakdown_from(
    known_categories: &[String],
    transactions: &[transaction::Model],
) -> HashMap<String, f64> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for transaction in transactions.iter().filter(|t| t.is_expense) {
        *totals.entry(transaction.category.as_str()).or_default() += transaction.amount;
    }

    known_categories
        .iter()
        .filter_map(|name| {
            totals
                .get(name.as_str())
                .filter(|total| **total > 0.0)
                .map(|total| (name.clone(), *total))
        })
        .collect()
}

/// Expense totals per category for `window`.
pub async fn category_breakdown(
    store: &RecordStore,
    window: &MonthWindow,
) -> Result<HashMap<String, f64>> {
    let names = store.category_names().await?;
    let transactions = store
        .transactions_in_range(window.start_ms, window.end_ms)
        .await?;
    Ok(breakdown_from(&names, &transactions))
}

/// The newest [`RECENT_LIMIT`] transactions in `window`.
pub async fn recent_transactions(
    store: &RecordStore,
    window: &MonthWindow,
) -> Result<Vec<transaction::Model>> {
    let mut transactions = store
        .transactions_in_range(window.start_ms, window.end_ms)
        .await?;
    transactions.truncate(RECENT_LIMIT);
    Ok(transactions)
}

/// Transactions in `window` passing `filter`, newest first.
pub async fn filtered_transactions(
    store: &RecordStore,
    window: &MonthWindow,
    filter: TransactionFilter,
) -> Result<Vec<transaction::Model>> {
    let transactions = store
        .transactions_in_range(window.start_ms, window.end_ms)
        .await?;
    Ok(transactions
        .into_iter()
        .filter(|t| filter.matches(t))
        .collect())
}

/// Income, expenses and balance for `window`.
pub async fn monthly_summary(store: &RecordStore, window: &MonthWindow) -> Result<MonthlySummary> {
    let income = store.sum_income(window.start_ms, window.end_ms).await?;
    let expenses = store.sum_expenses(window.start_ms, window.end_ms).await?;
    Ok(MonthlySummary {
        income,
        expenses,
        balance: income - expenses,
    })
}

/// Live [`category_breakdown`].
#[derive(Debug, Clone, Copy)]
pub struct CategoryBreakdownView(pub MonthWindow);

impl LiveSource for CategoryBreakdownView {
    type Output = HashMap<String, f64>;

    fn depends_on(&self) -> &'static [EntityKind] {
        &[EntityKind::Transactions, EntityKind::Categories]
    }

    async fn fetch(&self, store: &RecordStore) -> Result<Self::Output> {
        category_breakdown(store, &self.0).await
    }
}

/// Live [`recent_transactions`].
#[derive(Debug, Clone, Copy)]
pub struct RecentTransactionsView(pub MonthWindow);

impl LiveSource for RecentTransactionsView {
    type Output = Vec<transaction::Model>;

    fn depends_on(&self) -> &'static [EntityKind] {
        &[EntityKind::Transactions]
    }

    async fn fetch(&self, store: &RecordStore) -> Result<Self::Output> {
        recent_transactions(store, &self.0).await
    }
}

/// Live [`filtered_transactions`].
#[derive(Debug, Clone, Copy)]
pub struct FilteredTransactionsView {
    /// Month to list
    pub window: MonthWindow,
    /// Side of the ledger to keep
    pub filter: TransactionFilter,
}

impl LiveSource for FilteredTransactionsView {
    type Output = Vec<transaction::Model>;

    fn depends_on(&self) -> &'static [EntityKind] {
        &[EntityKind::Transactions]
    }

    async fn fetch(&self, store: &RecordStore) -> Result<Self::Output> {
        filtered_transactions(store, &self.window, self.filter).await
    }
}

/// Live [`monthly_summary`].
#[derive(Debug, Clone, Copy)]
pub struct MonthlySummaryView(pub MonthWindow);

impl LiveSource for MonthlySummaryView {
    type Output = MonthlySummary;

    fn depends_on(&self) -> &'static [EntityKind] {
        &[EntityKind::Transactions]
    }

    async fn fetch(&self, store: &RecordStore) -> Result<Self::Output> {
        monthly_summary(store, &self.0).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::entities::CategoryModel;
    use crate::test_utils::*;
    use chrono::Utc;

    fn march_2025() -> MonthWindow {
        MonthWindow::for_month(&Utc, 3, 2025).unwrap()
    }

    async fn seeded_store() -> Result<RecordStore> {
        let store = setup_test_store().await?;
        store
            .seed_default_categories(&["Food".to_string(), "Bills".to_string(), "Fun".to_string()])
            .await?;
        store
            .put_transactions(vec![
                test_transaction("f1", 20.0, "Food", utc_ms(2025, 3, 2, 9, 0), true),
                test_transaction("f2", 15.5, "Food", utc_ms(2025, 3, 20, 9, 0), true),
                test_transaction("b1", 100.0, "Bills", utc_ms(2025, 3, 5, 9, 0), true),
                test_transaction("s1", 2_000.0, "Salary", utc_ms(2025, 3, 1, 0, 0), false),
                test_transaction("refund", 5.0, "Fun", utc_ms(2025, 3, 7, 9, 0), false),
                test_transaction("ghost", 9.0, "Deleted", utc_ms(2025, 3, 8, 9, 0), true),
                test_transaction("feb", 50.0, "Food", utc_ms(2025, 2, 28, 23, 59), true),
                test_transaction("apr", 50.0, "Food", utc_ms(2025, 4, 1, 0, 0), true),
            ])
            .await?;
        Ok(store)
    }

    #[tokio::test]
    async fn test_breakdown_omits_zero_and_unknown_categories() -> Result<()> {
        let store = seeded_store().await?;
        let breakdown = category_breakdown(&store, &march_2025()).await?;

        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown["Food"], 35.5);
        assert_eq!(breakdown["Bills"], 100.0);
        // Only income in "Fun", so no entry
        assert!(!breakdown.contains_key("Fun"));
        assert!(!breakdown.contains_key("Deleted"));
        Ok(())
    }

    #[tokio::test]
    async fn test_monthly_summary() -> Result<()> {
        let store = seeded_store().await?;
        let summary = monthly_summary(&store, &march_2025()).await?;

        assert_eq!(summary.income, 2_005.0);
        assert_eq!(summary.expenses, 144.5);
        assert_eq!(summary.balance, 2_005.0 - 144.5);
        Ok(())
    }

    #[tokio::test]
    async fn test_recent_transactions_capped_and_ordered() -> Result<()> {
        let store = seeded_store().await?;
        let recent = recent_transactions(&store, &march_2025()).await?;

        let ids: Vec<&str> = recent.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["f2", "ghost", "refund", "b1", "f1"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_filtered_transactions() -> Result<()> {
        let store = seeded_store().await?;
        let window = march_2025();

        let all = filtered_transactions(&store, &window, TransactionFilter::All).await?;
        let expenses = filtered_transactions(&store, &window, TransactionFilter::Expenses).await?;
        let income = filtered_transactions(&store, &window, TransactionFilter::Income).await?;

        assert_eq!(all.len(), 6);
        assert_eq!(expenses.len(), 4);
        assert!(expenses.iter().all(|t| t.is_expense));
        let income_ids: Vec<&str> = income.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(income_ids, vec!["refund", "s1"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_window_aggregates() -> Result<()> {
        let store = seeded_store().await?;
        let window = MonthWindow::for_month(&Utc, 1, 2020)?;

        assert!(category_breakdown(&store, &window).await?.is_empty());
        assert_eq!(monthly_summary(&store, &window).await?, MonthlySummary::default());
        assert!(recent_transactions(&store, &window).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_live_breakdown_tracks_category_changes() -> Result<()> {
        let store = seeded_store().await?;
        let mut live = store.subscribe(CategoryBreakdownView(march_2025()));
        assert_eq!(live.next().await.unwrap().len(), 2);

        store.put_category(CategoryModel::named("Deleted")).await?;
        let breakdown = live.next().await.unwrap();
        assert_eq!(breakdown["Deleted"], 9.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_live_summary_recomputes_on_write() -> Result<()> {
        let store = seeded_store().await?;
        let mut live = store.subscribe(MonthlySummaryView(march_2025()));
        assert_eq!(live.next().await.unwrap().expenses, 144.5);

        store.delete_transaction("b1").await?;
        assert_eq!(live.next().await.unwrap().expenses, 44.5);
        Ok(())
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!("All".parse::<TransactionFilter>().unwrap(), TransactionFilter::All);
        assert_eq!(
            " expenses ".parse::<TransactionFilter>().unwrap(),
            TransactionFilter::Expenses
        );
        assert_eq!(
            "INCOME".parse::<TransactionFilter>().unwrap(),
            TransactionFilter::Income
        );
        assert!("transfers".parse::<TransactionFilter>().is_err());
    }
}
