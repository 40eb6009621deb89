//! Shared test utilities for `BudgetBuddy`.
//!
//! This module provides common helper functions for setting up test stores
//! and building test records with sensible defaults.

use crate::{
    entities::{budget, transaction},
    errors::Result,
    store::RecordStore,
};
use chrono::{DateTime, TimeZone, Utc};

/// Creates a store over an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_store() -> Result<RecordStore> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(RecordStore::new(db))
}

/// Builds a transaction with a fixed id.
#[must_use]
pub fn test_transaction(
    id: &str,
    amount: f64,
    category: &str,
    date: i64,
    is_expense: bool,
) -> transaction::Model {
    transaction::Model {
        id: id.to_string(),
        title: format!("Test {id}"),
        amount,
        category: category.to_string(),
        date,
        is_expense,
    }
}

/// Builds a budget for one month.
#[must_use]
pub const fn test_budget(month: i32, year: i32, amount: f64) -> budget::Model {
    budget::Model {
        month,
        year,
        amount,
    }
}

/// A UTC instant, for tests that need a deterministic calendar.
///
/// # Panics
/// Panics on an impossible date.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
}

/// Epoch milliseconds of a UTC instant.
#[must_use]
pub fn utc_ms(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> i64 {
    utc(year, month, day, hour, minute).timestamp_millis()
}
