//! Transaction entity - A single income or expense event.
//!
//! The amount is always a non-negative magnitude; the direction lives in `is_expense`.
//! `category` holds a category name, not a foreign key, so transactions survive the
//! deletion of the category they reference. `date` is epoch milliseconds.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Opaque unique identifier, assigned once at creation
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Free-text label
    pub title: String,
    /// Non-negative magnitude of the transaction
    pub amount: f64,
    /// Name of the category this transaction is filed under
    pub category: String,
    /// When the transaction happened, epoch milliseconds
    pub date: i64,
    /// `true` for an outflow, `false` for an inflow
    pub is_expense: bool,
}

impl Model {
    /// Builds a transaction with a freshly generated id.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        amount: f64,
        category: impl Into<String>,
        date: i64,
        is_expense: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            amount,
            category: category.into(),
            date,
            is_expense,
        }
    }
}

/// Transactions reference categories by name only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
