//! Category entity - A named grouping for transactions, keyed by its name.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    /// Category name, the natural key (e.g., "Food", "Transport")
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    /// Whether the category came from the first-run default set
    pub is_default: bool,
}

impl Model {
    /// A user-created category.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: false,
        }
    }
}

/// Categories are never joined to transactions
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
