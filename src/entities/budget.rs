//! Budget entity - One spending cap per calendar month.
//!
//! The composite primary key `(month, year)` is the merge key: writing a budget for a
//! month that already has one replaces it, so there is never more than one per month.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    /// Calendar month, 1 = January
    #[sea_orm(primary_key, auto_increment = false)]
    pub month: i32,
    /// Calendar year
    #[sea_orm(primary_key, auto_increment = false)]
    pub year: i32,
    /// Spending cap for the month
    pub amount: f64,
}

/// Budgets have no relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
