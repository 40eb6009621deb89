//! Database configuration module for `BudgetBuddy`.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs without hand-written SQL. Creation is
//! idempotent and safe to run on every start.

use crate::entities::{Budget, Category, SystemState, Transaction, TransactionColumn};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info, instrument};

/// Default database location when neither the environment nor the config file names one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://budget_buddy.sqlite?mode=rwc";

/// Resolves the database URL: `DATABASE_URL` from the environment wins over the
/// configured value.
#[must_use]
pub fn get_database_url(configured: Option<&str>) -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        configured
            .map_or_else(|| DEFAULT_DATABASE_URL.to_string(), ToString::to_string)
    })
}

/// Opens the database at `database_url` and makes sure every table exists.
#[instrument]
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database at {}", database_url);
    let db = Database::connect(database_url).await?;
    create_tables(&db).await?;
    info!("Database connection ready");
    Ok(db)
}

/// Creates all necessary database tables using `SeaORM`'s schema generation from entity definitions.
///
/// Also adds an index on `transactions.date`, since every range query and sum filters on it.
pub async fn create_tables<C: ConnectionTrait>(db: &C) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut transaction_table = schema.create_table_from_entity(Transaction);
    let mut category_table = schema.create_table_from_entity(Category);
    let mut budget_table = schema.create_table_from_entity(Budget);
    let mut system_state_table = schema.create_table_from_entity(SystemState);

    transaction_table.if_not_exists();
    category_table.if_not_exists();
    budget_table.if_not_exists();
    system_state_table.if_not_exists();

    db.execute(builder.build(&transaction_table)).await?;
    db.execute(builder.build(&category_table)).await?;
    db.execute(builder.build(&budget_table)).await?;
    db.execute(builder.build(&system_state_table)).await?;

    let date_index = Index::create()
        .if_not_exists()
        .name("idx_transactions_date")
        .table(Transaction)
        .col(TransactionColumn::Date)
        .to_owned();
    db.execute(builder.build(&date_index)).await?;

    debug!("Database tables ensured");
    Ok(())
}
