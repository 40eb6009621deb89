//! Key-value bookkeeping in the `system_state` table.
//!
//! Nothing here is user data and nothing here feeds live queries.

use super::RecordStore;
use crate::{
    entities::{SystemState, system_state},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{Set, prelude::*, sea_query::OnConflict};
use tracing::debug;

impl RecordStore {
    /// Reads a bookkeeping value.
    pub async fn get_state_value(&self, key: &str) -> Result<Option<String>> {
        let state = SystemState::find_by_id(key.to_string()).one(self.db.as_ref()).await?;
        Ok(state.map(|s| s.value))
    }

    /// Writes a bookkeeping value, replacing any previous one.
    pub async fn set_state_value(&self, key: &str, value: &str) -> Result<()> {
        let entry = system_state::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(Utc::now().naive_utc()),
        };
        SystemState::insert(entry)
            .on_conflict(
                OnConflict::column(system_state::Column::Key)
                    .update_columns([system_state::Column::Value, system_state::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;
        debug!("System state '{}' set to '{}'", key, value);
        Ok(())
    }
}
