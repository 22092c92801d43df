//! User/application options that shape how saves are reconciled and audited.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CONDITION_CHUNK_SIZE;
use crate::errors::{Error, Result};

/// How bulk update issues child-table statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkExecutionStrategy {
    /// Parameterised SQL text, one statement per row action
    #[default]
    InlineSql,
    /// Typed diesel statements generated per table
    TableAdapter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SyncSettings {
    /// User stamped onto modified rows and history.
    pub user_id: String,
    /// Attribute columns snapshotted into history for each feature.
    pub history_columns: Vec<String>,
    /// Maximum values per chunked `IN` predicate.
    pub condition_chunk_size: usize,
    /// Delete persisted priority habitat rows that no longer match instead of
    /// flagging them as additional.
    pub bap_delete_unmatched: bool,
    /// Delete trailing child rows during bulk update when the template has
    /// fewer rows than are persisted.
    pub bulk_delete_extra_rows: bool,
    pub bulk_execution_strategy: BulkExecutionStrategy,
    /// Write history for bulk updates.
    pub bulk_write_history: bool,
    /// Mark pending external (OSMM) updates as superseded on manual save.
    pub reset_pending_osmm_update: bool,
    /// SQLite busy timeout.
    pub db_command_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            user_id: "system".to_string(),
            history_columns: vec!["ihs_category".to_string(), "ihs_summary".to_string()],
            condition_chunk_size: DEFAULT_CONDITION_CHUNK_SIZE,
            bap_delete_unmatched: false,
            bulk_delete_extra_rows: false,
            bulk_execution_strategy: BulkExecutionStrategy::default(),
            bulk_write_history: true,
            reset_pending_osmm_update: true,
            db_command_timeout_secs: 30,
        }
    }
}

impl SyncSettings {
    /// Parses settings from JSON. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: SyncSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::Config("user_id must not be empty".to_string()));
        }
        if self.condition_chunk_size == 0 {
            return Err(Error::Config(
                "condition_chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let settings = SyncSettings::from_json_str(r#"{ "user_id": "surveyor" }"#).unwrap();
        assert_eq!(settings.user_id, "surveyor");
        assert_eq!(settings.condition_chunk_size, DEFAULT_CONDITION_CHUNK_SIZE);
        assert_eq!(
            settings.bulk_execution_strategy,
            BulkExecutionStrategy::InlineSql
        );
        assert!(settings.bulk_write_history);
    }

    #[test]
    fn strategy_parses_from_snake_case() {
        let settings = SyncSettings::from_json_str(
            r#"{ "user_id": "u", "bulk_execution_strategy": "table_adapter" }"#,
        )
        .unwrap();
        assert_eq!(
            settings.bulk_execution_strategy,
            BulkExecutionStrategy::TableAdapter
        );
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = SyncSettings::from_json_str(r#"{ "condition_chunk_size": 0 }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
