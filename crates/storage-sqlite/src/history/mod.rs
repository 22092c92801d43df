//! Append-only history writes.

use chrono::Local;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;
use serde::{Deserialize, Serialize};

use incid_sync_core::conditions::SqlValue;
use incid_sync_core::errors::{Error, Result, ValidationError};
use incid_sync_core::history::{
    prepare_history_rows, GeometryType, HistoryCandidateTable, HistoryFixedValues, HistoryRow,
    Operation, INCID, MODIFIED_AREA, MODIFIED_DATE, MODIFIED_IHS_CATEGORY, MODIFIED_IHS_SUMMARY,
    MODIFIED_INCID, MODIFIED_LENGTH, MODIFIED_OPERATION, MODIFIED_PROCESS, MODIFIED_REASON,
    MODIFIED_TOID_FRAGMENT_ID, MODIFIED_USER_ID, TOID, TOID_FRAGMENT_ID,
};

use crate::errors::StorageError;
use crate::schema::{history, lut_operation};
use crate::sql;

#[derive(Insertable, Queryable, Selectable, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct HistoryDB {
    pub history_id: i32,
    pub incid: String,
    pub toid: Option<String>,
    pub toid_fragment_id: Option<String>,
    pub modified_date: String,
    pub modified_user_id: String,
    pub modified_process: String,
    pub modified_reason: String,
    pub modified_operation: String,
    pub modified_incid: Option<String>,
    pub modified_toid_fragment_id: Option<String>,
    pub modified_length: Option<f64>,
    pub modified_area: Option<f64>,
    pub modified_ihs_category: Option<String>,
    pub modified_ihs_summary: Option<String>,
}

fn required_text(row: &HistoryRow, column: &str) -> Result<String> {
    row.get(column)
        .to_text()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            Error::statement(
                "history",
                "insert",
                format!("row {} has no value for {}", row.history_id, column),
            )
        })
}

fn optional_text(row: &HistoryRow, column: &str) -> Option<String> {
    row.get(column).to_text()
}

fn optional_real(value: &SqlValue) -> Option<f64> {
    value.as_real()
}

impl TryFrom<&HistoryRow> for HistoryDB {
    type Error = Error;

    fn try_from(row: &HistoryRow) -> Result<Self> {
        Ok(Self {
            history_id: row.history_id,
            incid: required_text(row, INCID)?,
            toid: optional_text(row, TOID),
            toid_fragment_id: optional_text(row, TOID_FRAGMENT_ID),
            modified_date: required_text(row, MODIFIED_DATE)?,
            modified_user_id: required_text(row, MODIFIED_USER_ID)?,
            modified_process: required_text(row, MODIFIED_PROCESS)?,
            modified_reason: required_text(row, MODIFIED_REASON)?,
            modified_operation: required_text(row, MODIFIED_OPERATION)?,
            modified_incid: optional_text(row, MODIFIED_INCID),
            modified_toid_fragment_id: optional_text(row, MODIFIED_TOID_FRAGMENT_ID),
            modified_length: optional_real(row.get(MODIFIED_LENGTH)),
            modified_area: optional_real(row.get(MODIFIED_AREA)),
            modified_ihs_category: optional_text(row, MODIFIED_IHS_CATEGORY),
            modified_ihs_summary: optional_text(row, MODIFIED_IHS_SUMMARY),
        })
    }
}

/// Resolves the `lut_operation` code of `operation` by its description.
pub fn lookup_operation_code(conn: &mut SqliteConnection, operation: Operation) -> Result<String> {
    let codes = lut_operation::table
        .filter(lut_operation::description.eq(operation.description()))
        .select(lut_operation::code)
        .load::<String>(conn)
        .map_err(StorageError::from)?;
    match codes.len() {
        0 => Err(ValidationError::MissingOperationCode(operation.description().to_string()).into()),
        1 => Ok(codes.into_iter().next().unwrap_or_default()),
        _ => Err(ValidationError::AmbiguousOperationCode(operation.description().to_string()).into()),
    }
}

/// Writes one batch of history rows for a unit of work.
#[derive(Debug, Clone)]
pub struct HistoryWriter {
    geometry: GeometryType,
    snapshot_columns: Vec<String>,
    user_id: String,
}

impl HistoryWriter {
    pub fn new(geometry: GeometryType, snapshot_columns: Vec<String>, user_id: impl Into<String>) -> Self {
        Self {
            geometry,
            snapshot_columns,
            user_id: user_id.into(),
        }
    }

    /// Inserts one history row per candidate and returns the assigned ids in
    /// candidate order. Runs as a savepoint inside the caller's transaction;
    /// any failure leaves no row of the batch behind.
    pub fn write(
        &self,
        conn: &mut SqliteConnection,
        candidates: &HistoryCandidateTable,
        fixed: HistoryFixedValues,
    ) -> Result<Vec<i32>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        conn.transaction::<_, StorageError, _>(|conn| {
            let fixed = fixed
                .complete(&self.user_id, Local::now(), |op| lookup_operation_code(conn, op))
                .map_err(StorageError::Core)?;
            let first_id = sql::max_value(conn, "history", "history_id")
                .map_err(StorageError::Core)?
                .unwrap_or(0) as i32
                + 1;
            let rows = prepare_history_rows(
                candidates,
                &fixed,
                &self.snapshot_columns,
                self.geometry,
                first_id,
            );
            let records = rows
                .iter()
                .map(HistoryDB::try_from)
                .collect::<Result<Vec<_>>>()
                .map_err(StorageError::Core)?;
            let inserted = diesel::insert_into(history::table)
                .values(&records)
                .execute(conn)?;
            if inserted != records.len() {
                return Err(StorageError::Core(Error::statement(
                    "history",
                    "insert",
                    format!("expected {} rows inserted, got {}", records.len(), inserted),
                )));
            }
            debug!(
                "Wrote {} history row(s) from id {} for {:?}",
                inserted,
                first_id,
                fixed.operation()
            );
            Ok(records.iter().map(|r| r.history_id).collect())
        })
        .map_err(Error::from)
    }
}
