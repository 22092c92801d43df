//! Append-only audit rows: operation codes, candidate rows produced by the GIS
//! layer, fixed per-batch values and the column mapping onto the history table.

use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::conditions::SqlValue;
use crate::constants::{GIS_AREA_COLUMN, GIS_LENGTH_COLUMN, TIMESTAMP_FORMAT};
use crate::errors::{Result, ValidationError};

/// Operations recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    PhysicalMerge,
    PhysicalSplit,
    LogicalMerge,
    LogicalSplit,
    AttributeUpdate,
    BulkUpdate,
    OsmmUpdate,
}

impl Operation {
    /// Description used to look the operation code up in `lut_operation`.
    pub fn description(&self) -> &'static str {
        match self {
            Operation::PhysicalMerge => "Physical Merge",
            Operation::PhysicalSplit => "Physical Split",
            Operation::LogicalMerge => "Logical Merge",
            Operation::LogicalSplit => "Logical Split",
            Operation::AttributeUpdate => "Attribute Update",
            Operation::BulkUpdate => "Bulk Update",
            Operation::OsmmUpdate => "OSMM Update",
        }
    }
}

/// Geometry type of the GIS layer; decides which measures history keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryType {
    Point,
    Polyline,
    Polygon,
    Unknown,
}

pub const HISTORY_ID: &str = "history_id";
pub const INCID: &str = "incid";
pub const TOID: &str = "toid";
pub const TOID_FRAGMENT_ID: &str = "toid_fragment_id";
pub const MODIFIED_DATE: &str = "modified_date";
pub const MODIFIED_USER_ID: &str = "modified_user_id";
pub const MODIFIED_PROCESS: &str = "modified_process";
pub const MODIFIED_REASON: &str = "modified_reason";
pub const MODIFIED_OPERATION: &str = "modified_operation";
pub const MODIFIED_INCID: &str = "modified_incid";
pub const MODIFIED_TOID_FRAGMENT_ID: &str = "modified_toid_fragment_id";
pub const MODIFIED_LENGTH: &str = "modified_length";
pub const MODIFIED_AREA: &str = "modified_area";
pub const MODIFIED_IHS_CATEGORY: &str = "modified_ihs_category";
pub const MODIFIED_IHS_SUMMARY: &str = "modified_ihs_summary";

/// Persisted history columns in table order (surrogate id first).
pub const HISTORY_COLUMNS: [&str; 15] = [
    HISTORY_ID,
    INCID,
    TOID,
    TOID_FRAGMENT_ID,
    MODIFIED_DATE,
    MODIFIED_USER_ID,
    MODIFIED_PROCESS,
    MODIFIED_REASON,
    MODIFIED_OPERATION,
    MODIFIED_INCID,
    MODIFIED_TOID_FRAGMENT_ID,
    MODIFIED_LENGTH,
    MODIFIED_AREA,
    MODIFIED_IHS_CATEGORY,
    MODIFIED_IHS_SUMMARY,
];

const MODIFIED_PREFIX: &str = "modified_";

/// One column-named row produced by the GIS adapter (or synthesised) that is
/// still to be mapped onto history columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryCandidateRow {
    pub values: BTreeMap<String, SqlValue>,
}

impl HistoryCandidateRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.values.get(column).and_then(SqlValue::to_text)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryCandidateTable {
    pub rows: Vec<HistoryCandidateRow>,
}

impl HistoryCandidateTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn extend(&mut self, other: HistoryCandidateTable) {
        self.rows.extend(other.rows);
    }
}

impl FromIterator<HistoryCandidateRow> for HistoryCandidateTable {
    fn from_iter<I: IntoIterator<Item = HistoryCandidateRow>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Values applied uniformly to every row of one history batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryFixedValues {
    values: BTreeMap<String, SqlValue>,
    operation: Option<Operation>,
}

impl HistoryFixedValues {
    pub fn new(operation: Operation) -> Self {
        Self {
            values: BTreeMap::new(),
            operation: Some(operation),
        }
    }

    pub fn set(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.values.insert(column.to_string(), value.into());
        self
    }

    pub fn reason(self, reason: &str) -> Self {
        self.set(MODIFIED_REASON, reason)
    }

    pub fn process(self, process: &str) -> Self {
        self.set(MODIFIED_PROCESS, process)
    }

    pub fn user(self, user_id: &str) -> Self {
        self.set(MODIFIED_USER_ID, user_id)
    }

    pub fn incid(self, incid: &str) -> Self {
        self.set(INCID, incid)
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }

    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    fn has_value(&self, column: &str) -> bool {
        self.values
            .get(column)
            .map(|v| v.to_text().is_some_and(|t| !t.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Fills the user and timestamp when absent, requires a reason and a
    /// process, and resolves the operation code through `lookup_code` when the
    /// batch does not carry one. A batch that cannot be fully audited fails.
    pub fn complete<F>(mut self, user_id: &str, now: DateTime<Local>, lookup_code: F) -> Result<Self>
    where
        F: FnOnce(Operation) -> Result<String>,
    {
        if !self.has_value(MODIFIED_USER_ID) {
            self.values
                .insert(MODIFIED_USER_ID.to_string(), SqlValue::from(user_id));
        }
        if !self.has_value(MODIFIED_DATE) {
            self.values
                .insert(MODIFIED_DATE.to_string(), SqlValue::from(history_timestamp(now)));
        }
        if !self.has_value(MODIFIED_REASON) {
            return Err(ValidationError::MissingReason.into());
        }
        if !self.has_value(MODIFIED_PROCESS) {
            return Err(ValidationError::MissingProcess.into());
        }
        if !self.has_value(MODIFIED_OPERATION) {
            let operation = self.operation.ok_or_else(|| {
                ValidationError::MissingOperationCode("unspecified operation".to_string())
            })?;
            let code = lookup_code(operation)?;
            self.values
                .insert(MODIFIED_OPERATION.to_string(), SqlValue::from(code));
        }
        Ok(self)
    }
}

/// Local time truncated to whole seconds.
pub fn history_timestamp(now: DateTime<Local>) -> String {
    let truncated = now.with_nanosecond(0).unwrap_or(now);
    truncated.format(TIMESTAMP_FORMAT).to_string()
}

/// A fully populated history row ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub history_id: i32,
    pub values: BTreeMap<&'static str, SqlValue>,
}

impl HistoryRow {
    pub fn get(&self, column: &str) -> &SqlValue {
        static NULL: SqlValue = SqlValue::Null;
        self.values.get(column).unwrap_or(&NULL)
    }
}

/// Renames the GIS geometry measures to `length` / `area` according to the
/// layer's geometry type: points carry neither, lines carry length only,
/// polygons carry both.
fn normalise_geometry(
    row: &HistoryCandidateRow,
    geometry: GeometryType,
) -> BTreeMap<String, SqlValue> {
    let mut values = row.values.clone();
    let length = values.remove(GIS_LENGTH_COLUMN);
    let area = values.remove(GIS_AREA_COLUMN);
    let (keep_length, keep_area) = match geometry {
        GeometryType::Point => (false, false),
        GeometryType::Polyline => (true, false),
        GeometryType::Polygon | GeometryType::Unknown => (true, true),
    };
    if keep_length {
        if let Some(length) = length {
            values.entry("length".to_string()).or_insert(length);
        }
    } else {
        values.remove("length");
    }
    if keep_area {
        if let Some(area) = area {
            values.entry("area".to_string()).or_insert(area);
        }
    } else {
        values.remove("area");
    }
    values
}

/// Maps candidate rows onto persisted history columns and assigns a
/// contiguous block of ids starting at `first_id`, in input row order.
///
/// Column resolution per history column: fixed value, then exact candidate
/// column, then `modified_<name>` from a snapshot column `<name>`.
pub fn prepare_history_rows(
    candidates: &HistoryCandidateTable,
    fixed: &HistoryFixedValues,
    snapshot_columns: &[String],
    geometry: GeometryType,
    first_id: i32,
) -> Vec<HistoryRow> {
    candidates
        .rows
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            let source = normalise_geometry(candidate, geometry);
            let mut values = BTreeMap::new();
            for column in HISTORY_COLUMNS.iter().skip(1) {
                let value = fixed
                    .get(column)
                    .cloned()
                    .or_else(|| source.get(*column).cloned())
                    .or_else(|| {
                        let name = column.strip_prefix(MODIFIED_PREFIX)?;
                        let is_snapshot = name == "length"
                            || name == "area"
                            || snapshot_columns.iter().any(|c| c == name);
                        if is_snapshot {
                            source.get(name).cloned()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(SqlValue::Null);
                values.insert(*column, value);
            }
            HistoryRow {
                history_id: first_id + index as i32,
                values,
            }
        })
        .collect()
}
