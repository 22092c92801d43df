//! Boundary to the externally owned GIS layer.
//!
//! The GIS layer is not covered by the relational transaction. Every engine
//! treats a `None` result or an empty table from the adapter as a hard failure
//! and rolls the relational side back; writes already applied to the layer are
//! left in place and reconciled from the database on the next refresh.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::conditions::{FilterCondition, SqlValue};
use crate::errors::{GisError, Result};
use crate::history::{GeometryType, HistoryCandidateTable};

/// Identity of one GIS feature (one fragment of an incid).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureKey {
    pub incid: String,
    pub toid: String,
    pub toid_fragment_id: String,
}

impl FeatureKey {
    pub fn new(
        incid: impl Into<String>,
        toid: impl Into<String>,
        toid_fragment_id: impl Into<String>,
    ) -> Self {
        Self {
            incid: incid.into(),
            toid: toid.into(),
            toid_fragment_id: toid_fragment_id.into(),
        }
    }
}

/// A feature as reported by the GIS layer after a split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub key: FeatureKey,
    pub attributes: BTreeMap<String, SqlValue>,
    pub shape_length: Option<f64>,
    pub shape_area: Option<f64>,
}

/// Column assignments pushed onto every feature matched by a filter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureAttributeUpdate {
    pub columns: Vec<(String, SqlValue)>,
}

impl FeatureAttributeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.columns.push((column.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Selection counts reported by the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectionCount {
    pub features: usize,
    pub incids: usize,
    pub toids: usize,
    pub fragments: usize,
}

/// Capability the engines need from the GIS application.
///
/// `filter` arguments are groups of conditions; a feature matches when it
/// matches any group. Groups come from the chunking helpers so no single
/// predicate grows past the driver's limits.
///
/// Calls run outside the database transaction. A later relational failure
/// rolls the database back but leaves GIS writes in place; the database is
/// the source of truth the layer is refreshed from.
pub trait GisSyncAdapter: Send + Sync {
    fn geometry_type(&self) -> GeometryType;

    /// Writes `update` onto every matching feature and returns one history
    /// candidate per touched feature, carrying the pre-update values of
    /// `history_columns` plus identity and geometry measures.
    fn update_features(
        &self,
        update: &FeatureAttributeUpdate,
        history_columns: &[String],
        filter: &[Vec<FilterCondition>],
    ) -> Result<Option<HistoryCandidateTable>>;

    /// Splits the single feature matched by `filter`. The first returned row is
    /// the original feature; the others are numbered from `new_fragment_seed`.
    fn split_feature(
        &self,
        new_fragment_seed: &str,
        filter: &[FilterCondition],
        columns_to_copy: &[String],
    ) -> Result<Option<Vec<FeatureRow>>>;

    /// Moves the currently selected features to `new_incid`. History
    /// candidates carry the old identity plus `modified_incid` and
    /// `modified_toid_fragment_id`.
    fn split_features_logically(
        &self,
        new_incid: &str,
        history_columns: &[String],
    ) -> Result<Option<HistoryCandidateTable>>;

    fn count_map_selection(&self) -> Result<SelectionCount>;
}

/// Treats both "returned null" and "returned zero rows" as failures.
pub fn require_history(
    result: Option<HistoryCandidateTable>,
    operation: &str,
) -> Result<HistoryCandidateTable> {
    match result {
        None => Err(GisError::NoResult {
            operation: operation.to_string(),
        }
        .into()),
        Some(table) if table.is_empty() => Err(GisError::NoFeaturesUpdated {
            operation: operation.to_string(),
        }
        .into()),
        Some(table) => Ok(table),
    }
}

/// A split must yield the original plus at least one new feature.
pub fn require_split_features(result: Option<Vec<FeatureRow>>) -> Result<Vec<FeatureRow>> {
    match result {
        None => Err(GisError::NoResult {
            operation: "SplitFeature".to_string(),
        }
        .into()),
        Some(rows) if rows.len() < 2 => {
            Err(GisError::InsufficientSplitFeatures { count: rows.len() }.into())
        }
        Some(rows) => Ok(rows),
    }
}
