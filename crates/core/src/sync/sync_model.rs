//! Requests, contexts and outcomes for the save, bulk update and split paths.

use serde::{Deserialize, Serialize};

use crate::bap::BapRecord;
use crate::constants::SOURCE_SLOTS;
use crate::errors::{Result, ValidationError};
use crate::gis::{FeatureKey, SelectionCount};
use crate::incid::{MultiplexCategory, MultiplexSlots};
use crate::reconcile::{AppliedCounts, ChildRow, SourceRow};
use crate::settings::{BulkExecutionStrategy, SyncSettings};

/// Everything an engine needs from the caller for one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveContext {
    pub user_id: String,
    pub reason: String,
    pub process: String,
    pub history_columns: Vec<String>,
    pub condition_chunk_size: usize,
    pub bap_delete_unmatched: bool,
    pub bulk_delete_extra_rows: bool,
    pub bulk_execution_strategy: BulkExecutionStrategy,
    pub bulk_write_history: bool,
    pub reset_pending_osmm_update: bool,
}

impl SaveContext {
    /// Builds a context from settings. A blank reason or process is refused
    /// here so nothing is written for a change that could not be audited.
    pub fn from_settings(settings: &SyncSettings, reason: &str, process: &str) -> Result<Self> {
        settings.validate()?;
        if reason.trim().is_empty() {
            return Err(ValidationError::MissingReason.into());
        }
        if process.trim().is_empty() {
            return Err(ValidationError::MissingProcess.into());
        }
        Ok(Self {
            user_id: settings.user_id.clone(),
            reason: reason.to_string(),
            process: process.to_string(),
            history_columns: settings.history_columns.clone(),
            condition_chunk_size: settings.condition_chunk_size,
            bap_delete_unmatched: settings.bap_delete_unmatched,
            bulk_delete_extra_rows: settings.bulk_delete_extra_rows,
            bulk_execution_strategy: settings.bulk_execution_strategy,
            bulk_write_history: settings.bulk_write_history,
            reset_pending_osmm_update: settings.reset_pending_osmm_update,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub incid: String,
    pub ihs_version: i32,
    pub statements: AppliedCounts,
    pub features_updated: usize,
    pub history_rows: usize,
}

/// Header columns a bulk update may overwrite. `None` leaves the column as is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkHeaderFields {
    pub ihs_habitat: Option<String>,
    pub site_ref: Option<String>,
    pub site_name: Option<String>,
    pub boundary_base_map: Option<String>,
    pub digitisation_base_map: Option<String>,
    pub general_comments: Option<String>,
}

impl BulkHeaderFields {
    /// Column assignments in table order.
    pub fn assignments(&self) -> Vec<(&'static str, &str)> {
        [
            ("ihs_habitat", &self.ihs_habitat),
            ("site_ref", &self.site_ref),
            ("site_name", &self.site_name),
            ("boundary_base_map", &self.boundary_base_map),
            ("digitisation_base_map", &self.digitisation_base_map),
            ("general_comments", &self.general_comments),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.as_deref().map(|v| (column, v)))
        .collect()
    }
}

/// Attribute template applied to every incid of a bulk selection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateTemplate {
    pub header: BulkHeaderFields,
    pub multiplex: MultiplexSlots,
    pub sources: [Option<SourceRow>; SOURCE_SLOTS],
    pub bap_user: Vec<BapRecord>,
}

impl BulkUpdateTemplate {
    pub fn sets_habitat(&self) -> bool {
        self.header
            .ihs_habitat
            .as_deref()
            .is_some_and(|h| !h.trim().is_empty())
    }

    /// Categories the template overwrites.
    pub fn touched_categories(&self) -> Vec<MultiplexCategory> {
        MultiplexCategory::ALL
            .into_iter()
            .filter(|c| self.multiplex.has_any(*c))
            .collect()
    }

    pub fn touches_sources(&self) -> bool {
        self.sources.iter().flatten().any(|s| s.has_data())
    }

    /// Whether the derived summary differs per incid, which forces one GIS
    /// call per incid instead of one batched call.
    pub fn needs_per_incid_summary(&self) -> bool {
        self.sets_habitat() || !self.touched_categories().is_empty()
    }

    /// Whether priority habitats can change: the classification moves or
    /// user-added records are supplied.
    pub fn touches_bap(&self) -> bool {
        self.needs_per_incid_summary() || !self.bap_user.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateRequest {
    pub incids: Vec<String>,
    pub template: BulkUpdateTemplate,
    pub reason: String,
    pub process: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateOutcome {
    pub incids_updated: usize,
    pub statements: AppliedCounts,
    pub orphans_deleted: usize,
    pub features_updated: usize,
    pub history_rows: usize,
    pub gis_calls: usize,
}

/// Features selected on the map for a split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRequest {
    pub selection: Vec<FeatureKey>,
    pub reason: String,
    pub process: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitKind {
    Physical,
    Logical,
}

impl SplitRequest {
    /// Validates the selection and decides which split applies: one
    /// toid+fragment means a physical split, several mean a logical one.
    pub fn classify(&self) -> Result<SplitKind> {
        let first = self
            .selection
            .first()
            .ok_or(ValidationError::EmptySelection)?;
        let mut incids: Vec<&str> = self.selection.iter().map(|k| k.incid.as_str()).collect();
        incids.sort_unstable();
        incids.dedup();
        if incids.len() > 1 {
            return Err(ValidationError::MultipleIncids(incids.len()).into());
        }
        let single_feature = self
            .selection
            .iter()
            .all(|k| k.toid == first.toid && k.toid_fragment_id == first.toid_fragment_id);
        Ok(if single_feature {
            SplitKind::Physical
        } else {
            SplitKind::Logical
        })
    }

    pub fn incid(&self) -> Option<&str> {
        self.selection.first().map(|k| k.incid.as_str())
    }
}

/// Feature counts of one incid, taken after commit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidFeatureCount {
    pub incid: String,
    pub toids: usize,
    pub fragments: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitOutcome {
    pub kind: SplitKind,
    pub incids: Vec<IncidFeatureCount>,
    pub new_fragment_ids: Vec<String>,
    pub history_rows: usize,
    pub selection: SelectionCount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    fn key(incid: &str, toid: &str, frag: &str) -> FeatureKey {
        FeatureKey::new(incid, toid, frag)
    }

    fn request(selection: Vec<FeatureKey>) -> SplitRequest {
        SplitRequest {
            selection,
            reason: "r".to_string(),
            process: "p".to_string(),
        }
    }

    #[test]
    fn split_kind_follows_selection_shape() {
        let one = request(vec![key("S:0000001", "T1", "00001")]);
        assert_eq!(one.classify().unwrap(), SplitKind::Physical);

        let many = request(vec![
            key("S:0000001", "T1", "00001"),
            key("S:0000001", "T1", "00002"),
        ]);
        assert_eq!(many.classify().unwrap(), SplitKind::Logical);
    }

    #[test]
    fn empty_or_mixed_selection_is_refused() {
        let err = request(vec![]).classify().unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::EmptySelection)));

        let err = request(vec![
            key("S:0000001", "T1", "00001"),
            key("S:0000002", "T2", "00001"),
        ])
        .classify()
        .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::MultipleIncids(2))));
        assert!(err.is_precondition());
    }

    #[test]
    fn context_requires_reason_and_process() {
        let settings = SyncSettings::default();
        assert!(SaveContext::from_settings(&settings, "", "p").is_err());
        assert!(SaveContext::from_settings(&settings, "r", " ").is_err());
        let ctx = SaveContext::from_settings(&settings, "r", "p").unwrap();
        assert_eq!(ctx.user_id, "system");
        assert_eq!(ctx.condition_chunk_size, 240);
    }

    #[test]
    fn template_summary_need_follows_classification_changes() {
        let mut template = BulkUpdateTemplate::default();
        template.header.site_name = Some("Meadow".to_string());
        assert!(!template.needs_per_incid_summary());
        assert_eq!(template.header.assignments(), vec![("site_name", "Meadow")]);

        template.multiplex.matrix[0] = Some("M1".to_string());
        assert!(template.needs_per_incid_summary());
        assert_eq!(template.touched_categories(), vec![MultiplexCategory::Matrix]);
    }
}
