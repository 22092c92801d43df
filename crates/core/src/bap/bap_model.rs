use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::conditions::SqlValue;
use crate::constants::{BAP_DETERMINATION_AUTO_DEFAULT, BAP_DETERMINATION_NOT_CURRENT};
use crate::errors::Result;
use crate::ids::IdTable;
use crate::incid::MultiplexSlots;
use crate::reconcile::ChildRow;

/// A priority habitat row. `bap_habitat` is the natural identity used for
/// reconciliation; `bap_id` only exists for storage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BapRecord {
    pub bap_id: i32,
    pub incid: String,
    pub bap_habitat: String,
    pub quality_determination: Option<String>,
    pub quality_interpretation: Option<String>,
    pub interpretation_comments: Option<String>,
}

impl BapRecord {
    pub fn new(incid: &str, bap_habitat: impl Into<String>) -> Self {
        Self {
            incid: incid.to_string(),
            bap_habitat: bap_habitat.into(),
            ..Default::default()
        }
    }

    pub fn with_determination(mut self, determination: impl Into<String>) -> Self {
        self.quality_determination = Some(determination.into());
        self
    }

    pub fn with_interpretation(mut self, interpretation: impl Into<String>) -> Self {
        self.quality_interpretation = Some(interpretation.into());
        self
    }

    /// Whether the row has been reclassified as no longer current.
    pub fn is_additional(&self) -> bool {
        self.quality_determination.as_deref() == Some(BAP_DETERMINATION_NOT_CURRENT)
    }

    /// Rewrites the quality metadata to mark the row as no longer current.
    /// Returns false when it was already marked.
    pub fn mark_additional(&mut self) -> bool {
        if self.is_additional() {
            return false;
        }
        self.quality_determination = Some(BAP_DETERMINATION_NOT_CURRENT.to_string());
        true
    }
}

impl ChildRow for BapRecord {
    fn id_table(&self) -> IdTable {
        IdTable::Bap
    }

    fn row_id(&self) -> i32 {
        self.bap_id
    }

    fn set_row_id(&mut self, id: i32) {
        self.bap_id = id;
    }

    fn incid(&self) -> &str {
        &self.incid
    }

    fn set_incid(&mut self, incid: &str) {
        self.incid = incid.to_string();
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(self.bap_habitat.as_str()),
            self.quality_determination.clone().into(),
            self.quality_interpretation.clone().into(),
            self.interpretation_comments.clone().into(),
        ]
    }

    fn column_values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("bap_habitat", SqlValue::from(self.bap_habitat.as_str())),
            (
                "quality_determination",
                self.quality_determination.clone().into(),
            ),
            (
                "quality_interpretation",
                self.quality_interpretation.clone().into(),
            ),
            (
                "interpretation_comments",
                self.interpretation_comments.clone().into(),
            ),
        ]
    }

    /// Copies every field except the surrogate id, the incid and the code.
    fn merge_from(&mut self, desired: &Self) -> bool {
        let changed = self.quality_determination != desired.quality_determination
            || self.quality_interpretation != desired.quality_interpretation
            || self.interpretation_comments != desired.interpretation_comments;
        self.quality_determination = desired.quality_determination.clone();
        self.quality_interpretation = desired.quality_interpretation.clone();
        self.interpretation_comments = desired.interpretation_comments.clone();
        changed
    }

    fn has_data(&self) -> bool {
        !self.bap_habitat.trim().is_empty()
    }
}

/// Computes the set of priority habitat codes implied by a classification.
pub trait PotentialHabitatClassifier {
    fn potential_habitats(
        &self,
        habitat: Option<&str>,
        multiplex: &MultiplexSlots,
    ) -> Result<BTreeSet<String>>;
}

/// Auto-derived records for the potential set. Persisted rows keep their
/// metadata; a row that was reclassified as additional and is potential again
/// gets the default determination back, as does any new code.
pub fn derive_desired_auto(
    incid: &str,
    potential: &BTreeSet<String>,
    persisted: &[BapRecord],
) -> Vec<BapRecord> {
    potential
        .iter()
        .map(|code| {
            match persisted.iter().find(|row| &row.bap_habitat == code) {
                Some(existing) => {
                    let mut record = existing.clone();
                    if record.is_additional() || record.quality_determination.is_none() {
                        record.quality_determination =
                            Some(BAP_DETERMINATION_AUTO_DEFAULT.to_string());
                    }
                    record
                }
                None => BapRecord::new(incid, code.clone())
                    .with_determination(BAP_DETERMINATION_AUTO_DEFAULT),
            }
        })
        .collect()
}

/// Persisted rows outside the potential set, i.e. the records a user added.
pub fn derive_desired_user(potential: &BTreeSet<String>, persisted: &[BapRecord]) -> Vec<BapRecord> {
    persisted
        .iter()
        .filter(|row| !potential.contains(&row.bap_habitat))
        .cloned()
        .collect()
}
