use serde::{Deserialize, Serialize};

use crate::bap::BapRecord;
use crate::constants::SOURCE_SLOTS;
use crate::reconcile::SourceRow;

use super::incid_model::{Incid, MultiplexCategory, MultiplexSlots};

/// Working copy of one incid aggregate as held by the editing surface.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidEdit {
    pub incid: Incid,
    pub multiplex: MultiplexSlots,
    pub bap_auto: Vec<BapRecord>,
    pub bap_user: Vec<BapRecord>,
    pub sources: [Option<SourceRow>; SOURCE_SLOTS],
}

impl IncidEdit {
    pub fn incid_id(&self) -> &str {
        &self.incid.incid
    }

    pub fn habitat(&self) -> Option<&str> {
        self.incid
            .ihs_habitat
            .as_deref()
            .filter(|h| !h.trim().is_empty())
    }
}

/// Tables changed since the aggregate was loaded or last saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirtyTables {
    pub header: bool,
    pub matrix: bool,
    pub formation: bool,
    pub management: bool,
    pub complex: bool,
    pub bap: bool,
    pub sources: bool,
}

impl DirtyTables {
    pub fn all() -> Self {
        Self {
            header: true,
            matrix: true,
            formation: true,
            management: true,
            complex: true,
            bap: true,
            sources: true,
        }
    }

    pub fn is_multiplex_dirty(&self, category: MultiplexCategory) -> bool {
        match category {
            MultiplexCategory::Matrix => self.matrix,
            MultiplexCategory::Formation => self.formation,
            MultiplexCategory::Management => self.management,
            MultiplexCategory::Complex => self.complex,
        }
    }

    pub fn mark_multiplex(&mut self, category: MultiplexCategory) {
        match category {
            MultiplexCategory::Matrix => self.matrix = true,
            MultiplexCategory::Formation => self.formation = true,
            MultiplexCategory::Management => self.management = true,
            MultiplexCategory::Complex => self.complex = true,
        }
    }

    pub fn any(&self) -> bool {
        *self != Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A save submitted to the engine: the working copy, what changed, and the
/// audit reason/process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub edit: IncidEdit,
    pub dirty: DirtyTables,
    pub reason: String,
    pub process: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_flags_track_categories() {
        let mut dirty = DirtyTables::default();
        assert!(!dirty.any());
        dirty.mark_multiplex(MultiplexCategory::Management);
        assert!(dirty.is_multiplex_dirty(MultiplexCategory::Management));
        assert!(!dirty.is_multiplex_dirty(MultiplexCategory::Matrix));
        assert!(dirty.any());
        dirty.clear();
        assert!(!dirty.any());
    }

    #[test]
    fn blank_habitat_reads_as_none() {
        let mut edit = IncidEdit::default();
        edit.incid.ihs_habitat = Some(" ".to_string());
        assert_eq!(edit.habitat(), None);
        edit.incid.ihs_habitat = Some("GA0".to_string());
        assert_eq!(edit.habitat(), Some("GA0"));
    }
}
