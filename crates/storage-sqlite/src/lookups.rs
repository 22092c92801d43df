//! Lookup-table backed services: valid codes, habitat categories and the
//! priority habitat classifier.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::warn;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use incid_sync_core::bap::PotentialHabitatClassifier;
use incid_sync_core::errors::Result;
use incid_sync_core::incid::{MultiplexCategory, MultiplexSlots};
use incid_sync_core::reconcile::SourceRow;

use crate::errors::StorageError;
use crate::schema::{
    lut_bap_habitat_ihs, lut_ihs_complex, lut_ihs_formation, lut_ihs_habitat, lut_ihs_management,
    lut_ihs_matrix, lut_sources,
};

/// Maps IHS codes (habitat or multiplex) to the priority habitats they imply.
#[derive(Debug, Clone, Default)]
pub struct LookupPotentialHabitats {
    by_code: BTreeMap<String, BTreeSet<String>>,
}

impl LookupPotentialHabitats {
    pub fn load(conn: &mut SqliteConnection) -> Result<Self> {
        let pairs = lut_bap_habitat_ihs::table
            .select((lut_bap_habitat_ihs::code_ihs, lut_bap_habitat_ihs::bap_habitat))
            .load::<(String, String)>(conn)
            .map_err(StorageError::from)?;
        let mut by_code: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (code, bap) in pairs {
            by_code.entry(code).or_default().insert(bap);
        }
        Ok(Self { by_code })
    }
}

impl PotentialHabitatClassifier for LookupPotentialHabitats {
    fn potential_habitats(
        &self,
        habitat: Option<&str>,
        multiplex: &MultiplexSlots,
    ) -> Result<BTreeSet<String>> {
        Ok(habitat
            .into_iter()
            .chain(multiplex.all_codes())
            .filter_map(|code| self.by_code.get(code))
            .flatten()
            .cloned()
            .collect())
    }
}

/// Valid multiplex codes and source ids, used to drop values the lookup
/// tables do not know before anything is written.
#[derive(Debug, Clone, Default)]
pub struct LookupValidator {
    codes: BTreeMap<MultiplexCategory, HashSet<String>>,
    sources: HashSet<i32>,
}

impl LookupValidator {
    pub fn load(conn: &mut SqliteConnection) -> Result<Self> {
        let mut codes = BTreeMap::new();
        codes.insert(
            MultiplexCategory::Matrix,
            lut_ihs_matrix::table
                .select(lut_ihs_matrix::code)
                .load::<String>(conn)
                .map_err(StorageError::from)?
                .into_iter()
                .collect(),
        );
        codes.insert(
            MultiplexCategory::Formation,
            lut_ihs_formation::table
                .select(lut_ihs_formation::code)
                .load::<String>(conn)
                .map_err(StorageError::from)?
                .into_iter()
                .collect(),
        );
        codes.insert(
            MultiplexCategory::Management,
            lut_ihs_management::table
                .select(lut_ihs_management::code)
                .load::<String>(conn)
                .map_err(StorageError::from)?
                .into_iter()
                .collect(),
        );
        codes.insert(
            MultiplexCategory::Complex,
            lut_ihs_complex::table
                .select(lut_ihs_complex::code)
                .load::<String>(conn)
                .map_err(StorageError::from)?
                .into_iter()
                .collect(),
        );
        let sources = lut_sources::table
            .select(lut_sources::source_id)
            .load::<i32>(conn)
            .map_err(StorageError::from)?
            .into_iter()
            .collect();
        Ok(Self { codes, sources })
    }

    /// Clears slots whose code is not in the category's lookup table.
    pub fn filter_multiplex(&self, incid: &str, slots: &mut MultiplexSlots) {
        for category in MultiplexCategory::ALL {
            let valid = self.codes.get(&category);
            for slot in slots.slots_mut(category).iter_mut() {
                let known = match (slot.as_deref(), valid) {
                    (None, _) => true,
                    (Some(code), Some(valid)) => valid.contains(code),
                    (Some(_), None) => false,
                };
                if !known {
                    warn!(
                        "Dropping unknown {} code {:?} for {}",
                        category,
                        slot.as_deref().unwrap_or_default(),
                        incid
                    );
                    *slot = None;
                }
            }
        }
    }

    /// Clears source slots that reference an unknown source.
    pub fn filter_sources(&self, incid: &str, sources: &mut [Option<SourceRow>]) {
        for slot in sources.iter_mut() {
            let unknown = slot
                .as_ref()
                .and_then(|s| s.source_id)
                .is_some_and(|id| !self.sources.contains(&id));
            if unknown {
                warn!("Dropping source slot with unknown source for {}", incid);
                *slot = None;
            }
        }
    }
}

/// Category of a habitat code, when the habitat is known.
pub fn habitat_category(conn: &mut SqliteConnection, habitat: Option<&str>) -> Result<Option<String>> {
    let Some(habitat) = habitat.filter(|h| !h.trim().is_empty()) else {
        return Ok(None);
    };
    Ok(lut_ihs_habitat::table
        .find(habitat)
        .select(lut_ihs_habitat::category)
        .first::<String>(conn)
        .optional()
        .map_err(StorageError::from)?)
}
