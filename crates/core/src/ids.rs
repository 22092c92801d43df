use serde::{Deserialize, Serialize};

use crate::incid::MultiplexCategory;

/// Tables whose surrogate ids are allocated by the application rather than
/// the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdTable {
    Matrix,
    Formation,
    Management,
    Complex,
    Bap,
    Sources,
    OsmmUpdates,
}

impl IdTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            IdTable::Matrix => "incid_ihs_matrix",
            IdTable::Formation => "incid_ihs_formation",
            IdTable::Management => "incid_ihs_management",
            IdTable::Complex => "incid_ihs_complex",
            IdTable::Bap => "incid_bap",
            IdTable::Sources => "incid_sources",
            IdTable::OsmmUpdates => "incid_osmm_updates",
        }
    }

    pub fn id_column(&self) -> &'static str {
        match self {
            IdTable::Matrix => "matrix_id",
            IdTable::Formation => "formation_id",
            IdTable::Management => "management_id",
            IdTable::Complex => "complex_id",
            IdTable::Bap => "bap_id",
            IdTable::Sources => "incid_source_id",
            IdTable::OsmmUpdates => "incid_osmm_update_id",
        }
    }
}

impl From<MultiplexCategory> for IdTable {
    fn from(category: MultiplexCategory) -> Self {
        match category {
            MultiplexCategory::Matrix => IdTable::Matrix,
            MultiplexCategory::Formation => IdTable::Formation,
            MultiplexCategory::Management => IdTable::Management,
            MultiplexCategory::Complex => IdTable::Complex,
        }
    }
}
