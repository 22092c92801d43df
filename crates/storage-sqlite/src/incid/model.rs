//! Database models for the incid aggregate and its GIS shadow rows.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use incid_sync_core::bap::BapRecord;
use incid_sync_core::incid::Incid;
use incid_sync_core::reconcile::SourceRow;

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(incid))]
#[diesel(table_name = crate::schema::incid_header)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct IncidDB {
    pub incid: String,
    pub ihs_version: i32,
    pub ihs_habitat: Option<String>,
    pub ihs_category: Option<String>,
    pub ihs_summary: Option<String>,
    pub site_ref: Option<String>,
    pub site_name: Option<String>,
    pub boundary_base_map: Option<String>,
    pub digitisation_base_map: Option<String>,
    pub general_comments: Option<String>,
    pub created_date: String,
    pub created_user_id: String,
    pub last_modified_date: String,
    pub last_modified_user_id: String,
}

impl From<IncidDB> for Incid {
    fn from(db: IncidDB) -> Self {
        Self {
            incid: db.incid,
            ihs_version: db.ihs_version,
            ihs_habitat: db.ihs_habitat,
            ihs_category: db.ihs_category,
            ihs_summary: db.ihs_summary,
            site_ref: db.site_ref,
            site_name: db.site_name,
            boundary_base_map: db.boundary_base_map,
            digitisation_base_map: db.digitisation_base_map,
            general_comments: db.general_comments,
            created_date: db.created_date,
            created_user_id: db.created_user_id,
            last_modified_date: db.last_modified_date,
            last_modified_user_id: db.last_modified_user_id,
        }
    }
}

impl From<Incid> for IncidDB {
    fn from(domain: Incid) -> Self {
        Self {
            incid: domain.incid,
            ihs_version: domain.ihs_version,
            ihs_habitat: domain.ihs_habitat,
            ihs_category: domain.ihs_category,
            ihs_summary: domain.ihs_summary,
            site_ref: domain.site_ref,
            site_name: domain.site_name,
            boundary_base_map: domain.boundary_base_map,
            digitisation_base_map: domain.digitisation_base_map,
            general_comments: domain.general_comments,
            created_date: domain.created_date,
            created_user_id: domain.created_user_id,
            last_modified_date: domain.last_modified_date,
            last_modified_user_id: domain.last_modified_user_id,
        }
    }
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(incid_source_id))]
#[diesel(table_name = crate::schema::incid_sources)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct SourceDB {
    pub incid_source_id: i32,
    pub incid: String,
    pub source_id: Option<i32>,
    pub source_date_start: Option<String>,
    pub source_habitat_class: Option<String>,
    pub source_habitat_type: Option<String>,
    pub source_boundary_importance: Option<String>,
    pub source_habitat_importance: Option<String>,
    pub sort_order: Option<i32>,
}

impl From<SourceDB> for SourceRow {
    fn from(db: SourceDB) -> Self {
        Self {
            incid_source_id: db.incid_source_id,
            incid: db.incid,
            source_id: db.source_id,
            source_date_start: db.source_date_start,
            source_habitat_class: db.source_habitat_class,
            source_habitat_type: db.source_habitat_type,
            source_boundary_importance: db.source_boundary_importance,
            source_habitat_importance: db.source_habitat_importance,
            sort_order: db.sort_order,
        }
    }
}

impl From<&SourceRow> for SourceDB {
    fn from(row: &SourceRow) -> Self {
        Self {
            incid_source_id: row.incid_source_id,
            incid: row.incid.clone(),
            source_id: row.source_id,
            source_date_start: row.source_date_start.clone(),
            source_habitat_class: row.source_habitat_class.clone(),
            source_habitat_type: row.source_habitat_type.clone(),
            source_boundary_importance: row.source_boundary_importance.clone(),
            source_habitat_importance: row.source_habitat_importance.clone(),
            sort_order: row.sort_order,
        }
    }
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(bap_id))]
#[diesel(table_name = crate::schema::incid_bap)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct BapDB {
    pub bap_id: i32,
    pub incid: String,
    pub bap_habitat: String,
    pub quality_determination: Option<String>,
    pub quality_interpretation: Option<String>,
    pub interpretation_comments: Option<String>,
}

impl From<BapDB> for BapRecord {
    fn from(db: BapDB) -> Self {
        Self {
            bap_id: db.bap_id,
            incid: db.incid,
            bap_habitat: db.bap_habitat,
            quality_determination: db.quality_determination,
            quality_interpretation: db.quality_interpretation,
            interpretation_comments: db.interpretation_comments,
        }
    }
}

impl From<&BapRecord> for BapDB {
    fn from(record: &BapRecord) -> Self {
        Self {
            bap_id: record.bap_id,
            incid: record.incid.clone(),
            bap_habitat: record.bap_habitat.clone(),
            quality_determination: record.quality_determination.clone(),
            quality_interpretation: record.quality_interpretation.clone(),
            interpretation_comments: record.interpretation_comments.clone(),
        }
    }
}

/// Shadow copy of one GIS feature's attributes.
#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(toid, toid_fragment_id))]
#[diesel(table_name = crate::schema::incid_mm_polygons)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MmPolygonDB {
    pub toid: String,
    pub toid_fragment_id: String,
    pub incid: String,
    pub ihs_category: Option<String>,
    pub ihs_summary: Option<String>,
    pub shape_length: Option<f64>,
    pub shape_area: Option<f64>,
}
