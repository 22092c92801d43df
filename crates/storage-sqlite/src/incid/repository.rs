//! Connection-level reads and writes of the incid aggregate and the GIS
//! shadow table. Callers own the transaction.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::collections::BTreeSet;

use incid_sync_core::bap::BapRecord;
use incid_sync_core::conditions::FilterCondition;
use incid_sync_core::constants::{OSMM_STATUS_SUPERSEDED, SOURCE_SLOTS};
use incid_sync_core::errors::{Error, Result, ValidationError};
use incid_sync_core::gis::FeatureAttributeUpdate;
use incid_sync_core::incid::{Incid, MultiplexCategory, MultiplexSlots};
use incid_sync_core::reconcile::{MultiplexRow, SourceRow};
use incid_sync_core::sync::IncidFeatureCount;

use super::model::{BapDB, IncidDB, MmPolygonDB, SourceDB};
use crate::errors::StorageError;
use crate::schema::{incid_bap, incid_header, incid_mm_polygons, incid_osmm_updates, incid_sources};
use crate::sql;

pub const SHADOW_TABLE: &str = "incid_mm_polygons";

/// Shadow columns an attribute update may be mirrored onto.
const SHADOW_ATTRIBUTE_COLUMNS: [&str; 3] = ["incid", "ihs_category", "ihs_summary"];

fn expect_one(table: &str, operation: &str, affected: usize) -> Result<()> {
    if affected == 1 {
        Ok(())
    } else {
        Err(Error::statement(
            table,
            operation,
            format!("expected 1 row affected, got {}", affected),
        ))
    }
}

pub fn load_header(conn: &mut SqliteConnection, incid: &str) -> Result<Incid> {
    let header = incid_header::table
        .find(incid)
        .select(IncidDB::as_select())
        .first::<IncidDB>(conn)
        .optional()
        .map_err(StorageError::from)?
        .ok_or_else(|| ValidationError::UnknownIncid(incid.to_string()))?;
    Ok(header.into())
}

/// Rows of one multiplex category in display (id) order.
pub fn load_multiplex_rows(
    conn: &mut SqliteConnection,
    category: MultiplexCategory,
    incid: &str,
) -> Result<Vec<MultiplexRow>> {
    let rows: Vec<(i32, String)> = with_multiplex_table!(category, |table, id_col, incid_col, code_col| {
        table
            .filter(incid_col.eq(incid))
            .order(id_col.asc())
            .select((id_col, code_col))
            .load::<(i32, String)>(conn)
            .map_err(StorageError::from)?
    });
    Ok(rows
        .into_iter()
        .map(|(id, code)| MultiplexRow {
            category,
            id,
            incid: incid.to_string(),
            code: Some(code),
        })
        .collect())
}

pub fn load_multiplex_slots(conn: &mut SqliteConnection, incid: &str) -> Result<MultiplexSlots> {
    let mut slots = MultiplexSlots::default();
    for category in MultiplexCategory::ALL {
        let codes = load_multiplex_rows(conn, category, incid)?
            .into_iter()
            .filter_map(|row| row.code);
        slots.fill(category, codes);
    }
    Ok(slots)
}

pub fn load_sources(conn: &mut SqliteConnection, incid: &str) -> Result<Vec<SourceRow>> {
    let rows = incid_sources::table
        .filter(incid_sources::incid.eq(incid))
        .order((incid_sources::sort_order.asc(), incid_sources::incid_source_id.asc()))
        .select(SourceDB::as_select())
        .load::<SourceDB>(conn)
        .map_err(StorageError::from)?;
    Ok(rows.into_iter().map(SourceRow::from).collect())
}

/// Persisted sources laid out in their slots.
pub fn load_source_slots(
    conn: &mut SqliteConnection,
    incid: &str,
) -> Result<[Option<SourceRow>; SOURCE_SLOTS]> {
    let mut slots: [Option<SourceRow>; SOURCE_SLOTS] = Default::default();
    for (slot, row) in slots.iter_mut().zip(load_sources(conn, incid)?) {
        *slot = Some(row);
    }
    Ok(slots)
}

pub fn load_bap(conn: &mut SqliteConnection, incid: &str) -> Result<Vec<BapRecord>> {
    let rows = incid_bap::table
        .filter(incid_bap::incid.eq(incid))
        .order(incid_bap::bap_id.asc())
        .select(BapDB::as_select())
        .load::<BapDB>(conn)
        .map_err(StorageError::from)?;
    Ok(rows.into_iter().map(BapRecord::from).collect())
}

pub fn update_header(conn: &mut SqliteConnection, header: &Incid) -> Result<()> {
    let row = IncidDB::from(header.clone());
    let affected = diesel::update(incid_header::table.find(header.incid.as_str()))
        .set(&row)
        .execute(conn)
        .map_err(StorageError::from)?;
    expect_one("incid", "update", affected)
}

pub fn insert_header(conn: &mut SqliteConnection, header: &Incid) -> Result<()> {
    let row = IncidDB::from(header.clone());
    let affected = diesel::insert_into(incid_header::table)
        .values(&row)
        .execute(conn)
        .map_err(StorageError::from)?;
    expect_one("incid", "insert", affected)
}

/// Stamps the last-modified user and date without touching the version.
pub fn stamp_header(conn: &mut SqliteConnection, incid: &str, user_id: &str, date: &str) -> Result<()> {
    let affected = diesel::update(incid_header::table.find(incid))
        .set((
            incid_header::last_modified_date.eq(date),
            incid_header::last_modified_user_id.eq(user_id),
        ))
        .execute(conn)
        .map_err(StorageError::from)?;
    expect_one("incid", "stamp", affected)
}

/// Marks pending external updates of `incid` as superseded.
pub fn reset_pending_osmm(
    conn: &mut SqliteConnection,
    incid: &str,
    user_id: &str,
    date: &str,
) -> Result<usize> {
    let affected = diesel::update(
        incid_osmm_updates::table
            .filter(incid_osmm_updates::incid.eq(incid))
            .filter(incid_osmm_updates::status.gt(0)),
    )
    .set((
        incid_osmm_updates::status.eq(OSMM_STATUS_SUPERSEDED),
        incid_osmm_updates::last_modified_date.eq(date),
        incid_osmm_updates::last_modified_user_id.eq(user_id),
    ))
    .execute(conn)
    .map_err(StorageError::from)?;
    if affected > 0 {
        debug!("Superseded {} pending OSMM update(s) of {}", affected, incid);
    }
    Ok(affected)
}

pub fn load_shadow_rows(conn: &mut SqliteConnection, incid: &str) -> Result<Vec<MmPolygonDB>> {
    Ok(incid_mm_polygons::table
        .filter(incid_mm_polygons::incid.eq(incid))
        .order((incid_mm_polygons::toid.asc(), incid_mm_polygons::toid_fragment_id.asc()))
        .select(MmPolygonDB::as_select())
        .load::<MmPolygonDB>(conn)
        .map_err(StorageError::from)?)
}

pub fn load_shadow_row(
    conn: &mut SqliteConnection,
    toid: &str,
    toid_fragment_id: &str,
) -> Result<Option<MmPolygonDB>> {
    Ok(incid_mm_polygons::table
        .find((toid, toid_fragment_id))
        .select(MmPolygonDB::as_select())
        .first::<MmPolygonDB>(conn)
        .optional()
        .map_err(StorageError::from)?)
}

/// Mirrors the shadow-table columns of `update` onto every row matching any
/// condition group. Returns the number of rows touched.
pub fn update_shadow_attributes(
    conn: &mut SqliteConnection,
    groups: &[Vec<FilterCondition>],
    update: &FeatureAttributeUpdate,
) -> Result<usize> {
    let assignments = update
        .columns
        .iter()
        .filter(|(column, _)| SHADOW_ATTRIBUTE_COLUMNS.contains(&column.as_str()))
        .map(|(column, value)| (column.as_str(), value.clone()))
        .collect::<Vec<_>>();
    if assignments.is_empty() {
        return Ok(0);
    }
    let mut touched = 0;
    for group in groups {
        touched += sql::execute(conn, &sql::update_statement(SHADOW_TABLE, &assignments, group))?;
    }
    Ok(touched)
}

pub fn update_shadow_geometry(
    conn: &mut SqliteConnection,
    toid: &str,
    toid_fragment_id: &str,
    shape_length: Option<f64>,
    shape_area: Option<f64>,
) -> Result<()> {
    let affected = diesel::update(incid_mm_polygons::table.find((toid, toid_fragment_id)))
        .set((
            incid_mm_polygons::shape_length.eq(shape_length),
            incid_mm_polygons::shape_area.eq(shape_area),
        ))
        .execute(conn)
        .map_err(StorageError::from)?;
    expect_one(SHADOW_TABLE, "update", affected)
}

pub fn insert_shadow_rows(conn: &mut SqliteConnection, rows: &[MmPolygonDB]) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    let inserted = diesel::insert_into(incid_mm_polygons::table)
        .values(rows)
        .execute(conn)
        .map_err(StorageError::from)?;
    if inserted != rows.len() {
        return Err(Error::statement(
            SHADOW_TABLE,
            "insert",
            format!("expected {} rows inserted, got {}", rows.len(), inserted),
        ));
    }
    Ok(inserted)
}

/// Distinct toids and total fragments of one incid in the shadow table.
pub fn count_incid_features(conn: &mut SqliteConnection, incid: &str) -> Result<IncidFeatureCount> {
    let toids = incid_mm_polygons::table
        .filter(incid_mm_polygons::incid.eq(incid))
        .select(incid_mm_polygons::toid)
        .load::<String>(conn)
        .map_err(StorageError::from)?;
    let fragments = toids.len();
    let distinct = toids.into_iter().collect::<BTreeSet<_>>().len();
    Ok(IncidFeatureCount {
        incid: incid.to_string(),
        toids: distinct,
        fragments,
    })
}
