//! Application-side key allocation: child-table surrogate ids, incid
//! identifiers and fragment ids.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::collections::HashMap;

use incid_sync_core::errors::{DatabaseError, Error, Result};
use incid_sync_core::ids::IdTable;
use incid_sync_core::incid::{parse_fragment_id, IncidId};

use crate::errors::StorageError;
use crate::schema::{incid_mm_polygons, lut_last_incid};
use crate::sql;

/// Hands out monotonically increasing surrogate ids per table. Each table is
/// seeded from `MAX(id) + 1` the first time it is used within a unit of work.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: HashMap<IdTable, i32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the current maximum id of `table` unless already seeded.
    pub fn seed(&mut self, conn: &mut SqliteConnection, table: IdTable) -> Result<()> {
        if self.next.contains_key(&table) {
            return Ok(());
        }
        let max = sql::max_value(conn, table.table_name(), table.id_column())?.unwrap_or(0);
        let next = i32::try_from(max + 1).map_err(|_| {
            Error::Database(DatabaseError::Internal(format!(
                "Id space of {} is exhausted",
                table.table_name()
            )))
        })?;
        debug!("Seeded {} ids at {}", table.table_name(), next);
        self.next.insert(table, next);
        Ok(())
    }

    /// Next id of a seeded table.
    pub fn allocate(&mut self, table: IdTable) -> Result<i32> {
        let slot = self.next.get_mut(&table).ok_or_else(|| {
            Error::internal(format!("Id allocator for {} was not seeded", table.table_name()))
        })?;
        let id = *slot;
        *slot += 1;
        Ok(id)
    }

    pub fn next_id(&mut self, conn: &mut SqliteConnection, table: IdTable) -> Result<i32> {
        self.seed(conn, table)?;
        self.allocate(table)
    }
}

/// Takes the next incid identifier from `lut_last_incid` and records it.
pub fn next_incid(conn: &mut SqliteConnection) -> Result<IncidId> {
    let (site_id, last) = lut_last_incid::table
        .select((lut_last_incid::site_id, lut_last_incid::last_incid))
        .order(lut_last_incid::site_id.asc())
        .first::<(String, i32)>(conn)
        .optional()
        .map_err(StorageError::from)?
        .ok_or_else(|| {
            Error::Database(DatabaseError::NotFound(
                "lut_last_incid has no site row".to_string(),
            ))
        })?;

    let next = IncidId::new(site_id.clone(), last.max(0) as u32).next()?;
    diesel::update(lut_last_incid::table.find(&site_id))
        .set(lut_last_incid::last_incid.eq(next.number as i32))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(next)
}

/// Next fragment id for `toid`: one past the highest fragment id already
/// recorded for it in the shadow table.
pub fn next_fragment_id(conn: &mut SqliteConnection, toid: &str) -> Result<u32> {
    let fragments = incid_mm_polygons::table
        .filter(incid_mm_polygons::toid.eq(toid))
        .select(incid_mm_polygons::toid_fragment_id)
        .load::<String>(conn)
        .map_err(StorageError::from)?;
    Ok(fragments
        .iter()
        .map(|f| parse_fragment_id(f))
        .max()
        .unwrap_or(0)
        + 1)
}
