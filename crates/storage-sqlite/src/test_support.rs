//! Shared fixtures: a migrated database with seeded lookups and an in-memory
//! GIS layer.

use diesel::connection::SimpleConnection;
use diesel::sqlite::SqliteConnection;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

use incid_sync_core::conditions::{evaluate_conditions, FilterCondition, SqlValue};
use incid_sync_core::errors::{GisError, Result};
use incid_sync_core::gis::{
    FeatureAttributeUpdate, FeatureKey, FeatureRow, GisSyncAdapter, SelectionCount,
};
use incid_sync_core::history::{
    GeometryType, HistoryCandidateRow, HistoryCandidateTable, INCID, MODIFIED_INCID,
    MODIFIED_TOID_FRAGMENT_ID, TOID, TOID_FRAGMENT_ID,
};
use incid_sync_core::incid::parse_fragment_id;

use crate::db::{self, write_actor::spawn_writer, DbPool, WriteHandle};

const SEED_LOOKUPS: &str = "
    INSERT INTO lut_ihs_habitat (code, description, category) VALUES
        ('GA0', 'Grassland', 'Grassland'),
        ('WB0', 'Woodland', 'Woodland');
    INSERT INTO lut_ihs_matrix (code) VALUES ('M0'), ('M1'), ('M2'), ('M3');
    INSERT INTO lut_ihs_formation (code) VALUES ('F1'), ('F2');
    INSERT INTO lut_ihs_management (code) VALUES ('G1'), ('G2');
    INSERT INTO lut_ihs_complex (code) VALUES ('C1'), ('C2');
    INSERT INTO lut_ihs_habitat_ihs_matrix (code_habitat, code_matrix) VALUES
        ('GA0', 'M1'), ('GA0', 'M2'), ('WB0', 'M3');
    INSERT INTO lut_ihs_habitat_ihs_formation (code_habitat, code_formation) VALUES ('GA0', 'F1');
    INSERT INTO lut_bap_habitat_ihs (code_ihs, bap_habitat) VALUES
        ('GA0', 'BAP-A'), ('M1', 'BAP-B'), ('WB0', 'BAP-W');
    INSERT INTO lut_sources (source_id, source_name) VALUES (1, 'Aerial'), (2, 'Survey'), (3, 'Map');
    INSERT INTO lut_last_incid (site_id, last_incid) VALUES ('HLU', 10);
";

/// Migrated database with seeded lookups, plus a running writer.
pub fn setup_db() -> (Arc<DbPool>, WriteHandle) {
    let app_data_dir = tempdir()
        .expect("tempdir")
        .keep()
        .to_string_lossy()
        .to_string();
    let db_path = db::init(&app_data_dir).expect("init db");
    db::run_migrations(&db_path).expect("migrate");
    let pool = db::create_pool(&db_path).expect("pool");
    {
        let mut conn = pool.get().expect("conn");
        conn.batch_execute(SEED_LOOKUPS).expect("seed lookups");
    }
    let writer = spawn_writer(pool.as_ref().clone());
    (pool, writer)
}

/// Inserts a `GA0` incid header and its matrix rows.
pub fn seed_incid(conn: &mut SqliteConnection, incid: &str, matrix: &[&str]) {
    let summary = std::iter::once("GA0")
        .chain(matrix.iter().copied())
        .collect::<Vec<_>>()
        .join(".");
    conn.batch_execute(&format!(
        "INSERT INTO incid (incid, ihs_version, ihs_habitat, ihs_category, ihs_summary,
             created_date, created_user_id, last_modified_date, last_modified_user_id)
         VALUES ('{incid}', 1, 'GA0', 'Grassland', '{summary}',
             '2024-01-01 00:00:00', 'seed', '2024-01-01 00:00:00', 'seed');"
    ))
    .expect("seed incid");
    for code in matrix {
        conn.batch_execute(&format!(
            "INSERT INTO incid_ihs_matrix (matrix_id, incid, matrix)
             VALUES ((SELECT COALESCE(MAX(matrix_id), 0) + 1 FROM incid_ihs_matrix), '{incid}', '{code}');"
        ))
        .expect("seed matrix");
    }
}

/// Inserts shadow rows for `incid`, each with area 100.
pub fn seed_shadow(conn: &mut SqliteConnection, incid: &str, features: &[(&str, &str)]) {
    for (toid, fragment) in features {
        conn.batch_execute(&format!(
            "INSERT INTO incid_mm_polygons (toid, toid_fragment_id, incid, ihs_category, ihs_summary,
                 shape_length, shape_area)
             VALUES ('{toid}', '{fragment}', '{incid}', 'Grassland', 'GA0', 40.0, 100.0);"
        ))
        .expect("seed shadow");
    }
}

/// Inserts priority habitat rows as `(code, quality_determination)` pairs.
pub fn seed_bap(conn: &mut SqliteConnection, incid: &str, rows: &[(&str, &str)]) {
    for (code, determination) in rows {
        conn.batch_execute(&format!(
            "INSERT INTO incid_bap (bap_id, incid, bap_habitat, quality_determination)
             VALUES ((SELECT COALESCE(MAX(bap_id), 0) + 1 FROM incid_bap), '{incid}', '{code}', '{determination}');"
        ))
        .expect("seed bap");
    }
}

/// Inserts one external update row for `incid` with `status`.
pub fn seed_osmm_update(conn: &mut SqliteConnection, incid: &str, status: i32) {
    conn.batch_execute(&format!(
        "INSERT INTO incid_osmm_updates (incid_osmm_update_id, incid, status)
         VALUES ((SELECT COALESCE(MAX(incid_osmm_update_id), 0) + 1 FROM incid_osmm_updates), '{incid}', {status});"
    ))
    .expect("seed osmm update");
}

fn feature(incid: &str, toid: &str, fragment: &str) -> FeatureRow {
    let mut attributes = BTreeMap::new();
    attributes.insert("ihs_category".to_string(), SqlValue::from("Grassland"));
    attributes.insert("ihs_summary".to_string(), SqlValue::from("GA0"));
    FeatureRow {
        key: FeatureKey::new(incid, toid, fragment),
        attributes,
        shape_length: Some(40.0),
        shape_area: Some(100.0),
    }
}

/// In-memory GIS layer with failure injection.
#[derive(Default)]
pub struct FakeGis {
    features: Mutex<Vec<FeatureRow>>,
    selection: Mutex<Vec<FeatureKey>>,
    zero_row_incids: Mutex<HashSet<String>>,
    fail: AtomicBool,
    split_into: AtomicUsize,
    split_numbering: Mutex<Option<u32>>,
    logical_renumbering: Mutex<BTreeMap<(String, String), String>>,
    pub calls: AtomicUsize,
}

impl FakeGis {
    pub fn new() -> Self {
        let gis = Self::default();
        gis.split_into.store(3, Ordering::SeqCst);
        gis
    }

    pub fn add_features(&self, incid: &str, keys: &[(&str, &str)]) {
        let mut features = self.features.lock().unwrap();
        for (toid, fragment) in keys {
            features.push(feature(incid, toid, fragment));
        }
    }

    pub fn select(&self, keys: Vec<FeatureKey>) {
        *self.selection.lock().unwrap() = keys;
    }

    /// Update calls touching `incid` report zero updated rows.
    pub fn report_zero_rows_for(&self, incid: &str) {
        self.zero_row_incids.lock().unwrap().insert(incid.to_string());
    }

    /// Physical splits number new fragments from `first` instead of the seed.
    pub fn number_split_fragments_from(&self, first: u32) {
        *self.split_numbering.lock().unwrap() = Some(first);
    }

    /// Logical splits give `toid:fragment` the fragment id `renumbered`.
    pub fn renumber_on_logical_split(&self, toid: &str, fragment: &str, renumbered: &str) {
        self.logical_renumbering
            .lock()
            .unwrap()
            .insert((toid.to_string(), fragment.to_string()), renumbered.to_string());
    }

    pub fn fail_next_calls(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn features_of(&self, incid: &str) -> Vec<FeatureRow> {
        self.features
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.key.incid == incid)
            .cloned()
            .collect()
    }

    fn lookup(feature: &FeatureRow, column: &str) -> Option<SqlValue> {
        match column {
            INCID => Some(SqlValue::from(feature.key.incid.as_str())),
            TOID => Some(SqlValue::from(feature.key.toid.as_str())),
            TOID_FRAGMENT_ID => Some(SqlValue::from(feature.key.toid_fragment_id.as_str())),
            other => feature.attributes.get(other).cloned(),
        }
    }

    fn candidate(feature: &FeatureRow, history_columns: &[String]) -> HistoryCandidateRow {
        let mut row = HistoryCandidateRow::new()
            .with(INCID, feature.key.incid.as_str())
            .with(TOID, feature.key.toid.as_str())
            .with(TOID_FRAGMENT_ID, feature.key.toid_fragment_id.as_str())
            .with("shape_length", feature.shape_length)
            .with("shape_area", feature.shape_area);
        for column in history_columns {
            row = row.with(
                column.as_str(),
                feature.attributes.get(column).cloned().unwrap_or(SqlValue::Null),
            );
        }
        row
    }

    fn check_failure(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(GisError::Adapter("injected failure".to_string()).into());
        }
        Ok(())
    }
}

impl GisSyncAdapter for FakeGis {
    fn geometry_type(&self) -> GeometryType {
        GeometryType::Polygon
    }

    fn update_features(
        &self,
        update: &FeatureAttributeUpdate,
        history_columns: &[String],
        filter: &[Vec<FilterCondition>],
    ) -> Result<Option<HistoryCandidateTable>> {
        self.check_failure()?;
        let zero_rows = self.zero_row_incids.lock().unwrap().clone();
        let mut features = self.features.lock().unwrap();
        let mut table = HistoryCandidateTable::default();
        for feature in features.iter_mut() {
            if zero_rows.contains(&feature.key.incid) {
                continue;
            }
            let matched = filter
                .iter()
                .any(|group| evaluate_conditions(group, |c| Self::lookup(feature, c)));
            if !matched {
                continue;
            }
            table.rows.push(Self::candidate(feature, history_columns));
            for (column, value) in &update.columns {
                if column == INCID {
                    feature.key.incid = value.to_text().unwrap_or_default();
                } else {
                    feature.attributes.insert(column.clone(), value.clone());
                }
            }
        }
        Ok(Some(table))
    }

    fn split_feature(
        &self,
        new_fragment_seed: &str,
        filter: &[FilterCondition],
        columns_to_copy: &[String],
    ) -> Result<Option<Vec<FeatureRow>>> {
        self.check_failure()?;
        let parts = self.split_into.load(Ordering::SeqCst).max(1);
        let mut features = self.features.lock().unwrap();
        let Some(index) = features
            .iter()
            .position(|f| evaluate_conditions(filter, |c| Self::lookup(f, c)))
        else {
            return Ok(None);
        };

        let original = &mut features[index];
        let area = original.shape_area.map(|a| a / parts as f64);
        original.shape_area = area;
        let template = original.clone();

        let seed = self
            .split_numbering
            .lock()
            .unwrap()
            .unwrap_or_else(|| parse_fragment_id(new_fragment_seed));
        let mut result = vec![template.clone()];
        for i in 0..(parts as u32 - 1) {
            let mut attributes = BTreeMap::new();
            for column in columns_to_copy {
                if let Some(value) = template.attributes.get(column) {
                    attributes.insert(column.clone(), value.clone());
                }
            }
            result.push(FeatureRow {
                key: FeatureKey::new(
                    template.key.incid.as_str(),
                    template.key.toid.as_str(),
                    format!("{:05}", seed + i),
                ),
                attributes,
                shape_length: template.shape_length,
                shape_area: area,
            });
        }
        features.extend(result.iter().skip(1).cloned());
        Ok(Some(result))
    }

    fn split_features_logically(
        &self,
        new_incid: &str,
        history_columns: &[String],
    ) -> Result<Option<HistoryCandidateTable>> {
        self.check_failure()?;
        let selection = self.selection.lock().unwrap().clone();
        let renumbering = self.logical_renumbering.lock().unwrap().clone();
        let mut features = self.features.lock().unwrap();
        let mut table = HistoryCandidateTable::default();
        for feature in features.iter_mut() {
            let selected = selection.iter().any(|k| {
                k.toid == feature.key.toid && k.toid_fragment_id == feature.key.toid_fragment_id
            });
            if !selected {
                continue;
            }
            let fragment = renumbering
                .get(&(feature.key.toid.clone(), feature.key.toid_fragment_id.clone()))
                .cloned()
                .unwrap_or_else(|| feature.key.toid_fragment_id.clone());
            table.rows.push(
                Self::candidate(feature, history_columns)
                    .with(MODIFIED_INCID, new_incid)
                    .with(MODIFIED_TOID_FRAGMENT_ID, fragment.as_str()),
            );
            feature.key.incid = new_incid.to_string();
            feature.key.toid_fragment_id = fragment;
        }
        Ok(Some(table))
    }

    fn count_map_selection(&self) -> Result<SelectionCount> {
        let selection = self.selection.lock().unwrap();
        let incids: HashSet<&str> = selection.iter().map(|k| k.incid.as_str()).collect();
        let toids: HashSet<&str> = selection.iter().map(|k| k.toid.as_str()).collect();
        Ok(SelectionCount {
            features: selection.len(),
            incids: incids.len(),
            toids: toids.len(),
            fragments: selection.len(),
        })
    }
}
