//! Physical and logical splits.
//!
//! A physical split cuts one feature into several fragments of the same
//! incid. A logical split moves a subset of an incid's features to a newly
//! allocated incid that starts as a copy of the original.

use chrono::Local;
use diesel::sqlite::SqliteConnection;
use log::{debug, info};
use std::collections::BTreeSet;

use incid_sync_core::conditions::{
    chunk_feature_conditions, render_where_clause, FilterCondition, RenderedSql, SqlValue,
};
use incid_sync_core::constants::{GIS_AREA_COLUMN, GIS_LENGTH_COLUMN};
use incid_sync_core::errors::{Error, Result, ValidationError};
use incid_sync_core::gis::{
    require_history, require_split_features, FeatureKey, FeatureRow, GisSyncAdapter,
};
use incid_sync_core::history::{
    history_timestamp, HistoryCandidateRow, HistoryCandidateTable, HistoryFixedValues, Operation,
    INCID, MODIFIED_DATE, MODIFIED_INCID, MODIFIED_TOID_FRAGMENT_ID, TOID, TOID_FRAGMENT_ID,
};
use incid_sync_core::incid::{format_fragment_id, parse_fragment_id, Incid, MultiplexCategory};
use incid_sync_core::reconcile::{
    AppliedCounts, ChildRow, ChildRowExecutor, ReconcilePlan,
};
use incid_sync_core::settings::BulkExecutionStrategy;
use incid_sync_core::sync::{SaveContext, SplitKind, SplitRequest};

use crate::executors::{apply_child_plan, TableAdapterExecutor};
use crate::history::HistoryWriter;
use crate::ids::{next_fragment_id, next_incid, IdAllocator};
use crate::incid::{
    insert_header, insert_shadow_rows, load_bap, load_header, load_multiplex_rows, load_shadow_row,
    load_shadow_rows, load_sources, stamp_header, update_shadow_geometry, MmPolygonDB,
    SHADOW_TABLE,
};
use crate::sql;

/// Relational result of a committed split, before post-commit counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitCommit {
    pub kind: SplitKind,
    /// Incids whose feature counts changed, original first.
    pub incids: Vec<String>,
    pub new_fragment_ids: Vec<String>,
    pub history_rows: usize,
}

/// Copies `rows` onto `new_incid` as fresh inserts.
fn clone_rows<R>(
    conn: &mut SqliteConnection,
    ids: &mut IdAllocator,
    rows: Vec<R>,
    new_incid: &str,
) -> Result<AppliedCounts>
where
    R: ChildRow,
    for<'c> TableAdapterExecutor<'c>: ChildRowExecutor<R>,
{
    let inserts = rows
        .into_iter()
        .map(|mut row| {
            row.set_incid(new_incid);
            row
        })
        .collect::<Vec<_>>();
    let plan = ReconcilePlan {
        final_count: inserts.len(),
        inserts,
        ..Default::default()
    };
    apply_child_plan(conn, BulkExecutionStrategy::TableAdapter, ids, plan)
}

/// Fragment ids of the features a physical split added, as the GIS reports
/// them. The first feature must still be the original; the added ones must
/// share its toid and carry distinct new fragment ids.
fn split_fragment_ids(original: &MmPolygonDB, features: &[FeatureRow]) -> Result<Vec<String>> {
    let mismatch = |message: String| Error::statement(SHADOW_TABLE, "insert", message);
    let first = &features[0].key;
    if first.toid != original.toid || first.toid_fragment_id != original.toid_fragment_id {
        return Err(mismatch(format!(
            "split returned {}:{} first, expected {}:{}",
            first.toid, first.toid_fragment_id, original.toid, original.toid_fragment_id
        )));
    }
    let mut seen = BTreeSet::new();
    seen.insert(original.toid_fragment_id.as_str());
    let mut fragments = Vec::with_capacity(features.len() - 1);
    for feature in &features[1..] {
        let key = &feature.key;
        if key.toid != original.toid
            || key.toid_fragment_id.trim().is_empty()
            || !seen.insert(key.toid_fragment_id.as_str())
        {
            return Err(mismatch(format!(
                "split of {} returned unusable fragment {}:{}",
                original.toid, key.toid, key.toid_fragment_id
            )));
        }
        fragments.push(key.toid_fragment_id.clone());
    }
    Ok(fragments)
}

/// A shadow row move reported by the GIS for a logical split.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ShadowMove {
    toid: String,
    from_fragment: String,
    to_fragment: String,
}

/// Reads the moves out of the logical split candidates and checks they cover
/// exactly `selection`, each feature once, all onto `new_incid`.
fn shadow_moves(
    candidates: &HistoryCandidateTable,
    incid: &str,
    new_incid: &str,
    selection: &[FeatureKey],
) -> Result<Vec<ShadowMove>> {
    let mismatch = |message: String| Error::statement(SHADOW_TABLE, "update", message);
    let expected: BTreeSet<(&str, &str)> = selection
        .iter()
        .map(|k| (k.toid.as_str(), k.toid_fragment_id.as_str()))
        .collect();
    let mut reported = BTreeSet::new();
    let mut moves = Vec::with_capacity(candidates.len());
    for row in &candidates.rows {
        let (Some(toid), Some(from_fragment)) = (row.text(TOID), row.text(TOID_FRAGMENT_ID)) else {
            return Err(mismatch("split candidate without toid or fragment id".to_string()));
        };
        if row.text(INCID).as_deref() != Some(incid)
            || row.text(MODIFIED_INCID).as_deref() != Some(new_incid)
        {
            return Err(mismatch(format!(
                "feature {}:{} was not moved from {} to {}",
                toid, from_fragment, incid, new_incid
            )));
        }
        if !expected.contains(&(toid.as_str(), from_fragment.as_str()))
            || !reported.insert((toid.clone(), from_fragment.clone()))
        {
            return Err(mismatch(format!(
                "GIS moved {}:{} which is not part of the selection",
                toid, from_fragment
            )));
        }
        let to_fragment = row
            .text(MODIFIED_TOID_FRAGMENT_ID)
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| from_fragment.clone());
        moves.push(ShadowMove {
            toid,
            from_fragment,
            to_fragment,
        });
    }
    if moves.len() != expected.len() {
        return Err(mismatch(format!(
            "GIS moved {} of {} selected feature(s)",
            moves.len(),
            expected.len()
        )));
    }
    Ok(moves)
}

/// History entry for one incid header touched by a logical split.
fn header_history(header: &Incid, new_incid: &str) -> HistoryCandidateRow {
    HistoryCandidateRow::new()
        .with(INCID, header.incid.as_str())
        .with(MODIFIED_INCID, new_incid)
        .with("ihs_category", header.ihs_category.clone())
        .with("ihs_summary", header.ihs_summary.clone())
}

pub struct SplitEngine<'a> {
    gis: &'a dyn GisSyncAdapter,
    ctx: &'a SaveContext,
}

impl<'a> SplitEngine<'a> {
    pub fn new(gis: &'a dyn GisSyncAdapter, ctx: &'a SaveContext) -> Self {
        Self { gis, ctx }
    }

    pub fn split(&self, conn: &mut SqliteConnection, request: &SplitRequest) -> Result<SplitCommit> {
        match request.classify()? {
            SplitKind::Physical => self.physical(conn, &request.selection[0]),
            SplitKind::Logical => self.logical(conn, &request.selection),
        }
    }

    fn history_writer(&self) -> HistoryWriter {
        HistoryWriter::new(
            self.gis.geometry_type(),
            self.ctx.history_columns.clone(),
            self.ctx.user_id.as_str(),
        )
    }

    fn fixed(&self, operation: Operation, stamp: &str) -> HistoryFixedValues {
        HistoryFixedValues::new(operation)
            .reason(&self.ctx.reason)
            .process(&self.ctx.process)
            .set(MODIFIED_DATE, stamp)
    }

    fn physical(&self, conn: &mut SqliteConnection, key: &FeatureKey) -> Result<SplitCommit> {
        let ctx = self.ctx;
        let original = load_shadow_row(conn, &key.toid, &key.toid_fragment_id)?
            .filter(|row| row.incid == key.incid)
            .ok_or_else(|| ValidationError::NotSplittable(key.incid.clone()))?;

        let first_new = next_fragment_id(conn, &key.toid)?;
        let seed = format_fragment_id(first_new);
        let filter = vec![
            FilterCondition::eq(TOID, key.toid.as_str()),
            FilterCondition::eq(TOID_FRAGMENT_ID, key.toid_fragment_id.as_str()),
            FilterCondition::eq(INCID, key.incid.as_str()),
        ];
        let mut columns_to_copy = vec![INCID.to_string()];
        for column in &ctx.history_columns {
            if !columns_to_copy.contains(column) {
                columns_to_copy.push(column.clone());
            }
        }
        let features = require_split_features(self.gis.split_feature(&seed, &filter, &columns_to_copy)?)?;

        let stamp = history_timestamp(Local::now());
        let mut candidate = HistoryCandidateRow::new()
            .with(INCID, original.incid.as_str())
            .with(TOID, original.toid.as_str())
            .with(TOID_FRAGMENT_ID, original.toid_fragment_id.as_str())
            .with("ihs_category", original.ihs_category.clone())
            .with("ihs_summary", original.ihs_summary.clone())
            .with(GIS_LENGTH_COLUMN, original.shape_length)
            .with(GIS_AREA_COLUMN, original.shape_area);
        // Snapshot columns the shadow table does not carry come from the GIS.
        for column in &ctx.history_columns {
            if candidate.get(column).is_none() {
                if let Some(value) = features[0].attributes.get(column) {
                    candidate = candidate.with(column.as_str(), value.clone());
                }
            }
        }
        let history_ids = self.history_writer().write(
            conn,
            &HistoryCandidateTable {
                rows: vec![candidate],
            },
            self.fixed(Operation::PhysicalSplit, &stamp),
        )?;

        update_shadow_geometry(
            conn,
            &original.toid,
            &original.toid_fragment_id,
            features[0].shape_length,
            features[0].shape_area,
        )?;
        let new_fragment_ids = split_fragment_ids(&original, &features)?;
        if parse_fragment_id(&new_fragment_ids[0]) != first_new {
            debug!(
                "GIS numbered the split of {} from {} instead of {}",
                original.toid, new_fragment_ids[0], seed
            );
        }
        let rows = features
            .iter()
            .skip(1)
            .zip(&new_fragment_ids)
            .map(|(feature, fragment)| MmPolygonDB {
                toid: original.toid.clone(),
                toid_fragment_id: fragment.clone(),
                incid: original.incid.clone(),
                ihs_category: original.ihs_category.clone(),
                ihs_summary: original.ihs_summary.clone(),
                shape_length: feature.shape_length,
                shape_area: feature.shape_area,
            })
            .collect::<Vec<_>>();
        insert_shadow_rows(conn, &rows)?;
        stamp_header(conn, &original.incid, &ctx.user_id, &stamp)?;

        info!(
            "Physically split {}:{} of {} into {} feature(s)",
            original.toid,
            original.toid_fragment_id,
            original.incid,
            features.len()
        );
        Ok(SplitCommit {
            kind: SplitKind::Physical,
            incids: vec![original.incid],
            new_fragment_ids,
            history_rows: history_ids.len(),
        })
    }

    fn logical(&self, conn: &mut SqliteConnection, selection: &[FeatureKey]) -> Result<SplitCommit> {
        let ctx = self.ctx;
        let incid = selection
            .first()
            .map(|k| k.incid.clone())
            .ok_or(ValidationError::EmptySelection)?;
        let mut seen = BTreeSet::new();
        let unique = selection
            .iter()
            .filter(|k| seen.insert((k.toid.as_str(), k.toid_fragment_id.as_str())))
            .cloned()
            .collect::<Vec<_>>();
        let groups = chunk_feature_conditions(&unique, ctx.condition_chunk_size);

        let mut selected = 0;
        for group in &groups {
            let mut statement = RenderedSql::new(format!(
                "SELECT COUNT(*) AS c FROM `{}` WHERE `incid` = ?",
                SHADOW_TABLE
            ));
            statement.binds.push(SqlValue::from(incid.as_str()));
            statement.append(render_where_clause(group, false));
            selected += sql::count(conn, &statement)? as usize;
        }
        if selected != unique.len() {
            debug!(
                "{} of {} selected feature(s) belong to {}",
                selected,
                unique.len(),
                incid
            );
            return Err(ValidationError::NotSplittable(incid).into());
        }
        let total = load_shadow_rows(conn, &incid)?.len();
        if selected >= total {
            return Err(ValidationError::WholeIncidSelected(incid).into());
        }

        let stamp = history_timestamp(Local::now());
        let new_incid = next_incid(conn)?.to_string();
        let original = load_header(conn, &incid)?;
        let header = Incid {
            incid: new_incid.clone(),
            ihs_version: 1,
            created_date: stamp.clone(),
            created_user_id: ctx.user_id.clone(),
            last_modified_date: stamp.clone(),
            last_modified_user_id: ctx.user_id.clone(),
            ..original
        };
        insert_header(conn, &header)?;

        let mut ids = IdAllocator::new();
        let mut cloned = AppliedCounts::default();
        for category in MultiplexCategory::ALL {
            let rows = load_multiplex_rows(conn, category, &incid)?;
            cloned.add(clone_rows(conn, &mut ids, rows, &new_incid)?);
        }
        let bap = load_bap(conn, &incid)?;
        cloned.add(clone_rows(conn, &mut ids, bap, &new_incid)?);
        let sources = load_sources(conn, &incid)?;
        cloned.add(clone_rows(conn, &mut ids, sources, &new_incid)?);
        debug!("Copied {} child row(s) from {} to {}", cloned.inserted, incid, new_incid);

        let candidates = require_history(
            self.gis
                .split_features_logically(&new_incid, &ctx.history_columns)?,
            "SplitFeaturesLogically",
        )?;

        let moves = shadow_moves(&candidates, &incid, &new_incid, &unique)?;
        for shadow in &moves {
            let statement = sql::update_statement(
                SHADOW_TABLE,
                &[
                    (INCID, SqlValue::from(new_incid.as_str())),
                    (TOID_FRAGMENT_ID, SqlValue::from(shadow.to_fragment.as_str())),
                ],
                &[
                    FilterCondition::eq(INCID, incid.as_str()),
                    FilterCondition::eq(TOID, shadow.toid.as_str()),
                    FilterCondition::eq(TOID_FRAGMENT_ID, shadow.from_fragment.as_str()),
                ],
            );
            let affected = sql::execute(conn, &statement)?;
            if affected != 1 {
                return Err(Error::statement(
                    SHADOW_TABLE,
                    "update",
                    format!(
                        "expected 1 row for {}:{}, got {}",
                        shadow.toid, shadow.from_fragment, affected
                    ),
                ));
            }
            if shadow.to_fragment != shadow.from_fragment {
                debug!(
                    "Re-keyed {}:{} as fragment {}",
                    shadow.toid, shadow.from_fragment, shadow.to_fragment
                );
            }
        }
        let moved = moves.len();

        stamp_header(conn, &incid, &ctx.user_id, &stamp)?;
        stamp_header(conn, &new_incid, &ctx.user_id, &stamp)?;
        let mut history = candidates;
        history.rows.push(header_history(&load_header(conn, &incid)?, &new_incid));
        history.rows.push(header_history(&load_header(conn, &new_incid)?, &new_incid));
        let history_ids =
            self.history_writer()
                .write(conn, &history, self.fixed(Operation::LogicalSplit, &stamp))?;

        info!(
            "Logically split {} feature(s) of {} into {}",
            moved, incid, new_incid
        );
        Ok(SplitCommit {
            kind: SplitKind::Logical,
            incids: vec![incid, new_incid],
            new_fragment_ids: Vec::new(),
            history_rows: history_ids.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StorageError;
    use crate::history::HistoryDB;
    use crate::schema::history;
    use crate::test_support::{seed_incid, seed_shadow, setup_db, FakeGis};
    use diesel::prelude::*;
    use incid_sync_core::settings::SyncSettings;

    const INCID: &str = "HLU:0000001";

    fn context() -> SaveContext {
        SaveContext::from_settings(&SyncSettings::default(), "Survey", "Split").unwrap()
    }

    fn request(keys: &[(&str, &str)]) -> SplitRequest {
        SplitRequest {
            selection: keys
                .iter()
                .map(|(toid, frag)| FeatureKey::new(INCID, *toid, *frag))
                .collect(),
            reason: "Survey".to_string(),
            process: "Split".to_string(),
        }
    }

    #[tokio::test]
    async fn physical_split_into_three_updates_one_and_inserts_two() {
        let (pool, _writer) = setup_db();
        let mut conn = pool.get().unwrap();
        seed_incid(&mut conn, INCID, &["M1"]);
        seed_shadow(&mut conn, INCID, &[("T1", "00001"), ("T1", "00002")]);
        let gis = FakeGis::new();
        gis.add_features(INCID, &[("T1", "00001"), ("T1", "00002")]);

        let ctx = context();
        let commit = SplitEngine::new(&gis, &ctx)
            .split(&mut conn, &request(&[("T1", "00001")]))
            .unwrap();

        assert_eq!(commit.kind, SplitKind::Physical);
        assert_eq!(commit.new_fragment_ids, vec!["00003".to_string(), "00004".to_string()]);
        assert_eq!(commit.history_rows, 1);

        let rows = load_shadow_rows(&mut conn, INCID).unwrap();
        assert_eq!(rows.len(), 4);
        let original = rows.iter().find(|r| r.toid_fragment_id == "00001").unwrap();
        let third = 100.0 / 3.0;
        assert_eq!(original.shape_area, Some(third));
        let new_rows: Vec<_> = rows
            .iter()
            .filter(|r| r.toid_fragment_id == "00003" || r.toid_fragment_id == "00004")
            .collect();
        assert_eq!(new_rows.len(), 2);
        assert!(new_rows.iter().all(|r| r.ihs_summary.as_deref() == Some("GA0")));
    }

    #[tokio::test]
    async fn physical_split_of_unknown_feature_is_refused() {
        let (pool, _writer) = setup_db();
        let mut conn = pool.get().unwrap();
        seed_incid(&mut conn, INCID, &[]);
        let gis = FakeGis::new();
        let ctx = context();
        let err = SplitEngine::new(&gis, &ctx)
            .split(&mut conn, &request(&[("T9", "00001")]))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::NotSplittable(_))));
        assert_eq!(gis.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn logical_split_moves_selection_to_new_incid() {
        let (pool, _writer) = setup_db();
        let mut conn = pool.get().unwrap();
        seed_incid(&mut conn, INCID, &["M1", "M2"]);
        let features = [("T1", "00001"), ("T2", "00001"), ("T3", "00001")];
        seed_shadow(&mut conn, INCID, &features);
        let gis = FakeGis::new();
        gis.add_features(INCID, &features);
        let request = request(&[("T2", "00001"), ("T3", "00001")]);
        gis.select(request.selection.clone());

        let ctx = context();
        let commit = SplitEngine::new(&gis, &ctx).split(&mut conn, &request).unwrap();

        assert_eq!(commit.kind, SplitKind::Logical);
        assert_eq!(commit.incids, vec![INCID.to_string(), "HLU:0000011".to_string()]);
        // two moved features plus both headers
        assert_eq!(commit.history_rows, 4);
        let header_rows: Vec<HistoryDB> = history::table
            .filter(history::toid.is_null())
            .order(history::history_id)
            .select(HistoryDB::as_select())
            .load(&mut conn)
            .unwrap();
        let incids: Vec<&str> = header_rows.iter().map(|r| r.incid.as_str()).collect();
        assert_eq!(incids, vec![INCID, "HLU:0000011"]);
        assert!(header_rows
            .iter()
            .all(|r| r.modified_incid.as_deref() == Some("HLU:0000011")));

        assert_eq!(load_shadow_rows(&mut conn, INCID).unwrap().len(), 1);
        assert_eq!(load_shadow_rows(&mut conn, "HLU:0000011").unwrap().len(), 2);
        let copied = load_multiplex_rows(&mut conn, MultiplexCategory::Matrix, "HLU:0000011").unwrap();
        assert_eq!(copied.len(), 2);
        let header = load_header(&mut conn, "HLU:0000011").unwrap();
        assert_eq!(header.ihs_summary.as_deref(), Some("GA0.M1.M2"));
        assert_eq!(gis.features_of("HLU:0000011").len(), 2);
    }

    #[tokio::test]
    async fn logical_split_of_every_feature_is_refused() {
        let (pool, _writer) = setup_db();
        let mut conn = pool.get().unwrap();
        seed_incid(&mut conn, INCID, &[]);
        let features = [("T1", "00001"), ("T2", "00001")];
        seed_shadow(&mut conn, INCID, &features);
        let gis = FakeGis::new();
        let ctx = context();
        let err = SplitEngine::new(&gis, &ctx)
            .split(&mut conn, &request(&features))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::WholeIncidSelected(_))
        ));
    }

    #[tokio::test]
    async fn physical_split_keeps_fragment_ids_reported_by_gis() {
        let (pool, _writer) = setup_db();
        let mut conn = pool.get().unwrap();
        seed_incid(&mut conn, INCID, &[]);
        seed_shadow(&mut conn, INCID, &[("T1", "00001")]);
        let gis = FakeGis::new();
        gis.add_features(INCID, &[("T1", "00001")]);
        gis.number_split_fragments_from(7);

        let ctx = context();
        let commit = SplitEngine::new(&gis, &ctx)
            .split(&mut conn, &request(&[("T1", "00001")]))
            .unwrap();

        assert_eq!(commit.new_fragment_ids, vec!["00007".to_string(), "00008".to_string()]);
        let mut shadow: Vec<String> = load_shadow_rows(&mut conn, INCID)
            .unwrap()
            .into_iter()
            .map(|r| r.toid_fragment_id)
            .collect();
        shadow.sort();
        let mut layer: Vec<String> = gis
            .features_of(INCID)
            .into_iter()
            .map(|f| f.key.toid_fragment_id)
            .collect();
        layer.sort();
        assert_eq!(shadow, layer);
    }

    #[tokio::test]
    async fn logical_split_follows_gis_fragment_renumbering() {
        let (pool, _writer) = setup_db();
        let mut conn = pool.get().unwrap();
        seed_incid(&mut conn, INCID, &[]);
        let features = [("T1", "00001"), ("T2", "00001"), ("T3", "00001")];
        seed_shadow(&mut conn, INCID, &features);
        let gis = FakeGis::new();
        gis.add_features(INCID, &features);
        let request = request(&[("T2", "00001"), ("T3", "00001")]);
        gis.select(request.selection.clone());
        gis.renumber_on_logical_split("T3", "00001", "00009");

        let ctx = context();
        SplitEngine::new(&gis, &ctx).split(&mut conn, &request).unwrap();

        let mut moved: Vec<(String, String)> = load_shadow_rows(&mut conn, "HLU:0000011")
            .unwrap()
            .into_iter()
            .map(|r| (r.toid, r.toid_fragment_id))
            .collect();
        moved.sort();
        assert_eq!(
            moved,
            vec![
                ("T2".to_string(), "00001".to_string()),
                ("T3".to_string(), "00009".to_string()),
            ]
        );
        let renumbered: Option<String> = history::table
            .filter(history::toid.eq("T3"))
            .select(history::modified_toid_fragment_id)
            .first(&mut conn)
            .unwrap();
        assert_eq!(renumbered.as_deref(), Some("00009"));
    }

    #[tokio::test]
    async fn logical_split_rolls_back_when_gis_moves_other_features() {
        let (pool, _writer) = setup_db();
        let mut conn = pool.get().unwrap();
        seed_incid(&mut conn, INCID, &[]);
        let features = [("T1", "00001"), ("T2", "00001"), ("T3", "00001"), ("T4", "00001")];
        seed_shadow(&mut conn, INCID, &features);
        let gis = FakeGis::new();
        gis.add_features(INCID, &features);
        gis.select(vec![
            FeatureKey::new(INCID, "T1", "00001"),
            FeatureKey::new(INCID, "T2", "00001"),
            FeatureKey::new(INCID, "T3", "00001"),
        ]);

        let ctx = context();
        let request = request(&[("T2", "00001"), ("T3", "00001")]);
        let err = conn
            .immediate_transaction::<_, StorageError, _>(|conn| {
                SplitEngine::new(&gis, &ctx)
                    .split(conn, &request)
                    .map_err(StorageError::Core)
            })
            .map_err(Error::from)
            .unwrap_err();

        assert!(matches!(err, Error::Statement { .. }));
        assert_eq!(load_shadow_rows(&mut conn, INCID).unwrap().len(), 4);
        assert!(load_header(&mut conn, "HLU:0000011").is_err());
        let history_rows: i64 = history::table.count().get_result(&mut conn).unwrap();
        assert_eq!(history_rows, 0);
    }
}
