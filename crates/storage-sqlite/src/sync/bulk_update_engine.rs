//! Applies one attribute template to many incids in a single unit of work.

use chrono::Local;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::{debug, info};

use incid_sync_core::bap::{
    derive_desired_auto, derive_desired_user, reconcile_bap, PotentialHabitatClassifier,
};
use incid_sync_core::conditions::{
    chunk_incid_conditions, quote_identifier, FilterCondition, RenderedSql, SqlValue,
};
use incid_sync_core::errors::{Error, Result};
use incid_sync_core::gis::{require_history, FeatureAttributeUpdate, GisSyncAdapter};
use incid_sync_core::history::{
    history_timestamp, HistoryCandidateTable, HistoryFixedValues, Operation, MODIFIED_DATE,
};
use incid_sync_core::incid::{derive_ihs_summary, MultiplexCategory};
use incid_sync_core::reconcile::{reconcile_child_rows, renumber_sources, MultiplexRow};
use incid_sync_core::sync::{BulkHeaderFields, BulkUpdateOutcome, BulkUpdateRequest, SaveContext};

use crate::errors::StorageError;
use crate::executors::apply_child_plan;
use crate::history::HistoryWriter;
use crate::ids::IdAllocator;
use crate::incid::{
    load_bap, load_header, load_multiplex_rows, load_multiplex_slots, load_sources,
    update_shadow_attributes,
};
use crate::lookups::{habitat_category, LookupPotentialHabitats, LookupValidator};
use crate::schema::incid_header;
use crate::sql;

/// `UPDATE incid SET <template columns>, version + 1, stamps WHERE incid = ?`.
/// The incid bind is pushed per row.
fn header_template(fields: &BulkHeaderFields, user_id: &str, stamp: &str) -> RenderedSql {
    let mut statement = RenderedSql::new("UPDATE `incid` SET ");
    for (column, value) in fields.assignments() {
        statement.push_sql(&format!("{} = ?, ", quote_identifier(column)));
        statement.binds.push(SqlValue::from(value));
    }
    statement.push_sql(
        "`ihs_version` = `ihs_version` + 1, `last_modified_date` = ?, `last_modified_user_id` = ? \
         WHERE `incid` = ?",
    );
    statement.binds.push(SqlValue::from(stamp));
    statement.binds.push(SqlValue::from(user_id));
    statement
}

/// Deletes multiplex rows of `incid` whose code is not allowed for `habitat`.
fn delete_orphans(
    conn: &mut SqliteConnection,
    category: MultiplexCategory,
    incid: &str,
    habitat: &str,
) -> Result<usize> {
    let table = category.table_name();
    let code = category.code_column();
    let mut statement = RenderedSql::new(format!(
        "DELETE FROM {table} WHERE {incid_col} = ? AND NOT EXISTS \
         (SELECT 1 FROM {lookup} l WHERE l.code_habitat = ? AND l.{lookup_code} = {table}.{code})",
        table = quote_identifier(table),
        incid_col = quote_identifier("incid"),
        lookup = quote_identifier(category.habitat_lookup_table()),
        lookup_code = quote_identifier(&format!("code_{}", code)),
        code = quote_identifier(code),
    ));
    statement.binds.push(SqlValue::from(incid));
    statement.binds.push(SqlValue::from(habitat));
    sql::execute(conn, &statement)
}

pub struct BulkUpdateEngine<'a> {
    gis: &'a dyn GisSyncAdapter,
    ctx: &'a SaveContext,
}

impl<'a> BulkUpdateEngine<'a> {
    pub fn new(gis: &'a dyn GisSyncAdapter, ctx: &'a SaveContext) -> Self {
        Self { gis, ctx }
    }

    /// Runs the template over every distinct incid. Any failing statement or
    /// GIS call aborts the whole batch.
    pub fn run(
        &self,
        conn: &mut SqliteConnection,
        request: BulkUpdateRequest,
    ) -> Result<BulkUpdateOutcome> {
        let ctx = self.ctx;
        let mut incids: Vec<String> = Vec::with_capacity(request.incids.len());
        for incid in request.incids {
            if !incid.trim().is_empty() && !incids.contains(&incid) {
                incids.push(incid);
            }
        }
        if incids.is_empty() {
            return Ok(BulkUpdateOutcome::default());
        }

        let mut template = request.template;
        if template
            .header
            .ihs_habitat
            .as_deref()
            .is_some_and(|h| h.trim().is_empty())
        {
            template.header.ihs_habitat = None;
        }
        let validator = LookupValidator::load(conn)?;
        validator.filter_multiplex("bulk template", &mut template.multiplex);
        template.multiplex.compact();
        validator.filter_sources("bulk template", &mut template.sources);
        renumber_sources(&mut template.sources);

        let stamp = history_timestamp(Local::now());
        let header_sql = header_template(&template.header, &ctx.user_id, &stamp);
        let classifier = LookupPotentialHabitats::load(conn)?;
        let categories = template.touched_categories();
        let per_incid = template.needs_per_incid_summary();
        let touches_bap = template.touches_bap();
        let new_habitat = template.header.ihs_habitat.clone();

        let mut ids = IdAllocator::new();
        let mut outcome = BulkUpdateOutcome::default();
        let mut summaries: Vec<(String, Option<String>, Option<String>)> = Vec::new();

        for incid in &incids {
            // User-added rows are those outside the potential set before the
            // template is applied.
            let existing_user = if touches_bap {
                let before = load_header(conn, incid)?;
                let slots = load_multiplex_slots(conn, incid)?;
                let habitat = before
                    .ihs_habitat
                    .as_deref()
                    .filter(|h| !h.trim().is_empty());
                let potential = classifier.potential_habitats(habitat, &slots)?;
                derive_desired_user(&potential, &load_bap(conn, incid)?)
            } else {
                Vec::new()
            };

            if let Some(habitat) = new_habitat.as_deref() {
                for category in MultiplexCategory::ALL {
                    outcome.orphans_deleted += delete_orphans(conn, category, incid, habitat)?;
                }
            }

            let mut statement = header_sql.clone();
            statement.binds.push(SqlValue::from(incid.as_str()));
            let affected = sql::execute(conn, &statement)?;
            if affected != 1 {
                return Err(Error::statement(
                    "incid",
                    "update",
                    format!("expected 1 row affected for {}, got {}", incid, affected),
                ));
            }
            outcome.statements.updated += 1;
            let header = load_header(conn, incid)?;

            for category in &categories {
                let current = load_multiplex_rows(conn, *category, incid)?;
                let desired = MultiplexRow::desired_from_slots(*category, incid, &template.multiplex);
                let plan = reconcile_child_rows(incid, &desired, &current, ctx.bulk_delete_extra_rows);
                outcome.statements.add(apply_child_plan(
                    conn,
                    ctx.bulk_execution_strategy,
                    &mut ids,
                    plan,
                )?);
            }

            if template.touches_sources() {
                let current = load_sources(conn, incid)?;
                let plan =
                    reconcile_child_rows(incid, &template.sources, &current, ctx.bulk_delete_extra_rows);
                outcome.statements.add(apply_child_plan(
                    conn,
                    ctx.bulk_execution_strategy,
                    &mut ids,
                    plan,
                )?);
            }

            let slots = load_multiplex_slots(conn, incid)?;
            let habitat = header
                .ihs_habitat
                .as_deref()
                .filter(|h| !h.trim().is_empty());
            if touches_bap {
                let potential = classifier.potential_habitats(habitat, &slots)?;
                let current_bap = load_bap(conn, incid)?;
                let auto = derive_desired_auto(incid, &potential, &current_bap);
                // Template records win a code collision with existing ones.
                let user = template
                    .bap_user
                    .iter()
                    .chain(existing_user.iter())
                    .cloned()
                    .collect::<Vec<_>>();
                let plan = reconcile_bap(
                    incid,
                    &auto,
                    &user,
                    &current_bap,
                    &potential,
                    ctx.bap_delete_unmatched,
                )?;
                outcome.statements.add(apply_child_plan(
                    conn,
                    ctx.bulk_execution_strategy,
                    &mut ids,
                    plan,
                )?);
            }

            if per_incid {
                let category = habitat_category(conn, habitat)?;
                let summary = derive_ihs_summary(habitat, &slots);
                diesel::update(incid_header::table.find(incid.as_str()))
                    .set((
                        incid_header::ihs_category.eq(category.as_deref()),
                        incid_header::ihs_summary.eq(summary.as_deref()),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                summaries.push((incid.clone(), category, summary));
            }
            debug!("Bulk template applied to {}", incid);
        }

        let mut candidates = HistoryCandidateTable::default();
        if per_incid {
            for (incid, category, summary) in &summaries {
                let update = FeatureAttributeUpdate::new()
                    .set("ihs_category", category.clone())
                    .set("ihs_summary", summary.clone());
                let filter = vec![vec![FilterCondition::eq("incid", incid.as_str())]];
                outcome.gis_calls += 1;
                let table = require_history(
                    self.gis
                        .update_features(&update, &ctx.history_columns, &filter)?,
                    "UpdateFeatures",
                )?;
                update_shadow_attributes(conn, &filter, &update)?;
                candidates.extend(table);
            }
        } else {
            // Derived attributes are unchanged; the call only collects
            // history candidates for every feature of the batch.
            let filter = chunk_incid_conditions(&incids, ctx.condition_chunk_size);
            outcome.gis_calls += 1;
            candidates = require_history(
                self.gis
                    .update_features(&FeatureAttributeUpdate::new(), &ctx.history_columns, &filter)?,
                "UpdateFeatures",
            )?;
        }
        outcome.features_updated = candidates.len();

        if ctx.bulk_write_history {
            let writer = HistoryWriter::new(
                self.gis.geometry_type(),
                ctx.history_columns.clone(),
                ctx.user_id.as_str(),
            );
            outcome.history_rows = writer
                .write(
                    conn,
                    &candidates,
                    HistoryFixedValues::new(Operation::BulkUpdate)
                        .reason(&ctx.reason)
                        .process(&ctx.process)
                        .set(MODIFIED_DATE, stamp.as_str()),
                )?
                .len();
        }
        outcome.incids_updated = incids.len();

        info!(
            "Bulk update of {} incid(s): {} statement(s), {} orphan(s), {} feature(s) in {} GIS call(s)",
            outcome.incids_updated,
            outcome.statements.total(),
            outcome.orphans_deleted,
            outcome.features_updated,
            outcome.gis_calls
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_bap, seed_incid, seed_shadow, setup_db, FakeGis};
    use incid_sync_core::settings::{BulkExecutionStrategy, SyncSettings};
    use incid_sync_core::sync::BulkUpdateTemplate;

    fn context(strategy: BulkExecutionStrategy) -> SaveContext {
        let settings = SyncSettings {
            bulk_execution_strategy: strategy,
            ..SyncSettings::default()
        };
        SaveContext::from_settings(&settings, "Survey", "Bulk").unwrap()
    }

    fn request(incids: &[&str], template: BulkUpdateTemplate) -> BulkUpdateRequest {
        BulkUpdateRequest {
            incids: incids.iter().map(|s| s.to_string()).collect(),
            template,
            reason: "Survey".to_string(),
            process: "Bulk".to_string(),
        }
    }

    #[test]
    fn header_template_binds_assignments_then_stamps() {
        let fields = BulkHeaderFields {
            site_name: Some("Meadow".to_string()),
            ..Default::default()
        };
        let statement = header_template(&fields, "u", "2024-01-01 00:00:00");
        assert_eq!(
            statement.sql,
            "UPDATE `incid` SET `site_name` = ?, `ihs_version` = `ihs_version` + 1, \
             `last_modified_date` = ?, `last_modified_user_id` = ? WHERE `incid` = ?"
        );
        assert_eq!(statement.binds.len(), 3);
    }

    #[tokio::test]
    async fn habitat_change_deletes_orphans_and_updates_per_incid() {
        let (pool, _writer) = setup_db();
        let mut conn = pool.get().unwrap();
        seed_incid(&mut conn, "HLU:0000001", &["M1", "M3"]);
        seed_incid(&mut conn, "HLU:0000002", &["M2"]);
        seed_shadow(&mut conn, "HLU:0000001", &[("T1", "00001")]);
        seed_shadow(&mut conn, "HLU:0000002", &[("T2", "00001")]);
        let gis = FakeGis::new();
        gis.add_features("HLU:0000001", &[("T1", "00001")]);
        gis.add_features("HLU:0000002", &[("T2", "00001")]);

        let template = BulkUpdateTemplate {
            header: BulkHeaderFields {
                ihs_habitat: Some("GA0".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let ctx = context(BulkExecutionStrategy::InlineSql);
        let outcome = BulkUpdateEngine::new(&gis, &ctx)
            .run(&mut conn, request(&["HLU:0000001", "HLU:0000002", "HLU:0000001"], template))
            .unwrap();

        assert_eq!(outcome.incids_updated, 2);
        // M3 is not allowed under GA0
        assert_eq!(outcome.orphans_deleted, 1);
        assert_eq!(outcome.gis_calls, 2);
        assert_eq!(outcome.history_rows, 2);
        let header = load_header(&mut conn, "HLU:0000001").unwrap();
        assert_eq!(header.ihs_version, 2);
        assert_eq!(header.ihs_summary.as_deref(), Some("GA0.M1"));
    }

    #[tokio::test]
    async fn header_only_template_uses_one_batched_gis_call() {
        let (pool, _writer) = setup_db();
        let mut conn = pool.get().unwrap();
        for incid in ["HLU:0000001", "HLU:0000002", "HLU:0000003"] {
            seed_incid(&mut conn, incid, &[]);
            seed_numbered_shadow(&mut conn, incid);
        }
        let gis = FakeGis::new();
        for (incid, toid) in [("HLU:0000001", "T1"), ("HLU:0000002", "T2"), ("HLU:0000003", "T3")] {
            gis.add_features(incid, &[(toid, "00001")]);
        }

        let template = BulkUpdateTemplate {
            header: BulkHeaderFields {
                site_name: Some("Meadow".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let ctx = context(BulkExecutionStrategy::TableAdapter);
        let outcome = BulkUpdateEngine::new(&gis, &ctx)
            .run(
                &mut conn,
                request(&["HLU:0000001", "HLU:0000002", "HLU:0000003"], template),
            )
            .unwrap();
        assert_eq!(outcome.gis_calls, 1);
        assert_eq!(outcome.features_updated, 3);
        assert_eq!(
            load_header(&mut conn, "HLU:0000003").unwrap().site_name.as_deref(),
            Some("Meadow")
        );
    }

    fn seed_numbered_shadow(conn: &mut SqliteConnection, incid: &str) {
        let toid = format!("T{}", &incid[incid.len() - 1..]);
        seed_shadow(conn, incid, &[(toid.as_str(), "00001")]);
    }

    fn determinations(conn: &mut SqliteConnection, incid: &str) -> Vec<(String, Option<String>)> {
        load_bap(conn, incid)
            .unwrap()
            .into_iter()
            .map(|r| (r.bap_habitat, r.quality_determination))
            .collect()
    }

    #[tokio::test]
    async fn header_only_template_leaves_priority_habitats_alone() {
        let (pool, _writer) = setup_db();
        let mut conn = pool.get().unwrap();
        seed_incid(&mut conn, "HLU:0000001", &["M1"]);
        seed_numbered_shadow(&mut conn, "HLU:0000001");
        seed_bap(&mut conn, "HLU:0000001", &[("USR", "D"), ("BAP-A", "D")]);
        let gis = FakeGis::new();
        gis.add_features("HLU:0000001", &[("T1", "00001")]);

        let template = BulkUpdateTemplate {
            header: BulkHeaderFields {
                site_name: Some("Meadow".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let settings = SyncSettings {
            bap_delete_unmatched: true,
            ..SyncSettings::default()
        };
        let ctx = SaveContext::from_settings(&settings, "Survey", "Bulk").unwrap();
        BulkUpdateEngine::new(&gis, &ctx)
            .run(&mut conn, request(&["HLU:0000001"], template))
            .unwrap();

        assert_eq!(
            determinations(&mut conn, "HLU:0000001"),
            vec![
                ("USR".to_string(), Some("D".to_string())),
                ("BAP-A".to_string(), Some("D".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn habitat_change_keeps_user_rows_and_retires_stale_auto_rows() {
        let (pool, _writer) = setup_db();
        let mut conn = pool.get().unwrap();
        seed_incid(&mut conn, "HLU:0000001", &["M1"]);
        seed_numbered_shadow(&mut conn, "HLU:0000001");
        seed_bap(&mut conn, "HLU:0000001", &[("USR", "D"), ("BAP-A", "D")]);
        let gis = FakeGis::new();
        gis.add_features("HLU:0000001", &[("T1", "00001")]);

        let template = BulkUpdateTemplate {
            header: BulkHeaderFields {
                ihs_habitat: Some("WB0".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let ctx = context(BulkExecutionStrategy::TableAdapter);
        BulkUpdateEngine::new(&gis, &ctx)
            .run(&mut conn, request(&["HLU:0000001"], template))
            .unwrap();

        assert_eq!(
            determinations(&mut conn, "HLU:0000001"),
            vec![
                ("USR".to_string(), Some("D".to_string())),
                ("BAP-A".to_string(), Some("X".to_string())),
                ("BAP-W".to_string(), Some("D".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn batched_gis_call_spans_several_condition_chunks() {
        let (pool, _writer) = setup_db();
        let mut conn = pool.get().unwrap();
        let gis = FakeGis::new();
        let incids: Vec<String> = (1..=5).map(|n| format!("HLU:000000{}", n)).collect();
        for incid in &incids {
            seed_incid(&mut conn, incid, &[]);
            seed_numbered_shadow(&mut conn, incid);
            let toid = format!("T{}", &incid[incid.len() - 1..]);
            gis.add_features(incid, &[(toid.as_str(), "00001")]);
        }

        let settings = SyncSettings {
            condition_chunk_size: 2,
            ..SyncSettings::default()
        };
        let ctx = SaveContext::from_settings(&settings, "Survey", "Bulk").unwrap();
        let template = BulkUpdateTemplate {
            header: BulkHeaderFields {
                site_name: Some("Meadow".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let refs: Vec<&str> = incids.iter().map(String::as_str).collect();
        let outcome = BulkUpdateEngine::new(&gis, &ctx)
            .run(&mut conn, request(&refs, template))
            .unwrap();

        assert_eq!(chunk_incid_conditions(&incids, 2).len(), 3);
        assert_eq!(outcome.gis_calls, 1);
        assert_eq!(outcome.features_updated, 5);
        assert_eq!(outcome.history_rows, 5);
    }

    #[tokio::test]
    async fn empty_selection_is_a_no_op() {
        let (pool, _writer) = setup_db();
        let mut conn = pool.get().unwrap();
        let gis = FakeGis::new();
        let ctx = context(BulkExecutionStrategy::InlineSql);
        let outcome = BulkUpdateEngine::new(&gis, &ctx)
            .run(&mut conn, request(&[], BulkUpdateTemplate::default()))
            .unwrap();
        assert_eq!(outcome, BulkUpdateOutcome::default());
        assert_eq!(gis.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
