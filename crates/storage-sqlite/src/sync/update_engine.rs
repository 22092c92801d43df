//! Single-incid save: header, dirty child tables, GIS attributes, shadow
//! table and history in one unit of work.

use chrono::Local;
use diesel::sqlite::SqliteConnection;
use log::{debug, info};

use incid_sync_core::bap::{derive_desired_auto, reconcile_bap, BapRecord, PotentialHabitatClassifier};
use incid_sync_core::conditions::FilterCondition;
use incid_sync_core::errors::Result;
use incid_sync_core::gis::{require_history, FeatureAttributeUpdate, GisSyncAdapter};
use incid_sync_core::history::{history_timestamp, HistoryFixedValues, Operation, MODIFIED_DATE};
use incid_sync_core::incid::{derive_ihs_summary, MultiplexCategory, SaveRequest};
use incid_sync_core::reconcile::{
    reconcile_child_rows, renumber_sources, AppliedCounts, ChildRow, MultiplexRow,
};
use incid_sync_core::settings::BulkExecutionStrategy;
use incid_sync_core::sync::{SaveContext, SaveOutcome};

use crate::executors::apply_child_plan;
use crate::history::HistoryWriter;
use crate::ids::IdAllocator;
use crate::incid::{
    load_bap, load_header, load_multiplex_rows, load_sources, reset_pending_osmm,
    update_header, update_shadow_attributes,
};
use crate::lookups::{habitat_category, LookupPotentialHabitats, LookupValidator};

pub struct UpdateEngine<'a> {
    gis: &'a dyn GisSyncAdapter,
    ctx: &'a SaveContext,
}

impl<'a> UpdateEngine<'a> {
    pub fn new(gis: &'a dyn GisSyncAdapter, ctx: &'a SaveContext) -> Self {
        Self { gis, ctx }
    }

    /// Persists one edited incid. Child tables are reconciled only when
    /// marked dirty and always converge exactly onto the edited slots.
    pub fn save(&self, conn: &mut SqliteConnection, request: SaveRequest) -> Result<SaveOutcome> {
        let ctx = self.ctx;
        let edit = request.edit;
        let incid = edit.incid_id().to_string();
        let persisted = load_header(conn, &incid)?;

        let validator = LookupValidator::load(conn)?;
        let mut multiplex = edit.multiplex.clone();
        validator.filter_multiplex(&incid, &mut multiplex);
        multiplex.compact();
        let mut sources = edit.sources.clone();
        validator.filter_sources(&incid, &mut sources);
        renumber_sources(&mut sources);

        let stamp = history_timestamp(Local::now());
        let habitat = edit.habitat();
        let mut header = edit.incid.clone();
        header.ihs_category = habitat_category(conn, habitat)?;
        header.ihs_summary = derive_ihs_summary(habitat, &multiplex);
        header.ihs_version = persisted.ihs_version + 1;
        header.created_date = persisted.created_date;
        header.created_user_id = persisted.created_user_id;
        header.last_modified_date = stamp.clone();
        header.last_modified_user_id = ctx.user_id.clone();
        update_header(conn, &header)?;

        let mut ids = IdAllocator::new();
        let mut counts = AppliedCounts::default();
        for category in MultiplexCategory::ALL {
            if !request.dirty.is_multiplex_dirty(category) {
                continue;
            }
            let current = load_multiplex_rows(conn, category, &incid)?;
            let desired = MultiplexRow::desired_from_slots(category, &incid, &multiplex);
            let plan = reconcile_child_rows(&incid, &desired, &current, true);
            counts.add(apply_child_plan(conn, BulkExecutionStrategy::TableAdapter, &mut ids, plan)?);
        }

        if request.dirty.bap {
            let classifier = LookupPotentialHabitats::load(conn)?;
            let potential = classifier.potential_habitats(habitat, &multiplex)?;
            let current = load_bap(conn, &incid)?;
            // Edited auto metadata takes precedence over what is stored.
            let known: Vec<BapRecord> = edit
                .bap_auto
                .iter()
                .chain(current.iter())
                .cloned()
                .collect();
            let auto = derive_desired_auto(&incid, &potential, &known);
            let plan = reconcile_bap(
                &incid,
                &auto,
                &edit.bap_user,
                &current,
                &potential,
                ctx.bap_delete_unmatched,
            )?;
            counts.add(apply_child_plan(conn, BulkExecutionStrategy::TableAdapter, &mut ids, plan)?);
        }

        if request.dirty.sources {
            let current = load_sources(conn, &incid)?;
            let desired = sources
                .iter()
                .cloned()
                .map(|slot| {
                    slot.map(|mut source| {
                        source.set_incid(&incid);
                        source
                    })
                })
                .collect::<Vec<_>>();
            let plan = reconcile_child_rows(&incid, &desired, &current, true);
            counts.add(apply_child_plan(conn, BulkExecutionStrategy::TableAdapter, &mut ids, plan)?);
        }

        if ctx.reset_pending_osmm_update {
            reset_pending_osmm(conn, &incid, &ctx.user_id, &stamp)?;
        }

        let update = FeatureAttributeUpdate::new()
            .set("ihs_category", header.ihs_category.clone())
            .set("ihs_summary", header.ihs_summary.clone());
        let filter = vec![vec![FilterCondition::eq("incid", incid.as_str())]];
        let candidates = require_history(
            self.gis
                .update_features(&update, &ctx.history_columns, &filter)?,
            "UpdateFeatures",
        )?;
        let mirrored = update_shadow_attributes(conn, &filter, &update)?;
        debug!("Mirrored attributes onto {} shadow row(s) of {}", mirrored, incid);

        let writer = HistoryWriter::new(
            self.gis.geometry_type(),
            ctx.history_columns.clone(),
            ctx.user_id.as_str(),
        );
        let history_ids = writer.write(
            conn,
            &candidates,
            HistoryFixedValues::new(Operation::AttributeUpdate)
                .reason(&ctx.reason)
                .process(&ctx.process)
                .incid(&incid)
                .set(MODIFIED_DATE, stamp.as_str()),
        )?;

        info!(
            "Saved {} at version {}: {} statement(s), {} feature(s), {} history row(s)",
            incid,
            header.ihs_version,
            counts.total(),
            candidates.len(),
            history_ids.len()
        );
        Ok(SaveOutcome {
            incid,
            ihs_version: header.ihs_version,
            statements: counts,
            features_updated: candidates.len(),
            history_rows: history_ids.len(),
        })
    }
}
