use async_trait::async_trait;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use log::info;
use std::sync::Arc;

use incid_sync_core::bap::{derive_desired_user, PotentialHabitatClassifier};
use incid_sync_core::errors::Result;
use incid_sync_core::gis::GisSyncAdapter;
use incid_sync_core::incid::{IncidEdit, IncidId, SaveRequest};
use incid_sync_core::settings::SyncSettings;
use incid_sync_core::sync::{
    BulkUpdateOutcome, BulkUpdateRequest, IncidSyncServiceTrait, SaveContext, SaveOutcome,
    SplitOutcome, SplitRequest,
};

use super::bulk_update_engine::BulkUpdateEngine;
use super::split_engine::SplitEngine;
use super::update_engine::UpdateEngine;
use crate::db::{get_connection, WriteHandle};
use crate::incid::{
    count_incid_features, load_bap, load_header, load_multiplex_slots, load_source_slots,
};
use crate::lookups::LookupPotentialHabitats;

pub struct IncidSyncRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
    gis: Arc<dyn GisSyncAdapter>,
    settings: SyncSettings,
}

impl IncidSyncRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
        gis: Arc<dyn GisSyncAdapter>,
        settings: SyncSettings,
    ) -> Self {
        IncidSyncRepository {
            pool,
            writer,
            gis,
            settings,
        }
    }

    fn load_incid_impl(&self, incid: &str) -> Result<IncidEdit> {
        let mut conn = get_connection(&self.pool)?;
        let header = load_header(&mut conn, incid)?;
        let multiplex = load_multiplex_slots(&mut conn, incid)?;
        let sources = load_source_slots(&mut conn, incid)?;
        let bap = load_bap(&mut conn, incid)?;

        let classifier = LookupPotentialHabitats::load(&mut conn)?;
        let habitat = header
            .ihs_habitat
            .as_deref()
            .filter(|h| !h.trim().is_empty());
        let potential = classifier.potential_habitats(habitat, &multiplex)?;
        let bap_user = derive_desired_user(&potential, &bap);
        let bap_auto = bap
            .into_iter()
            .filter(|r| potential.contains(&r.bap_habitat))
            .collect();

        Ok(IncidEdit {
            incid: header,
            multiplex,
            bap_auto,
            bap_user,
            sources,
        })
    }
}

#[async_trait]
impl IncidSyncServiceTrait for IncidSyncRepository {
    fn load_incid(&self, incid: &str) -> Result<IncidEdit> {
        self.load_incid_impl(incid)
    }

    async fn save_incid(&self, request: SaveRequest) -> Result<SaveOutcome> {
        IncidId::parse(request.edit.incid_id())?;
        let ctx = SaveContext::from_settings(&self.settings, &request.reason, &request.process)?;
        let gis = Arc::clone(&self.gis);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<SaveOutcome> {
                UpdateEngine::new(gis.as_ref(), &ctx).save(conn, request)
            })
            .await
    }

    async fn bulk_update(&self, request: BulkUpdateRequest) -> Result<BulkUpdateOutcome> {
        let ctx = SaveContext::from_settings(&self.settings, &request.reason, &request.process)?;
        let gis = Arc::clone(&self.gis);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<BulkUpdateOutcome> {
                BulkUpdateEngine::new(gis.as_ref(), &ctx).run(conn, request)
            })
            .await
    }

    async fn split_features(&self, request: SplitRequest) -> Result<SplitOutcome> {
        request.classify()?;
        let ctx = SaveContext::from_settings(&self.settings, &request.reason, &request.process)?;
        let gis = Arc::clone(&self.gis);
        let commit = self
            .writer
            .exec(move |conn: &mut SqliteConnection| {
                SplitEngine::new(gis.as_ref(), &ctx).split(conn, &request)
            })
            .await?;

        let mut conn = get_connection(&self.pool)?;
        let incids = commit
            .incids
            .iter()
            .map(|incid| count_incid_features(&mut conn, incid))
            .collect::<Result<Vec<_>>>()?;
        let selection = self.gis.count_map_selection()?;
        info!(
            "Split committed; map selection now {} feature(s) in {} incid(s)",
            selection.features, selection.incids
        );
        Ok(SplitOutcome {
            kind: commit.kind,
            incids,
            new_fragment_ids: commit.new_fragment_ids,
            history_rows: commit.history_rows,
            selection,
        })
    }
}
