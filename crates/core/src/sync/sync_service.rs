use async_trait::async_trait;

use super::sync_model::{
    BulkUpdateOutcome, BulkUpdateRequest, SaveOutcome, SplitOutcome, SplitRequest,
};
use crate::errors::Result;
use crate::incid::{IncidEdit, SaveRequest};

/// Entry points of the synchronisation engines. Each mutating call is one
/// unit of work: it either commits every relational change or none.
#[async_trait]
pub trait IncidSyncServiceTrait: Send + Sync {
    /// Loads the working copy of one incid.
    fn load_incid(&self, incid: &str) -> Result<IncidEdit>;

    async fn save_incid(&self, request: SaveRequest) -> Result<SaveOutcome>;

    async fn bulk_update(&self, request: BulkUpdateRequest) -> Result<BulkUpdateOutcome>;

    async fn split_features(&self, request: SplitRequest) -> Result<SplitOutcome>;
}
