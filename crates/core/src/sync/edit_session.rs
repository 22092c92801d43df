use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::sync_model::SaveOutcome;
use super::sync_service::IncidSyncServiceTrait;
use crate::bap::BapRecord;
use crate::errors::{Result, ValidationError};
use crate::incid::{DirtyTables, Incid, IncidEdit, MultiplexCategory, SaveRequest};
use crate::reconcile::SourceRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditState {
    Editing,
    Saving,
    Committed,
    RolledBack,
}

impl fmt::Display for EditState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EditState::Editing => "editing",
            EditState::Saving => "saving",
            EditState::Committed => "committed",
            EditState::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

/// Change tracking for the incid currently being edited.
///
/// Edits go to the working copy and mark the tables they touch. The working
/// copy becomes the accepted state only after the engine reports a commit;
/// after a rollback the edits and their dirty flags are kept so the save can
/// be retried.
#[derive(Debug, Clone)]
pub struct IncidEditSession {
    accepted: IncidEdit,
    working: IncidEdit,
    dirty: DirtyTables,
    state: EditState,
}

impl IncidEditSession {
    pub fn new(loaded: IncidEdit) -> Self {
        Self {
            accepted: loaded.clone(),
            working: loaded,
            dirty: DirtyTables::default(),
            state: EditState::Editing,
        }
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn working(&self) -> &IncidEdit {
        &self.working
    }

    pub fn accepted(&self) -> &IncidEdit {
        &self.accepted
    }

    pub fn dirty(&self) -> DirtyTables {
        self.dirty
    }

    fn touch(&mut self) -> Result<()> {
        if self.state == EditState::Saving {
            return Err(ValidationError::InvalidSessionState(self.state.to_string()).into());
        }
        self.state = EditState::Editing;
        Ok(())
    }

    /// Edits header columns other than the habitat.
    pub fn update_header<F: FnOnce(&mut Incid)>(&mut self, edit: F) -> Result<()> {
        self.touch()?;
        let habitat = self.working.incid.ihs_habitat.clone();
        edit(&mut self.working.incid);
        self.working.incid.ihs_habitat = habitat;
        self.dirty.header = true;
        Ok(())
    }

    /// Changing the habitat changes the potential priority habitats too.
    pub fn set_habitat(&mut self, habitat: Option<String>) -> Result<()> {
        self.touch()?;
        self.working.incid.ihs_habitat = habitat;
        self.dirty.header = true;
        self.dirty.bap = true;
        Ok(())
    }

    pub fn set_multiplex(
        &mut self,
        category: MultiplexCategory,
        slot: usize,
        code: Option<String>,
    ) -> Result<()> {
        self.touch()?;
        let slots = self.working.multiplex.slots_mut(category);
        let Some(target) = slots.get_mut(slot) else {
            warn!("Ignoring {} slot {} beyond the last slot", category, slot);
            return Ok(());
        };
        *target = code;
        self.dirty.mark_multiplex(category);
        self.dirty.header = true;
        self.dirty.bap = true;
        Ok(())
    }

    pub fn set_source(&mut self, slot: usize, source: Option<SourceRow>) -> Result<()> {
        self.touch()?;
        let Some(target) = self.working.sources.get_mut(slot) else {
            warn!("Ignoring source slot {} beyond the last slot", slot);
            return Ok(());
        };
        *target = source;
        self.dirty.sources = true;
        Ok(())
    }

    pub fn set_bap_auto(&mut self, records: Vec<BapRecord>) -> Result<()> {
        self.touch()?;
        self.working.bap_auto = records;
        self.dirty.bap = true;
        Ok(())
    }

    pub fn set_bap_user(&mut self, records: Vec<BapRecord>) -> Result<()> {
        self.touch()?;
        self.working.bap_user = records;
        self.dirty.bap = true;
        Ok(())
    }

    /// Moves to `Saving` and hands out the request for the engine.
    pub fn begin_save(&mut self, reason: &str, process: &str) -> Result<SaveRequest> {
        if self.state == EditState::Saving {
            return Err(ValidationError::InvalidSessionState(self.state.to_string()).into());
        }
        self.state = EditState::Saving;
        Ok(SaveRequest {
            edit: self.working.clone(),
            dirty: self.dirty,
            reason: reason.to_string(),
            process: process.to_string(),
        })
    }

    /// Records the engine's verdict. Only a commit accepts the changes.
    pub fn finish_save(&mut self, result: &Result<SaveOutcome>) {
        match result {
            Ok(outcome) => {
                self.working.incid.ihs_version = outcome.ihs_version;
                self.accept_changes();
                self.state = EditState::Committed;
            }
            Err(err) => {
                warn!(
                    "Save of {} rolled back: {}",
                    self.working.incid_id(),
                    err
                );
                self.state = EditState::RolledBack;
            }
        }
    }

    fn accept_changes(&mut self) {
        self.accepted = self.working.clone();
        self.dirty.clear();
    }

    /// Runs one save through `service` and moves the session accordingly.
    pub async fn save(
        &mut self,
        service: &dyn IncidSyncServiceTrait,
        reason: &str,
        process: &str,
    ) -> Result<SaveOutcome> {
        let request = self.begin_save(reason, process)?;
        let result = service.save_incid(request).await;
        self.finish_save(&result);
        if let Ok(outcome) = &result {
            // Header values derived during the save come back from the store.
            let reloaded = service.load_incid(&outcome.incid);
            self.refresh_committed(reloaded);
        }
        result
    }

    /// Replaces the committed state with what the store now holds. A failed
    /// reload keeps the locally accepted copy, which lacks derived values.
    pub fn refresh_committed(&mut self, reloaded: Result<IncidEdit>) {
        match reloaded {
            Ok(reloaded) => {
                self.accepted = reloaded.clone();
                self.working = reloaded;
            }
            Err(err) => warn!(
                "Reload of {} after commit failed, derived values may be stale: {}",
                self.accepted.incid_id(),
                err
            ),
        }
    }

    /// Discards unsaved edits.
    pub fn revert(&mut self) {
        self.working = self.accepted.clone();
        self.dirty.clear();
        self.state = EditState::Editing;
    }
}
