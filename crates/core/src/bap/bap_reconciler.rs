use log::debug;
use std::collections::{BTreeSet, HashMap, HashSet};

use super::bap_model::BapRecord;
use crate::errors::{Result, ValidationError};
use crate::reconcile::{ChildRow, ReconcilePlan};

/// Union of auto-derived and user-added records keyed by code. Auto records
/// win a code collision; within each list the first occurrence wins.
pub fn merge_desired_bap(incid: &str, auto: &[BapRecord], user: &[BapRecord]) -> Vec<BapRecord> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut desired = Vec::with_capacity(auto.len() + user.len());
    for record in auto.iter().chain(user.iter()) {
        let code = record.bap_habitat.trim();
        if code.is_empty() || !seen.insert(code) {
            continue;
        }
        let mut record = record.clone();
        record.bap_habitat = code.to_string();
        record.set_incid(incid);
        desired.push(record);
    }
    desired
}

/// Reconciles BAP rows by code.
///
/// Matched rows always take the desired metadata and are updated; unmatched
/// desired records are inserted. Persisted rows with no desired counterpart
/// are reclassified as additional when outside the potential set, or left
/// alone when still potential. With `delete_unmatched` both kinds are
/// deleted instead. Duplicate codes among the persisted rows are rejected
/// before any action is planned.
pub fn reconcile_bap(
    incid: &str,
    auto: &[BapRecord],
    user: &[BapRecord],
    persisted: &[BapRecord],
    potential: &BTreeSet<String>,
    delete_unmatched: bool,
) -> Result<ReconcilePlan<BapRecord>> {
    let mut by_code: HashMap<&str, &BapRecord> = HashMap::with_capacity(persisted.len());
    for row in persisted {
        if by_code.insert(row.bap_habitat.as_str(), row).is_some() {
            return Err(ValidationError::DuplicateBapCode {
                incid: incid.to_string(),
                code: row.bap_habitat.clone(),
            }
            .into());
        }
    }

    let desired = merge_desired_bap(incid, auto, user);
    let desired_codes: HashSet<&str> = desired.iter().map(|r| r.bap_habitat.as_str()).collect();

    let mut plan = ReconcilePlan::default();
    for record in &desired {
        match by_code.get(record.bap_habitat.as_str()) {
            Some(existing) => {
                let mut row = (*existing).clone();
                row.merge_from(record);
                plan.updates.push(row);
            }
            None => {
                debug!("Inserting priority habitat {} for {}", record.bap_habitat, incid);
                plan.inserts.push(record.clone());
            }
        }
    }

    for row in persisted {
        if desired_codes.contains(row.bap_habitat.as_str()) {
            continue;
        }
        if delete_unmatched {
            plan.deletes.push(row.clone());
        } else if !potential.contains(&row.bap_habitat) {
            let mut row = row.clone();
            if row.mark_additional() {
                debug!("Priority habitat {} of {} is now additional", row.bap_habitat, incid);
                plan.updates.push(row);
            }
        }
    }

    plan.final_count = persisted.len() - plan.deletes.len() + plan.inserts.len();
    Ok(plan)
}
