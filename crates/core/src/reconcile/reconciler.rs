use log::debug;
use serde::{Deserialize, Serialize};

use super::child_rows::ChildRow;
use crate::conditions::SqlValue;
use crate::errors::Result;
use crate::ids::IdTable;

/// Row-level actions that converge the persisted rows of one incid onto the
/// desired slots.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan<R> {
    pub updates: Vec<R>,
    pub inserts: Vec<R>,
    pub deletes: Vec<R>,
    /// Row count once the plan is applied.
    pub final_count: usize,
}

impl<R> Default for ReconcilePlan<R> {
    fn default() -> Self {
        Self {
            updates: Vec::new(),
            inserts: Vec::new(),
            deletes: Vec::new(),
            final_count: 0,
        }
    }
}

impl<R> ReconcilePlan<R> {
    pub fn statement_count(&self) -> usize {
        self.updates.len() + self.inserts.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statement_count() == 0
    }
}

/// Statement sink for one child table. Implementations decide how each
/// action reaches the store.
pub trait ChildRowExecutor<R: ChildRow> {
    fn update(&mut self, row: &R) -> Result<()>;
    fn insert(&mut self, row: &R) -> Result<()>;
    fn delete(&mut self, row: &R) -> Result<()>;
}

/// Statement counts after a plan has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCounts {
    pub updated: usize,
    pub inserted: usize,
    pub deleted: usize,
}

impl AppliedCounts {
    pub fn total(&self) -> usize {
        self.updated + self.inserted + self.deleted
    }

    pub fn add(&mut self, other: AppliedCounts) {
        self.updated += other.updated;
        self.inserted += other.inserted;
        self.deleted += other.deleted;
    }
}

/// Computes the actions that converge `persisted` onto `desired`.
///
/// `desired` is indexed by slot; `persisted` is in display order. Pairing is
/// positional: the `i`th filled desired slot lands on the `i`th persisted
/// row. Empty slots and repeated values are dropped first; a would-be insert
/// whose values already sit in a surviving persisted row is dropped as well.
pub fn reconcile_child_rows<R: ChildRow>(
    incid: &str,
    desired: &[Option<R>],
    persisted: &[R],
    delete_extra_rows: bool,
) -> ReconcilePlan<R> {
    let mut dense: Vec<R> = Vec::with_capacity(desired.len());
    for row in desired.iter().flatten() {
        if !row.has_data() {
            continue;
        }
        let values = row.values();
        if dense.iter().any(|kept| kept.values() == values) {
            debug!("Dropping repeated {:?} slot for {}", row.id_table(), incid);
            continue;
        }
        let mut row = row.clone();
        row.set_incid(incid);
        dense.push(row);
    }

    let mut plan = ReconcilePlan::default();
    let paired = dense.len().min(persisted.len());
    let keep_count = if delete_extra_rows {
        dense.len().min(persisted.len())
    } else {
        persisted.len()
    };

    let mut resident: Vec<Vec<SqlValue>> = Vec::with_capacity(keep_count);
    for (index, current) in persisted.iter().enumerate().take(keep_count) {
        if index < paired {
            let mut row = current.clone();
            if row.merge_from(&dense[index]) {
                plan.updates.push(row.clone());
            }
            resident.push(row.values());
        } else {
            resident.push(current.values());
        }
    }

    for row in dense.iter().skip(paired) {
        let values = row.values();
        if resident.contains(&values) {
            debug!(
                "Skipping insert of {:?} row for {}: values already resident",
                row.id_table(),
                incid
            );
            continue;
        }
        resident.push(values);
        plan.inserts.push(row.clone());
    }

    if delete_extra_rows && persisted.len() > dense.len() {
        plan.deletes
            .extend(persisted.iter().skip(dense.len()).cloned());
    }

    plan.final_count = keep_count + plan.inserts.len();
    plan
}

/// Applies a plan through `executor`, allocating surrogate keys for inserts
/// from `next_id`. The first failing statement aborts the remainder.
pub fn apply_plan<R, E, N>(
    plan: ReconcilePlan<R>,
    executor: &mut E,
    mut next_id: N,
) -> Result<AppliedCounts>
where
    R: ChildRow,
    E: ChildRowExecutor<R> + ?Sized,
    N: FnMut(IdTable) -> Result<i32>,
{
    let mut counts = AppliedCounts::default();
    for row in &plan.updates {
        executor.update(row)?;
        counts.updated += 1;
    }
    for mut row in plan.inserts {
        let id = next_id(row.id_table())?;
        row.set_row_id(id);
        executor.insert(&row)?;
        counts.inserted += 1;
    }
    for row in &plan.deletes {
        executor.delete(row)?;
        counts.deleted += 1;
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::incid::MultiplexCategory;
    use crate::reconcile::{MultiplexRow, SourceRow};
    use std::collections::HashMap;

    const INCID: &str = "HLU:0000001";

    fn matrix(id: i32, code: &str) -> MultiplexRow {
        MultiplexRow {
            category: MultiplexCategory::Matrix,
            id,
            incid: INCID.to_string(),
            code: Some(code.to_string()),
        }
    }

    fn desired(codes: &[Option<&str>]) -> Vec<Option<MultiplexRow>> {
        codes
            .iter()
            .map(|c| c.map(|c| MultiplexRow::new(MultiplexCategory::Matrix, INCID, Some(c.to_string()))))
            .collect()
    }

    /// In-memory table keyed by surrogate id, kept in id order.
    #[derive(Default)]
    struct MemoryTable {
        rows: Vec<MultiplexRow>,
        statements: usize,
        fail_on_insert: bool,
    }

    impl ChildRowExecutor<MultiplexRow> for MemoryTable {
        fn update(&mut self, row: &MultiplexRow) -> Result<()> {
            self.statements += 1;
            let target = self
                .rows
                .iter_mut()
                .find(|r| r.id == row.id)
                .ok_or_else(|| Error::statement("incid_ihs_matrix", "update", "row missing"))?;
            *target = row.clone();
            Ok(())
        }

        fn insert(&mut self, row: &MultiplexRow) -> Result<()> {
            self.statements += 1;
            if self.fail_on_insert {
                return Err(Error::statement("incid_ihs_matrix", "insert", "failed"));
            }
            self.rows.push(row.clone());
            Ok(())
        }

        fn delete(&mut self, row: &MultiplexRow) -> Result<()> {
            self.statements += 1;
            self.rows.retain(|r| r.id != row.id);
            Ok(())
        }
    }

    fn allocator(start: i32) -> impl FnMut(IdTable) -> Result<i32> {
        let mut next: HashMap<IdTable, i32> = HashMap::new();
        move |table| {
            let id = next.entry(table).or_insert(start);
            let value = *id;
            *id += 1;
            Ok(value)
        }
    }

    fn codes(rows: &[MultiplexRow]) -> Vec<String> {
        rows.iter().filter_map(|r| r.code.clone()).collect()
    }

    #[test]
    fn updates_positionally_and_inserts_overflow() {
        let persisted = vec![matrix(7, "M0")];
        let plan = reconcile_child_rows(
            INCID,
            &desired(&[Some("M1"), Some("M2"), None]),
            &persisted,
            false,
        );
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].id, 7);
        assert_eq!(plan.updates[0].code.as_deref(), Some("M1"));
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].code.as_deref(), Some("M2"));
        assert!(plan.deletes.is_empty());
        assert_eq!(plan.final_count, 2);

        let mut table = MemoryTable {
            rows: persisted,
            ..Default::default()
        };
        let counts = apply_plan(plan, &mut table, allocator(100)).unwrap();
        assert_eq!(counts.total(), 2);
        assert_eq!(codes(&table.rows), vec!["M1", "M2"]);
        assert_eq!(table.rows[1].id, 100);
    }

    #[test]
    fn persisted_count_never_decreases_without_delete_policy() {
        let persisted = vec![matrix(1, "M0"), matrix(2, "M1"), matrix(3, "M2")];
        let plan = reconcile_child_rows(INCID, &desired(&[Some("X1"), None, None]), &persisted, false);
        assert!(plan.deletes.is_empty());
        assert_eq!(plan.final_count, 3);
        assert_eq!(plan.updates[0].code.as_deref(), Some("X1"));
    }

    #[test]
    fn delete_policy_trims_trailing_rows() {
        let persisted = vec![matrix(1, "M0"), matrix(2, "M1"), matrix(3, "M2")];
        let plan = reconcile_child_rows(INCID, &desired(&[Some("M0"), None, None]), &persisted, true);
        assert!(plan.updates.is_empty());
        assert_eq!(
            plan.deletes.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(plan.final_count, 1);

        let mut table = MemoryTable {
            rows: persisted,
            ..Default::default()
        };
        apply_plan(plan, &mut table, allocator(10)).unwrap();
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn second_run_issues_no_statements() {
        let mut table = MemoryTable {
            rows: vec![matrix(1, "M0")],
            ..Default::default()
        };
        let wanted = desired(&[Some("M1"), Some("M1"), Some("M2")]);
        let plan = reconcile_child_rows(INCID, &wanted, &table.rows.clone(), true);
        apply_plan(plan, &mut table, allocator(50)).unwrap();
        assert_eq!(codes(&table.rows), vec!["M1", "M2"]);

        table.statements = 0;
        let again = reconcile_child_rows(INCID, &wanted, &table.rows.clone(), true);
        assert!(again.is_empty());
        apply_plan(again, &mut table, allocator(60)).unwrap();
        assert_eq!(table.statements, 0);
    }

    #[test]
    fn insert_of_value_already_resident_is_suppressed() {
        // Slot 0 moves M1 out of row 0; M0 is still resident in row 1.
        let persisted = vec![matrix(1, "M1"), matrix(2, "M0")];
        let plan = reconcile_child_rows(
            INCID,
            &desired(&[Some("M2"), Some("M0"), Some("M0")]),
            &persisted,
            false,
        );
        assert_eq!(plan.updates.len(), 1);
        assert!(plan.inserts.is_empty());
        assert_eq!(plan.final_count, 2);
    }

    #[test]
    fn blank_desired_rows_are_ignored() {
        let persisted = vec![matrix(1, "M0")];
        let plan = reconcile_child_rows(
            INCID,
            &desired(&[Some("  "), None, None]),
            &persisted,
            false,
        );
        assert!(plan.is_empty());
        assert_eq!(plan.final_count, 1);
    }

    #[test]
    fn failing_statement_aborts_the_rest() {
        let mut table = MemoryTable {
            rows: vec![],
            fail_on_insert: true,
            ..Default::default()
        };
        let plan = reconcile_child_rows(INCID, &desired(&[Some("A"), Some("B")]), &[], false);
        let err = apply_plan(plan, &mut table, allocator(1)).unwrap_err();
        assert!(matches!(err, Error::Statement { .. }));
        assert_eq!(table.statements, 1);
    }

    #[test]
    fn source_merge_keeps_persisted_values_for_null_fields() {
        let persisted = SourceRow {
            incid_source_id: 4,
            incid: INCID.to_string(),
            source_id: Some(1),
            source_habitat_class: Some("Phase 1".to_string()),
            source_boundary_importance: Some("1".to_string()),
            sort_order: Some(1),
            ..Default::default()
        };
        let wanted = SourceRow {
            source_id: Some(2),
            sort_order: Some(1),
            ..Default::default()
        };
        let plan = reconcile_child_rows(INCID, &[Some(wanted), None, None], &[persisted], true);
        assert_eq!(plan.updates.len(), 1);
        let merged = &plan.updates[0];
        assert_eq!(merged.source_id, Some(2));
        assert_eq!(merged.source_habitat_class.as_deref(), Some("Phase 1"));
        assert_eq!(merged.incid_source_id, 4);
    }
}
