//! Positional reconciliation of fixed-slot child tables (multiplex codes and
//! sources) against their persisted rows.

mod child_rows;
mod reconciler;

pub use child_rows::{renumber_sources, ChildRow, MultiplexRow, SourceRow};
pub use reconciler::{
    apply_plan, reconcile_child_rows, AppliedCounts, ChildRowExecutor, ReconcilePlan,
};
