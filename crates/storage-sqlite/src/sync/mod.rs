//! Save, bulk update and split engines plus the repository that runs them on
//! the writer connection.

mod bulk_update_engine;
mod repository;
mod split_engine;
mod update_engine;

pub use bulk_update_engine::BulkUpdateEngine;
pub use repository::IncidSyncRepository;
pub use split_engine::{SplitCommit, SplitEngine};
pub use update_engine::UpdateEngine;
