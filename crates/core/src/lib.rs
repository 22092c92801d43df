//! Reconciliation core for incid records mirrored across the relational
//! store, its GIS shadow table and the GIS layer.

pub mod bap;
pub mod conditions;
pub mod constants;
pub mod errors;
pub mod gis;
pub mod history;
pub mod ids;
pub mod incid;
pub mod reconcile;
pub mod settings;
pub mod sync;

pub use errors::{Error, Result};
pub use settings::SyncSettings;
