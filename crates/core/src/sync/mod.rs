//! Save, bulk update and split: request/outcome models, the service trait the
//! storage engines implement, and the edit session driving single saves.

mod edit_session;
mod sync_model;
mod sync_service;

pub use edit_session::*;
pub use sync_model::*;
pub use sync_service::*;
