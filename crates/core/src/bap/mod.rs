//! Priority habitat (BAP) records and their code-keyed reconciliation.

mod bap_model;
mod bap_reconciler;

pub use bap_model::*;
pub use bap_reconciler::*;
