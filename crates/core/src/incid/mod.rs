//! The incid aggregate: identifiers, header, multiplex slots and the working
//! copy submitted for saving.

mod incid_edit;
mod incid_model;

pub use incid_edit::*;
pub use incid_model::*;
