/// Binds the diesel table and columns of one multiplex category to local
/// names and evaluates `$body` with them. Every arm must yield the same type.
macro_rules! with_multiplex_table {
    ($category:expr, |$table:ident, $id:ident, $incid:ident, $code:ident| $body:block) => {
        match $category {
            incid_sync_core::incid::MultiplexCategory::Matrix => {
                #[allow(unused_imports)]
                use $crate::schema::incid_ihs_matrix::dsl::{
                    incid as $incid, incid_ihs_matrix as $table, matrix as $code, matrix_id as $id,
                };
                $body
            }
            incid_sync_core::incid::MultiplexCategory::Formation => {
                #[allow(unused_imports)]
                use $crate::schema::incid_ihs_formation::dsl::{
                    formation as $code, formation_id as $id, incid as $incid,
                    incid_ihs_formation as $table,
                };
                $body
            }
            incid_sync_core::incid::MultiplexCategory::Management => {
                #[allow(unused_imports)]
                use $crate::schema::incid_ihs_management::dsl::{
                    incid as $incid, incid_ihs_management as $table, management as $code,
                    management_id as $id,
                };
                $body
            }
            incid_sync_core::incid::MultiplexCategory::Complex => {
                #[allow(unused_imports)]
                use $crate::schema::incid_ihs_complex::dsl::{
                    complex as $code, complex_id as $id, incid as $incid,
                    incid_ihs_complex as $table,
                };
                $body
            }
        }
    };
}

pub(crate) use with_multiplex_table;

mod model;
mod repository;

pub use model::*;
pub use repository::*;
