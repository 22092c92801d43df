//! Filter-condition AST, parameterised WHERE rendering and chunking of long
//! identifier lists into bounded `IN` predicates.

mod chunk;
mod filter;
mod value;

pub use chunk::{chunk_feature_conditions, chunk_in_conditions, chunk_incid_conditions};
pub use filter::{
    evaluate_conditions, quote_identifier, render_where_clause, BooleanOperator,
    ConditionOperator, ConditionValue, FilterCondition, RenderedSql,
};
pub use value::SqlValue;
