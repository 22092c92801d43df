//! SQLite storage for incid records: schema, connection pool, single-writer
//! actor and the sync engines built on top of them.

pub mod db;
pub mod errors;
pub mod executors;
pub mod history;
pub mod ids;
pub mod incid;
pub mod lookups;
pub mod schema;
pub mod sql;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use db::{
    create_pool, create_pool_with_options, get_connection, init, run_migrations,
    write_actor::spawn_writer, ConnectionOptions, DbConnection, DbPool, WriteHandle,
};
pub use errors::StorageError;
pub use sync::IncidSyncRepository;
