//! Single writer: every mutating job runs on one dedicated connection inside
//! one immediate transaction, one job at a time.

use diesel::sqlite::SqliteConnection;
use log::{error, warn};
use std::thread;
use tokio::sync::{mpsc, oneshot};

use incid_sync_core::errors::{Error, Result};

use super::DbPool;
use crate::errors::StorageError;

type Job = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

/// Cloneable handle to the writer thread.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl WriteHandle {
    /// Runs `job` inside one immediate transaction. Returning an error rolls
    /// every statement of the job back.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let wrapped: Job = Box::new(move |conn: &mut SqliteConnection| {
            let result = conn
                .immediate_transaction::<T, StorageError, _>(|conn| {
                    job(conn).map_err(StorageError::Core)
                })
                .map_err(Error::from);
            if let Err(err) = &result {
                warn!("Write transaction rolled back: {}", err);
            }
            let _ = reply_tx.send(result);
        });

        self.tx
            .send(wrapped)
            .map_err(|_| Error::internal("Writer thread is not running"))?;
        reply_rx
            .await
            .map_err(|_| Error::internal("Writer thread dropped the job"))?
    }
}

/// Starts the writer thread on a connection checked out from `pool`.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    thread::spawn(move || {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                error!("Writer could not obtain a connection: {}", e);
                return;
            }
        };
        while let Some(job) = rx.blocking_recv() {
            job(&mut *conn);
        }
    });
    WriteHandle { tx }
}
