use super::DbPool;
use crate::errors::StorageError;
use diesel::SqliteConnection;
use log::error;
use pricewatch_core::errors::{DatabaseError, Result};
use std::any::Any;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

// Type alias for the job to be executed by the writer actor.
type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;

type ErasedJob = Job<Box<dyn Any + Send + 'static>>;
type Reply = oneshot::Sender<Result<Box<dyn Any + Send + 'static>>>;

/// Handle for sending jobs to the writer actor.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<(ErasedJob, Reply)>,
}

impl WriteHandle {
    /// Executes a database job on the writer actor's dedicated connection,
    /// inside an immediate transaction.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static + Any,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.tx
            .send((
                Box::new(move |c| job(c).map(|v| Box::new(v) as Box<dyn Any + Send>)),
                ret_tx,
            ))
            .await
            .map_err(|_| DatabaseError::Internal("writer actor has stopped".to_string()))?;

        let boxed = ret_rx.await.map_err(|_| {
            DatabaseError::Internal("writer actor dropped the reply without a result".to_string())
        })??;

        boxed
            .downcast::<T>()
            .map(|v| *v)
            .map_err(|_| DatabaseError::Internal("unexpected writer actor result type".into()).into())
    }
}

/// Spawns a background task that acts as the single writer to the database.
/// The actor owns one pooled connection and processes jobs serially.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    spawn_writer_tracked(pool).0
}

/// Like [`spawn_writer`], also returning the actor's task. The task ends
/// once every `WriteHandle` clone is dropped, releasing its connection.
pub fn spawn_writer_tracked(pool: DbPool) -> (WriteHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<(ErasedJob, Reply)>(1024);

    let task = tokio::spawn(async move {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                error!("Writer actor could not acquire a connection: {}", e);
                while let Some((_, reply_tx)) = rx.recv().await {
                    let _ = reply_tx.send(Err(
                        DatabaseError::ConnectionFailed(e.to_string()).into()
                    ));
                }
                return;
            }
        };
        drop(pool);

        while let Some((job, reply_tx)) = rx.recv().await {
            let result: Result<Box<dyn Any + Send + 'static>> = conn
                .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
                .map_err(|e: StorageError| e.into());

            // The requester may have gone away.
            let _ = reply_tx.send(result);
        }
    });

    (WriteHandle { tx }, task)
}
