use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;

use crate::core::domain::engine::{SessionConfig, TransactionalEngine};
use crate::core::domain::transaction::{ToSql, TransactionError, TransactionHandle};

/// The physical transaction shared by every nesting level of one flow.
/// `None` once the outermost scope has committed or rolled back.
type TxSlot = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

/// Transactional engine backed by sqlx/Postgres.
///
/// Beginning from the root handle takes a pooled connection and opens a real
/// transaction; beginning from a transaction handle issues a `SAVEPOINT` on
/// the same connection. All levels of one flow execute through a shared
/// slot, so a statement always runs on the connection that owns its
/// savepoints. An abandoned outermost handle is rolled back by sqlx when the
/// slot is dropped.
pub struct PgEngine {
    pool: PgPool,
    root: Arc<dyn TransactionHandle>,
}

impl PgEngine {
    pub fn new(pool: PgPool) -> Self {
        let root = Arc::new(PgRootHandle { pool: pool.clone() });
        Self { pool, root }
    }
}

#[async_trait]
impl TransactionalEngine for PgEngine {
    fn root(&self) -> Arc<dyn TransactionHandle> {
        self.root.clone()
    }

    async fn begin(
        &self,
        parent: &Arc<dyn TransactionHandle>,
        config: Option<&SessionConfig>,
    ) -> Result<Arc<dyn TransactionHandle>, TransactionError> {
        if parent.as_any().is::<PgRootHandle>() {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| TransactionError::ConnectionError(e.to_string()))?;
            if let Some(config) = config {
                apply_session_config(&mut tx, config).await?;
            }
            tracing::debug!(depth = 1, "began transaction");
            Ok(Arc::new(PgTxHandle {
                slot: Arc::new(Mutex::new(Some(tx))),
                depth: 1,
                savepoint: None,
            }))
        } else if let Some(parent) = parent.as_any().downcast_ref::<PgTxHandle>() {
            let depth = parent.depth + 1;
            let name = format!("sp_{}", depth);
            {
                let mut slot = parent.slot.lock().await;
                let tx = slot.as_mut().ok_or(TransactionError::AlreadyCompleted)?;
                sqlx::query(&format!("SAVEPOINT {}", name))
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| TransactionError::BeginError(e.to_string()))?;
                if let Some(config) = config {
                    apply_session_config(tx, config).await?;
                }
            }
            tracing::debug!(depth, savepoint = %name, "began savepoint");
            Ok(Arc::new(PgTxHandle {
                slot: parent.slot.clone(),
                depth,
                savepoint: Some(name),
            }))
        } else {
            Err(TransactionError::ForeignHandle)
        }
    }

    async fn commit(&self, handle: &Arc<dyn TransactionHandle>) -> Result<(), TransactionError> {
        let handle = handle
            .as_any()
            .downcast_ref::<PgTxHandle>()
            .ok_or(TransactionError::ForeignHandle)?;
        match &handle.savepoint {
            None => {
                let tx = handle
                    .slot
                    .lock()
                    .await
                    .take()
                    .ok_or(TransactionError::AlreadyCompleted)?;
                tracing::debug!("committing transaction");
                tx.commit()
                    .await
                    .map_err(|e| TransactionError::CommitError(e.to_string()))
            }
            Some(name) => {
                let mut slot = handle.slot.lock().await;
                let tx = slot.as_mut().ok_or(TransactionError::AlreadyCompleted)?;
                sqlx::query(&format!("RELEASE SAVEPOINT {}", name))
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| TransactionError::CommitError(e.to_string()))?;
                Ok(())
            }
        }
    }

    async fn rollback(&self, handle: &Arc<dyn TransactionHandle>) -> Result<(), TransactionError> {
        let handle = handle
            .as_any()
            .downcast_ref::<PgTxHandle>()
            .ok_or(TransactionError::ForeignHandle)?;
        match &handle.savepoint {
            None => {
                // A spent slot means the scope was already resolved; rolling
                // back twice is harmless.
                match handle.slot.lock().await.take() {
                    Some(tx) => {
                        tracing::debug!("rolling back transaction");
                        tx.rollback()
                            .await
                            .map_err(|e| TransactionError::RollbackError(e.to_string()))
                    }
                    None => Ok(()),
                }
            }
            Some(name) => {
                let mut slot = handle.slot.lock().await;
                let tx = match slot.as_mut() {
                    Some(tx) => tx,
                    None => return Ok(()),
                };
                sqlx::query(&format!("ROLLBACK TO SAVEPOINT {}", name))
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| TransactionError::RollbackError(e.to_string()))?;
                sqlx::query(&format!("RELEASE SAVEPOINT {}", name))
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| TransactionError::RollbackError(e.to_string()))?;
                Ok(())
            }
        }
    }
}

/// Executes in auto-commit mode, directly against the pool.
struct PgRootHandle {
    pool: PgPool,
}

#[async_trait]
impl TransactionHandle for PgRootHandle {
    async fn execute(
        &self,
        query: &str,
        params: Vec<Box<dyn ToSql>>,
    ) -> Result<u64, TransactionError> {
        let result = bind_params(sqlx::query(query), params)?
            .execute(&self.pool)
            .await
            .map_err(|e| {
                TransactionError::ExecutionError(format!(
                    "Failed to execute query: {:?}, error: {:?}",
                    query, e
                ))
            })?;
        Ok(result.rows_affected())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct PgTxHandle {
    slot: TxSlot,
    depth: u32,
    /// `None` for the outermost transaction, the savepoint name below it.
    savepoint: Option<String>,
}

#[async_trait]
impl TransactionHandle for PgTxHandle {
    async fn execute(
        &self,
        query: &str,
        params: Vec<Box<dyn ToSql>>,
    ) -> Result<u64, TransactionError> {
        let mut slot = self.slot.lock().await;
        let tx = slot.as_mut().ok_or(TransactionError::AlreadyCompleted)?;
        let result = bind_params(sqlx::query(query), params)?
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                TransactionError::ExecutionError(format!(
                    "Failed to execute query: {:?}, error: {:?}",
                    query, e
                ))
            })?;
        Ok(result.rows_affected())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

async fn apply_session_config(
    tx: &mut Transaction<'static, Postgres>,
    config: &SessionConfig,
) -> Result<(), TransactionError> {
    for statement in config.statements() {
        sqlx::query(&statement)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                TransactionError::BeginError(format!(
                    "Failed to apply session config {:?}: {:?}",
                    statement, e
                ))
            })?;
    }
    Ok(())
}

fn bind_params(
    mut query: Query<'_, Postgres, PgArguments>,
    params: Vec<Box<dyn ToSql>>,
) -> Result<Query<'_, Postgres, PgArguments>, TransactionError> {
    for param in params {
        if let Some(value) = param.as_i32() {
            query = query.bind(value);
        } else if let Some(value) = param.as_i64() {
            query = query.bind(value);
        } else if let Some(value) = param.as_bool() {
            query = query.bind(value);
        } else if let Some(value) = param.as_string() {
            query = query.bind(value);
        } else {
            return Err(TransactionError::BindError(format!(
                "Unsupported parameter type: {:?}",
                param
            )));
        }
    }
    Ok(query)
}
