use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// One transaction or savepoint scope, owned by the underlying engine.
///
/// A handle is immutable once created; a nested transactional call supersedes
/// it with a deeper handle rather than mutating it. The coordinator keeps
/// handles only for the duration of one nesting level.
#[async_trait]
pub trait TransactionHandle: Send + Sync {
    /// Runs a statement against this scope and returns the affected row count.
    async fn execute(
        &self,
        query: &str,
        params: Vec<Box<dyn ToSql>>,
    ) -> Result<u64, TransactionError>;

    fn as_any(&self) -> &dyn Any;
}

/// Query-execution surface bound to one transactional handle.
#[derive(Clone)]
pub struct QueryFacade {
    handle: Arc<dyn TransactionHandle>,
}

impl QueryFacade {
    pub fn new(handle: Arc<dyn TransactionHandle>) -> Self {
        Self { handle }
    }

    pub async fn execute(
        &self,
        query: &str,
        params: Vec<Box<dyn ToSql>>,
    ) -> Result<u64, TransactionError> {
        self.handle.execute(query, params).await
    }

    pub fn handle(&self) -> &Arc<dyn TransactionHandle> {
        &self.handle
    }
}

pub trait ToSql: Send + Sync + std::fmt::Debug {
    fn as_i32(&self) -> Option<i32> {
        None
    }
    fn as_i64(&self) -> Option<i64> {
        None
    }
    fn as_bool(&self) -> Option<bool> {
        None
    }
    fn as_string(&self) -> Option<String> {
        None
    }
}

impl ToSql for i32 {
    fn as_i32(&self) -> Option<i32> {
        Some(*self)
    }
}

impl ToSql for i64 {
    fn as_i64(&self) -> Option<i64> {
        Some(*self)
    }
}

impl ToSql for bool {
    fn as_bool(&self) -> Option<bool> {
        Some(*self)
    }
}

impl ToSql for String {
    fn as_string(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl ToSql for &str {
    fn as_string(&self) -> Option<String> {
        Some((*self).to_string())
    }
}

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Failed to begin transaction: {0}")]
    BeginError(String),
    #[error("Failed to execute query: {0}")]
    ExecutionError(String),
    #[error("Failed to commit transaction: {0}")]
    CommitError(String),
    #[error("Failed to rollback transaction: {0}")]
    RollbackError(String),
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("Parameter binding error: {0}")]
    BindError(String),
    #[error("Transaction already completed")]
    AlreadyCompleted,
    #[error("Handle does not belong to this engine")]
    ForeignHandle,
}
