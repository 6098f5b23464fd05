//! Context-scoped nested transaction coordination for sqlx.
//!
//! Any function in an asynchronous call chain can ask the
//! [`TransactionCoordinator`] to run work transactionally without knowing
//! whether a transaction is already open for its flow: the outermost
//! [`wrap`](TransactionCoordinator::wrap) opens a real transaction, nested
//! calls become savepoints, and hooks registered with
//! [`on_commit`](TransactionCoordinator::on_commit) run only once the
//! outermost transaction has durably committed. Flows are identified by a
//! [`ContextKey`] installed with [`context::scope`], typically one per
//! request or task.

pub mod adapter;
pub mod core;
pub mod error;

pub use crate::core::coordinator::{CoordinatorError, Statistics, TransactionCoordinator};
pub use crate::core::dao::{TableDao, TableDescriptor, TableRecord};
pub use crate::core::domain::commit_hook::{CommitHook, CommitHookError};
pub use crate::core::domain::context::{self, ContextKey};
pub use crate::core::domain::engine::{SessionConfig, TransactionalEngine};
pub use crate::core::domain::transaction::{
    QueryFacade, ToSql, TransactionError, TransactionHandle,
};
