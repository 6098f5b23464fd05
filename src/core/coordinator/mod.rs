pub mod callback_ledger;
pub mod scoped_stack;

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::core::dao::{TableDao, TableDescriptor, TableRecord};
use crate::core::domain::commit_hook::{CommitHook, CommitHookError};
use crate::core::domain::context::{self, ContextKey};
use crate::core::domain::engine::{SessionConfig, TransactionalEngine};
use crate::core::domain::transaction::{QueryFacade, ToSql, TransactionError, TransactionHandle};

pub use callback_ledger::CallbackLedger;
pub use scoped_stack::ScopedStack;

/// Coordinates nested transactions across the asynchronous call chains of
/// one process.
///
/// Any function may call [`wrap`](Self::wrap) without knowing whether a
/// transaction is already open for its flow: the first call opens a real
/// transaction, deeper calls become savepoints. Hooks registered through
/// [`on_commit`](Self::on_commit) run only after the outermost commit, never
/// on a savepoint release and never after a rollback.
///
/// One coordinator instance serves the whole process; its state is keyed by
/// [`ContextKey`] so concurrent flows never observe each other's handles.
pub struct TransactionCoordinator {
    engine: Arc<dyn TransactionalEngine>,
    stack: ScopedStack,
    ledger: CallbackLedger,
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("No transaction context is installed for this task")]
    ContextMissing,

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Operation(#[from] anyhow::Error),

    /// The transaction committed; only a post-commit hook failed.
    #[error("Transaction committed but a commit hook failed: {0}")]
    CommitHook(#[source] CommitHookError),
}

/// Advisory snapshot of coordinator state, for leak and backlog diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    pub open_contexts: usize,
    pub pending_callback_contexts: usize,
}

impl TransactionCoordinator {
    pub fn new(engine: Arc<dyn TransactionalEngine>) -> Self {
        Self {
            engine,
            stack: ScopedStack::new(),
            ledger: CallbackLedger::new(),
        }
    }

    /// Runs `work` transactionally, bound to the current handle of the
    /// ambient flow: the outermost call opens a transaction, nested calls
    /// open savepoints. This is the entry point ordinary call sites use.
    pub async fn wrap<T, F, Fut>(&self, work: F) -> Result<T, CoordinatorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, anyhow::Error>>,
    {
        self.wrap_with(None, work).await
    }

    /// [`wrap`](Self::wrap) with per-call connection configuration.
    pub async fn wrap_with<T, F, Fut>(
        &self,
        config: Option<SessionConfig>,
        work: F,
    ) -> Result<T, CoordinatorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, anyhow::Error>>,
    {
        let key = context::current().ok_or(CoordinatorError::ContextMissing)?;
        let parent = self
            .stack
            .current(&key)
            .unwrap_or_else(|| self.engine.root());
        self.run_level(key, parent, config, work).await
    }

    /// Runs `work` in an independent top-level transaction, always beginning
    /// from the root handle even when the ambient flow already holds an open
    /// transaction. The body runs under a fresh context key, so its commit
    /// is an outermost commit in its own right: hooks registered inside fire
    /// when it commits and survive a later rollback of the enclosing
    /// transaction.
    pub async fn execute<T, F, Fut>(&self, work: F) -> Result<T, CoordinatorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, anyhow::Error>>,
    {
        self.execute_with(None, work).await
    }

    /// [`execute`](Self::execute) with per-call connection configuration.
    pub async fn execute_with<T, F, Fut>(
        &self,
        config: Option<SessionConfig>,
        work: F,
    ) -> Result<T, CoordinatorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, anyhow::Error>>,
    {
        let key = ContextKey::unique();
        let root = self.engine.root();
        context::scope(key.clone(), self.run_level(key, root, config, work)).await
    }

    /// The innermost open handle of the ambient flow, or the root handle
    /// when no transaction is open.
    pub fn current_handle(&self) -> Result<Arc<dyn TransactionHandle>, CoordinatorError> {
        let key = context::current().ok_or(CoordinatorError::ContextMissing)?;
        Ok(self.current_handle_for(&key))
    }

    /// Same as [`current_handle`](Self::current_handle) for an explicit key,
    /// for callers outside the task abstraction.
    pub fn current_handle_for(&self, key: &ContextKey) -> Arc<dyn TransactionHandle> {
        self.stack
            .current(key)
            .unwrap_or_else(|| self.engine.root())
    }

    /// Query-execution facade bound to the current handle.
    pub fn facade(&self) -> Result<QueryFacade, CoordinatorError> {
        Ok(QueryFacade::new(self.current_handle()?))
    }

    /// Registers a hook to run after the outermost transaction of the
    /// ambient flow commits. With no transaction open the hook runs
    /// immediately: under auto-commit there is no later commit to defer to.
    pub async fn on_commit(&self, hook: Box<dyn CommitHook>) -> Result<(), CoordinatorError> {
        let key = context::current().ok_or(CoordinatorError::ContextMissing)?;
        let depth = self.stack.depth(&key);
        if depth == 0 {
            return hook.run().await.map_err(CoordinatorError::CommitHook);
        }
        self.ledger.register(&key, depth, hook);
        Ok(())
    }

    /// Binds a record mapper for `table` to the current handle. The mapper
    /// is a plain convenience over the facade; it opens no transaction of
    /// its own.
    pub fn dao_for<P, K>(
        &self,
        table: TableDescriptor,
        id_fn: fn(&P) -> K,
    ) -> Result<TableDao<P, K>, CoordinatorError>
    where
        P: TableRecord,
        K: ToSql + 'static,
    {
        Ok(TableDao::new(table, self.facade()?, id_fn))
    }

    pub fn statistics(&self) -> Statistics {
        Statistics {
            open_contexts: self.stack.open_contexts(),
            pending_callback_contexts: self.ledger.pending_contexts(),
        }
    }

    async fn run_level<T, F, Fut>(
        &self,
        key: ContextKey,
        parent: Arc<dyn TransactionHandle>,
        config: Option<SessionConfig>,
        work: F,
    ) -> Result<T, CoordinatorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, anyhow::Error>>,
    {
        let handle = self.engine.begin(&parent, config.as_ref()).await?;
        self.ledger.deposit_level(&key);
        self.stack.push(&key, handle.clone());

        // Armed until the engine has resolved the scope, so cancellation at
        // any suspension point inside `work` (or during commit/rollback)
        // still unwinds the stack and discards this level's hooks. The
        // physical rollback of an abandoned handle is the engine's drop
        // behavior.
        let mut guard = LevelGuard {
            stack: &self.stack,
            ledger: &self.ledger,
            key: key.clone(),
            armed: true,
        };

        let outcome = work().await;

        match outcome {
            Ok(value) => match self.engine.commit(&handle).await {
                Ok(()) => {
                    guard.armed = false;
                    self.stack.pop(&key);
                    let due = self.ledger.resolve_on_exit(&key, true);
                    self.fire_hooks(due).await?;
                    Ok(value)
                }
                Err(commit_err) => {
                    guard.armed = false;
                    self.stack.pop(&key);
                    drop(self.ledger.resolve_on_exit(&key, false));
                    if let Err(rollback_err) = self.engine.rollback(&handle).await {
                        tracing::error!(
                            context = %key,
                            error = %rollback_err,
                            "rollback after a failed commit also failed"
                        );
                    }
                    Err(CoordinatorError::Transaction(commit_err))
                }
            },
            Err(work_err) => {
                guard.armed = false;
                self.stack.pop(&key);
                drop(self.ledger.resolve_on_exit(&key, false));
                if let Err(rollback_err) = self.engine.rollback(&handle).await {
                    tracing::error!(
                        context = %key,
                        error = %rollback_err,
                        "rollback failed; propagating the original work error"
                    );
                }
                Err(CoordinatorError::Operation(work_err))
            }
        }
    }

    /// Runs released hooks in FIFO order. Every hook runs even when an
    /// earlier one fails; the first failure is returned, later ones are
    /// logged. By this point the commit has already happened, so a failure
    /// here is a notification failure, not a transaction failure.
    async fn fire_hooks(&self, hooks: Vec<Box<dyn CommitHook>>) -> Result<(), CoordinatorError> {
        let mut first_failure: Option<CommitHookError> = None;
        for hook in hooks {
            let label = hook.label().to_string();
            if let Err(err) = hook.run().await {
                if first_failure.is_none() {
                    first_failure = Some(err);
                } else {
                    tracing::error!(
                        hook = %label,
                        error = %err,
                        "commit hook failed after the transaction committed"
                    );
                }
            }
        }
        match first_failure {
            None => Ok(()),
            Some(err) => Err(CoordinatorError::CommitHook(err)),
        }
    }
}

struct LevelGuard<'a> {
    stack: &'a ScopedStack,
    ledger: &'a CallbackLedger,
    key: ContextKey,
    armed: bool,
}

impl Drop for LevelGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.stack.pop(&self.key);
            drop(self.ledger.resolve_on_exit(&self.key, false));
        }
    }
}
