use async_trait::async_trait;
use thiserror::Error;

/// A deferred unit of work that runs once the outermost transaction of its
/// flow has durably committed.
///
/// Hooks are queued as explicit command objects so their ownership is clear
/// while they wait across suspension points. A hook registered inside a
/// savepoint that rolls back is discarded and never runs.
#[async_trait]
pub trait CommitHook: Send + Sync {
    async fn run(self: Box<Self>) -> Result<(), CommitHookError>;

    /// Short name used when a hook failure is logged.
    fn label(&self) -> &str {
        "commit-hook"
    }
}

#[derive(Debug, Error)]
pub enum CommitHookError {
    #[error("Commit hook failed: {hook} - {details}")]
    Failed { hook: String, details: String },
}

impl CommitHookError {
    pub fn failed(hook: impl Into<String>, details: impl Into<String>) -> Self {
        CommitHookError::Failed {
            hook: hook.into(),
            details: details.into(),
        }
    }
}
