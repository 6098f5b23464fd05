use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::domain::transaction::{TransactionError, TransactionHandle};

/// The underlying transactional engine.
///
/// Beginning from the root handle opens a real transaction; beginning from a
/// transaction handle opens a savepoint with standard nested semantics: an
/// inner rollback unwinds to its savepoint, an outer rollback unwinds
/// everything, and only the outermost commit is durable.
#[async_trait]
pub trait TransactionalEngine: Send + Sync {
    /// The handle used when no transaction is open (auto-commit semantics).
    fn root(&self) -> Arc<dyn TransactionHandle>;

    async fn begin(
        &self,
        parent: &Arc<dyn TransactionHandle>,
        config: Option<&SessionConfig>,
    ) -> Result<Arc<dyn TransactionHandle>, TransactionError>;

    async fn commit(&self, handle: &Arc<dyn TransactionHandle>) -> Result<(), TransactionError>;

    async fn rollback(&self, handle: &Arc<dyn TransactionHandle>) -> Result<(), TransactionError>;
}

/// Per-call connection configuration for a transactional scope.
///
/// Rendered as session-configuration statements the engine runs right after
/// the scope is opened. The read-only flag is only meaningful at the
/// outermost level; Postgres rejects it once the transaction has executed a
/// query.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    read_only: bool,
    statement_timeout: Option<Duration>,
    application_tag: Option<String>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub fn application_tag(mut self, tag: impl Into<String>) -> Self {
        self.application_tag = Some(tag.into());
        self
    }

    pub fn statements(&self) -> Vec<String> {
        let mut statements = Vec::new();
        if self.read_only {
            statements.push("SET TRANSACTION READ ONLY".to_string());
        }
        if let Some(timeout) = self.statement_timeout {
            statements.push(format!(
                "SET LOCAL statement_timeout = '{}ms'",
                timeout.as_millis()
            ));
        }
        if let Some(tag) = &self.application_tag {
            statements.push(format!(
                "SET LOCAL application_name = '{}'",
                tag.replace('\'', "''")
            ));
        }
        statements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_renders_no_statements() {
        assert!(SessionConfig::new().statements().is_empty());
    }

    #[test]
    fn config_renders_session_statements_in_order() {
        let statements = SessionConfig::new()
            .read_only()
            .statement_timeout(Duration::from_millis(1500))
            .application_tag("audit-writer")
            .statements();

        assert_eq!(
            statements,
            vec![
                "SET TRANSACTION READ ONLY".to_string(),
                "SET LOCAL statement_timeout = '1500ms'".to_string(),
                "SET LOCAL application_name = 'audit-writer'".to_string(),
            ]
        );
    }

    #[test]
    fn application_tag_escapes_quotes() {
        let statements = SessionConfig::new().application_tag("bob's job").statements();
        assert_eq!(
            statements,
            vec!["SET LOCAL application_name = 'bob''s job'".to_string()]
        );
    }
}
