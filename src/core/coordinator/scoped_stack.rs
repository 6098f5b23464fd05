use std::sync::Arc;

use dashmap::DashMap;

use crate::core::domain::context::ContextKey;
use crate::core::domain::transaction::TransactionHandle;

/// Concurrent mapping from context key to the stack of open transactional
/// handles for that flow. Depth equals the savepoint nesting level; depth 1
/// is the outermost transaction.
///
/// "No entry" is the sentinel for "no transaction open", so an entry is
/// removed the moment its last handle is popped. Entries for distinct keys
/// are mutated concurrently; a single key is only ever mutated by its own
/// flow, whose steps are sequential.
pub struct ScopedStack {
    map: DashMap<ContextKey, Vec<Arc<dyn TransactionHandle>>>,
}

impl ScopedStack {
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    /// The innermost open handle for `key`, if any transaction is open.
    pub fn current(&self, key: &ContextKey) -> Option<Arc<dyn TransactionHandle>> {
        self.map.get(key).and_then(|stack| stack.last().cloned())
    }

    /// Current nesting depth for `key`; zero when no transaction is open.
    pub fn depth(&self, key: &ContextKey) -> usize {
        self.map.get(key).map(|stack| stack.len()).unwrap_or(0)
    }

    pub fn push(&self, key: &ContextKey, handle: Arc<dyn TransactionHandle>) {
        self.map.entry(key.clone()).or_default().push(handle);
    }

    /// Removes the innermost handle, deleting the key entry when it was the
    /// last one. A pop with no open stack indicates a push/pop mismatch
    /// somewhere up the chain; it is logged and ignored rather than
    /// propagated, since the flow being unwound may already be past caring.
    pub fn pop(&self, key: &ContextKey) {
        let emptied = match self.map.get_mut(key) {
            Some(mut stack) => {
                stack.pop();
                stack.is_empty()
            }
            None => {
                tracing::error!(
                    context = %key,
                    "pop on a context with no open transaction stack; push/pop mismatch"
                );
                return;
            }
        };
        if emptied {
            self.map.remove_if(key, |_, stack| stack.is_empty());
        }
    }

    /// Number of contexts currently holding at least one open transaction.
    pub fn open_contexts(&self) -> usize {
        self.map.len()
    }

    pub fn contains(&self, key: &ContextKey) -> bool {
        self.map.contains_key(key)
    }
}

impl Default for ScopedStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::transaction::{ToSql, TransactionError};
    use async_trait::async_trait;
    use std::any::Any;

    #[derive(Debug)]
    struct NullHandle(u32);

    #[async_trait]
    impl TransactionHandle for NullHandle {
        async fn execute(
            &self,
            _query: &str,
            _params: Vec<Box<dyn ToSql>>,
        ) -> Result<u64, TransactionError> {
            Ok(0)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn handle(id: u32) -> Arc<dyn TransactionHandle> {
        Arc::new(NullHandle(id))
    }

    fn handle_id(handle: &Arc<dyn TransactionHandle>) -> u32 {
        handle.as_any().downcast_ref::<NullHandle>().unwrap().0
    }

    #[test]
    fn push_and_pop_track_depth() {
        let stack = ScopedStack::new();
        let key = ContextKey::named("flow");

        assert_eq!(stack.depth(&key), 0);
        assert!(stack.current(&key).is_none());

        stack.push(&key, handle(1));
        stack.push(&key, handle(2));
        assert_eq!(stack.depth(&key), 2);
        assert_eq!(handle_id(&stack.current(&key).unwrap()), 2);

        stack.pop(&key);
        assert_eq!(handle_id(&stack.current(&key).unwrap()), 1);
    }

    #[test]
    fn last_pop_removes_the_entry_entirely() {
        let stack = ScopedStack::new();
        let key = ContextKey::named("flow");

        stack.push(&key, handle(1));
        assert!(stack.contains(&key));

        stack.pop(&key);
        assert!(!stack.contains(&key));
        assert_eq!(stack.open_contexts(), 0);
    }

    #[test]
    fn pop_on_missing_key_is_a_noop() {
        let stack = ScopedStack::new();
        stack.pop(&ContextKey::named("never-pushed"));
        assert_eq!(stack.open_contexts(), 0);
    }

    #[test]
    fn keys_are_independent() {
        let stack = ScopedStack::new();
        let a = ContextKey::named("a");
        let b = ContextKey::named("b");

        stack.push(&a, handle(1));
        stack.push(&b, handle(2));

        assert_eq!(handle_id(&stack.current(&a).unwrap()), 1);
        assert_eq!(handle_id(&stack.current(&b).unwrap()), 2);
        assert_eq!(stack.open_contexts(), 2);

        stack.pop(&a);
        assert!(!stack.contains(&a));
        assert!(stack.contains(&b));
    }
}
