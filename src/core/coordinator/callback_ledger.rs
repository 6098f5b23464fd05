use std::collections::VecDeque;

use dashmap::DashMap;

use crate::core::domain::commit_hook::CommitHook;
use crate::core::domain::context::ContextKey;

struct LedgerEntry {
    /// Hooks in registration order, across all nesting levels of the flow.
    queue: VecDeque<Box<dyn CommitHook>>,
    /// One counter per open nesting level: how many of the queued hooks were
    /// registered while that level was innermost. Invariant: when an entry
    /// exists, `counters.len()` equals the flow's current stack depth.
    counters: Vec<usize>,
}

/// Deferred commit hooks per context key, attributed to the nesting level
/// that registered them so a partial rollback can discard exactly the hooks
/// belonging to the levels it unwound.
pub struct CallbackLedger {
    map: DashMap<ContextKey, LedgerEntry>,
}

impl CallbackLedger {
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    /// Queues `hook` for the flow identified by `key`, attributing it to the
    /// current innermost level. `depth` is the flow's stack depth at
    /// registration time and must be at least 1; the entry is created lazily
    /// on first registration, with zero counters for the shallower levels.
    pub fn register(&self, key: &ContextKey, depth: usize, hook: Box<dyn CommitHook>) {
        debug_assert!(depth >= 1);
        let mut entry = self.map.entry(key.clone()).or_insert_with(|| LedgerEntry {
            queue: VecDeque::new(),
            counters: Vec::new(),
        });
        while entry.counters.len() < depth.max(1) {
            entry.counters.push(0);
        }
        if let Some(innermost) = entry.counters.last_mut() {
            *innermost += 1;
        }
        entry.queue.push_back(hook);
    }

    /// Called on entering a new nesting level, so hooks registered there can
    /// later be attributed to it. A flow that has never registered a hook
    /// has no entry and nothing to track.
    pub fn deposit_level(&self, key: &ContextKey) {
        if let Some(mut entry) = self.map.get_mut(key) {
            entry.counters.push(0);
        }
    }

    /// Called on leaving a nesting level. Returns the hooks that are now due
    /// to run: non-empty only for a committed outermost exit.
    ///
    /// A committed inner exit folds the level's count into the enclosing
    /// level, keeping its hooks pending until the real commit. A rolled-back
    /// exit discards the hooks attributed to the level (which already
    /// includes anything folded up from committed deeper levels).
    pub fn resolve_on_exit(&self, key: &ContextKey, committed: bool) -> Vec<Box<dyn CommitHook>> {
        let mut due = Vec::new();
        let mut emptied = false;

        if let Some(mut entry) = self.map.get_mut(key) {
            if committed && entry.counters.len() <= 1 {
                due.extend(entry.queue.drain(..));
                entry.counters.clear();
                emptied = true;
            } else {
                let level_count = entry.counters.pop().unwrap_or(0);
                if committed {
                    if let Some(enclosing) = entry.counters.last_mut() {
                        *enclosing += level_count;
                    }
                } else {
                    let remaining = entry.queue.len().saturating_sub(level_count);
                    entry.queue.truncate(remaining);
                    emptied = entry.counters.is_empty();
                }
            }
        }

        if emptied {
            self.map.remove_if(key, |_, entry| entry.counters.is_empty());
        }
        due
    }

    /// Number of contexts with a live ledger entry.
    pub fn pending_contexts(&self) -> usize {
        self.map.len()
    }

    pub fn contains(&self, key: &ContextKey) -> bool {
        self.map.contains_key(key)
    }
}

impl Default for CallbackLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::commit_hook::CommitHookError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct NamedHook {
        name: &'static str,
        fired: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl CommitHook for NamedHook {
        async fn run(self: Box<Self>) -> Result<(), CommitHookError> {
            self.fired.lock().unwrap().push(self.name);
            Ok(())
        }

        fn label(&self) -> &str {
            self.name
        }
    }

    fn hook(name: &'static str, fired: &Arc<Mutex<Vec<&'static str>>>) -> Box<dyn CommitHook> {
        Box::new(NamedHook {
            name,
            fired: fired.clone(),
        })
    }

    async fn run_all(hooks: Vec<Box<dyn CommitHook>>) {
        for hook in hooks {
            hook.run().await.unwrap();
        }
    }

    #[tokio::test]
    async fn outermost_commit_releases_hooks_in_fifo_order() {
        let ledger = CallbackLedger::new();
        let key = ContextKey::named("flow");
        let fired = Arc::new(Mutex::new(Vec::new()));

        ledger.register(&key, 1, hook("first", &fired));
        ledger.register(&key, 1, hook("second", &fired));

        let due = ledger.resolve_on_exit(&key, true);
        assert_eq!(due.len(), 2);
        run_all(due).await;

        assert_eq!(*fired.lock().unwrap(), vec!["first", "second"]);
        assert!(!ledger.contains(&key));
    }

    #[tokio::test]
    async fn savepoint_release_folds_hooks_into_enclosing_level() {
        let ledger = CallbackLedger::new();
        let key = ContextKey::named("flow");
        let fired = Arc::new(Mutex::new(Vec::new()));

        // depth 1 open, hook registered, then a nested level commits.
        ledger.register(&key, 1, hook("outer", &fired));
        ledger.deposit_level(&key);
        ledger.register(&key, 2, hook("inner", &fired));

        let due = ledger.resolve_on_exit(&key, true);
        assert!(due.is_empty(), "savepoint release must not fire hooks");

        let due = ledger.resolve_on_exit(&key, true);
        assert_eq!(due.len(), 2);
        run_all(due).await;
        assert_eq!(*fired.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[tokio::test]
    async fn rolled_back_level_drops_only_its_own_hooks() {
        let ledger = CallbackLedger::new();
        let key = ContextKey::named("flow");
        let fired = Arc::new(Mutex::new(Vec::new()));

        ledger.register(&key, 1, hook("outer", &fired));
        ledger.deposit_level(&key);
        ledger.register(&key, 2, hook("inner", &fired));

        assert!(ledger.resolve_on_exit(&key, false).is_empty());

        let due = ledger.resolve_on_exit(&key, true);
        assert_eq!(due.len(), 1);
        run_all(due).await;
        assert_eq!(*fired.lock().unwrap(), vec!["outer"]);
    }

    #[tokio::test]
    async fn rollback_discards_hooks_folded_up_from_committed_inner_levels() {
        let ledger = CallbackLedger::new();
        let key = ContextKey::named("flow");
        let fired = Arc::new(Mutex::new(Vec::new()));

        // Hook registered at depth 2, savepoint commits, then depth 1 rolls
        // back: the folded hook must die with the outermost transaction.
        ledger.deposit_level(&key);
        ledger.register(&key, 2, hook("inner", &fired));
        assert!(ledger.resolve_on_exit(&key, true).is_empty());
        assert!(ledger.resolve_on_exit(&key, false).is_empty());

        assert!(fired.lock().unwrap().is_empty());
        assert!(!ledger.contains(&key));
    }

    #[test]
    fn entry_created_mid_nesting_is_cleared_by_the_outermost_exit() {
        let ledger = CallbackLedger::new();
        let key = ContextKey::named("flow");
        let fired = Arc::new(Mutex::new(Vec::new()));

        // First registration happens at depth 2; counters are padded for
        // the already-open outer level.
        ledger.register(&key, 2, hook("inner", &fired));

        assert!(ledger.resolve_on_exit(&key, false).is_empty());
        assert!(ledger.contains(&key), "outer level still open");

        assert!(ledger.resolve_on_exit(&key, false).is_empty());
        assert!(!ledger.contains(&key));
        assert_eq!(ledger.pending_contexts(), 0);
    }

    #[test]
    fn resolve_without_entry_is_a_noop() {
        let ledger = CallbackLedger::new();
        let key = ContextKey::named("no-hooks");
        assert!(ledger.resolve_on_exit(&key, true).is_empty());
        assert!(ledger.resolve_on_exit(&key, false).is_empty());
    }
}
