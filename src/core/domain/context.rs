use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one logical execution flow.
///
/// Transaction and callback state is scoped to this key. A key is stable
/// across every suspension point within its flow and never visible to other
/// flows; concurrently running flows must carry distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey(Arc<str>);

impl ContextKey {
    /// An explicit token supplied by the caller, for code running outside
    /// the task abstraction.
    pub fn named(token: impl Into<String>) -> Self {
        ContextKey(Arc::from(token.into()))
    }

    /// A process-unique key for a new logical flow.
    pub fn unique() -> Self {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        ContextKey(Arc::from(format!("ctx-{}", id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

tokio::task_local! {
    static CURRENT_CONTEXT: ContextKey;
}

/// The ambient key of the calling flow, if one is installed.
pub fn current() -> Option<ContextKey> {
    CURRENT_CONTEXT.try_with(|key| key.clone()).ok()
}

/// Runs `fut` with `key` installed as the ambient context key. Nested scopes
/// shadow the outer key for their duration.
pub async fn scope<F>(key: ContextKey, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_CONTEXT.scope(key, fut).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_keys_are_distinct() {
        assert_ne!(ContextKey::unique(), ContextKey::unique());
    }

    #[test]
    fn named_keys_compare_by_token() {
        assert_eq!(ContextKey::named("req-1"), ContextKey::named("req-1"));
        assert_ne!(ContextKey::named("req-1"), ContextKey::named("req-2"));
    }

    #[tokio::test]
    async fn scope_installs_and_restores_the_key() {
        assert!(current().is_none());

        let outer = ContextKey::named("outer");
        let inner = ContextKey::named("inner");
        scope(outer.clone(), async {
            assert_eq!(current(), Some(outer.clone()));
            scope(inner.clone(), async {
                assert_eq!(current(), Some(inner.clone()));
            })
            .await;
            assert_eq!(current(), Some(outer.clone()));
        })
        .await;

        assert!(current().is_none());
    }
}
