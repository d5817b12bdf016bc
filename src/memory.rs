//! The `MemoryStore` external collaborator (§6).
//!
//! The persistence layer itself — a vector-similarity recall store and its
//! backing database — is out of scope (§1). This module specifies only the
//! boundary: a trait the orchestrator calls best-effort, and a no-op
//! implementation so the core is runnable without a real store wired in.

use async_trait::async_trait;

/// One remembered prior exchange, as returned by [`MemoryStore::recall`].
#[derive(Debug, Clone)]
pub struct Recollection {
    pub prompt: String,
    pub response: String,
}

/// Boundary to a persistence layer that stores and recalls prior exchanges
/// for a user, scoped by lexical/semantic similarity to the current prompt.
/// Both operations are best-effort from the orchestrator's perspective:
/// a failure here is logged and ignored, never allowed to abort reasoning
/// (§4.6, §5, §7).
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Persist a completed exchange. Returns whether the write succeeded;
    /// callers treat `Ok(false)` the same as an error — best-effort either
    /// way.
    async fn store(&self, user_id: &str, prompt: &str, response: &str) -> bool;

    /// Recall up to `top_k` prior exchanges relevant to `prompt` for this
    /// user. An empty vector (not an error) is returned when nothing is
    /// found or the store is unreachable.
    async fn recall(&self, user_id: &str, prompt: &str, top_k: usize) -> Vec<Recollection>;
}

/// A [`MemoryStore`] that never remembers anything. The default when no
/// persistence layer is wired in.
#[derive(Debug, Default)]
pub struct NoopMemoryStore;

#[async_trait]
impl MemoryStore for NoopMemoryStore {
    async fn store(&self, _user_id: &str, _prompt: &str, _response: &str) -> bool {
        false
    }

    async fn recall(&self, _user_id: &str, _prompt: &str, _top_k: usize) -> Vec<Recollection> {
        Vec::new()
    }
}

/// Render the `{memory_context}` placeholder text from a batch of
/// recollections, matching the source's `"Previous: {prompt} -> {response}"`
/// join convention.
pub fn render_context(recollections: &[Recollection]) -> String {
    recollections
        .iter()
        .map(|r| format!("Previous: {} -> {}", r.prompt, r.response))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_store_never_remembers() {
        let store = NoopMemoryStore;
        assert!(!store.store("u1", "hi", "hello").await);
        assert!(store.recall("u1", "hi", 3).await.is_empty());
    }

    #[test]
    fn render_context_joins_previous_exchanges() {
        let recollections = vec![
            Recollection {
                prompt: "what is rust".into(),
                response: "a systems language".into(),
            },
            Recollection {
                prompt: "is it fast".into(),
                response: "yes".into(),
            },
        ];
        let rendered = render_context(&recollections);
        assert_eq!(
            rendered,
            "Previous: what is rust -> a systems language\nPrevious: is it fast -> yes"
        );
    }

    #[test]
    fn render_context_empty_is_empty_string() {
        assert_eq!(render_context(&[]), "");
    }
}
