//! Egress seam for silence persistence. The store's transactional model
//! is opaque to the core: the matcher treats whatever it returns as an
//! immutable snapshot for the duration of one evaluation.

use crate::model::Silence;

/// Read access to the set of currently known silences. Write access
/// (create/expire/delete) is a collaborator concern, not the core's.
#[async_trait::async_trait]
pub trait SilenceStore: Send + Sync {
    /// Return every silence the store currently holds, regardless of
    /// lifecycle status; callers derive `SilenceStatus` themselves via
    /// [`Silence::status_at`].
    async fn list_silences(&self) -> anyhow::Result<Vec<Silence>>;
}

/// In-memory store, useful for tests and for callers that manage their
/// own persistence and just need something to hand the matcher.
pub struct InMemorySilenceStore {
    silences: std::sync::RwLock<Vec<Silence>>,
}

impl InMemorySilenceStore {
    pub fn new(silences: Vec<Silence>) -> Self {
        Self { silences: std::sync::RwLock::new(silences) }
    }

    pub fn replace(&self, silences: Vec<Silence>) {
        *self.silences.write().unwrap_or_else(|p| p.into_inner()) = silences;
    }
}

#[async_trait::async_trait]
impl SilenceStore for InMemorySilenceStore {
    async fn list_silences(&self) -> anyhow::Result<Vec<Silence>> {
        Ok(self.silences.read().unwrap_or_else(|p| p.into_inner()).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Matcher, MatcherType};
    use chrono::Utc;

    fn silence(id: &str) -> Silence {
        Silence {
            id: id.to_string(),
            created_by: "ops".to_string(),
            comment: "test".to_string(),
            starts_at: Utc::now() - chrono::Duration::hours(1),
            ends_at: Utc::now() + chrono::Duration::hours(1),
            matchers: vec![Matcher { name: "alertname".to_string(), value: "X".to_string(), kind: MatcherType::Equal }],
        }
    }

    #[tokio::test]
    async fn in_memory_store_lists_what_it_was_given() {
        let store = InMemorySilenceStore::new(vec![silence("a"), silence("b")]);
        let silences = store.list_silences().await.unwrap();
        assert_eq!(silences.len(), 2);
    }

    #[tokio::test]
    async fn replace_swaps_the_whole_set() {
        let store = InMemorySilenceStore::new(vec![silence("a")]);
        store.replace(vec![silence("b"), silence("c")]);
        let silences = store.list_silences().await.unwrap();
        assert_eq!(silences.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);
    }
}
