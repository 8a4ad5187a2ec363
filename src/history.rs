//! Per-user conversation history with similarity retrieval
//!
//! Append-only, strictly user-scoped. History is best-effort context:
//! failures are logged at call sites and never fail a turn. The
//! in-memory store ranks entries by token overlap; a real embedding
//! store can be slotted in behind the same trait.

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// One stored line of conversation. Role framing ("Human: …" / "AI: …")
/// lives inside `text` so retrieval keeps conversational framing.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub text: String,
    pub recorded_at: DateTime<Utc>,
}

/// Trait for the history store seam.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one line to the user's history.
    async fn record(&self, user_id: &str, text: &str) -> Result<()>;

    /// Retrieve up to `k` entries relevant to `query`, most relevant
    /// first. Must never surface another user's entries.
    async fn retrieve(&self, user_id: &str, query: &str, k: usize) -> Result<Vec<String>>;
}

/// In-memory history store with token-overlap ranking.
pub struct InMemoryHistoryStore {
    entries: Arc<RwLock<HashMap<String, Vec<HistoryEntry>>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| t.to_string())
        .collect()
}

/// Overlap count between query tokens and entry tokens. Zero-overlap
/// entries still rank (by recency) so short histories stay useful.
fn overlap_score(query_tokens: &HashSet<String>, text: &str) -> usize {
    let entry_tokens = tokenize(text);
    query_tokens.intersection(&entry_tokens).count()
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn record(&self, user_id: &str, text: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries
            .entry(user_id.to_string())
            .or_insert_with(Vec::new)
            .push(HistoryEntry {
                text: text.to_string(),
                recorded_at: Utc::now(),
            });

        debug!(user_id = %user_id, "Recorded history entry");
        Ok(())
    }

    async fn retrieve(&self, user_id: &str, query: &str, k: usize) -> Result<Vec<String>> {
        let entries = self.entries.read().await;

        let Some(user_entries) = entries.get(user_id) else {
            return Ok(Vec::new());
        };

        let query_tokens = tokenize(query);

        let mut scored: Vec<(usize, &HistoryEntry)> = user_entries
            .iter()
            .map(|entry| (overlap_score(&query_tokens, &entry.text), entry))
            .collect();

        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| b.1.recorded_at.cmp(&a.1.recorded_at))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, entry)| entry.text.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_retrieval_is_user_scoped() {
        let store = InMemoryHistoryStore::new();
        store.record("alice", "Human: I like banking stocks").await.unwrap();
        store.record("bob", "Human: I prefer gold ETFs").await.unwrap();

        let for_alice = store.retrieve("alice", "banking stocks", 5).await.unwrap();
        assert_eq!(for_alice.len(), 1);
        assert!(for_alice[0].contains("banking"));
        assert!(!for_alice.iter().any(|t| t.contains("gold")));

        let for_bob = store.retrieve("bob", "banking stocks", 5).await.unwrap();
        assert_eq!(for_bob.len(), 1);
        assert!(for_bob[0].contains("gold"));
    }

    #[tokio::test]
    async fn test_unknown_user_yields_empty() {
        let store = InMemoryHistoryStore::new();
        let results = store.retrieve("nobody", "anything", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_relevance_ranking() {
        let store = InMemoryHistoryStore::new();
        store.record("u1", "Human: tell me about cricket scores").await.unwrap();
        store
            .record("u1", "Human: Remember I like banking stocks")
            .await
            .unwrap();
        store.record("u1", "AI: Noted, banking sector it is").await.unwrap();

        let results = store
            .retrieve("u1", "any tips on banking stocks?", 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].to_lowercase().contains("banking"));
    }

    #[tokio::test]
    async fn test_role_framing_preserved() {
        let store = InMemoryHistoryStore::new();
        store.record("u1", "Human: what moved nifty today?").await.unwrap();

        let results = store.retrieve("u1", "nifty", 5).await.unwrap();
        assert!(results[0].starts_with("Human: "));
    }

    #[tokio::test]
    async fn test_k_bounds_result_count() {
        let store = InMemoryHistoryStore::new();
        for i in 0..10 {
            store
                .record("u1", &format!("Human: question {} about stocks", i))
                .await
                .unwrap();
        }
        let results = store.retrieve("u1", "stocks", 5).await.unwrap();
        assert_eq!(results.len(), 5);
    }
}
