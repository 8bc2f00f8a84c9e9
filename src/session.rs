//! Per-conversation memory.
//!
//! [`SessionStore`] keeps the bounded question/answer history and the
//! optional document scope for each session id. The trait is async so a
//! durable backend (Redis, a key-value table) can replace the in-memory map
//! without changing the engine's contract; the in-memory backend is the
//! process-lifetime default.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Turn;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Record a completed question/answer turn. Creates the session if new.
    async fn append(&self, session_id: &str, question: &str, answer: &str) -> Result<()>;

    /// Most recent turns, oldest first, truncated to the configured window.
    async fn history(&self, session_id: &str) -> Result<Vec<Turn>>;

    /// Drop a session's turns and scope entirely.
    async fn clear(&self, session_id: &str) -> Result<()>;

    /// Filenames this session's retrieval is restricted to, if set.
    async fn scope(&self, session_id: &str) -> Result<Option<Vec<String>>>;

    /// Set or clear the session's retrieval scope. Creates the session if new.
    async fn set_scope(&self, session_id: &str, filenames: Option<Vec<String>>) -> Result<()>;
}

#[derive(Default)]
struct SessionState {
    turns: VecDeque<Turn>,
    scope: Option<Vec<String>>,
}

/// In-memory session store. Appends are serialized by the write lock, so two
/// requests racing on the same session id cannot corrupt turn ordering.
pub struct InMemorySessions {
    window_turns: usize,
    inner: RwLock<HashMap<String, SessionState>>,
}

impl InMemorySessions {
    /// `window_turns` is the number of Q/A pairs `history` returns; stored
    /// turns are trimmed to the same bound.
    pub fn new(window_turns: usize) -> Self {
        Self {
            window_turns,
            inner: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessions {
    async fn append(&self, session_id: &str, question: &str, answer: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let state = inner.entry(session_id.to_string()).or_default();
        state.turns.push_back(Turn {
            question: question.to_string(),
            answer: answer.to_string(),
        });
        while state.turns.len() > self.window_turns {
            state.turns.pop_front();
        }
        Ok(())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<Turn>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .get(session_id)
            .map(|state| {
                let skip = state.turns.len().saturating_sub(self.window_turns);
                state.turns.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        self.inner.write().unwrap().remove(session_id);
        Ok(())
    }

    async fn scope(&self, session_id: &str) -> Result<Option<Vec<String>>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.get(session_id).and_then(|state| state.scope.clone()))
    }

    async fn set_scope(&self, session_id: &str, filenames: Option<Vec<String>>) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.entry(session_id.to_string()).or_default().scope = filenames;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_bounded_by_window() {
        let store = InMemorySessions::new(3);
        for i in 0..5 {
            store
                .append("s1", &format!("q{}", i), &format!("a{}", i))
                .await
                .unwrap();
        }

        let history = store.history("s1").await.unwrap();
        assert_eq!(history.len(), 3);
        let questions: Vec<&str> = history.iter().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q3", "q4"]);
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let store = InMemorySessions::new(3);
        store.append("s1", "q1", "a1").await.unwrap();
        store.append("s2", "q2", "a2").await.unwrap();

        assert_eq!(store.history("s1").await.unwrap().len(), 1);
        assert_eq!(store.history("s2").await.unwrap().len(), 1);

        store.clear("s1").await.unwrap();
        assert!(store.history("s1").await.unwrap().is_empty());
        assert_eq!(store.history("s2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_session_has_empty_history() {
        let store = InMemorySessions::new(3);
        assert!(store.history("nope").await.unwrap().is_empty());
        assert_eq!(store.scope("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn scope_set_and_cleared() {
        let store = InMemorySessions::new(3);
        store
            .set_scope("s1", Some(vec!["a.pdf".to_string()]))
            .await
            .unwrap();
        assert_eq!(
            store.scope("s1").await.unwrap(),
            Some(vec!["a.pdf".to_string()])
        );

        store.set_scope("s1", None).await.unwrap();
        assert_eq!(store.scope("s1").await.unwrap(), None);
    }
}
