//! Single-slot pending delivery buffer.
//!
//! Holds at most one parsed answer set between the reply arriving and the
//! scheduled delivery. Owned state passed around by `Arc` handle — the
//! "at most one pending answer" invariant lives here and nowhere else.

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::parser::AnswerSet;

#[derive(Debug, Default)]
struct Inner {
    pending: Option<AnswerSet>,
    last_prompted_at: Option<DateTime<Utc>>,
}

/// Pending-delivery buffer plus the last-prompt timestamp.
#[derive(Debug, Default)]
pub struct PendingState {
    inner: Mutex<Inner>,
}

impl PendingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a parsed answer set, replacing any existing one. Last write
    /// wins; nothing queues.
    pub async fn store(&self, answers: AnswerSet) {
        let mut inner = self.inner.lock().await;
        if inner.pending.is_some() {
            tracing::debug!("Replacing previously pending answers");
        }
        inner.pending = Some(answers);
    }

    /// Read and clear the buffer in one step. No await point separates the
    /// read from the clear, so nothing can observe an in-between state.
    pub async fn take(&self) -> Option<AnswerSet> {
        self.inner.lock().await.pending.take()
    }

    /// Record when the morning questions went out. Observability only —
    /// replies are not validated against this.
    pub async fn mark_prompted(&self, at: DateTime<Utc>) {
        self.inner.lock().await.last_prompted_at = Some(at);
    }

    pub async fn last_prompted_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().await.last_prompted_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(note: &str) -> AnswerSet {
        AnswerSet {
            love_note: note.to_string(),
            gratitude: "g".to_string(),
            encouragement: "e".to_string(),
        }
    }

    #[tokio::test]
    async fn last_write_wins_and_take_clears() {
        let state = PendingState::new();
        state.store(answers("first")).await;
        state.store(answers("second")).await;

        let taken = state.take().await.unwrap();
        assert_eq!(taken.love_note, "second");
        assert!(state.take().await.is_none());
    }

    #[tokio::test]
    async fn empty_buffer_takes_none() {
        let state = PendingState::new();
        assert!(state.take().await.is_none());
    }

    #[tokio::test]
    async fn prompt_timestamp_recorded() {
        let state = PendingState::new();
        assert!(state.last_prompted_at().await.is_none());

        let now = Utc::now();
        state.mark_prompted(now).await;
        assert_eq!(state.last_prompted_at().await, Some(now));
    }
}
