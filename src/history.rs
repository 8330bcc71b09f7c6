//! Message history — append-only audit log with a rolling retention
//! window.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::channels::ChannelKind;
use crate::error::StoreError;
use crate::store::Store;

/// Entries older than this are excluded from reads and eligible for purge.
pub const RETENTION_DAYS: i64 = 90;

/// What a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Question,
    Reply,
    GirlfriendMessage,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Reply => "reply",
            Self::GirlfriendMessage => "girlfriend_message",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "question" => Some(Self::Question),
            "reply" => Some(Self::Reply),
            "girlfriend_message" => Some(Self::GirlfriendMessage),
            _ => None,
        }
    }
}

/// Outcome of a transport attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One immutable audit record. Corrections are new entries, never edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: EntryKind,
    pub channel: ChannelKind,
    pub status: DeliveryStatus,
    pub message: String,
    pub error: Option<String>,
    pub media_url: Option<String>,
}

/// Owns the audit log: appends, windowed reads, and retention purges.
pub struct HistoryRecorder {
    store: Arc<dyn Store>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn cutoff() -> DateTime<Utc> {
        Utc::now() - Duration::days(RETENTION_DAYS)
    }

    /// Append an entry. Store failures are logged and swallowed so that a
    /// broken history store never aborts an in-flight dispatch.
    pub async fn record(&self, entry: HistoryEntry) {
        if let Err(e) = self.store.append_history(&entry).await {
            error!(
                channel = entry.channel.as_str(),
                status = entry.status.as_str(),
                "Failed to record history entry: {e}"
            );
        }
    }

    /// Entries within the retention window, newest first. Does not mutate
    /// storage.
    pub async fn list(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        self.store.history_since(Self::cutoff()).await
    }

    /// Physically remove entries outside the retention window. Idempotent.
    pub async fn purge(&self) -> Result<u64, StoreError> {
        self.store.purge_history_before(Self::cutoff()).await
    }
}
