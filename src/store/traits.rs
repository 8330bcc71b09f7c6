//! Backend-agnostic persistence trait for settings, questions, templates
//! and the message history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::ScheduleConfig;
use crate::error::StoreError;
use crate::history::HistoryEntry;
use crate::morning::Question;

/// Key-value/record store the core reads from and writes to.
///
/// The `get_*` collection accessors seed an empty store with the supplied
/// defaults and return them, so first reads and later reads agree.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Settings ────────────────────────────────────────────────────

    /// Schedule settings, with `defaults` filling any keys not yet saved.
    async fn get_settings(&self, defaults: &ScheduleConfig)
        -> Result<ScheduleConfig, StoreError>;

    async fn set_settings(&self, settings: &ScheduleConfig) -> Result<(), StoreError>;

    // ── Questions ───────────────────────────────────────────────────

    /// Ordered question sequence; seeds with `defaults` when empty.
    async fn get_questions(&self, defaults: &[Question]) -> Result<Vec<Question>, StoreError>;

    async fn set_questions(&self, questions: &[Question]) -> Result<(), StoreError>;

    // ── Templates ───────────────────────────────────────────────────

    /// Ordered template collection; seeds with `defaults` when empty.
    async fn get_templates(&self, defaults: &[String]) -> Result<Vec<String>, StoreError>;

    async fn set_templates(&self, templates: &[String]) -> Result<(), StoreError>;

    // ── History ─────────────────────────────────────────────────────

    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), StoreError>;

    /// Entries with `timestamp >= cutoff`, newest first.
    async fn history_since(&self, cutoff: DateTime<Utc>)
        -> Result<Vec<HistoryEntry>, StoreError>;

    /// Delete entries with `timestamp < cutoff`; returns how many went.
    async fn purge_history_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
