//! libSQL store — settings, questions, templates and message history in
//! one local database file (or `:memory:` for tests).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use tracing::info;

use crate::config::ScheduleConfig;
use crate::error::StoreError;
use crate::history::{DeliveryStatus, EntryKind, HistoryEntry};
use crate::morning::Question;

use super::traits::Store;

const SETTING_MORNING_TIME: &str = "morning_time";
const SETTING_DELIVERY_TIME: &str = "delivery_time";
const SETTING_TIMEZONE: &str = "timezone";

/// libSQL-backed [`Store`]. A single connection is reused for all
/// operations; `libsql::Connection` is safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("Failed to create data directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// In-memory database, for tests.
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                number INTEGER NOT NULL,
                text TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS templates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                template_text TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                kind TEXT NOT NULL,
                channel TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT NOT NULL,
                error TEXT,
                media_url TEXT
            )",
        ];
        for sql in statements {
            self.conn()
                .execute(sql, ())
                .await
                .map_err(|e| StoreError::Open(format!("Schema init failed: {e}")))?;
        }
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT value FROM settings WHERE key = ?1", params![key])
            .await
            .map_err(|e| StoreError::Query(format!("get_setting: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row.get::<String>(0)
                    .map_err(|e| StoreError::BadRow(e.to_string()))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get_setting: {e}"))),
        }
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .await
            .map_err(|e| StoreError::Query(format!("put_setting: {e}")))?;
        Ok(())
    }
}

/// Convert `Option<String>` to a libsql Value (NULL when absent).
fn opt_text(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::BadRow(format!("bad timestamp '{s}': {e}")))
}

fn row_to_entry(row: &libsql::Row) -> Result<HistoryEntry, StoreError> {
    let get_str = |i: i32| {
        row.get::<String>(i)
            .map_err(|e| StoreError::BadRow(e.to_string()))
    };

    let kind_str = get_str(1)?;
    let channel_str = get_str(2)?;
    let status_str = get_str(3)?;

    Ok(HistoryEntry {
        timestamp: parse_timestamp(&get_str(0)?)?,
        kind: EntryKind::parse(&kind_str)
            .ok_or_else(|| StoreError::BadRow(format!("unknown entry kind '{kind_str}'")))?,
        channel: channel_str
            .parse()
            .map_err(|_| StoreError::BadRow(format!("unknown channel '{channel_str}'")))?,
        status: DeliveryStatus::parse(&status_str)
            .ok_or_else(|| StoreError::BadRow(format!("unknown status '{status_str}'")))?,
        message: get_str(4)?,
        error: row.get::<String>(5).ok(),
        media_url: row.get::<String>(6).ok(),
    })
}

#[async_trait]
impl Store for LibSqlStore {
    async fn get_settings(
        &self,
        defaults: &ScheduleConfig,
    ) -> Result<ScheduleConfig, StoreError> {
        Ok(ScheduleConfig {
            morning_time: self
                .get_setting(SETTING_MORNING_TIME)
                .await?
                .unwrap_or_else(|| defaults.morning_time.clone()),
            delivery_time: self
                .get_setting(SETTING_DELIVERY_TIME)
                .await?
                .unwrap_or_else(|| defaults.delivery_time.clone()),
            timezone: self
                .get_setting(SETTING_TIMEZONE)
                .await?
                .unwrap_or_else(|| defaults.timezone.clone()),
        })
    }

    async fn set_settings(&self, settings: &ScheduleConfig) -> Result<(), StoreError> {
        self.put_setting(SETTING_MORNING_TIME, &settings.morning_time)
            .await?;
        self.put_setting(SETTING_DELIVERY_TIME, &settings.delivery_time)
            .await?;
        self.put_setting(SETTING_TIMEZONE, &settings.timezone).await
    }

    async fn get_questions(&self, defaults: &[Question]) -> Result<Vec<Question>, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT number, text FROM questions ORDER BY number", ())
            .await
            .map_err(|e| StoreError::Query(format!("get_questions: {e}")))?;

        let mut questions = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("get_questions: {e}")))?
        {
            questions.push(Question {
                number: row
                    .get::<i64>(0)
                    .map_err(|e| StoreError::BadRow(e.to_string()))? as u32,
                text: row
                    .get::<String>(1)
                    .map_err(|e| StoreError::BadRow(e.to_string()))?,
            });
        }

        if questions.is_empty() {
            self.set_questions(defaults).await?;
            return Ok(defaults.to_vec());
        }
        Ok(questions)
    }

    async fn set_questions(&self, questions: &[Question]) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute("DELETE FROM questions", ())
            .await
            .map_err(|e| StoreError::Query(format!("set_questions: {e}")))?;
        for q in questions {
            conn.execute(
                "INSERT INTO questions (number, text) VALUES (?1, ?2)",
                params![q.number as i64, q.text.as_str()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_questions: {e}")))?;
        }
        Ok(())
    }

    async fn get_templates(&self, defaults: &[String]) -> Result<Vec<String>, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT template_text FROM templates ORDER BY id", ())
            .await
            .map_err(|e| StoreError::Query(format!("get_templates: {e}")))?;

        let mut templates = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("get_templates: {e}")))?
        {
            templates.push(
                row.get::<String>(0)
                    .map_err(|e| StoreError::BadRow(e.to_string()))?,
            );
        }

        if templates.is_empty() {
            self.set_templates(defaults).await?;
            return Ok(defaults.to_vec());
        }
        Ok(templates)
    }

    async fn set_templates(&self, templates: &[String]) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute("DELETE FROM templates", ())
            .await
            .map_err(|e| StoreError::Query(format!("set_templates: {e}")))?;
        for t in templates {
            conn.execute(
                "INSERT INTO templates (template_text) VALUES (?1)",
                params![t.as_str()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_templates: {e}")))?;
        }
        Ok(())
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO messages (timestamp, kind, channel, status, message, error, media_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.timestamp.to_rfc3339(),
                    entry.kind.as_str(),
                    entry.channel.as_str(),
                    entry.status.as_str(),
                    entry.message.as_str(),
                    opt_text(entry.error.clone()),
                    opt_text(entry.media_url.clone()),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("append_history: {e}")))?;
        Ok(())
    }

    async fn history_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT timestamp, kind, channel, status, message, error, media_url
                 FROM messages WHERE timestamp >= ?1 ORDER BY timestamp DESC",
                params![cutoff.to_rfc3339()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("history_since: {e}")))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("history_since: {e}")))?
        {
            match row_to_entry(&row) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Skipping history row: {e}"),
            }
        }
        Ok(entries)
    }

    async fn purge_history_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.conn()
            .execute(
                "DELETE FROM messages WHERE timestamp < ?1",
                params![cutoff.to_rfc3339()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("purge_history: {e}")))
    }
}
