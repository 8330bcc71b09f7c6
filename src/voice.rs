//! Voice message tickets — single-use, time-boxed references handed to
//! the Twilio voice callback.
//!
//! A ticket is readable at most once and only before expiry. Expiry is
//! enforced twice: lazily on `consume`, and by a periodic sweep that
//! bounds memory growth from tickets nobody ever fetches.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// How long a ticket stays redeemable.
const TICKET_TTL_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
struct Ticket {
    message: String,
    expires_at: DateTime<Utc>,
}

/// In-memory ticket store keyed by opaque id.
pub struct VoiceTicketStore {
    tickets: RwLock<HashMap<String, Ticket>>,
    ttl: Duration,
}

impl VoiceTicketStore {
    pub fn new() -> Arc<Self> {
        Self::with_ttl(Duration::minutes(TICKET_TTL_MINUTES))
    }

    /// Custom TTL, for tests.
    pub fn with_ttl(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            tickets: RwLock::new(HashMap::new()),
            ttl,
        })
    }

    /// Store a message and return the opaque ticket id for it.
    pub async fn issue(&self, message: &str) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let ticket = Ticket {
            message: message.to_string(),
            expires_at: Utc::now() + self.ttl,
        };
        self.tickets.write().await.insert(id.clone(), ticket);
        id
    }

    /// Redeem a ticket. Returns the message on the first call before
    /// expiry; `None` for unknown, already-consumed, or expired ids.
    /// The entry is removed on read — a retried fetch sees `None`.
    pub async fn consume(&self, id: &str) -> Option<String> {
        let ticket = self.tickets.write().await.remove(id)?;
        if Utc::now() > ticket.expires_at {
            debug!(ticket_id = %id, "Voice ticket expired before consumption");
            return None;
        }
        Some(ticket.message)
    }

    /// Drop every expired ticket. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut tickets = self.tickets.write().await;
        let before = tickets.len();
        tickets.retain(|_, t| now <= t.expires_at);
        before - tickets.len()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.tickets.read().await.len()
    }
}

/// Spawn the background sweep (runs every 60s).
pub fn spawn_sweep_task(store: Arc<VoiceTicketStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = store.sweep().await;
            if removed > 0 {
                debug!(removed, "Swept expired voice tickets");
            }
        }
    })
}

// ── TwiML rendering ─────────────────────────────────────────────────

/// TwiML that speaks `message` to the callee.
pub fn say_twiml(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n  <Say voice=\"Polly.Joanna\">{}</Say>\n</Response>",
        escape_xml(message)
    )
}

/// TwiML for an unknown or expired ticket.
pub fn expired_twiml() -> String {
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n  <Say voice=\"Polly.Joanna\">This message has expired.</Say>\n</Response>"
        .to_string()
}

/// Empty TwiML document, returned from the inbound message webhook.
pub const EMPTY_TWIML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response></Response>";

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
