//! Channel fan-out — one transport attempt per enabled channel, outcomes
//! tracked independently.

pub mod email;
pub mod twilio;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Profile;
use crate::error::ChannelError;
use crate::history::{DeliveryStatus, EntryKind, HistoryEntry, HistoryRecorder};
use crate::voice::VoiceTicketStore;

/// One communication medium with its own addressing and transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Sms,
    Whatsapp,
    Email,
    Voice,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Whatsapp => "whatsapp",
            Self::Email => "email",
            Self::Voice => "voice",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sms" => Ok(Self::Sms),
            "whatsapp" => Ok(Self::Whatsapp),
            "email" => Ok(Self::Email),
            "voice" => Ok(Self::Voice),
            _ => Err(()),
        }
    }
}

/// Transport-level sender. One implementation talks to Twilio and SMTP;
/// tests substitute stubs.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Send a text (SMS or WhatsApp) message.
    async fn send_message(
        &self,
        channel: ChannelKind,
        address: &str,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<(), ChannelError>;

    /// Send an email. Separate pathway from the phone-number channels.
    async fn send_email(
        &self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), ChannelError>;

    /// Place a voice call that fetches its script from `callback_url`.
    async fn place_call(&self, address: &str, callback_url: &str) -> Result<(), ChannelError>;
}

/// Outcome of one channel's attempt within a dispatch.
#[derive(Debug, Clone)]
pub struct ChannelOutcome {
    pub channel: ChannelKind,
    pub error: Option<String>,
}

/// Result of a full fan-out. The dispatch itself never fails; individual
/// channel failures show up here and in the history log.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    pub fn sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_none()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.sent()
    }
}

/// Fans a message out across a profile's enabled channels.
///
/// Best-effort broadcast: every attempt is issued, all are awaited
/// regardless of individual failures, and each outcome lands in the
/// history log as its own entry.
pub struct Dispatcher {
    sender: Arc<dyn ChannelSender>,
    history: Arc<HistoryRecorder>,
    tickets: Arc<VoiceTicketStore>,
    base_url: String,
}

impl Dispatcher {
    pub fn new(
        sender: Arc<dyn ChannelSender>,
        history: Arc<HistoryRecorder>,
        tickets: Arc<VoiceTicketStore>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            history,
            tickets,
            base_url: base_url.into(),
        }
    }

    /// Send `body` to every channel enabled on `profile`.
    pub async fn dispatch(
        &self,
        profile: &Profile,
        kind: EntryKind,
        body: &str,
        media_url: Option<&str>,
    ) -> DispatchReport {
        let mut attempts = Vec::with_capacity(profile.channels.len());
        for &channel in &profile.channels {
            attempts.push(self.attempt(channel, profile, kind, body, media_url));
        }

        let outcomes: Vec<ChannelOutcome> = join_all(attempts).await;

        for outcome in &outcomes {
            let status = if outcome.error.is_none() {
                DeliveryStatus::Sent
            } else {
                DeliveryStatus::Failed
            };
            match &outcome.error {
                None => info!(channel = outcome.channel.as_str(), "Message sent"),
                Some(reason) => {
                    warn!(channel = outcome.channel.as_str(), reason = %reason, "Send failed")
                }
            }
            self.history
                .record(HistoryEntry {
                    timestamp: Utc::now(),
                    kind,
                    channel: outcome.channel,
                    status,
                    message: body.to_string(),
                    error: outcome.error.clone(),
                    media_url: media_url.map(String::from),
                })
                .await;
        }

        DispatchReport { outcomes }
    }

    async fn attempt(
        &self,
        channel: ChannelKind,
        profile: &Profile,
        kind: EntryKind,
        body: &str,
        media_url: Option<&str>,
    ) -> ChannelOutcome {
        let result = match channel {
            ChannelKind::Sms => {
                self.sender
                    .send_message(ChannelKind::Sms, &profile.phone_number, body, media_url)
                    .await
            }
            ChannelKind::Whatsapp => {
                let address = whatsapp_address(&profile.phone_number);
                self.sender
                    .send_message(ChannelKind::Whatsapp, &address, body, media_url)
                    .await
            }
            ChannelKind::Email => match &profile.email {
                Some(address) => {
                    self.sender
                        .send_email(address, email_subject(kind), body)
                        .await
                }
                None => Err(ChannelError::MissingAddress {
                    channel: "email".to_string(),
                }),
            },
            ChannelKind::Voice => {
                // The call carries only a ticket reference; the message
                // text stays here until the callback redeems it.
                let ticket_id = self.tickets.issue(body).await;
                let callback_url = format!("{}/voice/{ticket_id}", self.base_url);
                self.sender
                    .place_call(&profile.phone_number, &callback_url)
                    .await
            }
        };

        ChannelOutcome {
            channel,
            error: result.err().map(|e| e.to_string()),
        }
    }
}

/// Production transports: Twilio for phone-number channels, SMTP for
/// email. Email stays unconfigured when no SMTP host was provided;
/// attempts on it then fail with a clear reason and land in history like
/// any other channel failure.
pub struct Transports {
    twilio: twilio::TwilioClient,
    email: Option<email::EmailSender>,
}

impl Transports {
    pub fn new(twilio: twilio::TwilioClient, email: Option<email::EmailSender>) -> Self {
        Self { twilio, email }
    }
}

#[async_trait]
impl ChannelSender for Transports {
    async fn send_message(
        &self,
        channel: ChannelKind,
        address: &str,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<(), ChannelError> {
        self.twilio.send_message(channel, address, body, media_url).await
    }

    async fn send_email(
        &self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), ChannelError> {
        match &self.email {
            Some(sender) => sender.send(address, subject, body),
            None => Err(ChannelError::NotConfigured {
                channel: "email".to_string(),
                reason: "SMTP_HOST not set".to_string(),
            }),
        }
    }

    async fn place_call(&self, address: &str, callback_url: &str) -> Result<(), ChannelError> {
        self.twilio.place_call(address, callback_url).await
    }
}

/// Twilio's WhatsApp addressing convention: `whatsapp:+1555...`.
fn whatsapp_address(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{number}")
    }
}

/// Strip the channel scheme prefix for identity comparison.
pub fn normalize_address(address: &str) -> &str {
    address.strip_prefix("whatsapp:").unwrap_or(address)
}

fn email_subject(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::GirlfriendMessage => "Good Morning Love 💕",
        EntryKind::Question | EntryKind::Reply => "GoodMorning Love",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlStore;
    use std::sync::Mutex;

    /// Records every transport call; fails the channels listed in
    /// `fail_channels`.
    struct StubSender {
        calls: Mutex<Vec<(ChannelKind, String)>>,
        fail_channels: Vec<ChannelKind>,
    }

    impl StubSender {
        fn new(fail_channels: Vec<ChannelKind>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_channels,
            }
        }

        fn fail_for(&self, channel: ChannelKind) -> Result<(), ChannelError> {
            if self.fail_channels.contains(&channel) {
                Err(ChannelError::SendFailed {
                    channel: channel.as_str().to_string(),
                    reason: "stub failure".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ChannelSender for StubSender {
        async fn send_message(
            &self,
            channel: ChannelKind,
            address: &str,
            _body: &str,
            _media_url: Option<&str>,
        ) -> Result<(), ChannelError> {
            self.calls.lock().unwrap().push((channel, address.to_string()));
            self.fail_for(channel)
        }

        async fn send_email(
            &self,
            address: &str,
            _subject: &str,
            _body: &str,
        ) -> Result<(), ChannelError> {
            self.calls
                .lock()
                .unwrap()
                .push((ChannelKind::Email, address.to_string()));
            self.fail_for(ChannelKind::Email)
        }

        async fn place_call(
            &self,
            address: &str,
            callback_url: &str,
        ) -> Result<(), ChannelError> {
            self.calls
                .lock()
                .unwrap()
                .push((ChannelKind::Voice, format!("{address} {callback_url}")));
            self.fail_for(ChannelKind::Voice)
        }
    }

    fn profile(channels: Vec<ChannelKind>) -> Profile {
        Profile {
            name: "Her".to_string(),
            phone_number: "+15550001111".to_string(),
            email: Some("her@example.com".to_string()),
            channels,
        }
    }

    async fn dispatcher_with(
        sender: Arc<StubSender>,
    ) -> (Dispatcher, Arc<HistoryRecorder>, Arc<VoiceTicketStore>) {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let history = Arc::new(HistoryRecorder::new(store));
        let tickets = VoiceTicketStore::new();
        let dispatcher = Dispatcher::new(
            sender,
            Arc::clone(&history),
            Arc::clone(&tickets),
            "https://example.test",
        );
        (dispatcher, history, tickets)
    }

    #[tokio::test]
    async fn partial_failure_yields_two_history_entries() {
        let sender = Arc::new(StubSender::new(vec![ChannelKind::Sms]));
        let (dispatcher, history, _) = dispatcher_with(Arc::clone(&sender)).await;

        let report = dispatcher
            .dispatch(
                &profile(vec![ChannelKind::Sms, ChannelKind::Email]),
                EntryKind::GirlfriendMessage,
                "hello",
                None,
            )
            .await;

        assert_eq!(report.sent(), 1);
        assert_eq!(report.failed(), 1);

        let entries = history.list().await.unwrap();
        assert_eq!(entries.len(), 2);
        let failed: Vec<_> = entries
            .iter()
            .filter(|e| e.status == DeliveryStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].channel, ChannelKind::Sms);
        assert!(failed[0].error.as_deref().unwrap().contains("stub failure"));
    }

    #[tokio::test]
    async fn whatsapp_gets_scheme_prefix_sms_stays_bare() {
        let sender = Arc::new(StubSender::new(vec![]));
        let (dispatcher, _, _) = dispatcher_with(Arc::clone(&sender)).await;

        dispatcher
            .dispatch(
                &profile(vec![ChannelKind::Whatsapp, ChannelKind::Sms]),
                EntryKind::Question,
                "hi",
                None,
            )
            .await;

        let calls = sender.calls.lock().unwrap();
        assert!(calls.contains(&(
            ChannelKind::Whatsapp,
            "whatsapp:+15550001111".to_string()
        )));
        assert!(calls.contains(&(ChannelKind::Sms, "+15550001111".to_string())));
    }

    #[tokio::test]
    async fn voice_mints_ticket_and_passes_only_the_reference() {
        let sender = Arc::new(StubSender::new(vec![]));
        let (dispatcher, _, tickets) = dispatcher_with(Arc::clone(&sender)).await;

        dispatcher
            .dispatch(
                &profile(vec![ChannelKind::Voice]),
                EntryKind::GirlfriendMessage,
                "secret message",
                None,
            )
            .await;

        let calls = sender.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (_, detail) = &calls[0];
        // The transport call carries the callback URL, never the text.
        assert!(detail.contains("https://example.test/voice/"));
        assert!(!detail.contains("secret message"));

        let ticket_id = detail.rsplit('/').next().unwrap().to_string();
        drop(calls);
        assert_eq!(
            tickets.consume(&ticket_id).await.as_deref(),
            Some("secret message")
        );
    }

    #[tokio::test]
    async fn missing_email_address_is_a_channel_failure() {
        let sender = Arc::new(StubSender::new(vec![]));
        let (dispatcher, history, _) = dispatcher_with(Arc::clone(&sender)).await;

        let mut p = profile(vec![ChannelKind::Email]);
        p.email = None;
        let report = dispatcher
            .dispatch(&p, EntryKind::Question, "hi", None)
            .await;

        assert_eq!(report.failed(), 1);
        let entries = history.list().await.unwrap();
        assert_eq!(entries[0].status, DeliveryStatus::Failed);
        // Nothing reached the transport.
        assert!(sender.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_channels_dispatches_nothing() {
        let sender = Arc::new(StubSender::new(vec![]));
        let (dispatcher, history, _) = dispatcher_with(Arc::clone(&sender)).await;

        let report = dispatcher
            .dispatch(&profile(vec![]), EntryKind::Question, "hi", None)
            .await;

        assert!(report.outcomes.is_empty());
        assert!(history.list().await.unwrap().is_empty());
    }

    #[test]
    fn address_normalization_strips_scheme() {
        assert_eq!(normalize_address("whatsapp:+1555"), "+1555");
        assert_eq!(normalize_address("+1555"), "+1555");
    }
}
