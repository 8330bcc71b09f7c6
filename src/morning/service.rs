//! The ritual pipeline: morning prompt → reply capture → scheduled
//! delivery.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::channels::{Dispatcher, normalize_address};
use crate::config::Profile;
use crate::error::Result;
use crate::history::EntryKind;
use crate::morning::compose::{compose, default_templates};
use crate::morning::parser::{AnswerSet, parse_answers};
use crate::morning::pending::PendingState;
use crate::morning::{Question, default_questions};
use crate::store::Store;

const RETRY_MESSAGE: &str = "Sorry, I couldn't understand your reply. Please answer all three questions, one per line or numbered (1., 2., 3.).";
const DELIVERED_MESSAGE: &str = "Your love message has been delivered!";

/// Orchestrates the daily ritual for one sender/recipient pair.
pub struct MorningService {
    sender: Profile,
    recipient: Profile,
    /// Timezone the template rotation day is computed in.
    timezone: Tz,
    /// "HH:MM" shown in the saved-answers confirmation.
    delivery_time: String,
    store: Arc<dyn Store>,
    dispatcher: Arc<Dispatcher>,
    pending: Arc<PendingState>,
}

impl MorningService {
    pub fn new(
        sender: Profile,
        recipient: Profile,
        timezone: Tz,
        delivery_time: String,
        store: Arc<dyn Store>,
        dispatcher: Arc<Dispatcher>,
        pending: Arc<PendingState>,
    ) -> Self {
        Self {
            sender,
            recipient,
            timezone,
            delivery_time,
            store,
            dispatcher,
            pending,
        }
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    /// Send the morning questions to the sender and record the prompt
    /// instant.
    pub async fn send_prompt(&self) -> Result<()> {
        let questions = self.store.get_questions(&default_questions()).await?;
        let body = render_prompt(&questions);

        self.pending.mark_prompted(Utc::now()).await;
        self.dispatcher
            .dispatch(&self.sender, EntryKind::Question, &body, None)
            .await;
        info!("Morning questions sent");
        Ok(())
    }

    /// Handle one inbound reply.
    ///
    /// Identity is established purely by normalized address equality —
    /// spoofable at the protocol layer, kept as-is deliberately (known
    /// weakness). Messages from any other address are dropped silently.
    ///
    /// Every invocation produces at most one outbound message: a retry
    /// instruction on parse failure, or a confirmation on success.
    pub async fn handle_reply(&self, from: &str, body: &str) -> Result<()> {
        if normalize_address(from) != normalize_address(&self.sender.phone_number) {
            debug!(from, "Ignoring message from unknown number");
            return Ok(());
        }

        let questions = self.store.get_questions(&default_questions()).await?;
        let Some(answers) = parse_answers(body, questions.len()) else {
            warn!("Failed to parse answers from reply");
            self.dispatcher
                .dispatch(&self.sender, EntryKind::Reply, RETRY_MESSAGE, None)
                .await;
            return Ok(());
        };

        self.pending.store(answers).await;
        info!("Answers saved, will be delivered at the scheduled time");

        let confirmation = format!(
            "Your answers have been saved! Your message will be sent to your girlfriend at {}.",
            self.delivery_time
        );
        self.dispatcher
            .dispatch(&self.sender, EntryKind::Reply, &confirmation, None)
            .await;
        Ok(())
    }

    /// Deliver the pending message, if any. Consumes the buffer; a reply
    /// that lands while delivery is in flight populates the next cycle.
    pub async fn run_delivery_job(&self) -> Result<()> {
        let Some(answers) = self.pending.take().await else {
            info!("No pending answers to deliver");
            return Ok(());
        };

        self.deliver(&answers, None).await?;

        self.dispatcher
            .dispatch(&self.sender, EntryKind::Reply, DELIVERED_MESSAGE, None)
            .await;
        info!("Pending message delivered");
        Ok(())
    }

    /// Compose and deliver immediately, bypassing the pending buffer.
    /// Used by the manual test triggers.
    pub async fn send_test_message(
        &self,
        answers: &AnswerSet,
        media_url: Option<&str>,
    ) -> Result<()> {
        self.deliver(answers, media_url).await
    }

    async fn deliver(&self, answers: &AnswerSet, media_url: Option<&str>) -> Result<()> {
        let templates = self.store.get_templates(&default_templates()).await?;
        let message = compose(answers, &templates, self.today());

        self.dispatcher
            .dispatch(
                &self.recipient,
                EntryKind::GirlfriendMessage,
                &message,
                media_url,
            )
            .await;
        Ok(())
    }

    /// When the morning questions last went out, if ever.
    pub async fn last_prompted_at(&self) -> Option<chrono::DateTime<Utc>> {
        self.pending.last_prompted_at().await
    }
}

fn render_prompt(questions: &[Question]) -> String {
    let question_text = questions
        .iter()
        .map(|q| format!("{}. {}", q.number, q.text))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Good morning! 💕\n\nPlease answer these questions:\n\n{question_text}\n\nReply with your answers (one per line or numbered)."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChannelKind, ChannelSender};
    use crate::error::ChannelError;
    use crate::history::HistoryRecorder;
    use crate::store::LibSqlStore;
    use crate::voice::VoiceTicketStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Captures every (channel, address, body) the dispatcher sends.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(ChannelKind, String, String)>>,
    }

    impl RecordingSender {
        fn bodies(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|s| s.2.clone()).collect()
        }

        fn addresses(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|s| s.1.clone()).collect()
        }
    }

    #[async_trait]
    impl ChannelSender for RecordingSender {
        async fn send_message(
            &self,
            channel: ChannelKind,
            address: &str,
            body: &str,
            _media_url: Option<&str>,
        ) -> std::result::Result<(), ChannelError> {
            self.sent
                .lock()
                .unwrap()
                .push((channel, address.to_string(), body.to_string()));
            Ok(())
        }

        async fn send_email(
            &self,
            address: &str,
            _subject: &str,
            body: &str,
        ) -> std::result::Result<(), ChannelError> {
            self.sent.lock().unwrap().push((
                ChannelKind::Email,
                address.to_string(),
                body.to_string(),
            ));
            Ok(())
        }

        async fn place_call(
            &self,
            address: &str,
            callback_url: &str,
        ) -> std::result::Result<(), ChannelError> {
            self.sent.lock().unwrap().push((
                ChannelKind::Voice,
                address.to_string(),
                callback_url.to_string(),
            ));
            Ok(())
        }
    }

    const MY_NUMBER: &str = "+15550001111";
    const HER_NUMBER: &str = "+15550002222";

    async fn service() -> (MorningService, Arc<RecordingSender>) {
        let store: Arc<dyn Store> = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let sender_stub = Arc::new(RecordingSender::default());
        let history = Arc::new(HistoryRecorder::new(Arc::clone(&store)));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&sender_stub) as Arc<dyn ChannelSender>,
            history,
            VoiceTicketStore::new(),
            "https://example.test",
        ));

        let me = Profile {
            name: "Me".to_string(),
            phone_number: MY_NUMBER.to_string(),
            email: None,
            channels: vec![ChannelKind::Sms],
        };
        let her = Profile {
            name: "Her".to_string(),
            phone_number: HER_NUMBER.to_string(),
            email: None,
            channels: vec![ChannelKind::Sms],
        };

        let svc = MorningService::new(
            me,
            her,
            chrono_tz::UTC,
            "08:30".to_string(),
            store,
            dispatcher,
            Arc::new(PendingState::new()),
        );
        (svc, sender_stub)
    }

    #[tokio::test]
    async fn prompt_renders_numbered_questions() {
        let (svc, sent) = service().await;
        svc.send_prompt().await.unwrap();

        let bodies = sent.bodies();
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].contains("1. What's one thing you love about her today?"));
        assert!(bodies[0].contains("3. What do you want to encourage her about today?"));
        assert!(svc.last_prompted_at().await.is_some());
    }

    #[tokio::test]
    async fn unknown_sender_is_dropped_silently() {
        let (svc, sent) = service().await;
        svc.handle_reply("+19998887777", "1. a\n2. b\n3. c")
            .await
            .unwrap();
        assert!(sent.bodies().is_empty());
    }

    #[tokio::test]
    async fn whatsapp_prefix_stripped_for_identity_check() {
        let (svc, sent) = service().await;
        svc.handle_reply(&format!("whatsapp:{MY_NUMBER}"), "1. a\n2. b\n3. c")
            .await
            .unwrap();

        let bodies = sent.bodies();
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].contains("saved"));
    }

    #[tokio::test]
    async fn unparseable_reply_gets_retry_instruction() {
        let (svc, sent) = service().await;
        svc.handle_reply(MY_NUMBER, "just one line").await.unwrap();

        let bodies = sent.bodies();
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].contains("couldn't understand"));

        // No buffer mutation — the delivery job finds nothing.
        svc.run_delivery_job().await.unwrap();
        assert_eq!(sent.bodies().len(), 1);
    }

    #[tokio::test]
    async fn reply_then_delivery_reaches_recipient_and_confirms() {
        let (svc, sent) = service().await;
        svc.handle_reply(MY_NUMBER, "1. your smile\n2. us\n3. go get them")
            .await
            .unwrap();
        svc.run_delivery_job().await.unwrap();

        let addresses = sent.addresses();
        let bodies = sent.bodies();
        // saved-confirmation → me, composed message → her, delivered → me.
        assert_eq!(addresses.len(), 3);
        assert_eq!(addresses[0], MY_NUMBER);
        assert_eq!(addresses[1], HER_NUMBER);
        assert_eq!(addresses[2], MY_NUMBER);
        assert!(bodies[1].contains("your smile"));
        assert!(bodies[2].contains("delivered"));

        // Buffer consumed — a second run delivers nothing new.
        svc.run_delivery_job().await.unwrap();
        assert_eq!(sent.bodies().len(), 3);
    }

    #[tokio::test]
    async fn second_reply_replaces_first() {
        let (svc, sent) = service().await;
        svc.handle_reply(MY_NUMBER, "1. first\n2. b\n3. c").await.unwrap();
        svc.handle_reply(MY_NUMBER, "1. second\n2. b\n3. c").await.unwrap();
        svc.run_delivery_job().await.unwrap();

        let delivered = &sent.bodies()[2];
        assert!(delivered.contains("second"));
        assert!(!delivered.contains("first"));
    }

    #[tokio::test]
    async fn test_message_bypasses_buffer() {
        let (svc, sent) = service().await;
        let answers = AnswerSet {
            love_note: "note".to_string(),
            gratitude: "thanks".to_string(),
            encouragement: "onward".to_string(),
        };
        svc.send_test_message(&answers, Some("https://example.test/pic.gif"))
            .await
            .unwrap();

        assert_eq!(sent.addresses(), vec![HER_NUMBER.to_string()]);
    }
}
