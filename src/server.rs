//! HTTP surface — Twilio webhook, voice TwiML callback, health, and
//! manual test triggers.

use std::sync::Arc;

use axum::extract::{Form, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::error;

use crate::morning::{AnswerSet, MorningService};
use crate::voice::{EMPTY_TWIML, VoiceTicketStore, expired_twiml, say_twiml};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MorningService>,
    pub tickets: Arc<VoiceTicketStore>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook/twilio", post(twilio_webhook))
        .route("/voice/{id}", get(voice_callback))
        .route("/test/send-questions", post(trigger_questions))
        .route("/test/send-delivery", post(trigger_delivery))
        .route("/test/send-message", post(trigger_message))
        .with_state(state)
}

fn twiml_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Inbound message webhook payload (form-encoded by Twilio).
#[derive(Debug, Deserialize)]
struct TwilioInbound {
    #[serde(rename = "From")]
    from: String,
    #[serde(rename = "Body", default)]
    body: String,
}

async fn twilio_webhook(
    State(state): State<AppState>,
    Form(inbound): Form<TwilioInbound>,
) -> Response {
    match state.service.handle_reply(&inbound.from, &inbound.body).await {
        Ok(()) => twiml_response(EMPTY_TWIML.to_string()),
        Err(e) => {
            error!("Webhook handling failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Voice callback: redeem the ticket and speak its message, or the fixed
/// expired response. Always answers — a hung callback would leave the
/// call silent.
async fn voice_callback(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let twiml = match state.tickets.consume(&id).await {
        Some(message) => say_twiml(&message),
        None => expired_twiml(),
    };
    twiml_response(twiml)
}

// ── Manual test triggers ────────────────────────────────────────────

fn outcome_json(result: crate::error::Result<()>, message: &str) -> Json<Value> {
    match result {
        Ok(()) => Json(json!({ "success": true, "message": message })),
        Err(e) => Json(json!({ "success": false, "error": e.to_string() })),
    }
}

async fn trigger_questions(State(state): State<AppState>) -> Json<Value> {
    outcome_json(state.service.send_prompt().await, "Morning questions sent")
}

async fn trigger_delivery(State(state): State<AppState>) -> Json<Value> {
    outcome_json(
        state.service.run_delivery_job().await,
        "Pending message delivered",
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestMessageRequest {
    love_note: Option<String>,
    gratitude: Option<String>,
    encouragement: Option<String>,
    media_url: Option<String>,
}

impl TestMessageRequest {
    /// Explicit answers when all three are given, canned ones otherwise.
    fn answers(&self) -> AnswerSet {
        match (&self.love_note, &self.gratitude, &self.encouragement) {
            (Some(love_note), Some(gratitude), Some(encouragement)) => AnswerSet {
                love_note: love_note.clone(),
                gratitude: gratitude.clone(),
                encouragement: encouragement.clone(),
            },
            _ => AnswerSet {
                love_note: "Your smile lights up my whole world".to_string(),
                gratitude: "I'm grateful for your kindness and patience".to_string(),
                encouragement: "You're going to crush it today, I believe in you".to_string(),
            },
        }
    }
}

async fn trigger_message(State(state): State<AppState>, body: String) -> Json<Value> {
    // Lenient on purpose: an empty or malformed body falls back to the
    // canned answers so the trigger always does something observable.
    let request: TestMessageRequest = serde_json::from_str(&body).unwrap_or_default();
    outcome_json(
        state
            .service
            .send_test_message(&request.answers(), request.media_url.as_deref())
            .await,
        "Test message sent",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_test_request_falls_back_to_canned_answers() {
        let request = TestMessageRequest {
            love_note: Some("only one".to_string()),
            ..Default::default()
        };
        assert!(request.answers().love_note.contains("smile"));

        let full = TestMessageRequest {
            love_note: Some("a".to_string()),
            gratitude: Some("b".to_string()),
            encouragement: Some("c".to_string()),
            media_url: None,
        };
        assert_eq!(full.answers().love_note, "a");
    }
}
