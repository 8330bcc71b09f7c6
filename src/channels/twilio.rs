//! Twilio REST client — SMS/WhatsApp messages and voice call initiation.

use secrecy::ExposeSecret;

use crate::config::TwilioConfig;
use crate::error::ChannelError;

use super::ChannelKind;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Thin client over the Twilio messaging and voice APIs.
pub struct TwilioClient {
    config: TwilioConfig,
    client: reqwest::Client,
}

impl TwilioClient {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, resource: &str) -> String {
        format!(
            "{TWILIO_API_BASE}/Accounts/{}/{resource}.json",
            self.config.account_sid
        )
    }

    /// Sending number for a given message channel.
    fn from_address(&self, channel: ChannelKind) -> &str {
        match channel {
            ChannelKind::Whatsapp => &self.config.whatsapp_from,
            _ => &self.config.sms_from,
        }
    }

    /// Send an SMS or WhatsApp message. `to` must already carry the
    /// channel's addressing convention (`whatsapp:` prefix or bare
    /// number).
    pub async fn send_message(
        &self,
        channel: ChannelKind,
        to: &str,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut form = vec![
            ("From", self.from_address(channel).to_string()),
            ("To", to.to_string()),
            ("Body", body.to_string()),
        ];
        if let Some(url) = media_url {
            form.push(("MediaUrl", url.to_string()));
        }

        self.post(channel, "Messages", &form).await
    }

    /// Place a voice call. Twilio fetches the TwiML script from
    /// `callback_url` when the callee answers.
    pub async fn place_call(&self, to: &str, callback_url: &str) -> Result<(), ChannelError> {
        let form = vec![
            ("From", self.config.sms_from.clone()),
            ("To", to.to_string()),
            ("Url", callback_url.to_string()),
        ];

        self.post(ChannelKind::Voice, "Calls", &form).await
    }

    async fn post(
        &self,
        channel: ChannelKind,
        resource: &str,
        form: &[(&str, String)],
    ) -> Result<(), ChannelError> {
        let send_failed = |reason: String| ChannelError::SendFailed {
            channel: channel.as_str().to_string(),
            reason,
        };

        let response = self
            .client
            .post(self.api_url(resource))
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(form)
            .send()
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(send_failed(format!(
            "Twilio returned {status}: {}",
            extract_error_message(&body)
        )))
    }
}

/// Pull the human-readable message out of a Twilio error body, falling
/// back to the raw payload.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn client() -> TwilioClient {
        TwilioClient::new(TwilioConfig {
            account_sid: "AC123".to_string(),
            auth_token: SecretString::from("token"),
            whatsapp_from: "whatsapp:+15550009999".to_string(),
            sms_from: "+15550009999".to_string(),
        })
    }

    #[test]
    fn api_url_embeds_account_sid() {
        assert_eq!(
            client().api_url("Messages"),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn from_address_follows_channel() {
        let c = client();
        assert_eq!(c.from_address(ChannelKind::Whatsapp), "whatsapp:+15550009999");
        assert_eq!(c.from_address(ChannelKind::Sms), "+15550009999");
    }

    #[test]
    fn error_message_extracted_from_json_body() {
        let body = r#"{"code":21211,"message":"Invalid 'To' number","status":400}"#;
        assert_eq!(extract_error_message(body), "Invalid 'To' number");
        assert_eq!(extract_error_message("plain failure"), "plain failure");
    }
}
