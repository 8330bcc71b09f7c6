//! Configuration — environment-driven, validated at startup.

use secrecy::SecretString;

use crate::channels::ChannelKind;
use crate::error::ConfigError;

/// A person the service talks to, with their addressing details and
/// enabled channels.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub channels: Vec<ChannelKind>,
}

/// Twilio account credentials and sending numbers.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub whatsapp_from: String,
    pub sms_from: String,
}

/// SMTP credentials for the email channel. Absent when email is not set up.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

/// Default schedule, overridable via the settings store.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub timezone: String,
    /// When the morning questions go out, "HH:MM".
    pub morning_time: String,
    /// When the composed message is delivered, "HH:MM".
    pub delivery_time: String,
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Public base URL, used to build voice callback references.
    pub base_url: String,
    pub twilio: TwilioConfig,
    pub smtp: Option<SmtpConfig>,
    pub sender: Profile,
    pub recipient: Profile,
    pub schedule: ScheduleConfig,
}

fn require(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse a comma-separated channel list, e.g. `"whatsapp,sms"`.
fn parse_channels(key: &str, raw: &str) -> Result<Vec<ChannelKind>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ChannelKind>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("unknown channel '{s}'"),
                })
        })
        .collect()
}

impl AppConfig {
    /// Build the configuration from environment variables.
    ///
    /// Twilio credentials, both phone numbers, the timezone and the
    /// morning time are required; everything else has a default or is
    /// optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let base_url = std::env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"));
        let base_url = base_url.trim_end_matches('/').to_string();

        let twilio = TwilioConfig {
            account_sid: require("TWILIO_ACCOUNT_SID")?,
            auth_token: SecretString::from(require("TWILIO_AUTH_TOKEN")?),
            whatsapp_from: require("TWILIO_WHATSAPP_FROM")?,
            sms_from: require("TWILIO_SMS_FROM")?,
        };

        // Email is optional: when the SMTP host is absent the channel is
        // left unconfigured and attempts on it fail with a clear reason.
        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) if !host.is_empty() => {
                let username = std::env::var("SMTP_USER").unwrap_or_default();
                Some(SmtpConfig {
                    port: std::env::var("SMTP_PORT")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(587),
                    from_address: std::env::var("EMAIL_FROM")
                        .unwrap_or_else(|_| username.clone()),
                    password: SecretString::from(
                        std::env::var("SMTP_PASS").unwrap_or_default(),
                    ),
                    username,
                    host,
                })
            }
            _ => None,
        };

        let my_channels = std::env::var("MY_CHANNELS")
            .unwrap_or_else(|_| "whatsapp,sms".to_string());
        let her_channels = std::env::var("GIRLFRIEND_CHANNELS")
            .unwrap_or_else(|_| "sms".to_string());

        let sender = Profile {
            name: "Me".to_string(),
            phone_number: require("MY_PHONE_NUMBER")?,
            email: std::env::var("EMAIL_FROM").ok().filter(|s| !s.is_empty()),
            channels: parse_channels("MY_CHANNELS", &my_channels)?,
        };

        let recipient = Profile {
            name: "Girlfriend".to_string(),
            phone_number: require("GIRLFRIEND_PHONE_NUMBER")?,
            email: std::env::var("GIRLFRIEND_EMAIL")
                .ok()
                .filter(|s| !s.is_empty()),
            channels: parse_channels("GIRLFRIEND_CHANNELS", &her_channels)?,
        };

        let schedule = ScheduleConfig {
            timezone: require("TIMEZONE")?,
            morning_time: require("MORNING_TIME")?,
            delivery_time: std::env::var("GIRLFRIEND_SEND_TIME")
                .unwrap_or_else(|_| "08:30".to_string()),
        };

        Ok(Self {
            port,
            base_url,
            twilio,
            smtp,
            sender,
            recipient,
            schedule,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_list_parses() {
        let channels = parse_channels("MY_CHANNELS", "whatsapp, sms,email").unwrap();
        assert_eq!(
            channels,
            vec![ChannelKind::Whatsapp, ChannelKind::Sms, ChannelKind::Email]
        );
    }

    #[test]
    fn unknown_channel_rejected() {
        let err = parse_channels("MY_CHANNELS", "carrier-pigeon").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
