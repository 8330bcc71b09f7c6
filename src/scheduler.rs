//! Daily triggers — fire a job once a day at a configured local time.

use std::future::Future;
use std::str::FromStr;

use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;
use tracing::{error, info};

use crate::error::ConfigError;

/// Parse an IANA timezone name like `"America/New_York"`.
pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>().map_err(|_| ConfigError::InvalidValue {
        key: "timezone".to_string(),
        message: format!("unknown timezone '{name}'"),
    })
}

/// Build a once-a-day cron schedule from an `"HH:MM"` time of day.
fn daily_schedule(time: &str) -> Result<Schedule, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: "time".to_string(),
        message: format!("expected HH:MM, got '{time}'"),
    };

    let (hours, minutes) = time.split_once(':').ok_or_else(invalid)?;
    let hours: u8 = hours.parse().map_err(|_| invalid())?;
    let minutes: u8 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    // sec min hour day-of-month month day-of-week
    Schedule::from_str(&format!("0 {minutes} {hours} * * *")).map_err(|_| invalid())
}

/// Spawn a loop that runs `job` every day at `time` in `tz`.
///
/// Job errors are logged and the loop keeps going; the next fire is
/// recomputed after every run, so fires never stack up.
pub fn spawn_daily<F, Fut>(
    name: &'static str,
    time: &str,
    tz: Tz,
    job: F,
) -> Result<tokio::task::JoinHandle<()>, ConfigError>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = crate::error::Result<()>> + Send,
{
    let schedule = daily_schedule(time)?;
    info!(job = name, time, timezone = %tz, "Daily job scheduled");

    Ok(tokio::spawn(async move {
        loop {
            let Some(next) = schedule.upcoming(tz).next() else {
                error!(job = name, "No upcoming fire time; stopping job");
                return;
            };

            let wait = (next.with_timezone(&Utc) - Utc::now())
                .to_std()
                .unwrap_or_default();
            tokio::time::sleep(wait).await;

            info!(job = name, "Running scheduled job");
            if let Err(e) = job().await {
                error!(job = name, "Scheduled job failed: {e}");
            }

            // Step past the fire second so the same instant is not picked
            // up again by the next upcoming() call.
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }))
}
