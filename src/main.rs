use std::sync::Arc;

use goodmorning::channels::{Dispatcher, Transports};
use goodmorning::channels::email::EmailSender;
use goodmorning::channels::twilio::TwilioClient;
use goodmorning::config::AppConfig;
use goodmorning::history::HistoryRecorder;
use goodmorning::morning::{MorningService, PendingState};
use goodmorning::scheduler::{parse_timezone, spawn_daily};
use goodmorning::server::{AppState, router};
use goodmorning::store::{LibSqlStore, Store};
use goodmorning::voice::{VoiceTicketStore, spawn_sweep_task};

/// When the daily history purge runs (local time in the configured zone).
const PURGE_TIME: &str = "03:30";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage (lettre)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("💕 GoodMorning Love v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: {}/webhook/twilio", config.base_url);

    // ── Store ───────────────────────────────────────────────────────
    let db_path = std::env::var("GOODMORNING_DB_PATH")
        .unwrap_or_else(|_| "./data/goodmorning.db".to_string());
    let store: Arc<dyn Store> = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {db_path}: {e}");
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {db_path}");

    // Schedule settings: stored values win over env defaults. Read once;
    // changing them requires a restart, as before.
    let schedule = store.get_settings(&config.schedule).await?;
    let timezone = parse_timezone(&schedule.timezone)?;
    eprintln!(
        "   Schedule: questions {} / delivery {} ({})",
        schedule.morning_time, schedule.delivery_time, schedule.timezone
    );

    // ── Channels ────────────────────────────────────────────────────
    let email = config.smtp.clone().map(EmailSender::new);
    eprintln!(
        "   Email: {}",
        if email.is_some() { "enabled" } else { "disabled (SMTP_HOST not set)" }
    );
    let transports = Arc::new(Transports::new(
        TwilioClient::new(config.twilio.clone()),
        email,
    ));

    let history = Arc::new(HistoryRecorder::new(Arc::clone(&store)));
    let tickets = VoiceTicketStore::new();
    let _sweep_handle = spawn_sweep_task(Arc::clone(&tickets));

    let dispatcher = Arc::new(Dispatcher::new(
        transports,
        Arc::clone(&history),
        Arc::clone(&tickets),
        config.base_url.clone(),
    ));

    // ── Service ─────────────────────────────────────────────────────
    let service = Arc::new(MorningService::new(
        config.sender.clone(),
        config.recipient.clone(),
        timezone,
        schedule.delivery_time.clone(),
        Arc::clone(&store),
        dispatcher,
        Arc::new(PendingState::new()),
    ));

    // ── Daily jobs ──────────────────────────────────────────────────
    let prompt_service = Arc::clone(&service);
    let _prompt_handle = spawn_daily("morning_questions", &schedule.morning_time, timezone, move || {
        let service = Arc::clone(&prompt_service);
        async move { service.send_prompt().await }
    })?;

    let delivery_service = Arc::clone(&service);
    let _delivery_handle = spawn_daily("delivery", &schedule.delivery_time, timezone, move || {
        let service = Arc::clone(&delivery_service);
        async move { service.run_delivery_job().await }
    })?;

    let purge_history = Arc::clone(&history);
    let _purge_handle = spawn_daily("history_purge", PURGE_TIME, timezone, move || {
        let history = Arc::clone(&purge_history);
        async move {
            let removed = history.purge().await?;
            if removed > 0 {
                tracing::info!(removed, "Purged old history entries");
            }
            Ok(())
        }
    })?;

    // ── Server ──────────────────────────────────────────────────────
    let app = router(AppState {
        service,
        tickets,
    });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "Server started");
    axum::serve(listener, app).await?;

    Ok(())
}
