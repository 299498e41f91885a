use anyhow::Context;
use skyfare_api::bot::{run_bot, BotService, BotSettings, ChatDispatcher};
use skyfare_api::provider::{ProviderSettings, TravelpayoutsClient};
use skyfare_api::search::RangeSearchEngine;
use skyfare_api::telegram::TelegramClient;
use skyfare_api::worker::{AlertMonitor, MonitorSettings};
use skyfare_api::{app, AppState};
use skyfare_core::{AlertRepository, NotificationSink, QuoteProvider};
use skyfare_store::{DbClient, SqliteAlertRepository};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyfare_api=debug,skyfare_store=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = skyfare_store::app_config::Config::load().context("Failed to load config")?;
    tracing::info!("Starting Skyfare on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to open database")?;
    db.migrate().await.context("Failed to run migrations")?;
    let alerts: Arc<dyn AlertRepository> = Arc::new(SqliteAlertRepository::new(db.pool.clone()));

    let provider: Arc<dyn QuoteProvider> = Arc::new(
        TravelpayoutsClient::new(ProviderSettings::from_config(&config.provider))
            .context("Failed to build provider client")?,
    );
    let search = RangeSearchEngine::new(
        provider,
        Duration::from_millis(config.monitor.rate_limit_ms),
    );

    let telegram = Arc::new(
        TelegramClient::new(&config.telegram).context("Failed to build Telegram client")?,
    );
    let sink: Arc<dyn NotificationSink> = telegram.clone();

    let cancel = CancellationToken::new();

    let monitor = AlertMonitor::new(
        alerts.clone(),
        search.clone(),
        sink.clone(),
        MonitorSettings::from_config(&config.monitor, &config.provider, &config.telegram),
    )
    .spawn(cancel.clone());

    let dialogue_ttl = Duration::from_secs(config.search.dialogue_ttl_seconds);
    let bot = Arc::new(BotService::new(
        alerts.clone(),
        search,
        sink,
        BotSettings {
            result_limit: config.search.result_limit,
            currency: config.provider.currency.clone(),
            link_base_url: config.provider.link_base_url.clone(),
            dialogue_ttl,
        },
    ));
    let bot_task = tokio::spawn(run_bot(
        telegram,
        ChatDispatcher::new(bot, dialogue_ttl),
        config.telegram.poll_timeout_seconds,
        cancel.clone(),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let shutdown = cancel.clone();
    axum::serve(listener, app(AppState::new(alerts)))
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown signal received"),
                _ = shutdown.cancelled() => {}
            }
        })
        .await
        .context("HTTP server failed")?;

    cancel.cancel();
    monitor.shutdown().await;
    if let Err(e) = bot_task.await {
        tracing::error!("Bot task ended abnormally: {}", e);
    }
    db.pool.close().await;

    tracing::info!("Skyfare stopped");
    Ok(())
}
