use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Notify;
use tokio::time;
use tracing::{debug, error, info, warn};

use common::{AppConfig, logger};
use market_data::YahooClient;
use strategy::{CooldownCache, GeminiClient, OrchestratorConfig, SignalOrchestrator};

use crate::http::AppState;
use crate::services::dispatcher::CommandDispatcher;
use crate::services::scheduler::TriggerScheduler;
use crate::services::telegram_service::TelegramNotifier;

mod http;
mod services;

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::setup_logger();
    dotenv().ok();

    let config = AppConfig::from_env()?;
    info!(
        "Starting Trading Signal Bot ({}) with {} symbols",
        config.environment,
        config.stock_symbols.len()
    );
    debug!("{:?}", config);

    let quotes = Arc::new(YahooClient::new(&config.yahoo_base_url, &config.market_suffix)?);
    let inference = Arc::new(GeminiClient::new(
        &config.gemini_base_url,
        &config.gemini_model,
        &config.gemini_api_key,
    )?);
    let telegram = Arc::new(TelegramNotifier::new(&config.telegram_bot_token)?);

    let orchestrator = Arc::new(SignalOrchestrator::new(
        quotes,
        inference,
        telegram.clone(),
        OrchestratorConfig::new(config.stock_symbols.clone(), config.telegram_chat_id),
    ));
    let cooldown = Arc::new(CooldownCache::new(config.signal_cooldown));
    let dispatcher = Arc::new(CommandDispatcher::new(orchestrator.clone(), cooldown));

    let scheduler = if config.schedule_times.is_empty() {
        info!("No schedule times configured, scheduler disabled");
        None
    } else {
        let scheduler = Arc::new(TriggerScheduler::new(
            orchestrator.clone(),
            &config.schedule_times,
            &config.schedule_timezone,
        ));
        scheduler.start().await;
        Some(scheduler)
    };

    let polling = match &config.webhook_url {
        Some(url) if config.is_production() => {
            if let Err(e) = telegram.setup_webhook(url).await {
                error!("Failed to setup webhook: {:#}", e);
            }
            None
        }
        _ => {
            if let Err(e) = telegram.delete_webhook().await {
                warn!("Could not clear webhook before polling: {:#}", e);
            }
            Some(telegram.spawn_polling(dispatcher.clone()))
        }
    };

    let app = http::router(AppState {
        dispatcher,
        scheduler: scheduler.clone(),
        telegram: Some(telegram),
        default_symbol: config.default_stock_symbol.clone(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    let stop = Arc::new(Notify::new());
    let server = {
        let stop = stop.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { stop.notified().await })
                .await
        })
    };

    shutdown_signal().await;
    info!("Shutting down...");

    if let Some(scheduler) = &scheduler {
        scheduler.stop().await;
    }
    if let Some(polling) = polling {
        polling.abort();
    }

    stop.notify_one();
    match time::timeout(SHUTDOWN_DEADLINE, server).await {
        Ok(Ok(Ok(()))) => info!("Server exited"),
        Ok(Ok(Err(e))) => error!("Server error during shutdown: {}", e),
        Ok(Err(e)) => error!("Server task failed: {}", e),
        Err(_) => warn!(
            "Server did not stop within {}s, abandoning in-flight requests",
            SHUTDOWN_DEADLINE.as_secs()
        ),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
