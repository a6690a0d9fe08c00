use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use actbot::assistant::{Assistant, AssistantOptions, RetryPolicy};
use actbot::audit::SecurityLog;
use actbot::bot::{Pipeline, TelegramClient};
use actbot::config::Config;
use actbot::http::{self, HttpState};
use actbot::knowledge::KnowledgeStore;
use actbot::metrics::Metrics;
use actbot::openai;
use actbot::rate_limit::RateLimiter;
use actbot::session::SessionStore;
use actbot::store;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    std::fs::create_dir_all(&config.log_dir).ok();
    let file_appender = tracing_appender::rolling::never(&config.log_dir, "actbot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let level = if config.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into())),
        )
        .init();

    if let Err(e) = run(config).await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!("🚀 Starting ACT bot v{}", Config::version());

    let store = store::connect(&config.redis_url).await.context("connecting to store")?;
    if !store.ping().await.unwrap_or(false) {
        anyhow::bail!("store did not answer PING");
    }

    let knowledge = Arc::new(
        KnowledgeStore::load(&config.knowledge_path).context("loading knowledge base")?,
    );

    let client = openai::Client::new(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
        config.openai_model.clone(),
        config.api_timeout,
    )?;
    let assistant = Assistant::new(
        client,
        AssistantOptions {
            max_tokens: config.max_tokens,
            moderation: config.content_moderation,
            sanitize: config.sanitize_output,
            retry: RetryPolicy::default(),
        },
    );

    let telegram = Arc::new(TelegramClient::new(Bot::new(&config.telegram_token)));
    let bot_username = telegram.bot_username().await.map_err(anyhow::Error::msg)?;
    info!("Bot username: @{}", bot_username);

    let pipeline = Pipeline::new(
        telegram.clone(),
        SessionStore::new(store.clone(), config.cipher.clone(), config.session_ttl),
        RateLimiter::new(store.clone(), config.rate_limit),
        SecurityLog::new(store.clone()),
        knowledge,
        assistant,
        config.admin_id,
        bot_username,
    );

    let state = Arc::new(HttpState {
        pipeline,
        webhook_secret: config.webhook_secret.clone(),
        store: store.clone(),
        metrics: Metrics::new()?,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.web_port));
    let server = tokio::spawn(http::serve(state, addr, shutdown_signal()));

    if let Some(base) = &config.webhook_url {
        let url = format!("{}/webhook", base.trim_end_matches('/'));
        telegram
            .register_webhook(&url, &config.webhook_secret)
            .await
            .map_err(anyhow::Error::msg)?;
        info!("Webhook configured for {}", url);
    }

    server.await??;
    drop(store);
    info!("Store connection closed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}
