use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use mmbridge::config::BridgeConfig;
use mmbridge::mattermost::client::{DirectoryClient, RetryPolicy};
use mmbridge::mattermost::stream::WsConnector;
use mmbridge::routes;
use mmbridge::services::connection::{ConnectionManager, ReconnectPolicy};
use mmbridge::services::forwarder::{ForwardQueue, Forwarder, spawn_forward_worker};
use mmbridge::state::AppState;

#[tokio::main]
async fn main() {
    // A missing .env file is normal outside local development.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BridgeConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "configuration invalid");
        std::process::exit(1);
    });
    let timeout = Duration::from_secs(config.service.http_timeout_secs);

    let directory = DirectoryClient::new(
        &config.mattermost.api_url,
        config.mattermost.bot_token.clone(),
        timeout,
        RetryPolicy::default(),
    )
    .expect("directory client init failed");
    let state = AppState::new(
        Arc::new(directory),
        config.mattermost.bot_user_id.clone(),
        &config.service.api_key,
    );
    if state.bot_user_id.is_none() {
        tracing::warn!("BOT_USER_ID not set; own messages are not filtered and DM replies are disabled");
    }

    let forwarder = Forwarder::new(
        config.webhook.url.clone(),
        config.webhook.secret.clone(),
        timeout,
        state.users.clone(),
    )
    .expect("webhook client init failed");
    let (queue, queue_rx) = ForwardQueue::channel(config.service.forward_queue_capacity);
    let (worker_shutdown, worker_shutdown_rx) = watch::channel(false);
    let worker = spawn_forward_worker(Arc::new(forwarder), queue_rx, worker_shutdown_rx);

    let connector = WsConnector::new(
        &config.mattermost.ws_url,
        config.mattermost.bot_token.clone(),
        Duration::from_secs(config.mattermost.stream_idle_timeout_secs),
    );
    let connection = ConnectionManager::new(
        Arc::new(connector),
        queue,
        config.mattermost.bot_user_id.clone(),
        ReconnectPolicy::default(),
    );
    connection.start().await;

    let app = routes::app(state);
    let port = config.service.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "mmbridge listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    connection.stop().await;
    let _ = worker_shutdown.send(true);
    if let Err(e) = worker.await {
        tracing::error!(error = %e, "forward worker failed");
    }
    tracing::info!("mmbridge stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
