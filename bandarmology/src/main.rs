use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bandarmology::routers::create_routes;
use bandarmology::services::{parse_stream_target, StreamHandle, StreamUpdate};
use bandarmology::{load_config, AppState};

fn spawn_stream_watchers(state: &AppState) -> Vec<StreamHandle> {
    if state.config.stream_symbols.is_empty() {
        return Vec::new();
    }

    let (tx, mut rx) = mpsc::channel::<StreamUpdate>(256);
    let supervisor = state.stream_supervisor();
    let handles = state
        .config
        .stream_symbols
        .iter()
        .map(|entry| {
            let (symbol, instrument) = parse_stream_target(entry);
            supervisor.spawn(&symbol, instrument, tx.clone())
        })
        .collect();

    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            match update {
                StreamUpdate::News(item) => tracing::info!(
                    news_id = %item.id,
                    title = %item.title,
                    sentiment = ?item.sentiment(),
                    "stream news"
                ),
                StreamUpdate::Channel(channel) => tracing::debug!(channel = %channel, "stream channel"),
            }
        }
    });

    handles
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bandarmology=info,warn"));
    let (file_layer, _guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "bandarmology.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().json().with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(file_layer)
        .init();

    let addr: SocketAddr = config.bind_addr.parse()?;
    let state = AppState::from_config(config)?;
    let watchers = spawn_stream_watchers(&state);

    let app = create_routes(state);
    tracing::info!(%addr, "server listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for watcher in watchers {
        let symbol = watcher.symbol().to_string();
        if let Err(e) = watcher.shutdown().await {
            tracing::warn!(symbol = %symbol, error = %e, "stream watcher ended with error");
        }
    }

    Ok(())
}
