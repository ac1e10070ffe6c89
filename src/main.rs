use anyhow::Context;
use quietwire::{app, config::Config, db, uploads, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quietwire=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let pool = match config.database_url.as_deref() {
        Some(url) => match db::connect(url).await {
            Ok(pool) => {
                tracing::info!("database connected");
                Some(pool)
            }
            Err(err) => {
                tracing::error!(error = %err, "database unavailable, running without persistence");
                None
            }
        },
        None => {
            tracing::warn!("DATABASE_URL not set, running without persistence");
            None
        }
    };

    uploads::prepare_dir(&config.upload_dir).await;

    let port = config.port;
    let app = app(AppState::new(config, pool));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    tracing::info!(port, "server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
    }
}
