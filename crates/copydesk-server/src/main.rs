mod api;
mod middleware;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use copydesk_pipeline::Pipeline;

use crate::{
    api::{build_app, default_rate_limit_state},
    middleware::AuthState,
    state::{AppState, SessionStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = copydesk_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    let fetcher = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(config.user_agent.clone())
        .build()?;
    let sessions = SessionStore::new();

    spawn_sweeper(
        Arc::clone(&pipeline),
        sessions.clone(),
        config.session_ttl_secs,
        config.sweep_interval_secs,
    );

    let auth = AuthState::from_env(matches!(
        config.env,
        copydesk_core::Environment::Development
    ))?;
    let app = build_app(
        AppState {
            pipeline,
            sessions,
            fetcher,
        },
        auth,
        default_rate_limit_state(),
    );

    tracing::info!(addr = %config.bind_addr, env = %config.env, "starting server");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Periodically drops idle sessions and empty limiter windows.
fn spawn_sweeper(
    pipeline: Arc<Pipeline>,
    sessions: SessionStore,
    session_ttl_secs: u64,
    sweep_interval_secs: u64,
) {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(sweep_interval_secs.max(1)));
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            let expired = sessions.sweep(session_ttl_secs).await;
            let windows = pipeline.limiter().cleanup().await;
            if expired > 0 || windows > 0 {
                tracing::debug!(expired, windows, "swept idle sessions and rate windows");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
