use std::sync::Arc;
use tengen::{
    build_state, create_router,
    matchmaking::{start_sweep_task, SweepConfig},
    AppConfig,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tengen=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tengen game server");

    let config = AppConfig::from_env();
    let persistence = if config.database_url.is_some() {
        "postgres"
    } else {
        "memory"
    };
    info!(
        persistence,
        sweep_interval_secs = config.sweep_interval.as_secs(),
        scoring = %config.ruleset.scoring,
        komi = config.ruleset.komi,
        "Configuration loaded"
    );

    let app_state = build_state(&config).await?;

    tokio::spawn(start_sweep_task(
        Arc::clone(&app_state.match_queue),
        SweepConfig {
            sweep_interval: config.sweep_interval,
        },
    ));

    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(bind_addr = %config.bind_addr, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
