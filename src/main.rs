//! roadmap-tutor server binary.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use roadmap_tutor::cache::store::MemoryContentCache;
use roadmap_tutor::config::{Cli, Config};
use roadmap_tutor::gateway::instrumented::InstrumentedGateway;
use roadmap_tutor::gateway::openai::OpenAiGateway;
use roadmap_tutor::metrics::Metrics;
use roadmap_tutor::server::api::{build_router, AppState};
use roadmap_tutor::session::SessionController;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "roadmap_tutor=debug,tower_http=debug"
    } else {
        "roadmap_tutor=info,tower_http=info"
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("roadmap-tutor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Config::load(&cli.config)?.with_cli_overrides(&cli);
    let config = Arc::new(config);

    info!(
        base_url = %config.gateway.base_url,
        model = %config.gateway.model,
        prefetch = config.prefetch.enabled,
        "Configuration loaded"
    );

    // The backend is unusable without credentials; fail at startup.
    let metrics = Arc::new(Metrics::new()?);
    let backend = Arc::new(OpenAiGateway::from_env(&config.gateway)?);
    let gateway = Arc::new(InstrumentedGateway::new(backend, metrics.clone()));

    let controller = SessionController::new(
        gateway,
        Arc::new(MemoryContentCache::new()),
        metrics,
        config.prefetch.enabled,
    );

    // Build application state.
    let state = Arc::new(AppState {
        controller,
        config: config.clone(),
        start_time: Instant::now(),
    });

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
