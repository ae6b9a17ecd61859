use cryptogame::config::Config;
use cryptogame::services::SqliteStore;
use cryptogame::sources::CoinloreClient;
use cryptogame::{api, AppState};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cryptogame=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!("Starting cryptogame server on {}:{}", config.host, config.port);

    if let Some(dir) = Path::new(&config.database_path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let store = Arc::new(SqliteStore::new(&config.database_path)?);
    info!("Using database at {}", config.database_path);

    let provider = Arc::new(CoinloreClient::new(
        config.coinlore_api_url.clone(),
        config.upstream_timeout,
    ));
    info!(
        "Price cache TTL {}s, upstream timeout {}s",
        config.price_cache_ttl.as_secs(),
        config.upstream_timeout.as_secs()
    );

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, provider, store);

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = api::router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("cryptogame server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
