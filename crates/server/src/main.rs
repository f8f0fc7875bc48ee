use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rental_server::{
    config, db, document::DocumentStore, relational::RelationalStore, routes, state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rental_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;
    tracing::info!(
        "Starting rental server on {}:{}",
        config.server.host,
        config.server.port
    );

    // Open both stores
    let relational = RelationalStore::new(
        db::connect(&config.database.relational_path, &config.database).await?,
    );
    relational.run_migrations().await?;

    let documents = DocumentStore::new(
        db::connect(&config.database.document_path, &config.database).await?,
    );
    documents.init().await?;

    // Create app state
    let state = AppState::new(relational, documents);

    // Build router
    let app = routes::create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
