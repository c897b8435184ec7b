use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use delivery_backend::{
    auth::jwt::JwtService, config::AppConfig, db, routes, s3::build_client, state::AppState,
    storage::{ObjectStorage, S3Storage},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        object_store_configured = config.object_store_configured(),
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;

    let storage: Option<Arc<dyn ObjectStorage>> = if config.object_store_configured() {
        let client = build_client(&config).await?;
        Some(Arc::new(S3Storage::new(client)))
    } else {
        tracing::warn!("object store not configured; deletion endpoints will refuse requests");
        None
    };

    let jwt = JwtService::from_config(&config)?;
    let state = AppState::new(pool, config.clone(), storage, jwt);
    let router = routes::create_router(state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "delivery backend listening");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
