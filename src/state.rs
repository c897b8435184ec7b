use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::jwt::JwtService,
    catalog::CatalogError,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    storage::ObjectStorage,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    /// None when the gateway configuration is incomplete; deletion endpoints
    /// refuse before touching the catalog in that case.
    pub storage: Option<Arc<dyn ObjectStorage>>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        storage: Option<Arc<dyn ObjectStorage>>,
        jwt: JwtService,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            storage,
            jwt,
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }

    pub fn object_store(&self) -> Result<Arc<dyn ObjectStorage>, CatalogError> {
        self.storage.clone().ok_or_else(|| {
            CatalogError::ObjectStoreUnavailable(
                "endpoint URL or credentials not configured".to_string(),
            )
        })
    }
}
