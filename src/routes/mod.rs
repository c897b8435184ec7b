use axum::http::HeaderValue;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::state::AppState;

pub mod auth;
pub mod files;
pub mod health;
pub mod projects;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = match state.config.cors_allowed_origin.as_ref() {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|value| {
                    let trimmed = value.trim();
                    (!trimmed.is_empty()).then(|| {
                        trimmed
                            .parse::<HeaderValue>()
                            .expect("invalid CORS allowed origin")
                    })
                })
                .collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(headers))
        }
        None => CorsLayer::new().allow_origin(AllowOrigin::mirror_request()),
    }
    .allow_methods(tower_http::cors::AllowMethods::mirror_request())
    .allow_headers(tower_http::cors::AllowHeaders::mirror_request());

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let file_routes = Router::new()
        .route("/new", post(files::new_file).put(files::replace_file))
        .route("/match", post(files::match_files))
        .route("/info", post(files::file_info))
        .route("/info/all", get(files::file_info_all))
        .route("/update", put(files::update_file))
        .route("/rm", delete(files::remove_files))
        .route("/rmdir", delete(files::remove_folders));

    let project_routes = Router::new().route("/contents", delete(projects::remove_contents));

    Router::new()
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1/file", file_routes)
        .route("/api/v1/files/list", get(files::list_files))
        .nest("/api/v1/proj", project_routes)
        .route("/api/v1/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
}
