pub mod auth;
pub mod capsules;
pub mod error;
pub mod media;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full HTTP surface. Everything except `/auth/*` and `/health`
/// sits behind the bearer-token middleware.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health));

    let media_routes = Router::new()
        .route("/media", post(media::upload_media))
        .route("/media/{media_id}", get(media::download_media))
        .layer(DefaultBodyLimit::max(media::MAX_MEDIA_BYTES));

    let protected_routes = Router::new()
        .route(
            "/capsules",
            post(capsules::create_capsule).get(capsules::list_capsules),
        )
        .route(
            "/capsules/{capsule_id}",
            get(capsules::get_capsule).delete(capsules::delete_capsule),
        )
        .route("/capsules/{capsule_id}/check", post(capsules::check_capsule))
        .route("/capsules/{capsule_id}/open", post(capsules::open_capsule))
        .merge(media_routes)
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
