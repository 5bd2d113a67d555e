pub mod auth;
pub mod donations;
pub mod error;
pub mod middleware;
pub mod notifications;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AppState;
use crate::middleware::require_auth;

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/donations", post(donations::create_donation).get(donations::list_donations))
        .route(
            "/donations/{id}",
            get(donations::get_donation).delete(donations::delete_donation),
        )
        .route("/donations/{id}/claim", post(donations::claim))
        .route("/donations/{id}/unclaim", post(donations::unclaim))
        .route("/donations/{id}/pickup", post(donations::confirm_pickup))
        .route("/donations/{id}/pickup/undo", post(donations::undo_pickup))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/delete", post(notifications::delete_many))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/notifications/{id}", delete(notifications::delete_one))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
