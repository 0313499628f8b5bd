pub mod auth;
pub mod base_points;
pub mod error;
pub mod events;
pub mod game;
pub mod items;
pub mod middleware;
pub mod state;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use serde_json::{Value, json};

pub use error::{ApiError, AuthRejection};
pub use state::{AppState, AppStateInner, Environment};

/// All HTTP routes. Callers add transport layers (CORS, tracing) on top.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verify", get(auth::verify))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/base-points", get(base_points::list_base_points))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/api/auth/account", delete(auth::delete_account))
        .route("/api/game/join", post(game::join_game))
        .route("/api/game/leave", post(game::leave_game))
        .route("/api/game/status", get(game::game_status))
        .route(
            "/api/base-points/mine",
            get(base_points::my_base_points)
                .post(base_points::save_base_point)
                .delete(base_points::delete_base_point),
        )
        .route("/api/base-points/reset", post(base_points::reset_base_points))
        .route("/api/cleanup-lines", post(base_points::cleanup_lines))
        .route("/api/items", get(items::list_items).post(items::add_item))
        .route("/api/items/{item_id}", delete(items::delete_item))
        .route("/api/events", get(events::stream_events))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
