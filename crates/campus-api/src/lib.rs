pub mod auth;
pub mod chats;
pub mod messages;
pub mod middleware;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use auth::{AppState, AppStateInner};

/// Build the full HTTP surface: public auth routes plus the bearer-protected
/// chat routes.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/user-chats/{user_id}", get(chats::list_user_chats))
        .route("/api/available-users/{user_id}", get(chats::available_users))
        .route("/api/chats", post(chats::create_chat))
        .route("/api/chat-messages/{chat_id}", get(messages::get_messages))
        .route("/api/chat-messages", post(messages::send_message))
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// True if `err` bottoms out in a SQLite constraint violation.
pub(crate) fn is_constraint_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
