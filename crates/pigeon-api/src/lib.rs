pub mod auth;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod groups;
pub mod messages;
pub mod middleware;
pub mod users;

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use pigeon_db::Database;
use pigeon_gateway::dispatcher::Dispatcher;

use crate::error::ApiError;
use crate::middleware::require_auth;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub dispatcher: Dispatcher,
}

/// All HTTP routes. CORS and tracing layers are added by the server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/gateway", get(gateway::upgrade));

    let protected_routes = Router::new()
        .route("/users/me", get(users::me))
        .route("/friends", get(users::list_friends))
        .route("/search_users", get(users::search_users))
        .route("/users/add-friend", post(users::add_friend))
        .route("/add_friend", post(users::add_friend))
        .route("/groups", get(groups::list_groups))
        .route("/groups/create", post(groups::create_group))
        .route("/group/{group_id}", get(groups::get_group))
        .route("/groups/{group_id}", get(groups::get_group))
        .route("/groups/{group_id}/add_user", post(groups::add_member))
        .route("/messages", post(messages::send_message))
        .route("/messages/{conversation_id}", get(messages::get_conversation))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Run blocking SQLite (and password hashing) work off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db)).await?
}
