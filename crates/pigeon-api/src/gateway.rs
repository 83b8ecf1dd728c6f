use axum::{
    extract::{State, WebSocketUpgrade, ws::rejection::WebSocketUpgradeRejection},
    http::HeaderMap,
    response::IntoResponse,
};
use serde::Deserialize;

use pigeon_gateway::connection::handle_connection_authenticated;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::middleware::{decode_token, token_from_headers};

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub token: Option<String>,
}

/// GET /gateway. The JWT (query string or Authorization header) is checked
/// before upgrading; unauthenticated sockets are never accepted.
pub async fn upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<GatewayQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let token = query
        .token
        .as_deref()
        .or_else(|| token_from_headers(&headers))
        .ok_or(ApiError::Unauthenticated)?;
    let claims = decode_token(token, &state.jwt_secret)?;
    let ws = ws.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let dispatcher = state.dispatcher.clone();
    Ok(ws.on_upgrade(move |socket| {
        handle_connection_authenticated(socket, dispatcher, claims.sub, claims.username)
    }))
}
