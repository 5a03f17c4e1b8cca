//! WHEP endpoint handlers
//!
//! POST returns 201 with the full SDP answer and a `Location` header for
//! trickle/delete; PATCH takes an SDP fragment of candidates; DELETE tears
//! the session down. Everything requires the bearer token.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use serde_json::json;

use crate::error::AppError;
use crate::session::Role;
use crate::state::AppState;

/// Embedded browser client.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

pub async fn mode(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "mode": state.guest.mode() }))
}

pub async fn guest_config(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "guest": state.guest }))
}

/// CORS preflight for any WHEP path.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn controller_offer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> crate::Result<Response> {
    authorize(&state, &headers)?;
    let (id, answer) = state.registry.attach_controller(body).await?;
    Ok(created_response(&format!("/whep/{id}"), answer))
}

pub async fn controller_trickle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> crate::Result<StatusCode> {
    authorize(&state, &headers)?;
    state.registry.trickle(&id, Role::Controller, &body).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn controller_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> crate::Result<StatusCode> {
    authorize(&state, &headers)?;
    state.registry.detach(&id, Role::Controller).await?;
    Ok(StatusCode::OK)
}

pub async fn viewer_offer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> crate::Result<Response> {
    authorize(&state, &headers)?;
    let (id, answer) = state.registry.attach_viewer(body).await?;
    Ok(created_response(&format!("/whep/view/{id}"), answer))
}

pub async fn viewer_trickle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> crate::Result<StatusCode> {
    authorize(&state, &headers)?;
    state.registry.trickle(&id, Role::Viewer, &body).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn viewer_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> crate::Result<StatusCode> {
    authorize(&state, &headers)?;
    state.registry.detach(&id, Role::Viewer).await?;
    Ok(StatusCode::OK)
}

fn created_response(location: &str, answer: String) -> Response {
    (
        StatusCode::CREATED,
        [
            (header::CONTENT_TYPE, "application/sdp"),
            (header::LOCATION, location),
        ],
        answer,
    )
        .into_response()
}

fn authorize(state: &AppState, headers: &HeaderMap) -> crate::Result<()> {
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Auth)?;
    let expected = format!("Bearer {}", state.token);
    if constant_time_eq(provided, &expected) {
        Ok(())
    } else {
        Err(AppError::Auth)
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (lhs, rhs) in a.iter().zip(b.iter()) {
        diff |= lhs ^ rhs;
    }
    diff == 0
}
