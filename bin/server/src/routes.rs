//! HTTP routes for the assistants.

use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use brigade_assistants::{AssistantHub, AssistantKind};
use brigade_conversation::{AssistantReply, Thread, ThreadId};
use brigade_core::{AdminId, RestaurantId};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Body of a query request.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub admin_id: String,
    pub message: String,
}

/// Answer to a query.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub thread_id: ThreadId,
    pub response: AssistantReply,
}

fn parse_path(
    restaurant_id: &str,
    kind: &str,
) -> Result<(RestaurantId, AssistantKind), ApiError> {
    Ok((restaurant_id.parse()?, kind.parse()?))
}

async fn query(
    State(hub): State<Arc<AssistantHub>>,
    Path((restaurant_id, kind)): Path<(String, String)>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let (restaurant, kind) = parse_path(&restaurant_id, &kind)?;
    let admin: AdminId = request.admin_id.parse()?;
    let (thread_id, response) = hub
        .query(&restaurant, kind, &admin, &request.message)
        .await?;
    Ok(Json(QueryResponse {
        thread_id,
        response,
    }))
}

async fn get_thread(
    State(hub): State<Arc<AssistantHub>>,
    Path((restaurant_id, kind, admin_id)): Path<(String, String, String)>,
) -> Result<Json<Thread>, ApiError> {
    let (restaurant, kind) = parse_path(&restaurant_id, &kind)?;
    let admin: AdminId = admin_id.parse()?;
    hub.thread(&restaurant, kind, &admin)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::ThreadNotFound {
            thread_id: AssistantHub::thread_id(&restaurant, kind, &admin).to_string(),
        })
}

async fn reset_thread(
    State(hub): State<Arc<AssistantHub>>,
    Path((restaurant_id, kind, admin_id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let (restaurant, kind) = parse_path(&restaurant_id, &kind)?;
    let admin: AdminId = admin_id.parse()?;
    hub.reset(&restaurant, kind, &admin).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}

/// Builds the application router.
pub fn router(hub: Arc<AssistantHub>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/restaurants/{restaurant_id}/assistants/{kind}/query",
            post(query),
        )
        .route(
            "/api/restaurants/{restaurant_id}/assistants/{kind}/threads/{admin_id}",
            get(get_thread).delete(reset_thread),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(hub)
}
