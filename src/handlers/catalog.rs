use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::Deserialize;
use tokio_stream::Stream;

use super::{check_auth, events};
use crate::errors::AppError;
use crate::models::{Service, ServiceDraft, ServicePatch};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ServicesQuery {
    /// Defaults to the customer-facing view.
    pub active: Option<bool>,
}

// GET /api/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ServicesQuery>,
) -> Result<Json<Vec<Service>>, AppError> {
    let only_active = query.active.unwrap_or(true);
    Ok(Json(state.catalog.list(only_active).await?))
}

// GET /api/services/events
pub async fn service_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ServicesQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (on_update, on_error, rx) = events::forward::<Vec<Service>>();
    let feed = state
        .catalog
        .subscribe(query.active.unwrap_or(true), on_update, on_error);
    events::into_sse(rx, "services", feed)
}

// GET /api/services/:id
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Service>, AppError> {
    state
        .catalog
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("service {id}")))
}

// POST /api/admin/services
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(draft): Json<ServiceDraft>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let service = state.catalog.create(draft).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

// PATCH /api/admin/services/:id
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<ServicePatch>,
) -> Result<Json<Service>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(state.catalog.update(&id, patch).await?))
}

// POST /api/admin/services/:id/active
#[derive(Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

pub async fn set_service_active(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ActiveRequest>,
) -> Result<Json<Service>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(state.catalog.set_active(&id, body.active).await?))
}
