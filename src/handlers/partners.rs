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
use crate::models::{Partner, PartnerDraft, PartnerPatch, PartnerStatus};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PartnersQuery {
    pub service: Option<String>,
}

// GET /api/partners
pub async fn list_partners(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PartnersQuery>,
) -> Result<Json<Vec<Partner>>, AppError> {
    let partners = match query.service.as_deref().filter(|s| !s.is_empty()) {
        Some(service_id) => state.partners.list_by_service(service_id).await?,
        None => state.partners.list().await?,
    };
    Ok(Json(partners))
}

// GET /api/partners/events
pub async fn partner_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (on_update, on_error, rx) = events::forward::<Vec<Partner>>();
    let feed = state.partners.subscribe(on_update, on_error);
    events::into_sse(rx, "partners", feed)
}

// POST /api/admin/partners
pub async fn create_partner(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(draft): Json<PartnerDraft>,
) -> Result<(StatusCode, Json<Partner>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let partner = state.partners.create(draft).await?;
    Ok((StatusCode::CREATED, Json(partner)))
}

// PATCH /api/admin/partners/:id
pub async fn update_partner(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<PartnerPatch>,
) -> Result<Json<Partner>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(state.partners.update(&id, patch).await?))
}

// POST /api/admin/partners/:id/suspend
pub async fn suspend_partner(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Partner>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(state.partners.set_status(&id, PartnerStatus::Suspended).await?))
}

// POST /api/admin/partners/:id/reinstate
pub async fn reinstate_partner(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Partner>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(state.partners.set_status(&id, PartnerStatus::Active).await?))
}
