use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::Deserialize;
use tokio_stream::Stream;

use super::{check_auth, check_token, events};
use crate::errors::AppError;
use crate::models::{Booking, BookingSearch, BookingStatus, PaymentStatus};
use crate::services::stats::{BookingStats, DashboardStats, ServiceStats};
use crate::state::AppState;

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub payment: Option<String>,
    pub q: Option<String>,
}

impl BookingsQuery {
    /// "all" or an empty value means no filter.
    fn into_search(self) -> Result<BookingSearch, AppError> {
        let status = match self.status.as_deref().filter(|s| !s.is_empty() && *s != "all") {
            Some(raw) => Some(
                BookingStatus::parse(raw)
                    .ok_or_else(|| AppError::Validation(format!("unknown status {raw:?}")))?,
            ),
            None => None,
        };
        let payment = match self.payment.as_deref().filter(|s| !s.is_empty() && *s != "all") {
            Some(raw) => Some(
                PaymentStatus::parse(raw)
                    .ok_or_else(|| AppError::Validation(format!("unknown payment status {raw:?}")))?,
            ),
            None => None,
        };
        Ok(BookingSearch {
            status,
            payment,
            text: self.q,
        })
    }
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let search = query.into_search()?;
    let bookings = state.bookings.list(None).await?;
    Ok(Json(search.apply(bookings)))
}

// POST /api/admin/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(state.bookings.update_status(&id, body.status).await?))
}

// GET /api/admin/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardStats>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let bookings = state.bookings.list(None).await?;
    let services = state.catalog.list(false).await?;
    let partners = state.partners.list().await?;

    Ok(Json(DashboardStats {
        bookings: BookingStats::from_bookings(&bookings),
        services: ServiceStats::from_services(&services),
        partners: partners.len(),
    }))
}

#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
}

// GET /api/admin/bookings/events
pub async fn booking_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    check_token(query.token.as_deref(), &state.config.admin_token)?;

    let (on_update, on_error, rx) = events::forward::<Vec<Booking>>();
    let feed = state.bookings.subscribe(None, on_update, on_error);
    Ok(events::into_sse(rx, "bookings", feed))
}

// GET /api/admin/stats/events
pub async fn stats_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    check_token(query.token.as_deref(), &state.config.admin_token)?;

    let (on_update, on_error, rx) = events::forward::<BookingStats>();
    let feed = state.bookings.subscribe_stats(on_update, on_error);
    Ok(events::into_sse(rx, "booking_stats", feed))
}

// GET /api/admin/services/stats/events
pub async fn service_stats_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    check_token(query.token.as_deref(), &state.config.admin_token)?;

    let (on_update, on_error, rx) = events::forward::<ServiceStats>();
    let feed = state.catalog.subscribe_stats(on_update, on_error);
    Ok(events::into_sse(rx, "service_stats", feed))
}
