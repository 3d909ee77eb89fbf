use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use tokio_stream::Stream;

use super::events;
use super::uploads::read_images;
use crate::errors::AppError;
use crate::models::{Booking, BookingDraft};
use crate::services::media::{self, UploadResult};
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<BookingDraft>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.bookings.create(draft).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    state
        .bookings
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))
}

// GET /api/customers/:id/bookings
pub async fn customer_bookings(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<String>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list(Some(&customer_id)).await?))
}

// GET /api/customers/:id/bookings/events
pub async fn customer_booking_events(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let (on_update, on_error, rx) = events::forward::<Vec<Booking>>();
    let feed = state.bookings.subscribe(Some(&customer_id), on_update, on_error);
    events::into_sse(rx, "bookings", feed)
}

// POST /api/bookings/:id/images
pub async fn upload_booking_images(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Vec<UploadResult>>, AppError> {
    if state.bookings.get(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("booking {id}")));
    }

    let images = read_images(multipart).await?.images;
    if images.is_empty() {
        return Err(AppError::Validation("no image files in request".to_string()));
    }

    let results = media::upload_booking_images(state.media.as_ref(), &images, &id, |percent| {
        tracing::debug!(booking_id = %id, percent, "booking image upload progress");
    })
    .await?;
    Ok(Json(results))
}
