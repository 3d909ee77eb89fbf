use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use crate::errors::AppError;
use crate::feed::Feed;
use crate::models::booking::WARRANTY_DAYS;
use crate::models::{
    decode_all, to_fields, Booking, BookingDraft, BookingStatus, PaymentMethod, PaymentStatus,
    Record, TransitionPolicy,
};
use crate::services::stats::BookingStats;
use crate::store::{server_timestamp, DocumentStore, Fields, Query, StoreError};

/// Validated writes and reads against the `bookings` collection.
pub struct BookingService {
    store: Arc<dyn DocumentStore>,
    policy: TransitionPolicy,
}

impl BookingService {
    pub fn new(store: Arc<dyn DocumentStore>, policy: TransitionPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn create(&self, draft: BookingDraft) -> Result<Booking, AppError> {
        if let Err(msg) = draft.validate() {
            tracing::warn!(customer = %draft.customer_id, "rejected booking draft: {msg}");
            return Err(AppError::Validation(msg));
        }

        let mut fields = booking_fields(&draft).map_err(AppError::write)?;
        fields.insert("status".into(), json!(BookingStatus::Pending));
        fields.insert("paymentStatus".into(), json!(PaymentStatus::Pending));
        fields.insert("paymentMethod".into(), json!(PaymentMethod::Cod));
        fields.insert("createdAt".into(), server_timestamp());

        let doc = self
            .store
            .add(Booking::COLLECTION, fields)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to create booking");
                AppError::write(e)
            })?;

        let booking = Booking::from_document(doc).map_err(AppError::read)?;
        tracing::info!(
            booking_id = %booking.id,
            customer = %booking.customer_id,
            service = %booking.service_name,
            "booking created"
        );
        Ok(booking)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Booking>, AppError> {
        let doc = self
            .store
            .get(Booking::COLLECTION, id)
            .await
            .map_err(|e| {
                tracing::error!(booking_id = %id, error = %e, "failed to load booking");
                AppError::read(e)
            })?;
        doc.map(Booking::from_document)
            .transpose()
            .map_err(AppError::read)
    }

    /// Set a booking's status. Completing a booking marks it paid and starts
    /// its warranty window in the same write.
    ///
    /// The write is conditional on the status that was checked; if another
    /// update lands first the transition is re-checked against the new status.
    pub async fn update_status(&self, id: &str, status: BookingStatus) -> Result<Booking, AppError> {
        loop {
            let current = self
                .get(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

            if current.status == status {
                return Ok(current);
            }

            if !self.policy.allows(current.status, status) {
                tracing::warn!(
                    booking_id = %id,
                    from = current.status.as_str(),
                    to = status.as_str(),
                    "rejected status transition"
                );
                return Err(AppError::InvalidTransition {
                    from: current.status,
                    to: status,
                });
            }

            let mut fields = Fields::new();
            fields.insert("status".into(), json!(status));
            if status == BookingStatus::Completed {
                fields.insert("paymentStatus".into(), json!(PaymentStatus::Paid));
                // Set once; a booking reopened and completed again keeps its
                // original window.
                if current.warranty_valid_until.is_none() {
                    let until = Utc::now() + Duration::days(WARRANTY_DAYS);
                    fields.insert("warrantyValidUntil".into(), json!(until));
                }
            }

            let result = self
                .store
                .update_if(Booking::COLLECTION, id, "status", &json!(current.status), fields)
                .await;
            let doc = match result {
                Ok(doc) => doc,
                Err(StoreError::Conflict { .. }) => {
                    tracing::debug!(booking_id = %id, "status changed underneath update, re-checking");
                    continue;
                }
                Err(e) => {
                    tracing::error!(booking_id = %id, error = %e, "failed to update booking status");
                    return Err(AppError::write(e));
                }
            };

            tracing::info!(
                booking_id = %id,
                from = current.status.as_str(),
                to = status.as_str(),
                "booking status changed"
            );
            return Booking::from_document(doc).map_err(AppError::read);
        }
    }

    /// All bookings, or one customer's, newest first.
    pub async fn list(&self, customer_id: Option<&str>) -> Result<Vec<Booking>, AppError> {
        let query = bookings_query(customer_id);
        let docs = self.store.query(&query).await.map_err(|e| {
            tracing::error!(error = %e, "failed to list bookings");
            AppError::read(e)
        })?;
        decode_all(docs).map_err(AppError::read)
    }

    pub fn subscribe<U, E>(&self, customer_id: Option<&str>, on_update: U, on_error: E) -> Feed<Booking>
    where
        U: FnMut(Vec<Booking>) + Send + 'static,
        E: FnOnce(AppError) + Send + 'static,
    {
        Feed::subscribe(
            Arc::clone(&self.store),
            bookings_query(customer_id),
            on_update,
            on_error,
        )
    }

    /// Dashboard tiles recomputed from every snapshot of all bookings.
    pub fn subscribe_stats<U, E>(&self, mut on_update: U, on_error: E) -> Feed<Booking>
    where
        U: FnMut(BookingStats) + Send + 'static,
        E: FnOnce(AppError) + Send + 'static,
    {
        self.subscribe(
            None,
            move |bookings| on_update(BookingStats::from_bookings(&bookings)),
            on_error,
        )
    }
}

fn bookings_query(customer_id: Option<&str>) -> Query {
    let query = Query::collection(Booking::COLLECTION);
    match customer_id {
        Some(customer) => query.where_eq("customerId", customer),
        None => query,
    }
}

fn booking_fields(draft: &BookingDraft) -> Result<Fields, StoreError> {
    let mut fields = to_fields(draft)?;
    if draft.total_amount.is_none() {
        fields.insert("totalAmount".into(), json!(draft.service_price));
    }
    Ok(fields)
}
