use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{device_gate, DESKTOP_ONLY_PATH};
use crate::services::media::MAX_IMAGE_BYTES;
use crate::state::AppState;

/// Room for one maximum-size image plus multipart framing.
const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 1024 * 1024;
const BOOKING_IMAGES_BODY_LIMIT: usize = 4 * UPLOAD_BODY_LIMIT;

pub fn router(state: Arc<AppState>) -> Router {
    let device_gate_enabled = state.config.device_gate;

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route(DESKTOP_ONLY_PATH, get(handlers::pages::desktop_only))
        // customer
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/images",
            post(handlers::bookings::upload_booking_images)
                .layer(DefaultBodyLimit::max(BOOKING_IMAGES_BODY_LIMIT)),
        )
        .route(
            "/api/customers/:id/bookings",
            get(handlers::bookings::customer_bookings),
        )
        .route(
            "/api/customers/:id/bookings/events",
            get(handlers::bookings::customer_booking_events),
        )
        .route("/api/services", get(handlers::catalog::list_services))
        .route("/api/services/events", get(handlers::catalog::service_events))
        .route("/api/services/:id", get(handlers::catalog::get_service))
        .route("/api/partners", get(handlers::partners::list_partners))
        .route("/api/partners/events", get(handlers::partners::partner_events))
        .route("/api/users/ensure", post(handlers::users::ensure_profile))
        .route(
            "/api/users/:uid",
            get(handlers::users::get_profile).put(handlers::users::save_profile),
        )
        .route(
            "/api/users/:uid/addresses",
            post(handlers::users::add_address),
        )
        .route(
            "/api/users/:uid/addresses/:address_id",
            delete(handlers::users::remove_address),
        )
        // admin
        .route("/api/admin/bookings", get(handlers::admin::get_bookings))
        .route(
            "/api/admin/bookings/events",
            get(handlers::admin::booking_events),
        )
        .route(
            "/api/admin/bookings/:id/status",
            post(handlers::admin::update_booking_status),
        )
        .route("/api/admin/stats", get(handlers::admin::get_stats))
        .route("/api/admin/stats/events", get(handlers::admin::stats_events))
        .route(
            "/api/admin/services/stats/events",
            get(handlers::admin::service_stats_events),
        )
        .route("/api/admin/services", post(handlers::catalog::create_service))
        .route(
            "/api/admin/services/:id",
            patch(handlers::catalog::update_service),
        )
        .route(
            "/api/admin/services/:id/active",
            post(handlers::catalog::set_service_active),
        )
        .route("/api/admin/partners", post(handlers::partners::create_partner))
        .route(
            "/api/admin/partners/:id",
            patch(handlers::partners::update_partner),
        )
        .route(
            "/api/admin/partners/:id/suspend",
            post(handlers::partners::suspend_partner),
        )
        .route(
            "/api/admin/partners/:id/reinstate",
            post(handlers::partners::reinstate_partner),
        )
        .route(
            "/api/admin/uploads",
            post(handlers::uploads::upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .with_state(state);

    let app = if device_gate_enabled {
        app.layer(axum::middleware::from_fn(device_gate))
    } else {
        app
    };

    app.layer(TraceLayer::new_for_http())
}
