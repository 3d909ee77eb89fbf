pub mod admin;
pub mod bookings;
pub mod catalog;
mod events;
pub mod health;
pub mod pages;
pub mod partners;
pub mod uploads;
pub mod users;

use axum::http::HeaderMap;

use crate::errors::AppError;

/// Admin API calls carry `Authorization: Bearer <token>`.
pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    check_token(token, expected_token)
}

/// EventSource can't set headers, so event streams pass the token as a
/// query parameter instead.
pub(crate) fn check_token(token: Option<&str>, expected_token: &str) -> Result<(), AppError> {
    match token {
        Some(token) if token == expected_token => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}
