use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Address, AddressDraft, ProfileUpdate, UserProfile};
use crate::state::AppState;

// GET /api/users/:uid
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    state
        .users
        .get(&uid)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {uid}")))
}

// PUT /api/users/:uid
pub async fn save_profile(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.users.save(&uid, update).await?))
}

// POST /api/users/ensure
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureRequest {
    pub uid: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
}

pub async fn ensure_profile(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EnsureRequest>,
) -> Result<Json<UserProfile>, AppError> {
    if body.uid.trim().is_empty() {
        return Err(AppError::Validation("uid is required".to_string()));
    }
    let profile = state
        .users
        .ensure(&body.uid, &body.email, &body.display_name)
        .await?;
    Ok(Json(profile))
}

// POST /api/users/:uid/addresses
pub async fn add_address(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Json(draft): Json<AddressDraft>,
) -> Result<(StatusCode, Json<Address>), AppError> {
    let address = state.users.add_address(&uid, draft).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

// DELETE /api/users/:uid/addresses/:address_id
pub async fn remove_address(
    State(state): State<Arc<AppState>>,
    Path((uid, address_id)): Path<(String, String)>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.users.remove_address(&uid, &address_id).await?))
}
