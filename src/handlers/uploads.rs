use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;

use super::check_auth;
use crate::errors::AppError;
use crate::services::media::{self, ImageFile, UploadResult};
use crate::state::AppState;

const DEFAULT_FOLDER: &str = "services";

/// Files and the optional `folder` text field of a multipart upload.
pub(crate) struct UploadForm {
    pub images: Vec<ImageFile>,
    pub folder: Option<String>,
}

pub(crate) async fn read_images(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm {
        images: vec![],
        folder: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("folder") {
            let folder = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("unreadable folder field: {e}")))?;
            form.folder = Some(folder);
            continue;
        }

        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("{file_name}: unreadable file: {e}")))?;

        form.images.push(ImageFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Ok(form)
}

// POST /api/admin/uploads
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<UploadResult>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let form = read_images(multipart).await?;
    let folder = form
        .folder
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FOLDER.to_string());
    let image = match <[ImageFile; 1]>::try_from(form.images) {
        Ok([image]) => image,
        Err(images) => {
            return Err(AppError::Validation(format!(
                "expected exactly one image file, got {}",
                images.len()
            )))
        }
    };

    let result = media::upload_image(state.media.as_ref(), &image, &folder).await?;
    Ok(Json(result))
}
