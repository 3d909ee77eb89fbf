pub mod cloudinary;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Largest image accepted for upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub url: String,
    pub public_id: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
    /// Delivery URL with automatic format and quality, when the host
    /// supports transformations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized_url: Option<String>,
}

#[async_trait]
pub trait MediaHost: Send + Sync {
    async fn upload(&self, image: &ImageFile, folder: &str) -> Result<UploadResult, AppError>;
}

/// Checked before anything is sent to the media host.
pub fn validate_image(image: &ImageFile) -> Result<(), AppError> {
    if !image.content_type.starts_with("image/") {
        return Err(AppError::Validation(format!(
            "{}: invalid file type {:?}, please upload an image",
            image.file_name, image.content_type
        )));
    }
    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::Validation(format!(
            "{}: file too large, max 5MB allowed",
            image.file_name
        )));
    }
    Ok(())
}

pub async fn upload_image(
    host: &dyn MediaHost,
    image: &ImageFile,
    folder: &str,
) -> Result<UploadResult, AppError> {
    validate_image(image)?;
    tracing::info!(
        file = %image.file_name,
        content_type = %image.content_type,
        size = image.bytes.len(),
        folder,
        "uploading image"
    );
    let result = host.upload(image, folder).await.map_err(|e| {
        tracing::error!(file = %image.file_name, error = %e, "image upload failed");
        e
    })?;
    tracing::info!(url = %result.url, "image uploaded");
    Ok(result)
}

/// Upload photos attached to a booking into `bookings/<id>/images`. Every
/// file is validated before the first upload starts; `on_progress` receives
/// the completed percentage after each file.
pub async fn upload_booking_images<P>(
    host: &dyn MediaHost,
    images: &[ImageFile],
    booking_id: &str,
    mut on_progress: P,
) -> Result<Vec<UploadResult>, AppError>
where
    P: FnMut(f64),
{
    for image in images {
        validate_image(image)?;
    }

    let folder = format!("bookings/{booking_id}/images");
    let mut results = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        results.push(upload_image(host, image, &folder).await?);
        on_progress((index + 1) as f64 / images.len() as f64 * 100.0);
    }
    Ok(results)
}
