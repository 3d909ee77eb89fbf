use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{ImageFile, MediaHost, UploadResult};
use crate::errors::AppError;

pub struct CloudinaryUploader {
    cloud_name: String,
    upload_preset: String,
    client: reqwest::Client,
}

/// Delivery-time resize/quality/format options for [`CloudinaryUploader::optimized_url`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transformations {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u32>,
    pub format: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    width: u32,
    height: u32,
    format: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl CloudinaryUploader {
    pub fn new(cloud_name: String, upload_preset: String) -> Self {
        Self {
            cloud_name,
            upload_preset,
            client: reqwest::Client::new(),
        }
    }

    fn ensure_configured(&self) -> Result<(), AppError> {
        if self.cloud_name.is_empty() || self.upload_preset.is_empty() {
            return Err(AppError::Config(
                "CLOUDINARY_CLOUD_NAME and CLOUDINARY_UPLOAD_PRESET must be set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn optimized_url(&self, public_id: &str, transformations: &Transformations) -> String {
        let mut params = vec![];
        if let Some(w) = transformations.width {
            params.push(format!("w_{w}"));
        }
        if let Some(h) = transformations.height {
            params.push(format!("h_{h}"));
        }
        if let Some(q) = transformations.quality {
            params.push(format!("q_{q}"));
        }
        if let Some(f) = &transformations.format {
            params.push(format!("f_{f}"));
        }

        let transform = if params.is_empty() {
            "f_auto,q_auto".to_string()
        } else {
            params.join(",")
        };

        format!(
            "https://res.cloudinary.com/{}/image/upload/{transform}/{public_id}",
            self.cloud_name
        )
    }

    fn to_result(&self, data: UploadResponse) -> UploadResult {
        let optimized_url = self.optimized_url(&data.public_id, &Transformations::default());
        UploadResult {
            url: data.secure_url,
            public_id: data.public_id,
            width: data.width,
            height: data.height,
            format: data.format,
            optimized_url: Some(optimized_url),
        }
    }
}

#[async_trait]
impl MediaHost for CloudinaryUploader {
    async fn upload(&self, image: &ImageFile, folder: &str) -> Result<UploadResult, AppError> {
        self.ensure_configured()?;

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.cloud_name
        );

        let file = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)
            .map_err(|e| AppError::Validation(format!("bad content type: {e}")))?;
        let form = Form::new()
            .part("file", file)
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", folder.to_string());

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Upload(format!("failed to reach Cloudinary: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AppError::Upload(format!("failed to read Cloudinary response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| "upload failed".to_string());
            return Err(AppError::Upload(format!("Cloudinary error ({status}): {message}")));
        }

        let data: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::Upload(format!("failed to parse Cloudinary response: {e}")))?;

        Ok(self.to_result(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploader() -> CloudinaryUploader {
        CloudinaryUploader::new("demo".to_string(), "unsigned".to_string())
    }

    #[test]
    fn test_optimized_url_defaults() {
        assert_eq!(
            uploader().optimized_url("services/ac", &Transformations::default()),
            "https://res.cloudinary.com/demo/image/upload/f_auto,q_auto/services/ac"
        );
    }

    #[test]
    fn test_optimized_url_with_transformations() {
        let t = Transformations {
            width: Some(300),
            height: Some(200),
            quality: Some(80),
            format: Some("webp".to_string()),
        };
        assert_eq!(
            uploader().optimized_url("x", &t),
            "https://res.cloudinary.com/demo/image/upload/w_300,h_200,q_80,f_webp/x"
        );
    }

    #[test]
    fn test_result_carries_optimized_url() {
        let data: UploadResponse = serde_json::from_str(
            r#"{"secure_url":"https://res.cloudinary.com/demo/image/upload/v1/services/ac.png",
                "public_id":"services/ac","width":800,"height":600,"format":"png"}"#,
        )
        .unwrap();
        let result = uploader().to_result(data);
        assert_eq!(result.public_id, "services/ac");
        assert_eq!(
            result.optimized_url.as_deref(),
            Some("https://res.cloudinary.com/demo/image/upload/f_auto,q_auto/services/ac")
        );
    }

    #[tokio::test]
    async fn test_unconfigured_upload_is_config_error() {
        let uploader = CloudinaryUploader::new(String::new(), String::new());
        let image = ImageFile {
            file_name: "a.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        };
        let err = uploader.upload(&image, "services").await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
