use std::env;

use crate::models::TransitionPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub cloudinary_cloud_name: String,
    pub cloudinary_upload_preset: String,
    pub transition_policy: TransitionPolicy,
    pub device_gate: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let transition_policy = match env::var("BOOKING_TRANSITIONS") {
            Ok(raw) => TransitionPolicy::parse(&raw).unwrap_or_else(|| {
                tracing::warn!("unknown BOOKING_TRANSITIONS={raw:?}, using strict");
                TransitionPolicy::Strict
            }),
            Err(_) => TransitionPolicy::Strict,
        };

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "homefix.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            cloudinary_cloud_name: env::var("CLOUDINARY_CLOUD_NAME").unwrap_or_default(),
            cloudinary_upload_preset: env::var("CLOUDINARY_UPLOAD_PRESET").unwrap_or_default(),
            transition_policy,
            device_gate: env::var("DEVICE_GATE")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off"))
                .unwrap_or(true),
        }
    }
}
