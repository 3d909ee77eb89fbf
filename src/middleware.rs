use axum::extract::Request;
use axum::http::header::USER_AGENT;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

pub const DESKTOP_ONLY_PATH: &str = "/desktop-only";

const MOBILE_MARKERS: [&str; 8] = [
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

pub fn is_mobile(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    MOBILE_MARKERS.iter().any(|marker| ua.contains(marker))
}

/// API calls, framework assets and anything that looks like a file are
/// never redirected.
pub fn is_excluded_path(path: &str) -> bool {
    path == DESKTOP_ONLY_PATH
        || path == "/health"
        || path.starts_with("/api")
        || path.starts_with("/_next")
        || path.starts_with("/static")
        || path.contains('.')
}

/// Sends desktop browsers to the desktop-only page; the customer app is
/// mobile-only.
pub async fn device_gate(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    if is_excluded_path(&path) {
        return next.run(request).await;
    }

    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if is_mobile(user_agent) {
        return next.run(request).await;
    }

    tracing::debug!(path = %path, "redirecting non-mobile client");
    Redirect::temporary(DESKTOP_ONLY_PATH).into_response()
}
