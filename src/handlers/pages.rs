use axum::response::Html;

static DESKTOP_ONLY_HTML: &str = include_str!("../web/desktop_only.html");

pub async fn desktop_only() -> Html<&'static str> {
    Html(DESKTOP_ONLY_HTML)
}
