//! Dashboard page and static asset serving.
//!
//! Handles the reserved `/dashboard` and `/static/*` paths by reading
//! files from the configured static directory. Requests whose path would
//! escape that directory are rejected.

use std::path::Path;

use hyper::{Response, StatusCode};
use tracing::debug;

use crate::error::full_body;
use crate::BoxBody;

/// Serves the dashboard page (`dashboard.html` in the static directory).
pub async fn serve_dashboard(static_dir: &Path) -> Response<BoxBody> {
    serve_file(&static_dir.join("dashboard.html"), "text/html; charset=utf-8").await
}

/// Serves a file under the static directory for a `/static/*` request.
///
/// `req_path` is the full request path including the `/static/` prefix.
pub async fn serve_static(static_dir: &Path, req_path: &str) -> Response<BoxBody> {
    let relative = req_path.trim_start_matches("/static/");

    if relative.is_empty() || !is_safe_path(relative) {
        return plain_response(StatusCode::FORBIDDEN, "forbidden");
    }

    let path = static_dir.join(relative);
    serve_file(&path, content_type_for(relative)).await
}

async fn serve_file(path: &Path, content_type: &'static str) -> Response<BoxBody> {
    match tokio::fs::read(path).await {
        Ok(contents) => Response::builder()
            .status(StatusCode::OK)
            .header("content-type", content_type)
            .body(full_body(contents))
            .unwrap_or_else(|_| plain_response(StatusCode::INTERNAL_SERVER_ERROR, "")),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "static file not served");
            plain_response(StatusCode::NOT_FOUND, "not found")
        }
    }
}

fn plain_response(status: StatusCode, body: &'static str) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain")
        .body(full_body(body))
        .expect("building plain response must not fail")
}

/// Rejects any relative path that could escape the static directory.
fn is_safe_path(relative: &str) -> bool {
    !relative.starts_with('/')
        && relative
            .split('/')
            .all(|component| !component.is_empty() && component != "..")
}

/// Maps a file name to its `Content-Type` by extension.
fn content_type_for(name: &str) -> &'static str {
    match name.rsplit('.').next() {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
