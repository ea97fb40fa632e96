use axum::{
    body::Body,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "datakult-ui/dist"]
struct UiAssets;

const INDEX: &str = "index.html";

/// Serves the embedded UI shell. Unknown paths fall back to index.html so
/// client-side routes deep-link correctly.
pub async fn serve_asset(uri: Uri) -> Response {
    let requested = uri.path().trim_start_matches('/');

    if !requested.is_empty()
        && let Some(response) = embedded_file(requested)
    {
        return response;
    }

    embedded_file(INDEX)
        .unwrap_or_else(|| (StatusCode::NOT_FOUND, "404 Not Found").into_response())
}

fn embedded_file(path: &str) -> Option<Response> {
    let file = UiAssets::get(path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    // Vite emits content-hashed filenames under assets/, safe to cache hard.
    let cache_control = if path.starts_with("assets/") {
        "public, max-age=31536000, immutable"
    } else {
        "no-cache"
    };

    Some(
        (
            [
                (header::CONTENT_TYPE, mime.as_ref()),
                (header::CACHE_CONTROL, cache_control),
            ],
            Body::from(file.data),
        )
            .into_response(),
    )
}
