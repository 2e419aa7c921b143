use crate::error::{Error, Result};
use crate::sse::handler::sse_handler;
use crate::AppState;
use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

/// Builds the router exposing the push endpoint on `connection_url`.
///
/// Only GET requests to that path are served; anything else falls through to
/// axum's defaults (404 / 405). A CORS layer is added when `allowed_origins`
/// is not empty.
pub fn define_routes(
    connection_url: &str,
    allowed_origins: &[String],
    app_state: AppState,
) -> Result<Router> {
    if !connection_url.starts_with('/') {
        return Err(Error::configuration(format!(
            "connection URL must start with '/': {connection_url:?}"
        )));
    }

    let router = Router::new()
        .route(connection_url, get(sse_handler))
        .with_state(app_state);

    if allowed_origins.is_empty() {
        return Ok(router);
    }

    Ok(router.layer(cors_layer(allowed_origins)?))
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let origins = allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|_| Error::configuration(format!("invalid CORS origin: {origin:?}")))
        })
        .collect::<Result<Vec<HeaderValue>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::OPTIONS]))
}
