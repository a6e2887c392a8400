use axum::{
    extract::Extension,
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::{any, get, post},
    Router,
};
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    app::{health_check, metrics},
    auth::{refresh, sign_in, sign_out, sign_up, social_sign_in},
    media::{upload_media, upload_media_multiple},
};
use crate::proxy::{self, proxy_resource};
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    // Browsers load the UI from the configured app URL; only that origin may
    // call the gateway cross-origin.
    let allowed_origin = state
        .settings
        .backend
        .public_app_url
        .parse::<HeaderValue>()
        .unwrap_or_else(|e| {
            tracing::error!(
                "Invalid CORS origin '{}': {}. Using fallback.",
                state.settings.backend.public_app_url,
                e
            );
            HeaderValue::from_static("*")
        });
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/auth/sign-in", post(sign_in))
        .route("/api/auth/sign-up", post(sign_up))
        .route("/api/auth/sign-out", post(sign_out))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/social", post(social_sign_in))
        .route("/api/proxy/event-medias/upload", post(upload_media))
        .route(
            "/api/proxy/event-medias/upload-multiple",
            post(upload_media_multiple),
        );

    // One route pair per proxied backend resource; the descriptor rides along
    // as a request extension.
    for resource in proxy::RESOURCES {
        let collection = format!("/api/proxy/{}", resource.name);
        let item = format!("/api/proxy/{}/*slug", resource.name);
        router = router
            .route(&collection, any(proxy_resource).layer(Extension(resource)))
            .route(&item, any(proxy_resource).layer(Extension(resource)));
    }

    router
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(cors)
        .with_state(state)
}
