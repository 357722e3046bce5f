//! API Routes
//!
//! Configures the Axum router with the passthrough, batch and
//! observability endpoints.

use axum::{
    extract::Request,
    routing::{any, get},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use super::handlers::{health_handler, root_handler, stats_handler, AppState};
use crate::batch::batch_handler;
use crate::latest::handlers::{
    notes_handler, notes_redirect_handler, version_handler, version_redirect_handler,
    version_svg_handler,
};

/// Routes served to clients and to batch sub-requests alike.
///
/// Each passthrough route is registered with `any` so its handler owns
/// the OPTIONS and 405 behaviour. The batch route is mounted both with and
/// without a trailing slash.
pub fn proxy_routes(state: AppState) -> Router {
    let mut router = Router::new();
    for route in state.config.routes() {
        let handler = state.proxy_handler(&route);
        router = router.route(
            &route.pattern,
            any(move |req: Request| {
                let handler = handler.clone();
                async move { handler.handle(req).await }
            }),
        );
    }

    let mount = state.config.mount();
    let batch = any(batch_handler).layer(CompressionLayer::new());
    router
        .route(&mount, batch.clone())
        .route(&format!("{}/", mount), batch)
        .with_state(state)
}

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `/{host}/1.0/UpgradeCheck/...`, `/{host}/1.0/ReleaseNotes/:idx` - cached passthrough
/// - `/{host}?x=..` - batch
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
/// - `GET /latest/version`, `/latest/notes` and their `/redirect` forms
/// - `GET /latest/version/svg` - version badge
/// - `GET /` - Redirect to the project page
///
/// # Middleware
/// - Request id: generated when missing and echoed back
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .route("/latest/version", get(version_handler))
        .route("/latest/notes", get(notes_handler))
        .route("/latest/version/redirect", get(version_redirect_handler))
        .route("/latest/version/svg", get(version_svg_handler))
        .route("/latest/notes/redirect", get(notes_redirect_handler))
        .with_state(state.clone())
        .merge(proxy_routes(state))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::HOMEPAGE;
    use crate::cache::SystemClock;
    use crate::config::Config;
    use crate::proxy::HttpUpstream;
    use axum::{
        body::Body,
        http::{header, Method, StatusCode},
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let upstream = HttpUpstream::new(Duration::from_secs(1)).unwrap();
        let state = AppState::new(Config::default(), Arc::new(upstream), Arc::new(SystemClock));
        create_router(state)
    }

    async fn send(method: Method, uri: &str) -> axum::response::Response {
        create_test_app()
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = send(Method::GET, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let response = send(Method::GET, "/stats").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["backend"], "cost");
        assert_eq!(json["hits"], 0);
    }

    #[tokio::test]
    async fn test_root_redirects() {
        let response = send(Method::GET, "/").await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], HOMEPAGE);
    }

    #[tokio::test]
    async fn test_options_on_passthrough_route() {
        let response = send(Method::OPTIONS, "/api.kobobooks.com/1.0/ReleaseNotes/5").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "0");
    }

    #[tokio::test]
    async fn test_post_on_passthrough_route() {
        let response = send(Method::POST, "/api.kobobooks.com/1.0/ReleaseNotes/5").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, HEAD, OPTIONS");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = send(Method::GET, "/api.kobobooks.com/1.0/Other").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_batch_parameter_errors() {
        let response = send(Method::GET, "/api.kobobooks.com").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let many = (0..21).map(|i| format!("x={}", i)).collect::<Vec<_>>().join("&");
        let response = send(Method::GET, &format!("/api.kobobooks.com/?{}", many)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(Method::GET, "/api.kobobooks.com?x=a&h=2").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_batch_refuses_recursion() {
        let response = send(Method::GET, "/api.kobobooks.com?x=&x=%2F").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

        let json = body_json(response).await;
        assert_eq!(json[0]["status"], 403);
        assert_eq!(json[1]["status"], 403);
    }

    #[tokio::test]
    async fn test_latest_endpoints_before_any_check() {
        let response = send(Method::GET, "/latest/version").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store, must-revalidate");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"0.0.0");

        let response = send(Method::GET, "/latest/notes/redirect").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_version_badge() {
        let response = send(Method::GET, "/latest/version/svg?fc=%22red%22").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store, must-revalidate");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let svg = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(svg.contains("fill=\"'red'\">0.0.0</text>"));
    }
}
