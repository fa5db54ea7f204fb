//! Tienda Storefront library.
//!
//! The storefront binary is a thin wrapper around [`app`]; keeping the
//! router here lets route tests drive it with `tower::ServiceExt::oneshot`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::state::AppState;

/// Directory served under `/static`, relative to the workspace root.
pub const STATIC_DIR: &str = "crates/storefront/static";

/// Build the storefront router with its full middleware stack.
///
/// See [`middleware`] for the layer order.
pub fn app<S>(state: AppState, store: S) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = middleware::create_session_layer(store, state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::csp_nonce_middleware))
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;

    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::config::StorefrontConfig;

    fn test_app() -> Router {
        test_app_with(&[])
    }

    fn test_app_with(extra: &[(&'static str, &'static str)]) -> Router {
        let mut vars: HashMap<&str, &str> = HashMap::from([
            ("DATABASE_URL", "postgres://localhost/tienda_test"),
            ("STOREFRONT_BASE_URL", "http://localhost:3000"),
            ("STOREFRONT_SESSION_SECRET", "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%"),
            ("BACKEND_API_URL", "http://127.0.0.1:9/api"),
        ]);
        vars.extend(extra.iter().copied());
        let config = StorefrontConfig::from_lookup(|key| vars.get(key).map(ToString::to_string))
            .unwrap();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/tienda_test")
            .unwrap();
        let state = AppState::new(config, pool).unwrap();
        app(state, MemoryStore::default())
    }

    fn request(method: &str, uri: &str, body: Body) -> Request<Body> {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
        request
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(request("GET", "/health", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let response = test_app()
            .oneshot(request("GET", "/health", Body::empty()))
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert!(headers.contains_key("content-security-policy"));
        assert!(headers.contains_key("x-request-id"));
        assert!(!headers.contains_key("strict-transport-security"));
    }

    #[tokio::test]
    async fn test_empty_cart_count_fragment() {
        let response = test_app()
            .oneshot(request("GET", "/cart/count", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(!body.contains("cart-badge"));
    }

    #[tokio::test]
    async fn test_checkout_requires_login() {
        let response = test_app()
            .oneshot(request("GET", "/checkout", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/auth/login");
    }

    #[tokio::test]
    async fn test_payment_status_poll_from_htmx_requires_login() {
        let mut req = request("GET", "/payments/1-abc/status", Body::empty());
        req.headers_mut()
            .insert("hx-request", "true".parse().unwrap());
        let response = test_app().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get("hx-redirect").unwrap(), "/auth/login");
    }

    #[tokio::test]
    async fn test_provider_return_requires_login() {
        let response = test_app()
            .oneshot(request(
                "GET",
                "/payments/payphone/return?id=1&clientTransactionId=7-abc",
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/auth/login");
    }

    #[tokio::test]
    async fn test_webhook_ignored_when_mercado_pago_unconfigured() {
        let mut req = request(
            "POST",
            "/webhooks/mercadopago?type=payment&data.id=123",
            Body::from(r#"{"type":"payment","data":{"id":"123"}}"#),
        );
        req.headers_mut()
            .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        let response = test_app().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_webhook_with_bad_signature_is_unauthorized() {
        // Nothing listens on port 9, so reaching the payment lookup would
        // answer 502 instead.
        let app = test_app_with(&[
            ("MERCADOPAGO_ACCESS_TOKEN", "APP_USR-test"),
            ("MERCADOPAGO_WEBHOOK_SECRET", "whsec-test"),
            ("MERCADOPAGO_API_URL", "http://127.0.0.1:9"),
        ]);
        let mut req = request(
            "POST",
            "/webhooks/mercadopago?type=payment&data.id=123",
            Body::from(r#"{"type":"payment","data":{"id":"123"}}"#),
        );
        let headers = req.headers_mut();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        headers.insert("x-signature", "ts=1700000000,v1=deadbeef".parse().unwrap());
        headers.insert("x-request-id", "req-1".parse().unwrap());
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_without_signature_is_unauthorized() {
        let app = test_app_with(&[
            ("MERCADOPAGO_ACCESS_TOKEN", "APP_USR-test"),
            ("MERCADOPAGO_WEBHOOK_SECRET", "whsec-test"),
            ("MERCADOPAGO_API_URL", "http://127.0.0.1:9"),
        ]);
        let req = request(
            "POST",
            "/webhooks/mercadopago?type=payment&data.id=123",
            Body::empty(),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = test_app()
            .oneshot(request("GET", "/no-such-page", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
