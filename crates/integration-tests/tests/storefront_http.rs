//! Storefront HTTP tests against a running server.
//!
//! Run with: cargo test -p tienda-integration-tests -- --ignored

use reqwest::StatusCode;
use tienda_integration_tests::{client, customer_credentials, customer_login, storefront_url};

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_health_and_readiness() {
    let client = client();
    let base = storefront_url();

    let resp = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    let resp = client.get(format!("{base}/health/ready")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server and commerce backend"]
async fn test_catalog_pages_render() {
    let client = client();
    let base = storefront_url();

    let resp = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{base}/products?q=cafe&page=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let html = resp.text().await.unwrap();
    assert!(html.contains("<form"));
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_empty_cart_has_no_badge() {
    let client = client();
    let resp = client
        .get(format!("{}/cart/count", storefront_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!resp.text().await.unwrap().contains("cart-badge"));
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_checkout_requires_login() {
    let resp = client()
        .get(format!("{}/checkout", storefront_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = resp.headers().get("location").unwrap().to_str().unwrap();
    assert!(location.starts_with("/auth/login"));
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_payment_poll_requires_login() {
    let resp = client()
        .get(format!("{}/payments/1-abcdefabcdef/status", storefront_url()))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get("hx-redirect").is_some());
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_webhook_never_errors_on_unknown_payments() {
    let resp = client()
        .post(format!("{}/webhooks/mercadopago", storefront_url()))
        .json(&serde_json::json!({"type": "merchant_order", "data": {"id": "1"}}))
        .send()
        .await
        .unwrap();
    // 200 when the event is ignored, 401 when a secret is configured and
    // the unsigned request is refused.
    assert!(
        resp.status() == StatusCode::OK || resp.status() == StatusCode::UNAUTHORIZED,
        "{}",
        resp.status()
    );
}

#[tokio::test]
#[ignore = "Requires running storefront, commerce backend and STOREFRONT_TEST_EMAIL"]
async fn test_payphone_return_without_details_is_rejected() {
    let Some((email, password)) = customer_credentials() else {
        return;
    };
    let client = client();
    assert!(customer_login(&client, &email, &password).await);

    // Payphone redirected back without its query parameters: answered
    // before any attempt lookup or provider call.
    for query in ["", "?id=123", "?clientTransactionId=1-abc", "?id=x&clientTransactionId=1-abc"] {
        let resp = client
            .get(format!("{}/payments/payphone/return{query}", storefront_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "query {query:?}");
    }
}
