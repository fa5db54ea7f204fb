//! Admin HTTP tests against a running server.
//!
//! Signed-in tests skip themselves when `ADMIN_TEST_EMAIL` and
//! `ADMIN_TEST_PASSWORD` are not set.

use reqwest::StatusCode;
use tienda_integration_tests::{admin_credentials, admin_login, admin_url, client};

#[tokio::test]
#[ignore = "Requires running admin server"]
async fn test_pages_redirect_to_login() {
    let client = client();
    for path in ["/", "/orders", "/products", "/categories", "/users"] {
        let resp = client
            .get(format!("{}{path}", admin_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(resp.headers().get("location").unwrap(), "/auth/login");
    }
}

#[tokio::test]
#[ignore = "Requires running admin server and commerce backend"]
async fn test_bad_credentials_rerender_login() {
    let client = client();
    let resp = client
        .post(format!("{}/auth/login", admin_url()))
        .form(&[("email", "nobody@tienda.ec"), ("password", "wrong-password")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().contains("flash-error"));
}

#[tokio::test]
#[ignore = "Requires running admin server, commerce backend and admin credentials"]
async fn test_signed_in_admin_sees_dashboard_and_lists() {
    let Some((email, password)) = admin_credentials() else {
        return;
    };
    let client = client();
    assert!(admin_login(&client, &email, &password).await);

    let resp = client.get(format!("{}/", admin_url())).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let html = resp.text().await.unwrap();
    assert!(html.contains("Awaiting verification"));
    assert!(html.contains("Recent activity"));

    for path in ["/orders?status=pending", "/products?q=a", "/categories", "/users"] {
        let resp = client
            .get(format!("{}{path}", admin_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires running admin server, commerce backend and admin credentials"]
async fn test_invalid_product_form_shows_errors() {
    let Some((email, password)) = admin_credentials() else {
        return;
    };
    let client = client();
    assert!(admin_login(&client, &email, &password).await);

    let resp = client
        .post(format!("{}/products", admin_url()))
        .form(&[("name", ""), ("price", "1.999"), ("stock", "x")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let html = resp.text().await.unwrap();
    assert!(html.contains("Price"));
    assert!(html.contains("Stock"));
}
