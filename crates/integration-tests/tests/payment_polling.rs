//! Status polling against `PostgreSQL` when the provider never answers.
//!
//! Requires migrated storefront tables (`tienda-cli migrate storefront`).
//! The backend and Payphone are pointed at a closed port, so every call to
//! them fails and only the storefront's own bookkeeping is exercised.

use std::collections::HashMap;

use secrecy::SecretString;
use tienda_core::{ClientTransactionId, OrderId, PaymentMethod, PaymentStatus, UserId};
use tienda_integration_tests::{storefront_database_url, storefront_pool};
use tienda_storefront::config::StorefrontConfig;
use tienda_storefront::db::{NewPaymentAttempt, PaymentAttemptRepository};
use tienda_storefront::services::Reconciler;
use tienda_storefront::state::AppState;

fn state(pool: sqlx::PgPool, max_polls: &str) -> AppState {
    let database_url = storefront_database_url();
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DATABASE_URL", database_url.as_str()),
        ("STOREFRONT_BASE_URL", "http://localhost:3000"),
        ("STOREFRONT_SESSION_SECRET", "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%"),
        ("BACKEND_API_URL", "http://127.0.0.1:9/api"),
        ("PAYPHONE_TOKEN", "pp-test"),
        ("PAYPHONE_STORE_ID", "store-1"),
        ("PAYPHONE_API_URL", "http://127.0.0.1:9"),
        ("PAYMENT_POLL_MAX_ATTEMPTS", max_polls),
    ]);
    let config =
        StorefrontConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap();
    AppState::new(config, pool).unwrap()
}

#[tokio::test]
#[ignore = "Requires PostgreSQL with storefront migrations"]
async fn test_polling_expires_attempt_once_exhausted() {
    let pool = storefront_pool().await;
    let state = state(pool.clone(), "2");
    let repo = PaymentAttemptRepository::new(&pool);

    // A card link the customer never completed: Payphone has no
    // transaction on record for it.
    let order_id = OrderId::new(900_101);
    let attempt = repo
        .insert(&NewPaymentAttempt {
            client_tx: ClientTransactionId::generate(order_id),
            order_id,
            user_id: UserId::new(1),
            method: PaymentMethod::PayphoneLink,
            amount_cents: 1500,
        })
        .await
        .unwrap();
    let token = SecretString::from("customer-token".to_string());
    let reconciler = Reconciler::new(&state);

    let attempt = reconciler.poll(attempt, &token).await.unwrap();
    assert_eq!(attempt.status, PaymentStatus::Pending);
    assert_eq!(attempt.poll_count, 1);

    let attempt = reconciler.poll(attempt, &token).await.unwrap();
    assert_eq!(attempt.status, PaymentStatus::Expired);
    assert!(!attempt.backend_synced);

    // Expired is retryable, so later polls leave it alone.
    let attempt = reconciler.poll(attempt, &token).await.unwrap();
    assert_eq!(attempt.status, PaymentStatus::Expired);
}
