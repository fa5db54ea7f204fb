//! Checkout token repository tests against `PostgreSQL`.
//!
//! Requires migrated storefront tables (`tienda-cli migrate storefront`).

use chrono::{Duration, Utc};
use tienda_core::UserId;
use tienda_integration_tests::storefront_pool;
use tienda_storefront::db::CheckoutTokenRepository;

#[tokio::test]
#[ignore = "Requires PostgreSQL with storefront migrations"]
async fn test_claims_are_one_time_until_purged() {
    let pool = storefront_pool().await;
    let tokens = CheckoutTokenRepository::new(&pool);
    let token = format!("it-purge-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());

    assert!(tokens.claim(&token, UserId::new(1)).await.unwrap());
    assert!(!tokens.claim(&token, UserId::new(1)).await.unwrap());

    // A cutoff in the past keeps the fresh claim.
    tokens
        .purge_before(Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert!(tokens.find(&token).await.unwrap().is_some());

    let removed = tokens
        .purge_before(Utc::now() + Duration::minutes(1))
        .await
        .unwrap();
    assert!(removed >= 1);
    assert!(tokens.find(&token).await.unwrap().is_none());
}
