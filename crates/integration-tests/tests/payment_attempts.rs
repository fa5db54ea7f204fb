//! Payment attempt repository tests against `PostgreSQL`.
//!
//! Requires migrated storefront tables (`tienda-cli migrate storefront`).

use chrono::{Duration, Utc};
use tienda_core::{ClientTransactionId, OrderId, PaymentMethod, PaymentStatus, UserId};
use tienda_integration_tests::storefront_pool;
use tienda_storefront::db::{
    NewPaymentAttempt, PaymentAttemptRepository, RepositoryError, StatusChange,
};

fn new_attempt(order: i64) -> NewPaymentAttempt {
    let order_id = OrderId::new(order);
    NewPaymentAttempt {
        client_tx: ClientTransactionId::generate(order_id),
        order_id,
        user_id: UserId::new(1),
        method: PaymentMethod::CashDeposit,
        amount_cents: 4200,
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL with storefront migrations"]
async fn test_insert_and_find() {
    let pool = storefront_pool().await;
    let repo = PaymentAttemptRepository::new(&pool);

    let new = new_attempt(900_001);
    let attempt = repo.insert(&new).await.unwrap();
    assert_eq!(attempt.status, PaymentStatus::Pending);
    assert!(!attempt.backend_synced);

    let found = repo.find_by_client_tx(&new.client_tx).await.unwrap().unwrap();
    assert_eq!(found.id, attempt.id);

    assert!(matches!(
        repo.insert(&new).await,
        Err(RepositoryError::Conflict(_))
    ));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL with storefront migrations"]
async fn test_transition_is_compare_and_set() {
    let pool = storefront_pool().await;
    let repo = PaymentAttemptRepository::new(&pool);
    let attempt = repo.insert(&new_attempt(900_002)).await.unwrap();

    let change = StatusChange {
        proof_reference: Some("DEP-1234"),
        ..StatusChange::default()
    };
    let moved = repo
        .transition(
            attempt.id,
            PaymentStatus::Pending,
            PaymentStatus::AwaitingVerification,
            change,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.proof_reference.as_deref(), Some("DEP-1234"));

    // A second writer still expecting Pending loses.
    let lost = repo
        .transition(
            attempt.id,
            PaymentStatus::Pending,
            PaymentStatus::Error,
            StatusChange::default(),
        )
        .await
        .unwrap();
    assert!(lost.is_none());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL with storefront migrations"]
async fn test_expire_only_touches_old_pending_attempts() {
    let pool = storefront_pool().await;
    let repo = PaymentAttemptRepository::new(&pool);
    let attempt = repo.insert(&new_attempt(900_003)).await.unwrap();

    // Cutoff in the past: the fresh attempt stays pending.
    let expired = repo
        .expire_pending_before(Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert!(expired.iter().all(|a| a.id != attempt.id));

    // Cutoff in the future: it expires.
    let expired = repo
        .expire_pending_before(Utc::now() + Duration::minutes(1))
        .await
        .unwrap();
    assert!(expired.iter().any(|a| a.id == attempt.id));

    let listed = repo.list(Some(PaymentStatus::Expired), 500).await.unwrap();
    assert!(listed.iter().any(|a| a.id == attempt.id));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL with storefront migrations"]
async fn test_concurrent_retries_supersede_once() {
    let pool = storefront_pool().await;
    let repo = PaymentAttemptRepository::new(&pool);
    let first = repo.insert(&new_attempt(900_004)).await.unwrap();
    let failed = repo
        .transition(
            first.id,
            PaymentStatus::Pending,
            PaymentStatus::Error,
            StatusChange::default(),
        )
        .await
        .unwrap()
        .unwrap();

    let (attempt_a, attempt_b) = (new_attempt(900_004), new_attempt(900_004));
    let (a, b) = tokio::join!(
        repo.insert_superseding(&failed, &attempt_a),
        repo.insert_superseding(&failed, &attempt_b),
    );
    let winners: Vec<_> = [a.unwrap(), b.unwrap()].into_iter().flatten().collect();
    assert_eq!(winners.len(), 1);

    let replaced = repo
        .find_by_client_tx(&failed.client_tx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(replaced.superseded_by, Some(winners[0].id));

    // The loser's row was rolled back with its transaction.
    let latest = repo
        .latest_for_order(failed.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, winners[0].id);

    // A third retry of the same failed attempt is refused.
    let again = repo
        .insert_superseding(&failed, &new_attempt(900_004))
        .await
        .unwrap();
    assert!(again.is_none());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL with storefront migrations"]
async fn test_provider_details_return_the_row_to_sync() {
    let pool = storefront_pool().await;
    let repo = PaymentAttemptRepository::new(&pool);
    let attempt = repo.insert(&new_attempt(900_005)).await.unwrap();
    repo.mark_synced(attempt.id, PaymentStatus::Pending)
        .await
        .unwrap();

    let updated = repo
        .set_provider_details(attempt.id, Some("pp-777"), Some("https://pay.example/777"))
        .await
        .unwrap();
    assert_eq!(updated.provider_ref.as_deref(), Some("pp-777"));
    assert_eq!(updated.redirect_url.as_deref(), Some("https://pay.example/777"));
    // The backend has not seen the new reference yet.
    assert!(!updated.backend_synced);

    repo.mark_synced(attempt.id, PaymentStatus::Pending)
        .await
        .unwrap();
    let same = repo
        .set_provider_details(attempt.id, Some("pp-777"), None)
        .await
        .unwrap();
    assert!(same.backend_synced);
}
