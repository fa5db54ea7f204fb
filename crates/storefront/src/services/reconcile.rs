//! Payment reconciliation.
//!
//! Everything that can change a payment attempt goes through
//! [`Reconciler::apply`]: provider return pages, webhooks, status polls,
//! deposit proofs and admin verdicts read back from the backend. The
//! transition rules themselves live in `tienda_core::payment`.
//!
//! Backend sync needs the customer's token, so attempts changed by a webhook
//! (or the CLI) stay `backend_synced = false` until the customer's next
//! status page view or poll.

use secrecy::SecretString;
use tienda_core::models::PaymentUpdate;
use tienda_core::payment::transition;
use tienda_core::{Observation, PaymentMethod, PaymentStatus, Transition};
use tracing::instrument;

use crate::db::{PaymentAttempt, PaymentAttemptRepository, RepositoryError, StatusChange};
use crate::payments::mercado_pago;
use crate::state::AppState;

/// Compare-and-set retries before giving up on a contended attempt.
const MAX_APPLY_ROUNDS: usize = 3;

/// What a provider check found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCheck {
    pub observation: Observation,
    /// Provider transaction or payment ID, when the answer carried one.
    pub provider_ref: Option<String>,
    /// The provider holds a payment for this attempt that is not final yet.
    /// False when it has nothing on record.
    pub in_flight: bool,
}

impl ProviderCheck {
    #[must_use]
    pub const fn failed() -> Self {
        Self {
            observation: Observation::CheckFailed,
            provider_ref: None,
            in_flight: false,
        }
    }

    /// The provider has no payment for the attempt (yet).
    #[must_use]
    pub const fn nothing_on_record() -> Self {
        Self {
            observation: Observation::ProviderPending,
            provider_ref: None,
            in_flight: false,
        }
    }

    /// The provider answered about a payment it holds.
    #[must_use]
    pub fn reported(observation: Observation, provider_ref: Option<String>) -> Self {
        Self {
            in_flight: observation == Observation::ProviderPending,
            observation,
            provider_ref,
        }
    }
}

/// Applies observations to payment attempts and mirrors them to the backend.
pub struct Reconciler<'a> {
    state: &'a AppState,
}

impl<'a> Reconciler<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn attempts(&self) -> PaymentAttemptRepository<'a> {
        PaymentAttemptRepository::new(self.state.pool())
    }

    /// Apply an observation and persist the result.
    ///
    /// Concurrent changes (a webhook racing a poll) are handled by
    /// re-reading the attempt and re-applying the observation to its new
    /// status. When `token` is given, a change is pushed to the backend.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the attempt cannot be read or written.
    #[instrument(skip(self, attempt, change, token), fields(client_tx = %attempt.client_tx, from = %attempt.status))]
    pub async fn apply(
        &self,
        mut attempt: PaymentAttempt,
        observation: Observation,
        change: StatusChange<'_>,
        token: Option<&SecretString>,
    ) -> Result<PaymentAttempt, RepositoryError> {
        for _ in 0..MAX_APPLY_ROUNDS {
            match transition(attempt.status, observation) {
                Transition::Unchanged => break,
                Transition::Conflict => {
                    tracing::warn!(
                        client_tx = %attempt.client_tx,
                        status = %attempt.status,
                        ?observation,
                        "Provider result contradicts a settled payment"
                    );
                    sentry::capture_message(
                        &format!(
                            "Payment {} is {} but provider reported {observation:?}",
                            attempt.client_tx, attempt.status
                        ),
                        sentry::Level::Warning,
                    );
                    break;
                }
                Transition::Changed(next) => {
                    if let Some(updated) = self
                        .attempts()
                        .transition(attempt.id, attempt.status, next, change)
                        .await?
                    {
                        tracing::info!(
                            client_tx = %updated.client_tx,
                            from = %attempt.status,
                            to = %updated.status,
                            "Payment status changed"
                        );
                        attempt = updated;
                        break;
                    }
                    // Someone else moved it first; start over from what they wrote.
                    attempt = self
                        .attempts()
                        .find_by_client_tx(&attempt.client_tx)
                        .await?
                        .ok_or(RepositoryError::NotFound)?;
                }
            }
        }

        if let Some(token) = token {
            self.sync_backend(&attempt, token).await?;
        }
        Ok(attempt)
    }

    /// Push the attempt's status to the backend order if it is not there yet.
    ///
    /// Backend failures are logged and leave the attempt unsynced.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` only if marking the attempt synced fails.
    pub async fn sync_backend(
        &self,
        attempt: &PaymentAttempt,
        token: &SecretString,
    ) -> Result<(), RepositoryError> {
        if attempt.backend_synced {
            return Ok(());
        }

        let update = PaymentUpdate {
            status: attempt.status,
            method: attempt.method,
            client_transaction_id: attempt.client_tx.to_string(),
            reference: attempt
                .proof_reference
                .clone()
                .or_else(|| attempt.provider_ref.clone()),
            note: attempt.note.clone(),
        };

        match self
            .state
            .backend()
            .update_payment(token, attempt.order_id, &update)
            .await
        {
            Ok(_) => {
                self.attempts()
                    .mark_synced(attempt.id, attempt.status)
                    .await
            }
            Err(e) => {
                tracing::warn!(
                    client_tx = %attempt.client_tx,
                    error = %e,
                    "Backend payment sync failed; will retry on next poll"
                );
                Ok(())
            }
        }
    }

    /// Ask the provider what happened to a provider-verified attempt.
    ///
    /// Failures to reach the provider become [`Observation::CheckFailed`].
    #[instrument(skip(self, attempt), fields(client_tx = %attempt.client_tx, method = %attempt.method))]
    pub async fn check_provider(&self, attempt: &PaymentAttempt) -> ProviderCheck {
        match attempt.method {
            PaymentMethod::PayphonePhone | PaymentMethod::PayphoneLink => {
                self.check_payphone(attempt).await
            }
            PaymentMethod::MercadoPago => self.check_mercado_pago(attempt).await,
            PaymentMethod::CashDeposit | PaymentMethod::CryptoDeposit => {
                ProviderCheck::nothing_on_record()
            }
        }
    }

    async fn check_payphone(&self, attempt: &PaymentAttempt) -> ProviderCheck {
        let Some(payphone) = self.state.payphone() else {
            tracing::error!("Payphone attempt found but Payphone is not configured");
            return ProviderCheck::failed();
        };
        // Card links get a transaction ID only when the customer returns.
        let Some(transaction_id) = attempt
            .provider_ref
            .as_deref()
            .and_then(|r| r.parse::<i64>().ok())
        else {
            return ProviderCheck::nothing_on_record();
        };

        match payphone.sale_status(transaction_id).await {
            Ok(tx) => ProviderCheck::reported(tx.observation(), None),
            Err(e) => {
                tracing::warn!(error = %e, "Payphone status check failed");
                ProviderCheck::failed()
            }
        }
    }

    async fn check_mercado_pago(&self, attempt: &PaymentAttempt) -> ProviderCheck {
        let Some(client) = self.state.mercado_pago() else {
            tracing::error!("Mercado Pago attempt found but Mercado Pago is not configured");
            return ProviderCheck::failed();
        };

        match client.search_payments(&attempt.client_tx).await {
            Ok(payments) => mercado_pago::decisive_payment(&payments).map_or_else(
                ProviderCheck::nothing_on_record,
                |payment| {
                    ProviderCheck::reported(payment.observation(), Some(payment.id.to_string()))
                },
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Mercado Pago status check failed");
                ProviderCheck::failed()
            }
        }
    }

    /// One status poll from the payment page.
    ///
    /// Retries a pending backend sync, checks the provider for pending (or
    /// errored) provider-verified attempts, and expires the attempt once the
    /// poll budget is spent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the attempt cannot be read or written.
    pub async fn poll(
        &self,
        mut attempt: PaymentAttempt,
        token: &SecretString,
    ) -> Result<PaymentAttempt, RepositoryError> {
        self.sync_backend(&attempt, token).await?;

        let checkable = matches!(attempt.status, PaymentStatus::Pending | PaymentStatus::Error);
        if !checkable || !attempt.method.is_provider_verified() {
            return Ok(attempt);
        }

        let polls = self.attempts().record_poll(attempt.id).await?;
        attempt.poll_count = polls;
        let check = self.check_provider(&attempt).await;
        let change = StatusChange {
            provider_ref: check.provider_ref.as_deref(),
            ..StatusChange::default()
        };
        let attempt = self
            .apply(attempt, check.observation, change, Some(token))
            .await?;

        if attempt.status == PaymentStatus::Pending
            && self.state.config().payments.poll.is_exhausted(polls)
        {
            tracing::info!(client_tx = %attempt.client_tx, polls, "Payment polling exhausted");
            return self
                .apply(
                    attempt,
                    Observation::TimedOut,
                    StatusChange {
                        note: Some("No answer from the payment provider in time"),
                        ..StatusChange::default()
                    },
                    Some(token),
                )
                .await;
        }

        Ok(attempt)
    }

    /// Read an admin's verdict on a deposit back from the backend order.
    ///
    /// Backend failures leave the attempt as it is.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the attempt cannot be written.
    pub async fn refresh_admin_verdict(
        &self,
        attempt: PaymentAttempt,
        token: &SecretString,
    ) -> Result<PaymentAttempt, RepositoryError> {
        if attempt.status != PaymentStatus::AwaitingVerification {
            return Ok(attempt);
        }

        let order = match self.state.backend().get_order(token, attempt.order_id).await {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read order for deposit verdict");
                return Ok(attempt);
            }
        };

        let Some(observation) = admin_verdict(order.payment_status) else {
            return Ok(attempt);
        };
        self.apply(attempt, observation, StatusChange::default(), Some(token))
            .await
    }
}

/// The observation an admin's decision on the backend order stands for.
#[must_use]
pub const fn admin_verdict(backend_status: PaymentStatus) -> Option<Observation> {
    match backend_status {
        PaymentStatus::Confirmed => Some(Observation::AdminVerified),
        PaymentStatus::Rejected => Some(Observation::AdminRejected),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_reported_pending_payments_are_in_flight() {
        assert!(ProviderCheck::reported(Observation::ProviderPending, None).in_flight);
        assert!(!ProviderCheck::reported(Observation::ProviderApproved, None).in_flight);
        assert!(!ProviderCheck::nothing_on_record().in_flight);
        assert!(!ProviderCheck::failed().in_flight);
    }

    #[test]
    fn test_admin_verdict() {
        assert_eq!(
            admin_verdict(PaymentStatus::Confirmed),
            Some(Observation::AdminVerified)
        );
        assert_eq!(
            admin_verdict(PaymentStatus::Rejected),
            Some(Observation::AdminRejected)
        );
        assert_eq!(admin_verdict(PaymentStatus::AwaitingVerification), None);
        assert_eq!(admin_verdict(PaymentStatus::Pending), None);
    }

    #[test]
    fn test_admin_verdict_applies_only_to_awaiting_verification() {
        let verified = admin_verdict(PaymentStatus::Confirmed).unwrap_or(Observation::CheckFailed);
        assert_eq!(
            transition(PaymentStatus::AwaitingVerification, verified),
            Transition::Changed(PaymentStatus::Confirmed)
        );
        assert_eq!(
            transition(PaymentStatus::Pending, verified),
            Transition::Unchanged
        );
    }
}
