//! Payment status and provider return handlers.
//!
//! The status page is the single place a customer lands after paying,
//! whether they come back from a provider, closed the provider's window, or
//! just reloaded. Every handler here is safe to repeat.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tienda_core::{
    ClientTransactionId, Money, Observation, PaymentMethod, PaymentPhase, PaymentStatus,
    PollDecision, PollPolicy,
};
use tower_sessions::Session;
use tracing::instrument;

use crate::config::{CryptoWallet, DepositAccount};
use crate::db::{PaymentAttempt, PaymentAttemptRepository, StatusChange};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth, set_flash};
use crate::models::{CurrentCustomer, Flash};
use crate::payments::MercadoPagoError;
use crate::services::checkout::status_path;
use crate::services::{CheckoutError, CheckoutService, Reconciler};
use crate::state::AppState;

/// Payment status page template.
#[derive(Template, WebTemplate)]
#[template(path = "payments/show.html")]
pub struct PaymentTemplate {
    pub ctx: PageContext,
    pub attempt: PaymentAttempt,
    pub phase: PaymentPhase,
    pub message: &'static str,
    /// Render the polling element.
    pub poll: bool,
    pub poll_secs: u64,
    pub can_retry: bool,
    pub show_proof_form: bool,
    /// Hosted provider page to reopen if the customer closed it.
    pub resume_url: Option<String>,
    pub deposit: Option<DepositAccount>,
    pub crypto: Option<CryptoWallet>,
}

impl PaymentTemplate {
    fn is_method(&self, method: PaymentMethod) -> bool {
        self.attempt.method == method
    }

    /// Whether this attempt pays by cash deposit.
    #[must_use]
    pub fn is_cash(&self) -> bool {
        self.is_method(PaymentMethod::CashDeposit)
    }

    /// Whether this attempt pays by Payphone push.
    #[must_use]
    pub fn is_phone_push(&self) -> bool {
        self.is_method(PaymentMethod::PayphonePhone)
    }

    #[must_use]
    pub fn is_awaiting_verification(&self) -> bool {
        self.attempt.status == PaymentStatus::AwaitingVerification
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.attempt.status == PaymentStatus::Expired
    }
}

/// Polling fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/payment_poll.html")]
pub struct PaymentPollTemplate {
    pub client_tx: String,
    pub poll_secs: u64,
}

/// Query parameters Payphone appends to the response URL.
#[derive(Debug, Deserialize)]
pub struct PayphoneReturnQuery {
    pub id: Option<String>,
    #[serde(rename = "clientTransactionId")]
    pub client_transaction_id: Option<String>,
}

/// Query parameters Mercado Pago appends to the back URLs.
#[derive(Debug, Deserialize)]
pub struct MercadoPagoReturnQuery {
    pub payment_id: Option<String>,
    /// Reported but never trusted; the payment is always fetched.
    pub status: Option<String>,
    pub external_reference: Option<String>,
}

/// Deposit proof form data.
#[derive(Debug, Default, Deserialize)]
pub struct ProofForm {
    #[serde(default)]
    pub bank: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub tx_hash: String,
}

/// Retry form data.
#[derive(Debug, Default, Deserialize)]
pub struct RetryForm {
    #[serde(default)]
    pub payphone_phone: String,
}

/// A validated deposit proof.
#[derive(Debug, PartialEq, Eq)]
struct Proof {
    reference: String,
    note: String,
}

// =============================================================================
// Helpers
// =============================================================================

/// Find an attempt that belongs to `customer`.
///
/// Unknown, malformed and foreign identifiers all look the same.
async fn owned_attempt(
    state: &AppState,
    customer: &CurrentCustomer,
    raw_client_tx: &str,
) -> Result<PaymentAttempt> {
    let not_found = || AppError::NotFound("that payment".to_string());
    let client_tx = ClientTransactionId::parse(raw_client_tx).map_err(|_| not_found())?;
    let attempt = PaymentAttemptRepository::new(state.pool())
        .find_by_client_tx(&client_tx)
        .await?
        .ok_or_else(not_found)?;

    if attempt.user_id != customer.id {
        tracing::warn!(%client_tx, user_id = %customer.id, "Payment requested by another customer");
        return Err(not_found());
    }
    Ok(attempt)
}

/// Like [`owned_attempt`] but for provider returns, where a missing or
/// foreign transaction is a bad request rather than a missing page.
async fn returned_attempt(
    state: &AppState,
    customer: &CurrentCustomer,
    raw_client_tx: &str,
) -> Result<PaymentAttempt> {
    owned_attempt(state, customer, raw_client_tx)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::BadRequest("Unknown transaction.".to_string()),
            other => other,
        })
}

fn should_poll(attempt: &PaymentAttempt) -> bool {
    attempt.status == PaymentStatus::Pending && attempt.method.is_provider_verified()
}

/// Whether the polling fragment stays on the page after a poll. Any status
/// change, including expiry, makes the page reload into its new branch.
fn keeps_polling(previous: PaymentStatus, attempt: &PaymentAttempt, policy: PollPolicy) -> bool {
    attempt.status == previous
        && matches!(
            policy.decide(attempt.poll_count, attempt.status),
            PollDecision::Continue(_)
        )
}

/// Transaction id and client transaction from a Payphone return URL.
fn payphone_return_params(query: PayphoneReturnQuery) -> Result<(i64, String)> {
    let (Some(id), Some(client_tx)) = (
        query.id.filter(|s| !s.is_empty()),
        query.client_transaction_id.filter(|s| !s.is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "The payment provider did not return the transaction details.".to_string(),
        ));
    };
    let transaction_id = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid transaction id.".to_string()))?;
    Ok((transaction_id, client_tx))
}

fn ensure_payphone(attempt: &PaymentAttempt) -> Result<()> {
    if matches!(
        attempt.method,
        PaymentMethod::PayphoneLink | PaymentMethod::PayphonePhone
    ) {
        Ok(())
    } else {
        tracing::warn!(
            client_tx = %attempt.client_tx,
            method = %attempt.method,
            "Payphone return for a non-Payphone attempt"
        );
        Err(AppError::BadRequest(
            "This payment was not made with Payphone.".to_string(),
        ))
    }
}

fn validate_proof(method: PaymentMethod, form: &ProofForm, due: Money) -> std::result::Result<Proof, String> {
    match method {
        PaymentMethod::CashDeposit => {
            let bank = form.bank.trim();
            let reference = form.reference.trim();
            if bank.is_empty() || reference.is_empty() {
                return Err("Enter the bank and the deposit reference.".to_string());
            }
            let amount = Money::parse(&form.amount).map_err(|e| format!("Deposit amount: {e}."))?;
            if amount < due {
                return Err(format!("The deposit amount must be at least {due}."));
            }
            Ok(Proof {
                reference: reference.to_string(),
                note: format!("Deposited {amount} at {bank}"),
            })
        }
        PaymentMethod::CryptoDeposit => {
            let hash = form.tx_hash.trim();
            let valid = (10..=128).contains(&hash.len())
                && hash.chars().all(|c| c.is_ascii_alphanumeric());
            if !valid {
                return Err("Enter the transaction hash of your transfer.".to_string());
            }
            Ok(Proof {
                reference: hash.to_string(),
                note: "Crypto transfer submitted".to_string(),
            })
        }
        _ => Err("This payment does not take a proof.".to_string()),
    }
}

// =============================================================================
// Status Page
// =============================================================================

/// Display the status page for one attempt.
#[instrument(skip_all, fields(client_tx = %client_tx))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
    Path(client_tx): Path<String>,
) -> Result<impl IntoResponse> {
    let attempt = owned_attempt(&state, &customer, &client_tx).await?;
    let reconciler = Reconciler::new(&state);

    reconciler.sync_backend(&attempt, &customer.token).await?;
    let attempt = reconciler
        .refresh_admin_verdict(attempt, &customer.token)
        .await?;

    let latest = PaymentAttemptRepository::new(state.pool())
        .latest_for_order(attempt.order_id)
        .await?;
    let is_latest = latest.is_some_and(|l| l.id == attempt.id);

    let payments = &state.config().payments;
    let resume_url = attempt
        .redirect_url
        .clone()
        .filter(|_| attempt.status == PaymentStatus::Pending);

    Ok(PaymentTemplate {
        ctx,
        phase: PaymentPhase::of(attempt.status),
        message: PaymentPhase::message(attempt.status),
        poll: should_poll(&attempt),
        poll_secs: payments.poll.interval_secs(),
        can_retry: attempt.status.is_retryable() && is_latest,
        show_proof_form: attempt.method.needs_proof() && attempt.status == PaymentStatus::Pending,
        resume_url,
        deposit: payments.deposit.clone(),
        crypto: payments.crypto.clone(),
        attempt,
    })
}

/// Poll the provider once (HTMX).
///
/// Returns the polling fragment while the attempt stays pending, and
/// `HX-Refresh` once the page should re-render a different branch.
#[instrument(skip_all, fields(client_tx = %client_tx))]
pub async fn status(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    Path(client_tx): Path<String>,
) -> Result<Response> {
    let before = owned_attempt(&state, &customer, &client_tx).await?;
    let previous_status = before.status;

    let attempt = Reconciler::new(&state)
        .poll(before, &customer.token)
        .await?;

    let policy = state.config().payments.poll;
    if keeps_polling(previous_status, &attempt, policy) {
        Ok(PaymentPollTemplate {
            client_tx: attempt.client_tx.to_string(),
            poll_secs: policy.interval_secs(),
        }
        .into_response())
    } else {
        Ok((AppendHeaders([("HX-Refresh", "true")]), "").into_response())
    }
}

// =============================================================================
// Provider Returns
// =============================================================================

/// Payphone response URL.
///
/// Confirms the transaction with Payphone (which must happen within minutes
/// of payment) unless the attempt is already settled.
#[instrument(skip_all)]
pub async fn payphone_return(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    Query(query): Query<PayphoneReturnQuery>,
) -> Result<Response> {
    let (transaction_id, client_tx) = payphone_return_params(query)?;

    let attempt = returned_attempt(&state, &customer, &client_tx).await?;
    ensure_payphone(&attempt)?;
    let target = status_path(&attempt.client_tx);
    if attempt.status.is_terminal() {
        tracing::debug!(client_tx = %attempt.client_tx, "Duplicate Payphone return");
        return Ok(Redirect::to(&target).into_response());
    }

    let payphone = state
        .payphone()
        .ok_or_else(|| AppError::Internal("Payphone is not configured".to_string()))?;
    let provider_ref = transaction_id.to_string();
    let attempt = PaymentAttemptRepository::new(state.pool())
        .set_provider_details(attempt.id, Some(&provider_ref), None)
        .await?;

    let (observation, note) = match payphone.confirm(transaction_id, &attempt.client_tx).await {
        Ok(tx)
            if tx
                .client_transaction_id
                .as_deref()
                .is_some_and(|returned| returned != attempt.client_tx.as_str()) =>
        {
            tracing::warn!(
                client_tx = %attempt.client_tx,
                returned = ?tx.client_transaction_id,
                "Payphone confirmed a different transaction"
            );
            (Observation::CheckFailed, Some("Transaction mismatch".to_string()))
        }
        Ok(tx) => (tx.observation(), tx.message),
        Err(e) => {
            tracing::warn!(error = %e, "Payphone confirm failed");
            (Observation::CheckFailed, None)
        }
    };

    let change = StatusChange {
        provider_ref: Some(&provider_ref),
        note: note.as_deref(),
        ..StatusChange::default()
    };
    Reconciler::new(&state)
        .apply(attempt, observation, change, Some(&customer.token))
        .await?;

    Ok(Redirect::to(&target).into_response())
}

/// Mercado Pago back URL (success, failure and pending all land here).
#[instrument(skip_all)]
pub async fn mercadopago_return(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
    Query(query): Query<MercadoPagoReturnQuery>,
) -> Result<Response> {
    let Some(reference) = query.external_reference.filter(|s| !s.is_empty()) else {
        return Err(AppError::BadRequest(
            "The payment provider did not return the transaction details.".to_string(),
        ));
    };
    let attempt = returned_attempt(&state, &customer, &reference).await?;
    let target = status_path(&attempt.client_tx);

    // Abandoned checkouts come back with payment_id=null.
    let payment_id = query
        .payment_id
        .filter(|id| !id.is_empty() && id != "null");
    let Some(payment_id) = payment_id else {
        return Ok(Redirect::to(&target).into_response());
    };
    if attempt.status.is_terminal() {
        return Ok(Redirect::to(&target).into_response());
    }

    let client = state
        .mercado_pago()
        .ok_or_else(|| AppError::Internal("Mercado Pago is not configured".to_string()))?;
    tracing::debug!(reported = ?query.status, "Mercado Pago return");

    let reconciler = Reconciler::new(&state);
    match client.get_payment(&payment_id).await {
        Ok(payment) if payment.client_tx().as_ref() == Some(&attempt.client_tx) => {
            let provider_ref = payment.id.to_string();
            let change = StatusChange {
                provider_ref: Some(&provider_ref),
                note: payment.status_detail.as_deref(),
                ..StatusChange::default()
            };
            reconciler
                .apply(attempt, payment.observation(), change, Some(&customer.token))
                .await?;
        }
        Ok(payment) => {
            tracing::warn!(
                client_tx = %attempt.client_tx,
                external_reference = ?payment.external_reference,
                "Mercado Pago payment belongs to another transaction"
            );
        }
        Err(MercadoPagoError::NotFound(_)) => {
            tracing::warn!(%payment_id, "Mercado Pago payment not found");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Mercado Pago payment lookup failed");
            reconciler
                .apply(
                    attempt,
                    Observation::CheckFailed,
                    StatusChange::default(),
                    Some(&customer.token),
                )
                .await?;
        }
    }

    Ok(Redirect::to(&target).into_response())
}

// =============================================================================
// Deposits and Retries
// =============================================================================

/// Submit a cash or crypto deposit proof.
#[instrument(skip_all, fields(client_tx = %client_tx))]
pub async fn proof(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(client_tx): Path<String>,
    Form(form): Form<ProofForm>,
) -> Result<Response> {
    let attempt = owned_attempt(&state, &customer, &client_tx).await?;
    let target = status_path(&attempt.client_tx);

    if attempt.status != PaymentStatus::Pending {
        set_flash(&session, Flash::info("This payment is no longer waiting for a proof.")).await;
        return Ok(Redirect::to(&target).into_response());
    }

    let proof = match validate_proof(attempt.method, &form, attempt.amount()) {
        Ok(proof) => proof,
        Err(message) => {
            set_flash(&session, Flash::error(message)).await;
            return Ok(Redirect::to(&target).into_response());
        }
    };

    let change = StatusChange {
        proof_reference: Some(&proof.reference),
        note: Some(&proof.note),
        ..StatusChange::default()
    };
    Reconciler::new(&state)
        .apply(
            attempt,
            Observation::CustomerSubmittedProof,
            change,
            Some(&customer.token),
        )
        .await?;

    set_flash(
        &session,
        Flash::success("Thanks! We will confirm your payment once we verify the deposit."),
    )
    .await;
    Ok(Redirect::to(&target).into_response())
}

/// Start a new attempt for the order of a failed one.
#[instrument(skip_all, fields(client_tx = %client_tx))]
pub async fn retry(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Path(client_tx): Path<String>,
    Form(form): Form<RetryForm>,
) -> Result<Response> {
    let previous = owned_attempt(&state, &customer, &client_tx).await?;

    match CheckoutService::new(&state)
        .retry(&customer, &previous, Some(&form.payphone_phone))
        .await
    {
        Ok(started) => {
            tracing::info!(
                previous = %previous.client_tx,
                client_tx = %started.attempt.client_tx,
                "Payment retried"
            );
            Ok(Redirect::to(&started.redirect).into_response())
        }
        Err(
            e @ (CheckoutError::NotRetryable
            | CheckoutError::PreviousPaymentOpen
            | CheckoutError::Invalid(_)
            | CheckoutError::MethodUnavailable(_)),
        ) => {
            set_flash(&session, Flash::error(e.user_message())).await;
            Ok(Redirect::to(&status_path(&previous.client_tx)).into_response())
        }
        Err(CheckoutError::Database(e)) => Err(e.into()),
        Err(CheckoutError::Backend(e)) => Err(e.into()),
        Err(e) => Err(AppError::Internal(e.to_string())),
    }
}
