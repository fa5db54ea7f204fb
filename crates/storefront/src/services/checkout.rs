//! Checkout: turning the session cart into a backend order and starting
//! the chosen payment method.
//!
//! Duplicate-submission protection (the one-time checkout token) lives in
//! the route handler; this service assumes it runs once per submission.

use secrecy::SecretString;
use thiserror::Error;
use tienda_backend::BackendError;
use tienda_core::models::{Order, OrderInput, ShippingAddress};
use tienda_core::{
    Cart, ClientTransactionId, Observation, OrderId, PaymentMethod, RepriceReport, TaxBreakdown,
};
use tracing::instrument;

use crate::db::{
    NewPaymentAttempt, PaymentAttempt, PaymentAttemptRepository, RepositoryError, StatusChange,
};
use crate::models::CurrentCustomer;
use crate::payments::{MercadoPagoError, PayphoneAmounts, PayphoneError, PreferenceUrls};
use crate::services::reconcile::{ProviderCheck, Reconciler};
use crate::state::AppState;

/// Payphone only serves Ecuadorian phone numbers.
pub const PAYPHONE_COUNTRY_CODE: &str = "593";

/// Errors that stop a checkout before a payment starts.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("payment method {0} is not available")]
    MethodUnavailable(PaymentMethod),

    #[error("invalid checkout details: {}", .0.join(", "))]
    Invalid(Vec<String>),

    /// Prices or availability changed since the cart was filled.
    #[error("cart changed since it was last priced")]
    CartChanged(RepriceReport),

    #[error("this payment cannot be retried")]
    NotRetryable,

    /// The provider may still complete the earlier payment.
    #[error("previous payment is not settled with the provider")]
    PreviousPaymentOpen,

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),
}

impl CheckoutError {
    /// Message for the flash shown on the checkout page.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyCart => "Your cart is empty.".to_string(),
            Self::MethodUnavailable(method) => {
                format!("{} is not available right now.", method.label())
            }
            Self::Invalid(errors) => errors.join(" "),
            Self::CartChanged(report) => {
                let mut parts = Vec::new();
                if !report.price_changed.is_empty() {
                    parts.push(format!("Prices changed for {}.", report.price_changed.join(", ")));
                }
                if !report.quantity_reduced.is_empty() {
                    parts.push(format!(
                        "Only limited stock is left for {}.",
                        report.quantity_reduced.join(", ")
                    ));
                }
                if !report.removed.is_empty() {
                    parts.push(format!(
                        "{} is no longer available.",
                        report.removed.join(", ")
                    ));
                }
                parts.push("Please review your order.".to_string());
                parts.join(" ")
            }
            Self::NotRetryable => "This payment cannot be retried.".to_string(),
            Self::PreviousPaymentOpen => "Your previous payment is still being processed. \
                Please wait a few minutes before trying again."
                .to_string(),
            Self::Backend(err) => err.user_message(),
            Self::Database(_) => "Something went wrong on our side. Please try again.".to_string(),
        }
    }
}

/// A payment attempt that was created and handed to its provider.
#[derive(Debug)]
pub struct StartedPayment {
    pub attempt: PaymentAttempt,
    /// Where to send the customer next: the provider's page or our status page.
    pub redirect: String,
}

/// What a provider gave back when a payment was started.
#[derive(Debug, Default)]
struct ProviderLaunch {
    provider_ref: Option<String>,
    redirect_url: Option<String>,
}

/// Whether a new attempt may replace `previous`.
///
/// `check` is what the provider said about `previous` just now, for
/// provider-verified methods. A payment the provider still holds, or one
/// we could not ask about, blocks the retry so the customer is not charged
/// twice.
fn ensure_retryable(
    previous: &PaymentAttempt,
    check: Option<&ProviderCheck>,
) -> Result<(), CheckoutError> {
    if let Some(check) = check
        && (check.in_flight
            || matches!(
                check.observation,
                Observation::CheckFailed | Observation::ProviderApproved
            ))
    {
        return Err(CheckoutError::PreviousPaymentOpen);
    }
    if !previous.status.is_retryable() || previous.superseded_by.is_some() {
        return Err(CheckoutError::NotRetryable);
    }
    Ok(())
}

/// Status page path for an attempt.
#[must_use]
pub fn status_path(client_tx: &ClientTransactionId) -> String {
    format!("/payments/{client_tx}")
}

/// Normalize a phone number for a Payphone push sale.
///
/// Accepts `0991234567`, `991234567` or `+593 99 123 4567` and returns the
/// nine-digit national number without the trunk zero.
///
/// # Errors
///
/// Returns a user-facing message when the number is not an Ecuadorian mobile.
pub fn payphone_phone_number(input: &str) -> Result<String, String> {
    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    let national = digits
        .strip_prefix(PAYPHONE_COUNTRY_CODE)
        .filter(|rest| rest.len() == 9)
        .or_else(|| digits.strip_prefix('0'))
        .unwrap_or(&digits);

    if national.len() == 9 && national.starts_with('9') {
        Ok(national.to_owned())
    } else {
        Err("Enter the mobile number linked to your Payphone account, e.g. 0991234567.".to_string())
    }
}

fn provider_note(message: Option<&str>) -> String {
    message.map_or_else(
        || "The payment provider could not be reached.".to_string(),
        |m| format!("The payment provider declined to start the payment: {m}"),
    )
}

fn payphone_note(e: &PayphoneError) -> String {
    match e {
        PayphoneError::Api { message, .. } => provider_note(Some(message)),
        _ => provider_note(None),
    }
}

fn mercado_pago_note(e: &MercadoPagoError) -> String {
    match e {
        MercadoPagoError::Api { message, .. } => provider_note(Some(message)),
        _ => provider_note(None),
    }
}

/// Checkout operations.
pub struct CheckoutService<'a> {
    state: &'a AppState,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Validate a checkout submission before anything is created.
    ///
    /// Returns the normalized Payphone phone number for phone sales.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` describing what the customer must fix.
    pub fn validate(
        &self,
        cart: &Cart,
        shipping: &ShippingAddress,
        method: PaymentMethod,
        phone: Option<&str>,
    ) -> Result<Option<String>, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if !self.state.config().payments.is_enabled(method) {
            return Err(CheckoutError::MethodUnavailable(method));
        }

        let mut errors = shipping.validate();
        let phone = if method == PaymentMethod::PayphonePhone {
            match payphone_phone_number(phone.unwrap_or_default()) {
                Ok(number) => Some(number),
                Err(e) => {
                    errors.push(e);
                    None
                }
            }
        } else {
            None
        };

        if errors.is_empty() {
            Ok(phone)
        } else {
            Err(CheckoutError::Invalid(errors))
        }
    }

    /// Reprice the cart and create the backend order.
    ///
    /// The cart is updated in place; if anything changed the order is not
    /// created so the customer can review the new totals.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::CartChanged` after repricing changes, or a
    /// backend error.
    #[instrument(skip(self, customer, cart, shipping), fields(user_id = %customer.id))]
    pub async fn place_order(
        &self,
        customer: &CurrentCustomer,
        cart: &mut Cart,
        shipping: ShippingAddress,
        method: PaymentMethod,
    ) -> Result<Order, CheckoutError> {
        let products = self.state.backend().get_products(&cart.product_ids()).await?;
        let report = cart.reprice(&products);
        if cart.is_empty() {
            return Err(CheckoutError::CartChanged(report));
        }
        if !report.is_clean() {
            return Err(CheckoutError::CartChanged(report));
        }

        let input = OrderInput {
            lines: cart.to_order_lines(),
            shipping,
            payment_method: method,
        };
        let order = self
            .state
            .backend()
            .create_order(&customer.token, &input)
            .await?;

        tracing::info!(order_id = %order.id, total = %order.total, "Order created");
        Ok(order)
    }

    /// Create a payment attempt for an order and start it with the provider.
    ///
    /// Provider failures do not fail this call: the attempt moves to
    /// `Error` and the customer lands on the status page with a retry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the attempt cannot be stored.
    #[instrument(skip(self, customer, phone), fields(user_id = %customer.id))]
    pub async fn start_payment(
        &self,
        customer: &CurrentCustomer,
        order_id: OrderId,
        amount_cents: i64,
        method: PaymentMethod,
        phone: Option<&str>,
    ) -> Result<StartedPayment, RepositoryError> {
        let attempts = PaymentAttemptRepository::new(self.state.pool());
        let attempt = attempts
            .insert(&NewPaymentAttempt {
                client_tx: ClientTransactionId::generate(order_id),
                order_id,
                user_id: customer.id,
                method,
                amount_cents,
            })
            .await?;

        tracing::info!(client_tx = %attempt.client_tx, %method, "Payment attempt created");
        self.launch(attempt, &customer.token, phone).await
    }

    /// Start a new attempt for the order of a failed one.
    ///
    /// For provider-verified methods the provider is asked about `previous`
    /// first; a late approval is applied instead of charging again.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotRetryable` unless `previous` is the
    /// order's latest attempt, in a retryable status and not already
    /// replaced, or `CheckoutError::PreviousPaymentOpen` while the provider
    /// may still complete it.
    pub async fn retry(
        &self,
        customer: &CurrentCustomer,
        previous: &PaymentAttempt,
        phone: Option<&str>,
    ) -> Result<StartedPayment, CheckoutError> {
        ensure_retryable(previous, None)?;
        if !self.state.config().payments.is_enabled(previous.method) {
            return Err(CheckoutError::MethodUnavailable(previous.method));
        }
        let phone = if previous.method == PaymentMethod::PayphonePhone {
            Some(
                payphone_phone_number(phone.unwrap_or_default())
                    .map_err(|e| CheckoutError::Invalid(vec![e]))?,
            )
        } else {
            None
        };

        let previous = if previous.method.is_provider_verified() {
            let reconciler = Reconciler::new(self.state);
            let check = reconciler.check_provider(previous).await;
            let settled = if check == ProviderCheck::nothing_on_record() {
                previous.clone()
            } else {
                let change = StatusChange {
                    provider_ref: check.provider_ref.as_deref(),
                    ..StatusChange::default()
                };
                reconciler
                    .apply(
                        previous.clone(),
                        check.observation,
                        change,
                        Some(&customer.token),
                    )
                    .await?
            };
            ensure_retryable(&settled, Some(&check))?;
            settled
        } else {
            previous.clone()
        };

        let attempts = PaymentAttemptRepository::new(self.state.pool());
        let latest = attempts.latest_for_order(previous.order_id).await?;
        if latest.as_ref().map(|a| &a.client_tx) != Some(&previous.client_tx) {
            return Err(CheckoutError::NotRetryable);
        }

        let new = NewPaymentAttempt {
            client_tx: ClientTransactionId::generate(previous.order_id),
            order_id: previous.order_id,
            user_id: customer.id,
            method: previous.method,
            amount_cents: previous.amount_cents,
        };
        let Some(attempt) = attempts.insert_superseding(&previous, &new).await? else {
            tracing::info!(client_tx = %previous.client_tx, "Retry lost to a concurrent retry");
            return Err(CheckoutError::NotRetryable);
        };

        tracing::info!(
            client_tx = %attempt.client_tx,
            previous = %previous.client_tx,
            "Replacement payment attempt created"
        );
        Ok(self
            .launch(attempt, &customer.token, phone.as_deref())
            .await?)
    }

    async fn launch(
        &self,
        attempt: PaymentAttempt,
        token: &SecretString,
        phone: Option<&str>,
    ) -> Result<StartedPayment, RepositoryError> {
        let status_url = status_path(&attempt.client_tx);
        let launched = match attempt.method {
            PaymentMethod::PayphoneLink | PaymentMethod::PayphonePhone => {
                self.launch_payphone(&attempt, phone).await
            }
            PaymentMethod::MercadoPago => self.launch_mercado_pago(&attempt).await,
            PaymentMethod::CashDeposit | PaymentMethod::CryptoDeposit => {
                Ok(ProviderLaunch::default())
            }
        };

        let reconciler = Reconciler::new(self.state);
        match launched {
            Ok(launch) => {
                let attempt = if launch.provider_ref.is_some() || launch.redirect_url.is_some() {
                    PaymentAttemptRepository::new(self.state.pool())
                        .set_provider_details(
                            attempt.id,
                            launch.provider_ref.as_deref(),
                            launch.redirect_url.as_deref(),
                        )
                        .await?
                } else {
                    attempt
                };
                // Tell the backend which transaction to expect.
                reconciler.sync_backend(&attempt, token).await?;

                Ok(StartedPayment {
                    redirect: launch.redirect_url.unwrap_or(status_url),
                    attempt,
                })
            }
            Err(note) => {
                tracing::warn!(client_tx = %attempt.client_tx, %note, "Payment start failed");
                let attempt = reconciler
                    .apply(
                        attempt,
                        Observation::CheckFailed,
                        StatusChange {
                            note: Some(&note),
                            ..StatusChange::default()
                        },
                        Some(token),
                    )
                    .await?;
                Ok(StartedPayment {
                    attempt,
                    redirect: status_url,
                })
            }
        }
    }

    async fn launch_payphone(
        &self,
        attempt: &PaymentAttempt,
        phone: Option<&str>,
    ) -> Result<ProviderLaunch, String> {
        let Some(payphone) = self.state.payphone() else {
            return Err(provider_note(None));
        };
        let amounts = PayphoneAmounts::from(TaxBreakdown::from_gross(
            attempt.amount(),
            self.state.config().tax_rate,
        ));
        let reference = format!("Order #{}", attempt.order_id);

        if attempt.method == PaymentMethod::PayphoneLink {
            let url = payphone
                .create_link(&attempt.client_tx, amounts, &reference)
                .await
                .map_err(|e| payphone_note(&e))?;
            Ok(ProviderLaunch {
                provider_ref: None,
                redirect_url: Some(url),
            })
        } else {
            let phone = phone.ok_or_else(|| "A Payphone phone number is required.".to_string())?;
            let transaction_id = payphone
                .phone_sale(
                    &attempt.client_tx,
                    amounts,
                    &reference,
                    phone,
                    PAYPHONE_COUNTRY_CODE,
                )
                .await
                .map_err(|e| payphone_note(&e))?;
            Ok(ProviderLaunch {
                provider_ref: Some(transaction_id.to_string()),
                redirect_url: None,
            })
        }
    }

    async fn launch_mercado_pago(&self, attempt: &PaymentAttempt) -> Result<ProviderLaunch, String> {
        let Some(client) = self.state.mercado_pago() else {
            return Err(provider_note(None));
        };
        let config = self.state.config();
        let return_url = config.absolute_url("/payments/mercadopago/return");
        let urls = PreferenceUrls {
            success: return_url.clone(),
            failure: return_url.clone(),
            pending: return_url,
            notification: config.absolute_url("/webhooks/mercadopago"),
        };

        let preference = client
            .create_preference(
                &attempt.client_tx,
                &format!("Order #{}", attempt.order_id),
                attempt.amount(),
                &urls,
            )
            .await
            .map_err(|e| mercado_pago_note(&e))?;

        Ok(ProviderLaunch {
            provider_ref: None,
            redirect_url: Some(preference.init_point),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tienda_core::PaymentStatus;

    #[test]
    fn test_payphone_phone_number_formats() {
        assert_eq!(payphone_phone_number("0991234567").unwrap(), "991234567");
        assert_eq!(payphone_phone_number("991234567").unwrap(), "991234567");
        assert_eq!(payphone_phone_number("+593 99 123 4567").unwrap(), "991234567");
        assert_eq!(payphone_phone_number("593991234567").unwrap(), "991234567");
    }

    #[test]
    fn test_payphone_phone_number_rejects_landlines_and_junk() {
        assert!(payphone_phone_number("022345678").is_err());
        assert!(payphone_phone_number("12345").is_err());
        assert!(payphone_phone_number("").is_err());
    }

    #[test]
    fn test_cart_changed_message_lists_products() {
        let report = RepriceReport {
            price_changed: vec!["Mug".to_string()],
            removed: vec!["Tote".to_string()],
            quantity_reduced: Vec::new(),
        };
        let message = CheckoutError::CartChanged(report).user_message();
        assert!(message.contains("Prices changed for Mug."));
        assert!(message.contains("Tote is no longer available."));
        assert!(message.ends_with("Please review your order."));
    }

    fn attempt(status: PaymentStatus) -> PaymentAttempt {
        let now = chrono::Utc::now();
        PaymentAttempt {
            id: tienda_core::PaymentAttemptId::new(1),
            client_tx: ClientTransactionId::parse("42-abcDEF123456").unwrap(),
            order_id: OrderId::new(42),
            user_id: tienda_core::UserId::new(7),
            method: PaymentMethod::MercadoPago,
            status,
            amount_cents: 2599,
            provider_ref: None,
            redirect_url: None,
            proof_reference: None,
            note: None,
            poll_count: 40,
            backend_synced: true,
            superseded_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_retry_refused_while_provider_still_processing() {
        // Polling gave up but Mercado Pago still has the payment in_process.
        let expired = attempt(PaymentStatus::Expired);
        let in_process = ProviderCheck::reported(Observation::ProviderPending, Some("99".into()));
        assert!(matches!(
            ensure_retryable(&expired, Some(&in_process)),
            Err(CheckoutError::PreviousPaymentOpen)
        ));

        let unreachable = ProviderCheck::failed();
        assert!(matches!(
            ensure_retryable(&expired, Some(&unreachable)),
            Err(CheckoutError::PreviousPaymentOpen)
        ));
    }

    #[test]
    fn test_retry_refused_after_late_approval() {
        let approved = ProviderCheck::reported(Observation::ProviderApproved, Some("99".into()));
        // Expired accepts the approval, so the settled attempt is confirmed.
        let settled = attempt(
            tienda_core::payment::transition(PaymentStatus::Expired, approved.observation)
                .resolve(PaymentStatus::Expired),
        );
        assert_eq!(settled.status, PaymentStatus::Confirmed);
        assert!(ensure_retryable(&settled, Some(&approved)).is_err());

        // A rejected attempt the provider now reports approved is a conflict.
        assert!(ensure_retryable(&attempt(PaymentStatus::Rejected), Some(&approved)).is_err());
    }

    #[test]
    fn test_retry_allowed_once_provider_has_nothing_pending() {
        let expired = attempt(PaymentStatus::Expired);
        assert!(ensure_retryable(&expired, Some(&ProviderCheck::nothing_on_record())).is_ok());

        let declined = ProviderCheck::reported(Observation::ProviderDeclined, None);
        assert!(ensure_retryable(&attempt(PaymentStatus::Rejected), Some(&declined)).is_ok());
        assert!(ensure_retryable(&attempt(PaymentStatus::Error), None).is_ok());
    }

    #[test]
    fn test_retry_refused_for_open_or_replaced_attempts() {
        assert!(matches!(
            ensure_retryable(&attempt(PaymentStatus::Pending), None),
            Err(CheckoutError::NotRetryable)
        ));
        let mut replaced = attempt(PaymentStatus::Error);
        replaced.superseded_by = Some(tienda_core::PaymentAttemptId::new(2));
        assert!(matches!(
            ensure_retryable(&replaced, None),
            Err(CheckoutError::NotRetryable)
        ));
    }

    #[test]
    fn test_status_path() {
        let tx = ClientTransactionId::parse("42-abcDEF123456").unwrap();
        assert_eq!(status_path(&tx), "/payments/42-abcDEF123456");
    }

    #[test]
    fn test_provider_notes_hide_transport_errors() {
        let e = PayphoneError::Parse("bad json at line 1".to_string());
        assert!(!payphone_note(&e).contains("json"));
        let e = PayphoneError::Api {
            status: 400,
            message: "Phone not registered".to_string(),
        };
        assert!(payphone_note(&e).contains("Phone not registered"));
    }
}
