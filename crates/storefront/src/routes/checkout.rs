//! Checkout route handlers.
//!
//! `GET /checkout` issues a one-time token that `POST /checkout` must claim
//! before creating anything. A second submission of the same form finds the
//! claim and is sent to the payment the first one started.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Deserialize;
use tienda_core::models::ShippingAddress;
use tienda_core::{Cart, PaymentMethod, TaxBreakdown};
use tower_sessions::Session;
use tracing::instrument;

use super::cart::{load_cart, save_cart};
use crate::config::{CryptoWallet, DepositAccount};
use crate::db::CheckoutTokenRepository;
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth, set_flash};
use crate::models::{CurrentCustomer, Flash, session_keys};
use crate::services::checkout::status_path;
use crate::services::{CheckoutError, CheckoutService};
use crate::state::AppState;

const TOKEN_LENGTH: usize = 32;

/// Checkout form data.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address_line: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub payment_method: String,
    /// Phone linked to the customer's Payphone account.
    #[serde(default)]
    pub payphone_phone: String,
}

impl CheckoutForm {
    fn shipping(&self) -> ShippingAddress {
        ShippingAddress {
            full_name: self.full_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address_line: self.address_line.trim().to_string(),
            city: self.city.trim().to_string(),
            province: self.province.trim().to_string(),
            notes: Some(self.notes.trim().to_string()).filter(|n| !n.is_empty()),
        }
    }
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub ctx: PageContext,
    pub cart: Cart,
    pub totals: TaxBreakdown,
    pub methods: Vec<PaymentMethod>,
    pub token: String,
    pub form: CheckoutForm,
    pub errors: Vec<String>,
    pub deposit: Option<DepositAccount>,
    pub crypto: Option<CryptoWallet>,
}

fn new_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

async fn render(
    state: &AppState,
    session: &Session,
    ctx: PageContext,
    cart: Cart,
    form: CheckoutForm,
    errors: Vec<String>,
) -> Result<Response> {
    let token = new_token();
    session.insert(session_keys::CHECKOUT_TOKEN, &token).await?;

    let payments = &state.config().payments;
    let totals = TaxBreakdown::from_gross(cart.subtotal(), state.config().tax_rate);
    Ok(CheckoutTemplate {
        ctx,
        cart,
        totals,
        methods: payments.enabled_methods(),
        token,
        form,
        errors,
        deposit: payments.deposit.clone(),
        crypto: payments.crypto.clone(),
    }
    .into_response())
}

/// Display the checkout page.
#[instrument(skip_all, fields(user_id = %customer.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
) -> Result<Response> {
    let cart = load_cart(&session).await;
    if cart.is_empty() {
        set_flash(&session, Flash::info("Your cart is empty.")).await;
        return Ok(Redirect::to("/cart").into_response());
    }

    let form = CheckoutForm {
        full_name: customer.name.clone(),
        ..CheckoutForm::default()
    };
    render(&state, &session, ctx, cart, form, Vec::new()).await
}

/// Where to send a submission whose token was already used.
async fn duplicate_submission(
    state: &AppState,
    session: &Session,
    customer: &CurrentCustomer,
    token: &str,
) -> Result<Response> {
    let claimed = CheckoutTokenRepository::new(state.pool()).find(token).await?;
    match claimed {
        Some(claim) if claim.user_id == customer.id => {
            if let Some(client_tx) = claim.client_tx {
                tracing::info!(%client_tx, "Duplicate checkout submission");
                return Ok(Redirect::to(&status_path(&client_tx)).into_response());
            }
            set_flash(
                session,
                Flash::info("Your order is already being processed."),
            )
            .await;
            Ok(Redirect::to("/account/orders").into_response())
        }
        _ => {
            set_flash(
                session,
                Flash::error("Your checkout session expired. Please review your order and try again."),
            )
            .await;
            Ok(Redirect::to("/checkout").into_response())
        }
    }
}

/// Handle checkout form submission.
#[instrument(skip_all, fields(user_id = %customer.id))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let expected = session.get::<String>(session_keys::CHECKOUT_TOKEN).await?;
    if form.token.is_empty() || expected.as_deref() != Some(form.token.as_str()) {
        return duplicate_submission(&state, &session, &customer, &form.token).await;
    }

    let mut cart = load_cart(&session).await;
    let service = CheckoutService::new(&state);
    let shipping = form.shipping();

    let Ok(method) = form.payment_method.parse::<PaymentMethod>() else {
        let errors = vec!["Choose a payment method.".to_string()];
        return render(&state, &session, ctx, cart, form, errors).await;
    };
    let phone = match service.validate(&cart, &shipping, method, Some(&form.payphone_phone)) {
        Ok(phone) => phone,
        Err(CheckoutError::EmptyCart) => {
            set_flash(&session, Flash::info("Your cart is empty.")).await;
            return Ok(Redirect::to("/cart").into_response());
        }
        Err(CheckoutError::Invalid(errors)) => {
            return render(&state, &session, ctx, cart, form, errors).await;
        }
        Err(e) => {
            let errors = vec![e.user_message()];
            return render(&state, &session, ctx, cart, form, errors).await;
        }
    };

    let tokens = CheckoutTokenRepository::new(state.pool());
    if !tokens.claim(&form.token, customer.id).await? {
        return duplicate_submission(&state, &session, &customer, &form.token).await;
    }
    session.remove::<String>(session_keys::CHECKOUT_TOKEN).await?;
    add_breadcrumb("checkout", "Checkout token claimed", None);

    let order = match service.place_order(&customer, &mut cart, shipping, method).await {
        Ok(order) => order,
        Err(e) => {
            tokens.release(&form.token).await?;
            if matches!(e, CheckoutError::CartChanged(_)) {
                save_cart(&session, &cart).await?;
            } else {
                tracing::warn!(error = %e, "Order creation failed");
            }
            set_flash(&session, Flash::error(e.user_message())).await;
            let back = if cart.is_empty() { "/cart" } else { "/checkout" };
            return Ok(Redirect::to(back).into_response());
        }
    };

    // The order exists now; the cart must not be submitted again.
    save_cart(&session, &Cart::default()).await?;

    let started = service
        .start_payment(&customer, order.id, order.total.cents(), method, phone.as_deref())
        .await?;
    tokens.link(&form.token, &started.attempt.client_tx).await?;

    Ok(Redirect::to(&started.redirect).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_is_random_alphanumeric() {
        let a = new_token();
        let b = new_token();
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_form_shipping_trims_and_drops_empty_notes() {
        let form = CheckoutForm {
            full_name: "  Ana Torres ".to_string(),
            city: "Quito".to_string(),
            notes: "   ".to_string(),
            ..CheckoutForm::default()
        };
        let shipping = form.shipping();
        assert_eq!(shipping.full_name, "Ana Torres");
        assert_eq!(shipping.city, "Quito");
        assert!(shipping.notes.is_none());
    }
}
