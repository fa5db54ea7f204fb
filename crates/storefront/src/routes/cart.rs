//! Cart route handlers.
//!
//! The cart lives in the session. Mutations are HTMX requests that return a
//! fragment and fire `cart-updated` so the header badge reloads itself.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::Deserialize;
use tienda_backend::BackendError;
use tienda_core::{Cart, CartLine, ProductId, TaxBreakdown};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::PageContext;
use crate::models::session_keys;
use crate::state::AppState;

/// Header fired after every cart mutation.
const CART_UPDATED: (&str, &str) = ("HX-Trigger", "cart-updated");

// =============================================================================
// Session Helpers
// =============================================================================

/// Read the cart from the session. A missing or unreadable cart is empty.
pub async fn load_cart(session: &Session) -> Cart {
    match session.get::<Cart>(session_keys::CART).await {
        Ok(cart) => cart.unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Failed to read cart from session: {e}");
            Cart::default()
        }
    }
}

/// Write the cart back to the session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_cart(session: &Session, cart: &Cart) -> std::result::Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CART, cart).await
}

// =============================================================================
// Forms
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i64,
    pub quantity: Option<u32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: i64,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: i64,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub ctx: PageContext,
    pub cart: Cart,
    pub totals: TaxBreakdown,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: Cart,
    pub totals: TaxBreakdown,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Result of an add-to-cart request (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_notice.html")]
pub struct CartNoticeTemplate {
    pub ok: bool,
    pub message: String,
}

fn totals(state: &AppState, cart: &Cart) -> TaxBreakdown {
    TaxBreakdown::from_gross(cart.subtotal(), state.config().tax_rate)
}

async fn items_fragment(state: &AppState, session: &Session, cart: Cart) -> Result<Response> {
    save_cart(session, &cart).await?;
    let totals = totals(state, &cart);
    Ok((AppendHeaders([CART_UPDATED]), CartItemsTemplate { cart, totals }).into_response())
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(state, session, ctx))]
pub async fn show(State(state): State<AppState>, session: Session, ctx: PageContext) -> impl IntoResponse {
    let cart = load_cart(&session).await;
    let totals = totals(&state, &cart);
    CartShowTemplate { ctx, cart, totals }
}

/// Add a product to the cart (HTMX).
///
/// The product is looked up first so only purchasable products with stock
/// get in.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let quantity = form.quantity.unwrap_or(1).max(1);
    let product = match state.backend().get_product(ProductId::new(form.product_id)).await {
        Ok(product) => product,
        Err(BackendError::NotFound(_)) => {
            return Ok(CartNoticeTemplate {
                ok: false,
                message: "This product is no longer available.".to_string(),
            }
            .into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let mut cart = load_cart(&session).await;
    let in_cart = cart
        .lines
        .iter()
        .find(|l| l.product_id == product.id)
        .map_or(0, |l| l.quantity);

    if !product.is_purchasable() || in_cart.saturating_add(quantity) > product.stock {
        let message = if product.is_purchasable() {
            format!("Only {} of {} left in stock.", product.stock, product.name)
        } else {
            format!("{} is out of stock.", product.name)
        };
        return Ok(CartNoticeTemplate { ok: false, message }.into_response());
    }

    cart.add(CartLine::from_product(&product, quantity));
    save_cart(&session, &cart).await?;
    tracing::debug!(product_id = %product.id, quantity, "Added to cart");

    Ok((
        AppendHeaders([CART_UPDATED]),
        CartNoticeTemplate {
            ok: true,
            message: format!("Added {} to your cart.", product.name),
        },
    )
        .into_response())
}

/// Update a line's quantity (HTMX).
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    cart.set_quantity(ProductId::new(form.product_id), form.quantity);
    items_fragment(&state, &session, cart).await
}

/// Remove a line (HTMX).
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    cart.remove(ProductId::new(form.product_id));
    items_fragment(&state, &session, cart).await
}

/// Empty the cart (HTMX).
#[instrument(skip(state, session))]
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Response> {
    items_fragment(&state, &session, Cart::default()).await
}

/// Cart count badge (HTMX).
pub async fn count(session: Session) -> impl IntoResponse {
    CartCountTemplate {
        count: load_cart(&session).await.item_count(),
    }
}
