//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use tienda_core::OrderId;
use tienda_core::models::Order;
use tracing::instrument;

use crate::db::{PaymentAttempt, PaymentAttemptRepository};
use crate::error::Result;
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::services::Reconciler;
use crate::state::AppState;

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/orders.html")]
pub struct OrdersTemplate {
    pub ctx: PageContext,
    pub email: String,
    pub orders: Vec<Order>,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/order.html")]
pub struct OrderTemplate {
    pub ctx: PageContext,
    pub order: Order,
    /// Most recent local payment attempt, if the order was paid here.
    pub attempt: Option<PaymentAttempt>,
}

/// Display the customer's orders, newest first.
#[instrument(skip_all, fields(user_id = %customer.id))]
pub async fn orders(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
) -> Result<impl IntoResponse> {
    let mut orders = state.backend().my_orders(&customer.token).await?;
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(OrdersTemplate {
        ctx,
        email: customer.email.to_string(),
        orders,
    })
}

/// Display one order with its latest payment attempt.
///
/// Viewing the order also pushes any unsynced payment status to the
/// backend and picks up an admin's verdict on a deposit.
#[instrument(skip_all, fields(user_id = %customer.id, order_id = id))]
pub async fn order(
    State(state): State<AppState>,
    ctx: PageContext,
    RequireAuth(customer): RequireAuth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let order_id = OrderId::new(id);
    let attempt = PaymentAttemptRepository::new(state.pool())
        .latest_for_order(order_id)
        .await?
        .filter(|a| a.user_id == customer.id);

    let attempt = match attempt {
        Some(attempt) => {
            let reconciler = Reconciler::new(&state);
            reconciler.sync_backend(&attempt, &customer.token).await?;
            Some(
                reconciler
                    .refresh_admin_verdict(attempt, &customer.token)
                    .await?,
            )
        }
        None => None,
    };

    // Read after syncing so the order shows the status we just pushed.
    let order = state.backend().get_order(&customer.token, order_id).await?;

    Ok(OrderTemplate {
        ctx,
        order,
        attempt,
    })
}
