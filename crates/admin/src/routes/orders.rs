//! Order management route handlers.
//!
//! Status changes follow [`OrderStatus::can_transition_to`]. Deposit
//! proofs (cash and crypto) are approved or rejected here; the storefront
//! picks the verdict up on the customer's next status poll.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tienda_core::models::{Order, PaymentUpdate};
use tienda_core::{OrderId, OrderStatus, PaymentStatus};
use tower_sessions::Session;
use tracing::instrument;

use super::products::is_rejection;
use super::record_audit;
use crate::components::data_table::orders_table_config;
use crate::components::{DataTableConfig, Pagination};
use crate::db::{AuditAction, AuditEntry};
use crate::error::Result;
use crate::filters;
use crate::middleware::{PageContext, RequireAdminAuth, set_flash};
use crate::models::Flash;
use crate::state::AppState;

/// Query parameters for the order list.
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
}

/// Order list page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub ctx: PageContext,
    pub table: DataTableConfig,
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub ctx: PageContext,
    pub order: Order,
    pub next_statuses: Vec<OrderStatus>,
    pub can_verify: bool,
    pub history: Vec<AuditEntry>,
}

/// Status change form.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: OrderStatus,
}

/// Admin verdict on a deposit proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

/// Verification form.
#[derive(Debug, Deserialize)]
pub struct VerifyForm {
    pub decision: Decision,
    #[serde(default)]
    pub note: String,
}

/// Whether an order has a deposit proof waiting for an admin.
#[must_use]
pub fn awaits_verification(order: &Order) -> bool {
    order.payment_status == PaymentStatus::AwaitingVerification
        && order.payment_method.is_some_and(|m| m.needs_proof())
        && order.payment_transaction_id.is_some()
}

/// Build the payment update for a verdict.
///
/// # Errors
///
/// Returns a message for the flash when the order has nothing to verify.
pub fn verification_update(
    order: &Order,
    decision: Decision,
    note: &str,
) -> std::result::Result<PaymentUpdate, &'static str> {
    if order.payment_status != PaymentStatus::AwaitingVerification {
        return Err("This order has no payment awaiting verification.");
    }
    let Some(method) = order.payment_method.filter(|m| m.needs_proof()) else {
        return Err("Only deposit payments are verified by hand.");
    };
    let Some(client_transaction_id) = order.payment_transaction_id.clone() else {
        return Err("The order has no payment attempt to verify.");
    };

    let note = note.trim();
    let (status, note) = match decision {
        Decision::Approve => (
            PaymentStatus::Confirmed,
            (!note.is_empty()).then(|| note.to_string()),
        ),
        Decision::Reject => (
            PaymentStatus::Rejected,
            Some(if note.is_empty() {
                "Proof rejected by admin".to_string()
            } else {
                note.to_string()
            }),
        ),
    };

    Ok(PaymentUpdate {
        status,
        method,
        client_transaction_id,
        reference: order.payment_reference.clone(),
        note,
    })
}

/// Order list page.
///
/// GET /orders
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    ctx: PageContext,
    Query(query): Query<OrderListQuery>,
) -> Result<OrdersIndexTemplate> {
    let status = query
        .status
        .as_deref()
        .and_then(|s| s.trim().parse::<OrderStatus>().ok());

    let page = state
        .backend()
        .list_orders(&admin.token, status, query.page.unwrap_or(1).max(1))
        .await?;

    let status_value = status.map(|s| s.as_str());
    let table = orders_table_config().with_values(&[("status", status_value)]);
    let pagination = table.pagination(&page);

    Ok(OrdersIndexTemplate {
        ctx,
        table,
        orders: page.items,
        pagination,
    })
}

/// Order detail page.
///
/// GET /orders/{id}
#[instrument(skip_all, fields(order_id = id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    ctx: PageContext,
    Path(id): Path<i64>,
) -> Result<OrderShowTemplate> {
    let order = state
        .backend()
        .get_order(&admin.token, OrderId::new(id))
        .await?;
    let history = state.audit_log().for_target("order", id).await?;

    Ok(OrderShowTemplate {
        next_statuses: order.status.next_statuses(),
        can_verify: awaits_verification(&order),
        ctx,
        order,
        history,
    })
}

/// Move an order to a new status.
///
/// POST /orders/{id}/status
#[instrument(skip_all, fields(order_id = id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
    Path(id): Path<i64>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect> {
    let order_id = OrderId::new(id);
    let back = Redirect::to(&format!("/orders/{id}"));
    let backend = state.backend();
    let order = backend.get_order(&admin.token, order_id).await?;

    if !order.status.can_transition_to(form.status) {
        set_flash(
            &session,
            Flash::error(format!(
                "An order that is {} cannot move to {}.",
                order.status.label().to_lowercase(),
                form.status.label().to_lowercase()
            )),
        )
        .await;
        return Ok(back);
    }

    match backend
        .update_order_status(&admin.token, order_id, form.status)
        .await
    {
        Ok(updated) => {
            record_audit(
                &state,
                &admin,
                AuditAction::OrderStatusChanged,
                id,
                Some(format!("{} -> {}", order.status, updated.status)),
            )
            .await;
            set_flash(
                &session,
                Flash::success(format!("Order #{id} is now {}.", updated.status.label())),
            )
            .await;
        }
        Err(e) if is_rejection(&e) => {
            set_flash(&session, Flash::error(e.user_message())).await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(back)
}

/// Approve or reject a deposit proof.
///
/// Approval also moves a pending order to paid; the payment verdict stands
/// even if that second call fails.
///
/// POST /orders/{id}/verify
#[instrument(skip_all, fields(order_id = id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
    Path(id): Path<i64>,
    Form(form): Form<VerifyForm>,
) -> Result<Redirect> {
    let order_id = OrderId::new(id);
    let back = Redirect::to(&format!("/orders/{id}"));
    let backend = state.backend();
    let order = backend.get_order(&admin.token, order_id).await?;

    let update = match verification_update(&order, form.decision, &form.note) {
        Ok(update) => update,
        Err(reason) => {
            set_flash(&session, Flash::error(reason)).await;
            return Ok(back);
        }
    };

    let updated = match backend.update_payment(&admin.token, order_id, &update).await {
        Ok(updated) => updated,
        Err(e) if is_rejection(&e) => {
            set_flash(&session, Flash::error(e.user_message())).await;
            return Ok(back);
        }
        Err(e) => return Err(e.into()),
    };

    let (action, mut message) = match form.decision {
        Decision::Approve => (
            AuditAction::PaymentApproved,
            format!("Payment for order #{id} approved."),
        ),
        Decision::Reject => (
            AuditAction::PaymentRejected,
            format!("Payment for order #{id} rejected."),
        ),
    };
    record_audit(
        &state,
        &admin,
        action,
        id,
        Some(format!(
            "{} {}{}",
            update.method,
            update.client_transaction_id,
            update.note.as_deref().map(|n| format!(": {n}")).unwrap_or_default()
        )),
    )
    .await;

    if form.decision == Decision::Approve && updated.status.can_transition_to(OrderStatus::Paid) {
        match backend
            .update_order_status(&admin.token, order_id, OrderStatus::Paid)
            .await
        {
            Ok(paid) => {
                record_audit(
                    &state,
                    &admin,
                    AuditAction::OrderStatusChanged,
                    id,
                    Some(format!("{} -> {}", updated.status, paid.status)),
                )
                .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, order_id = id, "Approved payment but could not mark order paid");
                message.push_str(" The order status could not be updated; change it by hand.");
            }
        }
    }

    set_flash(&session, Flash::success(message)).await;
    Ok(back)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tienda_core::models::ShippingAddress;
    use tienda_core::{Money, PaymentMethod, UserId};

    fn deposit_order() -> Order {
        Order {
            id: OrderId::new(12),
            user_id: UserId::new(3),
            user_email: Some("ana@tienda.ec".to_string()),
            status: OrderStatus::Pending,
            lines: vec![],
            total: Money::from_cents(4200),
            shipping: ShippingAddress::default(),
            payment_method: Some(PaymentMethod::CashDeposit),
            payment_status: PaymentStatus::AwaitingVerification,
            payment_reference: Some("DEP-88812".to_string()),
            payment_transaction_id: Some("T12-abc".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_approve_confirms_with_attempt_reference() {
        let update = verification_update(&deposit_order(), Decision::Approve, "  ").unwrap();
        assert_eq!(update.status, PaymentStatus::Confirmed);
        assert_eq!(update.method, PaymentMethod::CashDeposit);
        assert_eq!(update.client_transaction_id, "T12-abc");
        assert_eq!(update.reference.as_deref(), Some("DEP-88812"));
        assert_eq!(update.note, None);
    }

    #[test]
    fn test_reject_always_carries_a_note() {
        let update = verification_update(&deposit_order(), Decision::Reject, "").unwrap();
        assert_eq!(update.status, PaymentStatus::Rejected);
        assert_eq!(update.note.as_deref(), Some("Proof rejected by admin"));

        let update =
            verification_update(&deposit_order(), Decision::Reject, " amount short ").unwrap();
        assert_eq!(update.note.as_deref(), Some("amount short"));
    }

    #[test]
    fn test_only_awaiting_deposits_can_be_verified() {
        let mut order = deposit_order();
        order.payment_status = PaymentStatus::Confirmed;
        assert!(verification_update(&order, Decision::Approve, "").is_err());
        assert!(!awaits_verification(&order));

        let mut order = deposit_order();
        order.payment_method = Some(PaymentMethod::MercadoPago);
        assert!(verification_update(&order, Decision::Approve, "").is_err());

        let mut order = deposit_order();
        order.payment_transaction_id = None;
        assert!(verification_update(&order, Decision::Reject, "").is_err());
        assert!(!awaits_verification(&order));

        assert!(awaits_verification(&deposit_order()));
    }

    #[test]
    fn test_decision_form_values() {
        let form: VerifyForm = serde_json::from_str(r#"{"decision": "reject"}"#).unwrap();
        assert_eq!(form.decision, Decision::Reject);
        assert!(form.note.is_empty());
    }
}
