//! Dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tienda_backend::ProductQuery;
use tienda_core::models::Order;
use tienda_core::{Money, OrderStatus, PaymentStatus};
use tracing::instrument;

use crate::db::AuditEntry;
use crate::error::Result;
use crate::filters;
use crate::middleware::{PageContext, RequireAdminAuth};
use crate::state::AppState;

/// Order pages scanned for the sales figures.
const MAX_ORDER_PAGES: u32 = 10;
const RECENT_ORDERS: usize = 8;
const RECENT_ACTIVITY: i64 = 10;

/// Figures derived from the scanned orders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardStats {
    /// Orders counted towards revenue.
    pub paid_orders: usize,
    pub revenue: Money,
    /// Deposit proofs waiting for an admin, oldest first.
    pub awaiting_verification: Vec<Order>,
    /// Newest orders first.
    pub recent_orders: Vec<Order>,
}

impl DashboardStats {
    /// Summarize a set of orders.
    ///
    /// Revenue counts orders that have been paid and not cancelled.
    #[must_use]
    pub fn from_orders(mut orders: Vec<Order>) -> Self {
        let paid: Vec<&Order> = orders.iter().filter(|o| is_paid(o.status)).collect();
        let paid_orders = paid.len();
        let revenue = paid.iter().map(|o| o.total).sum();

        let mut awaiting_verification: Vec<Order> = orders
            .iter()
            .filter(|o| o.payment_status == PaymentStatus::AwaitingVerification)
            .cloned()
            .collect();
        awaiting_verification.sort_by_key(|o| o.created_at);

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(RECENT_ORDERS);

        Self {
            paid_orders,
            revenue,
            awaiting_verification,
            recent_orders: orders,
        }
    }
}

const fn is_paid(status: OrderStatus) -> bool {
    matches!(
        status,
        OrderStatus::Paid | OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
    )
}

/// Dashboard page template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub ctx: PageContext,
    pub order_count: u64,
    pub product_count: u64,
    pub user_count: u64,
    pub stats: DashboardStats,
    /// True when more orders exist than were scanned.
    pub partial: bool,
    pub activity: Vec<AuditEntry>,
}

/// Dashboard page handler.
///
/// GET /
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    ctx: PageContext,
) -> Result<DashboardTemplate> {
    let backend = state.backend();

    let mut orders = Vec::new();
    let mut order_count = 0;
    let mut partial = false;
    for page_number in 1..=MAX_ORDER_PAGES {
        let page = backend.list_orders(&admin.token, None, page_number).await?;
        order_count = page.total;
        let has_next = page.has_next();
        orders.extend(page.items);
        if !has_next {
            break;
        }
        partial = page_number == MAX_ORDER_PAGES;
    }

    let product_query = ProductQuery {
        per_page: 1,
        include_inactive: true,
        ..ProductQuery::default()
    };
    let (products, users) = tokio::try_join!(
        backend.list_products(&product_query),
        backend.list_users(&admin.token, 1),
    )?;

    let activity = state.audit_log().recent(RECENT_ACTIVITY).await?;

    Ok(DashboardTemplate {
        ctx,
        order_count,
        product_count: products.total,
        user_count: users.total,
        stats: DashboardStats::from_orders(orders),
        partial,
        activity,
    })
}
