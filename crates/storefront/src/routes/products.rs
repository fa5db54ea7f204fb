//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tienda_backend::ProductQuery;
use tienda_core::models::{Category, Page, Product};
use tienda_core::{CategoryId, ProductId};
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

/// Products per listing page.
pub const PER_PAGE: u32 = 12;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub category: Option<i64>,
    pub page: Option<u32>,
}

impl ListQuery {
    fn to_product_query(&self) -> ProductQuery {
        ProductQuery {
            q: self.q.clone().filter(|q| !q.trim().is_empty()),
            category: self.category.map(CategoryId::new),
            page: self.page.unwrap_or(1).max(1),
            per_page: PER_PAGE,
            include_inactive: false,
        }
    }
}

/// Pagination links that keep the current filters.
#[derive(Debug, Clone, Default)]
pub struct Pager {
    pub page: u32,
    pub total_pages: u32,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
}

impl Pager {
    /// Build links for `page` under `base_path`, preserving `q` and `category`.
    #[must_use]
    pub fn new<T>(base_path: &str, page: &Page<T>, q: Option<&str>, category: Option<i64>) -> Self {
        let href = |n: u32| {
            let mut params = vec![format!("page={n}")];
            if let Some(q) = q.filter(|q| !q.is_empty()) {
                params.push(format!("q={}", urlencoding::encode(q)));
            }
            if let Some(c) = category {
                params.push(format!("category={c}"));
            }
            format!("{base_path}?{}", params.join("&"))
        };
        Self {
            page: page.page,
            total_pages: page.total_pages(),
            prev_href: page.has_prev().then(|| href(page.page - 1)),
            next_href: page.has_next().then(|| href(page.page + 1)),
        }
    }
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub ctx: PageContext,
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
    pub q: String,
    pub category: Option<i64>,
    pub pager: Pager,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub ctx: PageContext,
    pub product: Product,
    pub max_quantity: u32,
}

/// Display product listing page.
#[instrument(skip(state, ctx))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let product_query = query.to_product_query();
    let (page, categories) = tokio::try_join!(
        state.backend().list_products(&product_query),
        state.backend().list_categories(),
    )?;

    let pager = Pager::new("/products", &page, query.q.as_deref(), query.category);
    Ok(ProductsIndexTemplate {
        ctx,
        products: page.items,
        categories,
        q: query.q.unwrap_or_default(),
        category: query.category,
        pager,
    })
}

/// Display product detail page.
#[instrument(skip(state, ctx))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let product = state.backend().get_product(ProductId::new(id)).await?;
    let max_quantity = product.stock.min(tienda_core::cart::MAX_LINE_QUANTITY);

    Ok(ProductShowTemplate {
        ctx,
        product,
        max_quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, total: u64) -> Page<()> {
        Page {
            items: Vec::new(),
            page: number,
            per_page: PER_PAGE,
            total,
        }
    }

    #[test]
    fn test_pager_keeps_filters() {
        let pager = Pager::new("/products", &page(2, 40), Some("blue mug"), Some(3));
        assert_eq!(
            pager.prev_href.as_deref(),
            Some("/products?page=1&q=blue%20mug&category=3")
        );
        assert_eq!(
            pager.next_href.as_deref(),
            Some("/products?page=3&q=blue%20mug&category=3")
        );
        assert_eq!(pager.total_pages, 4);
    }

    #[test]
    fn test_pager_single_page_has_no_links() {
        let pager = Pager::new("/products", &page(1, 5), None, None);
        assert!(pager.prev_href.is_none());
        assert!(pager.next_href.is_none());
    }

    #[test]
    fn test_list_query_ignores_blank_search() {
        let query = ListQuery {
            q: Some("  ".to_string()),
            category: None,
            page: Some(0),
        };
        let product_query = query.to_product_query();
        assert!(product_query.q.is_none());
        assert_eq!(product_query.page, 1);
    }
}
