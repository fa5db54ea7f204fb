//! Category route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tienda_backend::ProductQuery;
use tienda_core::CategoryId;
use tienda_core::models::{Category, Product};
use tracing::instrument;

use super::products::{PER_PAGE, Pager};
use crate::error::Result;
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

/// Category page template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/show.html")]
pub struct CategoryTemplate {
    pub ctx: PageContext,
    pub category: Category,
    pub products: Vec<Product>,
    pub pager: Pager,
}

/// Display the products of one category.
#[instrument(skip(state, ctx))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse> {
    let category_id = CategoryId::new(id);
    let product_query = ProductQuery {
        category: Some(category_id),
        page: query.page.unwrap_or(1).max(1),
        per_page: PER_PAGE,
        ..ProductQuery::default()
    };
    let (category, page) = tokio::try_join!(
        state.backend().get_category(category_id),
        state.backend().list_products(&product_query),
    )?;

    let pager = Pager::new(&format!("/categories/{id}"), &page, None, None);
    Ok(CategoryTemplate {
        ctx,
        category,
        products: page.items,
        pager,
    })
}
