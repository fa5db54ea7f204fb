//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tienda_backend::ProductQuery;
use tienda_core::models::{Category, Product};
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

/// Number of products featured on the home page.
const FEATURED_COUNT: u32 = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub ctx: PageContext,
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
}

/// Display the home page.
#[instrument(skip(state, ctx))]
pub async fn home(State(state): State<AppState>, ctx: PageContext) -> Result<impl IntoResponse> {
    let query = ProductQuery {
        per_page: FEATURED_COUNT,
        ..ProductQuery::default()
    };
    let (categories, products) = tokio::try_join!(
        state.backend().list_categories(),
        state.backend().list_products(&query),
    )?;

    Ok(HomeTemplate {
        ctx,
        categories,
        products: products.items,
    })
}
