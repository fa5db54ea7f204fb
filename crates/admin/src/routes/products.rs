//! Product management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tienda_backend::{BackendError, ProductQuery};
use tienda_core::models::{Category, Product, ProductInput};
use tienda_core::{CategoryId, Money, ProductId};
use tower_sessions::Session;
use tracing::instrument;

use super::{PER_PAGE, record_audit};
use crate::components::data_table::products_table_config;
use crate::components::{DataTableConfig, Pagination};
use crate::db::AuditAction;
use crate::error::Result;
use crate::filters;
use crate::middleware::{PageContext, RequireAdminAuth, set_flash};
use crate::models::Flash;
use crate::state::AppState;

/// Query parameters for the product list.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub page: Option<u32>,
}

/// Product list page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub ctx: PageContext,
    pub table: DataTableConfig,
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

/// Raw product form fields, kept as strings so a rejected form re-renders
/// exactly as typed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub stock: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub category_id: String,
    /// Checkbox; present when checked.
    pub active: Option<String>,
}

impl ProductForm {
    /// Form for a new product.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            stock: "0".to_string(),
            active: Some("on".to_string()),
            ..Self::default()
        }
    }

    /// Prefill from an existing product.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.amount().to_string(),
            stock: product.stock.to_string(),
            image_url: product.image_url.clone().unwrap_or_default(),
            category_id: product
                .category_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            active: product.active.then(|| "on".to_string()),
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Whether `category` is the selected option.
    #[must_use]
    pub fn is_category(&self, category: &Category) -> bool {
        self.category_id == category.id.to_string()
    }

    /// Parse and validate into a backend payload.
    ///
    /// # Errors
    ///
    /// Returns every problem found, in field order.
    pub fn to_input(&self, categories: &[Category]) -> std::result::Result<ProductInput, Vec<String>> {
        let price = Money::parse(&self.price).map_err(|e| format!("Price: {e}"));
        let stock = self
            .stock
            .trim()
            .parse::<u32>()
            .map_err(|_| "Stock must be a whole number of at least 0".to_string());

        let mut category_error = None;
        let category_id = match self.category_id.trim() {
            "" => None,
            raw => {
                let found = raw
                    .parse::<i64>()
                    .ok()
                    .map(CategoryId::new)
                    .filter(|id| categories.iter().any(|c| c.id == *id));
                if found.is_none() {
                    category_error = Some("Choose a category from the list".to_string());
                }
                found
            }
        };

        let image_url = Some(self.image_url.trim())
            .filter(|u| !u.is_empty())
            .map(ToString::to_string);
        let image_error = image_url
            .as_deref()
            .filter(|u| !is_web_url(u))
            .map(|_| "Image URL must start with http:// or https://".to_string());

        let input = ProductInput {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            price: price.as_ref().ok().copied().unwrap_or(Money::ZERO),
            stock: stock.as_ref().ok().copied().unwrap_or(0),
            image_url,
            category_id,
            active: self.is_active(),
        };

        let mut errors = input.validate();
        errors.extend(price.err());
        errors.extend(stock.err());
        errors.extend(category_error);
        errors.extend(image_error);

        if errors.is_empty() {
            Ok(input)
        } else {
            Err(errors)
        }
    }
}

fn is_web_url(raw: &str) -> bool {
    url::Url::parse(raw).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
}

/// Create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub ctx: PageContext,
    /// `None` when creating.
    pub product_id: Option<ProductId>,
    pub form: ProductForm,
    pub categories: Vec<Category>,
    pub errors: Vec<String>,
}

impl ProductFormTemplate {
    #[must_use]
    pub fn action(&self) -> String {
        match self.product_id {
            Some(id) => format!("/products/{id}"),
            None => "/products".to_string(),
        }
    }
}

/// Product list page.
///
/// GET /products
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    ctx: PageContext,
    Query(query): Query<ProductListQuery>,
) -> Result<ProductsIndexTemplate> {
    let backend = state.backend();
    let categories = backend.list_categories().await?;

    let category = query
        .category
        .as_deref()
        .and_then(|c| c.trim().parse::<i64>().ok())
        .map(CategoryId::new);

    let page = backend
        .list_products(&ProductQuery {
            q: query.q.clone(),
            category,
            page: query.page.unwrap_or(1).max(1),
            per_page: PER_PAGE,
            include_inactive: true,
        })
        .await?;

    let table = products_table_config(&categories).with_values(&[
        ("q", query.q.as_deref()),
        ("category", query.category.as_deref()),
    ]);
    let pagination = table.pagination(&page);

    Ok(ProductsIndexTemplate {
        ctx,
        table,
        products: page.items,
        pagination,
    })
}

/// New product form.
///
/// GET /products/new
#[instrument(skip_all)]
pub async fn new_page(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    ctx: PageContext,
) -> Result<ProductFormTemplate> {
    Ok(ProductFormTemplate {
        ctx,
        product_id: None,
        form: ProductForm::blank(),
        categories: state.backend().list_categories().await?,
        errors: Vec::new(),
    })
}

/// Create a product.
///
/// POST /products
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
    ctx: PageContext,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let categories = state.backend().list_categories().await?;
    let input = match form.to_input(&categories) {
        Ok(input) => input,
        Err(errors) => return Ok(rerender(ctx, None, form, categories, errors)),
    };

    let product = match state.backend().create_product(&admin.token, &input).await {
        Ok(product) => product,
        Err(e) if is_rejection(&e) => {
            return Ok(rerender(ctx, None, form, categories, vec![e.user_message()]));
        }
        Err(e) => return Err(e.into()),
    };

    record_audit(
        &state,
        &admin,
        AuditAction::ProductCreated,
        product.id.as_i64(),
        Some(format!("{} at {}", product.name, product.price)),
    )
    .await;
    set_flash(&session, Flash::success(format!("Created \"{}\".", product.name))).await;
    Ok(Redirect::to("/products").into_response())
}

/// Edit product form.
///
/// GET /products/{id}/edit
#[instrument(skip_all, fields(product_id = id))]
pub async fn edit_page(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    ctx: PageContext,
    Path(id): Path<i64>,
) -> Result<ProductFormTemplate> {
    let backend = state.backend();
    let (product, categories) =
        tokio::try_join!(backend.get_product(ProductId::new(id)), backend.list_categories())?;

    Ok(ProductFormTemplate {
        ctx,
        product_id: Some(product.id),
        form: ProductForm::from_product(&product),
        categories,
        errors: Vec::new(),
    })
}

/// Update a product.
///
/// POST /products/{id}
#[instrument(skip_all, fields(product_id = id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
    ctx: PageContext,
    Path(id): Path<i64>,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let id = ProductId::new(id);
    let categories = state.backend().list_categories().await?;
    let input = match form.to_input(&categories) {
        Ok(input) => input,
        Err(errors) => return Ok(rerender(ctx, Some(id), form, categories, errors)),
    };

    let product = match state.backend().update_product(&admin.token, id, &input).await {
        Ok(product) => product,
        Err(e) if is_rejection(&e) => {
            return Ok(rerender(ctx, Some(id), form, categories, vec![e.user_message()]));
        }
        Err(e) => return Err(e.into()),
    };

    record_audit(
        &state,
        &admin,
        AuditAction::ProductUpdated,
        product.id.as_i64(),
        Some(format!(
            "{} at {}, stock {}{}",
            product.name,
            product.price,
            product.stock,
            if product.active { "" } else { ", inactive" }
        )),
    )
    .await;
    set_flash(&session, Flash::success(format!("Saved \"{}\".", product.name))).await;
    Ok(Redirect::to("/products").into_response())
}

/// Delete a product.
///
/// POST /products/{id}/delete
#[instrument(skip_all, fields(product_id = id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Redirect> {
    let id = ProductId::new(id);
    let backend = state.backend();
    let product = backend.get_product(id).await?;

    match backend.delete_product(&admin.token, id).await {
        Ok(()) => {
            record_audit(
                &state,
                &admin,
                AuditAction::ProductDeleted,
                id.as_i64(),
                Some(product.name.clone()),
            )
            .await;
            set_flash(&session, Flash::success(format!("Deleted \"{}\".", product.name))).await;
        }
        Err(e) if is_rejection(&e) => {
            set_flash(
                &session,
                Flash::error(format!("Could not delete \"{}\": {}", product.name, e.user_message())),
            )
            .await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to("/products"))
}

/// Backend refused the input (4xx other than auth); show it on the form.
pub(crate) const fn is_rejection(err: &BackendError) -> bool {
    matches!(err, BackendError::Api { status, .. } if *status >= 400 && *status < 500)
}

fn rerender(
    ctx: PageContext,
    product_id: Option<ProductId>,
    form: ProductForm,
    categories: Vec<Category>,
    errors: Vec<String>,
) -> Response {
    ProductFormTemplate {
        ctx,
        product_id,
        form,
        categories,
        errors,
    }
    .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn categories() -> Vec<Category> {
        vec![Category {
            id: CategoryId::new(4),
            name: "Café".to_string(),
            description: None,
            product_count: None,
        }]
    }

    fn form() -> ProductForm {
        ProductForm {
            name: " Café molido 500g ".to_string(),
            description: "Loja".to_string(),
            price: "12.50".to_string(),
            stock: "30".to_string(),
            image_url: String::new(),
            category_id: "4".to_string(),
            active: Some("on".to_string()),
        }
    }

    #[test]
    fn test_valid_form_builds_input() {
        let input = form().to_input(&categories()).unwrap();
        assert_eq!(input.name, "Café molido 500g");
        assert_eq!(input.price, Money::from_cents(1250));
        assert_eq!(input.stock, 30);
        assert_eq!(input.category_id, Some(CategoryId::new(4)));
        assert_eq!(input.image_url, None);
        assert!(input.active);
    }

    #[test]
    fn test_unchecked_active_means_inactive() {
        let mut form = form();
        form.active = None;
        assert!(!form.to_input(&categories()).unwrap().active);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut form = form();
        form.name = "  ".to_string();
        form.price = "abc".to_string();
        form.stock = "-3".to_string();
        form.category_id = "99".to_string();
        form.image_url = "javascript:alert(1)".to_string();
        let errors = form.to_input(&categories()).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert_eq!(errors[0], "Name is required");
        assert!(errors[1].starts_with("Price"));
        assert!(errors[2].starts_with("Stock"));
        assert!(errors[3].contains("category"));
        assert!(errors[4].starts_with("Image URL"));
    }

    #[test]
    fn test_name_reported_alongside_bad_price() {
        let mut form = form();
        form.name = String::new();
        form.price = "12.5.0".to_string();
        let errors = form.to_input(&categories()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], "Name is required");
        assert!(errors[1].starts_with("Price"));
    }

    #[test]
    fn test_image_url_must_be_web_address() {
        let mut form = form();
        form.image_url = " https://cdn.tienda.ec/cafe.jpg ".to_string();
        assert_eq!(
            form.to_input(&categories()).unwrap().image_url.as_deref(),
            Some("https://cdn.tienda.ec/cafe.jpg")
        );

        for bad in ["cafe.jpg", "ftp://cdn.tienda.ec/cafe.jpg", "https://"] {
            form.image_url = bad.to_string();
            assert!(form.to_input(&categories()).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut form = form();
        form.price = "-1.00".to_string();
        let errors = form.to_input(&categories()).unwrap_err();
        assert_eq!(errors, vec!["Price: amount cannot be negative".to_string()]);
    }

    #[test]
    fn test_prefill_from_product() {
        let product = Product {
            id: ProductId::new(7),
            name: "Mug".to_string(),
            description: String::new(),
            price: Money::from_cents(800),
            stock: 3,
            image_url: Some("https://cdn.tienda.ec/mug.jpg".to_string()),
            category_id: Some(CategoryId::new(4)),
            category_name: Some("Café".to_string()),
            active: false,
            created_at: None,
        };
        let form = ProductForm::from_product(&product);
        assert_eq!(form.price, "8.00");
        assert!(!form.is_active());
        assert!(form.is_category(&categories()[0]));
        assert_eq!(form.to_input(&categories()).unwrap(), ProductInput::from(&product));
    }
}
