//! Products and categories.

use reqwest::Method;
use secrecy::SecretString;
use tienda_core::models::{Category, CategoryInput, Page, Product, ProductInput};
use tienda_core::{CategoryId, ProductId};
use tracing::{debug, instrument};
use url::Url;

use crate::cache::CacheValue;
use crate::{BackendClient, BackendError};

/// Filters for [`BackendClient::list_products`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    /// Free-text search.
    pub q: Option<String>,
    pub category: Option<CategoryId>,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
    /// Include inactive products (admin only).
    pub include_inactive: bool,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            q: None,
            category: None,
            page: 1,
            per_page: 24,
            include_inactive: false,
        }
    }
}

impl ProductQuery {
    fn cache_key(&self) -> String {
        format!(
            "products:{}:{}:{}:{}:{}",
            self.q.as_deref().unwrap_or(""),
            self.category.map(|c| c.as_i64()).unwrap_or_default(),
            self.page,
            self.per_page,
            self.include_inactive
        )
    }

    fn apply(&self, url: &mut Url) {
        let mut pairs = url.query_pairs_mut();
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            pairs.append_pair("q", q);
        }
        if let Some(category) = self.category {
            pairs.append_pair("category_id", &category.to_string());
        }
        pairs.append_pair("page", &self.page.max(1).to_string());
        pairs.append_pair("per_page", &self.per_page.to_string());
        if self.include_inactive {
            pairs.append_pair("include_inactive", "true");
        }
    }
}

impl BackendClient {
    // =========================================================================
    // Product Methods
    // =========================================================================

    /// List products matching a query.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, BackendError> {
        let cache_key = query.cache_key();
        if let Some(CacheValue::Products(page)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for products");
            return Ok(page);
        }

        let mut url = self.url("/products")?;
        query.apply(&mut url);
        let page: Page<Product> = self.send(self.request(Method::GET, url, None)).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(page.clone()))
            .await;
        Ok(page)
    }

    /// Get a single product.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the product does not exist, or an error if the
    /// API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, BackendError> {
        let cache_key = format!("product:{id}");
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let url = self.url(&format!("/products/{id}"))?;
        let product: Product = self.send(self.request(Method::GET, url, None)).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// Get several products, skipping any that no longer exist.
    ///
    /// # Errors
    ///
    /// Returns an error if any request fails for a reason other than
    /// `NotFound`.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, BackendError> {
        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_product(*id).await {
                Ok(product) => products.push(product),
                Err(BackendError::NotFound(_)) => debug!(product_id = %id, "Product gone"),
                Err(e) => return Err(e),
            }
        }
        Ok(products)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the backend rejects the
    /// input.
    #[instrument(skip(self, token, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        token: &SecretString,
        input: &ProductInput,
    ) -> Result<Product, BackendError> {
        let url = self.url("/products")?;
        let product = self
            .send(self.request(Method::POST, url, Some(token)).json(input))
            .await?;
        self.invalidate_catalog();
        Ok(product)
    }

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the backend rejects the
    /// input.
    #[instrument(skip(self, token, input), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        token: &SecretString,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, BackendError> {
        let url = self.url(&format!("/products/{id}"))?;
        let product = self
            .send(self.request(Method::PUT, url, Some(token)).json(input))
            .await?;
        self.invalidate_catalog();
        Ok(product)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(product_id = %id))]
    pub async fn delete_product(
        &self,
        token: &SecretString,
        id: ProductId,
    ) -> Result<(), BackendError> {
        let url = self.url(&format!("/products/{id}"))?;
        self.send_empty(self.request(Method::DELETE, url, Some(token)))
            .await?;
        self.invalidate_catalog();
        Ok(())
    }

    // =========================================================================
    // Category Methods
    // =========================================================================

    /// List all categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, BackendError> {
        let cache_key = "categories".to_string();
        if let Some(CacheValue::Categories(categories)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let url = self.url("/categories")?;
        let categories: Vec<Category> = self.send(self.request(Method::GET, url, None)).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Categories(categories.clone()))
            .await;
        Ok(categories)
    }

    /// Get a single category.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the category does not exist, or an error if the
    /// API request fails.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn get_category(&self, id: CategoryId) -> Result<Category, BackendError> {
        let cache_key = format!("category:{id}");
        if let Some(CacheValue::Category(category)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for category");
            return Ok(category);
        }

        let url = self.url(&format!("/categories/{id}"))?;
        let category: Category = self.send(self.request(Method::GET, url, None)).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Category(category.clone()))
            .await;
        Ok(category)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, input), fields(name = %input.name))]
    pub async fn create_category(
        &self,
        token: &SecretString,
        input: &CategoryInput,
    ) -> Result<Category, BackendError> {
        let url = self.url("/categories")?;
        let category = self
            .send(self.request(Method::POST, url, Some(token)).json(input))
            .await?;
        self.invalidate_catalog();
        Ok(category)
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, input), fields(category_id = %id))]
    pub async fn update_category(
        &self,
        token: &SecretString,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, BackendError> {
        let url = self.url(&format!("/categories/{id}"))?;
        let category = self
            .send(self.request(Method::PUT, url, Some(token)).json(input))
            .await?;
        self.invalidate_catalog();
        Ok(category)
    }

    /// Delete a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails, e.g. when the category
    /// still has products.
    #[instrument(skip(self, token), fields(category_id = %id))]
    pub async fn delete_category(
        &self,
        token: &SecretString,
        id: CategoryId,
    ) -> Result<(), BackendError> {
        let url = self.url(&format!("/categories/{id}"))?;
        self.send_empty(self.request(Method::DELETE, url, Some(token)))
            .await?;
        self.invalidate_catalog();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::tests::client;

    #[test]
    fn test_query_string() {
        let mut url = Url::parse("http://api/products").unwrap();
        ProductQuery {
            q: Some("  café molido ".to_string()),
            category: Some(CategoryId::new(3)),
            page: 0,
            per_page: 12,
            include_inactive: true,
        }
        .apply(&mut url);
        assert_eq!(
            url.query(),
            Some("q=caf%C3%A9+molido&category_id=3&page=1&per_page=12&include_inactive=true")
        );
    }

    #[test]
    fn test_blank_search_is_omitted() {
        let mut url = Url::parse("http://api/products").unwrap();
        ProductQuery {
            q: Some("   ".to_string()),
            ..ProductQuery::default()
        }
        .apply(&mut url);
        assert_eq!(url.query(), Some("page=1&per_page=24"));
    }

    #[test]
    fn test_cache_keys_differ_by_filter() {
        let a = ProductQuery::default();
        let b = ProductQuery {
            page: 2,
            ..ProductQuery::default()
        };
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[tokio::test]
    async fn test_cached_product_skips_network() {
        // Nothing listens on this port; a cache miss would fail.
        let c = client("http://127.0.0.1:9");
        let product: Product = serde_json::from_value(serde_json::json!({
            "id": 5,
            "name": "Cacao",
            "price": "4.50",
            "stock": 3
        }))
        .unwrap();
        c.inner
            .cache
            .insert(
                "product:5".to_string(),
                CacheValue::Product(Box::new(product.clone())),
            )
            .await;

        let fetched = c.get_product(ProductId::new(5)).await.unwrap();
        assert_eq!(fetched.name, "Cacao");

        c.invalidate_catalog();
        c.inner.cache.run_pending_tasks().await;
        assert!(c.get_product(ProductId::new(5)).await.is_err());
    }
}
