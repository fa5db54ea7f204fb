//! Cache types for catalog reads.

use tienda_core::models::{Category, Page, Product};

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(Page<Product>),
    Category(Category),
    Categories(Vec<Category>),
}
