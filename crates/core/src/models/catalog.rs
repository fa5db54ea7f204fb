//! Products and categories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, Money, ProductId};

/// A product as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Tax-inclusive unit price.
    pub price: Money,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

const fn default_true() -> bool {
    true
}

impl Product {
    /// Whether the product can be added to a cart.
    #[must_use]
    pub const fn is_purchasable(&self) -> bool {
        self.active && self.stock > 0
    }
}

/// Create/update payload for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub image_url: Option<String>,
    pub category_id: Option<CategoryId>,
    pub active: bool,
}

impl ProductInput {
    /// Maximum product name length accepted by the backend.
    pub const MAX_NAME_LENGTH: usize = 120;

    /// Field-level validation errors, empty when the input is acceptable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let name = self.name.trim();
        if name.is_empty() {
            errors.push("Name is required".to_string());
        } else if name.chars().count() > Self::MAX_NAME_LENGTH {
            errors.push(format!(
                "Name must be at most {} characters",
                Self::MAX_NAME_LENGTH
            ));
        }
        if let Some(url) = &self.image_url
            && !(url.starts_with("https://") || url.starts_with("http://"))
        {
            errors.push("Image URL must start with http:// or https://".to_string());
        }
        errors
    }
}

impl From<&Product> for ProductInput {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            stock: product.stock,
            image_url: product.image_url.clone(),
            category_id: product.category_id,
            active: product.active,
        }
    }
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub product_count: Option<u32>,
}

/// Create/update payload for a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
}

impl CategoryInput {
    /// Field-level validation errors, empty when the input is acceptable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        if self.name.trim().is_empty() {
            vec!["Name is required".to_string()]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> ProductInput {
        ProductInput {
            name: "Café de Loja".to_string(),
            description: String::new(),
            price: Money::from_cents(1250),
            stock: 3,
            image_url: None,
            category_id: None,
            active: true,
        }
    }

    #[test]
    fn test_product_defaults_when_fields_missing() {
        let json = r#"{"id": 1, "name": "Mug", "price": "8.00"}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert!(product.active);
        assert_eq!(product.stock, 0);
        assert!(!product.is_purchasable());
    }

    #[test]
    fn test_product_input_validation() {
        assert!(input().validate().is_empty());

        let mut bad = input();
        bad.name = "  ".to_string();
        bad.image_url = Some("ftp://x".to_string());
        assert_eq!(bad.validate().len(), 2);
    }

    #[test]
    fn test_category_input_validation() {
        let ok = CategoryInput {
            name: "Coffee".to_string(),
            description: None,
        };
        assert!(ok.validate().is_empty());
        let bad = CategoryInput {
            name: String::new(),
            description: None,
        };
        assert_eq!(bad.validate(), vec!["Name is required".to_string()]);
    }
}
