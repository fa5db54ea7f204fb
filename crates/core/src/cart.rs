//! Shopping cart held in the customer's session.
//!
//! Lines carry a snapshot of name and price so the cart page renders without
//! a backend round-trip. Snapshots are refreshed with [`Cart::reprice`]
//! before checkout; the backend prices the order itself either way.

use serde::{Deserialize, Serialize};

use crate::models::{OrderLineInput, Product};
use crate::types::{Money, ProductId};

/// Upper bound for a single line's quantity.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// One product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub image_url: Option<String>,
}

impl CartLine {
    /// Build a line from a backend product.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity: quantity.min(MAX_LINE_QUANTITY),
            image_url: product.image_url.clone(),
        }
    }

    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// What changed when the cart was repriced against the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepriceReport {
    /// Names of lines whose price changed.
    pub price_changed: Vec<String>,
    /// Names of lines removed because the product is gone or unavailable.
    pub removed: Vec<String>,
    /// Names of lines whose quantity was reduced to the available stock.
    pub quantity_reduced: Vec<String>,
}

impl RepriceReport {
    /// True when nothing changed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.price_changed.is_empty() && self.removed.is_empty() && self.quantity_reduced.is_empty()
    }
}

/// The session cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Add a line, merging with an existing line for the same product.
    pub fn add(&mut self, line: CartLine) {
        if line.quantity == 0 {
            return;
        }
        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            existing.quantity = existing
                .quantity
                .saturating_add(line.quantity)
                .min(MAX_LINE_QUANTITY);
            existing.name = line.name;
            existing.unit_price = line.unit_price;
            existing.image_url = line.image_url;
        } else {
            let mut line = line;
            line.quantity = line.quantity.min(MAX_LINE_QUANTITY);
            self.lines.push(line);
        }
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// Returns false if the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id);
        }
        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.quantity = quantity.min(MAX_LINE_QUANTITY);
                true
            }
            None => false,
        }
    }

    /// Remove a product. Returns false if it was not in the cart.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total quantity across lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of line totals (tax-inclusive).
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Product IDs in cart order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|l| l.product_id).collect()
    }

    /// Refresh snapshots from current backend products.
    ///
    /// Lines whose product is missing or not purchasable are dropped;
    /// quantities above the available stock are reduced.
    pub fn reprice(&mut self, products: &[Product]) -> RepriceReport {
        let mut report = RepriceReport::default();

        self.lines.retain_mut(|line| {
            let Some(product) = products.iter().find(|p| p.id == line.product_id) else {
                report.removed.push(line.name.clone());
                return false;
            };
            if !product.is_purchasable() {
                report.removed.push(product.name.clone());
                return false;
            }
            if product.price != line.unit_price {
                report.price_changed.push(product.name.clone());
                line.unit_price = product.price;
            }
            if line.quantity > product.stock {
                report.quantity_reduced.push(product.name.clone());
                line.quantity = product.stock;
            }
            line.name.clone_from(&product.name);
            line.image_url.clone_from(&product.image_url);
            true
        });

        report
    }

    /// Lines for the backend order payload.
    #[must_use]
    pub fn to_order_lines(&self) -> Vec<OrderLineInput> {
        self.lines
            .iter()
            .map(|l| OrderLineInput {
                product_id: l.product_id,
                quantity: l.quantity,
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i64, cents: i64, stock: u32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: String::new(),
            price: Money::from_cents(cents),
            stock,
            image_url: None,
            category_id: None,
            category_name: None,
            active: true,
            created_at: None,
        }
    }

    #[test]
    fn test_add_merges_same_product() {
        let mut cart = Cart::default();
        let p = product(1, 500, 10);
        cart.add(CartLine::from_product(&p, 2));
        cart.add(CartLine::from_product(&p, 3));
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.item_count(), 5);
        assert_eq!(cart.subtotal(), Money::from_cents(2500));
    }

    #[test]
    fn test_add_caps_quantity() {
        let mut cart = Cart::default();
        let p = product(1, 100, 500);
        cart.add(CartLine::from_product(&p, 90));
        cart.add(CartLine::from_product(&p, 90));
        assert_eq!(cart.item_count(), MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_add_zero_is_ignored() {
        let mut cart = Cart::default();
        cart.add(CartLine::from_product(&product(1, 100, 5), 0));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_and_remove() {
        let mut cart = Cart::default();
        cart.add(CartLine::from_product(&product(1, 100, 5), 1));
        cart.add(CartLine::from_product(&product(2, 200, 5), 1));

        assert!(cart.set_quantity(ProductId::new(2), 4));
        assert_eq!(cart.item_count(), 5);

        assert!(cart.set_quantity(ProductId::new(1), 0));
        assert_eq!(cart.product_ids(), vec![ProductId::new(2)]);

        assert!(!cart.set_quantity(ProductId::new(9), 1));
        assert!(!cart.remove(ProductId::new(9)));
    }

    #[test]
    fn test_reprice_reports_changes() {
        let mut cart = Cart::default();
        cart.add(CartLine::from_product(&product(1, 100, 5), 2));
        cart.add(CartLine::from_product(&product(2, 200, 5), 4));
        cart.add(CartLine::from_product(&product(3, 300, 5), 1));

        let mut inactive = product(3, 300, 5);
        inactive.active = false;
        let current = vec![product(1, 150, 5), product(2, 200, 3), inactive];

        let report = cart.reprice(&current);
        assert_eq!(report.price_changed, vec!["Product 1".to_string()]);
        assert_eq!(report.quantity_reduced, vec!["Product 2".to_string()]);
        assert_eq!(report.removed, vec!["Product 3".to_string()]);
        assert_eq!(cart.subtotal(), Money::from_cents(2 * 150 + 3 * 200));
    }

    #[test]
    fn test_reprice_drops_missing_products() {
        let mut cart = Cart::default();
        cart.add(CartLine::from_product(&product(1, 100, 5), 1));
        let report = cart.reprice(&[]);
        assert!(cart.is_empty());
        assert_eq!(report.removed.len(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_session_serialization() {
        let mut cart = Cart::default();
        cart.add(CartLine::from_product(&product(1, 1999, 5), 1));
        let json = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cart);
    }
}
