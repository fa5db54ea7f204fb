//! Orders and the payment updates pushed back to the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId};

/// Shipping details collected at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub province: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ShippingAddress {
    /// Field-level validation errors, empty when the address is acceptable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (value, label) in [
            (&self.full_name, "Full name"),
            (&self.address_line, "Address"),
            (&self.city, "City"),
            (&self.province, "Province"),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("{label} is required"));
            }
        }
        let digits = self.phone.chars().filter(char::is_ascii_digit).count();
        if !(7..=15).contains(&digits) {
            errors.push("Phone must have between 7 and 15 digits".to_string());
        }
        errors
    }
}

/// One line of a placed order, priced by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderLine {
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// An order as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    #[serde(default)]
    pub user_email: Option<String>,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub shipping: ShippingAddress,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_reference: Option<String>,
    /// Client transaction ID of the attempt last reported by the storefront.
    #[serde(default)]
    pub payment_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Total quantity across lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// A requested order line; the backend prices it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineInput {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Order creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInput {
    pub lines: Vec<OrderLineInput>,
    pub shipping: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// Payment state mirrored to the backend whenever an attempt changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub client_transaction_id: String,
    /// Provider transaction ID, deposit reference, or crypto transaction hash.
    pub reference: Option<String>,
    pub note: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Ana Pérez".to_string(),
            phone: "+593 99 123 4567".to_string(),
            address_line: "Av. Amazonas N34".to_string(),
            city: "Quito".to_string(),
            province: "Pichincha".to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_address_validation() {
        assert!(address().validate().is_empty());

        let mut bad = address();
        bad.city = " ".to_string();
        bad.phone = "12".to_string();
        let errors = bad.validate();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.starts_with("City")));
    }

    #[test]
    fn test_order_deserializes_with_defaults() {
        let json = r#"{
            "id": 10, "user_id": 3, "status": "pending",
            "lines": [{"product_id": 1, "name": "Mug", "unit_price": "8.00", "quantity": 2}],
            "total": "16.00",
            "shipping": {"full_name": "A", "phone": "0991234567", "address_line": "x",
                         "city": "Quito", "province": "Pichincha"},
            "created_at": "2026-01-05T10:00:00Z"
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.lines[0].line_total(), Money::from_cents(1600));
    }
}
