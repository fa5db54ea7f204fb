//! Status enums for orders, payments and users.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Generates `Display`/`FromStr` over the snake_case wire names.
macro_rules! wire_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The snake_case name used on the wire and in the database.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", stringify!($ty), ": {}"), s)),
                }
            }
        }
    };
}

/// Order lifecycle status as stored by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

wire_names!(OrderStatus {
    Pending => "pending",
    Paid => "paid",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending payment",
            Self::Paid => "Paid",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether an admin may move an order from `self` to `next`.
    ///
    /// Orders move forward one step at a time; cancellation is allowed until
    /// the order ships. Delivered and cancelled orders are final.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Cancelled)
                | (Self::Paid, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Statuses reachable from `self`.
    #[must_use]
    pub fn next_statuses(&self) -> Vec<Self> {
        Self::ALL
            .iter()
            .copied()
            .filter(|s| self.can_transition_to(*s))
            .collect()
    }
}

/// Status of a single payment attempt.
///
/// See [`crate::payment`] for the transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Waiting on the customer or the provider.
    #[default]
    Pending,
    /// Customer submitted a deposit proof; an admin must check it.
    AwaitingVerification,
    /// Money received.
    Confirmed,
    /// Provider or admin declined the payment.
    Rejected,
    /// We could not determine the outcome; retryable.
    Error,
    /// Gave up waiting.
    Expired,
}

wire_names!(PaymentStatus {
    Pending => "pending",
    AwaitingVerification => "awaiting_verification",
    Confirmed => "confirmed",
    Rejected => "rejected",
    Error => "error",
    Expired => "expired",
});

impl PaymentStatus {
    /// Confirmed and rejected payments never change again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected)
    }

    /// Whether the customer may start a new attempt for the same order.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Error | Self::Rejected | Self::Expired)
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::AwaitingVerification => "Awaiting verification",
            Self::Confirmed => "Confirmed",
            Self::Rejected => "Rejected",
            Self::Error => "Error",
            Self::Expired => "Expired",
        }
    }

    /// Tailwind badge classes used by both UIs.
    #[must_use]
    pub const fn badge_class(&self) -> &'static str {
        match self {
            Self::Pending | Self::AwaitingVerification => "bg-yellow-100 text-yellow-800",
            Self::Confirmed => "bg-green-100 text-green-800",
            Self::Rejected | Self::Error => "bg-red-100 text-red-800",
            Self::Expired => "bg-gray-100 text-gray-700",
        }
    }
}

/// How the customer chose to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Payphone hosted card payment link.
    PayphoneLink,
    /// Payphone push notification to the customer's phone app.
    PayphonePhone,
    /// Bank cash deposit or transfer, verified by an admin.
    CashDeposit,
    /// On-chain crypto transfer, verified by an admin.
    CryptoDeposit,
    /// Mercado Pago Checkout Pro redirect.
    MercadoPago,
}

wire_names!(PaymentMethod {
    PayphoneLink => "payphone_link",
    PayphonePhone => "payphone_phone",
    CashDeposit => "cash_deposit",
    CryptoDeposit => "crypto_deposit",
    MercadoPago => "mercado_pago",
});

impl PaymentMethod {
    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::PayphoneLink => "Card (Payphone link)",
            Self::PayphonePhone => "Payphone app",
            Self::CashDeposit => "Bank deposit",
            Self::CryptoDeposit => "Crypto deposit",
            Self::MercadoPago => "Mercado Pago",
        }
    }

    /// Methods whose outcome comes from a provider API rather than an admin.
    #[must_use]
    pub const fn is_provider_verified(&self) -> bool {
        matches!(
            self,
            Self::PayphoneLink | Self::PayphonePhone | Self::MercadoPago
        )
    }

    /// Methods that wait for a customer-submitted proof.
    #[must_use]
    pub const fn needs_proof(&self) -> bool {
        matches!(self, Self::CashDeposit | Self::CryptoDeposit)
    }
}

/// Backend user role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Customer,
    Admin,
}

wire_names!(UserRole {
    Customer => "customer",
    Admin => "admin",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_roundtrip() {
        for status in PaymentStatus::ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), *status);
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        for method in PaymentMethod::ALL {
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), *method);
        }
        assert!("bogus".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
        assert!(OrderStatus::Cancelled.next_statuses().is_empty());
        assert_eq!(
            OrderStatus::Processing.next_statuses(),
            vec![OrderStatus::Shipped, OrderStatus::Cancelled]
        );
    }

    #[test]
    fn test_payment_status_flags() {
        assert!(PaymentStatus::Confirmed.is_terminal());
        assert!(!PaymentStatus::Expired.is_terminal());
        assert!(PaymentStatus::Expired.is_retryable());
        assert!(!PaymentStatus::Pending.is_retryable());
    }

    #[test]
    fn test_method_flags() {
        assert!(PaymentMethod::MercadoPago.is_provider_verified());
        assert!(PaymentMethod::CashDeposit.needs_proof());
        assert!(!PaymentMethod::PayphoneLink.needs_proof());
    }
}
