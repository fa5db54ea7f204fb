//! Session-related types.
//!
//! Types stored in the session for authentication state, the cart and
//! one-shot flash messages.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use tienda_core::{Email, UserId};

/// Session-stored customer identity.
///
/// Holds the backend bearer token so account and checkout handlers can call
/// the backend on the customer's behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    /// Backend user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Customer's email address.
    pub email: Email,
    /// Backend bearer token.
    #[serde(serialize_with = "serialize_token", deserialize_with = "deserialize_token")]
    pub token: SecretString,
}

fn serialize_token<S: Serializer>(token: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(token.expose_secret())
}

fn deserialize_token<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

/// Flash message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Info,
    Error,
}

/// A message shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    /// Tailwind classes for the banner.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self.kind {
            FlashKind::Success => "bg-green-50 text-green-800 border-green-200",
            FlashKind::Info => "bg-blue-50 text-blue-800 border-blue-200",
            FlashKind::Error => "bg-red-50 text-red-800 border-red-200",
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Key for the cart.
    pub const CART: &str = "cart";

    /// Key for the one-time checkout form token.
    pub const CHECKOUT_TOKEN: &str = "checkout_token";

    /// Key for the pending flash message.
    pub const FLASH: &str = "flash";

    /// Where to go after logging in.
    pub const RETURN_TO: &str = "return_to";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_roundtrips_token_through_session_json() {
        let customer = CurrentCustomer {
            id: UserId::new(5),
            name: "Ana".to_string(),
            email: Email::parse("ana@example.com").unwrap(),
            token: SecretString::from("tok-123".to_string()),
        };
        let json = serde_json::to_value(&customer).unwrap();
        let restored: CurrentCustomer = serde_json::from_value(json).unwrap();
        assert_eq!(restored.token.expose_secret(), "tok-123");
        assert_eq!(restored.id, customer.id);
    }

    #[test]
    fn test_customer_debug_redacts_token() {
        let customer = CurrentCustomer {
            id: UserId::new(5),
            name: "Ana".to_string(),
            email: Email::parse("ana@example.com").unwrap(),
            token: SecretString::from("tok-123".to_string()),
        };
        assert!(!format!("{customer:?}").contains("tok-123"));
    }
}
