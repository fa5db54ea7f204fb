use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::types::OrderId;

/// Errors from parsing a [`ClientTransactionId`].
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ClientTransactionIdError {
    #[error("transaction id cannot be empty")]
    Empty,
    #[error("transaction id must be at most {max} characters")]
    TooLong { max: usize },
    #[error("transaction id contains invalid characters")]
    InvalidCharacter,
}

/// Our identifier for one payment attempt, sent to the provider as
/// `clientTransactionId` (Payphone) or `external_reference` (Mercado Pago).
///
/// Generated as `<order id>-<12 random alphanumerics>`, so it is unique per
/// attempt while still readable in provider dashboards.
///
/// ```
/// use tienda_core::{ClientTransactionId, OrderId};
///
/// let tx = ClientTransactionId::generate(OrderId::new(1042));
/// assert!(tx.as_str().starts_with("1042-"));
/// assert_eq!(tx.as_str().len(), "1042-".len() + 12);
///
/// assert!("abc-123".parse::<ClientTransactionId>().is_ok());
/// assert!("abc 123".parse::<ClientTransactionId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientTransactionId(String);

impl ClientTransactionId {
    /// Payphone rejects longer identifiers.
    pub const MAX_LENGTH: usize = 50;

    const SUFFIX_LENGTH: usize = 12;

    /// Generate a fresh identifier for an order.
    #[must_use]
    pub fn generate(order_id: OrderId) -> Self {
        let suffix: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(Self::SUFFIX_LENGTH)
            .map(char::from)
            .collect();
        Self(format!("{order_id}-{suffix}"))
    }

    /// Validate an identifier received from a redirect or webhook.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty, longer than
    /// [`Self::MAX_LENGTH`], or contains anything but ASCII alphanumerics
    /// and `-`.
    pub fn parse(s: &str) -> Result<Self, ClientTransactionIdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ClientTransactionIdError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(ClientTransactionIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ClientTransactionIdError::InvalidCharacter);
        }
        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The order ID prefix, when the identifier was generated by us.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        self.0.split_once('-')?.0.parse().ok()
    }
}

impl fmt::Display for ClientTransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClientTransactionId {
    type Err = ClientTransactionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ClientTransactionId {
    type Error = ClientTransactionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ClientTransactionId> for String {
    fn from(id: ClientTransactionId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_unique_and_valid() {
        let a = ClientTransactionId::generate(OrderId::new(7));
        let b = ClientTransactionId::generate(OrderId::new(7));
        assert_ne!(a, b);
        assert_eq!(ClientTransactionId::parse(a.as_str()).unwrap(), a);
        assert_eq!(a.order_id(), Some(OrderId::new(7)));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(
            ClientTransactionId::parse(""),
            Err(ClientTransactionIdError::Empty)
        );
        assert_eq!(
            ClientTransactionId::parse("null; drop"),
            Err(ClientTransactionIdError::InvalidCharacter)
        );
        assert!(matches!(
            ClientTransactionId::parse(&"a".repeat(51)),
            Err(ClientTransactionIdError::TooLong { .. })
        ));
        assert!(ClientTransactionId::parse(&"a".repeat(50)).is_ok());
    }

    #[test]
    fn test_order_id_missing_for_foreign_ids() {
        let tx = ClientTransactionId::parse("abc").unwrap();
        assert_eq!(tx.order_id(), None);
    }
}
