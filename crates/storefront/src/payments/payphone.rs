//! Payphone API client.
//!
//! Covers the two Payphone flows the storefront offers:
//!
//! - **Card link** (`/api/Links`): Payphone returns a hosted payment URL. The
//!   customer pays there and is sent back to `/payments/payphone/return`
//!   with `id` and `clientTransactionId`, which we confirm with
//!   `/api/button/V2/Confirm`.
//! - **Phone push** (`/api/Sale`): Payphone notifies the customer's app and
//!   returns a transaction ID we poll with `GET /api/Sale/{id}`.
//!
//! Amounts are integer cents and must satisfy
//! `amount = amountWithoutTax + amountWithTax + tax`.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tienda_core::{ClientTransactionId, Observation, TaxBreakdown};
use tracing::instrument;

use crate::config::PayphoneConfig;

/// Payphone transaction status code for an approved payment.
pub const STATUS_APPROVED: i32 = 3;
/// Payphone transaction status code for a canceled payment.
pub const STATUS_CANCELED: i32 = 2;

const CURRENCY: &str = "USD";

/// Errors that can occur when talking to Payphone.
#[derive(Debug, Error)]
pub enum PayphoneError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response or build the request.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Amount fields shared by link and sale requests, in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayphoneAmounts {
    pub amount: i64,
    pub amount_without_tax: i64,
    pub amount_with_tax: i64,
    pub tax: i64,
}

impl From<TaxBreakdown> for PayphoneAmounts {
    /// Every catalog item carries VAT, so the whole base goes into
    /// `amountWithTax`. With a zero rate it is all `amountWithoutTax`.
    fn from(split: TaxBreakdown) -> Self {
        if split.tax_cents == 0 {
            Self {
                amount: split.total_cents,
                amount_without_tax: split.total_cents,
                amount_with_tax: 0,
                tax: 0,
            }
        } else {
            Self {
                amount: split.total_cents,
                amount_without_tax: 0,
                amount_with_tax: split.base_cents,
                tax: split.tax_cents,
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkRequest<'a> {
    #[serde(flatten)]
    amounts: PayphoneAmounts,
    currency: &'static str,
    store_id: &'a str,
    reference: &'a str,
    client_transaction_id: &'a str,
    one_time: bool,
    expire_in: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaleRequest<'a> {
    #[serde(flatten)]
    amounts: PayphoneAmounts,
    currency: &'static str,
    store_id: &'a str,
    reference: &'a str,
    client_transaction_id: &'a str,
    phone_number: &'a str,
    country_code: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaleResponse {
    transaction_id: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmRequest<'a> {
    id: i64,
    client_tx_id: &'a str,
}

/// A Payphone transaction as returned by Confirm and Sale status.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayphoneTransaction {
    #[serde(default)]
    pub transaction_id: Option<i64>,
    #[serde(default)]
    pub client_transaction_id: Option<String>,
    #[serde(default)]
    pub status_code: Option<i32>,
    #[serde(default)]
    pub transaction_status: Option<String>,
    #[serde(default)]
    pub authorization_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl PayphoneTransaction {
    /// What this answer tells us about the payment.
    #[must_use]
    pub fn observation(&self) -> Observation {
        observation(self.status_code, self.transaction_status.as_deref())
    }
}

/// Map a Payphone status code / status name to an observation.
///
/// Either field is enough; anything unrecognised is still pending.
#[must_use]
pub fn observation(status_code: Option<i32>, transaction_status: Option<&str>) -> Observation {
    let status = transaction_status.map(str::to_ascii_lowercase);
    match (status_code, status.as_deref()) {
        (Some(STATUS_APPROVED), _) | (_, Some("approved")) => Observation::ProviderApproved,
        (Some(STATUS_CANCELED), _) | (_, Some("canceled" | "cancelled")) => {
            Observation::ProviderDeclined
        }
        _ => Observation::ProviderPending,
    }
}

/// Payphone REST client.
#[derive(Clone)]
pub struct PayphoneClient {
    client: reqwest::Client,
    api_url: String,
    store_id: String,
}

impl PayphoneClient {
    /// Create a new Payphone client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &PayphoneConfig) -> Result<Self, PayphoneError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token.expose_secret()))
            .map_err(|e| PayphoneError::Parse(format!("Invalid token format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.as_str().trim_end_matches('/').to_owned(),
            store_id: config.store_id.clone(),
        })
    }

    /// Create a one-time payment link. Returns the hosted payment URL.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Payphone rejects it.
    #[instrument(skip(self, client_tx), fields(client_tx = %client_tx))]
    pub async fn create_link(
        &self,
        client_tx: &ClientTransactionId,
        amounts: PayphoneAmounts,
        reference: &str,
    ) -> Result<String, PayphoneError> {
        let body = LinkRequest {
            amounts,
            currency: CURRENCY,
            store_id: &self.store_id,
            reference,
            client_transaction_id: client_tx.as_str(),
            one_time: true,
            expire_in: 2,
        };

        let response = self
            .client
            .post(format!("{}/api/Links", self.api_url))
            .json(&body)
            .send()
            .await?;
        let text = Self::check(response).await?;

        // The API answers with a bare JSON string, sometimes unquoted.
        let url = serde_json::from_str::<String>(&text).unwrap_or_else(|_| text.trim().to_owned());
        if !url.starts_with("https://") {
            return Err(PayphoneError::Parse(format!("unexpected link response: {url}")));
        }
        Ok(url)
    }

    /// Push a sale to the customer's Payphone app. Returns the transaction ID.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Payphone rejects it (e.g. the
    /// phone number has no Payphone account).
    #[instrument(skip(self, client_tx, phone_number), fields(client_tx = %client_tx))]
    pub async fn phone_sale(
        &self,
        client_tx: &ClientTransactionId,
        amounts: PayphoneAmounts,
        reference: &str,
        phone_number: &str,
        country_code: &str,
    ) -> Result<i64, PayphoneError> {
        let body = SaleRequest {
            amounts,
            currency: CURRENCY,
            store_id: &self.store_id,
            reference,
            client_transaction_id: client_tx.as_str(),
            phone_number,
            country_code,
        };

        let response = self
            .client
            .post(format!("{}/api/Sale", self.api_url))
            .json(&body)
            .send()
            .await?;
        let text = Self::check(response).await?;

        let sale: SaleResponse =
            serde_json::from_str(&text).map_err(|e| PayphoneError::Parse(e.to_string()))?;
        Ok(sale.transaction_id)
    }

    /// Current status of a phone sale.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response cannot be parsed.
    #[instrument(skip(self))]
    pub async fn sale_status(&self, transaction_id: i64) -> Result<PayphoneTransaction, PayphoneError> {
        let response = self
            .client
            .get(format!("{}/api/Sale/{transaction_id}", self.api_url))
            .send()
            .await?;
        let text = Self::check(response).await?;
        serde_json::from_str(&text).map_err(|e| PayphoneError::Parse(e.to_string()))
    }

    /// Confirm a card-link payment after the customer returned.
    ///
    /// Payphone reverses payments that are never confirmed, so this must be
    /// called for every return, even when the customer closed the tab and
    /// came back later.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response cannot be parsed.
    #[instrument(skip(self, client_tx), fields(client_tx = %client_tx))]
    pub async fn confirm(
        &self,
        id: i64,
        client_tx: &ClientTransactionId,
    ) -> Result<PayphoneTransaction, PayphoneError> {
        let body = ConfirmRequest {
            id,
            client_tx_id: client_tx.as_str(),
        };
        let response = self
            .client
            .post(format!("{}/api/button/V2/Confirm", self.api_url))
            .json(&body)
            .send()
            .await?;
        let text = Self::check(response).await?;
        serde_json::from_str(&text).map_err(|e| PayphoneError::Parse(e.to_string()))
    }

    async fn check(response: reqwest::Response) -> Result<String, PayphoneError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or(text);
            return Err(PayphoneError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(text)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use tienda_core::Money;

    use super::*;

    #[test]
    fn test_amounts_add_up() {
        let split = TaxBreakdown::from_gross(Money::from_cents(2875), Decimal::from_str("0.15").unwrap());
        let amounts = PayphoneAmounts::from(split);
        assert_eq!(
            amounts.amount,
            amounts.amount_without_tax + amounts.amount_with_tax + amounts.tax
        );
        assert_eq!(amounts.amount_with_tax, 2500);
        assert_eq!(amounts.tax, 375);
    }

    #[test]
    fn test_amounts_without_tax() {
        let split = TaxBreakdown::from_gross(Money::from_cents(1000), Decimal::ZERO);
        let amounts = PayphoneAmounts::from(split);
        assert_eq!(amounts.amount_without_tax, 1000);
        assert_eq!(amounts.amount_with_tax, 0);
        assert_eq!(amounts.tax, 0);
    }

    #[test]
    fn test_request_serializes_payphone_field_names() {
        let amounts = PayphoneAmounts {
            amount: 115,
            amount_without_tax: 0,
            amount_with_tax: 100,
            tax: 15,
        };
        let body = LinkRequest {
            amounts,
            currency: CURRENCY,
            store_id: "store-1",
            reference: "Order #42",
            client_transaction_id: "42-abc",
            one_time: true,
            expire_in: 2,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["amountWithTax"], 100);
        assert_eq!(json["clientTransactionId"], "42-abc");
        assert_eq!(json["storeId"], "store-1");
        assert_eq!(json["oneTime"], true);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(observation(Some(3), None), Observation::ProviderApproved);
        assert_eq!(observation(None, Some("Approved")), Observation::ProviderApproved);
        assert_eq!(observation(Some(2), Some("Canceled")), Observation::ProviderDeclined);
        assert_eq!(observation(Some(1), Some("Pending")), Observation::ProviderPending);
        assert_eq!(observation(None, None), Observation::ProviderPending);
    }

    #[test]
    fn test_confirm_response_parsing() {
        let json = r#"{
            "email": "ana@example.com", "cardType": "Credit", "statusCode": 3,
            "transactionStatus": "Approved", "transactionId": 998877,
            "clientTransactionId": "42-abcDEF123456", "authorizationCode": "W23178284",
            "amount": 2875
        }"#;
        let tx: PayphoneTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.transaction_id, Some(998_877));
        assert_eq!(tx.observation(), Observation::ProviderApproved);
    }
}
