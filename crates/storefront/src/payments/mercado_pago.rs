//! Mercado Pago Checkout Pro client and webhook verification.
//!
//! The customer is redirected to a preference's `init_point`; Mercado Pago
//! sends them back with `payment_id`, `status` and `external_reference`,
//! and separately notifies `/webhooks/mercadopago`. Neither source is
//! trusted on its own: the payment is always fetched from the API.

use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use rust_decimal::prelude::ToPrimitive;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tienda_core::{ClientTransactionId, Money, Observation};
use tracing::instrument;

use crate::config::MercadoPagoConfig;

const CURRENCY: &str = "USD";

/// Errors that can occur when talking to Mercado Pago.
#[derive(Debug, Error)]
pub enum MercadoPagoError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Payment does not exist.
    #[error("Payment not found: {0}")]
    NotFound(String),

    /// Failed to parse response or build the request.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Where Mercado Pago sends the customer and its notifications.
#[derive(Debug, Clone)]
pub struct PreferenceUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
    pub notification: String,
}

#[derive(Serialize)]
struct PreferenceItem<'a> {
    title: &'a str,
    quantity: u32,
    unit_price: f64,
    currency_id: &'static str,
}

#[derive(Serialize)]
struct BackUrls<'a> {
    success: &'a str,
    failure: &'a str,
    pending: &'a str,
}

#[derive(Serialize)]
struct PreferenceRequest<'a> {
    items: Vec<PreferenceItem<'a>>,
    external_reference: &'a str,
    back_urls: BackUrls<'a>,
    auto_return: &'static str,
    notification_url: &'a str,
}

/// A created checkout preference.
#[derive(Debug, Clone, Deserialize)]
pub struct Preference {
    pub id: String,
    pub init_point: String,
}

/// A Mercado Pago payment.
#[derive(Debug, Clone, Deserialize)]
pub struct MercadoPagoPayment {
    pub id: i64,
    pub status: String,
    #[serde(default)]
    pub status_detail: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
}

impl MercadoPagoPayment {
    /// What this payment's status tells us.
    #[must_use]
    pub fn observation(&self) -> Observation {
        observation(&self.status)
    }

    /// The client transaction ID we set as `external_reference`.
    #[must_use]
    pub fn client_tx(&self) -> Option<ClientTransactionId> {
        self.external_reference
            .as_deref()
            .and_then(|r| ClientTransactionId::parse(r).ok())
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<MercadoPagoPayment>,
}

/// Map a Mercado Pago payment status to an observation.
#[must_use]
pub fn observation(status: &str) -> Observation {
    match status {
        "approved" => Observation::ProviderApproved,
        "rejected" | "cancelled" | "refunded" | "charged_back" => Observation::ProviderDeclined,
        _ => Observation::ProviderPending,
    }
}

/// Verify a webhook `x-signature` header.
///
/// The header looks like `ts=1704908010,v1=618c8534...`; `v1` is the hex
/// HMAC-SHA256 of `id:{data.id};request-id:{x-request-id};ts:{ts};` keyed
/// with the webhook secret. Alphanumeric data IDs are signed lowercase.
#[must_use]
pub fn verify_webhook_signature(
    secret: &SecretString,
    signature_header: &str,
    request_id: &str,
    data_id: &str,
) -> bool {
    let mut ts = None;
    let mut v1 = None;
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => ts = Some(value.trim()),
            Some(("v1", value)) => v1 = Some(value.trim()),
            _ => {}
        }
    }
    let (Some(ts), Some(v1)) = (ts, v1) else {
        return false;
    };
    let Ok(expected) = hex::decode(v1) else {
        return false;
    };

    let manifest = format!(
        "id:{};request-id:{request_id};ts:{ts};",
        data_id.to_ascii_lowercase()
    );
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(manifest.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Mercado Pago REST client.
#[derive(Clone)]
pub struct MercadoPagoClient {
    client: reqwest::Client,
    api_url: String,
    webhook_secret: Option<SecretString>,
}

impl MercadoPagoClient {
    /// Create a new Mercado Pago client.
    ///
    /// # Errors
    ///
    /// Returns error if the access token is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &MercadoPagoConfig) -> Result<Self, MercadoPagoError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!(
            "Bearer {}",
            config.access_token.expose_secret()
        ))
        .map_err(|e| MercadoPagoError::Parse(format!("Invalid access token format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.as_str().trim_end_matches('/').to_owned(),
            webhook_secret: config.webhook_secret.clone(),
        })
    }

    /// The configured webhook secret, if signatures are checked.
    #[must_use]
    pub const fn webhook_secret(&self) -> Option<&SecretString> {
        self.webhook_secret.as_ref()
    }

    /// Create a Checkout Pro preference for one order.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Mercado Pago rejects it.
    #[instrument(skip(self, client_tx, urls), fields(client_tx = %client_tx))]
    pub async fn create_preference(
        &self,
        client_tx: &ClientTransactionId,
        title: &str,
        total: Money,
        urls: &PreferenceUrls,
    ) -> Result<Preference, MercadoPagoError> {
        let unit_price = total
            .amount()
            .to_f64()
            .ok_or_else(|| MercadoPagoError::Parse(format!("amount out of range: {total}")))?;

        let body = PreferenceRequest {
            items: vec![PreferenceItem {
                title,
                quantity: 1,
                unit_price,
                currency_id: CURRENCY,
            }],
            external_reference: client_tx.as_str(),
            back_urls: BackUrls {
                success: &urls.success,
                failure: &urls.failure,
                pending: &urls.pending,
            },
            auto_return: "approved",
            notification_url: &urls.notification,
        };

        let response = self
            .client
            .post(format!("{}/checkout/preferences", self.api_url))
            .header("X-Idempotency-Key", client_tx.as_str())
            .json(&body)
            .send()
            .await?;
        let text = Self::check(response).await?;
        serde_json::from_str(&text).map_err(|e| MercadoPagoError::Parse(e.to_string()))
    }

    /// Fetch a payment by ID.
    ///
    /// # Errors
    ///
    /// Returns `MercadoPagoError::NotFound` for unknown IDs, or other errors
    /// if the request fails.
    #[instrument(skip(self))]
    pub async fn get_payment(&self, payment_id: &str) -> Result<MercadoPagoPayment, MercadoPagoError> {
        if payment_id.is_empty() || !payment_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MercadoPagoError::NotFound(payment_id.to_owned()));
        }

        let response = self
            .client
            .get(format!("{}/v1/payments/{payment_id}", self.api_url))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MercadoPagoError::NotFound(payment_id.to_owned()));
        }
        let text = Self::check(response).await?;
        serde_json::from_str(&text).map_err(|e| MercadoPagoError::Parse(e.to_string()))
    }

    /// Payments created for a client transaction ID, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response cannot be parsed.
    #[instrument(skip(self, client_tx), fields(client_tx = %client_tx))]
    pub async fn search_payments(
        &self,
        client_tx: &ClientTransactionId,
    ) -> Result<Vec<MercadoPagoPayment>, MercadoPagoError> {
        let mut url = url::Url::parse(&format!("{}/v1/payments/search", self.api_url))
            .map_err(|e| MercadoPagoError::Parse(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("external_reference", client_tx.as_str())
            .append_pair("sort", "date_created")
            .append_pair("criteria", "desc");

        let response = self.client.get(url).send().await?;
        let text = Self::check(response).await?;
        let search: SearchResponse =
            serde_json::from_str(&text).map_err(|e| MercadoPagoError::Parse(e.to_string()))?;
        Ok(search.results)
    }

    async fn check(response: reqwest::Response) -> Result<String, MercadoPagoError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or(text);
            return Err(MercadoPagoError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(text)
    }
}

/// Pick the payment that decides an attempt when several exist.
///
/// An approved payment wins; otherwise the newest one (search results are
/// sorted newest first).
#[must_use]
pub fn decisive_payment(payments: &[MercadoPagoPayment]) -> Option<&MercadoPagoPayment> {
    payments
        .iter()
        .find(|p| p.status == "approved")
        .or_else(|| payments.first())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sign(secret: &str, manifest: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(manifest.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature() {
        let secret = SecretString::from("whsec".to_string());
        let v1 = sign("whsec", "id:123456;request-id:req-1;ts:1704908010;");
        let header = format!("ts=1704908010,v1={v1}");
        assert!(verify_webhook_signature(&secret, &header, "req-1", "123456"));
    }

    #[test]
    fn test_signature_uses_lowercase_data_id() {
        let secret = SecretString::from("whsec".to_string());
        let v1 = sign("whsec", "id:abc9;request-id:req-1;ts:1;");
        assert!(verify_webhook_signature(&secret, &format!("ts=1, v1={v1}"), "req-1", "ABC9"));
    }

    #[test]
    fn test_invalid_signatures() {
        let secret = SecretString::from("whsec".to_string());
        let v1 = sign("other", "id:1;request-id:r;ts:1;");
        assert!(!verify_webhook_signature(&secret, &format!("ts=1,v1={v1}"), "r", "1"));
        assert!(!verify_webhook_signature(&secret, "ts=1", "r", "1"));
        assert!(!verify_webhook_signature(&secret, "ts=1,v1=not-hex", "r", "1"));
        assert!(!verify_webhook_signature(&secret, "", "r", "1"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(observation("approved"), Observation::ProviderApproved);
        assert_eq!(observation("rejected"), Observation::ProviderDeclined);
        assert_eq!(observation("cancelled"), Observation::ProviderDeclined);
        assert_eq!(observation("in_process"), Observation::ProviderPending);
        assert_eq!(observation("authorized"), Observation::ProviderPending);
        assert_eq!(observation("pending"), Observation::ProviderPending);
    }

    #[test]
    fn test_payment_parsing_and_reference() {
        let json = r#"{"id": 1319876543, "status": "approved", "status_detail": "accredited",
                       "external_reference": "42-abcDEF123456", "transaction_amount": 28.75}"#;
        let payment: MercadoPagoPayment = serde_json::from_str(json).unwrap();
        assert_eq!(payment.client_tx().unwrap().as_str(), "42-abcDEF123456");
        assert_eq!(payment.observation(), Observation::ProviderApproved);
    }

    #[test]
    fn test_decisive_payment_prefers_approved() {
        let p = |id, status: &str| MercadoPagoPayment {
            id,
            status: status.to_string(),
            status_detail: None,
            external_reference: None,
        };
        let payments = vec![p(3, "rejected"), p(2, "approved"), p(1, "pending")];
        assert_eq!(decisive_payment(&payments).unwrap().id, 2);

        let payments = vec![p(3, "rejected"), p(1, "pending")];
        assert_eq!(decisive_payment(&payments).unwrap().id, 3);
        assert!(decisive_payment(&[]).is_none());
    }
}
