//! Provider webhooks.
//!
//! Webhooks carry no customer session, so changes made here reach the
//! backend on the customer's next visit to the status page.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use tracing::instrument;

use crate::db::{PaymentAttemptRepository, StatusChange};
use crate::payments::{MercadoPagoError, mercado_pago};
use crate::services::Reconciler;
use crate::state::AppState;

/// Mercado Pago notification body.
#[derive(Debug, Default, Deserialize)]
pub struct MercadoPagoNotification {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub data: Option<NotificationData>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationData {
    /// Sent as a string or a number depending on the notification version.
    pub id: serde_json::Value,
}

impl NotificationData {
    fn id_string(&self) -> Option<String> {
        match &self.id {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// The payment ID and topic of a notification, preferring query parameters
/// (`data.id`, `type` or the legacy `topic`/`id`) as Mercado Pago signs those.
fn notification_target(
    query: &HashMap<String, String>,
    body: &MercadoPagoNotification,
) -> (Option<String>, Option<String>) {
    let id = query
        .get("data.id")
        .or_else(|| query.get("id"))
        .cloned()
        .or_else(|| body.data.as_ref().and_then(NotificationData::id_string));
    let kind = query
        .get("type")
        .or_else(|| query.get("topic"))
        .cloned()
        .or_else(|| body.kind.clone());
    (id, kind)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Receive a Mercado Pago payment notification.
///
/// Answers 200 for anything we do not track so Mercado Pago stops
/// retrying, 401 for a bad signature, and 502 when the payment cannot be
/// fetched so it retries later.
#[instrument(skip_all)]
pub async fn mercadopago(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(client) = state.mercado_pago() else {
        tracing::debug!("Mercado Pago webhook received but Mercado Pago is not configured");
        return StatusCode::OK;
    };

    let notification: MercadoPagoNotification = if body.is_empty() {
        MercadoPagoNotification::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed Mercado Pago notification");
                return StatusCode::BAD_REQUEST;
            }
        }
    };

    let (Some(payment_id), kind) = notification_target(&query, &notification) else {
        return StatusCode::OK;
    };

    if let Some(secret) = client.webhook_secret() {
        let valid = mercado_pago::verify_webhook_signature(
            secret,
            header(&headers, "x-signature"),
            header(&headers, "x-request-id"),
            &payment_id,
        );
        if !valid {
            tracing::warn!(%payment_id, "Mercado Pago webhook signature mismatch");
            return StatusCode::UNAUTHORIZED;
        }
    }

    if kind.as_deref().is_some_and(|k| k != "payment") {
        tracing::debug!(?kind, action = ?notification.action, "Ignoring Mercado Pago notification");
        return StatusCode::OK;
    }

    let payment = match client.get_payment(&payment_id).await {
        Ok(payment) => payment,
        Err(MercadoPagoError::NotFound(_)) => return StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, %payment_id, "Mercado Pago webhook lookup failed");
            return StatusCode::BAD_GATEWAY;
        }
    };

    let Some(client_tx) = payment.client_tx() else {
        return StatusCode::OK;
    };
    let attempt = match PaymentAttemptRepository::new(state.pool())
        .find_by_client_tx(&client_tx)
        .await
    {
        Ok(Some(attempt)) => attempt,
        Ok(None) => {
            tracing::info!(%client_tx, "Mercado Pago webhook for unknown transaction");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load payment attempt");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let provider_ref = payment.id.to_string();
    let change = StatusChange {
        provider_ref: Some(&provider_ref),
        note: payment.status_detail.as_deref(),
        ..StatusChange::default()
    };
    match Reconciler::new(&state)
        .apply(attempt, payment.observation(), change, None)
        .await
    {
        Ok(attempt) => {
            tracing::info!(%client_tx, status = %attempt.status, "Mercado Pago webhook applied");
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to apply Mercado Pago webhook");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_target_prefers_query_parameters() {
        let body: MercadoPagoNotification =
            serde_json::from_str(r#"{"type":"payment","data":{"id":"111"}}"#).unwrap();
        let query = HashMap::from([
            ("data.id".to_string(), "222".to_string()),
            ("type".to_string(), "payment".to_string()),
        ]);
        let (id, kind) = notification_target(&query, &body);
        assert_eq!(id.as_deref(), Some("222"));
        assert_eq!(kind.as_deref(), Some("payment"));
    }

    #[test]
    fn test_target_reads_numeric_body_id() {
        let body: MercadoPagoNotification =
            serde_json::from_str(r#"{"type":"payment","action":"payment.updated","data":{"id":12345}}"#)
                .unwrap();
        let (id, kind) = notification_target(&HashMap::new(), &body);
        assert_eq!(id.as_deref(), Some("12345"));
        assert_eq!(kind.as_deref(), Some("payment"));
    }

    #[test]
    fn test_target_legacy_topic() {
        let query = HashMap::from([
            ("id".to_string(), "999".to_string()),
            ("topic".to_string(), "merchant_order".to_string()),
        ]);
        let (id, kind) = notification_target(&query, &MercadoPagoNotification::default());
        assert_eq!(id.as_deref(), Some("999"));
        assert_eq!(kind.as_deref(), Some("merchant_order"));
    }
}
