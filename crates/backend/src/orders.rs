//! Orders and payment updates.

use reqwest::Method;
use secrecy::SecretString;
use serde::Serialize;
use tienda_core::models::{Order, OrderInput, Page, PaymentUpdate};
use tienda_core::{OrderId, OrderStatus};
use tracing::instrument;

use crate::{BackendClient, BackendError};

#[derive(Serialize)]
struct StatusUpdate {
    status: OrderStatus,
}

impl BackendClient {
    /// Place an order for the token's user.
    ///
    /// The backend prices the lines itself and checks stock.
    ///
    /// # Errors
    ///
    /// Returns `Api` when the backend rejects the order, or an error if the
    /// API request fails.
    #[instrument(skip(self, token, input), fields(lines = input.lines.len(), method = %input.payment_method))]
    pub async fn create_order(
        &self,
        token: &SecretString,
        input: &OrderInput,
    ) -> Result<Order, BackendError> {
        let url = self.url("/orders")?;
        self.send(self.request(Method::POST, url, Some(token)).json(input))
            .await
    }

    /// Orders placed by the token's user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn my_orders(&self, token: &SecretString) -> Result<Vec<Order>, BackendError> {
        let url = self.url("/orders/mine")?;
        self.send(self.request(Method::GET, url, Some(token))).await
    }

    /// A single order. Customers only see their own.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Unauthorized` when the order is not visible to
    /// the token, or an error if the API request fails.
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn get_order(&self, token: &SecretString, id: OrderId) -> Result<Order, BackendError> {
        let url = self.url(&format!("/orders/{id}"))?;
        self.send(self.request(Method::GET, url, Some(token))).await
    }

    /// Record the outcome of a payment attempt on the order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(
        skip(self, token, update),
        fields(order_id = %id, status = %update.status, client_tx = %update.client_transaction_id)
    )]
    pub async fn update_payment(
        &self,
        token: &SecretString,
        id: OrderId,
        update: &PaymentUpdate,
    ) -> Result<Order, BackendError> {
        let url = self.url(&format!("/orders/{id}/payment"))?;
        self.send(self.request(Method::PUT, url, Some(token)).json(update))
            .await
    }

    /// All orders, optionally filtered by status (admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn list_orders(
        &self,
        token: &SecretString,
        status: Option<OrderStatus>,
        page: u32,
    ) -> Result<Page<Order>, BackendError> {
        let mut url = self.url("/orders")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(status) = status {
                pairs.append_pair("status", status.as_str());
            }
            pairs.append_pair("page", &page.max(1).to_string());
        }
        self.send(self.request(Method::GET, url, Some(token))).await
    }

    /// Move an order to a new status (admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the backend refuses the
    /// transition.
    #[instrument(skip(self, token), fields(order_id = %id, status = %status))]
    pub async fn update_order_status(
        &self,
        token: &SecretString,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, BackendError> {
        let url = self.url(&format!("/orders/{id}/status"))?;
        self.send(
            self.request(Method::PUT, url, Some(token))
                .json(&StatusUpdate { status }),
        )
        .await
    }
}
