//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use tienda_backend::{BackendClient, BackendError};

use crate::config::StorefrontConfig;
use crate::payments::{MercadoPagoClient, MercadoPagoError, PayphoneClient, PayphoneError};

/// Error creating the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("backend client: {0}")]
    Backend(#[from] BackendError),
    #[error("payphone client: {0}")]
    Payphone(#[from] PayphoneError),
    #[error("mercado pago client: {0}")]
    MercadoPago(#[from] MercadoPagoError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and API clients.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    backend: BackendClient,
    payphone: Option<PayphoneClient>,
    mercado_pago: Option<MercadoPagoClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Provider clients are only built for providers that are configured.
    ///
    /// # Errors
    ///
    /// Returns an error if any HTTP client fails to build.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let backend = BackendClient::new(&config.backend)?;
        let payphone = config
            .payments
            .payphone
            .as_ref()
            .map(PayphoneClient::new)
            .transpose()?;
        let mercado_pago = config
            .payments
            .mercado_pago
            .as_ref()
            .map(MercadoPagoClient::new)
            .transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                backend,
                payphone,
                mercado_pago,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the commerce backend client.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    /// The Payphone client, when Payphone is configured.
    #[must_use]
    pub fn payphone(&self) -> Option<&PayphoneClient> {
        self.inner.payphone.as_ref()
    }

    /// The Mercado Pago client, when Mercado Pago is configured.
    #[must_use]
    pub fn mercado_pago(&self) -> Option<&MercadoPagoClient> {
        self.inner.mercado_pago.as_ref()
    }
}
