//! One-time checkout tokens.
//!
//! `GET /checkout` puts a random token in the session and the form. Posting
//! the form claims the token here before anything else happens, so a double
//! click or a replayed request can never create a second order.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tienda_core::{ClientTransactionId, UserId};

use super::RepositoryError;

/// Repository for checkout token claims.
pub struct CheckoutTokenRepository<'a> {
    pool: &'a PgPool,
}

/// A token that was already claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedToken {
    pub user_id: UserId,
    /// Set once the submission created its payment attempt.
    pub client_tx: Option<ClientTransactionId>,
}

impl<'a> CheckoutTokenRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Claim a token. Returns `false` if it was claimed before.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn claim(&self, token: &str, user_id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO storefront.checkout_token (token, user_id)
            VALUES ($1, $2)
            ON CONFLICT (token) DO NOTHING
            ",
        )
        .bind(token)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Record the attempt a claimed token produced.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn link(
        &self,
        token: &str,
        client_tx: &ClientTransactionId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE storefront.checkout_token SET client_tx = $2 WHERE token = $1")
            .bind(token)
            .bind(client_tx.as_str())
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Drop the claim of a submission that failed before creating an order.
    ///
    /// The session's copy of the token is already spent, so the same form
    /// cannot be posted again; the customer reloads the checkout page to get
    /// a fresh token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn release(&self, token: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "DELETE FROM storefront.checkout_token WHERE token = $1 AND client_tx IS NULL",
        )
        .bind(token)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Delete claims made before `cutoff`. Returns how many were removed.
    ///
    /// Purged tokens stay unusable: their session copy was removed when they
    /// were claimed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.checkout_token WHERE created_at < $1")
            .bind(cutoff)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Look up a claimed token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `DataCorruption` if the stored transaction ID is invalid.
    pub async fn find(&self, token: &str) -> Result<Option<ClaimedToken>, RepositoryError> {
        let row: Option<(i64, Option<String>)> = sqlx::query_as(
            "SELECT user_id, client_tx FROM storefront.checkout_token WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        row.map(|(user_id, client_tx)| {
            let client_tx = client_tx
                .map(|tx| {
                    ClientTransactionId::parse(&tx).map_err(|e| {
                        RepositoryError::DataCorruption(format!("invalid client_tx: {e}"))
                    })
                })
                .transpose()?;
            Ok(ClaimedToken {
                user_id: UserId::new(user_id),
                client_tx,
            })
        })
        .transpose()
    }
}
