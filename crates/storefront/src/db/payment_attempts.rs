//! Payment attempt repository.
//!
//! One row per [`ClientTransactionId`]. Status changes are compare-and-set
//! on the previous status so a webhook and a poll racing on the same
//! attempt cannot overwrite each other. A retry links the failed attempt
//! to its replacement through `superseded_by`, at most once.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use tienda_core::{
    ClientTransactionId, Money, OrderId, PaymentAttemptId, PaymentMethod, PaymentStatus, UserId,
};

use super::RepositoryError;

const COLUMNS: &str = "id, client_tx, order_id, user_id, method, status, amount_cents, \
                       provider_ref, redirect_url, proof_reference, note, poll_count, \
                       backend_synced, superseded_by, created_at, updated_at";

/// A locally tracked payment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAttempt {
    pub id: PaymentAttemptId,
    pub client_tx: ClientTransactionId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    /// Provider transaction or payment ID.
    pub provider_ref: Option<String>,
    /// Hosted payment page, for card links and Mercado Pago.
    pub redirect_url: Option<String>,
    /// Deposit reference or crypto transaction hash.
    pub proof_reference: Option<String>,
    pub note: Option<String>,
    pub poll_count: u32,
    /// Whether the backend order reflects `status`.
    pub backend_synced: bool,
    /// The attempt a retry replaced this one with.
    pub superseded_by: Option<PaymentAttemptId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentAttempt {
    #[must_use]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Insert payload for a new attempt.
#[derive(Debug, Clone)]
pub struct NewPaymentAttempt {
    pub client_tx: ClientTransactionId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub method: PaymentMethod,
    pub amount_cents: i64,
}

/// A status change to persist.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusChange<'a> {
    pub provider_ref: Option<&'a str>,
    pub proof_reference: Option<&'a str>,
    pub note: Option<&'a str>,
}

#[derive(sqlx::FromRow)]
struct PaymentAttemptRow {
    id: i64,
    client_tx: String,
    order_id: i64,
    user_id: i64,
    method: String,
    status: String,
    amount_cents: i64,
    provider_ref: Option<String>,
    redirect_url: Option<String>,
    proof_reference: Option<String>,
    note: Option<String>,
    poll_count: i32,
    backend_synced: bool,
    superseded_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentAttemptRow> for PaymentAttempt {
    type Error = RepositoryError;

    fn try_from(row: PaymentAttemptRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, e: String| {
            RepositoryError::DataCorruption(format!("invalid {field} in payment_attempt {}: {e}", row.id))
        };

        Ok(Self {
            id: PaymentAttemptId::new(row.id),
            client_tx: ClientTransactionId::parse(&row.client_tx)
                .map_err(|e| corrupt("client_tx", e.to_string()))?,
            order_id: OrderId::new(row.order_id),
            user_id: UserId::new(row.user_id),
            method: row.method.parse().map_err(|e| corrupt("method", e))?,
            status: row.status.parse().map_err(|e| corrupt("status", e))?,
            amount_cents: row.amount_cents,
            provider_ref: row.provider_ref,
            redirect_url: row.redirect_url,
            proof_reference: row.proof_reference,
            note: row.note,
            poll_count: u32::try_from(row.poll_count).unwrap_or(0),
            backend_synced: row.backend_synced,
            superseded_by: row.superseded_by.map(PaymentAttemptId::new),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

async fn insert_row<'e, E>(
    executor: E,
    new: &NewPaymentAttempt,
) -> Result<PaymentAttemptRow, RepositoryError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as(&format!(
        r"
        INSERT INTO storefront.payment_attempt
            (client_tx, order_id, user_id, method, status, amount_cents)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {COLUMNS}
        "
    ))
    .bind(new.client_tx.as_str())
    .bind(new.order_id)
    .bind(new.user_id)
    .bind(new.method.as_str())
    .bind(PaymentStatus::Pending.as_str())
    .bind(new.amount_cents)
    .fetch_one(executor)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict("client_tx already exists".to_owned());
        }
        RepositoryError::Database(e)
    })
}

fn convert_all(rows: Vec<PaymentAttemptRow>) -> Result<Vec<PaymentAttempt>, RepositoryError> {
    rows.into_iter().map(PaymentAttempt::try_from).collect()
}

/// Repository for payment attempt database operations.
pub struct PaymentAttemptRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentAttemptRepository<'a> {
    /// Create a new payment attempt repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new pending attempt.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the client transaction ID
    /// already exists, or `RepositoryError::Database` for other failures.
    pub async fn insert(&self, new: &NewPaymentAttempt) -> Result<PaymentAttempt, RepositoryError> {
        insert_row(self.pool, new).await?.try_into()
    }

    /// Insert the replacement for a failed attempt.
    ///
    /// The new row and the link from `previous` commit together, and only
    /// if `previous` still has the status the caller saw and has not been
    /// superseded yet. Returns `None` when another retry won.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the client transaction ID
    /// already exists, or `RepositoryError::Database` for other failures.
    pub async fn insert_superseding(
        &self,
        previous: &PaymentAttempt,
        new: &NewPaymentAttempt,
    ) -> Result<Option<PaymentAttempt>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let row = insert_row(&mut *tx, new).await?;

        // Row lock: a concurrent retry waits here, then sees superseded_by set.
        let claimed = sqlx::query(
            r"
            UPDATE storefront.payment_attempt
            SET superseded_by = $2, updated_at = now()
            WHERE id = $1 AND status = $3 AND superseded_by IS NULL
            ",
        )
        .bind(previous.id)
        .bind(row.id)
        .bind(previous.status.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            tx.rollback().await?;
            return Ok(None);
        }
        tx.commit().await?;
        row.try_into().map(Some)
    }

    /// Get an attempt by its client transaction ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_client_tx(
        &self,
        client_tx: &ClientTransactionId,
    ) -> Result<Option<PaymentAttempt>, RepositoryError> {
        let row: Option<PaymentAttemptRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM storefront.payment_attempt WHERE client_tx = $1"
        ))
        .bind(client_tx.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(PaymentAttempt::try_from).transpose()
    }

    /// Get the most recent attempt for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<PaymentAttempt>, RepositoryError> {
        let row: Option<PaymentAttemptRow> = sqlx::query_as(&format!(
            r"
            SELECT {COLUMNS} FROM storefront.payment_attempt
            WHERE order_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(PaymentAttempt::try_from).transpose()
    }

    /// Move an attempt from `from` to `to`.
    ///
    /// Returns `None` when the attempt is no longer in `from`, i.e. another
    /// request changed it first. Marks the attempt as not yet synced with
    /// the backend.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transition(
        &self,
        id: PaymentAttemptId,
        from: PaymentStatus,
        to: PaymentStatus,
        change: StatusChange<'_>,
    ) -> Result<Option<PaymentAttempt>, RepositoryError> {
        let row: Option<PaymentAttemptRow> = sqlx::query_as(&format!(
            r"
            UPDATE storefront.payment_attempt
            SET status = $3,
                provider_ref = COALESCE($4, provider_ref),
                proof_reference = COALESCE($5, proof_reference),
                note = COALESCE($6, note),
                backend_synced = FALSE,
                updated_at = now()
            WHERE id = $1 AND status = $2
            RETURNING {COLUMNS}
            "
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(change.provider_ref)
        .bind(change.proof_reference)
        .bind(change.note)
        .fetch_optional(self.pool)
        .await?;

        row.map(PaymentAttempt::try_from).transpose()
    }

    /// Store what the provider returned when the attempt was started.
    ///
    /// Returns the updated attempt. A changed reference also clears
    /// `backend_synced` so the backend learns it on the next sync.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the attempt does not exist.
    pub async fn set_provider_details(
        &self,
        id: PaymentAttemptId,
        provider_ref: Option<&str>,
        redirect_url: Option<&str>,
    ) -> Result<PaymentAttempt, RepositoryError> {
        let row: Option<PaymentAttemptRow> = sqlx::query_as(&format!(
            r"
            UPDATE storefront.payment_attempt
            SET backend_synced = backend_synced
                    AND provider_ref IS NOT DISTINCT FROM COALESCE($2, provider_ref),
                provider_ref = COALESCE($2, provider_ref),
                redirect_url = COALESCE($3, redirect_url),
                updated_at = now()
            WHERE id = $1
            RETURNING {COLUMNS}
            "
        ))
        .bind(id)
        .bind(provider_ref)
        .bind(redirect_url)
        .fetch_optional(self.pool)
        .await?;

        row.map_or(Err(RepositoryError::NotFound), PaymentAttempt::try_from)
    }

    /// Count one more provider check and return the new total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the attempt does not exist.
    pub async fn record_poll(&self, id: PaymentAttemptId) -> Result<u32, RepositoryError> {
        let count: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE storefront.payment_attempt
            SET poll_count = poll_count + 1, updated_at = now()
            WHERE id = $1
            RETURNING poll_count
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        count
            .map(|c| u32::try_from(c).unwrap_or(0))
            .ok_or(RepositoryError::NotFound)
    }

    /// Mark the attempt as mirrored to the backend, unless its status moved
    /// on since `status` was sent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_synced(
        &self,
        id: PaymentAttemptId,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE storefront.payment_attempt
            SET backend_synced = TRUE
            WHERE id = $1 AND status = $2
            ",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Expire pending attempts created before `cutoff`.
    ///
    /// Returns the expired attempts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn expire_pending_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PaymentAttempt>, RepositoryError> {
        let rows: Vec<PaymentAttemptRow> = sqlx::query_as(&format!(
            r"
            UPDATE storefront.payment_attempt
            SET status = $1, backend_synced = FALSE, updated_at = now()
            WHERE status = $2 AND created_at < $3
            RETURNING {COLUMNS}
            "
        ))
        .bind(PaymentStatus::Expired.as_str())
        .bind(PaymentStatus::Pending.as_str())
        .bind(cutoff)
        .fetch_all(self.pool)
        .await?;

        convert_all(rows)
    }

    /// List attempts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<PaymentStatus>,
        limit: i64,
    ) -> Result<Vec<PaymentAttempt>, RepositoryError> {
        let rows: Vec<PaymentAttemptRow> = sqlx::query_as(&format!(
            r"
            SELECT {COLUMNS} FROM storefront.payment_attempt
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        convert_all(rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(method: &str, status: &str) -> PaymentAttemptRow {
        PaymentAttemptRow {
            id: 9,
            client_tx: "42-abcDEF123456".to_string(),
            order_id: 42,
            user_id: 7,
            method: method.to_string(),
            status: status.to_string(),
            amount_cents: 2599,
            provider_ref: Some("PP-1".to_string()),
            redirect_url: None,
            proof_reference: None,
            note: None,
            poll_count: 3,
            backend_synced: false,
            superseded_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_conversion() {
        let attempt = PaymentAttempt::try_from(row("payphone_phone", "awaiting_verification")).unwrap();
        assert_eq!(attempt.method, PaymentMethod::PayphonePhone);
        assert_eq!(attempt.status, PaymentStatus::AwaitingVerification);
        assert_eq!(attempt.order_id, OrderId::new(42));
        assert_eq!(attempt.amount().to_string(), "$25.99");
        assert_eq!(attempt.poll_count, 3);
    }

    #[test]
    fn test_row_conversion_rejects_unknown_values() {
        assert!(matches!(
            PaymentAttempt::try_from(row("paypal", "pending")),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert!(matches!(
            PaymentAttempt::try_from(row("cash_deposit", "lost")),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
