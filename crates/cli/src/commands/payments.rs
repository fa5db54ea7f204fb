//! Payment attempt maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Expire attempts still pending after two hours
//! tienda-cli payments expire --older-than-minutes 120
//!
//! # Show recent attempts waiting for an admin
//! tienda-cli payments list --status awaiting_verification
//! ```
//!
//! Expired attempts keep `backend_synced = false`; the storefront pushes the
//! new status to the backend the next time the customer views the payment.

use chrono::{DateTime, Duration, Utc};
use tienda_core::PaymentStatus;
use tienda_storefront::db::{PaymentAttempt, PaymentAttemptRepository};

use super::{CliError, connect};

/// Cutoff for `expire`: attempts created before it are stale.
#[must_use]
pub fn expiry_cutoff(now: DateTime<Utc>, older_than_minutes: u32) -> DateTime<Utc> {
    now - Duration::minutes(i64::from(older_than_minutes))
}

/// One line of `payments list` output.
#[must_use]
pub fn format_attempt(attempt: &PaymentAttempt) -> String {
    format!(
        "{:<24} order {:<8} {:<22} {:<16} {:>12}  {}{}",
        attempt.client_tx.as_str(),
        attempt.order_id,
        attempt.status.as_str(),
        attempt.method.as_str(),
        attempt.amount().to_string(),
        attempt.created_at.format("%Y-%m-%d %H:%M"),
        if attempt.backend_synced { "" } else { "  (unsynced)" },
    )
}

/// Mark pending attempts older than `older_than_minutes` as expired.
///
/// # Errors
///
/// Returns an error if the connection or the update fails.
pub async fn expire(older_than_minutes: u32) -> Result<(), CliError> {
    let pool = connect("STOREFRONT_DATABASE_URL").await?;
    let cutoff = expiry_cutoff(Utc::now(), older_than_minutes);

    let expired = PaymentAttemptRepository::new(&pool)
        .expire_pending_before(cutoff)
        .await?;

    for attempt in &expired {
        tracing::info!(
            client_tx = %attempt.client_tx,
            order_id = %attempt.order_id,
            method = %attempt.method,
            "Payment attempt expired"
        );
    }

    #[allow(clippy::print_stdout)]
    {
        println!(
            "Expired {} pending attempt(s) created before {}",
            expired.len(),
            cutoff.format("%Y-%m-%d %H:%M UTC")
        );
    }
    Ok(())
}

/// Print recent attempts, optionally filtered by status.
///
/// # Errors
///
/// Returns an error if the connection or the query fails.
pub async fn list(status: Option<PaymentStatus>, limit: i64) -> Result<(), CliError> {
    let pool = connect("STOREFRONT_DATABASE_URL").await?;
    let attempts = PaymentAttemptRepository::new(&pool)
        .list(status, limit)
        .await?;

    #[allow(clippy::print_stdout)]
    {
        if attempts.is_empty() {
            println!("No payment attempts found");
        }
        for attempt in &attempts {
            println!("{}", format_attempt(attempt));
        }
    }
    Ok(())
}
