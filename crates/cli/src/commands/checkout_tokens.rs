//! Checkout token cleanup.
//!
//! Every checkout submission leaves a claimed token behind. Run this from
//! cron to keep the table small:
//!
//! ```bash
//! tienda-cli checkout-tokens purge --older-than-hours 72
//! ```

use chrono::{DateTime, Duration, Utc};
use tienda_storefront::db::CheckoutTokenRepository;

use super::{CliError, connect};

/// Claims made before this are purged.
#[must_use]
pub fn purge_cutoff(now: DateTime<Utc>, older_than_hours: u32) -> DateTime<Utc> {
    now - Duration::hours(i64::from(older_than_hours))
}

/// Delete token claims older than `older_than_hours`.
///
/// # Errors
///
/// Returns an error if the connection or the delete fails.
pub async fn purge(older_than_hours: u32) -> Result<(), CliError> {
    let pool = connect("STOREFRONT_DATABASE_URL").await?;
    let cutoff = purge_cutoff(Utc::now(), older_than_hours);

    let removed = CheckoutTokenRepository::new(&pool)
        .purge_before(cutoff)
        .await?;
    tracing::info!(removed, %cutoff, "Checkout tokens purged");

    #[allow(clippy::print_stdout)]
    {
        println!(
            "Purged {removed} checkout token(s) claimed before {}",
            cutoff.format("%Y-%m-%d %H:%M UTC")
        );
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_purge_cutoff() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
        assert_eq!(
            purge_cutoff(now, 72),
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
        );
    }
}
