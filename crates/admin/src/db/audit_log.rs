//! Audit log of admin mutations.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tienda_core::{AuditLogId, UserId};

use super::RepositoryError;

/// What an admin did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    CategoryCreated,
    CategoryUpdated,
    CategoryDeleted,
    UserRoleChanged,
    UserActivated,
    UserDeactivated,
    OrderStatusChanged,
    PaymentApproved,
    PaymentRejected,
}

impl AuditAction {
    const ALL: &'static [Self] = &[
        Self::ProductCreated,
        Self::ProductUpdated,
        Self::ProductDeleted,
        Self::CategoryCreated,
        Self::CategoryUpdated,
        Self::CategoryDeleted,
        Self::UserRoleChanged,
        Self::UserActivated,
        Self::UserDeactivated,
        Self::OrderStatusChanged,
        Self::PaymentApproved,
        Self::PaymentRejected,
    ];

    /// Name stored in the `action` column.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ProductCreated => "product_created",
            Self::ProductUpdated => "product_updated",
            Self::ProductDeleted => "product_deleted",
            Self::CategoryCreated => "category_created",
            Self::CategoryUpdated => "category_updated",
            Self::CategoryDeleted => "category_deleted",
            Self::UserRoleChanged => "user_role_changed",
            Self::UserActivated => "user_activated",
            Self::UserDeactivated => "user_deactivated",
            Self::OrderStatusChanged => "order_status_changed",
            Self::PaymentApproved => "payment_approved",
            Self::PaymentRejected => "payment_rejected",
        }
    }

    /// Human-readable label for the dashboard.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ProductCreated => "Created product",
            Self::ProductUpdated => "Updated product",
            Self::ProductDeleted => "Deleted product",
            Self::CategoryCreated => "Created category",
            Self::CategoryUpdated => "Updated category",
            Self::CategoryDeleted => "Deleted category",
            Self::UserRoleChanged => "Changed user role",
            Self::UserActivated => "Activated user",
            Self::UserDeactivated => "Deactivated user",
            Self::OrderStatusChanged => "Changed order status",
            Self::PaymentApproved => "Approved payment",
            Self::PaymentRejected => "Rejected payment",
        }
    }

    /// Kind of entity the action targets.
    #[must_use]
    pub const fn target_type(&self) -> &'static str {
        match self {
            Self::ProductCreated | Self::ProductUpdated | Self::ProductDeleted => "product",
            Self::CategoryCreated | Self::CategoryUpdated | Self::CategoryDeleted => "category",
            Self::UserRoleChanged | Self::UserActivated | Self::UserDeactivated => "user",
            Self::OrderStatusChanged | Self::PaymentApproved | Self::PaymentRejected => "order",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("invalid audit action: {s}"))
    }
}

/// A recorded admin mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: AuditLogId,
    pub admin_id: UserId,
    pub admin_email: String,
    pub action: AuditAction,
    pub target_id: i64,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Admin page for the target, if it still has one.
    #[must_use]
    pub fn target_href(&self) -> Option<String> {
        match self.action {
            AuditAction::ProductDeleted | AuditAction::CategoryDeleted => None,
            AuditAction::CategoryCreated | AuditAction::CategoryUpdated => {
                Some("/categories".to_string())
            }
            AuditAction::UserRoleChanged
            | AuditAction::UserActivated
            | AuditAction::UserDeactivated => Some("/users".to_string()),
            AuditAction::ProductCreated | AuditAction::ProductUpdated => {
                Some(format!("/products/{}/edit", self.target_id))
            }
            AuditAction::OrderStatusChanged
            | AuditAction::PaymentApproved
            | AuditAction::PaymentRejected => Some(format!("/orders/{}", self.target_id)),
        }
    }
}

/// Insert payload.
#[derive(Debug, Clone)]
pub struct NewAuditEntry<'a> {
    pub admin_id: UserId,
    pub admin_email: &'a str,
    pub action: AuditAction,
    pub target_id: i64,
    pub details: Option<String>,
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: i64,
    admin_id: i64,
    admin_email: String,
    action: String,
    target_id: i64,
    details: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = RepositoryError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: AuditLogId::new(row.id),
            admin_id: UserId::new(row.admin_id),
            admin_email: row.admin_email,
            action: row.action.parse().map_err(|e: String| {
                RepositoryError::DataCorruption(format!("audit_log {}: {e}", row.id))
            })?,
            target_id: row.target_id,
            details: row.details,
            created_at: row.created_at,
        })
    }
}

/// Repository for the audit log.
pub struct AuditLogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AuditLogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(&self, entry: &NewAuditEntry<'_>) -> Result<AuditLogId, RepositoryError> {
        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO admin.audit_log (admin_id, admin_email, action, target_type, target_id, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(entry.admin_id.as_i64())
        .bind(entry.admin_email)
        .bind(entry.action.as_str())
        .bind(entry.action.target_type())
        .bind(entry.target_id)
        .bind(entry.details.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(AuditLogId::new(id))
    }

    /// Most recent entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or a row is corrupt.
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditEntry>, RepositoryError> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r"
            SELECT id, admin_id, admin_email, action, target_id, details, created_at
            FROM admin.audit_log
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }

    /// Entries for one target, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or a row is corrupt.
    pub async fn for_target(
        &self,
        target_type: &str,
        target_id: i64,
    ) -> Result<Vec<AuditEntry>, RepositoryError> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r"
            SELECT id, admin_id, admin_email, action, target_id, details, created_at
            FROM admin.audit_log
            WHERE target_type = $1 AND target_id = $2
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(target_type)
        .bind(target_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_match_migration() {
        let migration = include_str!("../../migrations/20260302000002_audit_log.sql");
        for action in AuditAction::ALL {
            assert!(migration.contains(&format!("'{}'", action.as_str())), "{action}");
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), *action);
        }
        assert!("dropped_tables".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_target_href() {
        let entry = |action, target_id| AuditEntry {
            id: AuditLogId::new(1),
            admin_id: UserId::new(1),
            admin_email: "admin@tienda.ec".to_string(),
            action,
            target_id,
            details: None,
            created_at: Utc::now(),
        };
        assert_eq!(
            entry(AuditAction::PaymentApproved, 42).target_href().as_deref(),
            Some("/orders/42")
        );
        assert_eq!(
            entry(AuditAction::ProductUpdated, 7).target_href().as_deref(),
            Some("/products/7/edit")
        );
        assert_eq!(entry(AuditAction::ProductDeleted, 7).target_href(), None);
    }
}
