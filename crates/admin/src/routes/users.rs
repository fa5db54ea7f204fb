//! User management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tienda_core::models::User;
use tienda_core::{UserId, UserRole};
use tower_sessions::Session;
use tracing::instrument;

use super::products::is_rejection;
use super::record_audit;
use crate::components::data_table::users_table_config;
use crate::components::{DataTableConfig, Pagination};
use crate::db::AuditAction;
use crate::error::Result;
use crate::filters;
use crate::middleware::{PageContext, RequireAdminAuth, set_flash};
use crate::models::{CurrentAdmin, Flash};
use crate::state::AppState;

/// Query parameters for the user list.
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u32>,
}

/// User list page template.
#[derive(Template, WebTemplate)]
#[template(path = "users/index.html")]
pub struct UsersTemplate {
    pub ctx: PageContext,
    pub table: DataTableConfig,
    pub users: Vec<User>,
    pub pagination: Pagination,
    pub roles: &'static [UserRole],
    /// The signed-in admin, whose own row has no controls.
    pub self_id: UserId,
}

/// Role change form.
#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub role: UserRole,
}

/// Activation form.
#[derive(Debug, Deserialize)]
pub struct ActiveForm {
    pub active: bool,
}

/// A change an admin is about to make to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserChange {
    Role(UserRole),
    Active(bool),
}

/// Reason to refuse a change, if any.
///
/// Admins cannot lock themselves out: no self-demotion and no
/// self-deactivation.
#[must_use]
pub fn refuse_change(admin: &CurrentAdmin, target: UserId, change: UserChange) -> Option<&'static str> {
    if admin.id != target {
        return None;
    }
    match change {
        UserChange::Role(role) if role != UserRole::Admin => {
            Some("You cannot remove your own admin role.")
        }
        UserChange::Active(false) => Some("You cannot deactivate your own account."),
        _ => None,
    }
}

/// User list page.
///
/// GET /users
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    ctx: PageContext,
    Query(query): Query<UserListQuery>,
) -> Result<UsersTemplate> {
    let page = state
        .backend()
        .list_users(&admin.token, query.page.unwrap_or(1).max(1))
        .await?;

    let table = users_table_config();
    let pagination = table.pagination(&page);

    Ok(UsersTemplate {
        ctx,
        table,
        users: page.items,
        pagination,
        roles: UserRole::ALL,
        self_id: admin.id,
    })
}

/// Change a user's role.
///
/// POST /users/{id}/role
#[instrument(skip_all, fields(user_id = id))]
pub async fn change_role(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
    Path(id): Path<i64>,
    Form(form): Form<RoleForm>,
) -> Result<Redirect> {
    let id = UserId::new(id);
    if let Some(reason) = refuse_change(&admin, id, UserChange::Role(form.role)) {
        set_flash(&session, Flash::error(reason)).await;
        return Ok(Redirect::to("/users"));
    }

    match state
        .backend()
        .update_user_role(&admin.token, id, form.role)
        .await
    {
        Ok(user) => {
            record_audit(
                &state,
                &admin,
                AuditAction::UserRoleChanged,
                id.as_i64(),
                Some(format!("{} is now {}", user.email, user.role)),
            )
            .await;
            set_flash(
                &session,
                Flash::success(format!("{} is now {}.", user.name, user.role)),
            )
            .await;
        }
        Err(e) if is_rejection(&e) => {
            set_flash(&session, Flash::error(e.user_message())).await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to("/users"))
}

/// Activate or deactivate a user.
///
/// POST /users/{id}/active
#[instrument(skip_all, fields(user_id = id))]
pub async fn set_active(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
    Path(id): Path<i64>,
    Form(form): Form<ActiveForm>,
) -> Result<Redirect> {
    let id = UserId::new(id);
    if let Some(reason) = refuse_change(&admin, id, UserChange::Active(form.active)) {
        set_flash(&session, Flash::error(reason)).await;
        return Ok(Redirect::to("/users"));
    }

    match state
        .backend()
        .set_user_active(&admin.token, id, form.active)
        .await
    {
        Ok(user) => {
            let (action, verb) = if user.active {
                (AuditAction::UserActivated, "activated")
            } else {
                (AuditAction::UserDeactivated, "deactivated")
            };
            record_audit(&state, &admin, action, id.as_i64(), Some(user.email.to_string())).await;
            set_flash(&session, Flash::success(format!("{} {verb}.", user.name))).await;
        }
        Err(e) if is_rejection(&e) => {
            set_flash(&session, Flash::error(e.user_message())).await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to("/users"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use tienda_core::Email;

    fn admin() -> CurrentAdmin {
        CurrentAdmin {
            id: UserId::new(1),
            email: Email::parse("admin@tienda.ec").unwrap(),
            name: "Admin".to_string(),
            token: SecretString::from("t".to_string()),
        }
    }

    #[test]
    fn test_admin_cannot_lock_themselves_out() {
        let me = UserId::new(1);
        assert!(refuse_change(&admin(), me, UserChange::Role(UserRole::Customer)).is_some());
        assert!(refuse_change(&admin(), me, UserChange::Active(false)).is_some());
        assert!(refuse_change(&admin(), me, UserChange::Role(UserRole::Admin)).is_none());
        assert!(refuse_change(&admin(), me, UserChange::Active(true)).is_none());
    }

    #[test]
    fn test_other_users_can_be_changed() {
        let other = UserId::new(2);
        assert!(refuse_change(&admin(), other, UserChange::Role(UserRole::Customer)).is_none());
        assert!(refuse_change(&admin(), other, UserChange::Active(false)).is_none());
    }
}
