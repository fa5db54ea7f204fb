//! Category management route handlers.
//!
//! Categories are small enough to edit inline on the list page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::Redirect,
};
use serde::Deserialize;
use tienda_core::CategoryId;
use tienda_core::models::{Category, CategoryInput};
use tower_sessions::Session;
use tracing::instrument;

use super::products::is_rejection;
use super::record_audit;
use crate::components::DataTableConfig;
use crate::components::data_table::categories_table_config;
use crate::db::AuditAction;
use crate::error::Result;
use crate::filters;
use crate::middleware::{PageContext, RequireAdminAuth, set_flash};
use crate::models::Flash;
use crate::state::AppState;

/// Category create/update form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CategoryForm {
    /// Trimmed backend payload.
    ///
    /// # Errors
    ///
    /// Returns the validation errors joined for a flash message.
    pub fn to_input(&self) -> std::result::Result<CategoryInput, String> {
        let description = self.description.trim();
        let input = CategoryInput {
            name: self.name.trim().to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
        };
        let errors = input.validate();
        if errors.is_empty() {
            Ok(input)
        } else {
            Err(errors.join(". "))
        }
    }
}

/// Category list page template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/index.html")]
pub struct CategoriesTemplate {
    pub ctx: PageContext,
    pub table: DataTableConfig,
    pub categories: Vec<Category>,
}

/// Category list with inline create and edit forms.
///
/// GET /categories
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    ctx: PageContext,
) -> Result<CategoriesTemplate> {
    Ok(CategoriesTemplate {
        ctx,
        table: categories_table_config(),
        categories: state.backend().list_categories().await?,
    })
}

/// Create a category.
///
/// POST /categories
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
    Form(form): Form<CategoryForm>,
) -> Result<Redirect> {
    let input = match form.to_input() {
        Ok(input) => input,
        Err(message) => {
            set_flash(&session, Flash::error(message)).await;
            return Ok(Redirect::to("/categories"));
        }
    };

    match state.backend().create_category(&admin.token, &input).await {
        Ok(category) => {
            record_audit(
                &state,
                &admin,
                AuditAction::CategoryCreated,
                category.id.as_i64(),
                Some(category.name.clone()),
            )
            .await;
            set_flash(
                &session,
                Flash::success(format!("Created category \"{}\".", category.name)),
            )
            .await;
        }
        Err(e) if is_rejection(&e) => {
            set_flash(&session, Flash::error(e.user_message())).await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to("/categories"))
}

/// Update a category.
///
/// POST /categories/{id}
#[instrument(skip_all, fields(category_id = id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
    Path(id): Path<i64>,
    Form(form): Form<CategoryForm>,
) -> Result<Redirect> {
    let input = match form.to_input() {
        Ok(input) => input,
        Err(message) => {
            set_flash(&session, Flash::error(message)).await;
            return Ok(Redirect::to("/categories"));
        }
    };

    match state
        .backend()
        .update_category(&admin.token, CategoryId::new(id), &input)
        .await
    {
        Ok(category) => {
            record_audit(
                &state,
                &admin,
                AuditAction::CategoryUpdated,
                category.id.as_i64(),
                Some(category.name.clone()),
            )
            .await;
            set_flash(
                &session,
                Flash::success(format!("Saved category \"{}\".", category.name)),
            )
            .await;
        }
        Err(e) if is_rejection(&e) => {
            set_flash(&session, Flash::error(e.user_message())).await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to("/categories"))
}

/// Delete a category.
///
/// The backend refuses while products still reference it; that refusal is
/// shown as a flash.
///
/// POST /categories/{id}/delete
#[instrument(skip_all, fields(category_id = id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Redirect> {
    let id = CategoryId::new(id);
    let backend = state.backend();
    let category = backend.get_category(id).await?;

    match backend.delete_category(&admin.token, id).await {
        Ok(()) => {
            record_audit(
                &state,
                &admin,
                AuditAction::CategoryDeleted,
                id.as_i64(),
                Some(category.name.clone()),
            )
            .await;
            set_flash(
                &session,
                Flash::success(format!("Deleted category \"{}\".", category.name)),
            )
            .await;
        }
        Err(e) if is_rejection(&e) => {
            set_flash(
                &session,
                Flash::error(format!(
                    "Could not delete \"{}\": {}",
                    category.name,
                    e.user_message()
                )),
            )
            .await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to("/categories"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_form_trims_and_drops_empty_description() {
        let form = CategoryForm {
            name: "  Café ".to_string(),
            description: "   ".to_string(),
        };
        let input = form.to_input().unwrap();
        assert_eq!(input.name, "Café");
        assert_eq!(input.description, None);
    }

    #[test]
    fn test_blank_name_rejected() {
        let form = CategoryForm::default();
        assert_eq!(form.to_input().unwrap_err(), "Name is required");
    }
}
