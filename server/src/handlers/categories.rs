use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;

use super::json_body;
use crate::models::CreateCategory;
use crate::repositories::CategoryStore;
use crate::state::AppState;
use crate::utils::auth::CurrentUser;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

pub async fn list_categories<S>(State(state): State<AppState<S>>) -> Result<Response, AppError>
where
    S: CategoryStore + Clone + 'static,
{
    let categories = state.categories.list_categories().await?;

    Ok(success(categories, "Categories retrieved successfully"))
}

pub async fn create_category<S>(
    State(state): State<AppState<S>>,
    CurrentUser(identity): CurrentUser,
    payload: Result<Json<CreateCategory>, JsonRejection>,
) -> Result<Response, AppError>
where
    S: CategoryStore + Clone + 'static,
{
    let input = json_body(payload, &identity)?;
    let category = state.categories.create_category(input, identity).await?;

    Ok(created(category, "Category created successfully"))
}
