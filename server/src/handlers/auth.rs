use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;

use crate::models::{LoginRequest, RegisterRequest};
use crate::repositories::UserStore;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

pub async fn register<S>(
    State(state): State<AppState<S>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, AppError>
where
    S: UserStore + Clone + 'static,
{
    let Json(request) = payload?;
    let user = state.auth.register(request).await?;

    Ok(created(user, "User registered successfully"))
}

pub async fn login<S>(
    State(state): State<AppState<S>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AppError>
where
    S: UserStore + Clone + 'static,
{
    let Json(request) = payload?;
    let session = state.auth.login(request).await?;

    Ok(success(session, "Login successful"))
}
