use axum::extract::rejection::JsonRejection;
use axum::response::Response;
use axum::Json;
use serde::Serialize;

use crate::models::Identity;
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::success;

pub mod auth;
pub mod categories;
pub mod events;
pub mod tickets;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "eventos-api",
    };

    success(payload, "Health check successful")
}

/// Unwraps a JSON body. Anonymous callers get `UNAUTHENTICATED` even when the
/// body is unreadable, so the auth check always wins over validation.
fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    identity: &Option<Identity>,
) -> AppResult<T> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(_) if identity.is_none() => Err(AppError::unauthenticated()),
        Err(rejection) => Err(rejection.into()),
    }
}
