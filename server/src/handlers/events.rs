use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;

use super::json_body;
use crate::models::{CreateEvent, EventQuery, UpdateEvent};
use crate::repositories::EventStore;
use crate::state::AppState;
use crate::utils::auth::CurrentUser;
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::{created, empty_success, success};

fn event_id(path: Result<Path<i64>, PathRejection>) -> AppResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::ValidationError("Event id must be an integer".to_string()))
}

pub async fn list_events<S>(
    State(state): State<AppState<S>>,
    query: Result<Query<EventQuery>, QueryRejection>,
) -> Result<Response, AppError>
where
    S: EventStore + Clone + 'static,
{
    let Query(query) = query.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let page = state.events.list_events(query).await?;

    Ok(success(page, "Events retrieved successfully"))
}

pub async fn get_event<S>(
    State(state): State<AppState<S>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, AppError>
where
    S: EventStore + Clone + 'static,
{
    let event = state.events.get_event(event_id(path)?).await?;

    Ok(success(event, "Event retrieved successfully"))
}

pub async fn create_event<S>(
    State(state): State<AppState<S>>,
    CurrentUser(identity): CurrentUser,
    payload: Result<Json<CreateEvent>, JsonRejection>,
) -> Result<Response, AppError>
where
    S: EventStore + Clone + 'static,
{
    let input = json_body(payload, &identity)?;
    let event = state.events.create_event(input, identity).await?;

    Ok(created(event, "Event created successfully"))
}

pub async fn update_event<S>(
    State(state): State<AppState<S>>,
    CurrentUser(identity): CurrentUser,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateEvent>, JsonRejection>,
) -> Result<Response, AppError>
where
    S: EventStore + Clone + 'static,
{
    let id = event_id(path)?;
    let patch = json_body(payload, &identity)?;
    let event = state.events.update_event(id, patch, identity).await?;

    Ok(success(event, "Event updated successfully"))
}

pub async fn delete_event<S>(
    State(state): State<AppState<S>>,
    CurrentUser(identity): CurrentUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, AppError>
where
    S: EventStore + Clone + 'static,
{
    let id = event_id(path)?;
    state.events.delete_event(id, identity).await?;

    Ok(empty_success("Event deleted successfully"))
}
