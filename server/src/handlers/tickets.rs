use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;

use super::json_body;
use crate::models::{PurchaseRequest, TicketList};
use crate::repositories::TicketStore;
use crate::state::AppState;
use crate::utils::auth::CurrentUser;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

pub async fn purchase_ticket<S>(
    State(state): State<AppState<S>>,
    CurrentUser(identity): CurrentUser,
    payload: Result<Json<PurchaseRequest>, JsonRejection>,
) -> Result<Response, AppError>
where
    S: TicketStore + Clone + 'static,
{
    let request = json_body(payload, &identity)?;
    let outcome = state.tickets.purchase(request, identity).await?;

    Ok(created(outcome, "Ticket purchased successfully"))
}

pub async fn my_tickets<S>(
    State(state): State<AppState<S>>,
    CurrentUser(identity): CurrentUser,
) -> Result<Response, AppError>
where
    S: TicketStore + Clone + 'static,
{
    let items = state.tickets.list_my_tickets(identity).await?;

    Ok(success(TicketList { items }, "Tickets retrieved successfully"))
}
