use serde_json::Value;
use tracing::info;

use crate::models::{Identity, PurchaseOutcome, PurchaseRequest, TicketWithEvent};
use crate::repositories::TicketStore;
use crate::utils::error::{AppError, AppResult};

/// Purchase and "my tickets" entry points. Built once over a store handle;
/// the caller's identity is passed into every call.
#[derive(Clone)]
pub struct TicketService<S> {
    store: S,
}

impl<S> TicketService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: TicketStore> TicketService<S> {
    pub async fn purchase(
        &self,
        request: PurchaseRequest,
        identity: Option<Identity>,
    ) -> AppResult<PurchaseOutcome> {
        let identity = identity.ok_or_else(AppError::unauthenticated)?;
        let (event_id, quantity) = validate_purchase(&request)?;

        let outcome = self
            .store
            .purchase_ticket(identity.id, event_id, quantity)
            .await?;

        info!(
            user_id = identity.id,
            event_id,
            quantity,
            ticket_id = outcome.ticket.id,
            total = %outcome.ticket.total,
            remaining = outcome.event.capacity,
            "Ticket purchased"
        );

        Ok(outcome)
    }

    pub async fn list_my_tickets(&self, identity: Option<Identity>) -> AppResult<Vec<TicketWithEvent>> {
        let identity = identity.ok_or_else(AppError::unauthenticated)?;
        self.store.list_tickets_by_user(identity.id).await
    }
}

fn validate_purchase(request: &PurchaseRequest) -> AppResult<(i64, i32)> {
    let invalid = || AppError::ValidationError("eventId and positive quantity are required".to_string());

    let event_id = request
        .event_id
        .as_ref()
        .and_then(positive_integer)
        .ok_or_else(invalid)?;

    let quantity = request
        .quantity
        .as_ref()
        .and_then(positive_integer)
        .and_then(|q| i32::try_from(q).ok())
        .ok_or_else(invalid)?;

    Ok((event_id, quantity))
}

/// Accepts JSON integers, integral floats and numeric strings.
fn positive_integer(value: &Value) -> Option<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() <= i32::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.filter(|v| *v > 0)
}
