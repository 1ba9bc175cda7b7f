use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use super::event::Event;

/// A purchased ticket. Never updated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: i64,
    pub quantity: i32,
    /// Event price at the moment of purchase.
    pub unit_price: Decimal,
    pub total: Decimal,
    pub user_id: i64,
    pub event_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A ticket joined with the event summary shown in "my tickets".
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TicketWithEvent {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub ticket: Ticket,
    pub event_title: String,
    pub event_location: String,
    pub event_start_date: DateTime<Utc>,
}

impl TicketWithEvent {
    pub fn new(ticket: Ticket, event: &Event) -> Self {
        Self {
            ticket,
            event_title: event.title.clone(),
            event_location: event.location.clone(),
            event_start_date: event.start_date,
        }
    }
}

/// Result of a successful purchase: the new ticket and the event after the
/// capacity decrement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseOutcome {
    pub ticket: Ticket,
    pub event: Event,
}

/// Body of `POST /api/tickets/purchase`.
///
/// Both fields are kept as raw JSON so that numeric strings such as `"3"` can
/// be coerced, and so that missing or malformed values surface as a
/// validation error rather than a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    #[serde(default)]
    pub event_id: Option<Value>,
    #[serde(default)]
    pub quantity: Option<Value>,
}

impl PurchaseRequest {
    pub fn new(event_id: i64, quantity: i64) -> Self {
        Self {
            event_id: Some(Value::from(event_id)),
            quantity: Some(Value::from(quantity)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketList {
    pub items: Vec<TicketWithEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_entry_serializes_flat() {
        let created_at = Utc::now();
        let entry = TicketWithEvent {
            ticket: Ticket {
                id: 4,
                quantity: 2,
                unit_price: Decimal::new(10000, 2),
                total: Decimal::new(20000, 2),
                user_id: 9,
                event_id: 1,
                created_at,
            },
            event_title: "Concierto".to_string(),
            event_location: "Guatemala".to_string(),
            event_start_date: created_at,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["userId"], 9);
        assert_eq!(json["total"], "200.00");
        assert_eq!(json["eventTitle"], "Concierto");
        assert!(json.get("ticket").is_none());
    }

    #[test]
    fn test_purchase_request_accepts_missing_fields() {
        let request: PurchaseRequest = serde_json::from_str("{}").unwrap();
        assert!(request.event_id.is_none());
        assert!(request.quantity.is_none());

        let request: PurchaseRequest =
            serde_json::from_str(r#"{"eventId": "12", "quantity": 2}"#).unwrap();
        assert_eq!(request.event_id, Some(Value::from("12")));
    }
}
