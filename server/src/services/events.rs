use rust_decimal::Decimal;
use tracing::info;

use crate::models::{
    max_price, CreateEvent, Event, EventFilter, EventQuery, Identity, NewEvent, Page,
    UpdateEvent, MONEY_SCALE,
};
use crate::repositories::EventStore;
use crate::utils::error::{AppError, AppResult};

#[derive(Clone)]
pub struct EventService<S> {
    store: S,
}

impl<S> EventService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: EventStore> EventService<S> {
    pub async fn create_event(
        &self,
        mut input: CreateEvent,
        identity: Option<Identity>,
    ) -> AppResult<Event> {
        let identity = identity.ok_or_else(AppError::unauthenticated)?;
        if !identity.role.can_publish_events() {
            return Err(AppError::Forbidden(
                "Only organizers or admins can create events".to_string(),
            ));
        }

        require_text("title", &input.title)?;
        require_text("description", &input.description)?;
        require_text("location", &input.location)?;
        check_capacity(input.capacity)?;
        input.price = normalize_price(input.price)?;
        if let Some(end_date) = input.end_date {
            if end_date < input.start_date {
                return Err(AppError::ValidationError(
                    "endDate must not be before startDate".to_string(),
                ));
            }
        }

        let event = self
            .store
            .create_event(NewEvent::from_request(input, identity.id))
            .await?;

        info!(
            event_id = event.id,
            organizer_id = identity.id,
            capacity = event.capacity,
            "Event created"
        );
        Ok(event)
    }

    pub async fn get_event(&self, id: i64) -> AppResult<Event> {
        self.store
            .get_event(id)
            .await?
            .ok_or_else(|| AppError::event_not_found(id))
    }

    pub async fn list_events(&self, query: EventQuery) -> AppResult<Page<Event>> {
        self.store.list_published(EventFilter::from(query)).await
    }

    pub async fn update_event(
        &self,
        id: i64,
        mut patch: UpdateEvent,
        identity: Option<Identity>,
    ) -> AppResult<Event> {
        let identity = identity.ok_or_else(AppError::unauthenticated)?;
        let existing = self.get_event(id).await?;
        ensure_owner_or_admin(&existing, &identity, "update")?;

        for (field, value) in [
            ("title", &patch.title),
            ("description", &patch.description),
            ("location", &patch.location),
        ] {
            if let Some(value) = value {
                require_text(field, value)?;
            }
        }
        if let Some(capacity) = patch.capacity {
            check_capacity(capacity)?;
        }
        if let Some(price) = patch.price {
            patch.price = Some(normalize_price(price)?);
        }
        let start_date = patch.start_date.unwrap_or(existing.start_date);
        if let Some(end_date) = patch.end_date.or(existing.end_date) {
            if end_date < start_date {
                return Err(AppError::ValidationError(
                    "endDate must not be before startDate".to_string(),
                ));
            }
        }

        let updated = self
            .store
            .update_event(id, patch)
            .await?
            .ok_or_else(|| AppError::event_not_found(id))?;

        info!(event_id = id, user_id = identity.id, "Event updated");
        Ok(updated)
    }

    pub async fn delete_event(&self, id: i64, identity: Option<Identity>) -> AppResult<()> {
        let identity = identity.ok_or_else(AppError::unauthenticated)?;
        let existing = self.get_event(id).await?;
        ensure_owner_or_admin(&existing, &identity, "delete")?;

        if !self.store.delete_event(id).await? {
            return Err(AppError::event_not_found(id));
        }

        info!(event_id = id, user_id = identity.id, "Event deleted");
        Ok(())
    }
}

fn ensure_owner_or_admin(event: &Event, identity: &Identity, action: &str) -> AppResult<()> {
    if event.is_owned_by(identity.id) || identity.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Only the organizer or an admin can {} this event",
            action
        )))
    }
}

fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}

fn check_capacity(capacity: i32) -> AppResult<()> {
    if capacity <= 0 {
        return Err(AppError::ValidationError(
            "Capacity must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Validates a price against the stored column and returns it with exactly
/// two decimal places, so every backend keeps the same snapshot.
fn normalize_price(price: Decimal) -> AppResult<Decimal> {
    if price < Decimal::ZERO {
        return Err(AppError::ValidationError(
            "Price must not be negative".to_string(),
        ));
    }
    if price.normalize().scale() > MONEY_SCALE {
        return Err(AppError::ValidationError(format!(
            "Price must have at most {} decimal places",
            MONEY_SCALE
        )));
    }
    if price > max_price() {
        return Err(AppError::ValidationError(format!(
            "Price must not exceed {}",
            max_price()
        )));
    }

    let mut price = price;
    price.rescale(MONEY_SCALE);
    Ok(price)
}
