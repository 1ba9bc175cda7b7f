//! Storage traits for events, tickets, users and categories, with a Postgres
//! and an in-memory implementation.
//!
//! The purchase protocol lives behind [`TicketStore::purchase_ticket`]: each
//! backend must make "read capacity, check, insert ticket, decrement" a single
//! all-or-nothing step per event, while purchases of different events run
//! concurrently.

use std::future::Future;

use rust_decimal::Decimal;

use crate::models::{
    max_ticket_total, Category, Event, EventFilter, NewCategory, NewEvent, NewUser, Page,
    PurchaseOutcome, TicketWithEvent, UpdateEvent, User, UserCredentials,
};
use crate::utils::error::{AppError, AppResult};

pub mod memory;
pub mod postgres;

pub use memory::{FaultPoint, MemoryStore};
pub use postgres::PgStore;

pub trait EventStore: Send + Sync {
    fn create_event(&self, input: NewEvent) -> impl Future<Output = AppResult<Event>> + Send;

    fn get_event(&self, id: i64) -> impl Future<Output = AppResult<Option<Event>>> + Send;

    /// Published events only, ordered by start date.
    fn list_published(
        &self,
        filter: EventFilter,
    ) -> impl Future<Output = AppResult<Page<Event>>> + Send;

    /// Applies `patch` while holding the same per-event exclusion the purchase
    /// protocol uses. Returns `None` when the event does not exist.
    fn update_event(
        &self,
        id: i64,
        patch: UpdateEvent,
    ) -> impl Future<Output = AppResult<Option<Event>>> + Send;

    /// Returns `false` when the event does not exist. Fails with
    /// `Conflict` while tickets still reference the event.
    fn delete_event(&self, id: i64) -> impl Future<Output = AppResult<bool>> + Send;
}

pub trait TicketStore: Send + Sync {
    /// Atomically checks remaining capacity, records a ticket priced at the
    /// event's current price and decrements capacity by `quantity`.
    ///
    /// Fails with `NotFound` for an unknown event and with
    /// `InsufficientCapacity` when `quantity` exceeds what is left. On any
    /// error nothing is written.
    fn purchase_ticket(
        &self,
        user_id: i64,
        event_id: i64,
        quantity: i32,
    ) -> impl Future<Output = AppResult<PurchaseOutcome>> + Send;

    /// Newest first. Never writes.
    fn list_tickets_by_user(
        &self,
        user_id: i64,
    ) -> impl Future<Output = AppResult<Vec<TicketWithEvent>>> + Send;
}

pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    fn create_user(&self, input: NewUser) -> impl Future<Output = AppResult<User>> + Send;

    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = AppResult<Option<UserCredentials>>> + Send;
}

pub trait CategoryStore: Send + Sync {
    /// Fails with `Conflict` when the slug is taken.
    fn create_category(
        &self,
        input: NewCategory,
    ) -> impl Future<Output = AppResult<Category>> + Send;

    /// Ordered by name.
    fn list_categories(&self) -> impl Future<Output = AppResult<Vec<Category>>> + Send;
}

/// Everything the HTTP server needs from a backend.
pub trait AppStore:
    EventStore + TicketStore + UserStore + CategoryStore + Clone + 'static
{
}

impl<T> AppStore for T where
    T: EventStore + TicketStore + UserStore + CategoryStore + Clone + 'static
{
}

/// Price snapshot taken while the event is held exclusively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Quote {
    pub unit_price: Decimal,
    pub total: Decimal,
}

/// Capacity check and pricing step of the purchase protocol, shared by every
/// backend. Must run while the caller holds the event exclusively.
pub(crate) fn quote(event: &Event, quantity: i32) -> AppResult<Quote> {
    if event.capacity < quantity {
        return Err(AppError::InsufficientCapacity {
            requested: quantity,
            available: event.capacity,
        });
    }

    let total = event
        .price
        .checked_mul(Decimal::from(quantity))
        .filter(|total| *total <= max_ticket_total())
        .ok_or_else(|| AppError::ValidationError("Ticket total is out of range".to_string()))?;

    Ok(Quote {
        unit_price: event.price,
        total,
    })
}
