//! In-memory backend.
//!
//! Each event lives in its own `Arc<Mutex<Option<Event>>>` slot, so the
//! purchase critical section covers one event and purchases of different
//! events never wait on each other. A slot set to `None` is a deleted event.
//!
//! Lock order is event slot, then ticket list. Nothing takes the event map
//! while holding a slot. Users and categories sit behind their own locks and
//! are never held together with event state.
//!
//! Category references are checked like the Postgres foreign key. User ids
//! taken from verified tokens are trusted as is.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::{quote, CategoryStore, EventStore, TicketStore, UserStore};
use crate::models::{
    Category, Event, EventFilter, NewCategory, NewEvent, NewUser, Page, PurchaseOutcome, Ticket,
    TicketWithEvent, UpdateEvent, User, UserCredentials,
};
use crate::utils::error::{AppError, AppResult};

type EventSlot = Arc<Mutex<Option<Event>>>;

/// Step of the purchase protocol at which an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    TicketInsert,
    CapacityDecrement,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    events: RwLock<BTreeMap<i64, EventSlot>>,
    tickets: RwLock<Vec<Ticket>>,
    next_event_id: AtomicI64,
    next_ticket_id: AtomicI64,
    faults: Mutex<Vec<(i64, FaultPoint)>>,
    users: RwLock<HashMap<String, UserCredentials>>,
    next_user_id: AtomicI64,
    categories: RwLock<Vec<Category>>,
    next_category_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next purchase of `event_id` that reaches `point` fail with
    /// a `StorageFailure`. One-shot. Purchases of other events are unaffected.
    pub async fn fail_next(&self, event_id: i64, point: FaultPoint) {
        self.inner.faults.lock().await.push((event_id, point));
    }

    /// Sum of ticket quantities issued for `event_id`.
    pub async fn issued_quantity(&self, event_id: i64) -> i64 {
        self.inner
            .tickets
            .read()
            .await
            .iter()
            .filter(|t| t.event_id == event_id)
            .map(|t| i64::from(t.quantity))
            .sum()
    }

    pub async fn ticket_count(&self) -> usize {
        self.inner.tickets.read().await.len()
    }

    async fn take_fault(&self, event_id: i64, point: FaultPoint) -> bool {
        let mut faults = self.inner.faults.lock().await;
        match faults.iter().position(|fault| *fault == (event_id, point)) {
            Some(index) => {
                faults.remove(index);
                true
            }
            None => false,
        }
    }

    async fn ensure_category(&self, category_id: Option<i64>) -> AppResult<()> {
        let Some(id) = category_id else {
            return Ok(());
        };
        if self.inner.categories.read().await.iter().any(|c| c.id == id) {
            Ok(())
        } else {
            Err(AppError::ValidationError("Unknown category".to_string()))
        }
    }

    async fn slot(&self, id: i64) -> Option<EventSlot> {
        self.inner.events.read().await.get(&id).cloned()
    }
}

impl EventStore for MemoryStore {
    async fn create_event(&self, input: NewEvent) -> AppResult<Event> {
        self.ensure_category(input.category_id).await?;

        let id = self.inner.next_event_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let event = Event {
            id,
            title: input.title,
            description: input.description,
            location: input.location,
            start_date: input.start_date,
            end_date: input.end_date,
            capacity: input.capacity,
            price: input.price,
            image_url: input.image_url,
            is_published: input.is_published,
            organizer_id: input.organizer_id,
            category_id: input.category_id,
            created_at: now,
            updated_at: now,
        };

        self.inner
            .events
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(Some(event.clone()))));

        Ok(event)
    }

    async fn get_event(&self, id: i64) -> AppResult<Option<Event>> {
        match self.slot(id).await {
            Some(slot) => Ok(slot.lock().await.clone()),
            None => Ok(None),
        }
    }

    async fn list_published(&self, filter: EventFilter) -> AppResult<Page<Event>> {
        let slots: Vec<EventSlot> = self.inner.events.read().await.values().cloned().collect();

        let mut matching = Vec::new();
        for slot in slots {
            let guard = slot.lock().await;
            if let Some(event) = guard.as_ref() {
                let category_matches =
                    filter.category_id.is_none() || event.category_id == filter.category_id;
                if event.is_published && category_matches {
                    matching.push(event.clone());
                }
            }
        }

        matching.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(filter.offset()).unwrap_or(usize::MAX))
            .take(filter.page_size as usize)
            .collect();

        Ok(Page::new(items, total, &filter))
    }

    async fn update_event(&self, id: i64, patch: UpdateEvent) -> AppResult<Option<Event>> {
        let Some(slot) = self.slot(id).await else {
            return Ok(None);
        };
        self.ensure_category(patch.category_id).await?;

        let mut guard = slot.lock().await;
        match guard.as_mut() {
            Some(event) => {
                patch.apply_to(event, Utc::now());
                Ok(Some(event.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_event(&self, id: i64) -> AppResult<bool> {
        let Some(slot) = self.slot(id).await else {
            return Ok(false);
        };

        {
            let mut guard = slot.lock().await;
            if guard.is_none() {
                return Ok(false);
            }

            let has_tickets = self
                .inner
                .tickets
                .read()
                .await
                .iter()
                .any(|t| t.event_id == id);
            if has_tickets {
                return Err(AppError::Conflict(format!(
                    "Event with id '{}' has issued tickets and cannot be deleted",
                    id
                )));
            }

            *guard = None;
        }

        self.inner.events.write().await.remove(&id);
        Ok(true)
    }
}

impl TicketStore for MemoryStore {
    async fn purchase_ticket(
        &self,
        user_id: i64,
        event_id: i64,
        quantity: i32,
    ) -> AppResult<PurchaseOutcome> {
        let slot = self
            .slot(event_id)
            .await
            .ok_or_else(|| AppError::event_not_found(event_id))?;

        let mut guard = slot.lock().await;
        let current = guard
            .as_ref()
            .ok_or_else(|| AppError::event_not_found(event_id))?;

        let quote = quote(current, quantity)?;
        let now = Utc::now();

        // Both writes are staged first and only published once every step
        // has succeeded.
        if self.take_fault(event_id, FaultPoint::TicketInsert).await {
            return Err(AppError::StorageFailure("ticket insert failed".to_string()));
        }
        let ticket = Ticket {
            id: self.inner.next_ticket_id.fetch_add(1, Ordering::SeqCst) + 1,
            quantity,
            unit_price: quote.unit_price,
            total: quote.total,
            user_id,
            event_id,
            created_at: now,
        };

        if self.take_fault(event_id, FaultPoint::CapacityDecrement).await {
            return Err(AppError::StorageFailure(
                "capacity decrement failed".to_string(),
            ));
        }
        let mut updated = current.clone();
        updated.capacity -= quantity;
        updated.updated_at = now;

        let mut tickets = self.inner.tickets.write().await;
        tickets.push(ticket.clone());
        *guard = Some(updated.clone());
        drop(tickets);

        debug!(
            ticket_id = ticket.id,
            event_id,
            remaining = updated.capacity,
            "Purchase committed"
        );

        Ok(PurchaseOutcome {
            ticket,
            event: updated,
        })
    }

    async fn list_tickets_by_user(&self, user_id: i64) -> AppResult<Vec<TicketWithEvent>> {
        // Released before touching event slots to keep the lock order.
        let owned: Vec<Ticket> = self
            .inner
            .tickets
            .read()
            .await
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();

        let mut entries = Vec::with_capacity(owned.len());
        for ticket in owned {
            if let Some(event) = self.get_event(ticket.event_id).await? {
                entries.push(TicketWithEvent::new(ticket, &event));
            }
        }

        entries.sort_by(|a, b| {
            b.ticket
                .created_at
                .cmp(&a.ticket.created_at)
                .then(b.ticket.id.cmp(&a.ticket.id))
        });

        Ok(entries)
    }
}

impl UserStore for MemoryStore {
    async fn create_user(&self, input: NewUser) -> AppResult<User> {
        let mut users = self.inner.users.write().await;
        if users.contains_key(&input.email) {
            return Err(AppError::Conflict("Email already in use".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: self.inner.next_user_id.fetch_add(1, Ordering::SeqCst) + 1,
            name: input.name,
            email: input.email.clone(),
            role: input.role,
            created_at: now,
            updated_at: now,
        };
        users.insert(
            input.email,
            UserCredentials {
                user: user.clone(),
                password_hash: input.password_hash,
            },
        );

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        Ok(self.inner.users.read().await.get(email).cloned())
    }
}

impl CategoryStore for MemoryStore {
    async fn create_category(&self, input: NewCategory) -> AppResult<Category> {
        let mut categories = self.inner.categories.write().await;
        if categories.iter().any(|c| c.slug == input.slug) {
            return Err(AppError::Conflict("Category already exists".to_string()));
        }

        let now = Utc::now();
        let category = Category {
            id: self.inner.next_category_id.fetch_add(1, Ordering::SeqCst) + 1,
            name: input.name,
            slug: input.slug,
            created_at: now,
            updated_at: now,
        };
        categories.push(category.clone());

        Ok(category)
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let mut categories = self.inner.categories.read().await.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(categories)
    }
}
