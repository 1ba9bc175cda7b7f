//! PostgreSQL backend.
//!
//! Purchases lock the event row with `SELECT ... FOR UPDATE` inside a
//! transaction. A `sqlx::Transaction` rolls back when dropped without
//! `commit`, so every early return in the protocol leaves no trace.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::debug;

use super::{quote, CategoryStore, EventStore, TicketStore, UserStore};
use crate::models::{
    Category, Event, EventFilter, NewCategory, NewEvent, NewUser, Page, PurchaseOutcome, Role,
    Ticket, TicketWithEvent, UpdateEvent, User, UserCredentials,
};
use crate::utils::error::{AppError, AppResult};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_foreign_key_violation(),
        _ => false,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_credentials(self) -> AppResult<UserCredentials> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|e| AppError::StorageFailure(format!("user {}: {}", self.id, e)))?;

        Ok(UserCredentials {
            user: User {
                id: self.id,
                name: self.name,
                email: self.email,
                role,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            password_hash: self.password_hash,
        })
    }
}

impl EventStore for PgStore {
    async fn create_event(&self, input: NewEvent) -> AppResult<Event> {
        let result = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (
                title, description, location, start_date, end_date,
                capacity, price, image_url, is_published, category_id, organizer_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(input.title)
        .bind(input.description)
        .bind(input.location)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.capacity)
        .bind(input.price)
        .bind(input.image_url)
        .bind(input.is_published)
        .bind(input.category_id)
        .bind(input.organizer_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(event) => Ok(event),
            Err(e) if is_foreign_key_violation(&e) => Err(AppError::ValidationError(
                "Unknown category or organizer".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_event(&self, id: i64) -> AppResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn list_published(&self, filter: EventFilter) -> AppResult<Page<Event>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM events
            WHERE is_published = TRUE
              AND ($1::BIGINT IS NULL OR category_id = $1)
            "#,
        )
        .bind(filter.category_id)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, Event>(
            r#"
            SELECT *
            FROM events
            WHERE is_published = TRUE
              AND ($1::BIGINT IS NULL OR category_id = $1)
            ORDER BY start_date ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.category_id)
        .bind(i64::from(filter.page_size))
        .bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, u64::try_from(total).unwrap_or(0), &filter))
    }

    async fn update_event(&self, id: i64, patch: UpdateEvent) -> AppResult<Option<Event>> {
        // A single UPDATE takes the row lock, so it serializes with purchases.
        let event = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                location = COALESCE($4, location),
                start_date = COALESCE($5, start_date),
                end_date = COALESCE($6, end_date),
                capacity = COALESCE($7, capacity),
                price = COALESCE($8, price),
                image_url = COALESCE($9, image_url),
                is_published = COALESCE($10, is_published),
                category_id = COALESCE($11, category_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.location)
        .bind(patch.start_date)
        .bind(patch.end_date)
        .bind(patch.capacity)
        .bind(patch.price)
        .bind(patch.image_url)
        .bind(patch.is_published)
        .bind(patch.category_id)
        .fetch_optional(&self.pool)
        .await;

        match event {
            Ok(event) => Ok(event),
            Err(e) if is_foreign_key_violation(&e) => {
                Err(AppError::ValidationError("Unknown category".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_event(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(e) if is_foreign_key_violation(&e) => Err(AppError::Conflict(format!(
                "Event with id '{}' has issued tickets and cannot be deleted",
                id
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

impl TicketStore for PgStore {
    async fn purchase_ticket(
        &self,
        user_id: i64,
        event_id: i64,
        quantity: i32,
    ) -> AppResult<PurchaseOutcome> {
        let mut tx = self.pool.begin().await?;

        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(event) = event else {
            return Err(AppError::event_not_found(event_id));
        };

        let quote = quote(&event, quantity)?;

        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (quantity, unit_price, total, user_id, event_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, quantity, unit_price, total, user_id, event_id, created_at
            "#,
        )
        .bind(quantity)
        .bind(quote.unit_price)
        .bind(quote.total)
        .bind(user_id)
        .bind(event_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            // The event row is locked, so only the user reference can dangle.
            if is_foreign_key_violation(&e) {
                AppError::Unauthenticated("User account does not exist".to_string())
            } else {
                e.into()
            }
        })?;

        let event = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET capacity = capacity - $1,
                updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(quantity)
        .bind(event_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            ticket_id = ticket.id,
            event_id,
            remaining = event.capacity,
            "Purchase committed"
        );

        Ok(PurchaseOutcome { ticket, event })
    }

    async fn list_tickets_by_user(&self, user_id: i64) -> AppResult<Vec<TicketWithEvent>> {
        let tickets = sqlx::query_as::<_, TicketWithEvent>(
            r#"
            SELECT
                t.id,
                t.quantity,
                t.unit_price,
                t.total,
                t.user_id,
                t.event_id,
                t.created_at,
                e.title AS event_title,
                e.location AS event_location,
                e.start_date AS event_start_date
            FROM tickets t
            JOIN events e ON e.id = t.event_id
            WHERE t.user_id = $1
            ORDER BY t.created_at DESC, t.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tickets)
    }
}

impl UserStore for PgStore {
    async fn create_user(&self, input: NewUser) -> AppResult<User> {
        let result = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, role, created_at, updated_at
            "#,
        )
        .bind(input.name)
        .bind(input.email)
        .bind(input.password_hash)
        .bind(input.role.as_str())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.into_credentials()?.user),
            Err(e) if is_unique_violation(&e) => {
                Err(AppError::Conflict("Email already in use".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, password_hash, role, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_credentials).transpose()
    }
}

impl CategoryStore for PgStore {
    async fn create_category(&self, input: NewCategory) -> AppResult<Category> {
        let result = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, slug) VALUES ($1, $2) RETURNING *",
        )
        .bind(input.name)
        .bind(input.slug)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(category) => Ok(category),
            Err(e) if is_unique_violation(&e) => {
                Err(AppError::Conflict("Category already exists".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name ASC, id ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }
}
