use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An event row. `capacity` is the number of slots still for sale, not the
/// size of the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub capacity: i32,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub is_published: bool,
    pub organizer_id: i64,
    pub category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.organizer_id == user_id
    }
}

/// Request body for `POST /api/events`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvent {
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub capacity: i32,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub category_id: Option<i64>,
}

/// A validated event ready to be inserted, owned by `organizer_id`.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub capacity: i32,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub is_published: bool,
    pub category_id: Option<i64>,
    pub organizer_id: i64,
}

impl NewEvent {
    pub fn from_request(input: CreateEvent, organizer_id: i64) -> Self {
        Self {
            title: input.title,
            description: input.description,
            location: input.location,
            start_date: input.start_date,
            end_date: input.end_date,
            capacity: input.capacity,
            price: input.price,
            image_url: input.image_url,
            is_published: input.is_published,
            category_id: input.category_id,
            organizer_id,
        }
    }
}

/// Partial update for `PUT /api/events/:id`. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub is_published: Option<bool>,
    pub category_id: Option<i64>,
}

impl UpdateEvent {
    pub fn apply_to(self, event: &mut Event, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(location) = self.location {
            event.location = location;
        }
        if let Some(start_date) = self.start_date {
            event.start_date = start_date;
        }
        if self.end_date.is_some() {
            event.end_date = self.end_date;
        }
        if let Some(capacity) = self.capacity {
            event.capacity = capacity;
        }
        if let Some(price) = self.price {
            event.price = price;
        }
        if self.image_url.is_some() {
            event.image_url = self.image_url;
        }
        if let Some(is_published) = self.is_published {
            event.is_published = is_published;
        }
        if self.category_id.is_some() {
            event.category_id = self.category_id;
        }
        event.updated_at = now;
    }
}

/// Decimal places stored for `events.price` and `tickets.total`.
pub const MONEY_SCALE: u32 = 2;

/// Largest value `events.price` (`NUMERIC(10, 2)`) can hold.
pub fn max_price() -> Decimal {
    Decimal::new(99_999_999_99, MONEY_SCALE)
}

/// Largest value `tickets.total` (`NUMERIC(12, 2)`) can hold.
pub fn max_ticket_total() -> Decimal {
    Decimal::new(9_999_999_999_99, MONEY_SCALE)
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query string for `GET /api/events`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventQuery {
    #[serde(alias = "category")]
    pub category_id: Option<i64>,
    pub page: Option<u32>,
    #[serde(alias = "limit")]
    pub page_size: Option<u32>,
}

/// Normalized listing filter handed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFilter {
    pub category_id: Option<i64>,
    pub page: u32,
    pub page_size: u32,
}

impl EventFilter {
    /// Rows to skip. Widened so that any `page` from the query string fits.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

impl From<EventQuery> for EventFilter {
    fn from(query: EventQuery) -> Self {
        Self {
            category_id: query.category_id,
            page: query.page.filter(|p| *p > 0).unwrap_or(1),
            page_size: query
                .page_size
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .min(MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, filter: &EventFilter) -> Self {
        let pages = total.div_ceil(u64::from(filter.page_size)).max(1);
        Self {
            items,
            total,
            page: filter.page,
            page_size: filter.page_size,
            total_pages: u32::try_from(pages).unwrap_or(u32::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_defaults_and_clamps() {
        let filter = EventFilter::from(EventQuery::default());
        assert_eq!(filter.page, 1);
        assert_eq!(filter.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(filter.offset(), 0);

        let filter = EventFilter::from(EventQuery {
            category_id: Some(3),
            page: Some(0),
            page_size: Some(1_000),
        });
        assert_eq!(filter.page, 1);
        assert_eq!(filter.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_page_counts_partial_pages() {
        let filter = EventFilter {
            category_id: None,
            page: 2,
            page_size: 10,
        };
        assert_eq!(filter.offset(), 10);

        let page: Page<i64> = Page::new(vec![], 21, &filter);
        assert_eq!(page.total_pages, 3);

        let empty: Page<i64> = Page::new(vec![], 0, &filter);
        assert_eq!(empty.total_pages, 1);
    }

    #[test]
    fn test_offset_of_huge_page_does_not_overflow() {
        let filter = EventFilter::from(EventQuery {
            category_id: None,
            page: Some(u32::MAX),
            page_size: Some(MAX_PAGE_SIZE),
        });
        assert_eq!(
            filter.offset(),
            u64::from(u32::MAX - 1) * u64::from(MAX_PAGE_SIZE)
        );
    }
}
