use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tokio::task::JoinSet;

use eventos_server::models::{CreateEvent, Event, Identity, PurchaseRequest, Role, UpdateEvent};
use eventos_server::repositories::{EventStore, FaultPoint, MemoryStore};
use eventos_server::services::{EventService, TicketService};
use eventos_server::utils::error::AppError;

const ORGANIZER: i64 = 1;

fn organizer() -> Option<Identity> {
    Some(Identity::new(ORGANIZER, Role::Organizer))
}

fn buyer(id: i64) -> Option<Identity> {
    Some(Identity::new(id, Role::User))
}

async fn seed_event(store: &MemoryStore, capacity: i32, price: Decimal) -> Event {
    let start = Utc::now() + Duration::days(30);
    EventService::new(store.clone())
        .create_event(
            CreateEvent {
                title: "Festival de Jazz".to_string(),
                description: "Tres noches de jazz".to_string(),
                location: "Antigua Guatemala".to_string(),
                start_date: start,
                end_date: Some(start + Duration::hours(5)),
                capacity,
                price,
                image_url: None,
                is_published: true,
                category_id: None,
            },
            organizer(),
        )
        .await
        .unwrap()
}

async fn remaining(store: &MemoryStore, event_id: i64) -> i32 {
    store.get_event(event_id).await.unwrap().unwrap().capacity
}

#[tokio::test]
async fn purchase_charges_snapshot_price_and_decrements_capacity() {
    let store = MemoryStore::new();
    let tickets = TicketService::new(store.clone());
    let event = seed_event(&store, 5, Decimal::new(10000, 2)).await;

    let outcome = tickets
        .purchase(PurchaseRequest::new(event.id, 2), buyer(7))
        .await
        .unwrap();

    assert_eq!(outcome.ticket.quantity, 2);
    assert_eq!(outcome.ticket.unit_price, Decimal::new(10000, 2));
    assert_eq!(outcome.ticket.total, Decimal::new(20000, 2));
    assert_eq!(outcome.ticket.user_id, 7);
    assert_eq!(outcome.event.capacity, 3);
    assert_eq!(remaining(&store, event.id).await, 3);
}

#[tokio::test]
async fn oversized_purchase_is_rejected_without_side_effects() {
    let store = MemoryStore::new();
    let tickets = TicketService::new(store.clone());
    let event = seed_event(&store, 3, Decimal::new(10000, 2)).await;

    let err = tickets
        .purchase(PurchaseRequest::new(event.id, 5), buyer(7))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::InsufficientCapacity {
            requested: 5,
            available: 3
        }
    ));
    assert_eq!(remaining(&store, event.id).await, 3);
    assert_eq!(store.ticket_count().await, 0);
}

#[tokio::test]
async fn purchase_of_unknown_event_is_not_found() {
    let store = MemoryStore::new();
    let tickets = TicketService::new(store.clone());

    let err = tickets
        .purchase(PurchaseRequest::new(999, 1), buyer(7))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(store.ticket_count().await, 0);
}

#[tokio::test]
async fn exact_remaining_capacity_can_be_bought() {
    let store = MemoryStore::new();
    let tickets = TicketService::new(store.clone());
    let event = seed_event(&store, 4, Decimal::new(2500, 2)).await;

    tickets
        .purchase(PurchaseRequest::new(event.id, 4), buyer(7))
        .await
        .unwrap();
    assert_eq!(remaining(&store, event.id).await, 0);

    let err = tickets
        .purchase(PurchaseRequest::new(event.id, 1), buyer(8))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientCapacity {
            requested: 1,
            available: 0
        }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_purchases_never_oversell() {
    let store = MemoryStore::new();
    let tickets = TicketService::new(store.clone());
    let capacity = 10;
    let event = seed_event(&store, capacity, Decimal::new(1500, 2)).await;

    let event_id = event.id;
    let mut set = JoinSet::new();
    for buyer_id in 0..40 {
        let tickets = tickets.clone();
        let quantity = 1 + buyer_id % 3;
        set.spawn(async move {
            tickets
                .purchase(PurchaseRequest::new(event_id, quantity), buyer(100 + buyer_id))
                .await
        });
    }

    let mut sold = 0i64;
    let mut rejected = 0;
    while let Some(result) = set.join_next().await {
        match result.unwrap() {
            Ok(outcome) => sold += i64::from(outcome.ticket.quantity),
            Err(AppError::InsufficientCapacity { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    let left = remaining(&store, event.id).await;
    assert!(left >= 0);
    assert!(rejected > 0);
    assert_eq!(sold, store.issued_quantity(event.id).await);
    assert_eq!(sold + i64::from(left), i64::from(capacity));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_seat_goes_to_exactly_one_buyer() {
    let store = MemoryStore::new();
    let tickets = TicketService::new(store.clone());
    let event = seed_event(&store, 1, Decimal::new(5000, 2)).await;

    let event_id = event.id;
    let mut set = JoinSet::new();
    for buyer_id in 0..16 {
        let tickets = tickets.clone();
        set.spawn(async move {
            tickets
                .purchase(PurchaseRequest::new(event_id, 1), buyer(200 + buyer_id))
                .await
        });
    }

    let mut winners = 0;
    while let Some(result) = set.join_next().await {
        if result.unwrap().is_ok() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(remaining(&store, event.id).await, 0);
    assert_eq!(store.ticket_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn purchases_for_different_events_are_independent() {
    let store = MemoryStore::new();
    let tickets = TicketService::new(store.clone());
    let first = seed_event(&store, 20, Decimal::new(1000, 2)).await;
    let second = seed_event(&store, 20, Decimal::new(3000, 2)).await;

    let (first_id, second_id) = (first.id, second.id);
    let mut set = JoinSet::new();
    for i in 0..20 {
        let tickets = tickets.clone();
        let event_id = if i % 2 == 0 { first_id } else { second_id };
        set.spawn(async move {
            tickets
                .purchase(PurchaseRequest::new(event_id, 1), buyer(300 + i))
                .await
        });
    }
    while let Some(result) = set.join_next().await {
        result.unwrap().unwrap();
    }

    assert_eq!(remaining(&store, first.id).await, 10);
    assert_eq!(remaining(&store, second.id).await, 10);
    assert_eq!(store.issued_quantity(first.id).await, 10);
    assert_eq!(store.issued_quantity(second.id).await, 10);
}

#[tokio::test]
async fn failed_step_rolls_back_the_whole_purchase() {
    let store = MemoryStore::new();
    let tickets = TicketService::new(store.clone());
    let event = seed_event(&store, 5, Decimal::new(10000, 2)).await;

    for point in [FaultPoint::TicketInsert, FaultPoint::CapacityDecrement] {
        store.fail_next(event.id, point).await;
        let err = tickets
            .purchase(PurchaseRequest::new(event.id, 2), buyer(7))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::StorageFailure(_)));
        assert!(err.is_retryable());
        assert_eq!(remaining(&store, event.id).await, 5);
        assert_eq!(store.ticket_count().await, 0);
    }

    // Faults are one-shot, so the retry goes through.
    tickets
        .purchase(PurchaseRequest::new(event.id, 2), buyer(7))
        .await
        .unwrap();
    assert_eq!(remaining(&store, event.id).await, 3);
}

#[tokio::test]
async fn price_change_does_not_touch_issued_tickets() {
    let store = MemoryStore::new();
    let tickets = TicketService::new(store.clone());
    let events = EventService::new(store.clone());
    let event = seed_event(&store, 10, Decimal::new(10000, 2)).await;

    tickets
        .purchase(PurchaseRequest::new(event.id, 2), buyer(7))
        .await
        .unwrap();

    events
        .update_event(
            event.id,
            UpdateEvent {
                price: Some(Decimal::new(15000, 2)),
                ..Default::default()
            },
            organizer(),
        )
        .await
        .unwrap();

    tickets
        .purchase(PurchaseRequest::new(event.id, 1), buyer(7))
        .await
        .unwrap();

    let mine = tickets.list_my_tickets(buyer(7)).await.unwrap();
    assert_eq!(mine.len(), 2);

    let mut unit_prices: Vec<Decimal> = mine.iter().map(|t| t.ticket.unit_price).collect();
    unit_prices.sort();
    assert_eq!(
        unit_prices,
        vec![Decimal::new(10000, 2), Decimal::new(15000, 2)]
    );
    let totals: Decimal = mine.iter().map(|t| t.ticket.total).sum();
    assert_eq!(totals, Decimal::new(35000, 2));
}

#[tokio::test]
async fn my_tickets_is_scoped_and_repeatable() {
    let store = MemoryStore::new();
    let tickets = TicketService::new(store.clone());
    let event = seed_event(&store, 10, Decimal::new(4000, 2)).await;

    tickets
        .purchase(PurchaseRequest::new(event.id, 1), buyer(7))
        .await
        .unwrap();
    tickets
        .purchase(PurchaseRequest::new(event.id, 3), buyer(8))
        .await
        .unwrap();

    let first = tickets.list_my_tickets(buyer(7)).await.unwrap();
    let second = tickets.list_my_tickets(buyer(7)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].ticket.quantity, 1);
    assert_eq!(first[0].event_title, "Festival de Jazz");

    assert!(tickets.list_my_tickets(buyer(42)).await.unwrap().is_empty());
    assert_eq!(remaining(&store, event.id).await, 6);
}
