//! End-to-end booking scenarios: contention on one seat, random seats, TTL expiry.

use futures_util::future::join_all;
use rand::Rng;
use reqlock::{
    handle_booking, BookingService, DedupCache, InMemoryTicketStore, Ticket,
    DEFAULT_BOOKING_SCOPE,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn service_with_latency(latency: Duration) -> (Arc<BookingService>, Arc<InMemoryTicketStore>) {
    let store = Arc::new(InMemoryTicketStore::new(latency));
    let cache = Arc::new(DedupCache::new());
    (Arc::new(BookingService::new(cache, store.clone())), store)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn forty_requests_for_one_seat_book_once() {
    let (service, store) = service_with_latency(Duration::from_millis(200));

    let handles = (0..40).map(|_| {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.book(Ticket::new("batman", 2, 7)).await })
    });
    let admitted = join_all(handles)
        .await
        .into_iter()
        .filter(|r| *r.as_ref().unwrap())
        .count();

    assert_eq!(admitted, 1);
    let records = store.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ticket(), Ticket::new("batman", 2, 7));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn thousand_random_requests_never_double_book() {
    let (service, store) = service_with_latency(Duration::from_millis(20));

    let tickets: Vec<Ticket> = {
        let mut rng = rand::thread_rng();
        (0..1000)
            .map(|_| Ticket::new("batman", rng.gen_range(0..10), rng.gen_range(0..10)))
            .collect()
    };
    let attempted: HashSet<Ticket> = tickets.iter().cloned().collect();

    let handles = tickets.into_iter().map(|ticket| {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.book(ticket).await })
    });
    let admitted = join_all(handles)
        .await
        .into_iter()
        .filter(|r| *r.as_ref().unwrap())
        .count();

    let records = store.records().await;
    let booked: HashSet<Ticket> = records.iter().map(|r| r.ticket()).collect();
    assert_eq!(booked.len(), records.len(), "duplicate booking found");
    assert_eq!(booked, attempted);
    assert_eq!(admitted, records.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_form_requests_get_one_success() {
    let (service, store) = service_with_latency(Duration::from_millis(50));

    let handles = (0..20).map(|_| {
        let service = Arc::clone(&service);
        tokio::spawn(async move { handle_booking(&service, "film=batman&room=2&seat=7").await })
    });
    let responses: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let ok: Vec<_> = responses.iter().filter(|r| r.status() == 200).collect();
    assert_eq!(ok.len(), 1);
    assert_eq!(responses.iter().filter(|r| r.status() == 400).count(), 19);
    let records = store.records().await;
    assert_eq!(ok[0].data.as_ref().unwrap().id, Some(records[0].id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn idle_booking_expires_and_can_be_booked_again() {
    let (service, store) = service_with_latency(Duration::from_millis(200));
    service
        .cache()
        .start_cleanup(Duration::from_secs(4), 3)
        .unwrap();
    let seat = Ticket::new("batman", 2, 7);

    assert!(service.book(&seat).await);
    assert!(service.cache().exists(DEFAULT_BOOKING_SCOPE, &seat).await);

    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(!service.cache().exists(DEFAULT_BOOKING_SCOPE, &seat).await);
    assert!(service.book(&seat).await);
    assert_eq!(store.len().await, 2);

    service.cache().shutdown().await;
}
