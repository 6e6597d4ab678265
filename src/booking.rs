//! Booking service: the dedup cache admits one caller per seat, then the slow store write runs unlocked.

use crate::dedupe::DedupCache;
use crate::types::{BookingRecord, Ticket, DEFAULT_BOOKING_SCOPE};
use async_trait::async_trait;
use rand::Rng;
use std::borrow::Borrow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Default simulated write latency of the in-memory store.
pub const DEFAULT_PERSIST_LATENCY: Duration = Duration::from_millis(200);

/// Where admitted bookings are persisted.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Persists one admitted ticket and returns the stored record.
    async fn append(&self, ticket: &Ticket) -> BookingRecord;
}

/// Append-only record list standing in for a database.
#[derive(Debug)]
pub struct InMemoryTicketStore {
    latency: Duration,
    records: Mutex<Vec<BookingRecord>>,
}

impl InMemoryTicketStore {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Copy of every record appended so far.
    pub async fn records(&self) -> Vec<BookingRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Drops all records. Test and reset tooling only.
    pub async fn reset(&self) {
        self.records.lock().await.clear();
    }
}

impl Default for InMemoryTicketStore {
    fn default() -> Self {
        Self::new(DEFAULT_PERSIST_LATENCY)
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn append(&self, ticket: &Ticket) -> BookingRecord {
        // Models the database round trip; no lock is held here.
        tokio::time::sleep(self.latency).await;

        let id = rand::thread_rng().gen_range(0..=i32::MAX as u32);
        let record = BookingRecord::new(id, ticket);
        self.records.lock().await.push(record.clone());
        record
    }
}

/// Books seats at most once each.
pub struct BookingService {
    cache: Arc<DedupCache<Ticket>>,
    store: Arc<dyn TicketStore>,
    scope: String,
}

impl BookingService {
    pub fn new(cache: Arc<DedupCache<Ticket>>, store: Arc<dyn TicketStore>) -> Self {
        Self::with_scope(cache, store, DEFAULT_BOOKING_SCOPE)
    }

    pub fn with_scope(
        cache: Arc<DedupCache<Ticket>>,
        store: Arc<dyn TicketStore>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            store,
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn cache(&self) -> &Arc<DedupCache<Ticket>> {
        &self.cache
    }

    /// Returns true if this call booked the seat, false if someone else holds it.
    pub async fn book<T: Borrow<Ticket>>(&self, ticket: T) -> bool {
        self.reserve(ticket).await.is_some()
    }

    /// Like [`book`](Self::book) but hands back the persisted record on success.
    ///
    /// Rejected callers return immediately without touching the store.
    pub async fn reserve<T: Borrow<Ticket>>(&self, ticket: T) -> Option<BookingRecord> {
        let ticket: &Ticket = ticket.borrow();
        if !self.cache.try_set(&self.scope, ticket).await {
            debug!(%ticket, "[Booking] rejected: seat already taken");
            return None;
        }

        let record = self.store.append(ticket).await;
        info!(id = record.id, %ticket, "[Booking] ticket secured");
        Some(record)
    }
}
