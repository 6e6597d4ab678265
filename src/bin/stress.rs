//! Fires many concurrent bookings at one in-process service and reports how many got through.
//!
//! Usage:
//!   cargo run --bin stress
//!
//! STRESS_REQUESTS  number of concurrent bookings (default 40)
//! STRESS_RANDOM    if set to 1/true, room and seat are drawn from [0,10); otherwise every
//!                  request targets batman room 2 seat 7
//! Cache and store settings come from the same variables as the main binary.

use anyhow::{Context, Result};
use futures_util::future::join_all;
use rand::Rng;
use reqlock::{BookingService, Config, DedupCache, InMemoryTicketStore, Ticket};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_REQUESTS: usize = 40;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("stress=info,reqlock=warn")),
        )
        .init();

    let config = Config::from_env()?;
    let requests: usize = match std::env::var("STRESS_REQUESTS") {
        Ok(val) => val.trim().parse().context("Invalid STRESS_REQUESTS")?,
        Err(_) => DEFAULT_REQUESTS,
    };
    let random = std::env::var("STRESS_RANDOM")
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);

    let cache = Arc::new(DedupCache::new());
    if config.cleanup_enabled {
        cache.start_cleanup(config.cleanup_interval, config.cleanup_max_idle_secs)?;
    }
    let store = Arc::new(InMemoryTicketStore::new(config.persist_latency));
    let service = Arc::new(BookingService::with_scope(
        Arc::clone(&cache),
        store.clone(),
        config.scope.clone(),
    ));

    let tickets: Vec<Ticket> = {
        let mut rng = rand::thread_rng();
        (0..requests)
            .map(|_| {
                if random {
                    Ticket::new("batman", rng.gen_range(0..10), rng.gen_range(0..10))
                } else {
                    Ticket::new("batman", 2, 7)
                }
            })
            .collect()
    };

    let started = Instant::now();
    let handles = tickets.into_iter().map(|ticket| {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.book(ticket).await })
    });
    let mut admitted = 0usize;
    for outcome in join_all(handles).await {
        if outcome.context("booking task panicked")? {
            admitted += 1;
        }
    }
    let elapsed = started.elapsed();

    let records = store.records().await;
    let distinct: HashSet<Ticket> = records.iter().map(|r| r.ticket()).collect();
    let duplicates = records.len() - distinct.len();

    tracing::info!(
        requests,
        admitted,
        rejected = requests - admitted,
        records = records.len(),
        duplicates,
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "[Stress] run finished"
    );

    cache.shutdown().await;

    if duplicates > 0 {
        anyhow::bail!("found {duplicates} duplicate booking(s)");
    }
    Ok(())
}
