//! Line-oriented booking front end: one urlencoded form body per stdin line,
//! one JSON response per stdout line. Requests are booked concurrently.

use anyhow::{Context, Result};
use reqlock::{
    handle_booking, BookingResponse, BookingService, Config, DedupCache, InMemoryTicketStore,
};
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::{JoinError, JoinSet};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present (optional; in production set env vars directly)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("reqlock=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    tracing::info!(?config, "loaded configuration");

    let cache = Arc::new(DedupCache::new());
    if config.cleanup_enabled {
        cache
            .start_cleanup(config.cleanup_interval, config.cleanup_max_idle_secs)
            .context("start cleanup routine")?;
    }
    let store = Arc::new(InMemoryTicketStore::new(config.persist_latency));
    let service = Arc::new(BookingService::with_scope(
        Arc::clone(&cache),
        store.clone(),
        config.scope.clone(),
    ));

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
        tracing::info!("interrupt received, draining in-flight requests");
    };
    let input = BufReader::new(tokio::io::stdin());
    run(service, input, interrupt, |line| println!("{line}")).await;

    cache.shutdown().await;
    tracing::info!(booked = store.len().await, "shutdown complete");
    Ok(())
}

/// Books every non-blank input line concurrently and emits one JSON response per
/// finished request. Stops reading on EOF, `stop`, or an input error, then drains
/// whatever is still in flight.
async fn run<R, S, E>(service: Arc<BookingService>, input: R, stop: S, mut emit: E)
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
    E: FnMut(String),
{
    let mut lines = input.lines();
    let mut in_flight = JoinSet::new();
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            line = lines.next_line() => {
                let body = match line {
                    Ok(Some(body)) => body,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "read input failed, draining in-flight requests");
                        break;
                    }
                };
                if body.trim().is_empty() {
                    continue;
                }
                let service = Arc::clone(&service);
                in_flight.spawn(async move { handle_booking(&service, &body).await });
            }
            Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Some(line) = render(done) {
                    emit(line);
                }
            }
        }
    }

    while let Some(done) = in_flight.join_next().await {
        if let Some(line) = render(done) {
            emit(line);
        }
    }
}

fn render(done: std::result::Result<BookingResponse, JoinError>) -> Option<String> {
    let response = match done {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "booking task failed");
            return None;
        }
    };
    match serde_json::to_string(&response) {
        Ok(line) => Some(line),
        Err(e) => {
            tracing::error!(error = %e, "encode response failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqlock::Ticket;

    fn service() -> Arc<BookingService> {
        let cache = Arc::new(DedupCache::<Ticket>::new());
        let store = Arc::new(InMemoryTicketStore::new(std::time::Duration::ZERO));
        Arc::new(BookingService::new(cache, store))
    }

    #[tokio::test]
    async fn input_error_still_drains_booked_requests() {
        // The second line is not UTF-8, so reading it fails.
        let input: &[u8] = b"film=batman&room=1&seat=1\n\xff\xfe\nfilm=batman&room=1&seat=2\n";
        let mut out = Vec::new();
        run(service(), input, std::future::pending(), |line| out.push(line)).await;

        assert_eq!(out.len(), 1);
        assert!(out[0].contains("Ticket secured"));
    }

    #[tokio::test]
    async fn eof_drains_every_request() {
        let input: &[u8] = b"film=batman&room=1&seat=1\n\nfilm=batman&room=1&seat=1\n";
        let mut out = Vec::new();
        run(service(), input, std::future::pending(), |line| out.push(line)).await;

        assert_eq!(out.len(), 2);
        assert_eq!(out.iter().filter(|l| l.contains("Ticket secured")).count(), 1);
    }

    #[tokio::test]
    async fn failed_task_is_logged_not_fatal() {
        let failed: std::result::Result<BookingResponse, JoinError> =
            tokio::spawn(async { panic!("boom") }).await;
        assert!(render(failed).is_none());
    }
}
