use crate::booking::DEFAULT_PERSIST_LATENCY;
use crate::types::DEFAULT_BOOKING_SCOPE;
use anyhow::{bail, Context, Result};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub scope: String,
    pub cleanup_enabled: bool,
    pub cleanup_interval: Duration,
    /// Values untouched for longer than this are evicted by the cleanup routine.
    pub cleanup_max_idle_secs: u64,
    /// Simulated store write latency.
    pub persist_latency: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scope: DEFAULT_BOOKING_SCOPE.to_string(),
            cleanup_enabled: true,
            cleanup_interval: Duration::from_secs(4),
            cleanup_max_idle_secs: 3,
            persist_latency: DEFAULT_PERSIST_LATENCY,
        }
    }
}

impl Config {
    /// Reads configuration from the process environment. Call `dotenvy::dotenv()` first to honour `.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let scope = lookup("BOOKING_SCOPE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.scope);

        let cleanup_enabled = match lookup("CLEANUP_ENABLED") {
            Some(val) => {
                parse_bool(&val).with_context(|| format!("Invalid CLEANUP_ENABLED {val:?}"))?
            }
            None => defaults.cleanup_enabled,
        };

        let cleanup_interval =
            parse_millis(&lookup, "CLEANUP_INTERVAL_MS", defaults.cleanup_interval)?;
        if cleanup_interval.is_zero() {
            bail!("CLEANUP_INTERVAL_MS must be greater than zero");
        }
        let cleanup_max_idle_secs: u64 =
            parse_var(&lookup, "CLEANUP_MAX_IDLE_SECS", defaults.cleanup_max_idle_secs)?;
        let persist_latency =
            parse_millis(&lookup, "PERSIST_LATENCY_MS", defaults.persist_latency)?;

        Ok(Self {
            scope,
            cleanup_enabled,
            cleanup_interval,
            cleanup_max_idle_secs,
            persist_latency,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(val) => val.trim().parse().with_context(|| format!("Invalid {key}")),
        None => Ok(default),
    }
}

fn parse_millis<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => {
            let ms: u64 = val.trim().parse().with_context(|| format!("Invalid {key}"))?;
            Ok(Duration::from_millis(ms))
        }
        None => Ok(default),
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
