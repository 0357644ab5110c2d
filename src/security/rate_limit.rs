//! Per-client token bucket rate limiting.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
    last_seen: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
            last_seen: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;
        self.last_seen = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Rate limiter for a single client identity.
#[derive(Debug)]
pub struct Limiter {
    capacity: f64,
    refill_rate: f64,
    bucket: Mutex<TokenBucket>,
}

impl Limiter {
    pub fn new(capacity: u32, refill_per_second: u32) -> Self {
        Self::new_at(capacity, refill_per_second, Instant::now())
    }

    fn new_at(capacity: u32, refill_per_second: u32, now: Instant) -> Self {
        let capacity = f64::from(capacity);
        Self {
            capacity,
            refill_rate: f64::from(refill_per_second),
            bucket: Mutex::new(TokenBucket::new(capacity, now)),
        }
    }

    /// Take one token if one is available.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    fn allow_at(&self, now: Instant) -> bool {
        self.bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_acquire(self.capacity, self.refill_rate, now)
    }

    fn idle_for(&self, now: Instant) -> Duration {
        let bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        now.saturating_duration_since(bucket.last_seen)
    }
}

/// Limiters keyed by client identity, created on first use.
pub struct TokenBucketRegistry {
    limiters: DashMap<String, Arc<Limiter>>,
    capacity: u32,
    refill_per_second: u32,
}

impl TokenBucketRegistry {
    pub fn new(capacity: u32, refill_per_second: u32) -> Self {
        Self {
            limiters: DashMap::new(),
            capacity,
            refill_per_second,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.capacity, config.refill_per_second)
    }

    /// Limiter for `identity`, creating it atomically if needed.
    pub fn get_limiter(&self, identity: &str) -> Arc<Limiter> {
        if let Some(existing) = self.limiters.get(identity) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .limiters
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Limiter::new(self.capacity, self.refill_per_second)));
        Arc::clone(entry.value())
    }

    /// Number of identities currently tracked.
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Drop limiters not used for at least `max_idle`. Returns how many went.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        self.evict_idle_at(max_idle, Instant::now())
    }

    fn evict_idle_at(&self, max_idle: Duration, now: Instant) -> usize {
        let before = self.limiters.len();
        self.limiters.retain(|_, limiter| limiter.idle_for(now) < max_idle);
        before.saturating_sub(self.limiters.len())
    }

    /// Periodically evict idle limiters until shutdown.
    pub async fn run_sweeper(
        self: Arc<Self>,
        interval: Duration,
        max_idle: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            interval_secs = interval.as_secs(),
            max_idle_secs = max_idle.as_secs(),
            "Rate limiter sweeper starting"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.evict_idle(max_idle);
                    metrics::record_limiters(self.len(), evicted);
                    if evicted > 0 {
                        tracing::debug!(evicted, tracked = self.len(), "Evicted idle rate limiters");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limiter sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
