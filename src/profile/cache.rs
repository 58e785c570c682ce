use chrono::{DateTime, Duration, Utc};

/// Single-value cache that expires `ttl` after the value was stored.
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    ttl: Duration,
    entry: Option<(DateTime<Utc>, T)>,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    /// The cached value, if it was stored less than `ttl` before `now`.
    pub fn get(&self, now: DateTime<Utc>) -> Option<&T> {
        match &self.entry {
            Some((stored_at, value)) if now - *stored_at < self.ttl => Some(value),
            _ => None,
        }
    }

    pub fn insert(&mut self, now: DateTime<Utc>, value: T) -> &T {
        &self.entry.insert((now, value)).1
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
