//! Small in-memory TTL cache.
//!
//! The PredictIt adapter is the system's only consumer (§5): on a 429/5xx it
//! falls back to the last good response rather than returning `[]`.

use std::time::{Duration, Instant};

pub struct TtlCache<T> {
    ttl: Duration,
    entry: Option<(Instant, T)>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    pub fn set(&mut self, value: T) {
        self.entry = Some((Instant::now(), value));
    }

    /// Returns the cached value if present and not yet expired.
    pub fn get(&self) -> Option<T> {
        self.entry
            .as_ref()
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, v)| v.clone())
    }

    /// Returns the cached value regardless of expiry, for stale-fallback use.
    pub fn get_stale(&self) -> Option<T> {
        self.entry.as_ref().map(|(_, v)| v.clone())
    }

    pub fn is_expired(&self) -> bool {
        match &self.entry {
            None => true,
            Some((at, _)) => at.elapsed() >= self.ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_is_expired() {
        let cache: TtlCache<Vec<u32>> = TtlCache::new(Duration::from_secs(30));
        assert!(cache.is_expired());
        assert!(cache.get().is_none());
    }

    #[test]
    fn fresh_value_is_returned() {
        let mut cache = TtlCache::new(Duration::from_secs(30));
        cache.set(vec![1, 2, 3]);
        assert!(!cache.is_expired());
        assert_eq!(cache.get(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn stale_value_survives_for_fallback() {
        let mut cache = TtlCache::new(Duration::from_millis(0));
        cache.set(vec![42]);
        assert!(cache.is_expired());
        assert!(cache.get().is_none());
        assert_eq!(cache.get_stale(), Some(vec![42]));
    }
}
