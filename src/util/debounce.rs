//! Timer-based coalescing buffers.
//!
//! Nothing here spawns tasks. The owner pushes values, asks for the next
//! deadline, and polls after the deadline passes; the latest value wins.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Holds at most one pending value and releases it after a quiet period.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any pending value and restart the quiet period.
    pub fn push(&mut self, value: T) {
        self.push_at(value, Instant::now());
    }

    pub fn push_at(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    /// When the pending value becomes due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, due)| *due)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending value if its quiet period is over.
    pub fn poll(&mut self) -> Option<T> {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, due)) if *due <= now => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    /// Drop the pending value. Returns whether something was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }
}

/// A set of independent debouncers addressed by key.
#[derive(Debug)]
pub struct KeyedDebouncer<K, T> {
    delay: Duration,
    slots: HashMap<K, Debouncer<T>>,
}

impl<K: Eq + Hash + Clone, T> KeyedDebouncer<K, T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slots: HashMap::new(),
        }
    }

    pub fn push_at(&mut self, key: K, value: T, now: Instant, delay: Option<Duration>) {
        let delay = delay.unwrap_or(self.delay);
        let slot = self
            .slots
            .entry(key)
            .or_insert_with(|| Debouncer::new(delay));
        slot.delay = delay;
        slot.push_at(value, now);
    }

    /// Earliest deadline across all keys.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.values().filter_map(Debouncer::deadline).min()
    }

    /// Take every value whose quiet period is over.
    pub fn drain_due(&mut self, now: Instant) -> Vec<(K, T)> {
        let mut due = Vec::new();
        for (key, slot) in self.slots.iter_mut() {
            if let Some(value) = slot.poll_at(now) {
                due.push((key.clone(), value));
            }
        }
        self.slots.retain(|_, slot| slot.is_pending());
        due
    }

    pub fn contains(&self, key: &K) -> bool {
        self.slots.get(key).is_some_and(Debouncer::is_pending)
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        self.slots.remove(key).is_some_and(|mut slot| slot.cancel())
    }

    /// Cancel every key matching the predicate. Returns how many were dropped.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&K) -> bool) -> usize {
        let before = self.slots.len();
        self.slots.retain(|key, _| !pred(key));
        before - self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(300);

    #[test]
    fn releases_after_quiet_period() {
        let start = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.push_at("a", start);
        assert_eq!(d.poll_at(start + Duration::from_millis(299)), None);
        assert_eq!(d.poll_at(start + DELAY), Some("a"));
        assert!(!d.is_pending());
    }

    #[test]
    fn latest_value_wins_and_restarts_timer() {
        let start = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.push_at("a", start);
        d.push_at("ab", start + Duration::from_millis(100));
        d.push_at("abc", start + Duration::from_millis(200));

        assert_eq!(d.poll_at(start + DELAY), None);
        assert_eq!(d.deadline(), Some(start + Duration::from_millis(500)));
        assert_eq!(d.poll_at(start + Duration::from_millis(500)), Some("abc"));
        assert_eq!(d.poll_at(start + Duration::from_secs(10)), None);
    }

    #[test]
    fn cancel_drops_pending_value() {
        let start = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.push_at(1, start);
        assert!(d.cancel());
        assert!(!d.cancel());
        assert_eq!(d.poll_at(start + Duration::from_secs(1)), None);
    }

    #[test]
    fn keyed_slots_are_independent() {
        let start = Instant::now();
        let mut d = KeyedDebouncer::new(DELAY);
        d.push_at("tab-1", "cat", start, None);
        d.push_at("tab-2", "dog", start + Duration::from_millis(100), None);

        assert_eq!(d.next_deadline(), Some(start + DELAY));
        assert_eq!(d.drain_due(start + DELAY), vec![("tab-1", "cat")]);
        assert_eq!(d.len(), 1);
        assert_eq!(
            d.drain_due(start + Duration::from_millis(400)),
            vec![("tab-2", "dog")]
        );
        assert!(d.is_empty());
    }

    #[test]
    fn keyed_cancel_where_matches_prefix() {
        let start = Instant::now();
        let mut d = KeyedDebouncer::new(DELAY);
        d.push_at("w1/tab-1".to_string(), 1, start, None);
        d.push_at("w1/tab-2".to_string(), 2, start, None);
        d.push_at("w2/tab-1".to_string(), 3, start, None);
        assert_eq!(d.cancel_where(|k| k.starts_with("w1/")), 2);
        assert_eq!(d.drain_due(start + DELAY), vec![("w2/tab-1".to_string(), 3)]);
    }

    #[test]
    fn keyed_per_push_delay_override() {
        let start = Instant::now();
        let mut d = KeyedDebouncer::new(DELAY);
        d.push_at("k", 1, start, Some(Duration::from_millis(10)));
        assert_eq!(d.drain_due(start + Duration::from_millis(10)), vec![("k", 1)]);
    }
}
