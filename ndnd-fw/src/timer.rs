use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

/// Per-worker timer wheel with millisecond buckets.
///
/// Deadlines are coalesced into ticks relative to the wheel's epoch; a key is
/// scheduled at most once, and rescheduling moves it. Cancellation is lazy:
/// the bucket entry stays behind but is ignored when the key's recorded tick
/// no longer matches.
pub struct TimerWheel<K> {
    epoch: Instant,
    buckets: BTreeMap<u64, Vec<K>>,
    deadlines: HashMap<K, u64>,
}

impl<K: Clone + Eq + Hash> TimerWheel<K> {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            buckets: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    fn tick_of(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.epoch).as_millis() as u64
    }

    /// Schedule (or reschedule) `key` to fire at `at`
    pub fn schedule(&mut self, key: K, at: Instant) {
        let tick = self.tick_of(at);
        self.deadlines.insert(key.clone(), tick);
        self.buckets.entry(tick).or_default().push(key);
    }

    /// Cancel a pending key; a key that is not pending is a no-op
    pub fn cancel(&mut self, key: &K) {
        self.deadlines.remove(key);
    }

    /// Earliest pending deadline, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        let tick = *self.deadlines.values().min()?;
        Some(self.epoch + Duration::from_millis(tick))
    }

    /// Pop every key whose deadline has passed
    pub fn pop_expired(&mut self, now: Instant) -> Vec<K> {
        let now_tick = self.tick_of(now);
        let mut fired = Vec::new();

        let due: Vec<u64> = self
            .buckets
            .range(..=now_tick)
            .map(|(tick, _)| *tick)
            .collect();

        for tick in due {
            if let Some(keys) = self.buckets.remove(&tick) {
                for key in keys {
                    // Skip canceled or rescheduled keys
                    if self.deadlines.get(&key) == Some(&tick) {
                        self.deadlines.remove(&key);
                        fired.push(key);
                    }
                }
            }
        }

        fired
    }

    /// Drop every pending timer
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.deadlines.clear();
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

impl<K: Clone + Eq + Hash> Default for TimerWheel<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schedule_and_pop() {
        let mut wheel = TimerWheel::new();
        let now = Instant::now();

        wheel.schedule(1u32, now + Duration::from_millis(10));
        wheel.schedule(2u32, now + Duration::from_millis(20));

        assert!(wheel.pop_expired(now).is_empty());
        let fired = wheel.pop_expired(now + Duration::from_millis(15));
        assert_eq!(fired, vec![1]);
        let fired = wheel.pop_expired(now + Duration::from_millis(25));
        assert_eq!(fired, vec![2]);
        assert!(wheel.is_empty());
    }

    #[tokio::test]
    async fn test_cancel() {
        let mut wheel = TimerWheel::new();
        let now = Instant::now();

        wheel.schedule(1u32, now + Duration::from_millis(10));
        wheel.cancel(&1);

        assert!(wheel.pop_expired(now + Duration::from_millis(20)).is_empty());
        assert!(wheel.next_deadline().is_none());
    }

    #[tokio::test]
    async fn test_reschedule_moves_deadline() {
        let mut wheel = TimerWheel::new();
        let now = Instant::now();

        wheel.schedule(1u32, now + Duration::from_millis(10));
        wheel.schedule(1u32, now + Duration::from_millis(50));

        // Old bucket entry must not fire
        assert!(wheel.pop_expired(now + Duration::from_millis(20)).is_empty());
        assert_eq!(wheel.pop_expired(now + Duration::from_millis(60)), vec![1]);
    }

    #[tokio::test]
    async fn test_coalesced_bucket() {
        let mut wheel = TimerWheel::new();
        let now = Instant::now();
        let at = now + Duration::from_millis(5);

        wheel.schedule(1u32, at);
        wheel.schedule(2u32, at);

        let mut fired = wheel.pop_expired(now + Duration::from_millis(6));
        fired.sort();
        assert_eq!(fired, vec![1, 2]);
    }
}
