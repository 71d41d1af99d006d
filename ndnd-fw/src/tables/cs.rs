use std::collections::{BTreeMap, VecDeque};

use log::debug;
use ndnd_core::packets::{Data, Interest};
use ndnd_core::Name;
use tokio::time::Instant;

/// A cached Data packet with its original wire encoding
#[derive(Debug, Clone)]
pub struct CsEntry {
    pub data: Data,
    pub wire: Vec<u8>,
    /// Instant past which the entry no longer satisfies MustBeFresh.
    /// `None` means the Data carried no freshness period and is never fresh.
    pub freshness_deadline: Option<Instant>,
    pub inserted_at: Instant,
    seq: u64,
}

impl CsEntry {
    pub fn is_fresh(&self, now: Instant) -> bool {
        matches!(self.freshness_deadline, Some(deadline) if now < deadline)
    }
}

/// Bounded, name-indexed cache of recently forwarded Data.
///
/// Private to one worker; no interior locking. Entries sit in a BTreeMap in
/// canonical name order so all names under a prefix form a contiguous range.
pub struct ContentStore {
    entries: BTreeMap<Name, CsEntry>,
    // Insertion order for eviction; stale pairs are skipped on pop
    insertion_queue: VecDeque<(u64, Name)>,
    capacity: usize,
    next_seq: u64,
}

impl ContentStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            insertion_queue: VecDeque::new(),
            capacity,
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resize the store, evicting eagerly if it shrinks
    pub fn set_capacity(&mut self, capacity: usize, now: Instant) {
        self.capacity = capacity;
        while self.entries.len() > self.capacity {
            self.evict_one(now);
        }
    }

    /// Find the newest entry satisfying the Interest's selectors
    pub fn find(&self, interest: &Interest, now: Instant) -> Option<&CsEntry> {
        if interest.can_be_prefix {
            self.entries
                .range(interest.name.clone()..)
                .take_while(|(name, _)| interest.name.is_prefix_of(name))
                .filter(|(_, entry)| !interest.must_be_fresh || entry.is_fresh(now))
                .max_by_key(|(_, entry)| entry.seq)
                .map(|(_, entry)| entry)
        } else {
            self.entries
                .get(&interest.name)
                .filter(|entry| !interest.must_be_fresh || entry.is_fresh(now))
        }
    }

    /// Insert a Data packet, evicting one entry if at capacity
    pub fn insert(&mut self, data: Data, wire: Vec<u8>, now: Instant) -> bool {
        if self.capacity == 0 {
            return false;
        }

        let name = data.name.clone();
        let freshness_deadline = data
            .freshness_period
            .filter(|period| !period.is_zero())
            .map(|period| now + period);

        if !self.entries.contains_key(&name) && self.entries.len() >= self.capacity {
            self.evict_one(now);
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        self.entries.insert(
            name.clone(),
            CsEntry {
                data,
                wire,
                freshness_deadline,
                inserted_at: now,
                seq,
            },
        );
        self.insertion_queue.push_back((seq, name));
        debug!("content store insert (size {}/{})", self.entries.len(), self.capacity);
        true
    }

    /// Evict one entry: a freshness-expired one if any exists, else the
    /// oldest by insertion order.
    fn evict_one(&mut self, now: Instant) {
        let stale = self
            .entries
            .iter()
            .find(|(_, entry)| entry.freshness_deadline.is_some() && !entry.is_fresh(now))
            .map(|(name, _)| name.clone());

        if let Some(name) = stale {
            self.entries.remove(&name);
            return;
        }

        while let Some((seq, name)) = self.insertion_queue.pop_front() {
            // Skip queue entries superseded by a later insert of the same name
            if self.entries.get(&name).map(|e| e.seq) == Some(seq) {
                self.entries.remove(&name);
                return;
            }
        }
    }
}
