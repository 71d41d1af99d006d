use std::any::Any;
use std::collections::HashMap;
use std::time::Duration;

use log::debug;
use ndnd_core::packets::{Interest, NackReason};
use ndnd_core::Name;
use tokio::time::Instant;

use crate::face::FaceId;
use crate::tables::strategy_choice::StrategyChoice;

/// Opaque handle to a PIT entry, stable for the entry's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PitToken(u64);

/// Record of a downstream face that requested the content
#[derive(Debug, Clone)]
pub struct InRecord {
    pub face: FaceId,
    pub nonce: u32,
    pub lifetime: Duration,
    pub arrival: Instant,
}

/// Record of an upstream face the Interest was forwarded to
#[derive(Debug, Clone)]
pub struct OutRecord {
    pub face: FaceId,
    pub nonce: u32,
    pub departure: Instant,
    pub nack: Option<NackReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PitKey {
    name: Name,
    can_be_prefix: bool,
    must_be_fresh: bool,
}

impl PitKey {
    fn of(interest: &Interest) -> Self {
        Self {
            name: interest.name.clone(),
            can_be_prefix: interest.can_be_prefix,
            must_be_fresh: interest.must_be_fresh,
        }
    }
}

/// A pending Interest aggregated by (name, selectors)
pub struct PitEntry {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    in_records: Vec<InRecord>,
    out_records: Vec<OutRecord>,
    // Observed nonces with first-seen timestamps, purged lazily
    nonces: Vec<(u32, Instant)>,
    pub expiry: Instant,
    /// Strategy chosen for this entry at creation
    pub strategy: StrategyChoice,
    strategy_state: HashMap<String, Box<dyn Any + Send>>,
}

impl PitEntry {
    pub fn in_records(&self) -> &[InRecord] {
        &self.in_records
    }

    pub fn out_records(&self) -> &[OutRecord] {
        &self.out_records
    }

    pub fn has_out_records(&self) -> bool {
        !self.out_records.is_empty()
    }

    /// Remove the in-record for a face, typically after serving it Data
    pub fn take_in_record(&mut self, face: FaceId) -> Option<InRecord> {
        let index = self.in_records.iter().position(|record| record.face == face)?;
        Some(self.in_records.remove(index))
    }

    pub fn clear_records(&mut self) {
        self.in_records.clear();
        self.out_records.clear();
    }

    /// All out-records carry a Nack
    pub fn out_records_all_nacked(&self) -> bool {
        !self.out_records.is_empty() && self.out_records.iter().all(|record| record.nack.is_some())
    }

    /// Least severe reason among recorded Nacks
    pub fn least_severe_nack(&self) -> Option<NackReason> {
        self.out_records
            .iter()
            .filter_map(|record| record.nack)
            .reduce(NackReason::less_severe)
    }

    /// Per-strategy opaque state, keyed by strategy name
    pub fn strategy_state_mut(&mut self, key: &str) -> Option<&mut (dyn Any + Send)> {
        self.strategy_state.get_mut(key).map(|slot| slot.as_mut())
    }

    pub fn set_strategy_state(&mut self, key: String, value: Box<dyn Any + Send>) {
        self.strategy_state.insert(key, value);
    }
}

/// Outcome of inserting an Interest into the PIT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitInsertOutcome {
    /// New PIT entry created
    New(PitToken),
    /// Interest aggregated with an existing entry
    Aggregated(PitToken),
    /// Nonce already observed from a different face within the loop window
    Loop,
}

/// Pending Interest Table, private to one worker
pub struct Pit {
    entries: HashMap<PitToken, PitEntry>,
    index: HashMap<PitKey, PitToken>,
    name_index: HashMap<Name, Vec<PitToken>>,
    next_token: u64,
    max_lifetime_seen: Duration,
    nonce_grace: Duration,
}

impl Pit {
    pub fn new(nonce_grace: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            index: HashMap::new(),
            name_index: HashMap::new(),
            next_token: 0,
            max_lifetime_seen: Duration::ZERO,
            nonce_grace,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, token: PitToken) -> Option<&PitEntry> {
        self.entries.get(&token)
    }

    pub fn entry_mut(&mut self, token: PitToken) -> Option<&mut PitEntry> {
        self.entries.get_mut(&token)
    }

    /// Insert or merge an Interest.
    ///
    /// Interests without a nonce are dropped earlier in the pipeline; a
    /// missing nonce here is treated as 0.
    pub fn find_or_insert(
        &mut self,
        interest: &Interest,
        in_face: FaceId,
        now: Instant,
    ) -> PitInsertOutcome {
        let nonce = interest.nonce.unwrap_or(0);
        let lifetime = interest.lifetime_or_default();
        if lifetime > self.max_lifetime_seen {
            self.max_lifetime_seen = lifetime;
        }
        let loop_window = self.max_lifetime_seen + self.nonce_grace;

        let key = PitKey::of(interest);
        if let Some(&token) = self.index.get(&key) {
            let entry = self.entries.get_mut(&token).expect("pit index out of sync");

            entry
                .nonces
                .retain(|(_, seen)| now.saturating_duration_since(*seen) <= loop_window);

            let same_face_retransmission = entry
                .in_records
                .iter()
                .any(|record| record.face == in_face && record.nonce == nonce);
            if !same_face_retransmission && entry.nonces.iter().any(|(n, _)| *n == nonce) {
                debug!("loop detected for {} nonce {:#x}", entry.name, nonce);
                return PitInsertOutcome::Loop;
            }

            Self::upsert_in_record(entry, in_face, nonce, lifetime, now);
            if !entry.nonces.iter().any(|(n, _)| *n == nonce) {
                entry.nonces.push((nonce, now));
            }
            entry.expiry = entry
                .in_records
                .iter()
                .map(|record| record.arrival + record.lifetime)
                .max()
                .expect("entry has at least one in-record");

            return PitInsertOutcome::Aggregated(token);
        }

        let token = PitToken(self.next_token);
        self.next_token += 1;

        let entry = PitEntry {
            name: interest.name.clone(),
            can_be_prefix: interest.can_be_prefix,
            must_be_fresh: interest.must_be_fresh,
            in_records: vec![InRecord {
                face: in_face,
                nonce,
                lifetime,
                arrival: now,
            }],
            out_records: Vec::new(),
            nonces: vec![(nonce, now)],
            expiry: now + lifetime,
            strategy: StrategyChoice {
                strategy: Name::new(),
                version: 0,
            },
            strategy_state: HashMap::new(),
        };

        self.entries.insert(token, entry);
        self.index.insert(key, token);
        self.name_index
            .entry(interest.name.clone())
            .or_default()
            .push(token);

        PitInsertOutcome::New(token)
    }

    fn upsert_in_record(
        entry: &mut PitEntry,
        face: FaceId,
        nonce: u32,
        lifetime: Duration,
        now: Instant,
    ) {
        match entry.in_records.iter_mut().find(|record| record.face == face) {
            Some(record) => {
                record.nonce = nonce;
                record.lifetime = lifetime;
                record.arrival = now;
            }
            None => entry.in_records.push(InRecord {
                face,
                nonce,
                lifetime,
                arrival: now,
            }),
        }
        assert!(
            entry.in_records.iter().filter(|record| record.face == face).count() == 1,
            "duplicate in-record for face {face}"
        );
    }

    /// Record that the Interest was forwarded out a face; idempotent per face
    pub fn insert_out_record(&mut self, token: PitToken, face: FaceId, nonce: u32, now: Instant) {
        let Some(entry) = self.entries.get_mut(&token) else {
            return;
        };
        match entry.out_records.iter_mut().find(|record| record.face == face) {
            Some(record) => {
                record.nonce = nonce;
                record.departure = now;
                record.nack = None;
            }
            None => entry.out_records.push(OutRecord {
                face,
                nonce,
                departure: now,
                nack: None,
            }),
        }
        assert!(
            entry.out_records.iter().filter(|record| record.face == face).count() == 1,
            "duplicate out-record for face {face}"
        );
    }

    /// Attach a Nack to the out-record matching (face, nonce)
    pub fn record_nack(
        &mut self,
        token: PitToken,
        face: FaceId,
        nonce: u32,
        reason: NackReason,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(&token) else {
            return false;
        };
        match entry
            .out_records
            .iter_mut()
            .find(|record| record.face == face && record.nonce == nonce)
        {
            Some(record) => {
                record.nack = Some(reason);
                true
            }
            None => false,
        }
    }

    /// All entries a Data packet can satisfy
    pub fn find_matching(&self, data_name: &Name, data_can_be_fresh: bool) -> Vec<PitToken> {
        let mut matches = Vec::new();
        for k in 0..=data_name.len() {
            let Some(tokens) = self.name_index.get(&data_name.get_prefix(k)) else {
                continue;
            };
            for &token in tokens {
                let entry = self.entries.get(&token).expect("pit name index out of sync");
                let name_ok = k == data_name.len() || entry.can_be_prefix;
                let fresh_ok = !entry.must_be_fresh || data_can_be_fresh;
                if name_ok && fresh_ok {
                    matches.push(token);
                }
            }
        }
        matches
    }

    /// Look up the entry for exactly this (name, selectors) key
    pub fn find_exact(&self, interest: &Interest) -> Option<PitToken> {
        self.index.get(&PitKey::of(interest)).copied()
    }

    pub fn set_expiry(&mut self, token: PitToken, at: Instant) {
        if let Some(entry) = self.entries.get_mut(&token) {
            entry.expiry = at;
        }
    }

    /// Remove an entry and unlink it from all indexes
    pub fn remove(&mut self, token: PitToken) -> Option<PitEntry> {
        let entry = self.entries.remove(&token)?;
        self.index.remove(&PitKey {
            name: entry.name.clone(),
            can_be_prefix: entry.can_be_prefix,
            must_be_fresh: entry.must_be_fresh,
        });
        if let Some(tokens) = self.name_index.get_mut(&entry.name) {
            tokens.retain(|t| *t != token);
            if tokens.is_empty() {
                self.name_index.remove(&entry.name);
            }
        }
        Some(entry)
    }

    /// Strip a dead face from every entry; entries left with no records are
    /// removed and returned.
    pub fn purge_face(&mut self, face: FaceId) -> Vec<PitToken> {
        let mut emptied = Vec::new();
        for (token, entry) in self.entries.iter_mut() {
            entry.in_records.retain(|record| record.face != face);
            entry.out_records.retain(|record| record.face != face);
            if entry.in_records.is_empty() && entry.out_records.is_empty() {
                emptied.push(*token);
            }
        }
        for token in &emptied {
            self.remove(*token);
        }
        emptied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interest(name: &str, nonce: u32) -> Interest {
        Interest::new(Name::from_str(name)).with_nonce(nonce)
    }

    #[tokio::test]
    async fn test_new_then_aggregated() {
        let mut pit = Pit::new(Duration::from_secs(1));
        let now = Instant::now();

        let outcome = pit.find_or_insert(&interest("/a/b", 1), 10, now);
        let token = match outcome {
            PitInsertOutcome::New(token) => token,
            other => panic!("expected New, got {other:?}"),
        };

        let outcome = pit.find_or_insert(&interest("/a/b", 2), 11, now);
        assert_eq!(outcome, PitInsertOutcome::Aggregated(token));

        let entry = pit.entry(token).unwrap();
        assert_eq!(entry.in_records().len(), 2);
        assert_eq!(pit.len(), 1);
    }

    #[tokio::test]
    async fn test_in_record_carries_last_nonce() {
        let mut pit = Pit::new(Duration::from_secs(1));
        let now = Instant::now();

        let PitInsertOutcome::New(token) = pit.find_or_insert(&interest("/a", 0xAA), 1, now) else {
            panic!("expected New");
        };
        let record = &pit.entry(token).unwrap().in_records()[0];
        assert_eq!(record.face, 1);
        assert_eq!(record.nonce, 0xAA);
    }

    #[tokio::test]
    async fn test_loop_detection() {
        let mut pit = Pit::new(Duration::from_secs(1));
        let now = Instant::now();

        let PitInsertOutcome::New(token) = pit.find_or_insert(&interest("/a/b", 0xBB), 1, now)
        else {
            panic!("expected New");
        };
        // same nonce from another face is a loop and must not touch records
        let outcome = pit.find_or_insert(&interest("/a/b", 0xBB), 4, now);
        assert_eq!(outcome, PitInsertOutcome::Loop);

        let entry = pit.entry(token).unwrap();
        assert_eq!(entry.in_records().len(), 1);
        assert_eq!(entry.in_records()[0].face, 1);
    }

    #[tokio::test]
    async fn test_same_face_retransmission_is_idempotent() {
        let mut pit = Pit::new(Duration::from_secs(1));
        let now = Instant::now();

        let first = pit.find_or_insert(&interest("/a/b", 7), 1, now);
        let PitInsertOutcome::New(token) = first else {
            panic!("expected New");
        };
        let (records, nonces, expiry) = {
            let entry = pit.entry(token).unwrap();
            (entry.in_records().len(), entry.nonces.len(), entry.expiry)
        };

        let second = pit.find_or_insert(&interest("/a/b", 7), 1, now);
        assert_eq!(second, PitInsertOutcome::Aggregated(token));

        let entry = pit.entry(token).unwrap();
        assert_eq!(entry.in_records().len(), records);
        assert_eq!(entry.nonces.len(), nonces);
        assert_eq!(entry.expiry, expiry);
    }

    #[tokio::test]
    async fn test_nonce_window_purge() {
        let mut pit = Pit::new(Duration::from_millis(50));
        let now = Instant::now();

        let short = interest("/a", 9).with_lifetime(Duration::from_millis(10));
        pit.find_or_insert(&short, 1, now);

        // well past lifetime + grace, the nonce has been forgotten
        let later = now + Duration::from_millis(200);
        let outcome = pit.find_or_insert(&short, 2, later);
        assert!(matches!(outcome, PitInsertOutcome::Aggregated(_)));
    }

    #[tokio::test]
    async fn test_selectors_distinguish_entries() {
        let mut pit = Pit::new(Duration::from_secs(1));
        let now = Instant::now();

        pit.find_or_insert(&interest("/a", 1), 1, now);
        pit.find_or_insert(&interest("/a", 2).with_can_be_prefix(true), 1, now);
        assert_eq!(pit.len(), 2);
    }

    #[tokio::test]
    async fn test_out_record_idempotent() {
        let mut pit = Pit::new(Duration::from_secs(1));
        let now = Instant::now();

        let PitInsertOutcome::New(token) = pit.find_or_insert(&interest("/a", 1), 1, now) else {
            panic!("expected New");
        };
        pit.insert_out_record(token, 2, 1, now);
        pit.insert_out_record(token, 2, 1, now);

        assert_eq!(pit.entry(token).unwrap().out_records().len(), 1);
    }

    #[tokio::test]
    async fn test_expiry_is_max_over_in_records() {
        let mut pit = Pit::new(Duration::from_secs(1));
        let now = Instant::now();

        let short = interest("/a", 1).with_lifetime(Duration::from_millis(100));
        let long = interest("/a", 2).with_lifetime(Duration::from_millis(500));

        let PitInsertOutcome::New(token) = pit.find_or_insert(&short, 1, now) else {
            panic!("expected New");
        };
        pit.find_or_insert(&long, 2, now);

        assert_eq!(pit.entry(token).unwrap().expiry, now + Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_find_matching() {
        let mut pit = Pit::new(Duration::from_secs(1));
        let now = Instant::now();

        let PitInsertOutcome::New(exact) = pit.find_or_insert(&interest("/a/b", 1), 1, now) else {
            panic!("expected New");
        };
        let prefix_interest = interest("/a", 2).with_can_be_prefix(true);
        let PitInsertOutcome::New(prefix) = pit.find_or_insert(&prefix_interest, 1, now) else {
            panic!("expected New");
        };
        let fresh_interest = interest("/a/b", 3).with_must_be_fresh(true);
        let PitInsertOutcome::New(fresh) = pit.find_or_insert(&fresh_interest, 1, now) else {
            panic!("expected New");
        };

        // stale Data for /a/b: the exact entry matches, the prefix entry
        // matches, the MustBeFresh entry does not
        let matches = pit.find_matching(&Name::from_str("/a/b"), false);
        assert!(matches.contains(&exact));
        assert!(matches.contains(&prefix));
        assert!(!matches.contains(&fresh));

        let matches = pit.find_matching(&Name::from_str("/a/b"), true);
        assert!(matches.contains(&fresh));

        // deeper Data only matches the CanBePrefix entry
        let matches = pit.find_matching(&Name::from_str("/a/b/seg0"), true);
        assert_eq!(matches, vec![prefix]);
    }

    #[tokio::test]
    async fn test_set_expiry() {
        let mut pit = Pit::new(Duration::from_secs(1));
        let now = Instant::now();

        let PitInsertOutcome::New(token) = pit.find_or_insert(&interest("/a", 1), 1, now) else {
            panic!("expected New");
        };
        let at = now + Duration::from_secs(30);
        pit.set_expiry(token, at);
        assert_eq!(pit.entry(token).unwrap().expiry, at);
    }

    #[tokio::test]
    async fn test_remove_unlinks_indexes() {
        let mut pit = Pit::new(Duration::from_secs(1));
        let now = Instant::now();

        let PitInsertOutcome::New(token) = pit.find_or_insert(&interest("/a/b", 1), 1, now) else {
            panic!("expected New");
        };
        pit.remove(token);

        assert!(pit.is_empty());
        assert!(pit.find_matching(&Name::from_str("/a/b"), true).is_empty());
        assert!(pit.find_exact(&interest("/a/b", 1)).is_none());
    }

    #[tokio::test]
    async fn test_purge_face() {
        let mut pit = Pit::new(Duration::from_secs(1));
        let now = Instant::now();

        let PitInsertOutcome::New(lone) = pit.find_or_insert(&interest("/a", 1), 1, now) else {
            panic!("expected New");
        };
        let PitInsertOutcome::New(shared) = pit.find_or_insert(&interest("/b", 2), 1, now) else {
            panic!("expected New");
        };
        pit.find_or_insert(&interest("/b", 3), 2, now);

        let removed = pit.purge_face(1);
        assert_eq!(removed, vec![lone]);
        assert_eq!(pit.entry(shared).unwrap().in_records().len(), 1);
    }

    #[tokio::test]
    async fn test_record_nack_matches_face_and_nonce() {
        let mut pit = Pit::new(Duration::from_secs(1));
        let now = Instant::now();

        let PitInsertOutcome::New(token) = pit.find_or_insert(&interest("/a", 1), 1, now) else {
            panic!("expected New");
        };
        pit.insert_out_record(token, 2, 0xAA, now);

        assert!(!pit.record_nack(token, 2, 0xBB, NackReason::NoRoute));
        assert!(pit.record_nack(token, 2, 0xAA, NackReason::NoRoute));
        assert!(pit.entry(token).unwrap().out_records_all_nacked());
    }

    #[tokio::test]
    async fn test_strategy_state_slot() {
        let mut pit = Pit::new(Duration::from_secs(1));
        let now = Instant::now();

        let PitInsertOutcome::New(token) = pit.find_or_insert(&interest("/a", 1), 1, now) else {
            panic!("expected New");
        };
        let entry = pit.entry_mut(token).unwrap();
        entry.set_strategy_state("probe".to_string(), Box::new(3u32));

        let slot = entry.strategy_state_mut("probe").unwrap();
        let counter = slot.downcast_mut::<u32>().unwrap();
        *counter += 1;

        let slot = pit
            .entry_mut(token)
            .unwrap()
            .strategy_state_mut("probe")
            .unwrap();
        assert_eq!(*slot.downcast_ref::<u32>().unwrap(), 4);
    }
}
