use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{debug, trace, warn};
use ndnd_core::name::component_types;
use ndnd_core::packets::{Data, Interest, Nack, NackReason, Packet};
use ndnd_core::tlv::TlvError;
use ndnd_core::Name;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::face::{FaceError, FaceId, FaceScope, FaceTable, LinkType};
use crate::strategy::registry::StrategyRegistry;
use crate::strategy::Strategy;
use crate::tables::{
    ContentStore, Fib, InRecord, NetworkRegionTable, Pit, PitInsertOutcome, PitToken,
    StrategyChoice, StrategyChoiceTable,
};
use crate::timer::TimerWheel;

/// Messages delivered to a worker's inbound queue
pub enum WorkerMsg {
    /// A decoded packet routed here by the dispatcher
    Packet { face: FaceId, packet: Packet },
    /// A face went down or is closing; strip its records
    FaceClosed(FaceId),
    /// Content store reconfiguration
    CsConfig(CsDirective),
    /// Stop the worker loop
    Shutdown,
}

/// Content store settings scattered to every worker
#[derive(Debug, Clone, Copy)]
pub struct CsDirective {
    /// Capacity of this worker's CS shard
    pub capacity: usize,
    pub admit_unsolicited: bool,
    pub serve: bool,
}

/// Per-worker tunables
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Packets processed before a voluntary yield
    pub batch_size: usize,
    pub cs_capacity: usize,
    pub cs_admit_unsolicited: bool,
    pub cs_serve: bool,
    /// How long a satisfied entry lingers before removal
    pub satisfied_keepalive: Duration,
    /// Added to the largest Interest lifetime seen to form the nonce window
    pub nonce_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            cs_capacity: 4096,
            cs_admit_unsolicited: false,
            cs_serve: true,
            satisfied_keepalive: Duration::from_millis(250),
            nonce_grace: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TimerKey {
    Expiry(PitToken),
    Keepalive(PitToken),
}

/// Errors surfaced to strategies by the send services
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error(transparent)]
    Face(#[from] FaceError),
    #[error("refusing to forward back to point-to-point in-face {0}")]
    SameFace(FaceId),
    #[error("hop limit exhausted")]
    HopLimit,
    #[error(transparent)]
    Encode(#[from] TlvError),
}

/// Services a worker exposes to strategy callbacks.
///
/// All methods are synchronous; a strategy must not suspend.
pub struct StrategyServices<'a> {
    pit: &'a mut Pit,
    timers: &'a mut TimerWheel<TimerKey>,
    faces: &'a FaceTable,
    keepalive: Duration,
    now: Instant,
    interests_sent: u32,
}

impl StrategyServices<'_> {
    pub fn now(&self) -> Instant {
        self.now
    }

    /// In-records of the entry, cloned for iteration during callbacks
    pub fn in_records(&self, entry: PitToken) -> Vec<InRecord> {
        self.pit
            .entry(entry)
            .map(|e| e.in_records().to_vec())
            .unwrap_or_default()
    }

    pub fn out_records_all_nacked(&self, entry: PitToken) -> bool {
        self.pit
            .entry(entry)
            .map(|e| e.out_records_all_nacked())
            .unwrap_or(false)
    }

    pub fn least_severe_nack(&self, entry: PitToken) -> Option<NackReason> {
        self.pit.entry(entry)?.least_severe_nack()
    }

    /// Per-entry strategy state slot
    pub fn strategy_state_mut<'s>(
        &'s mut self,
        entry: PitToken,
        key: &str,
    ) -> Option<&'s mut (dyn std::any::Any + Send)> {
        self.pit.entry_mut(entry)?.strategy_state_mut(key)
    }

    pub fn set_strategy_state(
        &mut self,
        entry: PitToken,
        key: String,
        value: Box<dyn std::any::Any + Send>,
    ) {
        if let Some(e) = self.pit.entry_mut(entry) {
            e.set_strategy_state(key, value);
        }
    }

    /// Upsert an out-record and transmit the Interest.
    ///
    /// Fails without touching any out-record when the face is unusable, when
    /// the hop limit is spent, or when the target is the point-to-point
    /// in-face.
    pub fn send_interest(
        &mut self,
        interest: &Interest,
        entry: PitToken,
        out_face: FaceId,
        in_face: FaceId,
    ) -> Result<(), SendError> {
        if out_face == in_face {
            if let Some(face) = self.faces.get(out_face) {
                if face.link_type == LinkType::PointToPoint {
                    return Err(SendError::SameFace(out_face));
                }
            }
        }
        if interest.hop_limit == Some(0) {
            return Err(SendError::HopLimit);
        }

        let wire = interest.encode()?;
        self.faces.send(out_face, wire)?;

        let nonce = interest.nonce.unwrap_or(0);
        self.pit.insert_out_record(entry, out_face, nonce, self.now);
        self.interests_sent += 1;
        Ok(())
    }

    /// Transmit Data to a face and mark its in-record served.
    ///
    /// Once the last in-record is served the entry is scheduled for removal
    /// after the satisfied-entry keepalive.
    pub fn send_data(
        &mut self,
        data: &Data,
        entry: PitToken,
        to_face: FaceId,
        _from_face: FaceId,
    ) -> Result<(), SendError> {
        let wire = data.encode()?;
        self.faces.send(to_face, wire)?;

        if let Some(e) = self.pit.entry_mut(entry) {
            e.take_in_record(to_face);
            if e.in_records().is_empty() {
                self.timers.cancel(&TimerKey::Expiry(entry));
                self.timers
                    .schedule(TimerKey::Keepalive(entry), self.now + self.keepalive);
            }
        }
        Ok(())
    }

    /// Transmit a Nack to one face
    pub fn send_nack(
        &mut self,
        reason: NackReason,
        interest: &Interest,
        to_face: FaceId,
    ) -> Result<(), SendError> {
        let wire = Nack::new(reason, interest.clone()).encode()?;
        self.faces.send(to_face, wire)?;
        Ok(())
    }

    /// Nack every in-record face with that face's own nonce
    pub fn nack_in_records(&mut self, entry: PitToken, reason: NackReason) {
        let Some(e) = self.pit.entry(entry) else {
            return;
        };
        let name = e.name.clone();
        let can_be_prefix = e.can_be_prefix;
        let must_be_fresh = e.must_be_fresh;
        let records: Vec<(FaceId, u32)> =
            e.in_records().iter().map(|r| (r.face, r.nonce)).collect();

        for (face, nonce) in records {
            let interest = Interest::new(name.clone())
                .with_can_be_prefix(can_be_prefix)
                .with_must_be_fresh(must_be_fresh)
                .with_nonce(nonce);
            if let Err(err) = self.send_nack(reason, &interest, face) {
                debug!("cannot nack face {}: {}", face, err);
            }
        }
    }

    /// Remove the entry and cancel its timers
    pub fn retire(&mut self, entry: PitToken) {
        self.timers.cancel(&TimerKey::Expiry(entry));
        self.timers.cancel(&TimerKey::Keepalive(entry));
        self.pit.remove(entry);
    }
}

/// A single-threaded forwarding worker.
///
/// Owns a PIT shard, a CS shard, and a timer wheel; shares nothing mutable
/// with other workers. Cross-worker hand-off happens only at ingress.
pub struct Worker {
    id: usize,
    rx: mpsc::UnboundedReceiver<WorkerMsg>,
    pit: Pit,
    cs: ContentStore,
    timers: TimerWheel<TimerKey>,
    faces: Arc<FaceTable>,
    fib: Arc<RwLock<Fib>>,
    choices: Arc<RwLock<StrategyChoiceTable>>,
    regions: Arc<RwLock<NetworkRegionTable>>,
    registry: Arc<StrategyRegistry>,
    strategies: HashMap<(Name, u64), Box<dyn Strategy>>,
    config: WorkerConfig,
    cs_admit_unsolicited: bool,
    cs_serve: bool,
}

impl Worker {
    pub fn new(
        id: usize,
        rx: mpsc::UnboundedReceiver<WorkerMsg>,
        faces: Arc<FaceTable>,
        fib: Arc<RwLock<Fib>>,
        choices: Arc<RwLock<StrategyChoiceTable>>,
        regions: Arc<RwLock<NetworkRegionTable>>,
        registry: Arc<StrategyRegistry>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            id,
            rx,
            pit: Pit::new(config.nonce_grace),
            cs: ContentStore::new(config.cs_capacity),
            timers: TimerWheel::new(),
            faces,
            fib,
            choices,
            regions,
            registry,
            strategies: HashMap::new(),
            cs_admit_unsolicited: config.cs_admit_unsolicited,
            cs_serve: config.cs_serve,
            config,
        }
    }

    /// The cooperative worker loop: packets, control messages, timers
    pub async fn run(mut self) {
        debug!("worker {} started", self.id);
        let mut processed = 0usize;
        loop {
            // Keep expiry honest even under sustained inbound load
            self.on_timers();
            let next_deadline = self.timers.next_deadline();
            tokio::select! {
                biased;
                msg = self.rx.recv() => {
                    match msg {
                        Some(WorkerMsg::Packet { face, packet }) => {
                            self.process_packet(face, packet);
                            processed += 1;
                            if processed >= self.config.batch_size {
                                processed = 0;
                                tokio::task::yield_now().await;
                            }
                        }
                        Some(WorkerMsg::FaceClosed(face)) => self.on_face_closed(face),
                        Some(WorkerMsg::CsConfig(directive)) => self.on_cs_config(directive),
                        Some(WorkerMsg::Shutdown) | None => break,
                    }
                }
                _ = sleep_until_or_forever(next_deadline) => {
                    self.on_timers();
                }
            }
        }
        self.timers.clear();
        debug!("worker {} stopped", self.id);
    }

    fn process_packet(&mut self, face: FaceId, packet: Packet) {
        match packet {
            Packet::Interest(interest) => self.on_interest(face, interest),
            Packet::Data(data) => self.on_data(face, data),
            Packet::Nack(nack) => self.on_nack(face, nack),
        }
    }

    fn on_interest(&mut self, in_face: FaceId, mut interest: Interest) {
        let now = Instant::now();

        // Step 1: policy drops
        if interest.name.is_empty() {
            trace!("dropping interest with empty name from face {}", in_face);
            return;
        }
        if interest.nonce.is_none() {
            trace!("dropping interest {} without nonce", interest.name);
            return;
        }
        if let Some(hops) = interest.hop_limit {
            if hops == 0 {
                trace!("dropping interest {} with spent hop limit", interest.name);
                return;
            }
            let hops = hops - 1;
            interest.hop_limit = Some(hops);
            if hops == 0 {
                trace!("dropping interest {}: hop limit exhausted", interest.name);
                return;
            }
        }
        let Some(scope) = self.faces.get(in_face).map(|face| face.scope) else {
            trace!("dropping interest {} from vanished face {}", interest.name, in_face);
            return;
        };
        if scope == FaceScope::NonLocal && is_localhost_name(&interest.name) {
            debug!(
                "scope violation: {} from non-local face {}",
                interest.name, in_face
            );
            return;
        }

        // Step 2: PIT find-or-insert
        let token = match self.pit.find_or_insert(&interest, in_face, now) {
            PitInsertOutcome::Loop => {
                debug!("duplicate nonce for {}, nacking face {}", interest.name, in_face);
                let nack = Nack::new(NackReason::Duplicate, interest);
                match nack.encode() {
                    Ok(wire) => {
                        if let Err(err) = self.faces.send(in_face, wire) {
                            debug!("cannot nack face {}: {}", in_face, err);
                        }
                    }
                    Err(err) => warn!("cannot encode nack: {}", err),
                }
                return;
            }
            PitInsertOutcome::New(token) => {
                let choice = self.choices.read().unwrap().find(&interest.name);
                if let Some(entry) = self.pit.entry_mut(token) {
                    entry.strategy = choice;
                }
                token
            }
            PitInsertOutcome::Aggregated(token) => token,
        };

        // A fresh in-record revives a satisfied entry awaiting reaping
        self.timers.cancel(&TimerKey::Keepalive(token));
        if let Some(expiry) = self.pit.entry(token).map(|entry| entry.expiry) {
            self.timers.schedule(TimerKey::Expiry(token), expiry);
        }

        let choice = match self.pit.entry(token) {
            Some(entry) => entry.strategy.clone(),
            None => return,
        };

        // Step 3: content store lookup
        if self.cs_serve {
            let hit = self.cs.find(&interest, now).map(|entry| entry.data.clone());
            if let Some(data) = hit {
                trace!("content store hit for {}", interest.name);
                self.invoke(&choice, |strategy, services| {
                    strategy.after_content_store_hit(services, token, in_face, &data);
                });
                // Other aggregated downstreams may still be waiting on Data
                let drained = self
                    .pit
                    .entry(token)
                    .map(|entry| entry.in_records().is_empty())
                    .unwrap_or(true);
                if drained {
                    self.remove_entry(token);
                }
                return;
            }
        }

        // Step 4: FIB lookup.
        // A forwarding hint steers the lookup toward the producer region;
        // once this forwarder is inside that region the hint is spent and
        // the Interest routes by name again.
        let lookup_name = if interest.forwarding_hint.is_empty() {
            &interest.name
        } else {
            let regions = self.regions.read().unwrap();
            if interest
                .forwarding_hint
                .iter()
                .any(|delegation| regions.is_producer(delegation))
            {
                &interest.name
            } else {
                &interest.forwarding_hint[0]
            }
        };
        let nexthops = self.fib.read().unwrap().lookup(lookup_name, now);

        // Step 5: strategy decides the outgoing face set
        let sent = self.invoke(&choice, |strategy, services| {
            strategy.after_receive_interest(services, token, in_face, &interest, &nexthops);
        });

        // Step 6: nothing went out and nothing is pending upstream
        if let Some(entry) = self.pit.entry(token) {
            if sent == 0 && !entry.has_out_records() {
                debug!("no route for {}", interest.name);
                let mut services = StrategyServices {
                    pit: &mut self.pit,
                    timers: &mut self.timers,
                    faces: &self.faces,
                    keepalive: self.config.satisfied_keepalive,
                    now,
                    interests_sent: 0,
                };
                services.nack_in_records(token, NackReason::NoRoute);
                self.remove_entry(token);
            }
        }
    }

    fn on_data(&mut self, in_face: FaceId, data: Data) {
        let now = Instant::now();

        if data.name.is_empty() {
            trace!("dropping data with empty name from face {}", in_face);
            return;
        }

        let matches = self.pit.find_matching(&data.name, data.can_satisfy_fresh());
        if matches.is_empty() {
            let admit = self
                .faces
                .get(in_face)
                .and_then(|face| face.admit_unsolicited)
                .unwrap_or(self.cs_admit_unsolicited);
            if admit {
                self.insert_into_cs(&data, now);
            } else {
                trace!("dropping unsolicited data {}", data.name);
            }
            return;
        }

        for token in matches {
            let choice = match self.pit.entry(token) {
                Some(entry) => entry.strategy.clone(),
                None => continue,
            };
            self.invoke(&choice, |strategy, services| {
                strategy.before_satisfy_interest(services, token, in_face, &data);
                strategy.after_receive_data(services, token, in_face, &data);
            });
            self.finish_satisfied(token, now);
        }

        self.insert_into_cs(&data, now);
    }

    fn on_nack(&mut self, in_face: FaceId, nack: Nack) {
        let Some(nonce) = nack.interest.nonce else {
            trace!("dropping nack without nonce for {}", nack.interest.name);
            return;
        };
        let Some(token) = self.pit.find_exact(&nack.interest) else {
            trace!("dropping nack for unknown entry {}", nack.interest.name);
            return;
        };
        if !self.pit.record_nack(token, in_face, nonce, nack.reason) {
            trace!(
                "nack from face {} does not match an out-record of {}",
                in_face,
                nack.interest.name
            );
            return;
        }

        let choice = match self.pit.entry(token) {
            Some(entry) => entry.strategy.clone(),
            None => return,
        };
        self.invoke(&choice, |strategy, services| {
            strategy.after_receive_nack(services, token, in_face, &nack);
        });
    }

    /// Invoke a strategy callback with the services bound; returns the number
    /// of Interests the callback sent.
    fn invoke<F>(&mut self, choice: &StrategyChoice, callback: F) -> u32
    where
        F: FnOnce(&dyn Strategy, &mut StrategyServices<'_>),
    {
        let key = (choice.strategy.clone(), choice.version);
        if !self.strategies.contains_key(&key) {
            match self.registry.instantiate(&key.0, key.1) {
                Some(instance) => {
                    self.strategies.insert(key.clone(), instance);
                }
                None => {
                    warn!("unknown strategy {} v{}", key.0, key.1);
                    return 0;
                }
            }
        }

        let strategy = self.strategies.get(&key).expect("strategy just cached");
        let mut services = StrategyServices {
            pit: &mut self.pit,
            timers: &mut self.timers,
            faces: &self.faces,
            keepalive: self.config.satisfied_keepalive,
            now: Instant::now(),
            interests_sent: 0,
        };
        callback(strategy.as_ref(), &mut services);
        services.interests_sent
    }

    fn insert_into_cs(&mut self, data: &Data, now: Instant) {
        match data.encode() {
            Ok(wire) => {
                self.cs.insert(data.clone(), wire, now);
            }
            Err(err) => warn!("cannot encode data for cs: {}", err),
        }
    }

    /// Retire a satisfied entry: records cleared, expiry replaced by the
    /// satisfied-entry keepalive.
    fn finish_satisfied(&mut self, token: PitToken, now: Instant) {
        if let Some(entry) = self.pit.entry_mut(token) {
            entry.clear_records();
            self.timers.cancel(&TimerKey::Expiry(token));
            self.timers.schedule(
                TimerKey::Keepalive(token),
                now + self.config.satisfied_keepalive,
            );
        }
    }

    fn remove_entry(&mut self, token: PitToken) {
        self.timers.cancel(&TimerKey::Expiry(token));
        self.timers.cancel(&TimerKey::Keepalive(token));
        self.pit.remove(token);
    }

    fn on_face_closed(&mut self, face: FaceId) {
        debug!("worker {}: face {} closed", self.id, face);
        for token in self.pit.purge_face(face) {
            self.timers.cancel(&TimerKey::Expiry(token));
            self.timers.cancel(&TimerKey::Keepalive(token));
        }
    }

    fn on_cs_config(&mut self, directive: CsDirective) {
        self.cs.set_capacity(directive.capacity, Instant::now());
        self.cs_admit_unsolicited = directive.admit_unsolicited;
        self.cs_serve = directive.serve;
    }

    fn on_timers(&mut self) {
        for key in self.timers.pop_expired(Instant::now()) {
            match key {
                TimerKey::Expiry(token) => {
                    trace!("pit entry expired");
                    self.pit.remove(token);
                }
                TimerKey::Keepalive(token) => {
                    trace!("satisfied pit entry reaped");
                    self.pit.remove(token);
                }
            }
        }
    }
}

async fn sleep_until_or_forever(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

fn is_localhost_name(name: &Name) -> bool {
    name.get(0)
        .map(|component| {
            component.typ == component_types::GENERIC && component.value == b"localhost"
        })
        .unwrap_or(false)
}
