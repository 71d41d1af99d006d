use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{bail, Result};
use log::info;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dispatcher::Dispatcher;
use crate::face::{Face, FaceId, FaceParams, FaceState, FaceTable};
use crate::mgmt::{CsSettings, Management};
use crate::strategy::{best_route, registry::StrategyRegistry};
use crate::tables::{Fib, NetworkRegionTable, StrategyChoice, StrategyChoiceTable};
use crate::worker::{Worker, WorkerConfig};

/// Forwarder-wide configuration
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub workers: usize,
    /// Name-prefix depth used for worker affinity hashing
    pub affinity_depth: usize,
    pub batch_size: usize,
    /// Total content store capacity, divided across workers
    pub cs_capacity: usize,
    pub cs_admit_unsolicited: bool,
    pub cs_serve: bool,
    pub satisfied_keepalive: Duration,
    pub nonce_grace: Duration,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            affinity_depth: 1,
            batch_size: 64,
            cs_capacity: 4096,
            cs_admit_unsolicited: false,
            cs_serve: true,
            satisfied_keepalive: Duration::from_millis(250),
            nonce_grace: Duration::from_secs(1),
        }
    }
}

/// The assembled forwarding plane: face table, shared tables, workers,
/// dispatcher, and the management handle.
pub struct Forwarder {
    faces: Arc<FaceTable>,
    dispatcher: Arc<Dispatcher>,
    management: Arc<Management>,
    pending_workers: Vec<Worker>,
    handles: Vec<JoinHandle<()>>,
}

impl Forwarder {
    pub fn new(config: ForwarderConfig) -> Self {
        let worker_count = config.workers.max(1);
        let per_worker_cs = config.cs_capacity.div_ceil(worker_count);

        let faces = Arc::new(FaceTable::new());
        let fib = Arc::new(RwLock::new(Fib::new()));
        let regions = Arc::new(RwLock::new(NetworkRegionTable::new()));
        let registry = Arc::new(StrategyRegistry::with_builtins());
        let choices = Arc::new(RwLock::new(StrategyChoiceTable::new(StrategyChoice {
            strategy: best_route::name(),
            version: best_route::VERSION,
        })));

        let worker_config = WorkerConfig {
            batch_size: config.batch_size,
            cs_capacity: per_worker_cs,
            cs_admit_unsolicited: config.cs_admit_unsolicited,
            cs_serve: config.cs_serve,
            satisfied_keepalive: config.satisfied_keepalive,
            nonce_grace: config.nonce_grace,
        };

        let mut senders = Vec::with_capacity(worker_count);
        let mut pending_workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            pending_workers.push(Worker::new(
                id,
                rx,
                faces.clone(),
                fib.clone(),
                choices.clone(),
                regions.clone(),
                registry.clone(),
                worker_config.clone(),
            ));
        }

        let dispatcher = Arc::new(Dispatcher::new(senders, config.affinity_depth.max(1)));
        let management = Arc::new(Management::new(
            fib,
            choices,
            regions,
            registry,
            faces.clone(),
            dispatcher.clone(),
            CsSettings {
                capacity: config.cs_capacity,
                admit_unsolicited: config.cs_admit_unsolicited,
                serve: config.cs_serve,
            },
        ));

        Self {
            faces,
            dispatcher,
            management,
            pending_workers,
            handles: Vec::new(),
        }
    }

    /// Spawn the worker tasks; must run inside a tokio runtime
    pub fn start(&mut self) -> Result<()> {
        if self.pending_workers.is_empty() {
            bail!("forwarder already started");
        }
        let count = self.pending_workers.len();
        for worker in self.pending_workers.drain(..) {
            self.handles.push(tokio::spawn(worker.run()));
        }
        info!("forwarder started with {} workers", count);
        Ok(())
    }

    /// Stop every worker and join them
    pub async fn shutdown(&mut self) -> Result<()> {
        self.dispatcher.shutdown();
        for handle in self.handles.drain(..) {
            handle.await?;
        }
        info!("forwarder stopped");
        Ok(())
    }

    /// Register a face; the receiver is the driver's outbound frame queue
    pub fn register_face(
        &self,
        params: FaceParams,
    ) -> (Arc<Face>, mpsc::UnboundedReceiver<Vec<u8>>) {
        self.faces.register(params)
    }

    /// Entry point for face drivers: one decoded NDN frame
    pub fn deliver(&self, face: FaceId, frame: &[u8]) {
        self.dispatcher.deliver(face, frame);
    }

    /// Face drivers report state transitions here
    pub fn notify_state(&self, face: FaceId, state: FaceState) {
        if let Some(f) = self.faces.get(face) {
            f.set_state(state);
        }
        self.dispatcher.notify_state(face, state);
    }

    pub fn faces(&self) -> Arc<FaceTable> {
        self.faces.clone()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    pub fn management(&self) -> Arc<Management> {
        self.management.clone()
    }
}
