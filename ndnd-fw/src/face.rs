use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Numeric face identifier; every table refers to faces by id only
pub type FaceId = u64;

/// Pseudo face id used as the source when Data is served from the content store
pub const CONTENT_STORE_FACE: FaceId = 0;

/// Scope of a face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceScope {
    Local,
    NonLocal,
}

/// Link type of a face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    PointToPoint,
    MultiAccess,
}

/// Persistency of a face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacePersistency {
    OnDemand,
    Persistent,
    Permanent,
}

/// Up/down/closing state of a face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FaceState {
    Up = 0,
    Down = 1,
    Closing = 2,
}

impl FaceState {
    fn from_u8(value: u8) -> FaceState {
        match value {
            0 => FaceState::Up,
            1 => FaceState::Down,
            _ => FaceState::Closing,
        }
    }
}

/// Errors from face operations
#[derive(Debug, thiserror::Error)]
pub enum FaceError {
    #[error("face not found: {0}")]
    NotFound(FaceId),
    #[error("face down: {0}")]
    Down(FaceId),
    #[error("face closing: {0}")]
    Closing(FaceId),
}

/// Parameters supplied by a face driver at registration
#[derive(Debug, Clone)]
pub struct FaceParams {
    pub scope: FaceScope,
    pub link_type: LinkType,
    pub mtu: u32,
    pub persistency: FacePersistency,
    /// Per-face override for admitting unsolicited Data into the CS;
    /// `None` falls back to the forwarder-wide default.
    pub admit_unsolicited: Option<bool>,
}

impl Default for FaceParams {
    fn default() -> Self {
        Self {
            scope: FaceScope::NonLocal,
            link_type: LinkType::PointToPoint,
            mtu: 8800,
            persistency: FacePersistency::Persistent,
            admit_unsolicited: None,
        }
    }
}

/// An identified link endpoint.
///
/// The outbound queue serializes sends per face; the driver drains it. The
/// forwarding core never blocks on a face.
pub struct Face {
    pub id: FaceId,
    pub scope: FaceScope,
    pub link_type: LinkType,
    pub mtu: u32,
    pub persistency: FacePersistency,
    pub admit_unsolicited: Option<bool>,
    state: AtomicU8,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Face {
    pub fn state(&self) -> FaceState {
        FaceState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: FaceState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Registry of live faces, keyed by face id
pub struct FaceTable {
    faces: RwLock<HashMap<FaceId, Arc<Face>>>,
    next_id: AtomicU64,
}

impl FaceTable {
    pub fn new() -> Self {
        Self {
            faces: RwLock::new(HashMap::new()),
            // id 0 is reserved for the content store pseudo face
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new face; the returned receiver is the face driver's
    /// outbound frame queue.
    pub fn register(&self, params: FaceParams) -> (Arc<Face>, mpsc::UnboundedReceiver<Vec<u8>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let face = Arc::new(Face {
            id,
            scope: params.scope,
            link_type: params.link_type,
            mtu: params.mtu,
            persistency: params.persistency,
            admit_unsolicited: params.admit_unsolicited,
            state: AtomicU8::new(FaceState::Up as u8),
            tx,
        });
        self.faces.write().unwrap().insert(id, face.clone());
        info!(face = id, "registered face");
        (face, rx)
    }

    pub fn get(&self, id: FaceId) -> Option<Arc<Face>> {
        self.faces.read().unwrap().get(&id).cloned()
    }

    pub fn contains(&self, id: FaceId) -> bool {
        self.faces.read().unwrap().contains_key(&id)
    }

    /// Hand a frame to the face's outbound queue
    pub fn send(&self, id: FaceId, frame: Vec<u8>) -> Result<(), FaceError> {
        let face = self.get(id).ok_or(FaceError::NotFound(id))?;
        match face.state() {
            FaceState::Up => {}
            FaceState::Down => return Err(FaceError::Down(id)),
            FaceState::Closing => return Err(FaceError::Closing(id)),
        }
        face.tx.send(frame).map_err(|_| {
            warn!(face = id, "send on dropped face queue");
            FaceError::Closing(id)
        })
    }

    /// Mark a face as closing; its queue refuses further frames
    pub fn close(&self, id: FaceId) -> Result<(), FaceError> {
        let face = self.get(id).ok_or(FaceError::NotFound(id))?;
        face.set_state(FaceState::Closing);
        debug!(face = id, "face closing");
        Ok(())
    }

    /// Drop a face from the table entirely
    pub fn remove(&self, id: FaceId) -> bool {
        self.faces.write().unwrap().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.faces.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FaceTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Register a face that discards every frame queued to it.
///
/// Useful as a blackhole nexthop; mirrors a null transport.
pub fn spawn_null_face(table: &FaceTable, params: FaceParams) -> Arc<Face> {
    let (face, mut rx) = table.register(params);
    tokio::spawn(async move {
        while rx.recv().await.is_some() {}
    });
    face
}
