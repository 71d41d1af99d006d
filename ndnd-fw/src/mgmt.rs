use std::sync::{Arc, Mutex, RwLock};

use ndnd_core::mgmt::ControlParameters;
use ndnd_core::Name;
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;
use crate::face::{FaceError, FaceId, FaceTable};
use crate::strategy::registry::StrategyRegistry;
use crate::tables::{
    Fib, NetworkRegionTable, StrategyChoice, StrategyChoiceError, StrategyChoiceTable,
};
use crate::worker::CsDirective;

/// Flags bits for `cs_config` in ControlParameters form
pub const FLAG_CS_ADMIT: u64 = 0b01;
pub const FLAG_CS_SERVE: u64 = 0b10;

/// Structured results returned to management; never fatal to forwarding
#[derive(Debug, thiserror::Error)]
pub enum ManagementError {
    #[error("unknown face: {0}")]
    UnknownFace(FaceId),
    #[error("unknown strategy: {0}")]
    UnknownStrategy(Name),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error(transparent)]
    StrategyChoice(#[from] StrategyChoiceError),
    #[error(transparent)]
    Face(#[from] FaceError),
}

/// Forwarder-wide content store settings, before per-worker division
#[derive(Debug, Clone, Copy)]
pub struct CsSettings {
    pub capacity: usize,
    pub admit_unsolicited: bool,
    pub serve: bool,
}

/// The single management entry point; serializes all table writers.
pub struct Management {
    fib: Arc<RwLock<Fib>>,
    choices: Arc<RwLock<StrategyChoiceTable>>,
    regions: Arc<RwLock<NetworkRegionTable>>,
    registry: Arc<StrategyRegistry>,
    faces: Arc<FaceTable>,
    dispatcher: Arc<Dispatcher>,
    cs_settings: Mutex<CsSettings>,
}

impl Management {
    pub fn new(
        fib: Arc<RwLock<Fib>>,
        choices: Arc<RwLock<StrategyChoiceTable>>,
        regions: Arc<RwLock<NetworkRegionTable>>,
        registry: Arc<StrategyRegistry>,
        faces: Arc<FaceTable>,
        dispatcher: Arc<Dispatcher>,
        cs_settings: CsSettings,
    ) -> Self {
        Self {
            fib,
            choices,
            regions,
            registry,
            faces,
            dispatcher,
            cs_settings: Mutex::new(cs_settings),
        }
    }

    /// Register a nexthop for a prefix
    pub fn fib_add(&self, prefix: Name, face: FaceId, cost: u64) -> Result<(), ManagementError> {
        if !self.faces.contains(face) {
            warn!(face, "fib add for unknown face");
            return Err(ManagementError::UnknownFace(face));
        }
        self.fib.write().unwrap().insert(&prefix, face, cost);
        Ok(())
    }

    /// Remove a nexthop; removing an absent record is not an error
    pub fn fib_remove(&self, prefix: Name, face: FaceId) -> Result<(), ManagementError> {
        self.fib.write().unwrap().remove(&prefix, face);
        Ok(())
    }

    /// Bind a strategy (optionally version-suffixed) to a prefix
    pub fn strategy_set(&self, prefix: Name, strategy: Name) -> Result<(), ManagementError> {
        let Some((name, version)) = self.registry.resolve(&strategy) else {
            warn!(%strategy, "set of unknown strategy");
            return Err(ManagementError::UnknownStrategy(strategy));
        };
        self.choices
            .write()
            .unwrap()
            .set(prefix, StrategyChoice { strategy: name, version });
        Ok(())
    }

    /// Drop a strategy binding; names fall back to the next-longest prefix
    pub fn strategy_unset(&self, prefix: &Name) -> Result<(), ManagementError> {
        self.choices.write().unwrap().unset(prefix)?;
        Ok(())
    }

    /// Reconfigure the content store across all workers
    pub fn cs_config(
        &self,
        capacity: usize,
        admit_unsolicited: bool,
        serve: bool,
    ) -> Result<(), ManagementError> {
        let settings = CsSettings {
            capacity,
            admit_unsolicited,
            serve,
        };
        *self.cs_settings.lock().unwrap() = settings;

        let workers = self.dispatcher.worker_count();
        let per_worker = capacity.div_ceil(workers);
        info!(capacity, per_worker, admit_unsolicited, serve, "cs reconfigured");
        self.dispatcher.scatter_cs_config(CsDirective {
            capacity: per_worker,
            admit_unsolicited,
            serve,
        });
        Ok(())
    }

    /// Administratively close a face
    pub fn face_close(&self, face: FaceId) -> Result<(), ManagementError> {
        self.faces.close(face)?;
        self.dispatcher.face_closed(face);
        Ok(())
    }

    /// Declare a producer region prefix; forwarding hints under it are spent
    pub fn region_add(&self, prefix: Name) -> Result<(), ManagementError> {
        info!(%prefix, "network region added");
        self.regions.write().unwrap().add(prefix);
        Ok(())
    }

    /// Withdraw a producer region; removing an absent one is not an error
    pub fn region_remove(&self, prefix: &Name) -> Result<(), ManagementError> {
        if self.regions.write().unwrap().remove(prefix) {
            info!(%prefix, "network region removed");
        }
        Ok(())
    }

    // --- ControlParameters-driven forms ---

    pub fn fib_add_params(&self, params: &ControlParameters) -> Result<(), ManagementError> {
        let prefix = params.name.clone().ok_or(ManagementError::MissingField("Name"))?;
        let face = params.face_id.ok_or(ManagementError::MissingField("FaceId"))?;
        self.fib_add(prefix, face, params.cost.unwrap_or(0))
    }

    pub fn fib_remove_params(&self, params: &ControlParameters) -> Result<(), ManagementError> {
        let prefix = params.name.clone().ok_or(ManagementError::MissingField("Name"))?;
        let face = params.face_id.ok_or(ManagementError::MissingField("FaceId"))?;
        self.fib_remove(prefix, face)
    }

    pub fn strategy_set_params(&self, params: &ControlParameters) -> Result<(), ManagementError> {
        let prefix = params.name.clone().ok_or(ManagementError::MissingField("Name"))?;
        let strategy = params
            .strategy
            .clone()
            .ok_or(ManagementError::MissingField("Strategy"))?;
        self.strategy_set(prefix, strategy)
    }

    pub fn strategy_unset_params(&self, params: &ControlParameters) -> Result<(), ManagementError> {
        let prefix = params.name.clone().ok_or(ManagementError::MissingField("Name"))?;
        self.strategy_unset(&prefix)
    }

    /// Partial CS update: absent fields keep their current value; masked
    /// flag bits select which flags apply.
    pub fn cs_config_params(&self, params: &ControlParameters) -> Result<(), ManagementError> {
        let current = *self.cs_settings.lock().unwrap();

        let capacity = params.capacity.map(|c| c as usize).unwrap_or(current.capacity);
        let flags = params.flags.unwrap_or(0);
        let mask = if params.flags.is_some() {
            params.mask.unwrap_or(FLAG_CS_ADMIT | FLAG_CS_SERVE)
        } else {
            0
        };

        let admit_unsolicited = if mask & FLAG_CS_ADMIT != 0 {
            flags & FLAG_CS_ADMIT != 0
        } else {
            current.admit_unsolicited
        };
        let serve = if mask & FLAG_CS_SERVE != 0 {
            flags & FLAG_CS_SERVE != 0
        } else {
            current.serve
        };

        self.cs_config(capacity, admit_unsolicited, serve)
    }

    pub fn face_close_params(&self, params: &ControlParameters) -> Result<(), ManagementError> {
        let face = params.face_id.ok_or(ManagementError::MissingField("FaceId"))?;
        self.face_close(face)
    }

    pub fn region_add_params(&self, params: &ControlParameters) -> Result<(), ManagementError> {
        let prefix = params.name.clone().ok_or(ManagementError::MissingField("Name"))?;
        self.region_add(prefix)
    }

    pub fn region_remove_params(&self, params: &ControlParameters) -> Result<(), ManagementError> {
        let prefix = params.name.clone().ok_or(ManagementError::MissingField("Name"))?;
        self.region_remove(&prefix)
    }
}
