use log::info;

pub mod dispatcher;
pub mod face;
pub mod forwarder;
pub mod mgmt;
pub mod strategy;
pub mod tables;
pub mod timer;
pub mod worker;

pub use dispatcher::Dispatcher;
pub use face::{Face, FaceId, FaceParams, FaceScope, FaceState, FaceTable, LinkType};
pub use forwarder::{Forwarder, ForwarderConfig};
pub use mgmt::{Management, ManagementError};
pub use strategy::{Strategy, StrategyRegistry};
pub use worker::{StrategyServices, Worker, WorkerConfig};

pub fn init() {
    info!("ndnd forwarding plane initialized");
}
