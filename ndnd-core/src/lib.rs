use log::info;

pub mod mgmt;
pub mod name;
pub mod packets;
pub mod tlv;

pub use name::{Component, Name};
pub use packets::{Data, Interest, Nack, NackReason, Packet};

pub fn init() {
    info!("ndnd core initialized");
}
