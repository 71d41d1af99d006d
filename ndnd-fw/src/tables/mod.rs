pub mod cs;
pub mod fib;
pub mod network_region;
pub mod pit;
pub mod strategy_choice;

pub use cs::{ContentStore, CsEntry};
pub use fib::{Fib, NextHopRecord};
pub use network_region::NetworkRegionTable;
pub use pit::{InRecord, OutRecord, Pit, PitEntry, PitInsertOutcome, PitToken};
pub use strategy_choice::{StrategyChoice, StrategyChoiceError, StrategyChoiceTable};
