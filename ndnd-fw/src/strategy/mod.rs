pub mod best_route;
pub mod multicast;
pub mod registry;

use ndnd_core::packets::{Data, Interest, Nack};

use crate::face::FaceId;
use crate::tables::{NextHopRecord, PitToken};
use crate::worker::StrategyServices;

pub use registry::StrategyRegistry;

/// A forwarding strategy, invoked by a worker at fixed pipeline points.
///
/// Callbacks are synchronous and must not block; the only effects available
/// are the services the worker provides. Strategies keep no per-entry state
/// of their own; anything entry-local lives in the PIT entry's opaque slot
/// keyed by strategy name.
pub trait Strategy: Send {
    /// After PIT insert and FIB lookup; decides the outgoing face set
    fn after_receive_interest(
        &self,
        services: &mut StrategyServices<'_>,
        entry: PitToken,
        in_face: FaceId,
        interest: &Interest,
        nexthops: &[NextHopRecord],
    );

    /// Immediately after a content store hit
    fn after_content_store_hit(
        &self,
        services: &mut StrategyServices<'_>,
        entry: PitToken,
        in_face: FaceId,
        data: &Data,
    );

    /// After a PIT match on incoming Data; forwards to recorded in-faces
    fn after_receive_data(
        &self,
        services: &mut StrategyServices<'_>,
        entry: PitToken,
        in_face: FaceId,
        data: &Data,
    );

    /// Hook before an entry is satisfied; may perform measurements
    fn before_satisfy_interest(
        &self,
        _services: &mut StrategyServices<'_>,
        _entry: PitToken,
        _in_face: FaceId,
        _data: &Data,
    ) {
    }

    /// After a Nack matched an out-record.
    ///
    /// Default: suppress until every out-record has Nacked, then propagate
    /// the least severe recorded reason downstream and retire the entry.
    fn after_receive_nack(
        &self,
        services: &mut StrategyServices<'_>,
        entry: PitToken,
        _in_face: FaceId,
        nack: &Nack,
    ) {
        if !services.out_records_all_nacked(entry) {
            return;
        }
        let reason = services.least_severe_nack(entry).unwrap_or(nack.reason);
        services.nack_in_records(entry, reason);
        services.retire(entry);
    }
}
