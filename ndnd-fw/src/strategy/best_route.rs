use log::debug;
use ndnd_core::packets::{Data, Interest};
use ndnd_core::Name;

use crate::face::{FaceId, CONTENT_STORE_FACE};
use crate::strategy::Strategy;
use crate::tables::{NextHopRecord, PitToken};
use crate::worker::StrategyServices;

pub const VERSION: u64 = 1;

pub fn name() -> Name {
    Name::from_str("/localhost/nfd/strategy/best-route")
}

/// Forwards each Interest to the lowest-cost usable nexthop.
///
/// Nexthops arrive cost-sorted with a stable tie-break, so the first one the
/// send services accept is the best route. On Data, one copy goes to each
/// in-record face.
pub struct BestRoute;

impl Strategy for BestRoute {
    fn after_receive_interest(
        &self,
        services: &mut StrategyServices<'_>,
        entry: PitToken,
        in_face: FaceId,
        interest: &Interest,
        nexthops: &[NextHopRecord],
    ) {
        if nexthops.is_empty() {
            debug!("best-route: no nexthop for {}", interest.name);
            return;
        }

        for nexthop in nexthops {
            match services.send_interest(interest, entry, nexthop.face, in_face) {
                Ok(()) => return,
                Err(err) => {
                    debug!("best-route: nexthop {} unusable: {}", nexthop.face, err);
                }
            }
        }
        debug!("best-route: no usable nexthop for {}", interest.name);
    }

    fn after_content_store_hit(
        &self,
        services: &mut StrategyServices<'_>,
        entry: PitToken,
        in_face: FaceId,
        data: &Data,
    ) {
        if let Err(err) = services.send_data(data, entry, in_face, CONTENT_STORE_FACE) {
            debug!("best-route: cannot serve cache hit to {}: {}", in_face, err);
        }
    }

    fn after_receive_data(
        &self,
        services: &mut StrategyServices<'_>,
        entry: PitToken,
        in_face: FaceId,
        data: &Data,
    ) {
        for record in services.in_records(entry) {
            if record.face == in_face {
                continue;
            }
            if let Err(err) = services.send_data(data, entry, record.face, in_face) {
                debug!("best-route: cannot forward data to {}: {}", record.face, err);
            }
        }
    }
}
