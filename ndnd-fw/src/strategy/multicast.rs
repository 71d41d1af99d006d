use log::debug;
use ndnd_core::packets::{Data, Interest};
use ndnd_core::Name;

use crate::face::{FaceId, CONTENT_STORE_FACE};
use crate::strategy::Strategy;
use crate::tables::{NextHopRecord, PitToken};
use crate::worker::StrategyServices;

pub const VERSION: u64 = 1;

pub fn name() -> Name {
    Name::from_str("/localhost/nfd/strategy/multicast")
}

/// Forwards each Interest to every usable nexthop.
pub struct Multicast;

impl Strategy for Multicast {
    fn after_receive_interest(
        &self,
        services: &mut StrategyServices<'_>,
        entry: PitToken,
        in_face: FaceId,
        interest: &Interest,
        nexthops: &[NextHopRecord],
    ) {
        // send_interest refuses the point-to-point in-face; a multi-access
        // in-face stays eligible so other nodes on the segment are reached
        for nexthop in nexthops {
            if let Err(err) = services.send_interest(interest, entry, nexthop.face, in_face) {
                debug!("multicast: nexthop {} unusable: {}", nexthop.face, err);
            }
        }
    }

    fn after_content_store_hit(
        &self,
        services: &mut StrategyServices<'_>,
        entry: PitToken,
        in_face: FaceId,
        data: &Data,
    ) {
        if let Err(err) = services.send_data(data, entry, in_face, CONTENT_STORE_FACE) {
            debug!("multicast: cannot serve cache hit to {}: {}", in_face, err);
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
                debug!("multicast: cannot forward data to {}: {}", record.face, err);
            }
        }
    }
}
