use log::{debug, warn};
use ndnd_core::packets::Packet;
use tokio::sync::mpsc;

use crate::face::{FaceId, FaceState};
use crate::worker::{CsDirective, WorkerMsg};

/// Routes inbound packets to workers by name-prefix affinity.
///
/// Each worker gets a FIFO queue; packets from one face keep their relative
/// order because the face driver calls `deliver` sequentially and the queue
/// preserves send order.
pub struct Dispatcher {
    workers: Vec<mpsc::UnboundedSender<WorkerMsg>>,
    affinity_depth: usize,
}

impl Dispatcher {
    pub fn new(workers: Vec<mpsc::UnboundedSender<WorkerMsg>>, affinity_depth: usize) -> Self {
        assert!(!workers.is_empty(), "dispatcher needs at least one worker");
        Self {
            workers,
            affinity_depth,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Decode a frame and hand it to the worker owning its name shard.
    ///
    /// Malformed frames are logged and dropped here.
    pub fn deliver(&self, face: FaceId, frame: &[u8]) {
        let packet = match Packet::decode(frame) {
            Ok(packet) => packet,
            Err(err) => {
                debug!("dropping malformed frame from face {}: {}", face, err);
                return;
            }
        };

        let hash = packet.name().hash_prefix(self.affinity_depth);
        let index = (hash % self.workers.len() as u64) as usize;
        if self.workers[index].send(WorkerMsg::Packet { face, packet }).is_err() {
            warn!("worker {} queue closed", index);
        }
    }

    /// Face state transition; anything but Up scatters a face-down cleanup
    pub fn notify_state(&self, face: FaceId, state: FaceState) {
        if matches!(state, FaceState::Down | FaceState::Closing) {
            self.face_closed(face);
        }
    }

    /// Tell every worker to strip records for a dead face
    pub fn face_closed(&self, face: FaceId) {
        for worker in &self.workers {
            let _ = worker.send(WorkerMsg::FaceClosed(face));
        }
    }

    /// Scatter a content store reconfiguration to every worker
    pub fn scatter_cs_config(&self, directive: CsDirective) {
        for worker in &self.workers {
            let _ = worker.send(WorkerMsg::CsConfig(directive));
        }
    }

    /// Ask every worker to stop
    pub fn shutdown(&self) {
        for worker in &self.workers {
            let _ = worker.send(WorkerMsg::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndnd_core::packets::Interest;
    use ndnd_core::Name;

    fn dispatcher_with(workers: usize) -> (Dispatcher, Vec<mpsc::UnboundedReceiver<WorkerMsg>>) {
        let mut txs = Vec::new();
        let mut rxs = Vec::new();
        for _ in 0..workers {
            let (tx, rx) = mpsc::unbounded_channel();
            txs.push(tx);
            rxs.push(rx);
        }
        (Dispatcher::new(txs, 1), rxs)
    }

    #[tokio::test]
    async fn test_same_prefix_same_worker() {
        let (dispatcher, mut rxs) = dispatcher_with(4);

        let a = Interest::new(Name::from_str("/a/b")).with_nonce(1).encode().unwrap();
        let b = Interest::new(Name::from_str("/a/c")).with_nonce(2).encode().unwrap();
        dispatcher.deliver(1, &a);
        dispatcher.deliver(2, &b);

        // both packets share the /a prefix, so exactly one worker got both
        let mut counts = Vec::new();
        for rx in rxs.iter_mut() {
            let mut n = 0;
            while rx.try_recv().is_ok() {
                n += 1;
            }
            counts.push(n);
        }
        assert_eq!(counts.iter().sum::<i32>(), 2);
        assert!(counts.contains(&2));
    }

    #[tokio::test]
    async fn test_malformed_frame_dropped() {
        let (dispatcher, mut rxs) = dispatcher_with(1);
        dispatcher.deliver(1, &[0xFF, 0x00]);
        assert!(rxs[0].try_recv().is_err());
    }

    #[tokio::test]
    async fn test_face_down_scatters_to_all() {
        let (dispatcher, mut rxs) = dispatcher_with(3);
        dispatcher.notify_state(7, FaceState::Down);

        for rx in rxs.iter_mut() {
            assert!(matches!(rx.try_recv(), Ok(WorkerMsg::FaceClosed(7))));
        }
    }
}
