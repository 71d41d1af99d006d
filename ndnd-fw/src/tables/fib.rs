use std::collections::HashMap;

use log::{debug, info};
use ndnd_core::name::Component;
use ndnd_core::Name;
use tokio::time::Instant;

use crate::face::FaceId;

/// Next hop information attached to a FIB prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextHopRecord {
    pub face: FaceId,
    pub cost: u64,
    pub expires: Option<Instant>,
}

impl NextHopRecord {
    fn is_live(&self, now: Instant) -> bool {
        match self.expires {
            Some(at) => now < at,
            None => true,
        }
    }
}

#[derive(Default)]
struct FibNode {
    children: HashMap<Component, FibNode>,
    nexthops: Vec<NextHopRecord>,
}

impl FibNode {
    fn is_prunable(&self) -> bool {
        self.children.is_empty() && self.nexthops.is_empty()
    }
}

/// Forwarding Information Base: a name trie keyed by component.
///
/// Process-wide, read by workers under a briefly-held lock, mutated only by
/// management.
pub struct Fib {
    root: FibNode,
}

impl Fib {
    pub fn new() -> Self {
        Self {
            root: FibNode::default(),
        }
    }

    /// Insert or update a nexthop for a prefix (one record per face)
    pub fn insert(&mut self, prefix: &Name, face: FaceId, cost: u64) {
        self.insert_with_expiry(prefix, face, cost, None)
    }

    pub fn insert_with_expiry(
        &mut self,
        prefix: &Name,
        face: FaceId,
        cost: u64,
        expires: Option<Instant>,
    ) {
        let mut node = &mut self.root;
        for component in &prefix.components {
            node = node.children.entry(component.clone()).or_default();
        }
        match node.nexthops.iter_mut().find(|record| record.face == face) {
            Some(record) => {
                record.cost = cost;
                record.expires = expires;
            }
            None => node.nexthops.push(NextHopRecord { face, cost, expires }),
        }
        info!("fib insert {} -> face {} cost {}", prefix, face, cost);
    }

    /// Remove the nexthop for (prefix, face); prunes empty trie nodes
    pub fn remove(&mut self, prefix: &Name, face: FaceId) -> bool {
        let removed = Self::remove_rec(&mut self.root, &prefix.components, face);
        if removed {
            info!("fib remove {} -> face {}", prefix, face);
        }
        removed
    }

    fn remove_rec(node: &mut FibNode, components: &[Component], face: FaceId) -> bool {
        match components.split_first() {
            None => {
                let before = node.nexthops.len();
                node.nexthops.retain(|record| record.face != face);
                node.nexthops.len() != before
            }
            Some((head, rest)) => {
                let Some(child) = node.children.get_mut(head) else {
                    return false;
                };
                let removed = Self::remove_rec(child, rest, face);
                if child.is_prunable() {
                    node.children.remove(head);
                }
                removed
            }
        }
    }

    /// Longest-prefix match.
    ///
    /// Returns the live nexthops of the longest prefix of `name` that has
    /// any, sorted ascending by cost; the sort is stable so strategies see a
    /// deterministic tie-break.
    pub fn lookup(&self, name: &Name, now: Instant) -> Vec<NextHopRecord> {
        let mut best: Option<&FibNode> = None;
        let mut node = &self.root;

        if node.nexthops.iter().any(|record| record.is_live(now)) {
            best = Some(node);
        }
        for component in &name.components {
            match node.children.get(component) {
                Some(child) => {
                    node = child;
                    if node.nexthops.iter().any(|record| record.is_live(now)) {
                        best = Some(node);
                    }
                }
                None => break,
            }
        }

        let mut nexthops: Vec<NextHopRecord> = match best {
            Some(node) => node
                .nexthops
                .iter()
                .filter(|record| record.is_live(now))
                .cloned()
                .collect(),
            None => {
                debug!("fib lookup {}: no route", name);
                return Vec::new();
            }
        };
        nexthops.sort_by_key(|record| record.cost);
        nexthops
    }
}

impl Default for Fib {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_longest_prefix_match() {
        let mut fib = Fib::new();
        let now = Instant::now();
        fib.insert(&Name::from_str("/a"), 1, 10);
        fib.insert(&Name::from_str("/a/b"), 2, 10);

        let hops = fib.lookup(&Name::from_str("/a/b/c"), now);
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].face, 2);

        let hops = fib.lookup(&Name::from_str("/a/x"), now);
        assert_eq!(hops[0].face, 1);

        assert!(fib.lookup(&Name::from_str("/z"), now).is_empty());
    }

    #[tokio::test]
    async fn test_component_boundaries() {
        let mut fib = Fib::new();
        let now = Instant::now();
        fib.insert(&Name::from_str("/a"), 1, 10);

        // "/ab" shares a string prefix with "/a" but not a component prefix
        assert!(fib.lookup(&Name::from_str("/ab"), now).is_empty());
    }

    #[tokio::test]
    async fn test_cost_sort_is_stable() {
        let mut fib = Fib::new();
        let now = Instant::now();
        fib.insert(&Name::from_str("/a"), 5, 20);
        fib.insert(&Name::from_str("/a"), 3, 10);
        fib.insert(&Name::from_str("/a"), 4, 10);

        let hops = fib.lookup(&Name::from_str("/a"), now);
        let faces: Vec<FaceId> = hops.iter().map(|h| h.face).collect();
        // ascending cost; insertion order preserved among equal costs
        assert_eq!(faces, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_upsert_per_face() {
        let mut fib = Fib::new();
        let now = Instant::now();
        fib.insert(&Name::from_str("/a"), 1, 10);
        fib.insert(&Name::from_str("/a"), 1, 5);

        let hops = fib.lookup(&Name::from_str("/a"), now);
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].cost, 5);
    }

    #[tokio::test]
    async fn test_add_remove_restores_lookup() {
        let mut fib = Fib::new();
        let now = Instant::now();
        fib.insert(&Name::from_str("/a"), 1, 10);

        let before = fib.lookup(&Name::from_str("/a/b/c"), now);

        fib.insert(&Name::from_str("/a/b"), 2, 10);
        assert!(fib.remove(&Name::from_str("/a/b"), 2));

        let after = fib.lookup(&Name::from_str("/a/b/c"), now);
        assert_eq!(before, after);
        assert!(!fib.remove(&Name::from_str("/a/b"), 2));
    }

    #[tokio::test]
    async fn test_expired_nexthops_skipped() {
        let mut fib = Fib::new();
        let now = Instant::now();
        fib.insert_with_expiry(
            &Name::from_str("/a"),
            1,
            10,
            Some(now + std::time::Duration::from_millis(50)),
        );
        fib.insert(&Name::from_str("/a"), 2, 20);

        let later = now + std::time::Duration::from_millis(100);
        let hops = fib.lookup(&Name::from_str("/a"), later);
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].face, 2);
    }

    #[tokio::test]
    async fn test_expired_entry_falls_back_to_shorter_prefix() {
        let mut fib = Fib::new();
        let now = Instant::now();
        fib.insert(&Name::from_str("/a"), 1, 10);
        fib.insert_with_expiry(
            &Name::from_str("/a/b"),
            2,
            10,
            Some(now + std::time::Duration::from_millis(10)),
        );

        let later = now + std::time::Duration::from_secs(1);
        let hops = fib.lookup(&Name::from_str("/a/b"), later);
        assert_eq!(hops[0].face, 1);
    }
}
