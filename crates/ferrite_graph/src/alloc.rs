//! Node-id allocation with release, reuse, and load-time remapping.

use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{event, Level};

/// Allocates [`NodeId`]s for one simulation instance.
///
/// Ids are dense small integers. Released ids are reused smallest-first so
/// long editing sessions do not creep the id space upward. Callers restoring
/// a saved circuit may request specific ids; collisions during a bulk load
/// are resolved through a remapping table that lives for the duration of the
/// load session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeIdAllocator {
    next: u32,
    free: BTreeSet<u32>,
    /// Remap table of the load session in progress, requested → actual.
    load_remap: Option<HashMap<u32, u32>>,
}

/// The remappings recorded during one bulk load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Requested id → actually assigned id, for every collision resolved.
    pub remapped: HashMap<u32, u32>,
}

impl NodeIdAllocator {
    /// Creates an allocator with no ids handed out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh id, reusing the smallest released id first.
    pub fn fresh(&mut self) -> NodeId {
        if let Some(&smallest) = self.free.iter().next() {
            self.free.remove(&smallest);
            return NodeId::from_raw(smallest);
        }
        let id = self.next;
        self.next += 1;
        NodeId::from_raw(id)
    }

    /// Requests a specific id, typically restored from a saved circuit.
    ///
    /// If the id is available it is granted. If it is already taken and a
    /// load session is open, a fresh id is granted and the remapping
    /// recorded; outside a session the collision is logged and a fresh id
    /// granted with best-effort semantics.
    pub fn request(&mut self, wanted: NodeId) -> NodeId {
        let raw = wanted.as_raw();
        if self.free.remove(&raw) {
            return wanted;
        }
        if raw >= self.next {
            // Ids skipped over become available for later fresh() calls.
            for gap in self.next..raw {
                self.free.insert(gap);
            }
            self.next = raw + 1;
            return wanted;
        }
        // Collision: the id is live.
        let fresh = self.fresh();
        match &mut self.load_remap {
            Some(remap) => {
                remap.insert(raw, fresh.as_raw());
            }
            None => {
                event!(
                    Level::WARN,
                    wanted = raw,
                    assigned = fresh.as_raw(),
                    "node id already taken outside a load session, assigning fresh id"
                );
            }
        }
        fresh
    }

    /// Releases an id for reuse.
    pub fn release(&mut self, id: NodeId) {
        debug_assert!(id.as_raw() < self.next, "releasing unallocated id");
        self.free.insert(id.as_raw());
    }

    /// Opens a load session: collisions from [`request`](Self::request) are
    /// recorded in a remap table instead of warned about.
    pub fn begin_load(&mut self) {
        self.load_remap = Some(HashMap::new());
    }

    /// Resolves an id through the active load session's remap table.
    ///
    /// Wires saved against pre-collision ids are reconnected through this
    /// during restore. Outside a session, or for ids that were not remapped,
    /// the id passes through unchanged.
    pub fn resolve(&self, id: NodeId) -> NodeId {
        match &self.load_remap {
            Some(remap) => remap
                .get(&id.as_raw())
                .map(|&raw| NodeId::from_raw(raw))
                .unwrap_or(id),
            None => id,
        }
    }

    /// Closes the load session and returns the remappings it recorded.
    pub fn end_load(&mut self) -> LoadReport {
        LoadReport {
            remapped: self.load_remap.take().unwrap_or_default(),
        }
    }

    /// Returns the number of ids currently live.
    pub fn live_count(&self) -> usize {
        self.next as usize - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_dense() {
        let mut alloc = NodeIdAllocator::new();
        assert_eq!(alloc.fresh().as_raw(), 0);
        assert_eq!(alloc.fresh().as_raw(), 1);
        assert_eq!(alloc.fresh().as_raw(), 2);
        assert_eq!(alloc.live_count(), 3);
    }

    #[test]
    fn released_ids_are_reused_smallest_first() {
        let mut alloc = NodeIdAllocator::new();
        let a = alloc.fresh();
        let b = alloc.fresh();
        let _c = alloc.fresh();
        alloc.release(b);
        alloc.release(a);
        assert_eq!(alloc.fresh(), a);
        assert_eq!(alloc.fresh(), b);
    }

    #[test]
    fn request_available_id() {
        let mut alloc = NodeIdAllocator::new();
        let id = alloc.request(NodeId::from_raw(4));
        assert_eq!(id.as_raw(), 4);
        // The skipped ids 0..4 are still handed out by fresh().
        assert_eq!(alloc.fresh().as_raw(), 0);
    }

    #[test]
    fn request_collision_outside_session_gets_fresh() {
        let mut alloc = NodeIdAllocator::new();
        let a = alloc.fresh();
        let replacement = alloc.request(a);
        assert_ne!(replacement, a);
    }

    #[test]
    fn load_session_records_remap() {
        let mut alloc = NodeIdAllocator::new();
        let a = alloc.fresh();
        alloc.begin_load();
        let reassigned = alloc.request(a);
        assert_ne!(reassigned, a);
        assert_eq!(alloc.resolve(a), reassigned);
        let report = alloc.end_load();
        assert_eq!(report.remapped.get(&a.as_raw()), Some(&reassigned.as_raw()));
        // Session closed: ids resolve to themselves again.
        assert_eq!(alloc.resolve(a), a);
    }

    #[test]
    fn resolve_passes_unmapped_ids_through() {
        let mut alloc = NodeIdAllocator::new();
        alloc.begin_load();
        let id = alloc.request(NodeId::from_raw(7));
        assert_eq!(id.as_raw(), 7);
        assert_eq!(alloc.resolve(id), id);
        let report = alloc.end_load();
        assert!(report.remapped.is_empty());
    }

    #[test]
    fn release_then_request_same_id() {
        let mut alloc = NodeIdAllocator::new();
        let a = alloc.fresh();
        alloc.release(a);
        assert_eq!(alloc.request(a), a);
    }
}
