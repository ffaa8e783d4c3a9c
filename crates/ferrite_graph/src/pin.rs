//! Named pins and ordered pin groups on a component.
//!
//! A component's node set is fixed at construction and addressed by role
//! name: either a single named pin (`"clk"`) or a lane inside a named group
//! (`("d", 3)`). [`PinPath`]s are the stable addresses used to transplant
//! wires onto a replacement component when the editor re-parameterizes one.

use crate::ids::NodeId;
use std::fmt;

/// The address of one pin within a component's pin set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PinPath {
    /// A single named pin.
    Single(&'static str),
    /// A lane of a named ordered group.
    Grouped(&'static str, usize),
}

impl fmt::Display for PinPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinPath::Single(role) => write!(f, "{role}"),
            PinPath::Grouped(role, index) => write!(f, "{role}[{index}]"),
        }
    }
}

/// An ordered collection of named pins and pin groups.
#[derive(Debug, Clone, Default)]
pub struct PinSet {
    singles: Vec<(&'static str, NodeId)>,
    groups: Vec<(&'static str, Vec<NodeId>)>,
}

impl PinSet {
    /// Creates an empty pin set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single named pin.
    pub fn add(&mut self, role: &'static str, node: NodeId) {
        debug_assert!(self.get(role).is_none(), "duplicate pin role {role}");
        self.singles.push((role, node));
    }

    /// Adds an ordered pin group.
    pub fn add_group(&mut self, role: &'static str, nodes: Vec<NodeId>) {
        debug_assert!(self.group(role).is_none(), "duplicate group role {role}");
        self.groups.push((role, nodes));
    }

    /// Looks up a single pin by role.
    pub fn get(&self, role: &str) -> Option<NodeId> {
        self.singles
            .iter()
            .find(|(r, _)| *r == role)
            .map(|&(_, node)| node)
    }

    /// Looks up a pin group by role.
    pub fn group(&self, role: &str) -> Option<&[NodeId]> {
        self.groups
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, nodes)| nodes.as_slice())
    }

    /// Returns the address of a node within this pin set.
    pub fn locate(&self, node: NodeId) -> Option<PinPath> {
        if let Some(&(role, _)) = self.singles.iter().find(|&&(_, n)| n == node) {
            return Some(PinPath::Single(role));
        }
        for (role, nodes) in &self.groups {
            if let Some(index) = nodes.iter().position(|&n| n == node) {
                return Some(PinPath::Grouped(role, index));
            }
        }
        None
    }

    /// Resolves an address to a node, if this pin set has one there.
    ///
    /// A grouped path whose role exists but whose index is out of range
    /// resolves to `None`: the replacement component has fewer lanes and
    /// the caller decides what to drop.
    pub fn resolve(&self, path: PinPath) -> Option<NodeId> {
        match path {
            PinPath::Single(role) => self.get(role),
            PinPath::Grouped(role, index) => self.group(role)?.get(index).copied(),
        }
    }

    /// Iterates over every node in the set, singles first, then groups in
    /// declaration order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.singles
            .iter()
            .map(|&(_, node)| node)
            .chain(self.groups.iter().flat_map(|(_, nodes)| nodes.iter().copied()))
    }

    /// Total number of pins across singles and groups.
    pub fn len(&self) -> usize {
        self.singles.len() + self.groups.iter().map(|(_, n)| n.len()).sum::<usize>()
    }

    /// Returns `true` if the set has no pins.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(raw: u32) -> NodeId {
        NodeId::from_raw(raw)
    }

    fn sample() -> PinSet {
        let mut pins = PinSet::new();
        pins.add("clk", n(0));
        pins.add("clr", n(1));
        pins.add_group("d", vec![n(2), n(3), n(4), n(5)]);
        pins
    }

    #[test]
    fn single_lookup() {
        let pins = sample();
        assert_eq!(pins.get("clk"), Some(n(0)));
        assert_eq!(pins.get("d"), None);
        assert_eq!(pins.get("nope"), None);
    }

    #[test]
    fn group_lookup() {
        let pins = sample();
        assert_eq!(pins.group("d").unwrap().len(), 4);
        assert_eq!(pins.group("clk"), None);
    }

    #[test]
    fn locate_and_resolve_roundtrip() {
        let pins = sample();
        for node in pins.iter_nodes() {
            let path = pins.locate(node).unwrap();
            assert_eq!(pins.resolve(path), Some(node));
        }
    }

    #[test]
    fn locate_unknown_node() {
        let pins = sample();
        assert_eq!(pins.locate(n(99)), None);
    }

    #[test]
    fn resolve_out_of_range_lane() {
        let pins = sample();
        assert_eq!(pins.resolve(PinPath::Grouped("d", 9)), None);
        assert_eq!(pins.resolve(PinPath::Grouped("q", 0)), None);
    }

    #[test]
    fn iter_order_and_len() {
        let pins = sample();
        let nodes: Vec<NodeId> = pins.iter_nodes().collect();
        assert_eq!(nodes, vec![n(0), n(1), n(2), n(3), n(4), n(5)]);
        assert_eq!(pins.len(), 6);
        assert!(!pins.is_empty());
    }

    #[test]
    fn path_display() {
        assert_eq!(PinPath::Single("clk").to_string(), "clk");
        assert_eq!(PinPath::Grouped("d", 2).to_string(), "d[2]");
    }
}
