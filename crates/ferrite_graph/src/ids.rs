//! Opaque id newtypes for graph entities.
//!
//! Each id is a thin `u32` wrapper that is `Copy`, `Hash`, and
//! `Serialize`/`Deserialize`. Node ids are handed out by the
//! [`NodeIdAllocator`](crate::alloc::NodeIdAllocator) and may be reused after
//! release; wire and component ids come from their owning
//! [`SlotArena`](crate::arena::SlotArena).

use crate::arena::ArenaKey;
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an id from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaKey for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_id!(
    /// Opaque, copyable id for a single-bit connection point on a component.
    NodeId
);

define_id!(
    /// Opaque, copyable id for a directed wire between two nodes.
    WireId
);

define_id!(
    /// Opaque, copyable id for a component in a simulation instance.
    ComponentId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn roundtrip() {
        let id = NodeId::from_raw(17);
        assert_eq!(id.as_raw(), 17);
    }

    #[test]
    fn equality_and_hash() {
        let mut set = HashSet::new();
        set.insert(WireId::from_raw(1));
        set.insert(WireId::from_raw(1));
        set.insert(WireId::from_raw(2));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn serde_roundtrip() {
        let id = ComponentId::from_raw(9);
        let json = serde_json::to_string(&id).unwrap();
        let back: ComponentId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
