//! Node/wire value-propagation model for the Ferrite simulation kernel.
//!
//! A simulation instance owns a flat graph of single-bit [`Node`]s grouped
//! into components. Output nodes fan out through delayed [`Wire`]s into input
//! nodes; components address their nodes through named [`PinSet`]s. Ids are
//! handed out by a [`NodeIdAllocator`] that supports id reuse and the
//! remapping needed when restoring a saved circuit.

#![warn(missing_docs)]

pub mod alloc;
pub mod arena;
pub mod ids;
pub mod node;
pub mod pin;
pub mod wire;

pub use alloc::{LoadReport, NodeIdAllocator};
pub use arena::{ArenaKey, SlotArena};
pub use ids::{ComponentId, NodeId, WireId};
pub use node::{Node, NodeKind};
pub use pin::{PinPath, PinSet};
pub use wire::Wire;
