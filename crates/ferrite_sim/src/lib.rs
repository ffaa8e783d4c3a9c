//! Simulation instance and fixed-point scheduler for the Ferrite kernel.
//!
//! This crate ties the value-propagation model of `ferrite_graph`, the
//! synchronous primitives of `ferrite_sync`, and the CPU composite of
//! `ferrite_cpu` into a runnable simulation: a [`SimInstance`] owns the
//! component/node/wire arenas, the node-id allocator, and the two scheduler
//! queues, and [`SimInstance::run_pending`] drives all pending work to a
//! fixed point.
//!
//! # Evaluation model
//!
//! A user or editor action changes an input node's value, which enqueues the
//! owning component for recalculation. Recalculation produces a new opaque
//! value; a change enqueues the component for propagation, which pushes the
//! value into its output nodes and onward through delayed wires into
//! downstream inputs. Each scheduler round runs all pending propagations
//! before any pending recalculation, so zero-delay feedback converges in
//! bounded rounds; a hard round cap breaks genuine combinational cycles by
//! dropping all pending work.
//!
//! # Modules
//!
//! - `component` — pin sets plus the closed [`ComponentKind`] enum
//! - `instance` — [`SimInstance`]: arenas, queues, construction API
//! - `scheduler` — the propagate-then-recalc fixed-point driver
//! - `error` — [`SimError`]

#![warn(missing_docs)]

pub mod component;
pub mod error;
pub mod instance;
pub mod scheduler;

pub use component::{Component, ComponentKind, ComponentPhase, ComponentSpec, GateKind};
pub use error::SimError;
pub use instance::{Propagate, SavedNodeIds, SimInstance, SimOptions};
pub use scheduler::RunOutcome;
