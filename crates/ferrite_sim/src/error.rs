//! Error types for simulation-instance operations.

use ferrite_cpu::CpuError;
use ferrite_sync::SyncError;

/// Errors from constructing or mutating a simulation instance.
///
/// Recoverable conditions (duplicate wires, id collisions, stuck cycles,
/// per-component recalculation failures) are not represented here; those are
/// logged and absorbed per the kernel's keep-simulating policy. These errors
/// cover misuse of the construction API.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A node id did not resolve to a live node.
    #[error("node {id} not found")]
    MissingNode {
        /// Raw id of the missing node.
        id: u32,
    },

    /// A wire id did not resolve to a live wire.
    #[error("wire {id} not found")]
    MissingWire {
        /// Raw id of the missing wire.
        id: u32,
    },

    /// A component id did not resolve to a live component.
    #[error("component {id} not found")]
    MissingComponent {
        /// Raw id of the missing component.
        id: u32,
    },

    /// A wire source must be an output node.
    #[error("node {id} is not an output node")]
    NotAnOutput {
        /// Raw id of the offending node.
        id: u32,
    },

    /// A wire destination (or externally driven node) must be an input node.
    #[error("node {id} is not an input node")]
    NotAnInput {
        /// Raw id of the offending node.
        id: u32,
    },

    /// A gate was requested with an unsupported input count.
    #[error("gate input count {count} unsupported for {gate}")]
    BadGateArity {
        /// The gate kind's display name.
        gate: &'static str,
        /// The rejected input count.
        count: u32,
    },

    /// A synchronous primitive rejected its construction parameters.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The CPU composite rejected its construction parameters.
    #[error(transparent)]
    Cpu(#[from] CpuError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(
            SimError::MissingNode { id: 3 }.to_string(),
            "node 3 not found"
        );
        assert_eq!(
            SimError::NotAnOutput { id: 9 }.to_string(),
            "node 9 is not an output node"
        );
    }

    #[test]
    fn sync_errors_pass_through() {
        let e = SimError::from(SyncError::BadWidth { width: 0 });
        assert_eq!(e.to_string(), "unsupported bit width 0 (expected 1..=64)");
    }

    #[test]
    fn cpu_errors_pass_through() {
        let e = SimError::from(CpuError::BadDataBits { bits: 99 });
        assert!(e.to_string().contains("99"));
    }
}
