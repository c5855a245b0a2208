//! Error types for netlist construction, validation and evaluation.

use thiserror::Error;

use crate::NodeId;

/// Structural errors: the netlist violates an IR invariant.
///
/// Every variant names the offending node and/or signal so the report is
/// actionable without re-running in a debug mode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetlistError {
    /// The fanin count does not match the arity of the node kind.
    #[error("Node {node} ({kind}) has {found} fanins, expected {expected}")]
    Arity {
        node: NodeId,
        kind: String,
        expected: usize,
        found: usize,
    },

    /// A fanin names a signal that is neither a primary input nor driven by a node.
    #[error("Node {node} references undefined signal '{signal}'")]
    Dangling { node: NodeId, signal: String },

    /// A signal would get a second driver.
    #[error("Signal '{signal}' is already driven by node {existing}")]
    MultipleDrivers { signal: String, existing: NodeId },

    /// A node drives a primary input.
    #[error("Node {node} drives primary input '{signal}'")]
    DrivenInput { node: NodeId, signal: String },

    /// A primary output has no driver.
    #[error("Primary output '{signal}' is not driven")]
    UndrivenOutput { signal: String },

    /// Combinational loop found while ordering the graph.
    #[error("Combinational cycle through node {node} (signal '{signal}')")]
    Cycle { node: NodeId, signal: String },

    /// Declared width outside `1..=64`.
    #[error("Signal '{signal}' has unsupported width {width} (expected 1..=64)")]
    Width { signal: String, width: u32 },

    /// The stored wire list disagrees with the node fanins.
    #[error("Wire list is inconsistent with node fanins: {0}")]
    InconsistentWires(String),

    /// No live node has this id.
    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    /// A port or signal name is declared twice.
    #[error("Signal '{0}' is declared twice")]
    DuplicateSignal(String),

    /// Malformed exchange-schema record.
    #[error("Malformed netlist record: {0}")]
    Schema(String),
}

/// Failure to apply a node function to concrete operands.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OpError {
    /// Division by zero.
    #[error("division by zero")]
    DivByZero,
    /// The kind has no built-in function (module instance or library cell).
    #[error("no built-in function")]
    Opaque,
}

/// Errors raised while simulating a netlist.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The netlist is structurally invalid.
    #[error(transparent)]
    Structural(#[from] NetlistError),

    /// A primary input was not assigned a value.
    #[error("No value supplied for primary input '{0}'")]
    MissingInput(String),

    /// The node cannot be evaluated (black box, or unknown library cell).
    #[error("Node {node} ({kind}) cannot be evaluated")]
    Opaque { node: NodeId, kind: String },

    /// Exhaustive evaluation was asked for too many input bits.
    #[error("Design has {bits} input bits, exhaustive evaluation is limited to {limit}")]
    TooWide { bits: u32, limit: u32 },

    /// Two netlists compared for equivalence have different ports.
    #[error("Port mismatch: {0}")]
    PortMismatch(String),
}
