//! Net (wire) records.
//!
//! Wires are derived data: every fanin of every live node yields one
//! source → sink edge. They are materialized for traversal and emission and
//! rebuilt after every mutation so both views stay consistent.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::NodeId;

/// The consuming end of a wire: a node input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WireSink {
    /// Consuming node.
    pub node: NodeId,
    /// Fanin slot of `node`.
    pub port: usize,
}

/// A producer signal bound to a consumer fanin slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Wire {
    /// Signal carried by the wire.
    pub source: String,
    /// Where the signal is consumed.
    pub sink: WireSink,
}

impl Wire {
    /// Create a wire from `source` into `port` of `node`.
    pub fn new(source: impl Into<String>, node: NodeId, port: usize) -> Self {
        Self {
            source: source.into(),
            sink: WireSink { node, port },
        }
    }
}

impl fmt::Display for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}.{}", self.source, self.sink.node, self.sink.port)
    }
}
