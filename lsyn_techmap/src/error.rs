use lsyn_netlist::{NetlistError, NodeId};
use thiserror::Error;

/// Errors raised by technology mapping.
///
/// The input netlist is never modified, whatever the error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapError {
    /// A node the cover needs has no matching library cell.
    #[error("No library cell implements node {node} ({kind}) driving '{signal}'")]
    Unmappable {
        /// The node without a match.
        node: NodeId,
        /// Its type, as displayed in the IR.
        kind: String,
        /// Its output signal.
        signal: String,
    },

    /// A mapped instance names a cell the library does not define.
    #[error("Node {node} instantiates unknown cell '{cell}'")]
    UnknownCell {
        /// The instance.
        node: NodeId,
        /// Cell name.
        cell: String,
    },

    /// The netlist was malformed, or building the mapped netlist failed.
    #[error(transparent)]
    Structural(#[from] NetlistError),
}
