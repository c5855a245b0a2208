use itertools::Itertools;
use lsyn_common::PassKind;
use lsyn_netlist::{NetlistError, NodeId};
use thiserror::Error;

/// A constant fold that has no defined result.
///
/// `operands` lists the constant value of each fanin, `None` for fanins that
/// are not constant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Cannot fold {op} at node {node} with operands [{}]: division by zero", format_operands(.operands))]
pub struct FoldError {
    /// The node that was left unfolded.
    pub node: NodeId,
    /// Type tag of the node.
    pub op: String,
    /// Fanin values seen by the folder.
    pub operands: Vec<Option<u64>>,
}

fn format_operands(operands: &[Option<u64>]) -> String {
    operands
        .iter()
        .map(|o| o.map_or_else(|| "?".to_string(), |v| v.to_string()))
        .join(", ")
}

/// Errors raised by the optimization passes and their driver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptError {
    /// The netlist was malformed before or after a pass.
    #[error("Pass '{pass}' hit a structural error: {source}")]
    Structural {
        /// Pass being run.
        pass: PassKind,
        /// Underlying error.
        #[source]
        source: NetlistError,
    },

    /// A fold error in strict mode.
    #[error(transparent)]
    Fold(#[from] FoldError),
}

impl OptError {
    pub(crate) fn structural(pass: PassKind) -> impl Fn(NetlistError) -> Self {
        move |source| Self::Structural { pass, source }
    }
}
