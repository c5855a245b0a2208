use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{NodeId, NodeKind};

/// One input of a node: a signal name plus an optional inversion.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fanin {
    /// Name of the signal feeding this input.
    pub signal: String,
    /// The input sees the bitwise complement of `signal`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inverted: bool,
}

impl Fanin {
    /// A plain (non-inverted) reference to `signal`.
    pub fn new(signal: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            inverted: false,
        }
    }

    /// An inverted reference to `signal`.
    pub fn inverted(signal: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            inverted: true,
        }
    }

    /// The same reference with the inversion flipped.
    #[must_use]
    pub fn negate(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            inverted: !self.inverted,
        }
    }
}

impl fmt::Display for Fanin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inverted {
            write!(f, "~{}", self.signal)
        } else {
            f.write_str(&self.signal)
        }
    }
}

/// A unit of computation driving exactly one signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    /// Arena identifier.
    pub id: NodeId,
    /// Function computed by the node.
    pub kind: NodeKind,
    /// Ordered inputs.
    pub fanins: Vec<Fanin>,
    /// Name of the signal this node drives.
    pub output: String,
}

impl Node {
    /// Signals read by this node, in port order.
    pub fn fanin_signals(&self) -> impl Iterator<Item = &str> {
        self.fanins.iter().map(|f| f.signal.as_str())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} = {}", self.id, self.output, self.kind)?;
        if !self.fanins.is_empty() {
            let args: Vec<String> = self.fanins.iter().map(ToString::to_string).collect();
            write!(f, "({})", args.join(", "))?;
        }
        Ok(())
    }
}
