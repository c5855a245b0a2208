use contracts::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::NetlistError;

/// Stable identifier of a node inside a [`crate::Netlist`] arena.
///
/// Ids are never reused within one netlist: removing a node leaves a
/// tombstone, so an id printed in a diagnostic keeps pointing at the same
/// node for the whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    /// The underlying raw arena index.
    inner: u32,
}

impl NodeId {
    /// Creates a node id from a raw arena index.
    #[ensures(ret.inner == id)]
    pub fn new(id: u32) -> Self {
        Self { inner: id }
    }

    /// Returns the id as a usize for arena access.
    #[ensures(ret == self.inner as usize)]
    pub fn as_usize(self) -> usize {
        self.inner as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.inner)
    }
}

impl FromStr for NodeId {
    type Err = NetlistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('n')
            .and_then(|digits| digits.parse::<u32>().ok())
            .map(Self::new)
            .ok_or_else(|| NetlistError::Schema(format!("invalid node id '{s}' (expected n<index>)")))
    }
}

impl From<usize> for NodeId {
    #[inline]
    fn from(id: usize) -> Self {
        Self { inner: id as u32 }
    }
}

impl From<NodeId> for usize {
    #[inline]
    fn from(id: NodeId) -> Self {
        id.inner as Self
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
