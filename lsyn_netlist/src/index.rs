//! Graph views over a [`Netlist`]: consumer index, topological order and
//! logic depth.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::{NetlistError, NodeId, Netlist};

/// Signal → consumers map, plus primary-output membership.
///
/// Built on demand; it is a snapshot and goes stale after any mutation of
/// the netlist it was computed from.
#[derive(Debug, Clone, Default)]
pub struct FanoutIndex {
    consumers: HashMap<String, Vec<(NodeId, usize)>>,
    outputs: HashMap<String, usize>,
}

impl FanoutIndex {
    /// Index every live fanin of `netlist`.
    #[must_use]
    pub fn new(netlist: &Netlist) -> Self {
        let mut consumers: HashMap<String, Vec<(NodeId, usize)>> = HashMap::new();
        for node in netlist.nodes() {
            for (port, fanin) in node.fanins.iter().enumerate() {
                consumers.entry(fanin.signal.clone()).or_default().push((node.id, port));
            }
        }
        let mut outputs: HashMap<String, usize> = HashMap::new();
        for output in netlist.outputs() {
            *outputs.entry(output.clone()).or_default() += 1;
        }
        Self { consumers, outputs }
    }

    /// `(node, port)` pairs reading `signal`, in node-id order.
    #[must_use]
    pub fn consumers(&self, signal: &str) -> &[(NodeId, usize)] {
        self.consumers.get(signal).map_or(&[], Vec::as_slice)
    }

    /// Number of node ports reading `signal`.
    #[must_use]
    pub fn fanout_count(&self, signal: &str) -> usize {
        self.consumers(signal).len()
    }

    /// Is `signal` a primary output?
    #[must_use]
    pub fn is_output(&self, signal: &str) -> bool {
        self.outputs.contains_key(signal)
    }

    /// `signal` is read by exactly one node port and is not a primary output.
    ///
    /// This is the condition under which a producer may be absorbed into its
    /// consumer by tree-based rewrites.
    #[must_use]
    pub fn single_consumer(&self, signal: &str) -> Option<NodeId> {
        match self.consumers(signal) {
            [(node, _)] if !self.is_output(signal) => Some(*node),
            _ => None,
        }
    }
}

impl Netlist {
    /// Build a [`FanoutIndex`] for the current state.
    #[must_use]
    pub fn fanout_index(&self) -> FanoutIndex {
        FanoutIndex::new(self)
    }

    /// Live nodes in a deterministic topological order.
    ///
    /// Kahn's algorithm; among ready nodes the lowest id goes first.
    /// Fanins that are primary inputs or undriven do not constrain the order.
    ///
    /// # Errors
    ///
    /// Returns [`NetlistError::Cycle`] naming the lowest-id node left on a
    /// combinational cycle.
    pub fn topo_order(&self) -> Result<Vec<NodeId>, NetlistError> {
        let mut pending: HashMap<NodeId, usize> = HashMap::new();
        let mut readers: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in self.nodes() {
            let mut count = 0;
            for signal in node.fanin_signals() {
                if let Some(driver) = self.driver(signal) {
                    readers.entry(driver).or_default().push(node.id);
                    count += 1;
                }
            }
            pending.insert(node.id, count);
        }

        let mut ready: BinaryHeap<Reverse<NodeId>> = pending
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&id, _)| Reverse(id))
            .collect();
        let mut order = Vec::with_capacity(pending.len());
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            for reader in readers.get(&id).into_iter().flatten() {
                if let Some(count) = pending.get_mut(reader) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(Reverse(*reader));
                    }
                }
            }
        }

        if order.len() == pending.len() {
            return Ok(order);
        }
        let stuck = pending
            .iter()
            .filter(|&(_, &count)| count > 0)
            .map(|(&id, _)| id)
            .min()
            .ok_or(NetlistError::InconsistentWires("topological sort lost nodes".into()))?;
        let signal = self.node(stuck).map(|n| n.output.clone()).unwrap_or_default();
        Err(NetlistError::Cycle { node: stuck, signal })
    }

    /// Logic level of every node: one more than its deepest driving node.
    /// Nodes fed only by primary inputs sit at level 1.
    ///
    /// # Errors
    ///
    /// Propagates cycle detection from [`Netlist::topo_order`].
    pub fn levels(&self) -> Result<HashMap<NodeId, usize>, NetlistError> {
        let mut level: HashMap<NodeId, usize> = HashMap::new();
        for id in self.topo_order()? {
            let Some(node) = self.node(id) else { continue };
            let deepest = node
                .fanin_signals()
                .filter_map(|s| self.driver(s))
                .filter_map(|d| level.get(&d).copied())
                .max()
                .unwrap_or(0);
            level.insert(id, deepest + 1);
        }
        Ok(level)
    }

    /// Longest node path from any primary input to any primary output.
    ///
    /// # Errors
    ///
    /// Propagates cycle detection from [`Netlist::topo_order`].
    pub fn depth(&self) -> Result<usize, NetlistError> {
        let level = self.levels()?;
        Ok(self
            .outputs()
            .iter()
            .filter_map(|o| self.driver(o))
            .filter_map(|d| level.get(&d).copied())
            .max()
            .unwrap_or(0))
    }
}
