//! The netlist container.
//!
//! [`Netlist`] exclusively owns its nodes and the signal-width table. Nodes
//! are stored in an arena indexed by [`NodeId`]; a removed node leaves a
//! tombstone so ids stay stable. A separate name → driver table turns signal
//! names into node ids in O(1).

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::trace;

use crate::{Fanin, MAX_WIDTH, NetlistError, Node, NodeId, NodeKind, Wire};

/// A single flattened module: ports, nodes, widths and derived wires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Netlist {
    /// Module name.
    name: String,
    /// Primary inputs, in declaration order.
    inputs: Vec<String>,
    /// Primary outputs, in declaration order.
    outputs: Vec<String>,
    /// Input names, for constant-time membership tests.
    input_set: HashSet<String>,
    /// Output names, for constant-time membership tests.
    output_set: HashSet<String>,
    /// Declared bit widths; absent signals are 1 bit wide.
    widths: IndexMap<String, u32>,
    /// Node arena; `None` marks a removed node.
    nodes: Vec<Option<Node>>,
    /// Output signal → driving node.
    drivers: HashMap<String, NodeId>,
    /// Materialized source → sink edges.
    wires: Vec<Wire>,
    /// Counter for fresh signal names.
    next_tmp: u32,
}

impl Netlist {
    /// Create an empty netlist.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            input_set: HashSet::new(),
            output_set: HashSet::new(),
            widths: IndexMap::new(),
            nodes: Vec::new(),
            drivers: HashMap::new(),
            wires: Vec::new(),
            next_tmp: 0,
        }
    }

    /// Module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primary inputs in declaration order.
    #[must_use]
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Primary outputs in declaration order.
    #[must_use]
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Declared widths.
    #[must_use]
    pub const fn widths(&self) -> &IndexMap<String, u32> {
        &self.widths
    }

    /// Width of `signal`, 1 when undeclared.
    #[must_use]
    pub fn width(&self, signal: &str) -> u32 {
        self.widths.get(signal).copied().unwrap_or(1)
    }

    /// Record the width of `signal`.
    ///
    /// # Errors
    ///
    /// Returns [`NetlistError::Width`] for widths outside `1..=64`.
    pub fn declare_width(&mut self, signal: impl Into<String>, width: u32) -> Result<(), NetlistError> {
        let signal = signal.into();
        if !(1..=MAX_WIDTH).contains(&width) {
            return Err(NetlistError::Width { signal, width });
        }
        self.widths.insert(signal, width);
        Ok(())
    }

    /// Declare a primary input.
    ///
    /// # Errors
    ///
    /// Fails when the name is already an input or already driven by a node,
    /// or when the width is out of range.
    pub fn add_input(&mut self, name: impl Into<String>, width: u32) -> Result<(), NetlistError> {
        let name = name.into();
        if self.is_input(&name) {
            return Err(NetlistError::DuplicateSignal(name));
        }
        if let Some(&node) = self.drivers.get(&name) {
            return Err(NetlistError::DrivenInput { node, signal: name });
        }
        self.declare_width(name.clone(), width)?;
        self.input_set.insert(name.clone());
        self.inputs.push(name);
        Ok(())
    }

    /// Declare a primary output. A primary input may also be an output.
    ///
    /// # Errors
    ///
    /// Fails when the name is already an output or the width is out of range.
    pub fn add_output(&mut self, name: impl Into<String>, width: u32) -> Result<(), NetlistError> {
        let name = name.into();
        if self.is_output(&name) {
            return Err(NetlistError::DuplicateSignal(name));
        }
        self.declare_width(name.clone(), width)?;
        self.output_set.insert(name.clone());
        self.outputs.push(name);
        Ok(())
    }

    /// Is `signal` a primary input?
    #[must_use]
    pub fn is_input(&self, signal: &str) -> bool {
        self.input_set.contains(signal)
    }

    /// Is `signal` a primary output?
    #[must_use]
    pub fn is_output(&self, signal: &str) -> bool {
        self.output_set.contains(signal)
    }

    /// Is `signal` a primary input or driven by a live node?
    #[must_use]
    pub fn is_defined(&self, signal: &str) -> bool {
        self.drivers.contains_key(signal) || self.is_input(signal)
    }

    /// Add a node driving `output`.
    ///
    /// # Errors
    ///
    /// Fails on an arity mismatch, when `output` is already driven, or when
    /// `output` is a primary input.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        fanins: Vec<Fanin>,
        output: impl Into<String>,
    ) -> Result<NodeId, NetlistError> {
        let id = NodeId::from(self.nodes.len());
        self.insert_node(id, kind, fanins, output.into())?;
        Ok(id)
    }

    /// Place a node at a specific arena slot (schema import keeps ids).
    pub(crate) fn insert_node(
        &mut self,
        id: NodeId,
        kind: NodeKind,
        fanins: Vec<Fanin>,
        output: String,
    ) -> Result<(), NetlistError> {
        check_arity(id, &kind, &fanins)?;
        if let Some(&existing) = self.drivers.get(&output) {
            return Err(NetlistError::MultipleDrivers {
                signal: output,
                existing,
            });
        }
        if self.is_input(&output) {
            return Err(NetlistError::DrivenInput { node: id, signal: output });
        }
        let slot = id.as_usize();
        if slot < self.nodes.len() && self.nodes[slot].is_some() {
            return Err(NetlistError::Schema(format!("node id {id} used twice")));
        }
        if slot >= self.nodes.len() {
            self.nodes.resize(slot + 1, None);
        }
        trace!("add {id}: {output} = {kind}");
        self.drivers.insert(output.clone(), id);
        self.nodes[slot] = Some(Node {
            id,
            kind,
            fanins,
            output,
        });
        Ok(())
    }

    /// Remove a node, returning it. Its output signal becomes undriven.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.get_mut(id.as_usize())?.take()?;
        self.drivers.remove(&node.output);
        trace!("remove {id}");
        Some(node)
    }

    /// Rewrite the function and inputs of a node in place, keeping its id
    /// and output signal.
    ///
    /// # Errors
    ///
    /// Fails when the node does not exist or the arity does not match.
    pub fn replace_node(&mut self, id: NodeId, kind: NodeKind, fanins: Vec<Fanin>) -> Result<(), NetlistError> {
        check_arity(id, &kind, &fanins)?;
        let node = self
            .nodes
            .get_mut(id.as_usize())
            .and_then(Option::as_mut)
            .ok_or(NetlistError::UnknownNode(id))?;
        trace!("replace {id}: {} -> {kind}", node.kind);
        node.kind = kind;
        node.fanins = fanins;
        Ok(())
    }

    /// Look up a live node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.as_usize()).and_then(Option::as_ref)
    }

    /// Live nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    /// Ids of the live nodes in id order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes().map(|n| n.id).collect()
    }

    /// Number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Node driving `signal`, if any.
    #[must_use]
    pub fn driver(&self, signal: &str) -> Option<NodeId> {
        self.drivers.get(signal).copied()
    }

    /// The node driving `signal`, if any.
    #[must_use]
    pub fn driver_node(&self, signal: &str) -> Option<&Node> {
        self.driver(signal).and_then(|id| self.node(id))
    }

    /// Generate an unused signal name `_<prefix><n>` and declare its width.
    ///
    /// # Errors
    ///
    /// Returns [`NetlistError::Width`] when `width` is out of range.
    pub fn fresh_signal(&mut self, prefix: &str, width: u32) -> Result<String, NetlistError> {
        loop {
            let candidate = format!("_{prefix}{}", self.next_tmp);
            self.next_tmp += 1;
            if !self.widths.contains_key(&candidate)
                && !self.is_defined(&candidate)
                && !self.is_output(&candidate)
            {
                self.declare_width(candidate.clone(), width)?;
                return Ok(candidate);
            }
        }
    }

    /// Rewrite every fanin through `substitution`.
    ///
    /// A fanin reading `s` with `substitution[s] = t` reads `t` afterwards;
    /// inversions compose, and chains `s → t → u` are followed to the end.
    /// Returns the number of rewritten fanins.
    pub fn redirect(&mut self, substitution: &HashMap<String, Fanin>) -> usize {
        if substitution.is_empty() {
            return 0;
        }
        let mut rewritten = 0;
        for node in self.nodes.iter_mut().flatten() {
            for fanin in &mut node.fanins {
                let mut hops = 0;
                while let Some(target) = substitution.get(&fanin.signal) {
                    fanin.signal.clone_from(&target.signal);
                    fanin.inverted ^= target.inverted;
                    hops += 1;
                    if hops > substitution.len() {
                        break;
                    }
                }
                if hops > 0 {
                    rewritten += 1;
                }
            }
        }
        trace!("redirected {rewritten} fanins");
        rewritten
    }

    /// Drop the width entry of a signal nobody drives or declares as a port.
    pub fn retire_signal(&mut self, signal: &str) {
        if !self.is_defined(signal) && !self.is_output(signal) {
            self.widths.swap_remove(signal);
        }
    }

    /// Signals read by at least one live node.
    #[must_use]
    pub fn used_signals(&self) -> HashSet<&str> {
        self.nodes().flat_map(Node::fanin_signals).collect()
    }

    /// Wires derived from the current fanin lists, in node-id and port order.
    #[must_use]
    pub fn derive_wires(&self) -> Vec<Wire> {
        self.nodes()
            .flat_map(|node| {
                node.fanins
                    .iter()
                    .enumerate()
                    .map(move |(port, f)| Wire::new(f.signal.clone(), node.id, port))
            })
            .collect()
    }

    /// Recompute the materialized wire list from the fanins.
    pub fn rebuild_wires(&mut self) {
        self.wires = self.derive_wires();
    }

    /// Materialized wires.
    #[must_use]
    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    /// Replace the materialized wire list (schema import).
    pub(crate) fn set_wires(&mut self, wires: Vec<Wire>) {
        self.wires = wires;
    }

    /// Count of live nodes per type tag, sorted by tag.
    #[must_use]
    pub fn statistics(&self) -> IndexMap<String, usize> {
        let mut stats: IndexMap<String, usize> = IndexMap::new();
        for node in self.nodes() {
            *stats.entry(node.kind.tag().to_string()).or_default() += 1;
        }
        stats.sort_keys();
        stats
    }
}

/// Check the fanin count against the arity of `kind`.
fn check_arity(id: NodeId, kind: &NodeKind, fanins: &[Fanin]) -> Result<(), NetlistError> {
    match kind.arity() {
        Some(expected) if expected != fanins.len() => Err(NetlistError::Arity {
            node: id,
            kind: kind.to_string(),
            expected,
            found: fanins.len(),
        }),
        _ => Ok(()),
    }
}

impl fmt::Display for Netlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let port = |name: &String| {
            let width = self.width(name);
            if width == 1 {
                name.clone()
            } else {
                format!("{name}[{width}]")
            }
        };
        writeln!(f, "netlist {}", self.name)?;
        writeln!(f, "  inputs: {}", self.inputs.iter().map(port).collect::<Vec<_>>().join(", "))?;
        writeln!(f, "  outputs: {}", self.outputs.iter().map(port).collect::<Vec<_>>().join(", "))?;
        for node in self.nodes() {
            writeln!(f, "  {node}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn and_or() -> Netlist {
        let mut n = Netlist::new("and_or");
        n.add_input("a", 1).unwrap();
        n.add_input("b", 1).unwrap();
        n.add_output("y", 1).unwrap();
        n.add_node(NodeKind::And, vec![Fanin::new("a"), Fanin::new("b")], "t")
            .unwrap();
        n.add_node(NodeKind::Or, vec![Fanin::new("t"), Fanin::inverted("a")], "y")
            .unwrap();
        n.rebuild_wires();
        n
    }

    #[test]
    fn build_and_query() {
        let n = and_or();
        assert_eq!(n.node_count(), 2);
        assert_eq!(n.driver("t"), Some(NodeId::new(0)));
        assert_eq!(n.driver("a"), None);
        assert!(n.is_defined("a"));
        assert!(!n.is_defined("zz"));
        assert_eq!(n.wires().len(), 4);
        assert_eq!(n.width("t"), 1);
    }

    #[test]
    fn arity_is_checked() {
        let mut n = and_or();
        let err = n
            .add_node(NodeKind::And, vec![Fanin::new("a")], "bad")
            .unwrap_err();
        assert!(matches!(err, NetlistError::Arity { expected: 2, found: 1, .. }));
        let err = n
            .replace_node(NodeId::new(0), NodeKind::Mux, vec![Fanin::new("a")])
            .unwrap_err();
        assert!(matches!(err, NetlistError::Arity { expected: 3, .. }));
    }

    #[test]
    fn second_driver_is_rejected() {
        let mut n = and_or();
        let err = n.add_node(NodeKind::Buf, vec![Fanin::new("a")], "t").unwrap_err();
        assert_eq!(
            err,
            NetlistError::MultipleDrivers {
                signal: "t".into(),
                existing: NodeId::new(0)
            }
        );
        let err = n.add_node(NodeKind::Buf, vec![Fanin::new("b")], "a").unwrap_err();
        assert!(matches!(err, NetlistError::DrivenInput { .. }));
    }

    #[test]
    fn remove_keeps_ids_stable() {
        let mut n = and_or();
        let removed = n.remove_node(NodeId::new(0)).unwrap();
        assert_eq!(removed.output, "t");
        assert_eq!(n.node_count(), 1);
        assert!(n.node(NodeId::new(0)).is_none());
        let id = n.add_node(NodeKind::Const(1), vec![], "t").unwrap();
        assert_eq!(id, NodeId::new(2));
    }

    #[test]
    fn redirect_composes_inversions() {
        let mut n = and_or();
        let mut sub = HashMap::new();
        sub.insert("a".to_string(), Fanin::inverted("b"));
        let rewritten = n.redirect(&sub);
        assert_eq!(rewritten, 2);
        let or = n.node(NodeId::new(1)).unwrap();
        assert_eq!(or.fanins[1], Fanin::new("b"));
        let and = n.node(NodeId::new(0)).unwrap();
        assert_eq!(and.fanins[0], Fanin::inverted("b"));
    }

    #[test]
    fn redirect_follows_chains() {
        let mut n = and_or();
        let mut sub = HashMap::new();
        sub.insert("t".to_string(), Fanin::new("u"));
        sub.insert("u".to_string(), Fanin::inverted("b"));
        n.redirect(&sub);
        let or = n.node(NodeId::new(1)).unwrap();
        assert_eq!(or.fanins[0], Fanin::inverted("b"));
    }

    #[test]
    fn fresh_signals_do_not_collide() {
        let mut n = and_or();
        n.declare_width("_t0", 3).unwrap();
        let fresh = n.fresh_signal("t", 4).unwrap();
        assert_eq!(fresh, "_t1");
        assert_eq!(n.width(&fresh), 4);
    }

    #[test]
    fn widths_are_range_checked() {
        let mut n = Netlist::new("w");
        assert!(n.add_input("a", 0).is_err());
        assert!(n.add_input("b", 65).is_err());
        assert!(n.add_input("c", 64).is_ok());
    }

    #[test]
    fn statistics_count_tags() {
        let n = and_or();
        let stats = n.statistics();
        assert_eq!(stats.get("AND"), Some(&1));
        assert_eq!(stats.get("OR"), Some(&1));
    }
}
