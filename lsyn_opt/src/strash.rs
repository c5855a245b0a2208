//! Structural hashing: merge nodes that compute the same function of the
//! same inputs.

use std::collections::HashMap;

use lsyn_common::PassKind;
use lsyn_netlist::{Fanin, Netlist, NetlistError, Node, NodeId, NodeKind};
use tracing::{debug, trace};

use crate::{OptError, Pass, PassOutcome};

/// The structural hashing pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct Strash;

impl Pass for Strash {
    fn kind(&self) -> PassKind {
        PassKind::Strash
    }

    fn run(&self, netlist: &mut Netlist, _strict: bool) -> Result<PassOutcome, OptError> {
        let merged = strash(netlist).map_err(OptError::structural(self.kind()))?;
        Ok(PassOutcome::changed(merged))
    }
}

/// Canonical form of a node: kind, fanins (sorted for commutative kinds)
/// and output width.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    kind: NodeKind,
    fanins: Vec<Fanin>,
    width: u32,
}

impl Signature {
    /// Signature of `node` with its fanins already resolved.
    #[must_use]
    pub fn new(node: &Node, mut fanins: Vec<Fanin>, width: u32) -> Self {
        if node.kind.is_commutative() {
            fanins.sort();
        }
        Self {
            kind: node.kind.clone(),
            fanins,
            width,
        }
    }
}

/// A buffer that only gives a primary output its own name.
fn is_port_buffer(netlist: &Netlist, node: &Node) -> bool {
    node.kind == NodeKind::Buf
        && netlist.is_output(&node.output)
        && matches!(node.fanins.as_slice(), [f] if !f.inverted && netlist.is_output(&f.signal))
}

/// Nodes the pass may merge. Black boxes are opaque, so two instances are
/// never assumed equal.
fn is_hashable(netlist: &Netlist, node: &Node) -> bool {
    !matches!(node.kind, NodeKind::Module(_)) && !is_port_buffer(netlist, node)
}

fn resolve(substitution: &HashMap<String, Fanin>, fanin: &Fanin) -> Fanin {
    let mut current = fanin.clone();
    while let Some(target) = substitution.get(&current.signal) {
        current = Fanin {
            signal: target.signal.clone(),
            inverted: current.inverted ^ target.inverted,
        };
    }
    current
}

/// One sweep in topological order. Returns the number of merged nodes.
fn sweep(netlist: &mut Netlist) -> Result<usize, NetlistError> {
    let order = netlist.topo_order()?;
    let mut table: HashMap<Signature, NodeId> = HashMap::new();
    let mut substitution: HashMap<String, Fanin> = HashMap::new();
    let mut merged = 0;

    for id in order {
        let Some(node) = netlist.node(id).cloned() else {
            continue;
        };
        if !is_hashable(netlist, &node) {
            continue;
        }
        let fanins: Vec<Fanin> = node.fanins.iter().map(|f| resolve(&substitution, f)).collect();
        let signature = Signature::new(&node, fanins, netlist.width(&node.output));
        let Some(&rep_id) = table.get(&signature) else {
            table.insert(signature, id);
            continue;
        };
        let rep_output = netlist
            .node(rep_id)
            .map(|n| n.output.clone())
            .ok_or(NetlistError::UnknownNode(rep_id))?;

        match (netlist.is_output(&rep_output), netlist.is_output(&node.output)) {
            (_, false) => {
                trace!("strash: {id} merged into {rep_id}");
                substitution.insert(node.output.clone(), Fanin::new(rep_output));
                netlist.remove_node(id);
                netlist.retire_signal(&node.output);
            }
            (false, true) => {
                // The primary output keeps its name; the earlier node goes.
                trace!("strash: {rep_id} merged into output driver {id}");
                substitution.insert(rep_output.clone(), Fanin::new(node.output.clone()));
                netlist.remove_node(rep_id);
                netlist.retire_signal(&rep_output);
                table.insert(signature, id);
            }
            (true, true) => {
                trace!("strash: {id} becomes a port buffer of {rep_output}");
                netlist.replace_node(id, NodeKind::Buf, vec![Fanin::new(rep_output)])?;
            }
        }
        merged += 1;
    }

    netlist.redirect(&substitution);
    Ok(merged)
}

/// Merge structurally identical nodes until no duplicates remain.
///
/// # Errors
///
/// Structural errors from ordering or rewriting the netlist.
pub fn strash(netlist: &mut Netlist) -> Result<usize, NetlistError> {
    let mut total = 0;
    loop {
        let merged = sweep(netlist)?;
        if merged == 0 {
            break;
        }
        debug!("strash sweep merged {merged} nodes");
        total += merged;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_ands() -> Netlist {
        let mut n = Netlist::new("t");
        n.add_input("a", 1).unwrap();
        n.add_input("b", 1).unwrap();
        n.add_output("y", 1).unwrap();
        n.add_node(NodeKind::And, vec![Fanin::new("a"), Fanin::new("b")], "t1").unwrap();
        n.add_node(NodeKind::And, vec![Fanin::new("b"), Fanin::new("a")], "t2").unwrap();
        n.add_node(NodeKind::Xor, vec![Fanin::new("t1"), Fanin::new("t2")], "y").unwrap();
        n
    }

    #[test]
    fn commutative_duplicates_merge() {
        let mut n = two_ands();
        assert_eq!(strash(&mut n).unwrap(), 1);
        assert_eq!(n.node_count(), 2);
        let y = n.driver_node("y").unwrap();
        assert_eq!(y.fanins, vec![Fanin::new("t1"), Fanin::new("t1")]);
        assert!(!n.widths().contains_key("t2"));
    }

    #[test]
    fn inversion_is_part_of_the_signature() {
        let mut n = Netlist::new("t");
        n.add_input("a", 1).unwrap();
        n.add_input("b", 1).unwrap();
        n.add_output("y", 1).unwrap();
        n.add_node(NodeKind::And, vec![Fanin::new("a"), Fanin::new("b")], "t1").unwrap();
        n.add_node(NodeKind::And, vec![Fanin::inverted("a"), Fanin::new("b")], "t2").unwrap();
        n.add_node(NodeKind::Or, vec![Fanin::new("t1"), Fanin::new("t2")], "y").unwrap();
        assert_eq!(strash(&mut n).unwrap(), 0);
    }

    #[test]
    fn width_is_part_of_the_signature() {
        let mut n = Netlist::new("t");
        n.add_input("a", 2).unwrap();
        n.add_input("b", 2).unwrap();
        n.add_output("y", 1).unwrap();
        n.add_output("z", 2).unwrap();
        n.add_node(NodeKind::Add, vec![Fanin::new("a"), Fanin::new("b")], "y").unwrap();
        n.add_node(NodeKind::Add, vec![Fanin::new("a"), Fanin::new("b")], "z").unwrap();
        assert_eq!(strash(&mut n).unwrap(), 0);
    }

    #[test]
    fn output_driver_is_preferred() {
        let mut n = Netlist::new("t");
        n.add_input("a", 1).unwrap();
        n.add_input("b", 1).unwrap();
        n.add_output("y", 1).unwrap();
        n.add_output("z", 1).unwrap();
        n.add_node(NodeKind::Or, vec![Fanin::new("a"), Fanin::new("b")], "t").unwrap();
        n.add_node(NodeKind::Not, vec![Fanin::new("t")], "z").unwrap();
        n.add_node(NodeKind::Or, vec![Fanin::new("b"), Fanin::new("a")], "y").unwrap();
        assert_eq!(strash(&mut n).unwrap(), 1);
        assert!(n.driver("t").is_none());
        assert_eq!(n.driver_node("z").unwrap().fanins, vec![Fanin::new("y")]);
    }

    #[test]
    fn duplicate_outputs_get_port_buffers() {
        let mut n = Netlist::new("t");
        n.add_input("a", 1).unwrap();
        n.add_input("b", 1).unwrap();
        for out in ["x", "y", "z"] {
            n.add_output(out, 1).unwrap();
            n.add_node(NodeKind::Nand, vec![Fanin::new("a"), Fanin::new("b")], out).unwrap();
        }
        assert_eq!(strash(&mut n).unwrap(), 2);
        assert_eq!(n.driver_node("x").unwrap().kind, NodeKind::Nand);
        for out in ["y", "z"] {
            let node = n.driver_node(out).unwrap();
            assert_eq!(node.kind, NodeKind::Buf);
            assert_eq!(node.fanins, vec![Fanin::new("x")]);
        }
        // Port buffers are not hashed again.
        assert_eq!(strash(&mut n).unwrap(), 0);
    }

    #[test]
    fn merges_cascade() {
        let mut n = two_ands();
        n.add_output("w", 1).unwrap();
        n.add_node(NodeKind::Not, vec![Fanin::new("t1")], "u1").unwrap();
        n.add_node(NodeKind::Not, vec![Fanin::new("t2")], "u2").unwrap();
        n.add_node(NodeKind::Or, vec![Fanin::new("u1"), Fanin::new("u2")], "w").unwrap();
        assert_eq!(strash(&mut n).unwrap(), 2);
        assert_eq!(n.driver_node("w").unwrap().fanins, vec![Fanin::new("u1"), Fanin::new("u1")]);
    }

    #[test]
    fn black_boxes_are_not_merged() {
        let mut n = Netlist::new("t");
        n.add_input("a", 1).unwrap();
        n.add_output("y", 1).unwrap();
        n.add_output("z", 1).unwrap();
        n.add_node(NodeKind::Module("rng".into()), vec![Fanin::new("a")], "y").unwrap();
        n.add_node(NodeKind::Module("rng".into()), vec![Fanin::new("a")], "z").unwrap();
        assert_eq!(strash(&mut n).unwrap(), 0);
    }
}
