//! Rebalancing of associative gate trees to minimum depth.
//!
//! A tree is a maximal group of AND, OR or XOR nodes of one kind and one
//! width, connected through non-inverted edges whose producer feeds nothing
//! else and is not a primary output. Such a tree computes the same function
//! for any bracketing of its leaves.

use lsyn_common::PassKind;
use lsyn_netlist::{FanoutIndex, Fanin, Netlist, NetlistError, NodeId, NodeKind};
use tracing::{debug, trace};

use crate::{OptError, Pass, PassOutcome};

/// The balance pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct Balance;

impl Pass for Balance {
    fn kind(&self) -> PassKind {
        PassKind::Balance
    }

    fn run(&self, netlist: &mut Netlist, _strict: bool) -> Result<PassOutcome, OptError> {
        let rebuilt = balance(netlist).map_err(OptError::structural(self.kind()))?;
        Ok(PassOutcome::changed(rebuilt))
    }
}

/// Leaves and internal nodes of one tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    /// Leaf operands, left to right.
    pub leaves: Vec<Fanin>,
    /// Nodes below the root that the tree absorbs.
    pub internal: Vec<NodeId>,
    /// Node levels on the longest root-to-leaf path.
    pub depth: usize,
}

/// `ceil(log2 k)`: the depth of a balanced binary tree with `k` leaves.
#[must_use]
pub const fn min_depth(leaves: usize) -> usize {
    if leaves <= 1 {
        0
    } else {
        (usize::BITS - (leaves - 1).leading_zeros()) as usize
    }
}

/// The tree node a fanin of `parent` continues into, if any.
fn internal_driver(netlist: &Netlist, fanout: &FanoutIndex, parent: NodeId, fanin: &Fanin) -> Option<NodeId> {
    let parent_node = netlist.node(parent)?;
    let driver = netlist.driver_node(&fanin.signal)?;
    let joins = !fanin.inverted
        && driver.kind == parent_node.kind
        && netlist.width(&driver.output) == netlist.width(&parent_node.output)
        && fanout.single_consumer(&fanin.signal) == Some(parent);
    joins.then_some(driver.id)
}

/// Pending work while collecting a tree.
enum Step {
    /// Expand a tree node found at the given depth.
    Visit(NodeId, usize),
    /// Emit a leaf.
    Leaf(Fanin),
}

/// Collect the tree rooted at `root`.
///
/// Uses an explicit stack, so chains of any length are fine. Fanins are
/// pushed in reverse to pop leaves left to right.
#[must_use]
pub fn collect_tree(netlist: &Netlist, fanout: &FanoutIndex, root: NodeId) -> Tree {
    let mut tree = Tree::default();
    let mut stack = vec![Step::Visit(root, 1)];
    while let Some(step) = stack.pop() {
        match step {
            Step::Leaf(fanin) => tree.leaves.push(fanin),
            Step::Visit(id, depth) => {
                let Some(node) = netlist.node(id) else {
                    continue;
                };
                tree.depth = tree.depth.max(depth);
                for fanin in node.fanins.iter().rev() {
                    match internal_driver(netlist, fanout, id, fanin) {
                        Some(child) => {
                            tree.internal.push(child);
                            stack.push(Step::Visit(child, depth + 1));
                        }
                        None => stack.push(Step::Leaf(fanin.clone())),
                    }
                }
            }
        }
    }
    tree
}

/// Does `id` sit inside a larger tree (so its root handles it)?
fn is_absorbed(netlist: &Netlist, fanout: &FanoutIndex, id: NodeId) -> bool {
    let Some(node) = netlist.node(id) else {
        return false;
    };
    let Some(consumer) = fanout.single_consumer(&node.output) else {
        return false;
    };
    netlist
        .node(consumer)
        .into_iter()
        .flat_map(|c| &c.fanins)
        .any(|f| f.signal == node.output && internal_driver(netlist, fanout, consumer, f) == Some(id))
}

fn rebuild(netlist: &mut Netlist, root: NodeId, kind: &NodeKind, tree: Tree) -> Result<(), NetlistError> {
    let width = netlist
        .node(root)
        .map(|n| netlist.width(&n.output))
        .ok_or(NetlistError::UnknownNode(root))?;
    let mut level = tree.leaves;
    while level.len() > 2 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut operands = level.into_iter();
        while let Some(left) = operands.next() {
            match operands.next() {
                Some(right) => {
                    let signal = netlist.fresh_signal("bal", width)?;
                    netlist.add_node(kind.clone(), vec![left, right], signal.clone())?;
                    next.push(Fanin::new(signal));
                }
                None => next.push(left),
            }
        }
        level = next;
    }
    netlist.replace_node(root, kind.clone(), level)?;
    for id in tree.internal {
        if let Some(node) = netlist.remove_node(id) {
            netlist.retire_signal(&node.output);
        }
    }
    Ok(())
}

/// Rebuild every tree deeper than necessary. Returns the number of
/// rebuilt trees.
///
/// # Errors
///
/// Structural errors from ordering or rewriting the netlist.
pub fn balance(netlist: &mut Netlist) -> Result<usize, NetlistError> {
    let fanout = netlist.fanout_index();
    let mut rebuilt = 0;
    for root in netlist.topo_order()? {
        let Some(kind) = netlist.node(root).map(|n| n.kind.clone()) else {
            continue;
        };
        if !kind.is_associative() || is_absorbed(netlist, &fanout, root) {
            continue;
        }
        let tree = collect_tree(netlist, &fanout, root);
        let target = min_depth(tree.leaves.len());
        if tree.depth <= target {
            continue;
        }
        trace!(
            "balance: {root} {kind} tree of {} leaves, depth {} -> {target}",
            tree.leaves.len(),
            tree.depth
        );
        rebuild(netlist, root, &kind, tree)?;
        rebuilt += 1;
    }
    if rebuilt > 0 {
        debug!("balance rebuilt {rebuilt} trees");
    }
    Ok(rebuilt)
}
