//! Dead-code elimination.

use std::collections::HashSet;

use lsyn_common::PassKind;
use lsyn_netlist::{Netlist, NodeId};
use tracing::{debug, trace};

use crate::{OptError, Pass, PassOutcome};

/// The dead-code elimination pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dce;

impl Pass for Dce {
    fn kind(&self) -> PassKind {
        PassKind::Dce
    }

    fn run(&self, netlist: &mut Netlist, _strict: bool) -> Result<PassOutcome, OptError> {
        Ok(PassOutcome::changed(dce(netlist)))
    }
}

/// Nodes in the transitive fanin of a primary output.
#[must_use]
pub fn live_nodes(netlist: &Netlist) -> HashSet<NodeId> {
    let mut live = HashSet::new();
    let mut worklist: Vec<NodeId> = netlist.outputs().iter().filter_map(|o| netlist.driver(o)).collect();
    while let Some(id) = worklist.pop() {
        if !live.insert(id) {
            continue;
        }
        if let Some(node) = netlist.node(id) {
            worklist.extend(node.fanin_signals().filter_map(|s| netlist.driver(s)));
        }
    }
    live
}

/// Remove every node no primary output depends on. Returns the number of
/// removed nodes.
pub fn dce(netlist: &mut Netlist) -> usize {
    let live = live_nodes(netlist);
    let mut removed = 0;
    for id in netlist.node_ids() {
        if live.contains(&id) {
            continue;
        }
        if let Some(node) = netlist.remove_node(id) {
            trace!("dce: removed {node}");
            netlist.retire_signal(&node.output);
            removed += 1;
        }
    }
    if removed > 0 {
        netlist.rebuild_wires();
        debug!("dce removed {removed} nodes");
    }
    removed
}
