//! The subject graph the mapper covers.

use indexmap::IndexMap;
use lsyn_netlist::{FanoutIndex, Fanin, Netlist, NodeKind};
use tracing::debug;

use crate::MapError;

/// A private copy of the netlist to map, with every inversion made explicit.
///
/// Library patterns have no notion of inverted edges, so each distinct
/// inverted signal gets one `NOT` node and all of its inverted readers are
/// rewired to it. The fanout index is computed once afterwards and defines
/// the tree boundaries.
#[derive(Debug, Clone)]
pub struct Subject {
    netlist: Netlist,
    fanout: FanoutIndex,
}

impl Subject {
    /// Build the subject graph of `source`.
    ///
    /// # Errors
    ///
    /// [`MapError::Structural`] when `source` does not validate.
    pub fn new(source: &Netlist) -> Result<Self, MapError> {
        source.validate()?;
        let mut netlist = source.clone();
        let mut inverters: IndexMap<String, String> = IndexMap::new();

        for id in netlist.node_ids() {
            let Some(node) = netlist.node(id) else {
                continue;
            };
            if !node.fanins.iter().any(|f| f.inverted) {
                continue;
            }
            let kind = node.kind.clone();
            let mut fanins = node.fanins.clone();
            for fanin in fanins.iter_mut().filter(|f| f.inverted) {
                let inverter = match inverters.get(&fanin.signal) {
                    Some(signal) => signal.clone(),
                    None => {
                        let signal = netlist.fresh_signal("inv", netlist.width(&fanin.signal))?;
                        netlist.add_node(NodeKind::Not, vec![Fanin::new(fanin.signal.clone())], signal.clone())?;
                        inverters.insert(fanin.signal.clone(), signal.clone());
                        signal
                    }
                };
                *fanin = Fanin::new(inverter);
            }
            netlist.replace_node(id, kind, fanins)?;
        }

        netlist.rebuild_wires();
        if !inverters.is_empty() {
            debug!("subject graph: {} explicit inverters", inverters.len());
        }
        let fanout = netlist.fanout_index();
        Ok(Self { netlist, fanout })
    }

    /// The rewritten netlist.
    #[must_use]
    pub const fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    /// Consumers of every subject signal.
    #[must_use]
    pub const fn fanout(&self) -> &FanoutIndex {
        &self.fanout
    }

    /// May the driver of `signal` be covered inside its consumer's match?
    ///
    /// Only when it feeds exactly one node port and is not a primary output;
    /// everything else is a tree boundary and needs its own instance.
    #[must_use]
    pub fn is_absorbable(&self, signal: &str) -> bool {
        self.netlist.driver(signal).is_some() && self.fanout.single_consumer(signal).is_some()
    }
}
