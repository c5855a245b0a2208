//! Matching library cell patterns against the subject graph.

use std::collections::HashMap;

use indexmap::IndexMap;
use lsyn_library::{CellLibrary, LibraryCell, Pattern};
use lsyn_netlist::{Node, NodeId, NodeKind};
use tracing::trace;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::Subject;

/// One way of implementing a subject node with a library cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Match<'lib> {
    /// The node whose output the instance drives.
    pub root: NodeId,
    /// The cell.
    pub cell: &'lib LibraryCell,
    /// Signal bound to each cell input, in pin declaration order.
    pub leaves: Vec<String>,
    /// Nodes below the root the instance absorbs.
    pub covered: Vec<NodeId>,
    /// Constant driven by a tie cell.
    pub init: Option<u64>,
}

impl Match<'_> {
    /// Node kind of the instance.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        NodeKind::Cell {
            name: self.cell.name().to_string(),
            init: self.init,
        }
    }

    /// `(pin, signal)` pairs.
    pub fn pins(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cell
            .inputs()
            .iter()
            .map(String::as_str)
            .zip(self.leaves.iter().map(String::as_str))
    }
}

/// Partial assignment built while walking a pattern.
#[derive(Debug, Clone, Default)]
struct Binding<'p, 's> {
    pins: HashMap<&'p str, &'s str>,
    covered: Vec<NodeId>,
    init: Option<u64>,
}

struct Matcher<'s> {
    subject: &'s Subject,
    /// Output width of the root; absorbed nodes must share it.
    width: u32,
}

impl<'s> Matcher<'s> {
    /// The node a pattern operator may match at `signal`.
    fn operator(&self, signal: &str, root: bool) -> Option<&'s Node> {
        let netlist = self.subject.netlist();
        let node = netlist.driver_node(signal)?;
        if root {
            return Some(node);
        }
        (self.subject.is_absorbable(signal) && netlist.width(signal) == self.width).then_some(node)
    }

    /// Every binding under which `pattern` matches the cone at `signal`.
    fn expand<'p>(
        &self,
        pattern: &'p Pattern,
        signal: &'s str,
        root: bool,
        mut binding: Binding<'p, 's>,
    ) -> Vec<Binding<'p, 's>> {
        match pattern {
            Pattern::Pin(pin) => match binding.pins.get(pin.as_str()) {
                Some(&bound) if bound != signal => Vec::new(),
                Some(_) => vec![binding],
                None => {
                    binding.pins.insert(pin.as_str(), signal);
                    vec![binding]
                }
            },
            Pattern::Const => {
                let Some(node) = self.operator(signal, root) else {
                    return Vec::new();
                };
                let NodeKind::Const(value) = node.kind else {
                    return Vec::new();
                };
                if binding.init.is_some_and(|init| init != value) {
                    return Vec::new();
                }
                binding.init = Some(value);
                if !root {
                    binding.covered.push(node.id);
                }
                vec![binding]
            }
            Pattern::Op { kind, args } => {
                let Some(node) = self.operator(signal, root) else {
                    return Vec::new();
                };
                if node.kind != *kind || node.fanins.len() != args.len() {
                    return Vec::new();
                }
                if !root {
                    binding.covered.push(node.id);
                }

                let straight: Vec<usize> = (0..args.len()).collect();
                let mut orders = vec![straight];
                if kind.is_commutative() && args.len() == 2 {
                    orders.push(vec![1, 0]);
                }

                let mut found = Vec::new();
                for order in orders {
                    let mut partial = vec![binding.clone()];
                    for (arg, port) in args.iter().zip(order) {
                        let operand = node.fanins[port].signal.as_str();
                        partial = partial
                            .into_iter()
                            .flat_map(|p| self.expand(arg, operand, false, p))
                            .collect();
                    }
                    found.extend(partial);
                }
                found
            }
        }
    }
}

/// Every match rooted at node `id`, in library order.
///
/// Nodes that already are library cells match only their own cell, with
/// their fanins as leaves.
#[must_use]
pub fn node_matches<'lib>(subject: &Subject, library: &'lib CellLibrary, id: NodeId) -> Vec<Match<'lib>> {
    let Some(node) = subject.netlist().node(id) else {
        return Vec::new();
    };

    if let NodeKind::Cell { name, init } = &node.kind {
        return library
            .cell(name)
            .filter(|cell| cell.inputs().len() == node.fanins.len())
            .map(|cell| Match {
                root: id,
                cell,
                leaves: node.fanin_signals().map(str::to_string).collect(),
                covered: Vec::new(),
                init: *init,
            })
            .into_iter()
            .collect();
    }

    let matcher = Matcher {
        subject,
        width: subject.netlist().width(&node.output),
    };
    let mut matches = Vec::new();
    for cell in library.lookup(&node.kind) {
        for binding in matcher.expand(cell.function(), &node.output, true, Binding::default()) {
            let Some(leaves) = cell
                .inputs()
                .iter()
                .map(|pin| binding.pins.get(pin.as_str()).map(|s| (*s).to_string()))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            let candidate = Match {
                root: id,
                cell,
                leaves,
                covered: binding.covered,
                init: binding.init,
            };
            // Commutative operators with equal operands match twice.
            if !matches.contains(&candidate) {
                matches.push(candidate);
            }
        }
    }
    trace!("{id} {}: {} matches", node.kind, matches.len());
    matches
}

/// Matches of every subject node, keyed in node-id order.
///
/// With the `rayon` feature the nodes are matched in parallel; the result is
/// the same as the sequential run.
#[must_use]
pub fn enumerate_matches<'lib>(subject: &Subject, library: &'lib CellLibrary) -> IndexMap<NodeId, Vec<Match<'lib>>> {
    let ids = subject.netlist().node_ids();

    #[cfg(feature = "rayon")]
    let found: Vec<_> = ids.par_iter().map(|&id| node_matches(subject, library, id)).collect();

    #[cfg(not(feature = "rayon"))]
    let found: Vec<_> = ids.iter().map(|&id| node_matches(subject, library, id)).collect();

    ids.into_iter().zip(found).collect()
}
