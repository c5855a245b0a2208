//! Cover selection.
//!
//! The best match of every node is chosen by dynamic programming in
//! topological order, so the best covers of a match's leaves are always
//! known when the match is costed. The cover is then extracted from the
//! primary outputs with a worklist; every required signal gets exactly one
//! instance.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use lsyn_common::MapStrategy;
use lsyn_netlist::{Fanin, Netlist, NetlistError, NodeId};
use tracing::{debug, trace};

use crate::{MapError, Match, Subject};

/// Costs closer than this are considered equal.
const EPSILON: f64 = 1e-9;

/// Area and arrival time of a cover.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cost {
    /// Cell area of the cover, boundary leaves excluded.
    pub area: f64,
    /// Arrival time at the covered signal; primary inputs arrive at 0.
    pub arrival: f64,
}

impl Cost {
    /// Objective components in comparison order.
    const fn key(self, strategy: MapStrategy) -> [f64; 2] {
        match strategy {
            MapStrategy::AreaOptimal => [self.area, self.arrival],
            MapStrategy::DelayOptimal => [self.arrival, self.area],
        }
    }

    /// Is `self` strictly better than `other` under `strategy`?
    #[must_use]
    pub fn better_than(self, other: Self, strategy: MapStrategy) -> bool {
        for (a, b) in self.key(strategy).into_iter().zip(other.key(strategy)) {
            if (a - b).abs() > EPSILON {
                return a < b;
            }
        }
        false
    }
}

#[derive(Debug, Clone, Copy)]
struct Choice {
    index: usize,
    cost: Cost,
}

/// Cost of `m` given the best covers of the nodes before it, or the leaf
/// driver that has no cover.
fn cost_of(subject: &Subject, m: &Match<'_>, best: &HashMap<NodeId, Choice>) -> Result<Cost, NodeId> {
    let netlist = subject.netlist();
    let mut cost = Cost {
        area: m.cell.area(),
        arrival: 0.0,
    };
    let mut counted: Vec<&str> = Vec::new();
    for (pin, leaf) in m.pins() {
        let leaf_cost = match netlist.driver(leaf) {
            None => Cost::default(),
            Some(driver) => best.get(&driver).ok_or(driver)?.cost,
        };
        if subject.is_absorbable(leaf) && !counted.contains(&leaf) {
            cost.area += leaf_cost.area;
            counted.push(leaf);
        }
        cost.arrival = cost.arrival.max(leaf_cost.arrival + m.cell.delay(pin).unwrap_or(0.0));
    }
    Ok(cost)
}

/// The best match of every coverable node under one strategy.
#[derive(Debug)]
pub struct Selection<'m, 'lib> {
    matches: &'m IndexMap<NodeId, Vec<Match<'lib>>>,
    best: HashMap<NodeId, Choice>,
    /// Uncoverable node → the node without any match that causes it.
    blocked: HashMap<NodeId, NodeId>,
}

/// Choose the best match of every node.
///
/// Ties under the objective keep the earlier match, so library order
/// decides between equivalent cells.
///
/// # Errors
///
/// [`MapError::Structural`] when the subject graph has a cycle.
pub fn select<'m, 'lib>(
    subject: &Subject,
    matches: &'m IndexMap<NodeId, Vec<Match<'lib>>>,
    strategy: MapStrategy,
) -> Result<Selection<'m, 'lib>, MapError> {
    let mut best: HashMap<NodeId, Choice> = HashMap::new();
    let mut blocked: HashMap<NodeId, NodeId> = HashMap::new();

    for id in subject.netlist().topo_order()? {
        let candidates = matches.get(&id).map_or(&[][..], Vec::as_slice);
        let mut choice: Option<Choice> = None;
        let mut blocker: Option<NodeId> = None;
        for (index, m) in candidates.iter().enumerate() {
            match cost_of(subject, m, &best) {
                Ok(cost) => {
                    if choice.is_none_or(|c| cost.better_than(c.cost, strategy)) {
                        choice = Some(Choice { index, cost });
                    }
                }
                Err(leaf) => {
                    blocker.get_or_insert(blocked.get(&leaf).copied().unwrap_or(leaf));
                }
            }
        }
        match choice {
            Some(choice) => {
                trace!(
                    "{id}: {} (area {:.3}, arrival {:.3})",
                    candidates[choice.index].cell.name(),
                    choice.cost.area,
                    choice.cost.arrival
                );
                best.insert(id, choice);
            }
            None => {
                blocked.insert(id, blocker.unwrap_or(id));
            }
        }
    }

    Ok(Selection {
        matches,
        best,
        blocked,
    })
}

impl<'m, 'lib> Selection<'m, 'lib> {
    /// Best cost of node `id`, if it can be covered.
    #[must_use]
    pub fn cost(&self, id: NodeId) -> Option<Cost> {
        self.best.get(&id).map(|c| c.cost)
    }

    /// The match chosen for node `id`.
    #[must_use]
    pub fn chosen(&self, id: NodeId) -> Option<&'m Match<'lib>> {
        let choice = self.best.get(&id)?;
        self.matches.get(&id)?.get(choice.index)
    }

    /// Nodes without any cover, in id order.
    #[must_use]
    pub fn uncoverable(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.blocked.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn unmappable(&self, netlist: &Netlist, id: NodeId) -> MapError {
        let culprit = self.blocked.get(&id).copied().unwrap_or(id);
        match netlist.node(culprit) {
            Some(node) => MapError::Unmappable {
                node: culprit,
                kind: node.kind.to_string(),
                signal: node.output.clone(),
            },
            None => NetlistError::UnknownNode(culprit).into(),
        }
    }

    /// Build the mapped netlist: one library-cell instance per signal the
    /// primary outputs require, in topological order.
    ///
    /// # Errors
    ///
    /// [`MapError::Unmappable`] naming the node that has no match when a
    /// required node cannot be covered.
    pub fn extract(&self, subject: &Subject) -> Result<Netlist, MapError> {
        let source = subject.netlist();
        let mut required: HashSet<NodeId> = HashSet::new();
        let mut worklist: Vec<&str> = source.outputs().iter().map(String::as_str).collect();
        while let Some(signal) = worklist.pop() {
            let Some(id) = source.driver(signal) else {
                continue;
            };
            if !required.insert(id) {
                continue;
            }
            let m = self.chosen(id).ok_or_else(|| self.unmappable(source, id))?;
            worklist.extend(m.leaves.iter().map(String::as_str));
        }

        let skipped: Vec<String> = self
            .uncoverable()
            .into_iter()
            .filter(|id| !required.contains(id))
            .map(|id| id.to_string())
            .collect();
        if !skipped.is_empty() {
            debug!("no output needs uncoverable nodes {}", skipped.join(", "));
        }

        let mut mapped = Netlist::new(source.name());
        for input in source.inputs() {
            mapped.add_input(input.clone(), source.width(input))?;
        }
        for output in source.outputs() {
            mapped.add_output(output.clone(), source.width(output))?;
        }
        for id in source.topo_order()? {
            if !required.contains(&id) {
                continue;
            }
            let (Some(node), Some(m)) = (source.node(id), self.chosen(id)) else {
                continue;
            };
            mapped.declare_width(node.output.clone(), source.width(&node.output))?;
            let fanins = m.leaves.iter().map(Fanin::new).collect();
            let instance = mapped.add_node(m.kind(), fanins, node.output.clone())?;
            debug!(
                "{} <- {instance} {} ({} nodes absorbed)",
                node.output,
                m.cell.name(),
                m.covered.len()
            );
        }
        mapped.rebuild_wires();
        mapped.validate()?;
        Ok(mapped)
    }
}
