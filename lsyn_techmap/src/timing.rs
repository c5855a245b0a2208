//! Area and arrival-time analysis of mapped netlists.

use std::collections::HashMap;

use lsyn_library::{CellLibrary, LibraryCell};
use lsyn_netlist::{Netlist, Node, NodeKind};

use crate::MapError;

fn library_cell<'lib>(library: &'lib CellLibrary, node: &Node) -> Result<&'lib LibraryCell, MapError> {
    let unknown = || MapError::UnknownCell {
        node: node.id,
        cell: node.kind.tag().to_string(),
    };
    match &node.kind {
        NodeKind::Cell { name, .. } => library.cell(name).ok_or_else(unknown),
        _ => Err(unknown()),
    }
}

/// Arrival time of every signal: primary inputs arrive at 0, an instance
/// output at the latest of `arrival(fanin) + delay(pin)`.
///
/// # Errors
///
/// [`MapError::UnknownCell`] for nodes that are not instances of `library`
/// cells, [`MapError::Structural`] for cycles.
pub fn arrival_times(netlist: &Netlist, library: &CellLibrary) -> Result<HashMap<String, f64>, MapError> {
    let mut arrival: HashMap<String, f64> = netlist.inputs().iter().map(|i| (i.clone(), 0.0)).collect();
    for id in netlist.topo_order()? {
        let Some(node) = netlist.node(id) else {
            continue;
        };
        let cell = library_cell(library, node)?;
        let time = cell
            .inputs()
            .iter()
            .zip(&node.fanins)
            .map(|(pin, fanin)| arrival.get(&fanin.signal).copied().unwrap_or(0.0) + cell.delay(pin).unwrap_or(0.0))
            .fold(0.0, f64::max);
        arrival.insert(node.output.clone(), time);
    }
    Ok(arrival)
}

/// Latest arrival over the primary outputs.
#[must_use]
pub fn critical_arrival(netlist: &Netlist, arrival: &HashMap<String, f64>) -> f64 {
    netlist
        .outputs()
        .iter()
        .filter_map(|o| arrival.get(o).copied())
        .fold(0.0, f64::max)
}

/// Summed area of every instance.
///
/// # Errors
///
/// [`MapError::UnknownCell`] as for [`arrival_times`].
pub fn total_area(netlist: &Netlist, library: &CellLibrary) -> Result<f64, MapError> {
    netlist
        .nodes()
        .map(|node| library_cell(library, node).map(LibraryCell::area))
        .sum()
}
