//! Technology mapping: covering an optimized netlist with library cells.
//!
//! Mapping runs in four steps:
//! 1. [`Subject::new`] copies the netlist and turns every inverted edge into
//!    an explicit `NOT` node.
//! 2. [`enumerate_matches`] finds, for every node, each library cell whose
//!    function pattern matches the cone rooted there. Cones only extend
//!    through nodes with a single consumer, so multi-fanout points and
//!    primary outputs are tree boundaries.
//! 3. [`select`] picks the best match per node by dynamic programming in
//!    topological order, minimizing `(area, arrival)` or `(arrival, area)`.
//! 4. [`Selection::extract`] walks back from the primary outputs and emits
//!    one instance per required signal.
//!
//! The input netlist is never modified.

mod cover;
mod error;
mod matching;
mod result;
mod subject;
mod timing;

use itertools::Itertools;
use lsyn_common::MapStrategy;
use lsyn_library::CellLibrary;
use lsyn_netlist::Netlist;
use tracing::{debug, info};

pub use cover::{Cost, Selection, select};
pub use error::MapError;
pub use matching::{Match, enumerate_matches, node_matches};
pub use result::MappingResult;
pub use subject::Subject;
pub use timing::{arrival_times, critical_arrival, total_area};

/// Map `netlist` onto `library` under `strategy`.
///
/// # Errors
///
/// [`MapError::Unmappable`] when a node the outputs depend on has no
/// matching cell, [`MapError::Structural`] when `netlist` is malformed.
pub fn map(netlist: &Netlist, library: &CellLibrary, strategy: MapStrategy) -> Result<MappingResult, MapError> {
    let subject = Subject::new(netlist)?;
    let matches = enumerate_matches(&subject, library);
    debug!(
        "{} subject nodes, {} candidate matches",
        subject.netlist().node_count(),
        matches.values().map(Vec::len).sum::<usize>()
    );

    let selection = select(&subject, &matches, strategy)?;
    let mapped = selection.extract(&subject)?;

    let arrival = arrival_times(&mapped, library)?;
    let critical_arrival = critical_arrival(&mapped, &arrival);
    let total_area = total_area(&mapped, library)?;
    let cell_usage = mapped
        .nodes()
        .map(|node| node.kind.tag().to_string())
        .counts()
        .into_iter()
        .sorted()
        .collect();

    info!(
        "mapped '{}' onto '{}' ({strategy}): {} instances, area {total_area:.3}, arrival {critical_arrival:.3}",
        netlist.name(),
        library.name(),
        mapped.node_count()
    );
    Ok(MappingResult {
        netlist: mapped,
        strategy,
        total_area,
        critical_arrival,
        cell_usage,
    })
}

/// Minimum-area cover.
///
/// # Errors
///
/// See [`map`].
pub fn area_optimal(netlist: &Netlist, library: &CellLibrary) -> Result<MappingResult, MapError> {
    map(netlist, library, MapStrategy::AreaOptimal)
}

/// Minimum critical-arrival cover, ties broken by area.
///
/// # Errors
///
/// See [`map`].
pub fn delay_optimal(netlist: &Netlist, library: &CellLibrary) -> Result<MappingResult, MapError> {
    map(netlist, library, MapStrategy::DelayOptimal)
}
