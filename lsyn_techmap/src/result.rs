use std::fmt;

use indexmap::IndexMap;
use lsyn_common::MapStrategy;
use lsyn_netlist::Netlist;

/// A mapped netlist and its figures of merit.
#[derive(Debug, Clone)]
pub struct MappingResult {
    /// New netlist made only of library-cell instances.
    pub netlist: Netlist,
    /// Objective the cover was chosen for.
    pub strategy: MapStrategy,
    /// Summed area of all instances.
    pub total_area: f64,
    /// Latest arrival time over the primary outputs.
    pub critical_arrival: f64,
    /// Instances per cell name, sorted by name.
    pub cell_usage: IndexMap<String, usize>,
}

impl MappingResult {
    /// Number of cell instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.netlist.node_count()
    }
}

impl fmt::Display for MappingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}): {} instances, area {:.3}, critical arrival {:.3}",
            self.netlist.name(),
            self.strategy,
            self.instance_count(),
            self.total_area,
            self.critical_arrival
        )?;
        for (cell, count) in &self.cell_usage {
            writeln!(f, "  {cell:<12} {count}")?;
        }
        Ok(())
    }
}
