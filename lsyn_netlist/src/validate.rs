//! Structural validation.

use std::collections::HashMap;

use itertools::Itertools;
use tracing::debug;

use crate::{MAX_WIDTH, NetlistError, Netlist};

impl Netlist {
    /// Check every IR invariant.
    ///
    /// Arity, dangling references, driver uniqueness, driven inputs,
    /// undriven outputs, width range, wire consistency and acyclicity are
    /// checked in that order; the first violation is returned.
    ///
    /// # Errors
    ///
    /// The [`NetlistError`] describing the first violated invariant.
    pub fn validate(&self) -> Result<(), NetlistError> {
        let mut seen: HashMap<&str, crate::NodeId> = HashMap::new();
        for node in self.nodes() {
            if let Some(expected) = node.kind.arity()
                && expected != node.fanins.len()
            {
                return Err(NetlistError::Arity {
                    node: node.id,
                    kind: node.kind.to_string(),
                    expected,
                    found: node.fanins.len(),
                });
            }
            for signal in node.fanin_signals() {
                if !self.is_defined(signal) {
                    return Err(NetlistError::Dangling {
                        node: node.id,
                        signal: signal.to_string(),
                    });
                }
            }
            if let Some(&existing) = seen.get(node.output.as_str()) {
                return Err(NetlistError::MultipleDrivers {
                    signal: node.output.clone(),
                    existing,
                });
            }
            seen.insert(&node.output, node.id);
            if self.is_input(&node.output) {
                return Err(NetlistError::DrivenInput {
                    node: node.id,
                    signal: node.output.clone(),
                });
            }
        }

        for output in self.outputs() {
            if !self.is_defined(output) {
                return Err(NetlistError::UndrivenOutput {
                    signal: output.clone(),
                });
            }
        }

        for (signal, &width) in self.widths() {
            if !(1..=MAX_WIDTH).contains(&width) {
                return Err(NetlistError::Width {
                    signal: signal.clone(),
                    width,
                });
            }
        }

        self.check_wires()?;
        let order = self.topo_order()?;
        debug!("validated '{}': {} nodes, {} wires", self.name(), order.len(), self.wires().len());
        Ok(())
    }

    /// Compare the stored wire list against the fanins, ignoring order.
    pub(crate) fn check_wires(&self) -> Result<(), NetlistError> {
        let stored = self.wires().iter().sorted().collect_vec();
        let derived = self.derive_wires();
        let derived = derived.iter().sorted().collect_vec();
        if stored == derived {
            return Ok(());
        }
        let detail = derived
            .iter()
            .find(|w| stored.binary_search(w).is_err())
            .map(|w| format!("missing wire {w}"))
            .or_else(|| {
                stored
                    .iter()
                    .find(|w| derived.binary_search(w).is_err())
                    .map(|w| format!("stray wire {w}"))
            })
            .unwrap_or_else(|| "duplicate wires".to_string());
        Err(NetlistError::InconsistentWires(detail))
    }
}
