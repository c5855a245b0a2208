//! The pass driver: runs the configured passes round after round until the
//! netlist stops changing, keeping every pass atomic.

use lsyn_common::{OptConfig, PassKind};
use lsyn_netlist::Netlist;
use tracing::{debug, info};

use crate::{Balance, ConstProp, Dce, OptError, OptReport, Pass, PassOutcome, PassReport, Strash};

/// The pass implementing `kind`.
#[must_use]
pub fn pass_for(kind: PassKind) -> Box<dyn Pass> {
    match kind {
        PassKind::Strash => Box::new(Strash),
        PassKind::ConstProp => Box::new(ConstProp),
        PassKind::Dce => Box::new(Dce),
        PassKind::Balance => Box::new(Balance),
    }
}

/// Ordered passes plus the round limit and fold-error policy.
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
    max_rounds: usize,
    strict: bool,
}

impl std::fmt::Debug for PassManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassManager")
            .field("passes", &self.passes.iter().map(|p| p.kind()).collect::<Vec<_>>())
            .field("max_rounds", &self.max_rounds)
            .field("strict", &self.strict)
            .finish()
    }
}

impl PassManager {
    /// Driver for the passes named in `config`.
    #[must_use]
    pub fn new(config: &OptConfig) -> Self {
        Self::with_passes(
            config.passes.iter().copied().map(pass_for).collect(),
            config.max_rounds,
            config.strict,
        )
    }

    /// Driver for an explicit pass list.
    #[must_use]
    pub fn with_passes(passes: Vec<Box<dyn Pass>>, max_rounds: usize, strict: bool) -> Self {
        Self {
            passes,
            max_rounds: max_rounds.max(1),
            strict,
        }
    }

    /// Run one pass atomically: the netlist is validated first, wires are
    /// rebuilt and the result validated afterwards, and any failure restores
    /// the netlist to its state before the pass.
    ///
    /// # Errors
    ///
    /// [`OptError::Structural`] naming the pass, or the pass's own error.
    pub fn run_pass(&self, pass: &dyn Pass, netlist: &mut Netlist) -> Result<PassOutcome, OptError> {
        let structural = OptError::structural(pass.kind());
        netlist.validate().map_err(&structural)?;
        let snapshot = netlist.clone();
        let result = pass.run(netlist, self.strict).and_then(|outcome| {
            netlist.rebuild_wires();
            netlist.validate().map_err(&structural)?;
            Ok(outcome)
        });
        if result.is_err() {
            debug!("{} failed, restoring the netlist", pass.kind());
            *netlist = snapshot;
        }
        result
    }

    /// Run rounds of all passes until a round changes nothing or the round
    /// limit is reached.
    ///
    /// # Errors
    ///
    /// The first pass error. Passes completed before it keep their effect.
    pub fn run(&self, netlist: &mut Netlist) -> Result<OptReport, OptError> {
        let mut report = OptReport::default();
        let initial = netlist.node_count();
        for round in 1..=self.max_rounds {
            let mut changes = 0;
            for pass in &self.passes {
                let nodes_before = netlist.node_count();
                let outcome = self.run_pass(pass.as_ref(), netlist)?;
                debug!(
                    "round {round}: {} made {} changes ({nodes_before} -> {} nodes)",
                    pass.kind(),
                    outcome.changes,
                    netlist.node_count()
                );
                changes += outcome.changes;
                report.passes.push(PassReport {
                    pass: pass.kind(),
                    round,
                    changes: outcome.changes,
                    nodes_before,
                    nodes_after: netlist.node_count(),
                    fold_errors: outcome.fold_errors,
                });
            }
            report.rounds = round;
            if changes == 0 {
                report.converged = true;
                break;
            }
        }
        info!(
            "optimized '{}': {initial} -> {} nodes in {} rounds{}",
            netlist.name(),
            netlist.node_count(),
            report.rounds,
            if report.converged { "" } else { " (round limit reached)" }
        );
        Ok(report)
    }
}

/// Run the passes of `config` on `netlist`.
///
/// # Errors
///
/// See [`PassManager::run`].
pub fn optimize(netlist: &mut Netlist, config: &OptConfig) -> Result<OptReport, OptError> {
    PassManager::new(config).run(netlist)
}
