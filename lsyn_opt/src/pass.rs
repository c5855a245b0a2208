//! The pass interface and the reports passes produce.

use lsyn_common::PassKind;
use lsyn_netlist::Netlist;

use crate::{FoldError, OptError};

/// A netlist-to-netlist rewrite that preserves the function of every
/// primary output.
///
/// Passes mutate the netlist in place. They may leave the wire list stale;
/// the driver rebuilds and validates it after every run.
pub trait Pass: Send + Sync {
    /// Which pass this is.
    fn kind(&self) -> PassKind;

    /// Rewrite `netlist` once.
    ///
    /// # Errors
    ///
    /// Structural errors, and fold errors when `strict` is set. On error the
    /// netlist may be partially rewritten; [`crate::PassManager`] restores it.
    fn run(&self, netlist: &mut Netlist, strict: bool) -> Result<PassOutcome, OptError>;
}

/// What a single pass run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Number of rewrites; zero means the pass found nothing to do.
    pub changes: usize,
    /// Folds that were skipped (non-strict mode only).
    pub fold_errors: Vec<FoldError>,
}

impl PassOutcome {
    /// An outcome with `changes` rewrites and no fold errors.
    #[must_use]
    pub const fn changed(changes: usize) -> Self {
        Self {
            changes,
            fold_errors: Vec::new(),
        }
    }
}

/// One pass run inside a driver round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// Pass that ran.
    pub pass: PassKind,
    /// 1-based driver round.
    pub round: usize,
    /// Rewrites performed.
    pub changes: usize,
    /// Live nodes before the pass.
    pub nodes_before: usize,
    /// Live nodes after the pass.
    pub nodes_after: usize,
    /// Skipped folds.
    pub fold_errors: Vec<FoldError>,
}

/// Summary of a whole driver run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptReport {
    /// Rounds executed.
    pub rounds: usize,
    /// The last round changed nothing.
    pub converged: bool,
    /// Every pass run, in execution order.
    pub passes: Vec<PassReport>,
}

impl OptReport {
    /// Rewrites over all rounds.
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.passes.iter().map(|p| p.changes).sum()
    }

    /// Skipped folds of the last round, one per node.
    ///
    /// Unfoldable nodes stay in the netlist and are reported again every
    /// round, so only the final round is meaningful.
    #[must_use]
    pub fn fold_errors(&self) -> Vec<&FoldError> {
        self.passes
            .iter()
            .filter(|p| p.round == self.rounds)
            .flat_map(|p| &p.fold_errors)
            .collect()
    }
}
