//! Optimization passes over the lsyn netlist IR.
//!
//! Four function-preserving rewrites are provided:
//! - [`strash`]: structural hashing, merging nodes with identical canonical
//!   signatures;
//! - [`constprop`]: constant folding and single-constant identities;
//! - [`dce`]: removal of logic no primary output depends on;
//! - [`balance`]: depth-minimal regrouping of AND/OR/XOR trees.
//!
//! [`PassManager`] runs them in the configured order, round after round,
//! until the netlist reaches a fixed point. Each pass is atomic: on failure
//! the netlist is restored to its state before that pass.

mod balance;
mod constprop;
mod dce;
mod driver;
mod error;
mod pass;
mod strash;

pub use balance::{Balance, Tree, balance, collect_tree, min_depth};
pub use constprop::{ConstProp, constprop};
pub use dce::{Dce, dce, live_nodes};
pub use driver::{PassManager, optimize, pass_for};
pub use error::{FoldError, OptError};
pub use pass::{OptReport, Pass, PassOutcome, PassReport};
pub use strash::{Signature, Strash, strash};
