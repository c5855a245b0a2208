//! Netlist intermediate representation for the lsyn compiler.
//!
//! A [`Netlist`] is an arena of [`Node`]s keyed by stable [`NodeId`]s plus a
//! signal-name → driver index. Nodes never point at each other; every fanin
//! is a signal name, so merging or removing nodes is a matter of rewriting
//! names rather than pointer surgery.
//!
//! Besides the storage layer this crate provides the graph utilities every
//! pass relies on (topological order, fanout index, structural validation),
//! a bit-accurate evaluator used to check function preservation, and the
//! JSON exchange schema shared with the front end and the backends.

mod bits;
mod error;
mod eval;
mod id;
mod index;
mod kind;
mod netlist;
mod node;
mod schema;
mod validate;
mod wire;

pub use bits::{MAX_WIDTH, mask};
pub use error::{EvalError, NetlistError, OpError};
pub use eval::{CellEvaluator, Counterexample, Evaluator, TruthTable, apply_op, check_equivalence};
pub use id::NodeId;
pub use index::FanoutIndex;
pub use kind::NodeKind;
pub use netlist::Netlist;
pub use node::{Fanin, Node};
pub use schema::{Attrs, NetlistRecord, NodeRecord};
pub use wire::{Wire, WireSink};
