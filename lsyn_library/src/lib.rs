//! Standard-cell library catalog.
//!
//! A [`CellLibrary`] is an immutable list of [`LibraryCell`]s. Each cell
//! carries a function [`Pattern`] over the generic node kinds, its pins, an
//! area and a pin-to-output delay model. The technology mapper covers the
//! subject graph with these patterns; the library also implements
//! [`lsyn_netlist::CellEvaluator`] so mapped netlists can be simulated.

mod cell;
mod error;
mod library;
mod pattern;

pub use cell::{CellRecord, DelayModel, LibraryCell, LibraryRecord, Pin, PinDirection};
pub use error::LibraryError;
pub use library::CellLibrary;
pub use pattern::{Pattern, PatternError, lookup_key};
