//! The `lsyn` command-line driver.
//!
//! Reads a Verilog-subset source or a netlist JSON file, runs the
//! optimization passes, maps the result onto a cell library and writes the
//! mapped netlist as JSON.

mod args;
mod pipeline;

pub use args::{Args, StrategyArg};
pub use pipeline::{
    CHECK_LIMIT, CliError, Compilation, InputFormat, check, compile_file, load_design, load_library, write,
};
