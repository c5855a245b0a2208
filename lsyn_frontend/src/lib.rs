//! Verilog-subset front end for the lsyn compiler.
//!
//! Source text goes through three stages: [`lexer`] turns it into tokens,
//! [`parse`] builds a [`SourceFile`] of modules, and [`elaborate`] flattens
//! the hierarchy below the top module into a single generic [`Netlist`].
//! [`compile`] chains the three.
//!
//! The accepted language is the synthesizable combinational core: ANSI and
//! non-ANSI port lists, `wire` declarations with `[N:0]` ranges, continuous
//! assignments, module and gate-primitive instances. Anything else is
//! reported as [`FrontendError::Unsupported`] with its position.

pub mod ast;
mod error;
pub mod lexer;
mod lower;
mod parser;

pub use ast::SourceFile;
pub use error::FrontendError;
pub use lexer::Pos;
pub use lower::{elaborate, find_top};
pub use parser::parse;

use lsyn_netlist::Netlist;
use tracing::info;

/// Parse `source` and elaborate `top` (inferred when `None`).
///
/// # Errors
///
/// The first lexical, syntax or semantic error, or a structural error of
/// the lowered netlist.
pub fn compile(source: &str, top: Option<&str>) -> Result<Netlist, FrontendError> {
    let file = parse(source)?;
    info!("parsed {} module(s)", file.modules.len());
    elaborate(&file, top)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_reports_syntax_errors() {
        let err = compile("module m(input a, output y); assign y = ; endmodule", None).unwrap_err();
        assert!(matches!(err, FrontendError::Syntax { line: 1, .. }), "{err}");
    }

    #[test]
    fn compile_single_module() {
        let netlist = compile("module m(input a, output y); assign y = ~a; endmodule", None).unwrap();
        assert_eq!(netlist.name(), "m");
        assert_eq!(netlist.inputs(), ["a"]);
        assert_eq!(netlist.outputs(), ["y"]);
        assert_eq!(netlist.node_count(), 1);
    }
}
