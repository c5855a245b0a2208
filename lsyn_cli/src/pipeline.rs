//! The compile pipeline behind the `lsyn` command.

use std::path::{Path, PathBuf};

use lsyn_common::Config;
use lsyn_frontend::FrontendError;
use lsyn_library::{CellLibrary, LibraryError};
use lsyn_netlist::{CellEvaluator, EvalError, Evaluator, Netlist, NetlistError, check_equivalence};
use lsyn_opt::{OptError, OptReport, optimize};
use lsyn_techmap::{MapError, MappingResult, map};
use thiserror::Error;
use tracing::{info, warn};

/// Largest number of primary-input bits `--check` simulates exhaustively.
pub const CHECK_LIMIT: u32 = 16;

/// Errors of a compile run.
#[derive(Debug, Error)]
pub enum CliError {
    /// Reading or writing a file failed.
    #[error("{}: {source}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The input is neither Verilog nor netlist JSON.
    #[error("{}: expected a .v or .json file", .0.display())]
    UnknownFormat(PathBuf),

    /// Verilog parsing or elaboration failed.
    #[error(transparent)]
    Frontend(#[from] FrontendError),

    /// The design is structurally invalid or malformed JSON.
    #[error(transparent)]
    Netlist(#[from] NetlistError),

    /// An optimization pass failed.
    #[error(transparent)]
    Opt(#[from] OptError),

    /// The cell library could not be loaded.
    #[error(transparent)]
    Library(#[from] LibraryError),

    /// Technology mapping failed.
    #[error(transparent)]
    Map(#[from] MapError),

    /// Simulation failed during the equivalence check.
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// Serializing a netlist failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A stage changed the function of the design.
    #[error("{stage} changed output '{output}': expected {expected}, got {actual} for {inputs}")]
    Mismatch {
        /// Stage whose result differs from the source.
        stage: &'static str,
        /// First differing output.
        output: String,
        /// Value computed by the source design.
        expected: u64,
        /// Value computed after the stage.
        actual: u64,
        /// The distinguishing input assignment.
        inputs: String,
    },
}

/// Input file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Verilog-subset source.
    Verilog,
    /// Netlist exchange JSON.
    Json,
}

impl InputFormat {
    /// Format implied by the file extension.
    ///
    /// # Errors
    ///
    /// [`CliError::UnknownFormat`] for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, CliError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("v") => Ok(Self::Verilog),
            Some("json") => Ok(Self::Json),
            _ => Err(CliError::UnknownFormat(path.to_path_buf())),
        }
    }
}

/// Read `path` as text.
fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `text` to `path`.
///
/// # Errors
///
/// [`CliError::Io`] naming the file.
pub fn write(path: &Path, text: &str) -> Result<(), CliError> {
    std::fs::write(path, text).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a design, elaborating `top` when it is Verilog.
///
/// # Errors
///
/// I/O, front-end and schema errors.
pub fn load_design(path: &Path, top: Option<&str>) -> Result<Netlist, CliError> {
    let format = InputFormat::from_path(path)?;
    let text = read(path)?;
    let netlist = match format {
        InputFormat::Verilog => lsyn_frontend::compile(&text, top)?,
        InputFormat::Json => Netlist::from_json(&text)?,
    };
    info!(
        "loaded '{}' from {}: {} inputs, {} outputs, {} nodes",
        netlist.name(),
        path.display(),
        netlist.inputs().len(),
        netlist.outputs().len(),
        netlist.node_count()
    );
    Ok(netlist)
}

/// The configured library, or the built-in generic one.
///
/// # Errors
///
/// Library loading and validation errors.
pub fn load_library(config: &Config) -> Result<CellLibrary, CliError> {
    Ok(match &config.library {
        Some(path) => CellLibrary::load(path)?,
        None => CellLibrary::generic(),
    })
}

/// Everything one run produces.
#[derive(Debug)]
pub struct Compilation {
    /// The design as loaded.
    pub source: Netlist,
    /// The design after optimization (a copy of `source` with `--no-opt`).
    pub optimized: Netlist,
    /// Optimization driver report, when the passes ran.
    pub report: Option<OptReport>,
    /// Library the design was mapped onto.
    pub library: CellLibrary,
    /// Mapped design and its figures.
    pub mapping: MappingResult,
}

/// Load, optimize and map the design at `input`.
///
/// The library is loaded first, so a bad library is reported before any
/// design work.
///
/// # Errors
///
/// The first failing stage.
pub fn compile_file(config: &Config, input: &Path) -> Result<Compilation, CliError> {
    let library = load_library(config)?;
    let source = load_design(input, config.top.as_deref())?;

    let mut optimized = source.clone();
    let report = if config.optimize {
        Some(optimize(&mut optimized, &config.opt)?)
    } else {
        None
    };
    let mapping = map(&optimized, &library, config.strategy)?;

    Ok(Compilation {
        source,
        optimized,
        report,
        library,
        mapping,
    })
}

/// Compare two netlists on every input assignment. `Ok(false)` means the
/// comparison was skipped.
fn compare(
    stage: &'static str,
    reference: &Netlist,
    candidate: &Netlist,
    cells: &dyn CellEvaluator,
) -> Result<bool, CliError> {
    let lhs = Evaluator::new(reference)?.with_cells(cells);
    let rhs = Evaluator::new(candidate)?.with_cells(cells);
    match check_equivalence(&lhs, &rhs, CHECK_LIMIT) {
        Ok(None) => {
            info!("{stage}: equivalent");
            Ok(true)
        }
        Ok(Some(cex)) => Err(CliError::Mismatch {
            stage,
            output: cex.output,
            expected: cex.expected,
            actual: cex.actual,
            inputs: format!("{:?}", cex.inputs),
        }),
        Err(e @ (EvalError::TooWide { .. } | EvalError::Opaque { .. })) => {
            warn!("{stage}: equivalence check skipped: {e}");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Check that optimization and mapping preserved the function of the
/// source design. Returns whether every comparison ran.
///
/// # Errors
///
/// [`CliError::Mismatch`] for the first stage that changed an output.
pub fn check(compilation: &Compilation) -> Result<bool, CliError> {
    let optimized = compare(
        "optimization",
        &compilation.source,
        &compilation.optimized,
        &compilation.library,
    )?;
    let mapped = compare(
        "mapping",
        &compilation.source,
        &compilation.mapping.netlist,
        &compilation.library,
    )?;
    Ok(optimized && mapped)
}
