//! The cell library catalog.

use std::collections::HashMap;
use std::path::Path;

use lsyn_netlist::{CellEvaluator, NodeKind, mask};
use tracing::{debug, info};

use crate::{CellRecord, LibraryCell, LibraryError, LibraryRecord, Pattern, lookup_key};

/// An immutable set of library cells indexed by the root of their function.
///
/// Cell order is significant: when two cells tie on the mapping objective the
/// earlier one wins.
#[derive(Debug, Clone)]
pub struct CellLibrary {
    name: String,
    cells: Vec<LibraryCell>,
    by_name: HashMap<String, usize>,
    by_root: HashMap<String, Vec<usize>>,
}

impl CellLibrary {
    /// Build a library from validated cells.
    ///
    /// # Errors
    ///
    /// [`LibraryError::DuplicateCell`] for repeated names and
    /// [`LibraryError::InvalidCell`] for names that collide with the generic
    /// node tags.
    pub fn new(name: impl Into<String>, cells: Vec<LibraryCell>) -> Result<Self, LibraryError> {
        let mut by_name = HashMap::new();
        let mut by_root: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, cell) in cells.iter().enumerate() {
            if NodeKind::is_reserved_tag(cell.name()) {
                return Err(LibraryError::invalid(cell.name(), "name collides with a generic node type"));
            }
            if by_name.insert(cell.name().to_string(), index).is_some() {
                return Err(LibraryError::DuplicateCell(cell.name().to_string()));
            }
            if let Some(key) = cell.function().root_key() {
                by_root.entry(key).or_default().push(index);
            }
        }
        let library = Self {
            name: name.into(),
            cells,
            by_name,
            by_root,
        };
        debug!("library '{}': {} cells", library.name, library.cells.len());
        Ok(library)
    }

    /// Build a library from its serialized form.
    ///
    /// # Errors
    ///
    /// The first invalid cell.
    pub fn from_record(record: LibraryRecord) -> Result<Self, LibraryError> {
        let cells = record
            .cells
            .into_iter()
            .map(LibraryCell::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(record.name, cells)
    }

    /// Parse a library from JSON text.
    ///
    /// # Errors
    ///
    /// JSON syntax errors and every validation error of
    /// [`CellLibrary::from_record`].
    pub fn from_json(text: &str) -> Result<Self, LibraryError> {
        let record: LibraryRecord = serde_json::from_str(text)?;
        Self::from_record(record)
    }

    /// Load a library file.
    ///
    /// # Errors
    ///
    /// I/O failures and everything [`CellLibrary::from_json`] rejects.
    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let text = std::fs::read_to_string(path).map_err(|source| LibraryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let library = Self::from_json(&text)?;
        info!("loaded library '{}' from {}", library.name, path.display());
        Ok(library)
    }

    /// Serialize back to the library schema.
    #[must_use]
    pub fn to_record(&self) -> LibraryRecord {
        LibraryRecord {
            name: self.name.clone(),
            cells: self.cells.iter().map(LibraryCell::to_record).collect(),
        }
    }

    /// Library name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All cells in library order.
    #[must_use]
    pub fn cells(&self) -> &[LibraryCell] {
        &self.cells
    }

    /// Cell by name.
    #[must_use]
    pub fn cell(&self, name: &str) -> Option<&LibraryCell> {
        self.by_name.get(name).map(|&i| &self.cells[i])
    }

    /// Cells whose function is rooted at `kind`, in library order.
    #[must_use]
    pub fn lookup(&self, kind: &NodeKind) -> Vec<&LibraryCell> {
        lookup_key(kind)
            .and_then(|key| self.by_root.get(&key))
            .map(|indices| indices.iter().map(|&i| &self.cells[i]).collect())
            .unwrap_or_default()
    }

    /// Area of cell `name`.
    #[must_use]
    pub fn area(&self, name: &str) -> Option<f64> {
        self.cell(name).map(LibraryCell::area)
    }

    /// Delay of cell `name` from `pin` to its output.
    #[must_use]
    pub fn delay(&self, name: &str, pin: &str) -> Option<f64> {
        self.cell(name).and_then(|c| c.delay(pin))
    }

    /// Built-in demonstration library covering every generic node kind.
    ///
    /// `AND2_LP` trades delay for area against `AND2_X1`, so the two mapping
    /// objectives pick different cells for the same AND gate.
    #[must_use]
    pub fn generic() -> Self {
        let cells = GENERIC_CELLS
            .iter()
            .filter_map(|&(name, function, inputs, area, delays)| {
                let record = generic_record(name, function, inputs, area, delays);
                LibraryCell::from_record(record).ok()
            })
            .collect();
        Self::new("generic", cells).unwrap_or_else(|_| Self {
            name: "generic".into(),
            cells: Vec::new(),
            by_name: HashMap::new(),
            by_root: HashMap::new(),
        })
    }
}

type GenericCell = (&'static str, &'static str, &'static [&'static str], f64, &'static [f64]);

/// name, function, input pins, area, per-pin delay (one entry = scalar).
const GENERIC_CELLS: &[GenericCell] = &[
    ("INV_X1", "NOT(A)", &["A"], 1.0, &[0.4]),
    ("BUF_X1", "BUF(A)", &["A"], 1.0, &[0.5]),
    ("AND2_X1", "AND(A,B)", &["A", "B"], 2.0, &[1.0]),
    ("AND2_LP", "AND(A,B)", &["A", "B"], 1.5, &[2.0]),
    ("OR2_X1", "OR(A,B)", &["A", "B"], 2.0, &[1.0]),
    ("XOR2_X1", "XOR(A,B)", &["A", "B"], 3.0, &[1.4]),
    ("NAND2_X1", "NAND(A,B)", &["A", "B"], 1.5, &[0.8]),
    ("NOR2_X1", "NOR(A,B)", &["A", "B"], 1.5, &[0.8]),
    ("AOI21_X1", "NOT(OR(AND(A,B),C))", &["A", "B", "C"], 2.5, &[1.2, 1.2, 0.9]),
    ("OAI21_X1", "NOT(AND(OR(A,B),C))", &["A", "B", "C"], 2.5, &[1.2, 1.2, 0.9]),
    ("NAND3_X1", "NAND(AND(A,B),C)", &["A", "B", "C"], 2.0, &[1.2]),
    ("AND3_X1", "AND(AND(A,B),C)", &["A", "B", "C"], 2.5, &[1.4]),
    ("MUX2_X1", "MUX(A,B,S)", &["A", "B", "S"], 3.5, &[1.2, 1.2, 1.5]),
    ("ADD_W", "ADD(A,B)", &["A", "B"], 8.0, &[4.0]),
    ("SUB_W", "SUB(A,B)", &["A", "B"], 9.0, &[4.5]),
    ("MUL_W", "MUL(A,B)", &["A", "B"], 30.0, &[10.0]),
    ("DIV_W", "DIV(A,B)", &["A", "B"], 45.0, &[16.0]),
    ("TIE", "CONST", &[], 0.5, &[0.0]),
];

fn generic_record(name: &str, function: &str, inputs: &[&str], area: f64, delays: &[f64]) -> CellRecord {
    use crate::{DelayModel, Pin};

    let delay = match delays {
        [d] => DelayModel::Scalar(*d),
        per_pin => DelayModel::PerPin(
            inputs
                .iter()
                .zip(per_pin)
                .map(|(pin, d)| ((*pin).to_string(), *d))
                .collect(),
        ),
    };
    CellRecord {
        name: name.to_string(),
        function: function.to_string(),
        pins: inputs
            .iter()
            .map(|p| Pin::input(*p))
            .chain(std::iter::once(Pin::output("Y")))
            .collect(),
        area,
        delay,
    }
}

impl CellEvaluator for CellLibrary {
    fn eval_cell(&self, name: &str, init: Option<u64>, operands: &[u64], width: u32) -> Option<u64> {
        let cell = self.cell(name)?;
        if operands.len() != cell.inputs().len() {
            return None;
        }
        if *cell.function() == Pattern::Const {
            return Some(init.unwrap_or(0) & mask(width));
        }
        let bindings = cell
            .inputs()
            .iter()
            .map(String::as_str)
            .zip(operands.iter().copied())
            .collect();
        cell.function().eval(&bindings, init, width)
    }
}
