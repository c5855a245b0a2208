//! Bit-accurate simulation of a netlist.
//!
//! Every signal value is a `u64` masked to the signal's width. Operands are
//! zero-extended to the output width of the node reading them; arithmetic
//! wraps at that width. An inverted fanin contributes the complement of the
//! source masked to the *source* width.

use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::trace;

use crate::{EvalError, Netlist, NodeId, NodeKind, OpError, mask};

/// Apply the built-in function of `kind` to already-resolved operands.
///
/// `operands` are in fanin order; the result is masked to `width`.
///
/// # Errors
///
/// [`OpError::DivByZero`] for a zero divisor, [`OpError::Opaque`] for module
/// instances and library cells.
pub fn apply_op(kind: &NodeKind, operands: &[u64], width: u32) -> Result<u64, OpError> {
    let m = mask(width);
    let arg = |i: usize| operands.get(i).copied().unwrap_or(0) & m;
    let value = match kind {
        NodeKind::And => arg(0) & arg(1),
        NodeKind::Or => arg(0) | arg(1),
        NodeKind::Xor => arg(0) ^ arg(1),
        NodeKind::Nand => !(arg(0) & arg(1)),
        NodeKind::Nor => !(arg(0) | arg(1)),
        NodeKind::Not => !arg(0),
        NodeKind::Buf => arg(0),
        NodeKind::Add => arg(0).wrapping_add(arg(1)),
        NodeKind::Sub => arg(0).wrapping_sub(arg(1)),
        NodeKind::Mul => arg(0).wrapping_mul(arg(1)),
        NodeKind::Div => {
            // The quotient of the full operand values; only the result is truncated.
            let dividend = operands.first().copied().unwrap_or(0);
            let divisor = operands.get(1).copied().unwrap_or(0);
            if divisor == 0 {
                return Err(OpError::DivByZero);
            }
            dividend / divisor
        }
        NodeKind::Mux => {
            // The select is tested on its full value, not the truncated one.
            if operands.get(2).copied().unwrap_or(0) != 0 {
                arg(1)
            } else {
                arg(0)
            }
        }
        NodeKind::Const(value) => *value,
        NodeKind::Module(_) | NodeKind::Cell { .. } => return Err(OpError::Opaque),
    };
    Ok(value & m)
}

/// Supplies the function of library cells so mapped netlists can be
/// simulated.
pub trait CellEvaluator: Send + Sync {
    /// Evaluate cell `name` on operands given in fanin order.
    ///
    /// Returns `None` when the cell is unknown or has no evaluable function.
    fn eval_cell(&self, name: &str, init: Option<u64>, operands: &[u64], width: u32) -> Option<u64>;
}

/// Simulator bound to one netlist.
pub struct Evaluator<'a> {
    netlist: &'a Netlist,
    order: Vec<NodeId>,
    cells: Option<&'a dyn CellEvaluator>,
}

impl<'a> Evaluator<'a> {
    /// Prepare `netlist` for simulation.
    ///
    /// # Errors
    ///
    /// Fails when the netlist has a combinational cycle.
    pub fn new(netlist: &'a Netlist) -> Result<Self, EvalError> {
        Ok(Self {
            netlist,
            order: netlist.topo_order()?,
            cells: None,
        })
    }

    /// Use `cells` to evaluate library-cell instances.
    #[must_use]
    pub fn with_cells(mut self, cells: &'a dyn CellEvaluator) -> Self {
        self.cells = Some(cells);
        self
    }

    /// The simulated netlist.
    #[must_use]
    pub const fn netlist(&self) -> &'a Netlist {
        self.netlist
    }

    /// Values of every signal for one input assignment.
    ///
    /// # Errors
    ///
    /// Fails on a missing input value or a node that cannot be evaluated.
    pub fn simulate(&self, inputs: &HashMap<String, u64>) -> Result<HashMap<String, u64>, EvalError> {
        let mut values: HashMap<String, u64> = HashMap::new();
        for input in self.netlist.inputs() {
            let value = inputs
                .get(input)
                .ok_or_else(|| EvalError::MissingInput(input.clone()))?;
            values.insert(input.clone(), value & mask(self.netlist.width(input)));
        }

        for &id in &self.order {
            let Some(node) = self.netlist.node(id) else { continue };
            let width = self.netlist.width(&node.output);
            let operands: Vec<u64> = node
                .fanins
                .iter()
                .map(|f| {
                    let value = values.get(&f.signal).copied().unwrap_or(0);
                    if f.inverted {
                        !value & mask(self.netlist.width(&f.signal))
                    } else {
                        value
                    }
                })
                .collect();

            let value = match apply_op(&node.kind, &operands, width) {
                Ok(value) => value,
                Err(OpError::DivByZero) => 0,
                Err(OpError::Opaque) => {
                    let opaque = || EvalError::Opaque {
                        node: id,
                        kind: node.kind.to_string(),
                    };
                    match (&node.kind, self.cells) {
                        (NodeKind::Cell { name, init }, Some(cells)) => cells
                            .eval_cell(name, *init, &operands, width)
                            .ok_or_else(opaque)?,
                        _ => return Err(opaque()),
                    }
                }
            };
            trace!("{id} {} = {value}", node.output);
            values.insert(node.output.clone(), value & mask(width));
        }
        Ok(values)
    }

    /// Values of the primary outputs, in output order.
    ///
    /// # Errors
    ///
    /// See [`Evaluator::simulate`].
    pub fn evaluate(&self, inputs: &HashMap<String, u64>) -> Result<IndexMap<String, u64>, EvalError> {
        let values = self.simulate(inputs)?;
        Ok(self
            .netlist
            .outputs()
            .iter()
            .map(|o| (o.clone(), values.get(o).copied().unwrap_or(0)))
            .collect())
    }

    /// Total number of primary-input bits.
    #[must_use]
    pub fn input_bits(&self) -> u32 {
        self.netlist.inputs().iter().map(|i| self.netlist.width(i)).sum()
    }

    /// Split an assignment index into per-input values; the first input
    /// occupies the least significant bits.
    #[must_use]
    pub fn assignment(&self, index: u64) -> HashMap<String, u64> {
        let mut shift = 0;
        let mut values = HashMap::new();
        for input in self.netlist.inputs() {
            let width = self.netlist.width(input);
            let value = if shift >= 64 { 0 } else { (index >> shift) & mask(width) };
            values.insert(input.clone(), value);
            shift += width;
        }
        values
    }

    /// Evaluate every input assignment.
    ///
    /// # Errors
    ///
    /// [`EvalError::TooWide`] when the design has more than `limit` input
    /// bits, otherwise any simulation error.
    pub fn truth_table(&self, limit: u32) -> Result<TruthTable, EvalError> {
        let bits = self.input_bits();
        if bits > limit || bits >= 64 {
            return Err(EvalError::TooWide { bits, limit });
        }
        let rows = (0..1u64 << bits)
            .map(|index| {
                let outputs = self.evaluate(&self.assignment(index))?;
                Ok(outputs.into_values().collect())
            })
            .collect::<Result<Vec<Vec<u64>>, EvalError>>()?;
        Ok(TruthTable {
            inputs: self
                .netlist
                .inputs()
                .iter()
                .map(|i| (i.clone(), self.netlist.width(i)))
                .collect(),
            outputs: self.netlist.outputs().to_vec(),
            rows,
        })
    }
}

/// Output values for every input assignment of a netlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruthTable {
    /// Input names and widths; assignment bits are packed in this order.
    pub inputs: Vec<(String, u32)>,
    /// Output names; every row lists values in this order.
    pub outputs: Vec<String>,
    /// One row per assignment index.
    pub rows: Vec<Vec<u64>>,
}

impl TruthTable {
    /// Output values for assignment `index`.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[u64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Value of output `name` for assignment `index`.
    #[must_use]
    pub fn output(&self, index: usize, name: &str) -> Option<u64> {
        let column = self.outputs.iter().position(|o| o == name)?;
        self.row(index)?.get(column).copied()
    }
}

/// An input assignment on which two netlists disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterexample {
    /// The distinguishing assignment.
    pub inputs: IndexMap<String, u64>,
    /// First output that differs.
    pub output: String,
    /// Value produced by the reference netlist.
    pub expected: u64,
    /// Value produced by the candidate netlist.
    pub actual: u64,
}

/// Exhaustively compare two netlists with identical ports.
///
/// Returns `Ok(None)` when they agree on every assignment.
///
/// # Errors
///
/// [`EvalError::PortMismatch`] when the port lists differ, otherwise any
/// simulation error.
pub fn check_equivalence(
    reference: &Evaluator<'_>,
    candidate: &Evaluator<'_>,
    limit: u32,
) -> Result<Option<Counterexample>, EvalError> {
    let (a, b) = (reference.netlist(), candidate.netlist());
    for input in a.inputs() {
        if !b.is_input(input) || a.width(input) != b.width(input) {
            return Err(EvalError::PortMismatch(format!("input '{input}'")));
        }
    }
    if a.inputs().len() != b.inputs().len() {
        return Err(EvalError::PortMismatch("input count".into()));
    }
    for output in a.outputs() {
        if !b.is_output(output) {
            return Err(EvalError::PortMismatch(format!("output '{output}'")));
        }
    }

    let bits = reference.input_bits();
    if bits > limit || bits >= 64 {
        return Err(EvalError::TooWide { bits, limit });
    }
    for index in 0..1u64 << bits {
        let assignment = reference.assignment(index);
        let expected = reference.evaluate(&assignment)?;
        let actual = candidate.evaluate(&assignment)?;
        for (output, &want) in &expected {
            let got = actual.get(output).copied().unwrap_or(0);
            if got != want {
                let inputs = a
                    .inputs()
                    .iter()
                    .map(|i| (i.clone(), assignment.get(i).copied().unwrap_or(0)))
                    .collect();
                return Ok(Some(Counterexample {
                    inputs,
                    output: output.clone(),
                    expected: want,
                    actual: got,
                }));
            }
        }
    }
    Ok(None)
}
