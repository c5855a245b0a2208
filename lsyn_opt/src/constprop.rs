//! Constant propagation: fold nodes with constant operands and apply the
//! algebraic identities of a single constant operand.
//!
//! Rewrites happen in place, so a folded node keeps its id and output name
//! and consumers see the constant without any redirection.

use indexmap::IndexMap;
use lsyn_common::PassKind;
use lsyn_netlist::{Fanin, Netlist, NetlistError, Node, NodeId, NodeKind, OpError, apply_op, mask};
use tracing::{debug, trace, warn};

use crate::{FoldError, OptError, Pass, PassOutcome};

/// The constant propagation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstProp;

impl Pass for ConstProp {
    fn kind(&self) -> PassKind {
        PassKind::ConstProp
    }

    fn run(&self, netlist: &mut Netlist, strict: bool) -> Result<PassOutcome, OptError> {
        constprop(netlist, strict)
    }
}

/// Result of folding one node.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Fold {
    /// Nothing to do.
    Keep,
    /// Rewrite the node.
    Rewrite(NodeKind, Vec<Fanin>),
    /// The fold is undefined.
    Error,
}

/// Value seen through `fanin` when its driver is a constant.
fn const_operand(netlist: &Netlist, fanin: &Fanin) -> Option<u64> {
    let value = netlist.driver_node(&fanin.signal)?.kind.const_value()?;
    let m = mask(netlist.width(&fanin.signal));
    Some(if fanin.inverted { !value & m } else { value & m })
}

/// The single constant operand of a two-input node, with the other fanin.
fn split_const<'a>(fanins: &'a [Fanin], operands: &[Option<u64>]) -> Option<(u64, &'a Fanin)> {
    match (operands, fanins) {
        ([Some(c), None], [_, x]) | ([None, Some(c)], [x, _]) => Some((*c, x)),
        _ => None,
    }
}

fn constant(value: u64) -> Fold {
    Fold::Rewrite(NodeKind::Const(value), Vec::new())
}

fn unary(kind: NodeKind, fanin: &Fanin) -> Fold {
    Fold::Rewrite(kind, vec![fanin.clone()])
}

fn fold(node: &Node, operands: &[Option<u64>], width: u32) -> Fold {
    let m = mask(width);
    let fanins = node.fanins.as_slice();

    if !fanins.is_empty() && node.kind.is_generic() && operands.iter().all(Option::is_some) {
        let values: Vec<u64> = operands.iter().flatten().copied().collect();
        return match apply_op(&node.kind, &values, width) {
            Ok(value) => constant(value),
            Err(OpError::DivByZero) => Fold::Error,
            Err(OpError::Opaque) => Fold::Keep,
        };
    }

    match node.kind {
        NodeKind::And | NodeKind::Or | NodeKind::Xor | NodeKind::Nand | NodeKind::Nor | NodeKind::Add | NodeKind::Mul => {
            let Some((c, x)) = split_const(fanins, operands) else {
                return Fold::Keep;
            };
            let c = c & m;
            let (zero, ones) = (c == 0, c == m);
            match node.kind {
                NodeKind::And if zero => constant(0),
                NodeKind::And if ones => unary(NodeKind::Buf, x),
                NodeKind::Or if ones => constant(m),
                NodeKind::Or | NodeKind::Xor | NodeKind::Add if zero => unary(NodeKind::Buf, x),
                NodeKind::Xor | NodeKind::Nand if ones => unary(NodeKind::Not, x),
                NodeKind::Nand if zero => constant(m),
                NodeKind::Nor if ones => constant(0),
                NodeKind::Nor if zero => unary(NodeKind::Not, x),
                NodeKind::Mul if zero => constant(0),
                NodeKind::Mul if c == 1 => unary(NodeKind::Buf, x),
                _ => Fold::Keep,
            }
        }
        NodeKind::Sub => match (fanins, operands) {
            ([x, _], [None, Some(c)]) if c & m == 0 => unary(NodeKind::Buf, x),
            _ => Fold::Keep,
        },
        NodeKind::Div => match (fanins, operands) {
            (_, [_, Some(0)]) => Fold::Error,
            ([x, _], [None, Some(1)]) => unary(NodeKind::Buf, x),
            _ => Fold::Keep,
        },
        NodeKind::Mux => match (fanins, operands) {
            ([d0, d1, _], [_, _, Some(select)]) => unary(NodeKind::Buf, if *select != 0 { d1 } else { d0 }),
            ([d0, d1, _], _) if d0 == d1 => unary(NodeKind::Buf, d0),
            _ => Fold::Keep,
        },
        NodeKind::Not
        | NodeKind::Buf
        | NodeKind::Const(_)
        | NodeKind::Module(_)
        | NodeKind::Cell { .. } => Fold::Keep,
    }
}

/// One topological sweep. Folds cascade within the sweep because operands
/// are read after earlier nodes were rewritten.
fn sweep(
    netlist: &mut Netlist,
    strict: bool,
    errors: &mut IndexMap<NodeId, FoldError>,
) -> Result<usize, OptError> {
    let structural = OptError::structural(PassKind::ConstProp);
    let order = netlist.topo_order().map_err(&structural)?;
    let mut rewrites = 0;
    for id in order {
        let node = netlist
            .node(id)
            .cloned()
            .ok_or(NetlistError::UnknownNode(id))
            .map_err(&structural)?;
        let operands: Vec<Option<u64>> = node.fanins.iter().map(|f| const_operand(netlist, f)).collect();
        match fold(&node, &operands, netlist.width(&node.output)) {
            Fold::Keep => {}
            Fold::Rewrite(kind, fanins) => {
                if kind == node.kind && fanins == node.fanins {
                    continue;
                }
                trace!("constprop: {id} {} -> {kind}", node.kind);
                netlist.replace_node(id, kind, fanins).map_err(&structural)?;
                rewrites += 1;
            }
            Fold::Error => {
                let error = FoldError {
                    node: id,
                    op: node.kind.tag().to_string(),
                    operands,
                };
                if strict {
                    return Err(error.into());
                }
                if !errors.contains_key(&id) {
                    warn!("{error}; node left unfolded");
                }
                errors.insert(id, error);
            }
        }
    }
    Ok(rewrites)
}

/// Fold constants to a fixed point.
///
/// # Errors
///
/// Structural errors, and the first [`FoldError`] when `strict` is set.
pub fn constprop(netlist: &mut Netlist, strict: bool) -> Result<PassOutcome, OptError> {
    let mut errors = IndexMap::new();
    let mut changes = 0;
    loop {
        let rewrites = sweep(netlist, strict, &mut errors)?;
        if rewrites == 0 {
            break;
        }
        debug!("constprop sweep rewrote {rewrites} nodes");
        changes += rewrites;
    }
    Ok(PassOutcome {
        changes,
        fold_errors: errors.into_values().collect(),
    })
}
