//! JSON exchange schema.
//!
//! The record types mirror the on-disk layout one to one; conversion to and
//! from [`Netlist`] is where the IR invariants get enforced.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Fanin, NetlistError, Netlist, NodeId, NodeKind, Wire};

/// Ids may exceed the node count by this much before a record is renumbered.
const SPARSE_ID_SLACK: usize = 1024;

/// Top-level exchange record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetlistRecord {
    /// Module name.
    pub name: String,
    /// Primary inputs in order.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Primary outputs in order.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Nodes keyed by `n<index>`.
    #[serde(default)]
    pub nodes: IndexMap<NodeId, NodeRecord>,
    /// Explicit wires; derived from fanins when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wires: Option<Vec<Wire>>,
    /// Auxiliary attributes.
    #[serde(default)]
    pub attrs: Attrs,
}

/// One node of the exchange record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Generic tag, `CONST`, `MODULE`, or a library cell name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Ordered inputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fanins: Vec<Fanin>,
    /// Driven signal.
    pub output: String,
    /// Literal of a `CONST` node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
    /// Module name of a `MODULE` node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Literal driven by a tie cell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<u64>,
}

/// Attributes carried next to the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attrs {
    /// Declared signal widths; absent signals are 1 bit wide.
    #[serde(default)]
    pub vector_widths: IndexMap<String, u32>,
}

impl NodeRecord {
    /// Decode the type tag and its payload into a [`NodeKind`].
    fn node_kind(&self, id: NodeId) -> Result<NodeKind, NetlistError> {
        let missing = |field: &str| NetlistError::Schema(format!("node {id} ({}) has no '{field}' field", self.kind));
        if let Some(kind) = NodeKind::from_generic_tag(&self.kind) {
            return Ok(kind);
        }
        match self.kind.as_str() {
            NodeKind::CONST_TAG => Ok(NodeKind::Const(self.value.ok_or_else(|| missing("value"))?)),
            NodeKind::MODULE_TAG => Ok(NodeKind::Module(self.module.clone().ok_or_else(|| missing("module"))?)),
            "" => Err(NetlistError::Schema(format!("node {id} has an empty type"))),
            cell => Ok(NodeKind::Cell {
                name: cell.to_string(),
                init: self.init,
            }),
        }
    }
}

impl From<&Netlist> for NetlistRecord {
    fn from(netlist: &Netlist) -> Self {
        let nodes = netlist
            .nodes()
            .map(|node| {
                let (value, module, init) = match &node.kind {
                    NodeKind::Const(value) => (Some(*value), None, None),
                    NodeKind::Module(name) => (None, Some(name.clone()), None),
                    NodeKind::Cell { init, .. } => (None, None, *init),
                    _ => (None, None, None),
                };
                let record = NodeRecord {
                    kind: node.kind.tag().to_string(),
                    fanins: node.fanins.clone(),
                    output: node.output.clone(),
                    value,
                    module,
                    init,
                };
                (node.id, record)
            })
            .collect();
        Self {
            name: netlist.name().to_string(),
            inputs: netlist.inputs().to_vec(),
            outputs: netlist.outputs().to_vec(),
            nodes,
            wires: Some(netlist.derive_wires()),
            attrs: Attrs {
                vector_widths: netlist.widths().clone(),
            },
        }
    }
}

impl TryFrom<NetlistRecord> for Netlist {
    type Error = NetlistError;

    fn try_from(record: NetlistRecord) -> Result<Self, Self::Error> {
        let mut netlist = Self::new(record.name);
        for (signal, width) in record.attrs.vector_widths {
            netlist.declare_width(signal, width)?;
        }
        for input in record.inputs {
            let width = netlist.width(&input);
            netlist.add_input(input, width)?;
        }
        for output in record.outputs {
            let width = netlist.width(&output);
            netlist.add_output(output, width)?;
        }

        // The arena is indexed by id, so far-apart ids are packed densely.
        let limit = record.nodes.len() + SPARSE_ID_SLACK;
        let renumber: HashMap<NodeId, NodeId> = if record.nodes.keys().any(|id| id.as_usize() >= limit) {
            debug!("renumbering {} sparse node ids", record.nodes.len());
            record
                .nodes
                .keys()
                .enumerate()
                .map(|(index, &id)| (id, NodeId::from(index)))
                .collect()
        } else {
            HashMap::new()
        };
        let remap = |id: NodeId| renumber.get(&id).copied().unwrap_or(id);

        for (id, node) in record.nodes {
            let kind = node.node_kind(id)?;
            netlist.insert_node(remap(id), kind, node.fanins, node.output)?;
        }
        match record.wires {
            Some(mut wires) => {
                for wire in &mut wires {
                    wire.sink.node = remap(wire.sink.node);
                }
                netlist.set_wires(wires);
                netlist.check_wires()?;
            }
            None => netlist.rebuild_wires(),
        }
        Ok(netlist)
    }
}

impl Netlist {
    /// Serialize to the exchange schema as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` failures.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&NetlistRecord::from(self))
    }

    /// Parse the exchange schema.
    ///
    /// # Errors
    ///
    /// [`NetlistError::Schema`] for malformed JSON, otherwise the first
    /// structural error found while rebuilding the netlist.
    pub fn from_json(text: &str) -> Result<Self, NetlistError> {
        let record: NetlistRecord =
            serde_json::from_str(text).map_err(|e| NetlistError::Schema(e.to_string()))?;
        Self::try_from(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "top",
        "inputs": ["a", "b"],
        "outputs": ["y", "k"],
        "nodes": {
            "n0": { "type": "AND", "fanins": [{"signal": "a"}, {"signal": "b", "inverted": true}], "output": "t" },
            "n1": { "type": "CONST", "value": 5, "output": "k" },
            "n3": { "type": "MODULE", "module": "blackbox", "fanins": [{"signal": "t"}], "output": "y" }
        },
        "attrs": { "vector_widths": { "k": 3 } }
    }"#;

    #[test]
    fn import_sample() {
        let n = Netlist::from_json(SAMPLE).unwrap();
        assert_eq!(n.node_count(), 3);
        assert_eq!(n.driver("y"), Some(NodeId::new(3)));
        assert_eq!(n.width("k"), 3);
        assert_eq!(n.width("a"), 1);
        assert_eq!(n.wires().len(), 3);
        assert_eq!(
            n.node(NodeId::new(3)).unwrap().kind,
            NodeKind::Module("blackbox".into())
        );
        n.validate().unwrap();
    }

    #[test]
    fn export_import_export_is_stable() {
        let n = Netlist::from_json(SAMPLE).unwrap();
        let first = n.to_json().unwrap();
        let again = Netlist::from_json(&first).unwrap();
        assert_eq!(first, again.to_json().unwrap());
        assert!(first.contains("\"n3\""));
    }

    #[test]
    fn inconsistent_wires_are_rejected() {
        let text = SAMPLE.replace(
            "\"attrs\"",
            "\"wires\": [{\"source\": \"a\", \"sink\": {\"node\": \"n0\", \"port\": 1}}], \"attrs\"",
        );
        assert!(matches!(
            Netlist::from_json(&text),
            Err(NetlistError::InconsistentWires(_))
        ));
    }

    #[test]
    fn malformed_records() {
        let no_value = r#"{"name": "x", "outputs": ["k"], "nodes": {"n0": {"type": "CONST", "output": "k"}}}"#;
        assert!(matches!(Netlist::from_json(no_value), Err(NetlistError::Schema(_))));
        let bad_key = r#"{"name": "x", "nodes": {"zz": {"type": "BUF", "output": "k"}}}"#;
        assert!(matches!(Netlist::from_json(bad_key), Err(NetlistError::Schema(_))));
        let arity = r#"{"name": "x", "nodes": {"n0": {"type": "BUF", "output": "k"}}}"#;
        assert!(matches!(Netlist::from_json(arity), Err(NetlistError::Arity { .. })));
    }

    #[test]
    fn huge_ids_are_renumbered() {
        let text = r#"{"name": "x", "inputs": ["a"], "outputs": ["k", "y"], "nodes": {
            "n200000000": {"type": "CONST", "value": 1, "output": "k"},
            "n4294967295": {"type": "NOT", "fanins": [{"signal": "a"}], "output": "y"}
        }, "wires": [{"source": "a", "sink": {"node": "n4294967295", "port": 0}}]}"#;
        let n = Netlist::from_json(text).unwrap();
        assert_eq!(n.node_count(), 2);
        assert_eq!(n.driver("k"), Some(NodeId::new(0)));
        assert_eq!(n.driver("y"), Some(NodeId::new(1)));
        assert_eq!(n.wires(), &[Wire::new("a", NodeId::new(1), 0)]);
        n.validate().unwrap();
    }

    #[test]
    fn moderately_sparse_ids_are_kept() {
        let text = r#"{"name": "x", "outputs": ["k"], "nodes": {"n900": {"type": "CONST", "value": 1, "output": "k"}}}"#;
        let n = Netlist::from_json(text).unwrap();
        assert_eq!(n.driver("k"), Some(NodeId::new(900)));
    }

    #[test]
    fn cells_keep_their_init() {
        let text = r#"{"name": "x", "outputs": ["z"], "nodes": {"n0": {"type": "TIE", "init": 0, "output": "z"}}}"#;
        let n = Netlist::from_json(text).unwrap();
        assert_eq!(
            n.node(NodeId::new(0)).unwrap().kind,
            NodeKind::Cell {
                name: "TIE".into(),
                init: Some(0)
            }
        );
        assert!(n.to_json().unwrap().contains("\"init\": 0"));
    }
}
