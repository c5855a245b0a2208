#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use std::collections::HashMap;
use std::sync::OnceLock;

use indexmap::IndexMap;
use lsyn_common::{ALL_TEST_CIRCUITS, MapStrategy, OptConfig, test_circuit};
use lsyn_frontend::compile;
use lsyn_library::{CellLibrary, CellRecord, DelayModel, Pin};
use lsyn_netlist::{Evaluator, Fanin, Netlist, NodeId, NodeKind, check_equivalence};
use lsyn_opt::optimize;
use lsyn_techmap::{MapError, Match, Subject, area_optimal, delay_optimal, enumerate_matches, map};
use rstest::rstest;

const EPSILON: f64 = 1e-9;

fn init_test_logger() {
    static INIT: OnceLock<()> = OnceLock::new();
    let _ = INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn optimized(name: &str) -> Netlist {
    let tc = test_circuit(name);
    let mut netlist = compile(tc.source, Some(tc.top)).unwrap();
    optimize(&mut netlist, &OptConfig::default()).unwrap();
    netlist
}

fn assert_mapped_equivalent(reference: &Netlist, mapped: &Netlist, library: &CellLibrary) {
    let lhs = Evaluator::new(reference).unwrap();
    let rhs = Evaluator::new(mapped).unwrap().with_cells(library);
    let mismatch = check_equivalence(&lhs, &rhs, 16).unwrap();
    assert!(mismatch.is_none(), "{}: {mismatch:?}", reference.name());
}

/// Smallest total area over every legal cover, found by trying every
/// combination of matches for the signals the outputs require.
fn exhaustive_min_area(subject: &Subject, matches: &IndexMap<NodeId, Vec<Match<'_>>>) -> f64 {
    fn search(
        subject: &Subject,
        matches: &IndexMap<NodeId, Vec<Match<'_>>>,
        mut pending: Vec<String>,
        chosen: &mut HashMap<NodeId, f64>,
    ) -> f64 {
        while let Some(signal) = pending.pop() {
            let Some(id) = subject.netlist().driver(&signal) else {
                continue;
            };
            if chosen.contains_key(&id) {
                continue;
            }
            let mut best = f64::INFINITY;
            for m in &matches[&id] {
                chosen.insert(id, m.cell.area());
                let mut next = pending.clone();
                next.extend(m.leaves.iter().cloned());
                best = best.min(search(subject, matches, next, chosen));
                chosen.remove(&id);
            }
            return best;
        }
        chosen.values().sum()
    }

    search(subject, matches, subject.netlist().outputs().to_vec(), &mut HashMap::new())
}

fn gate(n: &mut Netlist, kind: NodeKind, fanins: &[Fanin], output: &str) {
    n.add_node(kind, fanins.to_vec(), output).unwrap();
}

fn with_inputs(name: &str, inputs: &[&str], outputs: &[&str]) -> Netlist {
    let mut n = Netlist::new(name);
    for input in inputs {
        n.add_input(*input, 1).unwrap();
    }
    for output in outputs {
        n.add_output(*output, 1).unwrap();
    }
    n
}

/// `y = ~((a & b) | c)`
fn aoi() -> Netlist {
    let mut n = with_inputs("aoi", &["a", "b", "c"], &["y"]);
    gate(&mut n, NodeKind::And, &[Fanin::new("a"), Fanin::new("b")], "t");
    gate(&mut n, NodeKind::Or, &[Fanin::new("t"), Fanin::new("c")], "u");
    gate(&mut n, NodeKind::Not, &[Fanin::new("u")], "y");
    n.rebuild_wires();
    n
}

/// `y = ~((a & b) & c)`
fn nand3() -> Netlist {
    let mut n = with_inputs("nand3", &["a", "b", "c"], &["y"]);
    gate(&mut n, NodeKind::And, &[Fanin::new("a"), Fanin::new("b")], "t");
    gate(&mut n, NodeKind::Nand, &[Fanin::new("t"), Fanin::new("c")], "y");
    n.rebuild_wires();
    n
}

/// The AND feeds two consumers, so it cannot be absorbed.
fn shared() -> Netlist {
    let mut n = with_inputs("shared", &["a", "b", "c"], &["y", "z"]);
    gate(&mut n, NodeKind::And, &[Fanin::new("a"), Fanin::new("b")], "t");
    gate(&mut n, NodeKind::Or, &[Fanin::new("t"), Fanin::new("c")], "u");
    gate(&mut n, NodeKind::Not, &[Fanin::new("u")], "y");
    gate(&mut n, NodeKind::Not, &[Fanin::new("t")], "z");
    n.rebuild_wires();
    n
}

/// `y = ~a & (b | ~c)`, `z = s ? y : a`
fn inverted() -> Netlist {
    let mut n = with_inputs("inverted", &["a", "b", "c", "s"], &["y", "z"]);
    gate(&mut n, NodeKind::Or, &[Fanin::new("b"), Fanin::inverted("c")], "t");
    gate(&mut n, NodeKind::And, &[Fanin::inverted("a"), Fanin::new("t")], "y");
    gate(&mut n, NodeKind::Mux, &[Fanin::new("a"), Fanin::new("y"), Fanin::new("s")], "z");
    n.rebuild_wires();
    n
}

#[rstest]
#[case::area(MapStrategy::AreaOptimal)]
#[case::delay(MapStrategy::DelayOptimal)]
fn every_reference_circuit_maps_legally(#[case] strategy: MapStrategy) {
    init_test_logger();
    let library = CellLibrary::generic();
    for tc in ALL_TEST_CIRCUITS.iter() {
        let source = optimized(tc.name);
        let result = map(&source, &library, strategy).unwrap_or_else(|e| panic!("{}: {e}", tc.name));
        let mapped = &result.netlist;

        mapped.validate().unwrap();
        assert_eq!(mapped.inputs(), source.inputs());
        assert_eq!(mapped.outputs(), source.outputs());
        for node in mapped.nodes() {
            let NodeKind::Cell { name, .. } = &node.kind else {
                panic!("{}: generic node {node} survived mapping", tc.name);
            };
            let cell = library.cell(name).unwrap();
            assert_eq!(cell.inputs().len(), node.fanins.len());
            assert!(node.fanins.iter().all(|f| !f.inverted));
        }
        for output in mapped.outputs() {
            assert!(mapped.is_input(output) || mapped.driver(output).is_some());
        }

        let area: f64 = result.cell_usage.iter().map(|(cell, &count)| library.area(cell).unwrap() * count as f64).sum();
        assert!((area - result.total_area).abs() < EPSILON);
        assert_eq!(result.cell_usage.values().sum::<usize>(), result.instance_count());
        assert_eq!(result.strategy, strategy);
        assert_mapped_equivalent(&source, mapped, &library);
    }
}

#[rstest]
#[case::aoi(aoi(), 2.5)]
#[case::nand3(nand3(), 2.0)]
#[case::shared(shared(), 1.5 + 1.0 + 2.0 + 1.0)]
#[case::inverted(inverted(), 1.0 + 1.0 + 2.0 + 1.5 + 3.5)]
fn area_optimal_matches_exhaustive_search(#[case] netlist: Netlist, #[case] expected: f64) {
    init_test_logger();
    let library = CellLibrary::generic();
    let subject = Subject::new(&netlist).unwrap();
    let matches = enumerate_matches(&subject, &library);
    let best = exhaustive_min_area(&subject, &matches);

    let result = area_optimal(&netlist, &library).unwrap();
    assert!((result.total_area - best).abs() < EPSILON, "{} vs {best}", result.total_area);
    assert!((result.total_area - expected).abs() < EPSILON);
    assert_mapped_equivalent(&netlist, &result.netlist, &library);
}

#[rstest]
#[case("and_chain4")]
#[case("mux_tree")]
#[case("primitives")]
#[case("full_adder_hier")]
fn area_optimal_matches_exhaustive_search_on_reference_circuits(#[case] name: &str) {
    init_test_logger();
    let library = CellLibrary::generic();
    let netlist = optimized(name);
    let subject = Subject::new(&netlist).unwrap();
    let matches = enumerate_matches(&subject, &library);
    let best = exhaustive_min_area(&subject, &matches);
    let result = area_optimal(&netlist, &library).unwrap();
    assert!((result.total_area - best).abs() < EPSILON, "{name}: {} vs {best}", result.total_area);
}

#[test]
fn delay_optimal_is_never_slower() {
    init_test_logger();
    let library = CellLibrary::generic();
    let circuits = ALL_TEST_CIRCUITS
        .iter()
        .map(|tc| optimized(tc.name))
        .chain([aoi(), nand3(), shared(), inverted()]);
    for netlist in circuits {
        let area = area_optimal(&netlist, &library).unwrap();
        let delay = delay_optimal(&netlist, &library).unwrap();
        assert!(
            delay.critical_arrival <= area.critical_arrival + EPSILON,
            "{}: {} > {}",
            netlist.name(),
            delay.critical_arrival,
            area.critical_arrival
        );
    }
}

#[test]
fn strategies_pick_different_and_cells() {
    init_test_logger();
    let library = CellLibrary::generic();
    let mut n = with_inputs("and2", &["a", "b"], &["y"]);
    gate(&mut n, NodeKind::And, &[Fanin::new("a"), Fanin::new("b")], "y");
    n.rebuild_wires();

    let area = area_optimal(&n, &library).unwrap();
    assert_eq!(area.cell_usage.keys().collect::<Vec<_>>(), ["AND2_LP"]);
    assert!((area.total_area - 1.5).abs() < EPSILON);
    assert!((area.critical_arrival - 2.0).abs() < EPSILON);

    let delay = delay_optimal(&n, &library).unwrap();
    assert_eq!(delay.cell_usage.keys().collect::<Vec<_>>(), ["AND2_X1"]);
    assert!((delay.total_area - 2.0).abs() < EPSILON);
    assert!((delay.critical_arrival - 1.0).abs() < EPSILON);
}

#[test]
fn compound_cells_absorb_trees() {
    init_test_logger();
    let library = CellLibrary::generic();
    let result = area_optimal(&aoi(), &library).unwrap();
    assert_eq!(result.instance_count(), 1);
    let y = result.netlist.driver_node("y").unwrap();
    assert_eq!(y.kind.tag(), "AOI21_X1");
    assert_eq!(y.fanins, vec![Fanin::new("a"), Fanin::new("b"), Fanin::new("c")]);
}

#[test]
fn inversions_share_one_inverter() {
    init_test_logger();
    let library = CellLibrary::generic();
    let mut n = with_inputs("inv", &["a", "b", "c"], &["y", "z"]);
    gate(&mut n, NodeKind::And, &[Fanin::inverted("a"), Fanin::new("b")], "y");
    gate(&mut n, NodeKind::Or, &[Fanin::inverted("a"), Fanin::new("c")], "z");
    n.rebuild_wires();

    let result = area_optimal(&n, &library).unwrap();
    assert_eq!(result.cell_usage["INV_X1"], 1);
    assert_mapped_equivalent(&n, &result.netlist, &library);
}

#[test]
fn constants_become_tie_cells() {
    init_test_logger();
    let library = CellLibrary::generic();
    let mut n = Netlist::new("tie");
    n.add_input("a", 3).unwrap();
    n.add_output("k", 3).unwrap();
    n.add_output("y", 3).unwrap();
    n.add_node(NodeKind::Const(5), vec![], "k").unwrap();
    n.add_node(NodeKind::Add, vec![Fanin::new("a"), Fanin::new("k")], "y").unwrap();
    n.rebuild_wires();

    let result = area_optimal(&n, &library).unwrap();
    let k = result.netlist.driver_node("k").unwrap();
    assert_eq!(
        k.kind,
        NodeKind::Cell {
            name: "TIE".into(),
            init: Some(5)
        }
    );
    assert_mapped_equivalent(&n, &result.netlist, &library);
}

#[test]
fn missing_cell_is_unmappable_and_input_is_untouched() {
    init_test_logger();
    let mut record = CellLibrary::generic().to_record();
    record.cells.retain(|cell| cell.name != "MUL_W");
    let library = CellLibrary::from_record(record).unwrap();

    let netlist = optimized("mul_div3");
    let before = netlist.clone();
    let err = area_optimal(&netlist, &library).unwrap_err();
    let MapError::Unmappable { node, kind, signal } = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(kind, "MUL");
    assert_eq!(signal, "p");
    assert_eq!(netlist.driver("p"), Some(node));
    assert_eq!(netlist, before);
}

#[test]
fn unmappable_error_names_the_node_without_a_cell() {
    init_test_logger();
    let mut record = CellLibrary::generic().to_record();
    record.cells.retain(|cell| cell.name != "MUL_W");
    let library = CellLibrary::from_record(record).unwrap();

    let mut n = with_inputs("mul", &["a", "b"], &["y"]);
    gate(&mut n, NodeKind::Mul, &[Fanin::new("a"), Fanin::new("b")], "t");
    gate(&mut n, NodeKind::Not, &[Fanin::new("t")], "y");
    // Dead logic the outputs do not need is never reported.
    gate(&mut n, NodeKind::Mul, &[Fanin::new("b"), Fanin::new("b")], "dead");
    n.rebuild_wires();

    match delay_optimal(&n, &library) {
        Err(MapError::Unmappable { signal, kind, .. }) => {
            assert_eq!(signal, "t");
            assert_eq!(kind, "MUL");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let mut live = with_inputs("mul", &["a", "b"], &["y"]);
    gate(&mut live, NodeKind::Xor, &[Fanin::new("a"), Fanin::new("b")], "y");
    gate(&mut live, NodeKind::Mul, &[Fanin::new("b"), Fanin::new("b")], "dead");
    live.rebuild_wires();
    let result = area_optimal(&live, &library).unwrap();
    assert_eq!(result.instance_count(), 1);
}

#[test]
fn black_boxes_need_a_macro_cell() {
    init_test_logger();
    let mut n = with_inputs("bb", &["a", "d"], &["q"]);
    gate(&mut n, NodeKind::Module("ram".into()), &[Fanin::new("a"), Fanin::new("d")], "q");
    n.rebuild_wires();

    let err = area_optimal(&n, &CellLibrary::generic()).unwrap_err();
    assert!(matches!(err, MapError::Unmappable { ref kind, .. } if kind == "MODULE(ram)"));

    let mut record = CellLibrary::generic().to_record();
    record.cells.push(CellRecord {
        name: "RAM_MACRO".into(),
        function: "MODULE:ram(A,D)".into(),
        pins: vec![Pin::input("A"), Pin::input("D"), Pin::output("Q")],
        area: 40.0,
        delay: DelayModel::Scalar(3.0),
    });
    let library = CellLibrary::from_record(record).unwrap();
    let result = area_optimal(&n, &library).unwrap();
    assert_eq!(result.netlist.driver_node("q").unwrap().kind.tag(), "RAM_MACRO");
    assert!((result.critical_arrival - 3.0).abs() < EPSILON);
}

#[test]
fn mapped_netlists_map_to_themselves() {
    init_test_logger();
    let library = CellLibrary::generic();
    let first = delay_optimal(&optimized("full_adder_hier"), &library).unwrap();
    let second = area_optimal(&first.netlist, &library).unwrap();
    assert_eq!(second.cell_usage, first.cell_usage);
    assert!((second.total_area - first.total_area).abs() < EPSILON);
    assert!((second.critical_arrival - first.critical_arrival).abs() < EPSILON);
}

#[test]
fn malformed_input_is_rejected() {
    let mut n = with_inputs("bad", &["a"], &["y"]);
    gate(&mut n, NodeKind::Not, &[Fanin::new("ghost")], "y");
    n.rebuild_wires();
    assert!(matches!(
        area_optimal(&n, &CellLibrary::generic()),
        Err(MapError::Structural(_))
    ));
}
