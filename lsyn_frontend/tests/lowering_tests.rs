#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use std::collections::HashMap;
use std::sync::OnceLock;

use lsyn_common::{ALL_TEST_CIRCUITS, test_circuit};
use lsyn_frontend::{FrontendError, compile};
use lsyn_netlist::{Evaluator, Netlist, NodeKind};
use rstest::rstest;

fn init_test_logger() {
    static INIT: OnceLock<()> = OnceLock::new();
    let _ = INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Reference behavior of each shared circuit, one value per output.
fn reference(name: &str, v: &HashMap<String, u64>) -> Vec<u64> {
    let i = |s: &str| v[s];
    let not1 = |x: u64| x ^ 1;
    match name {
        "and_chain4" => vec![i("a") & i("b") & i("c") & i("d")],
        "duplicate_logic" => {
            let u = (i("a") & i("b")) ^ i("c");
            vec![u, u]
        }
        "const_logic" => vec![not1(i("b")), 0],
        "dead_logic" => vec![i("a") | i("b")],
        "mux_tree" => {
            let y = if i("s") == 1 { i("a") & i("b") } else { i("c") | not1(i("d")) };
            vec![y]
        }
        "adder2" => vec![(i("a") + i("b")) & 0b111, i("a").wrapping_sub(i("b")) & 0b11],
        "compare2" => vec![
            u64::from(i("a") < i("b")),
            u64::from(i("a") == i("b")),
            u64::from(i("a") >= i("b")),
        ],
        "primitives" => {
            let z = i("a") ^ i("d");
            vec![not1(i("a") & i("b") & i("c")), z, not1(z)]
        }
        "full_adder_hier" => {
            let (x, y, z) = (i("x"), i("y"), i("z"));
            vec![x ^ y ^ z, (x & y) | (z & (x ^ y))]
        }
        "parity6" => vec![["a", "b", "c", "d", "e", "f"].iter().fold(0, |acc, s| acc ^ i(s))],
        "mul_div3" => {
            let (a, b) = (i("a"), i("b"));
            vec![(a * b) & 0b111, if b == 0 { 0 } else { a / b }]
        }
        other => panic!("no reference model for {other}"),
    }
}

fn assert_matches(netlist: &Netlist, model: impl Fn(&HashMap<String, u64>) -> Vec<u64>) {
    let eval = Evaluator::new(netlist).unwrap();
    let table = eval.truth_table(16).unwrap();
    for (index, row) in table.rows.iter().enumerate() {
        let inputs = eval.assignment(index as u64);
        assert_eq!(row, &model(&inputs), "assignment {inputs:?} of {}", netlist.name());
    }
}

#[test]
fn every_reference_circuit_elaborates_to_its_function() {
    init_test_logger();
    for tc in ALL_TEST_CIRCUITS.iter() {
        let netlist = compile(tc.source, Some(tc.top)).unwrap_or_else(|e| panic!("{}: {e}", tc.name));
        netlist.validate().unwrap();
        let bits: u32 = netlist.inputs().iter().map(|i| netlist.width(i)).sum();
        assert_eq!(bits as usize, tc.input_bits, "{}", tc.name);
        assert_matches(&netlist, |v| reference(tc.name, v));
    }
}

#[test]
fn top_is_inferred_from_the_hierarchy() {
    init_test_logger();
    let tc = test_circuit("full_adder_hier");
    let netlist = compile(tc.source, None).unwrap();
    assert_eq!(netlist.name(), "full_adder");
    assert_eq!(netlist.inputs(), ["x", "y", "z"]);
    assert_eq!(netlist.outputs(), ["sum", "carry"]);
}

#[test]
fn hierarchy_is_flattened_with_instance_prefixes() {
    init_test_logger();
    let tc = test_circuit("full_adder_hier");
    let netlist = compile(tc.source, None).unwrap();
    assert!(netlist.nodes().all(|n| !matches!(n.kind, NodeKind::Module(_))));
    // Output ports connected to same-width signals drive them directly.
    assert!(netlist.driver("s1").is_some());
    assert!(netlist.driver("c1").is_some());
    assert!(netlist.driver("sum").is_some());
    assert!(netlist.widths().keys().all(|s| !s.starts_with("ha1/s")));
}

#[test]
fn unconnected_output_keeps_a_prefixed_name() {
    init_test_logger();
    let source = "
        module pair(input a, input b, output x, output o);
            assign x = a ^ b;
            assign o = a | b;
        endmodule
        module top(input p, input q, output y);
            pair u (.a(p), .b(q), .x(y), .o());
        endmodule
    ";
    let netlist = compile(source, Some("top")).unwrap();
    assert!(netlist.driver("u/o").is_some());
    assert_matches(&netlist, |v| vec![v["p"] ^ v["q"]]);
}

#[test]
fn nested_instances_compose_prefixes() {
    init_test_logger();
    let source = "
        module inv(input a, output y);
            wire t;
            assign t = ~a;
            assign y = t;
        endmodule
        module twice(input a, output y);
            wire m;
            inv i0 (a, m);
            inv i1 (m, y);
        endmodule
        module top(input a, output y);
            twice w (a, y);
        endmodule
    ";
    let netlist = compile(source, None).unwrap();
    assert_eq!(netlist.name(), "top");
    assert!(netlist.driver("w/i0/t").is_some());
    assert!(netlist.driver("w/i1/t").is_some());
    assert_matches(&netlist, |v| vec![v["a"]]);
}

#[test]
fn port_width_mismatches_are_buffered() {
    init_test_logger();
    let source = "
        module inc(input [1:0] a, output [2:0] y);
            assign y = a + 2'd1;
        endmodule
        module top(input [2:0] a, output [1:0] y, output [3:0] z);
            inc u0 (.a(a), .y(y));
            inc u1 (.a(a), .y(z));
        endmodule
    ";
    let netlist = compile(source, Some("top")).unwrap();
    // Inputs truncate to the port, outputs are truncated or zero-extended.
    assert_matches(&netlist, |v| {
        let sum = (v["a"] & 0b11) + 1;
        vec![sum & 0b11, sum]
    });
}

#[test]
fn black_boxes_become_module_nodes() {
    init_test_logger();
    let source = "
        module top(input a, input [1:0] b, output [3:0] y);
            mystery u0 (y, a, b);
        endmodule
    ";
    let netlist = compile(source, None).unwrap();
    let node = netlist.driver_node("y").unwrap();
    assert_eq!(node.kind, NodeKind::Module("mystery".into()));
    let fanins: Vec<&str> = node.fanin_signals().collect();
    assert_eq!(fanins, ["a", "b"]);
}

#[rstest]
#[case::vector_not("assign y = ~a;", 3)]
#[case::xnor("assign y = a ~^ b;", 3)]
fn context_width_applies_to_complement(#[case] body: &str, #[case] width: u32) {
    init_test_logger();
    let source = format!("module m(input [1:0] a, input [1:0] b, output [{}:0] y); {body} endmodule", width - 1);
    let netlist = compile(&source, None).unwrap();
    let eval = Evaluator::new(&netlist).unwrap();
    for index in 0..16 {
        let inputs = eval.assignment(index);
        let y = eval.evaluate(&inputs).unwrap()["y"];
        let expected = if body.contains("~^") { !(inputs["a"] ^ inputs["b"]) } else { !inputs["a"] };
        assert_eq!(y, expected & 0b111, "{inputs:?}");
    }
}

#[rstest]
#[case::gt("a > b", |a: u64, b: u64| u64::from(a > b))]
#[case::le("a <= b", |a: u64, b: u64| u64::from(a <= b))]
#[case::ne("a != b", |a: u64, b: u64| u64::from(a != b))]
#[case::logic_not("!a", |a: u64, _b: u64| u64::from(a == 0))]
#[case::logic_and("a && b", |a: u64, b: u64| u64::from(a != 0 && b != 0))]
#[case::logic_or("a || b", |a: u64, b: u64| u64::from(a != 0 || b != 0))]
#[case::ternary("a ? b : 3'd5", |a: u64, b: u64| if a != 0 { b } else { 5 })]
#[case::negate("-a", |a: u64, _b: u64| a.wrapping_neg() & 0b111)]
#[case::unsized_literal("a + 1", |a: u64, _b: u64| (a + 1) & 0b111)]
#[case::divide("a / b", |a: u64, b: u64| if b == 0 { 0 } else { a / b })]
fn three_bit_operators(#[case] expr: &str, #[case] model: fn(u64, u64) -> u64) {
    init_test_logger();
    let source = format!("module m(input [2:0] a, input [2:0] b, output [2:0] y); assign y = {expr}; endmodule");
    let netlist = compile(&source, None).unwrap();
    assert_matches(&netlist, |v| vec![model(v["a"], v["b"])]);
}

#[test]
fn selects_and_concatenation() {
    init_test_logger();
    let source = "
        module m(input [3:0] a, output [1:0] hi, output lo, output [5:0] c);
            assign hi = a[3:2];
            assign lo = a[0];
            assign c = {a[1:0], a};
        endmodule
    ";
    let netlist = compile(source, None).unwrap();
    assert_matches(&netlist, |v| {
        let a = v["a"];
        vec![a >> 2, a & 1, ((a & 0b11) << 4) | a]
    });
}

#[test]
fn wire_declaration_assignment() {
    init_test_logger();
    let source = "
        module m(input a, input b, output y);
            wire t = a & b;
            assign y = ~t;
        endmodule
    ";
    let netlist = compile(source, None).unwrap();
    assert_matches(&netlist, |v| vec![(v["a"] & v["b"]) ^ 1]);
}

#[rstest]
#[case::xnor3("xnor g (y, a, b, c);", |a: u64, b: u64, c: u64| 1 ^ a ^ b ^ c)]
#[case::nor3("nor (y, a, b, c);", |a: u64, b: u64, c: u64| 1 ^ (a | b | c))]
#[case::and2("and (y, a, c);", |a: u64, _b: u64, c: u64| a & c)]
#[case::buf("buf (y, b);", |_a: u64, b: u64, _c: u64| b)]
fn gate_primitives(#[case] gate: &str, #[case] model: fn(u64, u64, u64) -> u64) {
    init_test_logger();
    let source = format!("module m(input a, input b, input c, output y); {gate} endmodule");
    let netlist = compile(&source, None).unwrap();
    assert_matches(&netlist, |v| vec![model(v["a"], v["b"], v["c"])]);
}

#[rstest]
#[case::multiple_drivers(
    "module m(input a, output y); assign y = a; assign y = ~a; endmodule",
    |e: &FrontendError| matches!(e, FrontendError::MultipleDrivers { line: 1, .. })
)]
#[case::driven_input(
    "module m(input a, output y); assign a = 1'b0; assign y = a; endmodule",
    |e: &FrontendError| matches!(e, FrontendError::DrivenInput { .. })
)]
#[case::undeclared(
    "module m(input a, output y);\n assign y = a & q; endmodule",
    |e: &FrontendError| matches!(e, FrontendError::UndeclaredSignal { line: 2, .. })
)]
#[case::undriven_output(
    "module m(input a, output y, output z); assign y = a; endmodule",
    |e: &FrontendError| matches!(e, FrontendError::Netlist(_))
)]
#[case::not_two_inputs(
    "module m(input a, input b, output y); not (y, a, b); endmodule",
    |e: &FrontendError| matches!(e, FrontendError::Connection { .. })
)]
#[case::and_one_input(
    "module m(input a, output y); and (y, a); endmodule",
    |e: &FrontendError| matches!(e, FrontendError::Connection { .. })
)]
#[case::black_box_named(
    "module m(input a, output y); box u (.o(y), .i(a)); endmodule",
    |e: &FrontendError| matches!(e, FrontendError::Connection { .. })
)]
#[case::unconnected_input(
    "module c(input a, output y); assign y = a; endmodule
     module m(input a, output y); c u (.y(y)); endmodule",
    |e: &FrontendError| matches!(e, FrontendError::Connection { .. })
)]
#[case::recursive(
    "module a(input x, output y); b u (x, y); endmodule
     module b(input x, output y); a u (x, y); endmodule
     module top(input x, output y); a u (x, y); endmodule",
    |e: &FrontendError| matches!(e, FrontendError::RecursiveInstance(_))
)]
#[case::ambiguous_top(
    "module a(input x, output y); assign y = x; endmodule
     module b(input x, output y); assign y = x; endmodule",
    |e: &FrontendError| matches!(e, FrontendError::AmbiguousTop(names) if names.len() == 2)
)]
#[case::no_modules("// nothing here", |e: &FrontendError| matches!(e, FrontendError::NoModules))]
#[case::wide_comparison(
    "module m(input [63:0] a, input [63:0] b, output y); assign y = a < b; endmodule",
    |e: &FrontendError| matches!(e, FrontendError::Unsupported { .. })
)]
#[case::range_overflows_u32(
    "module m(input [4294967295:0] a, output y); assign y = a; endmodule",
    |e: &FrontendError| matches!(e, FrontendError::Unsupported { construct, .. } if construct.contains("4294967295"))
)]
#[case::range_wider_than_64_bits(
    "module m(input [64:0] a, output y); assign y = a; endmodule",
    |e: &FrontendError| matches!(e, FrontendError::Unsupported { .. })
)]
fn semantic_errors(#[case] source: &str, #[case] check: fn(&FrontendError) -> bool) {
    init_test_logger();
    let err = compile(source, None).unwrap_err();
    assert!(check(&err), "unexpected error: {err}");
}

#[test]
fn unknown_top_is_reported() {
    init_test_logger();
    let tc = test_circuit("and_chain4");
    assert_eq!(
        compile(tc.source, Some("missing")).unwrap_err(),
        FrontendError::UnknownTop("missing".into())
    );
}
