//! Reference circuits shared by the tests of the lsyn crates.
//!
//! Every circuit is small enough (at most 6 primary-input bits) to be checked
//! exhaustively by truth-table comparison before and after each pipeline
//! stage.

/// A small Verilog design with known properties.
#[derive(Debug, Clone)]
pub struct TestCircuit {
    /// The name of the test case.
    pub name: &'static str,
    /// The top module of `source`.
    pub top: &'static str,
    /// Verilog-subset source text.
    pub source: &'static str,
    /// Total number of primary-input bits of `top`.
    pub input_bits: usize,
}

lazy_static::lazy_static! {
    /// Every reference circuit.
    pub static ref ALL_TEST_CIRCUITS: Vec<TestCircuit> = vec![
        TestCircuit {
            name: "and_chain4",
            top: "and_chain4",
            source: "
                module and_chain4(input a, input b, input c, input d, output y);
                    assign y = a & b & c & d;
                endmodule
            ",
            input_bits: 4,
        },
        TestCircuit {
            name: "duplicate_logic",
            top: "duplicate_logic",
            source: "
                module duplicate_logic(a, b, c, y, z);
                    input a, b, c;
                    output y, z;
                    wire t1, t2, u1, u2;
                    assign t1 = a & b;
                    assign t2 = b & a;
                    assign u1 = t1 ^ c;
                    assign u2 = t2 ^ c;
                    assign y = u1 | u2;
                    assign z = u2;
                endmodule
            ",
            input_bits: 3,
        },
        TestCircuit {
            name: "const_logic",
            top: "const_logic",
            source: "
                module const_logic(input a, input b, output y, output k);
                    assign y = (a & 1'b0) | (b ^ 1'b1);
                    assign k = 4'd3 + 4'd5;
                endmodule
            ",
            input_bits: 2,
        },
        TestCircuit {
            name: "dead_logic",
            top: "dead_logic",
            source: "
                module dead_logic(input a, input b, output y);
                    wire unused, unused2;
                    assign unused = a ^ b;
                    assign unused2 = ~unused;
                    assign y = a | b;
                endmodule
            ",
            input_bits: 2,
        },
        TestCircuit {
            name: "mux_tree",
            top: "mux_tree",
            source: "
                module mux_tree(input s, input a, input b, input c, input d, output y);
                    assign y = s ? (a & b) : (c | ~d);
                endmodule
            ",
            input_bits: 5,
        },
        TestCircuit {
            name: "adder2",
            top: "adder2",
            source: "
                module adder2(input [1:0] a, input [1:0] b, output [2:0] s, output [1:0] d);
                    assign s = a + b;
                    assign d = a - b;
                endmodule
            ",
            input_bits: 4,
        },
        TestCircuit {
            name: "compare2",
            top: "compare2",
            source: "
                module compare2(input [1:0] a, input [1:0] b, output lt, output eq, output ge);
                    assign lt = a < b;
                    assign eq = a == b;
                    assign ge = a >= b;
                endmodule
            ",
            input_bits: 4,
        },
        TestCircuit {
            name: "primitives",
            top: "primitives",
            source: "
                module primitives(a, b, c, d, y, z, w);
                    input a, b, c, d;
                    output y, z, w;
                    nand g1 (y, a, b, c);
                    xor g2 (z, a, d);
                    not (w, z);
                endmodule
            ",
            input_bits: 4,
        },
        TestCircuit {
            name: "full_adder_hier",
            top: "full_adder",
            source: "
                module half_adder(input a, input b, output s, output c);
                    assign s = a ^ b;
                    assign c = a & b;
                endmodule

                module full_adder(input x, input y, input z, output sum, output carry);
                    wire s1, c1, c2;
                    half_adder ha1 (.a(x), .b(y), .s(s1), .c(c1));
                    half_adder ha2 (.a(s1), .b(z), .s(sum), .c(c2));
                    assign carry = c1 | c2;
                endmodule
            ",
            input_bits: 3,
        },
        TestCircuit {
            name: "parity6",
            top: "parity6",
            source: "
                module parity6(input a, input b, input c, input d, input e, input f, output y);
                    assign y = a ^ b ^ c ^ d ^ e ^ f;
                endmodule
            ",
            input_bits: 6,
        },
        TestCircuit {
            name: "mul_div3",
            top: "mul_div3",
            source: "
                module mul_div3(input [2:0] a, input [2:0] b, output [2:0] p, output [2:0] q);
                    assign p = a * b;
                    assign q = a / b;
                endmodule
            ",
            input_bits: 6,
        },
    ];
}

/// Look up a reference circuit by name.
///
/// # Panics
///
/// Panics when no circuit has that name; the table is static, so this is a
/// bug in the calling test.
#[must_use]
pub fn test_circuit(name: &str) -> &'static TestCircuit {
    ALL_TEST_CIRCUITS
        .iter()
        .find(|tc| tc.name == name)
        .unwrap_or_else(|| panic!("No test circuit named '{name}'"))
}
