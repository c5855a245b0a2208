//! Syntax tree of the Verilog subset.

use crate::Pos;

/// Port direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Module input.
    Input,
    /// Module output.
    Output,
}

/// A declared signal: port or internal wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    /// Signal name.
    pub name: String,
    /// `None` for internal wires.
    pub direction: Option<Direction>,
    /// Bit width from `[msb:lsb]`, 1 when absent.
    pub width: u32,
    /// Where the name was declared.
    pub pos: Pos,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Bitwise complement `~`.
    Not,
    /// Logical negation `!`.
    LogicNot,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Xor,
    Xnor,
    LogicAnd,
    LogicOr,
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// Comparison and logical operators produce a single bit.
    #[must_use]
    pub const fn is_boolean(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::LogicAnd | Self::LogicOr
        )
    }
}

/// Expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Signal reference.
    Ident {
        /// Signal name.
        name: String,
        /// Source position.
        pos: Pos,
    },
    /// Literal; `width` is `None` for unsized numbers.
    Number {
        /// Declared width.
        width: Option<u32>,
        /// Value.
        value: u64,
    },
    /// `name[msb:lsb]` or `name[bit]`.
    Select {
        /// Signal name.
        name: String,
        /// Most significant selected bit.
        msb: u32,
        /// Least significant selected bit.
        lsb: u32,
        /// Source position.
        pos: Pos,
    },
    /// `{a, b, ...}`, most significant part first.
    Concat(Vec<Expr>),
    /// Unary operation.
    Unary(UnaryOp, Box<Expr>),
    /// Binary operation.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `cond ? then : else`.
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Port connections of an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connections {
    /// `(a, b, c)`
    Positional(Vec<Expr>),
    /// `(.p(a), .q())`
    Named(Vec<(String, Option<Expr>)>),
}

/// Module or gate-primitive instantiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Instantiated module or primitive.
    pub module: String,
    /// Instance name; optional for primitives.
    pub name: Option<String>,
    /// Port connections.
    pub connections: Connections,
    /// Source position.
    pub pos: Pos,
}

/// `assign lhs = expr;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assign {
    /// Driven signal.
    pub target: String,
    /// Driving expression.
    pub expr: Expr,
    /// Source position.
    pub pos: Pos,
}

/// A module definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Module name.
    pub name: String,
    /// Port names in header order.
    pub ports: Vec<String>,
    /// Every declaration, ports included.
    pub decls: Vec<Decl>,
    /// Continuous assignments.
    pub assigns: Vec<Assign>,
    /// Instantiations.
    pub instances: Vec<Instance>,
    /// Position of the `module` keyword.
    pub pos: Pos,
}

impl Module {
    /// Declaration of `name`.
    #[must_use]
    pub fn decl(&self, name: &str) -> Option<&Decl> {
        self.decls.iter().find(|d| d.name == name)
    }

    /// Ports with their declarations, in header order.
    pub fn port_decls(&self) -> impl Iterator<Item = &Decl> {
        self.ports.iter().filter_map(|p| self.decl(p))
    }
}

/// A parsed source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFile {
    /// Modules in source order.
    pub modules: Vec<Module>,
}

impl SourceFile {
    /// Module by name.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }
}
