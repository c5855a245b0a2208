use std::fmt;

/// Function computed by a node.
///
/// The set is closed: generic logic and arithmetic operators produced by the
/// front end, constants, opaque module instances, and library cells produced
/// by technology mapping. Passes match on it exhaustively.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Not,
    Buf,
    Add,
    Sub,
    Mul,
    Div,
    /// Fanins are `[d0, d1, sel]`.
    Mux,
    /// Literal value; no fanins.
    Const(u64),
    /// Instance of a module with no definition in the source.
    Module(String),
    /// Instance of a library cell; `init` is the literal driven by a tie cell.
    Cell { name: String, init: Option<u64> },
}

impl NodeKind {
    /// Exchange-schema tags of the kinds that carry no payload.
    pub const GENERIC_TAGS: [&'static str; 12] = [
        "AND", "OR", "XOR", "NAND", "NOR", "NOT", "BUF", "ADD", "SUB", "MUL", "DIV", "MUX",
    ];

    /// Tag used for constants in the exchange schema.
    pub const CONST_TAG: &'static str = "CONST";

    /// Tag used for black-box module instances in the exchange schema.
    pub const MODULE_TAG: &'static str = "MODULE";

    /// Parse one of [`Self::GENERIC_TAGS`].
    #[must_use]
    pub fn from_generic_tag(tag: &str) -> Option<Self> {
        let kind = match tag {
            "AND" => Self::And,
            "OR" => Self::Or,
            "XOR" => Self::Xor,
            "NAND" => Self::Nand,
            "NOR" => Self::Nor,
            "NOT" => Self::Not,
            "BUF" => Self::Buf,
            "ADD" => Self::Add,
            "SUB" => Self::Sub,
            "MUL" => Self::Mul,
            "DIV" => Self::Div,
            "MUX" => Self::Mux,
            _ => return None,
        };
        Some(kind)
    }

    /// True for tags reserved by the IR (generic kinds, CONST and MODULE).
    #[must_use]
    pub fn is_reserved_tag(tag: &str) -> bool {
        tag == Self::CONST_TAG || tag == Self::MODULE_TAG || Self::from_generic_tag(tag).is_some()
    }

    /// Exchange-schema type tag; library cells use their cell name.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
            Self::Nand => "NAND",
            Self::Nor => "NOR",
            Self::Not => "NOT",
            Self::Buf => "BUF",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mux => "MUX",
            Self::Const(_) => Self::CONST_TAG,
            Self::Module(_) => Self::MODULE_TAG,
            Self::Cell { name, .. } => name,
        }
    }

    /// Fanin count implied by the kind, `None` when it is instance-defined.
    #[must_use]
    pub const fn arity(&self) -> Option<usize> {
        match self {
            Self::And
            | Self::Or
            | Self::Xor
            | Self::Nand
            | Self::Nor
            | Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div => Some(2),
            Self::Not | Self::Buf => Some(1),
            Self::Mux => Some(3),
            Self::Const(_) => Some(0),
            Self::Module(_) | Self::Cell { .. } => None,
        }
    }

    /// Operand order does not matter.
    #[must_use]
    pub const fn is_commutative(&self) -> bool {
        matches!(
            self,
            Self::And | Self::Or | Self::Xor | Self::Nand | Self::Nor | Self::Add | Self::Mul
        )
    }

    /// Chains of this kind can be regrouped freely (the balance pass relies on it).
    #[must_use]
    pub const fn is_associative(&self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor)
    }

    /// Bitwise logic gate.
    #[must_use]
    pub const fn is_logic(&self) -> bool {
        matches!(
            self,
            Self::And | Self::Or | Self::Xor | Self::Nand | Self::Nor | Self::Not | Self::Buf
        )
    }

    /// Word-level arithmetic operator.
    #[must_use]
    pub const fn is_arithmetic(&self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div)
    }

    /// Technology-independent kind (anything but a library cell).
    #[must_use]
    pub const fn is_generic(&self) -> bool {
        !matches!(self, Self::Cell { .. })
    }

    /// The value of a constant node.
    #[must_use]
    pub const fn const_value(&self) -> Option<u64> {
        match self {
            Self::Const(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(value) => write!(f, "CONST({value})"),
            Self::Module(name) => write!(f, "MODULE({name})"),
            Self::Cell {
                name,
                init: Some(init),
            } => write!(f, "{name}[{init}]"),
            other => f.write_str(other.tag()),
        }
    }
}
