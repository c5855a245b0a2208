//! Cell function patterns.
//!
//! Grammar:
//!
//! ```text
//! pattern := KIND '(' pattern (',' pattern)* ')'
//!          | 'MODULE:' name '(' pattern (',' pattern)* ')'
//!          | 'CONST'
//!          | pin
//! ```
//!
//! `KIND` is one of the generic node tags. Pins are identifiers; a pin may
//! appear more than once, in which case every occurrence must bind the same
//! signal when the pattern is matched.

use std::collections::HashMap;
use std::fmt;

use lsyn_netlist::{NodeKind, OpError, apply_op};
use thiserror::Error;

/// Syntax error in a pattern string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message} at offset {offset}")]
pub struct PatternError {
    /// Byte offset of the offending character.
    pub offset: usize,
    /// Description of the problem.
    pub message: String,
}

/// A parsed cell function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// A cell input pin.
    Pin(String),
    /// Matches any constant node; the cell drives its `init` value.
    Const,
    /// A generic operator or black-box macro applied to sub-patterns.
    Op {
        /// Operator; never a library cell.
        kind: NodeKind,
        /// Operands in fanin order.
        args: Vec<Pattern>,
    },
}

impl Pattern {
    /// Parse a function string.
    ///
    /// # Errors
    ///
    /// [`PatternError`] pointing at the first unexpected character.
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let mut parser = Parser { text, pos: 0 };
        let pattern = parser.pattern()?;
        parser.skip_ws();
        if parser.pos != text.len() {
            return Err(parser.error("trailing input"));
        }
        Ok(pattern)
    }

    /// Key under which the library indexes this pattern.
    #[must_use]
    pub fn root_key(&self) -> Option<String> {
        match self {
            Self::Pin(_) => None,
            Self::Const => Some(NodeKind::CONST_TAG.to_string()),
            Self::Op { kind, .. } => lookup_key(kind),
        }
    }

    /// Distinct pin names in order of first appearance.
    #[must_use]
    pub fn pins(&self) -> Vec<&str> {
        let mut pins = Vec::new();
        let mut stack = vec![self];
        while let Some(p) = stack.pop() {
            match p {
                Self::Pin(name) => {
                    if !pins.contains(&name.as_str()) {
                        pins.push(name.as_str());
                    }
                }
                Self::Const => {}
                Self::Op { args, .. } => stack.extend(args.iter().rev()),
            }
        }
        pins
    }

    /// Number of operator nodes; the size of the subject cone a match covers.
    #[must_use]
    pub fn op_count(&self) -> usize {
        match self {
            Self::Pin(_) => 0,
            Self::Const => 1,
            Self::Op { args, .. } => 1 + args.iter().map(Self::op_count).sum::<usize>(),
        }
    }

    /// Evaluate the pattern with every pin bound to a value.
    ///
    /// All operators are evaluated at `width`. Division by zero yields 0,
    /// black-box macros are not evaluable.
    #[must_use]
    pub fn eval(&self, bindings: &HashMap<&str, u64>, init: Option<u64>, width: u32) -> Option<u64> {
        match self {
            Self::Pin(name) => bindings.get(name.as_str()).copied(),
            Self::Const => apply_op(&NodeKind::Const(init.unwrap_or(0)), &[], width).ok(),
            Self::Op { kind, args } => {
                let operands = args
                    .iter()
                    .map(|a| a.eval(bindings, init, width))
                    .collect::<Option<Vec<u64>>>()?;
                match apply_op(kind, &operands, width) {
                    Ok(value) => Some(value),
                    Err(OpError::DivByZero) => Some(0),
                    Err(OpError::Opaque) => None,
                }
            }
        }
    }
}

/// Library index key of a subject node kind: the generic tag, `CONST`, or
/// `MODULE:<name>`. Library cells have none.
#[must_use]
pub fn lookup_key(kind: &NodeKind) -> Option<String> {
    match kind {
        NodeKind::Cell { .. } => None,
        NodeKind::Const(_) => Some(NodeKind::CONST_TAG.to_string()),
        NodeKind::Module(name) => Some(format!("{}:{name}", NodeKind::MODULE_TAG)),
        generic => Some(generic.tag().to_string()),
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pin(name) => f.write_str(name),
            Self::Const => f.write_str(NodeKind::CONST_TAG),
            Self::Op { kind, args } => {
                match kind {
                    NodeKind::Module(name) => write!(f, "{}:{name}(", NodeKind::MODULE_TAG)?,
                    other => write!(f, "{}(", other.tag())?,
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> PatternError {
        PatternError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek()
            && c.is_whitespace()
        {
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Result<&str, PatternError> {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek()
            && (c.is_ascii_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected an identifier"));
        }
        if self.text[start..].starts_with(|c: char| c.is_ascii_digit()) {
            self.pos = start;
            return Err(self.error("identifiers cannot start with a digit"));
        }
        Ok(&self.text[start..self.pos])
    }

    fn pattern(&mut self) -> Result<Pattern, PatternError> {
        let start = self.pos;
        let word = self.ident()?.to_string();

        if word == NodeKind::MODULE_TAG {
            if !self.eat(':') {
                return Err(self.error("expected ':' after MODULE"));
            }
            let name = self.ident()?.to_string();
            let args = self.args()?;
            return Ok(Pattern::Op {
                kind: NodeKind::Module(name),
                args,
            });
        }

        self.skip_ws();
        if self.peek() != Some('(') {
            return Ok(if word == NodeKind::CONST_TAG {
                Pattern::Const
            } else {
                Pattern::Pin(word)
            });
        }

        let Some(kind) = NodeKind::from_generic_tag(&word) else {
            self.pos = start;
            return Err(self.error(format!("unknown operator '{word}'")));
        };
        let args = self.args()?;
        if let Some(arity) = kind.arity()
            && arity != args.len()
        {
            self.pos = start;
            return Err(self.error(format!("{word} takes {arity} operands, found {}", args.len())));
        }
        Ok(Pattern::Op { kind, args })
    }

    fn args(&mut self) -> Result<Vec<Pattern>, PatternError> {
        if !self.eat('(') {
            return Err(self.error("expected '('"));
        }
        let mut args = vec![self.pattern()?];
        while self.eat(',') {
            args.push(self.pattern()?);
        }
        if !self.eat(')') {
            return Err(self.error("expected ',' or ')'"));
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("NAND(A,B)", "NAND(A,B)")]
    #[case(" NOT ( AND ( A , B ) ) ", "NOT(AND(A,B))")]
    #[case("OR(AND(A,B),C)", "OR(AND(A,B),C)")]
    #[case("MUX(D0,D1,S)", "MUX(D0,D1,S)")]
    #[case("CONST", "CONST")]
    #[case("MODULE:ram(A,B)", "MODULE:ram(A,B)")]
    fn parse_and_print(#[case] text: &str, #[case] printed: &str) {
        assert_eq!(Pattern::parse(text).unwrap().to_string(), printed);
    }

    #[rstest]
    #[case("AND(A)")]
    #[case("FOO(A,B)")]
    #[case("AND(A,B")]
    #[case("AND(A,B))")]
    #[case("")]
    #[case("MODULE(A)")]
    #[case("AND(1A,B)")]
    fn rejects(#[case] text: &str) {
        assert!(Pattern::parse(text).is_err(), "{text} should not parse");
    }

    #[test]
    fn pins_in_first_use_order() {
        let p = Pattern::parse("OR(AND(B,A),XOR(A,C))").unwrap();
        assert_eq!(p.pins(), vec!["B", "A", "C"]);
        assert_eq!(p.op_count(), 3);
        assert_eq!(p.root_key().as_deref(), Some("OR"));
    }

    #[test]
    fn evaluation() {
        let aoi = Pattern::parse("NOT(OR(AND(A,B),C))").unwrap();
        let bind = |a, b, c| HashMap::from([("A", a), ("B", b), ("C", c)]);
        assert_eq!(aoi.eval(&bind(1, 1, 0), None, 1), Some(0));
        assert_eq!(aoi.eval(&bind(1, 0, 0), None, 1), Some(1));
        assert_eq!(Pattern::Const.eval(&HashMap::new(), Some(9), 3), Some(1));
        let bb = Pattern::parse("MODULE:ip(A)").unwrap();
        assert_eq!(bb.eval(&bind(0, 0, 0), None, 1), None);
        assert_eq!(bb.root_key().as_deref(), Some("MODULE:ip"));
    }
}
