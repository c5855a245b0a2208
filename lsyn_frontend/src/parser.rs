//! Recursive-descent parser with a Pratt loop for expressions.

use crate::ast::{Assign, BinaryOp, Connections, Decl, Direction, Expr, Instance, Module, SourceFile, UnaryOp};
use crate::lexer::{Spanned, Token, tokenize};
use lsyn_netlist::MAX_WIDTH;

use crate::{FrontendError, Pos};

/// Parse a whole source file.
///
/// # Errors
///
/// Lexical and syntax errors with their position, duplicate declarations and
/// duplicate module names.
pub fn parse(source: &str) -> Result<SourceFile, FrontendError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, cursor: 0 };
    let mut file = SourceFile::default();
    while !parser.at_end() {
        let module = parser.module()?;
        if file.module(&module.name).is_some() {
            return Err(FrontendError::DuplicateModule(module.name));
        }
        file.modules.push(module);
    }
    Ok(file)
}

/// Binding power of a binary operator token; higher binds tighter.
fn binding_power(token: &Token) -> Option<(u8, BinaryOp)> {
    let entry = match token {
        Token::OrOr => (1, BinaryOp::LogicOr),
        Token::AndAnd => (2, BinaryOp::LogicAnd),
        Token::Pipe => (3, BinaryOp::Or),
        Token::Caret => (4, BinaryOp::Xor),
        Token::Xnor => (4, BinaryOp::Xnor),
        Token::Amp => (5, BinaryOp::And),
        Token::EqEq => (6, BinaryOp::Eq),
        Token::NotEq => (6, BinaryOp::Ne),
        Token::Lt => (7, BinaryOp::Lt),
        Token::Le => (7, BinaryOp::Le),
        Token::Gt => (7, BinaryOp::Gt),
        Token::Ge => (7, BinaryOp::Ge),
        Token::Plus => (8, BinaryOp::Add),
        Token::Minus => (8, BinaryOp::Sub),
        Token::Star => (9, BinaryOp::Mul),
        Token::Slash => (9, BinaryOp::Div),
        _ => return None,
    };
    Some(entry)
}

struct Parser {
    tokens: Vec<Spanned>,
    cursor: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|t| &t.token)
    }

    fn pos(&self) -> Pos {
        self.tokens
            .get(self.cursor)
            .or_else(|| self.tokens.last())
            .map(|t| t.pos)
            .unwrap_or_default()
    }

    fn syntax(&self, message: impl Into<String>) -> FrontendError {
        let pos = self.pos();
        FrontendError::Syntax {
            line: pos.line,
            col: pos.col,
            message: message.into(),
        }
    }

    fn unsupported(&self, construct: impl Into<String>) -> FrontendError {
        let pos = self.pos();
        FrontendError::Unsupported {
            line: pos.line,
            col: pos.col,
            construct: construct.into(),
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).map(|t| t.token.clone());
        self.cursor += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), FrontendError> {
        if self.eat(expected) {
            return Ok(());
        }
        let found = self.peek().map_or_else(|| "end of input".to_string(), ToString::to_string);
        Err(self.syntax(format!("expected {expected}, found {found}")))
    }

    fn ident(&mut self) -> Result<String, FrontendError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.cursor += 1;
                Ok(name)
            }
            other => {
                let found = other.map_or_else(|| "end of input".to_string(), ToString::to_string);
                Err(self.syntax(format!("expected an identifier, found {found}")))
            }
        }
    }

    fn number(&mut self) -> Result<u32, FrontendError> {
        match self.advance() {
            Some(Token::Number(value)) => u32::try_from(value).map_err(|_| self.syntax("index out of range")),
            _ => {
                self.cursor -= 1;
                Err(self.syntax("expected a number"))
            }
        }
    }

    /// `[msb:lsb]` in a declaration; returns the width.
    fn range(&mut self) -> Result<u32, FrontendError> {
        if !self.eat(&Token::LBracket) {
            return Ok(1);
        }
        let msb = self.number()?;
        self.expect(&Token::Colon)?;
        let lsb = self.number()?;
        if lsb != 0 || msb < lsb {
            return Err(self.unsupported(format!("range [{msb}:{lsb}] (only [N:0] ranges are accepted)")));
        }
        let width = msb
            .checked_add(1)
            .filter(|w| *w <= MAX_WIDTH)
            .ok_or_else(|| self.unsupported(format!("range [{msb}:0] (widths are limited to {MAX_WIDTH} bits)")))?;
        self.expect(&Token::RBracket)?;
        Ok(width)
    }

    fn direction(&mut self) -> Result<Option<Direction>, FrontendError> {
        match self.peek() {
            Some(Token::Input) => {
                self.cursor += 1;
                Ok(Some(Direction::Input))
            }
            Some(Token::Output) => {
                self.cursor += 1;
                Ok(Some(Direction::Output))
            }
            Some(Token::Inout) => Err(self.unsupported("inout ports")),
            _ => Ok(None),
        }
    }

    fn module(&mut self) -> Result<Module, FrontendError> {
        let pos = self.pos();
        self.expect(&Token::Module)?;
        let mut module = Module {
            name: self.ident()?,
            ports: Vec::new(),
            decls: Vec::new(),
            assigns: Vec::new(),
            instances: Vec::new(),
            pos,
        };

        if self.eat(&Token::LParen) && !self.eat(&Token::RParen) {
            self.port_list(&mut module)?;
            self.expect(&Token::RParen)?;
        }
        self.expect(&Token::Semi)?;

        while !self.eat(&Token::EndModule) {
            match self.peek() {
                None => return Err(self.syntax("missing 'endmodule'")),
                Some(Token::Input | Token::Output | Token::Inout) => self.port_decl(&mut module)?,
                Some(Token::Wire) => self.wire_decl(&mut module)?,
                Some(Token::Assign) => self.assign(&mut module)?,
                Some(Token::Ident(_)) => self.instances(&mut module)?,
                Some(other) => {
                    let message = format!("unexpected {other} in module body");
                    return Err(self.syntax(message));
                }
            }
        }

        for port in &module.ports {
            if module.decl(port).and_then(|d| d.direction).is_none() {
                return Err(FrontendError::Syntax {
                    line: module.pos.line,
                    col: module.pos.col,
                    message: format!("port '{port}' of module '{}' has no direction", module.name),
                });
            }
        }
        Ok(module)
    }

    fn declare(module: &mut Module, decl: Decl) -> Result<(), FrontendError> {
        if let Some(existing) = module.decls.iter_mut().find(|d| d.name == decl.name) {
            // `output y; wire y;` and a direction for a header-only port are fine.
            let merge = match (existing.direction, decl.direction) {
                (Some(_), None) => decl.width == existing.width || decl.width == 1,
                (None, Some(_)) => module.ports.contains(&decl.name),
                _ => false,
            };
            if !merge {
                return Err(FrontendError::DuplicateDeclaration {
                    module: module.name.clone(),
                    signal: decl.name,
                    line: decl.pos.line,
                });
            }
            if decl.direction.is_some() {
                *existing = decl;
            }
            return Ok(());
        }
        module.decls.push(decl);
        Ok(())
    }

    /// ANSI (`input [3:0] a, output y`) or plain (`a, y`) port list.
    fn port_list(&mut self, module: &mut Module) -> Result<(), FrontendError> {
        let mut current: Option<(Direction, u32)> = None;
        loop {
            if let Some(direction) = self.direction()? {
                self.eat(&Token::Wire);
                let width = self.range()?;
                current = Some((direction, width));
            }
            let pos = self.pos();
            let name = self.ident()?;
            if module.ports.contains(&name) {
                return Err(FrontendError::DuplicateDeclaration {
                    module: module.name.clone(),
                    signal: name,
                    line: pos.line,
                });
            }
            module.ports.push(name.clone());
            if let Some((direction, width)) = current {
                Self::declare(
                    module,
                    Decl {
                        name,
                        direction: Some(direction),
                        width,
                        pos,
                    },
                )?;
            }
            if !self.eat(&Token::Comma) {
                return Ok(());
            }
        }
    }

    /// `input [1:0] a, b;`
    fn port_decl(&mut self, module: &mut Module) -> Result<(), FrontendError> {
        let Some(direction) = self.direction()? else {
            return Err(self.syntax("expected a port direction"));
        };
        self.eat(&Token::Wire);
        let width = self.range()?;
        loop {
            let pos = self.pos();
            let name = self.ident()?;
            if !module.ports.contains(&name) {
                return Err(FrontendError::Syntax {
                    line: pos.line,
                    col: pos.col,
                    message: format!("'{name}' is not in the port list of '{}'", module.name),
                });
            }
            Self::declare(
                module,
                Decl {
                    name,
                    direction: Some(direction),
                    width,
                    pos,
                },
            )?;
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Semi)
    }

    /// `wire [3:0] t, u = a & b;`
    fn wire_decl(&mut self, module: &mut Module) -> Result<(), FrontendError> {
        self.expect(&Token::Wire)?;
        let width = self.range()?;
        loop {
            let pos = self.pos();
            let name = self.ident()?;
            Self::declare(
                module,
                Decl {
                    name: name.clone(),
                    direction: None,
                    width,
                    pos,
                },
            )?;
            if self.eat(&Token::Eq) {
                let expr = self.expr()?;
                module.assigns.push(Assign { target: name, expr, pos });
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Semi)
    }

    /// `assign y = e, z = f;`
    fn assign(&mut self, module: &mut Module) -> Result<(), FrontendError> {
        self.expect(&Token::Assign)?;
        loop {
            let pos = self.pos();
            let target = self.ident()?;
            if self.peek() == Some(&Token::LBracket) {
                return Err(self.unsupported("part-select on the left-hand side of an assignment"));
            }
            self.expect(&Token::Eq)?;
            let expr = self.expr()?;
            module.assigns.push(Assign { target, expr, pos });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Semi)
    }

    /// `mod inst (...), inst2 (...);` or `and (y, a, b);`
    fn instances(&mut self, module: &mut Module) -> Result<(), FrontendError> {
        let pos = self.pos();
        let target = self.ident()?;
        loop {
            let name = match self.peek() {
                Some(Token::Ident(_)) => Some(self.ident()?),
                _ => None,
            };
            self.expect(&Token::LParen)?;
            let connections = if self.peek() == Some(&Token::Dot) {
                self.named_connections()?
            } else {
                let mut exprs = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    exprs.push(self.expr()?);
                    while self.eat(&Token::Comma) {
                        exprs.push(self.expr()?);
                    }
                }
                Connections::Positional(exprs)
            };
            self.expect(&Token::RParen)?;
            module.instances.push(Instance {
                module: target.clone(),
                name,
                connections,
                pos,
            });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Semi)
    }

    fn named_connections(&mut self) -> Result<Connections, FrontendError> {
        let mut named = Vec::new();
        loop {
            self.expect(&Token::Dot)?;
            let port = self.ident()?;
            self.expect(&Token::LParen)?;
            let expr = if self.peek() == Some(&Token::RParen) {
                None
            } else {
                Some(self.expr()?)
            };
            self.expect(&Token::RParen)?;
            named.push((port, expr));
            if !self.eat(&Token::Comma) {
                return Ok(Connections::Named(named));
            }
        }
    }

    /// Full expression, including the right-associative ternary.
    fn expr(&mut self) -> Result<Expr, FrontendError> {
        let cond = self.binary(0)?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.expr()?;
        self.expect(&Token::Colon)?;
        let otherwise = self.expr()?;
        Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    fn binary(&mut self, min_power: u8) -> Result<Expr, FrontendError> {
        let mut lhs = self.unary()?;
        while let Some((power, op)) = self.peek().and_then(binding_power) {
            if power <= min_power {
                break;
            }
            self.cursor += 1;
            let rhs = self.binary(power)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, FrontendError> {
        match self.peek() {
            Some(Token::Tilde) => {
                self.cursor += 1;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)))
            }
            Some(Token::Bang) => {
                self.cursor += 1;
                Ok(Expr::Unary(UnaryOp::LogicNot, Box::new(self.unary()?)))
            }
            Some(Token::Minus) => {
                self.cursor += 1;
                let zero = Expr::Number { width: None, value: 0 };
                Ok(Expr::Binary(BinaryOp::Sub, Box::new(zero), Box::new(self.unary()?)))
            }
            Some(Token::Amp | Token::Pipe | Token::Caret | Token::Xnor) => Err(self.unsupported("reduction operators")),
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, FrontendError> {
        let pos = self.pos();
        match self.advance() {
            Some(Token::Ident(name)) => {
                if !self.eat(&Token::LBracket) {
                    return Ok(Expr::Ident { name, pos });
                }
                let msb = self.number()?;
                let lsb = if self.eat(&Token::Colon) { self.number()? } else { msb };
                if msb < lsb {
                    return Err(self.unsupported(format!("ascending part-select [{msb}:{lsb}]")));
                }
                self.expect(&Token::RBracket)?;
                Ok(Expr::Select { name, msb, lsb, pos })
            }
            Some(Token::Number(value)) => Ok(Expr::Number { width: None, value }),
            Some(Token::Sized((width, value))) => Ok(Expr::Number {
                width: Some(width),
                value,
            }),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBrace) => {
                let mut parts = vec![self.expr()?];
                while self.eat(&Token::Comma) {
                    parts.push(self.expr()?);
                }
                self.expect(&Token::RBrace)?;
                Ok(Expr::Concat(parts))
            }
            Some(other) => {
                self.cursor -= 1;
                Err(self.syntax(format!("expected an expression, found {other}")))
            }
            None => Err(self.syntax("expected an expression, found end of input")),
        }
    }
}
