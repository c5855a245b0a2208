//! Elaboration: flatten the module hierarchy and lower expressions to
//! netlist nodes.
//!
//! Widths follow Verilog's context rule: an expression is evaluated at the
//! wider of its own width and the width of the signal it drives. Comparisons
//! are lowered onto the generic node set: `a < b` is the borrow bit of
//! `a - b` computed one bit wider, extracted with a division by `2^w`; `a == b`
//! is the borrow of `(a ^ b) - 1`.
//!
//! Instances of modules defined in the same source are inlined. Their
//! internal signals are prefixed with `<instance>/`; input ports are replaced
//! by the connected expression and output ports drive the connected parent
//! signal directly whenever the widths agree. Instances of unknown modules
//! become black-box nodes, connected positionally with the output first.

use std::collections::{HashMap, HashSet};

use lsyn_netlist::{Fanin, MAX_WIDTH, Netlist, NetlistError, NodeKind, mask};
use tracing::{debug, info};

use crate::ast::{BinaryOp, Connections, Direction, Expr, Instance, Module, SourceFile, UnaryOp};
use crate::FrontendError;

/// Gate primitives understood in instantiation position.
const PRIMITIVES: [&str; 8] = ["and", "nand", "or", "nor", "xor", "xnor", "not", "buf"];

/// Pick the module to elaborate.
///
/// # Errors
///
/// [`FrontendError::UnknownTop`] for a missing named top; without a name,
/// the single module no other module instantiates is chosen, and anything
/// but exactly one candidate is an error.
pub fn find_top<'a>(file: &'a SourceFile, top: Option<&str>) -> Result<&'a Module, FrontendError> {
    if file.modules.is_empty() {
        return Err(FrontendError::NoModules);
    }
    if let Some(name) = top {
        return file.module(name).ok_or_else(|| FrontendError::UnknownTop(name.to_string()));
    }
    let instantiated: HashSet<&str> = file
        .modules
        .iter()
        .flat_map(|m| m.instances.iter().map(|i| i.module.as_str()))
        .collect();
    let candidates: Vec<&Module> = file
        .modules
        .iter()
        .filter(|m| !instantiated.contains(m.name.as_str()))
        .collect();
    match candidates.as_slice() {
        [only] => Ok(only),
        [] => Err(FrontendError::RecursiveInstance(file.modules[0].name.clone())),
        many => Err(FrontendError::AmbiguousTop(many.iter().map(|m| m.name.clone()).collect())),
    }
}

/// Flatten `top` (or the inferred top) of `file` into a validated netlist.
///
/// # Errors
///
/// Semantic errors found while lowering, and any structural error of the
/// resulting netlist.
pub fn elaborate(file: &SourceFile, top: Option<&str>) -> Result<Netlist, FrontendError> {
    let module = find_top(file, top)?;
    let mut netlist = Netlist::new(module.name.clone());
    for decl in module.decls.iter().filter(|d| d.direction.is_none()) {
        netlist.declare_width(decl.name.clone(), decl.width)?;
    }
    for port in module.port_decls() {
        match port.direction {
            Some(Direction::Input) => netlist.add_input(port.name.clone(), port.width)?,
            Some(Direction::Output) => netlist.add_output(port.name.clone(), port.width)?,
            None => {}
        }
    }

    let mut elaborator = Elaborator {
        file,
        netlist,
        stack: vec![module.name.clone()],
        site: Site::default(),
    };
    let scope = Scope {
        module,
        prefix: String::new(),
        bindings: HashMap::new(),
    };
    elaborator.module(&scope)?;

    let mut netlist = elaborator.netlist;
    netlist.rebuild_wires();
    netlist.validate()?;
    info!(
        "elaborated '{}': {} inputs, {} outputs, {} nodes",
        netlist.name(),
        netlist.inputs().len(),
        netlist.outputs().len(),
        netlist.node_count()
    );
    Ok(netlist)
}

/// How a name inside an inlined instance resolves.
#[derive(Debug, Clone)]
enum Binding {
    /// Input port replaced by a parent-side value.
    Read(Fanin),
    /// Output port written under a parent signal name.
    Alias(String),
}

struct Scope<'a> {
    module: &'a Module,
    prefix: String,
    bindings: HashMap<String, Binding>,
}

impl Scope<'_> {
    fn undeclared(&self, name: &str, line: usize) -> FrontendError {
        FrontendError::UndeclaredSignal {
            module: self.module.name.clone(),
            signal: name.to_string(),
            line,
        }
    }

    fn width(&self, name: &str, line: usize) -> Result<u32, FrontendError> {
        self.module
            .decl(name)
            .map(|d| d.width)
            .ok_or_else(|| self.undeclared(name, line))
    }

    /// The value read when the module body names `name`.
    fn read(&self, name: &str, line: usize) -> Result<Fanin, FrontendError> {
        match self.bindings.get(name) {
            Some(Binding::Read(fanin)) => Ok(fanin.clone()),
            Some(Binding::Alias(parent)) => Ok(Fanin::new(parent.clone())),
            None if self.module.decl(name).is_some() => Ok(Fanin::new(format!("{}{name}", self.prefix))),
            None => Err(self.undeclared(name, line)),
        }
    }

    /// The netlist signal written when the module body drives `name`.
    fn dest(&self, name: &str, line: usize) -> Result<String, FrontendError> {
        let driven_input = || FrontendError::DrivenInput {
            module: self.module.name.clone(),
            signal: name.to_string(),
            line,
        };
        match self.bindings.get(name) {
            Some(Binding::Read(_)) => Err(driven_input()),
            Some(Binding::Alias(parent)) => Ok(parent.clone()),
            None => match self.module.decl(name) {
                Some(d) if d.direction == Some(Direction::Input) => Err(driven_input()),
                Some(_) => Ok(format!("{}{name}", self.prefix)),
                None => Err(self.undeclared(name, line)),
            },
        }
    }
}

/// Module and line of the statement being lowered, for diagnostics.
#[derive(Debug, Clone, Default)]
struct Site {
    module: String,
    line: usize,
}

struct Elaborator<'a> {
    file: &'a SourceFile,
    netlist: Netlist,
    /// Modules currently being inlined, outermost first.
    stack: Vec<String>,
    site: Site,
}

impl Elaborator<'_> {
    fn module(&mut self, scope: &Scope<'_>) -> Result<(), FrontendError> {
        for assign in &scope.module.assigns {
            self.site = Site {
                module: scope.module.name.clone(),
                line: assign.pos.line,
            };
            let dest = scope.dest(&assign.target, assign.pos.line)?;
            let width = scope.width(&assign.target, assign.pos.line)?;
            let eval_width = width.max(self.self_width(scope, &assign.expr)?);
            let value = self.expr(scope, &assign.expr, eval_width, Some(&dest))?;
            self.drive(&dest, value, width)?;
        }
        for instance in &scope.module.instances {
            self.site = Site {
                module: scope.module.name.clone(),
                line: instance.pos.line,
            };
            if PRIMITIVES.contains(&instance.module.as_str()) {
                self.primitive(scope, instance)?;
            } else if let Some(child) = self.file.module(&instance.module) {
                self.inline(scope, instance, child)?;
            } else {
                self.black_box(scope, instance)?;
            }
        }
        Ok(())
    }

    fn connection_error(&self, instance: &Instance, message: impl Into<String>) -> FrontendError {
        FrontendError::Connection {
            instance: instance.name.clone().unwrap_or_else(|| instance.module.clone()),
            message: message.into(),
            line: instance.pos.line,
        }
    }

    /// Add a node; the output is `dest` when its width allows, a fresh
    /// signal otherwise.
    fn emit(&mut self, kind: NodeKind, fanins: Vec<Fanin>, width: u32, dest: Option<&str>) -> Result<Fanin, FrontendError> {
        let output = match dest {
            Some(d) if self.netlist.width(d) <= width => d.to_string(),
            _ => self.netlist.fresh_signal("t", width)?,
        };
        self.netlist
            .add_node(kind, fanins, output.clone())
            .map_err(|e| match e {
                NetlistError::MultipleDrivers { signal, .. } => FrontendError::MultipleDrivers {
                    module: self.site.module.clone(),
                    signal,
                    line: self.site.line,
                },
                NetlistError::DrivenInput { signal, .. } => FrontendError::DrivenInput {
                    module: self.site.module.clone(),
                    signal,
                    line: self.site.line,
                },
                other => FrontendError::Netlist(other),
            })?;
        Ok(Fanin::new(output))
    }

    /// Make `dest` carry `value`, adding a buffer unless `value` already is `dest`.
    fn drive(&mut self, dest: &str, value: Fanin, width: u32) -> Result<(), FrontendError> {
        if value.signal == dest && !value.inverted {
            return Ok(());
        }
        self.emit(NodeKind::Buf, vec![value], width, Some(dest))?;
        Ok(())
    }

    fn constant(&mut self, value: u64, width: u32) -> Result<Fanin, FrontendError> {
        self.emit(NodeKind::Const(value & mask(width)), Vec::new(), width, None)
    }

    /// Complement of `value` at `width` bits.
    fn invert(&mut self, value: Fanin, width: u32, dest: Option<&str>) -> Result<Fanin, FrontendError> {
        if self.netlist.width(&value.signal) == width {
            Ok(value.negate())
        } else {
            self.emit(NodeKind::Not, vec![value], width, dest)
        }
    }

    fn unsupported(&self, construct: impl Into<String>) -> FrontendError {
        FrontendError::Unsupported {
            line: self.site.line,
            col: 0,
            construct: construct.into(),
        }
    }

    /// Self-determined width of an expression.
    fn self_width(&self, scope: &Scope<'_>, expr: &Expr) -> Result<u32, FrontendError> {
        let width = match expr {
            Expr::Ident { name, pos } => scope.width(name, pos.line)?,
            Expr::Number { width: Some(w), .. } => *w,
            Expr::Number { width: None, value } => (64 - value.leading_zeros()).max(1),
            Expr::Select { name, msb, lsb, pos } => {
                let declared = scope.width(name, pos.line)?;
                if *msb >= declared {
                    return Err(self.unsupported(format!("select [{msb}] beyond the width of '{name}'")));
                }
                msb - lsb + 1
            }
            Expr::Concat(parts) => parts
                .iter()
                .map(|p| self.self_width(scope, p))
                .sum::<Result<u32, _>>()?,
            Expr::Unary(UnaryOp::Not, inner) => self.self_width(scope, inner)?,
            Expr::Unary(UnaryOp::LogicNot, _) => 1,
            Expr::Binary(op, _, _) if op.is_boolean() => 1,
            Expr::Binary(_, lhs, rhs) | Expr::Ternary(_, lhs, rhs) => {
                self.self_width(scope, lhs)?.max(self.self_width(scope, rhs)?)
            }
        };
        if !(1..=MAX_WIDTH).contains(&width) {
            return Err(self.unsupported(format!("expression width {width}")));
        }
        Ok(width)
    }

    /// Lower `expr` evaluated at `width` bits. The root node drives `dest`
    /// when possible; the caller buffers the returned value otherwise.
    fn expr(&mut self, scope: &Scope<'_>, expr: &Expr, width: u32, dest: Option<&str>) -> Result<Fanin, FrontendError> {
        match expr {
            Expr::Ident { name, pos } => scope.read(name, pos.line),
            Expr::Number { value, .. } => {
                self.emit(NodeKind::Const(value & mask(width)), Vec::new(), width, dest)
            }
            Expr::Select { name, lsb, pos, .. } => {
                let base = scope.read(name, pos.line)?;
                let select_width = self.self_width(scope, expr)?;
                if *lsb == 0 && select_width == scope.width(name, pos.line)? {
                    return Ok(base);
                }
                if *lsb == 0 {
                    return self.emit(NodeKind::Buf, vec![base], select_width, dest);
                }
                let shift = self.constant(1 << lsb, lsb + 1)?;
                self.emit(NodeKind::Div, vec![base, shift], select_width, dest)
            }
            Expr::Concat(parts) => {
                self.self_width(scope, expr)?;
                let mut total = 0;
                let mut acc: Option<Fanin> = None;
                for (i, part) in parts.iter().enumerate() {
                    let part_width = self.self_width(scope, part)?;
                    let value = self.expr(scope, part, part_width, None)?;
                    total += part_width;
                    acc = Some(match acc {
                        None => value,
                        Some(high) => {
                            let factor = self.constant(1 << part_width, part_width + 1)?;
                            let shifted = self.emit(NodeKind::Mul, vec![high, factor], total, None)?;
                            let last = i + 1 == parts.len();
                            self.emit(NodeKind::Or, vec![shifted, value], total, dest.filter(|_| last))?
                        }
                    });
                }
                acc.ok_or_else(|| self.unsupported("empty concatenation"))
            }
            Expr::Unary(UnaryOp::Not, inner) => {
                let value = self.expr(scope, inner, width, None)?;
                self.invert(value, width, dest)
            }
            Expr::Unary(UnaryOp::LogicNot, inner) => {
                let inner_width = self.self_width(scope, inner)?;
                let value = self.expr(scope, inner, inner_width, None)?;
                self.is_zero(value, inner_width, dest)
            }
            Expr::Binary(op, lhs, rhs) => self.binary(scope, *op, lhs, rhs, width, dest),
            Expr::Ternary(cond, then, otherwise) => {
                let cond_width = self.self_width(scope, cond)?;
                let select = self.expr(scope, cond, cond_width, None)?;
                let d1 = self.expr(scope, then, width, None)?;
                let d0 = self.expr(scope, otherwise, width, None)?;
                self.emit(NodeKind::Mux, vec![d0, d1, select], width, dest)
            }
        }
    }

    fn binary(
        &mut self,
        scope: &Scope<'_>,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        width: u32,
        dest: Option<&str>,
    ) -> Result<Fanin, FrontendError> {
        let kind = match op {
            BinaryOp::And => NodeKind::And,
            BinaryOp::Or => NodeKind::Or,
            BinaryOp::Xor | BinaryOp::Xnor => NodeKind::Xor,
            BinaryOp::Add => NodeKind::Add,
            BinaryOp::Sub => NodeKind::Sub,
            BinaryOp::Mul => NodeKind::Mul,
            BinaryOp::Div => NodeKind::Div,
            BinaryOp::LogicAnd | BinaryOp::LogicOr => {
                let l = self.truth(scope, lhs)?;
                let r = self.truth(scope, rhs)?;
                let kind = if op == BinaryOp::LogicAnd { NodeKind::And } else { NodeKind::Or };
                return self.emit(kind, vec![l, r], 1, dest);
            }
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                return self.compare(scope, op, lhs, rhs, dest);
            }
        };
        let l = self.expr(scope, lhs, width, None)?;
        let r = self.expr(scope, rhs, width, None)?;
        if op == BinaryOp::Xnor {
            let xor = self.emit(kind, vec![l, r], width, None)?;
            return Ok(xor.negate());
        }
        self.emit(kind, vec![l, r], width, dest)
    }

    /// One-bit "is nonzero" of an operand of a logical operator.
    fn truth(&mut self, scope: &Scope<'_>, expr: &Expr) -> Result<Fanin, FrontendError> {
        let width = self.self_width(scope, expr)?;
        let value = self.expr(scope, expr, width, None)?;
        if width == 1 {
            return Ok(value);
        }
        Ok(self.is_zero(value, width, None)?.negate())
    }

    fn compare(
        &mut self,
        scope: &Scope<'_>,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        dest: Option<&str>,
    ) -> Result<Fanin, FrontendError> {
        let width = self.self_width(scope, lhs)?.max(self.self_width(scope, rhs)?);
        if width >= MAX_WIDTH {
            return Err(self.unsupported(format!("{width}-bit comparison")));
        }
        let l = self.expr(scope, lhs, width, None)?;
        let r = self.expr(scope, rhs, width, None)?;
        match op {
            BinaryOp::Eq => self.equal(l, r, width, dest),
            BinaryOp::Ne => Ok(self.equal(l, r, width, None)?.negate()),
            BinaryOp::Lt => self.less(l, r, width, dest),
            BinaryOp::Gt => self.less(r, l, width, dest),
            BinaryOp::Le => Ok(self.less(r, l, width, None)?.negate()),
            _ => Ok(self.less(l, r, width, None)?.negate()),
        }
    }

    /// Bit `width` of a `width + 1`-bit value, as a one-bit signal.
    fn top_bit(&mut self, value: Fanin, width: u32, dest: Option<&str>) -> Result<Fanin, FrontendError> {
        let weight = self.constant(1 << width, width + 1)?;
        self.emit(NodeKind::Div, vec![value, weight], 1, dest)
    }

    /// `l < r`: the borrow out of `l - r`.
    fn less(&mut self, l: Fanin, r: Fanin, width: u32, dest: Option<&str>) -> Result<Fanin, FrontendError> {
        let difference = self.emit(NodeKind::Sub, vec![l, r], width + 1, None)?;
        self.top_bit(difference, width, dest)
    }

    /// `l == r`: the borrow out of `(l ^ r) - 1`.
    fn equal(&mut self, l: Fanin, r: Fanin, width: u32, dest: Option<&str>) -> Result<Fanin, FrontendError> {
        let diff = self.emit(NodeKind::Xor, vec![l, r], width, None)?;
        self.is_zero(diff, width, dest)
    }

    fn is_zero(&mut self, value: Fanin, width: u32, dest: Option<&str>) -> Result<Fanin, FrontendError> {
        if width == 1 {
            return self.invert(value, 1, dest);
        }
        let one = self.constant(1, width + 1)?;
        let decremented = self.emit(NodeKind::Sub, vec![value, one], width + 1, None)?;
        self.top_bit(decremented, width, dest)
    }

    fn positional<'e>(&self, instance: &'e Instance) -> Result<&'e [Expr], FrontendError> {
        match &instance.connections {
            Connections::Positional(exprs) => Ok(exprs),
            Connections::Named(_) => Err(self.connection_error(instance, "needs positional connections")),
        }
    }

    /// `and g (y, a, b, c)` and friends.
    fn primitive(&mut self, scope: &Scope<'_>, instance: &Instance) -> Result<(), FrontendError> {
        let line = instance.pos.line;
        let exprs = self.positional(instance)?;
        let Some((Expr::Ident { name, .. }, inputs)) = exprs.split_first() else {
            return Err(self.connection_error(instance, "the first terminal must be an output signal"));
        };
        let dest = scope.dest(name, line)?;
        let width = scope.width(name, line)?;
        let mut values = Vec::with_capacity(inputs.len());
        for input in inputs {
            values.push(self.expr(scope, input, width, None)?);
        }

        let gate = instance.module.as_str();
        if matches!(gate, "not" | "buf") {
            let [value] = <[Fanin; 1]>::try_from(values)
                .map_err(|_| self.connection_error(instance, format!("'{gate}' takes exactly one input")))?;
            let kind = if gate == "not" { NodeKind::Not } else { NodeKind::Buf };
            let out = self.emit(kind, vec![value], width, Some(&dest))?;
            return self.drive(&dest, out, width);
        }
        if values.len() < 2 {
            return Err(self.connection_error(instance, format!("'{gate}' needs at least two inputs")));
        }
        let (chain, last) = match gate {
            "and" => (NodeKind::And, NodeKind::And),
            "nand" => (NodeKind::And, NodeKind::Nand),
            "or" => (NodeKind::Or, NodeKind::Or),
            "nor" => (NodeKind::Or, NodeKind::Nor),
            _ => (NodeKind::Xor, NodeKind::Xor),
        };
        let mut values = values.into_iter();
        let mut acc = values.next().ok_or_else(|| self.connection_error(instance, "missing inputs"))?;
        let mut remaining = values.len();
        for value in values {
            remaining -= 1;
            if remaining > 0 {
                acc = self.emit(chain.clone(), vec![acc, value], width, None)?;
                continue;
            }
            let value = if gate == "xnor" { self.invert(value, width, None)? } else { value };
            acc = self.emit(last.clone(), vec![acc, value], width, Some(&dest))?;
        }
        self.drive(&dest, acc, width)
    }

    /// Instance of an undefined module: positional, output first.
    fn black_box(&mut self, scope: &Scope<'_>, instance: &Instance) -> Result<(), FrontendError> {
        let line = instance.pos.line;
        let exprs = self.positional(instance)?;
        let Some((Expr::Ident { name, .. }, inputs)) = exprs.split_first() else {
            return Err(self.connection_error(
                instance,
                format!("black box '{}' needs its output signal first", instance.module),
            ));
        };
        let dest = scope.dest(name, line)?;
        let width = scope.width(name, line)?;
        let mut fanins = Vec::with_capacity(inputs.len());
        for input in inputs {
            let input_width = self.self_width(scope, input)?;
            fanins.push(self.expr(scope, input, input_width, None)?);
        }
        debug!("black box {} -> {dest}", instance.module);
        let out = self.emit(NodeKind::Module(instance.module.clone()), fanins, width, Some(&dest))?;
        self.drive(&dest, out, width)
    }

    /// Inline an instance of a module defined in the source.
    fn inline(&mut self, scope: &Scope<'_>, instance: &Instance, child: &Module) -> Result<(), FrontendError> {
        if self.stack.contains(&child.name) {
            return Err(FrontendError::RecursiveInstance(child.name.clone()));
        }
        let Some(instance_name) = &instance.name else {
            return Err(self.connection_error(instance, "module instances need a name"));
        };
        let line = instance.pos.line;

        let mut connected: HashMap<&str, Option<&Expr>> = HashMap::new();
        match &instance.connections {
            Connections::Positional(exprs) => {
                if exprs.len() > child.ports.len() {
                    return Err(self.connection_error(
                        instance,
                        format!("{} connections for {} ports", exprs.len(), child.ports.len()),
                    ));
                }
                for (port, expr) in child.ports.iter().zip(exprs) {
                    connected.insert(port.as_str(), Some(expr));
                }
            }
            Connections::Named(named) => {
                for (port, expr) in named {
                    if !child.ports.contains(port) {
                        return Err(self.connection_error(instance, format!("'{}' has no port '{port}'", child.name)));
                    }
                    if connected.insert(port.as_str(), expr.as_ref()).is_some() {
                        return Err(self.connection_error(instance, format!("port '{port}' connected twice")));
                    }
                }
            }
        }

        let prefix = format!("{}{instance_name}/", scope.prefix);
        let mut bindings = HashMap::new();
        let mut output_buffers = Vec::new();
        for port in child.port_decls() {
            let expr = connected.get(port.name.as_str()).copied().flatten();
            match (port.direction, expr) {
                (Some(Direction::Input), Some(expr)) => {
                    let eval_width = port.width.max(self.self_width(scope, expr)?);
                    let mut value = self.expr(scope, expr, eval_width, None)?;
                    if self.netlist.width(&value.signal) != port.width {
                        value = self.emit(NodeKind::Buf, vec![value], port.width, None)?;
                    }
                    bindings.insert(port.name.clone(), Binding::Read(value));
                }
                (Some(Direction::Input), None) => {
                    return Err(self.connection_error(instance, format!("input port '{}' is unconnected", port.name)));
                }
                (_, Some(Expr::Ident { name, .. })) => {
                    let parent = scope.dest(name, line)?;
                    if self.netlist.width(&parent) == port.width {
                        bindings.insert(port.name.clone(), Binding::Alias(parent));
                    } else {
                        output_buffers.push((parent, format!("{prefix}{}", port.name)));
                    }
                }
                (_, Some(_)) => {
                    return Err(self.connection_error(
                        instance,
                        format!("output port '{}' must connect to a signal", port.name),
                    ));
                }
                (_, None) => {}
            }
        }

        for decl in &child.decls {
            if !bindings.contains_key(&decl.name) {
                self.netlist.declare_width(format!("{prefix}{}", decl.name), decl.width)?;
            }
        }

        debug!("inlining {} as {prefix}", child.name);
        self.stack.push(child.name.clone());
        let child_scope = Scope {
            module: child,
            prefix,
            bindings,
        };
        self.module(&child_scope)?;
        self.stack.pop();

        self.site = Site {
            module: scope.module.name.clone(),
            line,
        };
        for (parent, local) in output_buffers {
            let width = self.netlist.width(&parent);
            self.drive(&parent, Fanin::new(local), width)?;
        }
        Ok(())
    }
}
