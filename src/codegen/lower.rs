use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use super::ir::{Condition, FunctionIr, GuardedOp, Op, Register};
use super::registers::{ControlAllocator, RegisterFile};
use super::scope::Scope;
use crate::diagnostics::CompileError;
use crate::parser::ast::{Block, Expr, Stmt};
use crate::span::{Span, Spanned};
use crate::typeck::env::FunctionTable;
use crate::typeck::kind::{Family, Kind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Flow {
    Continues,
    Returns,
}

/// One side of an `if` after lowering, kept until the join.
struct Arm {
    condition: Condition,
    scope: Scope,
    live: Vec<bool>,
}

/// Lowers one function (or synthesized loop closure) into guarded operations.
pub struct FunctionBuilder<'t> {
    pub(super) table: &'t FunctionTable,
    pub(super) name: String,
    is_sync: bool,
    param_count: usize,
    return_kinds: Vec<Kind>,
    pub(super) in_loop: bool,
    pub(super) registers: RegisterFile,
    pub(super) scope: Scope,
    pub(super) control: ControlAllocator,
    pub(super) current: Condition,
    ops: Vec<GuardedOp>,
    loop_count: u32,
    pub(super) closures: Vec<FunctionIr>,
}

impl<'t> FunctionBuilder<'t> {
    pub fn new(
        table: &'t FunctionTable,
        name: impl Into<String>,
        params: &[(String, Kind)],
        return_kinds: Vec<Kind>,
        is_sync: bool,
    ) -> Self {
        let mut registers = RegisterFile::new();
        let mut scope = Scope::new();
        for (param, kind) in params {
            let r = registers.alloc(kind.clone());
            scope.bind(param.clone(), r);
        }
        Self {
            table,
            name: name.into(),
            is_sync,
            param_count: params.len(),
            return_kinds,
            in_loop: false,
            registers,
            scope,
            control: ControlAllocator::new(),
            current: Condition::ENTRY,
            ops: Vec::new(),
            loop_count: 0,
            closures: Vec::new(),
        }
    }

    /// Lower a function body, which must end in `return` on every path.
    pub fn lower_body(&mut self, body: &Spanned<Block>) -> Result<(), CompileError> {
        match self.lower_block(body)? {
            Flow::Returns => Ok(()),
            Flow::Continues => Err(CompileError::shape(
                format!("function `{}` does not return on every path", self.name),
                Span::with_file(body.span.end.saturating_sub(1), body.span.end, body.span.file_id),
            )),
        }
    }

    /// The finished function followed by every loop closure it synthesized.
    pub fn finish(self) -> (FunctionIr, Vec<FunctionIr>) {
        let slots = self.registers.canonical_slots();
        let ir = FunctionIr {
            name: self.name,
            is_sync: self.is_sync,
            is_native: false,
            param_count: self.param_count,
            return_kinds: self.return_kinds,
            register_kinds: self.registers.into_kinds(),
            slots,
            ops: self.ops,
            condition_count: self.control.condition_count(),
            child_calls: self.control.into_child_calls(),
        };
        (ir, self.closures)
    }

    pub(super) fn emit(&mut self, op: Op) {
        self.emit_under(self.current, op);
    }

    pub(super) fn emit_under(&mut self, condition: Condition, op: Op) {
        self.ops.push(GuardedOp { condition, op });
    }

    pub(super) fn next_closure_name(&mut self) -> String {
        loop {
            self.loop_count += 1;
            let candidate = format!("{}_{}", self.name, self.loop_count);
            if !self.table.contains(&candidate) {
                return candidate;
            }
        }
    }

    pub(super) fn lower_block(&mut self, block: &Spanned<Block>) -> Result<Flow, CompileError> {
        let mut flow = Flow::Continues;
        for stmt in &block.node.stmts {
            if flow == Flow::Returns {
                return Err(CompileError::shape("unreachable statement after `return`", stmt.span));
            }
            flow = self.lower_stmt(stmt).map_err(|e| e.or_span(stmt.span))?;
            if flow == Flow::Continues {
                self.sweep_unreachable();
            }
        }
        Ok(flow)
    }

    fn lower_stmt(&mut self, stmt: &Spanned<Stmt>) -> Result<Flow, CompileError> {
        match &stmt.node {
            Stmt::Let { names, value } => {
                let regs = self.lower_expr(value)?;
                if regs.len() != names.len() {
                    return Err(CompileError::shape(
                        format!("cannot bind {} value(s) to {} name(s)", regs.len(), names.len()),
                        stmt.span,
                    ));
                }
                for (name, r) in names.iter().zip(regs) {
                    self.bind_local(&name.node, r);
                }
                Ok(Flow::Continues)
            }
            Stmt::Return { value } => self.lower_return(value.as_ref(), stmt.span),
            Stmt::If { cond, then_block, else_block } => self.lower_if(cond, then_block, else_block, stmt.span),
            Stmt::While { cond, body } => {
                self.lower_while(cond, body)?;
                Ok(Flow::Continues)
            }
            Stmt::Expr(expr) => {
                let regs = self.lower_expr(expr)?;
                if !regs.is_empty() {
                    return Err(CompileError::shape(
                        format!("expected no values from an expression statement, got {}", regs.len()),
                        expr.span,
                    ));
                }
                Ok(Flow::Continues)
            }
        }
    }

    /// Bind `name`. An owned resource keeps a single name, so binding it moves
    /// it out of any other local.
    pub(super) fn bind_local(&mut self, name: &str, r: Register) {
        if self.registers.kind(r).needs_cleanup() {
            self.scope.unbind_aliases(&self.registers, r);
        }
        self.scope.bind(name, r);
    }

    fn lower_return(&mut self, value: Option<&Spanned<Expr>>, span: Span) -> Result<Flow, CompileError> {
        if self.in_loop {
            return Err(CompileError::shape("`return` is not allowed inside a `while` loop", span));
        }
        let values = match value {
            Some(expr) => self.lower_expr(expr)?,
            None => Vec::new(),
        };
        if values.len() != self.return_kinds.len() {
            return Err(CompileError::type_err(
                format!(
                    "return value count mismatch in `{}`, expecting {}, got {}",
                    self.name,
                    self.return_kinds.len(),
                    values.len()
                ),
                span,
            ));
        }
        for (i, (r, expected)) in values.iter().zip(&self.return_kinds).enumerate() {
            self.registers
                .kind(*r)
                .converts_to(expected)
                .map_err(|e| CompileError::type_err(format!("return value {}: {e}", i + 1), span))?;
        }
        let mut owned = BTreeSet::new();
        for r in &values {
            if self.registers.kind(*r).needs_cleanup() && !owned.insert(self.registers.resolve(*r)) {
                return Err(CompileError::type_err("owned value is returned more than once", span));
            }
        }
        let garbage = self.take_garbage(&values);
        self.emit(Op::Return { values, garbage });
        Ok(Flow::Returns)
    }

    fn lower_if(
        &mut self,
        cond: &Spanned<Expr>,
        then_block: &Spanned<Block>,
        else_block: &Spanned<Block>,
        span: Span,
    ) -> Result<Flow, CompileError> {
        let test = self.lower_single(cond, "as an `if` condition")?;
        self.require_boolean(test, cond.span, "`if` condition")?;

        let parent = self.current;
        let on_true = self.control.condition();
        let on_false = self.control.condition();
        self.emit(Op::Branch { test, if_true: on_true, if_false: on_false });

        let start_scope = self.scope.snapshot();
        let start_live = self.registers.live_flags();

        self.current = on_true;
        let true_flow = self.lower_block(then_block)?;
        let true_arm = Arm { condition: on_true, scope: self.scope.snapshot(), live: self.registers.live_flags() };

        self.scope.restore(start_scope.clone());
        self.registers.restore(&start_live);
        self.current = on_false;
        let false_flow = self.lower_block(else_block)?;
        let false_arm = Arm { condition: on_false, scope: self.scope.snapshot(), live: self.registers.live_flags() };
        self.current = parent;

        match (true_flow, false_flow) {
            (Flow::Returns, Flow::Returns) => Ok(Flow::Returns),
            // The false arm's state is already current.
            (Flow::Returns, Flow::Continues) => Ok(Flow::Continues),
            (Flow::Continues, Flow::Returns) => {
                self.scope.restore(true_arm.scope);
                self.registers.restore(&true_arm.live);
                Ok(Flow::Continues)
            }
            (Flow::Continues, Flow::Continues) => {
                self.join_arms(&start_scope, start_live.len(), true_arm, false_arm, span)?;
                Ok(Flow::Continues)
            }
        }
    }

    /// Merge the bindings of two arms that both fall through.
    ///
    /// Every pre-branch name, and every name bound on both arms, must end up
    /// with equivalent kinds on both sides; the two registers are joined into
    /// one canonical register. A pre-branch register (or one already claimed
    /// by another name) is first renamed into a fresh register on its arm so
    /// the join never aliases a value the other arm still sees.
    fn join_arms(
        &mut self,
        start: &Scope,
        pre_len: usize,
        mut on_true: Arm,
        mut on_false: Arm,
        span: Span,
    ) -> Result<(), CompileError> {
        let mut names: BTreeSet<String> = start.names().map(str::to_string).collect();
        names.extend(
            on_true
                .scope
                .names()
                .filter(|name| on_false.scope.contains(name))
                .map(str::to_string),
        );

        let mut merged = Scope::new();
        let mut claimed_true = BTreeSet::new();
        let mut claimed_false = BTreeSet::new();
        for name in &names {
            let t = on_true.scope.get(name).ok_or_else(|| {
                CompileError::type_err(format!("local variable `{name}` is missing after the true branch of `if`"), span)
            })?;
            let f = on_false.scope.get(name).ok_or_else(|| {
                CompileError::type_err(format!("local variable `{name}` is missing after the false branch of `if`"), span)
            })?;
            self.registers.kind(f).is_equivalent(self.registers.kind(t)).map_err(|e| {
                CompileError::type_err(format!("variable `{name}` has different types on the two branches of `if`: {e}"), span)
            })?;

            let joined = if self.registers.same_value(t, f) {
                self.registers.resolve(t)
            } else {
                let t = self.claim(&mut on_true, &mut claimed_true, t, pre_len);
                let f = self.claim(&mut on_false, &mut claimed_false, f, pre_len);
                self.registers.join(t, f)
            };
            trace!(function = %self.name, name = %name, register = %joined, "joined branch binding");
            merged.bind(name.clone(), joined);
        }

        // A pre-branch register owned on only one arm and no longer reachable
        // is freed on that arm.
        let reachable = merged.reachable_roots(&self.registers);
        let mut orphans: BTreeMap<Register, Condition> = BTreeMap::new();
        let mut flags = Vec::with_capacity(self.registers.len());
        for i in 0..self.registers.len() {
            let r = Register(i as u32);
            let lt = on_true.live.get(i).copied().unwrap_or(false);
            let lf = on_false.live.get(i).copied().unwrap_or(false);
            let live = if i < pre_len {
                let root = self.registers.resolve(r);
                if lt == lf || reachable.contains(&root) {
                    lt || lf
                } else {
                    if self.registers.kind(r).needs_cleanup() {
                        let side = if lt { on_true.condition } else { on_false.condition };
                        orphans.entry(root).or_insert(side);
                    }
                    false
                }
            } else if i < on_false.live.len() {
                lt || lf
            } else {
                self.registers.is_live(r)
            };
            flags.push(live);
        }
        self.registers.set_live_flags(flags);
        self.scope = merged;
        for (root, condition) in orphans {
            self.emit_free(condition, root);
        }
        Ok(())
    }

    /// Make `r` safe to join on `arm`, renaming it under the arm's condition if needed.
    fn claim(&mut self, arm: &mut Arm, claimed: &mut BTreeSet<Register>, r: Register, pre_len: usize) -> Register {
        let root = self.registers.resolve(r);
        let r = if root.index() < pre_len || claimed.contains(&root) {
            let dest = self.registers.alloc(self.registers.kind(r).clone());
            self.emit_under(arm.condition, Op::Rename { source: r, dest });
            self.registers.release_in(&mut arm.live, r);
            dest
        } else {
            r
        };
        claimed.insert(self.registers.resolve(r));
        r
    }

    pub(super) fn lower_expr(&mut self, expr: &Spanned<Expr>) -> Result<Vec<Register>, CompileError> {
        match &expr.node {
            Expr::Ident(name) => match self.scope.get(name) {
                Some(r) => Ok(vec![r]),
                None => Err(CompileError::lookup(format!("unknown variable `{name}`"), expr.span)),
            },
            Expr::BoolLit(value) => {
                let target = self.registers.alloc(Kind::owned(Family::Boolean));
                self.emit(Op::LoadInteger { target, value: i64::from(*value) });
                Ok(vec![target])
            }
            Expr::IntLit(value) => {
                let target = self.registers.alloc(Kind::owned(Family::Integer));
                self.emit(Op::LoadInteger { target, value: *value });
                Ok(vec![target])
            }
            Expr::StringLit(value) => {
                // String literals are static and never owned.
                let target = self.registers.alloc(Kind::borrowed(Family::String));
                self.emit(Op::LoadString { target, value: value.clone() });
                Ok(vec![target])
            }
            Expr::Tuple(items) => {
                let mut regs = Vec::with_capacity(items.len());
                for item in items {
                    regs.push(self.lower_single(item, "inside a tuple")?);
                }
                Ok(regs)
            }
            Expr::Call { callee, args } => self.lower_call(callee, args, expr.span),
            Expr::Compare { op, lhs, rhs } => {
                let left = self.lower_single(lhs, &format!("on the left of `{op}`"))?;
                let right = self.lower_single(rhs, &format!("on the right of `{op}`"))?;
                let integer = Kind::borrowed(Family::Integer);
                for (r, operand) in [(left, lhs), (right, rhs)] {
                    self.registers.kind(r).converts_to(&integer).map_err(|e| {
                        CompileError::type_err(format!("operand of `{op}`: {e}"), operand.span)
                    })?;
                }
                let result = self.registers.alloc(Kind::owned(Family::Boolean));
                self.emit(Op::Compare { op: *op, lhs: left, rhs: right, result });
                Ok(vec![result])
            }
        }
    }

    pub(super) fn lower_single(&mut self, expr: &Spanned<Expr>, context: &str) -> Result<Register, CompileError> {
        let regs = self.lower_expr(expr)?;
        match regs.as_slice() {
            [r] => Ok(*r),
            _ => Err(CompileError::shape(
                format!("expected a single value {context}, got {}", regs.len()),
                expr.span,
            )),
        }
    }

    pub(super) fn require_boolean(&self, r: Register, span: Span, what: &str) -> Result<(), CompileError> {
        self.registers
            .kind(r)
            .converts_to(&Kind::borrowed(Family::Boolean))
            .map_err(|e| CompileError::type_err(format!("{what}: {e}"), span))
    }
}
